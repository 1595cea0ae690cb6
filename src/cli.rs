use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about = "Parameter-aware XSS scanner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Scan a single URL
    Url {
        /// Target URL (e.g. http://example.com/search?q=1)
        url: String,

        #[command(flatten)]
        flags: ScanFlags,
    },

    /// Scan every URL in a newline-delimited file
    File {
        /// Path to the target list
        path: String,

        #[command(flatten)]
        flags: ScanFlags,
    },
}

/// Flags overlaid on the config file. Only flags that were given override it.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ScanFlags {
    /// JSON config file with scan options
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Append findings to this file as JSONL
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Stdout format: `plain` or `json`
    #[arg(long, default_value = "plain")]
    pub format: String,

    /// Number of concurrent workers (default: 100)
    #[arg(short = 'c', long)]
    pub concurrence: Option<usize>,

    /// Delay between requests to the same host in ms
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (default: 10)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Only test these parameters (repeatable or comma separated)
    #[arg(short = 'p', long = "param", value_delimiter = ',')]
    pub uniq_param: Vec<String>,

    /// Never test these parameters
    #[arg(long = "ignore-param", value_delimiter = ',')]
    pub ignore_params: Vec<String>,

    /// Callback URL for blind XSS
    #[arg(short = 'b', long = "blind")]
    pub blind_url: Option<String>,

    /// File with extra payloads
    #[arg(long = "custom-payload", value_name = "FILE")]
    pub custom_payload_file: Option<String>,

    /// File with blind payloads (CALLBACKURL is replaced)
    #[arg(long = "custom-blind-xss-payload", value_name = "FILE")]
    pub custom_blind_payload_file: Option<String>,

    /// Only send custom payloads
    #[arg(long, default_value_t = false)]
    pub only_custom_payload: bool,

    /// Confirm script execution in headless Chrome
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// Stop after parameter discovery
    #[arg(long, default_value_t = false)]
    pub only_discovery: bool,

    /// Skip discovery and test the -p parameters directly
    #[arg(long, default_value_t = false)]
    pub skip_discovery: bool,

    /// Disable dictionary mining
    #[arg(long, default_value_t = false)]
    pub skip_mining: bool,

    /// Disable DOM mining
    #[arg(long, default_value_t = false)]
    pub skip_mining_dom: bool,

    /// Parameter wordlist file, or a comma separated list of names
    #[arg(short = 'W', long = "mining-dict-word")]
    pub mining_wordlist: Option<String>,

    /// Remote wordlists: burp, assetnote
    #[arg(long = "remote-wordlists", value_delimiter = ',')]
    pub remote_wordlists: Vec<String>,

    /// Remote payload lists: portswigger, payloadbox
    #[arg(long = "remote-payloads", value_delimiter = ',')]
    pub remote_payloads: Vec<String>,

    /// Request body (form-encoded or JSON)
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// HTTP method override
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Extra header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Cookie header value
    #[arg(short = 'C', long)]
    pub cookie: Option<String>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// HTTP proxy URL
    #[arg(long)]
    pub proxy: Option<String>,

    /// Follow redirects
    #[arg(long, default_value_t = false)]
    pub follow_redirects: bool,

    /// Abort when the target answers with one of these status codes
    #[arg(long, value_delimiter = ',')]
    pub ignore_return: Vec<u16>,

    /// Expected alert value
    #[arg(long)]
    pub custom_alert_value: Option<String>,

    /// Alert value type: none, str
    #[arg(long)]
    pub custom_alert_type: Option<String>,

    /// Hide the progress bar
    #[arg(short = 'S', long, default_value_t = false)]
    pub silence: bool,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
