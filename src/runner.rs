use std::path::Path;

use anyhow::Context;

use crate::cli::{Cli, Commands, ScanFlags};
use xss_hunter::config::ScanOptions;
use xss_hunter::output::{summary_lines, write_findings_jsonl};
use xss_hunter::scan::{scan, ScanResult};
use xss_hunter::utils::make_scan_id;

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Our crate at the requested level, transport and browser crates kept quiet.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    let filter_str = format!(
        "xss_hunter={crate},reqwest=info,hyper=info,h2=info,chromiumoxide=warn",
        crate = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Url { url, flags } => {
            let options = build_options(&flags)?;
            let result = scan(&url, &options, &make_scan_id(&url)).await?;
            report(&result, &flags)
        }
        Commands::File { path, flags } => {
            let options = build_options(&flags)?;
            let raw = std::fs::read_to_string(&path).with_context(|| format!("failed to read target list {}", path))?;
            let targets: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')).collect();
            tracing::info!(count = targets.len(), "scanning targets from {}", path);
            for target in targets {
                match scan(target, &options, &make_scan_id(target)).await {
                    Ok(result) => report(&result, &flags)?,
                    Err(e) => tracing::error!(url = target, "scan failed: {:#}", e),
                }
            }
            Ok(())
        }
    }
}

/// Config file first, then every flag that was actually given.
fn build_options(flags: &ScanFlags) -> anyhow::Result<ScanOptions> {
    let mut o = match flags.config.as_deref() {
        Some(path) => ScanOptions::from_file(Path::new(path))?,
        None => ScanOptions::default(),
    };

    if let Some(v) = flags.concurrence {
        o.concurrence = v;
    }
    if let Some(v) = flags.delay {
        o.delay = v;
    }
    if let Some(v) = flags.timeout {
        o.timeout = v;
    }
    if !flags.uniq_param.is_empty() {
        o.uniq_param = flags.uniq_param.clone();
    }
    if !flags.ignore_params.is_empty() {
        o.ignore_params = flags.ignore_params.clone();
    }
    if !flags.remote_wordlists.is_empty() {
        o.remote_wordlists = flags.remote_wordlists.clone();
    }
    if !flags.remote_payloads.is_empty() {
        o.remote_payloads = flags.remote_payloads.clone();
    }
    if !flags.headers.is_empty() {
        o.headers = flags.headers.clone();
    }
    if !flags.ignore_return.is_empty() {
        o.ignore_return = flags.ignore_return.clone();
    }

    let overlay = |slot: &mut Option<String>, v: &Option<String>| {
        if v.is_some() {
            *slot = v.clone();
        }
    };
    overlay(&mut o.blind_url, &flags.blind_url);
    overlay(&mut o.custom_payload_file, &flags.custom_payload_file);
    overlay(&mut o.custom_blind_payload_file, &flags.custom_blind_payload_file);
    overlay(&mut o.mining_wordlist, &flags.mining_wordlist);
    overlay(&mut o.data, &flags.data);
    overlay(&mut o.method, &flags.method);
    overlay(&mut o.cookie, &flags.cookie);
    overlay(&mut o.user_agent, &flags.user_agent);
    overlay(&mut o.proxy, &flags.proxy);
    if let Some(v) = &flags.custom_alert_value {
        o.custom_alert_value = v.clone();
    }
    if let Some(v) = &flags.custom_alert_type {
        o.custom_alert_type = v.clone();
    }

    o.use_headless |= flags.headless;
    o.only_discovery |= flags.only_discovery;
    o.skip_discovery |= flags.skip_discovery;
    o.only_custom_payload |= flags.only_custom_payload;
    o.follow_redirects |= flags.follow_redirects;
    o.silence |= flags.silence;
    if flags.skip_mining {
        o.mining = false;
    }
    if flags.skip_mining_dom {
        o.finding_dom = false;
    }
    Ok(o)
}

fn report(result: &ScanResult, flags: &ScanFlags) -> anyhow::Result<()> {
    if flags.format.eq_ignore_ascii_case("json") {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        for p in result.params.iter().filter(|p| p.reflected) {
            println!("[I] {} {} reflected {} chars={}", p.location, p.name, p.context_summary, p.surviving_chars.len());
        }
        for line in summary_lines(result) {
            println!("{}", line);
        }
        println!(
            "[*] {} finished in {} ms: {} findings ({} verified)",
            result.target,
            result.duration_ms,
            result.pocs.len(),
            result.verified().count()
        );
    }
    if let Some(out) = flags.output.as_deref() {
        write_findings_jsonl(Path::new(out), &result.pocs)?;
    }
    Ok(())
}
