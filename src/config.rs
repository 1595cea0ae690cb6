use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Scan configuration. Every field has a default so partial JSON config files load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Worker count for every pool (discovery, char probing, dispatch)
    pub concurrence: usize,
    /// Per-host rate-limit interval in milliseconds
    pub delay: u64,
    /// Per-request timeout in seconds
    pub timeout: u64,
    pub mining: bool,
    pub finding_dom: bool,
    pub uniq_param: Vec<String>,
    pub ignore_params: Vec<String>,
    pub blind_url: Option<String>,
    pub custom_payload_file: Option<String>,
    pub custom_blind_payload_file: Option<String>,
    pub use_headless: bool,
    pub headless_timeout: u64,
    pub only_discovery: bool,
    pub skip_discovery: bool,
    pub only_custom_payload: bool,
    pub mining_wordlist: Option<String>,
    pub remote_wordlists: Vec<String>,
    pub remote_payloads: Vec<String>,
    /// Request body. Form-encoded or JSON.
    pub data: Option<String>,
    pub method: Option<String>,
    /// Extra headers as `Name: value`
    pub headers: Vec<String>,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub follow_redirects: bool,
    /// Status codes that abort the scan when the target answers with them
    pub ignore_return: Vec<u16>,
    pub custom_alert_value: String,
    /// `none` or `str`, comma separated
    pub custom_alert_type: String,
    pub silence: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrence: 100,
            delay: 0,
            timeout: 10,
            mining: true,
            finding_dom: true,
            uniq_param: Vec::new(),
            ignore_params: Vec::new(),
            blind_url: None,
            custom_payload_file: None,
            custom_blind_payload_file: None,
            use_headless: false,
            headless_timeout: 8,
            only_discovery: false,
            skip_discovery: false,
            only_custom_payload: false,
            mining_wordlist: None,
            remote_wordlists: Vec::new(),
            remote_payloads: Vec::new(),
            data: None,
            method: None,
            headers: Vec::new(),
            cookie: None,
            user_agent: None,
            proxy: None,
            follow_redirects: false,
            ignore_return: Vec::new(),
            custom_alert_value: "1".to_string(),
            custom_alert_type: "none".to_string(),
            silence: false,
        }
    }
}

impl ScanOptions {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let options = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(options)
    }

    /// Allow/deny list check. An allow-list wins over a deny-list.
    pub fn is_inspected(&self, name: &str) -> bool {
        if !self.uniq_param.is_empty() {
            return self.uniq_param.iter().any(|p| p == name);
        }
        !self.ignore_params.iter().any(|p| p == name)
    }

    pub fn has_body(&self) -> bool {
        self.data.as_deref().map(|d| !d.is_empty()).unwrap_or(false)
    }

    /// Configured headers split into name/value pairs. Malformed lines are dropped.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|h| {
                let (name, value) = h.split_once(':')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect()
    }

    /// Cookie string split into name/value pairs.
    pub fn cookie_pairs(&self) -> Vec<(String, String)> {
        self.cookie
            .as_deref()
            .unwrap_or("")
            .split(';')
            .filter_map(|c| {
                let (name, value) = c.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect()
    }

    /// Size of every HTTP pool: discovery, char probing and dispatch.
    pub fn worker_concurrency(&self) -> usize {
        self.concurrence.clamp(1, 1000)
    }

    /// Headless sessions are far heavier than HTTP exchanges: half the workers, 1..=10.
    pub fn headless_concurrency(&self) -> usize {
        (self.concurrence / 2).clamp(1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_wins_over_deny_list() {
        let opts = ScanOptions {
            uniq_param: vec!["q".into()],
            ignore_params: vec!["q".into()],
            ..Default::default()
        };
        assert!(opts.is_inspected("q"));
        assert!(!opts.is_inspected("id"));
    }

    #[test]
    fn deny_list_excludes_only_named() {
        let opts = ScanOptions {
            ignore_params: vec!["token".into()],
            ..Default::default()
        };
        assert!(!opts.is_inspected("token"));
        assert!(opts.is_inspected("q"));
    }

    #[test]
    fn partial_json_config_uses_defaults() {
        let opts: ScanOptions = serde_json::from_str(r#"{"delay": 250, "mining": false}"#).unwrap();
        assert_eq!(opts.delay, 250);
        assert!(!opts.mining);
        assert_eq!(opts.concurrence, 100);
        assert_eq!(opts.custom_alert_value, "1");
    }

    #[test]
    fn headless_pool_is_bounded() {
        let mut opts = ScanOptions::default();
        assert_eq!(opts.headless_concurrency(), 10);
        opts.concurrence = 1;
        assert_eq!(opts.headless_concurrency(), 1);
        opts.concurrence = 6;
        assert_eq!(opts.headless_concurrency(), 3);
        assert_eq!(opts.worker_concurrency(), 6);
        opts.concurrence = 0;
        assert_eq!(opts.worker_concurrency(), 1);
    }

    #[test]
    fn header_and_cookie_pairs() {
        let opts = ScanOptions {
            headers: vec!["X-Api: abc".into(), "broken".into()],
            cookie: Some("sid=1; theme=dark".into()),
            ..Default::default()
        };
        assert_eq!(opts.header_pairs(), vec![("X-Api".to_string(), "abc".to_string())]);
        assert_eq!(opts.cookie_pairs().len(), 2);
        assert_eq!(opts.cookie_pairs()[1].0, "theme");
    }
}
