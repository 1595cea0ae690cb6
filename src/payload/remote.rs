use anyhow::Context;

use crate::probe::request::ScanRequest;
use crate::probe::transport::Transport;

const PORTSWIGGER: &str = "https://raw.githubusercontent.com/PortSwigger/xss-cheatsheet-data/master/output/payloads.txt";
const PAYLOADBOX: &str = "https://raw.githubusercontent.com/payloadbox/xss-payload-list/master/Intruder/xss-payload-list.txt";
const BURP: &str = "https://raw.githubusercontent.com/danielmiessler/SecLists/master/Discovery/Web-Content/burp-parameter-names.txt";
const ASSETNOTE: &str = "https://raw.githubusercontent.com/assetnote/wordlists/master/data/parameters.txt";

fn payload_source(name: &str) -> Option<&'static str> {
    match name {
        "portswigger" => Some(PORTSWIGGER),
        "payloadbox" => Some(PAYLOADBOX),
        _ => None,
    }
}

fn wordlist_source(name: &str) -> Option<&'static str> {
    match name {
        "burp" => Some(BURP),
        "assetnote" => Some(ASSETNOTE),
        _ => None,
    }
}

async fn fetch_lines(transport: &dyn Transport, url: &str) -> anyhow::Result<Vec<String>> {
    let req = ScanRequest::get(url)?;
    let resp = transport.execute(&req).await.with_context(|| format!("fetch {}", url))?;
    if !(200..300).contains(&resp.status) {
        anyhow::bail!("fetch {} returned status {}", url, resp.status);
    }
    Ok(resp
        .body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

async fn fetch_all(transport: &dyn Transport, providers: &[String], resolve: fn(&str) -> Option<&'static str>) -> Vec<String> {
    let mut out = Vec::new();
    for name in providers {
        let Some(url) = resolve(name.trim()) else {
            tracing::warn!(provider = %name, "unknown remote provider, skipping");
            continue;
        };
        match fetch_lines(transport, url).await {
            Ok(lines) => {
                tracing::info!(provider = %name, count = lines.len(), "loaded remote list");
                out.extend(lines);
            }
            Err(e) => tracing::warn!(provider = %name, "remote list unavailable: {:#}", e),
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Payload lists from `portswigger` / `payloadbox`. Unavailable providers are skipped.
pub async fn fetch_remote_payloads(transport: &dyn Transport, providers: &[String]) -> Vec<String> {
    fetch_all(transport, providers, payload_source).await
}

/// Parameter-name lists from `burp` / `assetnote`.
pub async fn fetch_remote_wordlists(transport: &dyn Transport, providers: &[String]) -> Vec<String> {
    fetch_all(transport, providers, wordlist_source).await
}
