use anyhow::Context;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::config::ScanOptions;

/// Build the scan client from options: timeout, proxy, redirect policy.
pub fn build_client(options: &ScanOptions) -> anyhow::Result<Client> {
    let redirect = if options.follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = ClientBuilder::new()
        // Connection pooling
        .pool_max_idle_per_host(options.concurrence.clamp(1, 300))
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .tcp_nodelay(true)

        // Timeouts
        .timeout(Duration::from_secs(options.timeout.max(1)))
        .connect_timeout(Duration::from_secs(options.timeout.clamp(1, 5)))

        // Compression
        .gzip(true)
        .brotli(true)

        .use_rustls_tls()
        .redirect(redirect)

        // Targets under test routinely present self-signed certs
        .danger_accept_invalid_certs(true);

    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).with_context(|| format!("invalid proxy {}", proxy))?;
        builder = builder.proxy(proxy);
    }

    builder.build().context("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_from_defaults() {
        assert!(build_client(&ScanOptions::default()).is_ok());
    }

    #[test]
    fn client_with_proxy() {
        let opts = ScanOptions { proxy: Some("http://127.0.0.1:8080".into()), ..Default::default() };
        assert!(build_client(&opts).is_ok());
    }
}
