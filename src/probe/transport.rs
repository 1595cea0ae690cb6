use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;

use crate::analyze::verify::{reflection, verify_dom};
use crate::config::ScanOptions;
use crate::http_client::build_client;
use crate::probe::request::ScanRequest;

#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Performs one HTTP exchange. Timeouts, proxying and redirects are the
/// implementation's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(options: &ScanOptions) -> anyhow::Result<Self> {
        Ok(Self { client: build_client(options)? })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse> {
        let mut builder = self.client.request(req.method.clone(), req.url.clone());
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().await.with_context(|| format!("request to {} failed", req.url))?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str().to_string(), s.to_string())))
            .collect();
        let body = resp.text().await.context("failed to read response body")?;
        Ok(RawResponse { status, headers, body })
    }
}

/// Content types whose bodies are never rendered as HTML.
const NON_RENDERED_TYPES: &[&str] = &[
    "application/json",
    "application/javascript",
    "text/javascript",
    "text/plain",
    "text/css",
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/gif",
    "application/rss+xml",
];

pub fn is_scannable_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    !NON_RENDERED_TYPES.iter().any(|t| ct.contains(t))
}

/// A completed exchange plus the verification verdicts for its probe.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: RawResponse,
    pub dom_evidence: bool,
    pub reflected: bool,
}

impl Exchange {
    pub fn body(&self) -> &str {
        &self.response.body
    }
}

/// Executes `req` and checks the body for `probe`. Verdicts stay false unless
/// the response declares a content type that renders as markup.
pub async fn send_request(transport: &dyn Transport, req: &ScanRequest, probe: &str) -> anyhow::Result<Exchange> {
    let response = transport.execute(req).await?;
    let scannable = response.content_type().map(is_scannable_content_type).unwrap_or(false);
    let (dom_evidence, reflected) = if scannable {
        (verify_dom(&response.body), reflection(&response.body, probe))
    } else {
        (false, false)
    };
    tracing::trace!(url = %req.url, status = response.status, dom_evidence, reflected, "exchange");
    Ok(Exchange { response, dom_evidence, reflected })
}
