use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use xss_hunter::analyze::context::{ContextLabel, Mode, QuotePosition};
use xss_hunter::analyze::static_analysis::static_analysis;
use xss_hunter::config::ScanOptions;
use xss_hunter::discover::engine::SENTINEL_PARAM;
use xss_hunter::discover::{discover, Location, ParamCandidate};
use xss_hunter::payload::SPECIAL_CHARS;
use xss_hunter::probe::headless::HeadlessChecker;
use xss_hunter::probe::{generate_request, RawResponse, ScanRequest, Transport};
use xss_hunter::scan::{scan_with, FindingKind, ScanContext};

/// Echoes the `q` query value into a paragraph.
struct Reflector {
    escape: bool,
    status: u16,
    seen: Mutex<Vec<String>>,
}

impl Reflector {
    fn new(escape: bool, status: u16) -> Arc<Self> {
        Arc::new(Self { escape, status, seen: Mutex::new(Vec::new()) })
    }

    fn sent_values(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Transport for Reflector {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse> {
        let q = req
            .url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        self.seen.lock().push(q.clone());
        let shown = if self.escape { html_escape::encode_safe(&q).into_owned() } else { q };
        Ok(RawResponse {
            status: self.status,
            headers: vec![("Content-Type".into(), "text/html; charset=utf-8".into())],
            body: format!("<html><body><p>{}</p></body></html>", shown),
        })
    }
}

struct Unreachable;

#[async_trait]
impl Transport for Unreachable {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse> {
        anyhow::bail!("connection refused: {}", req.url)
    }
}

/// Tracks how many callers are inside at once.
#[derive(Default)]
struct Gauge {
    inflight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Gauge {
    async fn hold(&self, ms: u64) {
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn html(body: String) -> RawResponse {
    RawResponse {
        status: 200,
        headers: vec![("Content-Type".into(), "text/html".into())],
        body,
    }
}

fn query_value(req: &ScanRequest, name: &str) -> String {
    req.url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Echoes `q` into a double-quoted script string with angle brackets removed.
struct ScriptEcho;

#[async_trait]
impl Transport for ScriptEcho {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse> {
        let q: String = query_value(req, "q").chars().filter(|c| *c != '<' && *c != '>').collect();
        Ok(html(format!("<script>var a=\"{}\"</script>", q)))
    }
}

/// Browser stand-in that never sees a dialog.
struct SlowChecker(Gauge);

#[async_trait]
impl HeadlessChecker for SlowChecker {
    async fn trigger_and_observe(&self, _url: &str, _expected_alert: &str) -> bool {
        self.0.hold(10).await;
        false
    }
}

/// Every query value on its own line, counting concurrent requests.
struct LinePerParam(Gauge);

#[async_trait]
impl Transport for LinePerParam {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse> {
        self.0.hold(5).await;
        let lines: Vec<String> = req.url.query_pairs().map(|(_, v)| format!("<p>{}</p>", v)).collect();
        Ok(html(lines.join("\n")))
    }
}

/// Every query value except `q` shares line 2; `q` sits alone on line 3.
struct SharedLine;

#[async_trait]
impl Transport for SharedLine {
    async fn execute(&self, req: &ScanRequest) -> anyhow::Result<RawResponse> {
        let others: Vec<String> = req.url.query_pairs().filter(|(k, _)| k != "q").map(|(_, v)| v.into_owned()).collect();
        Ok(html(format!(
            "<html><body>\n<p>{}</p>\n<div>{}</div>\n</body></html>",
            others.join(" "),
            query_value(req, "q")
        )))
    }
}

fn options() -> ScanOptions {
    ScanOptions { mining: false, concurrence: 1, silence: true, ..Default::default() }
}

#[tokio::test]
async fn reflected_query_param_is_verified_once() {
    let mock = Reflector::new(false, 200);
    let ctx = Arc::new(ScanContext::new(options(), mock.clone()));
    let result = scan_with(ctx, "http://t/?q=1", "id").await.unwrap();

    assert_eq!(result.params.len(), 1);
    let q = &result.params[0];
    assert_eq!((q.name.as_str(), q.location), ("q", Location::Query));
    assert!(q.reflected);
    assert_eq!(q.context_summary.count(&ContextLabel::new(Mode::InHtml, QuotePosition::None)), 1);
    assert_eq!(q.context_summary.labels().count(), 1);
    assert_eq!(q.surviving_chars.len(), SPECIAL_CHARS.len());

    assert_eq!(result.pocs.len(), 1);
    assert_eq!(result.pocs[0].kind, FindingKind::Verified);
    assert_eq!(result.pocs[0].param, "q");

    // Early exit: only the confirming payload was ever sent.
    let payload_sends = mock.sent_values().iter().filter(|v| v.contains("alert(")).count();
    assert_eq!(payload_sends, 1);
}

#[tokio::test]
async fn escaping_target_yields_no_verified_finding() {
    let mock = Reflector::new(true, 200);
    let ctx = Arc::new(ScanContext::new(options(), mock));
    let result = scan_with(ctx, "http://t/?q=1", "id").await.unwrap();

    let q = &result.params[0];
    assert!(q.reflected);
    assert!(!q.surviving_chars.contains(&'<'));
    assert!(!q.surviving_chars.contains(&'"'));
    assert!(q.surviving_chars.contains(&'('));
    assert!(result.verified().next().is_none());
}

#[tokio::test]
async fn only_discovery_sends_no_payloads() {
    let mock = Reflector::new(false, 200);
    let opts = ScanOptions { only_discovery: true, ..options() };
    let result = scan_with(Arc::new(ScanContext::new(opts, mock.clone())), "http://t/?q=1", "id")
        .await
        .unwrap();
    assert!(result.pocs.is_empty());
    assert!(result.params[0].reflected);
    assert!(!mock.sent_values().iter().any(|v| v.contains("alert(")));
}

#[tokio::test]
async fn unknown_param_stays_unreflected() {
    let mock = Reflector::new(false, 200);
    let result = scan_with(Arc::new(ScanContext::new(options(), mock)), "http://t/?id=1", "id")
        .await
        .unwrap();
    assert_eq!(result.params.len(), 1);
    assert!(!result.params[0].reflected);
    assert!(result.params[0].context_summary.is_empty());
    assert!(result.params[0].surviving_chars.is_empty());
}

#[tokio::test]
async fn ignored_status_aborts_the_target() {
    let mock = Reflector::new(false, 404);
    let opts = ScanOptions { ignore_return: vec![404], ..options() };
    assert!(scan_with(Arc::new(ScanContext::new(opts, mock)), "http://t/?q=1", "id").await.is_err());
}

#[tokio::test]
async fn connection_failure_is_a_target_error() {
    let ctx = Arc::new(ScanContext::new(options(), Arc::new(Unreachable)));
    assert!(scan_with(ctx, "http://t/?q=1", "id").await.is_err());
}

#[tokio::test]
async fn skip_discovery_needs_named_params() {
    let mock = Reflector::new(false, 200);
    let opts = ScanOptions { skip_discovery: true, ..options() };
    assert!(scan_with(Arc::new(ScanContext::new(opts, mock.clone())), "http://t/?q=1", "id").await.is_err());

    let opts = ScanOptions { skip_discovery: true, uniq_param: vec!["q".into()], ..options() };
    let result = scan_with(Arc::new(ScanContext::new(opts, mock)), "http://t/?q=1", "id").await.unwrap();
    assert_eq!(result.verified().count(), 1);
}

#[tokio::test]
async fn inline_script_confirmations_share_the_headless_bound() {
    let opts = ScanOptions { concurrence: 40, ..options() };
    let bound = opts.headless_concurrency();
    let checker = Arc::new(SlowChecker(Gauge::default()));
    let ctx = ScanContext::new(opts, Arc::new(ScriptEcho)).with_headless(checker.clone());
    let result = scan_with(Arc::new(ctx), "http://t/?q=1", "id").await.unwrap();

    assert!(result.params[0].reflected);
    assert!(checker.0.calls() > 0);
    assert!(checker.0.peak() <= bound, "peak {} over bound {}", checker.0.peak(), bound);
    assert!(result.verified().next().is_none());
}

#[tokio::test]
async fn char_survival_stays_within_worker_bound() {
    let mock = Arc::new(LinePerParam(Gauge::default()));
    let opts = ScanOptions { concurrence: 4, only_discovery: true, ..options() };
    let ctx = Arc::new(ScanContext::new(opts, mock.clone()));
    let result = scan_with(ctx, "http://t/?a=1&b=1&c=1&d=1", "id").await.unwrap();

    assert_eq!(result.params.iter().filter(|p| p.reflected).count(), 4);
    assert!(result.params.iter().all(|p| p.surviving_chars.len() == SPECIAL_CHARS.len()));
    // Four pool workers plus the path segment request running beside discovery.
    assert!(mock.0.peak() <= 5, "peak in-flight {}", mock.0.peak());
}

#[tokio::test]
async fn sentinel_line_filters_mined_candidates() {
    let opts = ScanOptions { mining: true, finding_dom: false, concurrence: 8, ..options() };
    let base = generate_request("http://t/?q=1", None, &opts).unwrap();
    let ctx = Arc::new(ScanContext::new(opts, Arc::new(SharedLine)));
    let outcome = discover(ctx, &base, "").await;

    assert_eq!(outcome.baseline_line, Some(2));
    let id = &outcome.params[&ParamCandidate::new("id", Location::Query)];
    assert!(!id.reflected);
    let q = &outcome.params[&ParamCandidate::new("q", Location::Query)];
    assert!(q.reflected);
    assert!(!outcome.params.contains_key(&ParamCandidate::new(SENTINEL_PARAM, Location::Query)));
    assert_eq!(outcome.reflected().count(), 1);
}

#[tokio::test]
async fn policy_is_read_from_the_initial_response() {
    let opts = options();
    let base = generate_request("http://t/a", None, &opts).unwrap();
    let ctx = ScanContext::new(opts, Arc::new(Unreachable));
    let initial = RawResponse {
        status: 200,
        headers: vec![
            ("Content-Type".into(), "text/html".into()),
            ("Content-Security-Policy".into(), "default-src 'self'".into()),
        ],
        body: String::new(),
    };
    let (policy, paths) = static_analysis(&ctx, &base, &initial).await;
    assert!(policy.is_scannable());
    assert_eq!(policy.csp.as_deref(), Some("default-src 'self'"));
    assert!(paths.is_empty());
}
