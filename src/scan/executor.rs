use std::sync::Arc;

use parking_lot::Mutex;

use crate::analyze::context::{ContextLabel, Mode};
use crate::analyze::verify::code_view;
use crate::concurrent::WorkerPool;
use crate::probe::transport::Exchange;
use crate::scan::dispatch::{DomItem, PayloadFamily, WorkItem, WorkList};
use crate::scan::finding::{Finding, FindingKind, Severity};
use crate::scan::vuln_status::VulnStatus;
use crate::scan::ScanContext;

/// Outcome of one exchange before early-exit bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    Reflected,
    /// Reflected in script; a dialog is needed to call it verified
    NeedsHeadless,
    Nothing,
}

/// The dispatch decision table.
pub fn evaluate(family: &PayloadFamily, exchange: &Exchange, labels: &[ContextLabel], raw_payload: &str) -> Verdict {
    if exchange.dom_evidence {
        return Verdict::Verified;
    }
    if !exchange.reflected || !family.is_consistent(labels) {
        return Verdict::Nothing;
    }
    match family.mode() {
        Some(Mode::InJs) if escaped_in_place(exchange.body(), raw_payload) => Verdict::Nothing,
        Some(Mode::InJs) => Verdict::NeedsHeadless,
        _ => Verdict::Reflected,
    }
}

/// The server prefixed the payload with a backslash, so its leading quote is inert.
fn escaped_in_place(body: &str, raw_payload: &str) -> bool {
    !raw_payload.contains('\\') && body.contains(&format!("\\{}", raw_payload))
}

type Sink = Arc<Mutex<Vec<Finding>>>;

/// Runs the HTTP items and the headless items on their own pools and returns
/// every finding. Progress advances for each item, skipped ones included.
pub async fn execute(ctx: Arc<ScanContext>, work: WorkList, status: Arc<VulnStatus>) -> Vec<Finding> {
    ctx.progress.set_length(work.len() as u64);
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));

    let http_pool = WorkerPool::new(ctx.options.worker_concurrency());
    let dom_pool = WorkerPool::new(ctx.options.headless_concurrency());

    let http = {
        let (ctx, status, sink) = (ctx.clone(), status.clone(), sink.clone());
        http_pool.run(work.items, move |item: WorkItem| {
            let (ctx, status, sink) = (ctx.clone(), status.clone(), sink.clone());
            async move {
                process_item(&ctx, &status, &sink, item).await;
                ctx.progress.inc(1);
            }
        })
    };
    let dom = {
        let (ctx, status, sink) = (ctx.clone(), status.clone(), sink.clone());
        dom_pool.run(work.dom, move |item: DomItem| {
            let (ctx, status, sink) = (ctx.clone(), status.clone(), sink.clone());
            async move {
                process_dom(&ctx, &status, &sink, item).await;
                ctx.progress.inc(1);
            }
        })
    };
    tokio::join!(http, dom);

    let (done, failed) = http_pool.get_stats();
    tracing::debug!(done, failed, confirmed = ?status.confirmed(), "dispatch finished");

    let mut findings = sink.lock();
    std::mem::take(&mut *findings)
}

async fn process_item(ctx: &ScanContext, status: &VulnStatus, sink: &Sink, item: WorkItem) {
    let key = item.status_key();
    if status.should_skip(key, item.family.always_test()) {
        return;
    }

    let exchange = match ctx.send(&item.request, &item.raw_payload).await {
        Ok(ex) => ex,
        Err(e) => {
            tracing::debug!(param = %item.param.name, "payload request failed: {:#}", e);
            return;
        }
    };
    let labels = ctx.classify(exchange.body(), &item.raw_payload);

    let kind = match evaluate(&item.family, &exchange, &labels, &item.raw_payload) {
        Verdict::Verified => FindingKind::Verified,
        Verdict::Reflected => FindingKind::Reflected,
        Verdict::NeedsHeadless if ctx.has_headless() && item.request.method == reqwest::Method::GET => {
            if ctx.trigger_and_observe(item.request.url.as_str()).await {
                FindingKind::Verified
            } else {
                FindingKind::Reflected
            }
        }
        Verdict::NeedsHeadless => FindingKind::Reflected,
        Verdict::Nothing => return,
    };

    let emit = match kind {
        FindingKind::Verified => status.confirm(key),
        FindingKind::Reflected => !status.is_confirmed(key),
    };
    if !emit {
        return;
    }

    let finding = Finding {
        kind,
        inject_type: item.family.to_string(),
        method: item.request.method.to_string(),
        data: item.request.url.to_string(),
        param: item.param.name.clone(),
        location: item.param.location,
        payload: item.raw_payload.clone(),
        evidence: code_view(exchange.body(), &item.raw_payload),
        severity: Severity::from(kind),
        cwe: Finding::cwe_for(&item.family.to_string()).to_string(),
        message: match kind {
            FindingKind::Verified => format!("Triggered XSS payload in {}", item.param.name),
            FindingKind::Reflected => format!("Reflected payload in {}", item.param.name),
        },
    };
    tracing::info!(param = %finding.param, kind = finding.kind.as_str(), inject_type = %finding.inject_type, "finding");
    sink.lock().push(finding);
}

async fn process_dom(ctx: &ScanContext, status: &VulnStatus, sink: &Sink, item: DomItem) {
    if !ctx.has_headless() {
        return;
    }
    if status.should_skip(&item.param.name, false) {
        return;
    }
    ctx.limiter.block(&host_of(&item.url)).await;
    if !ctx.trigger_and_observe(&item.url).await {
        return;
    }
    if !status.confirm(&item.param.name) {
        return;
    }
    tracing::info!(param = %item.param.name, url = %item.url, "dialog fired");
    sink.lock().push(Finding {
        kind: FindingKind::Verified,
        inject_type: "inJS-DOM".to_string(),
        method: "GET".to_string(),
        data: item.url.clone(),
        param: item.param.name.clone(),
        location: item.param.location,
        payload: item.payload.clone(),
        evidence: format!("dialog with message {:?}", ctx.options.custom_alert_value),
        severity: Severity::High,
        cwe: "CWE-79".to_string(),
        message: format!("Triggered DOM XSS payload in {}", item.param.name),
    });
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
