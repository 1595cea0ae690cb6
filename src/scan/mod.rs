pub mod dispatch;
pub mod executor;
pub mod finding;
pub mod vuln_status;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::analyze::context::{Classifier, ContextLabel, ContextSummary, LineClassifier};
use crate::analyze::static_analysis::{static_analysis, PathReflection, Policy};
use crate::config::ScanOptions;
use crate::discover::{self, candidates, Location, ParamCandidate, ParamKey, ParamResult};
use crate::payload::remote::fetch_remote_payloads;
use crate::payload::{load_payload_file, SPECIAL_CHARS};
use crate::probe::headless::{ChromeHeadless, HeadlessChecker};
use crate::probe::request::{generate_request, ScanRequest};
use crate::probe::throttle::RateLimiter;
use crate::probe::transport::{send_request, Exchange, HttpTransport, Transport};

pub use dispatch::{synthesize, PayloadFamily, PayloadSources, WorkItem, WorkList};
pub use finding::{Finding, FindingKind, ScanResult, Severity};
pub use vuln_status::VulnStatus;

/// Everything one scan shares across its phases. Owned by the scan call.
pub struct ScanContext {
    pub options: ScanOptions,
    pub transport: Arc<dyn Transport>,
    pub limiter: RateLimiter,
    pub classifier: Arc<dyn Classifier>,
    pub headless: Option<Arc<dyn HeadlessChecker>>,
    /// Caps browser sessions across the dispatch and DOM pools
    headless_slots: Semaphore,
    pub progress: ProgressBar,
}

impl ScanContext {
    pub fn new(options: ScanOptions, transport: Arc<dyn Transport>) -> Self {
        let progress = if options.silence {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template("  {bar:30.cyan/dark_gray} {pos}/{len} payloads | {msg}") {
                pb.set_style(style.progress_chars("█▓░"));
            }
            pb
        };
        let headless_slots = Semaphore::new(options.headless_concurrency());
        Self {
            limiter: RateLimiter::from_millis(options.delay),
            options,
            transport,
            classifier: Arc::new(LineClassifier),
            headless: None,
            headless_slots,
            progress,
        }
    }

    pub fn with_headless(mut self, headless: Arc<dyn HeadlessChecker>) -> Self {
        self.headless = Some(headless);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Rate-limited exchange against the request's host.
    pub async fn send(&self, req: &ScanRequest, probe: &str) -> Result<Exchange> {
        self.limiter.block(&req.host()).await;
        send_request(self.transport.as_ref(), req, probe).await
    }

    pub fn has_headless(&self) -> bool {
        self.headless.is_some()
    }

    /// Opens `url` in the browser and reports whether the expected dialog fired.
    /// False when no browser is attached.
    pub async fn trigger_and_observe(&self, url: &str) -> bool {
        let Some(headless) = &self.headless else { return false };
        let Ok(_slot) = self.headless_slots.acquire().await else { return false };
        headless.trigger_and_observe(url, &self.options.custom_alert_value).await
    }

    pub fn classify(&self, body: &str, probe: &str) -> Vec<ContextLabel> {
        self.classifier.classify(body, probe)
    }
}

/// Scans one target over HTTP, with headless confirmation when enabled.
pub async fn scan(target: &str, options: &ScanOptions, scan_id: &str) -> Result<ScanResult> {
    let transport = Arc::new(HttpTransport::new(options)?);
    let mut ctx = ScanContext::new(options.clone(), transport);
    if options.use_headless {
        match ChromeHeadless::launch(Duration::from_secs(options.headless_timeout)).await {
            Ok(h) => ctx = ctx.with_headless(Arc::new(h)),
            Err(e) => tracing::warn!("headless browser unavailable, DOM checks disabled: {:#}", e),
        }
    }
    scan_with(Arc::new(ctx), target, scan_id).await
}

/// Runs discovery and dispatch against `target` with an already built context.
pub async fn scan_with(ctx: Arc<ScanContext>, target: &str, scan_id: &str) -> Result<ScanResult> {
    let start_time = Utc::now();
    let opts = &ctx.options;

    let base = generate_request(target, opts.data.as_deref(), opts)?;
    let initial = ctx
        .send(&base, "")
        .await
        .with_context(|| format!("target {} is unreachable", target))?;
    let status = initial.response.status;
    if opts.ignore_return.contains(&status) {
        bail!("target {} answered with ignored status {}", target, status);
    }
    tracing::info!(url = %base.url, status, "scan started");

    let (policy, path_reflection, params, base_set) = if opts.skip_discovery {
        if opts.uniq_param.is_empty() {
            bail!("skipping discovery requires at least one named parameter");
        }
        let (params, base_set) = assumed_params(&base, opts);
        (Policy::assume_html(), PathReflection::new(), params, base_set)
    } else {
        let ((policy, path_reflection), outcome) = tokio::join!(
            static_analysis(&ctx, &base, &initial.response),
            discover::discover(ctx.clone(), &base, initial.body()),
        );
        (policy, path_reflection, outcome.params, outcome.base)
    };

    let reported: Vec<ParamResult> = params
        .values()
        .filter(|p| p.reflected || base_set.contains(&p.key()))
        .cloned()
        .collect();
    tracing::info!(
        url = %base.url,
        reflected = reported.iter().filter(|p| p.reflected).count(),
        "discovery finished"
    );

    let mut pocs = Vec::new();
    if !opts.only_discovery {
        let sources = load_sources(&ctx).await;
        let work = synthesize(&base, opts, &policy, &path_reflection, &reported, &base_set, &sources);
        tracing::info!(items = work.items.len(), dom = work.dom.len(), "dispatching payloads");

        let status = Arc::new(VulnStatus::new());
        for p in &reported {
            status.register(&p.name);
        }
        pocs = executor::execute(ctx.clone(), work, status).await;
        ctx.progress.finish_and_clear();
    }

    let end_time = Utc::now();
    Ok(ScanResult {
        scan_id: scan_id.to_string(),
        target: target.to_string(),
        params: reported,
        pocs,
        start_time,
        end_time,
        duration_ms: (end_time - start_time).num_milliseconds(),
    })
}

/// Named parameters treated as reflected with every special character intact.
fn assumed_params(base: &ScanRequest, opts: &ScanOptions) -> (BTreeMap<ParamKey, ParamResult>, BTreeSet<ParamKey>) {
    let mut cands: BTreeSet<ParamCandidate> =
        candidates::inspected(candidates::base_candidates(base, opts), opts).into_iter().collect();
    for name in &opts.uniq_param {
        if !cands.iter().any(|c| &c.name == name) {
            cands.insert(ParamCandidate::new(name.clone(), Location::Query));
        }
    }
    let params = cands
        .iter()
        .map(|c| {
            let result = ParamResult {
                reflected: true,
                context_summary: ContextSummary::default(),
                surviving_chars: SPECIAL_CHARS.iter().copied().collect(),
                ..ParamResult::unreflected(c)
            };
            (c.clone(), result)
        })
        .collect();
    (params, cands)
}

async fn load_sources(ctx: &ScanContext) -> PayloadSources {
    let opts = &ctx.options;
    let read = |path: Option<&String>| match path {
        Some(p) => load_payload_file(p).unwrap_or_else(|e| {
            tracing::warn!("skipping payload file: {:#}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };
    let remote = if opts.remote_payloads.is_empty() {
        Vec::new()
    } else {
        fetch_remote_payloads(ctx.transport.as_ref(), &opts.remote_payloads).await
    };
    PayloadSources {
        custom: read(opts.custom_payload_file.as_ref()),
        custom_blind: read(opts.custom_blind_payload_file.as_ref()),
        remote,
    }
}
