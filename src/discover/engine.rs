use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::analyze::context::ContextSummary;
use crate::analyze::verify::{code_view, reflection_line};
use crate::concurrent::WorkerPool;
use crate::discover::candidates::{base_candidates, common_params, inspected, mined_candidates};
use crate::discover::dom_mining::mine_dom;
use crate::discover::{Location, ParamCandidate, ParamKey, ParamResult};
use crate::payload::remote::fetch_remote_wordlists;
use crate::payload::{Encoding, SPECIAL_CHARS};
use crate::probe::request::{make_param_request, Action, ScanRequest};
use crate::scan::ScanContext;
use crate::utils::read_lines_or_literal;

/// Value injected to test for reflection.
pub const MINING_PROBE: &str = "Dalfox";
/// Prefix for special-character survival probes.
pub const CHAR_PROBE: &str = "dalfox";
/// A name no application should ever read.
pub const SENTINEL_PARAM: &str = "pleasedonthaveanamelikethis_plz_plz";

#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub params: BTreeMap<ParamKey, ParamResult>,
    /// Candidates that were already present in the request
    pub base: BTreeSet<ParamKey>,
    /// Line the sentinel probe reflected on, if any
    pub baseline_line: Option<usize>,
}

impl DiscoveryOutcome {
    pub fn reflected(&self) -> impl Iterator<Item = &ParamResult> {
        self.params.values().filter(|p| p.reflected)
    }
}

/// Enumerates candidates, then probes each one for reflection, landing
/// context and surviving characters. Individual failures only mark the
/// candidate unreflected.
pub async fn discover(ctx: Arc<ScanContext>, base: &ScanRequest, page: &str) -> DiscoveryOutcome {
    let opts = &ctx.options;
    let base_set: BTreeSet<ParamCandidate> = inspected(base_candidates(base, opts), opts).into_iter().collect();

    let mut all = base_set.clone();
    if opts.mining {
        let mut names: BTreeSet<String> = common_params().into_iter().map(str::to_string).collect();
        if let Some(wordlist) = opts.mining_wordlist.as_deref() {
            names.extend(read_lines_or_literal(wordlist));
        }
        if !opts.remote_wordlists.is_empty() {
            names.extend(fetch_remote_wordlists(ctx.transport.as_ref(), &opts.remote_wordlists).await);
        }
        if opts.finding_dom {
            let mined = mine_dom(page);
            tracing::debug!(count = mined.len(), "names mined from page");
            names.extend(mined);
        }
        all.extend(inspected(mined_candidates(&names, base), opts));
    }
    tracing::info!(url = %base.url, candidates = all.len(), "probing parameters");

    let baseline_line = baseline(&ctx, base).await;
    if let Some(line) = baseline_line {
        tracing::debug!(line, "sentinel parameter reflects, filtering by line");
    }

    let base_req = Arc::new(base.clone());
    let pool = WorkerPool::new(opts.worker_concurrency());
    let results = pool
        .run(all.into_iter().collect(), {
            let (ctx, base_req) = (ctx.clone(), base_req.clone());
            move |cand: ParamCandidate| {
                let (ctx, base_req) = (ctx.clone(), base_req.clone());
                async move { probe_candidate(ctx, base_req, cand, baseline_line).await }
            }
        })
        .await;

    let mut params: BTreeMap<ParamKey, ParamResult> = results.into_iter().map(|r| (r.key(), r)).collect();
    let reflected: Vec<ParamKey> = params.values().filter(|p| p.reflected).map(ParamResult::key).collect();
    for (key, c) in surviving_chars(&ctx, &base_req, reflected).await {
        if let Some(p) = params.get_mut(&key) {
            p.surviving_chars.insert(c);
        }
    }
    for p in params.values().filter(|p| p.reflected) {
        tracing::info!(
            param = %p.name,
            location = %p.location,
            contexts = %p.context_summary,
            chars = p.surviving_chars.len(),
            "reflected parameter"
        );
    }

    DiscoveryOutcome { params, base: base_set, baseline_line }
}

async fn baseline(ctx: &ScanContext, base: &ScanRequest) -> Option<usize> {
    let sentinel = ParamCandidate::new(SENTINEL_PARAM, Location::Query);
    let req = make_param_request(base, &sentinel, MINING_PROBE, Encoding::None, Action::Append).ok()?;
    let ex = ctx.send(&req, MINING_PROBE).await.ok()?;
    if !ex.reflected {
        return None;
    }
    reflection_line(ex.body(), MINING_PROBE)
}

async fn probe_candidate(
    ctx: Arc<ScanContext>,
    base: Arc<ScanRequest>,
    cand: ParamCandidate,
    baseline_line: Option<usize>,
) -> ParamResult {
    let unreflected = ParamResult::unreflected(&cand);

    let req = match make_param_request(&base, &cand, MINING_PROBE, Encoding::None, Action::Append) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(param = %cand.name, "cannot build probe: {:#}", e);
            return unreflected;
        }
    };
    let ex = match ctx.send(&req, MINING_PROBE).await {
        Ok(ex) => ex,
        Err(e) => {
            tracing::debug!(param = %cand.name, "probe failed: {:#}", e);
            return unreflected;
        }
    };
    if !ex.reflected {
        return unreflected;
    }
    let line = reflection_line(ex.body(), MINING_PROBE);
    if baseline_line.is_some() && line == baseline_line {
        tracing::trace!(param = %cand.name, "reflection matches baseline");
        return unreflected;
    }

    let labels = ctx.classify(ex.body(), MINING_PROBE);
    let context_summary = ContextSummary::from_labels(&labels);
    let evidence_snippet = Some(code_view(ex.body(), MINING_PROBE)).filter(|s| !s.is_empty());
    ParamResult {
        name: cand.name,
        location: cand.location,
        reflected: true,
        context_summary,
        surviving_chars: BTreeSet::new(),
        evidence_snippet,
    }
}

/// Each special character appended to the char probe under every encoding,
/// for every reflected candidate, on one pool. A character survives when the
/// raw probe comes back.
async fn surviving_chars(ctx: &Arc<ScanContext>, base: &Arc<ScanRequest>, reflected: Vec<ParamKey>) -> Vec<(ParamKey, char)> {
    let probes: Vec<(Arc<ParamCandidate>, char, Encoding)> = reflected
        .into_iter()
        .map(Arc::new)
        .flat_map(|cand| {
            SPECIAL_CHARS
                .iter()
                .flat_map(move |&c| Encoding::ALL.into_iter().map(move |e| (c, e)))
                .map(move |(c, e)| (cand.clone(), c, e))
        })
        .collect();
    if probes.is_empty() {
        return Vec::new();
    }

    let pool = WorkerPool::new(ctx.options.worker_concurrency());
    let (ctx, base) = (ctx.clone(), base.clone());
    pool.run(probes, move |(cand, c, enc): (Arc<ParamCandidate>, char, Encoding)| {
        let (ctx, base) = (ctx.clone(), base.clone());
        async move {
            let value = format!("{}{}", CHAR_PROBE, c);
            let req = make_param_request(&base, &cand, &value, enc, Action::Append).ok()?;
            let ex = ctx.send(&req, &value).await.ok()?;
            ex.reflected.then(|| ((*cand).clone(), c))
        }
    })
    .await
    .into_iter()
    .flatten()
    .collect()
}
