use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;

use crate::analyze::context::ContextSummary;
use crate::discover::{Location, ParamCandidate};
use crate::probe::request::{make_param_request, Action, ScanRequest};
use crate::probe::transport::{is_scannable_content_type, RawResponse};
use crate::payload::Encoding;
use crate::scan::ScanContext;

pub const PATH_PROBE: &str = "dalfoxpathtest";

/// Response headers that shape payload choice and reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Policy {
    pub content_type: Option<String>,
    pub csp: Option<String>,
    pub x_frame_options: Option<String>,
    pub hsts: Option<String>,
    pub acao: Option<String>,
}

impl Policy {
    pub fn from_response(resp: &RawResponse) -> Self {
        let h = |name: &str| resp.header(name).map(str::to_string);
        Self {
            content_type: h("Content-Type"),
            csp: h("Content-Security-Policy"),
            x_frame_options: h("X-Frame-Options"),
            hsts: h("Strict-Transport-Security"),
            acao: h("Access-Control-Allow-Origin"),
        }
    }

    /// Markup-rendering content type. A missing header is not scannable.
    pub fn is_scannable(&self) -> bool {
        self.content_type.as_deref().map(is_scannable_content_type).unwrap_or(false)
    }

    /// Forced HTML policy used when discovery is skipped.
    pub fn assume_html() -> Self {
        Self { content_type: Some("text/html".to_string()), ..Default::default() }
    }
}

/// Path segment index to the contexts the path probe landed in.
pub type PathReflection = BTreeMap<usize, ContextSummary>;

/// Policy from the target's initial response, then every path segment
/// replaced in turn by the path probe.
pub async fn static_analysis(ctx: &ScanContext, target: &ScanRequest, initial: &RawResponse) -> (Policy, PathReflection) {
    let policy = Policy::from_response(initial);

    let segments = target.url.path_segments().map(|s| s.filter(|p| !p.is_empty()).count()).unwrap_or(0);
    let indices: Vec<usize> = if segments == 0 { vec![0] } else { (0..segments).collect() };

    let probes = indices.into_iter().map(|idx| async move {
        let cand = ParamCandidate::new(idx.to_string(), Location::Path);
        let req = make_param_request(target, &cand, PATH_PROBE, Encoding::None, Action::Replace).ok()?;
        let ex = ctx.send(&req, PATH_PROBE).await.ok()?;
        if !ex.reflected {
            return None;
        }
        let labels = ctx.classifier.classify(ex.body(), PATH_PROBE);
        let summary = ContextSummary::from_labels(&labels);
        (!summary.is_empty()).then_some((idx, summary))
    });

    let path_reflection: PathReflection = join_all(probes).await.into_iter().flatten().collect();
    if !path_reflection.is_empty() {
        tracing::info!(url = %target.url, segments = path_reflection.len(), "path reflection found");
    }
    (policy, path_reflection)
}
