//! Work-list synthesis: which payloads go to which parameter, under which encoding.

use std::collections::BTreeSet;
use std::fmt;

use crate::analyze::context::{ContextLabel, Mode, QuotePosition};
use crate::analyze::static_analysis::{PathReflection, Policy};
use crate::config::ScanOptions;
use crate::discover::{Location, ParamCandidate, ParamKey, ParamResult};
use crate::payload::{has_bad_char, xss, Encoding};
use crate::probe::request::{make_header_request, make_param_request, Action, ScanRequest};

/// What a payload was aimed at. Drives the consistency check and early exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFamily {
    /// Fitted to one classified landing context
    Context(ContextLabel),
    /// Context-agnostic (common, custom, remote) payloads, treated as HTML
    Generic(Location),
    /// Callback payloads; always tried, never short-circuited
    Blind,
}

impl PayloadFamily {
    pub fn always_test(&self) -> bool {
        matches!(self, PayloadFamily::Blind)
    }

    pub fn mode(&self) -> Option<Mode> {
        match self {
            PayloadFamily::Context(label) => Some(label.mode),
            PayloadFamily::Generic(_) => Some(Mode::InHtml),
            PayloadFamily::Blind => None,
        }
    }

    /// Did the payload land where it was aimed? HTML-family payloads are
    /// accepted anywhere they reflect.
    pub fn is_consistent(&self, labels: &[ContextLabel]) -> bool {
        match self {
            PayloadFamily::Context(label) => label.mode == Mode::InHtml || labels.contains(label),
            PayloadFamily::Generic(_) => true,
            PayloadFamily::Blind => false,
        }
    }
}

impl fmt::Display for PayloadFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFamily::Context(label) => write!(f, "{}", label),
            PayloadFamily::Generic(loc) => {
                let suffix = match loc {
                    Location::Query => "URL",
                    Location::BodyForm => "FORM",
                    Location::BodyJson => "JSON",
                    Location::Header => "HEADER",
                    Location::Cookie => "COOKIE",
                    Location::Path => "PATH",
                    Location::Fragment => "FRAGMENT",
                };
                write!(f, "inHTML-{}", suffix)
            }
            PayloadFamily::Blind => f.write_str("toBlind"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub request: ScanRequest,
    pub param: ParamCandidate,
    pub family: PayloadFamily,
    pub encoding: Encoding,
    pub raw_payload: String,
}

impl WorkItem {
    /// Key into `VulnStatus`.
    pub fn status_key(&self) -> &str {
        &self.param.name
    }
}

/// A URL to navigate in the headless browser.
#[derive(Debug, Clone)]
pub struct DomItem {
    pub url: String,
    pub param: ParamCandidate,
    pub payload: String,
}

#[derive(Debug, Default)]
pub struct WorkList {
    pub items: Vec<WorkItem>,
    pub dom: Vec<DomItem>,
}

impl WorkList {
    pub fn len(&self) -> usize {
        self.items.len() + self.dom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload lists loaded before synthesis.
#[derive(Debug, Default, Clone)]
pub struct PayloadSources {
    pub custom: Vec<String>,
    pub custom_blind: Vec<String>,
    pub remote: Vec<String>,
}

/// Payload templates for one landing context.
pub fn payloads_for(label: ContextLabel, surviving: &BTreeSet<char>) -> Vec<String> {
    match label.mode {
        Mode::InHtml => xss::html(label.quote),
        Mode::InAttr => xss::attr(label.quote),
        Mode::InJs => match label.quote {
            QuotePosition::None => {
                let mut out = xss::in_js(QuotePosition::None);
                out.extend(xss::in_js_break_script());
                out
            }
            q => match q.quote_char() {
                Some(c) if surviving.contains(&c) => xss::in_js(q),
                _ => xss::in_js_break_script(),
            },
        },
        Mode::InTagScript => Vec::new(),
    }
}

struct Synth<'a> {
    base: &'a ScanRequest,
    options: &'a ScanOptions,
    out: WorkList,
}

impl<'a> Synth<'a> {
    fn expand(&self, template: &str) -> Vec<String> {
        xss::with_alert(template, &self.options.custom_alert_value, &self.options.custom_alert_type)
    }

    fn push(&mut self, param: &ParamCandidate, family: PayloadFamily, payload: &str, encodings: &[Encoding], action: Action) {
        for &enc in encodings {
            match make_param_request(self.base, param, payload, enc, action) {
                Ok(request) => self.out.items.push(WorkItem {
                    request,
                    param: param.clone(),
                    family,
                    encoding: enc,
                    raw_payload: payload.to_string(),
                }),
                Err(e) => tracing::debug!(param = %param.name, "cannot build request: {:#}", e),
            }
        }
    }

    /// Templates expanded and, for reflected parameters, stripped of bad characters.
    fn fitted(&self, templates: &[String], param: Option<&ParamResult>) -> Vec<String> {
        let bad = param.filter(|p| p.reflected).map(|p| p.bad_chars()).unwrap_or_default();
        templates
            .iter()
            .flat_map(|t| self.expand(t))
            .filter(|p| !has_bad_char(p, &bad))
            .collect()
    }
}

/// Builds the full work list. Pure: every payload source is loaded beforehand.
pub fn synthesize(
    base: &ScanRequest,
    options: &ScanOptions,
    policy: &Policy,
    path_reflection: &PathReflection,
    params: &[ParamResult],
    base_set: &BTreeSet<ParamKey>,
    sources: &PayloadSources,
) -> WorkList {
    let mut s = Synth { base, options, out: WorkList::default() };
    let gate = policy.is_scannable() || options.skip_discovery;

    for (idx, summary) in path_reflection {
        let cand = ParamCandidate::new(idx.to_string(), Location::Path);
        for &label in summary.labels() {
            for p in s.fitted(&payloads_for(label, &BTreeSet::new()), None) {
                s.push(&cand, PayloadFamily::Context(label), &p, &[Encoding::None], Action::Replace);
            }
        }
    }

    if gate && !sources.custom.is_empty() {
        for param in params {
            let cand = param.candidate();
            for p in s.fitted(&sources.custom, Some(param)) {
                s.push(&cand, PayloadFamily::Generic(cand.location), &p, &Encoding::ALL, Action::Append);
            }
        }
    }

    if gate && !options.only_custom_payload {
        let common = xss::common();
        for param in params {
            let cand = param.candidate();
            let in_base = base_set.contains(&cand) && cand.location.is_query_or_body();
            if !in_base && !param.reflected {
                continue;
            }
            for p in s.fitted(&common, Some(param)) {
                s.push(&cand, PayloadFamily::Generic(cand.location), &p, &Encoding::ALL, Action::Append);
            }
        }

        for param in params.iter().filter(|p| p.reflected) {
            let cand = param.candidate();
            for &label in param.context_summary.labels() {
                let templates = payloads_for(label, &param.surviving_chars);
                for p in s.fitted(&templates, Some(param)) {
                    s.push(&cand, PayloadFamily::Context(label), &p, &Encoding::ALL, Action::Append);
                }
            }
        }
    }

    if options.use_headless {
        let dom: Vec<String> = xss::dom().iter().flat_map(|t| s.expand(t)).collect();
        for param in params {
            let cand = param.candidate();
            let navigable = matches!(cand.location, Location::Query | Location::Fragment);
            if !navigable || !base_set.contains(&cand) || !param.surviving_chars.is_empty() {
                continue;
            }
            for p in &dom {
                if let Ok(req) = make_param_request(base, &cand, p, Encoding::None, Action::Replace) {
                    s.out.dom.push(DomItem { url: req.url.to_string(), param: cand.clone(), payload: p.clone() });
                }
            }
        }
    }

    if let Some(blind_url) = options.blind_url.as_deref().filter(|u| !u.is_empty()) {
        let referer = ParamCandidate::new("Referer", Location::Header);
        let blind: Vec<String> = xss::blind().iter().map(|t| xss::with_callback(t, blind_url)).collect();
        for p in &blind {
            s.out.items.push(WorkItem {
                request: make_header_request(base, "Referer", p),
                param: referer.clone(),
                family: PayloadFamily::Blind,
                encoding: Encoding::None,
                raw_payload: p.clone(),
            });
        }
        let custom_blind: Vec<String> =
            sources.custom_blind.iter().map(|t| xss::with_callback(t, blind_url)).collect();
        for param in params {
            let cand = param.candidate();
            for p in &blind {
                s.push(&cand, PayloadFamily::Blind, p, &Encoding::ALL, Action::Append);
            }
            for p in &custom_blind {
                s.push(&cand, PayloadFamily::Blind, p, &[Encoding::None], Action::Append);
            }
        }
    }

    if !sources.remote.is_empty() {
        for param in params {
            let cand = param.candidate();
            for p in s.fitted(&sources.remote, Some(param)) {
                s.push(&cand, PayloadFamily::Generic(cand.location), &p, &Encoding::ALL, Action::Append);
            }
        }
    }

    s.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::context::ContextSummary;
    use crate::payload::SPECIAL_CHARS;
    use crate::probe::request::generate_request;

    fn reflected(name: &str, labels: &[ContextLabel], surviving: &[char]) -> ParamResult {
        ParamResult {
            reflected: true,
            context_summary: ContextSummary::from_labels(labels),
            surviving_chars: surviving.iter().copied().collect(),
            ..ParamResult::unreflected(&ParamCandidate::new(name, Location::Query))
        }
    }

    fn html_policy() -> Policy {
        Policy::assume_html()
    }

    #[test]
    fn bad_chars_never_reach_a_reflected_param() {
        let base = generate_request("http://t/?q=1", None, &ScanOptions::default()).unwrap();
        let p = reflected("q", &[ContextLabel::new(Mode::InHtml, QuotePosition::None)], &['<', '>', '=', '/']);
        let bad = p.bad_chars();
        let set: BTreeSet<_> = [p.key()].into_iter().collect();
        let work = synthesize(
            &base,
            &ScanOptions::default(),
            &html_policy(),
            &PathReflection::new(),
            &[p],
            &set,
            &PayloadSources::default(),
        );
        assert!(!work.items.is_empty());
        assert!(work.items.iter().all(|w| !has_bad_char(&w.raw_payload, &bad)));
    }

    #[test]
    fn js_quote_survival_picks_family() {
        let dq = ContextLabel::new(Mode::InJs, QuotePosition::Double);
        let with_quote = payloads_for(dq, &['"'].into_iter().collect());
        assert!(with_quote.iter().any(|p| p.starts_with('"')));
        let without = payloads_for(dq, &BTreeSet::new());
        assert!(without.iter().all(|p| p.starts_with("</")));
        assert!(payloads_for(ContextLabel::new(Mode::InTagScript, QuotePosition::None), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn non_html_content_type_keeps_only_blind() {
        let base = generate_request("http://t/?q=1", None, &ScanOptions::default()).unwrap();
        let p = reflected("q", &[ContextLabel::new(Mode::InHtml, QuotePosition::None)], SPECIAL_CHARS);
        let set: BTreeSet<_> = [p.key()].into_iter().collect();
        let opts = ScanOptions { blind_url: Some("cb.example".into()), ..Default::default() };
        let json = Policy { content_type: Some("application/json".into()), ..Default::default() };
        let work = synthesize(&base, &opts, &json, &PathReflection::new(), &[p], &set, &PayloadSources::default());
        assert!(!work.items.is_empty());
        assert!(work.items.iter().all(|w| w.family == PayloadFamily::Blind));
        assert!(work.items.iter().all(|w| w.raw_payload.contains("//cb.example")));
        assert!(work.items.iter().any(|w| w.param.name == "Referer"));
    }

    #[test]
    fn headless_urls_for_unprobed_base_params() {
        let opts = ScanOptions { use_headless: true, ..Default::default() };
        let base = generate_request("http://t/?q=1", None, &opts).unwrap();
        let p = ParamResult::unreflected(&ParamCandidate::new("q", Location::Query));
        let set: BTreeSet<_> = [p.key()].into_iter().collect();
        let work = synthesize(&base, &opts, &html_policy(), &PathReflection::new(), &[p], &set, &PayloadSources::default());
        assert_eq!(work.dom.len(), xss::dom().len());
        assert!(work.dom.iter().all(|d| d.url.starts_with("http://t/?q=")));
    }

    #[test]
    fn only_custom_uses_custom_list() {
        let opts = ScanOptions { only_custom_payload: true, ..Default::default() };
        let base = generate_request("http://t/?q=1", None, &opts).unwrap();
        let p = reflected("q", &[ContextLabel::new(Mode::InHtml, QuotePosition::None)], SPECIAL_CHARS);
        let set: BTreeSet<_> = [p.key()].into_iter().collect();
        let sources = PayloadSources { custom: vec!["<b>DALFOX_ALERT_VALUE</b>".into()], ..Default::default() };
        let work = synthesize(&base, &opts, &html_policy(), &PathReflection::new(), &[p], &set, &sources);
        assert_eq!(work.items.len(), Encoding::ALL.len());
        assert!(work.items.iter().all(|w| w.raw_payload == "<b>1</b>"));
    }

    #[test]
    fn family_labels() {
        assert_eq!(PayloadFamily::Generic(Location::BodyForm).to_string(), "inHTML-FORM");
        assert_eq!(PayloadFamily::Blind.to_string(), "toBlind");
        let attr = PayloadFamily::Context(ContextLabel::new(Mode::InAttr, QuotePosition::Double));
        assert!(attr.is_consistent(&[ContextLabel::new(Mode::InAttr, QuotePosition::Double)]));
        assert!(!attr.is_consistent(&[ContextLabel::new(Mode::InHtml, QuotePosition::None)]));
        assert!(!PayloadFamily::Blind.is_consistent(&[]));
    }
}
