use anyhow::{anyhow, Context};
use reqwest::Method;
use serde_json::Value;
use url::{form_urlencoded, Url};

use crate::config::ScanOptions;
use crate::discover::{Location, ParamCandidate};
use crate::payload::Encoding;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// How the injected value combines with the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Append,
    Replace,
}

/// One HTTP exchange to perform. Immutable once built.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ScanRequest {
    /// Bare GET with no scan headers, used for auxiliary fetches.
    pub fn get(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            method: Method::GET,
            url: Url::parse(url).with_context(|| format!("invalid url {}", url))?,
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: String) {
        if let Some(slot) = self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            slot.1 = value;
        } else {
            self.headers.push((name.to_string(), value));
        }
    }

    pub fn with_header(&self, name: &str, value: &str) -> Self {
        let mut out = self.clone();
        out.set_header(name, value.to_string());
        out
    }
}

pub fn is_json_body(body: &str) -> bool {
    let t = body.trim_start();
    (t.starts_with('{') || t.starts_with('[')) && serde_json::from_str::<Value>(body).is_ok()
}

/// Builds the base request for a target: method, default headers, configured
/// headers, cookie and body.
pub fn generate_request(url: &str, body: Option<&str>, options: &ScanOptions) -> anyhow::Result<ScanRequest> {
    let parsed = Url::parse(url).with_context(|| format!("invalid target url {}", url))?;
    if parsed.host_str().is_none() {
        return Err(anyhow!("target url has no host: {}", url));
    }
    let body = body.filter(|b| !b.is_empty()).map(str::to_string);

    let method = match options.method.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid method {}", m))?,
        None if body.is_some() => Method::POST,
        None => Method::GET,
    };

    let mut req = ScanRequest { method, url: parsed, headers: Vec::new(), body };
    req.set_header("Accept", DEFAULT_ACCEPT.to_string());
    req.set_header(
        "User-Agent",
        options.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
    );
    if let Some(b) = req.body.as_deref() {
        let ct = if is_json_body(b) { "application/json" } else { "application/x-www-form-urlencoded" };
        req.set_header("Content-Type", ct.to_string());
    }
    for (name, value) in options.header_pairs() {
        req.set_header(&name, value);
    }
    if let Some(cookie) = options.cookie.as_deref().filter(|c| !c.is_empty()) {
        req.set_header("Cookie", cookie.to_string());
    }
    Ok(req)
}

fn combine(existing: Option<&str>, value: &str, action: Action) -> String {
    match (action, existing) {
        (Action::Append, Some(old)) => format!("{}{}", old, value),
        _ => value.to_string(),
    }
}

fn upsert_pair(pairs: &mut Vec<(String, String)>, name: &str, value: &str, action: Action) {
    if let Some(slot) = pairs.iter_mut().find(|(k, _)| k == name) {
        slot.1 = combine(Some(&slot.1), value, action);
    } else {
        pairs.push((name.to_string(), value.to_string()));
    }
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(raw.as_bytes()).into_owned().collect()
}

fn serialize_pairs(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish()
}

/// Clones `base` with `payload` injected as `candidate`.
pub fn make_param_request(
    base: &ScanRequest,
    candidate: &ParamCandidate,
    payload: &str,
    encoding: Encoding,
    action: Action,
) -> anyhow::Result<ScanRequest> {
    let value = encoding.apply(payload);
    let mut req = base.clone();
    let name = candidate.name.as_str();

    match candidate.location {
        Location::Query => {
            let mut pairs: Vec<(String, String)> = req.url.query_pairs().into_owned().collect();
            upsert_pair(&mut pairs, name, &value, action);
            req.url.query_pairs_mut().clear().extend_pairs(&pairs);
        }
        Location::BodyForm => {
            let mut pairs = parse_pairs(req.body.as_deref().unwrap_or(""));
            upsert_pair(&mut pairs, name, &value, action);
            req.body = Some(serialize_pairs(&pairs));
            if req.method == Method::GET {
                req.method = Method::POST;
            }
        }
        Location::BodyJson => {
            let raw = req.body.as_deref().ok_or_else(|| anyhow!("json parameter without body"))?;
            let mut doc: Value = serde_json::from_str(raw).context("request body is not json")?;
            set_json_path(&mut doc, name, &value, action)?;
            req.body = Some(serde_json::to_string(&doc)?);
        }
        Location::Header => {
            let injected = combine(base.header(name), &value, action);
            req.set_header(name, injected);
        }
        Location::Cookie => {
            let mut pairs: Vec<(String, String)> = base
                .header("Cookie")
                .unwrap_or("")
                .split(';')
                .filter_map(|c| c.split_once('=').map(|(k, v)| (k.trim().to_string(), v.trim().to_string())))
                .collect();
            upsert_pair(&mut pairs, name, &value, action);
            let cookie = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("; ");
            req.set_header("Cookie", cookie);
        }
        Location::Path => {
            let idx: usize = name.parse().with_context(|| format!("path index {}", name))?;
            let mut segments: Vec<String> = req
                .url
                .path_segments()
                .map(|s| s.filter(|p| !p.is_empty()).map(decode_segment).collect())
                .unwrap_or_default();
            if idx < segments.len() {
                segments[idx] = combine(Some(&segments[idx]), &value, action);
            } else {
                segments.push(value.clone());
            }
            req.url
                .path_segments_mut()
                .map_err(|_| anyhow!("url cannot carry a path"))?
                .clear()
                .extend(segments.iter());
        }
        Location::Fragment => {
            let mut pairs = parse_pairs(req.url.fragment().unwrap_or(""));
            upsert_pair(&mut pairs, name, &value, action);
            let fragment = serialize_pairs(&pairs);
            req.url.set_fragment(Some(&fragment));
        }
    }
    Ok(req)
}

fn decode_segment(s: &str) -> String {
    urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string())
}

/// Sets a header on a copy of `base`. Used for the blind Referer probe.
pub fn make_header_request(base: &ScanRequest, name: &str, value: &str) -> ScanRequest {
    base.with_header(name, value)
}

#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Key(String),
    Index(usize),
}

/// `user.profile.name`, `tags[0]`, `[1].id`
fn parse_json_path(path: &str) -> anyhow::Result<Vec<PathStep>> {
    let mut steps = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            steps.push(PathStep::Key(key.to_string()));
        }
        while let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped.find(']').ok_or_else(|| anyhow!("unclosed index in {}", path))?;
            let idx = stripped[..close].parse().with_context(|| format!("bad index in {}", path))?;
            steps.push(PathStep::Index(idx));
            rest = &stripped[close + 1..];
        }
    }
    if steps.is_empty() {
        return Err(anyhow!("empty json path"));
    }
    Ok(steps)
}

fn set_json_path(doc: &mut Value, path: &str, value: &str, action: Action) -> anyhow::Result<()> {
    let mut cur = doc;
    for step in parse_json_path(path)? {
        cur = match step {
            PathStep::Key(k) => cur
                .as_object_mut()
                .and_then(|m| m.get_mut(&k))
                .ok_or_else(|| anyhow!("json path {} not found", path))?,
            PathStep::Index(i) => cur
                .as_array_mut()
                .and_then(|a| a.get_mut(i))
                .ok_or_else(|| anyhow!("json path {} not found", path))?,
        };
    }
    let existing = match &*cur {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    };
    *cur = Value::String(combine(existing.as_deref(), value, action));
    Ok(())
}
