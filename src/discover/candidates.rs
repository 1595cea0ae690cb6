use std::collections::BTreeSet;

use serde_json::Value;
use url::form_urlencoded;

use crate::config::ScanOptions;
use crate::discover::{Location, ParamCandidate};
use crate::probe::request::{is_json_body, ScanRequest};

/// Parameter names that commonly reflect into markup.
pub fn common_params() -> Vec<&'static str> {
    vec![
        // Search & query
        "q", "s", "search", "query", "keyword", "keywords", "terms", "lang",
        "page", "page_id", "year", "month", "view", "type", "cat", "categoryid", "list_type",
        // User data
        "name", "email", "emailto", "username", "p", "password",
        // Callbacks & redirects
        "callback", "jsonp", "url", "rurl", "go", "goto", "return", "host", "domain", "window",
        // Tokens
        "api_key", "api", "token", "csrf_token", "unsubscribe_token", "key",
        // Resources
        "id", "item", "immagine", "l", "html", "image_url", "img_url", "data", "dir", "feed",
        "file", "file_name", "file_url", "show", "begindate", "enddate",
    ]
}

/// Leaf paths of a JSON document: `user.profile.name`, `tags[0]`.
pub fn flatten_json(v: &Value) -> Vec<String> {
    let mut found = Vec::new();
    walk_json(v, String::new(), &mut found);
    found
}

fn walk_json(v: &Value, path: String, found: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, val) in map {
                let next = if path.is_empty() { k.clone() } else { format!("{}.{}", path, k) };
                walk_json(val, next, found);
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                walk_json(item, format!("{}[{}]", path, i), found);
            }
        }
        _ => {
            if !path.is_empty() {
                found.push(path);
            }
        }
    }
}

/// Candidates already present in the request: query, body, configured headers
/// and cookies, plus fragment pairs when there is neither query nor body.
pub fn base_candidates(base: &ScanRequest, options: &ScanOptions) -> Vec<ParamCandidate> {
    let mut out = BTreeSet::new();

    for (k, _) in base.url.query_pairs() {
        if !k.is_empty() {
            out.insert(ParamCandidate::new(k.into_owned(), Location::Query));
        }
    }

    if let Some(body) = base.body.as_deref() {
        if is_json_body(body) {
            if let Ok(doc) = serde_json::from_str::<Value>(body) {
                for path in flatten_json(&doc) {
                    out.insert(ParamCandidate::new(path, Location::BodyJson));
                }
            }
        } else {
            for (k, _) in form_urlencoded::parse(body.as_bytes()) {
                if !k.is_empty() {
                    out.insert(ParamCandidate::new(k.into_owned(), Location::BodyForm));
                }
            }
        }
    }

    if base.url.query().map(str::is_empty).unwrap_or(true) && base.body.is_none() {
        if let Some(fragment) = base.url.fragment() {
            for (k, _) in form_urlencoded::parse(fragment.as_bytes()) {
                if !k.is_empty() {
                    out.insert(ParamCandidate::new(k.into_owned(), Location::Fragment));
                }
            }
        }
    }

    for (name, _) in options.header_pairs() {
        out.insert(ParamCandidate::new(name, Location::Header));
    }
    for (name, _) in options.cookie_pairs() {
        out.insert(ParamCandidate::new(name, Location::Cookie));
    }

    out.into_iter().collect()
}

/// Mined names become query candidates, and form candidates too when the body is form-encoded.
pub fn mined_candidates<I, S>(names: I, base: &ScanRequest) -> Vec<ParamCandidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let form_body = base.body.as_deref().map(|b| !is_json_body(b)).unwrap_or(false);
    let mut out = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        out.push(ParamCandidate::new(name, Location::Query));
        if form_body {
            out.push(ParamCandidate::new(name, Location::BodyForm));
        }
    }
    out
}

/// Applies the allow/deny lists.
pub fn inspected(candidates: impl IntoIterator<Item = ParamCandidate>, options: &ScanOptions) -> Vec<ParamCandidate> {
    candidates.into_iter().filter(|c| options.is_inspected(&c.name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::request::generate_request;

    #[test]
    fn json_leaf_paths() {
        let v: Value = serde_json::from_str(r#"{"user":{"profile":{"name":"a"}},"tags":["x","y"]}"#).unwrap();
        let mut paths = flatten_json(&v);
        paths.sort();
        assert_eq!(paths, vec!["tags[0]", "tags[1]", "user.profile.name"]);
    }

    #[test]
    fn query_and_body_are_distinct_candidates() {
        let base = generate_request("http://t/?q=1", Some("q=2&x=3"), &ScanOptions::default()).unwrap();
        let c = base_candidates(&base, &ScanOptions::default());
        assert!(c.contains(&ParamCandidate::new("q", Location::Query)));
        assert!(c.contains(&ParamCandidate::new("q", Location::BodyForm)));
        assert!(c.contains(&ParamCandidate::new("x", Location::BodyForm)));
    }

    #[test]
    fn fragment_only_without_query() {
        let opts = ScanOptions::default();
        let frag = generate_request("http://t/#a=1", None, &opts).unwrap();
        assert_eq!(base_candidates(&frag, &opts), vec![ParamCandidate::new("a", Location::Fragment)]);
        let both = generate_request("http://t/?b=1#a=1", None, &opts).unwrap();
        assert_eq!(base_candidates(&both, &opts), vec![ParamCandidate::new("b", Location::Query)]);
    }

    #[test]
    fn headers_and_cookies() {
        let opts = ScanOptions {
            headers: vec!["X-Forwarded-Host: a".into()],
            cookie: Some("sid=1".into()),
            ..Default::default()
        };
        let base = generate_request("http://t/", None, &opts).unwrap();
        let c = base_candidates(&base, &opts);
        assert!(c.contains(&ParamCandidate::new("X-Forwarded-Host", Location::Header)));
        assert!(c.contains(&ParamCandidate::new("sid", Location::Cookie)));
    }

    #[test]
    fn allow_list_restricts_every_location() {
        let opts = ScanOptions { uniq_param: vec!["q".into()], ..Default::default() };
        let c = vec![
            ParamCandidate::new("q", Location::Query),
            ParamCandidate::new("q", Location::Cookie),
            ParamCandidate::new("id", Location::Query),
        ];
        let kept = inspected(c, &opts);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.name == "q"));
    }

    #[test]
    fn mined_names_follow_body_kind() {
        let opts = ScanOptions::default();
        let form = generate_request("http://t/", Some("a=1"), &opts).unwrap();
        assert_eq!(mined_candidates(["q"], &form).len(), 2);
        let json = generate_request("http://t/", Some(r#"{"a":1}"#), &opts).unwrap();
        assert_eq!(mined_candidates(["q"], &json).len(), 1);
    }
}
