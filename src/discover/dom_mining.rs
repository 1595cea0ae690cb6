use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static FIELD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input, textarea, select, form, a").expect("static selector"));
static SCRIPT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("script").expect("static selector"));

static JS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"[?&]([a-zA-Z_][a-zA-Z0-9_]*)\s*="#).expect("static regex"),
        Regex::new(r#"searchParams\.get\s*\(\s*['"]([a-zA-Z_][a-zA-Z0-9_\-]*)['"]"#).expect("static regex"),
        Regex::new(r#"params\.(?:set|append|get)\s*\(\s*['"]([a-zA-Z_][a-zA-Z0-9_\-]*)['"]"#).expect("static regex"),
    ]
});

/// Parameter names mined from a page: `name` of form fields, the query keys
/// of `action`/`href` targets, and names referenced by inline scripts.
pub fn mine_dom(body: &str) -> BTreeSet<String> {
    let doc = Html::parse_document(body);
    let mut names = BTreeSet::new();

    for el in doc.select(&FIELD_SELECTOR) {
        let v = el.value();
        if let Some(name) = v.attr("name") {
            push_name(&mut names, name);
        }
        for link in [v.attr("action"), v.attr("href")].into_iter().flatten() {
            names.extend(query_keys(link));
        }
    }

    for script in doc.select(&SCRIPT_SELECTOR) {
        let code: String = script.text().collect();
        names.extend(mine_script(&code));
    }

    names
}

/// Names referenced by query-building code.
pub fn mine_script(code: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for re in JS_PATTERNS.iter() {
        for cap in re.captures_iter(code) {
            if let Some(m) = cap.get(1) {
                push_name(&mut names, m.as_str());
            }
        }
    }
    names
}

fn query_keys(link: &str) -> Vec<String> {
    let Some((_, rest)) = link.split_once('?') else { return Vec::new() };
    let query = rest.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split('=').next())
        .map(str::trim)
        .filter(|k| !k.is_empty() && k.len() < 64)
        .map(str::to_string)
        .collect()
}

fn push_name(names: &mut BTreeSet<String>, name: &str) {
    let name = name.trim();
    if !name.is_empty() && name.len() < 64 {
        names.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_and_links() {
        let html = r#"<form action="/s?lang=en"><input name="q"><textarea name="msg"></textarea>
            <select name="sort"></select></form><a href="/p?id=1&amp;ref=x#top">p</a>"#;
        let names = mine_dom(html);
        for n in ["lang", "q", "msg", "sort", "id", "ref"] {
            assert!(names.contains(n), "missing {}", n);
        }
    }

    #[test]
    fn inline_script_names() {
        let js = r#"const u = new URLSearchParams(location.search); u.searchParams.get('token');
            params.set("view", 1); fetch('/api?page=' + p);"#;
        let names = mine_script(js);
        assert!(names.contains("token"));
        assert!(names.contains("view"));
        assert!(names.contains("page"));
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(mine_dom("").is_empty());
    }
}
