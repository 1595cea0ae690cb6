use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Class or id planted by every verifiable payload.
pub const DOM_MARKER: &str = "dalfox";

static MARKER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".dalfox, #dalfox").expect("static selector"));

const VIEW_LEAD: usize = 20;
const VIEW_WIDTH: usize = 80;

pub fn reflection(body: &str, probe: &str) -> bool {
    !probe.is_empty() && body.contains(probe)
}

/// First 1-based line number holding the probe.
pub fn reflection_line(body: &str, probe: &str) -> Option<usize> {
    if probe.is_empty() {
        return None;
    }
    body.split('\n').position(|l| l.contains(probe)).map(|i| i + 1)
}

/// True when the document contains an element carrying the marker class or id.
/// Unparseable markup simply yields no match.
pub fn verify_dom(body: &str) -> bool {
    let doc = Html::parse_document(body);
    doc.select(&MARKER_SELECTOR).next().is_some()
}

/// Bounded excerpt around every line holding `pattern`, as `"<n> line:  <excerpt>"`.
pub fn code_view(body: &str, pattern: &str) -> String {
    if body.is_empty() || pattern.is_empty() {
        return String::new();
    }
    let mut lines = Vec::new();
    for (n, line) in body.split('\n').enumerate() {
        let Some(idx) = line.find(pattern) else { continue };
        let start = floor_boundary(line, idx.saturating_sub(VIEW_LEAD));
        let end = floor_boundary(line, (start + VIEW_WIDTH).min(line.len()));
        lines.push(format!("{} line:  {}", n + 1, &line[start..end]));
    }
    lines.join("\n    ")
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_line_is_one_based() {
        let body = "<html>\n<p>x</p>\n<p>Dalfox</p>\n<p>Dalfox</p>";
        assert_eq!(reflection_line(body, "Dalfox"), Some(3));
        assert_eq!(reflection_line(body, "nope"), None);
        assert!(reflection(body, "Dalfox"));
        assert!(!reflection(body, ""));
    }

    #[test]
    fn dom_marker_by_class_or_id() {
        assert!(verify_dom("<div><svg onload=alert(1) class=dalfox></svg></div>"));
        assert!(verify_dom("<p id=dalfox>x</p>"));
        assert!(!verify_dom("<p class=other>dalfox</p>"));
    }

    #[test]
    fn malformed_markup_is_not_fatal() {
        assert!(!verify_dom("<<<>>><p <div =\"'>"));
    }

    #[test]
    fn code_view_excerpt() {
        let long = format!("{}Dalfox{}", "a".repeat(30), "b".repeat(100));
        let body = format!("first\n{}", long);
        let view = code_view(&body, "Dalfox");
        assert!(view.starts_with("2 line:  "));
        let excerpt = view.trim_start_matches("2 line:  ");
        assert_eq!(excerpt.len(), 80);
        assert!(excerpt.starts_with(&"a".repeat(20)));
    }

    #[test]
    fn code_view_multiple_lines() {
        let view = code_view("Dalfox\nx\nDalfox", "Dalfox");
        assert_eq!(view, "1 line:  Dalfox\n    3 line:  Dalfox");
    }
}
