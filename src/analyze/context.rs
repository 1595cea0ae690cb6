//! Heuristic landing-context classifier.
//!
//! A single linear pass over the response that tracks a `(Mode, QuotePosition)`
//! state machine across lines. It is not an HTML tokenizer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    InHtml,
    InJs,
    InAttr,
    InTagScript,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::InHtml => "inHTML",
            Mode::InJs => "inJS",
            Mode::InAttr => "inATTR",
            Mode::InTagScript => "inTagScript",
        }
    }
}

/// Comment, Pre and Textarea are part of the vocabulary but the transition
/// table never produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuotePosition {
    None,
    Double,
    Single,
    Backtick,
    Comment,
    Pre,
    Textarea,
}

impl QuotePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotePosition::None => "none",
            QuotePosition::Double => "double",
            QuotePosition::Single => "single",
            QuotePosition::Backtick => "backtick",
            QuotePosition::Comment => "comment",
            QuotePosition::Pre => "pre",
            QuotePosition::Textarea => "textarea",
        }
    }

    /// The quote character that opens this position, if any.
    pub fn quote_char(&self) -> Option<char> {
        match self {
            QuotePosition::Double => Some('"'),
            QuotePosition::Single => Some('\''),
            QuotePosition::Backtick => Some('`'),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextLabel {
    pub mode: Mode,
    pub quote: QuotePosition,
}

impl ContextLabel {
    pub const fn new(mode: Mode, quote: QuotePosition) -> Self {
        Self { mode, quote }
    }
}

impl fmt::Display for ContextLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.mode.as_str(), self.quote.as_str())
    }
}

impl Serialize for ContextLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Multiset of labels with occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContextSummary(BTreeMap<ContextLabel, usize>);

impl ContextSummary {
    pub fn from_labels(labels: &[ContextLabel]) -> Self {
        let mut map = BTreeMap::new();
        for label in labels {
            *map.entry(*label).or_insert(0) += 1;
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &ContextLabel) -> bool {
        self.0.contains_key(label)
    }

    pub fn count(&self, label: &ContextLabel) -> usize {
        self.0.get(label).copied().unwrap_or(0)
    }

    pub fn labels(&self) -> impl Iterator<Item = &ContextLabel> {
        self.0.keys()
    }
}

impl fmt::Display for ContextSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(l, c)| format!("{}({})", l, c)).collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// Seam for swapping in a stricter tokenizer later.
pub trait Classifier: Send + Sync {
    fn classify(&self, body: &str, probe: &str) -> Vec<ContextLabel>;
}

// Declaration order is the overwrite order when two events share a byte
// offset: a later variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    TagOpen,
    TagClose,
    ScriptOpen,
    ScriptClose,
    Double,
    Single,
    Backtick,
    Probe,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LineClassifier;

impl Classifier for LineClassifier {
    fn classify(&self, body: &str, probe: &str) -> Vec<ContextLabel> {
        let mut out = Vec::new();
        if probe.is_empty() {
            return out;
        }

        let mut mode = Mode::InHtml;
        let mut quote = QuotePosition::None;

        for line in body.split('\n') {
            let mut events: BTreeMap<usize, Event> = BTreeMap::new();
            let markers: [(&str, Event); 8] = [
                ("<", Event::TagOpen),
                (">", Event::TagClose),
                ("<script", Event::ScriptOpen),
                ("</script", Event::ScriptClose),
                ("\"", Event::Double),
                ("'", Event::Single),
                ("`", Event::Backtick),
                (probe, Event::Probe),
            ];
            for (needle, event) in markers {
                for idx in find_all(line, needle) {
                    events.insert(idx, event);
                }
            }

            for event in events.into_values() {
                match event {
                    Event::ScriptOpen => {
                        if mode == Mode::InHtml
                            || (mode == Mode::InAttr && quote == QuotePosition::None)
                        {
                            mode = Mode::InTagScript;
                        }
                    }
                    Event::ScriptClose => {
                        if mode != Mode::InAttr && mode != Mode::InTagScript {
                            mode = Mode::InHtml;
                        }
                    }
                    Event::TagOpen => {
                        if mode == Mode::InHtml {
                            mode = Mode::InAttr;
                        }
                    }
                    Event::TagClose => {
                        if mode == Mode::InTagScript {
                            mode = Mode::InJs;
                        } else if mode == Mode::InAttr || quote == QuotePosition::None {
                            mode = Mode::InHtml;
                        }
                    }
                    Event::Double => {
                        quote = toggle(mode, quote, QuotePosition::Double, &[Mode::InJs, Mode::InAttr])
                    }
                    Event::Single => {
                        quote = toggle(mode, quote, QuotePosition::Single, &[Mode::InJs, Mode::InAttr])
                    }
                    Event::Backtick => {
                        quote = toggle(mode, quote, QuotePosition::Backtick, &[Mode::InJs])
                    }
                    Event::Probe => out.push(ContextLabel::new(mode, quote)),
                }
            }
        }
        out
    }
}

fn toggle(mode: Mode, quote: QuotePosition, target: QuotePosition, modes: &[Mode]) -> QuotePosition {
    if !modes.contains(&mode) {
        return quote;
    }
    if quote == QuotePosition::None {
        target
    } else if quote == target {
        QuotePosition::None
    } else {
        quote
    }
}

/// Every byte offset where `needle` starts, overlapping matches included.
pub(crate) fn find_all(haystack: &str, needle: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let step = match needle.chars().next() {
        Some(c) => c.len_utf8(),
        None => return out,
    };
    let mut start = 0;
    while let Some(i) = haystack[start..].find(needle) {
        out.push(start + i);
        start += i + step;
        if start >= haystack.len() {
            break;
        }
    }
    out
}

/// Classify with the default line classifier.
pub fn classify(body: &str, probe: &str) -> Vec<ContextLabel> {
    LineClassifier.classify(body, probe)
}
