pub mod candidates;
pub mod dom_mining;
pub mod engine;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::analyze::context::ContextSummary;

pub use engine::{discover, DiscoveryOutcome};

/// Where a parameter lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Query,
    BodyForm,
    BodyJson,
    Header,
    Cookie,
    Path,
    Fragment,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Query => "QUERY",
            Location::BodyForm => "BODY_FORM",
            Location::BodyJson => "BODY_JSON",
            Location::Header => "HEADER",
            Location::Cookie => "COOKIE",
            Location::Path => "PATH",
            Location::Fragment => "FRAGMENT",
        }
    }

    /// Locations that carry ordinary key/value parameters of the request line or body.
    pub fn is_query_or_body(&self) -> bool {
        matches!(self, Location::Query | Location::BodyForm | Location::BodyJson)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParamCandidate {
    pub name: String,
    pub location: Location,
}

impl ParamCandidate {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self { name: name.into(), location }
    }
}

/// Same name under different locations stays distinct.
pub type ParamKey = ParamCandidate;

#[derive(Debug, Clone, Serialize)]
pub struct ParamResult {
    pub name: String,
    pub location: Location,
    pub reflected: bool,
    pub context_summary: ContextSummary,
    pub surviving_chars: BTreeSet<char>,
    pub evidence_snippet: Option<String>,
}

impl ParamResult {
    pub fn unreflected(candidate: &ParamCandidate) -> Self {
        Self {
            name: candidate.name.clone(),
            location: candidate.location,
            reflected: false,
            context_summary: ContextSummary::default(),
            surviving_chars: BTreeSet::new(),
            evidence_snippet: None,
        }
    }

    pub fn key(&self) -> ParamKey {
        ParamCandidate::new(self.name.clone(), self.location)
    }

    pub fn candidate(&self) -> ParamCandidate {
        self.key()
    }

    /// Special characters that did not survive the round trip.
    pub fn bad_chars(&self) -> Vec<char> {
        crate::payload::SPECIAL_CHARS
            .iter()
            .copied()
            .filter(|c| !self.surviving_chars.contains(c))
            .collect()
    }
}
