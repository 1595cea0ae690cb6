use std::fmt;

use serde::Serialize;

/// Transform applied to a value before it is placed in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    None,
    Url,
    DoubleUrl,
    Html,
}

impl Encoding {
    pub const ALL: [Encoding; 4] = [Encoding::None, Encoding::Url, Encoding::DoubleUrl, Encoding::Html];

    pub fn apply(&self, value: &str) -> String {
        match self {
            Encoding::None => value.to_string(),
            Encoding::Url => percent_all(value),
            Encoding::DoubleUrl => percent_all(&percent_all(value)),
            Encoding::Html => html_escape::encode_safe(value).into_owned(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::None => "none",
            Encoding::Url => "url",
            Encoding::DoubleUrl => "double-url",
            Encoding::Html => "html",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// urlencoding leaves `-_.~` alone, which would make `-` and `.` look like they
// survive url encoding; encode every non-alphanumeric byte instead.
fn percent_all(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
