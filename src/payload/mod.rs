pub mod encoding;
pub mod remote;
pub mod xss;

pub use encoding::Encoding;

/// Characters probed for survival during discovery.
pub const SPECIAL_CHARS: &[char] = &[
    '>', '<', '"', '\'', '`', ';', '|', '(', ')', '{', '}', '[', ']', ':', '.', ',', '+', '-', '=', '$', '\\',
];

/// True when the payload uses any character the target is known to mangle.
pub fn has_bad_char(payload: &str, bad_chars: &[char]) -> bool {
    payload.chars().any(|c| bad_chars.contains(&c))
}

/// Reads a payload list from disk. Blank lines are dropped.
pub fn load_payload_file(path: &str) -> anyhow::Result<Vec<String>> {
    use anyhow::Context;
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read payload file {}", path))?;
    Ok(raw
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}
