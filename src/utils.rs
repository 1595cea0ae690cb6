use std::path::Path;

use sha2::{Digest, Sha256};

/// Lines of `source` when it names a readable file, otherwise `source` split on commas.
pub fn read_lines_or_literal(source: &str) -> Vec<String> {
    let raw = if Path::new(source).is_file() {
        match std::fs::read_to_string(source) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = source, "failed to read list: {}", e);
                return Vec::new();
            }
        }
    } else {
        source.replace(',', "\n")
    };
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Hex sha256 of the seed and the current time.
pub fn make_scan_id(seed: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(nanos.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_list() {
        assert_eq!(read_lines_or_literal("q, search,,id"), vec!["q", "search", "id"]);
    }

    #[test]
    fn scan_id_is_hex_sha256() {
        let id = make_scan_id("http://t/");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
