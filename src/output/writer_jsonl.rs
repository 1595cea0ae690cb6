use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::scan::{Finding, ScanResult};

/// Appends one JSON object per finding.
pub fn write_findings_jsonl(path: &Path, findings: &[Finding]) -> anyhow::Result<()> {
    let mut f = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for it in findings {
        let line = serde_json::to_string(it)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

/// One line per finding, `[V][GET][inHTML-URL] url param=q payload=...`.
pub fn summary_lines(result: &ScanResult) -> Vec<String> {
    result.pocs.iter().map(|f| f.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::Location;
    use crate::scan::{FindingKind, Severity};

    fn finding(param: &str) -> Finding {
        Finding {
            kind: FindingKind::Verified,
            inject_type: "inHTML-URL".into(),
            method: "GET".into(),
            data: format!("http://t/?{}=x", param),
            param: param.into(),
            location: Location::Query,
            payload: "<x class=dalfox>".into(),
            evidence: String::new(),
            severity: Severity::High,
            cwe: "CWE-79".into(),
            message: String::new(),
        }
    }

    #[test]
    fn appends_lines() {
        let path = std::env::temp_dir().join(format!("xss_hunter_jsonl_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);
        write_findings_jsonl(&path, &[finding("q")]).unwrap();
        write_findings_jsonl(&path, &[finding("id")]).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "V");
        assert_eq!(lines[1]["param"], "id");
        assert_eq!(lines[1]["location"], "QUERY");
        let _ = std::fs::remove_file(&path);
    }
}
