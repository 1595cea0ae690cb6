pub mod writer_jsonl;

pub use writer_jsonl::{summary_lines, write_findings_jsonl};
