use ahash::AHashMap;
use parking_lot::Mutex;

/// Per-parameter confirmation flags shared by every dispatch worker.
///
/// Contract: a worker checks `should_skip` before sending an item; once a
/// parameter is confirmed, items that are not always-test are skipped. The
/// lock makes a confirmation visible to every item scheduled after it.
#[derive(Debug, Default)]
pub struct VulnStatus {
    inner: Mutex<AHashMap<String, bool>>,
}

impl VulnStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, param: &str) {
        self.inner.lock().entry(param.to_string()).or_insert(false);
    }

    pub fn is_confirmed(&self, param: &str) -> bool {
        self.inner.lock().get(param).copied().unwrap_or(false)
    }

    /// Marks `param` confirmed. Returns true only for the first confirmation.
    pub fn confirm(&self, param: &str) -> bool {
        let mut map = self.inner.lock();
        let slot = map.entry(param.to_string()).or_insert(false);
        let first = !*slot;
        *slot = true;
        first
    }

    pub fn should_skip(&self, param: &str, always_test: bool) -> bool {
        !always_test && self.is_confirmed(param)
    }

    pub fn confirmed(&self) -> Vec<String> {
        let mut out: Vec<String> = self.inner.lock().iter().filter(|(_, v)| **v).map(|(k, _)| k.clone()).collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_once() {
        let s = VulnStatus::new();
        s.register("q");
        assert!(!s.is_confirmed("q"));
        assert!(s.confirm("q"));
        assert!(!s.confirm("q"));
        assert_eq!(s.confirmed(), vec!["q".to_string()]);
    }

    #[test]
    fn always_test_items_are_never_skipped() {
        let s = VulnStatus::new();
        s.confirm("q");
        assert!(s.should_skip("q", false));
        assert!(!s.should_skip("q", true));
        assert!(!s.should_skip("other", false));
    }
}
