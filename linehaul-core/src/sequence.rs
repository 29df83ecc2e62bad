use std::sync::atomic::{AtomicU64, Ordering};

/// Prefixed sequential ID source: "S1", "S2", ... for orders, "B1", ... for
/// billing batches. The increment is atomic, so concurrent writers can never
/// mint the same ID.
#[derive(Debug)]
pub struct SequenceGenerator {
    prefix: &'static str,
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    /// Resume issuing above `highest`, e.g. after loading pre-existing rows.
    pub fn seed(&self, highest: u64) {
        self.next.fetch_max(highest + 1, Ordering::SeqCst);
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}{}", self.prefix, n)
    }

    /// Numeric suffix of a previously issued ID, if it carries this prefix.
    pub fn numeric_suffix(&self, id: &str) -> Option<u64> {
        id.strip_prefix(self.prefix)?.parse().ok()
    }
}
