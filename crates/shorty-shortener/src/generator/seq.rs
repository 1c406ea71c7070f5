use crate::generator::Generator;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces sequential ids like "wh000000", "wh000001", etc.
///
/// Ids are unique within a single instance. Useful where ids must be
/// predictable, such as tests.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting from `offset` instead of zero.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> String {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}{:06}", self.prefix, count)
    }
}
