//! Opaque identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// Random v4 UUIDs in simple (dash-free) form; 122 bits of entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids for tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}
