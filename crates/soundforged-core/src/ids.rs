//! Job identifiers.
//!
//! Ids are plain sequence numbers handed out by the scheduler in enqueue
//! order. They are never reused within one scheduler instance, so sorting by
//! id reproduces insertion order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Stable, monotonic identifier for one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Wrap a raw sequence number.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the inner sequence number.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(Self)
    }
}

/// Hands out strictly increasing [`JobId`]s starting at 1.
#[derive(Debug)]
pub struct JobIdAllocator {
    next: u64,
}

impl JobIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id.
    pub fn allocate(&mut self) -> JobId {
        let id = JobId(self.next);
        self.next += 1;
        id
    }
}

impl Default for JobIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
