//! Progress notifications emitted to an external observer.
//!
//! Events are informational only; they never affect control flow.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Layer,
    Config,
    Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    /// 1-based position within `total` items of this kind.
    pub current: usize,
    pub total: usize,
    /// File name or `name:tag` the event refers to.
    pub item: String,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;
