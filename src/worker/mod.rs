//! Dispatch: keyword matching, task lifecycle, analysis and replies

pub mod analyzer;
pub mod matcher;
pub mod queue;

pub use analyzer::{Analyzer, DispatchOutcome, IgnoreReason};
pub use matcher::match_keyword;
pub use queue::{DispatchQueue, Dispatcher, spawn_dispatcher};
