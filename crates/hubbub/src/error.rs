use std::io;

use thiserror::Error;

pub use crate::pool::PoolExhausted;

/// Conditions the process cannot serve past. Everything per-connection
/// (peer resets, oversize lines, protocol violations) is handled by
/// closing the offending socket and never surfaces here.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("failed to set up listener: {0}")]
    Listen(#[source] io::Error),
    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),
    #[error(transparent)]
    PoolExhausted(#[from] PoolExhausted),
}
