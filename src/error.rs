//! Error types shared by the engine and the filters.
//!
//! Configuration and mode errors are raised before any work is dispatched.
//! Faults raised inside a parallel pass are collected per band and reported
//! once, after every worker has been joined.

use std::fmt;

use thiserror::Error;

use crate::engine::ChannelMode;

/// Result alias used throughout the crate.
pub type FilterResult<T> = Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum FilterError {
    /// Filter invoked on a buffer of the wrong channel mode.
    #[error("{filter} requires a {expected} buffer, got {actual}")]
    InvalidMode {
        filter: &'static str,
        expected: ChannelMode,
        actual: ChannelMode,
    },

    /// Nonsensical configuration, rejected when the filter is built.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Raw sample data does not match the declared shape.
    #[error("{width}x{height} {mode} buffer needs {expected} samples, got {actual}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        mode: ChannelMode,
        expected: usize,
        actual: usize,
    },

    /// One or more band workers faulted during a fork-join episode.
    #[error("{0}")]
    Workers(FaultReport),

    /// The per-episode worker pool could not be started.
    #[error("failed to start band workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl FilterError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        FilterError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// What went wrong inside a worker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FaultKind {
    #[error("non-finite result {0}")]
    NonFinite(f32),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// A single fault raised by the worker owning `band`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerFault {
    pub band: usize,
    /// `(row, col, channel)` of the sample being computed, if known.
    pub location: Option<(usize, usize, usize)>,
    pub kind: FaultKind,
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some((row, col, channel)) => write!(
                f,
                "band {} at ({}, {}) channel {}: {}",
                self.band, row, col, channel, self.kind
            ),
            None => write!(f, "band {}: {}", self.band, self.kind),
        }
    }
}

/// Every fault collected from one fork-join episode, in band order.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultReport {
    faults: Vec<WorkerFault>,
    workers: usize,
}

impl FaultReport {
    /// Returns `None` when there is nothing to report.
    pub(crate) fn collect(faults: Vec<WorkerFault>, workers: usize) -> Option<Self> {
        if faults.is_empty() {
            None
        } else {
            Some(FaultReport { faults, workers })
        }
    }

    /// The fault from the lowest-numbered band.
    pub fn first(&self) -> &WorkerFault {
        &self.faults[0]
    }

    pub fn faults(&self) -> &[WorkerFault] {
        &self.faults
    }

    /// Number of workers dispatched in the episode.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} band worker(s) faulted; first: {}",
            self.faults.len(),
            self.workers,
            self.first()
        )
    }
}
