//! Progress reporting
//!
//! Runners notify an observer once per completed test. Observers are called
//! from several workers at once and must synchronize internally.

use std::sync::{Mutex, PoisonError};

/// Receives one notification per completed test
pub trait ProgressObserver: Send + Sync {
    fn increment(&self);
}

/// Counts completed tests against a known total
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: usize,
    completed: Mutex<usize>,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: Mutex::new(0),
        }
    }

    pub fn completed(&self) -> usize {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Completion percentage, 0.0 for an empty total
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed() as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total
    }
}

impl ProgressObserver for ProgressCounter {
    fn increment(&self) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        *completed += 1;
    }
}
