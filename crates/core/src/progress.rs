//! Progress reporting for long export passes

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Counting,
    Collecting,
    Exporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Counting => "counting layers",
            Self::Collecting => "collecting layers",
            Self::Exporting => "exporting layers",
        })
    }
}

/// Receives progress updates at the same points where cancellation is polled.
pub trait Progress {
    fn begin(&mut self, _phase: Phase, _total: usize) {}
    /// `done` is the number of steps completed in the current phase.
    fn advance(&mut self, _done: usize) {}
    fn finish(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Writes progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress {
    phase: Option<Phase>,
    total: usize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for LogProgress {
    fn begin(&mut self, phase: Phase, total: usize) {
        log::info!("{phase}: {total} steps");
        self.phase = Some(phase);
        self.total = total;
    }

    fn advance(&mut self, done: usize) {
        if let Some(phase) = self.phase {
            log::debug!("{phase}: {done}/{}", self.total);
        }
    }

    fn finish(&mut self) {
        if let Some(phase) = self.phase.take() {
            log::info!("{phase}: done");
        }
    }
}
