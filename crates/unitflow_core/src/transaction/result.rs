//! Outcome of a unit of work run.

use super::unit_of_work::UnitOfWork;
use crate::error::{CoreError, CoreResult};

/// Counters collected while a unit of work ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Records visited by the scheduler.
    pub visited: usize,
    /// Records that reached `Processed`.
    pub processed: usize,
    /// Command leaves executed.
    pub commands: usize,
}

/// Result of [`UnitOfWork::run`].
#[derive(Debug)]
#[must_use]
pub struct RunResult {
    report: RunReport,
    error: Option<CoreError>,
}

impl RunResult {
    pub(crate) fn success(report: RunReport) -> Self {
        Self { report, error: None }
    }

    pub(crate) fn failure(report: RunReport, error: CoreError) -> Self {
        Self {
            report,
            error: Some(error),
        }
    }

    /// Returns true if every change was committed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the error that aborted the run.
    #[must_use]
    pub fn error(&self) -> Option<&CoreError> {
        self.error.as_ref()
    }

    /// Returns the run counters.
    #[must_use]
    pub fn report(&self) -> RunReport {
        self.report
    }

    /// Converts into a plain result.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the run.
    pub fn into_result(self) -> CoreResult<RunReport> {
        match self.error {
            None => Ok(self.report),
            Some(error) => Err(error),
        }
    }

    /// Runs the same unit of work again after a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if this result is a success: there is nothing to
    /// retry.
    pub fn retry(self, uow: &mut UnitOfWork<'_>) -> CoreResult<RunResult> {
        if self.is_success() {
            return Err(CoreError::invalid_operation(
                "cannot retry a unit of work that succeeded",
            ));
        }
        Ok(uow.run())
    }
}
