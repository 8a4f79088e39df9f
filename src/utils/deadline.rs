use std::time::{Duration, Instant};

use thiserror::Error;

/// Raised by long running diffs once their time budget is used up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Diff timed out!")]
pub struct TimedOut;

/// A cooperative time budget. Diff loops call [`Deadline::check`] between
/// units of work; there is no other way to interrupt them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    /// A deadline that never passes.
    #[must_use]
    pub fn none() -> Self { Self { end: None } }

    /// Starts the clock now. `None` means no limit.
    #[must_use]
    pub fn after(budget: Option<Duration>) -> Self {
        Self {
            end: budget.map(|budget| Instant::now() + budget),
        }
    }

    pub fn check(&self) -> Result<(), TimedOut> {
        match self.end {
            Some(end) if Instant::now() >= end => Err(TimedOut),
            _ => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self { Self::none() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline() {
        assert_eq!(Deadline::none().check(), Ok(()));
        assert_eq!(Deadline::after(None).check(), Ok(()));
        assert_eq!(Deadline::after(Some(Duration::ZERO)).check(), Err(TimedOut));
        assert_eq!(
            Deadline::after(Some(Duration::from_secs(3600))).check(),
            Ok(())
        );
    }
}
