//! Optional deadlines for polling loops.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// Point in time after which a polling loop gives up.
///
/// The default never expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn never() -> Self {
        Self(None)
    }

    /// Expire `timeout` from now.
    ///
    /// A timeout too large to represent as an instant never expires.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    /// Expire at a fixed instant.
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_expired(&self) -> bool {
        self.0.map_or(false, |at| Instant::now() >= at)
    }

    /// Fail with [`Error::Timeout`] naming `what` once expired.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_expired() {
            Err(Error::Timeout(what.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_expires() {
        assert!(!Deadline::never().is_expired());
        assert!(Deadline::default().check("anything").is_ok());
    }

    #[test]
    fn test_elapsed_deadline() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        assert!(matches!(deadline.check("peer"), Err(Error::Timeout(w)) if w == "peer"));
    }

    #[test]
    fn test_future_deadline() {
        assert!(!Deadline::after(Duration::from_secs(60)).is_expired());
    }

    #[test]
    fn test_unrepresentable_timeout_never_expires() {
        let deadline = Deadline::after(Duration::from_secs(u64::MAX));
        assert_eq!(deadline, Deadline::never());
        assert!(deadline.check("peer").is_ok());
    }
}
