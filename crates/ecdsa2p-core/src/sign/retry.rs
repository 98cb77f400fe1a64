//! Nonce retry state for a signing session

use crate::{Error, Result};
use tracing::warn;

/// Tracks nonce attempts within one signing session.
///
/// Every attempt runs a fresh [`NonceAgreement`](super::NonceAgreement);
/// nothing carries over from a failed one except this counter.
#[derive(Debug, Clone)]
pub struct NonceRetry {
    attempt: u32,
    max_attempts: Option<u32>,
}

impl NonceRetry {
    /// `None` allows unlimited attempts
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// Index of the current attempt, starting at 0
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Account for a failed attempt.
    ///
    /// Returns the next attempt index when `error` is retryable and the
    /// budget allows another try; otherwise the error to surface.
    pub fn advance(&mut self, error: Error) -> Result<u32> {
        if !error.is_retryable() {
            return Err(error);
        }

        let made = self.attempt.saturating_add(1);
        if self.max_attempts.map_or(false, |max| made >= max) {
            warn!(attempts = made, %error, "Nonce retry budget exhausted");
            return Err(Error::RetriesExhausted { attempts: made });
        }
        let next = self
            .attempt
            .checked_add(1)
            .ok_or(Error::RetriesExhausted { attempts: made })?;

        warn!(attempt = self.attempt, next, %error, "Retrying with a fresh nonce");
        self.attempt = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartyId;

    #[test]
    fn test_retry_counts_attempts() {
        let mut retry = NonceRetry::new(Some(3));
        assert_eq!(retry.attempt(), 0);
        assert_eq!(retry.advance(Error::InvalidNonce("zero".into())).unwrap(), 1);
        assert_eq!(retry.advance(Error::SignatureShareInvalid("zero".into())).unwrap(), 2);
        assert!(matches!(
            retry.advance(Error::InvalidNonce("zero".into())),
            Err(Error::RetriesExhausted { attempts: 3 })
        ));
    }

    #[test]
    fn test_fatal_errors_pass_through() {
        let mut retry = NonceRetry::new(None);
        let err = retry
            .advance(Error::CommitmentMismatch { party: PartyId::Party1 })
            .unwrap_err();
        assert!(matches!(err, Error::CommitmentMismatch { .. }));
        assert_eq!(retry.attempt(), 0);
    }

    #[test]
    fn test_single_attempt_budget() {
        let mut retry = NonceRetry::new(Some(1));
        assert!(matches!(
            retry.advance(Error::InvalidNonce("zero".into())),
            Err(Error::RetriesExhausted { attempts: 1 })
        ));
    }

    #[test]
    fn test_unbounded() {
        let mut retry = NonceRetry::new(None);
        for expected in 1..=100 {
            assert_eq!(retry.advance(Error::InvalidNonce("zero".into())).unwrap(), expected);
        }
    }
}
