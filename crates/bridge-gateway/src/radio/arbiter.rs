//! Exclusive radio arbiter.
//!
//! Single async mutex guarding the radio device. It is the only lock in the
//! radio subsystem, so acquisition order cannot deadlock. Acquisition
//! always carries a timeout; a holder that cannot get the radio reports
//! busy instead of blocking forever.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use super::{RadioDriver, RadioError};

/// Default acquisition timeout.
#[allow(dead_code)]
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutual exclusion around the radio driver.
///
/// Clones share the same radio. Only the guard returned by
/// [`RadioArbiter::acquire`] can touch the driver, so transmit and
/// receive-state changes never overlap.
pub struct RadioArbiter<R: RadioDriver> {
    radio: std::sync::Arc<Mutex<R>>,
}

impl<R: RadioDriver> Clone for RadioArbiter<R> {
    fn clone(&self) -> Self {
        Self { radio: std::sync::Arc::clone(&self.radio) }
    }
}

impl<R: RadioDriver> RadioArbiter<R> {
    /// Wrap a driver in the arbiter.
    #[must_use]
    pub fn new(radio: R) -> Self {
        Self { radio: std::sync::Arc::new(Mutex::new(radio)) }
    }

    /// Acquire exclusive access, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// [`RadioError::Busy`] if another holder kept the radio past the
    /// timeout.
    pub async fn acquire(&self, timeout: Duration) -> Result<MutexGuard<'_, R>, RadioError> {
        tokio::time::timeout(timeout, self.radio.lock())
            .await
            .map_err(|_| RadioError::Busy(timeout))
    }
}
