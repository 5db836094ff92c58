//! Channel-fed simulated radio device.
//!
//! Stands in for the physical LoRa driver behind the [`RadioDriver`] trait:
//! frames are injected through a [`SimulatedRadioHandle`] and transmissions
//! are captured for inspection. The state machine is enforced exactly as
//! the hardware contract demands, so pipeline code exercised against the
//! simulator cannot cheat on standby/receive transitions.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use super::{RadioDriver, RadioError, RadioState, ReceivedFrame};

struct SimInner {
    state: RadioState,
    pending: VecDeque<ReceivedFrame>,
    transmitted: Vec<Vec<u8>>,
    fail_transmits: bool,
    busy_line_stuck: bool,
}

/// Simulated radio device.
pub struct SimulatedRadio {
    inner: Arc<Mutex<SimInner>>,
}

/// Test/driver-side handle to the simulator: inject receptions, inspect
/// transmissions, inject faults.
#[derive(Clone)]
pub struct SimulatedRadioHandle {
    inner: Arc<Mutex<SimInner>>,
}

fn lock(inner: &Arc<Mutex<SimInner>>) -> std::sync::MutexGuard<'_, SimInner> {
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SimulatedRadio {
    /// Create a simulator in `Init` state plus its handle.
    #[must_use]
    pub fn new() -> (Self, SimulatedRadioHandle) {
        let inner = Arc::new(Mutex::new(SimInner {
            state: RadioState::Init,
            pending: VecDeque::new(),
            transmitted: Vec::new(),
            fail_transmits: false,
            busy_line_stuck: false,
        }));
        (Self { inner: Arc::clone(&inner) }, SimulatedRadioHandle { inner })
    }
}

impl RadioDriver for SimulatedRadio {
    fn state(&self) -> RadioState {
        lock(&self.inner).state
    }

    fn data_ready(&mut self) -> bool {
        let inner = lock(&self.inner);
        inner.state == RadioState::Rx && !inner.pending.is_empty()
    }

    fn read_frame(&mut self) -> Result<Option<ReceivedFrame>, RadioError> {
        let mut inner = lock(&self.inner);
        if inner.state != RadioState::Rx {
            return Err(RadioError::InvalidState {
                state: inner.state,
                operation: "read_frame",
            });
        }
        Ok(inner.pending.pop_front())
    }

    fn standby(&mut self) -> Result<(), RadioError> {
        lock(&self.inner).state = RadioState::Standby;
        Ok(())
    }

    fn start_receive(&mut self) -> Result<(), RadioError> {
        let mut inner = lock(&self.inner);
        match inner.state {
            RadioState::Standby | RadioState::Init | RadioState::Rx => {
                inner.state = RadioState::Rx;
                Ok(())
            }
            RadioState::TxBusy => Err(RadioError::InvalidState {
                state: inner.state,
                operation: "start_receive",
            }),
        }
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        let mut inner = lock(&self.inner);
        if inner.state != RadioState::Standby {
            return Err(RadioError::InvalidState { state: inner.state, operation: "transmit" });
        }
        inner.state = RadioState::TxBusy;
        if inner.fail_transmits {
            // Hardware reports TX failure and falls back to standby.
            inner.state = RadioState::Standby;
            return Err(RadioError::Tx("injected transmit failure".to_string()));
        }
        inner.transmitted.push(bytes.to_vec());
        inner.state = RadioState::Standby;
        Ok(())
    }

    fn wait_busy_clear(&mut self, timeout: Duration) -> Result<(), RadioError> {
        let inner = lock(&self.inner);
        if inner.busy_line_stuck {
            return Err(RadioError::BusyLine(timeout));
        }
        Ok(())
    }
}

impl SimulatedRadioHandle {
    /// Queue a frame for the receive path.
    pub fn inject(&self, bytes: Vec<u8>, rssi_dbm: i16, snr_db: i8) {
        lock(&self.inner).pending.push_back(ReceivedFrame { bytes, rssi_dbm, snr_db });
    }

    /// All frames transmitted so far, oldest first.
    #[must_use]
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        lock(&self.inner).transmitted.clone()
    }

    /// Make every subsequent transmit fail.
    pub fn fail_transmits(&self, fail: bool) {
        lock(&self.inner).fail_transmits = fail;
    }

    /// Make the BUSY line appear stuck.
    pub fn stick_busy_line(&self, stuck: bool) {
        lock(&self.inner).busy_line_stuck = stuck;
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> RadioState {
        lock(&self.inner).state
    }

    /// Number of frames still waiting to be read.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inner).pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_enforced() {
        let (mut radio, handle) = SimulatedRadio::new();
        assert_eq!(radio.state(), RadioState::Init);

        radio.standby().unwrap();
        radio.start_receive().unwrap();
        assert_eq!(handle.state(), RadioState::Rx);

        // Transmit is illegal from RX.
        assert!(matches!(
            radio.transmit(&[1, 2, 3]),
            Err(RadioError::InvalidState { state: RadioState::Rx, .. })
        ));

        radio.standby().unwrap();
        radio.transmit(&[1, 2, 3]).unwrap();
        assert_eq!(radio.state(), RadioState::Standby);
        assert_eq!(handle.transmitted(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn injected_frames_flow_through_rx() {
        let (mut radio, handle) = SimulatedRadio::new();
        radio.standby().unwrap();
        radio.start_receive().unwrap();

        assert!(!radio.data_ready());
        handle.inject(vec![0xAA], -90, 5);
        assert!(radio.data_ready());

        let frame = radio.read_frame().unwrap().unwrap();
        assert_eq!(frame.bytes, vec![0xAA]);
        assert_eq!(frame.rssi_dbm, -90);
        assert_eq!(frame.snr_db, 5);
        assert!(radio.read_frame().unwrap().is_none());
    }

    #[test]
    fn transmit_failure_returns_to_standby() {
        let (mut radio, handle) = SimulatedRadio::new();
        radio.standby().unwrap();
        handle.fail_transmits(true);

        assert!(matches!(radio.transmit(&[1]), Err(RadioError::Tx(_))));
        assert_eq!(radio.state(), RadioState::Standby);
        assert!(handle.transmitted().is_empty());
    }
}
