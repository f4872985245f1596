//! In-memory signal handler table
//!
//! Mirrors the OS contract without touching process state, so registries can
//! be exercised deterministically and signals "delivered" on demand.

use crate::errors::{SignalError, SignalResult};
use crate::table::{Disposition, Handler, SignalTable};
use libc::c_int;
use nix::errno::Errno;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Highest signal number the virtual table accepts
pub const MAX_SIGNAL: c_int = 64;

#[derive(Debug, Default)]
struct VirtualSlot {
    disposition: Disposition,
    installs: usize,
}

/// A handler table living entirely in memory
#[derive(Debug, Default)]
pub struct VirtualSignalTable {
    slots: Mutex<HashMap<c_int, VirtualSlot>>,
}

impl VirtualSignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<c_int, VirtualSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(signal: c_int) -> SignalResult<()> {
        let catchable = (1..=MAX_SIGNAL).contains(&signal)
            && signal != libc::SIGKILL
            && signal != libc::SIGSTOP;
        if catchable {
            Ok(())
        } else {
            Err(SignalError::installation(signal, Errno::EINVAL))
        }
    }

    /// Set the disposition for `signal` as an outside party would.
    ///
    /// Does not count as an install.
    pub fn set_disposition(&self, signal: c_int, disposition: Disposition) -> SignalResult<()> {
        Self::check(signal)?;
        self.lock().entry(signal).or_default().disposition = disposition;
        Ok(())
    }

    /// Deliver `signal` to whatever handler is installed.
    ///
    /// Returns `true` if a handler ran. Default and ignore dispositions are
    /// not simulated.
    pub fn deliver(&self, signal: c_int) -> bool {
        // Release the lock first; a handler may register or deliver again.
        let handler = self
            .lock()
            .get(&signal)
            .and_then(|slot| slot.disposition.as_handler().cloned());

        match handler {
            Some(handler) => {
                handler(signal, None);
                true
            }
            None => false,
        }
    }

    /// How many times `install` succeeded for `signal`
    pub fn install_count(&self, signal: c_int) -> usize {
        self.lock().get(&signal).map_or(0, |slot| slot.installs)
    }
}

impl SignalTable for VirtualSignalTable {
    fn disposition(&self, signal: c_int) -> SignalResult<Disposition> {
        Self::check(signal)?;
        Ok(self
            .lock()
            .get(&signal)
            .map(|slot| slot.disposition.clone())
            .unwrap_or_default())
    }

    fn install(&self, signal: c_int, handler: Handler) -> SignalResult<()> {
        Self::check(signal)?;
        let mut slots = self.lock();
        let slot = slots.entry(signal).or_default();
        slot.disposition = Disposition::Handler(handler);
        slot.installs += 1;
        Ok(())
    }
}
