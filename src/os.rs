//! Process-wide handler table backed by `sigaction(2)`
//!
//! Rust closures cannot be handed to the kernel directly, so every signal
//! handled through [`OsSignalTable`] points at one `extern "C"` trampoline.
//! The trampoline looks up the Rust handler for the delivered signal in a
//! lock-free slot and calls it.

use crate::errors::{SignalError, SignalResult};
use crate::table::{Disposition, Handler, SignalInfo, SignalTable};
use arc_swap::ArcSwapOption;
use libc::{c_int, c_void, siginfo_t};
use crate::signals::signal_name;
use nix::errno::Errno;
use std::sync::{Arc, OnceLock};
use std::{mem, ptr};
use tracing::debug;

/// Signal numbers `1..SLOT_COUNT` can be handled
const SLOT_COUNT: usize = 65;

struct Slot {
    handler: Handler,
}

static SLOTS: OnceLock<Box<[ArcSwapOption<Slot>]>> = OnceLock::new();

fn slots() -> &'static [ArcSwapOption<Slot>] {
    SLOTS.get_or_init(|| (0..SLOT_COUNT).map(|_| ArcSwapOption::empty()).collect())
}

fn slot_index(signal: c_int) -> Option<usize> {
    usize::try_from(signal)
        .ok()
        .filter(|index| (1..SLOT_COUNT).contains(index))
}

extern "C" fn trampoline(signal: c_int, info: *mut siginfo_t, context: *mut c_void) {
    // Slots are initialised before the trampoline is ever installed.
    let Some(slot) = SLOTS
        .get()
        .zip(slot_index(signal))
        .map(|(slots, index)| &slots[index])
    else {
        return;
    };

    if let Some(entry) = &*slot.load() {
        let info = (!info.is_null()).then(|| unsafe { SignalInfo::from_raw(info, context) });
        (entry.handler)(signal, info.as_ref());
    }
}

fn trampoline_address() -> usize {
    trampoline as extern "C" fn(c_int, *mut siginfo_t, *mut c_void) as usize
}

/// Query the kernel without changing the current action
fn current_action(signal: c_int) -> Result<libc::sigaction, Errno> {
    let mut old: libc::sigaction = unsafe { mem::zeroed() };
    let rc = unsafe { libc::sigaction(signal, ptr::null(), &mut old) };
    if rc != 0 {
        return Err(Errno::last());
    }
    Ok(old)
}

/// Point the kernel at `address` for `signal` with an empty mask
fn set_action(signal: c_int, address: libc::sighandler_t, flags: c_int) -> Result<(), Errno> {
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = address;
    action.sa_flags = flags;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    let rc = unsafe { libc::sigaction(signal, &action, ptr::null_mut()) };
    if rc != 0 {
        return Err(Errno::last());
    }
    Ok(())
}

/// Wrap a handler function installed by someone else
fn foreign_handler(action: &libc::sigaction) -> Handler {
    let address = action.sa_sigaction;
    if action.sa_flags & libc::SA_SIGINFO != 0 {
        let function: extern "C" fn(c_int, *mut siginfo_t, *mut c_void) =
            unsafe { mem::transmute(address) };
        Arc::new(move |signal: c_int, info: Option<&SignalInfo>| match info {
            Some(info) => function(signal, info.as_raw(), info.context()),
            None => {
                // Manual dispatch has no kernel info; C handlers still expect
                // a readable siginfo_t. The context stays null.
                let mut synthetic: siginfo_t = unsafe { mem::zeroed() };
                synthetic.si_signo = signal;
                function(signal, &mut synthetic, ptr::null_mut())
            }
        })
    } else {
        let function: extern "C" fn(c_int) = unsafe { mem::transmute(address) };
        Arc::new(move |signal: c_int, _: Option<&SignalInfo>| function(signal))
    }
}

/// The real, process-wide signal handler table.
///
/// All values of this type share the same underlying state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignalTable;

impl SignalTable for OsSignalTable {
    fn disposition(&self, signal: c_int) -> SignalResult<Disposition> {
        let action =
            current_action(signal).map_err(|errno| SignalError::installation(signal, errno))?;

        let disposition = match action.sa_sigaction {
            libc::SIG_DFL => Disposition::Default,
            libc::SIG_IGN => Disposition::Ignore,
            address if address == trampoline_address() => slot_index(signal)
                .and_then(|index| slots()[index].load_full())
                .map_or(Disposition::Default, |entry| {
                    Disposition::Handler(entry.handler.clone())
                }),
            _ => Disposition::Handler(foreign_handler(&action)),
        };
        Ok(disposition)
    }

    fn install(&self, signal: c_int, handler: Handler) -> SignalResult<()> {
        let index = slot_index(signal).ok_or(SignalError::installation(signal, Errno::EINVAL))?;

        // The slot must be populated before the kernel can call the trampoline.
        let slot = &slots()[index];
        let replaced = slot.swap(Some(Arc::new(Slot { handler })));

        let flags = libc::SA_SIGINFO | libc::SA_RESTART;
        if let Err(errno) = set_action(signal, trampoline_address(), flags) {
            slot.store(replaced);
            return Err(SignalError::installation(signal, errno));
        }

        debug!(
            signal,
            name = signal_name(signal).unwrap_or("realtime"),
            "installed signal dispatcher"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_bounds() {
        assert_eq!(slot_index(0), None);
        assert_eq!(slot_index(-1), None);
        assert_eq!(slot_index(1), Some(1));
        assert_eq!(slot_index(64), Some(64));
        assert_eq!(slot_index(65), None);
    }

    #[test]
    fn test_install_rejects_uncatchable_signal() {
        let err = OsSignalTable
            .install(libc::SIGKILL, Arc::new(|_: c_int, _: Option<&SignalInfo>| {}))
            .unwrap_err();
        assert_eq!(err.signal(), libc::SIGKILL);
        assert_eq!(err.errno(), Errno::EINVAL);
        assert!(slots()[libc::SIGKILL as usize].load().is_none());
    }

    #[test]
    fn test_install_rejects_out_of_range_signal() {
        let handler: Handler = Arc::new(|_: c_int, _: Option<&SignalInfo>| {});
        assert!(OsSignalTable.install(0, handler.clone()).is_err());
        assert!(OsSignalTable.install(999, handler).is_err());
    }

    #[test]
    fn test_disposition_rejects_invalid_signal() {
        let err = OsSignalTable.disposition(999).unwrap_err();
        assert_eq!(err.signal(), 999);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_install_accepts_realtime_signal() {
        // Reserved for this test; nothing else in the unit tests touches it.
        let signal = libc::SIGRTMIN() + 4;
        let handler: Handler = Arc::new(|_: c_int, _: Option<&SignalInfo>| {});

        OsSignalTable.install(signal, handler).expect("install realtime signal");
        let disposition = OsSignalTable.disposition(signal).expect("query realtime signal");
        set_action(signal, libc::SIG_DFL, 0).expect("restore default");

        assert!(disposition.as_handler().is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_trampoline_with_empty_slot_reports_default() {
        // Reserved for this test; its slot is never filled.
        let signal = libc::SIGRTMIN() + 5;
        let index = slot_index(signal).expect("slot for realtime signal");
        assert!(slots()[index].load().is_none());

        set_action(signal, trampoline_address(), libc::SA_SIGINFO).expect("install trampoline");
        let disposition = OsSignalTable.disposition(signal).expect("query");
        set_action(signal, libc::SIG_DFL, 0).expect("restore default");

        assert!(disposition.is_default());
    }

    static SYNTHETIC_SIGNO: std::sync::atomic::AtomicI32 = std::sync::atomic::AtomicI32::new(0);

    extern "C" fn reads_siginfo(_: c_int, info: *mut siginfo_t, _: *mut c_void) {
        // Dereferences without a null check, like most C handlers.
        let signo = unsafe { (*info).si_signo };
        SYNTHETIC_SIGNO.store(signo, std::sync::atomic::Ordering::SeqCst);
    }

    #[test]
    fn test_foreign_siginfo_handler_gets_readable_info_without_delivery() {
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction =
            reads_siginfo as extern "C" fn(c_int, *mut siginfo_t, *mut c_void) as usize;
        action.sa_flags = libc::SA_SIGINFO;

        let handler = foreign_handler(&action);
        handler(libc::SIGUSR2, None);

        assert_eq!(
            SYNTHETIC_SIGNO.load(std::sync::atomic::Ordering::SeqCst),
            libc::SIGUSR2
        );
    }

    #[test]
    fn test_sigkill_reports_default() {
        let disposition = OsSignalTable.disposition(libc::SIGKILL).expect("query SIGKILL");
        assert!(disposition.is_default());
    }
}
