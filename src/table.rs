//! The handler-table seam between a registry and the OS
//!
//! The OS keeps one handler slot per signal number for the whole process.
//! [`SignalTable`] narrows access to that slot down to two operations so the
//! registry can be driven by the real `sigaction(2)` table or by an in-memory
//! fake.

use crate::errors::SignalResult;
use libc::{c_int, c_void, siginfo_t};
use std::fmt;
use std::sync::Arc;

/// A callable signal handler.
///
/// Receives the signal number and, when the OS supplied it, the delivery info.
pub type Handler = Arc<dyn Fn(c_int, Option<&SignalInfo>) + Send + Sync>;

/// What currently happens when a signal is delivered
#[derive(Clone, Default)]
pub enum Disposition {
    /// The OS default action (`SIG_DFL`)
    #[default]
    Default,
    /// The signal is discarded (`SIG_IGN`)
    Ignore,
    /// An explicit handler
    Handler(Handler),
}

impl Disposition {
    /// Returns the handler if this disposition is callable
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(handler) => Some(handler),
            Self::Default | Self::Ignore => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

impl fmt::Debug for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Ignore => f.write_str("Ignore"),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Delivery details passed along with an OS signal.
///
/// Only valid for the duration of a dispatch; it borrows the kernel's
/// `siginfo_t` and context pointers.
pub struct SignalInfo {
    info: *mut siginfo_t,
    context: *mut c_void,
}

impl SignalInfo {
    /// # Safety
    ///
    /// `info` must be non-null and point to a `siginfo_t` that stays valid
    /// while the returned value is alive.
    pub(crate) unsafe fn from_raw(info: *mut siginfo_t, context: *mut c_void) -> Self {
        Self { info, context }
    }

    /// Signal number recorded by the kernel
    pub fn signo(&self) -> c_int {
        unsafe { (*self.info).si_signo }
    }

    /// Origin code (`SI_USER`, `SI_QUEUE`, `SI_TKILL`, ...)
    pub fn code(&self) -> c_int {
        unsafe { (*self.info).si_code }
    }

    pub fn errno(&self) -> c_int {
        unsafe { (*self.info).si_errno }
    }

    /// Process id of the sender, meaningful for user-sent signals
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn sender_pid(&self) -> libc::pid_t {
        unsafe { (*self.info).si_pid() }
    }

    /// Real user id of the sender, meaningful for user-sent signals
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn sender_uid(&self) -> libc::uid_t {
        unsafe { (*self.info).si_uid() }
    }

    /// Raw `siginfo_t` pointer as received from the kernel
    pub fn as_raw(&self) -> *mut siginfo_t {
        self.info
    }

    /// Raw `ucontext_t` pointer as received from the kernel
    pub fn context(&self) -> *mut c_void {
        self.context
    }
}

impl fmt::Debug for SignalInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalInfo")
            .field("signo", &self.signo())
            .field("code", &self.code())
            .finish()
    }
}

/// Access to a per-signal handler table.
///
/// `disposition` must not change anything. `install` replaces whatever is
/// in the slot for `signal` with `handler`.
pub trait SignalTable {
    /// The handler currently installed for `signal`
    fn disposition(&self, signal: c_int) -> SignalResult<Disposition>;

    /// Make `handler` the handler for `signal`
    fn install(&self, signal: c_int, handler: Handler) -> SignalResult<()>;
}

impl<T: SignalTable + ?Sized> SignalTable for &T {
    fn disposition(&self, signal: c_int) -> SignalResult<Disposition> {
        (**self).disposition(signal)
    }

    fn install(&self, signal: c_int, handler: Handler) -> SignalResult<()> {
        (**self).install(signal, handler)
    }
}

impl<T: SignalTable + ?Sized> SignalTable for Arc<T> {
    fn disposition(&self, signal: c_int) -> SignalResult<Disposition> {
        (**self).disposition(signal)
    }

    fn install(&self, signal: c_int, handler: Handler) -> SignalResult<()> {
        (**self).install(signal, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_disposition_default() {
        let disposition = Disposition::default();
        assert!(disposition.is_default());
        assert!(disposition.as_handler().is_none());
    }

    #[test]
    fn test_disposition_handler_is_callable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let disposition = Disposition::Handler(Arc::new(move |_: c_int, _: Option<&SignalInfo>| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let handler = disposition.as_handler().expect("handler disposition");
        handler(libc::SIGUSR1, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(format!("{:?}", disposition), "Handler(..)");
    }

    #[test]
    fn test_disposition_ignore() {
        assert!(Disposition::Ignore.is_ignore());
        assert!(Disposition::Ignore.as_handler().is_none());
    }
}
