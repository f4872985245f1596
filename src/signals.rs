//! Signal name helpers and alarm scheduling

use libc::c_int;
use nix::sys::signal::Signal;
use nix::unistd::alarm;

/// Canonical `SIGxxx` name for a signal number
pub fn signal_name(signal: c_int) -> Option<&'static str> {
    Signal::try_from(signal).ok().map(Signal::as_str)
}

/// Parse `SIGUSR1`, `USR1`, `usr1` or a decimal signal number
pub fn parse_signal(input: &str) -> Option<c_int> {
    let input = input.trim();
    if let Ok(number) = input.parse::<c_int>() {
        return Signal::try_from(number).ok().map(|signal| signal as c_int);
    }

    let upper = input.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    name.parse::<Signal>().ok().map(|signal| signal as c_int)
}

/// Deliver `SIGALRM` to this process after `seconds`.
///
/// Zero cancels a pending alarm. Returns the seconds that were left on the
/// previous alarm, if one was pending.
pub fn schedule_alarm(seconds: u32) -> Option<u32> {
    if seconds == 0 {
        alarm::cancel()
    } else {
        alarm::set(seconds)
    }
}
