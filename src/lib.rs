//! Signal dispatch registry
//!
//! Lets independent subsystems attach callbacks to the same OS signal
//! without clobbering each other's handlers. Each [`SignalRegistry`]
//! installs a single dispatcher per signal, chains in front of whatever
//! handler was there before, and runs its callbacks in registration order.

pub mod errors;
pub mod os;
pub mod registry;
pub mod signals;
pub mod table;
pub mod virtual_table;

// Re-export commonly used types
pub use errors::{SignalError, SignalResult};
pub use os::OsSignalTable;
pub use registry::SignalRegistry;
pub use signals::{parse_signal, schedule_alarm, signal_name};
pub use table::{Disposition, Handler, SignalInfo, SignalTable};
pub use virtual_table::VirtualSignalTable;
