//! Signal registry with handler chaining
//!
//! A [`SignalRegistry`] lets independent subsystems attach callbacks to the
//! same signal. The first registration for a signal captures whatever handler
//! was installed before and installs a single dispatcher in its place; later
//! registrations only append to the dispatcher's callback list.
//!
//! # Constraints
//!
//! * Callbacks run synchronously in signal context, on whichever thread the
//!   OS delivers the signal to. Delivery to several threads at once is not
//!   supported.
//! * There is no way to unregister. A dispatcher stays installed until some
//!   other party replaces the OS handler for that signal.
//! * Panics from callbacks or from a chained handler are not caught.

use crate::errors::SignalResult;
use crate::os::OsSignalTable;
use crate::table::{Disposition, Handler, SignalInfo, SignalTable};
use arc_swap::ArcSwap;
use libc::c_int;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything the dispatcher of one signal needs
struct SignalChain {
    previous: Disposition,
    // Copy-on-write: dispatch always sees a complete list.
    callbacks: ArcSwap<Vec<Handler>>,
}

impl SignalChain {
    fn new(previous: Disposition, first: Handler) -> Self {
        Self {
            previous,
            callbacks: ArcSwap::from_pointee(vec![first]),
        }
    }

    fn push(&self, callback: Handler) {
        self.callbacks.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(callback.clone());
            next
        });
    }

    fn len(&self) -> usize {
        self.callbacks.load().len()
    }

    fn dispatch(&self, signal: c_int, info: Option<&SignalInfo>) {
        if let Disposition::Handler(previous) = &self.previous {
            previous(signal, info);
        }
        for callback in self.callbacks.load().iter() {
            callback(signal, info);
        }
    }
}

/// Multiplexes OS signals to ordered callback chains
///
/// # Examples
///
/// ```no_run
/// use signal_registry::SignalRegistry;
/// use signal_hook::consts::SIGUSR1;
///
/// let mut registry = SignalRegistry::new();
/// registry
///     .register(SIGUSR1, |signal, _info| println!("got signal {}", signal))
///     .expect("Failed to register SIGUSR1");
/// ```
pub struct SignalRegistry<T: SignalTable = OsSignalTable> {
    table: T,
    chains: HashMap<c_int, Arc<SignalChain>>,
}

impl SignalRegistry<OsSignalTable> {
    /// Create a registry backed by the process-wide OS handler table
    pub fn new() -> Self {
        Self::with_table(OsSignalTable)
    }
}

impl Default for SignalRegistry<OsSignalTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SignalTable> SignalRegistry<T> {
    /// Create a registry that installs its dispatchers through `table`
    pub fn with_table(table: T) -> Self {
        Self {
            table,
            chains: HashMap::new(),
        }
    }

    /// Invoke `callback` every time `signal` is delivered.
    ///
    /// The first call for a signal captures the handler installed before it
    /// and installs this registry's dispatcher; that handler then runs ahead
    /// of every callback. Later calls append without touching the OS.
    /// Registering the same closure twice makes it run twice.
    pub fn register<F>(&mut self, signal: c_int, callback: F) -> SignalResult<()>
    where
        F: Fn(c_int, Option<&SignalInfo>) + Send + Sync + 'static,
    {
        let callback: Handler = Arc::new(callback);

        if let Some(chain) = self.chains.get(&signal) {
            chain.push(callback);
            return Ok(());
        }

        let previous = self.table.disposition(signal)?;
        let chain = Arc::new(SignalChain::new(previous, callback));
        let dispatcher = Arc::clone(&chain);
        self.table.install(
            signal,
            Arc::new(move |signal: c_int, info: Option<&SignalInfo>| {
                dispatcher.dispatch(signal, info)
            }),
        )?;
        self.chains.insert(signal, chain);
        Ok(())
    }

    /// Run the chain for `signal` directly, without an OS delivery.
    ///
    /// Callbacks receive no [`SignalInfo`]. A chained C handler installed
    /// with `SA_SIGINFO` gets a zeroed `siginfo_t` carrying only the signal
    /// number, and a null context pointer.
    /// Does nothing for a signal this registry does not handle.
    pub fn handle(&self, signal: c_int) {
        if let Some(chain) = self.chains.get(&signal) {
            chain.dispatch(signal, None);
        }
    }

    /// Whether this registry installed a dispatcher for `signal`
    pub fn is_handling(&self, signal: c_int) -> bool {
        self.chains.contains_key(&signal)
    }

    /// Signals with an installed dispatcher, in ascending order
    pub fn handled_signals(&self) -> Vec<c_int> {
        let mut signals: Vec<c_int> = self.chains.keys().copied().collect();
        signals.sort_unstable();
        signals
    }

    /// Number of callbacks registered for `signal`
    pub fn callback_count(&self, signal: c_int) -> usize {
        self.chains.get(&signal).map_or(0, |chain| chain.len())
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

impl<T: SignalTable> fmt::Debug for SignalRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for signal in self.handled_signals() {
            let chain = &self.chains[&signal];
            map.entry(&signal, &(chain.previous.clone(), chain.len()));
        }
        map.finish()
    }
}
