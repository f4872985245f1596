/// Signal registry demo
///
/// Chains callbacks from one or more registries onto real signals, raises
/// them against this process and reports how many callbacks actually ran.

use anyhow::{bail, Context, Result};
use clap::Parser;
use nix::sys::signal::{self, raise, SaFlags, SigAction, SigHandler, SigSet, Signal};
use serde::Serialize;
use signal_registry::{parse_signal, signal_name, SignalRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "signal-demo", version, about = "Exercise chained signal callbacks")]
struct Args {
    /// Signal to exercise (name like USR1/SIGUSR1 or a number); repeatable
    #[arg(short, long = "signal", value_parser = parse_signal_arg, default_value = "USR1")]
    signals: Vec<i32>,

    /// Callbacks registered per registry and signal
    #[arg(short, long, default_value_t = 2)]
    callbacks: usize,

    /// How many times each signal is raised
    #[arg(short, long, default_value_t = 1)]
    deliveries: usize,

    /// Independent registries chained onto each signal
    #[arg(short, long, default_value_t = 1)]
    registries: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_signal_arg(input: &str) -> Result<i32, String> {
    parse_signal(input).ok_or_else(|| format!("unknown signal: {}", input))
}

/// Outcome for one exercised signal
#[derive(Debug, Serialize)]
struct SignalReport {
    signal: i32,
    name: &'static str,
    registries: usize,
    callbacks: usize,
    deliveries: usize,
    expected: usize,
    invoked: usize,
    passed: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    if args.registries == 0 || args.callbacks == 0 {
        bail!("--registries and --callbacks must be at least 1");
    }

    info!("PID: {}", std::process::id());

    let mut reports = Vec::new();
    for &number in &args.signals {
        let report = exercise(number, &args);
        // Put the OS default back whatever happened.
        restore_default(number);
        reports.push(report?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_report(&reports);
    }

    if reports.iter().any(|report| !report.passed) {
        bail!("some callbacks were not invoked the expected number of times");
    }
    Ok(())
}

/// Level used when `RUST_LOG` is unset
fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable
fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level(verbose))),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn exercise(number: i32, args: &Args) -> Result<SignalReport> {
    let target = Signal::try_from(number).with_context(|| format!("signal {}", number))?;
    let name = signal_name(number).unwrap_or("UNKNOWN");
    let invoked = Arc::new(AtomicUsize::new(0));

    let mut registries = Vec::with_capacity(args.registries);
    for index in 0..args.registries {
        let mut registry = SignalRegistry::new();
        for _ in 0..args.callbacks {
            let invoked = invoked.clone();
            registry
                .register(number, move |_, _| {
                    invoked.fetch_add(1, Ordering::SeqCst);
                })
                .with_context(|| format!("registry {} failed to register {}", index, name))?;
        }
        registries.push(registry);
    }
    info!(signal = name, registries = registries.len(), "callbacks registered");

    for _ in 0..args.deliveries {
        raise(target).with_context(|| format!("failed to raise {}", name))?;
    }

    let expected = args.registries * args.callbacks * args.deliveries;
    let invoked = invoked.load(Ordering::SeqCst);
    if invoked != expected {
        warn!(signal = name, expected, invoked, "invocation count mismatch");
    }

    Ok(SignalReport {
        signal: number,
        name,
        registries: args.registries,
        callbacks: args.callbacks,
        deliveries: args.deliveries,
        expected,
        invoked,
        passed: invoked == expected,
    })
}

fn restore_default(number: i32) {
    let Ok(target) = Signal::try_from(number) else {
        return;
    };
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    if let Err(e) = unsafe { signal::sigaction(target, &action) } {
        warn!("failed to restore default handler for {}: {}", target.as_str(), e);
    }
}

fn print_report(reports: &[SignalReport]) {
    println!("{}", "=".repeat(60));
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>8} {:>8}",
        "signal", "registries", "callbacks", "deliveries", "invoked", "result"
    );
    println!("{}", "-".repeat(60));
    for report in reports {
        println!(
            "{:<10} {:>10} {:>10} {:>10} {:>8} {:>8}",
            report.name,
            report.registries,
            report.callbacks,
            report.deliveries,
            format!("{}/{}", report.invoked, report.expected),
            if report.passed { "ok" } else { "FAILED" }
        );
    }
    println!("{}", "=".repeat(60));
}
