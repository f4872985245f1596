//! Dispatch benchmarks for the signal registry

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use libc::c_int;
use signal_registry::{SignalInfo, SignalRegistry, VirtualSignalTable};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn registry_with(
    table: &VirtualSignalTable,
    callbacks: usize,
) -> SignalRegistry<&VirtualSignalTable> {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = SignalRegistry::with_table(table);
    for _ in 0..callbacks {
        let counter = counter.clone();
        registry
            .register(libc::SIGUSR1, move |signal: c_int, _: Option<&SignalInfo>| {
                counter.fetch_add(black_box(signal) as usize, Ordering::Relaxed);
            })
            .expect("Failed to register SIGUSR1");
    }
    registry
}

fn benchmark_deliver(c: &mut Criterion) {
    for callbacks in [1, 8] {
        let table = VirtualSignalTable::new();
        let _registry = registry_with(&table, callbacks);

        c.bench_function(&format!("deliver_{}_callbacks", callbacks), |b| {
            b.iter(|| black_box(table.deliver(black_box(libc::SIGUSR1))));
        });
    }
}

fn benchmark_handle(c: &mut Criterion) {
    let table = VirtualSignalTable::new();
    let registry = registry_with(&table, 8);

    c.bench_function("handle_8_callbacks", |b| {
        b.iter(|| registry.handle(black_box(libc::SIGUSR1)));
    });
}

fn benchmark_register(c: &mut Criterion) {
    c.bench_function("register_first", |b| {
        b.iter(|| {
            let table = VirtualSignalTable::new();
            let mut registry = SignalRegistry::with_table(&table);
            registry
                .register(black_box(libc::SIGUSR2), |_, _| {})
                .expect("Failed to register SIGUSR2");
            black_box(table.install_count(libc::SIGUSR2))
        });
    });
}

criterion_group!(benches, benchmark_deliver, benchmark_handle, benchmark_register);
criterion_main!(benches);
