use criterion::{criterion_group, criterion_main};


use order_book::register_benchmarks as register_order_book_benchmarks;
use simulation::register_benchmarks as register_simulation_benchmarks;

criterion_group!(
    benches,
    register_order_book_benchmarks,
    register_simulation_benchmarks,
);

criterion_main!(benches);
