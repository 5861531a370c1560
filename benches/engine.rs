// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the booking engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded booking, cancellation and settlement
//! - Parallel bookings contending for one ticket
//! - Parallel bookings spread over many tickets
//! - Scaling with number of threads

use box_office::{CustomerId, Engine, EventDetails, OrganizerId, TicketId, TicketType};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn engine_with_tickets(count: usize, available: u32) -> (Engine, Vec<TicketId>) {
    let engine = Engine::new();
    let event = engine
        .create_event(OrganizerId(1), EventDetails::new("Bench", "Lab"))
        .unwrap();
    let tickets = (0..count)
        .map(|_| {
            engine
                .create_ticket(OrganizerId(1), event.id, TicketType::Standard, dec!(25.00), available)
                .unwrap()
                .id
        })
        .collect();
    (engine, tickets)
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_booking(c: &mut Criterion) {
    let (engine, tickets) = engine_with_tickets(1, u32::MAX);
    c.bench_function("single_booking", |b| {
        b.iter(|| {
            engine
                .create_booking(black_box(tickets[0]), CustomerId(1), 1)
                .unwrap()
        })
    });
}

fn bench_book_cancel(c: &mut Criterion) {
    let (engine, tickets) = engine_with_tickets(1, 10);
    c.bench_function("book_cancel", |b| {
        b.iter(|| {
            let booking = engine.create_booking(tickets[0], CustomerId(1), 2).unwrap();
            engine
                .cancel_booking(black_box(booking.id), CustomerId(1))
                .unwrap()
        })
    });
}

fn bench_book_settle(c: &mut Criterion) {
    let (engine, tickets) = engine_with_tickets(1, u32::MAX);
    c.bench_function("book_settle", |b| {
        b.iter(|| {
            let booking = engine.create_booking(tickets[0], CustomerId(1), 2).unwrap();
            engine.settle(black_box(booking.id), false).unwrap()
        })
    });
}

fn bench_booking_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("booking_throughput");

    for count in [100u32, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(u64::from(*count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (engine, tickets) = engine_with_tickets(1, count);
                for i in 0..count {
                    engine
                        .create_booking(tickets[0], CustomerId(u64::from(i)), 1)
                        .unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_same_ticket(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_same_ticket");

    for count in [100u64, 1_000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let (engine, tickets) = engine_with_tickets(1, count as u32 / 2);
                let engine = Arc::new(engine);

                // Half of the attempts sell out the ticket, the rest are refused.
                (0..count).into_par_iter().for_each(|i| {
                    let _ = engine.create_booking(tickets[0], CustomerId(i), 1);
                });

                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_parallel_many_tickets(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_many_tickets");

    for num_tickets in [10usize, 100, 1_000].iter() {
        let per_ticket = 50u64;
        let total = *num_tickets as u64 * per_ticket;

        group.throughput(Throughput::Elements(total));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_tickets),
            num_tickets,
            |b, &num_tickets| {
                b.iter_batched(
                    || engine_with_tickets(num_tickets, per_ticket as u32),
                    |(engine, tickets)| {
                        (0..total).into_par_iter().for_each(|i| {
                            let ticket = tickets[i as usize % tickets.len()];
                            engine.create_booking(ticket, CustomerId(i), 1).unwrap();
                        });
                        black_box(&engine);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

// =============================================================================
// Scaling Benchmarks
// =============================================================================

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let total_bookings = 10_000u64;

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(total_bookings));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();

                b.iter(|| {
                    let (engine, tickets) = engine_with_tickets(100, 1_000);

                    pool.install(|| {
                        (0..total_bookings).into_par_iter().for_each(|i| {
                            let ticket = tickets[i as usize % tickets.len()];
                            engine.create_booking(ticket, CustomerId(i), 1).unwrap();
                        });
                    });

                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    single_threaded,
    bench_single_booking,
    bench_book_cancel,
    bench_book_settle,
    bench_booking_throughput,
);

criterion_group!(
    multi_threaded,
    bench_parallel_same_ticket,
    bench_parallel_many_tickets,
);

criterion_group!(scaling, bench_thread_scaling);

criterion_main!(single_threaded, multi_threaded, scaling);
