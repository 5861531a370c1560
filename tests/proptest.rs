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

//! Property-based tests for the booking engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! booking, cancellation and settlement requests.

use box_office::{
    Booking, BookingError, BookingStatus, CustomerId, Engine, EventDetails, OrganizerId,
    PaymentStatus, Store, TicketId, TicketType, Transaction, Transition,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Book { customer: u64, ticket: usize, quantity: u32 },
    Cancel { booking: usize },
    Pay { booking: usize, fail: bool },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..4, 0usize..2, 0u32..6).prop_map(|(customer, ticket, quantity)| Op::Book {
            customer,
            ticket,
            quantity
        }),
        1 => any::<usize>().prop_map(|booking| Op::Cancel { booking }),
        1 => (any::<usize>(), any::<bool>()).prop_map(|(booking, fail)| Op::Pay { booking, fail }),
    ]
}

/// Price between 0.01 and 500.00.
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..=50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_transition() -> impl Strategy<Value = Transition> {
    prop_oneof![Just(Transition::Confirm), Just(Transition::Cancel)]
}

fn setup(stock: &[u32]) -> (Engine, Vec<TicketId>) {
    let engine = Engine::new();
    let event = engine.create_event(OrganizerId(1), EventDetails::new("Show", "Hall")).unwrap();
    let tickets = stock
        .iter()
        .map(|&available| {
            engine
                .create_ticket(
                    OrganizerId(1),
                    event.id,
                    TicketType::Standard,
                    Decimal::new(1000, 2),
                    available,
                )
                .unwrap()
                .id
        })
        .collect();
    (engine, tickets)
}

// =============================================================================
// Inventory Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Available plus held stock always equals the initial stock.
    #[test]
    fn stock_is_conserved(
        stock in prop::collection::vec(0u32..20, 2),
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let (engine, tickets) = setup(&stock);
        let mut bookings: Vec<Booking> = Vec::new();

        for op in ops {
            match op {
                Op::Book { customer, ticket, quantity } => {
                    if let Ok(booking) =
                        engine.create_booking(tickets[ticket], CustomerId(customer), quantity)
                    {
                        bookings.push(booking);
                    }
                }
                Op::Cancel { booking } if !bookings.is_empty() => {
                    let b = &bookings[booking % bookings.len()];
                    let _ = engine.cancel_booking(b.id, b.customer_id);
                }
                Op::Pay { booking, fail } if !bookings.is_empty() => {
                    let b = &bookings[booking % bookings.len()];
                    let _ = engine.settle(b.id, fail);
                }
                _ => {}
            }
        }

        for (ticket, initial) in tickets.iter().zip(&stock) {
            let audit = engine.inventory(*ticket).unwrap();
            prop_assert_eq!(audit.total(), u64::from(*initial));
            prop_assert!(audit.available <= *initial);
        }
    }

    /// A booking larger than what is left fails and changes nothing.
    #[test]
    fn oversized_booking_changes_nothing(
        stock in 0u32..50,
        extra in 1u32..50,
    ) {
        let (engine, tickets) = setup(&[stock]);

        let result = engine.create_booking(tickets[0], CustomerId(1), stock + extra);

        prop_assert_eq!(
            result,
            Err(BookingError::InsufficientInventory { requested: stock + extra, available: stock })
        );
        prop_assert_eq!(engine.ticket(tickets[0]).unwrap().available, stock);
    }

    /// Booking then cancelling restores the stock exactly.
    #[test]
    fn cancel_undoes_booking(
        stock in 1u32..100,
        quantity in 1u32..100,
    ) {
        prop_assume!(quantity <= stock);
        let (engine, tickets) = setup(&[stock]);

        let booking = engine.create_booking(tickets[0], CustomerId(1), quantity).unwrap();
        prop_assert_eq!(engine.ticket(tickets[0]).unwrap().available, stock - quantity);

        engine.cancel_booking(booking.id, CustomerId(1)).unwrap();
        prop_assert_eq!(engine.ticket(tickets[0]).unwrap().available, stock);
    }
}

// =============================================================================
// Settlement Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The charged amount is price times quantity.
    #[test]
    fn amount_is_price_times_quantity(
        price in arb_price(),
        quantity in 1u32..20,
    ) {
        let engine = Engine::new();
        let event = engine
            .create_event(OrganizerId(1), EventDetails::new("Show", "Hall"))
            .unwrap();
        let ticket = engine
            .create_ticket(OrganizerId(1), event.id, TicketType::Vip, price, 20)
            .unwrap();
        let booking = engine.create_booking(ticket.id, CustomerId(1), quantity).unwrap();

        let payment = engine.settle(booking.id, false).unwrap();

        prop_assert_eq!(payment.amount, price * Decimal::from(quantity));
        prop_assert_eq!(payment.status, PaymentStatus::Success);
    }

    /// However many times a booking is settled, it has one payment.
    #[test]
    fn repeated_settlement_keeps_one_payment(
        attempts in prop::collection::vec(any::<bool>(), 1..10),
    ) {
        let (engine, tickets) = setup(&[5]);
        let booking = engine.create_booking(tickets[0], CustomerId(1), 1).unwrap();

        let mut ids = Vec::new();
        for fail in attempts {
            let _ = engine.settle(booking.id, fail);
            if let Some(payment) = engine
                .store()
                .read(|tx| tx.payment_for_booking(booking.id))
                .unwrap()
            {
                ids.push(payment.id);
            }
        }

        ids.dedup();
        prop_assert!(ids.len() <= 1);
    }
}

// =============================================================================
// Lifecycle Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Once a booking leaves Pending it never changes again.
    #[test]
    fn terminal_states_are_final(
        transitions in prop::collection::vec(arb_transition(), 1..10),
    ) {
        let mut status = BookingStatus::Pending;
        for transition in transitions {
            match status.apply(transition) {
                Ok(next) => {
                    prop_assert_eq!(status, BookingStatus::Pending);
                    prop_assert!(next.is_terminal());
                    status = next;
                }
                Err(_) => prop_assert!(status.is_terminal()),
            }
        }
    }
}
