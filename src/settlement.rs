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

//! Payment settlement.
//!
//! Settling a pending booking writes a successful payment and confirms the
//! booking in one transaction, then tells the customer. Settling again returns
//! the same payment. Declined attempts and attempts against cancelled bookings
//! leave a `Failed` payment behind for audit.
//!
//! The charged amount is the ticket's price at settlement time times the
//! booked quantity.

use crate::BookingError;
use crate::base::{BookingId, PaymentId};
use crate::engine::{Engine, log_failure};
use crate::lifecycle::{BookingStatus, Transition};
use crate::lock::{self, LockManager};
use crate::model::{Booking, Payment, PaymentStatus};
use crate::notify::{Notification, Notifier};
use crate::store::{Store, Transaction};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// A payment together with the booking it pays for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentDetails {
    pub payment: Payment,
    pub booking: Booking,
}

/// What a settlement transaction decided.
enum Outcome {
    Confirmed { booking: Booking, payment: Payment },
    AlreadyPaid(Payment),
    /// The failed payment is committed, the error still goes to the caller.
    Rejected(BookingError),
}

impl<S: Store, L: LockManager, N: Notifier> Engine<S, L, N> {
    /// Settles a booking's payment.
    ///
    /// With `simulate_failure` the payment is declined, as a payment provider
    /// would.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] - No such booking.
    /// - [`BookingError::PaymentDeclined`] - Declined; a `Failed` payment was
    ///   recorded unless the booking was already paid.
    /// - [`BookingError::CannotPayCancelled`] - Booking is cancelled and the
    ///   attempt was not declined; a `Failed` payment was recorded.
    /// - [`BookingError::AlreadyConfirmed`] - Booking is confirmed but has no
    ///   payment on record.
    /// - [`BookingError::LockUnavailable`] / [`BookingError::Store`] - Transient;
    ///   booking and payment are as they were.
    #[instrument(skip(self))]
    pub fn settle(
        &self,
        booking_id: BookingId,
        simulate_failure: bool,
    ) -> Result<Payment, BookingError> {
        let result = self.settle_locked(booking_id, simulate_failure);
        match &result {
            Ok(payment) => info!(
                payment_id = %payment.id,
                amount = %payment.amount,
                "payment settled"
            ),
            Err(error) => log_failure("settle payment", error),
        }
        result
    }

    fn settle_locked(
        &self,
        booking_id: BookingId,
        simulate_failure: bool,
    ) -> Result<Payment, BookingError> {
        let _booking_lock = self.lock(lock::booking_key(booking_id))?;
        // The amount is read from the ticket, so bookings on it wait for us.
        let ticket_id = self.store.read(|tx| tx.booking_or_fail(booking_id))?.ticket_id;
        let _ticket_lock = self.lock(lock::ticket_key(ticket_id))?;

        let outcome = self.store.transaction(|tx| {
            let booking = tx.booking_or_fail(booking_id)?;
            let ticket = tx.ticket_or_fail(booking.ticket_id)?;
            let amount = ticket.cost(booking.quantity);

            match booking.status {
                // A paid booking keeps its payment, whatever this attempt says.
                BookingStatus::Confirmed if simulate_failure => {
                    Ok(Outcome::Rejected(BookingError::PaymentDeclined))
                }
                BookingStatus::Confirmed => tx
                    .payment_for_booking(booking_id)?
                    .map(Outcome::AlreadyPaid)
                    .ok_or(BookingError::AlreadyConfirmed),
                // A decline is reported as such even for a cancelled booking.
                BookingStatus::Pending | BookingStatus::Cancelled if simulate_failure => {
                    tx.upsert_payment(booking_id, amount, PaymentStatus::Failed)?;
                    Ok(Outcome::Rejected(BookingError::PaymentDeclined))
                }
                BookingStatus::Cancelled => {
                    tx.upsert_payment(booking_id, amount, PaymentStatus::Failed)?;
                    Ok(Outcome::Rejected(BookingError::CannotPayCancelled))
                }
                BookingStatus::Pending => {
                    let payment = tx.upsert_payment(booking_id, amount, PaymentStatus::Success)?;
                    let mut booking = booking;
                    booking.status = booking.status.apply(Transition::Confirm)?;
                    tx.update_booking(&booking)?;
                    Ok(Outcome::Confirmed { booking, payment })
                }
            }
        })?;

        match outcome {
            Outcome::Confirmed { booking, payment } => {
                self.send_confirmation(&booking, &payment);
                Ok(payment)
            }
            Outcome::AlreadyPaid(payment) => Ok(payment),
            Outcome::Rejected(error) => Err(error),
        }
    }

    /// Runs after commit; delivery failures are logged and swallowed.
    fn send_confirmation(&self, booking: &Booking, payment: &Payment) {
        let notification = Notification::BookingConfirmed {
            booking: booking.clone(),
            payment: payment.clone(),
        };
        if let Err(error) = self.notifier.notify(booking.customer_id, notification) {
            warn!(
                booking_id = %booking.id,
                customer_id = %booking.customer_id,
                %error,
                "booking confirmation not delivered"
            );
        }
    }

    /// Looks up a payment and its booking.
    pub fn payment(&self, payment_id: PaymentId) -> Result<PaymentDetails, BookingError> {
        self.store.read(|tx| {
            let payment = tx
                .payment(payment_id)?
                .ok_or(BookingError::PaymentNotFound(payment_id))?;
            let booking = tx.booking_or_fail(payment.booking_id)?;
            Ok(PaymentDetails { payment, booking })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{CustomerId, OrganizerId, TicketId};
    use crate::catalog::EventDetails;
    use crate::config::EngineConfig;
    use crate::lock::MemoryLocks;
    use crate::memory_store::MemoryStore;
    use crate::model::TicketType;
    use crate::notify::NotifyError;
    use rust_decimal_macros::dec;

    struct Unreachable;

    impl Notifier for Unreachable {
        fn notify(&self, _: CustomerId, _: Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp down".into()))
        }
    }

    #[test]
    fn notification_failure_does_not_undo_payment() {
        let engine = Engine::with_parts(
            MemoryStore::new(),
            MemoryLocks::new(),
            Unreachable,
            EngineConfig::default(),
        );
        let event = engine
            .create_event(OrganizerId(1), EventDetails::new("Gala", "Opera"))
            .unwrap();
        let ticket: TicketId = engine
            .create_ticket(OrganizerId(1), event.id, TicketType::Vip, dec!(80.00), 4)
            .unwrap()
            .id;
        let booking = engine.create_booking(ticket, CustomerId(2), 1).unwrap();

        let payment = engine.settle(booking.id, false).unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(
            engine.booking(CustomerId(2), booking.id).unwrap().status,
            BookingStatus::Confirmed
        );
    }

    #[test]
    fn booking_lock_is_released_after_settlement() {
        let engine = Engine::new();
        let event = engine
            .create_event(OrganizerId(1), EventDetails::new("Gala", "Opera"))
            .unwrap();
        let ticket = engine
            .create_ticket(OrganizerId(1), event.id, TicketType::Vip, dec!(80.00), 4)
            .unwrap();
        let booking = engine.create_booking(ticket.id, CustomerId(2), 1).unwrap();

        engine.settle(booking.id, true).unwrap_err();
        assert!(!engine.locks().is_locked(&lock::booking_key(booking.id)));
        assert!(!engine.locks().is_locked(&lock::ticket_key(ticket.id)));
    }
}
