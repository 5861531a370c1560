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

//! Customer notifications.
//!
//! Delivery is best effort. The engine dispatches after its transaction has
//! committed and only logs a failed delivery.

use crate::base::CustomerId;
use crate::model::{Booking, Payment};
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    BookingConfirmed { booking: Booking, payment: Payment },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, customer: CustomerId, notification: Notification) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, customer: CustomerId, notification: Notification) -> Result<(), NotifyError> {
        (**self).notify(customer, notification)
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, customer: CustomerId, notification: Notification) -> Result<(), NotifyError> {
        match &notification {
            Notification::BookingConfirmed { booking, payment } => info!(
                %customer,
                booking_id = %booking.id,
                amount = %payment.amount,
                "booking confirmed notification"
            ),
        }
        Ok(())
    }
}

/// Collects notifications in a lock-free queue for a later consumer.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: SegQueue<(CustomerId, Notification)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Takes every queued notification, oldest first.
    pub fn drain(&self) -> Vec<(CustomerId, Notification)> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }
}

impl Notifier for Outbox {
    fn notify(&self, customer: CustomerId, notification: Notification) -> Result<(), NotifyError> {
        self.queue.push((customer, notification));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{BookingId, PaymentId, TicketId};
    use crate::lifecycle::BookingStatus;
    use crate::model::PaymentStatus;
    use rust_decimal_macros::dec;

    fn confirmed(id: u64) -> Notification {
        Notification::BookingConfirmed {
            booking: Booking {
                id: BookingId(id),
                customer_id: CustomerId(1),
                ticket_id: TicketId(1),
                quantity: 2,
                status: BookingStatus::Confirmed,
            },
            payment: Payment {
                id: PaymentId(id),
                booking_id: BookingId(id),
                amount: dec!(100.00),
                status: PaymentStatus::Success,
            },
        }
    }

    #[test]
    fn outbox_drains_in_order() {
        let outbox = Outbox::new();
        outbox.notify(CustomerId(1), confirmed(1)).unwrap();
        outbox.notify(CustomerId(1), confirmed(2)).unwrap();
        assert_eq!(outbox.len(), 2);

        let drained = outbox.drain();
        assert_eq!(drained, vec![(CustomerId(1), confirmed(1)), (CustomerId(1), confirmed(2))]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn shared_outbox_sees_notifications_sent_through_arc() {
        let outbox = Arc::new(Outbox::new());
        let notifier: Arc<Outbox> = Arc::clone(&outbox);
        notifier.notify(CustomerId(5), confirmed(1)).unwrap();
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn notification_serializes_with_kind_tag() {
        let json = serde_json::to_value(confirmed(1)).unwrap();
        assert_eq!(json["kind"], "booking_confirmed");
        assert_eq!(json["booking"]["status"], "confirmed");
    }
}
