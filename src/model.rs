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

//! Persistent entities: events, tickets, bookings and payments.
//!
//! Rows are plain values. Stores hand out copies; changes go back through a
//! [`Transaction`](crate::Transaction).

use crate::BookingError;
use crate::base::{BookingId, CustomerId, EventId, OrganizerId, PaymentId, TicketId};
use crate::lifecycle::BookingStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Vip,
    Standard,
    Economy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub organizer_id: OrganizerId,
    pub title: String,
    pub description: String,
    pub venue: String,
    /// `None` while the event is unscheduled.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub organizer_id: OrganizerId,
    pub title: String,
    pub description: String,
    pub venue: String,
    pub date: Option<NaiveDate>,
}

/// A purchasable ticket type with its own inventory counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    pub ticket_type: TicketType,
    pub price: Decimal,
    /// Tickets left to book. Only the ledger changes it.
    pub available: u32,
}

impl Ticket {
    fn assert_invariants(&self) {
        debug_assert!(
            self.price >= Decimal::ZERO,
            "Invariant violated: ticket {} has negative price: {}",
            self.id,
            self.price
        );
    }

    /// Removes `quantity` from the counter.
    pub(crate) fn debit(&mut self, quantity: u32) -> Result<(), BookingError> {
        if quantity == 0 {
            return Err(BookingError::InvalidQuantity);
        }
        self.available = self
            .available
            .checked_sub(quantity)
            .ok_or(BookingError::InsufficientInventory {
                requested: quantity,
                available: self.available,
            })?;
        self.assert_invariants();
        Ok(())
    }

    /// Returns `quantity` to the counter.
    pub(crate) fn credit(&mut self, quantity: u32) {
        debug_assert!(
            self.available.checked_add(quantity).is_some(),
            "Invariant violated: ticket {} counter overflow",
            self.id
        );
        self.available = self.available.saturating_add(quantity);
        self.assert_invariants();
    }

    /// Price of `quantity` tickets at the current price.
    pub fn cost(&self, quantity: u32) -> Decimal {
        self.price * Decimal::from(quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub event_id: EventId,
    pub ticket_type: TicketType,
    pub price: Decimal,
    pub available: u32,
}

/// A customer's hold on `quantity` units of a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub ticket_id: TicketId,
    pub quantity: u32,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub customer_id: CustomerId,
    pub ticket_id: TicketId,
    pub quantity: u32,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub amount: Decimal,
    pub status: PaymentStatus,
}
