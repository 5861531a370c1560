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

//! Persistence seam.
//!
//! A [`Store`] hands out [`Transaction`]s. Writes made through a transaction
//! are invisible to everyone else until [`Store::commit`] succeeds; dropping
//! the transaction instead discards all of them. [`Store::transaction`] wraps
//! that into a closure that commits on `Ok` and rolls back on `Err` or panic.

use crate::base::{BookingId, EventId, PaymentId, TicketId};
use crate::error::{BookingError, StoreError};
use crate::model::{
    Booking, BookingDraft, Event, EventDraft, Payment, PaymentStatus, Ticket, TicketDraft,
};
use rust_decimal::Decimal;

/// Row access inside one unit of work.
pub trait Transaction {
    fn event(&mut self, id: EventId) -> Result<Option<Event>, StoreError>;
    /// Events matching `filter`, ordered by id.
    fn events_where(&mut self, filter: &dyn Fn(&Event) -> bool)
    -> Result<Vec<Event>, StoreError>;
    fn insert_event(&mut self, draft: EventDraft) -> Result<Event, StoreError>;
    fn update_event(&mut self, event: &Event) -> Result<(), StoreError>;
    fn delete_event(&mut self, id: EventId) -> Result<(), StoreError>;

    fn ticket(&mut self, id: TicketId) -> Result<Option<Ticket>, StoreError>;
    /// Tickets matching `filter`, ordered by id.
    fn tickets_where(
        &mut self,
        filter: &dyn Fn(&Ticket) -> bool,
    ) -> Result<Vec<Ticket>, StoreError>;
    fn insert_ticket(&mut self, draft: TicketDraft) -> Result<Ticket, StoreError>;
    fn update_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError>;
    fn delete_ticket(&mut self, id: TicketId) -> Result<(), StoreError>;

    fn booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError>;
    /// Bookings matching `filter`, ordered by id.
    fn bookings_where(
        &mut self,
        filter: &dyn Fn(&Booking) -> bool,
    ) -> Result<Vec<Booking>, StoreError>;
    fn insert_booking(&mut self, draft: BookingDraft) -> Result<Booking, StoreError>;
    fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;
    fn delete_booking(&mut self, id: BookingId) -> Result<(), StoreError>;

    fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>, StoreError>;
    fn payment_for_booking(&mut self, booking_id: BookingId)
    -> Result<Option<Payment>, StoreError>;
    /// Creates the booking's payment or overwrites the one it already has.
    fn upsert_payment(
        &mut self,
        booking_id: BookingId,
        amount: Decimal,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError>;
    fn delete_payment(&mut self, booking_id: BookingId) -> Result<(), StoreError>;

    fn ticket_or_fail(&mut self, id: TicketId) -> Result<Ticket, BookingError> {
        self.ticket(id)?.ok_or(BookingError::TicketNotFound(id))
    }

    fn booking_or_fail(&mut self, id: BookingId) -> Result<Booking, BookingError> {
        self.booking(id)?.ok_or(BookingError::BookingNotFound(id))
    }

    fn event_or_fail(&mut self, id: EventId) -> Result<Event, BookingError> {
        self.event(id)?.ok_or(BookingError::EventNotFound(id))
    }
}

pub trait Store: Send + Sync {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self) -> Self::Tx<'_>;

    /// Makes every write of `tx` visible at once, or none of them.
    fn commit(&self, tx: Self::Tx<'_>) -> Result<(), StoreError>;

    /// Runs `work` in a fresh transaction.
    ///
    /// Commits when `work` returns `Ok`. On `Err` (or unwinding) the
    /// transaction is dropped and nothing it wrote survives.
    fn transaction<'s, T, E, F>(&'s self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx<'s>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = self.begin();
        let value = work(&mut tx)?;
        self.commit(tx)?;
        Ok(value)
    }

    /// Runs read-only `work` against committed rows. Nothing is committed.
    fn read<'s, T, E, F>(&'s self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx<'s>) -> Result<T, E>,
    {
        let mut tx = self.begin();
        work(&mut tx)
    }
}
