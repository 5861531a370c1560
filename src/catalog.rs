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

//! Organizer-side catalog: events and the tickets sold for them.
//!
//! Organizers only see their own events. A ticket that belongs to someone
//! else's event is reported as not found.
//!
//! Event-wide changes hold the event lock, then each ticket lock in id order.

use crate::BookingError;
use crate::base::{EventId, OrganizerId, TicketId};
use crate::engine::{Engine, Page, log_failure};
use crate::ledger::Ledger;
use crate::lock::{self, LockGuard, LockManager};
use crate::model::{Event, EventDraft, Ticket, TicketDraft, TicketType};
use crate::notify::Notifier;
use crate::store::{Store, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, instrument};

/// What an organizer fills in for a new event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    pub title: String,
    pub description: String,
    pub venue: String,
    pub date: Option<NaiveDate>,
}

impl EventDetails {
    pub fn new(title: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            venue: venue.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Fields to change on an event; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Fields to change on a ticket; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
    pub ticket_type: Option<TicketType>,
    pub price: Option<Decimal>,
    /// New stock level, replacing what is left.
    pub quantity: Option<u32>,
}

/// What went away with a deleted event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRemoval {
    pub tickets: usize,
    pub bookings: usize,
}

impl<S: Store, L: LockManager, N: Notifier> Engine<S, L, N> {
    #[instrument(skip(self, details), fields(title = %details.title))]
    pub fn create_event(
        &self,
        organizer_id: OrganizerId,
        details: EventDetails,
    ) -> Result<Event, BookingError> {
        let event = self.store.transaction(|tx| {
            tx.insert_event(EventDraft {
                organizer_id,
                title: details.title,
                description: details.description,
                venue: details.venue,
                date: details.date,
            })
        })?;
        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    pub fn event(&self, event_id: EventId) -> Result<Event, BookingError> {
        self.store.read(|tx| tx.event_or_fail(event_id))
    }

    /// Lists events newest first, optionally only those of one organizer.
    pub fn events(
        &self,
        created_by: Option<OrganizerId>,
        page: usize,
        per_page: Option<usize>,
    ) -> Result<Page<Event>, BookingError> {
        let mut all = self.store.read(|tx| {
            tx.events_where(&|event| created_by.is_none_or(|owner| event.organizer_id == owner))
        })?;
        all.reverse();
        Ok(self.paginate(all, page, per_page))
    }

    /// Changes an event's title, description, venue or date.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] - No such event for this organizer.
    #[instrument(skip(self, update))]
    pub fn update_event(
        &self,
        organizer_id: OrganizerId,
        event_id: EventId,
        update: EventUpdate,
    ) -> Result<Event, BookingError> {
        let result = self.apply_event_update(organizer_id, event_id, update);
        match &result {
            Ok(_) => info!("event updated"),
            Err(error) => log_failure("update event", error),
        }
        result
    }

    fn apply_event_update(
        &self,
        organizer_id: OrganizerId,
        event_id: EventId,
        update: EventUpdate,
    ) -> Result<Event, BookingError> {
        let _event_lock = self.lock(lock::event_key(event_id))?;
        self.store.transaction(|tx| {
            let mut event = owned_event(tx, organizer_id, event_id)?;
            if let Some(title) = &update.title {
                event.title.clone_from(title);
            }
            if let Some(description) = &update.description {
                event.description.clone_from(description);
            }
            if let Some(venue) = &update.venue {
                event.venue.clone_from(venue);
            }
            if let Some(date) = update.date {
                event.date = Some(date);
            }
            tx.update_event(&event)?;
            Ok(event)
        })
    }

    /// Deletes an event with its tickets, their bookings and payments, all
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] - No such event for this organizer.
    /// - [`BookingError::LockUnavailable`] - The event or one of its tickets
    ///   stayed locked past the wait budget.
    #[instrument(skip(self))]
    pub fn delete_event(
        &self,
        organizer_id: OrganizerId,
        event_id: EventId,
    ) -> Result<EventRemoval, BookingError> {
        let result = self.delete_with_tickets(organizer_id, event_id);
        match &result {
            Ok(removal) => info!(
                tickets = removal.tickets,
                bookings = removal.bookings,
                "event deleted"
            ),
            Err(error) => log_failure("delete event", error),
        }
        result
    }

    fn delete_with_tickets(
        &self,
        organizer_id: OrganizerId,
        event_id: EventId,
    ) -> Result<EventRemoval, BookingError> {
        // Holding the event lock keeps new tickets out while we collect them.
        let _event_lock = self.lock(lock::event_key(event_id))?;
        let tickets = self.store.read(|tx| {
            owned_event(tx, organizer_id, event_id)?;
            Ok::<_, BookingError>(tx.tickets_where(&|ticket| ticket.event_id == event_id)?)
        })?;
        let _ticket_locks = tickets
            .iter()
            .map(|ticket| self.lock(lock::ticket_key(ticket.id)))
            .collect::<Result<Vec<LockGuard<'_, L>>, _>>()?;

        self.store.transaction(|tx| {
            owned_event(tx, organizer_id, event_id)?;
            let mut removal = EventRemoval::default();
            for ticket in tx.tickets_where(&|ticket| ticket.event_id == event_id)? {
                removal.bookings += remove_ticket(tx, ticket.id)?;
                removal.tickets += 1;
            }
            tx.delete_event(event_id)?;
            Ok(removal)
        })
    }

    /// Adds a ticket type with `quantity` units to one of the organizer's events.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidPrice`] - `price` is negative.
    /// - [`BookingError::EventNotFound`] - No such event for this organizer.
    #[instrument(skip(self))]
    pub fn create_ticket(
        &self,
        organizer_id: OrganizerId,
        event_id: EventId,
        ticket_type: TicketType,
        price: Decimal,
        quantity: u32,
    ) -> Result<Ticket, BookingError> {
        let result = self.insert_owned_ticket(organizer_id, event_id, ticket_type, price, quantity);
        match &result {
            Ok(ticket) => info!(ticket_id = %ticket.id, "ticket created"),
            Err(error) => log_failure("create ticket", error),
        }
        result
    }

    fn insert_owned_ticket(
        &self,
        organizer_id: OrganizerId,
        event_id: EventId,
        ticket_type: TicketType,
        price: Decimal,
        quantity: u32,
    ) -> Result<Ticket, BookingError> {
        if price < Decimal::ZERO {
            return Err(BookingError::InvalidPrice);
        }
        let _event_lock = self.lock(lock::event_key(event_id))?;
        self.store.transaction(|tx| {
            let event = owned_event(tx, organizer_id, event_id)?;
            Ok(tx.insert_ticket(TicketDraft {
                event_id: event.id,
                ticket_type,
                price,
                available: quantity,
            })?)
        })
    }

    /// Changes a ticket's type, price or stock.
    ///
    /// A new price applies to bookings settled from now on, including ones
    /// already pending.
    #[instrument(skip(self))]
    pub fn update_ticket(
        &self,
        organizer_id: OrganizerId,
        ticket_id: TicketId,
        update: TicketUpdate,
    ) -> Result<Ticket, BookingError> {
        let result = self.apply_ticket_update(organizer_id, ticket_id, update);
        match &result {
            Ok(ticket) => info!(available = ticket.available, "ticket updated"),
            Err(error) => log_failure("update ticket", error),
        }
        result
    }

    fn apply_ticket_update(
        &self,
        organizer_id: OrganizerId,
        ticket_id: TicketId,
        update: TicketUpdate,
    ) -> Result<Ticket, BookingError> {
        if update.price.is_some_and(|price| price < Decimal::ZERO) {
            return Err(BookingError::InvalidPrice);
        }

        let _ticket_lock = self.lock(lock::ticket_key(ticket_id))?;
        self.store.transaction(|tx| {
            let mut ticket = owned_ticket(tx, organizer_id, ticket_id)?;
            if let Some(ticket_type) = update.ticket_type {
                ticket.ticket_type = ticket_type;
            }
            if let Some(price) = update.price {
                ticket.price = price;
            }
            tx.update_ticket(&ticket)?;

            match update.quantity {
                Some(quantity) => Ledger::restock(tx, ticket_id, quantity),
                None => Ok(ticket),
            }
        })
    }

    /// Deletes a ticket with all of its bookings and their payments.
    ///
    /// Returns how many bookings went with it.
    #[instrument(skip(self))]
    pub fn delete_ticket(
        &self,
        organizer_id: OrganizerId,
        ticket_id: TicketId,
    ) -> Result<usize, BookingError> {
        let result = self.delete_with_bookings(organizer_id, ticket_id);
        match &result {
            Ok(bookings) => info!(bookings, "ticket deleted"),
            Err(error) => log_failure("delete ticket", error),
        }
        result
    }

    fn delete_with_bookings(
        &self,
        organizer_id: OrganizerId,
        ticket_id: TicketId,
    ) -> Result<usize, BookingError> {
        let _ticket_lock = self.lock(lock::ticket_key(ticket_id))?;
        self.store.transaction(|tx| {
            owned_ticket(tx, organizer_id, ticket_id)?;
            remove_ticket(tx, ticket_id)
        })
    }

    pub fn ticket(&self, ticket_id: TicketId) -> Result<Ticket, BookingError> {
        self.store.read(|tx| tx.ticket_or_fail(ticket_id))
    }
}

fn owned_event<T: Transaction + ?Sized>(
    tx: &mut T,
    organizer_id: OrganizerId,
    event_id: EventId,
) -> Result<Event, BookingError> {
    tx.event(event_id)?
        .filter(|event| event.organizer_id == organizer_id)
        .ok_or(BookingError::EventNotFound(event_id))
}

fn owned_ticket<T: Transaction + ?Sized>(
    tx: &mut T,
    organizer_id: OrganizerId,
    ticket_id: TicketId,
) -> Result<Ticket, BookingError> {
    let ticket = tx.ticket_or_fail(ticket_id)?;
    match tx.event(ticket.event_id)? {
        Some(event) if event.organizer_id == organizer_id => Ok(ticket),
        _ => Err(BookingError::TicketNotFound(ticket_id)),
    }
}

/// Deletes a ticket after its bookings and their payments. Returns how many
/// bookings were removed.
fn remove_ticket<T: Transaction + ?Sized>(
    tx: &mut T,
    ticket_id: TicketId,
) -> Result<usize, BookingError> {
    let bookings = tx.bookings_where(&|booking| booking.ticket_id == ticket_id)?;
    for booking in &bookings {
        if tx.payment_for_booking(booking.id)?.is_some() {
            tx.delete_payment(booking.id)?;
        }
        tx.delete_booking(booking.id)?;
    }
    tx.delete_ticket(ticket_id)?;
    Ok(bookings.len())
}
