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

//! In-process [`Store`] implementation.
//!
//! Each table is a [`DashMap`] of versioned rows. A transaction records the
//! version of every row it reads and buffers every write. Commit takes the
//! store-wide commit mutex, checks that no recorded row moved, then applies
//! the buffered writes. A moved row fails the commit with
//! [`StoreError::Conflict`] and nothing is applied.
//!
//! Deleted rows stay behind as tombstones so their version keeps counting.

use crate::base::{BookingId, EventId, PaymentId, TicketId};
use crate::error::StoreError;
use crate::model::{
    Booking, BookingDraft, Event, EventDraft, Payment, PaymentStatus, Ticket, TicketDraft,
};
use crate::store::{Store, Transaction};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug)]
struct Versioned<V> {
    version: u64,
    /// `None` marks a deleted row.
    row: Option<V>,
}

#[derive(Debug)]
struct Table<K: Eq + Hash, V> {
    name: &'static str,
    rows: DashMap<K, Versioned<V>>,
    sequence: AtomicU64,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Ord + Copy + Display,
    V: Clone,
{
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Allocates the next row id. Ids are never handed out twice, even when
    /// the transaction that took one rolls back.
    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn read(&self, key: &K) -> (u64, Option<V>) {
        self.rows
            .get(key)
            .map_or((0, None), |entry| (entry.version, entry.row.clone()))
    }

    fn version(&self, key: &K) -> u64 {
        self.rows.get(key).map_or(0, |entry| entry.version)
    }

    fn live_rows(&self) -> Vec<(K, u64, V)> {
        self.rows
            .iter()
            .filter_map(|entry| {
                entry
                    .row
                    .clone()
                    .map(|row| (*entry.key(), entry.version, row))
            })
            .collect()
    }

    fn apply(&self, key: K, row: Option<V>) {
        match self.rows.entry(key) {
            Entry::Occupied(mut entry) => {
                let versioned = entry.get_mut();
                versioned.version += 1;
                versioned.row = row;
            }
            Entry::Vacant(entry) => {
                entry.insert(Versioned { version: 1, row });
            }
        }
    }
}

/// Per-table read set and write buffer of one transaction.
#[derive(Debug)]
struct Staged<K, V> {
    reads: HashMap<K, u64>,
    writes: BTreeMap<K, Option<V>>,
}

impl<K, V> Staged<K, V>
where
    K: Eq + Hash + Ord + Copy + Display,
    V: Clone,
{
    fn new() -> Self {
        Self {
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    fn read(&mut self, table: &Table<K, V>, key: K) -> Option<V> {
        if let Some(staged) = self.writes.get(&key) {
            return staged.clone();
        }
        let (version, row) = table.read(&key);
        self.reads.entry(key).or_insert(version);
        row
    }

    /// Rows matching `filter`, own writes included, ordered by key.
    ///
    /// Only matching rows join the read set.
    fn scan(&mut self, table: &Table<K, V>, filter: &dyn Fn(&V) -> bool) -> Vec<V> {
        let mut matched = BTreeMap::new();
        for (key, version, row) in table.live_rows() {
            if self.writes.contains_key(&key) || !filter(&row) {
                continue;
            }
            self.reads.entry(key).or_insert(version);
            matched.insert(key, row);
        }
        for (key, staged) in &self.writes {
            if let Some(row) = staged.as_ref().filter(|row| filter(row)) {
                matched.insert(*key, row.clone());
            }
        }
        matched.into_values().collect()
    }

    fn write(&mut self, key: K, row: Option<V>) {
        self.writes.insert(key, row);
    }

    fn validate(&self, table: &Table<K, V>) -> Result<(), StoreError> {
        for (key, seen) in &self.reads {
            if table.version(key) != *seen {
                debug!(table = table.name, %key, "commit rejected, row changed");
                return Err(StoreError::Conflict(format!("{} {}", table.name, key)));
            }
        }
        Ok(())
    }

    fn apply(self, table: &Table<K, V>) {
        for (key, row) in self.writes {
            table.apply(key, row);
        }
    }
}

/// Thread-safe in-memory store with optimistic transactions.
#[derive(Debug)]
pub struct MemoryStore {
    events: Table<EventId, Event>,
    tickets: Table<TicketId, Ticket>,
    bookings: Table<BookingId, Booking>,
    /// Keyed by booking: a booking has at most one payment.
    payments: Table<BookingId, Payment>,
    payment_index: DashMap<PaymentId, BookingId>,
    commit_lock: Mutex<()>,
    fault: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            events: Table::new("event"),
            tickets: Table::new("ticket"),
            bookings: Table::new("booking"),
            payments: Table::new("payment"),
            payment_index: DashMap::new(),
            commit_lock: Mutex::new(()),
            fault: Mutex::new(None),
        }
    }

    /// Makes the next commit fail with [`StoreError::Unavailable`] without
    /// applying anything.
    pub fn fail_next_commit(&self, reason: impl Into<String>) {
        *self.fault.lock() = Some(reason.into());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> MemoryTransaction<'_> {
        MemoryTransaction {
            store: self,
            events: Staged::new(),
            tickets: Staged::new(),
            bookings: Staged::new(),
            payments: Staged::new(),
        }
    }

    fn commit(&self, tx: MemoryTransaction<'_>) -> Result<(), StoreError> {
        if let Some(reason) = self.fault.lock().take() {
            warn!(%reason, "injected commit failure");
            return Err(StoreError::Unavailable(reason));
        }

        let MemoryTransaction {
            events,
            tickets,
            bookings,
            payments,
            ..
        } = tx;

        let _serial = self.commit_lock.lock();
        events.validate(&self.events)?;
        tickets.validate(&self.tickets)?;
        bookings.validate(&self.bookings)?;
        payments.validate(&self.payments)?;

        for (booking_id, payment) in &payments.writes {
            match payment {
                Some(payment) => {
                    self.payment_index.insert(payment.id, *booking_id);
                }
                None => {
                    self.payment_index.retain(|_, indexed| *indexed != *booking_id);
                }
            }
        }
        events.apply(&self.events);
        tickets.apply(&self.tickets);
        bookings.apply(&self.bookings);
        payments.apply(&self.payments);
        Ok(())
    }
}

/// Unit of work against a [`MemoryStore`].
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    events: Staged<EventId, Event>,
    tickets: Staged<TicketId, Ticket>,
    bookings: Staged<BookingId, Booking>,
    payments: Staged<BookingId, Payment>,
}

impl Transaction for MemoryTransaction<'_> {
    fn event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read(&self.store.events, id))
    }

    fn insert_event(&mut self, draft: EventDraft) -> Result<Event, StoreError> {
        let event = Event {
            id: EventId(self.store.events.next_id()),
            organizer_id: draft.organizer_id,
            title: draft.title,
            description: draft.description,
            venue: draft.venue,
            date: draft.date,
        };
        self.events.write(event.id, Some(event.clone()));
        Ok(event)
    }

    fn events_where(
        &mut self,
        filter: &dyn Fn(&Event) -> bool,
    ) -> Result<Vec<Event>, StoreError> {
        Ok(self.events.scan(&self.store.events, filter))
    }

    fn update_event(&mut self, event: &Event) -> Result<(), StoreError> {
        self.events.write(event.id, Some(event.clone()));
        Ok(())
    }

    fn delete_event(&mut self, id: EventId) -> Result<(), StoreError> {
        self.events.write(id, None);
        Ok(())
    }

    fn ticket(&mut self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tickets.read(&self.store.tickets, id))
    }

    fn tickets_where(
        &mut self,
        filter: &dyn Fn(&Ticket) -> bool,
    ) -> Result<Vec<Ticket>, StoreError> {
        Ok(self.tickets.scan(&self.store.tickets, filter))
    }

    fn insert_ticket(&mut self, draft: TicketDraft) -> Result<Ticket, StoreError> {
        let ticket = Ticket {
            id: TicketId(self.store.tickets.next_id()),
            event_id: draft.event_id,
            ticket_type: draft.ticket_type,
            price: draft.price,
            available: draft.available,
        };
        self.tickets.write(ticket.id, Some(ticket.clone()));
        Ok(ticket)
    }

    fn update_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        self.tickets.write(ticket.id, Some(ticket.clone()));
        Ok(())
    }

    fn delete_ticket(&mut self, id: TicketId) -> Result<(), StoreError> {
        self.tickets.write(id, None);
        Ok(())
    }

    fn booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read(&self.store.bookings, id))
    }

    fn bookings_where(
        &mut self,
        filter: &dyn Fn(&Booking) -> bool,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self.bookings.scan(&self.store.bookings, filter))
    }

    fn insert_booking(&mut self, draft: BookingDraft) -> Result<Booking, StoreError> {
        let booking = Booking {
            id: BookingId(self.store.bookings.next_id()),
            customer_id: draft.customer_id,
            ticket_id: draft.ticket_id,
            quantity: draft.quantity,
            status: draft.status,
        };
        self.bookings.write(booking.id, Some(booking.clone()));
        Ok(booking)
    }

    fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        self.bookings.write(booking.id, Some(booking.clone()));
        Ok(())
    }

    fn delete_booking(&mut self, id: BookingId) -> Result<(), StoreError> {
        self.bookings.write(id, None);
        Ok(())
    }

    fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        // Payments created in this transaction are not indexed yet.
        let staged = self
            .payments
            .writes
            .values()
            .flatten()
            .find(|payment| payment.id == id)
            .cloned();
        if staged.is_some() {
            return Ok(staged);
        }
        let Some(booking_id) = self.store.payment_index.get(&id).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self
            .payments
            .read(&self.store.payments, booking_id)
            .filter(|payment| payment.id == id))
    }

    fn payment_for_booking(
        &mut self,
        booking_id: BookingId,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.read(&self.store.payments, booking_id))
    }

    fn upsert_payment(
        &mut self,
        booking_id: BookingId,
        amount: Decimal,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let id = match self.payments.read(&self.store.payments, booking_id) {
            Some(existing) => existing.id,
            None => PaymentId(self.store.payments.next_id()),
        };
        let payment = Payment {
            id,
            booking_id,
            amount,
            status,
        };
        self.payments.write(booking_id, Some(payment.clone()));
        Ok(payment)
    }

    fn delete_payment(&mut self, booking_id: BookingId) -> Result<(), StoreError> {
        self.payments.write(booking_id, None);
        Ok(())
    }
}
