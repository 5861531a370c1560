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

//! Booking coordinator.
//!
//! The [`Engine`] is the central component that books and cancels tickets.
//! It serializes work per ticket with a lock from its [`LockManager`], keeps
//! every inventory change in the same store transaction as the booking change
//! that caused it, and delegates counter arithmetic to the [`Ledger`].
//!
//! # Operations
//!
//! - **Create booking**: Reserve inventory and record a `Pending` booking.
//! - **Cancel booking**: Move a `Pending` booking to `Cancelled` and return
//!   its inventory.
//! - **Settle**: See [`settlement`](crate::settlement).
//! - **Catalog**: See [`catalog`](crate::catalog).
//!
//! # Thread Safety
//!
//! `Engine` is `Send + Sync` whenever its parts are. Operations on different
//! tickets run in parallel; operations on the same ticket queue on its lock.

use crate::base::{BookingId, CustomerId, TicketId};
use crate::config::EngineConfig;
use crate::ledger::{InventoryAudit, Ledger};
use crate::lifecycle::{BookingStatus, Transition};
use crate::lock::{self, LockGuard, LockManager, LockPolicy, MemoryLocks};
use crate::memory_store::MemoryStore;
use crate::model::{Booking, BookingDraft};
use crate::notify::{Notifier, TracingNotifier};
use crate::store::{Store, Transaction};
use crate::{BookingError, ErrorKind};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Ticket booking engine.
///
/// # Invariants
///
/// - For every ticket, `available` plus the quantities of its non-cancelled
///   bookings never changes except through a restock.
/// - `available` never goes negative.
/// - Bookings only move `Pending -> Confirmed` or `Pending -> Cancelled`.
pub struct Engine<S = MemoryStore, L = MemoryLocks, N = TracingNotifier> {
    pub(crate) store: S,
    pub(crate) locks: L,
    pub(crate) notifier: N,
    pub(crate) config: EngineConfig,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
    /// Number of items across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn last_page(&self) -> usize {
        self.total.div_ceil(self.per_page).max(1)
    }
}

impl Engine {
    /// Creates an engine on an empty in-memory store with default settings.
    pub fn new() -> Self {
        Self::with_parts(
            MemoryStore::new(),
            MemoryLocks::new(),
            TracingNotifier,
            EngineConfig::default(),
        )
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store, L: LockManager, N: Notifier> Engine<S, L, N> {
    pub fn with_parts(store: S, locks: L, notifier: N, config: EngineConfig) -> Self {
        Engine {
            store,
            locks,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &L {
        &self.locks
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn lock(&self, key: String) -> Result<LockGuard<'_, L>, BookingError> {
        LockGuard::acquire(&self.locks, key, LockPolicy::from(&self.config))
    }

    /// Cuts page `page` (1-based) out of `all`. Without `per_page` the
    /// configured page size applies.
    pub(crate) fn paginate<T>(
        &self,
        all: Vec<T>,
        page: usize,
        per_page: Option<usize>,
    ) -> Page<T> {
        let page = page.max(1);
        let per_page = per_page.unwrap_or(self.config.page_size).max(1);
        Page {
            total: all.len(),
            items: all
                .into_iter()
                .skip((page - 1).saturating_mul(per_page))
                .take(per_page)
                .collect(),
            page,
            per_page,
        }
    }

    /// Books `quantity` units of a ticket for a customer.
    ///
    /// The returned booking is `Pending` and its quantity has already been
    /// taken out of the ticket's stock.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidQuantity`] - `quantity` is zero.
    /// - [`BookingError::TicketNotFound`] - No such ticket.
    /// - [`BookingError::InsufficientInventory`] - Not enough tickets left.
    /// - [`BookingError::LockUnavailable`] - Ticket contested for too long.
    /// - [`BookingError::Store`] - Persistence failed; nothing was written.
    #[instrument(skip(self))]
    pub fn create_booking(
        &self,
        ticket_id: TicketId,
        customer_id: CustomerId,
        quantity: u32,
    ) -> Result<Booking, BookingError> {
        let result = self.reserve_and_record(ticket_id, customer_id, quantity);
        match &result {
            Ok(booking) => info!(booking_id = %booking.id, "booking created"),
            Err(error) => log_failure("create booking", error),
        }
        result
    }

    fn reserve_and_record(
        &self,
        ticket_id: TicketId,
        customer_id: CustomerId,
        quantity: u32,
    ) -> Result<Booking, BookingError> {
        if quantity == 0 {
            return Err(BookingError::InvalidQuantity);
        }

        // Held until return so no other booking sees the stock we check.
        let _ticket_lock = self.lock(lock::ticket_key(ticket_id))?;

        self.store.transaction(|tx| {
            let ticket = tx.ticket_or_fail(ticket_id)?;
            if quantity > ticket.available {
                return Err(BookingError::InsufficientInventory {
                    requested: quantity,
                    available: ticket.available,
                });
            }

            let booking = tx.insert_booking(BookingDraft {
                customer_id,
                ticket_id,
                quantity,
                status: BookingStatus::Pending,
            })?;
            Ledger::reserve(tx, ticket_id, quantity)?;
            Ok(booking)
        })
    }

    /// Cancels a customer's pending booking and returns its inventory.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] - No such booking for this customer.
    /// - [`BookingError::AlreadyCancelled`] - Booking was cancelled before.
    /// - [`BookingError::CannotCancelConfirmed`] - Booking is paid.
    /// - [`BookingError::LockUnavailable`] / [`BookingError::Store`] - Transient.
    #[instrument(skip(self))]
    pub fn cancel_booking(
        &self,
        booking_id: BookingId,
        customer_id: CustomerId,
    ) -> Result<Booking, BookingError> {
        let result = self.cancel_and_release(booking_id, customer_id);
        match &result {
            Ok(booking) => info!(
                ticket_id = %booking.ticket_id,
                quantity = booking.quantity,
                "booking cancelled"
            ),
            Err(error) => log_failure("cancel booking", error),
        }
        result
    }

    fn cancel_and_release(
        &self,
        booking_id: BookingId,
        customer_id: CustomerId,
    ) -> Result<Booking, BookingError> {
        let ticket_id = self
            .store
            .read(|tx| owned_booking(tx, customer_id, booking_id))?
            .ticket_id;

        // Booking before ticket, the same order settlement and booking use.
        let _booking_lock = self.lock(lock::booking_key(booking_id))?;
        let _ticket_lock = self.lock(lock::ticket_key(ticket_id))?;

        self.store.transaction(|tx| {
            let mut booking = owned_booking(tx, customer_id, booking_id)?;
            booking.status = booking.status.apply(Transition::Cancel)?;
            tx.update_booking(&booking)?;
            Ledger::release(tx, booking.ticket_id, booking.quantity)?;
            Ok(booking)
        })
    }

    /// Returns one of the customer's bookings.
    pub fn booking(
        &self,
        customer_id: CustomerId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        self.store
            .read(|tx| owned_booking(tx, customer_id, booking_id))
    }

    /// Lists the customer's bookings by id, `page` starting at 1.
    ///
    /// `per_page` falls back to [`EngineConfig::page_size`].
    pub fn bookings_for_customer(
        &self,
        customer_id: CustomerId,
        page: usize,
        per_page: Option<usize>,
    ) -> Result<Page<Booking>, BookingError> {
        let all = self
            .store
            .read(|tx| tx.bookings_where(&|booking| booking.customer_id == customer_id))?;
        Ok(self.paginate(all, page, per_page))
    }

    /// Reports how a ticket's stock splits between available and reserved.
    pub fn inventory(&self, ticket_id: TicketId) -> Result<InventoryAudit, BookingError> {
        self.store.read(|tx| Ledger::audit(tx, ticket_id))
    }
}

/// Finds a booking only if `customer_id` owns it.
pub(crate) fn owned_booking<T: Transaction + ?Sized>(
    tx: &mut T,
    customer_id: CustomerId,
    booking_id: BookingId,
) -> Result<Booking, BookingError> {
    tx.booking(booking_id)?
        .filter(|booking| booking.customer_id == customer_id)
        .ok_or(BookingError::BookingNotFound(booking_id))
}

/// Logs a failed operation at a level matching how bad it is.
pub(crate) fn log_failure(operation: &'static str, failure: &BookingError) {
    match failure.kind() {
        ErrorKind::Transient => error!(operation, error = %failure, retryable = true, "operation failed"),
        ErrorKind::NotFound | ErrorKind::InsufficientInventory | ErrorKind::Domain => {
            warn!(operation, error = %failure, "operation rejected")
        }
    }
}
