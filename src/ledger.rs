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

//! Inventory ledger.
//!
//! Every change to a ticket's `available` counter goes through here, inside
//! the caller's transaction. Callers hold the ticket lock while they do.
//!
//! # Example
//!
//! ```
//! use box_office::{Ledger, MemoryStore, Store, Transaction, EventId, TicketDraft, TicketType};
//! use rust_decimal_macros::dec;
//!
//! let store = MemoryStore::new();
//! let ticket = store
//!     .transaction(|tx| {
//!         let ticket = tx.insert_ticket(TicketDraft {
//!             event_id: EventId(1),
//!             ticket_type: TicketType::Standard,
//!             price: dec!(50.00),
//!             available: 10,
//!         })?;
//!         Ledger::reserve(tx, ticket.id, 2)
//!     })
//!     .unwrap();
//! assert_eq!(ticket.available, 8);
//! ```

use crate::BookingError;
use crate::base::TicketId;
use crate::model::Ticket;
use crate::store::Transaction;
use serde::Serialize;

/// Where a ticket's original stock currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventoryAudit {
    pub ticket_id: TicketId,
    pub available: u32,
    /// Sum of quantities of bookings that still hold inventory.
    pub reserved: u64,
}

impl InventoryAudit {
    /// `available + reserved`: constant for a ticket between restocks.
    pub fn total(&self) -> u64 {
        u64::from(self.available) + self.reserved
    }
}

pub struct Ledger;

impl Ledger {
    /// Takes `quantity` out of the ticket's stock.
    ///
    /// # Errors
    ///
    /// - [`BookingError::TicketNotFound`] - No such ticket.
    /// - [`BookingError::InsufficientInventory`] - Fewer than `quantity` left;
    ///   nothing is written.
    pub fn reserve<T: Transaction + ?Sized>(
        tx: &mut T,
        ticket_id: TicketId,
        quantity: u32,
    ) -> Result<Ticket, BookingError> {
        let mut ticket = tx.ticket_or_fail(ticket_id)?;
        ticket.debit(quantity)?;
        tx.update_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Puts `quantity` back into the ticket's stock.
    ///
    /// Releasing the same reservation twice is not detected here; the booking
    /// lifecycle prevents it.
    pub fn release<T: Transaction + ?Sized>(
        tx: &mut T,
        ticket_id: TicketId,
        quantity: u32,
    ) -> Result<Ticket, BookingError> {
        let mut ticket = tx.ticket_or_fail(ticket_id)?;
        ticket.credit(quantity);
        tx.update_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Overwrites the ticket's stock with `available`.
    pub fn restock<T: Transaction + ?Sized>(
        tx: &mut T,
        ticket_id: TicketId,
        available: u32,
    ) -> Result<Ticket, BookingError> {
        let mut ticket = tx.ticket_or_fail(ticket_id)?;
        ticket.available = available;
        tx.update_ticket(&ticket)?;
        Ok(ticket)
    }

    pub fn audit<T: Transaction + ?Sized>(
        tx: &mut T,
        ticket_id: TicketId,
    ) -> Result<InventoryAudit, BookingError> {
        let ticket = tx.ticket_or_fail(ticket_id)?;
        let reserved = tx
            .bookings_where(&|booking| {
                booking.ticket_id == ticket_id && booking.status.holds_inventory()
            })?
            .iter()
            .map(|booking| u64::from(booking.quantity))
            .sum();
        Ok(InventoryAudit {
            ticket_id,
            available: ticket.available,
            reserved,
        })
    }
}
