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

//! # Box Office
//!
//! This library provides a ticket booking core: inventory that cannot be
//! oversold under concurrent booking, a booking lifecycle (pending,
//! confirmed, cancelled) and mock payment settlement.
//!
//! ## Core Components
//!
//! - [`Engine`]: Books, cancels and settles; owns the collaborators below
//! - [`Ledger`]: Reserve/release arithmetic on a ticket's stock
//! - [`BookingStatus`]: Booking state machine
//! - [`Store`] / [`MemoryStore`]: Transactional persistence seam
//! - [`LockManager`] / [`MemoryLocks`]: Per-ticket locks with expiring leases
//! - [`Notifier`]: Best-effort customer notifications
//! - [`BookingError`]: Error types for every operation
//!
//! ## Example
//!
//! ```
//! use box_office::{
//!     BookingStatus, CustomerId, Engine, EventDetails, OrganizerId, PaymentStatus, TicketType,
//! };
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let event = engine
//!     .create_event(OrganizerId(1), EventDetails::new("Concert", "Main Hall"))
//!     .unwrap();
//! let ticket = engine
//!     .create_ticket(OrganizerId(1), event.id, TicketType::Standard, dec!(50.00), 10)
//!     .unwrap();
//!
//! // Book two tickets
//! let booking = engine.create_booking(ticket.id, CustomerId(7), 2).unwrap();
//! assert_eq!(booking.status, BookingStatus::Pending);
//! assert_eq!(engine.ticket(ticket.id).unwrap().available, 8);
//!
//! // Pay for them
//! let payment = engine.settle(booking.id, false).unwrap();
//! assert_eq!(payment.amount, dec!(100.00));
//! assert_eq!(payment.status, PaymentStatus::Success);
//! ```
//!
//! ## Thread Safety
//!
//! The engine can be shared across threads. Bookings for the same ticket are
//! serialized by a ticket lock; store commits reject any transaction whose
//! rows changed underneath it.

pub mod base;
pub mod catalog;
pub mod config;
mod engine;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod lock;
pub mod memory_store;
pub mod model;
pub mod notify;
pub mod settlement;
pub mod store;

pub use base::{BookingId, CustomerId, EventId, OrganizerId, PaymentId, TicketId};
pub use catalog::{EventDetails, EventRemoval, EventUpdate, TicketUpdate};
pub use config::EngineConfig;
pub use engine::{Engine, Page};
pub use error::{BookingError, ErrorKind, StoreError};
pub use ledger::{InventoryAudit, Ledger};
pub use lifecycle::{BookingStatus, Transition};
pub use lock::{Lease, LockGuard, LockManager, LockPolicy, MemoryLocks};
pub use memory_store::{MemoryStore, MemoryTransaction};
pub use model::{
    Booking, BookingDraft, Event, EventDraft, Payment, PaymentStatus, Ticket, TicketDraft,
    TicketType,
};
pub use notify::{Notification, Notifier, NotifyError, Outbox, TracingNotifier};
pub use settlement::PaymentDetails;
pub use store::{Store, Transaction};
