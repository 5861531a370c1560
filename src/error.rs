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

//! Error types for booking, inventory and settlement.

use crate::base::{BookingId, EventId, PaymentId, TicketId};
use thiserror::Error;

/// Persistence layer failures.
///
/// Both variants leave no partial effect behind: the transaction that hit
/// them was discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row read by the transaction changed before it could commit
    #[error("write conflict on {0}")]
    Conflict(String),

    /// The store could not complete the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Booking core errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Referenced ticket does not exist
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),

    /// Referenced booking does not exist or is not owned by the caller
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// Referenced payment does not exist
    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// Referenced event does not exist or is not owned by the caller
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// Requested quantity exceeds what is left for the ticket
    #[error("requested quantity exceeds available tickets (requested {requested}, available {available})")]
    InsufficientInventory { requested: u32, available: u32 },

    /// Quantity is zero
    #[error("invalid quantity (must be at least 1)")]
    InvalidQuantity,

    /// Price is negative
    #[error("invalid price (must not be negative)")]
    InvalidPrice,

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("booking is already confirmed")]
    AlreadyConfirmed,

    #[error("cannot cancel a confirmed booking")]
    CannotCancelConfirmed,

    #[error("cannot pay for a cancelled booking")]
    CannotPayCancelled,

    /// The payment attempt was declined
    #[error("payment declined")]
    PaymentDeclined,

    /// The lock guarding a ticket or booking is held by someone else
    #[error("resource busy, retry later ({key})")]
    LockUnavailable { key: String },

    /// The persistence layer failed; nothing was committed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification used by callers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InsufficientInventory,
    Domain,
    Transient,
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TicketNotFound(_)
            | Self::BookingNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::EventNotFound(_) => ErrorKind::NotFound,
            Self::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            Self::InvalidQuantity
            | Self::InvalidPrice
            | Self::AlreadyCancelled
            | Self::AlreadyConfirmed
            | Self::CannotCancelConfirmed
            | Self::CannotPayCancelled
            | Self::PaymentDeclined => ErrorKind::Domain,
            Self::LockUnavailable { .. } | Self::Store(_) => ErrorKind::Transient,
        }
    }

    /// Whether resubmitting the same operation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(BookingError::TicketNotFound(TicketId(4)).to_string(), "ticket 4 not found");
        assert_eq!(
            BookingError::InsufficientInventory {
                requested: 6,
                available: 4
            }
            .to_string(),
            "requested quantity exceeds available tickets (requested 6, available 4)"
        );
        assert_eq!(
            BookingError::CannotCancelConfirmed.to_string(),
            "cannot cancel a confirmed booking"
        );
        assert_eq!(
            BookingError::AlreadyCancelled.to_string(),
            "booking is already cancelled"
        );
        assert_eq!(
            BookingError::CannotPayCancelled.to_string(),
            "cannot pay for a cancelled booking"
        );
        assert_eq!(
            BookingError::Store(StoreError::Conflict("ticket 1".into())).to_string(),
            "write conflict on ticket 1"
        );
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(BookingError::LockUnavailable { key: "ticket:1".into() }.is_retryable());
        assert!(BookingError::Store(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!BookingError::AlreadyCancelled.is_retryable());
        assert!(!BookingError::BookingNotFound(BookingId(1)).is_retryable());
        assert!(
            !BookingError::InsufficientInventory {
                requested: 2,
                available: 1
            }
            .is_retryable()
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(BookingError::EventNotFound(EventId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(BookingError::PaymentDeclined.kind(), ErrorKind::Domain);
        assert_eq!(
            BookingError::InsufficientInventory {
                requested: 2,
                available: 1
            }
            .kind(),
            ErrorKind::InsufficientInventory
        );
    }
}
