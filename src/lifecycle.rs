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

//! Booking lifecycle.
//!
//! Bookings follow a state machine:
//! - [`Pending`] → [`Confirmed`] (via successful settlement)
//! - [`Pending`] → [`Cancelled`] (via customer cancellation, returns inventory)
//!
//! Both `Confirmed` and `Cancelled` are terminal.
//!
//! [`Pending`]: BookingStatus::Pending
//! [`Confirmed`]: BookingStatus::Confirmed
//! [`Cancelled`]: BookingStatus::Cancelled

use crate::BookingError;
use serde::{Deserialize, Serialize};

//  Pending ──confirm──► Confirmed
//     │
//     └────cancel────► Cancelled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Cancel,
}

impl BookingStatus {
    /// Returns the state reached by `transition`, or the reason it is illegal.
    pub fn apply(self, transition: Transition) -> Result<BookingStatus, BookingError> {
        match (self, transition) {
            (Self::Pending, Transition::Confirm) => Ok(Self::Confirmed),
            (Self::Pending, Transition::Cancel) => Ok(Self::Cancelled),
            (Self::Confirmed, Transition::Confirm) => Err(BookingError::AlreadyConfirmed),
            (Self::Confirmed, Transition::Cancel) => Err(BookingError::CannotCancelConfirmed),
            (Self::Cancelled, Transition::Confirm) => Err(BookingError::CannotPayCancelled),
            (Self::Cancelled, Transition::Cancel) => Err(BookingError::AlreadyCancelled),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether a booking in this state still holds its quantity against the ticket.
    pub fn holds_inventory(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
