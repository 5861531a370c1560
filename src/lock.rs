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

//! Keyed mutual exclusion with expiring leases.
//!
//! A [`LockManager`] grants at most one live [`Lease`] per key. Leases expire
//! after their TTL so a holder that vanished without releasing cannot block
//! the key forever. [`LockGuard`] ties a lease to a scope: it is released when
//! the guard drops, whichever way the scope is left.

use crate::BookingError;
use crate::base::{BookingId, EventId, TicketId};
use crate::config::EngineConfig;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Proof of ownership of a lock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lease {
    token: u64,
}

pub trait LockManager: Send + Sync {
    /// Takes `key` for at most `ttl`, or returns `None` if it is held.
    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<Lease>;

    /// Gives `key` back. Returns `false` when `lease` no longer owns it
    /// (expired and taken over, or already released).
    fn release(&self, key: &str, lease: Lease) -> bool;

    fn is_locked(&self, key: &str) -> bool;
}

pub fn event_key(id: EventId) -> String {
    format!("event:{id}")
}

pub fn ticket_key(id: TicketId) -> String {
    format!("ticket:{id}")
}

pub fn booking_key(id: BookingId) -> String {
    format!("booking:{id}")
}

#[derive(Debug, Clone, Copy)]
struct Held {
    token: u64,
    /// `None` when the ttl reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Held {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Single-process [`LockManager`] backed by a [`DashMap`] of leases.
#[derive(Debug)]
pub struct MemoryLocks {
    leases: DashMap<String, Held>,
    next_token: AtomicU64,
}

impl MemoryLocks {
    pub fn new() -> Self {
        Self {
            leases: DashMap::new(),
            next_token: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager for MemoryLocks {
    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<Lease> {
        let now = Instant::now();
        let held = Held {
            token: self.next_token.fetch_add(1, Ordering::Relaxed),
            expires_at: now.checked_add(ttl),
        };

        // Entry API keeps check-and-take atomic per key.
        match self.leases.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_live(now) {
                    return None;
                }
                warn!(key, "reclaiming expired lock");
                entry.insert(held);
            }
            Entry::Vacant(entry) => {
                entry.insert(held);
            }
        }
        Some(Lease { token: held.token })
    }

    fn release(&self, key: &str, lease: Lease) -> bool {
        self.leases
            .remove_if(key, |_, held| held.token == lease.token)
            .is_some()
    }

    fn is_locked(&self, key: &str) -> bool {
        self.leases
            .get(key)
            .is_some_and(|held| held.is_live(Instant::now()))
    }
}

/// How long to hold and how long to wait for a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub ttl: Duration,
    pub wait: Duration,
    pub retry: Duration,
}

impl From<&EngineConfig> for LockPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            ttl: config.lock_ttl,
            wait: config.lock_wait,
            retry: config.lock_retry,
        }
    }
}

/// A held lock, released on drop.
#[derive(Debug)]
pub struct LockGuard<'a, L: LockManager + ?Sized> {
    locks: &'a L,
    key: String,
    lease: Lease,
}

impl<'a, L: LockManager + ?Sized> LockGuard<'a, L> {
    /// Polls `locks` for `key` until it is granted or `policy.wait` runs out.
    /// A wait too long to represent never runs out.
    ///
    /// # Errors
    ///
    /// [`BookingError::LockUnavailable`] when the key stayed taken for the
    /// whole wait.
    pub fn acquire(locks: &'a L, key: String, policy: LockPolicy) -> Result<Self, BookingError> {
        let deadline = Instant::now().checked_add(policy.wait);
        loop {
            if let Some(lease) = locks.try_acquire(&key, policy.ttl) {
                debug!(%key, "lock acquired");
                return Ok(Self { locks, key, lease });
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(BookingError::LockUnavailable { key });
                    }
                    policy.retry.min(deadline - now)
                }
                None => policy.retry,
            };
            thread::sleep(pause);
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<L: LockManager + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if self.locks.release(&self.key, self.lease) {
            debug!(key = %self.key, "lock released");
        } else {
            warn!(key = %self.key, "lock lease lost before release");
        }
    }
}
