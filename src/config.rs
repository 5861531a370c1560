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

//! Engine tuning knobs.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on how long a ticket or booking lock may be held.
    ///
    /// A safety net against holders that never release; normal paths
    /// release as soon as the operation ends.
    pub lock_ttl: Duration,
    /// How long an operation waits for a contested lock before giving up.
    pub lock_wait: Duration,
    /// Pause between two attempts at a contested lock.
    pub lock_retry: Duration,
    /// Page size used when a listing does not ask for one.
    pub page_size: usize,
}

impl EngineConfig {
    pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);
    pub const DEFAULT_LOCK_RETRY: Duration = Duration::from_millis(2);
    pub const DEFAULT_PAGE_SIZE: usize = 15;

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn with_lock_retry(mut self, retry: Duration) -> Self {
        self.lock_retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Self::DEFAULT_LOCK_TTL,
            lock_wait: Self::DEFAULT_LOCK_WAIT,
            lock_retry: Self::DEFAULT_LOCK_RETRY,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_ttl, Duration::from_secs(300));
        assert_eq!(config.lock_wait, Duration::from_secs(2));
        assert_eq!(config.page_size, 15);
    }

    #[test]
    fn page_size_is_at_least_one() {
        let config = EngineConfig::default().with_page_size(0);
        assert_eq!(config.page_size, 1);
    }
}
