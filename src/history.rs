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

//! Append-only revision history log.
//!
//! Every amount-changing transition (admin counter-offer, user
//! resubmission, resolve-merge) appends one entry. Entries are never
//! mutated or deleted. The engine always appends while it still holds the
//! store guard of the transition that produced the delta, so history and
//! request state cannot diverge.

use crate::base::{RequestId, UserId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One recorded amount change on a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionHistoryEntry {
    pub request_id: RequestId,
    pub previous_amount: Decimal,
    pub new_amount: Decimal,
    pub feedback: Option<String>,
    pub revised_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of amount changes across all requests.
#[derive(Debug, Default)]
pub struct RevisionLog {
    entries: Mutex<Vec<RevisionHistoryEntry>>,
}

impl RevisionLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends one entry. Infallible for the in-memory log.
    pub fn append(
        &self,
        request_id: RequestId,
        previous_amount: Decimal,
        new_amount: Decimal,
        feedback: Option<String>,
        revised_by: UserId,
    ) {
        let entry = RevisionHistoryEntry {
            request_id,
            previous_amount,
            new_amount,
            feedback,
            revised_by,
            created_at: Utc::now(),
        };
        tracing::debug!(
            request = %request_id,
            previous = %previous_amount,
            new = %new_amount,
            actor = %revised_by,
            "revision history appended"
        );
        self.entries.lock().push(entry);
    }

    /// Entries for one request, in append order.
    pub fn for_request(&self, request_id: RequestId) -> Vec<RevisionHistoryEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.request_id == request_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
