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

//! Withdrawal requests and their status state machine.
//!
//! Requests follow a closed state machine:
//! - [`Draft`] → [`Pending`] (via submit)
//! - [`Pending`] → [`Approved`] | [`Rejected`] | [`Revision`]
//! - [`Revision`] → [`Pending`] (via resubmission) or [`Approved`] (via resolve)
//!
//! `Approved` and `Rejected` are terminal.
//!
//! [`Draft`]: RequestStatus::Draft
//! [`Pending`]: RequestStatus::Pending
//! [`Approved`]: RequestStatus::Approved
//! [`Rejected`]: RequestStatus::Rejected
//! [`Revision`]: RequestStatus::Revision

use crate::base::{CategoryId, DepartmentId, KeyAccountId, RequestId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a withdrawal request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Draft,
    Pending,
    Revision,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// The explicit transition table. Every status change in the engine
    /// goes through this check; there are no string comparisons at call
    /// sites.
    pub fn can_transition(self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Draft, Pending)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Revision)
                | (Revision, Pending)
                | (Revision, Approved)
                | (Revision, Rejected)
        )
    }

    /// Approved and Rejected admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    /// Pending and Revision are the only mutable, "live" states.
    pub fn is_live(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Revision)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Draft => "draft",
            RequestStatus::Pending => "pending",
            RequestStatus::Revision => "revision",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A withdrawal (or credit) request row.
///
/// Rows are owned by the request store and mutated only through approval
/// state-machine transitions. A revision child row points at its
/// non-revision ancestor through `parent_request_id` and is deleted when
/// resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub key_account_id: KeyAccountId,
    pub category_id: Option<CategoryId>,
    pub amount: Decimal,
    pub reason: String,
    pub status: RequestStatus,
    pub version: u32,
    pub parent_request_id: Option<RequestId>,
    pub approved_by: Option<UserId>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::RequestStatus::*;

    #[test]
    fn legal_transitions() {
        assert!(Draft.can_transition(Pending));
        assert!(Pending.can_transition(Approved));
        assert!(Pending.can_transition(Rejected));
        assert!(Pending.can_transition(Revision));
        assert!(Revision.can_transition(Pending));
        assert!(Revision.can_transition(Approved));
        assert!(Revision.can_transition(Rejected));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for from in [Approved, Rejected] {
            for to in [Draft, Pending, Revision, Approved, Rejected] {
                assert!(!from.can_transition(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn draft_only_submits() {
        assert!(!Draft.can_transition(Approved));
        assert!(!Draft.can_transition(Rejected));
        assert!(!Draft.can_transition(Revision));
    }

    #[test]
    fn no_self_transitions() {
        for status in [Draft, Pending, Revision, Approved, Rejected] {
            assert!(!status.can_transition(status));
        }
    }

    #[test]
    fn live_and_terminal_partition() {
        assert!(Pending.is_live());
        assert!(Revision.is_live());
        assert!(!Draft.is_live());
        assert!(Approved.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&Revision).unwrap(), "\"revision\"");
    }
}
