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

//! Error types for ledger and approval-workflow operations.

use crate::request::RequestStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Approval workflow and ledger errors.
///
/// Every variant maps to a distinct caller decision: `Validation` is the
/// caller's input, `InvalidTransition` means the caller holds a stale view
/// and should re-read before retrying, `InsufficientBudget` carries the
/// current available amount so the caller can adjust.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    /// Malformed input (non-positive amount, empty reason/feedback, missing identifier)
    #[error("validation failed: {0}")]
    Validation(&'static str),

    /// Caller lacks the required role or does not own the request
    #[error("actor lacks role or ownership for this operation")]
    Forbidden,

    /// Referenced entity (account, request, department, category) does not exist
    #[error("referenced entity not found")]
    NotFound,

    /// The request's current status does not permit the attempted transition
    #[error("transition not permitted from status {from}")]
    InvalidTransition {
        /// Status the request was in when the transition was refused
        from: RequestStatus,
    },

    /// Reserving the amount would overdraw the key account
    #[error("insufficient budget (available {available})")]
    InsufficientBudget {
        /// Amount still available on the account at the time of refusal
        available: Decimal,
    },

    /// Transient storage fault; nothing was committed, the whole operation
    /// is safe to retry. The in-memory store never produces this; the CSV
    /// and REST surfaces map I/O failures onto it.
    #[error("storage unavailable")]
    StorageUnavailable,
}

#[cfg(test)]
mod tests {
    use super::ApprovalError;
    use crate::request::RequestStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            ApprovalError::Validation("amount must be positive").to_string(),
            "validation failed: amount must be positive"
        );
        assert_eq!(
            ApprovalError::Forbidden.to_string(),
            "actor lacks role or ownership for this operation"
        );
        assert_eq!(ApprovalError::NotFound.to_string(), "referenced entity not found");
        assert_eq!(
            ApprovalError::InvalidTransition {
                from: RequestStatus::Approved
            }
            .to_string(),
            "transition not permitted from status approved"
        );
        assert_eq!(
            ApprovalError::InsufficientBudget {
                available: dec!(600.00)
            }
            .to_string(),
            "insufficient budget (available 600.00)"
        );
        assert_eq!(ApprovalError::StorageUnavailable.to_string(), "storage unavailable");
    }

    #[test]
    fn errors_are_cloneable() {
        let error = ApprovalError::InsufficientBudget {
            available: dec!(10),
        };
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }

    #[test]
    fn insufficient_budget_carries_available_amount() {
        let error = ApprovalError::InsufficientBudget {
            available: dec!(600),
        };
        match error {
            ApprovalError::InsufficientBudget { available } => {
                assert_eq!(available, dec!(600));
            }
            _ => panic!("wrong variant"),
        }
    }
}
