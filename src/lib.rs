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

//! # Budget Ledger
//!
//! This library tracks departmental spending against fixed key-account
//! allocations and drives the approval workflow for withdrawal requests:
//! draft → pending → revision(s) → approved/rejected, with an append-only
//! history of every amount change.
//!
//! ## Core Components
//!
//! - [`ApprovalEngine`]: state machine coupling status transitions to
//!   budget reservations
//! - [`Ledger`] / [`KeyAccount`]: allocation tracking with atomic
//!   check-and-increment reservations
//! - [`RequestStore`]: withdrawal request rows and their version chains
//! - [`RevisionLog`]: append-only amount-change audit trail
//! - [`ApprovalError`]: closed error taxonomy callers branch on
//!
//! ## Example
//!
//! ```
//! use budget_ledger_rs::{Actor, ApprovalEngine, DepartmentId, KeyAccountId};
//! use rust_decimal_macros::dec;
//!
//! let engine = ApprovalEngine::new();
//! let admin = Actor::admin(1);
//! let requester = Actor::user(2);
//!
//! engine.upsert_department(admin, DepartmentId(1), "Engineering").unwrap();
//! engine.upsert_account(admin, KeyAccountId(1), "IT operations", "expense", dec!(1000.00)).unwrap();
//!
//! let request = engine
//!     .create_request(requester, DepartmentId(1), KeyAccountId(1), None, dec!(250.00), "new monitors")
//!     .unwrap();
//! engine.approve(admin, request).unwrap();
//!
//! let budget = engine.available_budget(KeyAccountId(1)).unwrap();
//! assert_eq!(budget.used, dec!(250.00));
//! assert_eq!(budget.available, dec!(750.00));
//! ```
//!
//! ## Thread Safety
//!
//! The engine serves concurrent callers. Reservations on the same key
//! account serialize on that account's lock, so two approvals that would
//! jointly overdraw an allocation can never both succeed.

pub mod account;
mod base;
mod engine;
pub mod error;
mod history;
mod ledger;
mod registry;
mod request;
mod store;

pub use account::{BudgetSnapshot, KeyAccount};
pub use base::{Actor, CategoryId, DepartmentId, KeyAccountId, RequestId, Role, UserId};
pub use engine::ApprovalEngine;
pub use error::ApprovalError;
pub use history::{RevisionHistoryEntry, RevisionLog};
pub use ledger::Ledger;
pub use registry::{Category, Department, ReferenceData};
pub use request::{RequestStatus, WithdrawalRequest};
pub use store::{DraftEntry, RequestStore};
