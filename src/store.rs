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

//! Request store.
//!
//! Durable record of withdrawal requests. Rows live behind one `RwLock`;
//! reads clone out projections, while the approval state machine takes the
//! write guard for the full span of any multi-row transition, which is what
//! makes approve and resolve all-or-nothing with respect to other
//! transitions.

use crate::base::{CategoryId, DepartmentId, KeyAccountId, RequestId, UserId};
use crate::error::ApprovalError;
use crate::request::{RequestStatus, WithdrawalRequest};
use chrono::Utc;
use parking_lot::{RwLock, RwLockWriteGuard};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One draft line in a bulk draft submission.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DraftEntry {
    pub key_account_id: KeyAccountId,
    pub category_id: Option<CategoryId>,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Default)]
pub(crate) struct StoreData {
    rows: HashMap<RequestId, WithdrawalRequest>,
    next_id: u64,
}

impl StoreData {
    pub(crate) fn allocate_id(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId(self.next_id)
    }

    pub(crate) fn insert(&mut self, row: WithdrawalRequest) {
        self.rows.insert(row.id, row);
    }

    pub(crate) fn get(&self, id: RequestId) -> Option<&WithdrawalRequest> {
        self.rows.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RequestId) -> Option<&mut WithdrawalRequest> {
        self.rows.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: RequestId) -> Option<WithdrawalRequest> {
        self.rows.remove(&id)
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.rows.values()
    }

    /// A parent has at most one live revision child at a time.
    pub(crate) fn live_child_of(&self, parent_id: RequestId) -> Option<RequestId> {
        self.rows
            .values()
            .find(|row| row.parent_request_id == Some(parent_id) && row.status.is_live())
            .map(|row| row.id)
    }
}

/// Store of withdrawal request rows.
#[derive(Debug, Default)]
pub struct RequestStore {
    inner: RwLock<StoreData>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive guard for state-machine transitions that touch more than
    /// one row or must couple a row write to a ledger reservation.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.inner.write()
    }

    /// Inserts a new request with status Pending, version 1, no parent.
    ///
    /// # Errors
    ///
    /// [`ApprovalError::Validation`] if the amount is not positive or the
    /// reason is empty.
    pub fn create(
        &self,
        user_id: UserId,
        department_id: DepartmentId,
        key_account_id: KeyAccountId,
        category_id: Option<CategoryId>,
        amount: Decimal,
        reason: &str,
    ) -> Result<RequestId, ApprovalError> {
        validate_amount(amount)?;
        validate_reason(reason)?;

        let mut data = self.inner.write();
        let id = data.allocate_id();
        let now = Utc::now();
        data.insert(WithdrawalRequest {
            id,
            user_id,
            department_id,
            key_account_id,
            category_id,
            amount,
            reason: reason.trim().to_string(),
            status: RequestStatus::Pending,
            version: 1,
            parent_request_id: None,
            approved_by: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    /// Upserts draft rows, one per entry, idempotent per (user, account).
    ///
    /// Re-saving a draft for a (user, key account) pair that already has a
    /// Draft row updates that row's amount, reason, and category instead of
    /// inserting a duplicate. Entries are validated before anything is
    /// written, so a bad entry leaves the store untouched.
    pub fn save_draft(
        &self,
        user_id: UserId,
        department_id: DepartmentId,
        entries: &[DraftEntry],
    ) -> Result<Vec<RequestId>, ApprovalError> {
        for entry in entries {
            validate_amount(entry.amount)?;
            validate_reason(&entry.reason)?;
        }

        let mut data = self.inner.write();
        let now = Utc::now();
        let mut ids = Vec::with_capacity(entries.len());

        for entry in entries {
            let existing = data
                .rows()
                .find(|row| {
                    row.user_id == user_id
                        && row.key_account_id == entry.key_account_id
                        && row.status == RequestStatus::Draft
                })
                .map(|row| row.id);

            match existing {
                Some(id) => {
                    let row = data.get_mut(id).expect("draft row present");
                    row.amount = entry.amount;
                    row.reason = entry.reason.trim().to_string();
                    row.category_id = entry.category_id;
                    row.department_id = department_id;
                    row.updated_at = now;
                    ids.push(id);
                }
                None => {
                    let id = data.allocate_id();
                    data.insert(WithdrawalRequest {
                        id,
                        user_id,
                        department_id,
                        key_account_id: entry.key_account_id,
                        category_id: entry.category_id,
                        amount: entry.amount,
                        reason: entry.reason.trim().to_string(),
                        status: RequestStatus::Draft,
                        version: 1,
                        parent_request_id: None,
                        approved_by: None,
                        feedback: None,
                        created_at: now,
                        updated_at: now,
                    });
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }

    pub fn get(&self, id: RequestId) -> Option<WithdrawalRequest> {
        self.inner.read().get(id).cloned()
    }

    pub fn list_by_user(&self, user_id: UserId) -> Vec<WithdrawalRequest> {
        let mut rows: Vec<_> = self
            .inner
            .read()
            .rows()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    pub fn list_pending(&self) -> Vec<WithdrawalRequest> {
        let mut rows: Vec<_> = self
            .inner
            .read()
            .rows()
            .filter(|row| row.status == RequestStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    pub fn list_by_department(
        &self,
        department_id: DepartmentId,
        status: Option<RequestStatus>,
    ) -> Vec<WithdrawalRequest> {
        let mut rows: Vec<_> = self
            .inner
            .read()
            .rows()
            .filter(|row| {
                row.department_id == department_id
                    && status.is_none_or(|wanted| row.status == wanted)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }
}

fn validate_amount(amount: Decimal) -> Result<(), ApprovalError> {
    if amount <= Decimal::ZERO {
        return Err(ApprovalError::Validation("amount must be positive"));
    }
    Ok(())
}

fn validate_reason(reason: &str) -> Result<(), ApprovalError> {
    if reason.trim().is_empty() {
        return Err(ApprovalError::Validation("reason must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(account: u32, amount: Decimal) -> DraftEntry {
        DraftEntry {
            key_account_id: KeyAccountId(account),
            category_id: None,
            amount,
            reason: "office supplies".to_string(),
        }
    }

    #[test]
    fn create_starts_pending_version_one() {
        let store = RequestStore::new();
        let id = store
            .create(
                UserId(1),
                DepartmentId(1),
                KeyAccountId(1),
                None,
                dec!(100.00),
                "printer toner",
            )
            .unwrap();

        let row = store.get(id).unwrap();
        assert_eq!(row.status, RequestStatus::Pending);
        assert_eq!(row.version, 1);
        assert_eq!(row.parent_request_id, None);
        assert_eq!(row.approved_by, None);
    }

    #[test]
    fn create_rejects_bad_input() {
        let store = RequestStore::new();
        assert!(matches!(
            store.create(UserId(1), DepartmentId(1), KeyAccountId(1), None, dec!(0), "x"),
            Err(ApprovalError::Validation(_))
        ));
        assert!(matches!(
            store.create(UserId(1), DepartmentId(1), KeyAccountId(1), None, dec!(10), "  "),
            Err(ApprovalError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn save_draft_is_idempotent_per_user_account() {
        let store = RequestStore::new();
        let first = store
            .save_draft(UserId(1), DepartmentId(1), &[entry(1, dec!(50))])
            .unwrap();
        let second = store
            .save_draft(UserId(1), DepartmentId(1), &[entry(1, dec!(75))])
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first[0]).unwrap().amount, dec!(75));
    }

    #[test]
    fn save_draft_different_accounts_make_separate_rows() {
        let store = RequestStore::new();
        let ids = store
            .save_draft(
                UserId(1),
                DepartmentId(1),
                &[entry(1, dec!(50)), entry(2, dec!(60))],
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn save_draft_validates_before_writing() {
        let store = RequestStore::new();
        let result = store.save_draft(
            UserId(1),
            DepartmentId(1),
            &[entry(1, dec!(50)), entry(2, dec!(-1))],
        );
        assert!(matches!(result, Err(ApprovalError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn list_projections_filter_and_sort() {
        let store = RequestStore::new();
        let a = store
            .create(UserId(1), DepartmentId(1), KeyAccountId(1), None, dec!(10), "a")
            .unwrap();
        let b = store
            .create(UserId(2), DepartmentId(1), KeyAccountId(1), None, dec!(20), "b")
            .unwrap();
        let c = store
            .create(UserId(1), DepartmentId(2), KeyAccountId(2), None, dec!(30), "c")
            .unwrap();

        let mine = store.list_by_user(UserId(1));
        assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, c]);

        let pending = store.list_pending();
        assert_eq!(pending.len(), 3);

        let dept = store.list_by_department(DepartmentId(1), Some(RequestStatus::Pending));
        assert_eq!(dept.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);
    }
}
