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

//! Key account ledger.
//!
//! The ledger owns every [`KeyAccount`] and routes balance operations to
//! the right one. Accounts are independent: operations on different
//! accounts proceed in parallel, while two reservations against the same
//! account serialize on that account's lock.

use crate::account::{BudgetSnapshot, KeyAccount};
use crate::base::KeyAccountId;
use crate::error::ApprovalError;
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Ledger of key accounts indexed by account ID.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<KeyAccountId, KeyAccount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Creates the account or re-allocates an existing one.
    ///
    /// `used_amount` survives a re-allocation; shrinking the total below
    /// committed spend fails with [`ApprovalError::Validation`].
    pub fn upsert_account(
        &self,
        account_id: KeyAccountId,
        name: &str,
        account_type: &str,
        total_budget: Decimal,
    ) -> Result<(), ApprovalError> {
        if name.trim().is_empty() {
            return Err(ApprovalError::Validation("account name must not be empty"));
        }
        match self.accounts.get(&account_id) {
            Some(account) => account.reallocate(name, account_type, total_budget),
            None => {
                if total_budget < Decimal::ZERO {
                    return Err(ApprovalError::Validation("total budget must not be negative"));
                }
                self.accounts
                    .insert(account_id, KeyAccount::new(account_id, name, account_type, total_budget));
                Ok(())
            }
        }
    }

    pub fn contains(&self, account_id: KeyAccountId) -> bool {
        self.accounts.contains_key(&account_id)
    }

    /// Returns `{total, used, available}` for the account.
    ///
    /// # Errors
    ///
    /// [`ApprovalError::NotFound`] if the account does not exist.
    pub fn available_balance(&self, account_id: KeyAccountId) -> Result<BudgetSnapshot, ApprovalError> {
        self.accounts
            .get(&account_id)
            .map(|account| account.snapshot())
            .ok_or(ApprovalError::NotFound)
    }

    /// Atomically commits `amount` against the account's allocation.
    ///
    /// The check and the increment run under the account's own lock, so two
    /// concurrent reservations that would jointly overdraw the account
    /// cannot both succeed.
    pub fn reserve(&self, account_id: KeyAccountId, amount: Decimal) -> Result<(), ApprovalError> {
        self.accounts
            .get(&account_id)
            .ok_or(ApprovalError::NotFound)?
            .reserve(amount)
    }

    /// Returns previously committed spend (compensating rollback).
    pub fn release(&self, account_id: KeyAccountId, amount: Decimal) -> Result<(), ApprovalError> {
        self.accounts
            .get(&account_id)
            .ok_or(ApprovalError::NotFound)?
            .release(amount)
    }

    /// Iterates over all accounts, for balance reports.
    pub fn accounts(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, KeyAccountId, KeyAccount>> {
        self.accounts.iter()
    }

    pub fn get_account(
        &self,
        account_id: &KeyAccountId,
    ) -> Option<dashmap::mapref::one::Ref<'_, KeyAccountId, KeyAccount>> {
        self.accounts.get(account_id)
    }
}
