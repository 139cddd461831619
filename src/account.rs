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

//! Key account management.
//!
//! A key account holds a fixed budget allocation (`total_budget`) and the
//! spend committed against it so far (`used_amount`). The reserve operation
//! is the only way `used_amount` grows, and it performs its check and its
//! increment under one lock acquisition.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use budget_ledger_rs::{KeyAccount, KeyAccountId};
//!
//! let account = KeyAccount::new(KeyAccountId(1), "IT operations", "expense", dec!(1000.00));
//! assert_eq!(account.snapshot().available, dec!(1000.00));
//! ```

use crate::ApprovalError;
use crate::base::KeyAccountId;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Point-in-time balance view of a key account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BudgetSnapshot {
    pub total: Decimal,
    pub used: Decimal,
    /// `total - used`, floored at zero for reporting.
    pub available: Decimal,
}

#[derive(Debug)]
struct AccountData {
    account_id: KeyAccountId,
    name: String,
    account_type: String,
    total_budget: Decimal,
    used_amount: Decimal,
}

impl AccountData {
    fn new(account_id: KeyAccountId, name: String, account_type: String, total: Decimal) -> Self {
        Self {
            account_id,
            name,
            account_type,
            total_budget: total,
            used_amount: Decimal::ZERO,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.used_amount >= Decimal::ZERO,
            "Invariant violated: used_amount went negative: {}",
            self.used_amount
        );
        debug_assert!(
            self.used_amount <= self.total_budget,
            "Invariant violated: used_amount {} exceeds total_budget {}",
            self.used_amount,
            self.total_budget
        );
    }

    fn available(&self) -> Decimal {
        (self.total_budget - self.used_amount).max(Decimal::ZERO)
    }

    /// Check-and-increment against the allocation. No mutation on failure.
    fn reserve(&mut self, amount: Decimal) -> Result<(), ApprovalError> {
        if amount <= Decimal::ZERO {
            return Err(ApprovalError::Validation("reserve amount must be positive"));
        }
        if self.used_amount + amount > self.total_budget {
            return Err(ApprovalError::InsufficientBudget {
                available: self.available(),
            });
        }
        self.used_amount += amount;
        self.assert_invariants();
        Ok(())
    }

    /// Compensating decrement, saturating at zero.
    fn release(&mut self, amount: Decimal) -> Result<(), ApprovalError> {
        if amount <= Decimal::ZERO {
            return Err(ApprovalError::Validation("release amount must be positive"));
        }
        if amount > self.used_amount {
            tracing::warn!(
                account = %self.account_id,
                used = %self.used_amount,
                release = %amount,
                "release exceeds committed spend, flooring at zero"
            );
            self.used_amount = Decimal::ZERO;
        } else {
            self.used_amount -= amount;
        }
        self.assert_invariants();
        Ok(())
    }

    /// Admin re-allocation. `used_amount` is preserved; shrinking the
    /// allocation below committed spend is refused.
    fn reallocate(&mut self, name: String, account_type: String, total: Decimal) -> Result<(), ApprovalError> {
        if total < Decimal::ZERO {
            return Err(ApprovalError::Validation("total budget must not be negative"));
        }
        if total < self.used_amount {
            return Err(ApprovalError::Validation(
                "total budget must not drop below committed spend",
            ));
        }
        self.name = name;
        self.account_type = account_type;
        self.total_budget = total;
        self.assert_invariants();
        Ok(())
    }
}

/// A budget key account.
///
/// All balance state sits behind a single mutex, so the reserve
/// check-and-increment is atomic against concurrent approvals on the same
/// account.
#[derive(Debug)]
pub struct KeyAccount {
    inner: Mutex<AccountData>,
}

impl KeyAccount {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(
        account_id: KeyAccountId,
        name: impl Into<String>,
        account_type: impl Into<String>,
        total_budget: Decimal,
    ) -> Self {
        Self {
            inner: Mutex::new(AccountData::new(
                account_id,
                name.into(),
                account_type.into(),
                total_budget,
            )),
        }
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    pub fn account_type(&self) -> String {
        self.inner.lock().account_type.clone()
    }

    pub fn total_budget(&self) -> Decimal {
        self.inner.lock().total_budget
    }

    pub fn used_amount(&self) -> Decimal {
        self.inner.lock().used_amount
    }

    /// Returns `{total, used, available}` from one lock acquisition, so the
    /// three figures are mutually consistent.
    pub fn snapshot(&self) -> BudgetSnapshot {
        let data = self.inner.lock();
        BudgetSnapshot {
            total: data.total_budget,
            used: data.used_amount,
            available: data.available(),
        }
    }

    /// Atomically commits `amount` against the allocation.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::Validation`] - amount is zero or negative.
    /// - [`ApprovalError::InsufficientBudget`] - the amount would overdraw
    ///   the allocation; carries the available balance at refusal time.
    pub fn reserve(&self, amount: Decimal) -> Result<(), ApprovalError> {
        self.inner.lock().reserve(amount)
    }

    /// Returns previously reserved spend, for compensating rollbacks.
    pub fn release(&self, amount: Decimal) -> Result<(), ApprovalError> {
        self.inner.lock().release(amount)
    }

    pub(crate) fn reallocate(
        &self,
        name: impl Into<String>,
        account_type: impl Into<String>,
        total_budget: Decimal,
    ) -> Result<(), ApprovalError> {
        self.inner
            .lock()
            .reallocate(name.into(), account_type.into(), total_budget)
    }
}

impl Serialize for KeyAccount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("KeyAccount", 5)?;
        state.serialize_field("account", &data.account_id)?;
        state.serialize_field("name", &data.name)?;
        state.serialize_field(
            "total",
            &data.total_budget.round_dp(KeyAccount::DECIMAL_PRECISION),
        )?;
        state.serialize_field("used", &data.used_amount.round_dp(KeyAccount::DECIMAL_PRECISION))?;
        state.serialize_field(
            "available",
            &data.available().round_dp(KeyAccount::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // === AccountData Internal Tests ===
    // These test the private AccountData methods directly.

    #[test]
    fn reserve_within_allocation() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(60.00)).unwrap();
        assert_eq!(data.used_amount, dec!(60.00));
        assert_eq!(data.available(), dec!(40.00));
    }

    #[test]
    fn reserve_to_exact_limit() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(100.00)).unwrap();
        assert_eq!(data.used_amount, dec!(100.00));
        assert_eq!(data.available(), Decimal::ZERO);
    }

    #[test]
    fn reserve_overdraw_leaves_state_unchanged() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(60.00)).unwrap();
        let result = data.reserve(dec!(60.00));
        assert_eq!(
            result,
            Err(ApprovalError::InsufficientBudget {
                available: dec!(40.00)
            })
        );
        assert_eq!(data.used_amount, dec!(60.00));
    }

    #[test]
    fn reserve_rejects_non_positive_amount() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        assert!(matches!(
            data.reserve(Decimal::ZERO),
            Err(ApprovalError::Validation(_))
        ));
        assert!(matches!(
            data.reserve(dec!(-5)),
            Err(ApprovalError::Validation(_))
        ));
    }

    #[test]
    fn release_returns_spend() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(60.00)).unwrap();
        data.release(dec!(20.00)).unwrap();
        assert_eq!(data.used_amount, dec!(40.00));
    }

    #[test]
    fn release_floors_at_zero() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(30.00)).unwrap();
        data.release(dec!(50.00)).unwrap();
        assert_eq!(data.used_amount, Decimal::ZERO);
    }

    #[test]
    fn reallocate_preserves_used_amount() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(40.00)).unwrap();
        data.reallocate("b".into(), "capital".into(), dec!(200.00)).unwrap();
        assert_eq!(data.used_amount, dec!(40.00));
        assert_eq!(data.total_budget, dec!(200.00));
        assert_eq!(data.name, "b");
    }

    #[test]
    fn reallocate_below_committed_spend_fails() {
        let mut data = AccountData::new(KeyAccountId(1), "a".into(), "expense".into(), dec!(100.00));
        data.reserve(dec!(40.00)).unwrap();
        let result = data.reallocate("a".into(), "expense".into(), dec!(30.00));
        assert!(matches!(result, Err(ApprovalError::Validation(_))));
        assert_eq!(data.total_budget, dec!(100.00));
    }

    // === Serialization Tests ===

    #[test]
    fn serializer_rounds_to_two_decimal_places() {
        let account = KeyAccount::new(KeyAccountId(1), "travel", "expense", dec!(123.456));
        account.reserve(dec!(0.004)).unwrap();

        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["total"].as_str().unwrap(), "123.46");
        assert_eq!(parsed["used"].as_str().unwrap(), "0.00");
    }

    #[test]
    fn serializer_emits_all_balance_fields() {
        let account = KeyAccount::new(KeyAccountId(7), "travel", "expense", dec!(1000.00));
        account.reserve(dec!(400.00)).unwrap();

        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["account"], 7);
        assert_eq!(parsed["name"], "travel");
        assert_eq!(parsed["total"].as_str().unwrap(), "1000.00");
        assert_eq!(parsed["used"].as_str().unwrap(), "400.00");
        assert_eq!(parsed["available"].as_str().unwrap(), "600.00");
    }

    #[test]
    fn serializer_precision_constant_is_two() {
        assert_eq!(KeyAccount::DECIMAL_PRECISION, 2);
    }
}
