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

//! Approval state machine.
//!
//! The [`ApprovalEngine`] composes the key account ledger, the request
//! store, the revision log, and the reference registries, and is the only
//! path through which request rows change status.
//!
//! # Transitions
//!
//! | Transition | Actor | Ledger effect |
//! |------|-------|---------------|
//! | submit | requester | none |
//! | approve | admin | reserve (atomic with the status flip) |
//! | reject | admin | none |
//! | request_revision | admin | none (history entry on amount change) |
//! | submit_revision | requester | pre-flight availability check only |
//! | create_revision_version | admin | none (spawns child row) |
//! | resolve_revision | admin | reserve (atomic with merge + child delete) |
//!
//! # Atomicity
//!
//! Transitions that couple a row write to a ledger reservation (approve,
//! resolve_revision) run their whole read-check-reserve-write sequence
//! while holding the store's write guard; the reserve itself is the last
//! fallible step, so a refused reservation leaves every row exactly as it
//! was. Lock order is always store guard first, account lock second.

use crate::account::BudgetSnapshot;
use crate::base::{Actor, CategoryId, DepartmentId, KeyAccountId, RequestId};
use crate::error::ApprovalError;
use crate::history::{RevisionHistoryEntry, RevisionLog};
use crate::ledger::Ledger;
use crate::registry::ReferenceData;
use crate::request::{RequestStatus, WithdrawalRequest};
use crate::store::{DraftEntry, RequestStore};
use chrono::Utc;
use rust_decimal::Decimal;

/// Budget approval engine.
pub struct ApprovalEngine {
    ledger: Ledger,
    store: RequestStore,
    history: RevisionLog,
    refs: ReferenceData,
}

impl ApprovalEngine {
    pub fn new() -> Self {
        Self {
            ledger: Ledger::new(),
            store: RequestStore::new(),
            history: RevisionLog::new(),
            refs: ReferenceData::new(),
        }
    }

    /// The underlying ledger, for balance reports.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The underlying revision log, for audit reads.
    pub fn history(&self) -> &RevisionLog {
        &self.history
    }

    // === Reference data (admin) ===

    pub fn upsert_account(
        &self,
        actor: Actor,
        account_id: KeyAccountId,
        name: &str,
        account_type: &str,
        total_budget: Decimal,
    ) -> Result<(), ApprovalError> {
        require_admin(actor)?;
        self.ledger
            .upsert_account(account_id, name, account_type, total_budget)
    }

    pub fn upsert_department(
        &self,
        actor: Actor,
        department_id: DepartmentId,
        name: &str,
    ) -> Result<(), ApprovalError> {
        require_admin(actor)?;
        self.refs.upsert_department(department_id, name)
    }

    pub fn upsert_category(
        &self,
        actor: Actor,
        category_id: CategoryId,
        name: &str,
    ) -> Result<(), ApprovalError> {
        require_admin(actor)?;
        self.refs.upsert_category(category_id, name)
    }

    // === Request intake ===

    /// Creates a request in status Pending against a key account.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::Validation`] - amount not positive or reason empty.
    /// - [`ApprovalError::NotFound`] - department, key account, or supplied
    ///   category does not resolve.
    pub fn create_request(
        &self,
        actor: Actor,
        department_id: DepartmentId,
        key_account_id: KeyAccountId,
        category_id: Option<CategoryId>,
        amount: Decimal,
        reason: &str,
    ) -> Result<RequestId, ApprovalError> {
        self.check_references(department_id, key_account_id, category_id)?;

        let id = self.store.create(
            actor.user_id,
            department_id,
            key_account_id,
            category_id,
            amount,
            reason,
        )?;
        tracing::info!(request = %id, user = %actor.user_id, %amount, "request created");
        Ok(id)
    }

    /// Upserts draft rows for the actor, one per entry.
    pub fn save_draft(
        &self,
        actor: Actor,
        department_id: DepartmentId,
        entries: &[DraftEntry],
    ) -> Result<Vec<RequestId>, ApprovalError> {
        if !self.refs.department_exists(department_id) {
            return Err(ApprovalError::NotFound);
        }
        for entry in entries {
            if !self.ledger.contains(entry.key_account_id) {
                return Err(ApprovalError::NotFound);
            }
            if let Some(category_id) = entry.category_id
                && !self.refs.category_exists(category_id)
            {
                return Err(ApprovalError::NotFound);
            }
        }
        self.store.save_draft(actor.user_id, department_id, entries)
    }

    /// Submits a draft row: Draft → Pending. Requester-owned.
    pub fn submit(&self, actor: Actor, request_id: RequestId) -> Result<(), ApprovalError> {
        let mut data = self.store.write();
        let row = data.get_mut(request_id).ok_or(ApprovalError::NotFound)?;
        if row.user_id != actor.user_id {
            return Err(ApprovalError::Forbidden);
        }
        if !row.status.can_transition(RequestStatus::Pending) || row.status != RequestStatus::Draft {
            return Err(ApprovalError::InvalidTransition { from: row.status });
        }

        row.status = RequestStatus::Pending;
        row.updated_at = Utc::now();
        tracing::info!(request = %request_id, user = %actor.user_id, "draft submitted");
        Ok(())
    }

    // === Admin decisions ===

    /// Approves a live request, committing its amount against the key
    /// account.
    ///
    /// The balance check and the status flip happen inside one exclusive
    /// scope: if the reservation is refused the request stays exactly as it
    /// was, and two concurrent approvals that would jointly overdraw the
    /// account cannot both succeed.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::Forbidden`] - actor is not an admin.
    /// - [`ApprovalError::NotFound`] - request or its key account absent.
    /// - [`ApprovalError::InvalidTransition`] - request is not Pending/Revision.
    /// - [`ApprovalError::InsufficientBudget`] - reservation refused; carries
    ///   the available amount so the admin can adjust and retry.
    pub fn approve(&self, actor: Actor, request_id: RequestId) -> Result<(), ApprovalError> {
        require_admin(actor)?;

        let mut data = self.store.write();
        let row = data.get_mut(request_id).ok_or(ApprovalError::NotFound)?;
        if !row.status.can_transition(RequestStatus::Approved) {
            return Err(ApprovalError::InvalidTransition { from: row.status });
        }

        // Last fallible step; on error the row was never touched.
        self.ledger.reserve(row.key_account_id, row.amount)?;

        row.status = RequestStatus::Approved;
        row.approved_by = Some(actor.user_id);
        row.updated_at = Utc::now();
        tracing::info!(
            request = %request_id,
            admin = %actor.user_id,
            amount = %row.amount,
            account = %row.key_account_id,
            "request approved"
        );
        Ok(())
    }

    /// Rejects a live request. Terminal; no ledger effect.
    pub fn reject(
        &self,
        actor: Actor,
        request_id: RequestId,
        reason: &str,
    ) -> Result<(), ApprovalError> {
        require_admin(actor)?;
        if reason.trim().is_empty() {
            return Err(ApprovalError::Validation("rejection reason must not be empty"));
        }

        let mut data = self.store.write();
        let row = data.get_mut(request_id).ok_or(ApprovalError::NotFound)?;
        if !row.status.can_transition(RequestStatus::Rejected) {
            return Err(ApprovalError::InvalidTransition { from: row.status });
        }

        row.status = RequestStatus::Rejected;
        row.feedback = Some(reason.trim().to_string());
        row.updated_at = Utc::now();
        tracing::info!(request = %request_id, admin = %actor.user_id, "request rejected");
        Ok(())
    }

    /// Sends a pending request back to its owner: Pending → Revision.
    ///
    /// With `suggested_amount` the admin counter-offers; the overwrite is
    /// recorded in the revision history.
    pub fn request_revision(
        &self,
        actor: Actor,
        request_id: RequestId,
        feedback: &str,
        suggested_amount: Option<Decimal>,
    ) -> Result<(), ApprovalError> {
        require_admin(actor)?;
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(ApprovalError::Validation("revision feedback must not be empty"));
        }
        if let Some(amount) = suggested_amount
            && amount <= Decimal::ZERO
        {
            return Err(ApprovalError::Validation("amount must be positive"));
        }

        let mut data = self.store.write();
        let row = data.get_mut(request_id).ok_or(ApprovalError::NotFound)?;
        if row.status != RequestStatus::Pending
            || !row.status.can_transition(RequestStatus::Revision)
        {
            return Err(ApprovalError::InvalidTransition { from: row.status });
        }

        if let Some(new_amount) = suggested_amount
            && new_amount != row.amount
        {
            self.history.append(
                request_id,
                row.amount,
                new_amount,
                Some(feedback.to_string()),
                actor.user_id,
            );
            row.amount = new_amount;
        }
        row.status = RequestStatus::Revision;
        row.feedback = Some(feedback.to_string());
        row.updated_at = Utc::now();
        tracing::info!(request = %request_id, admin = %actor.user_id, "revision requested");
        Ok(())
    }

    /// Resubmits a request that was sent back: Revision → Pending.
    ///
    /// Availability is pre-checked (not reserved) so the requester learns
    /// about an unaffordable resubmission immediately instead of at
    /// approval time. The category id is carried through from the caller
    /// verbatim.
    pub fn submit_revision(
        &self,
        actor: Actor,
        request_id: RequestId,
        amount: Decimal,
        reason: &str,
        key_account_id: KeyAccountId,
        category_id: Option<CategoryId>,
    ) -> Result<(), ApprovalError> {
        if amount <= Decimal::ZERO {
            return Err(ApprovalError::Validation("amount must be positive"));
        }
        if reason.trim().is_empty() {
            return Err(ApprovalError::Validation("reason must not be empty"));
        }

        let mut data = self.store.write();
        let row = data.get_mut(request_id).ok_or(ApprovalError::NotFound)?;
        if row.user_id != actor.user_id {
            return Err(ApprovalError::Forbidden);
        }
        if row.status != RequestStatus::Revision
            || !row.status.can_transition(RequestStatus::Pending)
        {
            return Err(ApprovalError::InvalidTransition { from: row.status });
        }

        // Pre-flight check, not a reservation. The spend is only committed
        // when an admin approves.
        let snapshot = self.ledger.available_balance(key_account_id)?;
        if amount > snapshot.available {
            return Err(ApprovalError::InsufficientBudget {
                available: snapshot.available,
            });
        }

        if amount != row.amount {
            self.history
                .append(request_id, row.amount, amount, None, actor.user_id);
        }
        row.amount = amount;
        row.reason = reason.trim().to_string();
        row.key_account_id = key_account_id;
        row.category_id = category_id;
        row.status = RequestStatus::Pending;
        row.feedback = None;
        row.updated_at = Utc::now();
        tracing::info!(request = %request_id, user = %actor.user_id, %amount, "revision resubmitted");
        Ok(())
    }

    /// Spawns a revision child row from a pending request.
    ///
    /// The child carries `version + 1` and points back at the chain's
    /// non-revision ancestor; the original stays Pending untouched until
    /// [`resolve_revision`](Self::resolve_revision). At most one live child
    /// per parent.
    pub fn create_revision_version(
        &self,
        actor: Actor,
        request_id: RequestId,
        amount: Option<Decimal>,
        feedback: Option<&str>,
    ) -> Result<RequestId, ApprovalError> {
        require_admin(actor)?;
        if let Some(amount) = amount
            && amount <= Decimal::ZERO
        {
            return Err(ApprovalError::Validation("amount must be positive"));
        }

        let mut data = self.store.write();
        let original = data.get(request_id).ok_or(ApprovalError::NotFound)?.clone();
        if original.status != RequestStatus::Pending {
            return Err(ApprovalError::InvalidTransition {
                from: original.status,
            });
        }
        let parent_id = original.parent_request_id.unwrap_or(original.id);
        if data.live_child_of(parent_id).is_some() {
            return Err(ApprovalError::InvalidTransition {
                from: RequestStatus::Pending,
            });
        }

        let child_id = data.allocate_id();
        let now = Utc::now();
        let child_amount = amount.unwrap_or(original.amount);
        data.insert(WithdrawalRequest {
            id: child_id,
            user_id: original.user_id,
            department_id: original.department_id,
            key_account_id: original.key_account_id,
            category_id: original.category_id,
            amount: child_amount,
            reason: original.reason.clone(),
            status: RequestStatus::Revision,
            version: original.version + 1,
            parent_request_id: Some(parent_id),
            approved_by: None,
            feedback: feedback.map(|f| f.trim().to_string()),
            created_at: now,
            updated_at: now,
        });

        if child_amount != original.amount {
            self.history.append(
                child_id,
                original.amount,
                child_amount,
                feedback.map(|f| f.trim().to_string()),
                actor.user_id,
            );
        }
        tracing::info!(
            request = %request_id,
            child = %child_id,
            admin = %actor.user_id,
            "revision version created"
        );
        Ok(child_id)
    }

    /// Merges a revision child into its parent and approves the parent.
    ///
    /// One atomic unit under the store's write guard: reserve the child's
    /// amount, record the merge in history, copy amount/reason/version onto
    /// the parent, flip the parent to Approved, delete the child. A refused
    /// reservation aborts the whole operation with both rows unchanged.
    pub fn resolve_revision(
        &self,
        actor: Actor,
        child_request_id: RequestId,
    ) -> Result<(), ApprovalError> {
        require_admin(actor)?;

        let mut data = self.store.write();
        let child = data
            .get(child_request_id)
            .ok_or(ApprovalError::NotFound)?
            .clone();
        if child.status != RequestStatus::Revision {
            return Err(ApprovalError::InvalidTransition { from: child.status });
        }
        let parent_id = child
            .parent_request_id
            .ok_or(ApprovalError::InvalidTransition {
                from: child.status,
            })?;
        let parent = data.get(parent_id).ok_or(ApprovalError::NotFound)?;
        if !parent.status.can_transition(RequestStatus::Approved) {
            return Err(ApprovalError::InvalidTransition {
                from: parent.status,
            });
        }
        let previous_amount = parent.amount;

        // Last fallible step before the merge writes.
        self.ledger.reserve(child.key_account_id, child.amount)?;

        if child.amount != previous_amount {
            self.history.append(
                parent_id,
                previous_amount,
                child.amount,
                child.feedback.clone(),
                actor.user_id,
            );
        }

        let parent = data.get_mut(parent_id).expect("parent row present");
        parent.amount = child.amount;
        parent.reason = child.reason.clone();
        parent.version = child.version;
        parent.status = RequestStatus::Approved;
        parent.approved_by = Some(actor.user_id);
        parent.updated_at = Utc::now();
        data.remove(child_request_id);

        tracing::info!(
            parent = %parent_id,
            child = %child_request_id,
            admin = %actor.user_id,
            "revision resolved"
        );
        Ok(())
    }

    // === Reads ===

    /// Current `{total, used, available}` of a key account.
    pub fn available_budget(&self, key_account_id: KeyAccountId) -> Result<BudgetSnapshot, ApprovalError> {
        self.ledger.available_balance(key_account_id)
    }

    pub fn get_request(&self, request_id: RequestId) -> Option<WithdrawalRequest> {
        self.store.get(request_id)
    }

    pub fn requests_for_user(&self, actor: Actor) -> Vec<WithdrawalRequest> {
        self.store.list_by_user(actor.user_id)
    }

    pub fn pending_requests(&self) -> Vec<WithdrawalRequest> {
        self.store.list_pending()
    }

    pub fn department_requests(
        &self,
        department_id: DepartmentId,
        status: Option<RequestStatus>,
    ) -> Vec<WithdrawalRequest> {
        self.store.list_by_department(department_id, status)
    }

    pub fn history_for(&self, request_id: RequestId) -> Vec<RevisionHistoryEntry> {
        self.history.for_request(request_id)
    }

    fn check_references(
        &self,
        department_id: DepartmentId,
        key_account_id: KeyAccountId,
        category_id: Option<CategoryId>,
    ) -> Result<(), ApprovalError> {
        if !self.refs.department_exists(department_id) {
            return Err(ApprovalError::NotFound);
        }
        if !self.ledger.contains(key_account_id) {
            return Err(ApprovalError::NotFound);
        }
        if let Some(category_id) = category_id
            && !self.refs.category_exists(category_id)
        {
            return Err(ApprovalError::NotFound);
        }
        Ok(())
    }
}

impl Default for ApprovalEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn require_admin(actor: Actor) -> Result<(), ApprovalError> {
    if !actor.is_admin() {
        return Err(ApprovalError::Forbidden);
    }
    Ok(())
}
