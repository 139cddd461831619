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

//! Department and category reference registries.
//!
//! Plain lookup tables with no invariants beyond name uniqueness. The
//! approval engine consults them for existence checks when a request is
//! created.

use crate::base::{CategoryId, DepartmentId};
use crate::error::ApprovalError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Reference data the ledger core resolves identifiers against.
#[derive(Debug, Default)]
pub struct ReferenceData {
    departments: DashMap<DepartmentId, Department>,
    categories: DashMap<CategoryId, Category>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or renames a department. Names are unique across departments.
    pub fn upsert_department(&self, id: DepartmentId, name: &str) -> Result<(), ApprovalError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApprovalError::Validation("department name must not be empty"));
        }
        if self
            .departments
            .iter()
            .any(|entry| entry.name == name && entry.id != id)
        {
            return Err(ApprovalError::Validation("department name already taken"));
        }
        self.departments.insert(
            id,
            Department {
                id,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Creates or renames a category. Names are unique across categories.
    pub fn upsert_category(&self, id: CategoryId, name: &str) -> Result<(), ApprovalError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApprovalError::Validation("category name must not be empty"));
        }
        if self
            .categories
            .iter()
            .any(|entry| entry.name == name && entry.id != id)
        {
            return Err(ApprovalError::Validation("category name already taken"));
        }
        self.categories.insert(
            id,
            Category {
                id,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    pub fn department_exists(&self, id: DepartmentId) -> bool {
        self.departments.contains_key(&id)
    }

    pub fn category_exists(&self, id: CategoryId) -> bool {
        self.categories.contains_key(&id)
    }

    pub fn department_name(&self, id: DepartmentId) -> Option<String> {
        self.departments.get(&id).map(|d| d.name.clone())
    }

    pub fn category_name(&self, id: CategoryId) -> Option<String> {
        self.categories.get(&id).map(|c| c.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_and_lookup() {
        let refs = ReferenceData::new();
        refs.upsert_department(DepartmentId(1), "Engineering").unwrap();
        refs.upsert_category(CategoryId(1), "Hardware").unwrap();

        assert!(refs.department_exists(DepartmentId(1)));
        assert!(refs.category_exists(CategoryId(1)));
        assert!(!refs.department_exists(DepartmentId(2)));
        assert_eq!(refs.department_name(DepartmentId(1)).unwrap(), "Engineering");
    }

    #[test]
    fn duplicate_name_rejected() {
        let refs = ReferenceData::new();
        refs.upsert_department(DepartmentId(1), "Engineering").unwrap();
        let result = refs.upsert_department(DepartmentId(2), "Engineering");
        assert!(matches!(result, Err(ApprovalError::Validation(_))));
    }

    #[test]
    fn rename_keeps_own_name_available() {
        let refs = ReferenceData::new();
        refs.upsert_department(DepartmentId(1), "Engineering").unwrap();
        // Re-upserting the same id with the same name is idempotent.
        refs.upsert_department(DepartmentId(1), "Engineering").unwrap();
        refs.upsert_department(DepartmentId(1), "Platform Engineering").unwrap();
        assert_eq!(
            refs.department_name(DepartmentId(1)).unwrap(),
            "Platform Engineering"
        );
    }

    #[test]
    fn empty_name_rejected() {
        let refs = ReferenceData::new();
        assert!(matches!(
            refs.upsert_category(CategoryId(1), "   "),
            Err(ApprovalError::Validation(_))
        ));
    }
}
