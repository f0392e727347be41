// ABOUTME: Credential store error type shared by every store backend
// ABOUTME: Distinguishes unavailable storage, duplicate values and corrupt rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Failures reported by a credential store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached or the operation failed
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    /// A code or token value collided with an existing row
    #[error("Duplicate {entity} value")]
    Duplicate {
        /// Kind of record that collided
        entity: &'static str,
    },

    /// A stored row could not be decoded
    #[error("Corrupt {entity} record: {reason}")]
    Corrupt {
        /// Kind of record
        entity: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

impl StoreError {
    /// Whether retrying with a freshly generated value can succeed
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate {
                entity: "credential",
            },
            _ => Self::Unavailable(error.to_string()),
        }
    }
}
