//! # Caller Outcomes
//!
//! Flattens a [`DbResult`] into the `{ success, message }` shape the CRUD
//! layer shows to staff.
//!
//! ## Message Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ErrorKind      Message                          Logged                │
//! │  ────────────   ──────────────────────────────   ───────────────────   │
//! │  Validation     the error's own text             no                    │
//! │  NotFound       the error's own text             no                    │
//! │  Integrity      the error's own text             no                    │
//! │  Concurrency    "The system is busy, ..."        tracing::error!       │
//! │  Internal       "An unexpected error ..."        tracing::error!       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use larder_core::ErrorKind;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

const BUSY_MESSAGE: &str = "The system is busy, please try again";
const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Result of an inbound operation as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    /// A successful outcome.
    pub fn ok(message: impl Into<String>) -> Self {
        Outcome {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome with a caller-safe message.
    pub fn from_error(err: &DbError) -> Self {
        let message = match err.kind() {
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Integrity => err.to_string(),
            ErrorKind::Concurrency => {
                tracing::error!(error = %err, "Operation failed under write contention");
                BUSY_MESSAGE.to_string()
            }
            ErrorKind::Internal => {
                tracing::error!(error = ?err, "Unexpected database failure");
                INTERNAL_MESSAGE.to_string()
            }
        };

        Outcome {
            success: false,
            message,
        }
    }

    /// Maps a result, describing success with `on_success`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let result = db.sales().record_sale(&recipe_id, 2.0, Some("chef"), None).await;
    /// let outcome = Outcome::from_result(&result, |r| {
    ///     format!("Sale recorded, {} ingredient(s) deducted", r.ledger_entries.len())
    /// });
    /// ```
    pub fn from_result<T>(result: &DbResult<T>, on_success: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(value) => Outcome::ok(on_success(value)),
            Err(err) => Outcome::from_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::CoreError;

    #[test]
    fn test_success() {
        let result: DbResult<u32> = Ok(3);
        let outcome = Outcome::from_result(&result, |n| format!("{n} rows removed"));
        assert_eq!(outcome, Outcome::ok("3 rows removed"));
    }

    #[test]
    fn test_domain_errors_keep_their_text() {
        let err = DbError::from(CoreError::UnitMismatch {
            component: "Flour".into(),
            expected: "kg".into(),
            found: "g".into(),
        });
        let outcome = Outcome::from_error(&err);
        assert!(!outcome.success);
        assert!(outcome.message.contains("expected 'kg'"));

        let outcome = Outcome::from_error(&DbError::not_found("Item", "flour"));
        assert_eq!(outcome.message, "Item not found: flour");
    }

    #[test]
    fn test_unexpected_errors_are_generic() {
        let outcome = Outcome::from_error(&DbError::ContentionExhausted { attempts: 5 });
        assert_eq!(outcome.message, BUSY_MESSAGE);

        let outcome = Outcome::from_error(&DbError::QueryFailed("no such table: items".into()));
        assert_eq!(outcome.message, INTERNAL_MESSAGE);
        assert!(!outcome.message.contains("items"));
    }
}
