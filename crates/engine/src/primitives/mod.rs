//! Entity primitives served by the generic store
//!
//! - **Plan**: dated training plans, ordered by date, filtered by category
//!   and inclusive date range
//! - **User**: accounts with a unique username, ordered by username
//!
//! Both are plain [`Entity`](crate::Entity) implementations; all storage
//! behavior lives in [`DocumentStore`](crate::DocumentStore).

pub mod plan;
pub mod user;

pub use plan::{Plan, PlanDraft, PlanFields, PlanFilter, PlanPatch};
pub use user::{Role, User, UserDraft, UserFields, UserFilter, UserPatch};

use chrono::NaiveDate;
use planstore_core::ValidationError;

/// Trim, require non-empty, and cap the length in characters
pub(crate) fn required_text(
    field: &str,
    value: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    check_length(field, trimmed, max_chars)?;
    Ok(trimmed.to_string())
}

/// Cap the length in characters
pub(crate) fn check_length(
    field: &str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max_chars {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters, got {}", max_chars, len),
        ));
    }
    Ok(())
}

/// Parse an ISO `YYYY-MM-DD` calendar date
pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::new(field, format!("'{}' is not a YYYY-MM-DD date", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("title", "  Hill repeats ", 200).unwrap(), "Hill repeats");
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let err = required_text("title", "   ", 200).unwrap_err();
        assert_eq!(err.field, "title");
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        assert!(check_length("title", "ééé", 3).is_ok());
        assert!(check_length("title", "éééé", 3).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("date", "2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(parse_date("date", "2024-02-30").is_err());
        assert!(parse_date("date", "05/01/2024").is_err());
    }
}
