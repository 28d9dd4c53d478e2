//! Plan: dated training plans
//!
//! ## Fields
//!
//! | field | rule |
//! |-------|------|
//! | `title` | trimmed, non-empty, at most 200 characters |
//! | `content` | free text, may be empty, at most 100 000 characters |
//! | `date` | ISO `YYYY-MM-DD` |
//! | `category` | trimmed, non-empty, lower-cased |
//! | `metadata` | opaque JSON object |
//!
//! Listing is ordered by `date`, ties broken by id.

use chrono::NaiveDate;
use planstore_core::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{check_length, parse_date, required_text};
use crate::entity::Entity;

const MAX_TITLE_CHARS: usize = 200;
const MAX_CONTENT_CHARS: usize = 100_000;
const MAX_CATEGORY_CHARS: usize = 64;

/// Normalized plan fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFields {
    /// Display title
    pub title: String,
    /// Plan body as entered
    pub content: String,
    /// Day the plan is scheduled for
    pub date: NaiveDate,
    /// Lower-cased category (e.g. `"run"`, `"strength"`)
    pub category: String,
    /// Opaque caller data
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Full plan input for create and replace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    /// Title
    pub title: String,
    /// Body, empty if absent
    #[serde(default)]
    pub content: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// Category
    pub category: String,
    /// Opaque caller data
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PlanDraft {
    /// Draft with the required fields
    pub fn new(
        title: impl Into<String>,
        date: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        PlanDraft {
            title: title.into(),
            date: date.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    /// Set the body
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Partial plan input; absent fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New `YYYY-MM-DD` date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// New category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Replacement metadata object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl PlanPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Change the body
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Change the date
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Change the category
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Replace the metadata object
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Plan list filter
///
/// ```ignore
/// let filter = PlanFilter::all()
///     .category("Run")
///     .from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFilter {
    category: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl PlanFilter {
    /// Every plan
    pub fn all() -> Self {
        Self::default()
    }

    /// Only plans in `category` (case-insensitive)
    pub fn category(mut self, category: impl AsRef<str>) -> Self {
        self.category = Some(normalize_category(category.as_ref()));
        self
    }

    /// Only plans on or after `date`
    pub fn from(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    /// Only plans on or before `date`
    pub fn to(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }
}

/// Plan entity
#[derive(Debug, Clone, Copy)]
pub struct Plan;

impl Entity for Plan {
    const KIND: &'static str = "plan";
    const BACKUP_FORMAT_ID: &'static str = "planstore.plans";
    const BACKUP_VERSION: u32 = 1;

    type Fields = PlanFields;
    type Draft = PlanDraft;
    type Patch = PlanPatch;
    type Filter = PlanFilter;
    type SortKey = NaiveDate;

    fn normalize(draft: PlanDraft) -> Result<PlanFields, ValidationError> {
        let title = required_text("title", &draft.title, MAX_TITLE_CHARS)?;
        check_length("content", &draft.content, MAX_CONTENT_CHARS)?;
        let date = parse_date("date", &draft.date)?;
        let category = required_category(&draft.category)?;
        Ok(PlanFields {
            title,
            content: draft.content,
            date,
            category,
            metadata: draft.metadata,
        })
    }

    fn apply_patch(current: &PlanFields, patch: PlanPatch) -> Result<PlanFields, ValidationError> {
        let mut next = current.clone();
        if let Some(title) = patch.title {
            next.title = required_text("title", &title, MAX_TITLE_CHARS)?;
        }
        if let Some(content) = patch.content {
            check_length("content", &content, MAX_CONTENT_CHARS)?;
            next.content = content;
        }
        if let Some(date) = patch.date {
            next.date = parse_date("date", &date)?;
        }
        if let Some(category) = patch.category {
            next.category = required_category(&category)?;
        }
        if let Some(metadata) = patch.metadata {
            next.metadata = metadata;
        }
        Ok(next)
    }

    fn renormalize(fields: PlanFields) -> Result<PlanFields, ValidationError> {
        let title = required_text("title", &fields.title, MAX_TITLE_CHARS)?;
        check_length("content", &fields.content, MAX_CONTENT_CHARS)?;
        let category = required_category(&fields.category)?;
        Ok(PlanFields {
            title,
            category,
            ..fields
        })
    }

    fn sort_key(fields: &PlanFields) -> NaiveDate {
        fields.date
    }

    fn key_range(filter: &PlanFilter) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (filter.from, filter.to)
    }

    fn matches(fields: &PlanFields, filter: &PlanFilter) -> bool {
        filter
            .category
            .as_ref()
            .map_or(true, |c| *c == fields.category)
    }
}

fn normalize_category(value: &str) -> String {
    value.trim().to_lowercase()
}

fn required_category(value: &str) -> Result<String, ValidationError> {
    let category = required_text("category", value, MAX_CATEGORY_CHARS)?;
    Ok(normalize_category(&category))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let fields = Plan::normalize(
            PlanDraft::new("  Tempo run ", "2024-01-05", " RUN ").with_content("4x1k"),
        )
        .unwrap();
        assert_eq!(fields.title, "Tempo run");
        assert_eq!(fields.category, "run");
        assert_eq!(fields.date, date("2024-01-05"));
        assert_eq!(fields.content, "4x1k");
    }

    #[test]
    fn test_normalize_rejects_bad_fields() {
        let err = Plan::normalize(PlanDraft::new("", "2024-01-05", "run")).unwrap_err();
        assert_eq!(err.field, "title");

        let err = Plan::normalize(PlanDraft::new("t", "tomorrow", "run")).unwrap_err();
        assert_eq!(err.field, "date");

        let err = Plan::normalize(PlanDraft::new("t", "2024-01-05", "  ")).unwrap_err();
        assert_eq!(err.field, "category");

        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        let err = Plan::normalize(PlanDraft::new(long, "2024-01-05", "run")).unwrap_err();
        assert_eq!(err.field, "title");
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let current = Plan::normalize(
            PlanDraft::new("Easy", "2024-01-05", "run").with_metadata("rpe", json!(4)),
        )
        .unwrap();
        let next = Plan::apply_patch(&current, PlanPatch::new().date("2023-12-01")).unwrap();
        assert_eq!(next.date, date("2023-12-01"));
        assert_eq!(next.title, current.title);
        assert_eq!(next.metadata, current.metadata);
    }

    #[test]
    fn test_identical_patch_yields_identical_fields() {
        let current = Plan::normalize(PlanDraft::new("Easy", "2024-01-05", "run")).unwrap();
        let next = Plan::apply_patch(
            &current,
            PlanPatch::new().title(" Easy ").category("RUN").date("2024-01-05"),
        )
        .unwrap();
        assert_eq!(next, current);
    }

    #[test]
    fn test_filter_category_is_case_insensitive() {
        let fields = Plan::normalize(PlanDraft::new("Lift", "2024-01-05", "Strength")).unwrap();
        assert!(Plan::matches(&fields, &PlanFilter::all().category("STRENGTH")));
        assert!(!Plan::matches(&fields, &PlanFilter::all().category("run")));
    }

    #[test]
    fn test_draft_deserializes_camel_case() {
        let draft: PlanDraft = serde_json::from_value(json!({
            "title": "Long run",
            "date": "2024-01-07",
            "category": "run",
            "metadata": {"distanceKm": 18}
        }))
        .unwrap();
        assert_eq!(draft.content, "");
        assert_eq!(draft.metadata["distanceKm"], json!(18));
    }

    #[test]
    fn test_renormalize_rejects_blank_title() {
        let mut fields = Plan::normalize(PlanDraft::new("Easy", "2024-01-05", "run")).unwrap();
        fields.title = " ".to_string();
        assert_eq!(Plan::renormalize(fields).unwrap_err().field, "title");
    }
}
