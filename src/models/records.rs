// src/models/records.rs
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// A counselling row as the upstream importer hands it over. Nothing is trusted yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRowInput {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quota: Option<String>,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default)]
    pub year: Option<JsonValue>,
    #[serde(default)]
    pub rank: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("rank '{0}' is not numeric")]
    NonNumericRank(String),
    #[error("rank {0} must be positive")]
    NonPositiveRank(i64),
    #[error("year '{0}' is not a valid admission year")]
    InvalidYear(String),
}

/// One validated admission record. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAdmissionRow {
    pub source_index: usize,
    pub state_text: String,
    pub institution_text: String,
    pub location_text: Option<String>,
    pub course_text: String,
    pub category_text: String,
    pub quota_text: String,
    pub round_text: String,
    pub year: u16,
    pub rank: u32,
}

const MIN_YEAR: i64 = 1990;
const MAX_YEAR: i64 = 2100;

fn required(value: &Option<String>, field: &'static str) -> Result<String, RowValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(RowValidationError::MissingField(field)),
    }
}

fn value_as_integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<i64>().ok()
        }
        _ => None,
    }
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RawAdmissionRow {
    pub fn from_input(source_index: usize, input: &RawRowInput) -> Result<Self, RowValidationError> {
        let state_text = required(&input.state, "state")?;
        let institution_text = required(&input.institution, "institution")?;
        let course_text = required(&input.course, "course")?;
        let category_text = required(&input.category, "category")?;

        let rank_value = input
            .rank
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or(RowValidationError::MissingField("rank"))?;
        let rank = value_as_integer(rank_value)
            .ok_or_else(|| RowValidationError::NonNumericRank(display_value(rank_value)))?;
        if rank <= 0 {
            return Err(RowValidationError::NonPositiveRank(rank));
        }
        let rank = u32::try_from(rank)
            .map_err(|_| RowValidationError::NonNumericRank(rank.to_string()))?;

        let year_value = input
            .year
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or(RowValidationError::MissingField("year"))?;
        let year = value_as_integer(year_value)
            .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
            .ok_or_else(|| RowValidationError::InvalidYear(display_value(year_value)))?;

        // Quota and round are frequently blank in state-level exports.
        let quota_text = input
            .quota
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("UNSPECIFIED")
            .to_string();
        let round_text = input
            .round
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("1")
            .to_string();
        let location_text = input
            .location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            source_index,
            state_text,
            institution_text,
            location_text,
            course_text,
            category_text,
            quota_text,
            round_text,
            year: year as u16,
            rank,
        })
    }
}
