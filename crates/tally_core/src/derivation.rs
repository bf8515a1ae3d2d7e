//! Derivation engine.
//!
//! The one place that knows how a record's position gates its counters and how
//! the score is computed. Record creation and inline edits both go through
//! [`derive`], so the two paths cannot drift apart.
//!
//! ```text
//! Intern          → supervision_* forced to 0, traffic_count kept
//! Officer/Reserve → traffic_count forced to 0, supervision_* kept
//! case_total = s5 + s6 + g5 + g6
//! score      = t·1 + (s5+g5)·2 + (s6+g6)·4 − e·5     (may be negative)
//! ```

use serde::{Deserialize, Deserializer};

use crate::types::{Counters, DerivedFields, Position};

pub const TRAFFIC_WEIGHT: i64 = 1;
pub const SHORT_CASE_WEIGHT: i64 = 2;
pub const LONG_CASE_WEIGHT: i64 = 4;
pub const ERROR_PENALTY: i64 = 5;

/// Largest counter value accepted from a caller; anything above is out of range.
pub const COUNTER_MAX: i64 = i32::MAX as i64;

/// Output of [`derive`]: the position-corrected counters and the derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    pub counters: Counters,
    pub derived: DerivedFields,
}

pub fn derive(position: Position, counters: Counters) -> Derivation {
    let mut counters = counters;
    match position {
        Position::Intern => {
            counters.supervision_1to5 = 0;
            counters.supervision_6plus = 0;
        }
        Position::Officer | Position::ReserveOfficer => {
            counters.traffic_count = 0;
        }
    }

    let Counters {
        traffic_count,
        sentence_1to5,
        sentence_6plus,
        supervision_1to5,
        supervision_6plus,
        error_count,
    } = counters;

    let supervision_total = supervision_1to5 + supervision_6plus;
    let case_total = sentence_1to5 + sentence_6plus + supervision_1to5 + supervision_6plus;
    let score = traffic_count * TRAFFIC_WEIGHT
        + (sentence_1to5 + supervision_1to5) * SHORT_CASE_WEIGHT
        + (sentence_6plus + supervision_6plus) * LONG_CASE_WEIGHT
        - error_count * ERROR_PENALTY;

    Derivation {
        counters,
        derived: DerivedFields {
            supervision_total,
            case_total,
            score,
        },
    }
}

/// Coerce caller text into a counter.
///
/// Integer or decimal text is accepted (decimals truncate toward zero). Blank,
/// non-numeric and out-of-range input becomes 0; negatives clamp to 0.
pub fn sanitize_counter(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    let parsed = match raw.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc())
            .filter(|v| v.abs() <= COUNTER_MAX as f64)
            .map(|v| v as i64),
    };
    match parsed {
        Some(v) if v > COUNTER_MAX => 0,
        Some(v) => v.max(0),
        None => 0,
    }
}

/// Unsanitised counter text as it arrives from a form; absent fields count as 0.
///
/// JSON numbers are accepted and kept as their textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CounterInputs {
    #[serde(default, deserialize_with = "lenient_text")]
    pub traffic_count: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sentence_1to5: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sentence_6plus: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub supervision_1to5: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub supervision_6plus: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub error_count: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl CounterInputs {
    pub fn sanitize(&self) -> Counters {
        let read = |v: &Option<String>| v.as_deref().map(sanitize_counter).unwrap_or(0);
        Counters {
            traffic_count: read(&self.traffic_count),
            sentence_1to5: read(&self.sentence_1to5),
            sentence_6plus: read(&self.sentence_6plus),
            supervision_1to5: read(&self.supervision_1to5),
            supervision_6plus: read(&self.supervision_6plus),
            error_count: read(&self.error_count),
        }
    }
}
