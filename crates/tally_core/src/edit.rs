//! Inline edits as a closed set of field bindings.
//!
//! Caller-supplied field names never reach a query: they are parsed into a
//! [`FieldEdit`] or rejected with `InvalidField`.

use serde::Serialize;

use crate::derivation::{derive, sanitize_counter};
use crate::error::TallyError;
use crate::types::{Counters, Position, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    TrafficCount,
    Sentence1to5,
    Sentence6plus,
    Supervision1to5,
    Supervision6plus,
    ErrorCount,
}

impl CounterField {
    pub const ALL: [CounterField; 6] = [
        CounterField::TrafficCount,
        CounterField::Sentence1to5,
        CounterField::Sentence6plus,
        CounterField::Supervision1to5,
        CounterField::Supervision6plus,
        CounterField::ErrorCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterField::TrafficCount => "traffic_count",
            CounterField::Sentence1to5 => "sentence_1to5",
            CounterField::Sentence6plus => "sentence_6plus",
            CounterField::Supervision1to5 => "supervision_1to5",
            CounterField::Supervision6plus => "supervision_6plus",
            CounterField::ErrorCount => "error_count",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    fn slot<'a>(&self, counters: &'a mut Counters) -> &'a mut i64 {
        match self {
            CounterField::TrafficCount => &mut counters.traffic_count,
            CounterField::Sentence1to5 => &mut counters.sentence_1to5,
            CounterField::Sentence6plus => &mut counters.sentence_6plus,
            CounterField::Supervision1to5 => &mut counters.supervision_1to5,
            CounterField::Supervision6plus => &mut counters.supervision_6plus,
            CounterField::ErrorCount => &mut counters.error_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Position(Position),
    Name(String),
    Counter(CounterField, i64),
}

impl FieldEdit {
    /// Bind a field name and raw value. Counters are sanitised, positions must be exact.
    pub fn parse(field: &str, raw: &str) -> Result<Self, TallyError> {
        match field {
            "position" => Position::parse(raw).map(FieldEdit::Position).ok_or_else(|| {
                TallyError::InvalidValue(format!(
                    "position must be Intern, Officer or ReserveOfficer, got '{raw}'"
                ))
            }),
            "name" => Ok(FieldEdit::Name(raw.trim().to_string())),
            other => CounterField::parse(other)
                .map(|f| FieldEdit::Counter(f, sanitize_counter(raw)))
                .ok_or_else(|| TallyError::InvalidField(other.to_string())),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            FieldEdit::Position(_) => "position",
            FieldEdit::Name(_) => "name",
            FieldEdit::Counter(f, _) => f.as_str(),
        }
    }

    /// The stored number for counter edits, so a client can echo it back.
    pub fn saved_value(&self) -> Option<i64> {
        match self {
            FieldEdit::Counter(_, v) => Some(*v),
            _ => None,
        }
    }

    /// Audit-log wording.
    pub fn describe(&self) -> String {
        match self {
            FieldEdit::Position(p) => format!("position = {p}"),
            FieldEdit::Name(n) => format!("name = {n}"),
            FieldEdit::Counter(f, v) => format!("{} = {v}", f.as_str()),
        }
    }

    /// Apply the raw change, then re-run the derivation engine over the whole record.
    pub fn apply(&self, record: &mut Record) {
        match self {
            FieldEdit::Position(p) => record.position = *p,
            FieldEdit::Name(n) => record.name = n.clone(),
            FieldEdit::Counter(f, v) => *f.slot(&mut record.counters) = *v,
        }
        let d = derive(record.position, record.counters);
        record.counters = d.counters;
        record.derived = d.derived;
    }
}

/// What an inline edit hands back so a caller can refresh one row in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineUpdateOutcome {
    pub record_id: i64,
    pub position: Position,
    pub traffic_count: i64,
    pub supervision_1to5: i64,
    pub supervision_6plus: i64,
    pub supervision_total: i64,
    pub case_total: i64,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_value: Option<i64>,
}

impl InlineUpdateOutcome {
    pub fn from_record(record: &Record, saved_value: Option<i64>) -> Self {
        Self {
            record_id: record.id,
            position: record.position,
            traffic_count: record.counters.traffic_count,
            supervision_1to5: record.counters.supervision_1to5,
            supervision_6plus: record.counters.supervision_6plus,
            supervision_total: record.derived.supervision_total,
            case_total: record.derived.case_total,
            score: record.derived.score,
            saved_value,
        }
    }
}
