//! End-of-course summary built from the learner state.

use crate::state::LearnerState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which lessons keep their experiment readings.
pub const EXPERIMENT_DATA_KEY: &str = "experimentData";

/// One labelled line of the summary card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub label: String,
    pub text: String,
}

impl Highlight {
    pub fn new(label: &str, text: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            text: text.into(),
        }
    }
}

/// One experiment group's reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReading {
    /// Temperature in °C.
    pub temperature: i64,
    /// Gas volume in ml.
    pub gas: i64,
}

/// The learner-facing summary delivered once the lesson finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub title: String,
    pub highlights: Vec<Highlight>,
    pub experiment: Vec<GroupReading>,
    /// The full learner state at the moment the lesson finished.
    pub answers: Map<String, Value>,
}

impl CourseSummary {
    /// A summary with no highlights: the title, the readings and the answers.
    pub fn from_state(title: &str, state: &LearnerState) -> Self {
        Self {
            title: title.to_string(),
            highlights: Vec::new(),
            experiment: readings(state),
            answers: state.snapshot().clone(),
        }
    }

    pub fn highlight(&self, label: &str) -> Option<&str> {
        self.highlights
            .iter()
            .find(|h| h.label == label)
            .map(|h| h.text.as_str())
    }
}

/// Extracts `experimentData` readings, ordered by group key.
///
/// Groups missing a numeric `temp` or `gas` are skipped.
pub fn readings(state: &LearnerState) -> Vec<GroupReading> {
    let Some(Value::Object(groups)) = state.get(EXPERIMENT_DATA_KEY) else {
        return Vec::new();
    };
    let mut keyed: Vec<(&String, GroupReading)> = groups
        .iter()
        .filter_map(|(key, group)| {
            Some((
                key,
                GroupReading {
                    temperature: group.get("temp")?.as_i64()?,
                    gas: group.get("gas")?.as_i64()?,
                },
            ))
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(b.0));
    keyed.into_iter().map(|(_, reading)| reading).collect()
}
