//! Lesson Bundles
//!
//! A `Lesson` ties a script to the learner-state defaults it expects and to the
//! function that turns a finished state into a course summary. Lessons are
//! either built in code (see [`crate::course`]) or loaded from a JSON document.

use crate::script::{Script, ScriptError, Step};
use crate::state::LearnerState;
use crate::summary::CourseSummary;
use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Builds the end-of-course summary from the final learner state.
pub type Summarizer = Arc<dyn Fn(&LearnerState) -> CourseSummary + Send + Sync>;

/// The serialized form of a lesson.
#[derive(Debug, Deserialize)]
pub struct LessonDocument {
    pub title: String,
    #[serde(default)]
    pub defaults: Map<String, Value>,
    pub steps: Vec<Step>,
}

/// A playable lesson.
#[derive(Clone)]
pub struct Lesson {
    pub title: String,
    pub script: Arc<Script>,
    pub defaults: Map<String, Value>,
    summarizer: Summarizer,
}

impl Lesson {
    pub fn new(
        title: &str,
        script: Script,
        defaults: Map<String, Value>,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            title: title.to_string(),
            script: Arc::new(script),
            defaults,
            summarizer,
        }
    }

    /// Builds a lesson from its document form, using the generic summary.
    pub fn from_document(document: LessonDocument) -> Result<Self, ScriptError> {
        let script = Script::new(document.steps)?;
        let title = document.title.clone();
        let summarizer: Summarizer =
            Arc::new(move |state: &LearnerState| CourseSummary::from_state(&title, state));
        Ok(Self::new(
            &document.title,
            script,
            document.defaults,
            summarizer,
        ))
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Self::from_document(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lesson file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid lesson file {}", path.display()))
    }

    /// A fresh learner state holding this lesson's defaults.
    pub fn initial_state(&self) -> LearnerState {
        LearnerState::new(self.defaults.clone())
    }

    pub fn summarize(&self, state: &LearnerState) -> CourseSummary {
        (self.summarizer)(state)
    }
}

impl fmt::Debug for Lesson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lesson")
            .field("title", &self.title)
            .field("steps", &self.script.len())
            .finish()
    }
}
