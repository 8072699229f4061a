//! Lesson Script Model
//!
//! A script is the authored, immutable sequence of steps a lesson plays back.
//! Steps are kept in authored order (linear advance is "index + 1") and are
//! also indexed by id, so every branch, feedback and classification jump is an
//! explicit edge in a graph keyed by step id.

use crate::classifier::ClassifierPolicy;
use crate::state::LearnerState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay used by message steps that do not specify one.
pub const DEFAULT_MESSAGE_DELAY_MS: u64 = 1000;
/// Delay used by action steps that do not specify one.
pub const DEFAULT_ACTION_DELAY_MS: u64 = 500;
/// Fixed pause after revealing the auxiliary panel.
pub const REVEAL_DELAY: Duration = Duration::from_millis(500);

fn default_message_delay() -> u64 {
    DEFAULT_MESSAGE_DELAY_MS
}

fn default_action_delay() -> u64 {
    DEFAULT_ACTION_DELAY_MS
}

fn default_true() -> bool {
    true
}

/// Errors raised while loading a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("duplicate step id '{0}'")]
    DuplicateId(String),
    #[error("invalid lesson document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One selectable answer of a choice step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Text shown to (and echoed back for) the learner.
    pub label: String,
    pub value: Value,
    /// Presentation hint only; grading uses the step's `correct_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

impl ChoiceOption {
    pub fn new(label: &str, value: impl Into<Value>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
            correct: None,
        }
    }

    pub fn marked(mut self, correct: bool) -> Self {
        self.correct = Some(correct);
        self
    }
}

/// A predicate written in code rather than in a lesson document.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&LearnerState) -> bool + Send + Sync>);

impl Predicate {
    pub fn new(f: impl Fn(&LearnerState) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// The condition a branch step evaluates against the learner state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    /// Unconditional jump.
    Always,
    /// `state[key] == value`.
    Equals { key: String, value: Value },
    /// `state[key]` is present and not `null`, `false`, `0` or `""`.
    Truthy { key: String },
    #[serde(skip)]
    Custom(Predicate),
}

impl Condition {
    pub fn equals(key: &str, value: impl Into<Value>) -> Self {
        Self::Equals {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn evaluate(&self, state: &LearnerState) -> bool {
        match self {
            Self::Always => true,
            Self::Equals { key, value } => state.get(key) == Some(value),
            Self::Truthy { key } => match state.get(key) {
                None | Some(Value::Null) => false,
                Some(Value::Bool(b)) => *b,
                Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
                Some(Value::String(s)) => !s.is_empty(),
                Some(Value::Array(_)) | Some(Value::Object(_)) => true,
            },
            Self::Custom(predicate) => (predicate.0)(state),
        }
    }
}

/// The behaviour of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Message {
        content: String,
        #[serde(default = "default_true")]
        auto_advance: bool,
        #[serde(default = "default_message_delay")]
        delay_ms: u64,
    },
    Choice {
        prompt: String,
        options: Vec<ChoiceOption>,
        #[serde(default)]
        state_key: Option<String>,
        #[serde(default)]
        correct_value: Option<Value>,
        #[serde(default)]
        on_correct: Option<String>,
        #[serde(default)]
        on_incorrect: Option<String>,
    },
    FreeInput {
        prompt: String,
        #[serde(default)]
        state_key: Option<String>,
        #[serde(default)]
        classifier: Option<ClassifierPolicy>,
        #[serde(default)]
        on_understood: Option<String>,
        #[serde(default)]
        on_not_understood: Option<String>,
    },
    Action {
        action: String,
        #[serde(default)]
        params: Value,
        #[serde(default = "default_true")]
        auto_advance: bool,
        #[serde(default = "default_action_delay")]
        delay_ms: u64,
    },
    Reveal,
    Branch {
        condition: Condition,
        on_true: String,
        on_false: String,
    },
}

impl StepKind {
    /// The document tag of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Choice { .. } => "choice",
            Self::FreeInput { .. } => "free_input",
            Self::Action { .. } => "action",
            Self::Reveal => "reveal",
            Self::Branch { .. } => "branch",
        }
    }
}

/// One authored unit of the lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub module: u8,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    /// Every step id this step may jump to.
    pub fn references(&self) -> Vec<&str> {
        let refs: Vec<&Option<String>> = match &self.kind {
            StepKind::Choice {
                on_correct,
                on_incorrect,
                ..
            } => vec![on_correct, on_incorrect],
            StepKind::FreeInput {
                on_understood,
                on_not_understood,
                ..
            } => vec![on_understood, on_not_understood],
            StepKind::Branch {
                on_true, on_false, ..
            } => return vec![on_true.as_str(), on_false.as_str()],
            _ => vec![],
        };
        refs.into_iter().filter_map(|r| r.as_deref()).collect()
    }
}

/// A dangling jump found by [`Script::unresolved_references`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub from: String,
    pub target: String,
}

/// The immutable step graph.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl Script {
    /// Builds a script, rejecting duplicate step ids.
    pub fn new(steps: Vec<Step>) -> Result<Self, ScriptError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), position).is_some() {
                return Err(ScriptError::DuplicateId(step.id.clone()));
            }
        }
        Ok(Self { steps, index })
    }

    /// Parses a JSON array of steps.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let steps: Vec<Step> = serde_json::from_str(json)?;
        Self::new(steps)
    }

    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.index_of(id).and_then(|i| self.steps.get(i))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Lists every jump whose target id does not exist.
    ///
    /// The interpreter treats such a jump as the end of the lesson, so this is
    /// advisory: hosts log the result at load time.
    pub fn unresolved_references(&self) -> Vec<UnresolvedReference> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.references()
                    .into_iter()
                    .filter(|target| !self.index.contains_key(*target))
                    .map(|target| UnresolvedReference {
                        from: step.id.clone(),
                        target: target.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
