//! Free-Text Classifiers
//!
//! A classifier decides whether a learner's free-text answer shows that they
//! "got it". Every policy here is deliberately literal: keywords are tested
//! with `str::contains`, with no case folding, tokenization or word-boundary
//! checks, so a keyword buried inside a longer token still counts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// The verdict of a classifier plus any auxiliary signals it computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub understood: bool,
    #[serde(flatten)]
    pub signals: Map<String, Value>,
}

impl Analysis {
    pub fn new(understood: bool) -> Self {
        Self {
            understood,
            signals: Map::new(),
        }
    }

    /// Attaches a named signal.
    pub fn with_signal(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.signals.insert(name.to_string(), value.into());
        self
    }

    pub fn signal(&self, name: &str) -> Option<&Value> {
        self.signals.get(name)
    }

    /// The JSON object stored as `lastAnalysis`: `{"understood": .., ..signals}`.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("understood".into(), Value::Bool(self.understood));
        for (key, value) in &self.signals {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Maps a raw learner utterance to an [`Analysis`].
///
/// Implementations must be pure: the interpreter calls them with nothing but
/// the submitted text.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Analysis;
}

fn hits<'a>(keywords: &'a [String], text: &'a str) -> impl Iterator<Item = &'a String> + 'a {
    keywords.iter().filter(move |k| text.contains(k.as_str()))
}

/// Understood when any one keyword appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyKeyword {
    pub keywords: Vec<String>,
    /// Optional name under which the verdict is repeated as a signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

impl AnyKeyword {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            signal: None,
        }
    }

    pub fn with_signal(mut self, name: &str) -> Self {
        self.signal = Some(name.to_string());
        self
    }
}

impl Classifier for AnyKeyword {
    fn classify(&self, text: &str) -> Analysis {
        let found = hits(&self.keywords, text).next().is_some();
        match &self.signal {
            Some(name) => Analysis::new(found).with_signal(name, found),
            None => Analysis::new(found),
        }
    }
}

/// One concept group inside [`KeywordGroups`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    /// Signal name reporting whether this group matched, e.g. `mentionsTemp`.
    pub signal: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new<I, S>(signal: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            signal: signal.to_string(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Understood only when every group contributes at least one keyword.
///
/// Used for the richer questions, where an answer has to connect two concepts
/// (for instance a temperature term *and* a respiration term).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroups {
    pub groups: Vec<KeywordGroup>,
}

impl KeywordGroups {
    pub fn new(groups: Vec<KeywordGroup>) -> Self {
        Self { groups }
    }
}

impl Classifier for KeywordGroups {
    fn classify(&self, text: &str) -> Analysis {
        let mut analysis = Analysis::new(!self.groups.is_empty());
        for group in &self.groups {
            let matched = hits(&group.keywords, text).next().is_some();
            analysis.understood &= matched;
            analysis.signals.insert(group.signal.clone(), Value::Bool(matched));
        }
        analysis
    }
}

/// Understood when at least `threshold` distinct keywords appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keywords: Vec<String>,
    pub threshold: usize,
}

impl KeywordCount {
    pub fn new<I, S>(keywords: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            threshold,
        }
    }
}

impl Classifier for KeywordCount {
    fn classify(&self, text: &str) -> Analysis {
        let count = hits(&self.keywords, text).count();
        Analysis::new(count >= self.threshold).with_signal("matchCount", count)
    }
}

/// Understood when the answer contains an ASCII digit (reading a measurement).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsDigit;

impl Classifier for ContainsDigit {
    fn classify(&self, text: &str) -> Analysis {
        Analysis::new(text.chars().any(|c| c.is_ascii_digit()))
    }
}

/// A classifier attached to a free-input step.
///
/// The keyword policies round-trip through the lesson document format;
/// `Custom` carries any other implementation and only exists in code.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClassifierPolicy {
    AnyKeyword(AnyKeyword),
    KeywordGroups(KeywordGroups),
    KeywordCount(KeywordCount),
    ContainsDigit,
    #[serde(skip)]
    Custom(Arc<dyn Classifier>),
}

impl ClassifierPolicy {
    pub fn custom(classifier: impl Classifier + 'static) -> Self {
        Self::Custom(Arc::new(classifier))
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnyKeyword(_) => "any_keyword",
            Self::KeywordGroups(_) => "keyword_groups",
            Self::KeywordCount(_) => "keyword_count",
            Self::ContainsDigit => "contains_digit",
            Self::Custom(_) => "custom",
        }
    }
}

impl Classifier for ClassifierPolicy {
    fn classify(&self, text: &str) -> Analysis {
        match self {
            Self::AnyKeyword(policy) => policy.classify(text),
            Self::KeywordGroups(policy) => policy.classify(text),
            Self::KeywordCount(policy) => policy.classify(text),
            Self::ContainsDigit => ContainsDigit.classify(text),
            Self::Custom(classifier) => classifier.classify(text),
        }
    }
}

impl fmt::Debug for ClassifierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyKeyword(policy) => f.debug_tuple("AnyKeyword").field(policy).finish(),
            Self::KeywordGroups(policy) => f.debug_tuple("KeywordGroups").field(policy).finish(),
            Self::KeywordCount(policy) => f.debug_tuple("KeywordCount").field(policy).finish(),
            Self::ContainsDigit => f.write_str("ContainsDigit"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<AnyKeyword> for ClassifierPolicy {
    fn from(policy: AnyKeyword) -> Self {
        Self::AnyKeyword(policy)
    }
}

impl From<KeywordGroups> for ClassifierPolicy {
    fn from(policy: KeywordGroups) -> Self {
        Self::KeywordGroups(policy)
    }
}

impl From<KeywordCount> for ClassifierPolicy {
    fn from(policy: KeywordCount) -> Self {
        Self::KeywordCount(policy)
    }
}
