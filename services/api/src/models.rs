//! API Models
//!
//! Response bodies of the REST endpoints, with `utoipa` schemas for the
//! OpenAPI document.

use lesson_core::Lesson;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One step of the course outline.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StepSummary {
    #[schema(example = "question_1")]
    pub id: String,
    #[schema(example = 1)]
    pub module: u8,
    #[schema(example = "free_input")]
    pub kind: String,
}

/// The shape of the lesson served by this instance.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct CourseOutline {
    pub title: String,
    /// Distinct module numbers, in the order they first appear.
    pub modules: Vec<u8>,
    pub steps: Vec<StepSummary>,
}

impl From<&Lesson> for CourseOutline {
    fn from(lesson: &Lesson) -> Self {
        let steps: Vec<StepSummary> = lesson
            .script
            .iter()
            .map(|step| StepSummary {
                id: step.id.clone(),
                module: step.module,
                kind: step.kind.name().to_string(),
            })
            .collect();
        let mut modules: Vec<u8> = Vec::new();
        for step in &steps {
            if !modules.contains(&step.module) {
                modules.push(step.module);
            }
        }
        Self {
            title: lesson.title.clone(),
            modules,
            steps,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::course;

    #[test]
    fn test_outline_of_built_in_course() {
        let lesson = course::yeast_respiration().unwrap();
        let outline = CourseOutline::from(&lesson);

        assert_eq!(outline.title, course::TITLE);
        assert_eq!(outline.steps.len(), lesson.script.len());
        assert_eq!(outline.steps[0].id, "intro_1");
        assert_eq!(outline.steps[0].kind, "message");
        let mut modules = outline.modules.clone();
        modules.sort();
        assert_eq!(modules, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_outline_serialization() {
        let lesson = Lesson::from_json(
            r#"{"title": "T", "steps": [{"id": "p", "module": 2, "type": "reveal"}]}"#,
        )
        .unwrap();
        let json = serde_json::to_value(CourseOutline::from(&lesson)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "T",
                "modules": [2],
                "steps": [{"id": "p", "module": 2, "kind": "reveal"}]
            })
        );
    }
}
