//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the lesson being
//! served and the configuration every WebSocket session is built from.

use crate::config::Config;
use anyhow::Context;
use lesson_core::{Lesson, course};
use std::sync::Arc;
use tracing::{info, warn};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub lesson: Arc<Lesson>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(lesson: Lesson, config: Config) -> Self {
        Self {
            lesson: Arc::new(lesson),
            config: Arc::new(config),
        }
    }

    /// Loads the configured lesson document, or the built-in course.
    pub fn load(config: Config) -> anyhow::Result<Self> {
        let lesson = match &config.lesson_path {
            Some(path) => Lesson::from_path(path)?,
            None => course::yeast_respiration().context("Built-in lesson is invalid")?,
        };
        for dangling in lesson.script.unresolved_references() {
            warn!(step = %dangling.from, to = %dangling.target, "Lesson jumps to a missing step");
        }
        info!(title = %lesson.title, steps = lesson.script.len(), "Lesson loaded");
        Ok(Self::new(lesson, config))
    }
}
