//! Lesson Interpreter
//!
//! The interpreter walks a [`Script`](crate::script::Script) one step at a time.
//! It is an explicit state machine: after every call it rests in a [`Phase`]
//! that says what it is waiting for (a timer, a tap, a choice, a typed answer,
//! or nothing at all). It never sleeps itself. Timed pauses are reported as
//! `Phase::Running(Resume::After(..))` and the owner (see [`crate::session`])
//! calls [`Interpreter::resume`] when the delay has elapsed.

use crate::classifier::Classifier;
use crate::lesson::Lesson;
use crate::presenter::Presenter;
use crate::script::{REVEAL_DELAY, Step, StepKind};
use crate::state::{LearnerState, StateChange, Subscription};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a running step hands control to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Continue automatically once the delay has elapsed.
    After(Duration),
    /// Wait for an explicit `advance()`.
    OnAdvance,
}

/// Where the interpreter is resting between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running(Resume),
    AwaitingChoice,
    AwaitingText,
    Finished,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running(_) => "running",
            Self::AwaitingChoice => "awaiting_choice",
            Self::AwaitingText => "awaiting_text",
            Self::Finished => "finished",
        }
    }

    /// The pending auto-advance delay, if any.
    pub fn timer(&self) -> Option<Duration> {
        match self {
            Self::Running(Resume::After(delay)) => Some(*delay),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The position of the interpreter within its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub index: usize,
    pub phase: Phase,
}

impl Cursor {
    const START: Cursor = Cursor {
        index: 0,
        phase: Phase::Idle,
    };
}

/// Caller mistakes. The cursor is left untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpreterError {
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },
    #[error("step '{step}' has no option {index} ({available} available)")]
    NoSuchOption {
        step: String,
        index: usize,
        available: usize,
    },
}

/// Where a graded answer sends the learner.
enum Jump<'a> {
    Next,
    To(&'a str),
}

impl<'a> Jump<'a> {
    fn from_target(target: Option<&'a String>) -> Self {
        target.map_or(Self::Next, |id| Self::To(id.as_str()))
    }
}

/// Plays one lesson for one learner.
pub struct Interpreter {
    lesson: Arc<Lesson>,
    state: LearnerState,
    presenter: Arc<dyn Presenter>,
    cursor: Cursor,
    reported_module: Option<u8>,
}

impl Interpreter {
    /// Creates an interpreter at the start of `lesson`, with fresh learner state.
    pub fn new(lesson: Arc<Lesson>, presenter: Arc<dyn Presenter>) -> Self {
        let state = lesson.initial_state();
        Self {
            lesson,
            state,
            presenter,
            cursor: Cursor::START,
            reported_module: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.cursor.phase
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn state(&self) -> &LearnerState {
        &self.state
    }

    pub fn lesson(&self) -> &Arc<Lesson> {
        &self.lesson
    }

    /// The step under the cursor, or `None` before the start and after the end.
    pub fn current_step(&self) -> Option<&Step> {
        match self.cursor.phase {
            Phase::Idle | Phase::Finished => None,
            _ => self.lesson.script.step_at(self.cursor.index),
        }
    }

    pub fn subscribe_to_state<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange<'_>) + Send + Sync + 'static,
    {
        self.state.subscribe(listener)
    }

    /// Begins the lesson at its first step.
    ///
    /// Only valid from `Idle`; a finished lesson must be `reset()` first.
    pub async fn start(&mut self) -> Result<(), InterpreterError> {
        self.ensure(self.cursor.phase == Phase::Idle, "start")?;
        info!(lesson = %self.lesson.title, steps = self.lesson.script.len(), "Starting lesson");
        self.run_from(0).await;
        Ok(())
    }

    /// Called by the owner once an auto-advance delay has elapsed.
    pub async fn resume(&mut self) -> Result<(), InterpreterError> {
        self.ensure(self.cursor.phase.timer().is_some(), "resume")?;
        self.run_from(self.cursor.index + 1).await;
        Ok(())
    }

    /// Moves past the current message or action step.
    ///
    /// Accepted for any running step, so a learner may also skip a timed pause.
    pub async fn advance(&mut self) -> Result<(), InterpreterError> {
        self.ensure(matches!(self.cursor.phase, Phase::Running(_)), "advance")?;
        self.run_from(self.cursor.index + 1).await;
        Ok(())
    }

    /// Answers the pending choice step with the option at `index`.
    pub async fn submit_choice(&mut self, index: usize) -> Result<(), InterpreterError> {
        self.ensure(self.cursor.phase == Phase::AwaitingChoice, "submit a choice")?;
        let lesson = self.lesson.clone();
        let Some(step) = lesson.script.step_at(self.cursor.index) else {
            return Err(self.invalid("submit a choice"));
        };
        let StepKind::Choice {
            options,
            state_key,
            correct_value,
            on_correct,
            on_incorrect,
            ..
        } = &step.kind
        else {
            return Err(self.invalid("submit a choice"));
        };
        let option = options.get(index).ok_or_else(|| InterpreterError::NoSuchOption {
            step: step.id.clone(),
            index,
            available: options.len(),
        })?;

        info!(step = %step.id, option = %option.label, "Choice submitted");
        let echoed = self.presenter.render_user_echo(&option.label).await;
        self.log_failure("render_user_echo", echoed);
        if let Some(key) = state_key {
            self.state.set(key, option.value.clone());
        }

        let jump = match correct_value {
            Some(expected) => {
                let correct = option.value == *expected;
                self.state.set("lastAnswerCorrect", correct);
                let target = if correct { on_correct } else { on_incorrect };
                Jump::from_target(target.as_ref())
            }
            None => Jump::Next,
        };
        self.jump(step, jump).await;
        Ok(())
    }

    /// Answers the pending free-input step. The text is stored verbatim.
    pub async fn submit_text(&mut self, text: &str) -> Result<(), InterpreterError> {
        self.ensure(self.cursor.phase == Phase::AwaitingText, "submit text")?;
        let lesson = self.lesson.clone();
        let Some(step) = lesson.script.step_at(self.cursor.index) else {
            return Err(self.invalid("submit text"));
        };
        let StepKind::FreeInput {
            state_key,
            classifier,
            on_understood,
            on_not_understood,
            ..
        } = &step.kind
        else {
            return Err(self.invalid("submit text"));
        };

        info!(step = %step.id, chars = text.chars().count(), "Answer submitted");
        let echoed = self.presenter.render_user_echo(text).await;
        self.log_failure("render_user_echo", echoed);
        self.state.set("waitingForInput", false);
        if let Some(key) = state_key {
            self.state.set(key, text);
        }

        let jump = match classifier {
            Some(policy) => {
                let analysis = policy.classify(text);
                info!(step = %step.id, policy = policy.name(), understood = analysis.understood, "Answer classified");
                self.state.set("lastAnalysis", analysis.to_value());
                let target = if analysis.understood {
                    on_understood
                } else {
                    on_not_understood
                };
                Jump::from_target(target.as_ref())
            }
            None => Jump::Next,
        };
        self.jump(step, jump).await;
        Ok(())
    }

    /// Returns to the very beginning: defaults restored, cursor at `(0, Idle)`.
    ///
    /// Valid from any phase and idempotent.
    pub async fn reset(&mut self) {
        info!(lesson = %self.lesson.title, from = %self.cursor.phase, "Resetting lesson");
        self.state.reset();
        self.cursor = Cursor::START;
        self.reported_module = None;
        let cleared = self.presenter.clear().await;
        self.log_failure("clear", cleared);
    }

    fn ensure(&self, valid: bool, operation: &'static str) -> Result<(), InterpreterError> {
        if valid {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> InterpreterError {
        InterpreterError::InvalidState {
            operation,
            phase: self.cursor.phase,
        }
    }

    async fn jump(&mut self, from: &Step, jump: Jump<'_>) {
        match jump {
            Jump::Next => self.run_from(self.cursor.index + 1).await,
            Jump::To(target) => match self.lesson.script.index_of(target) {
                Some(index) => self.run_from(index).await,
                None => {
                    warn!(step = %from.id, to = target, "Jump target does not exist; ending lesson");
                    self.finish().await;
                }
            },
        }
    }

    /// Executes steps from `index` until one of them has to wait.
    async fn run_from(&mut self, mut index: usize) {
        let lesson = self.lesson.clone();
        let script = &lesson.script;
        let mut hops = 0usize;

        loop {
            let Some(step) = script.step_at(index) else {
                self.finish().await;
                return;
            };
            self.cursor.index = index;
            self.enter(step).await;

            match &step.kind {
                StepKind::Message {
                    content,
                    auto_advance,
                    delay_ms,
                } => {
                    let shown = self.presenter.render_message(content).await;
                    self.log_failure("render_message", shown);
                    self.cursor.phase = Phase::Running(pause(*auto_advance, *delay_ms));
                }
                StepKind::Action {
                    action,
                    params,
                    auto_advance,
                    delay_ms,
                } => {
                    match self.presenter.run_action(action, params, &self.state).await {
                        Ok(Some(update)) => {
                            debug!(step = %step.id, keys = update.len(), "Applying action state update");
                            self.state.bulk_update(update);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(step = %step.id, action = %action, error = ?e, "Action failed"),
                    }
                    self.cursor.phase = Phase::Running(pause(*auto_advance, *delay_ms));
                }
                StepKind::Reveal => {
                    let revealed = self.presenter.reveal_auxiliary_panel().await;
                    self.log_failure("reveal_auxiliary_panel", revealed);
                    self.cursor.phase = Phase::Running(Resume::After(REVEAL_DELAY));
                }
                StepKind::Choice {
                    prompt, options, ..
                } => {
                    let shown = self.presenter.render_message(prompt).await;
                    self.log_failure("render_message", shown);
                    let listed = self.presenter.render_choices(options).await;
                    self.log_failure("render_choices", listed);
                    self.cursor.phase = Phase::AwaitingChoice;
                }
                StepKind::FreeInput { prompt, .. } => {
                    let shown = self.presenter.render_message(prompt).await;
                    self.log_failure("render_message", shown);
                    self.state.set("waitingForInput", true);
                    self.cursor.phase = Phase::AwaitingText;
                }
                StepKind::Branch {
                    condition,
                    on_true,
                    on_false,
                } => {
                    hops += 1;
                    if hops > script.len() {
                        warn!(step = %step.id, hops, "Branch cycle detected; ending lesson");
                        self.finish().await;
                        return;
                    }
                    let taken = condition.evaluate(&self.state);
                    let target = if taken { on_true } else { on_false };
                    debug!(step = %step.id, taken, to = %target, "Branch evaluated");
                    match script.index_of(target) {
                        Some(next) => {
                            index = next;
                            continue;
                        }
                        None => {
                            warn!(step = %step.id, to = %target, "Branch target does not exist; ending lesson");
                            self.finish().await;
                            return;
                        }
                    }
                }
            }
            return;
        }
    }

    /// Bookkeeping shared by every step: position keys and module progress.
    async fn enter(&mut self, step: &Step) {
        debug!(step = %step.id, kind = step.kind.name(), index = self.cursor.index, "Entering step");
        self.state.set("currentStep", self.cursor.index);
        if self.reported_module != Some(step.module) {
            info!(module = step.module, step = %step.id, "Entering module");
            self.reported_module = Some(step.module);
            self.state.set("currentModule", step.module);
            let reported = self.presenter.report_progress(step.module).await;
            self.log_failure("report_progress", reported);
        }
    }

    async fn finish(&mut self) {
        if self.cursor.phase == Phase::Finished {
            return;
        }
        self.cursor.phase = Phase::Finished;
        let summary = self.lesson.summarize(&self.state);
        info!(lesson = %self.lesson.title, "Lesson complete");
        let reported = self.presenter.report_course_complete(&summary).await;
        self.log_failure("report_course_complete", reported);
    }

    fn log_failure(&self, call: &str, result: anyhow::Result<()>) {
        if let Err(e) = result {
            warn!(call, step = self.cursor.index, error = ?e, "Presenter call failed");
        }
    }
}

fn pause(auto_advance: bool, delay_ms: u64) -> Resume {
    if auto_advance {
        Resume::After(Duration::from_millis(delay_ms))
    } else {
        Resume::OnAdvance
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("lesson", &self.lesson.title)
            .field("cursor", &self.cursor)
            .finish()
    }
}
