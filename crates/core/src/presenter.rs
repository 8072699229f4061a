//! Presentation Collaborator
//!
//! The interpreter never draws anything itself. It calls into a `Presenter`,
//! which owns every visible effect: chat bubbles, choice buttons, the lab
//! bench, progress and the final summary card.

use crate::LessonEvent;
use crate::lab::LabBench;
use crate::script::ChoiceOption;
use crate::state::{LearnerState, StateChange};
use crate::summary::CourseSummary;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Defines the contract for any rendering layer that can play a lesson.
///
/// Every method resolves once its visible effect is complete, which is how the
/// interpreter paces itself. Errors are logged by the interpreter and never
/// stop the lesson.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Shows a tutor message. May simulate composing before it appears.
    async fn render_message(&self, content: &str) -> Result<()>;

    /// Shows the options of a choice step.
    async fn render_choices(&self, options: &[ChoiceOption]) -> Result<()>;

    /// Shows the learner's own answer in the transcript.
    async fn render_user_echo(&self, text: &str) -> Result<()>;

    /// Plays a scripted visualization.
    ///
    /// # Returns
    ///
    /// An optional composite learner-state update (for example replacing the
    /// experiment data) that the interpreter applies as one bulk change.
    async fn run_action(
        &self,
        action: &str,
        params: &Value,
        state: &LearnerState,
    ) -> Result<Option<Map<String, Value>>>;

    /// Reveals the standing research-question banner.
    async fn reveal_auxiliary_panel(&self) -> Result<()>;

    async fn report_progress(&self, module: u8) -> Result<()>;

    async fn report_course_complete(&self, summary: &CourseSummary) -> Result<()>;

    /// Wipes the transcript and bench before a restart.
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Timing used to make a presenter feel like a live tutor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Simulated composing time per character of a message.
    pub per_char: Duration,
    /// Upper bound on the composing time of one message.
    pub max_compose: Duration,
    /// Whether to wait for lab animations to settle.
    pub settle_actions: bool,
}

impl Pacing {
    /// No artificial delays at all.
    pub const INSTANT: Pacing = Pacing {
        per_char: Duration::ZERO,
        max_compose: Duration::ZERO,
        settle_actions: false,
    };

    pub fn compose_delay(&self, content: &str) -> Duration {
        let chars = u32::try_from(content.chars().count()).unwrap_or(u32::MAX);
        self.per_char.saturating_mul(chars).min(self.max_compose)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            per_char: Duration::from_millis(20),
            max_compose: Duration::from_millis(1500),
            settle_actions: true,
        }
    }
}

/// A `Presenter` that turns every call into a [`LessonEvent`] on a channel.
///
/// Lab actions are run against an owned [`LabBench`]; the resulting view is
/// emitted and any state update it produces is handed back to the interpreter.
/// The channel is unbounded so that synchronous state listeners can share it
/// (see [`ChannelPresenter::state_forwarder`]).
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<LessonEvent>,
    lab: Mutex<LabBench>,
    pacing: Pacing,
}

impl ChannelPresenter {
    pub fn new(tx: mpsc::UnboundedSender<LessonEvent>, pacing: Pacing) -> Self {
        Self {
            tx,
            lab: Mutex::new(LabBench::new()),
            pacing,
        }
    }

    /// A state listener that emits [`LessonEvent::StateUpdate`] on this
    /// presenter's channel, interleaved with its other events in the order
    /// they happen.
    pub fn state_forwarder(&self) -> impl Fn(&StateChange<'_>) + Send + Sync + 'static {
        let tx = self.tx.clone();
        move |change: &StateChange<'_>| {
            let update = LessonEvent::StateUpdate {
                key: change.key.to_string(),
                value: change.value.clone(),
            };
            if tx.send(update).is_err() {
                debug!(key = change.key, "State update dropped: event receiver is gone");
            }
        }
    }

    async fn emit(&self, event: LessonEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow!("Lesson event receiver dropped"))
    }
}

#[async_trait]
impl Presenter for ChannelPresenter {
    async fn render_message(&self, content: &str) -> Result<()> {
        let delay = self.pacing.compose_delay(content);
        if !delay.is_zero() {
            self.emit(LessonEvent::Composing).await?;
            tokio::time::sleep(delay).await;
        }
        self.emit(LessonEvent::Message {
            content: content.to_string(),
        })
        .await
    }

    async fn render_choices(&self, options: &[ChoiceOption]) -> Result<()> {
        self.emit(LessonEvent::Choices {
            options: options.to_vec(),
        })
        .await
    }

    async fn render_user_echo(&self, text: &str) -> Result<()> {
        self.emit(LessonEvent::UserEcho {
            text: text.to_string(),
        })
        .await
    }

    async fn run_action(
        &self,
        action: &str,
        params: &Value,
        state: &LearnerState,
    ) -> Result<Option<Map<String, Value>>> {
        let outcome = self.lab.lock().await.run(action, params, state)?;
        self.emit(LessonEvent::Lab {
            view: outcome.view,
            status: outcome.status,
        })
        .await?;
        if self.pacing.settle_actions && !outcome.settle.is_zero() {
            tokio::time::sleep(outcome.settle).await;
        }
        Ok(outcome.state_update)
    }

    async fn reveal_auxiliary_panel(&self) -> Result<()> {
        self.emit(LessonEvent::RevealPanel).await
    }

    async fn report_progress(&self, module: u8) -> Result<()> {
        self.emit(LessonEvent::Progress { module }).await
    }

    async fn report_course_complete(&self, summary: &CourseSummary) -> Result<()> {
        self.emit(LessonEvent::CourseComplete {
            summary: summary.clone(),
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.lab.lock().await.reset();
        self.emit(LessonEvent::Cleared).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course;
    use crate::lab::LabView;
    use serde_json::json;

    #[test]
    fn compose_delay_is_proportional_and_capped() {
        let pacing = Pacing::default();
        assert_eq!(pacing.compose_delay("你好"), Duration::from_millis(40));
        assert_eq!(
            pacing.compose_delay(&"长".repeat(500)),
            Duration::from_millis(1500)
        );
        assert_eq!(Pacing::INSTANT.compose_delay("anything"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn message_is_preceded_by_composing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let presenter = ChannelPresenter::new(tx, Pacing::default());
        presenter.render_message("hello").await.unwrap();

        assert!(matches!(rx.recv().await, Some(LessonEvent::Composing)));
        assert!(matches!(
            rx.recv().await,
            Some(LessonEvent::Message { content }) if content == "hello"
        ));
    }

    #[tokio::test]
    async fn fast_forward_returns_experiment_update() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let presenter = ChannelPresenter::new(tx, Pacing::INSTANT);
        let state = course::initial_state();

        presenter
            .run_action("setup_groups", &json!({"count": 3}), &state)
            .await
            .unwrap();
        let update = presenter
            .run_action("fast_forward", &Value::Null, &state)
            .await
            .unwrap()
            .expect("fast forward updates the state");

        assert_eq!(update["experimentData"]["group3"], json!({"temp": 30, "gas": 60}));
        rx.recv().await;
        match rx.recv().await {
            Some(LessonEvent::Lab {
                view: LabView::Groups { groups, .. },
                status,
            }) => {
                assert_eq!(groups.iter().map(|g| g.gas).collect::<Vec<_>>(), vec![20, 40, 60]);
                assert_eq!(status, "1小时后...");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_action_is_an_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let presenter = ChannelPresenter::new(tx, Pacing::INSTANT);
        let state = course::initial_state();
        assert!(
            presenter
                .run_action("juggle", &Value::Null, &state)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn dropped_receiver_surfaces_as_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let presenter = ChannelPresenter::new(tx, Pacing::INSTANT);
        assert!(presenter.reveal_auxiliary_panel().await.is_err());
    }

    #[tokio::test]
    async fn state_updates_keep_their_place_among_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let presenter = ChannelPresenter::new(tx, Pacing::INSTANT);
        let mut state = course::initial_state();
        let _sub = state.subscribe(presenter.state_forwarder());

        presenter.render_user_echo("冰箱").await.unwrap();
        state.set("transferAnswer", "fridge");
        presenter.report_progress(4).await.unwrap();

        assert!(matches!(rx.recv().await, Some(LessonEvent::UserEcho { text }) if text == "冰箱"));
        match rx.recv().await {
            Some(LessonEvent::StateUpdate { key, value }) => {
                assert_eq!(key, "transferAnswer");
                assert_eq!(value, json!("fridge"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(LessonEvent::Progress { module: 4 })));
    }
}
