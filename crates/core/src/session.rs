//! Session Actor
//!
//! A session owns one [`Interpreter`] inside a tokio task and is the only thing
//! that ever touches it. Hosts talk to it through a cloneable
//! [`SessionHandle`]; each request carries a oneshot reply. The actor also
//! owns the auto-advance timer, so resetting a session always cancels any
//! pending advance from the previous run.

use crate::interpreter::{Cursor, Interpreter, InterpreterError, Phase};
use crate::state::{ListenerRegistry, StateChange, Subscription};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

const REQUEST_BUFFER: usize = 16;

/// Errors surfaced to callers of a [`SessionHandle`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
    #[error("answer is empty")]
    EmptyInput,
    #[error("session has shut down")]
    Closed,
}

#[derive(Debug)]
enum Command {
    Start,
    Advance,
    Choose(usize),
    Answer(String),
    Restart,
    Reset,
    Phase,
}

impl Command {
    fn cancels_timer(&self) -> bool {
        matches!(self, Self::Reset | Self::Restart)
    }

    fn moves_cursor(&self) -> bool {
        !matches!(self, Self::Phase)
    }
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<Phase, InterpreterError>>,
}

/// The host-facing side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
    listeners: ListenerRegistry,
    cursor: watch::Receiver<Cursor>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<Phase, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        let phase = response.await.map_err(|_| SessionError::Closed)??;
        Ok(phase)
    }

    pub async fn start(&self) -> Result<Phase, SessionError> {
        self.send(Command::Start).await
    }

    pub async fn advance(&self) -> Result<Phase, SessionError> {
        self.send(Command::Advance).await
    }

    pub async fn submit_choice(&self, index: usize) -> Result<Phase, SessionError> {
        self.send(Command::Choose(index)).await
    }

    /// Submits a typed answer. Blank answers never reach the interpreter.
    pub async fn submit_text(&self, text: &str) -> Result<Phase, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.send(Command::Answer(text.to_string())).await
    }

    /// Resets the lesson and immediately starts it again.
    pub async fn restart(&self) -> Result<Phase, SessionError> {
        self.send(Command::Restart).await
    }

    pub async fn reset(&self) -> Result<Phase, SessionError> {
        self.send(Command::Reset).await
    }

    pub async fn phase(&self) -> Result<Phase, SessionError> {
        self.send(Command::Phase).await
    }

    /// Follows the cursor, including moves made by the auto-advance timer.
    pub fn cursor_updates(&self) -> watch::Receiver<Cursor> {
        self.cursor.clone()
    }

    /// Subscribes to the learner state owned by the session.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChange<'_>) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

/// Moves `interpreter` into its own task and returns a handle to drive it.
///
/// The task ends once every handle has been dropped.
pub fn spawn(interpreter: Interpreter) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    let listeners = interpreter.state().listeners();
    let (cursor_tx, cursor) = watch::channel(interpreter.cursor());
    let task = tokio::spawn(run(interpreter, rx, cursor_tx));
    (
        SessionHandle {
            tx,
            listeners,
            cursor,
        },
        task,
    )
}

type Timer = Option<Pin<Box<Sleep>>>;

fn arm(phase: Phase) -> Timer {
    phase.timer().map(|delay| Box::pin(tokio::time::sleep(delay)))
}

async fn elapsed(timer: &mut Timer) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn publish(cursor_tx: &watch::Sender<Cursor>, cursor: Cursor) {
    cursor_tx.send_if_modified(|current| {
        let changed = *current != cursor;
        *current = cursor;
        changed
    });
}

async fn run(
    mut interpreter: Interpreter,
    mut rx: mpsc::Receiver<Request>,
    cursor_tx: watch::Sender<Cursor>,
) {
    let mut timer: Timer = None;

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(Request { command, reply }) = request else {
                    break;
                };
                debug!(?command, "Session request");
                if command.cancels_timer() {
                    timer = None;
                }
                let moves_cursor = command.moves_cursor();
                let result = handle(&mut interpreter, command).await;
                if moves_cursor && result.is_ok() {
                    timer = arm(interpreter.phase());
                }
                publish(&cursor_tx, interpreter.cursor());
                if reply.send(result).is_err() {
                    debug!("Session caller went away before the reply");
                }
            },
            () = elapsed(&mut timer) => {
                timer = None;
                match interpreter.resume().await {
                    Ok(()) => timer = arm(interpreter.phase()),
                    Err(e) => warn!(error = %e, "Auto-advance fired in an unexpected phase"),
                }
                publish(&cursor_tx, interpreter.cursor());
            },
        }
    }
    info!(lesson = %interpreter.lesson().title, phase = %interpreter.phase(), "Session closed");
}

async fn handle(interpreter: &mut Interpreter, command: Command) -> Result<Phase, InterpreterError> {
    match command {
        Command::Start => interpreter.start().await?,
        Command::Advance => interpreter.advance().await?,
        Command::Choose(index) => interpreter.submit_choice(index).await?,
        Command::Answer(text) => interpreter.submit_text(&text).await?,
        Command::Restart => {
            interpreter.reset().await;
            interpreter.start().await?;
        }
        Command::Reset => interpreter.reset().await,
        Command::Phase => {}
    }
    Ok(interpreter.phase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LessonEvent;
    use crate::interpreter::Resume;
    use crate::lesson::{Lesson, Summarizer};
    use crate::presenter::{ChannelPresenter, Pacing};
    use crate::script::{Script, Step, StepKind};
    use crate::state::LearnerState;
    use crate::summary::CourseSummary;
    use serde_json::Map;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn message(id: &str, auto_advance: bool, delay_ms: u64) -> Step {
        Step {
            id: id.into(),
            module: 1,
            kind: StepKind::Message {
                content: id.into(),
                auto_advance,
                delay_ms,
            },
        }
    }

    fn ask() -> Step {
        Step {
            id: "ask".into(),
            module: 1,
            kind: StepKind::FreeInput {
                prompt: "Why?".into(),
                state_key: Some("why".into()),
                classifier: None,
                on_understood: None,
                on_not_understood: None,
            },
        }
    }

    fn session(steps: Vec<Step>) -> (SessionHandle, mpsc::UnboundedReceiver<LessonEvent>) {
        let summarizer: Summarizer =
            Arc::new(|state: &LearnerState| CourseSummary::from_state("done", state));
        let lesson = Lesson::new("t", Script::new(steps).unwrap(), Map::new(), summarizer);
        let (tx, rx) = mpsc::unbounded_channel();
        let presenter = Arc::new(ChannelPresenter::new(tx, Pacing::INSTANT));
        let (handle, _task) = spawn(Interpreter::new(Arc::new(lesson), presenter));
        (handle, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advance_fires_after_delay() {
        let (handle, _rx) = session(vec![message("a", true, 1000), message("b", false, 0)]);
        let phase = handle.start().await.unwrap();
        assert_eq!(phase, Phase::Running(Resume::After(Duration::from_millis(1000))));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(phase, handle.phase().await.unwrap());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(handle.phase().await.unwrap(), Phase::Running(Resume::OnAdvance));
        assert_eq!(handle.advance().await.unwrap(), Phase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_pending_timer() {
        let (handle, _rx) = session(vec![message("a", true, 1000), message("b", false, 0)]);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        handle.restart().await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(
            handle.phase().await.unwrap(),
            Phase::Running(Resume::After(Duration::from_millis(1000)))
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.phase().await.unwrap(), Phase::Running(Resume::OnAdvance));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_leaves_session_idle() {
        let (handle, _rx) = session(vec![message("a", true, 100), message("b", true, 100)]);
        handle.start().await.unwrap();
        assert_eq!(handle.reset().await.unwrap(), Phase::Idle);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.phase().await.unwrap(), Phase::Idle);
    }

    #[tokio::test]
    async fn blank_answers_are_rejected_before_delivery() {
        let (handle, _rx) = session(vec![ask(), message("end", false, 0)]);
        handle.start().await.unwrap();
        assert!(matches!(
            handle.submit_text("   \n").await,
            Err(SessionError::EmptyInput)
        ));
        assert_eq!(handle.phase().await.unwrap(), Phase::AwaitingText);
    }

    #[tokio::test]
    async fn answers_are_trimmed_and_observable() {
        let (handle, _rx) = session(vec![ask(), message("end", false, 0)]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        handle.subscribe(move |change| {
            if change.key == "why" {
                sink.lock().unwrap().push(change.value.clone());
            }
        });

        handle.start().await.unwrap();
        handle.submit_text("  because  ").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![serde_json::json!("because")]);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_moves_are_published() {
        let (handle, _rx) = session(vec![message("a", true, 200), ask()]);
        let mut cursor = handle.cursor_updates();
        assert_eq!(cursor.borrow_and_update().phase, Phase::Idle);

        handle.start().await.unwrap();
        cursor.changed().await.unwrap();
        assert_eq!(cursor.borrow_and_update().index, 0);

        cursor.changed().await.unwrap();
        let moved = *cursor.borrow_and_update();
        assert_eq!((moved.index, moved.phase), (1, Phase::AwaitingText));
    }

    #[tokio::test]
    async fn caller_errors_do_not_end_the_session() {
        let (handle, _rx) = session(vec![message("a", false, 0)]);
        assert!(matches!(
            handle.advance().await,
            Err(SessionError::Interpreter(InterpreterError::InvalidState { .. }))
        ));
        assert_eq!(handle.start().await.unwrap(), Phase::Running(Resume::OnAdvance));
    }
}
