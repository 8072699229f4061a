pub mod classifier;
pub mod course;
pub mod interpreter;
pub mod lab;
pub mod lesson;
pub mod presenter;
pub mod script;
pub mod session;
pub mod state;
pub mod summary;

use serde::Serialize;
use serde_json::Value;

pub use interpreter::{Cursor, Interpreter, InterpreterError, Phase, Resume};
pub use lesson::Lesson;
pub use presenter::{ChannelPresenter, Pacing, Presenter};
pub use session::{SessionError, SessionHandle};
pub use state::LearnerState;

/// Represents the visible effects a lesson asks its host to display.
///
/// This enum decouples the interpreter's pacing from whatever actually draws
/// the lesson (a socket, a terminal). It is produced by
/// [`presenter::ChannelPresenter`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LessonEvent {
    /// The tutor is "typing" the next message.
    Composing,
    Message {
        content: String,
    },
    Choices {
        options: Vec<script::ChoiceOption>,
    },
    /// The learner's own answer, echoed into the transcript.
    UserEcho {
        text: String,
    },
    Lab {
        view: lab::LabView,
        status: String,
    },
    RevealPanel,
    Progress {
        module: u8,
    },
    CourseComplete {
        summary: summary::CourseSummary,
    },
    /// The transcript and bench were wiped for a restart.
    Cleared,
    /// A learner-state key changed. `key` is `"bulk"` or `"reset"` for
    /// composite changes. Only sent to hosts that subscribe a
    /// [`ChannelPresenter::state_forwarder`].
    StateUpdate {
        key: String,
        value: Value,
    },
}
