use crate::render;
use anyhow::Context;
use clap::Parser;
use lesson_core::{
    ChannelPresenter, Interpreter, InterpreterError, Lesson, LessonEvent, Pacing, Phase, Resume,
    SessionError, course, session,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Level, info, warn};

#[derive(Debug, Parser)]
#[command(name = "lesson", about = "Play a guided inquiry lesson in the terminal")]
pub struct Cli {
    /// A lesson document to play instead of the built-in course
    #[arg(long)]
    lesson: Option<PathBuf>,
    /// Skip composing and animation delays
    #[arg(long)]
    instant: bool,
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(self.log_level)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
            .init();

        let lesson = match &self.lesson {
            Some(path) => Lesson::from_path(path)?,
            None => course::yeast_respiration().context("Built-in lesson is invalid")?,
        };
        for dangling in lesson.script.unresolved_references() {
            warn!(step = %dangling.from, to = %dangling.target, "Lesson jumps to a missing step");
        }
        let pacing = if self.instant {
            Pacing::INSTANT
        } else {
            Pacing::default()
        };
        info!(title = %lesson.title, ?pacing, "Starting terminal lesson");

        let (tx, events) = mpsc::unbounded_channel();
        let presenter = Arc::new(ChannelPresenter::new(tx, pacing));
        let (handle, actor) = session::spawn(Interpreter::new(Arc::new(lesson), presenter));

        let result = play(&handle, events).await;
        drop(handle);
        actor.await.context("Session task failed")?;
        result
    }
}

/// Drives the session from stdin until the lesson finishes or input ends.
async fn play(
    handle: &session::SessionHandle,
    mut events: mpsc::UnboundedReceiver<LessonEvent>,
) -> anyhow::Result<()> {
    let mut cursor = handle.cursor_updates();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    handle.start().await?;
    loop {
        // Presenter events for a step are queued before the step's cursor is published.
        while let Ok(event) = events.try_recv() {
            if let Some(text) = render::event(&event) {
                writeln!(stdout, "{}", text)?;
            }
        }
        let phase = cursor.borrow_and_update().phase;
        let hint = match phase {
            Phase::Finished => return Ok(()),
            Phase::Idle => {
                handle.start().await?;
                continue;
            }
            Phase::Running(Resume::After(_)) => {
                cursor.changed().await?;
                continue;
            }
            Phase::Running(Resume::OnAdvance) => "（按回车继续）",
            Phase::AwaitingChoice => "请选择（如 A 或 1）：",
            Phase::AwaitingText => "你的回答：",
        };
        write!(stdout, "{} ", hint)?;
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            info!("Input closed before the lesson finished");
            return Ok(());
        };
        let outcome = match phase {
            Phase::AwaitingChoice => match render::parse_choice(&line) {
                Some(index) => handle.submit_choice(index).await,
                None => {
                    writeln!(stdout, "请输入选项字母或序号。")?;
                    continue;
                }
            },
            Phase::AwaitingText => handle.submit_text(&line).await,
            _ => handle.advance().await,
        };
        match outcome {
            Ok(_) => {}
            Err(SessionError::EmptyInput) => writeln!(stdout, "请先写下你的想法。")?,
            Err(SessionError::Interpreter(InterpreterError::NoSuchOption { available, .. })) => {
                writeln!(stdout, "没有这个选项，请在 1 到 {} 之间选择。", available)?
            }
            Err(e) => return Err(e.into()),
        }
    }
}
