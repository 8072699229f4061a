//! Plain-text rendering of lesson events.

use lesson_core::LessonEvent;
use lesson_core::lab::{ExperimentGroup, LabView};
use lesson_core::script::ChoiceOption;
use lesson_core::summary::CourseSummary;
use std::fmt::Write;

const BAR_UNIT_ML: i64 = 5;

/// Formats one event for the terminal. Events with nothing to show give `None`.
pub fn event(event: &LessonEvent) -> Option<String> {
    match event {
        LessonEvent::Composing | LessonEvent::Cleared | LessonEvent::StateUpdate { .. } => None,
        LessonEvent::Message { content } => Some(format!("\n老师：{}", plain(content))),
        LessonEvent::Choices { options } => Some(choices(options)),
        LessonEvent::UserEcho { text } => Some(format!("你：{}", text)),
        LessonEvent::Lab { view, status } => Some(lab(view, status)),
        LessonEvent::RevealPanel => Some("【研究问题】温度是否会影响酵母菌呼吸作用的速度？".into()),
        LessonEvent::Progress { module } => Some(format!("\n=== 第 {} 单元 ===", module)),
        LessonEvent::CourseComplete { summary } => Some(course_summary(summary)),
    }
}

/// Accepts `A`/`b` style letters or 1-based numbers.
pub fn parse_choice(input: &str) -> Option<usize> {
    let input = input.trim();
    if let Ok(number) = input.parse::<usize>() {
        return number.checked_sub(1);
    }
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Some((letter.to_ascii_uppercase() as u8 - b'A') as usize)
        }
        _ => None,
    }
}

/// Strips the markdown emphasis used by lesson content.
fn plain(content: &str) -> String {
    content.replace("**", "")
}

fn letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .map_or('?', char::from)
}

fn choices(options: &[ChoiceOption]) -> String {
    let mut out = String::new();
    for (index, option) in options.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", letter(index), option.label);
    }
    out.trim_end().to_string()
}

fn group_line(group: &ExperimentGroup) -> String {
    format!(
        "  第{}组 {:>3}°C  {:>3} ml",
        group.index + 1,
        group.temperature,
        group.gas
    )
}

fn lab(view: &LabView, status: &str) -> String {
    let mut out = format!("[实验台] {}", status);
    match view {
        LabView::Toolbox { tools, highlighted } => {
            for tool in tools {
                let mark = if highlighted.as_deref() == Some(tool.id.as_str()) {
                    " ←"
                } else {
                    ""
                };
                let _ = write!(out, "\n  {} {}{}", tool.icon, tool.name, mark);
            }
        }
        LabView::Groups { groups, running } => {
            for group in groups {
                let _ = write!(out, "\n{}", group_line(group));
            }
            if *running {
                out.push_str("\n  （反应进行中）");
            }
        }
        LabView::Checklist { items } => {
            for item in items {
                let _ = write!(out, "\n  ✓ {}", item);
            }
        }
        LabView::Results { group } => {
            let _ = write!(out, "\n{}", group_line(group));
        }
        LabView::DataTable { readings } => {
            out.push_str("\n  温度    气体体积");
            for reading in readings {
                let _ = write!(out, "\n  {:>3}°C  {:>3} ml", reading.temperature, reading.gas);
            }
        }
        LabView::Chart { labels, values } => {
            for (label, value) in labels.iter().zip(values) {
                let width = usize::try_from(value / BAR_UNIT_ML).unwrap_or(0);
                let _ = write!(out, "\n  {:>5} {} {}", label, "█".repeat(width), value);
            }
        }
        LabView::PredictionCompare {
            predicted,
            actual,
            matched,
        } => {
            let verdict = if *matched { "一致" } else { "不一致" };
            let _ = write!(
                out,
                "\n  你的预测：{}\n  实验结果：{}\n  对比：{}",
                predicted, actual, verdict
            );
        }
        LabView::FlowChart { stages } => {
            let _ = write!(out, "\n  {}", stages.join(" → "));
        }
        LabView::Status => {}
    }
    out
}

fn course_summary(summary: &CourseSummary) -> String {
    let mut out = format!("\n★ {} ★", summary.title);
    for highlight in &summary.highlights {
        let _ = write!(out, "\n  {}：{}", highlight.label, highlight.text);
    }
    if !summary.experiment.is_empty() {
        let data: Vec<String> = summary
            .experiment
            .iter()
            .map(|r| format!("{}°C→{}ml", r.temperature, r.gas))
            .collect();
        let _ = write!(out, "\n  实验数据：{}", data.join("，"));
    }
    out
}
