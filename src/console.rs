//! Line-oriented terminal host for one exam session.
//!
//! Stdin lines become candidate commands or simulated page events; notices, the
//! current question and the final outcome are printed to stdout.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::core::shutdown::{close_requested, CloseRequest};
use crate::core::state::AppState;
use crate::schemas::EntityId;
use crate::session::answers::QuestionStatus;
use crate::session::events::{
    ClipboardAction, EventTarget, KeyChord, Visibility, WindowEvent, WindowMetrics,
};
use crate::session::model::{ExamAttempt, QuestionKind};
use crate::session::state::SessionView;
use crate::session::storage::StoredResult;
use crate::session::{
    CandidateCommand, Entry, SessionController, SessionError, SessionHandle, SessionNotice,
    SessionOutcome, WindowEvents,
};

const HELP: &str = "\
commands (question and option numbers start at 1):
  select <q> <o>       choose option o of question q
  flag <q>             toggle the review flag
  goto <q> | next | prev
  view                 show the current question
  save                 save progress
  submit               submit the exam
  report open|close    open or close the issue form
  attach               open the attachment picker
  issue <text> [@file ...]
  leave                leave without submitting
page events:
  blur | focus | hide | visible | unload | close
  key <chord>          e.g. key ctrl+shift+i
  rightclick
  copy|paste|cut [input|textarea|report|page]
  resize <outer-w> <outer-h> <inner-w> <inner-h>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleInput {
    Command(CandidateCommand),
    Page(WindowEvent),
    View,
    Help,
}

/// `None` for blank lines.
pub(crate) fn parse_line(line: &str) -> Option<Result<ConsoleInput, String>> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let args: Vec<&str> = words.collect();
    Some(parse_words(&verb, &args))
}

fn parse_words(verb: &str, args: &[&str]) -> Result<ConsoleInput, String> {
    use ConsoleInput::{Command, Page};

    let input = match verb {
        "select" => {
            let (question, option) = match args {
                [question, option] => (position(question)?, position(option)?),
                _ => return Err("usage: select <question> <option>".to_string()),
            };
            Command(CandidateCommand::SelectAnswer { question, option })
        }
        "flag" => Command(CandidateCommand::ToggleFlag(single_position(args, "flag")?)),
        "goto" => Command(CandidateCommand::GoTo(single_position(args, "goto")?)),
        "next" => Command(CandidateCommand::Next),
        "prev" | "previous" => Command(CandidateCommand::Previous),
        "save" => Command(CandidateCommand::SaveProgress),
        "submit" => Command(CandidateCommand::Submit),
        "report" => match args {
            ["open"] => Command(CandidateCommand::OpenReport),
            ["close"] => Command(CandidateCommand::CloseReport),
            _ => return Err("usage: report open|close".to_string()),
        },
        "attach" => Command(CandidateCommand::FilePickerOpened),
        "issue" => {
            let (files, words): (Vec<&str>, Vec<&str>) =
                args.iter().copied().partition(|word| word.starts_with('@'));
            Command(CandidateCommand::ReportIssue {
                description: words.join(" "),
                attachments: files
                    .into_iter()
                    .map(|file| PathBuf::from(file.trim_start_matches('@')))
                    .collect(),
            })
        }
        "leave" => Command(CandidateCommand::Leave),
        "view" => ConsoleInput::View,
        "help" | "?" => ConsoleInput::Help,
        "blur" => Page(WindowEvent::Blur),
        "focus" => Page(WindowEvent::Focus),
        "hide" => Page(WindowEvent::VisibilityChange(Visibility::Hidden)),
        "visible" => Page(WindowEvent::VisibilityChange(Visibility::Visible)),
        "unload" => Page(WindowEvent::Unload),
        "close" => Page(WindowEvent::BeforeUnload),
        "rightclick" => Page(WindowEvent::ContextMenu),
        "key" => {
            let chord = args
                .first()
                .and_then(|raw| KeyChord::parse(raw))
                .ok_or_else(|| "usage: key <chord>".to_string())?;
            Page(WindowEvent::KeyDown(chord))
        }
        "copy" | "paste" | "cut" => {
            let action = match verb {
                "copy" => ClipboardAction::Copy,
                "paste" => ClipboardAction::Paste,
                _ => ClipboardAction::Cut,
            };
            let target = match args.first().copied().unwrap_or("page") {
                "input" => EventTarget::Input,
                "textarea" => EventTarget::TextArea,
                "report" => EventTarget::ReportForm,
                "page" => EventTarget::Page,
                other => return Err(format!("unknown clipboard target `{other}`")),
            };
            Page(WindowEvent::Clipboard { action, target })
        }
        "resize" => {
            let values = args
                .iter()
                .map(|raw| raw.parse::<u32>().map_err(|_| format!("invalid size `{raw}`")))
                .collect::<Result<Vec<_>, _>>()?;
            let &[outer_width, outer_height, inner_width, inner_height] = values.as_slice() else {
                return Err("usage: resize <outer-w> <outer-h> <inner-w> <inner-h>".to_string());
            };
            Page(WindowEvent::Resize(WindowMetrics {
                outer_width,
                outer_height,
                inner_width,
                inner_height,
            }))
        }
        other => return Err(format!("unknown command `{other}`; type `help`")),
    };
    Ok(input)
}

/// Converts a 1-based number typed by the candidate into a position.
fn position(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value - 1),
        _ => Err(format!("`{raw}` is not a question or option number")),
    }
}

fn single_position(args: &[&str], verb: &str) -> Result<usize, String> {
    match args {
        [raw] => position(raw),
        _ => Err(format!("usage: {verb} <question>")),
    }
}

fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

pub(crate) fn render_view(attempt: &ExamAttempt, view: &SessionView) -> String {
    let mut out = format!(
        "{} | time left {} | answered {}/{} | flagged {} | violations {}\n",
        view.exam_title,
        format_clock(view.time_remaining),
        view.answered,
        view.statuses.len(),
        view.flagged,
        view.violation_count,
    );

    let navigator: Vec<String> = view
        .statuses
        .iter()
        .enumerate()
        .map(|(index, status)| {
            let mark = match status {
                QuestionStatus::Answered => '*',
                QuestionStatus::Flagged => '?',
                QuestionStatus::Unanswered => ' ',
            };
            if index == view.current_question {
                format!("[{}{mark}]", index + 1)
            } else {
                format!(" {}{mark} ", index + 1)
            }
        })
        .collect();
    out.push_str(&navigator.join(""));
    out.push('\n');

    if let Some(question) = attempt.questions.get(view.current_question) {
        let hint = match question.kind {
            QuestionKind::SingleChoice => "choose one",
            QuestionKind::MultipleSelect => "choose all that apply",
        };
        out.push_str(&format!(
            "Q{}. {} ({hint})\n",
            view.current_question + 1,
            question.prompt
        ));
        if let Some(image_url) = &question.image_url {
            out.push_str(&format!("   image: {image_url}\n"));
        }
        for (index, option) in question.options.iter().enumerate() {
            let checked = if view.selected.contains(&index) { 'x' } else { ' ' };
            out.push_str(&format!("   [{checked}] {}. {}\n", index + 1, option.text));
        }
    }
    out
}

pub(crate) fn render_notice(notice: &SessionNotice) -> String {
    match notice {
        SessionNotice::ViolationRecorded { reason, count, threshold } => {
            format!("! Violation recorded: {reason} ({count}/{threshold})")
        }
        SessionNotice::ViolationWarning { reason } => {
            format!("! {reason}. Your exam will be submitted automatically.")
        }
        SessionNotice::NothingToSave => "No answers to save yet.".to_string(),
        SessionNotice::ProgressSaved { answered } => {
            format!("Progress saved ({answered} answered).")
        }
        SessionNotice::IssueReported { message } => message.clone(),
        SessionNotice::Error(message) => format!("Error: {message}"),
        SessionNotice::InvalidAction(message) => format!("Not allowed: {message}"),
    }
}

pub(crate) fn render_result(stored: Option<&StoredResult>) -> String {
    let Some(stored) = stored else {
        return "Your exam was submitted. Results are not available in this session.".to_string();
    };
    let result = &stored.result;
    let mut out = format!(
        "{}: {} / {} ({:.1}%) {}",
        stored.exam_title,
        result.score,
        result.max_score,
        result.percentage,
        if result.is_passed { "PASSED" } else { "NOT PASSED" },
    );
    if let Some(reason) = &stored.violation_reason {
        out.push_str(&format!("\nSubmitted automatically: {reason}"));
    }
    out
}

pub(crate) fn render_outcome(outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::Submitted { trigger, result: Some(result) } => format!(
            "Exam submitted ({}). Score {} / {} ({:.1}%).",
            trigger.as_str(),
            result.score,
            result.max_score,
            result.percentage
        ),
        SessionOutcome::Submitted { result: None, .. } => {
            "Exam submitted while leaving the page.".to_string()
        }
        SessionOutcome::Failed { trigger, error } => {
            format!("Automatic submission ({}) failed: {error}", trigger.as_str())
        }
        SessionOutcome::RedirectToResults(stored) => render_result(stored.as_ref()),
        SessionOutcome::Left => "You left the exam. Your attempt was not submitted.".to_string(),
    }
}

fn render_unavailable(err: &SessionError) -> String {
    format!(
        "\n==============================\n  Exam unavailable\n  {err}\n  Return to the exam catalog to pick another exam.\n==============================\n"
    )
}

/// Runs the exam for `attempt_id` against stdin/stdout until it ends.
pub(crate) async fn run(
    state: AppState,
    window: WindowEvents,
    attempt_id: EntityId,
) -> Result<SessionOutcome> {
    let entry = match SessionController::enter(state, &window, attempt_id).await {
        Ok(entry) => entry,
        Err(err) => {
            tracing::error!(error = %err, "Exam session could not start");
            if err.is_terminal() {
                println!("{}", render_unavailable(&err));
            } else {
                println!("Error: {err}");
            }
            return Err(err.into());
        }
    };

    let (controller, handle) = match entry {
        Entry::Exam(controller, handle) => (controller, handle),
        Entry::Results(stored) => {
            let outcome = SessionOutcome::RedirectToResults(stored);
            println!("{}", render_outcome(&outcome));
            return Ok(outcome);
        }
    };

    let session = tokio::spawn((*controller).run());
    println!("{}", render_view(handle.attempt(), &handle.view()));
    println!("Type `help` for commands.");

    let input = BufReader::new(tokio::io::stdin()).lines();
    drive(handle, &window, input, close_requested()).await;
    let outcome = session.await?;
    tracing::debug!(listeners = window.listener_count(), "Exam page closed");
    println!("{}", render_outcome(&outcome));
    Ok(outcome)
}

/// Forwards input until the session stops listening.
///
/// A close request unloads the page but keeps the handle until the session ends, so the
/// controller sees the unload before the closed command channel.
async fn drive<R, C>(mut handle: SessionHandle, window: &WindowEvents, mut lines: Lines<R>, close: C)
where
    R: AsyncBufRead + Unpin,
    C: Future<Output = CloseRequest>,
{
    let mut view = handle.watch();
    let mut last_minute = view.borrow().time_remaining / 60;
    tokio::pin!(close);
    let mut stdin_open = true;
    let mut closing = false;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open && !closing => match line {
                Ok(Some(line)) => {
                    if !dispatch(&line, &handle, window) {
                        break;
                    }
                }
                Ok(None) => {
                    stdin_open = false;
                    window.emit(WindowEvent::BeforeUnload);
                }
                Err(err) => {
                    tracing::error!(error = %err, "Failed to read console input");
                    stdin_open = false;
                    window.emit(WindowEvent::BeforeUnload);
                }
            },
            notice = handle.next_notice() => match notice {
                Some(notice) => println!("{}", render_notice(&notice)),
                None => break,
            },
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let minute = view.borrow_and_update().time_remaining / 60;
                if minute != last_minute {
                    last_minute = minute;
                    println!("-- {minute} min left --");
                }
            },
            request = &mut close, if !closing => {
                tracing::info!(signal = request.as_str(), "Closing the exam page");
                closing = true;
                window.emit(WindowEvent::BeforeUnload);
            },
        }
    }

    while let Some(notice) = handle.try_notice() {
        println!("{}", render_notice(&notice));
    }
}

/// `false` once the session is gone.
fn dispatch(line: &str, handle: &SessionHandle, window: &WindowEvents) -> bool {
    match parse_line(line) {
        None => true,
        Some(Err(message)) => {
            println!("{message}");
            true
        }
        Some(Ok(ConsoleInput::Help)) => {
            println!("{HELP}");
            true
        }
        Some(Ok(ConsoleInput::View)) => {
            println!("{}", render_view(handle.attempt(), &handle.view()));
            true
        }
        Some(Ok(ConsoleInput::Page(event))) => {
            let dispatch = window.emit(event);
            if dispatch.delivered == 0 {
                println!("(the exam page is no longer listening)");
            } else if dispatch.default_prevented {
                println!("(blocked)");
            }
            true
        }
        Some(Ok(ConsoleInput::Command(command))) => {
            let navigates = matches!(
                command,
                CandidateCommand::GoTo(_)
                    | CandidateCommand::Next
                    | CandidateCommand::Previous
                    | CandidateCommand::SelectAnswer { .. }
            );
            if !handle.send(command) {
                return false;
            }
            if navigates {
                println!("(type `view` to see the question)");
            }
            true
        }
    }
}
