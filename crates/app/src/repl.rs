use course_assistant_core::{
    dedup_source_labels, question_preview, ConversationTurn, DocumentChunk, QueryContext,
    QuestionAnswerer, ResponseMode, Selection, Session, QUESTION_PREVIEW_CHARS,
};
use std::io::{BufRead, Write};
use tracing::warn;

const EXIT_KEYWORDS: [&str; 2] = ["exit", "quit"];

fn is_exit(line: &str) -> bool {
    EXIT_KEYWORDS
        .iter()
        .any(|keyword| line.eq_ignore_ascii_case(keyword))
}

/// Reads one trimmed line; `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn render_sources<W: Write>(out: &mut W, sources: &[DocumentChunk]) -> std::io::Result<()> {
    let labels = dedup_source_labels(sources);
    if labels.is_empty() {
        return Ok(());
    }

    writeln!(out, "Sources:")?;
    for label in labels {
        writeln!(out, "- {label}")?;
    }
    writeln!(out)
}

/// Question in, answer out, until `exit`/`quit` or end of input.
pub async fn run_plain<R, W>(
    assistant: &dyn QuestionAnswerer,
    mut input: R,
    out: &mut W,
) -> std::io::Result<()>
where
    R: BufRead,
    W: Write,
{
    loop {
        write!(out, "Student> ")?;
        out.flush()?;

        let Some(question) = read_line(&mut input)? else {
            break;
        };
        if question.is_empty() {
            continue;
        }
        if is_exit(&question) {
            break;
        }

        match assistant.answer(&question, QueryContext::Plain).await {
            Ok(answer) => {
                writeln!(out, "\nAssistant> {}\n", answer.text)?;
                render_sources(out, &answer.sources)?;
            }
            Err(error) => {
                warn!(%error, "question failed");
                writeln!(out, "Error during QA invocation: {error}\n")?;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Ask(String),
    Mode(ResponseMode),
    Clear,
    History,
    Show(usize),
    Latest,
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if is_exit(line) {
        return Some(SessionCommand::Quit);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Some(SessionCommand::Ask(line.to_string()));
    };

    let (name, argument) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));

    let parsed = match name.to_lowercase().as_str() {
        "mode" => match argument.parse::<ResponseMode>() {
            Ok(mode) => SessionCommand::Mode(mode),
            Err(error) => SessionCommand::Invalid(error),
        },
        "clear" => SessionCommand::Clear,
        "history" => SessionCommand::History,
        "latest" => SessionCommand::Latest,
        "help" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        "show" => match argument.parse::<usize>() {
            Ok(number) if number > 0 => SessionCommand::Show(number - 1),
            _ => SessionCommand::Invalid(format!("expected a question number, got `{argument}`")),
        },
        other => SessionCommand::Invalid(format!("unknown command `/{other}`")),
    };
    Some(parsed)
}

const HELP: &str = "\
Commands:
  /mode <explain|hint|exam-prep>  change the response mode
  /history                        list previous questions
  /show <n>                       show question n again
  /latest                         show every turn, newest first
  /clear                          forget the conversation
  /quit                           leave (or type exit / quit)
Anything else is sent as a question.
";

fn render_turn<W: Write>(out: &mut W, turn: &ConversationTurn) -> std::io::Result<()> {
    writeln!(out, "\nYou: {}", turn.question)?;
    writeln!(out, "Assistant: {}\n", turn.answer)?;
    render_sources(out, &turn.sources)
}

fn render_selection<W: Write>(out: &mut W, session: &Session) -> std::io::Result<()> {
    for (_, turn) in session.displayed_turns() {
        render_turn(out, turn)?;
    }
    Ok(())
}

fn render_history<W: Write>(out: &mut W, session: &Session) -> std::io::Result<()> {
    if session.turns().is_empty() {
        return writeln!(out, "No questions yet.");
    }

    for (index, turn) in session.turns().iter().enumerate() {
        let marker = if session.selection() == Selection::Turn(index) {
            ">"
        } else {
            " "
        };
        writeln!(
            out,
            "{marker} {}. {}",
            index + 1,
            question_preview(&turn.question, QUESTION_PREVIEW_CHARS)
        )?;
    }
    Ok(())
}

/// Interactive session with history browsing, response modes and a rolling summary.
pub async fn run_session<R, W>(
    assistant: &dyn QuestionAnswerer,
    session: &mut Session,
    mut input: R,
    out: &mut W,
) -> std::io::Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(
        out,
        "Student Course AI Assistant. Mode: {}. Type /help for commands.",
        session.mode()
    )?;

    loop {
        write!(out, "[{}] Student> ", session.mode())?;
        out.flush()?;

        let Some(line) = read_line(&mut input)? else {
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };

        match command {
            SessionCommand::Ask(question) => {
                let result = assistant.answer(&question, session.query_context()).await;
                match result {
                    Ok(answer) => {
                        session.record_turn(ConversationTurn {
                            question,
                            answer: answer.text,
                            sources: answer.sources,
                        });
                        render_selection(out, session)?;
                    }
                    Err(error) => {
                        warn!(%error, "question failed");
                        writeln!(out, "Error during QA invocation: {error}\n")?;
                    }
                }
            }
            SessionCommand::Mode(mode) => {
                session.set_mode(mode);
                writeln!(out, "Response mode: {mode}")?;
            }
            SessionCommand::Clear => {
                session.clear();
                writeln!(out, "Conversation cleared.")?;
            }
            SessionCommand::History => render_history(out, session)?,
            SessionCommand::Show(index) => {
                if session.select(index) {
                    render_selection(out, session)?;
                } else {
                    writeln!(out, "No question #{}.", index + 1)?;
                }
            }
            SessionCommand::Latest => {
                session.select_latest();
                render_selection(out, session)?;
            }
            SessionCommand::Help => write!(out, "{HELP}")?,
            SessionCommand::Quit => break,
            SessionCommand::Invalid(message) => writeln!(out, "{message}")?,
        }
    }

    Ok(())
}
