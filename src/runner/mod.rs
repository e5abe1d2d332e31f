use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::config::Settings;
use crate::core::shutdown::shutdown_signal;
use crate::core::time::{format_rfc3339, now_utc};
use crate::schemas::identity::RegistrationRequest;
use crate::session::{ExamSession, Navigation, Phase, SessionDeps, SessionError, TickStatus};

const REMAINING_WARNINGS: [i64; 3] = [300, 60, 10];

enum Command {
    Answer(usize),
    Next,
    Prev,
    Goto(usize),
    Review,
    Back,
    Submit,
    Help,
    Quit,
}

/// Drives one attempt end to end: entry form, question loop with a
/// 1-second clock, review, submission, terminal rendering.
pub(crate) async fn run(settings: &Settings, deps: SessionDeps) -> Result<()> {
    let quiz_id = settings.attempt().quiz_id.clone();
    if quiz_id.is_empty() {
        anyhow::bail!("SOMA_QUIZ_ID is not set; set it to the quiz you want to take");
    }

    let quiz = deps.source.fetch_quiz(&quiz_id).await.context("Failed to load quiz")?;
    println!(
        "{} ({} minutes, due {})",
        quiz.title,
        quiz.time_limit_minutes,
        format_rfc3339(quiz.due_at)
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = ExamSession::begin_entry(quiz, deps, now_utc())?;
    if render_terminal_phase(&session) {
        return Ok(());
    }

    while session.phase() == Phase::Entry {
        let registration = prompt_registration(&mut lines, session.quiz().pin_required).await?;
        if session.check_prior_submission(&registration.display_name()).await? {
            break;
        }
        match session.start_attempt(registration, now_utc()).await {
            Ok(()) => {}
            Err(err @ (SessionError::RegistrationFailed(_) | SessionError::LoadFailed(_))) => {
                println!("{err}; try again or press Ctrl+C to leave.");
            }
            Err(err) => return Err(err.into()),
        }
    }
    if render_terminal_phase(&session) {
        return Ok(());
    }

    println!(
        "You have {} minutes. Type 'help' for commands.",
        session.quiz().time_limit_minutes
    );
    render_question(&session);

    attempt_loop(settings, &mut session, &mut lines).await?;
    render_terminal_phase(&session);
    Ok(())
}

async fn attempt_loop(
    settings: &Settings,
    session: &mut ExamSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let mut ticker = interval(Duration::from_secs(settings.attempt().tick_interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut last_warned = i64::MAX;

    while !session.phase().is_terminal() {
        tokio::select! {
            _ = ticker.tick() => {
                match session.tick(now_utc()).await {
                    Ok(status) => {
                        if status.auto_submitted {
                            println!("Time is up; your answers were submitted automatically.");
                        } else {
                            warn_remaining(status, &mut last_warned);
                        }
                    }
                    Err(err) => println!(
                        "Automatic submission failed: {err}. Enter review and submit to retry."
                    ),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    println!("Input closed; your attempt is saved locally.");
                    break;
                };
                if handle_command(session, line.trim()).await {
                    break;
                }
            }
            _ = &mut shutdown => {
                println!("Interrupted; your attempt is saved locally.");
                break;
            }
        }
    }
    Ok(())
}

/// Returns true when the student asked to leave.
async fn handle_command(session: &mut ExamSession, input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    match parse_command(input) {
        Some(Command::Answer(choice)) => {
            let Some(question) = session.current_question() else {
                return false;
            };
            if choice == 0 || choice > question.options.len() {
                println!("Pick an option between 1 and {}.", question.options.len());
                return false;
            }
            let question_id = question.id.clone();
            let option = question.options[choice - 1].clone();
            match session.select_answer(&question_id, &option) {
                Ok(()) => render_question(session),
                Err(err) => println!("{err}"),
            }
        }
        Some(Command::Next) => {
            if let Err(err) = session.navigate(Navigation::Next) {
                println!("{err}");
            } else {
                render_question(session);
            }
        }
        Some(Command::Prev) => {
            if let Err(err) = session.navigate(Navigation::Prev) {
                println!("{err}");
            } else {
                render_question(session);
            }
        }
        Some(Command::Goto(number)) => {
            if number == 0 {
                println!("Question numbers start at 1.");
                return false;
            }
            if session.phase() == Phase::Reviewing {
                if let Err(err) = session.exit_review() {
                    println!("{err}");
                    return false;
                }
            }
            match session.navigate(Navigation::Jump(number - 1)) {
                Ok(_) => render_question(session),
                Err(err) => println!("{err}"),
            }
        }
        Some(Command::Review) => match session.enter_review() {
            Ok(()) => render_review(session),
            Err(err) => println!("{err}"),
        },
        Some(Command::Back) => match session.exit_review() {
            Ok(()) => render_question(session),
            Err(err) => println!("{err}"),
        },
        Some(Command::Submit) => {
            if session.phase() != Phase::Reviewing {
                println!("Enter review first ('review') to submit.");
                return false;
            }
            match session.submit(now_utc()).await {
                Ok(receipt) => println!("Submitted. Reference: {}", receipt.id),
                Err(SessionError::AlreadySubmitted) => {
                    println!("This quiz has already been submitted.");
                }
                Err(err) => println!("{err}. Your answers are saved; try again."),
            }
        }
        Some(Command::Help) => print_help(),
        Some(Command::Quit) => {
            println!("Leaving; your attempt is saved locally.");
            return true;
        }
        None => println!("Unrecognized command; type 'help'."),
    }
    false
}

fn parse_command(input: &str) -> Option<Command> {
    let mut parts = input.split_whitespace();
    let head = parts.next()?;
    let arg = parts.next();
    match head {
        "a" | "answer" => arg.and_then(|raw| raw.parse().ok()).map(Command::Answer),
        "n" | "next" => Some(Command::Next),
        "p" | "prev" => Some(Command::Prev),
        "g" | "goto" => arg.and_then(|raw| raw.parse().ok()).map(Command::Goto),
        "r" | "review" => Some(Command::Review),
        "b" | "back" => Some(Command::Back),
        "s" | "submit" => Some(Command::Submit),
        "h" | "help" | "?" => Some(Command::Help),
        "q" | "quit" => Some(Command::Quit),
        _ => None,
    }
}

async fn prompt_registration(
    lines: &mut Lines<BufReader<Stdin>>,
    pin_required: bool,
) -> Result<RegistrationRequest> {
    let first_name = prompt(lines, "First name: ").await?;
    let last_name = prompt(lines, "Last name: ").await?;
    let pin = if pin_required { Some(prompt(lines, "Quiz PIN: ").await?) } else { None };
    Ok(RegistrationRequest { first_name, last_name, pin })
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush().ok();
    let line = lines
        .next_line()
        .await
        .context("Failed to read input")?
        .ok_or_else(|| anyhow::anyhow!("input closed during entry"))?;
    Ok(line.trim().to_string())
}

fn render_question(session: &ExamSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    println!();
    println!(
        "Question {}/{} ({} marks)",
        session.current_index() + 1,
        session.questions().len(),
        question.marks
    );
    println!("{}", question.prompt);
    if let Some(image) = &question.image_url {
        println!("[image: {image}]");
    }
    for (index, option) in question.options.iter().enumerate() {
        let marker =
            if session.answer_for(&question.id) == Some(option.as_str()) { "*" } else { " " };
        println!(" {marker}{}) {option}", index + 1);
    }
}

fn render_review(session: &ExamSession) {
    let summary = session.review_summary();
    println!();
    println!("Review: {}/{} answered", summary.answered, summary.total);
    for entry in &summary.entries {
        let status = if entry.answered { "answered" } else { "unanswered" };
        println!("  {:>2}. {status}", entry.index + 1);
    }
    println!("'submit' hands in, 'back' keeps working, 'g <n>' revisits a question.");
}

fn warn_remaining(status: TickStatus, last_warned: &mut i64) {
    for threshold in REMAINING_WARNINGS {
        if status.remaining_seconds <= threshold && *last_warned > threshold {
            println!(
                "{}:{:02} remaining.",
                status.remaining_seconds / 60,
                status.remaining_seconds % 60
            );
            *last_warned = threshold;
            break;
        }
    }
}

fn render_terminal_phase(session: &ExamSession) -> bool {
    match session.phase() {
        Phase::Closed => {
            println!("This quiz closed on {}.", format_rfc3339(session.quiz().due_at));
            true
        }
        Phase::Blocked => {
            println!("You have already submitted this quiz.");
            true
        }
        Phase::Submitted => {
            println!("Your submission has been recorded.");
            true
        }
        _ => false,
    }
}

fn print_help() {
    println!("Commands:");
    println!("  a <n>   answer the current question with option n");
    println!("  n / p   next / previous question");
    println!("  g <n>   go to question n");
    println!("  r       review answers");
    println!("  b       back to the questions");
    println!("  s       submit (from review)");
    println!("  q       leave (attempt state stays saved)");
}
