//! Interactive session in real time.
//!
//! A current-thread tokio runtime waits on stdin and on the session's next
//! timer deadline at once. Every wake-up dispatches due timers on the same
//! thread, so the session is never touched concurrently.

use clap::Args;
use revealgate_core::{RevealController, SystemClock, Timeout};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use crate::terminal::TerminalPresenter;

type Session = RevealController<SystemClock<Timeout>, TerminalPresenter>;

#[derive(Args)]
pub struct RunArgs {
    /// Emit events as JSON lines
    #[arg(long)]
    pub json: bool,
    /// Seed for the code generator
    #[arg(long)]
    pub seed: Option<u64>,
}

/// What a line typed by the user asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Reissue,
    Dismiss,
    Submit(&'a str),
}

fn parse_line(line: &str) -> Command<'_> {
    match line.trim() {
        "quit" | "exit" => Command::Quit,
        "new" | "reissue" => Command::Reissue,
        "dismiss" | "cancel" => Command::Dismiss,
        candidate => Command::Submit(candidate),
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(args.seed)?;
    let session = RevealController::new(&config, SystemClock::new(), TerminalPresenter::new(args.json))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(drive(session))
}

async fn drive(mut session: Session) -> Result<(), Box<dyn std::error::Error>> {
    session.issue_code()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        session.run_due();
        if session.state().is_terminal() {
            break;
        }

        let deadline = session
            .next_deadline()
            .and_then(|d| session.clock().instant_at(d))
            .map(Instant::from_std);
        if !stdin_open && deadline.is_none() {
            tracing::info!("input closed with nothing scheduled");
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !handle_line(&mut session, &line) {
                            break;
                        }
                    }
                    None => stdin_open = false,
                }
            }
            _ = sleep_until(deadline) => {}
        }
    }

    session.dispose();
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Returns `false` when the user asked to quit.
fn handle_line(session: &mut Session, line: &str) -> bool {
    let result = match parse_line(line) {
        Command::Quit => return false,
        Command::Reissue => session.issue_code().map(|_| ()),
        Command::Dismiss => session.dismiss_waiting_view(),
        Command::Submit(candidate) => session.submit_code(candidate).map(|_| ()),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
    }
    true
}
