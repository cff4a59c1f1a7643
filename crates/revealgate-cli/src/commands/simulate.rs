//! Deterministic session run on the virtual clock.

use chrono::Utc;
use clap::Args;
use revealgate_core::{ManualClock, RevealController};

use crate::terminal::TerminalPresenter;

#[derive(Args)]
pub struct SimulateArgs {
    /// Code to submit; defaults to the issued code
    #[arg(long)]
    pub input: Option<String>,
    /// Emit events as JSON lines
    #[arg(long)]
    pub json: bool,
    /// Seed for the code generator
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(args.seed)?;
    let clock = ManualClock::with_origin(Utc::now());
    let mut session = RevealController::new(&config, clock, TerminalPresenter::new(args.json))?;

    let code = session.issue_code()?;
    session.advance(config.code_display());

    let candidate = args.input.unwrap_or(code);
    let submission = session.submit_code(&candidate)?;

    if submission.accepted {
        while let Some(deadline) = session.next_deadline() {
            session.run_until(deadline);
            if session.state().is_terminal() {
                break;
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string(&session.snapshot())?);
    }
    session.dispose();

    if submission.accepted {
        Ok(())
    } else {
        Err("code rejected".into())
    }
}
