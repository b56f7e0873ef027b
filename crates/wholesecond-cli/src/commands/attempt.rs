use chrono::Utc;
use clap::Subcommand;
use wholesecond_core::ClockSampler;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum AttemptAction {
    /// Submit an attempt with an already-measured offset
    Submit {
        /// Distance to the nearest whole second, in milliseconds
        #[arg(long)]
        offset: u32,
    },
    /// Sample the clock now and submit the result
    Click,
    /// List attempts of the current session, newest first
    List {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: AttemptAction, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let player = ctx.player()?;
    let svc = ctx.service()?;

    match action {
        AttemptAction::Submit { offset } => {
            let now = Utc::now();
            let outcome = svc.submit_attempt_at(&player, offset, now)?;
            for event in outcome.events(&player, &svc.settings(), now) {
                print_json(&event)?;
            }
        }
        AttemptAction::Click => {
            let mut sampler = ClockSampler::new(ctx.config().sample_interval_ms());
            let reading = sampler.capture(Utc::now());
            eprintln!("clock {} ({} ms off)", reading.display(), reading.offset_ms);
            let outcome = svc.submit_attempt_at(&player, reading.offset_ms, reading.at)?;
            for event in outcome.events(&player, &svc.settings(), reading.at) {
                print_json(&event)?;
            }
        }
        AttemptAction::List { limit } => {
            let attempts = svc.current_session_attempts(&player, limit)?;
            print_json(&attempts)?;
        }
    }
    Ok(())
}
