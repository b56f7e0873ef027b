use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use wholesecond_core::session::format_retry_after;
use wholesecond_core::Event;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Print the session state as JSON
    Status,
    /// Restore a full session (attempt history is kept)
    Reset,
    /// Time until the next session opens
    Cooldown,
}

pub fn run(action: SessionAction, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let player = ctx.player()?;
    let svc = ctx.service()?;

    match action {
        SessionAction::Status => {
            print_json(&svc.snapshot(&player, Utc::now())?)?;
        }
        SessionAction::Reset => {
            let state = svc.reset_session(&player)?;
            print_json(&Event::SessionReset {
                player_id: player,
                attempts_remaining: state.attempts_remaining,
                at: Utc::now(),
            })?;
        }
        SessionAction::Cooldown => {
            let remaining = svc.remaining_cooldown(&player, Utc::now())?;
            print_json(&json!({
                "player_id": player,
                "cooling_down": remaining.is_some(),
                "retry_after_ms": remaining.map(|d| d.num_milliseconds()),
                "message": remaining.map(format_retry_after),
            }))?;
        }
    }
    Ok(())
}
