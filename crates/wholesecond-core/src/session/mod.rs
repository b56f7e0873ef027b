mod cooldown;
mod machine;
mod state;

pub use cooldown::{format_retry_after, remaining_cooldown};
pub use machine::{check_eligibility, plan_commit, CommitPlan, Eligibility, Rejection};
pub use state::{SessionPhase, SessionState};
