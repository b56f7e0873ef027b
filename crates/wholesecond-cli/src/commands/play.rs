//! Interactive loop: a live clock on stderr, Enter submits, `q` quits.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::Utc;
use wholesecond_core::{ClockSampler, SubmitOutcome};

use super::{print_json, Context};

/// Longest the display thread sleeps between stop checks.
const STOP_POLL_MS: u64 = 20;

pub fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let player = ctx.player()?;
    let svc = ctx.service()?;
    let interval_ms = ctx.config().sample_interval_ms();

    print_json(&svc.snapshot(&player, Utc::now())?)?;
    eprintln!("press Enter on the whole second, q to quit");

    let stop = Arc::new(AtomicBool::new(false));
    let display = spawn_display(interval_ms, Arc::clone(&stop));

    let mut sampler = ClockSampler::new(interval_ms);
    let result = (|| -> Result<(), Box<dyn std::error::Error>> {
        for line in io::stdin().lock().lines() {
            // Sample before anything else so input handling doesn't skew the offset.
            let reading = sampler.capture(Utc::now());
            if line?.trim().eq_ignore_ascii_case("q") {
                break;
            }
            let outcome = svc.submit_attempt_at(&player, reading.offset_ms, reading.at)?;
            for event in outcome.events(&player, &svc.settings(), reading.at) {
                print_json(&event)?;
            }
            if let SubmitOutcome::Rejected(_) = outcome {
                break;
            }
        }
        Ok(())
    })();

    stop.store(true, Ordering::Relaxed);
    let _ = display.join();
    eprintln!();
    result
}

fn spawn_display(interval_ms: u64, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        // `tick` gates redraws by the interval; the sleep only bounds how long
        // a stop request waits.
        let mut sampler = ClockSampler::new(interval_ms);
        let sleep = StdDuration::from_millis(interval_ms.clamp(1, STOP_POLL_MS));
        while !stop.load(Ordering::Relaxed) {
            if let Some(reading) = sampler.tick(Utc::now()) {
                let mut err = io::stderr().lock();
                let _ = write!(err, "\r{}", reading.display());
                let _ = err.flush();
            }
            thread::sleep(sleep);
        }
    })
}
