// TiltGrid - Poll Task
//
// Single-threaded cycle: poll the array, advance the counters, publish the
// snapshot, then sleep until the next cycle. The only suspension point is the
// sleep, and that is where cancellation is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::array::TiltSource;
use crate::config::*;
use crate::counters::CounterBank;
use crate::display::CounterDisplay;
use crate::error::{Error, Result};

/// Shared stop flag. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Time from the end of one cycle to the start of the next.
    pub interval: Duration,
    /// Longest uninterrupted sleep while waiting out `interval`.
    pub check_slice: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            check_slice: CANCEL_CHECK_SLICE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    /// Cycles whose readings were dropped because of a bus error.
    pub failed_cycles: u64,
}

/// Run cycles until `cancel` is set, then shut the display down.
///
/// Bus errors only cost the cycle they happen in: the counters are left
/// untouched and the unchanged snapshot is still published. An invalid
/// channel means the array itself is broken and ends the loop with an error.
pub fn poll_task<S, D>(
    source: &mut S,
    bank: &mut CounterBank,
    display: &mut D,
    cancel: &CancelToken,
    config: &PollConfig,
) -> Result<PollStats>
where
    S: TiltSource,
    D: CounterDisplay,
{
    log::info!("Poll task started ({:?} interval)", config.interval);

    let mut stats = PollStats::default();
    let mut outcome = Ok(());

    while !cancel.is_cancelled() {
        match source.poll_all() {
            Ok(frame) => {
                log::debug!("cycle {}: {:?}", stats.cycles, frame.readings());
                bank.update_partial(&frame);
            }
            Err(e @ Error::InvalidChannel(_)) => {
                log::error!("Poll task aborting: {}", e);
                outcome = Err(e);
                break;
            }
            Err(e) => {
                stats.failed_cycles += 1;
                log::warn!("cycle {}: readings dropped: {}", stats.cycles, e);
            }
        }
        stats.cycles += 1;

        if let Err(e) = display.show(&bank.snapshot()) {
            log::error!("Display error: {}", e);
        }

        sleep_unless_cancelled(config, cancel);
    }

    if let Err(e) = display.shutdown() {
        log::error!("Display shutdown failed: {}", e);
    }
    log::info!(
        "Poll task stopped after {} cycles ({} failed)",
        stats.cycles,
        stats.failed_cycles
    );

    outcome.map(|()| stats)
}

fn sleep_unless_cancelled(config: &PollConfig, cancel: &CancelToken) {
    let deadline = Instant::now() + config.interval;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(config.check_slice));
    }
}
