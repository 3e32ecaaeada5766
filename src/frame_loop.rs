//! Drives the frame scheduler at a fixed rate, standing in for the render
//! loop's per-frame callback.

use crate::scheduler::FrameScheduler;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Tick `scheduler` every `interval` forever.
///
/// Late frames are skipped rather than replayed in a burst.
pub async fn run(scheduler: FrameScheduler, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let frame = scheduler.tick();
        if frame % 1000 == 0 {
            log::trace!("Frame {} ({} listeners)", frame, scheduler.len());
        }
    }
}

/// Background frame loop on the current `LocalSet`. Stops on drop.
pub struct FrameDriver {
    handle: JoinHandle<()>,
}

impl FrameDriver {
    /// Must be called from within a `LocalSet`.
    pub fn spawn(scheduler: FrameScheduler, interval: Duration) -> Self {
        log::debug!("Frame driver started at {:?} per frame", interval);
        Self {
            handle: tokio::task::spawn_local(run(scheduler, interval)),
        }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
