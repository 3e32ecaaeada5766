//! Everything an interaction or capture needs from the running session,
//! bundled so it can be passed around by reference.

use crate::capture::CaptureSettings;
use crate::config::Config;
use crate::sampler::{CaptureClock, HandTracker, PoseSampler};
use crate::scheduler::FrameScheduler;
use crate::ui::stage::Stage;
use std::cell::Cell;
use std::rc::Rc;

/// Shared session handles: scheduler, renderer, tracker, clock and settings
#[derive(Clone)]
pub struct XrContext {
    pub scheduler: FrameScheduler,
    pub stage: Rc<dyn Stage>,
    pub hands: Rc<dyn HandTracker>,
    pub clock: CaptureClock,
    pub config: Rc<Config>,
    next_id: Rc<Cell<u64>>,
}

impl XrContext {
    /// Starts the shared capture clock.
    pub fn new(hands: Rc<dyn HandTracker>, stage: Rc<dyn Stage>, config: Config) -> Self {
        Self {
            scheduler: FrameScheduler::new(),
            stage,
            hands,
            clock: CaptureClock::start(),
            config: Rc::new(config),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    pub fn sampler(&self) -> PoseSampler {
        PoseSampler::new(self.hands.clone(), self.clock)
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            block_size: self.config.block_size,
            period: self.config.capture_period,
            phase: self.config.capture_phase,
        }
    }

    /// A listener/element name no other live interaction uses
    pub fn unique_name(&self, prefix: &str) -> String {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        format!("{}-{}", prefix, id)
    }
}
