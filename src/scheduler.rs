//! # Frame Scheduler
//!
//! A single cooperative listener table driven once per rendered frame.
//! Each listener runs on an integer cadence: it fires on frames where
//! `frame % period == phase`. Interleaving two period-2 listeners on phases
//! 0 and 1 spreads their cost across alternating frames.
//!
//! The scheduler is a cheap cloneable handle; every interaction that needs a
//! per-frame callback holds a clone and must `unregister` its entry when it
//! finishes. A listener left behind is a leak, which `len()` makes testable.
//!
//! Callbacks run synchronously and must not block. A panicking callback is
//! logged and skipped; it does not stop the remaining listeners or the frame.

use crate::error::SchedulerError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// The frame counter wraps here instead of overflowing.
///
/// A multiple of 720720, the least common multiple of 1..=16, so listeners
/// with any of those periods keep an even cadence across the wrap.
pub const FRAME_COUNTER_WRAP: u64 = 720_720 * 1_000_000;

type Callback = Rc<RefCell<dyn FnMut(u64)>>;

struct FrameListener {
    callback: Callback,
    period: u64,
    phase: u64,
}

impl FrameListener {
    fn is_due(&self, frame: u64) -> bool {
        frame % self.period == self.phase
    }
}

#[derive(Default)]
struct SchedulerState {
    listeners: HashMap<String, FrameListener>,
    frame: u64,
}

/// Handle to the per-frame listener table
#[derive(Clone, Default)]
pub struct FrameScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, firing every `period` frames on `phase`.
    ///
    /// Registering an existing name replaces the previous listener.
    pub fn register<F>(
        &self,
        name: &str,
        period: u64,
        phase: u64,
        callback: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut(u64) + 'static,
    {
        if period == 0 || phase >= period {
            return Err(SchedulerError::InvalidCadence {
                name: name.to_string(),
                period,
                phase,
            });
        }

        let listener = FrameListener {
            callback: Rc::new(RefCell::new(callback)),
            period,
            phase,
        };

        let previous = self
            .state
            .borrow_mut()
            .listeners
            .insert(name.to_string(), listener);
        if previous.is_some() {
            log::warn!("Frame listener '{}' replaced an existing listener", name);
        }

        Ok(())
    }

    /// Remove the listener registered under `name`. Returns whether one existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.state.borrow_mut().listeners.remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.borrow().listeners.contains_key(name)
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of live listeners, sorted
    pub fn listener_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.borrow().listeners.keys().cloned().collect();
        names.sort();
        names
    }

    /// The frame number the next `tick` will run
    pub fn frame(&self) -> u64 {
        self.state.borrow().frame
    }

    /// Run one frame: fire every due listener, then advance the counter.
    ///
    /// Listeners may register or unregister (including themselves) while
    /// running. A listener removed earlier in the same frame does not fire.
    pub fn tick(&self) -> u64 {
        let (frame, due) = {
            let state = self.state.borrow();
            let due: Vec<(String, Callback)> = state
                .listeners
                .iter()
                .filter(|(_, listener)| listener.is_due(state.frame))
                .map(|(name, listener)| (name.clone(), listener.callback.clone()))
                .collect();
            (state.frame, due)
        };

        for (name, callback) in due {
            if !self.still_registered(&name, &callback) {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                (callback.borrow_mut())(frame);
            }));
            if result.is_err() {
                log::error!("Frame listener '{}' panicked on frame {}", name, frame);
            }
        }

        let mut state = self.state.borrow_mut();
        state.frame = (state.frame + 1) % FRAME_COUNTER_WRAP;
        frame
    }

    fn still_registered(&self, name: &str, callback: &Callback) -> bool {
        self.state
            .borrow()
            .listeners
            .get(name)
            .map(|listener| Rc::ptr_eq(&listener.callback, callback))
            .unwrap_or(false)
    }
}
