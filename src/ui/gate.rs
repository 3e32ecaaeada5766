//! Interact box: a region the participant confirms by putting both hands in,
//! holding until it primes, then taking them out.
//!
//! The hold requirement stops a hand drifting through the box from
//! triggering it. Taking the hands out before the box primes resets it.

use crate::context::XrContext;
use crate::error::SchedulerError;
use crate::interaction::Interaction;
use crate::joints::{Aabb, Handedness};
use crate::sampler::HandTracker;
use crate::ui::stage::{Element, GateState};
use crate::ui::WidgetTeardown;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub const GATE_CENTRE: [f32; 3] = [0.0, 0.4, -0.1];
pub const GATE_SIZE: [f32; 3] = [1.0, 0.4, 1.0];

pub const ENTER_WHEN_READY: &str = "Place your hands in the box when ready";
pub const REMOVE_TO_CONTINUE: &str = "Remove your hands to continue";
pub const REMOVE_TO_RECORD: &str = "Remove your hands to start recording";

/// Default interact box region in front of the participant
pub fn default_region() -> Aabb {
    Aabb::from_centre(GATE_CENTRE, GATE_SIZE)
}

/// Text shown above the box before and after it primes
#[derive(Debug, Clone, PartialEq)]
pub struct GatePrompts {
    pub enter: String,
    pub remove: String,
}

impl GatePrompts {
    pub fn new(enter: impl Into<String>, remove: impl Into<String>) -> Self {
        Self {
            enter: enter.into(),
            remove: remove.into(),
        }
    }
}

/// Changes reported by [`GateTracker::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Entered,
    Primed,
    Cancelled,
    Confirmed,
}

/// Hold-timer state of one interact box, independent of rendering
#[derive(Debug, Clone)]
pub struct GateTracker {
    hold: Duration,
    entered_at: Option<Instant>,
    primed: bool,
}

impl GateTracker {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            entered_at: None,
            primed: false,
        }
    }

    pub fn state(&self) -> GateState {
        match (self.entered_at, self.primed) {
            (None, _) => GateState::Idle,
            (Some(_), false) => GateState::Entered,
            (Some(_), true) => GateState::Primed,
        }
    }

    /// Feed one check of whether the hands are inside at `now`
    pub fn update(&mut self, inside: bool, now: Instant) -> Option<GateEvent> {
        match (inside, self.entered_at) {
            (true, None) => {
                self.entered_at = Some(now);
                Some(GateEvent::Entered)
            }
            (true, Some(since)) if !self.primed && now.duration_since(since) >= self.hold => {
                self.primed = true;
                Some(GateEvent::Primed)
            }
            (true, Some(_)) => None,
            (false, Some(_)) => {
                self.entered_at = None;
                if std::mem::take(&mut self.primed) {
                    Some(GateEvent::Confirmed)
                } else {
                    Some(GateEvent::Cancelled)
                }
            }
            (false, None) => None,
        }
    }
}

/// Whether both hands are tracked with every joint sphere inside `region`
pub fn hands_in_box(hands: &dyn HandTracker, region: &Aabb) -> bool {
    Handedness::BOTH.iter().all(|&side| {
        hands.hand(side).map_or(false, |joints| {
            joints
                .iter()
                .all(|joint| region.contains_sphere(joint.pose.position, joint.radius))
        })
    })
}

/// Show an interact box and complete once it is confirmed.
pub fn interact_box(
    context: &XrContext,
    prompts: GatePrompts,
) -> Result<Interaction<()>, SchedulerError> {
    let name = context.unique_name("interact-box");
    let region = default_region();
    let teardown = WidgetTeardown::new(context, &name, vec![name.clone()]);

    let (done_tx, done_rx) = oneshot::channel();
    let mut done_tx = Some(done_tx);
    let mut tracker = GateTracker::new(context.config.gate_hold());

    let draw = {
        let stage = context.stage.clone();
        let name = name.clone();
        move |state: GateState, prompt: &str| {
            stage.put(
                &name,
                Element::Gate {
                    region,
                    state,
                    prompt: prompt.to_string(),
                },
            )
        }
    };
    draw(GateState::Idle, &prompts.enter);

    let hands = context.hands.clone();
    let finish = teardown.clone();
    context
        .scheduler
        .register(&name, context.config.gate_check_period, 0, move |_| {
            let inside = hands_in_box(hands.as_ref(), &region);
            match tracker.update(inside, Instant::now()) {
                Some(GateEvent::Entered) => draw(GateState::Entered, &prompts.enter),
                Some(GateEvent::Primed) => draw(GateState::Primed, &prompts.remove),
                Some(GateEvent::Cancelled) => draw(GateState::Idle, &prompts.enter),
                Some(GateEvent::Confirmed) => {
                    finish.run();
                    if let Some(tx) = done_tx.take() {
                        let _ = tx.send(());
                    }
                }
                None => {}
            }
        })?;

    Ok(Interaction::new(name, done_rx, move || teardown.run()))
}
