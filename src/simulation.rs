//! Simulated participant for running without an XR device.
//!
//! [`SimulatedHands`] stands in for hand tracking and [`SimulatedStage`] for
//! the renderer. [`autopilot`] reads what is on stage and moves the hands to
//! work the controls: it passes every interact box and presses SAVE whenever
//! it is offered.

use crate::context::XrContext;
use crate::error::SchedulerError;
use crate::joints::{Aabb, Handedness, Joint, JointPose, TrackedHand, TrackedJoint, JOINT_COUNT};
use crate::sampler::HandTracker;
use crate::ui::button::PRESS_DEPTH;
use crate::ui::stage::{Element, GateState, LogStage, Stage};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tokio::time::Instant;

pub const SIMULATED_JOINT_RADIUS: f32 = 0.008;
const JOINT_SPACING: f32 = 0.005;
const LEFT_REST: [f32; 3] = [-0.2, 1.2, -0.3];
const RIGHT_REST: [f32; 3] = [0.2, 1.2, -0.3];
const HEADSET: [f32; 3] = [0.0, 1.6, 0.0];

/// Sideways sway so consecutive samples differ
const SWAY_AMPLITUDE: f32 = 0.003;
const SWAY_HZ: f32 = 0.5;

pub const AUTOPILOT_LISTENER: &str = "simulated-participant";
const PREFERRED_CHOICE: &str = "SAVE";

/// Hand whose joints stack upwards from `base`
pub fn hand_at(base: [f32; 3], radius: f32) -> TrackedHand {
    let mut hand = [TrackedJoint {
        pose: JointPose::default(),
        radius,
    }; JOINT_COUNT];
    for (i, joint) in hand.iter_mut().enumerate() {
        joint.pose = JointPose::at([base[0], base[1] + JOINT_SPACING * i as f32, base[2]]);
    }
    hand
}

pub struct SimulatedHands {
    left: RefCell<TrackedHand>,
    right: RefCell<TrackedHand>,
    started: Instant,
}

impl Default for SimulatedHands {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHands {
    pub fn new() -> Self {
        Self {
            left: RefCell::new(hand_at(LEFT_REST, SIMULATED_JOINT_RADIUS)),
            right: RefCell::new(hand_at(RIGHT_REST, SIMULATED_JOINT_RADIUS)),
            started: Instant::now(),
        }
    }

    pub fn rest(&self) {
        *self.left.borrow_mut() = hand_at(LEFT_REST, SIMULATED_JOINT_RADIUS);
        *self.right.borrow_mut() = hand_at(RIGHT_REST, SIMULATED_JOINT_RADIUS);
    }

    /// Both hands inside `region`
    pub fn place_in(&self, region: &Aabb) {
        let centre = region.centre();
        let base_y = centre[1] - 0.05;
        *self.left.borrow_mut() = hand_at([centre[0] - 0.2, base_y, centre[2]], SIMULATED_JOINT_RADIUS);
        *self.right.borrow_mut() = hand_at([centre[0] + 0.2, base_y, centre[2]], SIMULATED_JOINT_RADIUS);
    }

    /// Right index fingertip pushed through a button cap whose top is at `cap_top`
    pub fn press_at(&self, cap_top: [f32; 3]) {
        let tip_y = cap_top[1] - PRESS_DEPTH - 0.005 + SIMULATED_JOINT_RADIUS;
        let mut joints = hand_at([cap_top[0], tip_y + 0.05, cap_top[2]], SIMULATED_JOINT_RADIUS);
        joints[Joint::IndexTip.index()].pose = JointPose::at([cap_top[0], tip_y, cap_top[2]]);
        *self.right.borrow_mut() = joints;
        *self.left.borrow_mut() = hand_at(LEFT_REST, SIMULATED_JOINT_RADIUS);
    }

    fn sway(&self) -> f32 {
        let t = self.started.elapsed().as_secs_f32();
        SWAY_AMPLITUDE * (std::f32::consts::TAU * SWAY_HZ * t).sin()
    }
}

impl HandTracker for SimulatedHands {
    fn hand(&self, hand: Handedness) -> Option<TrackedHand> {
        let mut joints = match hand {
            Handedness::Left => *self.left.borrow(),
            Handedness::Right => *self.right.borrow(),
        };
        let dx = self.sway();
        for joint in joints.iter_mut() {
            joint.pose.position[0] += dx;
        }
        Some(joints)
    }

    fn camera(&self) -> Option<JointPose> {
        Some(JointPose::at(HEADSET))
    }
}

/// Logs like [`LogStage`] and remembers what is visible
#[derive(Default)]
pub struct SimulatedStage {
    visible: RefCell<BTreeMap<String, Element>>,
}

impl SimulatedStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region and state of the visible interact box
    pub fn gate(&self) -> Option<(Aabb, GateState)> {
        self.visible.borrow().values().find_map(|element| match element {
            Element::Gate { region, state, .. } => Some((*region, *state)),
            _ => None,
        })
    }

    /// Rest position of the visible button labelled `label`
    pub fn button(&self, label: &str) -> Option<[f32; 3]> {
        self.visible.borrow().values().find_map(|element| match element {
            Element::Button { label: shown, position, .. } if shown == label => Some(*position),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.visible.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.borrow().is_empty()
    }
}

impl Stage for SimulatedStage {
    fn put(&self, id: &str, element: Element) {
        LogStage.put(id, element.clone());
        self.visible.borrow_mut().insert(id.to_string(), element);
    }

    fn remove(&self, id: &str) {
        LogStage.remove(id);
        self.visible.borrow_mut().remove(id);
    }

    fn end_session(&self) {
        LogStage.end_session();
    }
}

/// Drive `hands` from what `stage` shows, every frame
pub fn autopilot(
    context: &XrContext,
    hands: std::rc::Rc<SimulatedHands>,
    stage: std::rc::Rc<SimulatedStage>,
) -> Result<(), SchedulerError> {
    context.scheduler.register(AUTOPILOT_LISTENER, 1, 0, move |_| {
        match stage.gate() {
            Some((_, GateState::Primed)) => hands.rest(),
            Some((region, _)) => hands.place_in(&region),
            None => match stage.button(PREFERRED_CHOICE) {
                Some(position) => hands.press_at(position),
                None => hands.rest(),
            },
        }
    })
}
