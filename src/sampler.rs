//! Pose sampling: reads the live hand and camera transforms for one frame and
//! packs them into a [`PoseRecord`].
//!
//! The device side is behind [`HandTracker`] so the XR runtime, a simulator
//! or a test script can all feed the same pipeline.

use crate::joints::{HandPose, Handedness, JointPose, TrackedHand, JOINT_COUNT};
use crate::record::PoseRecord;
use std::rc::Rc;
use tokio::time::Instant;

/// Source of live joint transforms
pub trait HandTracker {
    /// Current joints of `hand`, or `None` while the hand is not tracked.
    fn hand(&self, hand: Handedness) -> Option<TrackedHand>;

    /// Current headset pose, if known.
    fn camera(&self) -> Option<JointPose>;
}

/// Strip radii from a tracked hand.
pub fn hand_pose(tracked: &TrackedHand) -> HandPose {
    let mut pose = [JointPose::default(); JOINT_COUNT];
    for (out, joint) in pose.iter_mut().zip(tracked.iter()) {
        *out = joint.pose;
    }
    pose
}

/// Monotonic elapsed-time clock, started once and shared by everything that
/// timestamps frames.
#[derive(Debug, Clone, Copy)]
pub struct CaptureClock {
    started: Instant,
}

impl CaptureClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Seconds since the clock started
    pub fn elapsed_secs(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }
}

/// Snapshots the tracker into records
#[derive(Clone)]
pub struct PoseSampler {
    tracker: Rc<dyn HandTracker>,
    clock: CaptureClock,
}

impl PoseSampler {
    pub fn new(tracker: Rc<dyn HandTracker>, clock: CaptureClock) -> Self {
        Self { tracker, clock }
    }

    /// Sample the current frame.
    ///
    /// The start and end timestamps bracket the tracker reads so consumers
    /// can estimate per-frame jitter.
    pub fn sample(&self) -> PoseRecord {
        let capture_start = self.clock.elapsed_secs();
        let left = self.tracker.hand(Handedness::Left).map(|h| hand_pose(&h));
        let right = self.tracker.hand(Handedness::Right).map(|h| hand_pose(&h));
        let camera = self.tracker.camera();
        let capture_end = self.clock.elapsed_secs();

        PoseRecord::new(
            left.as_ref(),
            right.as_ref(),
            camera.as_ref(),
            capture_start,
            capture_end,
        )
    }
}
