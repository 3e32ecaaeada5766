//! Hand skeleton definitions shared by capture, gating and playback.
//!
//! The joint order below is part of the wire format: every record lays out
//! its joints in exactly this order, so producers and consumers index by
//! [`Joint::index`] rather than by name.

/// The 25 tracked joints of one hand, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    Wrist,
    ThumbMetacarpal,
    ThumbProximal,
    ThumbDistal,
    ThumbTip,
    IndexMetacarpal,
    IndexProximal,
    IndexIntermediate,
    IndexDistal,
    IndexTip,
    MiddleMetacarpal,
    MiddleProximal,
    MiddleIntermediate,
    MiddleDistal,
    MiddleTip,
    RingMetacarpal,
    RingProximal,
    RingIntermediate,
    RingDistal,
    RingTip,
    PinkyMetacarpal,
    PinkyProximal,
    PinkyIntermediate,
    PinkyDistal,
    PinkyTip,
}

/// Total number of joints per hand.
pub const JOINT_COUNT: usize = 25;

impl Joint {
    /// Every joint in wire order.
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Wrist,
        Joint::ThumbMetacarpal,
        Joint::ThumbProximal,
        Joint::ThumbDistal,
        Joint::ThumbTip,
        Joint::IndexMetacarpal,
        Joint::IndexProximal,
        Joint::IndexIntermediate,
        Joint::IndexDistal,
        Joint::IndexTip,
        Joint::MiddleMetacarpal,
        Joint::MiddleProximal,
        Joint::MiddleIntermediate,
        Joint::MiddleDistal,
        Joint::MiddleTip,
        Joint::RingMetacarpal,
        Joint::RingProximal,
        Joint::RingIntermediate,
        Joint::RingDistal,
        Joint::RingTip,
        Joint::PinkyMetacarpal,
        Joint::PinkyProximal,
        Joint::PinkyIntermediate,
        Joint::PinkyDistal,
        Joint::PinkyTip,
    ];

    /// Position of this joint within a hand record (0-24).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Which hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub const BOTH: [Handedness; 2] = [Handedness::Left, Handedness::Right];
}

/// World-space pose of a single joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
    /// Position in meters (x, y, z).
    pub position: [f32; 3],
    /// Orientation quaternion (x, y, z, w).
    pub orientation: [f32; 4],
}

impl Default for JointPose {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl JointPose {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn translated(&self, offset: [f32; 3]) -> Self {
        Self {
            position: [
                self.position[0] + offset[0],
                self.position[1] + offset[1],
                self.position[2] + offset[2],
            ],
            orientation: self.orientation,
        }
    }
}

/// A joint as reported live by the tracker, with its collision radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedJoint {
    pub pose: JointPose,
    /// Joint radius in meters.
    pub radius: f32,
}

/// All joints of one hand, indexed by [`Joint::index`].
pub type HandPose = [JointPose; JOINT_COUNT];

/// All tracked joints of one hand, indexed by [`Joint::index`].
pub type TrackedHand = [TrackedJoint; JOINT_COUNT];

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    /// Box of the given size centred on `centre`.
    pub fn from_centre(centre: [f32; 3], size: [f32; 3]) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = centre[axis] - size[axis] / 2.0;
            max[axis] = centre[axis] + size[axis] / 2.0;
        }
        Self { min, max }
    }

    pub fn centre(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Whether a sphere lies entirely inside the box.
    pub fn contains_sphere(&self, centre: [f32; 3], radius: f32) -> bool {
        (0..3).all(|axis| {
            centre[axis] - radius >= self.min[axis] && centre[axis] + radius <= self.max[axis]
        })
    }
}
