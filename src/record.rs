//! # Pose Record Layout and Codec
//!
//! One sampled instant is a fixed-length run of `f32` values:
//!
//! ```text
//! [0, 175)    left hand   25 joints x [px, py, pz, qx, qy, qz, qw]
//! [175, 350)  right hand  same layout
//! [350, 357)  camera      [px, py, pz, qx, qy, qz, qw]
//! 357         capture start time (seconds on the capture clock)
//! 358         capture end time
//! ```
//!
//! Anything untracked is filled with NaN rather than omitted, so every record
//! has exactly [`RECORD_LENGTH`] values. A sequence is records concatenated
//! back to back; on the wire each value is a little-endian `f32` with no
//! padding or header.
//!
//! This is the second revision of the layout, the one that includes the
//! camera. The payload carries no version marker, so every producer and
//! consumer in the crate goes through these constants.

use crate::error::CodecError;
use crate::joints::{HandPose, Handedness, JointPose, JOINT_COUNT};

pub const VALUES_PER_JOINT: usize = 7;
pub const HAND_VALUES: usize = JOINT_COUNT * VALUES_PER_JOINT;
pub const CAMERA_VALUES: usize = VALUES_PER_JOINT;

pub const LEFT_HAND_OFFSET: usize = 0;
pub const RIGHT_HAND_OFFSET: usize = HAND_VALUES;
pub const CAMERA_OFFSET: usize = 2 * HAND_VALUES;
pub const START_TIME_OFFSET: usize = CAMERA_OFFSET + CAMERA_VALUES;
pub const END_TIME_OFFSET: usize = START_TIME_OFFSET + 1;

/// Values per record (359)
pub const RECORD_LENGTH: usize = END_TIME_OFFSET + 1;

/// Bytes per encoded record
pub const RECORD_BYTES: usize = RECORD_LENGTH * std::mem::size_of::<f32>();

/// The "no data" value
pub const MISSING: f32 = f32::NAN;

fn hand_offset(hand: Handedness) -> usize {
    match hand {
        Handedness::Left => LEFT_HAND_OFFSET,
        Handedness::Right => RIGHT_HAND_OFFSET,
    }
}

fn write_pose(slot: &mut [f32], pose: &JointPose) {
    slot[..3].copy_from_slice(&pose.position);
    slot[3..VALUES_PER_JOINT].copy_from_slice(&pose.orientation);
}

fn read_pose(slot: &[f32]) -> Option<JointPose> {
    if slot[..VALUES_PER_JOINT].iter().any(|v| v.is_nan()) {
        return None;
    }
    Some(JointPose {
        position: [slot[0], slot[1], slot[2]],
        orientation: [slot[3], slot[4], slot[5], slot[6]],
    })
}

/// Bitwise equality, so missing (NaN) slots compare equal to themselves.
fn same_bits(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// One sampled frame. Immutable once built.
#[derive(Debug, Clone)]
pub struct PoseRecord {
    values: Box<[f32; RECORD_LENGTH]>,
}

impl PoseRecord {
    /// Assemble a record; `None` hands or camera become NaN-filled slots.
    pub fn new(
        left: Option<&HandPose>,
        right: Option<&HandPose>,
        camera: Option<&JointPose>,
        capture_start: f32,
        capture_end: f32,
    ) -> Self {
        let mut values = Box::new([MISSING; RECORD_LENGTH]);

        for (hand, pose) in [(Handedness::Left, left), (Handedness::Right, right)] {
            if let Some(joints) = pose {
                let base = hand_offset(hand);
                for (i, joint) in joints.iter().enumerate() {
                    let start = base + i * VALUES_PER_JOINT;
                    write_pose(&mut values[start..start + VALUES_PER_JOINT], joint);
                }
            }
        }
        if let Some(camera) = camera {
            write_pose(&mut values[CAMERA_OFFSET..START_TIME_OFFSET], camera);
        }
        values[START_TIME_OFFSET] = capture_start;
        values[END_TIME_OFFSET] = capture_end;

        Self { values }
    }

    /// Build from exactly [`RECORD_LENGTH`] values.
    pub fn from_slice(values: &[f32]) -> Result<Self, CodecError> {
        let array: [f32; RECORD_LENGTH] =
            values.try_into().map_err(|_| CodecError::PartialRecord {
                values: values.len(),
                record_length: RECORD_LENGTH,
            })?;
        Ok(Self {
            values: Box::new(array),
        })
    }

    pub fn values(&self) -> &[f32] {
        &self.values[..]
    }

    /// Joints of one hand, or `None` if the hand was not tracked.
    pub fn hand(&self, hand: Handedness) -> Option<HandPose> {
        hand_from_values(&self.values[..], hand)
    }

    pub fn camera(&self) -> Option<JointPose> {
        read_pose(&self.values[CAMERA_OFFSET..START_TIME_OFFSET])
    }

    pub fn capture_start(&self) -> f32 {
        self.values[START_TIME_OFFSET]
    }

    pub fn capture_end(&self) -> f32 {
        self.values[END_TIME_OFFSET]
    }
}

impl PartialEq for PoseRecord {
    fn eq(&self, other: &Self) -> bool {
        same_bits(&self.values[..], &other.values[..])
    }
}

impl Eq for PoseRecord {}

fn hand_from_values(record: &[f32], hand: Handedness) -> Option<HandPose> {
    let base = hand_offset(hand);
    let mut joints = [JointPose::default(); JOINT_COUNT];
    for (i, joint) in joints.iter_mut().enumerate() {
        let start = base + i * VALUES_PER_JOINT;
        *joint = read_pose(&record[start..start + VALUES_PER_JOINT])?;
    }
    Some(joints)
}

/// Helpers over a run of records, in the spirit of a slice extension.
pub trait RecordSliceExt {
    /// Encode as the wire payload: record-major little-endian `f32`s.
    fn encode(&self) -> Vec<u8>;
}

impl RecordSliceExt for [PoseRecord] {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len() * RECORD_BYTES);
        for record in self {
            for value in record.values() {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }
}

/// Decode a wire payload back into records.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<PoseRecord>, CodecError> {
    PoseSequence::from_bytes(bytes)?.records()
}

/// A flat concatenation of records, as stored server-side and replayed.
#[derive(Debug, Clone, Default)]
pub struct PoseSequence {
    values: Vec<f32>,
}

impl PartialEq for PoseSequence {
    fn eq(&self, other: &Self) -> bool {
        same_bits(&self.values, &other.values)
    }
}

impl Eq for PoseSequence {}

impl PoseSequence {
    /// Wrap flat values; the length must be a whole number of records.
    pub fn new(values: Vec<f32>) -> Result<Self, CodecError> {
        if values.len() % RECORD_LENGTH != 0 {
            return Err(CodecError::PartialRecord {
                values: values.len(),
                record_length: RECORD_LENGTH,
            });
        }
        Ok(Self { values })
    }

    pub fn from_records(records: &[PoseRecord]) -> Self {
        let mut values = Vec::with_capacity(records.len() * RECORD_LENGTH);
        for record in records {
            values.extend_from_slice(record.values());
        }
        Self { values }
    }

    /// Decode the binary form: little-endian `f32`s, record-major.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() % 4 != 0 {
            return Err(CodecError::UnalignedBuffer { len: bytes.len() });
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(values)
    }

    /// Decode the legacy text form: one record per line, comma-separated.
    ///
    /// Blank lines and trailing commas are tolerated.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let mut values = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let value = token.parse::<f32>().map_err(|_| CodecError::InvalidNumber {
                    line: line_no + 1,
                    token: token.to_string(),
                })?;
                values.push(value);
            }
        }
        Self::new(values)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn frame_count(&self) -> usize {
        self.values.len() / RECORD_LENGTH
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw values of frame `index`
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(RECORD_LENGTH)?;
        self.values.get(start..start + RECORD_LENGTH)
    }

    pub fn frame_hand(&self, index: usize, hand: Handedness) -> Option<HandPose> {
        hand_from_values(self.frame(index)?, hand)
    }

    /// Capture start time of frame `index`, in seconds
    pub fn frame_start_time(&self, index: usize) -> Option<f32> {
        self.frame(index).map(|frame| frame[START_TIME_OFFSET])
    }

    pub fn records(&self) -> Result<Vec<PoseRecord>, CodecError> {
        self.values
            .chunks_exact(RECORD_LENGTH)
            .map(PoseRecord::from_slice)
            .collect()
    }
}
