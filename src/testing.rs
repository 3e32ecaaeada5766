//! Test doubles for the device, renderer and server, plus a scripted
//! participant that works the on-screen controls.

use crate::config::Config;
use crate::context::XrContext;
use crate::error::TransportError;
use crate::joints::{Aabb, HandPose, Handedness, Joint, JointPose, TrackedHand, JOINT_COUNT};
use crate::record::{PoseRecord, PoseSequence};
use crate::sampler::HandTracker;
use crate::simulation;
use crate::transport::{CaptureTransport, DemonstrationSource, TransferTarget, TrialService};
use crate::trial::{Gesture, GestureClassLocator, Trial, TrialCompletion};
use crate::ui::button::PRESS_DEPTH;
use crate::ui::stage::{Element, GateState, Stage};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

pub const JOINT_RADIUS: f32 = 0.008;
const LEFT_REST: [f32; 3] = [-0.2, 1.2, -0.3];
const RIGHT_REST: [f32; 3] = [0.2, 1.2, -0.3];

/// Config with small batches so short captures still cut several
pub fn test_config() -> Config {
    Config {
        block_size: 16,
        ..Config::default()
    }
}

pub fn test_context(hands: Rc<ScriptedHands>, stage: Rc<RecordingStage>) -> XrContext {
    XrContext::new(hands, stage, test_config())
}

fn hand_at(base: [f32; 3]) -> TrackedHand {
    simulation::hand_at(base, JOINT_RADIUS)
}

struct ScriptedHand {
    tracked: bool,
    joints: TrackedHand,
}

/// Hand tracker whose poses are set directly by the test
pub struct ScriptedHands {
    left: RefCell<ScriptedHand>,
    right: RefCell<ScriptedHand>,
    frame_tag: Cell<Option<f32>>,
}

impl Default for ScriptedHands {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHands {
    /// Both hands tracked, resting above the interact box
    pub fn new() -> Self {
        Self {
            left: RefCell::new(ScriptedHand {
                tracked: true,
                joints: hand_at(LEFT_REST),
            }),
            right: RefCell::new(ScriptedHand {
                tracked: true,
                joints: hand_at(RIGHT_REST),
            }),
            frame_tag: Cell::new(None),
        }
    }

    fn side(&self, hand: Handedness) -> &RefCell<ScriptedHand> {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }

    pub fn set_tracked(&self, hand: Handedness, tracked: bool) {
        self.side(hand).borrow_mut().tracked = tracked;
    }

    /// Overwrite the x coordinate of every joint with `tag`
    pub fn set_frame_tag(&self, tag: f32) {
        self.frame_tag.set(Some(tag));
    }

    /// Both hands well inside `region`
    pub fn place_in(&self, region: &Aabb) {
        let centre = region.centre();
        let base_y = centre[1] - 0.05;
        self.left.borrow_mut().joints = hand_at([centre[0] - 0.2, base_y, centre[2]]);
        self.right.borrow_mut().joints = hand_at([centre[0] + 0.2, base_y, centre[2]]);
    }

    /// Both hands back at rest, clear of every control
    pub fn rest(&self) {
        self.left.borrow_mut().joints = hand_at(LEFT_REST);
        self.right.borrow_mut().joints = hand_at(RIGHT_REST);
    }

    /// Right index fingertip pushing `depth` into a cap whose top is at `cap_top`
    pub fn press_at(&self, cap_top: [f32; 3], depth: f32) {
        let tip_y = cap_top[1] - depth + JOINT_RADIUS;
        let mut joints = hand_at([cap_top[0], tip_y + 0.05, cap_top[2]]);
        joints[Joint::IndexTip.index()].pose = JointPose::at([cap_top[0], tip_y, cap_top[2]]);
        self.right.borrow_mut().joints = joints;
        self.left.borrow_mut().joints = hand_at(LEFT_REST);
    }
}

impl HandTracker for ScriptedHands {
    fn hand(&self, hand: Handedness) -> Option<TrackedHand> {
        let side = self.side(hand).borrow();
        if !side.tracked {
            return None;
        }
        let mut joints = side.joints;
        if let Some(tag) = self.frame_tag.get() {
            for joint in joints.iter_mut() {
                joint.pose.position[0] = tag;
            }
        }
        Some(joints)
    }

    fn camera(&self) -> Option<JointPose> {
        Some(JointPose::at([0.0, 1.6, 0.0]))
    }
}

/// Stage that remembers what is visible and everything ever shown
#[derive(Default)]
pub struct RecordingStage {
    visible: RefCell<BTreeMap<String, Element>>,
    history: RefCell<Vec<(String, Element)>>,
    ended: Cell<bool>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> BTreeMap<String, Element> {
        self.visible.borrow().clone()
    }

    /// Every `put`, in order
    pub fn history(&self) -> Vec<(String, Element)> {
        self.history.borrow().clone()
    }

    /// Every text put on stage, in order
    pub fn texts_shown(&self) -> Vec<String> {
        self.history
            .borrow()
            .iter()
            .filter_map(|(_, element)| match element {
                Element::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn was_shown(&self, fragment: &str) -> bool {
        self.texts_shown().iter().any(|text| text.contains(fragment))
    }

    pub fn visible_texts(&self) -> Vec<String> {
        self.visible
            .borrow()
            .values()
            .filter_map(|element| match element {
                Element::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Id, state and prompt of the visible interact box
    pub fn gate(&self) -> Option<(String, GateState, String)> {
        self.visible
            .borrow()
            .iter()
            .find_map(|(id, element)| match element {
                Element::Gate { state, prompt, .. } => Some((id.clone(), *state, prompt.clone())),
                _ => None,
            })
    }

    pub fn gate_prompt(&self) -> Option<String> {
        self.gate().map(|(_, _, prompt)| prompt)
    }

    /// Id, position and depression of the visible button labelled `label`
    pub fn button(&self, label: &str) -> Option<(String, [f32; 3], f32)> {
        self.visible
            .borrow()
            .iter()
            .find_map(|(id, element)| match element {
                Element::Button {
                    label: shown,
                    position,
                    depression,
                } if shown == label => Some((id.clone(), *position, *depression)),
                _ => None,
            })
    }

    pub fn button_position(&self, label: &str) -> Option<[f32; 3]> {
        self.button(label).map(|(_, position, _)| position)
    }

    pub fn button_depression(&self, label: &str) -> Option<f32> {
        self.button(label).map(|(_, _, depression)| depression)
    }

    pub fn progress_fraction(&self) -> Option<f32> {
        self.visible.borrow().values().find_map(|element| match element {
            Element::Progress { fraction } => Some(*fraction),
            _ => None,
        })
    }

    /// Visible ghost hands, if any
    pub fn ghost_hands(&self) -> Option<(Option<HandPose>, Option<HandPose>)> {
        self.visible.borrow().values().find_map(|element| match element {
            Element::GhostHands { left, right } => {
                Some((left.as_deref().copied(), right.as_deref().copied()))
            }
            _ => None,
        })
    }

    /// Number of ghost hand frames ever drawn
    pub fn ghost_frames_drawn(&self) -> usize {
        self.history
            .borrow()
            .iter()
            .filter(|(_, element)| matches!(element, Element::GhostHands { .. }))
            .count()
    }

    pub fn session_ended(&self) -> bool {
        self.ended.get()
    }
}

impl Stage for RecordingStage {
    fn put(&self, id: &str, element: Element) {
        self.history.borrow_mut().push((id.to_string(), element.clone()));
        self.visible.borrow_mut().insert(id.to_string(), element);
    }

    fn remove(&self, id: &str) {
        self.visible.borrow_mut().remove(id);
    }

    fn end_session(&self) {
        self.ended.set(true);
    }
}

/// Calls observed by [`MockBackend`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartTransfer(TransferTarget),
    Append(TransferTarget, Vec<u8>),
    NextTrial { project: String, participant: String },
    CompleteTrial(TrialCompletion),
    RestartTrial { trial_id: String },
    FetchDemonstration(GestureClassLocator),
    LookupShortCode(String),
}

/// In-memory server double with failure injection
#[derive(Default)]
pub struct MockBackend {
    calls: RefCell<Vec<Call>>,
    trial: RefCell<Option<Trial>>,
    demonstrations: RefCell<HashMap<GestureClassLocator, PoseSequence>>,
    short_codes: RefCell<HashMap<String, GestureClassLocator>>,
    latency: Cell<Duration>,
    fail_start: Cell<bool>,
    fail_append_after: Cell<Option<usize>>,
    fail_complete: Cell<bool>,
}

fn injected(endpoint: &str) -> TransportError {
    TransportError::UnexpectedStatus {
        endpoint: endpoint.to_string(),
        status: 500,
        body: "injected failure".to_string(),
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trial(trial: Trial) -> Self {
        let backend = Self::new();
        *backend.trial.borrow_mut() = Some(trial);
        backend
    }

    pub fn add_demonstration(&self, class: GestureClassLocator, sequence: PoseSequence) {
        self.demonstrations.borrow_mut().insert(class, sequence);
    }

    pub fn add_short_code(&self, code: &str, class: GestureClassLocator) {
        self.short_codes.borrow_mut().insert(code.to_string(), class);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency.set(latency);
    }

    pub fn fail_start_transfer(&self) {
        self.fail_start.set(true);
    }

    /// Let `ok` appends through, then fail every later one
    pub fn fail_append_after(&self, ok: usize) {
        self.fail_append_after.set(Some(ok));
    }

    pub fn fail_complete_trial(&self) {
        self.fail_complete.set(true);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Payloads appended to `target` since its latest transfer start
    pub fn appended(&self, target: &TransferTarget) -> Vec<Vec<u8>> {
        let calls = self.calls.borrow();
        let start = calls
            .iter()
            .rposition(|call| matches!(call, Call::StartTransfer(t) if t == target))
            .map_or(0, |i| i + 1);
        calls[start..]
            .iter()
            .filter_map(|call| match call {
                Call::Append(t, bytes) if t == target => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of transfers started for `target`
    pub fn transfers_started(&self, target: &TransferTarget) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::StartTransfer(t) if t == target))
            .count()
    }

    fn appends_so_far(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Append(..)))
            .count()
    }

    async fn respond(&self) {
        let latency = self.latency.get();
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }
    }

    fn log(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl CaptureTransport for MockBackend {
    async fn start_transfer(&self, target: &TransferTarget) -> Result<(), TransportError> {
        self.respond().await;
        if self.fail_start.get() {
            return Err(injected("start-transfer"));
        }
        self.log(Call::StartTransfer(target.clone()));
        Ok(())
    }

    async fn append_batch(&self, target: &TransferTarget, data: Vec<u8>) -> Result<(), TransportError> {
        self.respond().await;
        if let Some(ok) = self.fail_append_after.get() {
            if self.appends_so_far() >= ok {
                return Err(injected("append-data"));
            }
        }
        self.log(Call::Append(target.clone(), data));
        Ok(())
    }
}

impl TrialService for MockBackend {
    async fn next_trial(&self, project_name: &str, participant_id: &str) -> Result<Trial, TransportError> {
        self.respond().await;
        self.log(Call::NextTrial {
            project: project_name.to_string(),
            participant: participant_id.to_string(),
        });
        self.trial.borrow().clone().ok_or_else(|| TransportError::UnexpectedStatus {
            endpoint: "next-trial".to_string(),
            status: 404,
            body: "no trial".to_string(),
        })
    }

    async fn complete_trial(&self, completion: &TrialCompletion) -> Result<(), TransportError> {
        self.respond().await;
        if self.fail_complete.get() {
            return Err(injected("complete-trial"));
        }
        self.log(Call::CompleteTrial(completion.clone()));
        Ok(())
    }

    async fn restart_trial(&self, _project_name: &str, _participant_id: &str, trial_id: &str) -> Result<(), TransportError> {
        self.respond().await;
        self.log(Call::RestartTrial {
            trial_id: trial_id.to_string(),
        });
        Ok(())
    }
}

impl DemonstrationSource for MockBackend {
    /// Stored demonstrations first, then whatever was uploaded under a short
    /// code that records into `class`.
    async fn fetch_demonstration(&self, class: &GestureClassLocator) -> Result<Option<PoseSequence>, TransportError> {
        self.respond().await;
        self.log(Call::FetchDemonstration(class.clone()));
        if let Some(sequence) = self.demonstrations.borrow().get(class) {
            return Ok(Some(sequence.clone()));
        }

        let code = self
            .short_codes
            .borrow()
            .iter()
            .find(|(_, recorded)| *recorded == class)
            .map(|(code, _)| code.clone());
        let Some(short_code) = code else {
            return Ok(None);
        };
        let bytes: Vec<u8> = self
            .appended(&TransferTarget::Demonstration { short_code })
            .concat();
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(PoseSequence::from_bytes(&bytes)?))
    }

    async fn lookup_short_code(&self, short_code: &str) -> Result<Option<GestureClassLocator>, TransportError> {
        self.respond().await;
        self.log(Call::LookupShortCode(short_code.to_string()));
        Ok(self.short_codes.borrow().get(short_code).cloned())
    }
}

/// What the scripted participant does next
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Hands into the interact box, hold until primed, then out
    PassGate,
    /// Push the button with this label
    Press(String),
}

pub fn press(label: &str) -> Intent {
    Intent::Press(label.to_string())
}

pub const PARTICIPANT_LISTENER: &str = "participant";

struct ParticipantState {
    intents: VecDeque<Intent>,
    /// Element acted on by the finished intent; wait for it to disappear
    finished_with: Option<String>,
}

/// Register a participant that works through `intents` in order.
///
/// Runs as its own frame listener named [`PARTICIPANT_LISTENER`]. Returns
/// the number of intents not yet carried out.
pub fn script_participant(
    context: &XrContext,
    hands: Rc<ScriptedHands>,
    stage: Rc<RecordingStage>,
    intents: Vec<Intent>,
) -> Rc<Cell<usize>> {
    let remaining = Rc::new(Cell::new(intents.len()));
    let mut state = ParticipantState {
        intents: intents.into(),
        finished_with: None,
    };
    let counter = remaining.clone();

    context
        .scheduler
        .register(PARTICIPANT_LISTENER, 1, 0, move |_| {
            if let Some(id) = &state.finished_with {
                if stage.visible().contains_key(id) {
                    return;
                }
                state.finished_with = None;
                hands.rest();
            }

            let done = match state.intents.front() {
                None => return,
                Some(Intent::PassGate) => match stage.gate() {
                    Some((id, GateState::Primed, _)) => {
                        hands.rest();
                        Some(id)
                    }
                    Some(_) => {
                        hands.place_in(&crate::ui::gate::default_region());
                        None
                    }
                    None => None,
                },
                Some(Intent::Press(label)) => match stage.button(label) {
                    Some((id, position, _)) => {
                        hands.press_at(position, PRESS_DEPTH + 0.005);
                        Some(id)
                    }
                    None => None,
                },
            };

            if let Some(id) = done {
                state.intents.pop_front();
                state.finished_with = Some(id);
                counter.set(state.intents.len());
            }
        })
        .unwrap();

    remaining
}

/// Trial fixture with `count` short gestures
pub fn sample_trial(count: usize) -> Trial {
    Trial {
        trial_id: "trial-1".to_string(),
        trial_name: "sample".to_string(),
        instructions: "Follow the prompts".to_string(),
        gestures: (0..count)
            .map(|i| Gesture {
                gesture_id: format!("g{}", i),
                gesture_name: format!("gesture {}", i),
                instruction: format!("Perform gesture {}", i),
                duration: 0.5,
            })
            .collect(),
    }
}

/// Sequence of `frames` records, `step_s` apart starting at `t0`, whose left
/// wrist x is the frame index
pub fn sample_sequence(frames: usize, t0: f32, step_s: f32) -> PoseSequence {
    let records: Vec<PoseRecord> = (0..frames)
        .map(|i| {
            let mut hand = [JointPose::default(); JOINT_COUNT];
            for (j, joint) in hand.iter_mut().enumerate() {
                *joint = JointPose::at([i as f32, 0.01 * j as f32, -0.3]);
            }
            let t = t0 + step_s * i as f32;
            PoseRecord::new(Some(&hand), Some(&hand), None, t, t + 0.001)
        })
        .collect();
    PoseSequence::from_records(&records)
}
