//! # Trial Model and Progress
//!
//! Server-side trial description plus the pure bookkeeping of walking it:
//! which step the participant is on and how many times each gesture was
//! redone. The async flow that shows instructions and records lives in
//! `trial_manager`; everything here is synchronous and directly testable.
//!
//! ## Step Flow
//! ```text
//! TrialInstruction -> GestureInstruction(0) -> Recording(0) -> GestureInstruction(1) ...
//!                         ^   | undo (i > 0)                        |
//!                         |   v                                     v
//!                     GestureInstruction(i-1)               TrialReview
//!                                                   redo trial | redo last | save
//! ```

use serde::{Deserialize, Serialize};

/// Identifies one gesture recording on the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GestureLocator {
    pub project_name: String,
    pub participant_id: String,
    pub trial_id: String,
    pub gesture_index: String,
}

/// Identifies a gesture class (not an instance), e.g. for demonstrations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GestureClassLocator {
    pub project_name: String,
    pub gesture_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    pub gesture_id: String,
    pub gesture_name: String,
    pub instruction: String,
    /// Recording length in seconds
    pub duration: f64,
}

impl Gesture {
    pub fn duration_ms(&self) -> u64 {
        (self.duration * 1000.0).max(0.0).round() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_id: String,
    pub trial_name: String,
    pub instructions: String,
    pub gestures: Vec<Gesture>,
}

/// Who the trial is being performed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialContext {
    pub project_name: String,
    pub participant_id: String,
}

impl TrialContext {
    pub fn new(project_name: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            participant_id: participant_id.into(),
        }
    }

    pub fn gesture_locator(&self, trial: &Trial, gesture_index: usize) -> GestureLocator {
        GestureLocator {
            project_name: self.project_name.clone(),
            participant_id: self.participant_id.clone(),
            trial_id: trial.trial_id.clone(),
            gesture_index: gesture_index.to_string(),
        }
    }

    pub fn gesture_class(&self, gesture: &Gesture) -> GestureClassLocator {
        GestureClassLocator {
            project_name: self.project_name.clone(),
            gesture_id: gesture.gesture_id.clone(),
        }
    }
}

/// Reported to the server when a trial is saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialCompletion {
    pub project_name: String,
    pub participant_id: String,
    pub trial_id: String,
    pub redo_counts: Vec<u32>,
}

/// Where the participant currently is in a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStep {
    TrialInstruction,
    GestureInstruction(usize),
    Recording(usize),
    TrialReview,
    Saved,
}

/// Choices offered once every gesture has been recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    RedoTrial,
    RedoLast,
    Save,
}

impl ReviewChoice {
    pub const ALL: [ReviewChoice; 3] = [
        ReviewChoice::RedoTrial,
        ReviewChoice::RedoLast,
        ReviewChoice::Save,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReviewChoice::RedoTrial => "REDO TRIAL",
            ReviewChoice::RedoLast => "REDO LAST",
            ReviewChoice::Save => "SAVE",
        }
    }
}

/// Step position plus per-gesture redo counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialProgress {
    step: TrialStep,
    redo_counts: Vec<u32>,
}

impl TrialProgress {
    pub fn new(gesture_count: usize) -> Self {
        Self {
            step: TrialStep::TrialInstruction,
            redo_counts: vec![0; gesture_count],
        }
    }

    pub fn step(&self) -> TrialStep {
        self.step
    }

    pub fn redo_counts(&self) -> &[u32] {
        &self.redo_counts
    }

    pub fn gesture_count(&self) -> usize {
        self.redo_counts.len()
    }

    /// Trial instruction dismissed
    pub fn begin(&mut self) {
        if self.step == TrialStep::TrialInstruction {
            self.step = self.instruction_or_review(0);
        }
    }

    /// Gate passed at `GestureInstruction(i)`
    pub fn start_recording(&mut self) {
        if let TrialStep::GestureInstruction(i) = self.step {
            self.step = TrialStep::Recording(i);
        }
    }

    /// Recording of gesture `i` finished
    pub fn accept(&mut self) {
        if let TrialStep::Recording(i) = self.step {
            self.step = self.instruction_or_review(i + 1);
        }
    }

    /// Undo from `GestureInstruction(i)`: back to `i - 1`, counting a redo for it.
    ///
    /// Undo from `TrialReview` redoes the last gesture. Returns whether the
    /// step changed.
    pub fn undo(&mut self) -> bool {
        let current = match self.step {
            TrialStep::GestureInstruction(i) => i,
            TrialStep::TrialReview => self.gesture_count(),
            _ => return false,
        };
        if current == 0 {
            return false;
        }
        let previous = current - 1;
        self.redo_counts[previous] += 1;
        self.step = TrialStep::GestureInstruction(previous);
        true
    }

    /// Start over from the first gesture with cleared counters
    pub fn redo_trial(&mut self) {
        self.redo_counts.iter_mut().for_each(|count| *count = 0);
        self.step = self.instruction_or_review(0);
    }

    /// Apply a review choice; only meaningful in `TrialReview`
    pub fn review(&mut self, choice: ReviewChoice) {
        if self.step != TrialStep::TrialReview {
            return;
        }
        match choice {
            ReviewChoice::RedoTrial => self.redo_trial(),
            ReviewChoice::RedoLast => {
                self.undo();
            }
            ReviewChoice::Save => self.step = TrialStep::Saved,
        }
    }

    fn instruction_or_review(&self, index: usize) -> TrialStep {
        if index >= self.gesture_count() {
            TrialStep::TrialReview
        } else {
            TrialStep::GestureInstruction(index)
        }
    }
}
