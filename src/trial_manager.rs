//! # Trial Manager
//!
//! Walks a participant through one trial, step by step, using
//! [`TrialProgress`] for the bookkeeping and the UI widgets for everything
//! the participant sees:
//!
//! 1. Trial instruction behind an interact box
//! 2. Per gesture: demonstration playback plus instruction behind an interact
//!    box, raced against an undo button from the second gesture on
//! 3. Per gesture: capture streamed for the gesture's duration alongside a
//!    progress bar, then a short pause
//! 4. Review: redo trial, redo last, or save
//! 5. Save: completion with redo counts, closing text, end of session
//!
//! Server calls are not retried; a failure aborts the trial with a
//! [`TrialError`]. A missing or unfetchable demonstration only skips the
//! playback.

use crate::capture::{stream_hand_data, CaptureSummary};
use crate::context::XrContext;
use crate::demonstration::{DemonstrationCache, GestureDemonstration};
use crate::error::TrialError;
use crate::interaction::first_of;
use crate::transport::{CaptureTransport, DemonstrationSource, TransferTarget, TrialService};
use crate::trial::{
    Gesture, ReviewChoice, Trial, TrialCompletion, TrialContext, TrialProgress, TrialStep,
};
use crate::ui::button::{choice_buttons, undo_button};
use crate::ui::gate::{interact_box, GatePrompts, ENTER_WHEN_READY, REMOVE_TO_CONTINUE, REMOVE_TO_RECORD};
use crate::ui::progress::progress_bar;
use crate::ui::stage::{clear_text, display_for, display_indefinitely, TextStyle};
use std::time::Duration;

pub const RECORDING_TEXT: &str = "recording gesture...";
pub const REVIEW_TEXT: &str = "All gestures recorded. Save the trial or redo part of it";
pub const TRIAL_OVER_TEXT: &str = "The trial is over, you may take off the headset";

const TRIAL_OVER_DISPLAY: Duration = Duration::from_secs(5);
const POST_RECORDING_PAUSE: Duration = Duration::from_millis(500);

/// How an instruction step was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionOutcome {
    /// Interact box confirmed
    Proceed,
    /// Undo pressed first
    Undo,
}

/// Show `text` behind an interact box, optionally racing an undo button.
///
/// Whichever completes first wins; the other is torn down along with the
/// text.
pub async fn skippable_instruction(
    context: &XrContext,
    text: &str,
    prompts: GatePrompts,
    offer_undo: bool,
) -> Result<InstructionOutcome, TrialError> {
    let mut branches = vec![interact_box(context, prompts)?.map(|()| InstructionOutcome::Proceed)];
    if offer_undo {
        branches.push(undo_button(context)?.map(|_| InstructionOutcome::Undo));
    }

    let text_id = context.unique_name("instruction");
    display_indefinitely(context.stage.as_ref(), &text_id, text, TextStyle::default());
    let winner = first_of(branches).await;
    clear_text(context.stage.as_ref(), &text_id);

    Ok(winner.map_or(InstructionOutcome::Proceed, |(_, outcome)| outcome))
}

/// Runs one trial for one participant
pub struct TrialManager<'a, C: ?Sized, S: ?Sized> {
    context: &'a XrContext,
    capture: &'a C,
    service: &'a S,
    participant: TrialContext,
    demonstrations: DemonstrationCache,
}

impl<'a, C, S> TrialManager<'a, C, S>
where
    C: CaptureTransport + ?Sized,
    S: TrialService + DemonstrationSource + ?Sized,
{
    /// `capture` receives the pose data; `service` serves trials and
    /// demonstrations.
    pub fn new(
        context: &'a XrContext,
        capture: &'a C,
        service: &'a S,
        participant: TrialContext,
    ) -> Self {
        Self {
            context,
            capture,
            service,
            participant,
            demonstrations: DemonstrationCache::new(context.config.demonstration_cache_size),
        }
    }

    /// Fetch the participant's next trial and perform it
    pub async fn run(&self) -> Result<TrialCompletion, TrialError> {
        let trial = self
            .service
            .next_trial(&self.participant.project_name, &self.participant.participant_id)
            .await?;
        log::info!(
            "Starting trial '{}' ({} gestures) for {}",
            trial.trial_name,
            trial.gestures.len(),
            self.participant.participant_id
        );
        self.perform_trial(&trial).await
    }

    pub async fn perform_trial(&self, trial: &Trial) -> Result<TrialCompletion, TrialError> {
        let mut progress = TrialProgress::new(trial.gestures.len());
        let mut demonstration = GestureDemonstration::new(self.context);

        loop {
            match progress.step() {
                TrialStep::TrialInstruction => {
                    skippable_instruction(
                        self.context,
                        &trial.instructions,
                        GatePrompts::new(ENTER_WHEN_READY, REMOVE_TO_CONTINUE),
                        false,
                    )
                    .await?;
                    progress.begin();
                }
                TrialStep::GestureInstruction(index) => {
                    let outcome = self
                        .gesture_instruction(&trial.gestures[index], index, &mut demonstration)
                        .await?;
                    match outcome {
                        InstructionOutcome::Proceed => progress.start_recording(),
                        InstructionOutcome::Undo => {
                            log::info!("Participant went back from gesture {}", index);
                            progress.undo();
                        }
                    }
                }
                TrialStep::Recording(index) => {
                    self.record_gesture(trial, index).await?;
                    progress.accept();
                }
                TrialStep::TrialReview => {
                    let choice = self.review().await?;
                    log::info!("Review choice: {}", choice.label());
                    if choice == ReviewChoice::RedoTrial {
                        self.service
                            .restart_trial(
                                &self.participant.project_name,
                                &self.participant.participant_id,
                                &trial.trial_id,
                            )
                            .await?;
                    }
                    progress.review(choice);
                }
                TrialStep::Saved => break,
            }
        }

        let completion = TrialCompletion {
            project_name: self.participant.project_name.clone(),
            participant_id: self.participant.participant_id.clone(),
            trial_id: trial.trial_id.clone(),
            redo_counts: progress.redo_counts().to_vec(),
        };
        self.service.complete_trial(&completion).await?;
        log::info!(
            "Trial '{}' saved with redo counts {:?}",
            trial.trial_id,
            completion.redo_counts
        );

        let text_id = self.context.unique_name("trial-over");
        display_for(
            self.context.stage.as_ref(),
            &text_id,
            TRIAL_OVER_TEXT,
            TextStyle::default(),
            TRIAL_OVER_DISPLAY,
        )
        .await;
        self.context.stage.end_session();
        Ok(completion)
    }

    /// Instruction for one gesture, with its demonstration playing meanwhile.
    ///
    /// Playback is stopped before this returns so it never overlaps the
    /// recording.
    async fn gesture_instruction(
        &self,
        gesture: &Gesture,
        index: usize,
        demonstration: &mut GestureDemonstration,
    ) -> Result<InstructionOutcome, TrialError> {
        let class = self.participant.gesture_class(gesture);
        match self.demonstrations.get_or_fetch(self.service, &class).await {
            Ok(Some(sequence)) => {
                demonstration.load(sequence);
                demonstration.start()?;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Could not fetch demonstration for {}: {}", gesture.gesture_id, e),
        }

        let outcome = skippable_instruction(
            self.context,
            &gesture.instruction,
            GatePrompts::new(ENTER_WHEN_READY, REMOVE_TO_RECORD),
            index > 0,
        )
        .await;
        demonstration.stop();
        outcome
    }

    async fn record_gesture(&self, trial: &Trial, index: usize) -> Result<CaptureSummary, TrialError> {
        let gesture = &trial.gestures[index];
        let duration = Duration::from_millis(gesture.duration_ms());
        let target = TransferTarget::Gesture(self.participant.gesture_locator(trial, index));
        log::info!("Recording gesture {} ({:?}) for {}", index, duration, target.describe());

        let bar = progress_bar(self.context, duration)?;
        let text_id = self.context.unique_name("recording");
        let (captured, _, _) = tokio::join!(
            stream_hand_data(self.context, self.capture, &target, duration),
            bar.wait(),
            display_for(
                self.context.stage.as_ref(),
                &text_id,
                RECORDING_TEXT,
                TextStyle::default(),
                duration,
            ),
        );
        let summary = captured.map_err(|source| TrialError::Capture {
            gesture_index: index,
            source,
        })?;

        tokio::time::sleep(POST_RECORDING_PAUSE).await;
        Ok(summary)
    }

    async fn review(&self) -> Result<ReviewChoice, TrialError> {
        let labels: Vec<&str> = ReviewChoice::ALL.iter().map(|choice| choice.label()).collect();
        let buttons = choice_buttons(self.context, &labels)?;

        let text_id = self.context.unique_name("review");
        display_indefinitely(self.context.stage.as_ref(), &text_id, REVIEW_TEXT, TextStyle::default());
        let winner = first_of(buttons).await;
        clear_text(self.context.stage.as_ref(), &text_id);

        Ok(winner.map_or(ReviewChoice::Save, |(index, _)| ReviewChoice::ALL[index]))
    }
}
