//! Demonstration sessions: recording a reference gesture under a short code,
//! and viewing a stored one.

use crate::capture::stream_hand_data;
use crate::context::XrContext;
use crate::demonstration::GestureDemonstration;
use crate::error::TrialError;
use crate::interaction::first_of;
use crate::transport::{CaptureTransport, DemonstrationSource, TransferTarget};
use crate::trial::GestureClassLocator;
use crate::trial_manager::skippable_instruction;
use crate::ui::button::choice_buttons;
use crate::ui::gate::{GatePrompts, REMOVE_TO_RECORD};
use crate::ui::stage::{clear_text, display_for, display_indefinitely, TextStyle};
use std::time::Duration;

pub const PLACE_WHOLE_HANDS: &str = "Place your whole hands in the box";
pub const NOT_YET_RECORDED: &str = "This demonstration does not yet exist";

const SAVE: &str = "SAVE";
const REDO: &str = "REDO";

/// A demonstration to record, as requested by the launch parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemonstrationRecording {
    pub short_code: String,
    pub duration: Duration,
    pub name: Option<String>,
}

impl DemonstrationRecording {
    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    fn seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Record a demonstration until the participant saves it.
///
/// Every attempt restarts the transfer, so the server keeps only the last
/// one. Returns the number of attempts.
pub async fn record_demonstration<C, S>(
    context: &XrContext,
    capture: &C,
    source: &S,
    request: &DemonstrationRecording,
) -> Result<u32, TrialError>
where
    C: CaptureTransport + ?Sized,
    S: DemonstrationSource + ?Sized,
{
    let class = source
        .lookup_short_code(&request.short_code)
        .await?
        .ok_or_else(|| TrialError::UnknownShortCode(request.short_code.clone()))?;
    log::info!(
        "Recording demonstration '{}' for {}/{}",
        request.short_code,
        class.project_name,
        class.gesture_id
    );

    let target = TransferTarget::Demonstration {
        short_code: request.short_code.clone(),
    };
    let mut demonstration = GestureDemonstration::new(context);
    let mut attempts = 0;

    loop {
        attempts += 1;
        skippable_instruction(
            context,
            &format!("Record gesture {} for {}s", request.display_name(), request.seconds()),
            GatePrompts::new(PLACE_WHOLE_HANDS, REMOVE_TO_RECORD),
            false,
        )
        .await?;

        let text_id = context.unique_name("recording");
        let recording_text = format!("recording gesture demonstration for {}s", request.seconds());
        let (captured, _) = tokio::join!(
            stream_hand_data(context, capture, &target, request.duration),
            display_for(
                context.stage.as_ref(),
                &text_id,
                &recording_text,
                TextStyle::default(),
                request.duration,
            ),
        );
        let summary = captured.map_err(|source| TrialError::Capture {
            gesture_index: 0,
            source,
        })?;
        log::debug!("Attempt {} captured {} records", attempts, summary.records);

        match source.fetch_demonstration(&class).await? {
            Some(sequence) => {
                demonstration.load(sequence);
                demonstration.start()?;
            }
            None => log::warn!("Recorded demonstration '{}' could not be read back", request.short_code),
        }

        let buttons = choice_buttons(context, &[SAVE, REDO])?;
        let text_id = context.unique_name("recorded");
        display_indefinitely(
            context.stage.as_ref(),
            &text_id,
            &format!("This is the gesture you recorded for {}", request.display_name()),
            TextStyle::default(),
        );
        let choice = first_of(buttons).await.map(|(_, label)| label);
        demonstration.stop();
        clear_text(context.stage.as_ref(), &text_id);

        if choice.as_deref() == Some(REDO) {
            log::info!("Redoing demonstration '{}'", request.short_code);
            continue;
        }

        log::info!("Demonstration '{}' saved after {} attempt(s)", request.short_code, attempts);
        context.stage.end_session();
        return Ok(attempts);
    }
}

/// Start looping playback of a stored demonstration.
///
/// Playback runs for as long as the returned value is kept. When nothing has
/// been recorded for `class` yet, a notice is shown instead and `None` is
/// returned.
pub async fn view_demonstration<S>(
    context: &XrContext,
    source: &S,
    class: &GestureClassLocator,
) -> Result<Option<GestureDemonstration>, TrialError>
where
    S: DemonstrationSource + ?Sized,
{
    let Some(sequence) = source.fetch_demonstration(class).await? else {
        log::warn!("No demonstration for {}/{}", class.project_name, class.gesture_id);
        let text_id = context.unique_name("viewer");
        display_indefinitely(context.stage.as_ref(), &text_id, NOT_YET_RECORDED, TextStyle::default());
        return Ok(None);
    };

    let mut demonstration = GestureDemonstration::new(context);
    demonstration.load(sequence);
    demonstration.start()?;
    log::info!(
        "Viewing demonstration {}/{} ({} frames)",
        class.project_name,
        class.gesture_id,
        demonstration.frame_count()
    );
    Ok(Some(demonstration))
}
