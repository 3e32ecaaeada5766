//! Push buttons pressed with an index fingertip.
//!
//! A button is a cap on a base. The cap follows the fingertip down while it
//! is pushed, and the button fires once the cap has travelled
//! [`PRESS_DEPTH`]. Every button in a multi-choice prompt is its own
//! interaction, so the prompt resolves through
//! [`first_of`](crate::interaction::first_of) like any other race.

use crate::context::XrContext;
use crate::error::SchedulerError;
use crate::interaction::Interaction;
use crate::joints::{Handedness, Joint, TrackedJoint};
use crate::sampler::HandTracker;
use crate::ui::stage::Element;
use crate::ui::WidgetTeardown;
use tokio::sync::oneshot;

/// Width and depth of the cap
pub const CAP_SIZE: f32 = 0.05;
pub const CAP_HEIGHT: f32 = 0.03;
pub const BASE_HEIGHT: f32 = 0.05;
/// Cap travel that counts as a press
pub const PRESS_DEPTH: f32 = CAP_HEIGHT * 0.8;

pub const UNDO_LABEL: &str = "REDO";
pub const UNDO_POSITION: [f32; 3] = [0.5, 0.75, -0.45];

/// Row of multi-choice buttons: centre and spacing along x
pub const CHOICE_ROW_CENTRE: [f32; 3] = [0.0, 0.9, -0.4];
pub const CHOICE_SPACING: f32 = 0.3;

/// How far `tip` pushes a cap whose top rests at `cap_top`.
///
/// `None` when the fingertip is not over the cap or is below the button
/// entirely.
pub fn fingertip_push(cap_top: [f32; 3], tip: &TrackedJoint) -> Option<f32> {
    let [x, y, z] = tip.pose.position;
    let reach = CAP_SIZE / 2.0 + tip.radius;
    if (x - cap_top[0]).abs() > reach || (z - cap_top[2]).abs() > reach {
        return None;
    }
    let push = cap_top[1] - (y - tip.radius);
    if push <= 0.0 || push > CAP_HEIGHT + BASE_HEIGHT {
        return None;
    }
    Some(push)
}

/// Deepest push by either index fingertip
fn deepest_push(hands: &dyn HandTracker, cap_top: [f32; 3]) -> Option<f32> {
    Handedness::BOTH
        .iter()
        .filter_map(|&side| hands.hand(side))
        .filter_map(|joints| fingertip_push(cap_top, &joints[Joint::IndexTip.index()]))
        .reduce(f32::max)
}

/// Show a button at `position` that completes with its label when pressed.
pub fn push_button(
    context: &XrContext,
    label: &str,
    position: [f32; 3],
) -> Result<Interaction<String>, SchedulerError> {
    let name = context.unique_name("button");
    let teardown = WidgetTeardown::new(context, &name, vec![name.clone()]);
    let (pressed_tx, pressed_rx) = oneshot::channel();
    let mut pressed_tx = Some(pressed_tx);

    let draw = {
        let stage = context.stage.clone();
        let name = name.clone();
        let label = label.to_string();
        move |depression: f32| {
            stage.put(
                &name,
                Element::Button {
                    label: label.clone(),
                    position,
                    depression,
                },
            )
        }
    };
    draw(0.0);

    let hands = context.hands.clone();
    let finish = teardown.clone();
    let value = label.to_string();
    let mut shown_depression = 0.0;
    context.scheduler.register(&name, 2, 1, move |_| {
        let push = deepest_push(hands.as_ref(), position).unwrap_or(0.0);
        if push >= PRESS_DEPTH {
            log::debug!("Button '{}' pressed", value);
            finish.run();
            if let Some(tx) = pressed_tx.take() {
                let _ = tx.send(value.clone());
            }
            return;
        }
        if push != shown_depression {
            shown_depression = push;
            draw(push);
        }
    })?;

    Ok(Interaction::new(name, pressed_rx, move || teardown.run()))
}

/// The undo control offered next to a gesture instruction
pub fn undo_button(context: &XrContext) -> Result<Interaction<String>, SchedulerError> {
    push_button(context, UNDO_LABEL, UNDO_POSITION)
}

/// Lay out one button per label in a row, left to right.
///
/// Race the result with `first_of`; every button is torn down when one wins.
pub fn choice_buttons(
    context: &XrContext,
    labels: &[&str],
) -> Result<Vec<Interaction<String>>, SchedulerError> {
    let first_x = CHOICE_ROW_CENTRE[0] - CHOICE_SPACING * (labels.len().saturating_sub(1)) as f32 / 2.0;
    let mut buttons = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        let position = [
            first_x + CHOICE_SPACING * i as f32,
            CHOICE_ROW_CENTRE[1],
            CHOICE_ROW_CENTRE[2],
        ];
        buttons.push(push_button(context, label, position)?);
    }
    Ok(buttons)
}
