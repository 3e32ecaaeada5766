//! Retained visual elements, keyed by name.
//!
//! The core never touches meshes or fonts. It describes what should be on
//! screen as plain [`Element`] values and hands them to a [`Stage`], which is
//! whatever rendering layer the host provides. Putting an element under an
//! existing id replaces it; removing an absent id is a no-op.

use crate::joints::{Aabb, HandPose};
use std::time::Duration;

/// Colour state of an interact box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for hands
    Idle,
    /// Hands inside, hold timer running
    Entered,
    /// Held long enough; removing hands confirms
    Primed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub position: [f32; 3],
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 0.5,
            position: [0.0, 0.0, -4.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        text: String,
        style: TextStyle,
    },
    Gate {
        region: Aabb,
        state: GateState,
        prompt: String,
    },
    Button {
        label: String,
        /// Top-centre of the button cap at rest
        position: [f32; 3],
        /// How far the cap is pushed in, 0 at rest
        depression: f32,
    },
    Progress {
        /// Remaining fraction, 1 at start and 0 when done
        fraction: f32,
    },
    GhostHands {
        left: Option<Box<HandPose>>,
        right: Option<Box<HandPose>>,
    },
}

/// Host rendering layer
pub trait Stage {
    fn put(&self, id: &str, element: Element);

    fn remove(&self, id: &str);

    /// End the immersive session once the participant is done
    fn end_session(&self);
}

/// Stage that only logs, for headless runs
#[derive(Debug, Default)]
pub struct LogStage;

impl Stage for LogStage {
    fn put(&self, id: &str, element: Element) {
        match element {
            Element::Text { text, .. } => log::info!("[{}] {}", id, text),
            Element::Gate { state, prompt, .. } => log::info!("[{}] {:?}: {}", id, state, prompt),
            Element::Button { label, depression, .. } if depression == 0.0 => {
                log::info!("[{}] button {}", id, label)
            }
            other => log::trace!("[{}] {:?}", id, other),
        }
    }

    fn remove(&self, id: &str) {
        log::debug!("[{}] removed", id);
    }

    fn end_session(&self) {
        log::info!("Session ended");
    }
}

/// Show `text` until [`clear_text`] is called with the same id
pub fn display_indefinitely(stage: &dyn Stage, id: &str, text: &str, style: TextStyle) {
    stage.put(
        id,
        Element::Text {
            text: text.to_string(),
            style,
        },
    );
}

pub fn clear_text(stage: &dyn Stage, id: &str) {
    stage.remove(id);
}

/// Show `text` for `duration`, then remove it
pub async fn display_for(stage: &dyn Stage, id: &str, text: &str, style: TextStyle, duration: Duration) {
    display_indefinitely(stage, id, text, style);
    tokio::time::sleep(duration).await;
    clear_text(stage, id);
}
