//! # UI Module
//!
//! Interactive constructs shown to the participant. Each one owns a frame
//! listener and a set of stage elements, and hands back an
//! [`Interaction`](crate::interaction::Interaction) whose teardown removes both.
//!
//! - `stage`: the rendering seam and text display helpers
//! - `gate`: interact box (hands in, hold, hands out)
//! - `button`: push buttons and multi-choice prompts
//! - `progress`: countdown bar

pub mod button;
pub mod gate;
pub mod progress;
pub mod stage;

use crate::context::XrContext;
use crate::scheduler::FrameScheduler;
use stage::Stage;
use std::rc::Rc;

/// Removes one widget's frame listener and stage elements.
///
/// Running it twice is harmless: both removals are no-ops the second time.
#[derive(Clone)]
pub(crate) struct WidgetTeardown {
    scheduler: FrameScheduler,
    stage: Rc<dyn Stage>,
    listener: String,
    elements: Vec<String>,
}

impl WidgetTeardown {
    pub(crate) fn new(context: &XrContext, listener: &str, elements: Vec<String>) -> Self {
        Self {
            scheduler: context.scheduler.clone(),
            stage: context.stage.clone(),
            listener: listener.to_string(),
            elements,
        }
    }

    pub(crate) fn run(&self) {
        self.scheduler.unregister(&self.listener);
        for id in &self.elements {
            self.stage.remove(id);
        }
    }
}
