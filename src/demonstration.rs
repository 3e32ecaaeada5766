//! # Demonstration Playback
//!
//! Replays a recorded [`PoseSequence`] as ghost hands, paced by the
//! sequence's own capture timestamps rather than one record per frame. The
//! frame shown at `Δ` seconds into playback is the last frame whose relative
//! start time is at most `Δ`. Once `Δ` passes the last frame by the loop
//! margin, playback restarts from frame 0 with a fresh time reference.
//!
//! Fetched demonstrations are kept in a [`DemonstrationCache`] so stepping
//! back to an earlier gesture does not refetch.

use crate::context::XrContext;
use crate::error::{SchedulerError, TransportError};
use crate::joints::{HandPose, Handedness};
use crate::record::PoseSequence;
use crate::scheduler::FrameScheduler;
use crate::transport::DemonstrationSource;
use crate::trial::GestureClassLocator;
use crate::ui::stage::{Element, Stage};
use lru::LruCache;
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tokio::time::Instant;

/// Chooses the frame to show for an elapsed playback time
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    /// Start time of each frame relative to frame 0, in seconds
    times: Vec<f32>,
    current: usize,
    loop_margin: f32,
}

impl PlaybackCursor {
    pub fn new(sequence: &PoseSequence, loop_margin: f32) -> Self {
        let first = sequence.frame_start_time(0).unwrap_or(0.0);
        let times = (0..sequence.frame_count())
            .filter_map(|i| sequence.frame_start_time(i))
            .map(|t| t - first)
            .collect();
        Self {
            times,
            current: 0,
            loop_margin,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Move forward to the frame shown `elapsed` seconds into playback.
    ///
    /// Returns `None` once `elapsed` is past the last frame by the loop
    /// margin; the caller restarts its clock and calls [`reset`](Self::reset).
    pub fn seek(&mut self, elapsed: f32) -> Option<usize> {
        let last = self.times.len().checked_sub(1)?;
        while self.current < last && self.times[self.current + 1] <= elapsed {
            self.current += 1;
        }
        if self.current == last && elapsed > self.times[last] + self.loop_margin {
            return None;
        }
        Some(self.current)
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

fn translate(hand: HandPose, offset: [f32; 3]) -> Box<HandPose> {
    Box::new(hand.map(|joint| joint.translated(offset)))
}

/// Ghost hands for frame `index` of `sequence`, moved by `offset`
pub fn ghost_hands(sequence: &PoseSequence, index: usize, offset: [f32; 3]) -> Element {
    Element::GhostHands {
        left: sequence
            .frame_hand(index, Handedness::Left)
            .map(|hand| translate(hand, offset)),
        right: sequence
            .frame_hand(index, Handedness::Right)
            .map(|hand| translate(hand, offset)),
    }
}

/// Looping ghost-hand playback of one loaded sequence
pub struct GestureDemonstration {
    name: String,
    scheduler: FrameScheduler,
    stage: Rc<dyn Stage>,
    offset: [f32; 3],
    loop_margin: f32,
    sequence: Rc<PoseSequence>,
}

impl GestureDemonstration {
    pub fn new(context: &XrContext) -> Self {
        Self {
            name: context.unique_name("demonstration"),
            scheduler: context.scheduler.clone(),
            stage: context.stage.clone(),
            offset: context.config.demonstration_offset,
            loop_margin: context.config.playback_loop_margin_s,
            sequence: Rc::new(PoseSequence::default()),
        }
    }

    /// Replace the loaded sequence, stopping any playback in progress
    pub fn load(&mut self, sequence: impl Into<Rc<PoseSequence>>) {
        self.stop();
        self.sequence = sequence.into();
        log::debug!(
            "Demonstration '{}' loaded {} frames",
            self.name,
            self.sequence.frame_count()
        );
    }

    pub fn frame_count(&self) -> usize {
        self.sequence.frame_count()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_registered(&self.name)
    }

    /// Show frame 0 and start the playback loop from it
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.sequence.is_empty() {
            log::warn!("Demonstration '{}' has no frames to play", self.name);
            return Ok(());
        }

        let sequence = self.sequence.clone();
        let stage = self.stage.clone();
        let id = self.name.clone();
        let offset = self.offset;
        let draw = move |frame: usize| stage.put(&id, ghost_hands(&sequence, frame, offset));

        let mut cursor = PlaybackCursor::new(&self.sequence, self.loop_margin);
        let mut started = Instant::now();
        let mut shown = 0;
        draw(0);

        self.scheduler.register(&self.name, 1, 0, move |_| {
            let frame = match cursor.seek(started.elapsed().as_secs_f32()) {
                Some(frame) => frame,
                None => {
                    started = Instant::now();
                    cursor.reset();
                    0
                }
            };
            if frame != shown {
                shown = frame;
                draw(frame);
            }
        })
    }

    /// Stop the loop and hide the ghost hands
    pub fn stop(&self) {
        if self.scheduler.unregister(&self.name) {
            log::debug!("Demonstration '{}' stopped", self.name);
        }
        self.stage.remove(&self.name);
    }
}

impl Drop for GestureDemonstration {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Demonstrations per gesture class, absence included
pub struct DemonstrationCache {
    entries: RefCell<LruCache<GestureClassLocator, Option<Rc<PoseSequence>>>>,
}

impl DemonstrationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RefCell::new(LruCache::new(capacity)),
        }
    }

    /// Cached demonstration for `class`, fetching it on a miss.
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<S>(
        &self,
        source: &S,
        class: &GestureClassLocator,
    ) -> Result<Option<Rc<PoseSequence>>, TransportError>
    where
        S: DemonstrationSource + ?Sized,
    {
        if let Some(entry) = self.entries.borrow_mut().get(class) {
            return Ok(entry.clone());
        }

        let fetched = source.fetch_demonstration(class).await?.map(Rc::new);
        if fetched.is_none() {
            log::warn!(
                "No demonstration available for {}/{}",
                class.project_name,
                class.gesture_id
            );
        }
        self.entries.borrow_mut().put(class.clone(), fetched.clone());
        Ok(fetched)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
