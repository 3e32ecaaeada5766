//! Frame-synchronous hand pose capture for guided gesture trials.
//!
//! A participant is walked through a trial of gestures. While each gesture is
//! recorded, both hands are sampled on the render loop's frame cadence,
//! batched, and streamed to the collection server in capture order. Stored
//! demonstrations can be played back as ghost hands.
//!
//! Everything runs on one thread: the frame loop, the widgets and the
//! uploads share a tokio current-thread runtime and a `LocalSet`.

pub mod archive;
pub mod capture;
pub mod config;
pub mod context;
pub mod demo_session;
pub mod demonstration;
pub mod error;
pub mod frame_loop;
pub mod interaction;
pub mod joints;
pub mod launch;
pub mod record;
pub mod sampler;
pub mod scheduler;
pub mod simulation;
pub mod transport;
pub mod trial;
pub mod trial_manager;
pub mod ui;

#[cfg(test)]
mod testing;
