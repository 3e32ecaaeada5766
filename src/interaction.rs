//! Cancellable interactions and the "first of N" race.
//!
//! Every long-lived interactive construct (interact box, button, progress
//! bar) is returned as an [`Interaction`]: a completion plus a teardown that
//! removes its frame listener and its visuals. Teardown is idempotent and also
//! runs on drop, so an interaction can't outlive its handle.
//!
//! [`first_of`] is the one place races are resolved: it waits for the first
//! completion and tears down every other branch.

use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::Poll;
use tokio::sync::oneshot;

type Completion<T> = Pin<Box<dyn Future<Output = Option<T>>>>;

/// A pending operation with an explicit teardown
pub struct Interaction<T> {
    name: String,
    completion: Option<Completion<T>>,
    teardown: Option<Box<dyn FnOnce()>>,
}

impl<T: 'static> Interaction<T> {
    /// Completes with whatever is sent on `completion`.
    ///
    /// If the sender is dropped without sending, the interaction never
    /// completes (it is treated as withdrawn).
    pub fn new<F>(name: impl Into<String>, completion: oneshot::Receiver<T>, teardown: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            name: name.into(),
            completion: Some(Box::pin(async move { completion.await.ok() })),
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform the completion value, keeping the same teardown
    pub fn map<U, F>(mut self, f: F) -> Interaction<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let completion = self.completion.take().map(|completion| {
            Box::pin(async move { completion.await.map(f) }) as Completion<U>
        });
        Interaction {
            name: std::mem::take(&mut self.name),
            completion,
            teardown: self.teardown.take(),
        }
    }

    /// Wait for completion, then tear down.
    ///
    /// Returns `None` if the interaction was withdrawn without completing.
    pub async fn wait(mut self) -> Option<T> {
        let completion = self.completion.take()?;
        completion.await
    }

    /// Tear down without waiting
    pub fn cancel(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl<T> Drop for Interaction<T> {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

/// Wait for whichever interaction completes first.
///
/// Returns the winner's position in `interactions` and its value. Every
/// interaction, winner included, is torn down before this returns. Returns
/// `None` if all of them were withdrawn.
pub async fn first_of<T: 'static>(mut interactions: Vec<Interaction<T>>) -> Option<(usize, T)> {
    let winner = poll_fn(|cx| {
        let mut open = 0;
        for (index, interaction) in interactions.iter_mut().enumerate() {
            let Some(completion) = interaction.completion.as_mut() else {
                continue;
            };
            match completion.as_mut().poll(cx) {
                Poll::Ready(Some(value)) => return Poll::Ready(Some((index, value))),
                Poll::Ready(None) => interaction.completion = None,
                Poll::Pending => open += 1,
            }
        }
        if open == 0 {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    })
    .await;

    for (index, interaction) in interactions.into_iter().enumerate() {
        if winner.as_ref().map(|(won, _)| *won) != Some(index) {
            log::debug!("Cancelling '{}'", interaction.name());
        }
        interaction.cancel();
    }

    winner
}
