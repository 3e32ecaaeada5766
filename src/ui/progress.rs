//! Countdown bar shown while a gesture is being recorded.

use crate::context::XrContext;
use crate::error::SchedulerError;
use crate::interaction::Interaction;
use crate::ui::stage::Element;
use crate::ui::WidgetTeardown;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Remaining fraction of `total` after `elapsed`, clamped to [0, 1]
pub fn remaining_fraction(elapsed: Duration, total: Duration) -> f32 {
    if total.is_zero() {
        return 0.0;
    }
    (1.0 - elapsed.as_secs_f32() / total.as_secs_f32()).clamp(0.0, 1.0)
}

/// Show a bar that drains over `duration` and completes once it is empty.
pub fn progress_bar(
    context: &XrContext,
    duration: Duration,
) -> Result<Interaction<()>, SchedulerError> {
    let name = context.unique_name("progress-bar");
    let teardown = WidgetTeardown::new(context, &name, vec![name.clone()]);
    let (done_tx, done_rx) = oneshot::channel();
    let mut done_tx = Some(done_tx);

    let stage = context.stage.clone();
    stage.put(&name, Element::Progress { fraction: 1.0 });

    let started = Instant::now();
    let finish = teardown.clone();
    let id = name.clone();
    context.scheduler.register(&name, 2, 1, move |_| {
        let elapsed = started.elapsed();
        if elapsed >= duration {
            finish.run();
            if let Some(tx) = done_tx.take() {
                let _ = tx.send(());
            }
            return;
        }
        stage.put(
            &id,
            Element::Progress {
                fraction: remaining_fraction(elapsed, duration),
            },
        );
    })?;

    Ok(Interaction::new(name, done_rx, move || teardown.run()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, RecordingStage, ScriptedHands};
    use std::rc::Rc;

    #[test]
    fn test_remaining_fraction() {
        let total = Duration::from_secs(4);
        assert_eq!(remaining_fraction(Duration::ZERO, total), 1.0);
        assert_eq!(remaining_fraction(Duration::from_secs(1), total), 0.75);
        assert_eq!(remaining_fraction(Duration::from_secs(9), total), 0.0);
        assert_eq!(remaining_fraction(Duration::from_secs(1), Duration::ZERO), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bar_drains_then_completes() {
        let stage = Rc::new(RecordingStage::new());
        let context = test_context(Rc::new(ScriptedHands::new()), stage.clone());

        let bar = progress_bar(&context, Duration::from_secs(2)).unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        context.scheduler.tick();
        context.scheduler.tick();
        let fraction = stage.progress_fraction().unwrap();
        assert!((fraction - 0.75).abs() < 1e-3);

        tokio::time::advance(Duration::from_secs(2)).await;
        context.scheduler.tick();
        context.scheduler.tick();

        assert_eq!(bar.wait().await, Some(()));
        assert!(context.scheduler.is_empty());
        assert!(stage.visible().is_empty());
    }
}
