//! # Hand Capture Module
//!
//! Samples poses on a frame cadence, batches them, and streams the batches
//! to a [`CaptureTransport`] without ever blocking the frame.
//!
//! ## Data Flow
//! ```text
//! frame listener -> PoseSampler -> CaptureBuffer --(full batch)--> on_batch
//!                                                                     |
//!        upload loop <-------------- unbounded channel <--------------+
//!            |
//!            +-> start_transfer, then append_batch per batch, in order
//! ```
//!
//! ## Guarantees
//! 1. A batch is cut as soon as the buffer holds `block_size` records; the
//!    buffer is swapped for an empty one before the batch leaves, so records
//!    sampled during an upload land in the next batch.
//! 2. Stopping flushes the remaining partial batch. An empty remainder is
//!    not sent.
//! 3. Every sampled record is in exactly one batch, and batches carry
//!    increasing sequence numbers in capture order.
//! 4. The upload loop sends nothing before `start_transfer` succeeds, and
//!    appends strictly in sequence order. A failed append stops the capture
//!    and withholds every later batch.

use crate::context::XrContext;
use crate::error::{CaptureError, SchedulerError};
use crate::record::{PoseRecord, RecordSliceExt};
use crate::scheduler::FrameScheduler;
use crate::transport::{CaptureTransport, TransferTarget};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Sampling cadence and batch size of one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Records per batch
    pub block_size: usize,
    /// Sample on frames where `frame % period == phase`
    pub period: u64,
    pub phase: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            block_size: 200,
            period: 1,
            phase: 0,
        }
    }
}

/// Consecutive records cut from the buffer in one flush
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureBatch {
    /// Position of this batch within its capture, from 0
    pub sequence: u64,
    pub records: Vec<PoseRecord>,
}

impl CaptureBatch {
    /// Wire payload of the batch
    pub fn encode(&self) -> Vec<u8> {
        self.records.encode()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Append-only record list that cuts batches at a size threshold
#[derive(Debug)]
pub struct CaptureBuffer {
    records: Vec<PoseRecord>,
    block_size: usize,
    next_sequence: u64,
    sampled: u64,
}

impl CaptureBuffer {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            records: Vec::with_capacity(block_size),
            block_size,
            next_sequence: 0,
            sampled: 0,
        }
    }

    /// Append a record; returns a batch once the threshold is reached
    pub fn push(&mut self, record: PoseRecord) -> Option<CaptureBatch> {
        self.records.push(record);
        self.sampled += 1;
        if self.records.len() >= self.block_size {
            Some(self.cut())
        } else {
            None
        }
    }

    /// Whatever remains, or `None` if nothing does
    pub fn finish(&mut self) -> Option<CaptureBatch> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.cut())
        }
    }

    /// Records waiting for the next batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records pushed since creation
    pub fn sampled(&self) -> u64 {
        self.sampled
    }

    /// Batches cut so far
    pub fn batches(&self) -> u64 {
        self.next_sequence
    }

    fn cut(&mut self) -> CaptureBatch {
        let records = std::mem::replace(&mut self.records, Vec::with_capacity(self.block_size));
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        CaptureBatch { sequence, records }
    }
}

/// Totals of a finished capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSummary {
    pub records: u64,
    pub batches: u64,
}

type BatchSink = Box<dyn FnMut(CaptureBatch)>;

struct CaptureState {
    buffer: CaptureBuffer,
    on_batch: Option<BatchSink>,
}

impl CaptureState {
    fn deliver(&mut self, batch: CaptureBatch) {
        log::debug!(
            "Capture batch {} ready ({} records)",
            batch.sequence,
            batch.len()
        );
        if let Some(on_batch) = self.on_batch.as_mut() {
            on_batch(batch);
        }
    }
}

/// A running capture. Stops on [`stop`](HandCapture::stop) or drop.
pub struct HandCapture {
    name: String,
    scheduler: FrameScheduler,
    state: Rc<RefCell<CaptureState>>,
}

impl HandCapture {
    /// Start sampling into batches handed to `on_batch`.
    ///
    /// `on_batch` runs inside the frame listener and must not block.
    pub fn start<F>(
        context: &XrContext,
        settings: CaptureSettings,
        on_batch: F,
    ) -> Result<Self, SchedulerError>
    where
        F: FnMut(CaptureBatch) + 'static,
    {
        let name = context.unique_name("hand-capture");
        let state = Rc::new(RefCell::new(CaptureState {
            buffer: CaptureBuffer::new(settings.block_size),
            on_batch: Some(Box::new(on_batch)),
        }));

        let sampler = context.sampler();
        let listener_state = state.clone();
        context
            .scheduler
            .register(&name, settings.period, settings.phase, move |_| {
                let record = sampler.sample();
                let state = &mut *listener_state.borrow_mut();
                if let Some(batch) = state.buffer.push(record) {
                    state.deliver(batch);
                }
            })?;

        log::info!(
            "Capture '{}' started (every {} frames, {} records per batch)",
            name,
            settings.period,
            settings.block_size
        );
        Ok(Self {
            name,
            scheduler: context.scheduler.clone(),
            state,
        })
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_registered(&self.name)
    }

    /// Stop sampling, flush the remainder and release the batch sink.
    ///
    /// Later calls return the same totals without flushing again.
    pub fn stop(&self) -> CaptureSummary {
        let was_running = self.scheduler.unregister(&self.name);
        let state = &mut *self.state.borrow_mut();
        if let Some(batch) = state.buffer.finish() {
            state.deliver(batch);
        }
        state.on_batch = None;

        let summary = CaptureSummary {
            records: state.buffer.sampled(),
            batches: state.buffer.batches(),
        };
        if was_running {
            log::info!(
                "Capture '{}' stopped: {} records in {} batches",
                self.name,
                summary.records,
                summary.batches
            );
        }
        summary
    }
}

impl Drop for HandCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the transfer, then append batches in the order they arrive.
async fn upload_batches<T>(
    transport: &T,
    target: &TransferTarget,
    mut batches: UnboundedReceiver<CaptureBatch>,
) -> Result<u64, CaptureError>
where
    T: CaptureTransport + ?Sized,
{
    transport
        .start_transfer(target)
        .await
        .map_err(CaptureError::StartTransfer)?;

    let mut sent = 0;
    while let Some(batch) = batches.recv().await {
        let sequence = batch.sequence;
        if let Err(source) = transport.append_batch(target, batch.encode()).await {
            log::error!(
                "Batch {} for {} failed: {}",
                sequence,
                target.describe(),
                source
            );
            return Err(CaptureError::AppendBatch {
                batch: sequence,
                source,
            });
        }
        sent += 1;
    }
    Ok(sent)
}

/// Capture for `duration` and stream every batch to `target`.
///
/// Sampling starts immediately; batches cut before the transfer has started
/// wait in order until it has. Returns once the last batch is appended.
pub async fn stream_hand_data<T>(
    context: &XrContext,
    transport: &T,
    target: &TransferTarget,
    duration: Duration,
) -> Result<CaptureSummary, CaptureError>
where
    T: CaptureTransport + ?Sized,
{
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let capture = HandCapture::start(context, context.capture_settings(), move |batch| {
        let _ = batch_tx.send(batch);
    })?;

    let upload = upload_batches(transport, target, batch_rx);
    tokio::pin!(upload);

    // The upload loop only ends before the timer on failure
    let ended_early = tokio::select! {
        result = &mut upload => Some(result),
        _ = tokio::time::sleep(duration) => None,
    };

    let summary = capture.stop();
    let sent = match ended_early {
        Some(result) => result?,
        None => upload.await?,
    };
    log::info!(
        "Streamed {} records in {} batches to {}",
        summary.records,
        sent,
        target.describe()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_loop::FrameDriver;
    use crate::record::{decode_records, RECORD_LENGTH};
    use crate::testing::{test_context, Call, MockBackend, RecordingStage, ScriptedHands};
    use crate::trial::GestureLocator;
    use tokio::task::LocalSet;

    fn blank_record(t: f32) -> PoseRecord {
        PoseRecord::new(None, None, None, t, t)
    }

    fn target() -> TransferTarget {
        TransferTarget::Gesture(GestureLocator {
            project_name: "proj".to_string(),
            participant_id: "p1".to_string(),
            trial_id: "t1".to_string(),
            gesture_index: "0".to_string(),
        })
    }

    #[test]
    fn test_buffer_cuts_at_threshold() {
        let mut buffer = CaptureBuffer::new(3);
        assert!(buffer.push(blank_record(0.0)).is_none());
        assert!(buffer.push(blank_record(1.0)).is_none());

        let batch = buffer.push(blank_record(2.0)).unwrap();
        assert_eq!(batch.sequence, 0);
        assert_eq!(batch.len(), 3);
        assert!(buffer.is_empty());

        buffer.push(blank_record(3.0));
        let rest = buffer.finish().unwrap();
        assert_eq!(rest.sequence, 1);
        assert_eq!(rest.records[0].capture_start(), 3.0);
        assert!(buffer.finish().is_none());
        assert_eq!(buffer.sampled(), 4);
        assert_eq!(buffer.batches(), 2);
    }

    #[test]
    fn test_zero_block_size_flushes_every_record() {
        let mut buffer = CaptureBuffer::new(0);
        assert!(buffer.push(blank_record(0.0)).is_some());
    }

    #[test]
    fn test_capture_follows_cadence_and_flushes_on_stop() {
        let context = test_context(Rc::new(ScriptedHands::new()), Rc::new(RecordingStage::new()));
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = batches.clone();
        let settings = CaptureSettings {
            block_size: 2,
            period: 2,
            phase: 1,
        };

        let capture = HandCapture::start(&context, settings, move |batch| {
            sink.borrow_mut().push(batch)
        })
        .unwrap();
        for _ in 0..10 {
            context.scheduler.tick();
        }
        assert_eq!(batches.borrow().len(), 2);

        let summary = capture.stop();
        assert_eq!(summary, CaptureSummary { records: 5, batches: 3 });
        assert_eq!(batches.borrow()[2].len(), 1);
        assert!(context.scheduler.is_empty());

        // A second stop neither resends nor counts anything
        assert_eq!(capture.stop(), summary);
        assert_eq!(batches.borrow().len(), 3);
    }

    #[test]
    fn test_dropping_capture_unregisters() {
        let context = test_context(Rc::new(ScriptedHands::new()), Rc::new(RecordingStage::new()));
        let capture = HandCapture::start(&context, CaptureSettings::default(), |_| {}).unwrap();
        assert!(capture.is_running());
        drop(capture);
        assert!(context.scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamed_batches_reassemble_every_frame_in_order() {
        LocalSet::new()
            .run_until(async {
                let context = test_context(Rc::new(ScriptedHands::new()), Rc::new(RecordingStage::new()));
                let backend = MockBackend::new();
                let driver = FrameDriver::spawn(context.scheduler.clone(), Duration::from_millis(10));

                let summary = stream_hand_data(&context, &backend, &target(), Duration::from_millis(1000))
                    .await
                    .unwrap();
                driver.stop();

                let calls = backend.calls();
                assert_eq!(calls[0], Call::StartTransfer(target()));
                let payloads = backend.appended(&target());
                assert_eq!(payloads.len() as u64, summary.batches);

                let records: Vec<PoseRecord> = payloads
                    .iter()
                    .flat_map(|bytes| decode_records(bytes).unwrap())
                    .collect();
                assert_eq!(records.len() as u64, summary.records);
                assert!(summary.batches > 2);
                assert!(records
                    .windows(2)
                    .all(|pair| pair[1].capture_start() > pair[0].capture_start()));
                assert!(records.iter().all(|r| r.values().len() == RECORD_LENGTH));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_transfer_precedes_every_append() {
        LocalSet::new()
            .run_until(async {
                let context = test_context(Rc::new(ScriptedHands::new()), Rc::new(RecordingStage::new()));
                let backend = MockBackend::new();
                backend.set_latency(Duration::from_millis(300));
                let driver = FrameDriver::spawn(context.scheduler.clone(), Duration::from_millis(1));

                stream_hand_data(&context, &backend, &target(), Duration::from_millis(600))
                    .await
                    .unwrap();
                driver.stop();

                let calls = backend.calls();
                assert!(matches!(calls[0], Call::StartTransfer(_)));
                assert!(calls[1..].iter().all(|call| matches!(call, Call::Append(..))));
                assert!(calls.len() > 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_append_stops_capture_and_withholds_later_batches() {
        LocalSet::new()
            .run_until(async {
                let context = test_context(Rc::new(ScriptedHands::new()), Rc::new(RecordingStage::new()));
                let backend = MockBackend::new();
                backend.fail_append_after(1);
                let driver = FrameDriver::spawn(context.scheduler.clone(), Duration::from_millis(1));

                let result =
                    stream_hand_data(&context, &backend, &target(), Duration::from_secs(10)).await;
                driver.stop();

                assert!(matches!(result, Err(CaptureError::AppendBatch { batch: 1, .. })));
                assert_eq!(backend.appended(&target()).len(), 1);
                assert!(context.scheduler.is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_sends_nothing() {
        LocalSet::new()
            .run_until(async {
                let context = test_context(Rc::new(ScriptedHands::new()), Rc::new(RecordingStage::new()));
                let backend = MockBackend::new();
                backend.fail_start_transfer();
                let driver = FrameDriver::spawn(context.scheduler.clone(), Duration::from_millis(1));

                let result =
                    stream_hand_data(&context, &backend, &target(), Duration::from_secs(1)).await;
                driver.stop();

                assert!(matches!(result, Err(CaptureError::StartTransfer(_))));
                assert!(backend.appended(&target()).is_empty());
            })
            .await;
    }
}
