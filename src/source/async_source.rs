use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ndarray::{Array2, Array3};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::settings::CameraTuning;
use crate::source::{DeliveryMode, Frame, FrameSource, LatestFrame};

/// Outcome of one capture attempt.
#[derive(Debug)]
pub enum Grab {
    Frame {
        image: Array3<u8>,
        depth: Option<Array2<f32>>,
    },
    /// Transient failure; try again shortly
    Retry,
    /// Device disconnected or recording finished
    End,
}

/// A capture device driven from a background thread.
pub trait FrameProducer: Send + 'static {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Capture one frame. May block until the device has one.
    fn grab(&mut self) -> Grab;

    fn frame_count(&self) -> Option<u64> {
        None
    }

    /// Reposition a recording so the next grab returns `frame_number`.
    fn seek(&mut self, _frame_number: u64) -> bool {
        false
    }

    /// Push image controls to the device.
    fn apply_tuning(&mut self, _tuning: &CameraTuning) {}
}

#[derive(Debug, Clone, Copy)]
pub struct AsyncOptions {
    pub mode: DeliveryMode,
    /// Consecutive failed grabs before the producer gives up
    pub max_bad_reads: u32,
    pub retry_delay: Duration,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::LatestWins,
            max_bad_reads: 100,
            retry_delay: Duration::from_millis(5),
        }
    }
}

impl AsyncOptions {
    pub fn lockstep() -> Self {
        Self {
            mode: DeliveryMode::Lockstep,
            ..Self::default()
        }
    }
}

/// Runs a [`FrameProducer`] on its own thread and hands frames to the caller
/// through a [`LatestFrame`] cell.
///
/// Dropping the source stops the producer and joins its thread.
pub struct AsyncSource<P: FrameProducer> {
    producer: Arc<Mutex<P>>,
    slot: Arc<LatestFrame>,
    stop: Arc<AtomicBool>,
    next_number: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
    width: usize,
    height: usize,
    frame_count: Option<u64>,
    last: Option<Frame>,
}

impl<P: FrameProducer> AsyncSource<P> {
    pub fn spawn(producer: P, options: AsyncOptions) -> io::Result<Self> {
        let width = producer.width();
        let height = producer.height();
        let frame_count = producer.frame_count();

        let producer = Arc::new(Mutex::new(producer));
        let slot = Arc::new(LatestFrame::new());
        let stop = Arc::new(AtomicBool::new(false));
        let next_number = Arc::new(AtomicU64::new(0));

        let handle = {
            let producer = Arc::clone(&producer);
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            let next_number = Arc::clone(&next_number);
            thread::Builder::new()
                .name("frame-producer".into())
                .spawn(move || run_producer(&producer, &slot, &stop, &next_number, options))?
        };

        info!(width, height, mode = ?options.mode, "frame producer started");

        Ok(Self {
            producer,
            slot,
            stop,
            next_number,
            handle: Some(handle),
            width,
            height,
            frame_count,
            last: None,
        })
    }

    /// Whether the producer thread is still delivering frames.
    pub fn is_running(&self) -> bool {
        !self.slot.is_closed()
    }

    /// Frames the producer captured that were replaced before being read.
    pub fn dropped_frames(&self) -> u64 {
        self.slot.overwritten()
    }

    /// Forward new image controls to the device.
    pub fn apply_tuning(&self, tuning: &CameraTuning) {
        self.producer.lock().apply_tuning(tuning);
        debug!(?tuning, "applied camera tuning");
    }

    /// Stop the producer and wait for its thread to exit.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.slot.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("frame producer panicked");
            }
        }
    }
}

impl<P: FrameProducer> FrameSource for AsyncSource<P> {
    fn next_frame(&mut self, pause: bool) -> Option<Frame> {
        if pause {
            if let Some(frame) = &self.last {
                return Some(frame.clone());
            }
        }
        let frame = self.slot.take()?;
        self.last = Some(frame.clone());
        Some(frame)
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn frame_number(&self) -> u64 {
        self.last.as_ref().map_or(0, |f| f.frame_number)
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    /// Holding the producer lock keeps a grab from landing between the seek
    /// and the discard, so the next frame delivered is the one sought.
    fn seek(&mut self, frame_number: u64) -> bool {
        let mut producer = self.producer.lock();
        if !producer.seek(frame_number) {
            return false;
        }
        self.next_number.store(frame_number, Ordering::Release);
        self.slot.discard();
        debug!(frame_number, "seeked");
        true
    }
}

impl<P: FrameProducer> Drop for AsyncSource<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_producer<P: FrameProducer>(
    producer: &Mutex<P>,
    slot: &LatestFrame,
    stop: &AtomicBool,
    next_number: &AtomicU64,
    options: AsyncOptions,
) {
    let mut bad_reads = 0u32;

    while !stop.load(Ordering::Acquire) {
        if options.mode == DeliveryMode::Lockstep && !slot.wait_consumed() {
            break;
        }
        if stop.load(Ordering::Acquire) {
            break;
        }

        let mut guard = producer.lock();
        match guard.grab() {
            Grab::Frame { image, depth } => {
                bad_reads = 0;
                let number = next_number.fetch_add(1, Ordering::AcqRel);
                let mut frame = Frame::new(image, number);
                frame.depth = depth;
                // Publish under the producer lock so a concurrent seek cannot interleave
                slot.publish(frame);
            }
            Grab::Retry => {
                drop(guard);
                bad_reads += 1;
                if bad_reads >= options.max_bad_reads {
                    warn!(bad_reads, "too many failed grabs, stopping producer");
                    break;
                }
                thread::sleep(options.retry_delay);
            }
            Grab::End => {
                info!("end of stream");
                break;
            }
        }
    }

    slot.close();
    info!("frame producer stopped");
}
