//! VisionPipeline: one synchronous detect-track-publish cycle per frame.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::{ConfigError, VisionConfig};
use crate::source::{Frame, FrameSource};
use crate::tracker::{Association, DisplayRecord, Rect, TrackedObjectList, dedup_detections};

use super::publish::{VISION_ARRAY_KEY, VisionArray, bin_hits, bin_key};
use super::{Detector, Publisher};

/// What one cycle saw and sent.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_number: u64,
    /// Detections fed to the tracker after filtering and merging
    pub detections: usize,
    pub display: Vec<DisplayRecord>,
    pub vision_array: VisionArray,
    /// Strip flags, in driver-station mode
    pub bins: Option<[bool; 4]>,
    /// Rolling frame rate, once enough frames have been timed
    pub fps: Option<f64>,
}

/// Rolling average of the time between frames.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    samples: VecDeque<Duration>,
    window: usize,
    last: Option<Instant>,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl FrameTimer {
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window: window.max(1),
            last: None,
        }
    }

    /// Mark the end of a frame. Returns frames per second once the window is full.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        if let Some(last) = self.last.replace(now) {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(now.saturating_duration_since(last));
        }
        self.fps()
    }

    pub fn fps(&self) -> Option<f64> {
        if self.samples.len() < self.window {
            return None;
        }
        let mean = self.samples.iter().sum::<Duration>().as_secs_f64() / self.window as f64;
        (mean > 0.0).then(|| 1.0 / mean)
    }
}

/// Drives a frame source, a detector and a publisher around a [`TrackedObjectList`].
pub struct VisionPipeline<S, D, P> {
    source: S,
    detector: D,
    publisher: P,
    tracker: TrackedObjectList,
    config: VisionConfig,
    paused: bool,
    timer: FrameTimer,
}

impl<S, D, P> VisionPipeline<S, D, P>
where
    S: FrameSource,
    D: Detector,
    P: Publisher,
{
    pub fn new(source: S, detector: D, publisher: P, config: VisionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tracker = TrackedObjectList::try_new(config.calibration, config.tracker)?;
        Ok(Self {
            source,
            detector,
            publisher,
            tracker,
            config,
            paused: false,
            timer: FrameTimer::default(),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn tracker(&self) -> &TrackedObjectList {
        &self.tracker
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// While paused the same frame is processed again and tracks do not age.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Move the source one frame forward without processing it.
    pub fn skip_frame(&mut self) -> Option<Frame> {
        self.source.next_frame(false)
    }

    /// Run one cycle.
    ///
    /// `delta_angle` is the robot's rotation in degrees since the last cycle.
    /// Returns `Ok(None)` once the source has no more frames.
    pub fn run_once(&mut self, delta_angle: f64) -> Result<Option<FrameReport>, D::Error> {
        let Some(frame) = self.source.next_frame(self.paused) else {
            debug!("frame source exhausted");
            return Ok(None);
        };

        if let Err(e) = self.tracker.adjust_for_motion(delta_angle) {
            warn!(%e, "ignoring motion input");
        }

        let params = self.config.detect;
        let found: Vec<_> = self
            .detector
            .detect(&frame, &params)?
            .into_iter()
            .filter(|d| params.accepts(d.rect.width, d.rect.height))
            .collect();
        let mut detections = dedup_detections(&found, &self.config.dedup);
        detections.truncate(self.config.max_detections);

        match self.config.tracker.association {
            Association::Sequential => {
                for det in &detections {
                    if let Err(e) = self.tracker.process_detection(det.rect) {
                        warn!(%e, "skipping detection");
                    }
                }
            }
            Association::Global => {
                let rects: Vec<Rect> = detections.iter().map(|d| d.rect).collect();
                for result in self.tracker.associate(&rects) {
                    if let Err(e) = result {
                        warn!(%e, "skipping detection");
                    }
                }
            }
        }

        self.tracker.print();
        let display = self.tracker.display();
        let publish = self.config.publish;
        let vision_array = VisionArray::from_display(&display, publish.min_ratio);

        let bins = if publish.driver_station {
            let hits = bin_hits(&display, frame.width(), frame.height(), publish.min_ratio);
            for (i, hit) in hits.iter().enumerate() {
                if let Err(e) = self.publisher.put_boolean(&bin_key(i), *hit) {
                    warn!(%e, key = %bin_key(i), "publish failed");
                }
            }
            Some(hits)
        } else {
            if let Err(e) = self
                .publisher
                .put_number_array(VISION_ARRAY_KEY, &vision_array.to_vec())
            {
                warn!(%e, key = VISION_ARRAY_KEY, "publish failed");
            }
            None
        };

        if !self.paused {
            self.tracker.next_frame();
        }

        let fps = self.timer.tick();
        if let Some(fps) = fps {
            debug!(frame = frame.frame_number, fps = format_args!("{fps:.1}"), "frame rate");
        }

        Ok(Some(FrameReport {
            frame_number: frame.frame_number,
            detections: detections.len(),
            display,
            vision_array,
            bins,
            fps,
        }))
    }
}
