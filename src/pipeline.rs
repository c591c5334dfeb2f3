//! Per-frame composition of the full processing chain.
//!
//! Single-threaded cooperative pipeline: one frame is fully processed
//! (decode -> extract -> cluster -> track -> count) before the next
//! frame's bytes are consumed, so no stage ever sees a partially updated
//! track set. The only blocking point is the stream read inside the
//! decoder; a timeout yields [`Cycle::Idle`] back to the caller so
//! cancellation checks run between frames, never mid-frame.

use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cluster::{cluster_points, ClusterConfig};
use crate::counting::{BoundaryConfig, CountEvent, CountTotals, CountingLogic};
use crate::decoder::{DecodeStats, FrameDecoder};
use crate::error::DecodeError;
use crate::points::{self, DetectionPoint, SensorTarget};
use crate::track::Track;
use crate::tracker::{TrackManager, TrackerConfig};

/// Static configuration for a pipeline instance. No mid-stream
/// reconfiguration: build a new pipeline to change thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cluster: ClusterConfig,
    pub tracker: TrackerConfig,
    pub boundary: BoundaryConfig,
}

/// Aggregated diagnostics across all stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub decode: DecodeStats,
    /// Blocks dropped by the extractor.
    pub malformed_blocks: u64,
    /// Frames where side-info enrichment was skipped over a mismatch.
    pub skipped_enrichments: u64,
}

/// Everything one processed frame produced, for visualization and
/// reporting consumers.
#[derive(Debug, Clone, Serialize)]
pub struct FrameOutput {
    pub frame_number: u32,
    /// This frame's detection points.
    pub points: Vec<DetectionPoint>,
    /// Device-side tracker targets, when the firmware streams them.
    pub sensor_targets: Vec<SensorTarget>,
    /// Snapshot of the live track set after this frame's update.
    pub tracks: Vec<Track>,
    /// Count events emitted by this frame, in emission order.
    pub events: Vec<CountEvent>,
}

/// Result of one pipeline cycle.
#[derive(Debug)]
pub enum Cycle {
    /// A frame was decoded and processed.
    Frame(FrameOutput),
    /// Read timeout with no complete frame; nothing changed.
    Idle,
}

/// The complete processing chain over one input byte stream.
pub struct Pipeline<R> {
    decoder: FrameDecoder<R>,
    config: PipelineConfig,
    tracker: TrackManager,
    counter: CountingLogic,
    malformed_blocks: u64,
    skipped_enrichments: u64,
}

impl<R: Read> Pipeline<R> {
    /// Build a pipeline over a byte stream. In production the stream is a
    /// serial port handle configured with a read timeout; any `Read`
    /// works for replay and tests.
    pub fn new(source: R, config: PipelineConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(source),
            tracker: TrackManager::new(config.tracker),
            counter: CountingLogic::new(config.boundary),
            config,
            malformed_blocks: 0,
            skipped_enrichments: 0,
        }
    }

    /// Process the next frame, or yield on timeout.
    ///
    /// Errors are terminal (stream closed or failed); every recoverable
    /// condition has already been absorbed into [`PipelineStats`]. A bad
    /// frame never corrupts or resets track state.
    pub fn next_cycle(&mut self) -> Result<Cycle, DecodeError> {
        let frame = match self.decoder.next_frame()? {
            Some(frame) => frame,
            None => return Ok(Cycle::Idle),
        };

        let extraction = points::extract(&frame);
        for error in &extraction.errors {
            self.malformed_blocks += 1;
            warn!(frame = frame.header.frame_number, %error, "dropped block");
        }
        if extraction.enrichment_skipped {
            self.skipped_enrichments += 1;
        }

        let clustering = cluster_points(&extraction.points, &self.config.cluster);
        let summary = self.tracker.step(&clustering.clusters);
        let events = self.counter.update(
            frame.header.frame_number,
            self.tracker.tracks(),
            &summary.terminated,
        );

        debug!(
            frame = frame.header.frame_number,
            points = extraction.points.len(),
            clusters = clustering.clusters.len(),
            tracks = self.tracker.tracks().len(),
            events = events.len(),
            "frame processed"
        );

        Ok(Cycle::Frame(FrameOutput {
            frame_number: frame.header.frame_number,
            points: extraction.points,
            sensor_targets: extraction.targets,
            tracks: self.tracker.tracks().to_vec(),
            events,
        }))
    }

    /// Diagnostics counters accumulated since construction.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            decode: self.decoder.stats(),
            malformed_blocks: self.malformed_blocks,
            skipped_enrichments: self.skipped_enrichments,
        }
    }

    /// Running entry/exit totals.
    pub fn totals(&self) -> CountTotals {
        self.counter.totals()
    }

    /// Live track set between cycles, for visualization consumers.
    pub fn tracks(&self) -> &[Track] {
        self.tracker.tracks()
    }
}
