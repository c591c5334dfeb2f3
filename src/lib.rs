//! mmWave radar people-counting pipeline.
//!
//! Ingests the framed binary stream of a millimeter-wave radar sensor,
//! reconstructs detection frames, clusters raw detections into candidate
//! objects, tracks objects across frames, and derives a directional
//! people count (entries vs. exits) from track trajectories.
//!
//! # Design Principles
//!
//! 1. **No partial frames**: the decoder delivers a frame whole or not at
//!    all, and resynchronizes on the magic word after any fault
//! 2. **Run forever**: no fault in the byte stream is fatal; recoverable
//!    errors land in diagnostics counters, never in the frame flow
//! 3. **Deterministic**: same bytes in, same tracks and count events out
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use mmwave_peoplecount::{Cycle, Pipeline, PipelineConfig};
//!
//! let capture = File::open("radar_capture.bin").unwrap();
//! let mut pipeline = Pipeline::new(capture, PipelineConfig::default());
//!
//! loop {
//!     match pipeline.next_cycle() {
//!         Ok(Cycle::Frame(output)) => {
//!             for event in &output.events {
//!                 println!("{:?} by track {:?}", event.direction, event.track_id);
//!             }
//!         }
//!         Ok(Cycle::Idle) => continue, // timeout; a good spot to cancel
//!         Err(_) => break,             // stream closed
//!     }
//! }
//! println!("totals: {:?}", pipeline.totals());
//! ```

#![forbid(unsafe_code)]

pub mod cluster;
pub mod counting;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod points;
pub mod protocol;
pub mod track;
pub mod tracker;

pub use cluster::{cluster_points, Cluster, ClusterConfig, Clustering};
pub use counting::{
    BoundaryConfig, CountEvent, CountTotals, CountingLogic, Direction, Side,
};
pub use decoder::{DecodeStats, FrameDecoder};
pub use error::{BlockError, DecodeError};
pub use pipeline::{Cycle, FrameOutput, Pipeline, PipelineConfig, PipelineStats};
pub use points::{extract, DetectionPoint, Extraction, SensorTarget};
pub use protocol::{FrameHeader, RawFrame, TlvBlock, TlvType};
pub use track::{Track, TrackId, TrackState};
pub use tracker::{StepSummary, TrackManager, TrackerConfig};
