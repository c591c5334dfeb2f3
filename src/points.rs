//! Detection-point extraction from decoded frames.
//!
//! Interprets the TLV blocks of a [`RawFrame`] into detection points and
//! device-tracked targets. Unrecognized block types are skipped so newer
//! firmware never breaks the pipeline; a malformed block drops only its
//! own contents.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BlockError;
use crate::protocol::{RawFrame, TlvType};

/// Point-cloud record size on the wire: range, azimuth, doppler, snr (f32).
pub const POINT_RECORD_LEN: usize = 16;

/// Target-list record size: id + 6 kinematic f32s + 3x3 covariance + gain.
pub const TARGET_RECORD_LEN: usize = 68;

/// Side-info record size: snr + noise, i16 each, 0.1 dB units.
pub const SIDE_INFO_RECORD_LEN: usize = 4;

/// One radar return in sensor-relative Cartesian coordinates.
///
/// Ephemeral: recomputed every frame, never mutated after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionPoint {
    /// Lateral position in meters (left of boresight is positive).
    pub x: f32,
    /// Forward position in meters.
    pub y: f32,
    /// Radial (doppler) velocity in m/s; negative toward the sensor.
    pub velocity: f32,
    /// Signal-to-noise ratio in dB.
    pub snr_db: f32,
    /// Noise floor in dB, when a side-info block supplied it.
    pub noise_db: Option<f32>,
}

/// One record from the device-side tracker's target list.
///
/// Decoded for visualization parity with the sensor demo; the software
/// tracker in this crate does not consume it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorTarget {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub ax: f32,
    pub ay: f32,
    /// Row-major 3x3 error covariance reported by the device.
    pub covariance: [f32; 9],
    /// Device filter gain.
    pub gain: f32,
}

/// Everything one frame's blocks produced, including per-block faults.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub points: Vec<DetectionPoint>,
    pub targets: Vec<SensorTarget>,
    /// Blocks dropped as malformed. Never fatal to the frame.
    pub errors: Vec<BlockError>,
    /// True when side-info enrichment was skipped over a length mismatch.
    pub enrichment_skipped: bool,
}

/// Extract detection points and targets from a frame's blocks.
///
/// Order of returned points follows block order; downstream stages do not
/// depend on it.
pub fn extract(frame: &RawFrame) -> Extraction {
    let mut out = Extraction::default();
    let mut side_info: Option<Vec<(f32, f32)>> = None;

    for block in frame.blocks() {
        let block = match block {
            Ok(b) => b,
            Err(e) => {
                out.errors.push(e);
                continue;
            }
        };

        match block.tlv_type {
            TlvType::PointCloud => match decode_points(block.payload) {
                Ok(points) => out.points.extend(points),
                Err(e) => out.errors.push(e),
            },
            TlvType::TargetList => match decode_targets(block.payload) {
                Ok(targets) => out.targets.extend(targets),
                Err(e) => out.errors.push(e),
            },
            TlvType::SideInfo => match decode_side_info(block.payload) {
                Ok(info) => side_info = Some(info),
                Err(e) => out.errors.push(e),
            },
            // Per-point track indices from the device tracker; unused here.
            TlvType::TargetIndex => {}
            TlvType::Unknown(tag) => {
                debug!(tag, "skipping unrecognized block type");
            }
        }
    }

    if let Some(info) = side_info {
        if info.len() == out.points.len() {
            for (point, (snr, noise)) in out.points.iter_mut().zip(info) {
                point.snr_db = snr;
                point.noise_db = Some(noise);
            }
        } else {
            debug!(
                points = out.points.len(),
                side_info = info.len(),
                "side-info length mismatch, enrichment skipped"
            );
            out.enrichment_skipped = true;
        }
    }

    out
}

fn decode_points(payload: &[u8]) -> Result<Vec<DetectionPoint>, BlockError> {
    if payload.len() % POINT_RECORD_LEN != 0 {
        return Err(BlockError::MalformedBlock {
            tlv_type: TlvType::PointCloud.raw(),
            record: POINT_RECORD_LEN,
            got: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(POINT_RECORD_LEN)
        .map(|rec| {
            let range = LittleEndian::read_f32(&rec[0..4]);
            let azimuth = LittleEndian::read_f32(&rec[4..8]);
            let doppler = LittleEndian::read_f32(&rec[8..12]);
            let snr = LittleEndian::read_f32(&rec[12..16]);
            DetectionPoint {
                // Sensor convention: azimuth measured from boresight,
                // positive toward negative x.
                x: -range * azimuth.sin(),
                y: range * azimuth.cos(),
                velocity: doppler,
                snr_db: snr,
                noise_db: None,
            }
        })
        .collect())
}

fn decode_targets(payload: &[u8]) -> Result<Vec<SensorTarget>, BlockError> {
    if payload.len() % TARGET_RECORD_LEN != 0 {
        return Err(BlockError::MalformedBlock {
            tlv_type: TlvType::TargetList.raw(),
            record: TARGET_RECORD_LEN,
            got: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(TARGET_RECORD_LEN)
        .map(|rec| {
            let mut covariance = [0.0f32; 9];
            for (i, c) in covariance.iter_mut().enumerate() {
                *c = LittleEndian::read_f32(&rec[28 + i * 4..32 + i * 4]);
            }
            SensorTarget {
                id: LittleEndian::read_u32(&rec[0..4]),
                x: LittleEndian::read_f32(&rec[4..8]),
                y: LittleEndian::read_f32(&rec[8..12]),
                vx: LittleEndian::read_f32(&rec[12..16]),
                vy: LittleEndian::read_f32(&rec[16..20]),
                ax: LittleEndian::read_f32(&rec[20..24]),
                ay: LittleEndian::read_f32(&rec[24..28]),
                covariance,
                gain: LittleEndian::read_f32(&rec[64..68]),
            }
        })
        .collect())
}

fn decode_side_info(payload: &[u8]) -> Result<Vec<(f32, f32)>, BlockError> {
    if payload.len() % SIDE_INFO_RECORD_LEN != 0 {
        return Err(BlockError::MalformedBlock {
            tlv_type: TlvType::SideInfo.raw(),
            record: SIDE_INFO_RECORD_LEN,
            got: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(SIDE_INFO_RECORD_LEN)
        .map(|rec| {
            let snr = LittleEndian::read_i16(&rec[0..2]) as f32 * 0.1;
            let noise = LittleEndian::read_i16(&rec[2..4]) as f32 * 0.1;
            (snr, noise)
        })
        .collect())
}
