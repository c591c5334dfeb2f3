//! Wire-format types for the radar's framed binary protocol.
//!
//! The sensor streams frames over UART. Each frame starts with an 8-byte
//! magic word, followed by a fixed 52-byte header, followed by `num_tlvs`
//! TLV blocks. All multi-byte fields are little-endian and must stay
//! bit-exact for interoperability with the physical device.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     Magic 02 01 04 03 06 05 08 07
//! 8       4     Version
//! 12      4     Platform
//! 16      4     Device timestamp (ticks)
//! 20      4     Total packet length (bytes, incl. header)
//! 24      4     Frame number
//! 28      4     Subframe number
//! 32      4     Chirp processing margin
//! 36      4     Frame processing margin
//! 40      4     UART sent time
//! 44      4     Track processing time
//! 48      2     Number of TLVs
//! 50      2     Checksum
//! ```
//!
//! A TLV block is a `u32` type tag plus a `u32` length; the declared length
//! includes the 8-byte TLV header itself.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::BlockError;

/// Frame sync word, byte-exact as emitted by the sensor firmware.
pub const FRAME_MAGIC: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Fixed frame header size, magic included.
pub const FRAME_HEADER_LEN: usize = 52;

/// TLV header size (type tag + declared length).
pub const TLV_HEADER_LEN: usize = 8;

/// Sanity bound on a declared frame length. Matches the receive buffer the
/// device-side demo assumes; anything larger is a corrupt header.
pub const MAX_FRAME_LEN: usize = 32 * 1024;

/// Decoded fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub version: u32,
    pub platform: u32,
    /// Device-side timestamp in firmware ticks.
    pub device_time: u32,
    /// Total packet length in bytes, header included.
    pub total_len: u32,
    pub frame_number: u32,
    pub subframe_number: u32,
    pub chirp_margin: u32,
    pub frame_margin: u32,
    pub uart_sent_time: u32,
    pub track_process_time: u32,
    pub num_tlvs: u16,
    pub checksum: u16,
}

impl FrameHeader {
    /// Parse a header from a buffer that begins at the magic word.
    ///
    /// The caller guarantees at least [`FRAME_HEADER_LEN`] bytes and a
    /// verified magic; this only reads the fixed fields.
    pub fn parse(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= FRAME_HEADER_LEN);
        FrameHeader {
            version: LittleEndian::read_u32(&buf[8..12]),
            platform: LittleEndian::read_u32(&buf[12..16]),
            device_time: LittleEndian::read_u32(&buf[16..20]),
            total_len: LittleEndian::read_u32(&buf[20..24]),
            frame_number: LittleEndian::read_u32(&buf[24..28]),
            subframe_number: LittleEndian::read_u32(&buf[28..32]),
            chirp_margin: LittleEndian::read_u32(&buf[32..36]),
            frame_margin: LittleEndian::read_u32(&buf[36..40]),
            uart_sent_time: LittleEndian::read_u32(&buf[40..44]),
            track_process_time: LittleEndian::read_u32(&buf[44..48]),
            num_tlvs: LittleEndian::read_u16(&buf[48..50]),
            checksum: LittleEndian::read_u16(&buf[50..52]),
        }
    }
}

/// Type tag of a TLV block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlvType {
    /// 2D point cloud: 16-byte records of range/azimuth/doppler/snr.
    PointCloud,
    /// Device-side tracker output: 68-byte target records.
    TargetList,
    /// Per-point target index bytes.
    TargetIndex,
    /// Per-point side info: snr/noise in 0.1 dB units.
    SideInfo,
    /// Unrecognized tag; skipped, never fatal.
    Unknown(u32),
}

impl From<u32> for TlvType {
    fn from(raw: u32) -> Self {
        match raw {
            6 => TlvType::PointCloud,
            7 => TlvType::TargetList,
            8 => TlvType::TargetIndex,
            9 => TlvType::SideInfo,
            other => TlvType::Unknown(other),
        }
    }
}

impl TlvType {
    /// The on-wire tag value.
    pub fn raw(self) -> u32 {
        match self {
            TlvType::PointCloud => 6,
            TlvType::TargetList => 7,
            TlvType::TargetIndex => 8,
            TlvType::SideInfo => 9,
            TlvType::Unknown(other) => other,
        }
    }
}

/// One complete frame as reconstructed from the byte stream: the decoded
/// header plus the TLV region that follows it.
///
/// Never partially delivered: the decoder only yields a `RawFrame` once
/// exactly `total_len` bytes have been consumed.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: FrameHeader,
    /// Frame body after the 52-byte header; holds the TLV blocks.
    pub body: Vec<u8>,
}

impl RawFrame {
    /// Walk the TLV blocks of this frame.
    ///
    /// A block whose header or declared length overruns the body yields a
    /// [`BlockError`] and ends the walk; earlier blocks are unaffected.
    pub fn blocks(&self) -> BlockIter<'_> {
        BlockIter {
            body: &self.body,
            offset: 0,
            remaining: self.header.num_tlvs,
        }
    }
}

/// One decoded TLV block, borrowing its payload from the owning frame.
#[derive(Debug, Clone, Copy)]
pub struct TlvBlock<'a> {
    pub tlv_type: TlvType,
    /// Payload bytes, TLV header stripped.
    pub payload: &'a [u8],
}

/// Iterator over the TLV blocks of a frame body.
pub struct BlockIter<'a> {
    body: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = Result<TlvBlock<'a>, BlockError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if self.offset + TLV_HEADER_LEN > self.body.len() {
            self.remaining = 0;
            return Some(Err(BlockError::Overrun {
                tlv_type: 0,
                offset: self.offset,
            }));
        }

        let raw_type = LittleEndian::read_u32(&self.body[self.offset..self.offset + 4]);
        let declared = LittleEndian::read_u32(&self.body[self.offset + 4..self.offset + 8]) as usize;

        // Declared length covers the TLV header itself.
        if declared < TLV_HEADER_LEN || self.offset + declared > self.body.len() {
            self.remaining = 0;
            return Some(Err(BlockError::Overrun {
                tlv_type: raw_type,
                offset: self.offset,
            }));
        }

        let payload = &self.body[self.offset + TLV_HEADER_LEN..self.offset + declared];
        self.offset += declared;

        Some(Ok(TlvBlock {
            tlv_type: raw_type.into(),
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_header(total_len: u32, frame_number: u32, num_tlvs: u16) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN);
        buf.extend_from_slice(&FRAME_MAGIC);
        buf.extend_from_slice(&0x0102_0304u32.to_le_bytes()); // version
        buf.extend_from_slice(&0x000A_6843u32.to_le_bytes()); // platform
        buf.extend_from_slice(&12345u32.to_le_bytes()); // device time
        buf.extend_from_slice(&total_len.to_le_bytes());
        buf.extend_from_slice(&frame_number.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // subframe
        buf.extend_from_slice(&7u32.to_le_bytes()); // chirp margin
        buf.extend_from_slice(&8u32.to_le_bytes()); // frame margin
        buf.extend_from_slice(&9u32.to_le_bytes()); // uart sent time
        buf.extend_from_slice(&10u32.to_le_bytes()); // track process time
        buf.extend_from_slice(&num_tlvs.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // checksum
        buf
    }

    fn tlv(raw_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&raw_type.to_le_bytes());
        buf.extend_from_slice(&((payload.len() + TLV_HEADER_LEN) as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn header_fields_parse_in_order() {
        let buf = build_header(128, 42, 3);
        let header = FrameHeader::parse(&buf);
        assert_eq!(header.total_len, 128);
        assert_eq!(header.frame_number, 42);
        assert_eq!(header.num_tlvs, 3);
        assert_eq!(header.device_time, 12345);
        assert_eq!(header.chirp_margin, 7);
        assert_eq!(header.track_process_time, 10);
    }

    #[test]
    fn block_walk_yields_each_tlv() {
        let mut body = Vec::new();
        body.extend_from_slice(&tlv(6, &[1, 2, 3, 4]));
        body.extend_from_slice(&tlv(250, &[9]));

        let frame = RawFrame {
            header: FrameHeader::parse(&build_header(0, 0, 2)),
            body,
        };

        let blocks: Vec<_> = frame.blocks().collect();
        assert_eq!(blocks.len(), 2);

        let first = blocks[0].as_ref().unwrap();
        assert_eq!(first.tlv_type, TlvType::PointCloud);
        assert_eq!(first.payload, &[1, 2, 3, 4]);

        let second = blocks[1].as_ref().unwrap();
        assert_eq!(second.tlv_type, TlvType::Unknown(250));
    }

    #[test]
    fn overrunning_block_stops_the_walk() {
        let mut body = Vec::new();
        body.extend_from_slice(&tlv(6, &[0; 4]));
        // Second block declares more bytes than the body holds.
        body.extend_from_slice(&7u32.to_le_bytes());
        body.extend_from_slice(&500u32.to_le_bytes());

        let frame = RawFrame {
            header: FrameHeader::parse(&build_header(0, 0, 3)),
            body,
        };

        let blocks: Vec<_> = frame.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_ok());
        assert!(matches!(
            blocks[1],
            Err(BlockError::Overrun { tlv_type: 7, .. })
        ));
    }

    #[test]
    fn tlv_type_round_trips_raw_values() {
        for raw in [6u32, 7, 8, 9, 1020] {
            assert_eq!(TlvType::from(raw).raw(), raw);
        }
    }
}
