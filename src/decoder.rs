//! Frame reconstruction from the raw byte stream.
//!
//! [`FrameDecoder`] wraps any [`std::io::Read`] (in production a serial
//! port handle configured with a read timeout) and yields one complete
//! [`RawFrame`] at a time. The serial link is unreliable: the decoder
//! resynchronizes on the frame magic after garbage, truncated frames, and
//! corrupt length fields, and none of those faults ever abort the stream.
//! Faults are tallied in [`DecodeStats`] instead.

use std::io::{self, Read};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::protocol::{FrameHeader, RawFrame, FRAME_HEADER_LEN, FRAME_MAGIC, MAX_FRAME_LEN};

const READ_CHUNK: usize = 4096;

/// Running counts of tolerated stream faults. This is the diagnostics
/// channel: recoverable errors land here and in the log, never in the
/// frame flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Complete frames delivered downstream.
    pub frames: u64,
    /// Bytes dropped while resynchronizing.
    pub bytes_discarded: u64,
    /// Desync events: garbage before the magic, or a truncated frame.
    pub framing_errors: u64,
    /// Frames rejected for an insane declared length.
    pub corrupt_frames: u64,
    /// Read timeouts (idle cycles).
    pub timeouts: u64,
}

/// Pull-based frame source over an unbounded byte stream.
pub struct FrameDecoder<R> {
    source: R,
    buf: Vec<u8>,
    stats: DecodeStats,
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: Vec::with_capacity(MAX_FRAME_LEN),
            stats: DecodeStats::default(),
        }
    }

    /// Fault counters accumulated so far.
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Pull the next complete frame from the stream.
    ///
    /// Blocks only on the underlying read, up to its configured timeout.
    /// Returns `Ok(None)` for an idle cycle (timeout with no complete
    /// frame) so the caller can run cancellation checks between frames.
    /// `Err` is terminal: the stream closed or failed.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, DecodeError> {
        loop {
            match self.poll_buffered() {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(DecodeError::Framing { scanned }) => {
                    self.stats.framing_errors += 1;
                    debug!(scanned, "resynchronizing after framing error");
                    continue;
                }
                Err(DecodeError::CorruptFrame { declared, .. }) => {
                    self.stats.corrupt_frames += 1;
                    warn!(declared, "dropping frame with corrupt declared length");
                    continue;
                }
                Err(other) => return Err(other),
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.source.read(&mut chunk) {
                Ok(0) => return Err(DecodeError::StreamClosed),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    self.stats.timeouts += 1;
                    self.abandon_partial();
                    return Ok(None);
                }
                Err(e) => return Err(DecodeError::Io(e)),
            }
        }
    }

    /// One extraction attempt against the internal buffer, no reads.
    ///
    /// `Ok(None)` means more bytes are needed. Recoverable faults surface
    /// as [`DecodeError::Framing`] / [`DecodeError::CorruptFrame`] after
    /// the offending bytes have been discarded, so the caller can tally
    /// the reason and simply try again.
    fn poll_buffered(&mut self) -> Result<Option<RawFrame>, DecodeError> {
        if !self.buf.starts_with(&FRAME_MAGIC) {
            match find_magic(&self.buf, 0) {
                Some(pos) => {
                    self.discard(pos);
                    return Err(DecodeError::Framing { scanned: pos });
                }
                None => {
                    // Keep a tail that could be a magic prefix split
                    // across reads; everything before it is garbage.
                    if self.buf.len() >= FRAME_MAGIC.len() {
                        let drop = self.buf.len() - (FRAME_MAGIC.len() - 1);
                        self.discard(drop);
                        return Err(DecodeError::Framing { scanned: drop });
                    }
                    return Ok(None);
                }
            }
        }

        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let header = FrameHeader::parse(&self.buf);
        let total = header.total_len as usize;
        if total < FRAME_HEADER_LEN || total > MAX_FRAME_LEN {
            self.discard(FRAME_MAGIC.len());
            return Err(DecodeError::CorruptFrame {
                declared: header.total_len,
                min: FRAME_HEADER_LEN as u32,
                max: MAX_FRAME_LEN as u32,
            });
        }

        // A magic word inside the declared extent may mean the frame was
        // cut short and a new frame already started. The payload can also
        // contain those eight bytes by coincidence, so only resync to a
        // candidate whose own header parses with a sane declared length.
        let scan_end = self.buf.len().min(total);
        let mut from = 1;
        while let Some(pos) = find_magic(&self.buf[..scan_end], from) {
            if self.buf.len() < pos + FRAME_HEADER_LEN {
                if self.buf.len() < total {
                    // Not enough bytes to judge the candidate and the
                    // current frame is incomplete anyway; read more.
                    return Ok(None);
                }
                break;
            }
            let candidate = FrameHeader::parse(&self.buf[pos..]);
            let candidate_len = candidate.total_len as usize;
            if (FRAME_HEADER_LEN..=MAX_FRAME_LEN).contains(&candidate_len) {
                self.discard(pos);
                return Err(DecodeError::Framing { scanned: pos });
            }
            from = pos + 1;
        }

        if self.buf.len() < total {
            return Ok(None);
        }

        let body = self.buf[FRAME_HEADER_LEN..total].to_vec();
        self.buf.drain(..total);
        self.stats.frames += 1;
        Ok(Some(RawFrame { header, body }))
    }

    /// A timeout while a frame is pending means its remainder is not
    /// coming. Drop the sync byte so the next scan moves past it.
    fn abandon_partial(&mut self) {
        if self.buf.starts_with(&FRAME_MAGIC) {
            self.stats.framing_errors += 1;
            self.discard(1);
        }
    }

    fn discard(&mut self, n: usize) {
        self.stats.bytes_discarded += n as u64;
        self.buf.drain(..n);
    }
}

fn find_magic(buf: &[u8], from: usize) -> Option<usize> {
    if buf.len() < from + FRAME_MAGIC.len() {
        return None;
    }
    buf[from..]
        .windows(FRAME_MAGIC.len())
        .position(|w| w == FRAME_MAGIC)
        .map(|p| p + from)
}
