//! Error types for stream decoding and block extraction.

use thiserror::Error;

/// Errors raised while reconstructing frames from the byte stream.
///
/// Only [`DecodeError::StreamClosed`] and [`DecodeError::Io`] are terminal;
/// the framing and corruption variants are resolved internally by
/// resynchronization and surface only through
/// [`DecodeStats`](crate::decoder::DecodeStats).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame magic not found within the resync lookahead.
    #[error("stream desync: no frame magic within {scanned} bytes")]
    Framing { scanned: usize },

    /// Declared packet length fails sanity bounds.
    #[error("corrupt frame: declared length {declared} outside {min}..={max}")]
    CorruptFrame { declared: u32, min: u32, max: u32 },

    /// The underlying stream reached end of input.
    #[error("input stream closed")]
    StreamClosed,

    /// Unrecoverable I/O failure on the underlying stream.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors scoped to a single TLV block within an otherwise valid frame.
///
/// Never fatal: the affected block's contents are dropped and the rest of
/// the frame still produces points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Block payload size is not a whole number of records.
    #[error("malformed block type {tlv_type}: {got} payload bytes, expected multiple of {record}")]
    MalformedBlock {
        tlv_type: u32,
        record: usize,
        got: usize,
    },

    /// Block header or declared length runs past the end of the frame body.
    #[error("block type {tlv_type} overruns frame body at offset {offset}")]
    Overrun { tlv_type: u32, offset: usize },
}
