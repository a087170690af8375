/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Decodes Presentation Graphics Stream (PGS) subtitles into timed captions.
//!
//! # Overview
//!
//! PGS is the subtitle format used by Blu-ray discs. Rather than carrying text, it carries
//! palette-indexed, run-length encoded bitmaps along with the timing needed to composite them
//! onto the video. This crate turns such a bitstream into a list of [`Caption`] values, each of
//! which can render itself into an RGBA image for downstream processing such as OCR.
//!
//! Two forms of input are supported:
//!
//! - A standalone `.sup` stream where every segment has a 13-byte header that includes its own
//!   PTS. Use [`decode_stream`] or [`decode_reader`].
//! - Segment data demuxed from a container, where each block carries 3-byte segment headers
//!   and the container supplies the timing. Use [`BlockSequencer`], or drive [`decode_block`]
//!   directly with a caller-owned [`DecodeContext`].
//!
//! All timestamps are expressed in 90 kHz ticks.

pub mod bitmap;
pub mod block;
pub mod caption;
pub mod decoder;
pub mod merge;
pub mod palette;
pub mod segment;

#[cfg(test)]
mod testutil;

pub use block::BlockSequencer;
pub use caption::{Caption, CompositionObject, ObjectFragment};
pub use decoder::{
    decode_block,
    decode_reader,
    decode_stream,
    DecodeContext,
    DecodeError,
    DecodeOptions,
    DecodeResult,
};
pub use palette::{Palette, PaletteBatch};
pub use segment::CompositionState;

/// The number of PGS clock ticks in one millisecond.
pub const TICKS_PER_MILLISECOND: u32 = 90;

/// Converts 90 kHz ticks into whole milliseconds.
pub fn ticks_to_millis(ticks: u32) -> u64 {
    ticks as u64 / TICKS_PER_MILLISECOND as u64
}

/// Converts milliseconds into 90 kHz ticks, saturating at the largest representable tick.
pub fn millis_to_ticks(millis: u64) -> u32 {
    millis
        .saturating_mul(TICKS_PER_MILLISECOND as u64)
        .min(u32::MAX as u64) as u32
}

/// Formats a tick count as `HH:MM:SS.mmm`.
pub fn ts_to_timestamp(ts: u32) -> String {

    let ms = ticks_to_millis(ts);

    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        ms / 60_000 % 60,
        ms / 1_000 % 60,
        ms % 1_000,
    )
}
