/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Times captions carried in container blocks.
//!
//! A container such as Matroska delivers PGS data in blocks, each with its own start and end
//! time, and with 3-byte segment headers that carry no timestamps. A display set may also be
//! split across several blocks. [`BlockSequencer`] buffers block data until a display set is
//! complete, decodes it, and assigns the block's times to the captions it yields.


use super::{
    caption::Caption,
    decoder::{decode_block, DecodeContext, DecodeOptions},
    merge::merge_redundant,
    segment::SegmentKind,
};
use std::io::Cursor;
use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, warn};

/// Blocks this small carry no segments and only mark the end of the caption before them.
pub const MAX_EMPTY_BLOCK_SIZE: usize = 2;

/// An open caption is never stretched past this many ticks by an empty block.
pub const MAX_OPEN_SPAN_TICKS: u32 = 1_000_000;

/// Whether the block-framed data contains an End Segment.
///
/// Only segment headers are inspected; payload bytes are skipped using each header's size.
pub fn contains_end_segment(data: &[u8]) -> bool {

    let mut input = Cursor::new(data);

    while input.position() as usize + 3 <= data.len() {

        let kind = input.read_u8().map(SegmentKind::from);
        let size = input.read_u16::<BigEndian>();

        match (kind, size) {
            (Ok(SegmentKind::End), _) => return true,
            (Ok(_), Ok(size)) => input.set_position(input.position() + size as u64),
            _ => return false,
        }
    }

    false
}

/// Decodes captions from a sequence of container blocks.
#[derive(Debug, Default)]
pub struct BlockSequencer {
    options: DecodeOptions,
    context: DecodeContext,
    pending: Vec<u8>,
    captions: Vec<Caption>,
}

impl BlockSequencer {

    pub fn new(options: DecodeOptions) -> Self {
        BlockSequencer {
            options,
            ..Default::default()
        }
    }

    /// Feeds the data of one block along with its start and end times in ticks.
    pub fn push_block(&mut self, data: &[u8], start_ticks: u32, end_ticks: u32) {

        if data.len() <= MAX_EMPTY_BLOCK_SIZE {
            self.close_open_caption(start_ticks, true);
            return
        }

        self.pending.extend_from_slice(data);

        if !contains_end_segment(&self.pending) {
            return
        }

        self.close_open_caption(start_ticks, false);

        let pending = std::mem::take(&mut self.pending);
        let decoded = match decode_block(&pending, &mut self.context) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("Discarded block data at {}: {}", start_ticks, err);
                return
            }
        };

        debug!("Block at {} yielded {} captions", start_ticks, decoded.len());

        if !decoded.is_empty() {
            if let Some(previous) = self.captions.last_mut() {
                if previous.end_ticks > start_ticks {
                    previous.end_ticks = start_ticks.saturating_sub(1);
                }
            }
        }

        for mut caption in decoded {
            caption.start_ticks = start_ticks;
            caption.end_ticks = end_ticks;
            self.captions.push(caption);
        }
    }

    /// Merges redundant captions and returns everything decoded so far.
    pub fn finish(mut self) -> Vec<Caption> {

        if !self.pending.is_empty() {
            debug!("Dropped {} bytes of incomplete block data", self.pending.len());
        }

        merge_redundant(&mut self.captions, &self.options);

        self.captions
    }

    /// Ends the last caption at `ticks` if it has no end yet.
    fn close_open_caption(&mut self, ticks: u32, limit: bool) {
        if let Some(last) = self.captions.last_mut() {
            if last.start_ticks == last.end_ticks {
                if limit && ticks.saturating_sub(last.start_ticks) > MAX_OPEN_SPAN_TICKS {
                    return
                }
                last.end_ticks = ticks;
            }
        }
    }
}
