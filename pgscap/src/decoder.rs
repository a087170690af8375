/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Assembles segments into captions.
//!
//! # Overview
//!
//! Each PCS opens a caption. The palette and object segments that follow it are collected
//! until the next PCS or an End Segment, at which point the open caption is checked for
//! completeness. A complete caption has at least one composition object, a palette for its
//! palette ID, and data for at least one of its objects. A caption without composition objects
//! clears the screen; it only serves to end the caption before it and is then discarded.
//!
//! Palette and object state persists across display sets until an epoch starts. When decoding
//! container blocks one display set at a time, that state lives in a [`DecodeContext`] owned by
//! the caller.

#[cfg(test)]
mod tests;

use super::{
    caption::{Caption, ObjectBitmap, ObjectFragment},
    merge::merge_redundant,
    palette::PaletteBatch,
    segment::{
        CompositionState,
        Framing,
        ObjectDefinitionSegment,
        PaletteDefinitionSegment,
        ReadError as SegmentReadError,
        ReadSegmentExt,
        Segment,
        WindowDefinitionSegment,
    },
};
use std::{
    collections::BTreeMap,
    io::Read,
};
use log::{debug, warn};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// The error type for decoding operations.
///
/// Problems within a segment's payload never surface here; the segment is skipped instead.
#[derive(ThisError, Debug)]
pub enum DecodeError {
    /// The input could not be framed into segments at all.
    #[error("could not read segment")]
    SegmentError {
        #[from]
        source: SegmentReadError,
    },
}

/// Settings that affect how a decoded caption list is post-processed.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DecodeOptions {
    /// Disables merging of redundant captions.
    pub skip_merge: bool,
    /// Merges every group of redundant captions without checking whether it qualifies. This
    /// takes precedence over `skip_merge`.
    pub force_merge_all: bool,
}

/// Palette and object state carried between calls to [`decode_block`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodeContext {
    palettes: BTreeMap<u8, Vec<PaletteBatch>>,
    objects: BTreeMap<u16, Vec<ObjectFragment>>,
}

impl DecodeContext {

    pub fn new() -> Self {
        Self::default()
    }

    /// The palette definitions carried for a palette ID, oldest first.
    pub fn palette_batches(&self, palette_id: u8) -> Option<&[PaletteBatch]> {
        self.palettes.get(&palette_id).map(Vec::as_slice)
    }

    /// The fragments carried for an object ID, in arrival order.
    pub fn object_fragments(&self, object_id: u16) -> Option<&[ObjectFragment]> {
        self.objects.get(&object_id).map(Vec::as_slice)
    }

    /// Forgets all palette and object state.
    pub fn clear(&mut self) {
        self.palettes.clear();
        self.objects.clear();
    }
}

/// Decodes a standalone PGS stream.
///
/// The stream is decoded with fresh state, and redundant captions are merged according to
/// `options` before returning.
pub fn decode_stream(bytes: &[u8], options: &DecodeOptions) -> DecodeResult<Vec<Caption>> {
    decode_reader(bytes, options)
}

/// Decodes a standalone PGS stream from a reader.
pub fn decode_reader<R: Read>(mut input: R, options: &DecodeOptions) -> DecodeResult<Vec<Caption>> {

    let mut context = DecodeContext::new();
    let mut captions = decode_segments(&mut input, Framing::Stored, &mut context)?;

    merge_redundant(&mut captions, options);

    Ok(captions)
}

/// Decodes the segments of one container block.
///
/// Segments use block framing, so every caption's `start_ticks` is zero; the caller assigns
/// times from the container. State needed by later blocks is kept in `context`. Redundant
/// captions are not merged.
pub fn decode_block(bytes: &[u8], context: &mut DecodeContext) -> DecodeResult<Vec<Caption>> {
    let mut input = bytes;
    decode_segments(&mut input, Framing::Block, context)
}

fn decode_segments<R: Read>(
    input: &mut R,
    framing: Framing,
    context: &mut DecodeContext,
) -> DecodeResult<Vec<Caption>> {

    let mut assembler = Assembler::new(context);
    let mut index = 0usize;

    loop {

        let segment = input.read_raw_segment(framing).and_then(|raw| match raw {
            Some(raw) => raw.parse_forcing_first(assembler.force_first).map(Some),
            None => Ok(None),
        });

        match segment {
            Ok(Some(segment)) => assembler.handle(segment),
            Ok(None) => break,
            Err(err) if !err.is_desync() => {
                warn!("Skipped segment {}: {}", index, err);
            }
            Err(err) if index == 0 || matches!(err, SegmentReadError::IoError { .. }) => {
                return Err(err.into())
            }
            Err(err) => {
                warn!("Stopped decoding at segment {}: {}", index, err);
                break
            }
        }

        index += 1;
    }

    Ok(assembler.finish())
}

/// The composition state machine.
struct Assembler<'a> {
    context: &'a mut DecodeContext,
    /// Palettes defined during this invocation.
    palettes: BTreeMap<u8, Vec<PaletteBatch>>,
    open: Option<Caption>,
    captions: Vec<Caption>,
    /// The next ODS starts an object sequence whatever its flags say.
    force_first: bool,
}

impl<'a> Assembler<'a> {

    fn new(context: &'a mut DecodeContext) -> Self {
        Assembler {
            context,
            palettes: BTreeMap::new(),
            open: None,
            captions: Vec::new(),
            force_first: true,
        }
    }

    fn handle(&mut self, segment: Segment) {
        match segment {
            Segment::PresentationComposition(pcs) => {

                self.close();
                self.force_first = true;

                let caption = Caption::from(pcs);

                debug!(
                    "Composition {} at {}: {:?}, palette {}{}, {} objects",
                    caption.composition_number,
                    caption.start_ticks,
                    caption.composition_state,
                    caption.palette_id,
                    if caption.palette_update { " (update)" } else { "" },
                    caption.objects.len(),
                );

                if caption.composition_state == CompositionState::EpochStart {
                    self.palettes.clear();
                    self.context.clear();
                }

                if caption.start_ticks > 0 {
                    if let Some(last) = self.captions.last_mut() {
                        if last.end_ticks == 0 {
                            last.end_ticks = caption.start_ticks;
                        }
                    }
                }

                self.open = Some(caption);
            }
            Segment::PaletteDefinition(pds) => {
                self.handle_pds(pds);
            }
            Segment::ObjectDefinition(ods) => {
                self.force_first = false;
                self.handle_ods(ods);
            }
            Segment::WindowDefinition(wds) => {
                log_windows(&wds);
            }
            Segment::End(_) => {
                self.close();
                self.force_first = true;
            }
            Segment::Unknown(kind) => {
                debug!("Ignored segment of kind {:#04x}", kind);
            }
        }
    }

    fn handle_pds(&mut self, pds: PaletteDefinitionSegment) {

        let palette_update = match &self.open {
            Some(open) => open.palette_update,
            None => return,
        };

        if pds.entries.is_empty() {
            debug!("Ignored empty palette {}", pds.id);
            return
        }

        let batches = self.palettes.entry(pds.id).or_default();

        // A palette update revises the latest definition rather than adding one.
        if palette_update {
            batches.pop();
        }

        batches.push(PaletteBatch::from(pds));
    }

    fn handle_ods(&mut self, ods: ObjectDefinitionSegment) {

        match &self.open {
            Some(open) if !open.palette_update => {}
            _ => return,
        }

        let fragment = ObjectFragment::from(ods);

        if fragment.is_first {
            self.context.objects.insert(fragment.object_id, vec![fragment]);
        } else if let Some(fragments) = self.context.objects.get_mut(&fragment.object_id) {
            fragments.push(fragment);
        } else {
            debug!("Dropped fragment of unknown object {}", fragment.object_id);
        }
    }

    /// Completes the open caption, if any, and keeps it when it is complete.
    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            if let Some(caption) = self.complete(open) {
                self.captions.push(caption);
            }
        }
    }

    fn complete(&self, mut caption: Caption) -> Option<Caption> {

        if caption.composition_state == CompositionState::Invalid {
            return None
        }

        if caption.objects.is_empty() {
            return Some(caption)
        }

        let palettes = if self.palettes.is_empty() {
            &self.context.palettes
        } else {
            &self.palettes
        };

        caption.palette_batches = palettes.get(&caption.palette_id)?.clone();
        caption.bitmaps = caption.objects.iter().filter_map(|object| {
            self.context.objects.get(&object.object_id).map(|fragments| {
                ObjectBitmap {
                    object_id: object.object_id,
                    x: object.x,
                    y: object.y,
                    fragments: fragments.clone(),
                }
            })
        }).collect();

        if caption.bitmaps.is_empty() {
            None
        } else {
            Some(caption)
        }
    }

    fn finish(mut self) -> Vec<Caption> {

        self.close();

        let mut captions = self.captions;

        for i in 1..captions.len() {
            if captions[i - 1].end_ticks == 0 {
                captions[i - 1].end_ticks = captions[i].start_ticks;
            }
        }

        // Nothing follows the last caption; leave its span open for the caller to close.
        if let Some(last) = captions.last_mut() {
            if last.end_ticks == 0 {
                last.end_ticks = last.start_ticks;
            }
        }

        captions.retain(|caption| !caption.objects.is_empty());

        for caption in captions.iter_mut() {
            caption.coalesce();
        }

        if !self.palettes.is_empty() {
            self.context.palettes = self.palettes;
        }

        captions
    }
}

fn log_windows(wds: &WindowDefinitionSegment) {
    for window in wds.windows.iter() {
        debug!(
            "Window {}: x = {}, y = {}, width = {}, height = {}",
            window.id,
            window.x,
            window.y,
            window.width,
            window.height,
        );
    }
}
