/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! The unit of output: one timed caption and the raw material needed to render it.


use super::{
    bitmap::{compose, ObjectImage},
    palette::{Palette, PaletteBatch},
    segment::{
        CompositionObjectEntry,
        CompositionState,
        Crop,
        ObjectDefinitionSegment,
        PresentationCompositionSegment,
    },
    ticks_to_millis,
};
use image::RgbaImage;
use std::borrow::Cow;

/// One object placement within a caption's frame.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct CompositionObject {
    pub object_id: u16,
    pub window_id: u8,
    pub forced: bool,
    pub x: u16,
    pub y: u16,
    /// Parsed but not applied when rendering.
    pub crop: Option<Crop>,
}

impl From<CompositionObjectEntry> for CompositionObject {
    fn from(entry: CompositionObjectEntry) -> Self {
        CompositionObject {
            object_id: entry.object_id,
            window_id: entry.window_id,
            forced: entry.forced,
            x: entry.x,
            y: entry.y,
            crop: entry.crop,
        }
    }
}

/// A piece of RLE data belonging to one object.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ObjectFragment {
    pub object_id: u16,
    pub version: u8,
    pub is_first: bool,
    pub is_last: bool,
    /// Width and height, carried only by the first fragment of an object.
    pub size: Option<(u16, u16)>,
    pub data: Vec<u8>,
}

impl From<ObjectDefinitionSegment> for ObjectFragment {
    fn from(ods: ObjectDefinitionSegment) -> Self {
        ObjectFragment {
            object_id: ods.id,
            version: ods.version,
            is_first: ods.first_in_sequence,
            is_last: ods.last_in_sequence,
            size: ods.size,
            data: ods.data,
        }
    }
}

/// The fragments collected for one composition object, in arrival order.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ObjectBitmap {
    pub object_id: u16,
    pub x: u16,
    pub y: u16,
    pub fragments: Vec<ObjectFragment>,
}

impl ObjectBitmap {

    /// The declared width and height of the object.
    pub fn size(&self) -> Option<(u16, u16)> {
        self.fragments.first().and_then(|fragment| fragment.size)
    }

    /// The complete RLE data of the object.
    pub fn data(&self) -> Cow<'_, [u8]> {
        match self.fragments.as_slice() {
            [] => Cow::Borrowed(&[]),
            [single] => Cow::Borrowed(&single.data),
            many => Cow::Owned(many.iter().flat_map(|f| f.data.iter().copied()).collect()),
        }
    }

    /// Replaces multiple fragments with a single one holding all of their data.
    pub fn coalesce(&mut self) {

        if self.fragments.len() < 2 {
            return
        }

        let data = self.data().into_owned();
        let is_last = self.fragments.last().map_or(false, |fragment| fragment.is_last);

        self.fragments.truncate(1);

        let first = &mut self.fragments[0];

        first.data = data;
        first.is_last = is_last;
    }
}

/// A decoded caption.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct Caption {
    pub composition_number: u16,
    pub composition_state: CompositionState,
    /// When the caption appears, in 90 kHz ticks.
    pub start_ticks: u32,
    /// When the caption disappears, in 90 kHz ticks.
    pub end_ticks: u32,
    pub frame_width: u16,
    pub frame_height: u16,
    pub palette_id: u8,
    pub palette_update: bool,
    pub objects: Vec<CompositionObject>,
    /// Every palette definition for `palette_id` in effect when the caption completed, oldest
    /// first.
    pub palette_batches: Vec<PaletteBatch>,
    /// Objects that had data when the caption completed, in composition order.
    pub bitmaps: Vec<ObjectBitmap>,
}

impl From<PresentationCompositionSegment> for Caption {
    fn from(pcs: PresentationCompositionSegment) -> Self {
        Caption {
            composition_number: pcs.composition_number,
            composition_state: pcs.composition_state,
            start_ticks: pcs.pts,
            end_ticks: 0,
            frame_width: pcs.width,
            frame_height: pcs.height,
            palette_id: pcs.palette_id,
            palette_update: pcs.palette_update,
            objects: pcs.composition_objects.into_iter().map(CompositionObject::from).collect(),
            palette_batches: Vec::new(),
            bitmaps: Vec::new(),
        }
    }
}

impl Caption {

    /// Whether any object must be shown even when subtitles are turned off.
    pub fn is_forced(&self) -> bool {
        self.objects.iter().any(|object| object.forced)
    }

    /// The top-left corner of the area covered by the caption's objects.
    pub fn position(&self) -> (u16, u16) {
        (
            self.objects.iter().map(|object| object.x).min().unwrap_or(0),
            self.objects.iter().map(|object| object.y).min().unwrap_or(0),
        )
    }

    pub fn start_ms(&self) -> u64 {
        ticks_to_millis(self.start_ticks)
    }

    pub fn end_ms(&self) -> u64 {
        ticks_to_millis(self.end_ticks)
    }

    /// How long the caption is displayed, in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        ticks_to_millis(self.end_ticks.saturating_sub(self.start_ticks))
    }

    /// Resolves the caption's palette.
    pub fn palette(&self) -> Palette {
        Palette::from_batches(&self.palette_batches)
    }

    /// Coalesces the fragments of every object.
    pub fn coalesce(&mut self) {
        for bitmap in self.bitmaps.iter_mut() {
            bitmap.coalesce();
        }
    }

    /// Whether both captions carry byte-for-byte identical object data.
    pub fn same_bitmap_data(&self, other: &Caption) -> bool {
        !self.bitmaps.is_empty()
            && self.bitmaps.len() == other.bitmaps.len()
            && self.bitmaps.iter().zip(other.bitmaps.iter()).all(|(a, b)| {
                a.fragments.len() == b.fragments.len()
                    && a.fragments.iter().zip(b.fragments.iter()).all(|(fa, fb)| {
                        fa.data == fb.data
                    })
            })
    }

    /// Renders the caption into an RGBA image.
    ///
    /// The image covers exactly the union of the caption's objects. A caption without object
    /// data renders as an empty image.
    pub fn render_bitmap(&self) -> RgbaImage {

        let palette = self.palette();
        let objects = self.bitmaps.iter().filter_map(|bitmap| {
            bitmap.size().map(|(width, height)| {
                ObjectImage {
                    x: bitmap.x,
                    y: bitmap.y,
                    width,
                    height,
                    data: bitmap.data(),
                }
            })
        }).collect::<Vec<_>>();

        compose(&objects, &palette)
    }
}
