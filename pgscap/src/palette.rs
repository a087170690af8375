/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Resolves palette definitions into RGBA lookup tables.


use super::segment::{PaletteDefinitionSegment, PaletteEntry};
use image::Rgba;
use log::debug;

/// Entries with an alpha below this value are forced to a neutral color.
///
/// Later stages that blend along transparency edges would otherwise pick up color fringes from
/// nearly invisible pixels.
pub const LOW_ALPHA_THRESHOLD: u8 = 14;

/// The slot that is always fully transparent.
pub const TRANSPARENT_SLOT: u8 = 0xFF;

/// One palette definition as collected by the decoder.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PaletteBatch {
    pub id: u8,
    pub version: u8,
    pub entries: Vec<PaletteEntry>,
}

impl From<PaletteDefinitionSegment> for PaletteBatch {
    fn from(pds: PaletteDefinitionSegment) -> Self {
        PaletteBatch {
            id: pds.id,
            version: pds.version,
            entries: pds.entries,
        }
    }
}

/// A 256-slot RGBA lookup table.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    slots: [Rgba<u8>; 256],
}

impl Default for Palette {
    fn default() -> Self {
        Palette { slots: [Rgba([0, 0, 0, 0]); 256] }
    }
}

impl Palette {

    /// Folds batches, oldest first, into a palette that starts out fully transparent.
    pub fn from_batches<'a, I>(batches: I) -> Self where
        I: IntoIterator<Item = &'a PaletteBatch>,
    {
        let mut palette = Palette::default();

        for batch in batches {
            palette.apply(batch);
        }

        palette
    }

    /// Applies a single batch on top of this palette.
    ///
    /// An entry never lowers the alpha of its slot. Fade-outs are authored as a series of
    /// palette updates with decreasing alpha; keeping the strongest version of each slot keeps
    /// the caption legible.
    pub fn apply(&mut self, batch: &PaletteBatch) {

        let mut fades = 0;

        for entry in batch.entries.iter() {

            if entry.id == TRANSPARENT_SLOT {
                continue
            }

            let slot = &mut self.slots[entry.id as usize];

            if entry.alpha < slot[3] {
                fades += 1;
                continue
            }

            *slot = if entry.alpha < LOW_ALPHA_THRESHOLD {
                ycbcr_to_rgba(16, 128, 128, entry.alpha)
            } else {
                ycbcr_to_rgba(entry.y, entry.cb, entry.cr, entry.alpha)
            };
        }

        if fades > 0 {
            debug!(
                "Palette {} version {}: ignored {} fading entries",
                batch.id,
                batch.version,
                fades,
            );
        }
    }

    /// Gets the color of a slot.
    pub fn get(&self, index: u8) -> Rgba<u8> {
        self.slots[index as usize]
    }

    /// Gets the alpha of a slot.
    pub fn alpha(&self, index: u8) -> u8 {
        self.slots[index as usize][3]
    }
}

/// Converts a BT.601 YCbCr color into RGB, keeping the given alpha.
pub fn ycbcr_to_rgba(y: u8, cb: u8, cr: u8, alpha: u8) -> Rgba<u8> {

    let y = y as f64;
    let cb = cb as f64 - 128.0;
    let cr = cr as f64 - 128.0;

    Rgba([
        clamp_channel(y + 1.402 * cr),
        clamp_channel(y - 0.344136 * cb - 0.714136 * cr),
        clamp_channel(y + 1.772 * cb),
        alpha,
    ])
}

fn clamp_channel(value: f64) -> u8 {
    value.round().max(0.0).min(255.0) as u8
}
