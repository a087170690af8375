/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Decompresses object RLE data into RGBA images.
//!
//! # Encoding
//!
//! Each object is a sequence of scanlines. Within a line, a non-zero byte is a single pixel of
//! that palette slot. A zero byte introduces a code whose top two bits select the form:
//!
//! | Code        | Meaning                                        |
//! |-------------|------------------------------------------------|
//! | `00 00`     | end of line                                    |
//! | `00 0L`     | `L` (6 bits) pixels of slot 0                  |
//! | `00 4L LL`  | `L` (14 bits) pixels of slot 0                 |
//! | `00 8L CC`  | `L` (6 bits) pixels of slot `C`                |
//! | `00 CL LL CC` | `L` (14 bits) pixels of slot `C`             |
//!
//! Pixels whose slot has zero alpha are never written, which leaves the background of the
//! image transparent.


use super::palette::Palette;
use image::{imageops::overlay, RgbaImage};
use std::borrow::Cow;

/// The RLE data of one object and where it is placed.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectImage<'a> {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub data: Cow<'a, [u8]>,
}

/// Decodes one object into an image of its declared size.
pub fn decode_rle(data: &[u8], width: u16, height: u16, palette: &Palette) -> RgbaImage {

    let mut image = RgbaImage::new(width as u32, height as u32);
    let width = width as usize;
    let total = width * height as usize;
    let pixels: &mut [u8] = &mut image;
    let mut paint = |pos: usize, count: usize, slot: u8| {
        if palette.alpha(slot) == 0 {
            return
        }
        let color = palette.get(slot);
        for p in pos.min(total)..pos.saturating_add(count).min(total) {
            pixels[p * 4..p * 4 + 4].copy_from_slice(&color.0);
        }
    };
    let mut pos = 0usize;
    let mut col = 0usize;
    let mut i = 0usize;

    while i < data.len() {

        let b = data[i];
        i += 1;

        // A lone zero at the very end is an ordinary slot-0 pixel.
        if b != 0 || i == data.len() {
            paint(pos, 1, b);
            pos += 1;
            col += 1;
            continue
        }

        let c = data[i];
        i += 1;

        let (count, slot) = match c {
            0x00 => {
                if width > 0 {
                    pos = pos / width * width;
                    if col < width {
                        pos += width;
                    }
                }
                col = 0;
                continue
            }
            c if c & 0xC0 == 0x40 => {
                if i >= data.len() {
                    break
                }
                let count = ((c - 0x40) as usize) << 8 | data[i] as usize;
                i += 1;
                (count, 0)
            }
            c if c & 0xC0 == 0x80 => {
                if i >= data.len() {
                    break
                }
                let slot = data[i];
                i += 1;
                ((c - 0x80) as usize, slot)
            }
            c if c & 0xC0 == 0xC0 => {
                if i + 1 >= data.len() {
                    break
                }
                let count = ((c - 0xC0) as usize) << 8 | data[i] as usize;
                let slot = data[i + 1];
                i += 2;
                (count, slot)
            }
            c => (c as usize, 0),
        };

        paint(pos, count, slot);
        pos += count;
        col += count;
    }

    image
}

/// Decodes objects onto one canvas covering the union of their rectangles.
///
/// Objects are drawn in order, so later objects cover earlier ones where they overlap.
pub fn compose(objects: &[ObjectImage], palette: &Palette) -> RgbaImage {

    match objects {
        [] => RgbaImage::new(0, 0),
        [single] => decode_rle(&single.data, single.width, single.height, palette),
        many => {

            let left = many.iter().map(|o| o.x as u32).min().unwrap_or(0);
            let top = many.iter().map(|o| o.y as u32).min().unwrap_or(0);
            let right = many.iter().map(|o| o.x as u32 + o.width as u32).max().unwrap_or(0);
            let bottom = many.iter().map(|o| o.y as u32 + o.height as u32).max().unwrap_or(0);
            let mut canvas = RgbaImage::new(right - left, bottom - top);

            for object in many {
                let image = decode_rle(&object.data, object.width, object.height, palette);
                overlay(
                    &mut canvas,
                    &image,
                    (object.x as u32 - left) as i64,
                    (object.y as u32 - top) as i64,
                );
            }

            canvas
        }
    }
}

/// The height of the image once fully transparent rows at the top and bottom are trimmed.
pub fn non_transparent_height(image: &RgbaImage) -> u32 {
    trimmed_extent(image.height(), |y| (0..image.width()).all(|x| image.get_pixel(x, y)[3] == 0))
}

/// The width of the image once fully transparent columns at the left and right are trimmed.
pub fn non_transparent_width(image: &RgbaImage) -> u32 {
    trimmed_extent(image.width(), |x| (0..image.height()).all(|y| image.get_pixel(x, y)[3] == 0))
}

fn trimmed_extent<F>(extent: u32, is_transparent: F) -> u32 where
    F: Fn(u32) -> bool,
{
    let mut leading = 0;
    let mut trailing = 0;

    for i in 0..extent {
        let transparent = is_transparent(i);
        if transparent && leading == i {
            leading += 1;
        } else if transparent {
            trailing += 1;
        } else {
            trailing = 0;
        }
    }

    extent - leading - trailing
}
