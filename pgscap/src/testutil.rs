/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

//! Builders for hand-assembled PGS bitstreams used across the unit tests.

use crate::segment::{CompositionState, PaletteEntry};

pub const PDS: u8 = 0x14;
pub const ODS: u8 = 0x15;
pub const PCS: u8 = 0x16;
pub const WDS: u8 = 0x17;
pub const END: u8 = 0x80;

/// An entry that resolves to an opaque, saturated red.
pub const RED: PaletteEntry = PaletteEntry { id: 1, y: 81, cr: 240, cb: 90, alpha: 255 };

/// Frames a payload with a 13-byte stored header.
pub fn stored(kind: u8, pts: u32, payload: &[u8]) -> Vec<u8> {

    let mut bytes = vec![b'P', b'G'];

    bytes.extend_from_slice(&pts.to_be_bytes());
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.push(kind);
    bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(payload);

    bytes
}

/// Frames a payload with a 3-byte block header.
pub fn block(kind: u8, payload: &[u8]) -> Vec<u8> {

    let mut bytes = vec![kind];

    bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(payload);

    bytes
}

/// A composition object placement: object ID, forced flag, x, y.
pub type Placement = (u16, bool, u16, u16);

pub fn pcs_payload(
    number: u16,
    state: CompositionState,
    palette_update: bool,
    palette_id: u8,
    objects: &[Placement],
) -> Vec<u8> {

    let mut bytes = vec![];

    bytes.extend_from_slice(&1920u16.to_be_bytes());
    bytes.extend_from_slice(&1080u16.to_be_bytes());
    bytes.push(0x10);
    bytes.extend_from_slice(&number.to_be_bytes());
    bytes.push(match state {
        CompositionState::Normal => 0x00,
        CompositionState::AcquisitionPoint => 0x40,
        CompositionState::EpochStart => 0x80,
        CompositionState::EpochContinue => 0xC0,
        CompositionState::Invalid => 0x11,
    });
    bytes.push(if palette_update { 0x80 } else { 0x00 });
    bytes.push(palette_id);
    bytes.push(objects.len() as u8);

    for &(object_id, forced, x, y) in objects {
        bytes.extend_from_slice(&object_id.to_be_bytes());
        bytes.push(0);
        bytes.push(if forced { 0x40 } else { 0x00 });
        bytes.extend_from_slice(&x.to_be_bytes());
        bytes.extend_from_slice(&y.to_be_bytes());
    }

    bytes
}

pub fn pds_payload(id: u8, version: u8, entries: &[PaletteEntry]) -> Vec<u8> {

    let mut bytes = vec![id, version];

    for entry in entries {
        bytes.extend_from_slice(&[entry.id, entry.y, entry.cr, entry.cb, entry.alpha]);
    }

    bytes
}

/// Builds the payload of a first (and possibly last) object fragment.
pub fn ods_first_payload(id: u16, last: bool, width: u16, height: u16, data: &[u8]) -> Vec<u8> {

    let mut bytes = vec![];
    let length = (data.len() + 4) as u32;

    bytes.extend_from_slice(&id.to_be_bytes());
    bytes.push(0);
    bytes.push(if last { 0xC0 } else { 0x80 });
    bytes.extend_from_slice(&length.to_be_bytes()[1..]);
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(data);

    bytes
}

/// Builds the payload of a continuation object fragment.
pub fn ods_next_payload(id: u16, last: bool, data: &[u8]) -> Vec<u8> {

    let mut bytes = vec![];

    bytes.extend_from_slice(&id.to_be_bytes());
    bytes.push(0);
    bytes.push(if last { 0x40 } else { 0x00 });
    bytes.extend_from_slice(data);

    bytes
}

/// A complete stored display set showing one single-fragment object.
pub fn stored_display_set(
    pts: u32,
    number: u16,
    state: CompositionState,
    entries: &[PaletteEntry],
    width: u16,
    height: u16,
    data: &[u8],
) -> Vec<u8> {

    let mut bytes = vec![];

    bytes.extend(stored(PCS, pts, &pcs_payload(number, state, false, 0, &[(1, false, 100, 800)])));
    bytes.extend(stored(PDS, pts, &pds_payload(0, 0, entries)));
    bytes.extend(stored(ODS, pts, &ods_first_payload(1, true, width, height, data)));
    bytes.extend(stored(END, pts, &[]));

    bytes
}

/// A stored display set that clears the screen.
pub fn stored_clear(pts: u32, number: u16) -> Vec<u8> {

    let mut bytes = vec![];

    bytes.extend(stored(PCS, pts, &pcs_payload(number, CompositionState::Normal, false, 0, &[])));
    bytes.extend(stored(END, pts, &[]));

    bytes
}
