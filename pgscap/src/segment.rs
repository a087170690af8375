/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Frames and parses individual segments.
//!
//! # Overview
//!
//! A segment is the most fundamental data structure within a PGS bitstream. Multiple segments
//! come together to form a display set (DS), which begins with a Presentation Composition
//! Segment (PCS) and ends with an End Segment (ES).
//!
//! Segments arrive in one of two framings:
//!
//! - [`Framing::Stored`] is used by standalone `.sup` files. Every segment starts with the
//!   `PG` magic number followed by PTS and DTS timestamps, the kind, and the payload size.
//! - [`Framing::Block`] is used when segments have been demuxed from a container. Only the kind
//!   and payload size are present; timing is supplied by the container.
//!
//! Reading is split in two steps. [`ReadSegmentExt::read_raw_segment`] only frames the stream,
//! so a malformed payload can never knock the reader out of sync. [`RawSegment::parse`] then
//! turns the payload into a typed [`Segment`].


mod segmentread;

pub use segmentread::*;

/// The on-wire kind of a segment.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SegmentKind {
    /// Palette Definition Segment (PDS).
    PaletteDefinition,
    /// Object Definition Segment (ODS).
    ObjectDefinition,
    /// Presentation Composition Segment (PCS).
    PresentationComposition,
    /// Window Definition Segment (WDS).
    WindowDefinition,
    /// End Segment (ES).
    End,
    /// Any other kind. These are consumed to keep framing intact and are otherwise ignored.
    Unknown(u8),
}

impl From<u8> for SegmentKind {
    fn from(value: u8) -> Self {
        match value {
            0x14 => Self::PaletteDefinition,
            0x15 => Self::ObjectDefinition,
            0x16 => Self::PresentationComposition,
            0x17 => Self::WindowDefinition,
            0x80 => Self::End,
            other => Self::Unknown(other),
        }
    }
}

impl From<SegmentKind> for u8 {
    fn from(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::PaletteDefinition => 0x14,
            SegmentKind::ObjectDefinition => 0x15,
            SegmentKind::PresentationComposition => 0x16,
            SegmentKind::WindowDefinition => 0x17,
            SegmentKind::End => 0x80,
            SegmentKind::Unknown(other) => other,
        }
    }
}

/// Determines how segment headers are laid out.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Framing {
    /// 13-byte header: `PG` magic, PTS, DTS, kind, and size.
    Stored,
    /// 3-byte header: kind and size. Timestamps come from the container.
    Block,
}

impl Framing {
    /// The size of a segment header in bytes.
    pub fn header_size(&self) -> usize {
        match self {
            Framing::Stored => 13,
            Framing::Block => 3,
        }
    }
}

/// A framed segment whose payload has not been interpreted yet.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct RawSegment {
    pub pts: u32,
    pub dts: u32,
    pub kind: u8,
    pub payload: Vec<u8>,
}

/// Represents a parsed PGS segment.
#[derive(Clone, Debug, Hash, PartialEq)]
pub enum Segment {
    /// Represents a Presentation Composition Segment (PCS).
    PresentationComposition(PresentationCompositionSegment),
    /// Represents a Window Definition Segment (WDS).
    WindowDefinition(WindowDefinitionSegment),
    /// Represents a Palette Definition Segment (PDS).
    PaletteDefinition(PaletteDefinitionSegment),
    /// Represents an Object Definition Segment (ODS).
    ObjectDefinition(ObjectDefinitionSegment),
    /// Represents an End Segment (ES).
    End(EndSegment),
    /// A segment of a kind this crate does not interpret.
    Unknown(u8),
}

/// Defines the role of a PCS (and thereby the associated DS) within an epoch.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CompositionState {
    /// This updates the composition that is on the screen. This is typically used to clear the
    /// current composition from the screen by defining a PCS with no composition objects.
    Normal,
    /// Used to refresh the screen with the current composition, allowing a player that seeks
    /// into the middle of an epoch to show it.
    AcquisitionPoint,
    /// Defines the start of a new epoch. Nothing defined before it may be referenced after it.
    EpochStart,
    /// Continues an epoch across a discontinuity.
    EpochContinue,
    /// The composition state byte was not recognized, or the PCS was too short to carry one.
    Invalid,
}

impl Default for CompositionState {
    fn default() -> Self { Self::EpochStart }
}

impl From<u8> for CompositionState {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Normal,
            0x40 => Self::AcquisitionPoint,
            0x80 => Self::EpochStart,
            0xC0 => Self::EpochContinue,
            _ => Self::Invalid,
        }
    }
}

/// Defines a Presentation Composition Segment (PCS).
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PresentationCompositionSegment {
    /// The timestamp at which the composition is displayed. Zero for block framing.
    pub pts: u32,
    pub dts: u32,
    /// The width of the display in pixels.
    pub width: u16,
    /// The height of the display in pixels.
    pub height: u16,
    /// This value should be set to `0x10` and can typically be ignored.
    pub frame_rate: u8,
    pub composition_number: u16,
    pub composition_state: CompositionState,
    /// When set, the display set only updates a palette and carries no object data.
    pub palette_update: bool,
    pub palette_id: u8,
    pub composition_objects: Vec<CompositionObjectEntry>,
}

/// One object placement as it appears inside a PCS.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct CompositionObjectEntry {
    pub object_id: u16,
    pub window_id: u8,
    pub forced: bool,
    pub x: u16,
    pub y: u16,
    pub crop: Option<Crop>,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Crop {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct WindowDefinitionSegment {
    pub pts: u32,
    pub dts: u32,
    pub windows: Vec<WindowDefinition>,
}

#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct WindowDefinition {
    pub id: u8,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PaletteDefinitionSegment {
    pub pts: u32,
    pub dts: u32,
    pub id: u8,
    pub version: u8,
    pub entries: Vec<PaletteEntry>,
}

/// A raw palette entry exactly as it is stored in a PDS.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PaletteEntry {
    pub id: u8,
    pub y: u8,
    pub cr: u8,
    pub cb: u8,
    pub alpha: u8,
}

/// Defines an Object Definition Segment (ODS).
///
/// Large objects are split across several segments. Only the first one declares the object's
/// dimensions; later ones carry nothing but more RLE data.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ObjectDefinitionSegment {
    pub pts: u32,
    pub dts: u32,
    pub id: u16,
    pub version: u8,
    pub first_in_sequence: bool,
    pub last_in_sequence: bool,
    /// Width and height, present only on the first segment of a sequence.
    pub size: Option<(u16, u16)>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct EndSegment {
    pub pts: u32,
    pub dts: u32,
}
