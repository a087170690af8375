/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

use super::{
    CompositionObjectEntry,
    CompositionState,
    Crop,
    EndSegment,
    Framing,
    ObjectDefinitionSegment,
    PaletteDefinitionSegment,
    PaletteEntry,
    PresentationCompositionSegment,
    RawSegment,
    Segment,
    SegmentKind,
    WindowDefinition,
    WindowDefinitionSegment,
};
use std::io::{Cursor, Error as IoError, ErrorKind, Read};
use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for segment-reading operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// The error type for [`ReadSegmentExt`] and [`RawSegment::parse`].
#[derive(ThisError, Debug)]
pub enum ReadError {
    /// The underlying reader failed for a reason other than running out of data.
    #[error("segment IO error")]
    IoError {
        #[from]
        source: IoError,
    },
    /// The input ended part way through a segment header.
    #[error("segment header is truncated")]
    TruncatedHeader,
    /// The input ended before the number of payload bytes declared by the header.
    #[error("segment declares {size} payload bytes but fewer are available")]
    TruncatedPayload {
        size: usize,
    },
    /// A stored segment did not begin with `PG`.
    #[error("segment has unrecognized magic number")]
    UnrecognizedMagicNumber,
    /// The payload ended before all of the fields its layout requires.
    #[error("{kind:?} segment payload is malformed")]
    MalformedPayload {
        kind: SegmentKind,
    },
}

impl ReadError {
    /// Whether this error means the reader can no longer find the next segment header.
    pub fn is_desync(&self) -> bool {
        !matches!(self, ReadError::MalformedPayload { .. })
    }
}

/// Allows framing segments from a source.
pub trait ReadSegmentExt {
    /// Reads the next segment header and its payload.
    ///
    /// Returns `Ok(None)` when the source is exhausted exactly at a segment boundary.
    fn read_raw_segment(&mut self, framing: Framing) -> ReadResult<Option<RawSegment>>;

    /// Reads and parses the next segment.
    fn read_segment(&mut self, framing: Framing) -> ReadResult<Option<Segment>> {
        match self.read_raw_segment(framing)? {
            Some(raw) => raw.parse().map(Some),
            None => Ok(None),
        }
    }
}

impl<T> ReadSegmentExt for T where
    T: Read,
{

    fn read_raw_segment(&mut self, framing: Framing) -> ReadResult<Option<RawSegment>> {

        let first = match read_first_byte(self)? {
            Some(first) => first,
            None => return Ok(None),
        };
        let mut header = [0u8; 13];

        header[0] = first;
        self.read_exact(&mut header[1..framing.header_size()]).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                ReadError::TruncatedHeader
            } else {
                ReadError::IoError { source: err }
            }
        })?;

        let mut input = Cursor::new(&header[..framing.header_size()]);
        let (pts, dts) = match framing {
            Framing::Stored => {
                if input.read_u16::<BigEndian>()? != 0x5047 {
                    return Err(ReadError::UnrecognizedMagicNumber)
                }
                (input.read_u32::<BigEndian>()?, input.read_u32::<BigEndian>()?)
            }
            Framing::Block => (0, 0),
        };
        let kind = input.read_u8()?;
        let size = input.read_u16::<BigEndian>()? as usize;
        let mut payload = vec![0u8; size];

        self.read_exact(&mut payload).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                ReadError::TruncatedPayload { size }
            } else {
                ReadError::IoError { source: err }
            }
        })?;

        Ok(Some(RawSegment { pts, dts, kind, payload }))
    }
}

fn read_first_byte<T: Read + ?Sized>(input: &mut T) -> ReadResult<Option<u8>> {

    let mut byte = [0u8; 1];

    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

impl RawSegment {

    /// The kind of this segment.
    pub fn kind(&self) -> SegmentKind {
        SegmentKind::from(self.kind)
    }

    /// Interprets the payload according to the segment's kind.
    pub fn parse(&self) -> ReadResult<Segment> {
        self.parse_forcing_first(false)
    }

    /// Interprets the payload, reading an ODS as the first of its sequence when `force_first`
    /// is set regardless of its flags.
    pub fn parse_forcing_first(&self, force_first: bool) -> ReadResult<Segment> {

        let kind = self.kind();
        let parsed = match kind {
            SegmentKind::PaletteDefinition => {
                parse_pds(self.pts, self.dts, &self.payload).map(Segment::PaletteDefinition)
            }
            SegmentKind::ObjectDefinition => {
                parse_ods(self.pts, self.dts, &self.payload, force_first)
                    .map(Segment::ObjectDefinition)
            }
            SegmentKind::PresentationComposition => {
                parse_pcs(self.pts, self.dts, &self.payload)
                    .map(Segment::PresentationComposition)
            }
            SegmentKind::WindowDefinition => {
                parse_wds(self.pts, self.dts, &self.payload).map(Segment::WindowDefinition)
            }
            SegmentKind::End => Ok(Segment::End(EndSegment { pts: self.pts, dts: self.dts })),
            SegmentKind::Unknown(other) => Ok(Segment::Unknown(other)),
        };

        parsed.map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                ReadError::MalformedPayload { kind }
            } else {
                ReadError::IoError { source: err }
            }
        })
    }
}

fn parse_pcs(
    pts: u32,
    dts: u32,
    payload: &[u8],
) -> Result<PresentationCompositionSegment, IoError> {

    if payload.len() < 11 {
        return Ok(
            PresentationCompositionSegment {
                pts,
                dts,
                composition_state: CompositionState::Invalid,
                ..Default::default()
            }
        )
    }

    let mut input = Cursor::new(payload);
    let width = input.read_u16::<BigEndian>()?;
    let height = input.read_u16::<BigEndian>()?;
    let frame_rate = input.read_u8()?;
    let composition_number = input.read_u16::<BigEndian>()?;
    let composition_state = CompositionState::from(input.read_u8()?);
    let palette_update = input.read_u8()? == 0x80;
    let palette_id = input.read_u8()?;
    let comp_obj_count = input.read_u8()? as usize;
    let mut composition_objects = Vec::new();

    if composition_state != CompositionState::Invalid {
        for _ in 0..comp_obj_count {

            if remaining(&input) < 8 {
                break
            }

            let object_id = input.read_u16::<BigEndian>()?;
            let window_id = input.read_u8()?;
            let flags = input.read_u8()?;
            let x = input.read_u16::<BigEndian>()?;
            let y = input.read_u16::<BigEndian>()?;

            // Some discs flag an object as cropped and then end the payload.
            let crop = if flags & 0x80 != 0 && remaining(&input) >= 8 {
                Some(
                    Crop {
                        x: input.read_u16::<BigEndian>()?,
                        y: input.read_u16::<BigEndian>()?,
                        width: input.read_u16::<BigEndian>()?,
                        height: input.read_u16::<BigEndian>()?,
                    }
                )
            } else {
                None
            };

            composition_objects.push(
                CompositionObjectEntry {
                    object_id,
                    window_id,
                    forced: flags & 0x40 != 0,
                    x,
                    y,
                    crop,
                }
            );
        }
    }

    Ok(
        PresentationCompositionSegment {
            pts,
            dts,
            width,
            height,
            frame_rate,
            composition_number,
            composition_state,
            palette_update,
            palette_id,
            composition_objects,
        }
    )
}

fn parse_wds(
    pts: u32,
    dts: u32,
    payload: &[u8],
) -> Result<WindowDefinitionSegment, IoError> {

    let mut input = Cursor::new(payload);
    let mut windows = Vec::new();
    let count = input.read_u8()?;

    for _ in 0..count {
        windows.push(
            WindowDefinition {
                id: input.read_u8()?,
                x: input.read_u16::<BigEndian>()?,
                y: input.read_u16::<BigEndian>()?,
                width: input.read_u16::<BigEndian>()?,
                height: input.read_u16::<BigEndian>()?,
            }
        );
    }

    Ok(
        WindowDefinitionSegment {
            pts,
            dts,
            windows,
        }
    )
}

fn parse_pds(
    pts: u32,
    dts: u32,
    payload: &[u8],
) -> Result<PaletteDefinitionSegment, IoError> {

    let mut input = Cursor::new(payload);
    let count = payload.len().saturating_sub(2) / 5;
    let id = input.read_u8()?;
    let version = input.read_u8()?;
    let mut entries = Vec::with_capacity(count);

    for _ in 0..count {

        let id = input.read_u8()?;
        let y = input.read_u8()?;
        let cr = input.read_u8()?;
        let cb = input.read_u8()?;
        let alpha = input.read_u8()?;

        entries.push(PaletteEntry { id, y, cr, cb, alpha });
    }

    Ok(
        PaletteDefinitionSegment {
            pts,
            dts,
            id,
            version,
            entries,
        }
    )
}

fn parse_ods(
    pts: u32,
    dts: u32,
    payload: &[u8],
    force_first: bool,
) -> Result<ObjectDefinitionSegment, IoError> {

    let mut input = Cursor::new(payload);
    let id = input.read_u16::<BigEndian>()?;
    let version = input.read_u8()?;
    let flags = input.read_u8()?;
    let first_in_sequence = force_first || flags & 0x80 != 0;
    let last_in_sequence = flags & 0x40 != 0;
    let size = if first_in_sequence {
        // The declared data length also counts the width and height fields; the payload size
        // is what actually bounds the data.
        let _data_length = input.read_u24::<BigEndian>()?;
        let width = input.read_u16::<BigEndian>()?;
        let height = input.read_u16::<BigEndian>()?;
        Some((width, height))
    } else {
        None
    };
    let data = payload[input.position() as usize..].to_vec();

    Ok(
        ObjectDefinitionSegment {
            pts,
            dts,
            id,
            version,
            first_in_sequence,
            last_in_sequence,
            size,
            data,
        }
    )
}

fn remaining(input: &Cursor<&[u8]>) -> usize {
    input.get_ref().len().saturating_sub(input.position() as usize)
}
