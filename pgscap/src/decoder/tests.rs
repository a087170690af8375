/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use crate::{
    segment::PaletteEntry,
    testutil::*,
};
use image::Rgba;

const WHITE: PaletteEntry = PaletteEntry { id: 1, y: 235, cr: 128, cb: 128, alpha: 255 };

const R: Rgba<u8> = Rgba([238, 14, 14, 255]);
const W: Rgba<u8> = Rgba([235, 235, 235, 255]);
const T: Rgba<u8> = Rgba([0, 0, 0, 0]);

const NO_MERGE: DecodeOptions = DecodeOptions { skip_merge: true, force_merge_all: false };

fn pixels(caption: &Caption) -> Vec<Rgba<u8>> {
    caption.render_bitmap().pixels().copied().collect()
}

fn spans(captions: &[Caption]) -> Vec<(u32, u32)> {
    captions.iter().map(|c| (c.start_ticks, c.end_ticks)).collect()
}

/// A PCS that shows object 1 without supplying any new palette or object data.
fn stored_reshow(pts: u32, number: u16, state: CompositionState) -> Vec<u8> {

    let mut bytes = vec![];

    bytes.extend(stored(PCS, pts, &pcs_payload(number, state, false, 0, &[(1, false, 100, 800)])));
    bytes.extend(stored(END, pts, &[]));

    bytes
}

#[test]
fn test_single_caption_ended_by_clear() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored(PCS, 180_000, &pcs_payload(2, CompositionState::EpochStart, false, 0, &[])));
    stream.extend(stored(END, 180_000, &[]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(captions.len(), 1);

    let caption = &captions[0];

    assert_eq!((caption.start_ticks, caption.end_ticks), (90_000, 180_000));
    assert_eq!(caption.composition_number, 1);
    assert_eq!((caption.frame_width, caption.frame_height), (1920, 1080));
    assert_eq!(caption.position(), (100, 800));
    assert_eq!(caption.render_bitmap().dimensions(), (1, 1));
    assert_eq!(pixels(caption), vec![R]);
}

#[test]
fn test_empty_stream() {
    assert_eq!(decode_stream(&[], &DecodeOptions::default()).unwrap(), vec![]);
}

#[test]
fn test_unreadable_first_header_is_an_error() {

    let garbage = b"XY\x00\x00\x00\x00\x00\x00\x00\x00\x16\x00\x00";

    assert!(matches!(
        decode_stream(garbage, &DecodeOptions::default()),
        Err(DecodeError::SegmentError { source: SegmentReadError::UnrecognizedMagicNumber }),
    ));
    assert!(matches!(
        decode_stream(b"PG\x00", &DecodeOptions::default()),
        Err(DecodeError::SegmentError { source: SegmentReadError::TruncatedHeader }),
    ));
}

#[test]
fn test_desync_keeps_earlier_captions() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored_clear(180_000, 2));
    stream.extend(b"garbage that is not a segment");

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000)]);
}

#[test]
fn test_truncated_trailing_segment_keeps_earlier_captions() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored_clear(180_000, 2));

    let mut partial = stored(PCS, 270_000, &pcs_payload(3, CompositionState::EpochStart, false, 0, &[]));

    partial.truncate(partial.len() - 4);
    stream.extend(partial);

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000)]);
}

#[test]
fn test_malformed_payload_is_skipped() {

    let mut stream = vec![];

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    // Declares one window but carries none of its fields.
    stream.extend(stored(WDS, 90_000, &[1]));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, true, 1, 1, &[1])));
    stream.extend(stored(END, 90_000, &[]));
    stream.extend(stored_clear(180_000, 2));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000)]);
    assert_eq!(pixels(&captions[0]), vec![R]);
}

#[test]
fn test_malformed_first_payload_is_skipped() {

    let mut stream = stored(WDS, 0, &[2, 0]);

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 90_000)]);
}

#[test]
fn test_unknown_segments_are_ignored() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored(0x42, 100_000, &[1, 2, 3]));
    stream.extend(stored_clear(180_000, 2));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000)]);
}

#[test]
fn test_state_carries_within_epoch() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored_reshow(180_000, 2, CompositionState::Normal));
    stream.extend(stored_clear(270_000, 3));

    let captions = decode_stream(&stream, &NO_MERGE).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000), (180_000, 270_000)]);
    assert_eq!(pixels(&captions[1]), vec![R]);
}

#[test]
fn test_epoch_start_forgets_state() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored_reshow(180_000, 2, CompositionState::EpochStart));
    stream.extend(stored_clear(270_000, 3));

    let captions = decode_stream(&stream, &NO_MERGE).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000)]);
}

#[test]
fn test_palette_update_replaces_latest_definition() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]));
    stream.extend(stored(PCS, 180_000, &pcs_payload(2, CompositionState::Normal, true, 0, &[(1, false, 100, 800)])));
    stream.extend(stored(PDS, 180_000, &pds_payload(0, 1, &[WHITE])));
    // Object data is not accepted during a palette update.
    stream.extend(stored(ODS, 180_000, &ods_first_payload(1, true, 1, 1, &[0x00, 0x01])));
    stream.extend(stored(END, 180_000, &[]));
    stream.extend(stored_clear(270_000, 3));

    let captions = decode_stream(&stream, &NO_MERGE).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000), (180_000, 270_000)]);
    assert_eq!(captions[0].palette_batches.len(), 1);
    assert_eq!(captions[1].palette_batches.len(), 1);
    assert_eq!(captions[1].palette_batches[0].version, 1);
    assert_eq!(captions[1].bitmaps[0].fragments[0].data, vec![1]);
    assert_eq!(pixels(&captions[0]), vec![R]);
    assert_eq!(pixels(&captions[1]), vec![W]);
}

#[test]
fn test_palettes_accumulate_without_update() {

    let mut stream = vec![];
    let translucent = PaletteEntry { alpha: 128, ..RED };

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[translucent])));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 1, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, true, 1, 1, &[1])));
    stream.extend(stored(END, 90_000, &[]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(captions[0].palette_batches.len(), 2);
    assert_eq!(pixels(&captions[0]), vec![R]);
}

#[test]
fn test_fragments_are_coalesced() {

    let mut stream = vec![];

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, false, 3, 1, &[1])));
    stream.extend(stored(ODS, 90_000, &ods_next_payload(1, true, &[0x00, 0x01, 0x01])));
    stream.extend(stored(END, 90_000, &[]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(captions.len(), 1);

    let bitmap = &captions[0].bitmaps[0];

    assert_eq!(bitmap.fragments.len(), 1);
    assert!(bitmap.fragments[0].is_first);
    assert!(bitmap.fragments[0].is_last);
    assert_eq!(bitmap.fragments[0].data, vec![1, 0x00, 0x01, 0x01]);
    assert_eq!(pixels(&captions[0]), vec![R, T, R]);
}

#[test]
fn test_trailing_caption_has_open_span() {

    let stream = stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]);
    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 90_000)]);
}

#[test]
fn test_orphan_fragment_is_dropped() {

    let mut stream = vec![];
    let objects = [(1, false, 100, 800), (2, false, 300, 800)];

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &objects)));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, true, 1, 1, &[1])));
    // Object 2 never had a first fragment.
    stream.extend(stored(ODS, 90_000, &ods_next_payload(2, true, &[1])));
    stream.extend(stored(END, 90_000, &[]));
    stream.extend(stored_clear(180_000, 2));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(captions.len(), 1);
    assert_eq!(captions[0].bitmaps.len(), 1);
    assert_eq!(captions[0].bitmaps[0].object_id, 1);
}

#[test]
fn test_first_object_after_composition_ignores_flags() {

    let mut stream = vec![];
    let mut payload = ods_first_payload(1, true, 1, 1, &[1]);

    // Last in sequence only; the first-in-sequence flag is missing.
    payload[3] = 0x40;

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &payload));
    stream.extend(stored(END, 90_000, &[]));
    stream.extend(stored_clear(180_000, 2));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(spans(&captions), vec![(90_000, 180_000)]);

    let fragment = &captions[0].bitmaps[0].fragments[0];

    assert!(fragment.is_first);
    assert!(fragment.is_last);
    assert_eq!(fragment.size, Some((1, 1)));
    assert_eq!(fragment.data, vec![1]);
    assert_eq!(pixels(&captions[0]), vec![R]);
}

#[test]
fn test_only_the_first_object_is_forced() {

    let mut stream = vec![];

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, false, 3, 1, &[1])));
    // Parsed with the continuation layout, so all of it is RLE data.
    stream.extend(stored(ODS, 90_000, &ods_next_payload(1, true, &[0x00, 0x01, 0x01])));
    stream.extend(stored(END, 90_000, &[]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(captions[0].bitmaps[0].fragments[0].data, vec![1, 0x00, 0x01, 0x01]);
    assert_eq!(pixels(&captions[0]), vec![R, T, R]);
}

#[test]
fn test_missing_palette_is_incomplete() {

    let mut stream = vec![];

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 3, &[(1, false, 100, 800)])));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, true, 1, 1, &[1])));
    stream.extend(stored(END, 90_000, &[]));

    assert_eq!(decode_stream(&stream, &DecodeOptions::default()).unwrap(), vec![]);
}

#[test]
fn test_invalid_composition_never_completes() {

    let mut stream = vec![];

    stream.extend(stored_display_set(90_000, 1, CompositionState::Invalid, &[RED], 1, 1, &[1]));
    stream.extend(stored_clear(180_000, 2));

    assert_eq!(decode_stream(&stream, &DecodeOptions::default()).unwrap(), vec![]);
}

#[test]
fn test_multiple_objects() {

    let mut stream = vec![];
    let objects = [(1, false, 100, 800), (2, true, 102, 801)];
    let white = PaletteEntry { id: 2, ..WHITE };

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &objects)));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED, white])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, true, 2, 1, &[1, 1])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(2, true, 1, 1, &[2])));
    stream.extend(stored(END, 90_000, &[]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();
    let caption = &captions[0];

    assert!(caption.is_forced());
    assert_eq!(caption.position(), (100, 800));
    assert_eq!(caption.bitmaps.len(), 2);
    assert_eq!(caption.render_bitmap().dimensions(), (3, 2));
    assert_eq!(pixels(caption), vec![R, R, T, T, T, W]);
}

#[test]
fn test_objects_without_data_are_left_out() {

    let mut stream = vec![];
    let objects = [(1, false, 100, 800), (2, false, 300, 800)];

    stream.extend(stored(PCS, 90_000, &pcs_payload(1, CompositionState::EpochStart, false, 0, &objects)));
    stream.extend(stored(PDS, 90_000, &pds_payload(0, 0, &[RED])));
    stream.extend(stored(ODS, 90_000, &ods_first_payload(1, true, 1, 1, &[1])));
    stream.extend(stored(END, 90_000, &[]));

    let captions = decode_stream(&stream, &DecodeOptions::default()).unwrap();

    assert_eq!(captions[0].objects.len(), 2);
    assert_eq!(captions[0].bitmaps.len(), 1);
    assert_eq!(captions[0].bitmaps[0].object_id, 1);
}

#[test]
fn test_decode_reader() {

    let stream = stored_display_set(90_000, 1, CompositionState::EpochStart, &[RED], 1, 1, &[1]);
    let captions = decode_reader(std::io::Cursor::new(stream), &DecodeOptions::default()).unwrap();

    assert_eq!(captions.len(), 1);
}

#[test]
fn test_blocks_share_context() {

    let mut context = DecodeContext::new();
    let mut first = vec![];

    first.extend(block(PCS, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    first.extend(block(PDS, &pds_payload(0, 0, &[RED])));
    first.extend(block(ODS, &ods_first_payload(1, true, 1, 1, &[1])));
    first.extend(block(END, &[]));

    let captions = decode_block(&first, &mut context).unwrap();

    assert_eq!(spans(&captions), vec![(0, 0)]);
    assert_eq!(context.palette_batches(0).map(|batches| batches.len()), Some(1));
    assert_eq!(context.object_fragments(1).map(|fragments| fragments.len()), Some(1));

    // Neither palette nor object data is repeated, so both come from the context.
    let mut second = vec![];

    second.extend(block(PCS, &pcs_payload(2, CompositionState::Normal, false, 0, &[(1, false, 100, 800)])));
    second.extend(block(END, &[]));

    let captions = decode_block(&second, &mut context).unwrap();

    assert_eq!(captions.len(), 1);
    assert_eq!(pixels(&captions[0]), vec![R]);

    // A new epoch discards the carried state.
    let mut third = vec![];

    third.extend(block(PCS, &pcs_payload(3, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    third.extend(block(END, &[]));

    assert_eq!(decode_block(&third, &mut context).unwrap(), vec![]);
    assert_eq!(context.palette_batches(0), None);
    assert_eq!(context.object_fragments(1), None);
}

#[test]
fn test_block_palette_replaces_context() {

    let mut context = DecodeContext::new();
    let mut first = vec![];

    first.extend(block(PCS, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    first.extend(block(PDS, &pds_payload(0, 0, &[RED])));
    first.extend(block(ODS, &ods_first_payload(1, true, 1, 1, &[1])));
    first.extend(block(END, &[]));

    decode_block(&first, &mut context).unwrap();

    let mut second = vec![];

    second.extend(block(PCS, &pcs_payload(2, CompositionState::Normal, false, 0, &[(1, false, 100, 800)])));
    second.extend(block(PDS, &pds_payload(0, 1, &[WHITE])));
    second.extend(block(END, &[]));

    let captions = decode_block(&second, &mut context).unwrap();

    assert_eq!(pixels(&captions[0]), vec![W]);
    assert_eq!(context.palette_batches(0).map(|batches| batches[0].version), Some(1));
}

#[test]
fn test_clear_context() {

    let mut context = DecodeContext::new();
    let mut bytes = vec![];

    bytes.extend(block(PCS, &pcs_payload(1, CompositionState::EpochStart, false, 0, &[(1, false, 100, 800)])));
    bytes.extend(block(PDS, &pds_payload(0, 0, &[RED])));
    bytes.extend(block(ODS, &ods_first_payload(1, true, 1, 1, &[1])));
    bytes.extend(block(END, &[]));

    decode_block(&bytes, &mut context).unwrap();
    context.clear();

    assert_eq!(context, DecodeContext::new());
}
