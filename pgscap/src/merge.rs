/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

//! Collapses runs of redundant captions.
//!
//! Some encoders repeat the same caption as several back-to-back epochs instead of one
//! continuous display. Such a run is found by scanning adjacent captions from the end of the
//! list: two captions belong together when one starts right as the other ends, they share a
//! frame size, and their object data is identical byte for byte. A qualifying run is replaced
//! by one caption spanning the whole run.


use super::{
    bitmap::{non_transparent_height, non_transparent_width},
    caption::Caption,
    decoder::DecodeOptions,
};
use std::mem;
use log::debug;

/// Adjacent captions closer than this many ticks are considered contiguous.
pub const MAX_GAP_TICKS: i64 = 10;

/// Captions shown at least this long are not flicker.
pub const MIN_STANDALONE_MS: u64 = 400;

/// Captions built from more palette definitions than this are animated.
pub const MAX_PALETTE_BATCHES: usize = 2;

/// Rendered captions larger than this are not flicker.
pub const MAX_FLICKER_HEIGHT: u32 = 110;
pub const MAX_FLICKER_WIDTH: u32 = 300;

/// Runs of three or more captions are merged only when at least this many runs exist.
pub const MIN_GROUPS_FOR_LONG_RUNS: usize = 3;

/// Merges redundant captions in place according to `options`.
///
/// Merging one run can bring the number of runs below [`MIN_GROUPS_FOR_LONG_RUNS`], which
/// lets pairs that were held back qualify. Passes repeat until nothing changes, so calling this
/// again on its own output is a no-op.
pub fn merge_redundant(captions: &mut Vec<Caption>, options: &DecodeOptions) {

    if options.skip_merge && !options.force_merge_all {
        return
    }

    loop {

        let before = captions.len();

        merge_pass(captions, options);

        if captions.len() == before {
            break
        }
    }
}

fn merge_pass(captions: &mut Vec<Caption>, options: &DecodeOptions) {

    let groups = find_groups(captions);
    let group_count = groups.len();

    // Groups are ordered from the end of the list, so removing members of one group never
    // shifts the indices of the groups after it.
    for group in groups.iter() {

        if !qualifies(group, captions, group_count, options) {
            continue
        }

        let representative = group[middle(group.len())];
        let earliest = group[group.len() - 1];
        let latest = group[0];

        debug!(
            "Merging captions {}..={} into caption {}",
            earliest,
            latest,
            representative,
        );

        captions[representative].start_ticks = captions[earliest].start_ticks;
        captions[representative].end_ticks = captions[latest].end_ticks;

        for &index in group.iter() {
            if index != representative {
                captions.remove(index);
            }
        }
    }
}

/// Finds runs of redundant captions.
///
/// Each group lists the indices of its members in descending order.
pub fn find_groups(captions: &[Caption]) -> Vec<Vec<usize>> {

    let mut groups = Vec::new();
    let mut current = Vec::new();

    for later in (1..captions.len()).rev() {

        let earlier = later - 1;

        if is_redundant(&captions[earlier], &captions[later]) {
            if current.is_empty() {
                current.push(later);
            }
            current.push(earlier);
        } else if !current.is_empty() {
            groups.push(mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

fn is_redundant(earlier: &Caption, later: &Caption) -> bool {
    (earlier.end_ticks as i64 - later.start_ticks as i64).abs() < MAX_GAP_TICKS
        && earlier.frame_width == later.frame_width
        && earlier.frame_height == later.frame_height
        && earlier.same_bitmap_data(later)
}

fn qualifies(
    group: &[usize],
    captions: &[Caption],
    group_count: usize,
    options: &DecodeOptions,
) -> bool {

    if options.force_merge_all {
        return true
    }

    // When most of the stream looks like one repeated caption, something other than
    // duplication is going on.
    if group.len() != 2 {
        return group_count >= MIN_GROUPS_FOR_LONG_RUNS
    }
    if group_count >= MIN_GROUPS_FOR_LONG_RUNS {
        return false
    }

    let later = &captions[group[0]];
    let earlier = &captions[group[1]];

    if later.duration_ms() >= MIN_STANDALONE_MS
        || earlier.duration_ms() >= MIN_STANDALONE_MS
        || later.palette_batches.len() > MAX_PALETTE_BATCHES
        || earlier.palette_batches.len() > MAX_PALETTE_BATCHES {
        return true
    }

    let later_image = later.render_bitmap();

    if non_transparent_height(&later_image) > MAX_FLICKER_HEIGHT
        || non_transparent_width(&later_image) > MAX_FLICKER_WIDTH {
        return true
    }

    later_image == earlier.render_bitmap()
}

/// The midpoint of a group, rounding halves to even.
fn middle(len: usize) -> usize {
    let half = len / 2;
    if len % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}
