/*
 * Copyright 2021 William Swartzendruber
 *
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * SPDX-License-Identifier: MPL-2.0
 */


use pgscap::{decode_reader, ts_to_timestamp, Caption, DecodeError, DecodeOptions};
use std::{
    error::Error,
    ffi::OsStr,
    fs::{create_dir_all, File},
    io::{stdin, stdout, BufReader, BufWriter, Error as IoError, Read, Write},
    path::{Path, PathBuf},
    process::exit,
};
use clap::{app_from_crate, crate_authors, crate_description, crate_name, crate_version, Arg};
use image::ImageError;
use log::{debug, info, warn};
use thiserror::Error as ThisError;

type ExtractResult<T> = Result<T, ExtractError>;

#[derive(ThisError, Debug)]
enum ExtractError {
    #[error("unsupported input file; expected a .sup stream: {path}")]
    UnsupportedInput {
        path: String,
    },
    #[error("could not open input file: {path}")]
    InputError {
        path: String,
        source: IoError,
    },
    #[error("could not decode captions")]
    DecodeError {
        #[from]
        source: DecodeError,
    },
    #[error("could not create output directory: {}", path.display())]
    DirectoryError {
        path: PathBuf,
        source: IoError,
    },
    #[error("could not write image: {}", path.display())]
    ImageError {
        path: PathBuf,
        source: ImageError,
    },
    #[error("could not write caption listing")]
    OutputError {
        #[from]
        source: IoError,
    },
}

struct Settings {
    input: String,
    png_dir: Option<PathBuf>,
    forced_only: bool,
    options: DecodeOptions,
}

fn main() {

    let matches = app_from_crate!()
        .arg(Arg::with_name("skip-merge")
            .long("skip-merge")
            .help("Keeps redundant captions instead of merging them")
        )
        .arg(Arg::with_name("force-merge-all")
            .long("force-merge-all")
            .help("Merges every run of redundant captions; overrides --skip-merge")
        )
        .arg(Arg::with_name("png-dir")
            .long("png-dir")
            .short("p")
            .value_name("DIR")
            .help("Directory to write each caption into as a PNG image")
            .takes_value(true)
            .required(false)
        )
        .arg(Arg::with_name("forced-only")
            .long("forced-only")
            .short("f")
            .help("Only lists captions that are shown even when subtitles are off")
        )
        .arg(Arg::with_name("verbose")
            .long("verbose")
            .short("v")
            .multiple(true)
            .help("Logs more detail to STDERR; may be repeated")
        )
        .arg(Arg::with_name("input")
            .index(1)
            .value_name("INPUT-FILE")
            .help("Input SUP file; use - for STDIN")
            .required(true)
        )
        .after_help(format!("This utility will decode PGS subtitles found in Blu-ray discs \
            into timed caption bitmaps, listing them in SRT order and optionally exporting \
            each one as a PNG image for OCR.\n\n\
            Copyright © 2021 William Swartzendruber\n\
            Licensed under the Mozilla Public License 2.0\n\
            <{}>", env!("CARGO_PKG_REPOSITORY")).as_str())
        .get_matches();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(matches.occurrences_of("verbose")))
    ).init();

    let settings = Settings {
        input: matches.value_of("input").unwrap_or("-").to_string(),
        png_dir: matches.value_of("png-dir").map(PathBuf::from),
        forced_only: matches.is_present("forced-only"),
        options: DecodeOptions {
            skip_merge: matches.is_present("skip-merge"),
            force_merge_all: matches.is_present("force-merge-all"),
        },
    };

    if let Err(err) = run(&settings) {
        eprintln!("pgsextract: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        exit(1);
    }
}

fn run(settings: &Settings) -> ExtractResult<()> {

    check_input(&settings.input)?;

    let captions = read_captions(&settings.input, &settings.options)?;

    info!("Decoded {} captions", captions.len());

    if let Some(dir) = &settings.png_dir {
        create_dir_all(dir).map_err(|source| {
            ExtractError::DirectoryError { path: dir.clone(), source }
        })?;
    }

    let stdout = stdout();
    let mut output = BufWriter::new(stdout.lock());
    let mut index = 0;

    for caption in captions.iter() {

        if settings.forced_only && !caption.is_forced() {
            continue
        }

        index += 1;

        let file = match &settings.png_dir {
            Some(dir) => export_png(caption, dir, index)?,
            None => None,
        };

        write_entry(&mut output, index, caption, file.as_deref())?;
    }

    output.flush()?;

    Ok(())
}

/// Rejects anything other than a `.sup` file or `-`.
fn check_input(input: &str) -> ExtractResult<()> {

    let supported = input == "-" || Path::new(input)
        .extension()
        .and_then(OsStr::to_str)
        .map_or(false, |extension| extension.eq_ignore_ascii_case("sup"));

    if supported {
        Ok(())
    } else {
        Err(ExtractError::UnsupportedInput { path: input.to_string() })
    }
}

fn read_captions(input: &str, options: &DecodeOptions) -> ExtractResult<Vec<Caption>> {

    let (mut stdin_read, mut file_read);
    let reader = BufReader::<&mut dyn Read>::new(
        if input == "-" {
            stdin_read = stdin();
            &mut stdin_read
        } else {
            file_read = File::open(input).map_err(|source| {
                ExtractError::InputError { path: input.to_string(), source }
            })?;
            &mut file_read
        }
    );

    Ok(decode_reader(reader, options)?)
}

/// Writes the caption's bitmap, returning the file name it was written to.
fn export_png(caption: &Caption, dir: &Path, index: usize) -> ExtractResult<Option<String>> {

    let image = caption.render_bitmap();

    if image.width() == 0 || image.height() == 0 {
        warn!("Caption {} has no bitmap to export", index);
        return Ok(None)
    }

    let name = png_name(index);
    let path = dir.join(&name);

    debug!("Writing {}", path.display());

    image.save(&path).map_err(|source| ExtractError::ImageError { path, source })?;

    Ok(Some(name))
}

fn write_entry<W: Write>(
    output: &mut W,
    index: usize,
    caption: &Caption,
    file: Option<&str>,
) -> ExtractResult<()> {

    let (width, height) = caption.render_bitmap().dimensions();
    let (x, y) = caption.position();

    writeln!(output, "{}", index)?;
    writeln!(
        output,
        "{} --> {}",
        srt_timestamp(caption.start_ticks),
        srt_timestamp(caption.end_ticks),
    )?;
    writeln!(
        output,
        "[{}x{} bitmap at {},{}{}]{}",
        width,
        height,
        x,
        y,
        if caption.is_forced() { ", forced" } else { "" },
        file.map(|file| format!(" {}", file)).unwrap_or_default(),
    )?;
    writeln!(output)?;

    Ok(())
}

fn png_name(index: usize) -> String {
    format!("caption-{:04}.png", index)
}

/// Formats a tick count as an SRT timestamp, `HH:MM:SS,mmm`.
fn srt_timestamp(ticks: u32) -> String {
    ts_to_timestamp(ticks).replacen('.', ",", 1)
}

fn log_level(occurrences: u64) -> &'static str {
    match occurrences {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
