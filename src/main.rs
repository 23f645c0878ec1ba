// main.rs      recgif command
//
// Copyright (c) 2019-2023  Douglas Lau
//
#![forbid(unsafe_code)]

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use recgif::block::DisposalMethod;
use recgif::{Builder, Repeat, Threading};
use std::error::Error;
use std::fs;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Crate version
const VERSION: &'static str = std::env!("CARGO_PKG_VERSION");

/// Main entry point
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder().format_timestamp(None).init();
    let mut out = StandardStream::stdout(ColorChoice::Always);
    match create_app().get_matches().subcommand() {
        ("encode", Some(matches)) => encode(&mut out, matches)?,
        _ => unreachable!(),
    }
    out.reset()?;
    Ok(())
}

/// Create clap App
fn create_app() -> App<'static, 'static> {
    App::new("recgif")
        .version(VERSION)
        .setting(AppSettings::GlobalVersion)
        .about("Animated GIF encoder")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("encode")
                .about("Encode raw RGBA frames into a GIF")
                .arg(number_arg("width", "screen width").required(true))
                .arg(number_arg("height", "screen height").required(true))
                .arg(number_arg("delay", "frame delay (1/100 s)"))
                .arg(number_arg("quality", "sample factor (1 is best)"))
                .arg(
                    Arg::with_name("repeat")
                        .long("repeat")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .help("loop count (-1: no loop, 0: forever)"),
                )
                .arg(number_arg("dispose", "disposal method (0-3)"))
                .arg(
                    Arg::with_name("transparent")
                        .long("transparent")
                        .takes_value(true)
                        .help("transparent color (RRGGBB)"),
                )
                .arg(
                    Arg::with_name("inline")
                        .long("inline")
                        .help("encode on the main thread"),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .required(true)
                        .help("output file"),
                )
                .arg(
                    Arg::with_name("frames")
                        .required(true)
                        .min_values(1)
                        .help("raw RGBA frame file(s)"),
                ),
        )
}

/// Create a numeric option
fn number_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name).long(name).takes_value(true).help(help)
}

/// Parse an optional value
fn parse_opt<T>(
    matches: &ArgMatches,
    name: &str,
) -> Result<Option<T>, Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    match matches.value_of(name) {
        Some(v) => Ok(Some(v.parse()?)),
        None => Ok(None),
    }
}

/// Parse an RRGGBB color
fn parse_color(hex: &str) -> Result<(u8, u8, u8), Box<dyn Error>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return Err(format!("invalid color: {}", hex).into());
    }
    let rgb = u32::from_str_radix(hex, 16)?;
    Ok(((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8))
}

/// Handle encode subcommand
fn encode(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let mut builder = Builder::default()
        .with_width(parse_opt(matches, "width")?.unwrap_or(0))
        .with_height(parse_opt(matches, "height")?.unwrap_or(0));
    if let Some(delay) = parse_opt(matches, "delay")? {
        builder = builder.with_delay_cs(delay);
    }
    if let Some(quality) = parse_opt(matches, "quality")? {
        builder = builder.with_quality(quality);
    }
    if let Some(repeat) = parse_opt::<i32>(matches, "repeat")? {
        builder = builder.with_repeat(Repeat::from(repeat));
    }
    if let Some(dispose) = parse_opt::<u8>(matches, "dispose")? {
        builder = builder.with_disposal_method(DisposalMethod::from(dispose));
    }
    if let Some(hex) = matches.value_of("transparent") {
        builder = builder.with_transparent_color(Some(parse_color(hex)?));
    }
    if matches.is_present("inline") {
        builder = builder.with_threading(Threading::Inline);
    }
    let mut writer = builder.build()?;
    let mut frames = vec![];
    if let Some(paths) = matches.values_of_os("frames") {
        frames.extend(paths);
    }
    let mut magenta = ColorSpec::new();
    magenta.set_fg(Some(Color::Magenta));
    let mut yellow = ColorSpec::new();
    yellow.set_fg(Some(Color::Yellow)).set_intense(true);
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let frame_digits = digits(frames.len()).max(3);
    for (n, path) in frames.iter().enumerate() {
        let pixels = fs::read(path)?;
        writer.encode_frame(pixels)?;
        out.set_color(&yellow)?;
        write!(out, " {:>w$}", n + 1, w = frame_digits)?;
        out.set_color(&magenta)?;
        writeln!(out, " {:?}", path)?;
    }
    let gif = writer.finish()?;
    let path = matches.value_of_os("output").unwrap_or_default();
    gif.save(path)?;
    out.set_color(&bold)?;
    writeln!(
        out,
        "{:?}: {}x{}, frames: {}, {} bytes",
        path,
        writer.width(),
        writer.height(),
        writer.frame_count(),
        gif.len()
    )?;
    Ok(())
}

/// Get the number of decimal digits in a value
fn digits<T: Into<usize>>(v: T) -> usize {
    let mut v = v.into();
    let mut d = 1;
    while v >= 10 {
        v /= 10;
        d += 1;
    }
    d
}
