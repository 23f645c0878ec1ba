// lib.rs      recgif crate.
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! Animated GIF encoder.
//!
//! Frames are quantized to 256 colors with a NeuQuant network, compressed
//! with LZW and written to an in-memory GIF89a stream.
#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod block;
mod encode;
mod error;
mod frame;
pub mod lzw;
pub mod neuquant;
mod pipeline;
mod private;
pub mod sink;

pub use crate::error::{Error, Result};
pub use crate::frame::{FrameSource, RawFrame};
pub use crate::private::{Builder, Gif, GifWriter, Repeat, State, Threading};
