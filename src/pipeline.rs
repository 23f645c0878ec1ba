// pipeline.rs
//
// Copyright (c) 2020-2023  Douglas Lau
//
//! Per-frame encoding: quantize, index and compress
use crate::error::{Error, Result};
use crate::frame::RawFrame;
use crate::lzw::Compressor;
use crate::neuquant::{quantize, Palette, Quantized};
use crate::sink::ByteSink;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Bits per palette index
const COLOR_DEPTH: u8 = 8;

/// Settings for encoding one frame
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameJob {
    /// Quantizer sample factor
    pub sample_fac: u32,
    /// Color to use for fully transparent pixels
    pub transparent: Option<(u8, u8, u8)>,
}

/// Frame ready to be written to the stream
#[derive(Debug)]
pub(crate) struct EncodedFrame {
    /// Palette for the frame's color table
    pub palette: Palette,
    /// Transparent palette index
    pub transparent_idx: Option<u8>,
    /// LZW image data, including code size and terminator
    pub image_data: Vec<u8>,
}

/// Quantizer output, handed to the compressor
struct IndexedFrame {
    palette: Palette,
    transparent_idx: Option<u8>,
    indices: Vec<u8>,
}

/// Quantize a frame and map its pixels to palette indices
fn index_frame(frame: &RawFrame, job: FrameJob) -> IndexedFrame {
    let rgb = frame.strip_alpha();
    let Quantized {
        palette,
        mut indices,
        usage,
    } = quantize(&rgb, job.sample_fac);
    let transparent_idx = job
        .transparent
        .map(|(r, g, b)| palette.find_closest(r, g, b, &usage));
    if let Some(idx) = transparent_idx {
        for (i, alpha) in indices.iter_mut().zip(frame.alphas()) {
            if alpha == 0 {
                *i = idx;
            }
        }
    }
    IndexedFrame {
        palette,
        transparent_idx,
        indices,
    }
}

/// Compress indexed pixels
fn compress_frame(frame: IndexedFrame) -> Result<EncodedFrame> {
    let mut sink = ByteSink::with_capacity(frame.indices.len() / 2 + 16);
    Compressor::new(COLOR_DEPTH).compress(&frame.indices, &mut sink)?;
    Ok(EncodedFrame {
        palette: frame.palette,
        transparent_idx: frame.transparent_idx,
        image_data: sink.into_inner(),
    })
}

/// Frame in flight; the result is delivered over a channel
pub(crate) struct PendingFrame {
    rx: Receiver<Result<EncodedFrame>>,
}

impl PendingFrame {
    /// Encode a frame on the calling thread
    pub fn inline(frame: RawFrame, job: FrameJob) -> Self {
        let (tx, rx) = mpsc::channel();
        // receiver is alive, so this cannot fail
        let _ = tx.send(compress_frame(index_frame(&frame, job)));
        PendingFrame { rx }
    }

    /// Encode a frame on a quantizer thread feeding a compressor thread
    pub fn spawn(frame: RawFrame, job: FrameJob) -> Result<Self> {
        let (tx_indexed, rx_indexed) = mpsc::channel();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("recgif-quantize".into())
            .spawn(move || {
                let _ = tx_indexed.send(index_frame(&frame, job));
            })?;
        thread::Builder::new()
            .name("recgif-compress".into())
            .spawn(move || {
                let res = match rx_indexed.recv() {
                    Ok(indexed) => compress_frame(indexed),
                    Err(_) => Err(Error::WorkerFailed),
                };
                let _ = tx.send(res);
            })?;
        Ok(PendingFrame { rx })
    }

    /// Check for the result without blocking
    pub fn try_result(&self) -> Option<Result<EncodedFrame>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerFailed)),
        }
    }

    /// Block until the result is available
    pub fn result(self) -> Result<EncodedFrame> {
        match self.rx.recv() {
            Ok(res) => res,
            Err(_) => Err(Error::WorkerFailed),
        }
    }

    /// Frame whose workers went away without a result
    #[cfg(test)]
    pub fn abandoned() -> Self {
        let (_tx, rx) = mpsc::channel();
        PendingFrame { rx }
    }
}
