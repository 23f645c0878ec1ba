// private.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
//! Private module for top-level items
use crate::block::*;
use crate::encode::encode_block;
use crate::error::{Error, Result};
use crate::frame::{FrameSource, RawFrame};
use crate::pipeline::{EncodedFrame, FrameJob, PendingFrame};
use crate::sink::ByteSink;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Media type of an encoded GIF
const MEDIA_TYPE: &str = "image/gif";

/// Animation loop setting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    /// Play once; no loop extension is written
    NoLoop,
    /// Loop forever
    Infinite,
    /// Loop a number of times
    Count(u16),
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::NoLoop
    }
}

impl From<i32> for Repeat {
    fn from(n: i32) -> Self {
        if n < 0 {
            Repeat::NoLoop
        } else if n == 0 {
            Repeat::Infinite
        } else {
            Repeat::Count(u16::try_from(n).unwrap_or(u16::MAX))
        }
    }
}

impl Repeat {
    /// Get loop count for the application extension
    pub fn loop_count(self) -> Option<u16> {
        match self {
            Repeat::NoLoop => None,
            Repeat::Infinite => Some(0),
            Repeat::Count(n) => Some(n),
        }
    }
}

/// Where frame encoding work runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Threading {
    /// Quantizer and compressor threads for each frame
    Workers,
    /// Calling thread
    Inline,
}

impl Default for Threading {
    fn default() -> Self {
        Threading::Workers
    }
}

/// Writer state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Header written, no frames yet
    AwaitingFirstFrame,
    /// At least one frame written
    Streaming,
    /// Trailer written; no more frames accepted
    Finished,
}

/// Builder for [GifWriter]
///
/// ## Example
/// ```
/// use recgif::{Builder, Repeat, Threading};
///
/// # fn main() -> recgif::Result<()> {
/// let mut writer = Builder::default()
///     .with_width(2)
///     .with_height(2)
///     .with_repeat(Repeat::Infinite)
///     .with_threading(Threading::Inline)
///     .build()?;
/// writer.encode_frame(vec![255u8, 0, 0, 255].repeat(4))?;
/// let gif = writer.finish()?;
/// assert_eq!(&gif.as_bytes()[..6], b"GIF89a");
/// # Ok(())
/// # }
/// ```
///
/// [GifWriter]: struct.GifWriter.html
#[derive(Clone, Debug)]
pub struct Builder {
    width: Option<u32>,
    height: Option<u32>,
    delay_cs: u16,
    quality: u32,
    repeat: Repeat,
    disposal: Option<DisposalMethod>,
    transparent: Option<(u8, u8, u8)>,
    threading: Threading,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            width: None,
            height: None,
            delay_cs: 10,
            quality: 10,
            repeat: Repeat::default(),
            disposal: None,
            transparent: None,
            threading: Threading::default(),
        }
    }
}

impl Builder {
    /// Set the screen width (required)
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the screen height (required)
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the frame delay in hundredths of a second
    pub fn with_delay_cs(mut self, delay_cs: u16) -> Self {
        self.delay_cs = delay_cs;
        self
    }

    /// Set the frame delay in milliseconds (rounded to hundredths)
    pub fn with_delay_ms(mut self, delay_ms: u32) -> Self {
        let cs = (u64::from(delay_ms) + 5) / 10;
        self.delay_cs = u16::try_from(cs).unwrap_or(u16::MAX);
        self
    }

    /// Set the frame delay from a frame rate; zero is ignored
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        if fps > 0 {
            let cs = (100 + u64::from(fps) / 2) / u64::from(fps);
            self.delay_cs = cs as u16;
        }
        self
    }

    /// Set the quantizer sample factor (1 is best, 10 is typical)
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality.max(1);
        self
    }

    /// Set the loop setting
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set the disposal method, overriding the transparency default
    pub fn with_disposal_method(mut self, disposal: DisposalMethod) -> Self {
        self.disposal = Some(disposal);
        self
    }

    /// Set a color for fully transparent pixels
    pub fn with_transparent_color(
        mut self,
        transparent: Option<(u8, u8, u8)>,
    ) -> Self {
        self.transparent = transparent;
        self
    }

    /// Set where frame encoding runs
    pub fn with_threading(mut self, threading: Threading) -> Self {
        self.threading = threading;
        self
    }

    /// Build the writer, writing the GIF header
    pub fn build(self) -> Result<GifWriter> {
        let width = screen_dim(self.width)?;
        let height = screen_dim(self.height)?;
        let disposal = match (self.disposal, self.transparent) {
            (Some(disposal), _) => disposal,
            (None, Some(_)) => DisposalMethod::Background,
            (None, None) => DisposalMethod::NoAction,
        };
        let mut stream = ByteSink::new();
        encode_block(&mut stream, &Header::default().into());
        debug!(
            "writer {}x{}, delay {}cs, quality {}, {:?}, {:?}",
            width, height, self.delay_cs, self.quality, self.repeat, disposal
        );
        Ok(GifWriter {
            width,
            height,
            delay_cs: self.delay_cs,
            quality: self.quality,
            repeat: self.repeat,
            disposal,
            transparent: self.transparent,
            threading: self.threading,
            stream,
            state: State::AwaitingFirstFrame,
            pending: None,
            frame_count: 0,
            gif: None,
        })
    }
}

/// Check one screen dimension
fn screen_dim(dim: Option<u32>) -> Result<u16> {
    match dim {
        Some(d) if d > 0 => {
            u16::try_from(d).map_err(|_| Error::InvalidDimensions)
        }
        _ => Err(Error::InvalidDimensions),
    }
}

/// Animated GIF writer
///
/// Frames are quantized to 256 colors, compressed and appended to an
/// in-memory stream.  Only one frame may be in flight at a time.
pub struct GifWriter {
    width: u16,
    height: u16,
    delay_cs: u16,
    quality: u32,
    repeat: Repeat,
    disposal: DisposalMethod,
    transparent: Option<(u8, u8, u8)>,
    threading: Threading,
    /// Encoded stream
    stream: ByteSink,
    state: State,
    /// Frame being encoded
    pending: Option<PendingFrame>,
    /// Number of frames written
    frame_count: usize,
    /// Sealed binary
    gif: Option<Gif>,
}

impl GifWriter {
    /// Get the screen width
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get the screen height
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get the writer state
    pub fn state(&self) -> State {
        self.state
    }

    /// Check whether a frame is in flight
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Get the number of frames written
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Get the disposal method written for each frame
    pub fn disposal_method(&self) -> DisposalMethod {
        self.disposal
    }

    /// Start encoding a frame.
    ///
    /// The previous frame is resolved first; if it is still being encoded,
    /// the new frame is rejected with `EncodingInProgress`.  With
    /// `Threading::Inline`, the frame is written before returning.
    pub fn add_frame<F: Into<FrameSource>>(&mut self, source: F) -> Result<()> {
        if self.state == State::Finished {
            return Err(Error::Finished);
        }
        if !self.poll_frame()? {
            warn!("frame rejected: frame {} in flight", self.frame_count);
            return Err(Error::EncodingInProgress);
        }
        let frame = RawFrame::new(source.into(), self.width, self.height)?;
        let job = FrameJob {
            sample_fac: self.quality,
            transparent: self.transparent,
        };
        match self.threading {
            Threading::Workers => {
                self.pending = Some(PendingFrame::spawn(frame, job)?);
            }
            Threading::Inline => {
                self.pending = Some(PendingFrame::inline(frame, job));
                self.poll_frame()?;
            }
        }
        Ok(())
    }

    /// Add a frame and wait for it to be written
    pub fn encode_frame<F: Into<FrameSource>>(
        &mut self,
        source: F,
    ) -> Result<()> {
        self.add_frame(source)?;
        self.wait()
    }

    /// Write the in-flight frame if it is ready.
    ///
    /// Returns `true` when no frame remains in flight.
    pub fn poll_frame(&mut self) -> Result<bool> {
        let res = match &self.pending {
            None => return Ok(true),
            Some(pending) => match pending.try_result() {
                Some(res) => res,
                None => return Ok(false),
            },
        };
        self.pending = None;
        self.land(res)?;
        Ok(true)
    }

    /// Wait for the in-flight frame and write it
    pub fn wait(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.take() {
            self.land(pending.result())?;
        }
        Ok(())
    }

    /// Write the trailer and seal the binary
    pub fn finish(&mut self) -> Result<Gif> {
        if self.state == State::Finished {
            return Err(Error::Finished);
        }
        self.wait()?;
        encode_block(&mut self.stream, &Trailer::default().into());
        self.state = State::Finished;
        let gif = Gif::new(self.stream.snapshot());
        debug!("finished: {} frames, {} bytes", self.frame_count, gif.len());
        self.gif = Some(gif.clone());
        Ok(gif)
    }

    /// Get the sealed binary, once finished
    pub fn gif(&self) -> Option<Gif> {
        self.gif.clone()
    }

    /// Write a resolved frame, or report its failure
    fn land(&mut self, res: Result<EncodedFrame>) -> Result<()> {
        match res {
            Ok(frame) => {
                self.write_frame(frame);
                Ok(())
            }
            Err(e) => {
                warn!("frame {} dropped: {}", self.frame_count, e);
                Err(e)
            }
        }
    }

    /// Append all records for one frame
    fn write_frame(&mut self, frame: EncodedFrame) {
        let first = self.state == State::AwaitingFirstFrame;
        let table = ColorTable::with_colors(frame.palette.colors());
        let w = &mut self.stream;
        let start = w.len();
        if first {
            let desc = LogicalScreenDesc::default()
                .with_screen_width(self.width)
                .with_screen_height(self.height)
                .with_color_table_config(&ColorTableConfig::full());
            encode_block(w, &desc.into());
            encode_block(w, &Block::GlobalColorTable(table.clone()));
            if let Some(count) = self.repeat.loop_count() {
                encode_block(w, &Application::with_loop_count(count).into());
            }
        }
        let mut control = GraphicControl::default();
        control.set_disposal_method(self.disposal);
        control.set_delay_time_cs(self.delay_cs);
        control.set_transparent_color(frame.transparent_idx);
        encode_block(w, &control.into());
        let mut desc = ImageDesc::default()
            .with_width(self.width)
            .with_height(self.height);
        if !first {
            desc = desc.with_color_table_config(&ColorTableConfig::full());
        }
        encode_block(w, &desc.into());
        if !first {
            encode_block(w, &Block::LocalColorTable(table));
        }
        encode_block(w, &ImageData::with_compressed(frame.image_data).into());
        debug!("frame {}: {} bytes", self.frame_count, w.len() - start);
        self.frame_count += 1;
        self.state = State::Streaming;
    }
}

/// Sealed GIF binary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gif {
    bytes: Arc<[u8]>,
}

impl Gif {
    fn new(bytes: Box<[u8]>) -> Self {
        Gif {
            bytes: Arc::from(bytes),
        }
    }

    /// Get the encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the binary is empty (never true for a sealed GIF)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the media type
    pub fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    /// Write the binary to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Save the binary to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn writer(builder: Builder) -> GifWriter {
        builder
            .with_width(4)
            .with_height(4)
            .with_threading(Threading::Inline)
            .build()
            .unwrap()
    }

    fn solid(rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat(16)
    }

    #[test]
    fn repeat_from() {
        assert_eq!(Repeat::from(-1), Repeat::NoLoop);
        assert_eq!(Repeat::from(0), Repeat::Infinite);
        assert_eq!(Repeat::from(5), Repeat::Count(5));
        assert_eq!(Repeat::from(100_000), Repeat::Count(u16::MAX));
        assert_eq!(Repeat::NoLoop.loop_count(), None);
        assert_eq!(Repeat::Infinite.loop_count(), Some(0));
    }

    #[test]
    fn dimensions() {
        let res = Builder::default().with_width(4).build();
        assert!(matches!(res, Err(Error::InvalidDimensions)));
        let res = Builder::default().with_width(0).with_height(4).build();
        assert!(matches!(res, Err(Error::InvalidDimensions)));
        let res = Builder::default().with_width(65_536).with_height(4).build();
        assert!(matches!(res, Err(Error::InvalidDimensions)));
        let w = Builder::default().with_width(65_535).with_height(1).build();
        assert_eq!(w.unwrap().width(), 65_535);
    }

    #[test]
    fn delays() {
        let b = Builder::default();
        assert_eq!(b.delay_cs, 10);
        assert_eq!(b.clone().with_delay_ms(125).delay_cs, 13);
        assert_eq!(b.clone().with_delay_ms(124).delay_cs, 12);
        assert_eq!(b.clone().with_frame_rate(3).delay_cs, 33);
        assert_eq!(b.clone().with_frame_rate(8).delay_cs, 13);
        assert_eq!(b.clone().with_frame_rate(0).delay_cs, 10);
        assert_eq!(b.with_quality(0).quality, 1);
    }

    #[test]
    fn disposal_precedence() {
        let w = writer(Builder::default());
        assert_eq!(w.disposal_method(), DisposalMethod::NoAction);
        let w = writer(Builder::default().with_transparent_color(Some((0, 0, 0))));
        assert_eq!(w.disposal_method(), DisposalMethod::Background);
        let w = writer(
            Builder::default()
                .with_transparent_color(Some((0, 0, 0)))
                .with_disposal_method(DisposalMethod::Keep),
        );
        assert_eq!(w.disposal_method(), DisposalMethod::Keep);
    }

    #[test]
    fn states() {
        let mut w = writer(Builder::default());
        assert_eq!(w.state(), State::AwaitingFirstFrame);
        assert_eq!(w.stream.as_slice(), b"GIF89a");
        w.add_frame(solid([1, 2, 3, 255])).unwrap();
        assert_eq!(w.state(), State::Streaming);
        assert!(!w.is_busy());
        assert_eq!(w.frame_count(), 1);
        assert!(w.gif().is_none());
        let gif = w.finish().unwrap();
        assert_eq!(w.state(), State::Finished);
        assert_eq!(w.gif(), Some(gif.clone()));
        assert_eq!(gif.as_bytes().last(), Some(&0x3B));
        assert_eq!(gif.media_type(), "image/gif");
        assert!(matches!(w.finish(), Err(Error::Finished)));
        let res = w.add_frame(solid([1, 2, 3, 255]));
        assert!(matches!(res, Err(Error::Finished)));
    }

    #[test]
    fn failed_frame_is_not_written() {
        let mut w = writer(Builder::default());
        w.encode_frame(solid([9, 9, 9, 255])).unwrap();
        let len = w.stream.len();
        w.pending = Some(PendingFrame::abandoned());
        assert!(w.is_busy());
        assert!(matches!(w.wait(), Err(Error::WorkerFailed)));
        assert_eq!(w.stream.len(), len);
        assert_eq!(w.frame_count(), 1);
        assert!(!w.is_busy());
        w.encode_frame(solid([9, 9, 9, 255])).unwrap();
        assert_eq!(w.frame_count(), 2);
    }

    #[test]
    fn wrong_frame_size() {
        let mut w = writer(Builder::default());
        let res = w.add_frame(vec![0u8; 12]);
        assert!(matches!(res, Err(Error::InvalidFrameDimensions)));
        assert_eq!(w.state(), State::AwaitingFirstFrame);
        assert_eq!(w.stream.len(), 6);
    }

    #[test]
    fn save_file() {
        let mut w = writer(Builder::default());
        w.encode_frame(solid([0, 0, 0, 255])).unwrap();
        let gif = w.finish().unwrap();
        let path = std::env::temp_dir().join("recgif-save-test.gif");
        gif.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), gif.as_bytes());
        std::fs::remove_file(&path).unwrap();
    }
}
