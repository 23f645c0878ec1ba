// frame.rs
//
// Copyright (c) 2020-2023  Douglas Lau
//
//! Frame sources
use crate::error::{Error, Result};
use pix::rgb::SRgba8;
use pix::Raster;

/// Source of pixels for one frame
pub enum FrameSource {
    /// Rendered raster; the top-left screen-sized region is used
    Surface(Raster<SRgba8>),
    /// Packed RGBA bytes, row-major, exactly screen-sized
    Pixels(Vec<u8>),
}

impl From<Raster<SRgba8>> for FrameSource {
    fn from(raster: Raster<SRgba8>) -> Self {
        FrameSource::Surface(raster)
    }
}

impl From<Vec<u8>> for FrameSource {
    fn from(pixels: Vec<u8>) -> Self {
        FrameSource::Pixels(pixels)
    }
}

/// Frame normalized to packed RGBA bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    width: u16,
    height: u16,
    rgba: Vec<u8>,
}

impl RawFrame {
    /// Normalize a frame source to the given size
    pub fn new(source: FrameSource, width: u16, height: u16) -> Result<Self> {
        let row_sz = usize::from(width) * 4;
        let len = row_sz * usize::from(height);
        let rgba = match source {
            FrameSource::Pixels(rgba) => {
                if rgba.len() != len {
                    return Err(Error::InvalidFrameDimensions);
                }
                rgba
            }
            FrameSource::Surface(raster) => {
                if raster.width() < u32::from(width)
                    || raster.height() < u32::from(height)
                {
                    return Err(Error::InvalidFrameDimensions);
                }
                let stride = (raster.width() as usize * 4).max(4);
                let buf = raster.as_u8_slice();
                let mut rgba = Vec::with_capacity(len);
                for row in buf.chunks_exact(stride).take(height.into()) {
                    rgba.extend_from_slice(&row[..row_sz]);
                }
                rgba
            }
        };
        Ok(RawFrame {
            width,
            height,
            rgba,
        })
    }

    /// Get the width
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get the height
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get packed RGBA bytes
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Get packed RGB bytes, dropping alpha
    pub fn strip_alpha(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.rgba.len() / 4 * 3);
        for p in self.rgba.chunks_exact(4) {
            rgb.extend_from_slice(&p[..3]);
        }
        rgb
    }

    /// Get alpha for each pixel
    pub fn alphas(&self) -> impl Iterator<Item = u8> + '_ {
        self.rgba.chunks_exact(4).map(|p| p[3])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pixels() {
        let rgba = vec![1u8, 2, 3, 255, 4, 5, 6, 0];
        let frame = RawFrame::new(rgba.clone().into(), 2, 1).unwrap();
        assert_eq!(frame.rgba(), &rgba[..]);
        assert_eq!(frame.strip_alpha(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.alphas().collect::<Vec<_>>(), [255, 0]);
    }

    #[test]
    fn pixels_wrong_size() {
        let res = RawFrame::new(vec![0u8; 15].into(), 2, 2);
        assert!(matches!(res, Err(Error::InvalidFrameDimensions)));
        let res = RawFrame::new(vec![0u8; 20].into(), 2, 2);
        assert!(matches!(res, Err(Error::InvalidFrameDimensions)));
    }

    #[test]
    fn surface_crop() {
        let mut raster = Raster::<SRgba8>::with_clear(3, 3);
        *raster.pixel_mut(0, 0) = SRgba8::new(10, 20, 30, 255);
        *raster.pixel_mut(1, 1) = SRgba8::new(40, 50, 60, 255);
        *raster.pixel_mut(2, 2) = SRgba8::new(70, 80, 90, 255);
        let frame = RawFrame::new(raster.into(), 2, 2).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(
            frame.rgba(),
            &[10, 20, 30, 255, 0, 0, 0, 0, 0, 0, 0, 0, 40, 50, 60, 255][..]
        );
    }

    #[test]
    fn surface_too_small() {
        let raster = Raster::<SRgba8>::with_clear(4, 1);
        let res = RawFrame::new(raster.into(), 2, 2);
        assert!(matches!(res, Err(Error::InvalidFrameDimensions)));
    }
}
