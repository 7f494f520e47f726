//! Offscreen RGBA drawing surface used for both the capture and the preview.

use std::io::Cursor;

use facegate_types::{capture::Frame, Result};
use image::{
    imageops::{self, FilterType},
    DynamicImage, ImageOutputFormat, Rgba, RgbaImage,
};

use crate::{
    capture_error,
    data_uri::{self, PayloadEncoding},
    encoding_error,
};

/// Neutral grey shown before anything has been captured.
pub const PLACEHOLDER_COLOR: [u8; 4] = [0xAA, 0xAA, 0xAA, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    /// Lossless; used for everything that gets uploaded.
    Png,
    Jpeg { quality: u8 },
}

impl SurfaceFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            SurfaceFormat::Png => "image/png",
            SurfaceFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawingSurface {
    canvas: RgbaImage,
}

impl DrawingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Changing the size discards the current contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbaImage::new(width, height);
        }
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba(color);
        }
    }

    /// Draws `frame` scaled to cover the whole surface.
    pub fn draw_frame(&mut self, frame: &Frame) -> Result<()> {
        let source = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| capture_error("frame buffer does not match its dimensions"))?;
        let (width, height) = self.canvas.dimensions();
        self.canvas = if source.dimensions() == (width, height) {
            source
        } else {
            imageops::resize(&source, width, height, FilterType::Triangle)
        };
        Ok(())
    }

    pub fn encode(&self, format: SurfaceFormat) -> Result<Vec<u8>> {
        if self.width() == 0 || self.height() == 0 {
            return Err(encoding_error("cannot encode an empty surface"));
        }
        let mut buffer = Cursor::new(Vec::new());
        let rgba = DynamicImage::ImageRgba8(self.canvas.clone());
        let written = match format {
            SurfaceFormat::Png => rgba.write_to(&mut buffer, ImageOutputFormat::Png),
            SurfaceFormat::Jpeg { quality } => DynamicImage::ImageRgb8(rgba.to_rgb8())
                .write_to(&mut buffer, ImageOutputFormat::Jpeg(quality)),
        };
        written.map_err(|err| encoding_error(format!("{} encoding failed: {err}", format.mime())))?;
        Ok(buffer.into_inner())
    }

    pub fn to_data_url(&self, format: SurfaceFormat) -> Result<String> {
        let bytes = self.encode(format)?;
        Ok(data_uri::encode(format.mime(), &bytes, PayloadEncoding::Base64))
    }
}
