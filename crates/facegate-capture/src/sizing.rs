//! Display sizing derived from the stream's native aspect ratio.

use facegate_types::capture::StreamInfo;

/// Fallback aspect ratio (width / height) for streams that report no usable size.
pub const FALLBACK_ASPECT: f64 = 4.0 / 3.0;
/// Tallest surface allowed, as a multiple of its width.
pub const MAX_HEIGHT_FACTOR: u32 = 16;

/// Display height for `target_width` that keeps the stream's aspect ratio.
///
/// Streams whose ratio cannot be computed (zero or unknown dimensions) get a
/// 4:3 height instead.
pub fn display_height(target_width: u32, stream: StreamInfo) -> f64 {
    let width = f64::from(target_width);
    let height = stream.height / (stream.width / width);
    if height.is_finite() {
        height
    } else {
        width / FALLBACK_ASPECT
    }
}

/// Fixed surface size chosen once per stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: f64,
}

impl DisplaySize {
    pub fn calibrate(target_width: u32, stream: StreamInfo) -> Self {
        Self {
            width: target_width,
            height: display_height(target_width, stream),
        }
    }

    /// Height in whole pixels for the drawing surface, capped at
    /// [`MAX_HEIGHT_FACTOR`] times the width.
    pub fn pixel_height(&self) -> u32 {
        if !self.height.is_finite() || self.height <= 0.0 {
            return 0;
        }
        let cap = self.width.saturating_mul(MAX_HEIGHT_FACTOR);
        (self.height.round() as u32).min(cap)
    }

    /// Capturing needs both dimensions known and non-zero.
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.pixel_height() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn keeps_native_aspect_ratio() {
        assert!(close(display_height(320, StreamInfo::new(640.0, 480.0)), 240.0));
        assert!(close(display_height(320, StreamInfo::new(1280.0, 720.0)), 180.0));
        let odd = display_height(320, StreamInfo::new(1000.0, 777.0));
        assert!(close(odd, 320.0 / (1000.0 / 777.0)));
    }

    #[test]
    fn indeterminate_ratio_falls_back_to_four_by_three() {
        assert!(close(display_height(320, StreamInfo::new(0.0, 0.0)), 240.0));
        assert!(close(display_height(320, StreamInfo::new(f64::NAN, 480.0)), 240.0));
        assert!(close(display_height(320, StreamInfo::new(0.0, 480.0)), 240.0));
        assert!(close(display_height(400, StreamInfo::default()), 300.0));
    }

    #[test]
    fn drawable_only_with_both_dimensions() {
        let size = DisplaySize::calibrate(320, StreamInfo::new(640.0, 480.0));
        assert_eq!(size.pixel_height(), 240);
        assert!(size.is_drawable());

        let flat = DisplaySize::calibrate(320, StreamInfo::new(640.0, 0.0));
        assert_eq!(flat.pixel_height(), 0);
        assert!(!flat.is_drawable());

        let narrow = DisplaySize::calibrate(0, StreamInfo::new(640.0, 480.0));
        assert!(!narrow.is_drawable());
    }

    #[test]
    fn extreme_portrait_streams_are_capped() {
        let sliver = DisplaySize::calibrate(320, StreamInfo::new(1.0, 100_000.0));
        assert!(close(sliver.height, 32_000_000.0));
        assert_eq!(sliver.pixel_height(), 320 * MAX_HEIGHT_FACTOR);
        assert!(sliver.is_drawable());

        let wide = DisplaySize::calibrate(u32::MAX, StreamInfo::new(1.0, 100_000.0));
        assert_eq!(wide.pixel_height(), u32::MAX);
    }
}
