use image::imageops;
use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage, SubImage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 捕获帧（RGB，alpha 已由采集端去除）
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp_ms: u64, frame_number: u64) -> Self {
        Self {
            image,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    /// Builds a frame from a tightly packed RGBA buffer by dropping alpha.
    pub fn from_rgba(
        width: u32,
        height: u32,
        data: &[u8],
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        for chunk in data.chunks_exact(4) {
            rgb.push(chunk[0]); // R
            rgb.push(chunk[1]); // G
            rgb.push(chunk[2]); // B
        }
        let image = RgbImage::from_raw(width, height, rgb)?;
        Some(Self::new(image, timestamp_ms, frame_number))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo::from_frame(self)
    }
}

/// 帧元数据（轻量级，用于传递信息）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            timestamp_ms: frame.timestamp.as_millis() as u64,
            frame_number: frame.frame_number,
        }
    }
}

/// Axis-aligned region in frame pixel coordinates. Width and height are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Intersects with `[0, frame_width) x [0, frame_height)`.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<Rectangle> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let right = self.right().min(frame_width);
        let bottom = self.bottom().min(frame_height);
        Rectangle::new(self.x, self.y, right - self.x, bottom - self.y)
    }

    pub fn translate(&self, dx: u32, dy: u32) -> Rectangle {
        Rectangle {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Rectangle of the same size anchored at the origin.
    pub fn local(&self) -> Rectangle {
        Rectangle {
            x: 0,
            y: 0,
            ..*self
        }
    }

    pub fn to_draw_rect(&self) -> imageproc::rect::Rect {
        imageproc::rect::Rect::at(self.x as i32, self.y as i32).of_size(self.width, self.height)
    }
}

/// Borrowed view of `rect` inside `image`, clipped to its bounds.
pub fn crop_view<'a>(image: &'a RgbImage, rect: &Rectangle) -> Option<SubImage<&'a RgbImage>> {
    let clipped = rect.clip(image.width(), image.height())?;
    Some(imageops::crop_imm(
        image,
        clipped.x,
        clipped.y,
        clipped.width,
        clipped.height,
    ))
}

/// Owned copy of `rect` inside `image`, clipped to its bounds.
pub fn crop_owned(image: &RgbImage, rect: &Rectangle) -> Option<RgbImage> {
    crop_view(image, rect).map(|view| view.to_image())
}

/// ITU-R BT.601 整数灰度
pub fn intensity(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

pub fn to_intensity<I>(view: &I) -> GrayImage
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let (width, height) = view.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([intensity(&view.get_pixel(x, y))])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_rgba_strips_alpha() {
        let data = vec![10u8, 20, 30, 255, 40, 50, 60, 0];
        let frame = Frame::from_rgba(2, 1, &data, 1000, 7).unwrap();

        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.image.get_pixel(1, 0).0, [40, 50, 60]);
        assert_eq!(frame.info().timestamp_ms, 1000);
        assert_eq!(frame.info().frame_number, 7);
    }

    #[test]
    fn test_frame_from_rgba_rejects_bad_length() {
        assert!(Frame::from_rgba(2, 2, &[0u8; 7], 0, 0).is_none());
    }

    #[test]
    fn test_rectangle_rejects_zero_size() {
        assert!(Rectangle::new(0, 0, 0, 5).is_none());
        assert!(Rectangle::new(0, 0, 5, 0).is_none());
    }

    #[test]
    fn test_rectangle_derived_values() {
        let rect = Rectangle::new(10, 20, 30, 41).unwrap();
        assert_eq!(rect.area(), 1230);
        assert_eq!(rect.center(), (25, 40));
        assert_eq!(rect.right(), 40);
        assert_eq!(rect.bottom(), 61);
    }

    #[test]
    fn test_clip_is_idempotent() {
        let cases = [
            Rectangle::new(90, 90, 50, 50).unwrap(),
            Rectangle::new(0, 0, 100, 100).unwrap(),
            Rectangle::new(5, 95, 200, 3).unwrap(),
            Rectangle::new(10, 10, 1, 1).unwrap(),
        ];
        for rect in cases {
            let once = rect.clip(100, 100).unwrap();
            assert_eq!(once.clip(100, 100), Some(once));
            assert!(once.right() <= 100 && once.bottom() <= 100);
        }
    }

    #[test]
    fn test_clip_outside_frame() {
        let rect = Rectangle::new(100, 0, 10, 10).unwrap();
        assert_eq!(rect.clip(100, 100), None);
    }

    #[test]
    fn test_crop_view_clamps_to_bounds() {
        let image = RgbImage::from_pixel(50, 40, Rgb([1, 2, 3]));
        let rect = Rectangle::new(40, 30, 100, 100).unwrap();
        let view = crop_view(&image, &rect).unwrap();
        assert_eq!(view.dimensions(), (10, 10));
    }

    #[test]
    fn test_intensity_extremes() {
        assert_eq!(intensity(&Rgb([255, 255, 255])), 255);
        assert_eq!(intensity(&Rgb([0, 0, 0])), 0);
        assert_eq!(intensity(&Rgb([225, 225, 225])), 225);
    }
}
