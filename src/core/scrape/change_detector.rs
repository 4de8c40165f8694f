use super::frame::intensity;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeConfig {
    /// Changed-pixel count above which the region is still moving
    pub threshold: usize,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self { threshold: 5000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    /// 首帧，无参照
    First,
    Changing,
    Settled,
}

/// 滚动检测 - 对比相邻两帧的差异像素数
pub struct ChangeDetector {
    threshold: usize,
    last: Option<RgbImage>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::with_threshold(ChangeConfig::default().threshold)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Pixels whose absolute per-channel difference has non-zero intensity.
    pub fn pixel_difference(prev: &RgbImage, curr: &RgbImage) -> Option<usize> {
        if prev.dimensions() != curr.dimensions() {
            return None;
        }
        let changed = prev
            .pixels()
            .zip(curr.pixels())
            .filter(|(a, b)| {
                let diff = Rgb([
                    a.0[0].abs_diff(b.0[0]),
                    a.0[1].abs_diff(b.0[1]),
                    a.0[2].abs_diff(b.0[2]),
                ]);
                intensity(&diff) > 0
            })
            .count();
        Some(changed)
    }

    pub fn is_settled(&self, prev: &RgbImage, curr: &RgbImage) -> bool {
        match Self::pixel_difference(prev, curr) {
            Some(changed) => changed <= self.threshold,
            None => false,
        }
    }

    pub fn observe(&mut self, curr: &RgbImage) -> ScrollState {
        let state = match self.last.as_ref() {
            None => ScrollState::First,
            Some(prev) if self.is_settled(prev, curr) => ScrollState::Settled,
            Some(_) => ScrollState::Changing,
        };
        self.last = Some(curr.clone());
        state
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}
