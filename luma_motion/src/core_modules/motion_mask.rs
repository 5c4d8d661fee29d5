// THEORY:
// The motion mask is the first analysis stage. It compares two luma planes and
// flags every sampled position whose brightness moved beyond a fixed threshold.
//
// Key architectural principles:
// 1.  **Downsampled Differencing**: Per-pixel differencing at 1080p does not fit the
//     frame budget, so the frames are sampled every `scale` pixels in both axes.
//     That cuts the work by `scale²` and fixes the grid everything downstream runs on.
// 2.  **Geometry Is Per Call**: `scale` is derived from the current frame's
//     dimensions on every call. Nothing is cached against an older geometry.
// 3.  **Reusable Storage**: `build_into` writes every cell of a caller-owned
//     `MotionMask`, so the detector can keep one mask alive across frames.
// 4.  **Pure**: the builder holds only configuration. Two equal inputs always give
//     the same mask.

use crate::core_modules::luma_frame::LumaFrame;
use crate::error::{DetectError, DetectResult};

/// Clears `buf` and refills it with `len` copies of `fill`, reporting a failed
/// reservation instead of aborting.
pub(crate) fn reserve_cells<T: Clone>(buf: &mut Vec<T>, len: usize, fill: T) -> DetectResult<()> {
    buf.clear();
    buf.try_reserve_exact(len)
        .map_err(|_| DetectError::ResourceExhaustion { cells: len })?;
    buf.resize(len, fill);
    Ok(())
}

/// A dense boolean grid, one cell per downsampled pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionMask {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl MotionMask {
    /// An all-off mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    /// Builds a mask from a row-major cell vector.
    pub fn from_cells(width: usize, height: usize, cells: Vec<bool>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self { width, height, cells }
    }

    /// Resizes to the given grid and clears every cell.
    pub fn resize(&mut self, width: usize, height: usize) -> DetectResult<()> {
        reserve_cells(&mut self.cells, width * height, false)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Makes sure the mask has the given grid. Cell contents are unspecified
    /// afterwards unless a resize happened.
    pub(crate) fn ensure_size(&mut self, width: usize, height: usize) -> DetectResult<()> {
        if self.width != width || self.height != height || self.cells.len() != width * height {
            self.resize(width, height)?;
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.cells[y * self.width + x] = on;
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [bool] {
        &mut self.cells
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    pub fn count_on(&self) -> usize {
        self.cells.iter().filter(|&&on| on).count()
    }
}

/// Picks the downsample factor from the frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleRule {
    pub low_res: u32,
    pub high_res: u32,
    pub high_res_width: u32,
    pub high_res_height: u32,
}

impl ScaleRule {
    pub fn for_geometry(&self, width: u32, height: u32) -> u32 {
        if width >= self.high_res_width || height >= self.high_res_height {
            self.high_res
        } else {
            self.low_res
        }
    }
}

/// What one mask pass produced, besides the mask itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskSummary {
    pub scale: u32,
    pub grid_width: usize,
    pub grid_height: usize,
    /// Number of cells set in the mask.
    pub motion_pixels: usize,
}

/// Builds binary motion masks from pairs of luma frames.
#[derive(Debug, Clone, Copy)]
pub struct MotionMaskBuilder {
    threshold: u8,
    scale_rule: ScaleRule,
}

impl MotionMaskBuilder {
    pub fn new(threshold: u8, scale_rule: ScaleRule) -> Self {
        Self {
            threshold,
            scale_rule,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Grid dimensions and scale for a frame geometry.
    pub fn grid_for(&self, width: u32, height: u32) -> (usize, usize, u32) {
        let scale = self.scale_rule.for_geometry(width, height).max(1);
        (
            (width / scale) as usize,
            (height / scale) as usize,
            scale,
        )
    }

    /// Allocating variant of [`build_into`](Self::build_into).
    pub fn build(
        &self,
        prev: &LumaFrame,
        curr: &LumaFrame,
    ) -> DetectResult<(MotionMask, MaskSummary)> {
        let mut mask = MotionMask::default();
        let summary = self.build_into(prev, curr, &mut mask)?;
        Ok((mask, summary))
    }

    /// Differences `prev` against `curr` into `mask`, resizing it to the grid
    /// when needed. Geometry comes from `curr` and must fit in its buffer.
    pub fn build_into(
        &self,
        prev: &LumaFrame,
        curr: &LumaFrame,
        mask: &mut MotionMask,
    ) -> DetectResult<MaskSummary> {
        if prev.is_empty() || curr.is_empty() {
            return Err(DetectError::EmptyInput);
        }
        if prev.byte_len() != curr.byte_len() {
            return Err(DetectError::GeometryMismatch {
                previous: prev.byte_len(),
                current: curr.byte_len(),
            });
        }
        let plane = curr.width as u64 * curr.height as u64;
        if plane > curr.byte_len() as u64 {
            return Err(DetectError::MalformedFrame {
                width: curr.width,
                height: curr.height,
                bytes: curr.byte_len(),
            });
        }

        let width = curr.width as usize;
        let (grid_width, grid_height, scale) = self.grid_for(curr.width, curr.height);
        mask.ensure_size(grid_width, grid_height)?;

        let prev_luma = prev.luma();
        let curr_luma = curr.luma();
        let step = scale as usize;
        let threshold = self.threshold as i16;
        let cells = mask.cells_mut();
        let mut motion_pixels = 0;

        for y in 0..grid_height {
            let row = y * step * width;
            for x in 0..grid_width {
                let i = row + x * step;
                let on = match (prev_luma.get(i), curr_luma.get(i)) {
                    (Some(&p), Some(&c)) => (c as i16 - p as i16).abs() > threshold,
                    _ => false,
                };
                cells[y * grid_width + x] = on;
                motion_pixels += on as usize;
            }
        }

        Ok(MaskSummary {
            scale,
            grid_width,
            grid_height,
            motion_pixels,
        })
    }
}
