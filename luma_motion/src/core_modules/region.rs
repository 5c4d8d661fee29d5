// THEORY:
// The `region` module turns grid components into the detector's output: axis-aligned
// rectangles in full-resolution pixel coordinates.
//
// Key architectural principles:
// 1.  **Second Size Floor**: the labeler already dropped tiny components. Here a
//     configurable minimum motion area, given in full-resolution pixels, is
//     converted to grid cells (`min_area / scale²`) and applied again.
// 2.  **Back To Full Resolution**: the grid bounding box is multiplied by `scale`,
//     padded outwards by `scale` pixels and clamped to the frame.
// 3.  **Hard Cap**: extraction stops once `max_objects` regions exist. The cap is a
//     latency and readability limit; which components make it depends only on scan
//     order.
// 4.  **Dumb Output Container**: a `Region` is plain data. Drawing it is the
//     consumer's job; `to_display` offers the one supported coordinate mapping.

use crate::core_modules::connected_components::ComponentSet;

/// A detected moving area, `left < right` and `top < bottom`, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Maps the region from frame space onto a display surface by scaling each
    /// axis by `display / frame`. No mirroring or rotation is applied; a host
    /// that shows a mirrored preview flips the result itself.
    pub fn to_display(
        &self,
        frame_width: u32,
        frame_height: u32,
        display_width: f32,
        display_height: f32,
    ) -> DisplayRect {
        let sx = display_width / frame_width.max(1) as f32;
        let sy = display_height / frame_height.max(1) as f32;
        DisplayRect {
            left: self.left as f32 * sx,
            top: self.top as f32 * sy,
            right: self.right as f32 * sx,
            bottom: self.bottom as f32 * sy,
        }
    }
}

/// A region mapped onto a display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Converts components into capped, padded, clamped regions.
#[derive(Debug, Clone, Copy)]
pub struct RegionExtractor {
    pub min_area: u32,
    pub max_objects: usize,
}

impl RegionExtractor {
    pub fn new(min_area: u32, max_objects: usize) -> Self {
        Self {
            min_area,
            max_objects,
        }
    }

    /// The minimum component size in grid cells for a given scale.
    pub fn min_cells(&self, scale: u32) -> usize {
        let cell_area = scale.max(1) * scale.max(1);
        (self.min_area / cell_area) as usize
    }

    /// Extends `out` with up to `max_objects` regions.
    pub fn extract_into(
        &self,
        components: &ComponentSet,
        scale: u32,
        width: u32,
        height: u32,
        out: &mut Vec<Region>,
    ) {
        let min_cells = self.min_cells(scale);
        let padding = scale;

        for component in components.iter() {
            if out.len() >= self.max_objects {
                break;
            }
            if component.len() < min_cells {
                continue;
            }

            let bbox = component.bounding_box();
            if bbox.max_x <= bbox.min_x || bbox.max_y <= bbox.min_y {
                continue;
            }

            let left = (bbox.min_x as u32 * scale).saturating_sub(padding);
            let top = (bbox.min_y as u32 * scale).saturating_sub(padding);
            let right = (bbox.max_x as u32 * scale + padding).min(width);
            let bottom = (bbox.max_y as u32 * scale + padding).min(height);

            if right > left && bottom > top {
                out.push(Region {
                    left,
                    top,
                    right,
                    bottom,
                });
            }
        }
    }

    pub fn extract(
        &self,
        components: &ComponentSet,
        scale: u32,
        width: u32,
        height: u32,
    ) -> Vec<Region> {
        let mut out = Vec::with_capacity(self.max_objects);
        self.extract_into(components, scale, width, height, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::connected_components::label;
    use crate::core_modules::motion_mask::MotionMask;

    fn components_for(
        blocks: &[(usize, usize, usize, usize)],
        width: usize,
        height: usize,
    ) -> ComponentSet {
        let mut mask = MotionMask::new(width, height);
        for &(x0, y0, w, h) in blocks {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    mask.set(x, y, true);
                }
            }
        }
        label(&mask, 0).unwrap()
    }

    #[test]
    fn region_is_scaled_padded_and_clamped() {
        let set = components_for(&[(3, 3, 5, 5)], 16, 16);
        let regions = RegionExtractor::new(16, 3).extract(&set, 4, 64, 64);
        assert_eq!(
            regions,
            vec![Region {
                left: 8,
                top: 8,
                right: 32,
                bottom: 32
            }]
        );
    }

    #[test]
    fn edges_clamp_to_frame() {
        let set = components_for(&[(0, 0, 4, 4), (12, 12, 4, 4)], 16, 16);
        let regions = RegionExtractor::new(0, 3).extract(&set, 4, 62, 62);
        assert_eq!(regions[0].left, 0);
        assert_eq!(regions[0].top, 0);
        assert_eq!(regions[1].right, 62);
        assert_eq!(regions[1].bottom, 62);
    }

    #[test]
    fn min_area_is_converted_to_cells() {
        let extractor = RegionExtractor::new(400, 3);
        assert_eq!(extractor.min_cells(4), 25);
        assert_eq!(extractor.min_cells(6), 11);

        // 5x5 = 25 cells passes at scale 4, 4x6 = 24 does not.
        let set = components_for(&[(1, 1, 5, 5), (10, 1, 4, 6)], 20, 20);
        let regions = extractor.extract(&set, 4, 80, 80);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].left, 0);
    }

    #[test]
    fn flat_components_are_dropped() {
        let set = components_for(&[(2, 2, 12, 1), (2, 6, 1, 9)], 20, 20);
        assert!(RegionExtractor::new(0, 3).extract(&set, 4, 80, 80).is_empty());
    }

    #[test]
    fn output_is_capped_in_scan_order() {
        let set = components_for(
            &[(1, 1, 2, 2), (5, 1, 2, 2), (9, 1, 2, 2), (13, 1, 6, 6)],
            20,
            20,
        );
        let regions = RegionExtractor::new(0, 3).extract(&set, 4, 80, 80);
        assert_eq!(regions.len(), 3);
        // The largest component seeds last and falls outside the cap.
        assert!(regions.iter().all(|r| r.width() == 12));
    }

    #[test]
    fn display_mapping_scales_each_axis() {
        let region = Region {
            left: 160,
            top: 90,
            right: 320,
            bottom: 180,
        };
        let rect = region.to_display(640, 360, 1280.0, 1080.0);
        assert_eq!(
            rect,
            DisplayRect {
                left: 320.0,
                top: 270.0,
                right: 640.0,
                bottom: 540.0
            }
        );
        assert_eq!(region.area(), 160 * 90);
        assert!(region.contains(160, 90));
        assert!(!region.contains(320, 100));
    }
}
