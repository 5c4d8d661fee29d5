// THEORY:
// `morphology` is the noise-suppression stage. Sensor noise and compression
// artifacts light up isolated mask cells or thin streaks; real motion shows up as
// solid blobs. A morphological "opening" separates the two:
//
// 1.  **Erosion**: an interior cell survives only if its whole 3x3 neighbourhood
//     is on. Isolated cells and one-cell-wide lines vanish.
// 2.  **Dilation**: an interior cell is switched on if anything in its 3x3
//     neighbourhood survived erosion. Surviving blobs grow back to their
//     original footprint.
// 3.  **Dead Border**: the outermost ring of cells is never evaluated and stays off
//     in both passes. A grid thinner than three cells therefore opens to nothing.
// 4.  **Stateless Utility**: like the blob detector before it, this is a pure
//     function of its input mask. The `_into` variant reuses caller buffers.

use crate::core_modules::motion_mask::MotionMask;

pub mod morphology {
    use super::*;
    use crate::error::DetectResult;

    /// Erosion followed by dilation. Returns a new mask of the same size.
    pub fn open(mask: &MotionMask) -> MotionMask {
        let mut eroded = MotionMask::new(mask.width(), mask.height());
        let mut opened = MotionMask::new(mask.width(), mask.height());
        erode(mask, &mut eroded);
        dilate(&eroded, &mut opened);
        opened
    }

    /// Opening into reusable buffers. `eroded` and `opened` are resized to the
    /// input grid when their size differs.
    pub fn open_into(
        mask: &MotionMask,
        eroded: &mut MotionMask,
        opened: &mut MotionMask,
    ) -> DetectResult<()> {
        eroded.ensure_size(mask.width(), mask.height())?;
        opened.ensure_size(mask.width(), mask.height())?;
        erode(mask, eroded);
        dilate(eroded, opened);
        Ok(())
    }

    /// Keeps an interior cell only when all nine cells of its 3x3 block are on.
    pub fn erode(input: &MotionMask, output: &mut MotionMask) {
        apply_3x3(input, output, |block| block.iter().all(|&on| on));
    }

    /// Switches an interior cell on when any cell of its 3x3 block is on.
    pub fn dilate(input: &MotionMask, output: &mut MotionMask) {
        apply_3x3(input, output, |block| block.iter().any(|&on| on));
    }

    fn apply_3x3<F>(input: &MotionMask, output: &mut MotionMask, rule: F)
    where
        F: Fn(&[bool; 9]) -> bool,
    {
        let width = input.width();
        let height = input.height();
        debug_assert_eq!(output.width(), width);
        debug_assert_eq!(output.height(), height);

        output.clear();
        if width < 3 || height < 3 {
            return;
        }

        let src = input.cells();
        let dst = output.cells_mut();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let index = y * width + x;
                let above = index - width;
                let below = index + width;
                #[rustfmt::skip]
                let block = [
                    src[above - 1], src[above], src[above + 1],
                    src[index - 1], src[index], src[index + 1],
                    src[below - 1], src[below], src[below + 1],
                ];
                dst[index] = rule(&block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::morphology::*;
    use super::*;

    fn mask_with_block(
        width: usize,
        height: usize,
        x0: usize,
        y0: usize,
        w: usize,
        h: usize,
    ) -> MotionMask {
        let mut mask = MotionMask::new(width, height);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.set(x, y, true);
            }
        }
        mask
    }

    #[test]
    fn isolated_pixel_is_removed() {
        let mut mask = MotionMask::new(9, 9);
        mask.set(4, 4, true);
        let opened = open(&mask);
        assert_eq!(opened.count_on(), 0);
    }

    #[test]
    fn thin_line_is_removed() {
        let mask = mask_with_block(12, 12, 1, 5, 10, 2);
        assert_eq!(open(&mask).count_on(), 0);
    }

    #[test]
    fn solid_block_survives_with_original_footprint() {
        let mask = mask_with_block(16, 16, 4, 4, 5, 5);
        let opened = open(&mask);
        assert_eq!(opened, mask);
    }

    #[test]
    fn border_is_always_cleared() {
        let mut mask = MotionMask::new(6, 6);
        mask.cells_mut().fill(true);
        let opened = open(&mask);
        for i in 0..6 {
            assert!(!opened.get(i, 0));
            assert!(!opened.get(i, 5));
            assert!(!opened.get(0, i));
            assert!(!opened.get(5, i));
        }
        // The whole interior survives erosion because the input border is on.
        assert_eq!(opened.count_on(), 16);
    }

    #[test]
    fn tiny_grids_open_to_nothing() {
        let mut mask = MotionMask::new(2, 8);
        mask.cells_mut().fill(true);
        assert_eq!(open(&mask).count_on(), 0);

        let empty = MotionMask::new(0, 0);
        assert!(open(&empty).is_empty());
    }

    #[test]
    fn open_into_reuses_and_resizes_buffers() {
        let mut eroded = MotionMask::new(3, 3);
        let mut opened = MotionMask::new(3, 3);
        opened.cells_mut().fill(true);

        let mask = mask_with_block(10, 10, 2, 2, 4, 4);
        open_into(&mask, &mut eroded, &mut opened).unwrap();
        assert_eq!((opened.width(), opened.height()), (10, 10));
        assert_eq!(opened, open(&mask));

        let mut single = MotionMask::new(10, 10);
        single.set(5, 5, true);
        open_into(&single, &mut eroded, &mut opened).unwrap();
        assert_eq!(opened.count_on(), 0);
    }
}
