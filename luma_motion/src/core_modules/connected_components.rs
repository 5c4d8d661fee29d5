// THEORY:
// `ConnectedComponents` is the spatial grouping stage. It takes the cleaned motion
// mask and groups "on" cells that touch each other into components, each one a
// candidate moving object.
//
// Key architectural principles & algorithm steps:
// 1.  **Raster Seeding**: cells are scanned row by row. Every "on" cell that has not
//     been visited yet seeds a new component, so components come out in the order
//     their first cell appears in the scan.
// 2.  **Iterative Flood Fill**: each seed is grown with an explicit heap stack rather
//     than recursion, so a component the size of the whole frame cannot exhaust the
//     call stack.
// 3.  **8-Connectivity Without Row Wrap**: neighbours are computed with flat-index
//     arithmetic, then validated by reconstructing `(x, y)` and checking the
//     Chebyshev distance. `index - 1` at `x = 0` would otherwise wrap onto the
//     previous row.
// 4.  **Noise Floor**: components with too few cells are dropped right after they
//     are grown.
// 5.  **Arena Storage**: all surviving cells live in one vector and components are
//     spans into it. The labeler keeps that vector, the visited grid and the stack
//     alive between frames.

use crate::core_modules::motion_mask::{reserve_cells, MotionMask};
use crate::error::DetectResult;

/// Inclusive bounding box of a component, in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    len: usize,
}

/// One connected region of "on" cells.
#[derive(Debug, Clone, Copy)]
pub struct Component<'a> {
    cells: &'a [usize],
    grid_width: usize,
}

impl<'a> Component<'a> {
    /// Flat mask indices of every cell, in fill order.
    pub fn cells(&self) -> &'a [usize] {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell coordinates on the grid.
    pub fn coords(&self) -> impl Iterator<Item = (usize, usize)> + 'a {
        let grid_width = self.grid_width;
        self.cells.iter().map(move |&i| (i % grid_width, i / grid_width))
    }

    pub fn bounding_box(&self) -> GridBox {
        let mut bbox = GridBox {
            min_x: usize::MAX,
            min_y: usize::MAX,
            max_x: 0,
            max_y: 0,
        };
        for (x, y) in self.coords() {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }
}

/// The components found in one mask, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    grid_width: usize,
    cells: Vec<usize>,
    spans: Vec<Span>,
}

impl ComponentSet {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Component<'_>> {
        self.spans.get(index).map(|span| self.component(*span))
    }

    pub fn iter(&self) -> impl Iterator<Item = Component<'_>> + '_ {
        self.spans.iter().map(move |span| self.component(*span))
    }

    fn component(&self, span: Span) -> Component<'_> {
        Component {
            cells: &self.cells[span.start..span.start + span.len],
            grid_width: self.grid_width,
        }
    }

    fn reset(&mut self, grid_width: usize) {
        self.grid_width = grid_width;
        self.cells.clear();
        self.spans.clear();
    }
}

/// Labels 8-connected components, reusing its buffers between calls.
#[derive(Debug, Default)]
pub struct ComponentLabeler {
    min_cells: usize,
    visited: Vec<bool>,
    stack: Vec<usize>,
    components: ComponentSet,
}

impl ComponentLabeler {
    /// Components with `min_cells` cells or fewer are discarded.
    pub fn new(min_cells: usize) -> Self {
        Self {
            min_cells,
            ..Self::default()
        }
    }

    /// Labels `mask`. The returned set borrows the labeler's storage and is
    /// overwritten by the next call.
    pub fn label(&mut self, mask: &MotionMask) -> DetectResult<&ComponentSet> {
        let width = mask.width();
        let height = mask.height();
        let cells = mask.cells();

        reserve_cells(&mut self.visited, cells.len(), false)?;
        self.components.reset(width);

        for seed in 0..cells.len() {
            if self.visited[seed] || !cells[seed] {
                continue;
            }

            let start = self.components.cells.len();
            self.flood_fill(cells, seed, width, height);
            let len = self.components.cells.len() - start;

            if len > self.min_cells {
                self.components.spans.push(Span { start, len });
            } else {
                self.components.cells.truncate(start);
            }
        }

        Ok(&self.components)
    }

    fn flood_fill(&mut self, cells: &[bool], seed: usize, width: usize, height: usize) {
        #[rustfmt::skip]
        const OFFSETS: [(isize, isize); 8] = [
            (-1, -1), (0, -1), (1, -1),
            (-1, 0), (1, 0),
            (-1, 1), (0, 1), (1, 1),
        ];

        let total = cells.len() as isize;
        let w = width as isize;

        self.stack.clear();
        self.stack.push(seed);

        while let Some(index) = self.stack.pop() {
            if self.visited[index] || !cells[index] {
                continue;
            }
            self.visited[index] = true;
            self.components.cells.push(index);

            let x = (index % width) as isize;
            let y = (index / width) as isize;

            for (dx, dy) in OFFSETS {
                let neighbor = index as isize + dy * w + dx;
                if neighbor < 0 || neighbor >= total {
                    continue;
                }
                let nx = neighbor % w;
                let ny = neighbor / w;
                if nx < width as isize
                    && ny < height as isize
                    && (nx - x).abs() <= 1
                    && (ny - y).abs() <= 1
                    && !self.visited[neighbor as usize]
                {
                    self.stack.push(neighbor as usize);
                }
            }
        }
    }
}

/// One-shot labeling with fresh buffers.
pub fn label(mask: &MotionMask, min_cells: usize) -> DetectResult<ComponentSet> {
    let mut labeler = ComponentLabeler::new(min_cells);
    labeler.label(mask)?;
    Ok(labeler.components)
}
