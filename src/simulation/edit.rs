use rayon::prelude::*;

use crate::simulation::cell::{encode_selector, CellLayout};
use crate::simulation::render::ViewSize;
use crate::simulation::rng::noise_sample;

/// Circle on the torus, measured between cell centers.
///
/// Offsets are scaled per axis before the distance test, which lets a
/// display-space circle be tested against grid cells. A negative radius
/// covers the whole field. Cells at exactly `radius` are outside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Circle {
    /// Circle of `radius` cells around grid point (x, y), wrapped onto the field
    pub fn grid(x: f32, y: f32, radius: f32, width: u32, height: u32) -> Self {
        Self {
            center_x: x.rem_euclid(width as f32),
            center_y: y.rem_euclid(height as f32),
            radius,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Circle of `radius` display pixels around display point (x, y)
    pub fn display(x: f32, y: f32, radius: f32, view: ViewSize, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let (vw, vh) = (view.width as f32, view.height as f32);
        Self {
            center_x: (x * w / vw).rem_euclid(w),
            center_y: (y * h / vh).rem_euclid(h),
            radius,
            scale_x: vw / w,
            scale_y: vh / h,
        }
    }

    pub fn covers_field(&self) -> bool {
        self.radius < 0.0
    }

    /// Whether cell (x, y) lies strictly inside the circle
    pub fn contains(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        if self.covers_field() {
            return true;
        }
        let dx = wrapped_delta(x as f32 + 0.5, self.center_x, width as f32) * self.scale_x;
        let dy = wrapped_delta(y as f32 + 0.5, self.center_y, height as f32) * self.scale_y;
        dx * dx + dy * dy < self.radius * self.radius
    }
}

/// Shortest distance between two coordinates on a ring of length `extent`
pub fn wrapped_delta(a: f32, b: f32, extent: f32) -> f32 {
    let d = (a - b).abs();
    d.min(extent - d)
}

/// A validated edit command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Edit {
    /// Clear the covered cells, hand them to `model`, and seed `seed_cell`
    Paint {
        circle: Circle,
        seed_cell: (u32, u32),
        model: u32,
    },
    /// Kill the covered cells; selectors are kept
    Clear { circle: Circle },
    /// Add noise in [-amount, amount) to hidden channels of alive cells
    Disturb {
        amount: f32,
        threshold: f32,
        seed: u32,
    },
}

/// Apply an edit to a host buffer
pub fn apply_edit(layout: &CellLayout, width: u32, height: u32, cells: &mut [f32], edit: &Edit) {
    let stride = layout.stride();
    let channels = layout.channels;
    let row_len = width as usize * stride;

    cells
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            for (x, cell) in row.chunks_exact_mut(stride).enumerate() {
                let x = x as u32;
                match *edit {
                    Edit::Paint {
                        circle,
                        seed_cell,
                        model,
                    } => {
                        let is_seed = (x, y) == seed_cell;
                        if is_seed || circle.contains(x, y, width, height) {
                            if is_seed {
                                cell[..channels].copy_from_slice(layout.seed());
                            } else {
                                cell[..channels].fill(0.0);
                            }
                            cell[channels] = encode_selector(model);
                        }
                    }
                    Edit::Clear { circle } => {
                        if circle.contains(x, y, width, height) {
                            cell[..channels].fill(0.0);
                        }
                    }
                    Edit::Disturb {
                        amount,
                        threshold,
                        seed,
                    } => {
                        if layout.is_alive(cell, threshold) {
                            let index = y * width + x;
                            for c in (0..channels).filter(|c| layout.is_hidden(*c)) {
                                let u = noise_sample(seed, index, c as u32);
                                cell[c] += amount * (2.0 * u - 1.0);
                            }
                        }
                    }
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::cell::Topology;

    fn layout() -> CellLayout {
        CellLayout::new(4, 3, 3, Topology::Square, None)
    }

    #[test]
    fn test_circle_boundary_is_exclusive() {
        let circle = Circle::grid(5.5, 5.5, 2.0, 16, 16);
        assert!(circle.contains(5, 5, 16, 16));
        assert!(circle.contains(6, 6, 16, 16));
        // exactly two cells away
        assert!(!circle.contains(7, 5, 16, 16));
        assert!(!circle.contains(5, 3, 16, 16));
    }

    #[test]
    fn test_circle_wraps_around_edges() {
        let circle = Circle::grid(0.5, 0.5, 1.5, 16, 16);
        assert!(circle.contains(15, 0, 16, 16));
        assert!(circle.contains(15, 15, 16, 16));
        assert!(!circle.contains(14, 0, 16, 16));
    }

    #[test]
    fn test_grid_circle_centers_on_the_raw_point() {
        // (4, 4) is the shared corner of four cells, each 0.707 away
        let circle = Circle::grid(4.0, 4.0, 1.0, 8, 8);
        for (x, y) in [(3, 3), (4, 3), (3, 4), (4, 4)] {
            assert!(circle.contains(x, y, 8, 8));
        }
        assert!(!circle.contains(5, 4, 8, 8));
        assert!(!circle.contains(2, 3, 8, 8));

        let wrapped = Circle::grid(-0.5, 8.5, 0.5, 8, 8);
        assert_eq!((wrapped.center_x, wrapped.center_y), (7.5, 0.5));
    }

    #[test]
    fn test_display_circle_scales_to_pixels() {
        // 8x8 grid on a 64x32 view: one cell is 8 px wide and 4 px tall
        let view = ViewSize::new(64, 32);
        let circle = Circle::display(36.0, 18.0, 8.0, view, 8, 8);
        assert_eq!((circle.center_x, circle.center_y), (4.5, 4.5));
        assert!(circle.contains(4, 4, 8, 8));
        // one cell right = 8 px: on the boundary, excluded
        assert!(!circle.contains(5, 4, 8, 8));
        // one cell down = 4 px: inside
        assert!(circle.contains(4, 5, 8, 8));
        // two cells down = 8 px: on the boundary, excluded
        assert!(!circle.contains(4, 6, 8, 8));
    }

    #[test]
    fn test_paint_seeds_one_cell() {
        let layout = layout();
        let mut cells = vec![0.7; 4 * 4 * 5];
        let edit = Edit::Paint {
            circle: Circle::grid(1.5, 1.5, -1.0, 4, 4),
            seed_cell: (1, 1),
            model: 3,
        };
        apply_edit(&layout, 4, 4, &mut cells, &edit);
        for (i, cell) in cells.chunks_exact(5).enumerate() {
            assert_eq!(cell[4], 3.0);
            if i == 5 {
                assert_eq!(&cell[..4], layout.seed());
            } else {
                assert_eq!(&cell[..4], &[0.0; 4]);
            }
        }
    }

    #[test]
    fn test_clear_keeps_selector() {
        let layout = layout();
        let mut cells: Vec<f32> = (0..4 * 4).flat_map(|_| [0.5, 0.5, 0.5, 1.0, 2.0]).collect();
        let edit = Edit::Clear {
            circle: Circle::grid(0.5, 0.5, 1.0, 4, 4),
        };
        apply_edit(&layout, 4, 4, &mut cells, &edit);
        assert_eq!(&cells[..5], &[0.0, 0.0, 0.0, 0.0, 2.0]);
        assert_eq!(&cells[5..10], &[0.5, 0.5, 0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_disturb_touches_only_hidden_channels_of_alive_cells() {
        let layout = CellLayout::new(6, 3, 3, Topology::Square, None);
        let mut cells = vec![0.0; 2 * 1 * 7];
        cells[..7].copy_from_slice(&[0.1, 0.2, 0.3, 1.0, 0.0, 0.0, 1.0]);
        let before = cells.clone();
        let edit = Edit::Disturb {
            amount: 0.5,
            threshold: 0.1,
            seed: 9,
        };
        apply_edit(&layout, 2, 1, &mut cells, &edit);

        assert_eq!(&cells[..4], &before[..4]);
        assert_eq!(cells[6], 1.0);
        assert!(cells[4] != 0.0 || cells[5] != 0.0);
        assert!(cells[4].abs() <= 0.5 && cells[5].abs() <= 0.5);
        // the dead cell is untouched
        assert_eq!(&cells[7..], &before[7..]);
    }
}
