//! Morphological Chan-Vese segmentation (morphological snakes).
//!
//! A binary level set `u` is evolved with morphological operators
//! instead of a PDE:
//!
//! 1. Pixels on the boundary move to whichever region mean (`c1` inside,
//!    `c0` outside) their intensity is closer to.
//! 2. The boundary is then smoothed with alternating `SI ∘ IS` and
//!    `IS ∘ SI` curvature operators built from the four 3-pixel line
//!    structuring elements.

use image::{DynamicImage, GrayImage, Luma};

use crate::grayscale::luminance;
use crate::types::LumaF32Image;

/// Number of region/smoothing iterations.
pub const ITERATIONS: usize = 200;
/// Curvature passes per iteration.
pub const SMOOTHING: usize = 3;
/// Side length of the checkerboard squares in the initial level set.
pub const SQUARE_SIZE: usize = 5;
/// Weight of the inside-region fit term.
pub const LAMBDA1: f64 = 1.0;
/// Weight of the outside-region fit term.
pub const LAMBDA2: f64 = 1.0;

/// Line structuring element directions: diagonal, vertical,
/// anti-diagonal, horizontal.
const LINES: [(isize, isize); 4] = [(1, 1), (0, 1), (1, -1), (1, 0)];

/// Binary level set on a row-major grid.
#[derive(Clone)]
struct LevelSet {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl LevelSet {
    fn checkerboard(width: usize, height: usize) -> Self {
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((y / SQUARE_SIZE) ^ (x / SQUARE_SIZE)) & 1 == 1))
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    /// Cell value; outside the grid counts as background.
    fn get(&self, x: usize, y: usize, dx: isize, dy: isize) -> bool {
        match (x.checked_add_signed(dx), y.checked_add_signed(dy)) {
            (Some(cx), Some(cy)) if cx < self.width && cy < self.height => {
                self.cells[cy * self.width + cx]
            }
            _ => false,
        }
    }

    fn map(&self, f: impl Fn(usize, usize) -> bool) -> Self {
        let cells = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width: self.width,
            height: self.height,
            cells,
        }
    }

    /// Supremum over the line elements of the binary erosion.
    fn sup_inf(&self) -> Self {
        self.map(|x, y| {
            LINES.iter().any(|&(dx, dy)| {
                self.get(x, y, -dx, -dy) && self.get(x, y, 0, 0) && self.get(x, y, dx, dy)
            })
        })
    }

    /// Infimum over the line elements of the binary dilation.
    fn inf_sup(&self) -> Self {
        self.map(|x, y| {
            LINES.iter().all(|&(dx, dy)| {
                self.get(x, y, -dx, -dy) || self.get(x, y, 0, 0) || self.get(x, y, dx, dy)
            })
        })
    }

    /// `|du/dx| + |du/dy|` with central differences inside the grid and
    /// one-sided differences on its edges.
    fn gradient_l1(&self, x: usize, y: usize) -> f64 {
        let value = |x: usize, y: usize| f64::from(u8::from(self.cells[y * self.width + x]));
        let axis = |i: usize, n: usize, at: &dyn Fn(usize) -> f64| -> f64 {
            if n < 2 {
                0.0
            } else if i == 0 {
                at(1) - at(0)
            } else if i == n - 1 {
                at(n - 1) - at(n - 2)
            } else {
                (at(i + 1) - at(i - 1)) / 2.0
            }
        };
        let gx = axis(x, self.width, &|i| value(i, y));
        let gy = axis(y, self.height, &|j| value(x, j));
        gx.abs() + gy.abs()
    }
}

/// Region means: `(c0, c1)` for outside and inside.
#[allow(clippy::cast_precision_loss)]
fn region_means(image: &[f64], u: &LevelSet) -> (f64, f64) {
    let (mut s0, mut n0, mut s1, mut n1) = (0.0, 0_usize, 0.0, 0_usize);
    for (&v, &inside) in image.iter().zip(&u.cells) {
        if inside {
            s1 += v;
            n1 += 1;
        } else {
            s0 += v;
            n0 += 1;
        }
    }
    (s0 / (n0 as f64 + 1e-8), s1 / (n1 as f64 + 1e-8))
}

/// Run morphological Chan-Vese on a luminance plane.
#[must_use = "returns the segmentation mask"]
pub fn segment_plane(plane: &LumaF32Image) -> GrayImage {
    let (w, h) = plane.dimensions();
    let (width, height) = (w as usize, h as usize);
    let image: Vec<f64> = plane.pixels().map(|p| f64::from(p.0[0])).collect();
    let mut u = LevelSet::checkerboard(width, height);
    let mut is_first = true;

    for _ in 0..ITERATIONS {
        let (c0, c1) = region_means(&image, &u);
        let aux: Vec<f64> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let v = image[y * width + x];
                u.gradient_l1(x, y)
                    * (LAMBDA1 * (v - c1).powi(2) - LAMBDA2 * (v - c0).powi(2))
            })
            .collect();
        for (cell, a) in u.cells.iter_mut().zip(aux) {
            if a < 0.0 {
                *cell = true;
            } else if a > 0.0 {
                *cell = false;
            }
        }

        for _ in 0..SMOOTHING {
            u = if is_first {
                u.inf_sup().sup_inf()
            } else {
                u.sup_inf().inf_sup()
            };
            is_first = !is_first;
        }
    }

    let mut cells = u.cells.into_iter();
    GrayImage::from_fn(w, h, |_, _| {
        Luma([if cells.next().unwrap_or(false) { 255 } else { 0 }])
    })
}

/// The `morphsnake` operation.
#[must_use = "returns the segmented image"]
pub fn segment(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(segment_plane(&luminance(image)))
}
