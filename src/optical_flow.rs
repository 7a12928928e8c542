// Pyramidal Lucas-Kanade tracker based on:
// <http://robots.stanford.edu/cs223b04/algo_tracking.pdf>
// “Pyramidal Implementation of the Lucas Kanade Feature Tracker
//   Description of the algorithm” by Jean-Yves Bouguet

use crate::all::*;

// Stop iterating once the update is smaller than this, in pixels.
const LK_TERM: f64 = 0.01;

pub struct OpticalFlow {
  lk_iters: usize,
  lk_levels: usize,
  r: usize,
  ix: Matrixd,
  iy: Matrixd,
  patch0: Matrixd,
  // Workspace.
  grid: Matrixd,
}

impl OpticalFlow {
  pub fn new(p: &ParameterSet) -> Result<OpticalFlow> {
    if p.lk_win_size % 2 != 1 {
      bail!("Lucas-Kanade window size must be odd number.");
    }
    if p.lk_win_size < 3 {
      bail!("Lucas-Kanade window size must be at least 3.");
    }
    let n = p.lk_win_size;
    Ok(OpticalFlow {
      lk_iters: p.lk_iters,
      lk_levels: p.lk_levels,
      r: (n - 1) / 2,
      ix: DMatrix::zeros(n, n),
      iy: DMatrix::zeros(n, n),
      patch0: DMatrix::zeros(n, n),
      grid: DMatrix::zeros(n + 2, n + 2),
    })
  }

  pub fn levels(&self) -> usize {
    self.lk_levels
  }

  // Pixel coordinates of `feature0` from `frame0` located in `frame1`, or None
  // if the window leaves the image or has no texture.
  pub fn track(
    &mut self,
    frame0: &Frame,
    frame1: &Frame,
    feature0: Vector2d,
  ) -> Option<Vector2d> {
    let r = self.r;
    let mut g = Vector2d::zeros();
    for level in (0..self.lk_levels + 1).rev() {
      let level0 = frame0.get_level(level);
      let level1 = frame1.get_level(level);
      let u = feature0 / u32::pow(2, level as u32) as f64;
      let inv_g = if window_fits(&level0, u, r, 1) {
        scharr(&level0, u, r, &mut self.ix, &mut self.iy, &mut self.grid);
        fill_grid(&level0, u, r, &mut self.patch0);
        spatial_gradient(&self.ix, &self.iy).try_inverse()
      }
      else {
        None
      };
      // Coarse levels that are too small or flat only pass the guess down.
      let inv_g = match inv_g {
        Some(inv_g) => inv_g,
        None if level > 0 => {
          g *= 2.;
          continue;
        },
        None => return None,
      };

      let mut nu = Vector2d::zeros();
      for _ in 0..self.lk_iters {
        let center = u + g + nu;
        if !window_fits(&level1, center, r, 0) { return None }
        let b = mismatch_vector(&level1, center, r, &self.patch0, &self.ix, &self.iy);
        let step = inv_g * b;
        nu += step;
        if step.norm() < LK_TERM { break }
      }
      if level > 0 { g = 2. * (g + nu) } else { g += nu }
    }
    Some(feature0 + g)
  }

  // Similarity of the windows around `p0` and `p1` at full resolution, from
  // 0 (opposite) to 1 (identical).
  pub fn similarity(
    &mut self,
    frame0: &Frame,
    frame1: &Frame,
    p0: Vector2d,
    p1: Vector2d,
  ) -> Option<f64> {
    let r = self.r;
    let level0 = frame0.get_level(0);
    let level1 = frame1.get_level(0);
    if !window_fits(&level0, p0, r, 0) || !window_fits(&level1, p1, r, 0) { return None }
    fill_grid(&level0, p0, r, &mut self.patch0);
    fill_grid(&level1, p1, r, &mut self.grid);
    let mad = (&self.patch0 - &self.grid).abs().mean();
    Some(1. - mad / 255.)
  }
}

// b vector of the Lucas-Kanade normal equations.
fn mismatch_vector(
  level: &Level,
  center: Vector2d,
  r: usize,
  patch0: &Matrixd,
  ix: &Matrixd,
  iy: &Matrixd,
) -> Vector2d {
  let mut b = Vector2d::zeros();
  let r = r as i32;
  for y in -r..=r {
    for x in -r..=r {
      let (row, col) = ((y + r) as usize, (x + r) as usize);
      let it = patch0[(row, col)] - bilinear(level, center + Vector2d::new(x as f64, y as f64));
      b[0] += it * ix[(row, col)];
      b[1] += it * iy[(row, col)];
    }
  }
  b
}

fn spatial_gradient(ix: &Matrixd, iy: &Matrixd) -> Matrix2d {
  assert_eq!(ix.shape(), iy.shape());
  let x2 = ix.dot(ix);
  let y2 = iy.dot(iy);
  let xy = ix.dot(iy);
  Matrix2d::new(x2, xy, xy, y2)
}

// Whether a square window of radius `r` plus `margin` pixels stays inside the level.
fn window_fits(level: &Level, center: Vector2d, r: usize, margin: usize) -> bool {
  let reach = (r + margin) as f64;
  for i in 0..2 {
    let s = if i == 0 { level.width } else { level.height };
    if s == 0 { return false }
    if !(center[i] - reach >= 0. && center[i] + reach <= (s - 1) as f64) { return false }
  }
  true
}

// Samples the (2r+1)x(2r+1) window around `center`.
fn fill_grid(
  level: &Level,
  center: Vector2d,
  r: usize,
  grid: &mut Matrixd,
) {
  let n = 2 * r + 1;
  if grid.shape() != (n, n) {
    *grid = DMatrix::zeros(n, n);
  }
  let r = r as i32;
  for y in -r..=r {
    for x in -r..=r {
      grid[((y + r) as usize, (x + r) as usize)] = bilinear(level, center + Vector2d::new(x as f64, y as f64));
    }
  }
}

fn scharr(
  level: &Level,
  center: Vector2d,
  r: usize,
  out_x: &mut Matrixd,
  out_y: &mut Matrixd,
  // Workspace.
  grid: &mut Matrixd,
) {
  fill_grid(level, center, r + 1, grid);
  *out_x = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
  *out_y = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
  for y in 1..(grid.nrows() - 1) {
    for x in 1..(grid.ncols() - 1) {
      out_x[(y - 1, x - 1)] = (10. * grid[(y, x + 1)]
        + 3. * grid[(y + 1, x + 1)]
        + 3. * grid[(y - 1, x + 1)]
        - 10. * grid[(y, x - 1)]
        - 3. * grid[(y + 1, x - 1)]
        - 3. * grid[(y - 1, x - 1)]
      ) / 32.;
      out_y[(y - 1, x - 1)] = (10. * grid[(y + 1, x)]
        + 3. * grid[(y + 1, x + 1)]
        + 3. * grid[(y + 1, x - 1)]
        - 10. * grid[(y - 1, x)]
        - 3. * grid[(y - 1, x + 1)]
        - 3. * grid[(y - 1, x - 1)]
      ) / 32.;
    }
  }
}

#[inline(always)]
fn bilinear(level: &Level, u: Vector2d) -> f64 {
  assert!(u[0] >= 0.0 && u[0] <= level.width as f64 - 1.);
  assert!(u[1] >= 0.0 && u[1] <= level.height as f64 - 1.);
  let x0 = u[0] as usize;
  let y0 = u[1] as usize;
  let xa = u[0].fract();
  let ya = u[1].fract();
  let at = |x: usize, y: usize| level.data[y * level.width + x] as f64;
  // Skipping zero weights also allows sampling the right and bottom edges.
  let eps = 1e-5;
  match (xa < eps, ya < eps) {
    (true, true) => at(x0, y0),
    (true, false) => (1. - ya) * at(x0, y0) + ya * at(x0, y0 + 1),
    (false, true) => (1. - xa) * at(x0, y0) + xa * at(x0 + 1, y0),
    (false, false) => {
      (1. - xa) * (1. - ya) * at(x0, y0)
        + xa * (1. - ya) * at(x0 + 1, y0)
        + (1. - xa) * ya * at(x0, y0 + 1)
        + xa * ya * at(x0 + 1, y0 + 1)
    },
  }
}

#[cfg(test)]
pub mod tests {
  use super::*;

  // Smooth blob, enough texture for the flow in every direction.
  pub fn blob_image(width: usize, height: usize, center: Vector2d) -> Image {
    let sigma = 5.;
    let mut image = Image::filled(width, height, 0);
    for y in 0..height {
      for x in 0..width {
        let d = Vector2d::new(x as f64, y as f64) - center;
        let v = 60. + 150. * (-d.norm_squared() / (2. * sigma * sigma)).exp();
        image.set_value(x, y, v.round() as u8);
      }
    }
    image
  }

  fn frame(image: Image) -> Frame {
    Frame::new(Arc::new(image), 3)
  }

  #[test]
  fn test_scharr() {
    let image = Image::new(5, 5, vec![
      0, 1, 2, 3, 4,
      1, 2, 3, 4, 5,
      2, 3, 4, 5, 6,
      3, 4, 5, 6, 7,
      4, 5, 6, 7, 8,
    ]).unwrap();
    let frame = Frame::new(Arc::new(image), 0);
    let level = frame.get_level(0);
    let mut out_x = dmatrix!();
    let mut out_y = dmatrix!();
    let mut grid = dmatrix!();
    scharr(&level, Vector2d::new(2.0, 2.0), 1, &mut out_x, &mut out_y, &mut grid);
    assert_eq!(out_x, DMatrix::repeat(3, 3, 1.));
    assert_eq!(out_y, DMatrix::repeat(3, 3, 1.));
  }

  #[test]
  fn test_window_fits() {
    let frame = Frame::new(Arc::new(Image::filled(10, 10, 0)), 0);
    let level = frame.get_level(0);
    assert!(window_fits(&level, Vector2d::new(4.5, 4.5), 3, 1));
    assert!(window_fits(&level, Vector2d::new(3.0, 6.0), 3, 0));
    assert!(!window_fits(&level, Vector2d::new(2.9, 6.0), 3, 0));
    assert!(!window_fits(&level, Vector2d::new(5.5, 6.0), 3, 1));
  }

  #[test]
  fn test_track_still() {
    let p = ParameterSet::default();
    let mut flow = OpticalFlow::new(&p).unwrap();
    let f0 = frame(blob_image(64, 64, Vector2d::new(32., 32.)));
    let f1 = frame(blob_image(64, 64, Vector2d::new(32., 32.)));
    let p1 = flow.track(&f0, &f1, Vector2d::new(30., 33.)).unwrap();
    assert!((p1 - Vector2d::new(30., 33.)).norm() < 1e-6);
    assert_eq!(flow.similarity(&f0, &f1, Vector2d::new(30., 33.), p1), Some(1.));
  }

  #[test]
  fn test_track_shift() {
    let p = ParameterSet::default();
    let mut flow = OpticalFlow::new(&p).unwrap();
    let f0 = frame(blob_image(64, 64, Vector2d::new(32., 32.)));
    let f1 = frame(blob_image(64, 64, Vector2d::new(33.5, 31.3)));
    let p1 = flow.track(&f0, &f1, Vector2d::new(30., 30.)).unwrap();
    assert!((p1 - Vector2d::new(31.5, 29.3)).norm() < 0.3, "{}", p1);
    assert!(flow.similarity(&f0, &f1, Vector2d::new(30., 30.), p1).unwrap() > 0.95);
  }

  #[test]
  fn test_track_flat_fails() {
    let p = ParameterSet::default();
    let mut flow = OpticalFlow::new(&p).unwrap();
    let f0 = frame(Image::filled(32, 32, 100));
    let f1 = frame(Image::filled(32, 32, 100));
    assert_eq!(flow.track(&f0, &f1, Vector2d::new(16., 16.)), None);
  }

  #[test]
  fn test_window_size_validation() {
    let mut p = ParameterSet::default();
    p.lk_win_size = 4;
    assert!(OpticalFlow::new(&p).is_err());
    p.lk_win_size = 1;
    assert!(OpticalFlow::new(&p).is_err());
  }
}
