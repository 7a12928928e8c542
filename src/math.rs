use crate::all::*;

// Direct linear transform for the homography `H` with `x1 ~ H x0`. Points are
// normalized (Hartley) before solving. Returns None for fewer than four
// correspondences or a degenerate configuration.
pub fn estimate_homography_dlt(x0: &[Vector2d], x1: &[Vector2d]) -> Option<Matrix3d> {
  assert_eq!(x0.len(), x1.len());
  let n = x0.len();
  if n < 4 { return None }
  let t0 = normalizing_transform(x0)?;
  let t1 = normalizing_transform(x1)?;

  let mut a = DMatrix::<f64>::zeros(2 * n, 9);
  for i in 0..n {
    let p = transform_2d(&t0, &x0[i]);
    let q = transform_2d(&t1, &x1[i]);
    let (x, y, u, v) = (p[0], p[1], q[0], q[1]);
    a.row_mut(2 * i).copy_from_slice(&[-x, -y, -1., 0., 0., 0., u * x, u * y, u]);
    a.row_mut(2 * i + 1).copy_from_slice(&[0., 0., 0., -x, -y, -1., v * x, v * y, v]);
  }
  // Null vector of A: the right singular vector with the smallest singular value.
  // Pad to a square system so the SVD always has nine right singular vectors.
  if a.nrows() < 9 {
    a = a.resize_vertically(9, 0.);
  }
  let svd = a.svd(false, true);
  let v_t = svd.v_t?;
  let (i_min, _) = svd.singular_values.argmin();
  let h = v_t.row(i_min);
  let h = Matrix3d::new(
    h[0], h[1], h[2],
    h[3], h[4], h[5],
    h[6], h[7], h[8],
  );
  let h = t1.try_inverse()? * h * t0;
  if h[(2, 2)].abs() < 1e-12 { return None }
  let h = h / h[(2, 2)];
  if h.iter().all(|x| x.is_finite()) { Some(h) } else { None }
}

pub fn transform_2d(h: &Matrix3d, p: &Vector2d) -> Vector2d {
  let q = h * nalgebra::Vector3::new(p[0], p[1], 1.);
  Vector2d::new(q[0] / q[2], q[1] / q[2])
}

// Similarity moving the centroid to the origin with mean distance sqrt(2).
fn normalizing_transform(points: &[Vector2d]) -> Option<Matrix3d> {
  let n = points.len() as f64;
  let centroid = points.iter().fold(Vector2d::zeros(), |acc, p| acc + p) / n;
  let mean_distance = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
  if mean_distance < 1e-12 { return None }
  let s = std::f64::consts::SQRT_2 / mean_distance;
  Some(Matrix3d::new(
    s, 0., -s * centroid[0],
    0., s, -s * centroid[1],
    0., 0., 1.,
  ))
}
