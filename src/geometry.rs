use crate::all::*;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
  pub width: f64,
  pub height: f64,
}

impl Size {
  pub fn new(width: f64, height: f64) -> Size {
    Size { width, height }
  }

  pub fn is_empty(&self) -> bool {
    !(self.width > 0. && self.height > 0.)
  }
}

// Axis-aligned rectangle in canvas units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
  pub origin: Vector2d,
  pub size: Size,
}

impl Rect {
  pub fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect {
      origin: Vector2d::new(x, y),
      size: Size::new(width, height),
    }
  }
}

// Rectangle in 0..1 frame coordinates, in the tracker's vertical convention.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRect {
  pub origin: Vector2d,
  pub size: Vector2d,
}

impl NormalizedRect {
  pub fn new(x: f64, y: f64, width: f64, height: f64) -> NormalizedRect {
    NormalizedRect {
      origin: Vector2d::new(x, y),
      size: Vector2d::new(width, height),
    }
  }

  pub fn center(&self) -> Vector2d {
    self.origin + self.size / 2.
  }

  pub fn is_empty(&self) -> bool {
    !(self.size[0] > 0. && self.size[1] > 0.)
  }
}

// Where the tracker puts normalized y = 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
  TopLeft,
  BottomLeft,
}

// The sub-rectangle of the canvas where the video is drawn, aspect preserved.
pub fn display_rect(video: Size, canvas: Size) -> Option<Rect> {
  if video.is_empty() || canvas.is_empty() { return None }
  let aspect = video.width / video.height;
  let canvas_aspect = canvas.width / canvas.height;
  if canvas_aspect > aspect {
    // Pillarbox.
    let width = canvas.height * aspect;
    Some(Rect::new((canvas.width - width) / 2., 0., width, canvas.height))
  }
  else {
    // Letterbox.
    let height = canvas.width / aspect;
    Some(Rect::new(0., (canvas.height - height) / 2., canvas.width, height))
  }
}

pub fn to_normalized(point: &Point, rect: &Rect, origin: Origin) -> Vector2d {
  let x = (point[0] - rect.origin[0]) / rect.size.width;
  let y = (point[1] - rect.origin[1]) / rect.size.height;
  match origin {
    Origin::TopLeft => Vector2d::new(x, y),
    Origin::BottomLeft => Vector2d::new(x, 1. - y),
  }
}

pub fn from_normalized(v: &Vector2d, rect: &Rect, origin: Origin) -> Point {
  let y = match origin {
    Origin::TopLeft => v[1],
    Origin::BottomLeft => 1. - v[1],
  };
  Point::new(
    rect.origin[0] + v[0] * rect.size.width,
    rect.origin[1] + y * rect.size.height,
  )
}

// Square search region centered on `center`, shifted to stay inside the frame.
pub fn roi_around(center: &Vector2d, size: f64) -> NormalizedRect {
  let size = clamp(size, 0., 1.);
  NormalizedRect::new(
    clamp(center[0] - size / 2., 0., 1. - size),
    clamp(center[1] - size / 2., 0., 1. - size),
    size,
    size,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_close(a: &Vector2d, b: &Vector2d) {
    assert!((a - b).norm() < 1e-9, "{} != {}", a, b);
  }

  #[test]
  fn test_display_rect() {
    // Wider canvas: bars left and right.
    let r = display_rect(Size::new(1920., 1080.), Size::new(800., 300.)).unwrap();
    assert_eq!(r.size.height, 300.);
    assert!((r.size.width - 300. * 16. / 9.).abs() < 1e-9);
    assert!((r.origin[0] - (800. - r.size.width) / 2.).abs() < 1e-9);
    assert_eq!(r.origin[1], 0.);

    // Taller canvas: bars top and bottom.
    let r = display_rect(Size::new(1920., 1080.), Size::new(400., 400.)).unwrap();
    assert_eq!(r.size.width, 400.);
    assert!((r.size.height - 225.).abs() < 1e-9);
    assert!((r.origin[1] - 87.5).abs() < 1e-9);

    assert_eq!(display_rect(Size::default(), Size::new(400., 400.)), None);
    assert_eq!(display_rect(Size::new(400., 400.), Size::new(0., 400.)), None);
  }

  #[test]
  fn test_normalized_mapping() {
    let rect = Rect::new(100., 50., 400., 200.);
    let p = Point::new(200., 100.);
    assert_close(&to_normalized(&p, &rect, Origin::TopLeft), &Vector2d::new(0.25, 0.25));
    assert_close(&to_normalized(&p, &rect, Origin::BottomLeft), &Vector2d::new(0.25, 0.75));
    for origin in [Origin::TopLeft, Origin::BottomLeft] {
      assert_close(&from_normalized(&to_normalized(&p, &rect, origin), &rect, origin), &p);
    }
  }

  #[test]
  fn test_roi_clamping() {
    let s = 0.12;
    for i in 0..=20 {
      for j in 0..=20 {
        let p = Vector2d::new(i as f64 / 20., j as f64 / 20.);
        let roi = roi_around(&p, s);
        for k in 0..2 {
          assert!(roi.origin[k] >= 0.);
          assert!(roi.origin[k] <= 1. - s + 1e-12);
        }
      }
    }

    let roi = roi_around(&Vector2d::new(0.5, 0.5), s);
    assert_close(&roi.center(), &Vector2d::new(0.5, 0.5));
    let roi = roi_around(&Vector2d::new(0.0, 1.0), s);
    assert_close(&roi.origin, &Vector2d::new(0.0, 1. - s));
  }
}
