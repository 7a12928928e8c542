use crate::all::*;

// Grid used to sample the region of interest for registration.
const HOMOGRAPHY_GRID: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
  pub bounding_box: NormalizedRect,
  // In [0, 1].
  pub confidence: f64,
}

// Relocates image regions between two frames. All rectangles are normalized
// in the convention returned by `origin()`.
pub trait PointTracker: Send + Sync {
  fn origin(&self) -> Origin {
    Origin::TopLeft
  }

  // `Ok(None)` means the region produced no observation. `Err` fails the whole request.
  fn track(
    &self,
    reference: &Image,
    roi: &NormalizedRect,
    target: &Image,
  ) -> Result<Option<Observation>>;

  // One result per ROI, in order.
  fn track_all(
    &self,
    reference: &Image,
    rois: &[NormalizedRect],
    target: &Image,
  ) -> Result<Vec<Option<Observation>>> {
    rois.iter().map(|roi| self.track(reference, roi, target)).collect()
  }

  // Maps normalized `source` coordinates inside `roi` onto `reference`.
  // Identity when registration fails.
  fn estimate_homography(
    &self,
    _source: &Image,
    _reference: &Image,
    _roi: &NormalizedRect,
  ) -> Matrix3d {
    Matrix3d::identity()
  }

  // Drop any state carried between requests.
  fn reset(&self) {}
}

pub struct LucasKanadeTracker {
  optical_flow: Mutex<OpticalFlow>,
}

impl LucasKanadeTracker {
  pub fn new(p: &ParameterSet) -> Result<LucasKanadeTracker> {
    Ok(LucasKanadeTracker {
      optical_flow: Mutex::new(OpticalFlow::new(p)?),
    })
  }

  fn frames(&self, reference: &Image, target: &Image, levels: usize) -> Result<(Frame, Frame)> {
    if reference.is_empty() || target.is_empty() {
      bail!("Cannot track on an empty pixel buffer.");
    }
    if reference.width != target.width || reference.height != target.height {
      bail!("Frame size changed from {}x{} to {}x{}.",
        reference.width, reference.height, target.width, target.height);
    }
    // The frames need shared ownership only for the pyramid; copy once per request.
    Ok((
      Frame::new(Arc::new(reference.clone()), levels),
      Frame::new(Arc::new(target.clone()), levels),
    ))
  }
}

fn to_pixels(v: &Vector2d, image: &Image) -> Vector2d {
  Vector2d::new(v[0] * (image.width - 1) as f64, v[1] * (image.height - 1) as f64)
}

fn from_pixels(p: &Vector2d, image: &Image) -> Vector2d {
  Vector2d::new(p[0] / (image.width - 1) as f64, p[1] / (image.height - 1) as f64)
}

impl PointTracker for LucasKanadeTracker {
  fn track(
    &self,
    reference: &Image,
    roi: &NormalizedRect,
    target: &Image,
  ) -> Result<Option<Observation>> {
    let mut observations = self.track_all(reference, std::slice::from_ref(roi), target)?;
    Ok(observations.pop().flatten())
  }

  fn track_all(
    &self,
    reference: &Image,
    rois: &[NormalizedRect],
    target: &Image,
  ) -> Result<Vec<Option<Observation>>> {
    let flow = &mut *self.optical_flow.lock().unwrap();
    let (frame0, frame1) = self.frames(reference, target, flow.levels())?;
    let mut observations = Vec::with_capacity(rois.len());
    for roi in rois {
      if roi.is_empty() {
        bail!("Empty region of interest {:?}.", roi);
      }
      let p0 = to_pixels(&roi.center(), reference);
      let observation = flow.track(&frame0, &frame1, p0).map(|p1| {
        let confidence = flow.similarity(&frame0, &frame1, p0, p1).unwrap_or(0.);
        let center = from_pixels(&p1, target);
        Observation {
          bounding_box: NormalizedRect {
            origin: center - roi.size / 2.,
            size: roi.size,
          },
          confidence,
        }
      });
      observations.push(observation);
    }
    Ok(observations)
  }

  fn estimate_homography(
    &self,
    source: &Image,
    reference: &Image,
    roi: &NormalizedRect,
  ) -> Matrix3d {
    let flow = &mut *self.optical_flow.lock().unwrap();
    let (frame0, frame1) = match self.frames(source, reference, flow.levels()) {
      Ok(frames) => frames,
      Err(err) => {
        warn!("Registration failed: {}", err);
        return Matrix3d::identity();
      },
    };
    // Without a usable ROI register the whole frame.
    let roi = if roi.is_empty() { NormalizedRect::new(0., 0., 1., 1.) } else { *roi };

    let mut x0 = vec![];
    let mut x1 = vec![];
    for i in 0..HOMOGRAPHY_GRID {
      for j in 0..HOMOGRAPHY_GRID {
        let t = Vector2d::new(
          (i as f64 + 0.5) / HOMOGRAPHY_GRID as f64,
          (j as f64 + 0.5) / HOMOGRAPHY_GRID as f64,
        );
        let v = roi.origin + roi.size.component_mul(&t);
        let p0 = to_pixels(&v, source);
        if let Some(p1) = flow.track(&frame0, &frame1, p0) {
          x0.push(v);
          x1.push(from_pixels(&p1, reference));
        }
      }
    }
    match estimate_homography_dlt(&x0, &x1) {
      Some(h) => h,
      None => {
        warn!("Registration failed with {} tracked grid points.", x0.len());
        Matrix3d::identity()
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::optical_flow::tests::blob_image;

  fn tracker() -> LucasKanadeTracker {
    LucasKanadeTracker::new(&ParameterSet::default()).unwrap()
  }

  #[test]
  fn test_track_follows_blob() {
    let reference = blob_image(101, 101, Vector2d::new(50., 50.));
    let target = blob_image(101, 101, Vector2d::new(52., 49.));
    let roi = roi_around(&Vector2d::new(0.47, 0.47), 0.12);
    let observation = tracker().track(&reference, &roi, &target).unwrap().unwrap();
    let expected = Vector2d::new(0.49, 0.46);
    assert!((observation.bounding_box.center() - expected).norm() < 0.005, "{:?}", observation);
    assert_eq!(observation.bounding_box.size, roi.size);
    assert!(observation.confidence > 0.9);
  }

  #[test]
  fn test_track_all_keeps_order_and_count() {
    let image = blob_image(101, 101, Vector2d::new(50., 50.));
    let rois = vec![
      roi_around(&Vector2d::new(0.47, 0.47), 0.12),
      // Flat corner, no texture.
      roi_around(&Vector2d::new(0.05, 0.05), 0.12),
      roi_around(&Vector2d::new(0.52, 0.50), 0.12),
    ];
    let observations = tracker().track_all(&image, &rois, &image).unwrap();
    assert_eq!(observations.len(), 3);
    assert!(observations[0].is_some());
    assert!(observations[1].is_none());
    assert!(observations[2].is_some());
  }

  #[test]
  fn test_size_mismatch_is_an_error() {
    let roi = roi_around(&Vector2d::new(0.5, 0.5), 0.12);
    assert!(tracker().track(&Image::filled(10, 10, 0), &roi, &Image::filled(12, 10, 0)).is_err());
    assert!(tracker().track(&Image::empty(), &roi, &Image::empty()).is_err());
  }

  #[test]
  fn test_homography_identity_on_failure() {
    let flat = Image::filled(40, 40, 7);
    let roi = NormalizedRect::new(0.2, 0.2, 0.6, 0.6);
    assert_eq!(tracker().estimate_homography(&flat, &flat, &roi), Matrix3d::identity());
  }

  #[test]
  fn test_homography_of_still_frames() {
    let image = blob_image(101, 101, Vector2d::new(50., 50.));
    let roi = NormalizedRect::new(0.35, 0.35, 0.3, 0.3);
    let h = tracker().estimate_homography(&image, &image, &roi);
    assert!((h - Matrix3d::identity()).norm() < 1e-6, "{}", h);
  }
}
