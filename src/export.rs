use crate::all::*;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportPoint {
  pub x: f64,
  pub y: f64,
}

// Keyframe points for one mask instance, normalized to the displayed video
// with the origin at the top left.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskDocument {
  #[serde(rename = "instanceID")]
  pub instance_id: String,
  pub points: Vec<ExportPoint>,
  // Seconds since the Unix epoch.
  pub timestamp: f64,
}

impl MaskDocument {
  pub fn new(instance_id: &str, points: &[Point], rect: &Rect) -> Result<MaskDocument> {
    if rect.size.is_empty() {
      bail!("Cannot normalize points to an empty display rectangle {:?}.", rect);
    }
    let points = points.iter().map(|point| {
      let v = to_normalized(point, rect, Origin::TopLeft);
      ExportPoint { x: v[0], y: v[1] }
    }).collect();
    Ok(MaskDocument {
      instance_id: instance_id.to_string(),
      points,
      timestamp: seconds_since_epoch(),
    })
  }

  pub fn default_path(instance_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("keytrack_mask_{}.json", instance_id))
  }

  pub fn write(&self, path: &Path) -> Result<()> {
    let file = File::create(path)
      .context(format!("Failed to create {}.", path.display()))?;
    serde_json::to_writer_pretty(file, self)
      .context("MaskDocument JSON serialization failed.")?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identity_display_rect() {
    let rect = Rect::new(0., 0., 400., 400.);
    let points = [(0.25, 0.25), (0.75, 0.25), (0.75, 0.75), (0.25, 0.75)];
    let canvas: Vec<Point> = points.iter().map(|&(x, y)| Point::new(x * 400., y * 400.)).collect();
    let document = MaskDocument::new("a", &canvas, &rect).unwrap();
    for (exported, &(x, y)) in document.points.iter().zip(&points) {
      assert!((exported.x - x).abs() < 1e-12);
      assert!((exported.y - y).abs() < 1e-12);
    }
  }

  #[test]
  fn test_letterboxed_rect() {
    let rect = Rect::new(0., 50., 400., 300.);
    let document = MaskDocument::new("a", &[Point::new(200., 50.)], &rect).unwrap();
    assert_eq!(document.points, vec![ExportPoint { x: 0.5, y: 0. }]);
    assert!(MaskDocument::new("a", &[], &Rect::new(0., 0., 0., 10.)).is_err());
  }

  #[test]
  fn test_json_field_names() {
    let rect = Rect::new(0., 0., 100., 100.);
    let document = MaskDocument::new("xyz", &[Point::new(10., 20.)], &rect).unwrap();
    let value = serde_json::to_value(&document).unwrap();
    assert_eq!(value["instanceID"], "xyz");
    assert_eq!(value["points"][0]["x"], 0.1);
    assert_eq!(value["points"][0]["y"], 0.2);
    assert!(value["timestamp"].as_f64().unwrap() > 0.);
  }

  #[test]
  fn test_write_and_read_back() {
    let path = std::env::temp_dir().join(format!("keytrack_export_test_{}.json", std::process::id()));
    let document = MaskDocument::new("w", &[Point::new(1., 2.)], &Rect::new(0., 0., 4., 4.)).unwrap();
    document.write(&path).unwrap();
    let read: MaskDocument = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
    assert_eq!(read, document);
    std::fs::remove_file(&path).unwrap();
  }
}
