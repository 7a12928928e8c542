use crate::all::*;

// Ordered keyframe points in canvas space. Points are addressed by index only,
// so any structural edit shifts the indices after it.
//
// User edits go through the public methods and record undo snapshots. Tracking
// results go through `replace_tracked()`, which leaves the history alone.
#[derive(Clone, Debug, Default)]
pub struct PointSet {
  points: Vec<Point>,
  undo: Vec<Vec<Point>>,
  redo: Vec<Vec<Point>>,
  revision: u64,
}

impl PointSet {
  pub fn new() -> PointSet {
    PointSet::default()
  }

  pub fn as_slice(&self) -> &[Point] {
    &self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Point> {
    self.points.get(index)
  }

  // Bumped by every user edit.
  pub fn revision(&self) -> u64 {
    self.revision
  }

  pub fn can_undo(&self) -> bool {
    !self.undo.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.redo.is_empty()
  }

  fn record(&mut self, snapshot: Vec<Point>) {
    self.undo.push(snapshot);
    self.redo.clear();
    self.revision += 1;
  }

  pub fn add(&mut self, point: Point) {
    self.record(self.points.clone());
    self.points.push(point);
  }

  // Live drag update, not undoable by itself. See `commit_move()`.
  pub fn move_to(&mut self, index: usize, point: Point) -> bool {
    match self.points.get_mut(index) {
      Some(p) => {
        *p = point;
        self.revision += 1;
        true
      },
      None => false,
    }
  }

  // Records a finished drag of point `index` that started at `from`.
  pub fn commit_move(&mut self, index: usize, from: Point) -> bool {
    if index >= self.points.len() { return false }
    let mut snapshot = self.points.clone();
    snapshot[index] = from;
    self.record(snapshot);
    true
  }

  pub fn delete(&mut self, index: usize) -> bool {
    if index >= self.points.len() { return false }
    self.record(self.points.clone());
    self.points.remove(index);
    true
  }

  pub fn delete_last(&mut self) -> bool {
    match self.points.len() {
      0 => false,
      n => self.delete(n - 1),
    }
  }

  pub fn replace(&mut self, points: Vec<Point>) {
    let old = std::mem::replace(&mut self.points, points);
    self.record(old);
  }

  pub fn clear(&mut self) {
    self.replace(vec![]);
  }

  pub fn undo(&mut self) -> bool {
    match self.undo.pop() {
      Some(points) => {
        let current = std::mem::replace(&mut self.points, points);
        self.redo.push(current);
        self.revision += 1;
        true
      },
      None => false,
    }
  }

  pub fn redo(&mut self) -> bool {
    match self.redo.pop() {
      Some(points) => {
        let current = std::mem::replace(&mut self.points, points);
        self.undo.push(current);
        self.revision += 1;
        true
      },
      None => false,
    }
  }

  // Overwrites all positions with tracking output. The count must not change.
  pub(crate) fn replace_tracked(&mut self, points: Vec<Point>) -> Result<()> {
    if points.len() != self.points.len() {
      bail!("Tracking produced {} points for a set of {}.", points.len(), self.points.len());
    }
    self.points = points;
    Ok(())
  }

  // First point within `radius` of `at`.
  pub fn hit_test(&self, at: &Point, radius: f64) -> Option<usize> {
    self.points.iter().position(|p| (p - at).norm() < radius)
  }
}

// Pointer gesture over the canvas: press near a point and drag to move it,
// or click elsewhere to add one.
#[derive(Clone, Debug, Default)]
pub struct Drag {
  // Index of the grabbed point and where it was before the drag.
  grabbed: Option<(usize, Point)>,
}

impl Drag {
  pub fn new() -> Drag {
    Drag::default()
  }

  pub fn dragged_index(&self) -> Option<usize> {
    self.grabbed.map(|(index, _)| index)
  }

  pub fn changed(&mut self, points: &mut PointSet, start: &Point, location: &Point, hit_radius: f64) {
    match self.grabbed {
      Some((index, _)) => {
        // The point may have been deleted during the drag.
        if !points.move_to(index, *location) {
          self.grabbed = None;
        }
      },
      None => {
        self.grabbed = points.hit_test(start, hit_radius)
          .map(|index| (index, points.as_slice()[index]));
        if let Some((index, _)) = self.grabbed {
          debug!("Start dragging point {}", index);
        }
      },
    }
  }

  pub fn ended(&mut self, points: &mut PointSet, location: &Point) {
    match self.grabbed.take() {
      Some((index, from)) => {
        if points.commit_move(index, from) {
          debug!("Finished dragging point {}", index);
        }
      },
      None => {
        points.add(*location);
        debug!("Added point at ({:.1}, {:.1})", location[0], location[1]);
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
  }

  #[test]
  fn test_edits_are_undoable() {
    let mut set = PointSet::new();
    set.add(p(1., 1.));
    set.add(p(2., 2.));
    set.delete(0);
    assert_eq!(set.as_slice(), &[p(2., 2.)]);
    assert!(set.undo());
    assert_eq!(set.as_slice(), &[p(1., 1.), p(2., 2.)]);
    assert!(set.undo());
    assert!(set.undo());
    assert!(set.is_empty());
    assert!(!set.undo());
    assert!(set.redo());
    assert_eq!(set.as_slice(), &[p(1., 1.)]);
  }

  #[test]
  fn test_new_edit_clears_redo() {
    let mut set = PointSet::new();
    set.add(p(1., 1.));
    set.undo();
    assert!(set.can_redo());
    set.add(p(3., 3.));
    assert!(!set.can_redo());
  }

  #[test]
  fn test_out_of_range_edits_are_ignored() {
    let mut set = PointSet::new();
    set.add(p(1., 1.));
    let revision = set.revision();
    assert!(!set.delete(5));
    assert!(!set.move_to(1, p(0., 0.)));
    assert!(!set.commit_move(1, p(0., 0.)));
    assert_eq!(set.revision(), revision);
    assert_eq!(set.len(), 1);
  }

  #[test]
  fn test_tracked_replace_skips_history() {
    let mut set = PointSet::new();
    set.add(p(1., 1.));
    set.add(p(2., 2.));
    let revision = set.revision();
    set.replace_tracked(vec![p(1.5, 1.), p(2.5, 2.)]).unwrap();
    assert_eq!(set.revision(), revision);
    assert!(set.replace_tracked(vec![p(0., 0.)]).is_err());
    assert_eq!(set.len(), 2);

    // Undo returns to the last user edit.
    set.undo();
    assert_eq!(set.as_slice(), &[p(1., 1.)]);
  }

  #[test]
  fn test_drag_moves_then_commits_once() {
    let mut set = PointSet::new();
    set.add(p(100., 100.));
    let mut drag = Drag::new();
    let start = p(105., 98.);
    drag.changed(&mut set, &start, &start, 20.);
    assert_eq!(drag.dragged_index(), Some(0));
    drag.changed(&mut set, &start, &p(150., 120.), 20.);
    drag.changed(&mut set, &start, &p(160., 130.), 20.);
    drag.ended(&mut set, &p(160., 130.));
    assert_eq!(set.as_slice(), &[p(160., 130.)]);
    assert_eq!(drag.dragged_index(), None);

    // One undo restores the position before the drag.
    set.undo();
    assert_eq!(set.as_slice(), &[p(100., 100.)]);
  }

  #[test]
  fn test_click_adds_point() {
    let mut set = PointSet::new();
    set.add(p(100., 100.));
    let mut drag = Drag::new();
    let start = p(300., 300.);
    drag.changed(&mut set, &start, &start, 20.);
    assert_eq!(drag.dragged_index(), None);
    drag.ended(&mut set, &start);
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(1), Some(&start));
  }

  #[test]
  fn test_drag_survives_deletion() {
    let mut set = PointSet::new();
    set.add(p(10., 10.));
    let mut drag = Drag::new();
    drag.changed(&mut set, &p(10., 10.), &p(10., 10.), 20.);
    assert_eq!(drag.dragged_index(), Some(0));
    set.delete_last();
    drag.changed(&mut set, &p(10., 10.), &p(50., 50.), 20.);
    assert_eq!(drag.dragged_index(), None);
    assert!(set.is_empty());
  }
}
