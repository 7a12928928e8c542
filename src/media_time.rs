use crate::all::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingDirection {
  Forward,
  Backward,
}

impl fmt::Display for TrackingDirection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TrackingDirection::Forward => write!(f, "Forward"),
      TrackingDirection::Backward => write!(f, "Backward"),
    }
  }
}

// Position on the media timeline. Never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub Duration);

impl Timestamp {
  pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

  pub fn from_secs_f64(seconds: f64) -> Timestamp {
    Timestamp(Duration::from_secs_f64(f64::max(seconds, 0.)))
  }

  pub fn as_secs_f64(self) -> f64 {
    self.0.as_secs_f64()
  }

  // One frame in the given direction. `None` before the start of media.
  pub fn advance(self, direction: TrackingDirection, frame: Duration) -> Option<Timestamp> {
    match direction {
      TrackingDirection::Forward => self.0.checked_add(frame).map(Timestamp),
      TrackingDirection::Backward => self.0.checked_sub(frame).map(Timestamp),
    }
  }
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.3}s", self.as_secs_f64())
  }
}
