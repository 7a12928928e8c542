use crate::all::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
  Idle,
  Running(TrackingDirection),
  // Idle after a manual stop. Not running, like `Idle`: callers that only
  // need to know whether a run is going should use `is_running()`.
  Stopped,
}

impl TrackingState {
  pub fn is_running(&self) -> bool {
    matches!(self, TrackingState::Running(_))
  }
}

// Which frame of a step could not be fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unavailable {
  // The decoder has nothing at the cursor.
  Current,
  // Stepping would leave the media.
  Start,
  End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
  NoMedia,
  // Video or canvas size not known yet.
  NoDisplay,
  NoPoints,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
  Tracked { tracked: usize, total: usize },
  Unavailable(Unavailable),
  TrackerError(String),
  Precondition(Precondition),
  // Another step is in flight.
  Busy,
  // The session was stopped or edited while the step was in flight.
  Discarded,
}

impl StepOutcome {
  pub fn is_tracked(&self) -> bool {
    matches!(self, StepOutcome::Tracked { .. })
  }
}

// Human readable session status.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
  NoMedia,
  MediaLoaded(String),
  Outcome(StepOutcome),
  Tracking(TrackingDirection),
  Finished(TrackingDirection),
  Stopped,
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Status::NoMedia => write!(f, "No media loaded"),
      Status::MediaLoaded(name) => write!(f, "Video loaded: {}", name),
      Status::Tracking(direction) => write!(f, "Tracking {}...", direction),
      Status::Finished(direction) => write!(f, "Finished {}", direction),
      Status::Stopped => write!(f, "Stopped"),
      Status::Outcome(outcome) => match outcome {
        StepOutcome::Tracked { tracked, total } => write!(f, "Tracked {}/{}", tracked, total),
        StepOutcome::Unavailable(Unavailable::Current) => write!(f, "No buffer"),
        StepOutcome::Unavailable(Unavailable::Start) => write!(f, "Reached start"),
        StepOutcome::Unavailable(Unavailable::End) => write!(f, "Reached end"),
        StepOutcome::TrackerError(err) => write!(f, "Track error: {}", err),
        StepOutcome::Precondition(Precondition::NoMedia) => write!(f, "Cannot track: no media loaded"),
        StepOutcome::Precondition(Precondition::NoDisplay) => write!(f, "Cannot track: video size unknown"),
        StepOutcome::Precondition(Precondition::NoPoints) => write!(f, "Cannot track: no points"),
        StepOutcome::Busy => write!(f, "Busy: previous step still running"),
        StepOutcome::Discarded => write!(f, "Step discarded"),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_text() {
    let s = Status::Outcome(StepOutcome::Tracked { tracked: 3, total: 4 });
    assert_eq!(s.to_string(), "Tracked 3/4");
    assert_eq!(Status::Finished(TrackingDirection::Forward).to_string(), "Finished Forward");
    assert_eq!(Status::Outcome(StepOutcome::Unavailable(Unavailable::End)).to_string(), "Reached end");
  }
}
