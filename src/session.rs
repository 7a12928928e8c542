use crate::all::*;

use tokio::sync::watch;
use tokio::task::JoinHandle;

// Drives a point set through single-frame relocations across a video, either
// one step at a time or in a continuous run.
//
// All mutable state sits behind one mutex that is never held across an await.
// A step snapshots what it needs, works without the lock, and commits only if
// neither a stop nor a user edit happened in the meantime.
#[derive(Clone)]
pub struct TrackingSession {
  shared: Arc<Shared>,
}

struct Shared {
  inner: Mutex<Inner>,
  state: watch::Sender<TrackingState>,
  tracker: Arc<dyn PointTracker>,
  p: ParameterSet,
}

struct Inner {
  source: Option<Arc<dyn FrameSource>>,
  points: PointSet,
  cursor: Timestamp,
  canvas: Size,
  status: Status,
  step_in_flight: bool,
  // Bumped by `stop()`. Steps started under an older epoch are dropped.
  epoch: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunRequest {
  Started,
  // The session was already running, and the call stopped it.
  StopRequested,
}

struct StepRequest {
  direction: TrackingDirection,
  source: Arc<dyn FrameSource>,
  points: Vec<Point>,
  rect: Rect,
  cursor: Timestamp,
  epoch: u64,
  revision: u64,
}

struct Relocation {
  points: Vec<Point>,
  tracked: usize,
  next: Timestamp,
}

// Clears the in-flight flag however the step ends, including when its future is dropped.
struct InFlight<'a>(&'a Shared);

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if let Ok(mut inner) = self.0.inner.lock() {
      inner.step_in_flight = false;
    }
  }
}

impl TrackingSession {
  pub fn new(tracker: Arc<dyn PointTracker>) -> TrackingSession {
    TrackingSession::with_parameters(tracker, ParameterSet::current())
  }

  pub fn with_parameters(tracker: Arc<dyn PointTracker>, p: ParameterSet) -> TrackingSession {
    let (state, _) = watch::channel(TrackingState::Idle);
    TrackingSession {
      shared: Arc::new(Shared {
        inner: Mutex::new(Inner {
          source: None,
          points: PointSet::new(),
          cursor: Timestamp::ZERO,
          canvas: Size::default(),
          status: Status::NoMedia,
          step_in_flight: false,
          epoch: 0,
        }),
        state,
        tracker,
        p,
      }),
    }
  }

  pub fn parameters(&self) -> &ParameterSet {
    &self.shared.p
  }

  pub fn attach_source(&self, source: Arc<dyn FrameSource>, name: &str) {
    self.stop();
    self.shared.tracker.reset();
    let mut inner = self.shared.inner.lock().unwrap();
    inner.source = Some(source);
    inner.cursor = Timestamp::ZERO;
    inner.status = Status::MediaLoaded(name.to_string());
    info!("Video loaded: {}", name);
  }

  pub fn set_canvas_size(&self, canvas: Size) {
    self.shared.inner.lock().unwrap().canvas = canvas;
  }

  // Where the video is drawn on the canvas, once both sizes are known.
  pub fn display_rect(&self) -> Option<Rect> {
    current_display_rect(&self.shared.inner.lock().unwrap())
  }

  pub fn points(&self) -> Vec<Point> {
    self.shared.inner.lock().unwrap().points.as_slice().to_vec()
  }

  // User edits. Everything done through `PointSet` here is undoable.
  // `f` runs under the session lock and must not call back into the session.
  pub fn edit<R>(&self, f: impl FnOnce(&mut PointSet) -> R) -> R {
    f(&mut self.shared.inner.lock().unwrap().points)
  }

  // Pointer gesture over the canvas, hit-testing with the configured radius.
  pub fn drag_changed(&self, drag: &mut Drag, start: &Point, location: &Point) {
    let hit_radius = self.shared.p.hit_radius;
    self.edit(|set| drag.changed(set, start, location, hit_radius))
  }

  pub fn drag_ended(&self, drag: &mut Drag, location: &Point) {
    self.edit(|set| drag.ended(set, location))
  }

  pub fn cursor(&self) -> Timestamp {
    self.shared.inner.lock().unwrap().cursor
  }

  pub fn state(&self) -> TrackingState {
    *self.shared.state.borrow()
  }

  pub fn status(&self) -> Status {
    self.shared.inner.lock().unwrap().status.clone()
  }

  pub async fn seek(&self, to: Timestamp) -> Result<()> {
    let source = self.shared.inner.lock().unwrap().source.clone()
      .ok_or(anyhow!("No media loaded."))?;
    let to = source.duration().map_or(to, |duration| to.min(duration));
    source.seek(to).await?;
    self.shared.inner.lock().unwrap().cursor = to;
    debug!("Seeked to {}", to);
    Ok(())
  }

  // Moves the cursor one frame without tracking.
  pub async fn seek_frame(&self, direction: TrackingDirection) -> Result<()> {
    let cursor = self.cursor();
    match cursor.advance(direction, self.shared.p.frame_duration()) {
      Some(to) => self.seek(to).await,
      None => Ok(()),
    }
  }

  pub fn export(&self, instance_id: &str) -> Result<MaskDocument> {
    let inner = self.shared.inner.lock().unwrap();
    let rect = current_display_rect(&inner)
      .ok_or(anyhow!("Cannot export before the video display rectangle is known."))?;
    MaskDocument::new(instance_id, inner.points.as_slice(), &rect)
  }

  // Relocates every point from the frame at the cursor to the next frame in
  // `direction`. Never fails: problems are reported in the outcome and status,
  // and leave points and cursor as they were.
  pub async fn step(&self, direction: TrackingDirection) -> StepOutcome {
    let request = match self.begin_step(direction) {
      Ok(request) => request,
      Err(outcome) => return outcome,
    };
    let _in_flight = InFlight(&self.shared);
    info!("=== Tracking step {} from {} with {} points ===",
      direction, request.cursor, request.points.len());

    match self.relocate(&request).await {
      Ok(relocation) => self.commit(&request, relocation),
      Err(outcome) => {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.epoch == request.epoch {
          inner.status = Status::Outcome(outcome.clone());
        }
        outcome
      },
    }
  }

  fn begin_step(&self, direction: TrackingDirection) -> std::result::Result<StepRequest, StepOutcome> {
    let mut inner = self.shared.inner.lock().unwrap();
    if inner.step_in_flight {
      warn!("Cannot track: previous step still in flight.");
      return Err(StepOutcome::Busy);
    }
    let checked = match (inner.source.clone(), current_display_rect(&inner)) {
      (None, _) => Err(Precondition::NoMedia),
      _ if inner.points.is_empty() => Err(Precondition::NoPoints),
      (Some(_), None) => Err(Precondition::NoDisplay),
      (Some(source), Some(rect)) => Ok((source, rect)),
    };
    let (source, rect) = match checked {
      Ok(checked) => checked,
      Err(failed) => {
        warn!("Cannot track: {:?}, {} points.", failed, inner.points.len());
        let outcome = StepOutcome::Precondition(failed);
        inner.status = Status::Outcome(outcome.clone());
        return Err(outcome);
      },
    };
    inner.step_in_flight = true;
    Ok(StepRequest {
      direction,
      source,
      points: inner.points.as_slice().to_vec(),
      rect,
      cursor: inner.cursor,
      epoch: inner.epoch,
      revision: inner.points.revision(),
    })
  }

  async fn relocate(&self, request: &StepRequest) -> std::result::Result<Relocation, StepOutcome> {
    let p = &self.shared.p;
    let tracker = &self.shared.tracker;
    let boundary = match request.direction {
      TrackingDirection::Forward => Unavailable::End,
      TrackingDirection::Backward => Unavailable::Start,
    };

    let reference = request.source.fetch_pixels(request.cursor).ok_or_else(|| {
      warn!("No pixel buffer for the current frame at {}.", request.cursor);
      StepOutcome::Unavailable(Unavailable::Current)
    })?;

    let origin = tracker.origin();
    let rois: Vec<NormalizedRect> = request.points.iter().enumerate().map(|(i, point)| {
      let v = to_normalized(point, &request.rect, origin);
      let roi = roi_around(&v, p.roi_size);
      debug!("Point[{}]: canvas ({:.1}, {:.1}) -> normalized ({:.3}, {:.3}), ROI origin ({:.3}, {:.3})",
        i, point[0], point[1], v[0], v[1], roi.origin[0], roi.origin[1]);
      roi
    }).collect();

    let next = request.cursor.advance(request.direction, p.frame_duration()).ok_or_else(|| {
      info!("Cannot step before the start of media.");
      StepOutcome::Unavailable(boundary)
    })?;
    debug!("Seeking to next frame {}", next);
    if let Err(err) = request.source.seek(next).await {
      warn!("Seek to {} failed: {:#}", next, err);
      return Err(StepOutcome::Unavailable(boundary));
    }
    // Let the decoder output catch up with the seek.
    tokio::time::sleep(p.seek_settle()).await;
    let target = request.source.fetch_pixels(next).ok_or_else(|| {
      info!("No pixel buffer at {}, likely {:?} of media.", next, boundary);
      StepOutcome::Unavailable(boundary)
    })?;

    let observations = match tracker.track_all(&reference, &rois, &target) {
      Ok(observations) => observations,
      Err(err) => {
        error!("Tracking request failed: {:#}", err);
        return Err(StepOutcome::TrackerError(err.to_string()));
      },
    };
    if observations.len() != rois.len() {
      error!("Tracker returned {} results for {} regions.", observations.len(), rois.len());
      return Err(StepOutcome::TrackerError(format!(
        "{} results for {} regions", observations.len(), rois.len())));
    }

    // Each point is updated on its own: a weak result only keeps that point in place.
    let mut tracked = 0;
    let points = request.points.iter().zip(&observations).enumerate().map(|(i, (point, observation))| {
      match observation {
        Some(o) if o.confidence > p.confidence_threshold => {
          tracked += 1;
          let moved = from_normalized(&o.bounding_box.center(), &request.rect, origin);
          debug!("Point[{}] tracked, confidence {:.3}: ({:.1}, {:.1})", i, o.confidence, moved[0], moved[1]);
          moved
        },
        Some(o) => {
          debug!("Point[{}] low confidence {:.3}, retaining old position.", i, o.confidence);
          *point
        },
        None => {
          debug!("Point[{}] no observation, retaining old position.", i);
          *point
        },
      }
    }).collect();
    Ok(Relocation { points, tracked, next })
  }

  fn commit(&self, request: &StepRequest, relocation: Relocation) -> StepOutcome {
    let mut inner = self.shared.inner.lock().unwrap();
    if inner.epoch != request.epoch {
      debug!("Dropping result of a step started before stop.");
      return StepOutcome::Discarded;
    }
    if inner.points.revision() != request.revision {
      warn!("Points were edited during the step, discarding its result.");
      let outcome = StepOutcome::Discarded;
      inner.status = Status::Outcome(outcome.clone());
      return outcome;
    }
    let total = relocation.points.len();
    if let Err(err) = inner.points.replace_tracked(relocation.points) {
      error!("{:#}", err);
      let outcome = StepOutcome::TrackerError(err.to_string());
      inner.status = Status::Outcome(outcome.clone());
      return outcome;
    }
    inner.cursor = relocation.next;
    let outcome = StepOutcome::Tracked { tracked: relocation.tracked, total };
    inner.status = Status::Outcome(outcome.clone());
    info!("Tracking complete at {}: {} successful, {} failed.",
      relocation.next, relocation.tracked, total - relocation.tracked);
    outcome
  }

  // Starts continuous tracking, or stops it if a run is already going.
  // Must be called from within a tokio runtime.
  pub fn run(&self, direction: TrackingDirection) -> RunRequest {
    let epoch = {
      let mut inner = self.shared.inner.lock().unwrap();
      if self.state().is_running() {
        drop(inner);
        self.stop();
        return RunRequest::StopRequested;
      }
      inner.status = Status::Tracking(direction);
      self.shared.state.send_replace(TrackingState::Running(direction));
      inner.epoch
    };
    info!("Tracking {} started.", direction);
    let session = self.clone();
    tokio::spawn(async move { session.run_loop(direction, epoch).await });
    RunRequest::Started
  }

  async fn run_loop(self, direction: TrackingDirection, epoch: u64) {
    loop {
      if !self.is_current(epoch) { return }
      match self.step(direction).await {
        StepOutcome::Unavailable(Unavailable::Start) | StepOutcome::Unavailable(Unavailable::End) => {
          self.finish(epoch, direction, true);
          return;
        },
        StepOutcome::Unavailable(Unavailable::Current) | StepOutcome::Precondition(_) => {
          self.finish(epoch, direction, false);
          return;
        },
        _ => {},
      }
      // Give the decoder time to catch up. A stop cuts the wait short.
      tokio::select! {
        _ = tokio::time::sleep(self.shared.p.step_delay()) => {},
        _ = not_running(self.shared.state.subscribe()) => {},
      }
      if !self.is_current(epoch) { return }
      if self.reached_bound(direction) {
        self.finish(epoch, direction, true);
        return;
      }
    }
  }

  fn is_current(&self, epoch: u64) -> bool {
    let inner = self.shared.inner.lock().unwrap();
    inner.epoch == epoch && self.state().is_running()
  }

  fn reached_bound(&self, direction: TrackingDirection) -> bool {
    let inner = self.shared.inner.lock().unwrap();
    match direction {
      TrackingDirection::Forward => inner.source.as_ref()
        .and_then(|source| source.duration())
        .map_or(false, |duration| inner.cursor >= duration),
      TrackingDirection::Backward => inner.cursor.as_secs_f64() <= self.shared.p.start_epsilon,
    }
  }

  // Ends a run that was not stopped. `completed` runs report "Finished";
  // runs ended by an error keep the error status.
  fn finish(&self, epoch: u64, direction: TrackingDirection, completed: bool) {
    let mut inner = self.shared.inner.lock().unwrap();
    if inner.epoch != epoch || !self.state().is_running() { return }
    if completed {
      inner.status = Status::Finished(direction);
      info!("Finished {}", direction);
    }
    else {
      info!("Tracking {} ended: {}", direction, inner.status);
    }
    self.shared.state.send_replace(TrackingState::Idle);
  }

  // Stops a run. Does nothing when not running.
  pub fn stop(&self) {
    let mut inner = self.shared.inner.lock().unwrap();
    if !self.state().is_running() { return }
    inner.epoch += 1;
    inner.status = Status::Stopped;
    self.shared.state.send_replace(TrackingState::Stopped);
    info!("Tracking stopped manually.");
  }

  // Resolves once no run is going, with the state it ended in.
  pub async fn finished(&self) -> TrackingState {
    let mut state = self.shared.state.subscribe();
    let result = state.wait_for(|s| !s.is_running()).await.map(|s| *s);
    result.unwrap_or(TrackingState::Idle)
  }

  // Tracks forward to the end of media, then backward to the start. Whether a
  // forward leg that was stopped or ended on an error still starts the
  // backward leg depends on the chain policy.
  pub fn run_full_auto(&self) -> JoinHandle<()> {
    let session = self.clone();
    tokio::spawn(async move {
      info!("Auto track: Forward then Backward");
      session.run(TrackingDirection::Forward);
      let end = session.finished().await;
      let completed = end == TrackingState::Idle
        && session.status() == Status::Finished(TrackingDirection::Forward);
      if !completed && session.shared.p.chain_policy == ChainPolicy::NaturalOnly {
        info!("Forward leg did not reach the end ({}), skipping the backward leg.", session.status());
        return;
      }
      session.run(TrackingDirection::Backward);
    })
  }
}

fn current_display_rect(inner: &Inner) -> Option<Rect> {
  display_rect(inner.source.as_ref()?.natural_size()?, inner.canvas)
}

async fn not_running(mut state: watch::Receiver<TrackingState>) {
  let _ = state.wait_for(|s| !s.is_running()).await;
}
