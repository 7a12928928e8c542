use keytrack::all::*;

use clap::Parser;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(clap::ArgEnum)]
enum Mode {
  StepForward,
  StepBackward,
  Forward,
  Backward,
  // Forward to the end, then backward to the start.
  Auto,
}

#[derive(Parser)]
struct Args {
  #[clap(long)]
  video: Option<PathBuf>,
  #[clap(long, default_value = "0")]
  instance: String,
  // Keyframe point normalized to the video, origin top left. Repeatable.
  #[clap(long = "point", parse(try_from_str = parse_point))]
  points: Vec<Vector2d>,
  #[clap(long, arg_enum, default_value = "auto")]
  mode: Mode,
  // Seconds.
  #[clap(long, default_value = "0")]
  start: f64,
  // Defaults to the video size.
  #[clap(long, parse(try_from_str = parse_canvas))]
  canvas: Option<Size>,
  // Defaults to a file in the temporary directory.
  #[clap(long)]
  output: Option<PathBuf>,
  #[clap(long, default_value = "info")]
  log_level: LevelFilter,
  #[clap(flatten)]
  parameters: ParameterSet,
}

fn parse_point(s: &str) -> Result<Vector2d> {
  let (x, y) = s.split_once(',').ok_or(anyhow!("Expected x,y but got {}.", s))?;
  let x: f64 = x.trim().parse().context(format!("Bad x coordinate in {}.", s))?;
  let y: f64 = y.trim().parse().context(format!("Bad y coordinate in {}.", s))?;
  Ok(Vector2d::new(x, y))
}

fn parse_canvas(s: &str) -> Result<Size> {
  let (w, h) = s.split_once('x').ok_or(anyhow!("Expected WxH but got {}.", s))?;
  let size = Size::new(
    w.trim().parse().context(format!("Bad width in {}.", s))?,
    h.trim().parse().context(format!("Bad height in {}.", s))?,
  );
  if size.is_empty() {
    bail!("Canvas {} has no area.", s);
  }
  Ok(size)
}

fn validate(args: &Args) -> Result<()> {
  let p = &args.parameters;
  if p.frame_duration_value == 0 || p.frame_duration_timescale == 0 {
    bail!("Frame duration {}/{} must be positive.", p.frame_duration_value, p.frame_duration_timescale);
  }
  if !(0. ..=1.).contains(&p.roi_size) || p.roi_size == 0. {
    bail!("ROI size {} must be in (0, 1].", p.roi_size);
  }
  if !args.start.is_finite() {
    bail!("Start time {} is not finite.", args.start);
  }
  Ok(())
}

fn handle_error(err: &anyhow::Error) {
  for (i, e) in err.chain().enumerate() {
    println!("  {}: {}", i + 1, e);
  }
}

#[tokio::main]
async fn main() {
  if let Err(err) = run().await {
    handle_error(&err);
  }
}

async fn open_source(video: &Option<PathBuf>) -> Option<FfmpegSource> {
  match FfmpegSource::open(video.as_ref()?).await {
    Ok(source) => Some(source),
    Err(err) => {
      warn!("{:#}", err);
      None
    },
  }
}

async fn run() -> Result<()> {
  let args = Args::parse();
  env_logger::Builder::new()
    .filter_level(args.log_level)
    .format(format_log)
    .init();
  validate(&args)?;
  *PARAMETER_SET.lock().unwrap() = args.parameters.clone();

  let tracker = Arc::new(LucasKanadeTracker::new(&args.parameters)?);
  let session = TrackingSession::new(tracker);

  let source = match open_source(&args.video).await {
    Some(source) => source,
    None => {
      warn!("{}, nothing to track.", session.status());
      return Ok(());
    },
  };
  let canvas = match (args.canvas, source.natural_size()) {
    (Some(canvas), _) | (None, Some(canvas)) => canvas,
    (None, None) => bail!("Video size is unknown, pass --canvas."),
  };
  let name = args.video.as_ref()
    .and_then(|path| path.file_name())
    .map(|name| name.to_string_lossy().to_string())
    .unwrap_or_default();
  session.attach_source(Arc::new(source), &name);
  session.set_canvas_size(canvas);

  let rect = session.display_rect().ok_or(anyhow!("No display rectangle for canvas {:?}.", canvas))?;
  session.edit(|set| {
    for point in &args.points {
      set.add(from_normalized(point, &rect, Origin::TopLeft));
    }
  });
  session.seek(Timestamp::from_secs_f64(args.start)).await?;

  match args.mode {
    Mode::StepForward => { session.step(TrackingDirection::Forward).await; },
    Mode::StepBackward => { session.step(TrackingDirection::Backward).await; },
    Mode::Forward => {
      session.run(TrackingDirection::Forward);
      session.finished().await;
    },
    Mode::Backward => {
      session.run(TrackingDirection::Backward);
      session.finished().await;
    },
    Mode::Auto => {
      session.run_full_auto().await?;
      session.finished().await;
    },
  }
  info!("{} at {}", session.status(), session.cursor());

  let document = session.export(&args.instance)?;
  let path = args.output.clone().unwrap_or_else(|| MaskDocument::default_path(&args.instance));
  document.write(&path)?;
  info!("Mask saved to {}", path.display());
  Ok(())
}
