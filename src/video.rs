use crate::all::*;

use serde::Deserialize;
use std::collections::HashMap;
use std::process::{Command, Stdio};

// Decoded frames kept around the last seek, in frames.
const CACHE_REACH: u64 = 2;

// Seek-and-fetch access to decoded video frames.
pub trait FrameSource: Send + Sync {
  // Pixel size of the decoded frames, once known.
  fn natural_size(&self) -> Option<Size>;

  fn duration(&self) -> Option<Timestamp>;

  // Prepare the frame at `to` for `fetch_pixels()`.
  fn seek(&self, to: Timestamp) -> BoxFuture<'_, Result<()>>;

  // `None` if the frame at `at` is not decoded, including before the start
  // and past the end of media.
  fn fetch_pixels(&self, at: Timestamp) -> Option<Arc<Image>>;
}

// Decodes single frames by running `ffmpeg` at each seek.
pub struct FfmpegSource {
  path: PathBuf,
  width: usize,
  height: usize,
  frame_rate: f64,
  duration: Timestamp,
  cache: Mutex<HashMap<u64, Arc<Image>>>,
}

#[derive(Deserialize)]
struct Probe {
  streams: Vec<ProbeStream>,
  format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeStream {
  width: usize,
  height: usize,
  r_frame_rate: String,
}

#[derive(Deserialize)]
struct ProbeFormat {
  duration: String,
}

impl FfmpegSource {
  pub async fn open(path: &Path) -> Result<FfmpegSource> {
    if !path.is_file() {
      bail!("Video not found at {}.", path.display());
    }
    let probe_path = path.to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
      Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0",
          "-show_entries", "stream=width,height,r_frame_rate:format=duration",
          "-of", "json"])
        .arg(&probe_path)
        .stderr(Stdio::null())
        .output()
    }).await?.context("Failed to run ffprobe.")?;
    if !output.status.success() {
      bail!("ffprobe failed for {}.", path.display());
    }
    let probe: Probe = serde_json::from_slice(&output.stdout)
      .context("FfmpegSource::open JSON deserialization of ffprobe output failed.")?;
    let stream = probe.streams.first()
      .ok_or(anyhow!("No video stream in {}.", path.display()))?;
    let frame_rate = parse_rate(&stream.r_frame_rate)?;
    let duration: f64 = probe.format.duration.parse()
      .context(format!("Unparseable duration {}.", probe.format.duration))?;
    info!("Opened {}: {}x{}, {:.3} fps, {:.3}s.",
      path.display(), stream.width, stream.height, frame_rate, duration);
    Ok(FfmpegSource {
      path: path.to_path_buf(),
      width: stream.width,
      height: stream.height,
      frame_rate,
      duration: Timestamp::from_secs_f64(duration),
      cache: Mutex::new(HashMap::new()),
    })
  }

  // The frame shown at `t` is the last one starting at or before it.
  fn frame_index(&self, t: Timestamp) -> u64 {
    (t.as_secs_f64() * self.frame_rate + 1e-3).floor() as u64
  }
}

impl FrameSource for FfmpegSource {
  fn natural_size(&self) -> Option<Size> {
    Some(Size::new(self.width as f64, self.height as f64))
  }

  fn duration(&self) -> Option<Timestamp> {
    Some(self.duration)
  }

  fn seek(&self, to: Timestamp) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
      let index = self.frame_index(to);
      self.cache.lock().unwrap().retain(|&k, _| k.abs_diff(index) <= CACHE_REACH);
      if to >= self.duration { return Ok(()) }
      if self.cache.lock().unwrap().contains_key(&index) { return Ok(()) }

      let path = self.path.clone();
      let (width, height) = (self.width, self.height);
      let image = tokio::task::spawn_blocking(move || decode_frame(&path, to, width, height)).await??;
      if let Some(image) = image {
        self.cache.lock().unwrap().insert(index, Arc::new(image));
      }
      Ok(())
    })
  }

  fn fetch_pixels(&self, at: Timestamp) -> Option<Arc<Image>> {
    if at >= self.duration { return None }
    self.cache.lock().unwrap().get(&self.frame_index(at)).cloned()
  }
}

// `None` if ffmpeg produced no full frame, as happens past the last frame.
fn decode_frame(path: &Path, at: Timestamp, width: usize, height: usize) -> Result<Option<Image>> {
  let mut child = Command::new("ffmpeg")
    .args(["-v", "error", "-ss", &format!("{:.6}", at.as_secs_f64()), "-i"])
    .arg(path)
    .args(["-frames:v", "1", "-f", "rawvideo", "-vcodec", "rawvideo", "-pix_fmt", "gray", "-"])
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .spawn()
    .context("Failed to run ffmpeg.")?;
  let mut data = vec![];
  child.stdout.take()
    .ok_or(anyhow!("ffmpeg stdout not captured."))?
    .read_to_end(&mut data)
    .context("Reading bytes from video input failed.")?;
  child.wait()?;
  let n = width * height;
  if data.len() < n {
    debug!("No frame decoded at {} ({} bytes).", at, data.len());
    return Ok(None);
  }
  data.truncate(n);
  Ok(Some(Image::new(width, height, data)?))
}

// ffprobe rates look like "24000/1001" or "25".
fn parse_rate(s: &str) -> Result<f64> {
  let rate = match s.split_once('/') {
    Some((num, den)) => {
      let num: f64 = num.trim().parse().context(format!("Bad frame rate {}.", s))?;
      let den: f64 = den.trim().parse().context(format!("Bad frame rate {}.", s))?;
      num / den
    },
    None => s.trim().parse().context(format!("Bad frame rate {}.", s))?,
  };
  if !(rate.is_finite() && rate > 0.) {
    bail!("Frame rate {} is not positive.", s);
  }
  Ok(rate)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_rate() {
    assert!((parse_rate("24000/1001").unwrap() - 23.976).abs() < 1e-3);
    assert_eq!(parse_rate("25").unwrap(), 25.);
    assert!(parse_rate("0/0").is_err());
    assert!(parse_rate("abc").is_err());
  }

  #[test]
  fn test_probe_json() {
    let json = r#"{
      "programs": [],
      "streams": [{ "width": 1920, "height": 1080, "r_frame_rate": "30000/1001" }],
      "format": { "duration": "12.345000" }
    }"#;
    let probe: Probe = serde_json::from_str(json).unwrap();
    assert_eq!(probe.streams[0].width, 1920);
    assert_eq!(probe.format.duration, "12.345000");
  }

  #[tokio::test]
  async fn test_open_missing_file() {
    assert!(FfmpegSource::open(Path::new("/nonexistent/video.mp4")).await.is_err());
  }
}
