use crate::all::*;

use clap::Parser;

lazy_static! {
  pub static ref PARAMETER_SET: Mutex<ParameterSet> = Mutex::new(ParameterSet::default());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(clap::ArgEnum)]
pub enum ChainPolicy {
  // Start the backward leg of a full-auto run however the forward leg ended.
  AnyStop,
  // Start the backward leg only if the forward leg reached the end of media.
  NaturalOnly,
}

#[derive(Clone, Debug)]
#[derive(clap::Parser)]
pub struct ParameterSet {
  // Session.
  #[clap(long, default_value = "0.12")]
  pub roi_size: f64,
  #[clap(long, default_value = "0.3")]
  pub confidence_threshold: f64,
  #[clap(long, default_value = "100")]
  pub step_delay_ms: u64,
  #[clap(long, default_value = "30")]
  pub seek_settle_ms: u64,
  #[clap(long, default_value = "1001")]
  pub frame_duration_value: u64,
  #[clap(long, default_value = "24000")]
  pub frame_duration_timescale: u64,
  #[clap(long, default_value = "0.01")]
  pub start_epsilon: f64,
  #[clap(long, arg_enum, default_value = "any-stop")]
  pub chain_policy: ChainPolicy,

  // Point editing.
  #[clap(long, default_value = "20")]
  pub hit_radius: f64,

  // Pyramidal Lucas-Kanade feature tracker.
  #[clap(long, default_value = "3")]
  pub lk_levels: usize,
  #[clap(long, default_value = "10")]
  pub lk_iters: usize,
  #[clap(long, default_value = "7")]
  pub lk_win_size: usize,
}

impl Default for ParameterSet {
  // Same values as the command line defaults.
  fn default() -> ParameterSet {
    ParameterSet::parse_from(["keytrack"])
  }
}

impl ParameterSet {
  pub fn current() -> ParameterSet {
    PARAMETER_SET.lock().unwrap().clone()
  }

  pub fn frame_duration(&self) -> Duration {
    Duration::from_secs_f64(self.frame_duration_value as f64 / self.frame_duration_timescale as f64)
  }

  pub fn step_delay(&self) -> Duration {
    Duration::from_millis(self.step_delay_ms)
  }

  pub fn seek_settle(&self) -> Duration {
    Duration::from_millis(self.seek_settle_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let p = ParameterSet::default();
    assert_eq!(p.roi_size, 0.12);
    assert_eq!(p.confidence_threshold, 0.3);
    assert_eq!(p.step_delay(), Duration::from_millis(100));
    assert_eq!(p.chain_policy, ChainPolicy::AnyStop);
    assert!((p.frame_duration().as_secs_f64() - 1001. / 24000.).abs() < 1e-9);
  }

  #[test]
  fn test_parse_flags() {
    let p = ParameterSet::parse_from(["keytrack", "--chain-policy", "natural-only", "--roi-size", "0.2"]);
    assert_eq!(p.chain_policy, ChainPolicy::NaturalOnly);
    assert_eq!(p.roi_size, 0.2);
  }
}
