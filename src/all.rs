// NOTE This kind of import-all file isn't a common Rust idiom.

pub use crate::{
  export::*,
  frame::*,
  geometry::*,
  image::*,
  math::*,
  media_time::*,
  optical_flow::*,
  parameters::*,
  points::*,
  pyramid::*,
  session::*,
  status::*,
  tracker::*,
  types::*,
  util::*,
  video::*,
};

pub use {
  std::{
    fmt,
    fs::File,
    io::Read,
    ops::Index,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
  },
  log::{debug, error, info, warn, LevelFilter},
  nalgebra::{dmatrix, DMatrix},
  anyhow::{anyhow, bail, Context as AnyhowContext, Result},
  futures::future::BoxFuture,
};
