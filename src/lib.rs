#[macro_use] extern crate lazy_static;

pub mod all;
pub mod export;
pub mod frame;
pub mod geometry;
pub mod image;
pub mod math;
pub mod media_time;
pub mod optical_flow;
pub mod parameters;
pub mod points;
pub mod pyramid;
pub mod session;
pub mod status;
pub mod tracker;
pub mod types;
pub mod util;
pub mod video;
