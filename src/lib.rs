//! Mass-weighted barycenter of a file of `x:y:z:mass` points.
//!
//! The file is loaded by one of the strategies in [`utils::loader`], then
//! folded pairwise by [`reduction::reduce`] until a single point is left.

pub mod config;
pub mod constants;
pub mod error;
pub mod mass_point;
pub mod reduction;
pub mod report;
pub mod utils;

pub use config::{Config, SkipPolicy, Strategy};
pub use error::{Error, Result};
pub use mass_point::MassPoint;
pub use report::{run, Report};
