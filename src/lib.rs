pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::config::TomlConfig;
pub use crate::core::{FanoutFetcher, ImageLocator, PolyParser, SphericalCellCoverer};
pub use crate::domain::model::{AreaCount, BoundingBox, GeoPoint, GridTileCode, ImageListing};
pub use crate::utils::error::{LocatorError, Result};
