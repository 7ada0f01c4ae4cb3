pub mod cell;
pub mod coverer;
pub mod fanout;
pub mod locator;
pub mod mgrs;
pub mod poly;

pub use coverer::{CoverOptions, SphericalCellCoverer};
pub use fanout::FanoutFetcher;
pub use locator::ImageLocator;
pub use poly::PolyParser;
