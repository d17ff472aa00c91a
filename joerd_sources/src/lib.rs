mod etopo1;
mod gmted;
mod great_lakes;
mod lidar;
mod ned;
mod ned_base;
mod ned_topobathy;
mod registry;
mod srtm;
mod traits;
mod util;

pub use etopo1::Etopo1Source;
pub use gmted::GmtedSource;
pub use great_lakes::GreatLakesSource;
pub use lidar::LidarSource;
pub use ned::NedSource;
pub use ned_topobathy::NedTopobathySource;
pub use registry::build_source;
pub use srtm::SrtmSource;
pub use traits::{SourcePlugin, SourceTileKey, download_tile};
