//! Output plugins (§4.4): terrarium, normal and Skadi tile products, each
//! pairing an `OutputPlugin` (tile enumeration, rehydration) with a
//! `RenderTile` (composite, encode, write).

mod encode;
mod normal;
mod registry;
mod skadi;
mod terrarium;
mod traits;

pub mod mercator;
pub mod skadi_math;

pub use normal::{NormalOutput, NormalTile};
pub use registry::build_output;
pub use skadi::{SkadiOutput, SkadiTile};
pub use terrarium::{TerrariumOutput, TerrariumTile};
pub use traits::{OutputPlugin, RenderTile};
