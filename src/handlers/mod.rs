pub mod config;
pub mod offer;
pub mod sessions;
pub mod setup;

pub use config::*;
pub use offer::*;
pub use sessions::*;
pub use setup::*;
