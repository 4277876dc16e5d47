pub mod catalog;
pub mod cli;
pub mod config;
pub mod detection;
pub mod embedding;
pub mod error;
pub mod index;
mod metrics;
pub mod outfit;
pub mod server;
pub mod store;
pub mod utils;
pub mod wardrobe;

pub use config::Opts;
pub use error::{Error, Result};
pub use wardrobe::{Wardrobe, WardrobeBuilder};
