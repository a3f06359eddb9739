//! Terminal renditions of two decorative animations: a particle fireworks
//! show and a rain/cloud/lightning weather scene.

pub mod assets;
pub mod canvas;
pub mod cli;
pub mod config;
pub mod effects;
pub mod error;
pub mod frame_loop;
pub mod scene;
pub mod terminal;

pub use error::{AssetError, Error, Result};
