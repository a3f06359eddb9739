use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop `skyfx` before or while it owns the terminal.
#[derive(Error, Debug)]
pub enum Error {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid hex color: {0} (expected RRGGBB, e.g. 1a1b26)")]
    InvalidColor(String),

    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("invalid log level: {0} (expected trace, debug, info, warn or error)")]
    InvalidLogLevel(String),

    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures while loading a texture or model off the frame thread.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot decode image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("cannot import glTF {path}: {source}")]
    Gltf {
        path: PathBuf,
        source: gltf::Error,
    },

    #[error("malformed {kind} {path}: {reason}")]
    Malformed {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("loader for {0} exited without a result")]
    Abandoned(String),
}

pub type Result<T> = std::result::Result<T, Error>;
