//! Tunables for both loops, loaded once from an optional TOML file.
//!
//! Every field defaults to the values the effects were designed around, so an
//! empty file (or no file at all) reproduces the stock show.

use crate::canvas::Rgb;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub display: DisplayConfig,
    pub fireworks: FireworksConfig,
    pub weather: WeatherConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Simulation frames per second.
    pub fps: u32,
    /// Logical pixels per raster pixel.
    pub pixel_scale: f32,
    #[serde(deserialize_with = "hex_color")]
    pub background: Rgb,
    /// Fixed RNG seed; random when absent.
    pub seed: Option<u64>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            pixel_scale: 6.0,
            background: (0, 0, 0),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FireworksConfig {
    pub max_fireworks: usize,
    pub burst_size: usize,
    pub launch_speed: f32,
    pub start_radius: f32,
    pub radius_growth: f32,
    pub radius_cap: f32,
    pub head_radius: f32,
    /// Apex is drawn from `apex_min..apex_min + apex_span`, measured from the top.
    pub apex_min: u32,
    pub apex_span: u32,
    pub particle_speed_min: f32,
    pub particle_speed_span: f32,
    pub particle_radius_min: f32,
    pub particle_radius_span: f32,
    pub gravity: f32,
    pub gravity_ticks: u32,
    pub fade_step: f32,
    pub trail_alpha: f32,
    #[serde(deserialize_with = "hex_color")]
    pub trail_color: Rgb,
}

impl Default for FireworksConfig {
    fn default() -> Self {
        Self {
            max_fireworks: 4,
            burst_size: 120,
            launch_speed: 5.0,
            start_radius: 1.0,
            radius_growth: 0.35,
            radius_cap: 20.0,
            head_radius: 3.0,
            apex_min: 50,
            apex_span: 150,
            particle_speed_min: -4.0,
            particle_speed_span: 10.0,
            particle_radius_min: 1.0,
            particle_radius_span: 2.0,
            gravity: 0.12,
            gravity_ticks: 200,
            fade_step: 0.02,
            trail_alpha: 0.1,
            trail_color: (0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub rain_count: usize,
    pub cloud_count: usize,
    pub rain_floor: f32,
    pub rain_ceiling: f32,
    pub rain_accel_min: f32,
    pub rain_accel_span: f32,
    pub rain_spin: f32,
    /// Raster alpha for a drop too small to cover a whole pixel.
    pub rain_min_alpha: f32,
    #[serde(deserialize_with = "hex_color")]
    pub rain_color: Rgb,
    pub cloud_spin: f32,
    pub cloud_opacity: f32,
    pub flash_chance: f32,
    pub flash_threshold: f32,
    pub flash_power_min: f32,
    pub flash_power_span: f32,
    #[serde(deserialize_with = "hex_color")]
    pub clear_color: Rgb,
    /// PNG cloud texture; a procedural smoke puff is baked when unset.
    pub texture: Option<PathBuf>,
    /// glTF (`.glb`/`.gltf`) or OBJ model drawn over the weather.
    pub model: Option<PathBuf>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            rain_count: 15_000,
            cloud_count: 25,
            rain_floor: -200.0,
            rain_ceiling: 200.0,
            rain_accel_min: 0.1,
            rain_accel_span: 0.1,
            rain_spin: 0.002,
            rain_min_alpha: 0.25,
            rain_color: (0xad, 0xd8, 0xe6),
            cloud_spin: 0.002,
            cloud_opacity: 0.6,
            flash_chance: 0.07,
            flash_threshold: 100.0,
            flash_power_min: 50.0,
            flash_power_span: 500.0,
            clear_color: (0xcc, 0xe0, 0xff),
            texture: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Most verbose level written to the log file.
    pub fn max_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| Error::InvalidLogLevel(self.level.clone()))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn parse_hex_color(hex: &str) -> Result<Rgb> {
    let invalid = || Error::InvalidColor(hex.to_string());
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).map_err(|_| invalid());
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn hex_color<'de, D>(deserializer: D) -> std::result::Result<Rgb, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_hex_color(&text).map_err(serde::de::Error::custom)
}
