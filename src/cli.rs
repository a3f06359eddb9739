use crate::canvas::Rgb;
use crate::config::{Config, parse_hex_color};
use crate::error::{Error, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Fireworks,
    Weather,
}

impl EffectKind {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "fireworks" => Ok(EffectKind::Fireworks),
            "weather" => Ok(EffectKind::Weather),
            other => Err(Error::UnknownEffect(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub effect: EffectKind,
    pub config: Option<PathBuf>,
    pub bg_color: Option<Rgb>,
    pub texture: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub seed: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            effect: EffectKind::Fireworks,
            config: None,
            bg_color: None,
            texture: None,
            model: None,
            seed: None,
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Run(Options),
}

pub fn print_usage() {
    eprintln!("skyfx - fireworks and thunderstorm weather in the terminal");
    eprintln!();
    eprintln!("Usage: skyfx [EFFECT] [OPTIONS]");
    eprintln!();
    eprintln!("Effects:");
    eprintln!("  fireworks  Rising shells bursting into fading sparks (default)");
    eprintln!("  weather    Rain under spinning clouds with lightning flashes");
    eprintln!("             Drag with the left mouse button to orbit a loaded model, scroll to zoom");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --bg-color RRGGBB  Background color as hex (e.g., --bg-color 1a1b26)");
    eprintln!("  --config FILE      TOML file overriding the built-in tunables");
    eprintln!("  --texture FILE     PNG cloud texture (default: procedural smoke)");
    eprintln!("  --model FILE       glTF (.glb, .gltf) or OBJ model shown over the weather");
    eprintln!("  --seed N           Fixed random seed");
    eprintln!("  --log-file FILE    Write diagnostics to FILE");
    eprintln!();
    eprintln!("Press 'q', ESC, or Ctrl+C to exit");
}

/// Parses everything after the program name.
pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &'static str| args.next().ok_or(Error::MissingValue(flag));
        match arg.as_str() {
            "--bg-color" => options.bg_color = Some(parse_hex_color(&value("--bg-color")?)?),
            "--config" => options.config = Some(value("--config")?.into()),
            "--texture" => options.texture = Some(value("--texture")?.into()),
            "--model" => options.model = Some(value("--model")?.into()),
            "--log-file" => options.log_file = Some(value("--log-file")?.into()),
            "--seed" => {
                let raw = value("--seed")?;
                options.seed = Some(raw.parse().map_err(|_| Error::InvalidSeed(raw))?);
            }
            "help" | "--help" | "-h" => return Ok(Command::Help),
            flag if flag.starts_with('-') => return Err(Error::UnknownOption(flag.to_string())),
            name => options.effect = EffectKind::from_name(name)?,
        }
    }

    Ok(Command::Run(options))
}

impl Options {
    /// Command-line flags win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(color) = self.bg_color {
            config.display.background = color;
        }
        if let Some(seed) = self.seed {
            config.display.seed = Some(seed);
        }
        if let Some(texture) = &self.texture {
            config.weather.texture = Some(texture.clone());
        }
        if let Some(model) = &self.model {
            config.weather.model = Some(model.clone());
        }
        if let Some(file) = &self.log_file {
            config.log.file = Some(file.clone());
        }
    }
}
