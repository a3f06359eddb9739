use skyfx::canvas::Canvas;
use skyfx::cli::{self, Command, EffectKind};
use skyfx::config::Config;
use skyfx::effects::Effect;
use skyfx::effects::fireworks::FireworksEffect;
use skyfx::effects::weather::WeatherEffect;
use skyfx::frame_loop::FrameLoop;
use skyfx::terminal::TerminalGuard;
use skyfx::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, stdout};
use std::sync::Mutex;

fn init_logging(config: &Config) -> Result<()> {
    let level = config.log.max_level()?;
    let Some(path) = &config.log.file else {
        return Ok(());
    };
    let file = File::create(path).map_err(|source| Error::LogFile {
        path: path.clone(),
        source,
    })?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_max_level(level)
        .with_target(false)
        .init();
    Ok(())
}

fn run_effect<E: Effect>(mut effect: E, fps: u32) -> Result<()> {
    let stdout = BufWriter::with_capacity(1024 * 64, stdout());
    let mut terminal = TerminalGuard::enter(stdout)?;

    let mut frame_loop = FrameLoop::new(fps);
    frame_loop.run(&mut effect, terminal.out())?;
    Ok(())
}

fn run(options: cli::Options) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    options.apply(&mut config);
    init_logging(&config)?;

    let (cols, rows) = crossterm::terminal::size()?;
    let canvas = Canvas::new(
        cols as usize,
        rows as usize * 2,
        config.display.pixel_scale,
        config.display.background,
    );
    let rng = match config.display.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    tracing::info!(effect = ?options.effect, cols, rows, "starting");
    match options.effect {
        EffectKind::Fireworks => run_effect(
            FireworksEffect::new(canvas, config.fireworks, rng),
            config.display.fps,
        ),
        EffectKind::Weather => run_effect(
            WeatherEffect::new(canvas, config.weather, rng),
            config.display.fps,
        ),
    }
}

fn main() {
    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}");
            eprintln!();
            cli::print_usage();
            std::process::exit(1);
        }
    };

    let Command::Run(options) = command else {
        cli::print_usage();
        return;
    };

    if let Err(err) = run(options) {
        eprintln!("skyfx: {err}");
        std::process::exit(1);
    }
}
