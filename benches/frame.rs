//! Cost of one simulated frame for each effect on a 200×100 raster.
//!
//! Run with: cargo bench --bench frame

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skyfx::assets::{bake_smoke, PendingAsset};
use skyfx::canvas::Canvas;
use skyfx::config::{FireworksConfig, WeatherConfig};
use skyfx::effects::Effect;
use skyfx::effects::fireworks::FireworksEffect;
use skyfx::effects::weather::{SceneState, WeatherEffect};

fn bench_fireworks_frame(c: &mut Criterion) {
    let canvas = Canvas::new(200, 100, 6.0, (0, 0, 0));
    let mut effect = FireworksEffect::new(canvas, FireworksConfig::default(), fastrand::Rng::with_seed(1));
    // Warm up until bursts are in flight.
    for _ in 0..300 {
        effect.step();
    }

    c.bench_function("fireworks_frame", |b| b.iter(|| black_box(effect.step())));
}

fn bench_weather_frame(c: &mut Criterion) {
    let canvas = Canvas::new(200, 100, 6.0, (0, 0, 0));
    let texture = PendingAsset::spawn("smoke".to_string(), || Ok(bake_smoke(1)));
    let mut effect = WeatherEffect::with_assets(
        canvas,
        WeatherConfig::default(),
        fastrand::Rng::with_seed(1),
        texture,
        None,
    );
    while matches!(effect.state(), SceneState::Loading(_)) {
        effect.tick();
        std::thread::yield_now();
    }

    c.bench_function("weather_frame", |b| {
        b.iter(|| {
            effect.tick();
            black_box(effect.canvas().pixel(0, 0))
        })
    });
}

criterion_group!(benches, bench_fireworks_frame, bench_weather_frame);
criterion_main!(benches);
