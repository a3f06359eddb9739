//! Cloud texture and model loading, run on worker threads so the frame loop
//! never waits on disk. Images decode through `image`, models through `gltf`.

use crate::error::AssetError;
use crate::scene::{Mat4, Vec3};
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use std::path::{Path, PathBuf};

const SMOKE_SIZE: usize = 64;

/// RGBA texels in `0.0..=1.0`, row 0 at the top.
#[derive(Debug, Clone)]
pub struct Texture {
    width: usize,
    height: usize,
    texels: Vec<[f32; 4]>,
}

impl Texture {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Nearest-texel lookup; `u`, `v` are clamped to the unit square, `v = 0` is the top row.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let col = ((u.clamp(0.0, 1.0) * self.width as f32) as usize).min(self.width - 1);
        let row = ((v.clamp(0.0, 1.0) * self.height as f32) as usize).min(self.height - 1);
        self.texels[row * self.width + col]
    }
}

/// Where the cloud texture comes from.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Soft smoke puff baked from fractal noise.
    Smoke { seed: u32 },
    /// PNG with straight alpha, e.g. a smoke sprite.
    Image(PathBuf),
}

impl TextureSource {
    pub fn label(&self) -> String {
        match self {
            TextureSource::Smoke { seed } => format!("procedural smoke (seed {seed})"),
            TextureSource::Image(path) => path.display().to_string(),
        }
    }

    pub fn load(&self) -> Result<Texture, AssetError> {
        match self {
            TextureSource::Smoke { seed } => Ok(bake_smoke(*seed)),
            TextureSource::Image(path) => decode_image(path),
        }
    }
}

pub fn bake_smoke(seed: u32) -> Texture {
    let fbm = Fbm::<Perlin>::new(seed).set_octaves(4);
    let mut texels = Vec::with_capacity(SMOKE_SIZE * SMOKE_SIZE);

    for row in 0..SMOKE_SIZE {
        for col in 0..SMOKE_SIZE {
            let u = (col as f64 + 0.5) / SMOKE_SIZE as f64;
            let v = (row as f64 + 0.5) / SMOKE_SIZE as f64;
            let n = (fbm.get([u * 4.0, v * 4.0]) as f32 * 0.5 + 0.5).clamp(0.0, 1.0);

            let dist = (((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt() * 2.0) as f32;
            let falloff = (1.0 - dist).clamp(0.0, 1.0).powi(2);

            let shade = 0.85 + 0.15 * n;
            texels.push([shade, shade, shade, falloff * (0.4 + 0.6 * n)]);
        }
    }

    Texture {
        width: SMOKE_SIZE,
        height: SMOKE_SIZE,
        texels,
    }
}

fn decode_image(path: &Path) -> Result<Texture, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image::load_from_memory(&bytes)
        .map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();

    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(AssetError::Malformed {
            kind: "texture",
            path: path.to_path_buf(),
            reason: "empty image".to_string(),
        });
    }
    let texels = rgba.pixels().map(|pixel| pixel.0.map(|c| c as f32 / 255.0)).collect();

    Ok(Texture {
        width: width as usize,
        height: height as usize,
        texels,
    })
}

/// Vertex cloud of a model, in the file's own units.
#[derive(Debug, Clone)]
pub struct Model {
    pub vertices: Vec<Vec3>,
}

impl Model {
    /// Reads glTF (`.glb`, `.gltf`) or Wavefront OBJ, chosen by extension.
    pub fn load(path: &Path) -> Result<Model, AssetError> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        let malformed = |reason: String| AssetError::Malformed {
            kind: "model",
            path: path.to_path_buf(),
            reason,
        };

        match extension.as_deref() {
            Some("glb" | "gltf") => {
                let (document, buffers, _) = gltf::import(path).map_err(|source| AssetError::Gltf {
                    path: path.to_path_buf(),
                    source,
                })?;
                gltf_vertices(&document, &buffers).map_err(malformed)
            }
            Some("obj") => {
                let text = std::fs::read_to_string(path).map_err(|source| AssetError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                parse_obj(&text).map_err(malformed)
            }
            _ => Err(malformed("expected a .glb, .gltf or .obj file".to_string())),
        }
    }
}

/// Every mesh position of the default scene, with node transforms applied.
fn gltf_vertices(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Result<Model, String> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or("no scene")?;

    let mut vertices = Vec::new();
    for node in scene.nodes() {
        collect_positions(node, Mat4::IDENTITY, buffers, &mut vertices);
    }
    if vertices.is_empty() {
        return Err("no mesh positions".to_string());
    }
    Ok(Model { vertices })
}

fn collect_positions(node: gltf::Node<'_>, parent: Mat4, buffers: &[gltf::buffer::Data], out: &mut Vec<Vec3>) {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            if let Some(positions) = reader.read_positions() {
                out.extend(positions.map(|p| transform.transform_point3(Vec3::from_array(p))));
            }
        }
    }
    for child in node.children() {
        collect_positions(child, transform, buffers, out);
    }
}

fn parse_obj(text: &str) -> Result<Model, String> {
    let mut vertices = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("v") {
            continue;
        }
        let mut coord = || -> Result<f32, String> {
            fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| format!("line {}: bad vertex", line_no + 1))
        };
        vertices.push(Vec3::new(coord()?, coord()?, coord()?));
    }
    if vertices.is_empty() {
        return Err("no vertices".to_string());
    }
    Ok(Model { vertices })
}

/// Result of polling a background load.
pub enum AssetPoll<T> {
    Pending,
    Ready(T),
    Failed(AssetError),
}

/// A load running on its own thread, polled once per frame.
pub struct PendingAsset<T> {
    label: String,
    rx: Receiver<Result<T, AssetError>>,
}

impl<T: Send + 'static> PendingAsset<T> {
    pub fn spawn<F>(label: String, load: F) -> Self
    where
        F: FnOnce() -> Result<T, AssetError> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        tracing::info!(asset = %label, "loading asset");
        let spawned = std::thread::Builder::new()
            .name(format!("load {label}"))
            .spawn(move || {
                // The receiver may be gone if the effect was dropped first.
                let _ = tx.send(load());
            });
        if let Err(err) = spawned {
            tracing::error!(asset = %label, error = %err, "could not start loader thread");
        }
        Self { label, rx }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn poll(&self) -> AssetPoll<T> {
        match self.rx.try_recv() {
            Ok(Ok(asset)) => AssetPoll::Ready(asset),
            Ok(Err(err)) => AssetPoll::Failed(err),
            Err(TryRecvError::Empty) => AssetPoll::Pending,
            Err(TryRecvError::Disconnected) => AssetPoll::Failed(AssetError::Abandoned(self.label.clone())),
        }
    }
}

#[cfg(test)]
pub(crate) fn wait_for<T: Send + 'static>(pending: &PendingAsset<T>) -> Result<T, AssetError> {
    loop {
        match pending.poll() {
            AssetPoll::Pending => std::thread::sleep(std::time::Duration::from_millis(1)),
            AssetPoll::Ready(asset) => return Ok(asset),
            AssetPoll::Failed(err) => return Err(err),
        }
    }
}
