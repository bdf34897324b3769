//! Globe scene: the assets placed on one ellipsoid and a shared clock.
//!
//! Setup runs as an explicit list of named [`InitStep`]s handed over in the
//! [`SceneConfig`]. Steps run once, in order, while the scene is built; the
//! first failing step aborts construction.

use std::fmt;

use anyhow::Context as _;
use instant::Instant;
use log::{debug, info};

use crate::{
    asset::{GeoAsset, PlacementOptions},
    backend::{Camera, RenderBackend},
    geodesy::{Ellipsoid, WGS84},
    resources::ModelSource,
};

/// Scene clock units per elapsed millisecond. The default yields seconds.
pub const DEFAULT_TIME_SCALE: f64 = 0.001;

/// One named setup action.
pub struct InitStep {
    pub name: String,
    pub run: Box<dyn Fn(&mut GlobeScene) -> anyhow::Result<()>>,
}

impl InitStep {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&mut GlobeScene) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }
}

impl fmt::Debug for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitStep").field("name", &self.name).finish()
    }
}

#[derive(Debug)]
pub struct SceneConfig {
    pub ellipsoid: Ellipsoid,
    pub time_scale: f64,
    pub init_steps: Vec<InitStep>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            ellipsoid: WGS84,
            time_scale: DEFAULT_TIME_SCALE,
            init_steps: Vec::new(),
        }
    }
}

pub struct GlobeScene {
    ellipsoid: Ellipsoid,
    time_scale: f64,
    started: Instant,
    assets: Vec<GeoAsset>,
}

impl GlobeScene {
    /// Build the scene and run every init step in order.
    pub fn new(config: SceneConfig) -> anyhow::Result<Self> {
        let SceneConfig {
            ellipsoid,
            time_scale,
            init_steps,
        } = config;
        let mut scene = Self {
            ellipsoid,
            time_scale,
            started: Instant::now(),
            assets: Vec::new(),
        };
        for step in &init_steps {
            debug!("running init step {}", step.name);
            (step.run)(&mut scene).with_context(|| format!("init step `{}` failed", step.name))?;
        }
        info!("globe scene ready after {} init steps", init_steps.len());
        Ok(scene)
    }

    /// Add an asset and return its index.
    pub fn add(&mut self, asset: GeoAsset) -> usize {
        self.assets.push(asset);
        self.assets.len() - 1
    }

    /// Create an asset placed on this scene's ellipsoid and add it.
    pub fn place(
        &mut self,
        root_path: impl Into<String>,
        source: ModelSource,
        options: PlacementOptions,
    ) -> usize {
        self.add(GeoAsset::on_ellipsoid(root_path, source, options, self.ellipsoid))
    }

    pub fn assets(&self) -> &[GeoAsset] {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut [GeoAsset] {
        &mut self.assets
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Far clipping distance that keeps the whole globe in view from an eye
    /// `eye_distance` away from the ellipsoid center.
    pub fn far_plane(&self, eye_distance: f64) -> f64 {
        eye_distance.abs() + self.ellipsoid.maximum_radius()
    }

    /// Scene time since construction.
    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0 * self.time_scale
    }

    /// Render every asset at the scene clock. Returns the total draw count.
    pub fn render(&mut self, backend: &mut dyn RenderBackend, camera: &dyn Camera) -> usize {
        let time = self.elapsed();
        self.render_at(backend, camera, time)
    }

    pub fn render_at(
        &mut self,
        backend: &mut dyn RenderBackend,
        camera: &dyn Camera,
        time: f64,
    ) -> usize {
        self.assets
            .iter_mut()
            .map(|asset| asset.render(backend, camera, time))
            .sum()
    }

    /// Release the backend handles of every asset.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        for asset in &mut self.assets {
            asset.release(backend);
        }
    }
}
