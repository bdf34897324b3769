//! Geo-referenced asset facade.
//!
//! A [`GeoAsset`] owns one model: where it comes from, where it sits on the
//! ellipsoid, and, once loaded, its prepared description. Loading happens in a
//! [`LoadTask`] that the caller drives on whatever executor it has; the task
//! delivers its outcome through a oneshot channel that [`GeoAsset::render`]
//! polls. A resolved description is prepared and installed in one step, so a
//! render either sees no scene or a fully prepared one.
//!
//! # Example
//!
//! ```no_run
//! # use geo_gltf::{asset::{GeoAsset, PlacementOptions}, resources::ModelSource};
//! # fn demo(transport: geo_gltf::resources::transport::FileTransport) {
//! let options: PlacementOptions =
//!     serde_json::from_str(r#"{"lng": 114.0, "lat": 30.0, "scale": 10.0}"#).unwrap();
//! let mut asset = GeoAsset::new("assets/", ModelSource::FileName("duck.glb".into()), options);
//! let task = asset.load(transport);
//! futures::executor::block_on(task);
//! # }
//! ```

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use cgmath::{Matrix4, Vector3};
use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, Either, LocalBoxFuture},
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    backend::{Camera, RenderBackend},
    data_structures::description::AssetDescription,
    error::Result,
    geodesy::{Ellipsoid, WGS84},
    prepare, render,
    resources::{ModelSource, load_asset, transport::Transport},
};

/// Uniform or per-axis scale factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scale {
    Uniform(f64),
    PerAxis([f64; 3]),
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Uniform(1.0)
    }
}

impl Scale {
    pub fn to_vector(self) -> Vector3<f64> {
        match self {
            Scale::Uniform(s) => Vector3::new(s, s, s),
            Scale::PerAxis([x, y, z]) => Vector3::new(x, y, z),
        }
    }
}

/// Where and how an asset is placed, and which animation plays.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementOptions {
    /// Longitude in degrees.
    pub lng: f64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Height above the ellipsoid in meters.
    pub h: f64,
    /// Align the asset's up axis with the surface normal.
    pub vertical: bool,
    pub scale: Scale,
    pub anim_id: usize,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            lng: 0.0,
            lat: 0.0,
            h: 0.0,
            vertical: true,
            scale: Scale::default(),
            anim_id: 0,
        }
    }
}

impl PlacementOptions {
    pub fn geo_transform(&self, ellipsoid: &Ellipsoid) -> Matrix4<f64> {
        ellipsoid.placement(
            self.lng,
            self.lat,
            self.h,
            self.vertical,
            self.scale.to_vector(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    /// The load or its preparation failed. There is no retry.
    Failed,
}

/// How a [`LoadTask`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The outcome reached the asset.
    Delivered,
    /// The asset was gone before the outcome could be handed over.
    Discarded,
}

/// One-shot load of a [`GeoAsset`], driven by the caller's executor.
#[must_use = "a load task does nothing unless polled"]
pub struct LoadTask {
    inner: LocalBoxFuture<'static, Delivery>,
}

impl Future for LoadTask {
    type Output = Delivery;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Delivery> {
        self.inner.poll_unpin(cx)
    }
}

pub struct GeoAsset {
    root_path: String,
    source: ModelSource,
    options: PlacementOptions,
    ellipsoid: Ellipsoid,
    geo_transform: Matrix4<f64>,
    state: LoadState,
    pending: Option<oneshot::Receiver<Result<AssetDescription>>>,
    description: Option<AssetDescription>,
}

impl GeoAsset {
    /// An unloaded asset placed on [`WGS84`].
    pub fn new(root_path: impl Into<String>, source: ModelSource, options: PlacementOptions) -> Self {
        Self::on_ellipsoid(root_path, source, options, WGS84)
    }

    pub fn on_ellipsoid(
        root_path: impl Into<String>,
        source: ModelSource,
        options: PlacementOptions,
        ellipsoid: Ellipsoid,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            source,
            geo_transform: options.geo_transform(&ellipsoid),
            options,
            ellipsoid,
            state: LoadState::NotLoaded,
            pending: None,
            description: None,
        }
    }

    /// Start loading through `transport`.
    ///
    /// Only an unloaded asset starts a load; otherwise the returned task
    /// finishes immediately as [`Delivery::Discarded`].
    pub fn load<T: Transport + 'static>(&mut self, transport: T) -> LoadTask {
        if self.state != LoadState::NotLoaded {
            warn!("{}: load requested while {:?}", self.root_path, self.state);
            return LoadTask {
                inner: future::ready(Delivery::Discarded).boxed_local(),
            };
        }
        let (mut sender, receiver) = oneshot::channel();
        self.pending = Some(receiver);
        self.state = LoadState::Loading;
        let root_path = self.root_path.clone();
        let source = self.source.clone();
        let inner = async move {
            let loading = load_asset(&root_path, &source, &transport).boxed_local();
            let result = match future::select(loading, sender.cancellation()).await {
                Either::Left((result, _)) => result,
                Either::Right(_) => {
                    debug!("{root_path}: asset dropped while loading");
                    return Delivery::Discarded;
                }
            };
            match sender.send(result) {
                Ok(()) => Delivery::Delivered,
                Err(_) => {
                    debug!("{root_path}: asset dropped before delivery");
                    Delivery::Discarded
                }
            }
        };
        LoadTask {
            inner: inner.boxed_local(),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn options(&self) -> &PlacementOptions {
        &self.options
    }

    /// Change the placement and recompute the geo transform.
    pub fn set_placement(&mut self, options: PlacementOptions) {
        self.geo_transform = options.geo_transform(&self.ellipsoid);
        self.options = options;
    }

    /// Override the derived placement matrix.
    pub fn set_geo_transform(&mut self, matrix: Matrix4<f64>) {
        self.geo_transform = matrix;
    }

    pub fn geo_transform(&self) -> &Matrix4<f64> {
        &self.geo_transform
    }

    pub fn description(&self) -> Option<&AssetDescription> {
        self.description.as_ref()
    }

    pub fn description_mut(&mut self) -> Option<&mut AssetDescription> {
        self.description.as_mut()
    }

    /// World matrix of `node` for the current pose, without the geo transform.
    pub fn node_world_matrix(&self, node: usize) -> Option<Matrix4<f64>> {
        self.description.as_ref()?.node_world_matrix(node)
    }

    /// Install a finished load, animate and draw. Returns the number of draws.
    ///
    /// Does nothing until a load has been installed.
    pub fn render(
        &mut self,
        backend: &mut dyn RenderBackend,
        camera: &dyn Camera,
        time: f64,
    ) -> usize {
        self.install_pending(backend);
        let Some(description) = self.description.as_mut() else {
            return 0;
        };
        description.apply_animation(self.options.anim_id, time);
        render::draw(description, backend, camera, &self.geo_transform)
    }

    fn install_pending(&mut self, backend: &mut dyn RenderBackend) {
        let Some(receiver) = self.pending.as_mut() else {
            return;
        };
        let outcome = match receiver.try_recv() {
            Ok(None) => return,
            Ok(Some(outcome)) => outcome,
            Err(oneshot::Canceled) => {
                error!("{}: load task dropped before finishing", self.root_path);
                self.pending = None;
                self.state = LoadState::Failed;
                return;
            }
        };
        self.pending = None;
        let installed = outcome.and_then(|mut description| {
            prepare::prepare(&mut description, backend)?;
            Ok(description)
        });
        match installed {
            Ok(description) => {
                info!(
                    "{}: installed {:?} asset with {} nodes and {} primitives",
                    self.root_path,
                    description.version,
                    description.nodes.len(),
                    description.primitive_count()
                );
                self.description = Some(description);
                self.state = LoadState::Loaded;
            }
            Err(e) => {
                error!("{}: failed to load asset: {e}", self.root_path);
                self.state = LoadState::Failed;
            }
        }
    }

    /// Free every backend handle and forget the loaded description.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        self.pending = None;
        if let Some(mut description) = self.description.take() {
            prepare::release(&mut description, backend);
        }
        self.state = LoadState::NotLoaded;
    }
}
