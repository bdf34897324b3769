//! gltf_inspect: print what a .gltf/.glb file decodes to and where it would be placed.
//!
//! Usage:
//!   cargo run --bin gltf_inspect -- <path> [--lng <deg>] [--lat <deg>] [--h <meters>]
//! Example:
//!   cargo run --bin gltf_inspect -- assets/CesiumMan.glb --lng 114 --lat 30

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::Path;

    use anyhow::{Context, Result, bail};
    use geo_gltf::{
        PlacementOptions,
        data_structures::{description::AssetDescription, mesh::PrimitiveKind},
        geodesy::WGS84,
        resources::{ModelSource, load_asset, transport::FileTransport},
    };

    struct Args {
        path: String,
        options: PlacementOptions,
    }

    fn parse_args() -> Result<Args> {
        let mut args = std::env::args().skip(1);
        let mut path = None;
        let mut options = PlacementOptions::default();
        while let Some(arg) = args.next() {
            let target = match arg.as_str() {
                "--lng" => &mut options.lng,
                "--lat" => &mut options.lat,
                "--h" => &mut options.h,
                flag if flag.starts_with("--") => bail!("unknown option {flag}"),
                _ => {
                    path = Some(arg);
                    continue;
                }
            };
            let value = args.next().with_context(|| format!("{arg} needs a value"))?;
            *target = value
                .parse()
                .with_context(|| format!("{arg} expects a number, got '{value}'"))?;
        }
        let path = path.context("usage: gltf_inspect <path> [--lng <deg>] [--lat <deg>] [--h <meters>]")?;
        Ok(Args { path, options })
    }

    fn print_summary(description: &AssetDescription, options: &PlacementOptions) {
        println!("version:    {:?}", description.version);
        println!("nodes:      {} ({} roots)", description.nodes.len(), description.roots.len());
        for (i, mesh) in description.meshes.iter().enumerate() {
            let skinned = mesh
                .primitives
                .iter()
                .filter(|p| p.kind() == PrimitiveKind::Skinned)
                .count();
            println!(
                "mesh {i}:     {} ({} primitives, {skinned} skinned)",
                mesh.name.as_deref().unwrap_or("<unnamed>"),
                mesh.primitives.len()
            );
        }
        for (i, skin) in description.skins.iter().enumerate() {
            println!("skin {i}:     {} joints", skin.joints.len());
        }
        for (i, animation) in description.animations.iter().enumerate() {
            println!(
                "animation {i}: {} ({} channels, {:.3}s)",
                animation.name.as_deref().unwrap_or("<unnamed>"),
                animation.channels.len(),
                animation.duration()
            );
        }
        let m = options.geo_transform(&WGS84);
        println!("placement at lng {} lat {} h {}:", options.lng, options.lat, options.h);
        for row in 0..4 {
            println!("  [{:>16.4} {:>16.4} {:>16.4} {:>16.4}]", m.x[row], m.y[row], m.z[row], m.w[row]);
        }
    }

    pub fn run() -> Result<()> {
        env_logger::init();
        let args = parse_args()?;
        let path = Path::new(&args.path);
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("'{}' has no file name", args.path))?
            .to_string();
        let root_path = match path.parent().and_then(|p| p.to_str()) {
            Some("") | None => String::new(),
            Some(dir) => format!("{dir}/"),
        };
        log::info!("inspecting {file_name} in '{root_path}'");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting runtime")?;
        let transport = FileTransport::new();
        let description = runtime
            .block_on(load_asset(&root_path, &ModelSource::FileName(file_name), &transport))
            .with_context(|| format!("loading {}", args.path))?;
        print_summary(&description, &args.options);
        Ok(())
    }
}
