use std::{
    env,
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
};

mod file_formats;
mod geom;
mod model;

use model::{Md3Model, MeshSource, ObjModel};

fn main() -> ExitCode {
    env_logger::init(); // Log to stderr (run with `RUST_LOG=debug` for detail)

    let patterns: Vec<String> = env::args().skip(1).collect();
    if patterns.is_empty() {
        eprintln!("usage: meshprobe <model-file-or-glob>...");
        return ExitCode::FAILURE;
    }

    let mut inspected = 0usize;
    for pattern in &patterns {
        for path in expand(pattern) {
            match inspect(&path) {
                Ok(true) => inspected += 1,
                Ok(false) => {}
                Err(err) => log::error!("{}: {}", path.display(), err),
            }
        }
    }

    if inspected == 0 {
        log::error!("no model files inspected");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// Arguments may be plain paths or glob patterns; a failing pattern only
// skips that argument.
fn expand(pattern: &str) -> Vec<PathBuf> {
    let literal = PathBuf::from(pattern);
    if literal.is_file() {
        return vec![literal];
    }

    match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(err) => {
                    log::warn!("{pattern}: {err}");
                    None
                }
            })
            .collect(),
        Err(err) => {
            log::error!("{pattern}: invalid pattern: {err}");
            Vec::new()
        }
    }
}

fn inspect(path: &Path) -> Result<bool, Box<dyn Error>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("md3") => {
            let model = Md3Model::from_file(path)?;
            println!(
                "{}: md3 \"{}\", {} surface(s), {} frame(s), {} tag(s)",
                path.display(),
                model.name(),
                model.mesh_count(),
                model.frame_count(),
                model.tags().len(),
            );
            for surface in 0..model.mesh_count() {
                let name = model.surface_name(surface)?.to_string();
                report_surface(&model, surface, &name)?;
            }
            report_bounds(&model);
            Ok(true)
        }
        Some("obj") => {
            let model = ObjModel::from_file(path)?;
            println!("{}: obj, {} surface(s)", path.display(), model.mesh_count());
            for surface in 0..model.mesh_count() {
                let name = model.surface_name(surface)?.to_string();
                report_surface(&model, surface, &name)?;
            }
            report_bounds(&model);
            Ok(true)
        }
        _ => {
            log::warn!("{}: not a model file, skipping", path.display());
            Ok(false)
        }
    }
}

fn report_surface(
    model: &dyn MeshSource,
    surface: usize,
    name: &str,
) -> Result<(), Box<dyn Error>> {
    let vertices = model.vertices(surface)?;
    let indices = model.indices(surface)?;
    println!(
        "  [{}] \"{}\": {} vertices, {} triangles",
        surface,
        name,
        vertices.len(),
        indices.len() / 3
    );
    Ok(())
}

fn report_bounds(model: &dyn MeshSource) {
    let bounds = model.bounds();
    println!("  bounds {} .. {}", bounds.min, bounds.max);
}
