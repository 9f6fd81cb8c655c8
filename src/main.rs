// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

use anyhow::{Context, Result};
use cavita::{
    compute_pocket_energy_grids, sort_pockets, AtomCellGrid, EnergyGridConfig, Pocket,
    PocketOrdering, Structure,
};
use clap::Parser;
use log::{error, info};
use serde::Deserialize;
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Energy grids and ranking for candidate protein binding pockets
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// YAML scene with the protein structure and detected pockets
    #[arg(short, long)]
    scene: PathBuf,
    /// Directory for per-pocket grid files
    #[arg(short, long, default_value = "grids")]
    outdir: PathBuf,
    /// Comparator used to rank the pocket collection
    #[arg(short, long, value_enum, default_value = "score")]
    rank: PocketOrdering,
    /// Skip writing grid files
    #[arg(long)]
    no_grids: bool,
}

/// One self-contained input: atoms with resolved force-field parameters,
/// the detected pocket collection and the grid parameters.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Scene {
    structure: Structure,
    pockets: Vec<Pocket>,
    #[serde(default)]
    config: EnergyGridConfig,
}

fn load_scene(path: &Path) -> Result<Scene> {
    let file = File::open(path).context("cannot open scene file")?;
    let scene: Scene = serde_yaml::from_reader(file).context("cannot parse scene file")?;
    scene.structure.validate()?;
    for (i, pocket) in scene.pockets.iter().enumerate() {
        pocket
            .validate(scene.structure.len())
            .with_context(|| format!("pocket {i}"))?;
    }
    info!(
        "Loaded {} atoms and {} pockets from {}",
        scene.structure.len(),
        scene.pockets.len(),
        path.display()
    );
    Ok(scene)
}

/// Write one pocket's grid pair. A stream failure aborts this pocket's
/// output only; remaining pockets are unaffected.
fn write_pocket_grids(
    outdir: &Path,
    pocket_index: usize,
    pair: &cavita::PocketEnergyGrid,
) -> Result<()> {
    for (kind, grid) in [("vdw", &pair.vdw), ("elec", &pair.elec)] {
        let path = outdir.join(format!("pocket_{pocket_index}_{kind}.grid"));
        let mut stream = BufWriter::new(File::create(&path)?);
        grid.write(&mut stream)
            .with_context(|| format!("failed writing {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();
    let Scene {
        structure,
        mut pockets,
        config,
    } = load_scene(&args.scene)?;

    let index = AtomCellGrid::new(&structure, config.cutoff);
    let grids = compute_pocket_energy_grids(&mut pockets, &structure, &index, &config)?;

    if !args.no_grids {
        std::fs::create_dir_all(&args.outdir)?;
        for (i, pair) in grids.iter().enumerate() {
            let Some(pair) = pair else { continue };
            if let Err(err) = write_pocket_grids(&args.outdir, i, pair) {
                error!("Pocket {i}: {err:#}");
            }
        }
    }

    sort_pockets(&mut pockets, args.rank);
    info!("Pockets ranked by {:?}:", args.rank);
    for (rank, pocket) in pockets.iter().enumerate() {
        info!(
            "  #{:<3} score {:>7.3}  volume {:>9.1} Å³  {:>5} spheres{}",
            rank + 1,
            pocket.score,
            pocket.volume,
            pocket.n_alpha_spheres(),
            pocket
                .correspondence
                .map(|c| format!("  correspondence {c:.3}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
