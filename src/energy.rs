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

//! Per-pocket energy fields: atom resolution and pairwise accumulation.
//!
//! For every grid cell inside a pocket's cavity, the set of protein atoms
//! co-determining its energy is resolved (alpha-sphere contacts first, then
//! a spatial-index sweep within a cutoff) and Lennard-Jones plus Coulomb
//! contributions are summed into the pocket's two grids.

use crate::{
    grid::{Grid, PocketEnergyGrid},
    pocket::{AlphaSphere, Pocket},
    structure::{AtomCellGrid, Structure},
    Vector3,
};
use anyhow::Result;
use get_size::GetSize;
use indicatif::ParallelProgressIterator;
use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Coulomb prefactor in kcal·Å/(mol·e²)
const COULOMB_CONSTANT: f64 = 332.0637;

/// Shortest pair distance used in the potentials; closer encounters are
/// clamped so that grids never pick up non-finite values
const MIN_PAIR_DISTANCE: f64 = 1.0e-3;

/// Tunable constants for the energy-grid computation.
///
/// The numeric defaults mirror common force-field practice: 0.3 Å grid
/// resolution, a one-grid-spacing box margin, a 6 Å atom-search cutoff
/// (roughly the longest van der Waals interaction range) and a hard cap of
/// 1000 atoms per grid point.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnergyGridConfig {
    /// Grid cell edge length (Å)
    pub resolution: f64,
    /// Extra padding around the pocket bounding box (Å)
    pub margin: f64,
    /// Search radius for atoms influencing a grid point (Å)
    pub cutoff: f64,
    /// Hard cap on atoms considered per grid point
    pub atom_cap: usize,
    /// Lennard-Jones well depth of the grid probe (kcal/mol)
    pub probe_epsilon: f64,
    /// Lennard-Jones minimum-energy radius of the grid probe (Å)
    pub probe_radius: f64,
    /// Relative permittivity for the Coulomb term
    pub permittivity: f64,
    /// Divisor for the optional mean-energy post-pass over visited cells
    pub mean_divisor: Option<u32>,
}

impl Default for EnergyGridConfig {
    fn default() -> Self {
        Self {
            resolution: 0.3,
            margin: 1.0,
            cutoff: 6.0,
            atom_cap: 1000,
            probe_epsilon: 0.15,
            probe_radius: 1.7,
            permittivity: 1.0,
            mean_divisor: None,
        }
    }
}

/// Lennard-Jones 12-6 energy between an atom and the grid probe (kcal/mol).
///
/// Geometric-mean well depth and summed minimum-energy radii; the curve has
/// its minimum `-ε` at `rmin` and decays as r⁻⁶ beyond it.
pub fn lennard_jones(
    distance: f64,
    epsilon: f64,
    vdw_radius: f64,
    config: &EnergyGridConfig,
) -> f64 {
    let distance = distance.max(MIN_PAIR_DISTANCE);
    let epsilon = (epsilon * config.probe_epsilon).sqrt();
    let rmin = vdw_radius + config.probe_radius;
    let x = (rmin / distance).powi(6);
    epsilon * (x * x - 2.0 * x)
}

/// Coulomb energy of a unit probe charge against a partial charge (kcal/mol)
pub fn coulomb(distance: f64, charge: f64, permittivity: f64) -> f64 {
    COULOMB_CONSTANT * charge / (permittivity * distance.max(MIN_PAIR_DISTANCE))
}

/// Deduplicated, capped set of atom indices resolved for one grid point.
///
/// Insertion keeps first-found order; an atom index already present is
/// never added twice, and pushes beyond the cap are dropped so dense
/// atomic environments cannot blow up per-point cost.
#[derive(Debug, Default)]
pub struct AtomAccumulator {
    ids: Vec<u32>,
    seen: HashSet<u32>,
    cap: usize,
}

impl AtomAccumulator {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            ids: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    /// Add an atom index unless it is a duplicate or the cap is reached.
    /// Returns false once the accumulator is full.
    pub fn push(&mut self, atom: u32) -> bool {
        if self.ids.len() >= self.cap {
            return false;
        }
        if self.seen.insert(atom) {
            self.ids.push(atom);
        }
        true
    }

    pub fn atoms(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve the atom set co-determining the energy at an occupied grid point.
///
/// Contact atoms of every alpha sphere overlapping the point are taken
/// first - they are always physically close to any point inside that
/// sphere - then the cell index contributes remaining atoms within the
/// cutoff radius, all deduplicated by atom index and truncated at the cap.
pub fn resolve_atoms(
    point: &Vector3,
    pocket: &Pocket,
    structure: &Structure,
    index: &AtomCellGrid,
    config: &EnergyGridConfig,
) -> AtomAccumulator {
    let mut acc = AtomAccumulator::with_cap(config.atom_cap);
    for sphere in pocket.spheres.iter().filter(|s| s.contains(point)) {
        for &atom in &sphere.contact_atoms {
            if !acc.push(atom) {
                break;
            }
        }
    }
    let mut full = acc.len() >= config.atom_cap;
    index.for_each_within(structure, point, config.cutoff, |atom, _| {
        if !full {
            full = !acc.push(atom);
        }
    });
    if full {
        trace!("atom cap {} reached at grid point {point:?}", config.atom_cap);
    }
    acc
}

/// Sum both pairwise terms from each resolved atom into the grids at (i, j, k)
fn accumulate_point(
    point: &Vector3,
    atoms: &AtomAccumulator,
    structure: &Structure,
    config: &EnergyGridConfig,
    cell: (usize, usize, usize),
    vdw: &mut Grid,
    elec: &mut Grid,
) {
    let (mut vdw_sum, mut elec_sum) = (0.0, 0.0);
    for &atom in atoms.atoms() {
        let atom = atom as usize;
        let distance = (structure.pos[atom] - point).norm();
        vdw_sum += lennard_jones(
            distance,
            structure.epsilons[atom],
            structure.vdw_radii[atom],
            config,
        );
        elec_sum += coulomb(distance, structure.charges[atom], config.permittivity);
    }
    let (i, j, k) = cell;
    vdw.deposit(i, j, k, vdw_sum);
    elec.deposit(i, j, k, elec_sum);
}

/// Electrostatic energy at an alpha sphere's own center, from its contact
/// atoms only. Used to annotate the sphere itself, independent of any grid.
pub fn sphere_electrostatic_energy(
    sphere: &AlphaSphere,
    structure: &Structure,
    permittivity: f64,
) -> f64 {
    sphere
        .contact_atoms
        .iter()
        .map(|&atom| {
            let distance = (structure.pos[atom as usize] - sphere.center).norm();
            coulomb(distance, structure.charges[atom as usize], permittivity)
        })
        .sum()
}

/// Compute the van der Waals / electrostatic grid pair for a single pocket
/// and annotate each of its alpha spheres with the electrostatic energy at
/// the sphere center.
pub fn pocket_energy_grid(
    pocket: &mut Pocket,
    structure: &Structure,
    index: &AtomCellGrid,
    config: &EnergyGridConfig,
) -> Result<PocketEnergyGrid> {
    let mut vdw = Grid::for_pocket(pocket, config.resolution, config.margin)?;
    let mut elec = vdw.clone(); // same geometry, cells in 1:1 correspondence
    for i in 0..vdw.nx {
        for j in 0..vdw.ny {
            for k in 0..vdw.nz {
                let point = vdw.cell_center(i, j, k);
                if !pocket.occupies(&point) {
                    continue;
                }
                let atoms = resolve_atoms(&point, pocket, structure, index, config);
                accumulate_point(
                    &point,
                    &atoms,
                    structure,
                    config,
                    (i, j, k),
                    &mut vdw,
                    &mut elec,
                );
            }
        }
    }
    for sphere in &mut pocket.spheres {
        sphere.electrostatic_energy = Some(sphere_electrostatic_energy(
            sphere,
            structure,
            config.permittivity,
        ));
    }
    if let Some(divisor) = config.mean_divisor {
        vdw.normalize_mean(divisor)?;
        elec.normalize_mean(divisor)?;
    }
    debug!(
        "{}x{}x{} grid pair: {} of {} cells in cavity",
        vdw.nx,
        vdw.ny,
        vdw.nz,
        vdw.n_visited(),
        vdw.nx * vdw.ny * vdw.nz
    );
    Ok(PocketEnergyGrid { vdw, elec })
}

/// Compute energy grid pairs for the whole pocket collection.
///
/// Pockets are processed in parallel; each worker exclusively owns its
/// pocket's grids while the structure and cell index are shared read-only.
/// A pocket with no alpha spheres is a caller precondition violation and
/// yields `None` in its slot; an oversized grid aborts the run.
pub fn compute_pocket_energy_grids(
    pockets: &mut [Pocket],
    structure: &Structure,
    index: &AtomCellGrid,
    config: &EnergyGridConfig,
) -> Result<Vec<Option<PocketEnergyGrid>>> {
    let n_pockets = pockets.len();
    info!("Computing energy grids for {n_pockets} pockets...");
    let grids: Result<Vec<_>> = pockets
        .par_iter_mut()
        .progress_count(n_pockets as u64)
        .map(|pocket| {
            if pocket.spheres.is_empty() {
                warn!("Skipping degenerate pocket with no alpha spheres");
                return Ok(None);
            }
            pocket.validate(structure.len())?;
            pocket_energy_grid(pocket, structure, index, config).map(Some)
        })
        .collect();
    let grids = grids?;
    let total_bytes: usize = grids.iter().flatten().map(GetSize::get_size).sum();
    info!(
        "Finished {} grid pairs ({:.1} MB)",
        grids.iter().flatten().count(),
        total_bytes as f64 / f64::powi(1024.0, 2)
    );
    Ok(grids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn probe_config() -> EnergyGridConfig {
        EnergyGridConfig::default()
    }

    fn tiny_structure() -> Structure {
        Structure {
            pos: vec![
                Vector3::new(1.5, 0.0, 0.0),
                Vector3::new(-1.5, 0.0, 0.0),
                Vector3::new(0.0, 1.5, 0.0),
            ],
            charges: vec![0.5, -0.5, 0.25],
            epsilons: vec![0.1, 0.1, 0.2],
            vdw_radii: vec![1.7, 1.7, 1.5],
            serials: vec![1, 2, 3],
        }
    }

    fn sphere(center: Vector3, radius: f64, contacts: Vec<u32>) -> AlphaSphere {
        AlphaSphere {
            center,
            radius,
            contact_atoms: contacts,
            electrostatic_energy: None,
        }
    }

    #[test]
    fn lennard_jones_minimum_is_minus_epsilon() {
        let config = probe_config();
        let (eps, rmin_half) = (0.2, 1.8);
        let rmin = rmin_half + config.probe_radius;
        let at_minimum = lennard_jones(rmin, eps, rmin_half, &config);
        assert_relative_eq!(
            at_minimum,
            -(eps * config.probe_epsilon).sqrt(),
            epsilon = 1e-12
        );
        // Repulsive inside, attractive outside
        assert!(lennard_jones(0.5 * rmin, eps, rmin_half, &config) > 0.0);
        assert!(lennard_jones(1.5 * rmin, eps, rmin_half, &config) < 0.0);
    }

    #[test]
    fn pair_terms_stay_finite_at_zero_distance() {
        let config = probe_config();
        assert!(lennard_jones(0.0, 0.1, 1.7, &config).is_finite());
        assert!(coulomb(0.0, 1.0, 1.0).is_finite());
    }

    #[test]
    fn coulomb_scales_with_inverse_distance() {
        assert_relative_eq!(coulomb(2.0, 1.0, 1.0), COULOMB_CONSTANT / 2.0);
        assert_relative_eq!(coulomb(4.0, 1.0, 2.0), COULOMB_CONSTANT / 8.0);
    }

    #[test]
    fn accumulator_deduplicates_and_caps() {
        let mut acc = AtomAccumulator::with_cap(3);
        assert!(acc.push(7));
        assert!(acc.push(7)); // duplicate, absorbed
        assert!(acc.push(1));
        assert!(acc.push(2));
        assert!(!acc.push(9)); // over the cap
        assert_eq!(acc.atoms(), &[7, 1, 2]);
    }

    #[test]
    fn overlapping_spheres_share_one_contact_atom() {
        // Two overlapping spheres whose contact lists share atom 0 and
        // differ in one atom each: the resolved set has three atoms
        let structure = tiny_structure();
        let pocket = Pocket {
            spheres: vec![
                sphere(Vector3::new(-0.3, 50.0, 0.0), 1.0, vec![0, 1]),
                sphere(Vector3::new(0.3, 50.0, 0.0), 1.0, vec![0, 2]),
            ],
            volume: 0.0,
            score: 0.0,
            correspondence: None,
        };
        // Far from all atoms so the cell-index sweep contributes nothing
        let index = AtomCellGrid::new(&structure, 6.0);
        let point = Vector3::new(0.0, 50.0, 0.0);
        let acc = resolve_atoms(&point, &pocket, &structure, &index, &probe_config());
        let mut atoms = acc.atoms().to_vec();
        atoms.sort_unstable();
        assert_eq!(atoms, vec![0, 1, 2]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let structure = tiny_structure();
        let pocket = Pocket {
            spheres: vec![sphere(Vector3::zeros(), 1.0, vec![2, 0])],
            volume: 0.0,
            score: 0.0,
            correspondence: None,
        };
        let index = AtomCellGrid::new(&structure, 6.0);
        let point = Vector3::zeros();
        let config = probe_config();
        let first = resolve_atoms(&point, &pocket, &structure, &index, &config);
        let second = resolve_atoms(&point, &pocket, &structure, &index, &config);
        let sorted = |acc: &AtomAccumulator| {
            let mut v = acc.atoms().to_vec();
            v.sort_unstable();
            v
        };
        assert_eq!(sorted(&first), sorted(&second));
        assert_eq!(sorted(&first), vec![0, 1, 2]); // all atoms are within 6 Å
    }

    #[test]
    fn cap_truncates_deterministically() {
        // More nearby atoms than the cap allows: exactly `cap` survive
        let n = 50;
        let structure = Structure {
            pos: (0..n)
                .map(|i| Vector3::new(i as f64 * 0.05, 0.0, 0.0))
                .collect(),
            charges: vec![0.0; n],
            epsilons: vec![0.1; n],
            vdw_radii: vec![1.7; n],
            serials: (0..n as u32).collect(),
        };
        let pocket = Pocket {
            spheres: vec![sphere(Vector3::zeros(), 1.0, Vec::new())],
            volume: 0.0,
            score: 0.0,
            correspondence: None,
        };
        let index = AtomCellGrid::new(&structure, 6.0);
        let config = EnergyGridConfig {
            atom_cap: 10,
            ..EnergyGridConfig::default()
        };
        let first = resolve_atoms(&Vector3::zeros(), &pocket, &structure, &index, &config);
        let second = resolve_atoms(&Vector3::zeros(), &pocket, &structure, &index, &config);
        assert_eq!(first.len(), 10);
        assert_eq!(first.atoms(), second.atoms());
    }

    #[test]
    fn sphere_annotation_matches_contact_sum() {
        let structure = tiny_structure();
        let sphere = sphere(Vector3::zeros(), 1.0, vec![0, 1]);
        // Oppositely charged atoms at equal distance cancel exactly
        let energy = sphere_electrostatic_energy(&sphere, &structure, 1.0);
        assert_relative_eq!(energy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn pocket_grid_pair_shares_geometry() {
        let structure = tiny_structure();
        let index = AtomCellGrid::new(&structure, 6.0);
        let mut pocket = Pocket {
            spheres: vec![sphere(Vector3::zeros(), 2.0, vec![0, 1, 2])],
            volume: 0.0,
            score: 0.0,
            correspondence: None,
        };
        let pair = pocket_energy_grid(&mut pocket, &structure, &index, &probe_config()).unwrap();
        assert_eq!(
            (pair.vdw.nx, pair.vdw.ny, pair.vdw.nz),
            (pair.elec.nx, pair.elec.ny, pair.elec.nz)
        );
        assert_relative_eq!(pair.vdw.origin.x, pair.elec.origin.x);
        // Both grids were visited on exactly the same cells
        assert_eq!(pair.vdw.n_visited(), pair.elec.n_visited());
        assert!(pair.vdw.n_visited() > 0);
        // The pass also annotated every sphere
        assert!(pocket
            .spheres
            .iter()
            .all(|s| s.electrostatic_energy.is_some()));
    }

    #[test]
    fn degenerate_pocket_yields_absent_grid() {
        let structure = tiny_structure();
        let index = AtomCellGrid::new(&structure, 6.0);
        let mut pockets = vec![Pocket {
            spheres: Vec::new(),
            volume: 0.0,
            score: 0.0,
            correspondence: None,
        }];
        let grids =
            compute_pocket_energy_grids(&mut pockets, &structure, &index, &probe_config()).unwrap();
        assert_eq!(grids.len(), 1);
        assert!(grids[0].is_none());
    }
}
