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

//! Protein structure and spatial lookup of its atoms.
//!
//! Atoms are stored as parallel vectors indexed by a stable atom index,
//! so that alpha spheres and per-grid-point atom sets can refer to atoms
//! by plain `u32` indices instead of shared references.

use crate::Vector3;
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Protein atom arena with force-field parameters already resolved.
///
/// Positions are in angstroms; charges in elementary units; the
/// Lennard-Jones well depth (kcal/mol) and minimum-energy radius (Å) come
/// from whatever parameterization produced the input and are opaque here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Structure {
    /// Atom positions (Å)
    pub pos: Vec<Vector3>,
    /// Partial charges (e)
    pub charges: Vec<f64>,
    /// Lennard-Jones well depths, ε (kcal/mol)
    pub epsilons: Vec<f64>,
    /// Lennard-Jones minimum-energy radii, rmin/2 (Å)
    pub vdw_radii: Vec<f64>,
    /// Stable atom serial numbers, e.g. from the source PDB
    pub serials: Vec<u32>,
}

impl Structure {
    /// Number of atoms
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    /// True if the structure holds no atoms
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Ensure all parallel vectors have matching lengths
    pub fn validate(&self) -> Result<()> {
        let n = self.pos.len();
        ensure!(
            self.charges.len() == n
                && self.epsilons.len() == n
                && self.vdw_radii.len() == n
                && self.serials.len() == n,
            "structure arrays have inconsistent lengths"
        );
        Ok(())
    }
}

/// Read-only cell list over all protein atoms.
///
/// Supports "atom indices within radius R of point P" queries by visiting
/// only the cells a sphere of radius R can touch. Built once per run and
/// shared by all workers; cells are `Vec<u32>` buckets in insertion order
/// so that query results are deterministic.
pub struct AtomCellGrid {
    cell_size: f64,
    cells: HashMap<(i32, i32, i32), Vec<u32>>,
}

impl AtomCellGrid {
    /// Build the index from all atom positions using the given cell edge length
    pub fn new(structure: &Structure, cell_size: f64) -> Self {
        let cell_size = cell_size.max(1.0e-6);
        let mut cells: HashMap<(i32, i32, i32), Vec<u32>> = HashMap::new();
        for (i, p) in structure.pos.iter().enumerate() {
            cells
                .entry(Self::key(p, cell_size))
                .or_default()
                .push(i as u32);
        }
        debug!(
            "Built atom cell grid: {} atoms in {} cells of {:.1} Å",
            structure.len(),
            cells.len(),
            cell_size
        );
        Self { cell_size, cells }
    }

    fn key(p: &Vector3, cell_size: f64) -> (i32, i32, i32) {
        (
            (p.x / cell_size).floor() as i32,
            (p.y / cell_size).floor() as i32,
            (p.z / cell_size).floor() as i32,
        )
    }

    /// Visit atoms within `radius` of `point` in a fixed, reproducible order.
    ///
    /// The callback receives the atom index and its squared distance to the
    /// query point. Cells are scanned in ascending (x, y, z) offset order.
    pub fn for_each_within<F>(&self, structure: &Structure, point: &Vector3, radius: f64, mut f: F)
    where
        F: FnMut(u32, f64),
    {
        let (cx, cy, cz) = Self::key(point, self.cell_size);
        let reach = (radius / self.cell_size).ceil() as i32;
        let radius_sq = radius * radius;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &i in bucket {
                        let dist_sq = (structure.pos[i as usize] - point).norm_squared();
                        if dist_sq <= radius_sq {
                            f(i, dist_sq);
                        }
                    }
                }
            }
        }
    }
}
