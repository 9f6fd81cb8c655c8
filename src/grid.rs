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

//! Regular 3D scalar grids over a pocket's spatial envelope.

use crate::{pocket::Pocket, Vector3};
use anyhow::{bail, ensure, Result};
use get_size::GetSize;
use itertools::Itertools;
use std::io::Write;

/// Value written for cells outside the cavity, and initial value everywhere
pub const EMPTY_GRID_VALUE: f64 = 0.0;

/// Upper bound on cells per grid; a padded pocket box exceeding this is
/// treated as pathological rather than silently allocating gigabytes
const MAX_GRID_CELLS: usize = 100_000_000;

/// Minimal axis-aligned box enclosing a pocket's alpha-sphere centers.
///
/// Derived value, recomputed when a pocket's grid is initialized; an empty
/// sphere set yields the inverted sentinel box.
#[derive(Clone, Copy, Debug)]
pub struct BoundingBox {
    pub min: Vector3,
    pub max: Vector3,
}

impl BoundingBox {
    /// Box over all alpha-sphere centers exactly, with no padding
    pub fn from_pocket(pocket: &Pocket) -> Self {
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for sphere in &pocket.spheres {
            min = min.inf(&sphere.center);
            max = max.sup(&sphere.center);
        }
        Self { min, max }
    }

    /// True for the sentinel box produced by a pocket with no alpha spheres
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Grow the box by `pad` on every side
    pub fn padded(&self, pad: f64) -> Self {
        Self {
            min: self.min.map(|x| x - pad),
            max: self.max.map(|x| x + pad),
        }
    }
}

/// Dense 3D scalar field at fixed resolution.
///
/// `origin` is the world-space minimum corner of cell (0, 0, 0); the center
/// of cell (i, j, k) is `origin + (i+0.5, j+0.5, k+0.5) * resolution`.
/// Each cell carries a visit count so that cells never touched by the
/// energy pass stay distinguishable from cells that accumulated a zero sum.
#[derive(Clone, Debug, GetSize)]
pub struct Grid {
    values: Vec<f64>,
    visits: Vec<u32>,
    /// World coordinates of the minimum grid corner (Å)
    #[get_size(size = 24)]
    pub origin: Vector3,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Edge length of one cubic cell (Å)
    pub resolution: f64,
    normalized: bool,
}

impl Grid {
    /// Allocate a zeroed grid sized to a pocket's padded bounding box.
    ///
    /// The center box is padded by `margin` plus the pocket's largest
    /// alpha-sphere radius, so the grid covers the full cavity extent and
    /// the field decay just outside it. Fails for a pocket without alpha
    /// spheres, or when the padded box would exceed the cell bound.
    pub fn for_pocket(pocket: &Pocket, resolution: f64, margin: f64) -> Result<Self> {
        let bbox = BoundingBox::from_pocket(pocket);
        ensure!(!bbox.is_empty(), "cannot grid a pocket with no alpha spheres");
        let bbox = bbox.padded(margin + pocket.max_sphere_radius());
        let span = bbox.max - bbox.min;
        let extent = |side: f64| ((side / resolution).ceil() as usize).max(1);
        let (nx, ny, nz) = (extent(span.x), extent(span.y), extent(span.z));
        let n_cells = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .filter(|&n| n <= MAX_GRID_CELLS);
        let Some(n_cells) = n_cells else {
            bail!("pathological pocket bounding box: {nx}x{ny}x{nz} grid cells");
        };
        Ok(Self {
            values: vec![EMPTY_GRID_VALUE; n_cells],
            visits: vec![0; n_cells],
            origin: bbox.min,
            nx,
            ny,
            nz,
            resolution,
            normalized: false,
        })
    }

    fn index(&self, i: usize, j: usize, k: usize) -> Option<usize> {
        (i < self.nx && j < self.ny && k < self.nz).then(|| (i * self.ny + j) * self.nz + k)
    }

    /// World-space center of cell (i, j, k)
    pub fn cell_center(&self, i: usize, j: usize, k: usize) -> Vector3 {
        self.origin
            + Vector3::new(i as f64 + 0.5, j as f64 + 0.5, k as f64 + 0.5) * self.resolution
    }

    /// Cell value, or `None` if the index is out of bounds
    pub fn value(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        self.index(i, j, k).map(|n| self.values[n])
    }

    /// Number of energy contributions recorded for a cell
    pub fn visit_count(&self, i: usize, j: usize, k: usize) -> Option<u32> {
        self.index(i, j, k).map(|n| self.visits[n])
    }

    /// Add one energy contribution to a cell, bumping its visit count
    pub fn deposit(&mut self, i: usize, j: usize, k: usize, energy: f64) {
        if let Some(n) = self.index(i, j, k) {
            self.values[n] += energy;
            self.visits[n] += 1;
        }
    }

    /// Number of cells that received at least one contribution
    pub fn n_visited(&self) -> usize {
        self.visits.iter().filter(|&&c| c > 0).count()
    }

    /// Divide every visited cell by `divisor`, turning accumulated sums into
    /// mean energies. Unvisited cells are untouched. May be applied at most
    /// once per grid; a second call, or a zero divisor, is an error.
    pub fn normalize_mean(&mut self, divisor: u32) -> Result<()> {
        ensure!(!self.normalized, "grid already normalized");
        ensure!(divisor > 0, "mean-energy divisor must be positive");
        for (value, &visits) in self.values.iter_mut().zip(self.visits.iter()) {
            if visits > 0 {
                *value /= f64::from(divisor);
            }
        }
        self.normalized = true;
        Ok(())
    }

    /// Serialize the geometry header followed by the dense value array.
    ///
    /// Layout: extents, origin, resolution, then one line of `nz` values
    /// per (i, j) column with i as the slowest index. Cells outside the
    /// cavity carry [`EMPTY_GRID_VALUE`]. The grid is written as one unit;
    /// any stream error aborts the write and is returned to the caller.
    pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
        writeln!(stream, "{} {} {}", self.nx, self.ny, self.nz)?;
        writeln!(
            stream,
            "{:.4} {:.4} {:.4}",
            self.origin.x, self.origin.y, self.origin.z
        )?;
        writeln!(stream, "{:.4}", self.resolution)?;
        for i in 0..self.nx {
            for j in 0..self.ny {
                let row = (i * self.ny + j) * self.nz;
                let line = self.values[row..row + self.nz]
                    .iter()
                    .map(|v| format!("{v:.6}"))
                    .join(" ");
                writeln!(stream, "{line}")?;
            }
        }
        Ok(())
    }
}

/// The two geometry-sharing grids computed for one pocket
#[derive(Clone, Debug, GetSize)]
pub struct PocketEnergyGrid {
    /// Van der Waals energy field
    pub vdw: Grid,
    /// Electrostatic energy field
    pub elec: Grid,
}
