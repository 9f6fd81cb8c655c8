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

//! Candidate binding pockets and their constituent alpha spheres.

use crate::Vector3;
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Alpha sphere: a sphere derived from local atomic geometry whose interior
/// approximates empty cavity space inside a candidate pocket.
///
/// Contact atoms are indices into the protein [`Structure`](crate::Structure)
/// arena. The electrostatic annotation is filled in by the energy pipeline
/// and is `None` until then.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlphaSphere {
    /// Sphere center (Å)
    pub center: Vector3,
    /// Sphere radius (Å)
    pub radius: f64,
    /// Atoms in contact with this sphere (indices into the structure)
    pub contact_atoms: Vec<u32>,
    /// Electrostatic energy at the sphere center, set by the energy pass
    #[serde(default)]
    pub electrostatic_energy: Option<f64>,
}

impl AlphaSphere {
    /// Sphere-inclusion occupancy test: true if `point` lies within the radius
    pub fn contains(&self, point: &Vector3) -> bool {
        (self.center - point).norm_squared() <= self.radius * self.radius
    }
}

/// One candidate ligand-binding cavity: a cluster of alpha spheres plus the
/// scalar descriptors the ranking comparators read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pocket {
    /// The alpha spheres making up the cavity
    pub spheres: Vec<AlphaSphere>,
    /// Estimated cavity volume (Å³)
    pub volume: f64,
    /// Druggability score
    pub score: f64,
    /// Overlap with a reference (ligand-derived) pocket, if one is known
    #[serde(default)]
    pub correspondence: Option<f64>,
}

impl Pocket {
    /// Number of alpha spheres in the pocket
    pub fn n_alpha_spheres(&self) -> usize {
        self.spheres.len()
    }

    /// Largest alpha-sphere radius, or zero for a degenerate empty pocket
    pub fn max_sphere_radius(&self) -> f64 {
        self.spheres.iter().map(|s| s.radius).fold(0.0, f64::max)
    }

    /// True if `point` lies inside at least one of the pocket's alpha spheres
    pub fn occupies(&self, point: &Vector3) -> bool {
        self.spheres.iter().any(|s| s.contains(point))
    }

    /// Ensure every contact-atom index refers into a structure of `n_atoms`
    /// atoms. Input pockets come from an external detector, so a stale or
    /// corrupt index must fail here rather than deep in the energy pass.
    pub fn validate(&self, n_atoms: usize) -> Result<()> {
        for (i, sphere) in self.spheres.iter().enumerate() {
            for &atom in &sphere.contact_atoms {
                ensure!(
                    (atom as usize) < n_atoms,
                    "alpha sphere {i}: contact atom {atom} out of range ({n_atoms} atoms)"
                );
            }
        }
        Ok(())
    }
}
