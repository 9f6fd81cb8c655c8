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

//! Discretized energy fields for candidate protein binding pockets.
//!
//! For each pocket - a cluster of alpha spheres carved out of a protein
//! surface - the cavity is rasterized into a regular 3D grid and per-cell
//! van der Waals and electrostatic contributions are accumulated from
//! nearby protein atoms. A second, independent subsystem ranks the pocket
//! collection under interchangeable comparator strategies.

pub mod energy;
pub mod grid;
pub mod pocket;
pub mod ranking;
pub mod structure;
pub use energy::{compute_pocket_energy_grids, EnergyGridConfig};
pub use grid::{BoundingBox, Grid, PocketEnergyGrid};
pub use pocket::{AlphaSphere, Pocket};
pub use ranking::{sort_pockets, PocketOrdering};
pub use structure::{AtomCellGrid, Structure};
extern crate pretty_env_logger;
#[macro_use]
extern crate log;

pub type Vector3 = nalgebra::Vector3<f64>;
