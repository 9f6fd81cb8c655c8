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

//! Multi-criterion ranking of the pocket collection.

use crate::pocket::Pocket;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparator strategy for ordering pockets, best first.
///
/// All variants sort descending; `Score` is the primary druggability
/// ranking while `Correspondence` ranks against a reference ligand-bound
/// site. Pockets without a correspondence metric sort last under the
/// correspondence-aware variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PocketOrdering {
    /// By number of alpha spheres
    AlphaSphereCount,
    /// By cavity volume
    Volume,
    /// By druggability score
    Score,
    /// By overlap with a reference pocket
    Correspondence,
    /// Correspondence first, volume as tie breaker
    VolumeThenCorrespondence,
}

impl PocketOrdering {
    /// Total order over two pockets; `Less` means `a` ranks ahead of `b`
    pub fn compare(&self, a: &Pocket, b: &Pocket) -> Ordering {
        let descending = |x: f64, y: f64| y.total_cmp(&x);
        // Missing correspondence ranks below any finite value
        let corresp = |p: &Pocket| p.correspondence.unwrap_or(f64::NEG_INFINITY);
        match self {
            Self::AlphaSphereCount => b.n_alpha_spheres().cmp(&a.n_alpha_spheres()),
            Self::Volume => descending(a.volume, b.volume),
            Self::Score => descending(a.score, b.score),
            Self::Correspondence => descending(corresp(a), corresp(b)),
            Self::VolumeThenCorrespondence => {
                descending(corresp(a), corresp(b)).then_with(|| descending(a.volume, b.volume))
            }
        }
    }
}

/// Sort the pocket collection in place under the selected comparator.
///
/// The sort is stable, so equal pockets keep their relative order across
/// runs; pocket contents are never touched.
pub fn sort_pockets(pockets: &mut [Pocket], ordering: PocketOrdering) {
    debug!("Sorting {} pockets by {ordering:?}", pockets.len());
    pockets.sort_by(|a, b| ordering.compare(a, b));
}
