//! Lifting of unknown factors: provisional grouping with known factors whose
//! neighborhoods look the same, threshold-gated adoption of their potentials,
//! then a standard refinement pass over the augmented seed colors.

use std::collections::HashMap;

use itertools::Itertools;

use crate::color_refinement::{refine, Coloring};
use crate::factor_graph::{FactorGraph, FactorId};
use crate::LiftError;

/// Runs unknown-factor lifting with the standard color refinement of
/// [`crate::color_refinement::refine`] as the final pass.
///
/// `threshold` gates adoption: an unknown factor adopts a candidate group
/// only when the largest mutually compatible subset covers at least that
/// fraction of its candidates. Adopted potentials land in the factor's
/// imputed slot; declared potentials are never touched.
pub fn lift_unknown(
    fg: &mut FactorGraph,
    threshold: f64,
    seed: Option<Coloring>,
) -> Result<Coloring, LiftError> {
    lift_unknown_with(fg, threshold, seed, refine)
}

/// Same as [`lift_unknown`], with the refinement procedure injected.
pub fn lift_unknown_with<R>(
    fg: &mut FactorGraph,
    threshold: f64,
    seed: Option<Coloring>,
    refiner: R,
) -> Result<Coloring, LiftError>
where
    R: Fn(&FactorGraph, Option<Coloring>) -> Coloring,
{
    if !(0.0..=1.0).contains(&threshold) {
        return Err(LiftError::InvalidThreshold(threshold));
    }
    let mut colors = seed.unwrap_or_else(|| Coloring::seed(fg));
    let unknown = fg.unknown_factors();
    // every unknown factor starts in a group of its own, above all seed colors
    let mut next = (fg.n_vars() + fg.n_factors()).max(colors.max_color() + 1);
    for fid in &unknown {
        colors.factor_colors[*fid] = next;
        next += 1;
    }

    let mut cache = PairCache::default();
    let mut fused = vec![false; fg.n_factors()];
    for f1 in unknown {
        if fused[f1] {
            continue;
        }
        let mut candidates: Vec<FactorId> = Vec::new();
        for f2 in fg.range_factors() {
            if f2 == f1 || fused[f2] {
                continue;
            }
            if !cache.possibly_identical(fg, f1, f2) {
                continue;
            }
            if fg.factor(f2).is_unknown() {
                // unknown pairs fuse immediately; the first unknown in
                // insertion order donates its color
                colors.factor_colors[f2] = colors.factor_colors[f1];
                fused[f2] = true;
            } else {
                candidates.push(f2);
            }
        }
        if candidates.is_empty() {
            continue;
        }
        let subset = largest_compatible_subset(fg, &candidates, &mut cache);
        if subset.len() as f64 / candidates.len() as f64 >= threshold {
            for f2 in &subset {
                colors.factor_colors[*f2] = colors.factor_colors[f1];
            }
            let donor = fg.factor(subset[0]).table().cloned();
            fg.factor_mut(f1).imputed = donor;
        }
    }
    Ok(refiner(fg, Some(colors)))
}

/// Largest pairwise-compatible subset of `candidates`, approximated by the
/// largest per-candidate neighborhood in the possibly-identical relation
/// (first such neighborhood on ties), not by exact maximum clique. Known
/// candidates that are possibly identical carry equal tables, so every
/// returned subset still shares one table through its center.
fn largest_compatible_subset(
    fg: &FactorGraph,
    candidates: &[FactorId],
    cache: &mut PairCache,
) -> Vec<FactorId> {
    let mut best: Vec<FactorId> = Vec::new();
    for f in candidates.iter().copied() {
        let neighborhood: Vec<FactorId> = candidates
            .iter()
            .copied()
            .filter(|c| *c == f || cache.possibly_identical(fg, f, *c))
            .collect();
        if neighborhood.len() > best.len() {
            best = neighborhood;
        }
    }
    best
}

/// Memo table for the symmetric possibly-identical relation, keyed by
/// unordered factor pairs.
#[derive(Debug, Default)]
struct PairCache {
    map: HashMap<(FactorId, FactorId), bool>,
}

impl PairCache {
    fn possibly_identical(&mut self, fg: &FactorGraph, f1: FactorId, f2: FactorId) -> bool {
        let key = (f1.min(f2), f1.max(f2));
        if let Some(hit) = self.map.get(&key) {
            return *hit;
        }
        let result = possibly_identical(fg, f1, f2);
        self.map.insert(key, result);
        result
    }
}

/// Two distinct factors are possibly identical when at least one of them is
/// unknown (or their tables are equal) and their neighborhoods are symmetric.
fn possibly_identical(fg: &FactorGraph, f1: FactorId, f2: FactorId) -> bool {
    let (a, b) = (fg.factor(f1), fg.factor(f2));
    let tables_compatible = match (a.table(), b.table()) {
        (Some(ta), Some(tb)) => ta == tb,
        _ => true,
    };
    tables_compatible && symmetric_neighborhoods(fg, f1, f2)
}

/// Whether a bijection between the two scopes exists that matches range,
/// evidence and incident-factor count pointwise. Edge identity and argument
/// positions do not matter, only multiplicities, so comparing sorted key
/// multisets decides the existence of the bijection.
fn symmetric_neighborhoods(fg: &FactorGraph, f1: FactorId, f2: FactorId) -> bool {
    let (a, b) = (fg.factor(f1), fg.factor(f2));
    if a.scope_len() != b.scope_len() {
        return false;
    }
    let keys = |factor: &crate::factor_graph::Factor| {
        factor
            .scope()
            .map(|v| {
                let var = fg.var(v);
                (var.range.clone(), var.evidence, var.degree())
            })
            .sorted()
            .collect::<Vec<_>>()
    };
    keys(a) == keys(b)
}
