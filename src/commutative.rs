//! Detection of commutative argument sets: scope positions a factor is
//! invariant under permuting, and the histogram regrouping of its table that
//! the parfactor builder consumes for counting arguments.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::color_refinement::Coloring;
use crate::factor_graph::{FactorGraph, FactorId, Potential, Range, VarId};
use crate::RangeVal;

/// Range-aligned multiplicities: entry i counts how often range value i is
/// taken across the commutative arguments.
pub type Histogram = Vec<usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct CommutativeEntry {
    /// The commutative arguments, in scope order.
    pub args: Vec<VarId>,
    /// (histogram over the commutative arguments, remaining assignment in
    /// scope order) to potential value.
    pub histograms: IndexMap<(Histogram, Vec<RangeVal>), f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommutativeCache {
    entries: HashMap<FactorId, CommutativeEntry>,
}

impl CommutativeCache {
    pub fn entry(&self, factor: FactorId) -> Option<&CommutativeEntry> {
        self.entries.get(&factor)
    }
    pub fn insert(&mut self, factor: FactorId, entry: CommutativeEntry) {
        self.entries.insert(factor, entry);
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Analyzes every factor with an effective table.
pub fn analyze(fg: &FactorGraph) -> CommutativeCache {
    let mut cache = CommutativeCache::default();
    for fid in fg.range_factors() {
        if let Some(entry) = analyze_factor(fg, fid) {
            cache.insert(fid, entry);
        }
    }
    cache
}

/// Finds the largest set of same-range scope positions whose pairwise
/// transpositions leave the table unchanged (pairwise swaps generate the full
/// permutation group on the set), growing greedily from each start position
/// and keeping the first largest result. Returns `None` for unknown factors
/// and for factors without a commutative set of at least two arguments.
pub fn analyze_factor(fg: &FactorGraph, fid: FactorId) -> Option<CommutativeEntry> {
    let factor = fg.factor(fid);
    let table = factor.table()?;
    let scope: Vec<VarId> = factor.scope().collect();
    let mut by_range: IndexMap<&Range, Vec<usize>> = IndexMap::new();
    for (pos, vid) in scope.iter().enumerate() {
        by_range.entry(&fg.var(*vid).range).or_default().push(pos);
    }
    let mut best: Vec<usize> = Vec::new();
    for positions in by_range.values() {
        if positions.len() < 2 {
            continue;
        }
        for start in positions {
            let mut set = vec![*start];
            for q in positions {
                if *q != *start && set.iter().all(|p| swap_invariant(table, *p, *q)) {
                    set.push(*q);
                }
            }
            if set.len() > best.len() {
                best = set;
            }
        }
    }
    if best.len() < 2 {
        return None;
    }
    best.sort_unstable();

    let range_len = fg.var(scope[best[0]]).range.len();
    let mut histograms: IndexMap<(Histogram, Vec<RangeVal>), f64> = IndexMap::new();
    for assignment in table.assignments() {
        let mut hist = vec![0usize; range_len];
        for p in &best {
            hist[assignment[*p]] += 1;
        }
        let rest: Vec<RangeVal> = assignment
            .iter()
            .enumerate()
            .filter(|(p, _)| !best.contains(p))
            .map(|(_, v)| *v)
            .collect();
        let value = table.value(&assignment);
        if let Some(prev) = histograms.get(&(hist.clone(), rest.clone())) {
            // permutation invariance makes the regrouping consistent
            debug_assert_eq!(*prev, value);
        } else {
            histograms.insert((hist, rest), value);
        }
    }
    Some(CommutativeEntry {
        args: best.iter().map(|p| scope[*p]).collect(),
        histograms,
    })
}

fn swap_invariant(table: &Potential, p: usize, q: usize) -> bool {
    table.assignments().all(|a| {
        let mut b = a.clone();
        b.swap(p, q);
        table.value(&a) == table.value(&b)
    })
}

/// Coarsens `colors` so the members of each detected commutative argument
/// set share a color, the prerequisite for the builder to collapse them into
/// a counting argument. Only arguments with pairwise equal range and
/// evidence are merged; factors are visited in insertion order and the first
/// argument's color wins.
pub fn merge_commutative_colors(
    fg: &FactorGraph,
    cache: &CommutativeCache,
    mut colors: Coloring,
) -> Coloring {
    for fid in fg.range_factors() {
        let Some(entry) = cache.entry(fid) else {
            continue;
        };
        let first = fg.var(entry.args[0]);
        if entry.args.iter().any(|v| !fg.var(*v).compatible(first)) {
            continue;
        }
        let color = colors.var_colors[entry.args[0]];
        for v in &entry.args {
            colors.var_colors[*v] = color;
        }
    }
    colors
}
