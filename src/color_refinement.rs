//! Color passing over the bipartite factor graph: nodes are grouped by
//! iterated neighborhood signatures until a fixed point is reached.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::factor_graph::{FactorGraph, FactorId, Potential, Range, VarId};
use crate::RangeVal;

/// Color assignments for all variables and factors of one graph, indexed by
/// id. The two color spaces are disjoint: variable seed colors start at 0,
/// factor seed colors at the number of variables, and refinement draws fresh
/// colors for both kinds from one shared counter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Coloring {
    pub var_colors: Vec<usize>,
    pub factor_colors: Vec<usize>,
}

impl Coloring {
    /// Initial coloring: variables grouped by (range, evidence), factors by
    /// effective potential table (unknown factors all share the empty-table
    /// group). Colors are assigned in encounter order.
    pub fn seed(fg: &FactorGraph) -> Self {
        let mut keys: IndexMap<(&Range, Option<RangeVal>), usize> = IndexMap::new();
        let mut var_colors = Vec::with_capacity(fg.n_vars());
        for var in fg.vars.values() {
            let next = keys.len();
            var_colors.push(*keys.entry((&var.range, var.evidence)).or_insert(next));
        }
        let base = fg.n_vars();
        let mut seen: Vec<(Option<&Potential>, usize)> = Vec::new();
        let mut factor_colors = Vec::with_capacity(fg.n_factors());
        for factor in fg.factors.values() {
            let table = factor.table();
            let color = match seen.iter().find(|(k, _)| *k == table) {
                Some((_, c)) => *c,
                None => {
                    let c = base + seen.len();
                    seen.push((table, c));
                    c
                }
            };
            factor_colors.push(color);
        }
        Self {
            var_colors,
            factor_colors,
        }
    }

    pub fn n_var_colors(&self) -> usize {
        count_distinct(&self.var_colors)
    }
    pub fn n_factor_colors(&self) -> usize {
        count_distinct(&self.factor_colors)
    }
    pub fn max_color(&self) -> usize {
        self.var_colors
            .iter()
            .chain(self.factor_colors.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Color groups in first-encounter order.
    pub fn var_partition(&self) -> IndexMap<usize, Vec<VarId>> {
        partition(&self.var_colors)
    }
    pub fn factor_partition(&self) -> IndexMap<usize, Vec<FactorId>> {
        partition(&self.factor_colors)
    }

    /// Color labels normalized to first-encounter order. Two colorings induce
    /// the same partition iff their canonical forms are equal, whatever the
    /// integer labels were.
    pub fn canonical(&self) -> (Vec<usize>, Vec<usize>) {
        (canon(&self.var_colors), canon(&self.factor_colors))
    }
}

fn partition(colors: &[usize]) -> IndexMap<usize, Vec<usize>> {
    let mut groups: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for (id, color) in colors.iter().enumerate() {
        groups.entry(*color).or_default().push(id);
    }
    groups
}

fn canon(colors: &[usize]) -> Vec<usize> {
    let mut map: IndexMap<usize, usize> = IndexMap::new();
    colors
        .iter()
        .map(|c| {
            let next = map.len();
            *map.entry(*c).or_insert(next)
        })
        .collect()
}

fn count_distinct(colors: &[usize]) -> usize {
    colors.iter().unique().count()
}

/// Refines `seed` (or the default initial coloring) to the coarsest stable
/// partition under neighborhood signatures.
///
/// A factor's signature is the sequence of its scope's variable colors in
/// native argument order, closed by its own color; argument positions are
/// significant. A variable's signature is the ascending-sorted sequence of
/// (factor color, position within that factor) over its incident factors,
/// closed by the sentinel (own color, 0). Equal signatures map to equal fresh
/// colors, so classes only ever split; the pass count is bounded by the node
/// count. Traversal is in insertion order throughout, which keeps the integer
/// labels reproducible.
pub fn refine(fg: &FactorGraph, seed: Option<Coloring>) -> Coloring {
    let mut colors = seed.unwrap_or_else(|| Coloring::seed(fg));
    debug_assert_eq!(colors.var_colors.len(), fg.n_vars());
    debug_assert_eq!(colors.factor_colors.len(), fg.n_factors());
    let mut next = colors.max_color() + 1;
    loop {
        let mut changed = false;

        let before = count_distinct(&colors.factor_colors);
        let mut sig_map: IndexMap<Vec<usize>, usize> = IndexMap::new();
        let mut new_colors = Vec::with_capacity(fg.n_factors());
        for (fid, factor) in fg.factors.values().enumerate() {
            let mut sig: Vec<usize> = factor.scope().map(|v| colors.var_colors[v]).collect();
            sig.push(colors.factor_colors[fid]);
            let color = *sig_map.entry(sig).or_insert_with(|| {
                let c = next;
                next += 1;
                c
            });
            new_colors.push(color);
        }
        colors.factor_colors = new_colors;
        changed |= count_distinct(&colors.factor_colors) != before;

        let before = count_distinct(&colors.var_colors);
        let mut sig_map: IndexMap<Vec<(usize, usize)>, usize> = IndexMap::new();
        let mut new_colors = Vec::with_capacity(fg.n_vars());
        for (vid, var) in fg.vars.values().enumerate() {
            let mut sig: Vec<(usize, usize)> = var
                .edges
                .iter()
                .map(|(fid, eid)| (colors.factor_colors[*fid], fg.edges[*eid].pos_factor))
                .collect();
            sig.sort_unstable();
            sig.push((colors.var_colors[vid], 0));
            let color = *sig_map.entry(sig).or_insert_with(|| {
                let c = next;
                next += 1;
                c
            });
            new_colors.push(color);
        }
        colors.var_colors = new_colors;
        changed |= count_distinct(&colors.var_colors) != before;

        if !changed {
            break;
        }
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor_graph::Range;

    #[test]
    fn seed_spaces_disjoint() {
        let mut fg = FactorGraph::new();
        fg.add_var("a", Range::boolean(), None).unwrap();
        fg.add_var("b", Range::boolean(), Some(1)).unwrap();
        let t = Potential::from_flat(&[2], vec![0.5, 0.5]).unwrap();
        fg.add_factor("f", &["a"], Some(t.clone())).unwrap();
        fg.add_factor("g", &["b"], Some(t)).unwrap();
        fg.add_factor("u", &["a"], None).unwrap();
        let colors = Coloring::seed(&fg);
        // evidence splits the variables, equal tables share, unknown apart
        assert_eq!(colors.var_colors, vec![0, 1]);
        assert_eq!(colors.factor_colors, vec![2, 2, 3]);
    }
}
