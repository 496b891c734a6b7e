//! Translation of a colored factor graph into a parfactor graph: color
//! groups become parameterized random variables and parfactors, collapsed
//! argument groups become counting arguments.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::color_refinement::Coloring;
use crate::commutative::CommutativeCache;
use crate::factor_graph::{FactorGraph, FactorId, VarId};
use crate::parfactor::{ParfactorGraph, PotAtom, PrvId};
use crate::LiftError;

/// Builds the parfactor graph for `colors` and the map from ground variable
/// names to their lifted representative (`R3` for propositional groups,
/// `R3(l3_2)` otherwise).
///
/// `cache` is only consulted when a factor group's scope collapses below the
/// ground arity, which needs a commutative argument set to aggregate over;
/// a missing entry then fails with `MissingCommutativityAnnotation`.
pub fn build_parfactor_graph(
    fg: &FactorGraph,
    colors: &Coloring,
    cache: Option<&CommutativeCache>,
) -> Result<(ParfactorGraph, IndexMap<String, String>), LiftError> {
    let mut rv_groups: IndexMap<usize, Vec<VarId>> = IndexMap::new();
    for vid in fg.range_vars() {
        rv_groups.entry(colors.var_colors[vid]).or_default().push(vid);
    }
    let mut factor_groups: IndexMap<usize, Vec<FactorId>> = IndexMap::new();
    for fid in fg.range_factors() {
        factor_groups
            .entry(colors.factor_colors[fid])
            .or_default()
            .push(fid);
    }

    // placeholder PRVs, one per variable group; groups of several variables
    // get a fresh logical variable sized to the group
    let mut pfg = ParfactorGraph::new();
    let mut prv_of_color: HashMap<usize, PrvId> = HashMap::new();
    for (gi, (color, members)) in rv_groups.iter().enumerate() {
        let range = fg.var(members[0]).range.clone();
        let logvars = if members.len() > 1 {
            let domain = (1..=members.len()).map(|k| format!("l{gi}_{k}")).collect();
            vec![pfg.add_logvar(&format!("L{gi}"), domain)]
        } else {
            Vec::new()
        };
        let prv = pfg.add_prv(&format!("R{gi}"), range, logvars);
        prv_of_color.insert(*color, prv);
    }

    // placeholder parfactors with their scopes
    for (gj, members) in factor_groups.values().enumerate() {
        let pf = pfg.add_parfactor(&format!("pf{gj}"));
        for fid in members {
            for vid in fg.factor_scope(*fid) {
                pfg.attach(pf, prv_of_color[&colors.var_colors[vid]]);
            }
        }
    }

    // equally sized groups whose members are pairwise linked through common
    // factors share one logical variable; the earlier group's wins
    let groups: Vec<(usize, &Vec<VarId>)> = rv_groups
        .iter()
        .map(|(color, members)| (*color, members))
        .collect();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            let (g1, g2) = (groups[i].1, groups[j].1);
            if g1.len() != g2.len() || g1.len() < 2 {
                continue;
            }
            if has_identical_logvar(fg, g1, g2) {
                let logvars = pfg.prv(prv_of_color[&groups[i].0]).logvars.clone();
                pfg.prv_mut(prv_of_color[&groups[j].0]).logvars = logvars;
            }
        }
    }

    // potentials: verbatim when no argument collapsed, histogram-keyed with a
    // counting argument otherwise
    for (pf, members) in factor_groups.values().enumerate() {
        let Some((rep, table)) = members
            .iter()
            .find_map(|f| fg.factor(*f).table().map(|t| (*f, t)))
        else {
            // a group of unfused unknown factors keeps an empty table
            continue;
        };
        let k_f = fg.factor(rep).scope_len();
        let k_pf = pfg.parfactor(pf).scope_len();
        if k_f == k_pf {
            let mut potentials = IndexMap::new();
            for assignment in table.assignments() {
                let key: Vec<PotAtom> = assignment.iter().map(|v| PotAtom::Val(*v)).collect();
                potentials.insert(key, table.value(&assignment));
            }
            pfg.parfactor_mut(pf).potentials = potentials;
        } else {
            let entry = cache.and_then(|c| c.entry(rep)).ok_or_else(|| {
                LiftError::MissingCommutativityAnnotation(fg.factor_name(rep).to_owned())
            })?;
            let prv = prv_of_color[&colors.var_colors[entry.args[0]]];
            if pfg.prv(prv).logvars.len() != 1 {
                return Err(LiftError::InvariantViolation(format!(
                    "counting variable {} must carry exactly one logical variable",
                    pfg.prv_name(prv)
                )));
            }
            let logvar = pfg.prv(prv).logvars[0];
            pfg.prv_mut(prv).counted_over = Some(logvar);
            pfg.prv_mut(prv).counted_in.push(pf);
            pfg.reorder_scope_first(pf, prv);
            let mut potentials = IndexMap::new();
            for ((hist, rest), value) in entry.histograms.iter() {
                let mut key = vec![PotAtom::Hist(hist.clone())];
                key.extend(rest.iter().map(|v| PotAtom::Val(*v)));
                potentials.insert(key, *value);
            }
            pfg.parfactor_mut(pf).potentials = potentials;
        }
    }

    // ground name -> lifted representative, consuming each group's domain in
    // variable insertion order
    let mut rv_to_individual: IndexMap<String, String> = IndexMap::new();
    let mut counters: HashMap<PrvId, usize> = HashMap::new();
    for vid in fg.range_vars() {
        let prv = prv_of_color[&colors.var_colors[vid]];
        let name = pfg.prv_name(prv);
        let lifted = if pfg.prv(prv).is_propositional() {
            name.to_owned()
        } else {
            let counter = counters.entry(prv).or_insert(1);
            let logvar = pfg.prv(prv).logvars[0];
            let individual = &pfg.logvar(logvar).domain[*counter - 1];
            let lifted = format!("{name}({individual})");
            *counter += 1;
            lifted
        };
        rv_to_individual.insert(fg.var_name(vid).to_owned(), lifted);
    }

    Ok((pfg, rv_to_individual))
}

/// Whether the two equally sized variable groups are linked by a consistent
/// bijection: every factor incident to both touches exactly one member of
/// each, those contacts pair up consistently, and the pairing covers the
/// whole groups. Factors touching a group more than once disqualify the
/// pair.
fn has_identical_logvar(fg: &FactorGraph, g1: &[VarId], g2: &[VarId]) -> bool {
    let mut pairing: HashMap<VarId, VarId> = HashMap::new();
    let mut reverse: HashMap<VarId, VarId> = HashMap::new();
    for fid in fg.range_factors() {
        let in1: Vec<VarId> = fg.factor_scope(fid).filter(|v| g1.contains(v)).collect();
        let in2: Vec<VarId> = fg.factor_scope(fid).filter(|v| g2.contains(v)).collect();
        if in1.is_empty() || in2.is_empty() {
            continue;
        }
        if in1.len() != 1 || in2.len() != 1 {
            return false;
        }
        let (a, b) = (in1[0], in2[0]);
        if *pairing.entry(a).or_insert(b) != b || *reverse.entry(b).or_insert(a) != a {
            return false;
        }
    }
    pairing.len() == g1.len()
}
