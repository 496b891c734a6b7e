//! Parameterized factor graph: logical variables, parameterized random
//! variables and parfactors, all owned by the graph and addressed by index.

use indexmap::IndexMap;

use crate::factor_graph::Range;
use crate::{NamedList, RangeVal};

pub type LvId = usize;
pub type PrvId = usize;
pub type PfId = usize;
pub type PfgEdgeId = usize;

/// A named domain of individuals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogVar {
    pub domain: Vec<String>,
}

impl LogVar {
    pub fn size(&self) -> usize {
        self.domain.len()
    }
}

/// One component of a parfactor potential key: a plain range value, or a
/// range-aligned histogram at a counting position. Keys become strings only
/// at the emitter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PotAtom {
    Val(RangeVal),
    Hist(Vec<usize>),
}

pub type PotKey = Vec<PotAtom>;

#[derive(Debug, Clone)]
pub struct Prv {
    pub range: Range,
    pub logvars: Vec<LvId>,
    pub counted_over: Option<LvId>,
    /// Parfactors this PRV is counted in, as indices into the graph's
    /// parfactor table.
    pub counted_in: Vec<PfId>,
    pub(crate) edges: IndexMap<PfId, PfgEdgeId>,
}

// counted_in closes a reference cycle through the graph and is deliberately
// not part of equality.
impl PartialEq for Prv {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range
            && self.logvars == other.logvars
            && self.counted_over == other.counted_over
            && self.edges == other.edges
    }
}

impl Prv {
    pub fn is_propositional(&self) -> bool {
        self.logvars.is_empty()
    }
    /// Whether this PRV acts as a counting random variable within `pf`.
    pub fn is_counted_in(&self, pf: PfId) -> bool {
        self.counted_over.is_some() && self.counted_in.contains(&pf)
    }
    pub fn parfactors(&self) -> impl Iterator<Item = PfId> + '_ {
        self.edges.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parfactor {
    pub(crate) edges: IndexMap<PrvId, PfgEdgeId>,
    pub potentials: IndexMap<PotKey, f64>,
}

impl Parfactor {
    pub fn scope(&self) -> impl Iterator<Item = PrvId> + '_ {
        self.edges.keys().copied()
    }
    pub fn scope_len(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfgEdge {
    pub prv: PrvId,
    pub pf: PfId,
    pub pos_prv: usize,
    pub pos_pf: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParfactorGraph {
    pub(crate) logvars: NamedList<LogVar>,
    pub(crate) prvs: NamedList<Prv>,
    pub(crate) parfactors: NamedList<Parfactor>,
    pub(crate) edges: Vec<PfgEdge>,
}

impl ParfactorGraph {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_logvar(&mut self, name: &str, domain: Vec<String>) -> LvId {
        let id = self.logvars.len();
        self.logvars.insert(name.to_owned(), LogVar { domain });
        id
    }

    pub fn add_prv(&mut self, name: &str, range: Range, logvars: Vec<LvId>) -> PrvId {
        let id = self.prvs.len();
        self.prvs.insert(
            name.to_owned(),
            Prv {
                range,
                logvars,
                counted_over: None,
                counted_in: Vec::new(),
                edges: IndexMap::new(),
            },
        );
        id
    }

    pub fn add_parfactor(&mut self, name: &str) -> PfId {
        let id = self.parfactors.len();
        self.parfactors.insert(
            name.to_owned(),
            Parfactor {
                edges: IndexMap::new(),
                potentials: IndexMap::new(),
            },
        );
        id
    }

    /// Appends `prv` to the scope of `pf` unless already present, wiring the
    /// edge on both sides.
    pub fn attach(&mut self, pf: PfId, prv: PrvId) {
        if self.parfactors[pf].edges.contains_key(&prv) {
            return;
        }
        let edge_id = self.edges.len();
        let pos_pf = self.parfactors[pf].edges.len();
        self.parfactors[pf].edges.insert(prv, edge_id);
        let pos_prv = self.prvs[prv].edges.len();
        self.prvs[prv].edges.insert(pf, edge_id);
        self.edges.push(PfgEdge {
            prv,
            pf,
            pos_prv,
            pos_pf,
        });
    }

    /// Moves `first` to the front of the scope of `pf`, renumbering edge
    /// positions.
    pub(crate) fn reorder_scope_first(&mut self, pf: PfId, first: PrvId) {
        let parfactor = &mut self.parfactors[pf];
        let idx = parfactor.edges.get_index_of(&first).unwrap();
        parfactor.edges.move_index(idx, 0);
        for (pos, edge_id) in parfactor.edges.values().enumerate() {
            self.edges[*edge_id].pos_pf = pos;
        }
    }

    pub fn prv(&self, id: PrvId) -> &Prv {
        &self.prvs[id]
    }
    pub(crate) fn prv_mut(&mut self, id: PrvId) -> &mut Prv {
        &mut self.prvs[id]
    }
    pub fn parfactor(&self, id: PfId) -> &Parfactor {
        &self.parfactors[id]
    }
    pub(crate) fn parfactor_mut(&mut self, id: PfId) -> &mut Parfactor {
        &mut self.parfactors[id]
    }
    pub fn logvar(&self, id: LvId) -> &LogVar {
        &self.logvars[id]
    }
    pub fn prv_id(&self, name: &str) -> Option<PrvId> {
        self.prvs.get_index_of(name)
    }
    pub fn prv_name(&self, id: PrvId) -> &str {
        self.prvs.get_index(id).unwrap().0
    }
    pub fn parfactor_name(&self, id: PfId) -> &str {
        self.parfactors.get_index(id).unwrap().0
    }
    pub fn logvar_name(&self, id: LvId) -> &str {
        self.logvars.get_index(id).unwrap().0
    }
    pub fn n_logvars(&self) -> usize {
        self.logvars.len()
    }
    pub fn n_prvs(&self) -> usize {
        self.prvs.len()
    }
    pub fn n_parfactors(&self) -> usize {
        self.parfactors.len()
    }
}
