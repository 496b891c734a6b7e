//! Propositional factor graph: random variables with finite ordered ranges
//! and optional evidence, factors with dense potential tables, bipartite
//! edges between the two.

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::ArrayD;
use thiserror::Error;

use crate::{LiftError, NamedList, RangeVal};

pub type VarId = usize;
pub type FactorId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FgError {
    #[error("No variable named {0}.")]
    NoVar(String),
    #[error("No factor named {0}.")]
    NoFactor(String),
    #[error("A variable named {0} already exists.")]
    DuplicateVar(String),
    #[error("A factor named {0} already exists.")]
    DuplicateFactor(String),
    #[error("Factor {0} has an empty scope.")]
    EmptyScope(String),
    #[error("Variable {0} is repeated in a factor scope.")]
    RepeatedScopeVar(String),
    #[error("Evidence index {value} is outside the range of variable {var}.")]
    EvidenceOutOfRange { var: String, value: RangeVal },
    #[error("Table of factor {factor} has shape {got:?}, its scope requires {expected:?}.")]
    TableShape {
        factor: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("Variable {0} is still in the scope of a factor.")]
    VarInUse(String),
}

/// An ordered, finite domain of value labels.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Range(Vec<String>);

impl Range {
    pub fn new(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(labels.into_iter().map(|l| l.into()).collect())
    }
    pub fn boolean() -> Self {
        Self::new(["true", "false"])
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn labels(&self) -> &[String] {
        &self.0
    }
    pub fn label(&self, value: RangeVal) -> &str {
        &self.0[value]
    }
    pub fn index_of(&self, label: &str) -> Option<RangeVal> {
        self.0.iter().position(|l| l == label)
    }
    pub fn is_boolean(&self) -> bool {
        self.0.len() == 2 && self.0[0] == "true" && self.0[1] == "false"
    }
}

/// Dense potential table over a factor scope. Holds exactly one value per
/// point of the Cartesian product of the scope's ranges, in row-major order
/// (last argument fastest).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Potential(ArrayD<f64>);

impl Potential {
    pub fn from_flat(shape: &[usize], values: Vec<f64>) -> Result<Self, LiftError> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(LiftError::InvariantViolation(format!(
                "potential table has {} values, the scope product requires {expected}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(LiftError::InvalidArgument(
                "potential values must be non-negative finite numbers".to_owned(),
            ));
        }
        let values = ArrayD::from_shape_vec(ndarray::IxDyn(shape), values)
            .map_err(|e| LiftError::InvalidArgument(e.to_string()))?;
        Ok(Self(values))
    }
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }
    pub fn value(&self, assignment: &[RangeVal]) -> f64 {
        self.0[ndarray::IxDyn(assignment)]
    }
    /// Values in row-major order, matching [`Potential::assignments`].
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }
    /// All assignment tuples over the scope, row-major.
    pub fn assignments(&self) -> impl Iterator<Item = Vec<RangeVal>> + '_ {
        self.0.shape().iter().map(|n| 0..*n).multi_cartesian_product()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Var {
    pub range: Range,
    pub evidence: Option<RangeVal>,
    pub(crate) edges: IndexMap<FactorId, EdgeId>,
}

impl Var {
    /// Two variables are compatible when ranges and evidence coincide.
    pub fn compatible(&self, other: &Var) -> bool {
        self.range == other.range && self.evidence == other.evidence
    }
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
    pub fn factors(&self) -> impl Iterator<Item = FactorId> + '_ {
        self.edges.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Factor {
    pub(crate) edges: IndexMap<VarId, EdgeId>,
    pub(crate) potentials: Option<Potential>,
    pub(crate) imputed: Option<Potential>,
}

impl Factor {
    /// Scope in native argument order.
    pub fn scope(&self) -> impl Iterator<Item = VarId> + '_ {
        self.edges.keys().copied()
    }
    pub fn scope_len(&self) -> usize {
        self.edges.len()
    }
    pub fn declared(&self) -> Option<&Potential> {
        self.potentials.as_ref()
    }
    pub fn imputed(&self) -> Option<&Potential> {
        self.imputed.as_ref()
    }
    /// Effective table: the imputed one when present, the declared one
    /// otherwise. Declared tables are never overwritten.
    pub fn table(&self) -> Option<&Potential> {
        self.imputed.as_ref().or(self.potentials.as_ref())
    }
    pub fn is_unknown(&self) -> bool {
        self.table().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Edge {
    pub var: VarId,
    pub pos_var: usize,
    pub factor: FactorId,
    pub pos_factor: usize,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FactorGraph {
    pub(crate) vars: NamedList<Var>,
    pub(crate) factors: NamedList<Factor>,
    pub(crate) edges: Vec<Edge>,
}

impl FactorGraph {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_var(
        &mut self,
        name: &str,
        range: Range,
        evidence: Option<RangeVal>,
    ) -> Result<VarId, FgError> {
        if self.vars.contains_key(name) {
            return Err(FgError::DuplicateVar(name.to_owned()));
        }
        if let Some(value) = evidence {
            if value >= range.len() {
                return Err(FgError::EvidenceOutOfRange {
                    var: name.to_owned(),
                    value,
                });
            }
        }
        let id = self.vars.len();
        self.vars.insert(
            name.to_owned(),
            Var {
                range,
                evidence,
                edges: IndexMap::new(),
            },
        );
        Ok(id)
    }

    pub fn add_factor(
        &mut self,
        name: &str,
        scope: &[&str],
        potentials: Option<Potential>,
    ) -> Result<FactorId, FgError> {
        if self.factors.contains_key(name) {
            return Err(FgError::DuplicateFactor(name.to_owned()));
        }
        if scope.is_empty() {
            return Err(FgError::EmptyScope(name.to_owned()));
        }
        let mut scope_ids = Vec::with_capacity(scope.len());
        for var_name in scope {
            let id = self
                .vars
                .get_index_of(*var_name)
                .ok_or_else(|| FgError::NoVar((*var_name).to_owned()))?;
            if scope_ids.contains(&id) {
                return Err(FgError::RepeatedScopeVar((*var_name).to_owned()));
            }
            scope_ids.push(id);
        }
        if let Some(table) = &potentials {
            let shape: Vec<usize> = scope_ids.iter().map(|v| self.vars[*v].range.len()).collect();
            if table.shape() != shape.as_slice() {
                return Err(FgError::TableShape {
                    factor: name.to_owned(),
                    got: table.shape().to_vec(),
                    expected: shape,
                });
            }
        }
        let factor_id = self.factors.len();
        let mut edges = IndexMap::new();
        for (pos, var_id) in scope_ids.iter().enumerate() {
            let edge_id = self.edges.len();
            edges.insert(*var_id, edge_id);
            let var = &mut self.vars[*var_id];
            var.edges.insert(factor_id, edge_id);
            self.edges.push(Edge {
                var: *var_id,
                pos_var: var.edges.len() - 1,
                factor: factor_id,
                pos_factor: pos,
            });
        }
        self.factors.insert(
            name.to_owned(),
            Factor {
                edges,
                potentials,
                imputed: None,
            },
        );
        Ok(factor_id)
    }

    /// Removes a factor and renumbers the edge table.
    pub fn remove_factor(&mut self, name: &str) -> Result<(), FgError> {
        let id = self
            .factors
            .get_index_of(name)
            .ok_or_else(|| FgError::NoFactor(name.to_owned()))?;
        self.factors.shift_remove_index(id);
        self.rewire();
        Ok(())
    }

    /// Removes a variable. Only disconnected variables can be removed,
    /// otherwise factor scopes would dangle.
    pub fn remove_var(&mut self, name: &str) -> Result<(), FgError> {
        let id = self
            .vars
            .get_index_of(name)
            .ok_or_else(|| FgError::NoVar(name.to_owned()))?;
        if !self.vars[id].edges.is_empty() {
            return Err(FgError::VarInUse(name.to_owned()));
        }
        self.vars.shift_remove_index(id);
        for factor in self.factors.values_mut() {
            factor.edges = factor
                .edges
                .iter()
                .map(|(v, e)| (if *v > id { *v - 1 } else { *v }, *e))
                .collect();
        }
        self.rewire();
        Ok(())
    }

    // Rebuild the edge table and both adjacency maps from the factor scopes.
    fn rewire(&mut self) {
        self.edges.clear();
        for var in self.vars.values_mut() {
            var.edges.clear();
        }
        for fid in 0..self.factors.len() {
            let scope: Vec<VarId> = self.factors[fid].edges.keys().copied().collect();
            let mut edges = IndexMap::new();
            for (pos, var_id) in scope.iter().enumerate() {
                let edge_id = self.edges.len();
                edges.insert(*var_id, edge_id);
                let var = &mut self.vars[*var_id];
                var.edges.insert(fid, edge_id);
                self.edges.push(Edge {
                    var: *var_id,
                    pos_var: var.edges.len() - 1,
                    factor: fid,
                    pos_factor: pos,
                });
            }
            self.factors[fid].edges = edges;
        }
    }

    pub fn contains_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
    pub fn contains_factor(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }
    pub fn var_id(&self, name: &str) -> Result<VarId, FgError> {
        self.vars
            .get_index_of(name)
            .ok_or_else(|| FgError::NoVar(name.to_owned()))
    }
    pub fn factor_id(&self, name: &str) -> Result<FactorId, FgError> {
        self.factors
            .get_index_of(name)
            .ok_or_else(|| FgError::NoFactor(name.to_owned()))
    }
    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id]
    }
    pub fn factor(&self, id: FactorId) -> &Factor {
        &self.factors[id]
    }
    pub(crate) fn factor_mut(&mut self, id: FactorId) -> &mut Factor {
        &mut self.factors[id]
    }
    pub fn var_name(&self, id: VarId) -> &str {
        self.vars.get_index(id).unwrap().0
    }
    pub fn factor_name(&self, id: FactorId) -> &str {
        self.factors.get_index(id).unwrap().0
    }
    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }
    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }
    pub fn range_vars(&self) -> std::ops::Range<VarId> {
        0..self.vars.len()
    }
    pub fn range_factors(&self) -> std::ops::Range<FactorId> {
        0..self.factors.len()
    }
    pub fn var_factors(&self, id: VarId) -> impl Iterator<Item = FactorId> + '_ {
        self.vars[id].edges.keys().copied()
    }
    pub fn factor_scope(&self, id: FactorId) -> impl Iterator<Item = VarId> + '_ {
        self.factors[id].edges.keys().copied()
    }

    /// Factors with no effective potential table.
    pub fn unknown_factors(&self) -> Vec<FactorId> {
        self.factors.values().positions(|f| f.is_unknown()).collect()
    }

    /// Variables reachable from `start` by BFS over the bipartite graph, in
    /// visit order.
    pub fn reachable(&self, start: VarId) -> Vec<VarId> {
        let mut seen = vec![false; self.vars.len()];
        let mut queue = std::collections::VecDeque::from([start]);
        let mut order = Vec::new();
        seen[start] = true;
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for fid in self.vars[v].edges.keys() {
                for w in self.factors[*fid].edges.keys() {
                    if !seen[*w] {
                        seen[*w] = true;
                        queue.push_back(*w);
                    }
                }
            }
        }
        order
    }

    pub fn is_connected(&self) -> bool {
        self.vars.is_empty() || self.reachable(0).len() == self.vars.len()
    }

    /// Re-checks the structural invariants: edge bookkeeping consistent on
    /// both sides, table shapes matching scopes, evidence within range.
    pub fn check_valid(&self) -> Result<(), LiftError> {
        for (fid, (name, factor)) in self.factors.iter().enumerate() {
            for (pos, (var_id, edge_id)) in factor.edges.iter().enumerate() {
                let edge = self.edges.get(*edge_id).ok_or_else(|| {
                    LiftError::InvariantViolation(format!("factor {name} references a missing edge"))
                })?;
                if edge.factor != fid || edge.var != *var_id || edge.pos_factor != pos {
                    return Err(LiftError::InvariantViolation(format!(
                        "edge bookkeeping of factor {name} is inconsistent"
                    )));
                }
                if self.vars[*var_id].edges.get(&fid) != Some(edge_id) {
                    return Err(LiftError::InvariantViolation(format!(
                        "variable {} does not record its edge to factor {name}",
                        self.var_name(*var_id)
                    )));
                }
            }
            if let Some(table) = factor.table() {
                let shape: Vec<usize> = factor
                    .scope()
                    .map(|v| self.vars[v].range.len())
                    .collect();
                if table.shape() != shape.as_slice() {
                    return Err(LiftError::InvariantViolation(format!(
                        "table of factor {name} does not match its scope"
                    )));
                }
            }
        }
        for (name, var) in self.vars.iter() {
            if let Some(value) = var.evidence {
                if value >= var.range.len() {
                    return Err(LiftError::InvariantViolation(format!(
                        "evidence of variable {name} is outside its range"
                    )));
                }
            }
        }
        Ok(())
    }
}
