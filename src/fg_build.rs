//! Loading and saving of factor graph descriptions: the persisted form of a
//! graph together with its queries.

use indexmap::IndexMap;
use itertools::Itertools;
use thiserror::Error;

use crate::factor_graph::{FactorGraph, FgError, Potential, Range};
use crate::fg_parser::{self, Statement};
use crate::query::Query;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphBuildError {
    #[error("{0}")]
    Parse(String),
    #[error(transparent)]
    Graph(#[from] FgError),
    #[error("Range of variable {0} has repeated values.")]
    RepeatedRangeValue(String),
    #[error("Evidence value {value} is not in the range of variable {var}.")]
    EvidenceNotInRange { var: String, value: String },
    #[error("Table of factor {factor} has {got} values, its scope requires {expected}.")]
    TableSize {
        factor: String,
        got: usize,
        expected: usize,
    },
    #[error("Potential values of factor {0} must be non-negative finite numbers.")]
    InvalidValue(String),
    #[error("Query references undeclared variable {0}.")]
    UnknownQueryVar(String),
    #[error("Query evidence value {value} is not in the range of variable {var}.")]
    QueryEvidenceNotInRange { var: String, value: String },
}

/// Parses a description and builds the graph and its queries. Variables are
/// declared in a first pass so factors and queries may reference them in any
/// order.
pub fn load(description: &str) -> Result<(FactorGraph, Vec<Query>), GraphBuildError> {
    let stmts = fg_parser::parse(description).map_err(GraphBuildError::Parse)?;
    build(&stmts)
}

fn build(stmts: &[Statement]) -> Result<(FactorGraph, Vec<Query>), GraphBuildError> {
    let mut fg = FactorGraph::new();
    for s in stmts {
        if let Statement::VarDecl {
            name,
            range,
            evidence,
        } = s
        {
            if range.iter().duplicates().next().is_some() {
                return Err(GraphBuildError::RepeatedRangeValue(name.clone()));
            }
            let range = Range::new(range.iter().cloned());
            let evidence = match evidence {
                Some(label) => Some(range.index_of(label).ok_or_else(|| {
                    GraphBuildError::EvidenceNotInRange {
                        var: name.clone(),
                        value: label.clone(),
                    }
                })?),
                None => None,
            };
            fg.add_var(name, range, evidence)?;
        }
    }
    let mut queries = Vec::new();
    for s in stmts {
        match s {
            Statement::FactorDecl {
                name,
                scope,
                values,
            } => {
                let potentials = match values {
                    Some(values) => {
                        let shape: Vec<usize> = scope
                            .iter()
                            .map(|v| fg.var_id(v).map(|id| fg.var(id).range.len()))
                            .collect::<Result<_, _>>()?;
                        let expected: usize = shape.iter().product();
                        if values.len() != expected {
                            return Err(GraphBuildError::TableSize {
                                factor: name.clone(),
                                got: values.len(),
                                expected,
                            });
                        }
                        Some(
                            Potential::from_flat(&shape, values.clone())
                                .map_err(|_| GraphBuildError::InvalidValue(name.clone()))?,
                        )
                    }
                    None => None,
                };
                let scope: Vec<&str> = scope.iter().map(|s| s.as_str()).collect();
                fg.add_factor(name, &scope, potentials)?;
            }
            Statement::QueryDecl { target, evidence } => {
                fg.var_id(target)
                    .map_err(|_| GraphBuildError::UnknownQueryVar(target.clone()))?;
                let mut observed = IndexMap::new();
                for (var, value) in evidence {
                    let id = fg
                        .var_id(var)
                        .map_err(|_| GraphBuildError::UnknownQueryVar(var.clone()))?;
                    if fg.var(id).range.index_of(value).is_none() {
                        return Err(GraphBuildError::QueryEvidenceNotInRange {
                            var: var.clone(),
                            value: value.clone(),
                        });
                    }
                    observed.insert(var.clone(), value.clone());
                }
                queries.push(Query {
                    target: target.clone(),
                    evidence: observed,
                });
            }
            Statement::VarDecl { .. }
            | Statement::Empty
            | Statement::Invalid => {}
        }
    }
    Ok((fg, queries))
}

/// Writes the description form of a graph and its queries, the inverse of
/// [`load`]. Only declared potentials are persisted; imputed tables are a
/// derived artifact of lifting.
pub fn dump(fg: &FactorGraph, queries: &[Query]) -> String {
    let mut out = String::new();
    for (name, var) in fg.vars.iter() {
        out.push_str(&format!("VAR {name} [{}]", var.range.labels().join(", ")));
        if let Some(value) = var.evidence {
            out.push_str(&format!(" = {}", var.range.label(value)));
        }
        out.push('\n');
    }
    for (name, factor) in fg.factors.iter() {
        let scope = factor.scope().map(|v| fg.var_name(v)).join(", ");
        out.push_str(&format!("FACTOR {name} ({scope})"));
        if let Some(table) = factor.declared() {
            out.push_str(&format!(
                " [{}]",
                table.values().map(|v| v.to_string()).join(", ")
            ));
        }
        out.push('\n');
    }
    for query in queries {
        out.push_str(&format!("QUERY {}", query.target));
        if !query.evidence.is_empty() {
            out.push_str(&format!(
                " | {}",
                query
                    .evidence
                    .iter()
                    .map(|(var, value)| format!("{var} = {value}"))
                    .join(", ")
            ));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# a small pair model
VAR a [true, false]
VAR b [true, false] = true
FACTOR f (a, b) [0.9, 0.1, 0.1, 0.9]
FACTOR u (a, b)
QUERY a | b = true
QUERY b
";

    #[test]
    fn loads_sample() {
        let (fg, queries) = load(SAMPLE).unwrap();
        assert_eq!(fg.n_vars(), 2);
        assert_eq!(fg.n_factors(), 2);
        assert_eq!(fg.var(fg.var_id("b").unwrap()).evidence, Some(0));
        assert_eq!(fg.unknown_factors().len(), 1);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].target, "a");
        assert_eq!(queries[0].evidence["b"], "true");
        assert!(queries[1].evidence.is_empty());
    }

    #[test]
    fn roundtrips_through_dump() {
        let (fg, queries) = load(SAMPLE).unwrap();
        let (fg2, queries2) = load(&dump(&fg, &queries)).unwrap();
        assert_eq!(fg, fg2);
        assert_eq!(queries, queries2);
    }

    #[test]
    fn rejects_wrong_table_size() {
        let err = load("VAR a [true, false]\nFACTOR f (a) [0.5]").unwrap_err();
        assert_eq!(
            err,
            GraphBuildError::TableSize {
                factor: "f".into(),
                got: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn rejects_undeclared_scope_var() {
        assert!(matches!(
            load("VAR a [true, false]\nFACTOR f (a, ghost)"),
            Err(GraphBuildError::Graph(FgError::NoVar(_)))
        ));
    }

    #[test]
    fn rejects_bad_evidence() {
        assert!(matches!(
            load("VAR a [true, false] = maybe"),
            Err(GraphBuildError::EvidenceNotInRange { .. })
        ));
        assert!(matches!(
            load("VAR a [true, false]\nQUERY a | a = maybe"),
            Err(GraphBuildError::QueryEvidenceNotInRange { .. })
        ));
    }
}
