//! Divergence between marginal tables, used to score how closely a lifted
//! model reproduces ground marginals.

use indexmap::IndexMap;

use crate::LiftError;

/// A marginal as an ordered assignment-label to probability table.
pub type Marginal = IndexMap<String, f64>;

/// Kullback-Leibler divergence sum(p ln(p/q)) over two marginals with the
/// same support in the same order. Terms with `p = 0` contribute nothing; a
/// positive `p` against `q = 0` makes the divergence infinite.
pub fn kl_divergence(p: &Marginal, q: &Marginal) -> Result<f64, LiftError> {
    validate(p)?;
    validate(q)?;
    if !p.keys().eq(q.keys()) {
        return Err(LiftError::InvalidArgument(
            "marginals must share one support in one order".to_owned(),
        ));
    }
    let mut sum = 0.0;
    for (pv, qv) in p.values().zip(q.values()) {
        if *pv == 0.0 {
            continue;
        }
        if *qv == 0.0 {
            return Ok(f64::INFINITY);
        }
        sum += pv * (pv / qv).ln();
    }
    Ok(sum)
}

/// Symmetrised divergence mapped to (0, 1]: identical marginals score 1,
/// disjoint ones 0.
pub fn score(p: &Marginal, q: &Marginal) -> Result<f64, LiftError> {
    let divergence = kl_divergence(p, q)? + kl_divergence(q, p)?;
    Ok(1.0 / (1.0 + divergence))
}

fn validate(marginal: &Marginal) -> Result<(), LiftError> {
    if marginal.values().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(LiftError::InvalidArgument(
            "marginal probabilities must be non-negative finite numbers".to_owned(),
        ));
    }
    let total: f64 = marginal.values().sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(LiftError::InvalidArgument(format!(
            "marginal probabilities sum to {total}, expected 1"
        )));
    }
    Ok(())
}
