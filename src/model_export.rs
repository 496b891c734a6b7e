//! Serialization of a parfactor graph into the model description consumed by
//! the external inference engine.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::factor_graph::Range;
use crate::parfactor::{LvId, Parfactor, ParfactorGraph, PfId, PotAtom};
use crate::LiftError;

/// Emits type declarations, guaranteed individuals, random function
/// declarations and one factor/parfactor statement per parfactor. Only
/// boolean ranges translate to an engine type.
pub fn export_model(pfg: &ParfactorGraph) -> Result<String, LiftError> {
    // logical variables orphaned by sharing are not declared
    let used: Vec<LvId> = (0..pfg.n_logvars())
        .filter(|lv| pfg.prvs.values().any(|prv| prv.logvars.contains(lv)))
        .collect();
    let mut out = String::new();
    for lv in &used {
        out.push_str(&format!("type {};\n", pfg.logvar_name(*lv)));
    }
    for lv in &used {
        out.push_str(&format!(
            "guaranteed {} {};\n",
            pfg.logvar_name(*lv),
            pfg.logvar(*lv).domain.iter().join(", ")
        ));
    }
    for (name, prv) in pfg.prvs.iter() {
        let ty = range_type(&prv.range)?;
        if prv.logvars.is_empty() {
            out.push_str(&format!("random {ty} {name};\n"));
        } else {
            out.push_str(&format!(
                "random {ty} {name}({});\n",
                prv.logvars.iter().map(|lv| pfg.logvar_name(*lv)).join(", ")
            ));
        }
    }
    for (pf, parfactor) in pfg.parfactors.values().enumerate() {
        out.push_str(&emit_parfactor(pfg, pf, parfactor));
    }
    Ok(out)
}

fn range_type(range: &Range) -> Result<&'static str, LiftError> {
    if range.is_boolean() {
        Ok("Boolean")
    } else {
        Err(LiftError::UnsupportedRange(range.labels().to_vec()))
    }
}

fn emit_parfactor(pfg: &ParfactorGraph, pf: PfId, parfactor: &Parfactor) -> String {
    // one placeholder per logical variable, in order of first appearance
    // while walking the scope; a shared logical variable keeps its
    // placeholder
    let mut placeholders: IndexMap<LvId, String> = IndexMap::new();
    for prv in parfactor.scope() {
        for lv in &pfg.prv(prv).logvars {
            let next = placeholders.len() + 1;
            placeholders.entry(*lv).or_insert_with(|| format!("X{next}"));
        }
    }

    let args = parfactor
        .scope()
        .map(|prv_id| {
            let prv = pfg.prv(prv_id);
            let name = pfg.prv_name(prv_id);
            if prv.is_counted_in(pf) {
                let lv = prv.counted_over.unwrap();
                let x = &placeholders[&lv];
                format!("#({} {x})[{name}({x})]", pfg.logvar_name(lv))
            } else if prv.logvars.is_empty() {
                name.to_owned()
            } else {
                format!(
                    "{name}({})",
                    prv.logvars.iter().map(|lv| placeholders[lv].as_str()).join(", ")
                )
            }
        })
        .join(", ");

    // descending lexicographic order of the stringified assignment keys
    let mut entries: Vec<(String, f64)> = parfactor
        .potentials
        .iter()
        .map(|(key, value)| (key_string(pfg, parfactor, key), *value))
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    let values = entries.iter().map(|(_, v)| v.to_string()).join(", ");

    if placeholders.is_empty() {
        format!("factor MultiArrayPotential[[{values}]] ({args});\n")
    } else {
        let logvar_list = placeholders
            .iter()
            .map(|(lv, x)| format!("{} {x}", pfg.logvar_name(*lv)))
            .join(", ");
        format!("parfactor {logvar_list}. MultiArrayPotential[[{values}]] ({args});\n")
    }
}

/// Assignment key string: components joined by ", ", values rendered as their
/// range label, histograms as range-aligned counts joined by ";".
fn key_string(pfg: &ParfactorGraph, parfactor: &Parfactor, key: &[PotAtom]) -> String {
    key.iter()
        .zip(parfactor.scope())
        .map(|(atom, prv)| match atom {
            PotAtom::Val(v) => pfg.prv(prv).range.label(*v).to_owned(),
            PotAtom::Hist(hist) => hist.iter().join(";"),
        })
        .join(", ")
}
