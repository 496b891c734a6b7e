use indexmap::IndexMap;

use crate::LiftError;

/// A ground query: one target variable and the observed evidence, both by
/// original variable name with range labels as values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Query {
    pub target: String,
    pub evidence: IndexMap<String, String>,
}

/// Rewrites a ground query against the lifted model: one `obs` statement per
/// evidence pair in the query's own order, then the `query` statement, all
/// through the `rv_to_individual` map of the builder.
pub fn rewrite(
    query: &Query,
    rv_to_individual: &IndexMap<String, String>,
) -> Result<Vec<String>, LiftError> {
    let lifted = |var: &str| {
        rv_to_individual
            .get(var)
            .ok_or_else(|| LiftError::InvalidArgument(format!("no lifted name for variable {var}")))
    };
    let mut statements = Vec::with_capacity(query.evidence.len() + 1);
    for (var, value) in &query.evidence {
        statements.push(format!("obs {}={value};", lifted(var)?));
    }
    statements.push(format!("query {};", lifted(&query.target)?));
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_in_order() {
        let map: IndexMap<String, String> = [
            ("a1".to_owned(), "R0(l0_1)".to_owned()),
            ("a2".to_owned(), "R0(l0_2)".to_owned()),
            ("b".to_owned(), "R1".to_owned()),
        ]
        .into_iter()
        .collect();
        let query = Query {
            target: "b".to_owned(),
            evidence: [
                ("a2".to_owned(), "false".to_owned()),
                ("a1".to_owned(), "true".to_owned()),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            rewrite(&query, &map).unwrap(),
            vec![
                "obs R0(l0_2)=false;".to_owned(),
                "obs R0(l0_1)=true;".to_owned(),
                "query R1;".to_owned(),
            ]
        );
    }

    #[test]
    fn unknown_variable_rejected() {
        let map = IndexMap::new();
        let query = Query {
            target: "ghost".to_owned(),
            evidence: IndexMap::new(),
        };
        assert!(matches!(
            rewrite(&query, &map),
            Err(LiftError::InvalidArgument(_))
        ));
    }
}
