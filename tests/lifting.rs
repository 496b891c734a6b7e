use fglift::color_refinement::refine;
use fglift::factor_graph::{FactorGraph, Potential, Range};
use fglift::lifting::lift_unknown;
use fglift::LiftError;

fn pair_table() -> Potential {
    Potential::from_flat(&[2, 2], vec![0.9, 0.1, 0.2, 0.8]).unwrap()
}

/// Star factors f_i = (a_i, b_i); the factors listed in `unknown` carry no
/// table, a_1 optionally carries evidence.
fn stars(n: usize, unknown: &[usize], evidence_on_a1: bool) -> FactorGraph {
    let mut fg = FactorGraph::new();
    for i in 1..=n {
        let evidence = (i == 1 && evidence_on_a1).then_some(0);
        fg.add_var(&format!("a{i}"), Range::boolean(), evidence).unwrap();
        fg.add_var(&format!("b{i}"), Range::boolean(), None).unwrap();
    }
    for i in 1..=n {
        let table = (!unknown.contains(&i)).then(pair_table);
        fg.add_factor(
            &format!("f{i}"),
            &[&format!("a{i}"), &format!("b{i}")],
            table,
        )
        .unwrap();
    }
    fg
}

#[test]
fn unknown_factor_fuses_and_adopts() {
    // S3: with f2 unknown and full threshold, the final partition matches
    // the all-known one
    let mut fg = stars(3, &[2], false);
    let colors = lift_unknown(&mut fg, 1.0, None).unwrap();
    let known = refine(&stars(3, &[], false), None);
    assert_eq!(colors.canonical(), known.canonical());
    let f2 = fg.factor_id("f2").unwrap();
    assert_eq!(fg.factor(f2).imputed(), Some(&pair_table()));
    assert!(fg.factor(f2).declared().is_none());
}

#[test]
fn evidence_asymmetry_is_not_fused_away() {
    // S4: a1 carries evidence, so f1 is no candidate for the unknown f2
    let mut fg = stars(3, &[2], true);
    let colors = lift_unknown(&mut fg, 1.0, None).unwrap();
    let (f1, f2, f3) = (0, 1, 2);
    assert_ne!(colors.factor_colors[f1], colors.factor_colors[f2]);
    assert_eq!(colors.factor_colors[f2], colors.factor_colors[f3]);
    assert_eq!(fg.factor(f2).imputed(), Some(&pair_table()));
}

/// One unknown factor with two candidates that are incompatible with each
/// other: u = (x1, y1) unknown, c1 and c2 known with different tables.
fn gated() -> FactorGraph {
    let mut fg = FactorGraph::new();
    for i in 1..=3 {
        fg.add_var(&format!("x{i}"), Range::boolean(), None).unwrap();
        fg.add_var(&format!("y{i}"), Range::boolean(), None).unwrap();
    }
    fg.add_factor("u", &["x1", "y1"], None).unwrap();
    fg.add_factor("c1", &["x2", "y2"], Some(pair_table())).unwrap();
    let other = Potential::from_flat(&[2, 2], vec![0.5, 0.5, 0.5, 0.5]).unwrap();
    fg.add_factor("c2", &["x3", "y3"], Some(other)).unwrap();
    fg
}

#[test]
fn threshold_gates_adoption() {
    // S5: the largest compatible subset covers half the candidates
    let mut strict = gated();
    let colors = lift_unknown(&mut strict, 1.0, None).unwrap();
    let u = strict.factor_id("u").unwrap();
    assert!(strict.factor(u).is_unknown());
    assert_eq!(colors.n_factor_colors(), 3);

    let mut lenient = gated();
    let colors = lift_unknown(&mut lenient, 0.5, None).unwrap();
    let u = lenient.factor_id("u").unwrap();
    let c1 = lenient.factor_id("c1").unwrap();
    let c2 = lenient.factor_id("c2").unwrap();
    assert_eq!(lenient.factor(u).imputed(), Some(&pair_table()));
    assert_eq!(colors.factor_colors[u], colors.factor_colors[c1]);
    assert_ne!(colors.factor_colors[u], colors.factor_colors[c2]);
}

#[test]
fn unknown_pairs_fuse_immediately() {
    let mut fg = stars(3, &[2, 3], false);
    let colors = lift_unknown(&mut fg, 1.0, None).unwrap();
    let f2 = fg.factor_id("f2").unwrap();
    let f3 = fg.factor_id("f3").unwrap();
    assert_eq!(colors.factor_colors[f2], colors.factor_colors[f3]);
    // both end up in f1's class once the potential is adopted
    assert_eq!(colors.n_factor_colors(), 1);
    assert_eq!(fg.factor(f2).imputed(), Some(&pair_table()));
}

#[test]
fn zero_threshold_refines_plain_refinement() {
    // with the threshold at zero every candidate set is adopted; the final
    // partition on known factors still only splits the plain one
    let mut fg = gated();
    let lifted = lift_unknown(&mut fg, 0.0, None).unwrap();
    let plain = refine(&gated(), None);
    let known: Vec<usize> = gated()
        .range_factors()
        .filter(|f| !gated().factor(*f).is_unknown())
        .collect();
    let mut class_of = std::collections::HashMap::new();
    for f in known {
        let fine = lifted.factor_colors[f];
        let coarse = plain.factor_colors[f];
        assert_eq!(*class_of.entry(fine).or_insert(coarse), coarse);
    }
}

#[test]
fn invalid_threshold_rejected() {
    let mut fg = gated();
    assert_eq!(
        lift_unknown(&mut fg, 1.1, None),
        Err(LiftError::InvalidThreshold(1.1))
    );
}
