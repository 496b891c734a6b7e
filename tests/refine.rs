use fglift::color_refinement::{refine, Coloring};
use fglift::factor_graph::{FactorGraph, Potential, Range};

fn pair_table() -> Potential {
    Potential::from_flat(&[2, 2], vec![0.9, 0.1, 0.2, 0.8]).unwrap()
}

/// Three identical star factors f_i = (a_i, b_i).
fn stars(n: usize) -> FactorGraph {
    let mut fg = FactorGraph::new();
    for i in 1..=n {
        fg.add_var(&format!("a{i}"), Range::boolean(), None).unwrap();
        fg.add_var(&format!("b{i}"), Range::boolean(), None).unwrap();
    }
    for i in 1..=n {
        fg.add_factor(
            &format!("f{i}"),
            &[&format!("a{i}"), &format!("b{i}")],
            Some(pair_table()),
        )
        .unwrap();
    }
    fg
}

/// Every fine class is contained in one coarse class.
fn refines(fine: &[usize], coarse: &[usize]) -> bool {
    let mut class_of: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    fine.iter()
        .zip(coarse.iter())
        .all(|(f, c)| *class_of.entry(*f).or_insert(*c) == *c)
}

#[test]
fn symmetry_detected() {
    let fg = stars(3);
    let colors = refine(&fg, None);
    // one class for the a side, one for the b side, one factor class
    assert_eq!(colors.n_var_colors(), 2);
    assert_eq!(colors.n_factor_colors(), 1);
    assert_eq!(colors.var_colors[0], colors.var_colors[2]);
    assert_eq!(colors.var_colors[0], colors.var_colors[4]);
    assert_ne!(colors.var_colors[0], colors.var_colors[1]);
}

#[test]
fn refinement_is_a_fixed_point() {
    let fg = stars(3);
    let colors = refine(&fg, None);
    let again = refine(&fg, Some(colors.clone()));
    assert_eq!(colors.canonical(), again.canonical());
}

#[test]
fn refinement_only_splits_the_seed_partition() {
    let mut fg = stars(3);
    // a fourth factor shares the table of the stars but wires a1 into its
    // second argument, so it seeds in their class and refinement must split
    // it off
    fg.add_var("c", Range::boolean(), None).unwrap();
    fg.add_factor("g", &["c", "a1"], Some(pair_table())).unwrap();
    let seed = Coloring::seed(&fg);
    let colors = refine(&fg, Some(seed.clone()));
    assert!(refines(&colors.var_colors, &seed.var_colors));
    assert!(refines(&colors.factor_colors, &seed.factor_colors));
    let f1 = fg.factor_id("f1").unwrap();
    let g = fg.factor_id("g").unwrap();
    assert_eq!(seed.factor_colors[f1], seed.factor_colors[g]);
    assert_ne!(colors.factor_colors[f1], colors.factor_colors[g]);
}

#[test]
fn partition_invariant_under_renaming() {
    let fg = stars(3);
    let colors = refine(&fg, None);

    // same structure, different names and interleaved insertion order
    let mut renamed = FactorGraph::new();
    for i in 1..=3 {
        renamed.add_var(&format!("x{i}"), Range::boolean(), None).unwrap();
    }
    for i in 1..=3 {
        renamed.add_var(&format!("y{i}"), Range::boolean(), None).unwrap();
    }
    for i in 1..=3 {
        renamed
            .add_factor(
                &format!("h{i}"),
                &[&format!("x{i}"), &format!("y{i}")],
                Some(pair_table()),
            )
            .unwrap();
    }
    let renamed_colors = refine(&renamed, None);
    // a-vars sit at 0, 2, 4 in the original and 0, 1, 2 in the renamed graph
    let originals = [0, 2, 4].map(|v| colors.var_colors[v]);
    assert!(originals.iter().all(|c| *c == originals[0]));
    let renames = [0, 1, 2].map(|v| renamed_colors.var_colors[v]);
    assert!(renames.iter().all(|c| *c == renames[0]));
    assert_eq!(colors.n_var_colors(), renamed_colors.n_var_colors());
    assert_eq!(colors.n_factor_colors(), renamed_colors.n_factor_colors());
}

#[test]
fn position_matters_in_factor_signatures() {
    // f orients (a, b), g orients (d, c): the flipped argument order keeps
    // the pairs apart when the table is asymmetric
    let mut fg = FactorGraph::new();
    for name in ["a", "b", "c", "d"] {
        fg.add_var(name, Range::boolean(), None).unwrap();
    }
    fg.add_factor("f", &["a", "b"], Some(pair_table())).unwrap();
    fg.add_factor("g", &["d", "c"], Some(pair_table())).unwrap();
    let colors = refine(&fg, None);
    assert_eq!(colors.n_factor_colors(), 1);
    let a = fg.var_id("a").unwrap();
    let c = fg.var_id("c").unwrap();
    let d = fg.var_id("d").unwrap();
    // a plays the first argument, d plays it in g
    assert_eq!(colors.var_colors[a], colors.var_colors[d]);
    assert_ne!(colors.var_colors[a], colors.var_colors[c]);
}
