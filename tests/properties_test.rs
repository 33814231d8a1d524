//! Property-based tests for facet partitioning, domain merging, binning and
//! discrete guides.
//!
//! Run: cargo test --test properties_test
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use trueno_gg::config::{ScaleConfig, StatConfig};
use trueno_gg::fit::DefaultFitter;
use trueno_gg::grammar::{
    axis, bin_edges, bin_index, partition, Aes, BinParams, Channel, DataFrame, DomainSet, FacetSpec, FixedAes,
    LevelKey, ResolvedAes, ScaleInput, ScaleManager, ScalesPolicy, Stat, StatContext,
};

const ROWS: [&str; 3] = ["4", "6", "8"];
const COLS: [&str; 4] = ["f", "r", "4", "x"];

fn cells() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..ROWS.len(), 0..COLS.len()), 1..200)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A grid holds one panel per combination of observed levels.
    #[test]
    fn prop_grid_panels_cover_rows_once(cells in cells()) {
        let cyl: Vec<&str> = cells.iter().map(|&(r, _)| ROWS[r]).collect();
        let drv: Vec<&str> = cells.iter().map(|&(_, c)| COLS[c]).collect();
        let mut df = DataFrame::new();
        df.add_column_str("cyl", &cyl).unwrap();
        df.add_column_str("drv", &drv).unwrap();

        let panels = partition(&df, &FacetSpec::grid(Some("cyl"), Some("drv"))).unwrap();
        let n_rows = cyl.iter().collect::<BTreeSet<_>>().len();
        let n_cols = drv.iter().collect::<BTreeSet<_>>().len();
        prop_assert_eq!(panels.len(), n_rows * n_cols);

        let mut seen: Vec<usize> = panels.iter().flat_map(|p| p.rows.iter().copied()).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..cells.len()).collect::<Vec<_>>());
    }

    /// Merging domains gives the same set whatever the order.
    #[test]
    fn prop_domain_merge_order_independent(
        items in prop::collection::vec(
            (prop::collection::vec(-1e3f32..1e3, 0..20), prop::collection::vec(0usize..6, 0..10)),
            1..8,
        )
    ) {
        let sets: Vec<DomainSet> = items
            .iter()
            .enumerate()
            .map(|(layer, (values, levels))| {
                let mut set = DomainSet::new();
                set.register_domain(Channel::X, values, false).unwrap();
                for (row, level) in levels.iter().enumerate() {
                    set.register_level(Channel::Colour, &format!("l{level}"), LevelKey::observed(layer, row)).unwrap();
                }
                set
            })
            .collect();

        let forward = sets.iter().cloned().try_fold(DomainSet::new(), DomainSet::merge).unwrap();
        let backward = sets.iter().rev().cloned().try_fold(DomainSet::new(), DomainSet::merge).unwrap();
        prop_assert_eq!(forward, backward);
    }

    /// Every value lands in exactly one bin.
    #[test]
    fn prop_bin_counts_sum_to_rows(
        values in prop::collection::vec(-100f32..100.0, 1..300),
        bins in 1usize..40,
    ) {
        let mut df = DataFrame::new();
        df.add_column_f32("v", &values).unwrap();
        let aes = ResolvedAes::resolve(&Aes::new().x("v"), &FixedAes::new(), &df).unwrap();
        let rows: Vec<usize> = (0..values.len()).collect();
        let config = StatConfig::default();
        let ctx = StatContext { config: &config, fitter: &DefaultFitter };

        let stat = Stat::Bin(BinParams { bins: Some(bins), ..BinParams::default() });
        let output = stat.compute(&aes, &rows, &ctx).unwrap();
        prop_assert!(output.notes.is_empty(), "notes: {:?}", output.notes);
        let group = &output.groups[0];
        prop_assert_eq!(group.rows.len(), bins);
        let total: f32 = group.rows.iter().map(|r| r.y).sum();
        prop_assert!((total - values.len() as f32).abs() < 1e-3, "total {} for {} rows", total, values.len());
    }

    /// An edge value belongs to the bin it opens; the maximum to the last bin.
    #[test]
    fn prop_bin_edges_are_left_closed(
        lo in -50i32..50,
        width in prop::sample::select(vec![0.25f32, 0.5, 1.0, 2.0, 2.5]),
        n in 1usize..20,
    ) {
        let lo = lo as f32;
        let hi = lo + n as f32 * width;
        let params = BinParams { binwidth: Some(width), ..BinParams::default() };
        let edges = bin_edges((lo, hi), &params, &StatConfig::default()).unwrap();
        prop_assert_eq!(edges.len(), n + 1);

        for k in 0..n {
            prop_assert_eq!(bin_index(&edges, lo + k as f32 * width), Some(k));
        }
        prop_assert_eq!(bin_index(&edges, hi), Some(n - 1));
        prop_assert_eq!(bin_index(&edges, lo - width), None);
        prop_assert_eq!(bin_index(&edges, hi + width), None);
    }

    /// A discrete axis lists the levels in order, and each level maps to its 1-based slot.
    #[test]
    fn prop_discrete_axis_round_trips(levels in prop::collection::btree_set("[a-z]{1,6}", 1..12)) {
        let levels: Vec<String> = levels.into_iter().collect();
        let mut domains = DomainSet::new();
        for (row, level) in levels.iter().enumerate() {
            domains.register_level(Channel::X, level, LevelKey::observed(0, row)).unwrap();
        }

        let trained = ScaleManager::new(HashMap::new(), HashMap::new())
            .finalize(&[domains], ScalesPolicy::Fixed, &ScaleConfig::default())
            .unwrap();
        let x = &trained.panels[0].x;
        let guide = axis(x, 400.0, 5);
        prop_assert_eq!(guide.labels(), levels.iter().map(String::as_str).collect::<Vec<_>>());

        for (i, level) in levels.iter().enumerate() {
            prop_assert_eq!(x.map_value(ScaleInput::Level(level)), Some((i + 1) as f32));
        }
        prop_assert_eq!(x.map_value(ScaleInput::Level("NOT-A-LEVEL")), None);
    }
}
