//! End-to-end rendering scenarios.
//!
//! Run: cargo test --test grammar_pipeline_test
#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use trueno_gg::grammar::{
    DataFrame, Diagnostic, LayerScene, PanelContent, PanelScene, Primitive, Scene, Severity,
};
use trueno_gg::prelude::*;

fn mpg() -> DataFrame {
    let mut df = DataFrame::new();
    df.add_column_f32("displ", &[1.8, 1.8, 2.0, 2.8, 3.1, 4.2, 5.3, 5.7, 6.5, 2.4, 3.0, 4.0]).unwrap();
    df.add_column_f32("hwy", &[29.0, 29.0, 31.0, 26.0, 27.0, 20.0, 19.0, 17.0, 17.0, 30.0, 26.0, 22.0]).unwrap();
    df.add_column_str(
        "class",
        &["compact", "compact", "compact", "midsize", "midsize", "suv", "suv", "suv", "suv", "compact", "midsize", "suv"],
    )
    .unwrap();
    df.add_column_str("drv", &["f", "f", "f", "4", "f", "4", "4", "r", "r", "f", "4", "4"]).unwrap();
    df.add_column_f32("cyl", &[4.0, 4.0, 4.0, 6.0, 6.0, 8.0, 8.0, 8.0, 8.0, 4.0, 6.0, 6.0]).unwrap();
    df
}

fn axes(panel: &PanelScene) -> (Vec<&str>, Vec<&str>) {
    match &panel.content {
        PanelContent::Rendered { x_axis, y_axis, .. } => (x_axis.labels(), y_axis.labels()),
        PanelContent::Failed { message } => panic!("panel failed: {message}"),
    }
}

fn infos(scene: &Scene) -> Vec<&Diagnostic> {
    scene.diagnostics.iter().filter(|d| d.severity == Severity::Info).collect()
}

// ============================================================================
// Layers and geoms
// ============================================================================

#[test]
fn point_markers_inside_panel() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy")).geom(Geom::point()).render().unwrap();
    let panel = &scene.panels[0];
    let markers: Vec<&Point> = panel
        .primitives()
        .filter_map(|p| match p {
            Primitive::Marker { center, .. } => Some(center),
            _ => None,
        })
        .collect();
    assert_eq!(markers.len(), 12);
    let (w, h) = (scene.layout.panel_width, scene.layout.panel_height);
    assert!(markers.iter().all(|c| (0.0..=w).contains(&c.x) && (0.0..=h).contains(&c.y)));

    // Larger hwy sits higher in the panel.
    let lowest = markers.iter().map(|c| c.y).fold(f32::NEG_INFINITY, f32::max);
    let Primitive::Marker { center, .. } = panel.primitives().nth(7).unwrap() else { panic!() };
    assert!((center.y - lowest).abs() < 1e-3);

    let (x_labels, _) = axes(panel);
    assert_eq!(x_labels, vec!["2", "3", "4", "5", "6"]);
}

#[test]
fn four_points_keep_data_order() {
    let mut df = DataFrame::new();
    df.add_column_f32("x", &[1.0, 2.0, 3.0, 4.0]).unwrap();
    df.add_column_f32("y", &[10.0, 20.0, 15.0, 25.0]).unwrap();
    let scene = GGPlot::new(df, Aes::xy("x", "y")).geom(Geom::point()).render().unwrap();
    assert_eq!(scene.panels.len(), 1);

    let centers: Vec<&Point> = scene.panels[0]
        .primitives()
        .filter_map(|p| match p {
            Primitive::Marker { center, .. } => Some(center),
            _ => None,
        })
        .collect();
    assert_eq!(centers.len(), 4);
    assert!(centers.windows(2).all(|w| w[0].x < w[1].x));

    // Visual y grows downwards: 25 is highest, 10 lowest.
    let ys: Vec<f32> = centers.iter().map(|c| c.y).collect();
    assert!(ys[3] < ys[1] && ys[1] < ys[2] && ys[2] < ys[0]);
}

#[test]
fn layers_draw_in_order() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy"))
        .geom(Geom::point())
        .geom(Geom::smooth())
        .render()
        .unwrap();
    let layers: Vec<&LayerScene> = scene.panels[0].layers().iter().collect();
    assert_eq!(layers.len(), 2);
    assert_eq!((layers[0].geom.as_str(), layers[1].geom.as_str()), ("point", "smooth"));
    let kinds: Vec<&str> = layers[1].primitives.iter().map(Primitive::kind).collect();
    assert_eq!(kinds, vec!["ribbon", "polyline"]);
}

#[test]
fn histogram_emits_every_bin() {
    let scene = GGPlot::new(mpg(), Aes::new().x("hwy")).geom(Geom::histogram()).render().unwrap();
    let rects = scene.panels[0].primitives().filter(|p| p.kind() == "rect").count();
    assert_eq!(rects, 30);

    let config = LayerConfig { params: Params::new().with("bins", 5), ..LayerConfig::new("histogram") };
    let scene = GGPlot::new(mpg(), Aes::new().x("hwy")).layer_config(config).unwrap().render().unwrap();
    assert_eq!(scene.primitive_count(), 5);
}

#[test]
fn boxplot_outliers_are_markers() {
    let mut df = DataFrame::new();
    df.add_column_str("g", &["a", "a", "a", "a", "a", "a", "b", "b", "b", "b"]).unwrap();
    df.add_column_f32("v", &[1.0, 2.0, 3.0, 4.0, 5.0, 40.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let scene = GGPlot::new(df, Aes::xy("g", "v")).geom(Geom::boxplot()).render().unwrap();
    let kinds: Vec<&str> = scene.panels[0].primitives().map(Primitive::kind).collect();
    assert_eq!(kinds.iter().filter(|k| **k == "box_whisker").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "marker").count(), 1);

    // The outlier widens the y domain.
    let (_, y_labels) = axes(&scene.panels[0]);
    assert_eq!(y_labels.last(), Some(&"40"));
}

#[test]
fn violin_polygons_per_group() {
    let scene = GGPlot::new(mpg(), Aes::xy("drv", "hwy")).geom(Geom::violin()).render().unwrap();
    assert_eq!(scene.panels[0].primitives().filter(|p| p.kind() == "polygon").count(), 3);
}

#[test]
fn discrete_y_identity_uses_levels() {
    let scene = GGPlot::new(mpg(), Aes::xy("hwy", "class")).geom(Geom::point()).render().unwrap();
    let (_, y_labels) = axes(&scene.panels[0]);
    assert_eq!(y_labels, vec!["compact", "midsize", "suv"]);
    assert_eq!(scene.primitive_count(), 12);
}

#[test]
fn datetime_axis_labels_years() {
    let days: Vec<_> = (0..10)
        .map(|i| NaiveDate::from_ymd_opt(2000 + i, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        .collect();
    let mut df = DataFrame::new();
    df.add_column_datetime("date", &days).unwrap();
    df.add_column_f32("unemploy", &[5.0, 6.0, 7.0, 6.5, 6.0, 5.5, 5.0, 6.0, 9.0, 10.0]).unwrap();
    let scene = GGPlot::new(df, Aes::xy("date", "unemploy")).geom(Geom::line()).render().unwrap();
    let (x_labels, _) = axes(&scene.panels[0]);
    assert!(x_labels.iter().all(|l| l.len() == 4 && l.starts_with("20")), "{x_labels:?}");
    assert_eq!(scene.primitive_count(), 1);
}

// ============================================================================
// Facets
// ============================================================================

#[test]
fn wrap_panels_share_fixed_scales() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy")).geom(Geom::point()).facet(FacetSpec::wrap("class")).render().unwrap();
    assert_eq!(scene.panels.len(), 3);
    let strips: Vec<Vec<String>> = scene.panels.iter().map(|p| p.strip.clone()).collect();
    assert_eq!(strips, vec![vec!["compact"], vec!["midsize"], vec!["suv"]]);
    let first = axes(&scene.panels[0]);
    assert!(scene.panels.iter().all(|p| axes(p) == first));
    assert_eq!((scene.layout.nrow, scene.layout.ncol), (1, 3));
}

#[test]
fn free_x_scales_differ_per_panel() {
    let facet = FacetSpec::wrap("drv").scales(ScalesPolicy::FreeX);
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy")).geom(Geom::point()).facet(facet).render().unwrap();
    let (f_x, f_y) = axes(&scene.panels[0]);
    let (r_x, r_y) = axes(&scene.panels[2]);
    assert_ne!(f_x, r_x);
    assert_eq!(f_y, r_y);
}

#[test]
fn grid_keeps_empty_cells() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy"))
        .geom(Geom::point())
        .facet_formula("cyl ~ drv")
        .unwrap()
        .render()
        .unwrap();
    assert_eq!(scene.panels.len(), 9);
    assert!(scene.panels.iter().all(|p| !p.is_failed()));
    let empty = scene.panels.iter().filter(|p| p.primitives().count() == 0).count();
    assert_eq!(empty, 4);
    assert_eq!(scene.primitive_count(), 12);
}

#[test]
fn layer_data_without_facet_var_repeats() {
    let mut reference = DataFrame::new();
    reference.add_column_f32("displ", &[2.0, 6.0]).unwrap();
    reference.add_column_f32("hwy", &[30.0, 15.0]).unwrap();
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy"))
        .geom(Geom::point())
        .layer(Layer::new(Geom::line()).data(reference))
        .facet(FacetSpec::wrap("drv"))
        .render()
        .unwrap();
    for panel in &scene.panels {
        assert_eq!(panel.layers()[1].primitives.len(), 1);
    }
}

// ============================================================================
// Smoothing
// ============================================================================

fn line_data(n: usize) -> DataFrame {
    let xs: Vec<f32> = (0..n).map(|i| i as f32 / n as f32 * 10.0).collect();
    let ys: Vec<f32> = xs.iter().map(|x| (x * 0.7).sin() * 3.0 + x).collect();
    let mut df = DataFrame::new();
    df.add_column_f32("x", &xs).unwrap();
    df.add_column_f32("y", &ys).unwrap();
    df
}

#[test]
fn smoothing_switches_to_gam_above_threshold() {
    let at = GGPlot::new(line_data(1000), Aes::xy("x", "y")).geom(Geom::smooth()).render().unwrap();
    assert!(infos(&at).iter().all(|d| !d.message.contains("gam")));

    let above = GGPlot::new(line_data(1001), Aes::xy("x", "y")).geom(Geom::smooth()).render().unwrap();
    assert_eq!(infos(&above).iter().filter(|d| d.message.contains("gam")).count(), 1);
}

#[test]
fn small_groups_are_skipped_with_warning() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy").colour("drv"))
        .layer(Layer::new(Geom::smooth()).stat(Stat::from_name("smooth", &Params::new().with("method", "lm")).unwrap()))
        .render()
        .unwrap();
    // Every drv group has at least two rows, so all three fit.
    assert_eq!(scene.warnings().count(), 0);

    // Local regression needs three; drv=r has two rows.
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy").colour("drv")).geom(Geom::smooth()).render().unwrap();
    let warnings: Vec<&Diagnostic> = scene.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("drv=r"), "{}", warnings[0].message);
    assert_eq!(warnings[0].layer, Some(0));
    let curves = scene.panels[0].primitives().filter(|p| p.kind() == "polyline").count();
    assert_eq!(curves, 2);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn discovery_errors_are_collected() {
    let err = GGPlot::new(mpg(), Aes::new())
        .layer(Layer::new(Geom::point()).aes(Aes::xy("displ", "nope")))
        .layer(Layer::new(Geom::point()).aes(Aes::xy("missing", "hwy")))
        .render()
        .unwrap_err();
    let Error::Discovery(errors) = err else { panic!("expected aggregate, got {err}") };
    assert_eq!(errors.len(), 2);
}

#[test]
fn mapping_and_scale_errors_are_reported_together() {
    let df = mpg().with_derived("zero_based", "displ - 1.8").unwrap();
    let err = GGPlot::new(df, Aes::xy("zero_based", "hwy"))
        .geom(Geom::point())
        .layer(Layer::new(Geom::point()).aes(Aes::new().y("nope")))
        .scale(Channel::X, ScaleSpec::log10())
        .render()
        .unwrap_err();
    let Error::Discovery(errors) = err else { panic!("expected aggregate, got {err}") };
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(e, Error::UnknownColumn { column, .. } if column == "nope")));
    assert!(errors.iter().any(|e| matches!(e, Error::ScaleDomain(_))));
}

#[test]
fn continuous_and_discrete_on_one_scale() {
    let err = GGPlot::new(mpg(), Aes::xy("displ", "hwy"))
        .geom(Geom::point())
        .layer(Layer::new(Geom::point()).aes(Aes::new().x("class")))
        .render()
        .unwrap_err();
    assert!(matches!(err, Error::IncompatibleScale { .. }));
}

#[test]
fn log_scale_rejects_zero() {
    let mut df = mpg();
    df = df.with_derived("zero_based", "displ - 1.8").unwrap();
    let err = GGPlot::new(df, Aes::xy("zero_based", "hwy"))
        .geom(Geom::point())
        .scale(Channel::X, ScaleSpec::log10())
        .render()
        .unwrap_err();
    assert!(matches!(err, Error::ScaleDomain(ref m) if m.starts_with("x scale")));
}

#[test]
fn non_finite_marks_fail_the_panel_only() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy"))
        .layer(Layer::new(Geom::point()).fixed(FixedAes::new().size(f32::NAN)))
        .facet(FacetSpec::wrap("drv"))
        .render()
        .unwrap();
    assert_eq!(scene.panels.len(), 3);
    assert!(scene.panels.iter().all(|p| p.is_failed()));
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn scene_serializes_to_yaml() {
    let scene = GGPlot::new(mpg(), Aes::xy("displ", "hwy").colour("class"))
        .geom(Geom::point())
        .title("Fuel economy")
        .render()
        .unwrap();
    let yaml = scene.to_yaml().unwrap();
    assert!(yaml.contains("kind: marker"));
    assert!(yaml.contains("status: rendered"));
    assert!(yaml.contains("Fuel economy"));
    let back: Scene = serde_yaml_ng::from_str(&yaml).unwrap();
    assert_eq!(back.panels.len(), scene.panels.len());
    assert_eq!(back.legends, scene.legends);
}
