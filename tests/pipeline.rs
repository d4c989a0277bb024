use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chartify_web::charts::{ChartKind, Scalar, ZValues};
use chartify_web::dashboard::{cannot_generate, not_recognised, UNSUPPORTED_FILE};
use chartify_web::{ChartRequest, Dashboard, DashboardConfig};

const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

fn dashboard() -> Dashboard {
    Dashboard::new(DashboardConfig {
        export_size: (400, 300),
        ..Default::default()
    })
    .unwrap()
}

fn upload(csv: &str, filename: &str, chart_type: &str) -> ChartRequest {
    ChartRequest {
        contents: Some(format!("data:text/csv;base64,{}", STANDARD.encode(csv))),
        filename: Some(filename.to_string()),
        chart_type: Some(chart_type.to_string()),
        ..Default::default()
    }
}

#[test]
fn every_chart_kind_renders_the_sample() {
    let dash = dashboard();
    for kind in ChartKind::ALL {
        let resp = dash.render(&ChartRequest {
            chart_type: Some(kind.id().to_string()),
            use_sample: true,
            ..Default::default()
        });
        assert!(!resp.figure.is_empty(), "{} produced an empty figure", kind);
        assert_eq!(resp.suggestion, "", "{} produced a suggestion", kind);
    }
}

#[test]
fn non_numeric_second_column_suggests_alternatives() {
    let dash = dashboard();
    let csv = "Category,Label,Values\nA,x,1\nB,y,2\n";
    for chart_type in ["scatter", "histogram"] {
        let resp = dash.render(&upload(csv, "data.csv", chart_type));
        assert!(resp.figure.is_empty());
        assert_eq!(resp.suggestion, cannot_generate(chart_type));
    }
}

#[test]
fn bar_chart_of_two_categories() {
    let resp = dashboard().render(&upload("Category,Values\nA,10\nB,20\n", "data.csv", "bar"));
    assert_eq!(resp.suggestion, "");
    assert_eq!(resp.file_label, "File Selected: data.csv");
    assert_eq!(resp.figure.data.len(), 1);

    let trace = &resp.figure.data[0];
    assert_eq!(trace.x, Some(vec![Scalar::from("A"), Scalar::from("B")]));
    assert_eq!(trace.y, Some(vec![Scalar::Number(10.0), Scalar::Number(20.0)]));
}

#[test]
fn heatmap_of_one_numeric_column_is_one_cell() {
    let resp = dashboard().render(&upload("Category,Values\nA,10\nB,20\n", "data.csv", "heatmap"));
    assert_eq!(resp.suggestion, "");
    match &resp.figure.data[0].z {
        Some(ZValues::Grid(grid)) => {
            assert_eq!(grid.len(), 1);
            assert_eq!(grid[0].len(), 1);
            assert_eq!(grid[0][0].as_f64(), Some(1.0));
        }
        other => panic!("expected a grid, got {:?}", other),
    }
}

#[test]
fn unknown_chart_type_is_reported() {
    let resp = dashboard().render(&upload("Category,Values\nA,10\n", "data.csv", "foobar"));
    assert!(resp.figure.is_empty());
    assert_eq!(resp.suggestion, not_recognised("foobar"));
}

#[test]
fn unsupported_extensions_are_rejected() {
    let dash = dashboard();
    for filename in ["data.txt", "data.CSV", "data.xls", "csv"] {
        let resp = dash.render(&upload("Category,Values\nA,10\n", filename, "line"));
        assert!(resp.figure.is_empty());
        assert_eq!(resp.suggestion, UNSUPPORTED_FILE, "{}", filename);
    }
}

#[test]
fn json_upload_keeps_column_order() {
    let json = r#"[{"Region":"N","Zed":3,"Alpha":1},{"Region":"S","Zed":4,"Alpha":2}]"#;
    let resp = dashboard().render(&upload(json, "data.json", "line"));
    let summary = resp.summary.unwrap();
    assert_eq!(summary.columns, vec!["Region", "Zed", "Alpha"]);
    let names: Vec<_> = resp.figure.data.iter().filter_map(|t| t.name.clone()).collect();
    assert_eq!(names, vec!["Zed", "Alpha"]);
}

#[test]
fn export_yields_png_for_every_kind() {
    let dash = dashboard();
    for kind in ChartKind::ALL {
        let (filename, png) = dash
            .export(kind.id())
            .unwrap_or_else(|e| panic!("{} export failed: {}", kind, e));
        assert_eq!(filename, format!("chart_{}.png", kind.id()));
        assert!(png.starts_with(&PNG_MAGIC), "{} is not a PNG", kind);
    }
}

#[test]
fn export_of_unknown_type_fails() {
    assert!(dashboard().export("foobar").is_err());
}

#[test]
fn live_preview_only_for_line() {
    let dash = dashboard();
    for kind in ChartKind::ALL {
        let uri = dash.live_preview(kind.id());
        if kind == ChartKind::Line {
            assert!(uri.starts_with("data:image/png;base64,"));
        } else {
            assert!(uri.is_empty(), "{} has a preview", kind);
        }
    }
}
