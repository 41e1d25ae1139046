//! Bar charts for the newsletter.
//!
//! Chart construction is split in two: [`chart_specs`] turns a snapshot into
//! plain [`ChartSpec`] values (deterministic, easy to assert on), and
//! [`render_charts`] draws those specs to PNG files with plotters.
//!
//! Labels and titles are carried by the Markdown document rather than drawn
//! into the bitmap, so rendering needs no system fonts.

use crate::error::ChartError;
use crate::models::{Direction, MarketSnapshot, StockRecord};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 900;

pub const UP_COLOR: (u8, u8, u8) = (0, 128, 0);
pub const DOWN_COLOR: (u8, u8, u8) = (255, 0, 0);
pub const RISER_COLOR: (u8, u8, u8) = (0x2e, 0xcc, 0x71);
pub const FALLER_COLOR: (u8, u8, u8) = (0xe7, 0x4c, 0x3c);

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: (u8, u8, u8),
}

/// One horizontal bar chart, top bar first.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub file_name: String,
    pub title: String,
    pub bars: Vec<Bar>,
}

impl ChartSpec {
    /// X-axis range covering every bar and zero, padded by 10%.
    pub fn value_range(&self) -> (f64, f64) {
        let lo = self.bars.iter().map(|b| b.value).fold(0.0_f64, f64::min);
        let hi = self.bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
        let span = hi - lo;
        if span <= f64::EPSILON {
            return (-1.0, 1.0);
        }
        (lo - span * 0.1, hi + span * 0.1)
    }
}

/// A chart written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub title: String,
    pub path: PathBuf,
}

/// Build the index, riser, and faller charts. Empty datasets get no chart.
pub fn chart_specs(snapshot: &MarketSnapshot, top_count: usize) -> Vec<ChartSpec> {
    let mut specs = Vec::new();

    if !snapshot.indices.is_empty() {
        specs.push(ChartSpec {
            file_name: "indices_performance.png".to_string(),
            title: "Major Indices Performance".to_string(),
            bars: snapshot
                .indices
                .iter()
                .map(|i| Bar {
                    label: i.name.clone(),
                    value: i.change_percent,
                    color: if i.change_percent > 0.0 { UP_COLOR } else { DOWN_COLOR },
                })
                .collect(),
        });
    }

    let movers = [
        (Direction::Rise, &snapshot.summary.top_risers, "top_rising.png", "Rising", RISER_COLOR),
        (Direction::Fall, &snapshot.summary.top_fallers, "top_falling.png", "Falling", FALLER_COLOR),
    ];
    for (direction, ranked, file_name, word, color) in movers {
        if ranked.is_empty() {
            continue;
        }
        let shown: Vec<&StockRecord> = ranked.iter().take(top_count).collect();
        specs.push(ChartSpec {
            file_name: file_name.to_string(),
            title: format!("Top {} {} Stocks", shown.len(), word),
            bars: shown
                .into_iter()
                .map(|s| Bar {
                    label: s.name.clone(),
                    value: s.change_percent,
                    color,
                })
                .collect(),
        });
        info!(direction = direction.as_str(), "Prepared mover chart");
    }

    specs
}

/// Draw every spec into `dir`, overwriting files of the same name.
///
/// A chart that fails to render is logged and left out of the result.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), charts = specs.len()))]
pub fn render_charts(specs: &[ChartSpec], dir: &Path) -> Vec<RenderedChart> {
    specs
        .iter()
        .filter_map(|spec| match render_chart(spec, dir) {
            Ok(chart) => Some(chart),
            Err(e) => {
                error!(error = %e, "Chart rendering failed; continuing without it");
                None
            }
        })
        .collect()
}

pub fn render_chart(spec: &ChartSpec, dir: &Path) -> Result<RenderedChart, ChartError> {
    let path = dir.join(&spec.file_name);
    draw(spec, &path).map_err(|e| ChartError::Render {
        file: spec.file_name.clone(),
        message: e.to_string(),
    })?;
    info!(path = %path.display(), bars = spec.bars.len(), "Rendered chart");
    Ok(RenderedChart {
        title: spec.title.clone(),
        path,
    })
}

fn draw(spec: &ChartSpec, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = spec.value_range();
    let rows = spec.bars.len().max(1) as f64;
    let mut chart = ChartBuilder::on(&root)
        .margin(40)
        .build_cartesian_2d(x_lo..x_hi, 0.0..rows)?;

    chart.draw_series(spec.bars.iter().enumerate().map(|(i, bar)| {
        let top = rows - i as f64;
        let (lo, hi) = if bar.value < 0.0 { (bar.value, 0.0) } else { (0.0, bar.value) };
        let (r, g, b) = bar.color;
        Rectangle::new([(lo, top - 0.15), (hi, top - 0.85)], RGBColor(r, g, b).mix(0.7).filled())
    }))?;

    // Zero axis.
    chart.draw_series(LineSeries::new([(0.0, 0.0), (0.0, rows)], &BLACK))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::summarize;
    use crate::models::{IndexRecord, MarketSnapshot};
    use chrono::Local;

    fn snapshot() -> MarketSnapshot {
        let indices = vec![
            IndexRecord { name: "KOSPI".into(), value: 2500.0, change_value: 10.5, change_percent: 0.42 },
            IndexRecord { name: "KOSDAQ".into(), value: 850.0, change_value: -5.2, change_percent: -0.61 },
        ];
        let risers: Vec<StockRecord> = (0..7)
            .map(|i| StockRecord {
                name: format!("종목{}", i + 1),
                code: None,
                price: 50_000.0 + i as f64 * 1000.0,
                change_percent: 5.0 - i as f64 * 0.3,
            })
            .collect();
        let summary = summarize(&indices, &risers, &[], &[], 10);
        MarketSnapshot {
            generated_at: Local::now(),
            indices,
            risers,
            fallers: vec![],
            news: vec![],
            summary,
            failed: vec![],
        }
    }

    #[test]
    fn test_specs_skip_empty_datasets() {
        let specs = chart_specs(&snapshot(), 5);
        let files: Vec<&str> = specs.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(files, ["indices_performance.png", "top_rising.png"]);
    }

    #[test]
    fn test_index_colors_follow_sign() {
        let specs = chart_specs(&snapshot(), 5);
        assert_eq!(specs[0].bars[0].color, UP_COLOR);
        assert_eq!(specs[0].bars[1].color, DOWN_COLOR);
    }

    #[test]
    fn test_mover_chart_is_capped() {
        let specs = chart_specs(&snapshot(), 5);
        assert_eq!(specs[1].bars.len(), 5);
        assert_eq!(specs[1].title, "Top 5 Rising Stocks");
        assert_eq!(specs[1].bars[0].label, "종목1");
    }

    #[test]
    fn test_specs_are_deterministic() {
        let snap = snapshot();
        assert_eq!(chart_specs(&snap, 5), chart_specs(&snap, 5));
    }

    #[test]
    fn test_value_range_includes_zero() {
        let spec = ChartSpec {
            file_name: "x.png".into(),
            title: "x".into(),
            bars: vec![Bar { label: "a".into(), value: 2.0, color: RISER_COLOR }],
        };
        let (lo, hi) = spec.value_range();
        assert!(lo < 0.0 && hi > 2.0);

        let flat = ChartSpec { bars: vec![], ..spec };
        assert_eq!(flat.value_range(), (-1.0, 1.0));
    }

    #[test]
    fn test_render_writes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let specs = chart_specs(&snapshot(), 5);

        let rendered = render_charts(&specs, dir.path());

        assert_eq!(rendered.len(), 2);
        for chart in &rendered {
            let bytes = std::fs::read(&chart.path).unwrap();
            assert_eq!(&bytes[1..4], b"PNG");
        }
    }
}
