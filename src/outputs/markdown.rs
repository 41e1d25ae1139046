//! Newsletter document assembly.
//!
//! The generated narrative is followed by the chart gallery and a data
//! appendix rendered straight from the snapshot, so every figure the model
//! cites can be checked and missing datasets are stated plainly.

use crate::charts::RenderedChart;
use crate::context::format_indices;
use crate::models::{MarketSnapshot, NewsRecord, StockRecord};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const FILE_NAME: &str = "newsletter.md";

pub const NO_INDICES: &str = "주요 지수 데이터를 수집하지 못했습니다.";
pub const NO_RISERS: &str = "상승 종목 데이터를 수집하지 못했습니다.";
pub const NO_FALLERS: &str = "하락 종목 데이터를 수집하지 못했습니다.";
pub const NO_NEWS: &str = "수집된 뉴스가 없습니다.";
pub const NO_CHARTS: &str = "생성된 차트가 없습니다.";

/// Full Markdown document for one run.
pub fn render_document(narrative: &str, snapshot: &MarketSnapshot, charts: &[RenderedChart]) -> String {
    let mut md = String::new();
    md.push_str(narrative.trim_end());
    md.push_str("\n\n---\n\n## 📊 데이터 시각화\n\n");

    if charts.is_empty() {
        let _ = writeln!(md, "_{NO_CHARTS}_\n");
    }
    for chart in charts {
        let file = chart
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| chart.path.display().to_string());
        let _ = writeln!(md, "![{}]({})\n", chart.title, file);
    }

    md.push_str("## 📋 수집 데이터\n\n### 주요 지수\n\n");
    if snapshot.indices.is_empty() {
        let _ = writeln!(md, "{NO_INDICES}");
    } else {
        md.push_str(&format_indices(&snapshot.indices));
    }

    md.push_str("\n### 상승률 상위 종목\n\n");
    md.push_str(&stock_table(&snapshot.summary.top_risers, NO_RISERS));

    md.push_str("\n### 하락률 상위 종목\n\n");
    md.push_str(&stock_table(&snapshot.summary.top_fallers, NO_FALLERS));

    md.push_str("\n### 주요 뉴스\n\n");
    md.push_str(&news_list(&snapshot.news));

    let _ = write!(
        md,
        "\n---\n\n*본 리포트는 {} 기준으로 작성되었습니다.*\n*투자 판단은 본인의 책임하에 이루어져야 합니다.*\n",
        snapshot.generated_at.format("%Y년 %m월 %d일 %H:%M")
    );
    md
}

fn stock_table(stocks: &[StockRecord], empty: &str) -> String {
    if stocks.is_empty() {
        return format!("{empty}\n");
    }
    let mut out = String::from("| 순위 | 종목명 | 현재가 | 등락률(%) |\n|---:|---|---:|---:|\n");
    for (i, s) in stocks.iter().enumerate() {
        let _ = writeln!(out, "| {} | {} | {:.0} | {:+.2} |", i + 1, s.name, s.price, s.change_percent);
    }
    out
}

fn news_list(news: &[NewsRecord]) -> String {
    if news.is_empty() {
        return format!("{NO_NEWS}\n");
    }
    let mut out = String::new();
    for item in news {
        let title = match &item.url {
            Some(url) => format!("[{}]({})", item.headline, url),
            None => item.headline.clone(),
        };
        let meta: Vec<&str> = [item.press.as_deref(), item.published_at.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if meta.is_empty() {
            let _ = writeln!(out, "- {title}");
        } else {
            let _ = writeln!(out, "- {title} ({})", meta.join(", "));
        }
    }
    out
}

/// Write the document into `dir`, replacing a previous newsletter.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_document(dir: &Path, document: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(FILE_NAME);
    fs::write(&path, document).await?;
    info!(path = %path.display(), bytes = document.len(), "Wrote newsletter");
    Ok(path)
}
