//! Summary statistics over the extracted record lists.
//!
//! Everything here borrows its input and returns new values; the scraped
//! lists keep their original order for the snapshot and the appendix.

use crate::models::{Direction, IndexRecord, MarketSummary, NewsRecord, StockRecord};
use tracing::{debug, instrument};

/// Up to `n` stocks ranked by change-percent in `direction`.
///
/// The sort is stable, so stocks with equal change keep their scrape order.
pub fn top_movers(stocks: &[StockRecord], n: usize, direction: Direction) -> Vec<StockRecord> {
    let mut ranked: Vec<&StockRecord> = stocks.iter().collect();
    match direction {
        Direction::Rise => ranked.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent)),
        Direction::Fall => ranked.sort_by(|a, b| a.change_percent.total_cmp(&b.change_percent)),
    }
    ranked.into_iter().take(n).cloned().collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn changes(stocks: &[StockRecord]) -> Vec<f64> {
    stocks.iter().map(|s| s.change_percent).collect()
}

/// Build the statistics block for one run.
#[instrument(level = "info", skip_all, fields(indices = indices.len(), risers = risers.len(), fallers = fallers.len(), news = news.len()))]
pub fn summarize(
    indices: &[IndexRecord],
    risers: &[StockRecord],
    fallers: &[StockRecord],
    news: &[NewsRecord],
    top_n: usize,
) -> MarketSummary {
    let index_changes: Vec<f64> = indices.iter().map(|i| i.change_percent).collect();
    let riser_changes = changes(risers);
    let faller_changes = changes(fallers);

    let summary = MarketSummary {
        index_count: indices.len(),
        riser_count: risers.len(),
        faller_count: fallers.len(),
        news_count: news.len(),
        mean_index_change: mean(&index_changes),
        median_index_change: median(&index_changes),
        mean_riser_change: mean(&riser_changes),
        median_riser_change: median(&riser_changes),
        mean_faller_change: mean(&faller_changes),
        median_faller_change: median(&faller_changes),
        max_rise: riser_changes.iter().copied().reduce(f64::max),
        max_fall: faller_changes.iter().copied().reduce(f64::min),
        top_risers: top_movers(risers, top_n, Direction::Rise),
        top_fallers: top_movers(fallers, top_n, Direction::Fall),
    };
    debug!(?summary.mean_index_change, ?summary.max_rise, ?summary.max_fall, "Computed market summary");
    summary
}
