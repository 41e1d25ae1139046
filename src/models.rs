//! Data models for scraped market data and the per-run snapshot.
//!
//! This module defines the core data structures passed between stages:
//! - [`IndexRecord`], [`StockRecord`], [`NewsRecord`]: typed rows produced by
//!   the extractors
//! - [`MarketSummary`]: statistics computed by [`crate::analysis`]
//! - [`MarketSnapshot`]: everything one query run collected, owned by the
//!   pipeline and lent to each stage
//!
//! Records serialize with serde so the cache and the JSON dump can store them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One market index reading, e.g. KOSPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Display name of the index.
    pub name: String,
    /// Current index level.
    pub value: f64,
    /// Absolute change since the previous close (signed).
    pub change_value: f64,
    /// Percentage change since the previous close (signed).
    pub change_percent: f64,
}

/// One row of a rising/falling ranking page.
///
/// The rank is the record's position in its list and is not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub name: String,
    /// Ticker code when the ranking row links to it.
    pub code: Option<String>,
    pub price: f64,
    pub change_percent: f64,
}

/// A market headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub headline: String,
    pub summary: Option<String>,
    /// Publishing outlet, e.g. "연합뉴스".
    pub press: Option<String>,
    /// Timestamp text exactly as the portal printed it.
    pub published_at: Option<String>,
    pub url: Option<String>,
}

/// Which way a mover list is ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Largest positive change first.
    Rise,
    /// Largest negative change first.
    Fall,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rise => "rise",
            Direction::Fall => "fall",
        }
    }
}

/// The logical datasets a run collects. Each doubles as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    MarketIndices,
    TopStocksRise,
    TopStocksFall,
    MarketNews,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Dataset::MarketIndices,
        Dataset::TopStocksRise,
        Dataset::TopStocksFall,
        Dataset::MarketNews,
    ];

    pub fn movers(direction: Direction) -> Self {
        match direction {
            Direction::Rise => Dataset::TopStocksRise,
            Direction::Fall => Dataset::TopStocksFall,
        }
    }

    /// Inverse of [`key`](Self::key).
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }

    /// Stable key used for cache files and log fields.
    pub fn key(&self) -> &'static str {
        match self {
            Dataset::MarketIndices => "market_indices",
            Dataset::TopStocksRise => "top_stocks_rise",
            Dataset::TopStocksFall => "top_stocks_fall",
            Dataset::MarketNews => "market_news",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Statistics block derived from the raw record lists.
///
/// Averages are `None` when the underlying list is empty so that consumers
/// can say "no data" instead of printing a fabricated zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSummary {
    pub index_count: usize,
    pub riser_count: usize,
    pub faller_count: usize,
    pub news_count: usize,
    pub mean_index_change: Option<f64>,
    pub median_index_change: Option<f64>,
    pub mean_riser_change: Option<f64>,
    pub median_riser_change: Option<f64>,
    pub mean_faller_change: Option<f64>,
    pub median_faller_change: Option<f64>,
    /// Highest change-percent among risers.
    pub max_rise: Option<f64>,
    /// Lowest change-percent among fallers.
    pub max_fall: Option<f64>,
    /// Top-N risers, change-percent descending, ties in scrape order.
    pub top_risers: Vec<StockRecord>,
    /// Top-N fallers, change-percent ascending, ties in scrape order.
    pub top_fallers: Vec<StockRecord>,
}

/// Everything one query run collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub generated_at: DateTime<Local>,
    pub indices: Vec<IndexRecord>,
    /// Risers in scrape order.
    pub risers: Vec<StockRecord>,
    /// Fallers in scrape order.
    pub fallers: Vec<StockRecord>,
    pub news: Vec<NewsRecord>,
    pub summary: MarketSummary,
    /// Datasets whose page could not be fetched this run.
    pub failed: Vec<Dataset>,
}

impl MarketSnapshot {
    pub fn movers(&self, direction: Direction) -> &[StockRecord] {
        match direction {
            Direction::Rise => &self.risers,
            Direction::Fall => &self.fallers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
            && self.risers.is_empty()
            && self.fallers.is_empty()
            && self.news.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_keys_are_unique() {
        let keys: Vec<&str> = Dataset::ALL.iter().map(|d| d.key()).collect();
        assert_eq!(
            keys,
            ["market_indices", "top_stocks_rise", "top_stocks_fall", "market_news"]
        );
    }

    #[test]
    fn test_dataset_from_key() {
        for dataset in Dataset::ALL {
            assert_eq!(Dataset::from_key(dataset.key()), Some(dataset));
        }
        assert_eq!(Dataset::from_key("kospi"), None);
    }

    #[test]
    fn test_dataset_for_direction() {
        assert_eq!(Dataset::movers(Direction::Rise), Dataset::TopStocksRise);
        assert_eq!(Dataset::movers(Direction::Fall), Dataset::TopStocksFall);
        assert_eq!(Dataset::TopStocksFall.to_string(), "top_stocks_fall");
    }

    #[test]
    fn test_stock_record_deserialization() {
        let json = r#"{"name":"삼성전자","code":"005930","price":75000.0,"change_percent":5.2}"#;
        let stock: StockRecord = serde_json::from_str(json).unwrap();
        assert_eq!(stock.name, "삼성전자");
        assert_eq!(stock.code.as_deref(), Some("005930"));
        assert_eq!(stock.change_percent, 5.2);
    }

    #[test]
    fn test_snapshot_movers_and_emptiness() {
        let snapshot = MarketSnapshot {
            generated_at: Local::now(),
            indices: vec![],
            risers: vec![StockRecord {
                name: "현대차".into(),
                code: None,
                price: 185000.0,
                change_percent: 3.9,
            }],
            fallers: vec![],
            news: vec![],
            summary: MarketSummary::default(),
            failed: vec![Dataset::MarketNews],
        };

        assert_eq!(snapshot.movers(Direction::Rise).len(), 1);
        assert!(snapshot.movers(Direction::Fall).is_empty());
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_summary_default_has_no_averages() {
        let summary = MarketSummary::default();
        assert_eq!(summary.mean_index_change, None);
        assert!(summary.top_risers.is_empty());
    }
}
