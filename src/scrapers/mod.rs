//! Market data sources.
//!
//! A [`MarketSource`] knows where a portal publishes each dataset and how to
//! read its markup. Everything downstream only sees typed records, so another
//! portal can be supported by adding a module here without touching analysis,
//! charts, or generation.
//!
//! # Supported Sources
//!
//! | Source | Module | Pages |
//! |--------|--------|-------|
//! | Naver Finance | [`naver`] | `/sise/`, `/sise/sise_rise.naver`, `/sise/sise_fall.naver`, `/news/mainnews.naver` |
//!
//! # Failure model
//!
//! Parsers never fail as a whole. A row whose shape does not match is skipped
//! and counted in [`Parsed::skipped`]; a page whose markup changed entirely
//! simply yields no records, which the collector reports.

use crate::models::{Direction, IndexRecord, NewsRecord, StockRecord};

pub mod naver;

#[cfg(test)]
pub(crate) mod fixtures;

/// Records extracted from one page plus the number of rows that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> Parsed<T> {
    pub fn new(records: Vec<T>, skipped: usize) -> Self {
        Self { records, skipped }
    }
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self::new(Vec::new(), 0)
    }
}

/// Page locations and parsers for one market portal.
pub trait MarketSource {
    /// Short name for log fields.
    fn name(&self) -> &str;

    fn index_url(&self) -> String;
    fn movers_url(&self, direction: Direction) -> String;
    fn news_url(&self) -> String;

    fn parse_indices(&self, html: &str) -> Parsed<IndexRecord>;
    fn parse_movers(&self, html: &str) -> Parsed<StockRecord>;
    fn parse_news(&self, html: &str) -> Parsed<NewsRecord>;
}

/// Parse a number the way portals print them: `"2,500.12"`, `"+0.42"`, `"-1,200"`.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '+') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
