//! Collection stage: fetch, parse, and cache each dataset in turn.
//!
//! Every dataset goes through the same steps:
//! 1. serve from the cache when a fresh entry exists
//! 2. otherwise fetch the page through the retrying fetcher
//! 3. parse it with the [`MarketSource`]
//! 4. cache non-empty results
//!
//! A page that cannot be fetched yields an empty list and is recorded in
//! [`Collected::failed`]; it never aborts the run.

use crate::cache::DatasetCache;
use crate::fetcher::FetchPage;
use crate::models::{Dataset, Direction, IndexRecord, NewsRecord, StockRecord};
use crate::scrapers::{MarketSource, Parsed};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

/// Raw extractor output for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub indices: Vec<IndexRecord>,
    pub risers: Vec<StockRecord>,
    pub fallers: Vec<StockRecord>,
    pub news: Vec<NewsRecord>,
    /// Datasets whose page could not be fetched.
    pub failed: Vec<Dataset>,
    /// Datasets served from the cache.
    pub cached: Vec<Dataset>,
}

pub struct Collector<F> {
    fetcher: F,
    source: Box<dyn MarketSource>,
    cache: Option<DatasetCache>,
}

impl<F> Collector<F>
where
    F: FetchPage,
{
    pub fn new(fetcher: F, source: Box<dyn MarketSource>, cache: Option<DatasetCache>) -> Self {
        Self { fetcher, source, cache }
    }

    pub fn cache(&self) -> Option<&DatasetCache> {
        self.cache.as_ref()
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Collect all four datasets sequentially.
    #[instrument(level = "info", skip_all, fields(source = %self.source.name()))]
    pub async fn collect(&self) -> Collected {
        let mut out = Collected::default();

        out.indices = self
            .dataset(Dataset::MarketIndices, &self.source.index_url(), &mut out, |html| {
                self.source.parse_indices(html)
            })
            .await;

        for direction in [Direction::Rise, Direction::Fall] {
            let records = self
                .dataset(
                    Dataset::movers(direction),
                    &self.source.movers_url(direction),
                    &mut out,
                    |html| self.source.parse_movers(html),
                )
                .await;
            match direction {
                Direction::Rise => out.risers = records,
                Direction::Fall => out.fallers = records,
            }
        }

        out.news = self
            .dataset(Dataset::MarketNews, &self.source.news_url(), &mut out, |html| {
                self.source.parse_news(html)
            })
            .await;

        info!(
            indices = out.indices.len(),
            risers = out.risers.len(),
            fallers = out.fallers.len(),
            news = out.news.len(),
            failed = out.failed.len(),
            cached = out.cached.len(),
            "Collection finished"
        );
        out
    }

    async fn dataset<T, P>(&self, dataset: Dataset, url: &str, out: &mut Collected, parse: P) -> Vec<T>
    where
        T: Serialize + DeserializeOwned,
        P: FnOnce(&str) -> Parsed<T>,
    {
        let key = dataset.key();

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get::<Vec<T>>(key)) {
            out.cached.push(dataset);
            return cached;
        }

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(dataset = key, %url, error = %e, "Fetch failed; continuing without this dataset");
                out.failed.push(dataset);
                return Vec::new();
            }
        };

        let parsed = parse(&html);
        if parsed.skipped > 0 {
            warn!(dataset = key, skipped = parsed.skipped, "Skipped malformed records");
        }

        if let Some(cache) = &self.cache {
            if !parsed.records.is_empty() {
                if let Err(e) = cache.put(key, &parsed.records) {
                    warn!(dataset = key, error = %e, "Failed to cache dataset");
                }
            }
        }

        parsed.records
    }
}
