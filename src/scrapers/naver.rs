//! Naver Finance scraper.
//!
//! Reads the desktop pages of [Naver Finance](https://finance.naver.com). The
//! pages are server-rendered tables, so plain CSS selectors are enough.
//!
//! # Selectors
//!
//! | Page | Rows | Fields |
//! |------|------|--------|
//! | `/sise/` | `#{ID}_now`, `#{ID}_change` | value, "change +pct%" |
//! | `/sise/sise_rise.naver`, `/sise/sise_fall.naver` | `table.type_2 tr` with `td.no` | `a.tltle`, `td.number` ×3 |
//! | `/news/mainnews.naver` | `ul.newsList li` | `.articleSubject a`, `.articleSummary`, `span.press`, `span.wdate` |

use super::{MarketSource, Parsed, parse_number};
use crate::models::{Direction, IndexRecord, NewsRecord, StockRecord};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Indices shown on `/sise/`: display name and element id prefix.
const INDICES: [(&str, &str); 3] = [("KOSPI", "KOSPI"), ("KOSDAQ", "KOSDAQ"), ("KOSPI200", "KPI200")];

static INDEX_SELECTORS: Lazy<Vec<(&'static str, Selector, Selector)>> = Lazy::new(|| {
    INDICES
        .iter()
        .map(|(name, id)| {
            (
                *name,
                Selector::parse(&format!("#{id}_now")).expect("index value selector"),
                Selector::parse(&format!("#{id}_change")).expect("index change selector"),
            )
        })
        .collect()
});

static RANK_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("table.type_2 tr").expect("row selector"));
static RANK_NO: Lazy<Selector> = Lazy::new(|| Selector::parse("td.no").expect("rank selector"));
static STOCK_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.tltle").expect("name selector"));
static NUMBER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td.number").expect("number selector"));

static NEWS_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.newsList li").expect("news selector"));
static NEWS_SUBJECT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".articleSubject a").expect("subject selector"));
static NEWS_SUMMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".articleSummary").expect("summary selector"));
static NEWS_PRESS: Lazy<Selector> = Lazy::new(|| Selector::parse("span.press").expect("press selector"));
static NEWS_DATE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.wdate").expect("date selector"));

/// "10.50 +0.42%" → change and percent.
static INDEX_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<chg>[\d,]+(?:\.\d+)?)\s*(?P<pct>[+-]?[\d,]+(?:\.\d+)?)%").expect("change regex")
});
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+-]?[\d,]+(?:\.\d+)?%").expect("percent regex"));

/// [`MarketSource`] for Naver Finance.
#[derive(Debug, Clone)]
pub struct NaverFinance {
    base_url: Url,
}

impl NaverFinance {
    pub const DEFAULT_BASE_URL: &'static str = "https://finance.naver.com";

    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    fn page(&self, path: &str) -> String {
        self.base_url
            .join(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, path))
    }

    fn resolve(&self, href: &str) -> Option<Url> {
        self.base_url.join(href).ok()
    }
}

impl Default for NaverFinance {
    fn default() -> Self {
        Self {
            base_url: Url::parse(&format!("{}/", Self::DEFAULT_BASE_URL)).expect("static base url"),
        }
    }
}

impl MarketSource for NaverFinance {
    fn name(&self) -> &str {
        "naver"
    }

    fn index_url(&self) -> String {
        self.page("sise/")
    }

    fn movers_url(&self, direction: Direction) -> String {
        match direction {
            Direction::Rise => self.page("sise/sise_rise.naver"),
            Direction::Fall => self.page("sise/sise_fall.naver"),
        }
    }

    fn news_url(&self) -> String {
        self.page("news/mainnews.naver")
    }

    #[instrument(level = "debug", skip_all)]
    fn parse_indices(&self, html: &str) -> Parsed<IndexRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();
        let mut skipped = 0;

        for (name, now_sel, change_sel) in INDEX_SELECTORS.iter() {
            let value = document
                .select(now_sel)
                .next()
                .and_then(|el| parse_number(&element_text(&el)));
            let change = document
                .select(change_sel)
                .next()
                .and_then(|el| parse_index_change(&element_text(&el)));

            match (value, change) {
                (Some(value), Some((change_value, change_percent))) => records.push(IndexRecord {
                    name: name.to_string(),
                    value,
                    change_value,
                    change_percent,
                }),
                _ => {
                    debug!(index = name, "Index block missing or malformed; skipping");
                    skipped += 1;
                }
            }
        }

        report("indices", records.len(), skipped);
        Parsed::new(records, skipped)
    }

    #[instrument(level = "debug", skip_all)]
    fn parse_movers(&self, html: &str) -> Parsed<StockRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();
        let mut skipped = 0;

        for row in document.select(&RANK_ROW) {
            // Header, blank and divider rows carry no rank cell.
            if row.select(&RANK_NO).next().is_none() {
                continue;
            }

            match self.parse_mover_row(&row) {
                Some(record) => records.push(record),
                None => {
                    debug!(row = %collapse_whitespace(&element_text(&row)), "Malformed ranking row; skipping");
                    skipped += 1;
                }
            }
        }

        report("movers", records.len(), skipped);
        Parsed::new(records, skipped)
    }

    #[instrument(level = "debug", skip_all)]
    fn parse_news(&self, html: &str) -> Parsed<NewsRecord> {
        let document = Html::parse_document(html);
        let mut parsed = Vec::new();
        let mut skipped = 0;

        for item in document.select(&NEWS_ITEM) {
            let Some(link) = item.select(&NEWS_SUBJECT).next() else {
                skipped += 1;
                continue;
            };
            let headline = collapse_whitespace(&element_text(&link));
            if headline.is_empty() {
                skipped += 1;
                continue;
            }

            let summary_el = item.select(&NEWS_SUMMARY).next();
            parsed.push(NewsRecord {
                headline,
                summary: summary_el.map(|el| own_text(&el)).filter(|s| !s.is_empty()),
                press: first_text(&item, &NEWS_PRESS),
                published_at: first_text(&item, &NEWS_DATE),
                url: link
                    .value()
                    .attr("href")
                    .and_then(|href| self.resolve(href))
                    .map(|u| u.to_string()),
            });
        }

        let before = parsed.len();
        let records: Vec<NewsRecord> = parsed
            .into_iter()
            .unique_by(|n| n.headline.clone())
            .collect();
        if records.len() < before {
            debug!(duplicates = before - records.len(), "Dropped duplicate headlines");
        }

        report("news", records.len(), skipped);
        Parsed::new(records, skipped)
    }
}

impl NaverFinance {
    fn parse_mover_row(&self, row: &ElementRef) -> Option<StockRecord> {
        let link = row.select(&STOCK_LINK).next()?;
        let name = collapse_whitespace(&element_text(&link));
        if name.is_empty() {
            return None;
        }
        let code = link
            .value()
            .attr("href")
            .and_then(|href| self.resolve(href))
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "code")
                    .map(|(_, v)| v.into_owned())
            });

        let cells: Vec<ElementRef> = row.select(&NUMBER_CELL).collect();
        let price = cells.first().and_then(|c| parse_number(&element_text(c)))?;
        let change_percent = cells
            .get(2)
            .map(element_text)
            .and_then(|text| PERCENT.find(&text).and_then(|m| parse_number(m.as_str())))?;

        Some(StockRecord {
            name,
            code,
            price,
            change_percent,
        })
    }
}

/// Split "10.50 +0.42%하락" into signed (change, percent).
fn parse_index_change(text: &str) -> Option<(f64, f64)> {
    let caps = INDEX_CHANGE.captures(text)?;
    let change = parse_number(caps.name("chg")?.as_str())?.abs();
    let raw_pct = caps.name("pct")?.as_str();
    let pct = parse_number(raw_pct)?;

    let falling = raw_pct.starts_with('-') || (text.contains("하락") && pct > 0.0);
    if falling {
        Some((-change, -pct.abs()))
    } else {
        Some((change, pct))
    }
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Text nodes directly under `el`, ignoring nested elements such as the press span.
fn own_text(el: &ElementRef) -> String {
    let joined = el
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .join(" ");
    collapse_whitespace(&joined)
}

fn first_text(scope: &ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| collapse_whitespace(&element_text(&el)))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

fn report(page: &str, count: usize, skipped: usize) {
    if count == 0 {
        warn!(page, skipped, "No records extracted; page markup may have changed");
    } else {
        info!(page, count, skipped, "Extracted records");
    }
}
