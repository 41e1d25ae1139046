//! The newsletter orchestrator.
//!
//! A [`Pipeline`] owns the configuration, the collector, and the generator and
//! runs one query at a time through
//!
//! ```text
//! Idle → Collecting → Cleaning → Visualizing → Generating → Done
//!                                                        ↘ Failed
//! ```
//!
//! `Failed` is reachable from any stage. Only a rejected query, a generation
//! failure, or an output write error get there; missing data never does.

use crate::analysis::summarize;
use crate::api::{AskAsync, GeminiClient, Prompt, RetryAsk};
use crate::cache::DatasetCache;
use crate::charts::{RenderedChart, chart_specs, render_charts};
use crate::collector::{Collected, Collector};
use crate::config::Config;
use crate::context::{ContextLimits, SYSTEM_INSTRUCTION, build_context, build_prompt};
use crate::error::{CacheError, PipelineError};
use crate::fetcher::{FetchPage, HttpFetcher, RetryFetch};
use crate::models::{Dataset, MarketSnapshot};
use crate::outputs::{json, markdown};
use crate::retry::Backoff;
use crate::scrapers::naver::NaverFinance;
use crate::utils::{matches_keywords, truncate_for_log};
use chrono::Local;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Collecting,
    Cleaning,
    Visualizing,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Collecting => "collecting",
            Stage::Cleaning => "cleaning",
            Stage::Visualizing => "visualizing",
            Stage::Generating => "generating",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub newsletter: String,
    pub document_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub charts: Vec<RenderedChart>,
    pub snapshot: MarketSnapshot,
    /// Datasets served from the cache instead of the network.
    pub cached: Vec<Dataset>,
}

/// Freshness of every dataset in an open cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatus {
    pub ttl_minutes: i64,
    /// Each dataset with whether a fresh entry exists.
    pub entries: Vec<(Dataset, bool)>,
}

/// Production wiring: reqwest fetcher and Gemini client, both retried.
pub type LivePipeline = Pipeline<RetryFetch<HttpFetcher>, RetryAsk<GeminiClient>>;

pub struct Pipeline<F, G> {
    config: Config,
    collector: Collector<F>,
    generator: G,
    stage: Stage,
}

impl LivePipeline {
    /// Build the live pipeline from configuration and an API key.
    ///
    /// The cache is opened only when `use_cache` is set and the configured
    /// duration is non-zero; if its directory cannot be created the run goes
    /// on without it.
    pub fn from_config(config: Config, api_key: &str, use_cache: bool) -> Result<Self, Box<dyn Error>> {
        let backoff = Backoff::new(config.max_retries as usize, config.retry_delay());
        info!(attempts = backoff.max_attempts(), timeout = ?config.fetch_timeout(), "Page fetch policy");
        let fetcher = RetryFetch::new(HttpFetcher::new(config.fetch_timeout())?, backoff);
        let source = NaverFinance::new(&config.source_base_url)?;

        let cache = if use_cache && config.cache_enabled() {
            match DatasetCache::new(&config.cache_directory, config.cache_duration()) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(error = %e, dir = %config.cache_directory.display(), "Cache unavailable; continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let generator = RetryAsk::new(
            GeminiClient::new(
                api_key,
                config.gemini_model.clone(),
                config.api_base_url.clone(),
                config.generation_timeout(),
            )?,
            config.generation_retries as usize,
            config.retry_delay(),
        );

        let collector = Collector::new(fetcher, Box::new(source), cache);
        Ok(Pipeline::new(config, collector, generator))
    }
}

impl<F, G> Pipeline<F, G>
where
    F: FetchPage,
    G: AskAsync,
{
    pub fn new(config: Config, collector: Collector<F>, generator: G) -> Self {
        info!(model = %config.gemini_model, output = %config.output_directory.display(), "Pipeline initialized");
        Self {
            config,
            collector,
            generator,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Delete cached datasets: one entry when `dataset` is given, else all.
    /// Returns the number of entries removed.
    ///
    /// Works even when this session runs without the cache, so entries left
    /// by earlier runs can still be dropped.
    pub fn clear_cache(&self, dataset: Option<Dataset>) -> Result<usize, CacheError> {
        let opened;
        let cache = match self.collector.cache() {
            Some(cache) => cache,
            None => {
                if !self.config.cache_directory.is_dir() {
                    return Ok(0);
                }
                opened = DatasetCache::new(&self.config.cache_directory, self.config.cache_duration())?;
                &opened
            }
        };

        let removed = match dataset {
            Some(dataset) => usize::from(cache.remove(dataset.key())?),
            None => cache.clear()?,
        };
        info!(removed, dataset = ?dataset.map(|d| d.key()), "Cache cleared");
        Ok(removed)
    }

    /// `None` when this session runs without the cache.
    pub fn cache_status(&self) -> Option<CacheStatus> {
        let cache = self.collector.cache()?;
        Some(CacheStatus {
            ttl_minutes: cache.duration().num_minutes(),
            entries: Dataset::ALL
                .into_iter()
                .map(|d| (d, cache.is_valid(d.key())))
                .collect(),
        })
    }

    /// Run one query end to end.
    #[instrument(level = "info", skip_all, fields(query = %truncate_for_log(query, 80)))]
    pub async fn process_query(&mut self, query: &str) -> Result<RunReport, PipelineError> {
        let t0 = Instant::now();
        self.stage = Stage::Idle;

        match self.run(query).await {
            Ok(report) => {
                self.transition(Stage::Done);
                info!(
                    elapsed_ms = t0.elapsed().as_millis(),
                    document = %report.document_path.display(),
                    charts = report.charts.len(),
                    "Query processed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(stage = %self.stage, error = %e, "Query failed");
                self.transition(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn run(&mut self, query: &str) -> Result<RunReport, PipelineError> {
        if !matches_keywords(query, &self.config.query_keywords) {
            return Err(PipelineError::RejectedQuery(
                "올바른 키워드를 입력해주세요. 예: \"오늘자 국내 시장\"".to_string(),
            ));
        }

        self.transition(Stage::Collecting);
        let collected = self.collector.collect().await;
        let cached = collected.cached.clone();

        self.transition(Stage::Cleaning);
        let snapshot = build_snapshot(collected, self.config.top_stocks_count);
        if snapshot.is_empty() {
            warn!("No market data collected; the newsletter will state that data is unavailable");
        }

        self.transition(Stage::Visualizing);
        let out_dir = self.config.output_directory.clone();
        tokio::fs::create_dir_all(&out_dir).await?;
        let charts = render_charts(&chart_specs(&snapshot, self.config.chart_top_count), &out_dir);

        self.transition(Stage::Generating);
        let limits = ContextLimits {
            max_stock_rows: self.config.top_stocks_count,
            max_news: self.config.news_count,
            max_chars: self.config.context_max_chars,
        };
        let context = build_context(&snapshot, &limits);
        let prompt = Prompt {
            system: SYSTEM_INSTRUCTION.to_string(),
            user: build_prompt(query, &context),
        };
        let newsletter = self.generator.ask(&prompt).await?;
        info!(preview = %truncate_for_log(&newsletter, 120), "Narrative generated");

        let document = markdown::render_document(&newsletter, &snapshot, &charts);
        let document_path = markdown::write_document(&out_dir, &document).await?;
        let snapshot_path = json::write_snapshot(&snapshot, &out_dir).await?;

        Ok(RunReport {
            newsletter: document,
            document_path,
            snapshot_path,
            charts,
            snapshot,
            cached,
        })
    }

    fn transition(&mut self, next: Stage) {
        info!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }
}

/// Turn raw collector output into the snapshot shared by later stages.
pub fn build_snapshot(collected: Collected, top_n: usize) -> MarketSnapshot {
    let summary = summarize(
        &collected.indices,
        &collected.risers,
        &collected.fallers,
        &collected.news,
        top_n,
    );
    MarketSnapshot {
        generated_at: Local::now(),
        indices: collected.indices,
        risers: collected.risers,
        fallers: collected.fallers,
        news: collected.news,
        summary,
        failed: collected.failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_DATA;
    use crate::error::GenerationError;
    use crate::fetcher::testing::{CannedFetcher, CannedServer, http_response};
    use crate::models::Direction;
    use crate::outputs::markdown::{NO_FALLERS, NO_NEWS};
    use crate::scrapers::MarketSource;
    use crate::scrapers::fixtures;
    use std::cell::RefCell;

    /// Records prompts and answers with a fixed reply.
    struct FakeGenerator {
        reply: Result<String, ()>,
        prompts: RefCell<Vec<Prompt>>,
    }

    impl FakeGenerator {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl AskAsync for FakeGenerator {
        async fn ask(&self, prompt: &Prompt) -> Result<String, GenerationError> {
            self.prompts.borrow_mut().push(prompt.clone());
            self.reply
                .clone()
                .map_err(|_| GenerationError::Auth("API key not valid".into()))
        }
    }

    fn config(dir: &tempfile::TempDir) -> Config {
        Config {
            output_directory: dir.path().join("out"),
            cache_directory: dir.path().join("cache"),
            cache_duration_minutes: 0,
            ..Config::default()
        }
    }

    fn pipeline(
        dir: &tempfile::TempDir,
        fetcher: CannedFetcher,
        generator: FakeGenerator,
    ) -> Pipeline<CannedFetcher, FakeGenerator> {
        let collector = Collector::new(fetcher, Box::new(NaverFinance::default()), None);
        Pipeline::new(config(dir), collector, generator)
    }

    #[tokio::test]
    async fn test_domestic_market_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let naver = NaverFinance::default();
        let fetcher = CannedFetcher::default()
            .with(naver.index_url(), fixtures::INDEX_PAGE)
            .with(naver.movers_url(Direction::Rise), fixtures::RISE_PAGE)
            .with(naver.news_url(), fixtures::CHANGED_LAYOUT_PAGE);
        let mut pipeline = pipeline(&dir, fetcher, FakeGenerator::replying("# 📈 오늘의 국내 주식 시장 리포트\n"));

        let report = pipeline.process_query("오늘자 국내 시장").await.unwrap();

        assert_eq!(pipeline.stage(), Stage::Done);
        let document = std::fs::read_to_string(&report.document_path).unwrap();
        assert!(document.starts_with("# 📈 오늘의 국내 주식 시장 리포트"));
        assert!(document.contains("- KOSPI: 2500.00 (+10.50, +0.42%)"));
        assert!(document.contains("- KOSDAQ: 850.00 (-5.20, -0.61%)"));
        assert!(document.contains("| 1 | SK하이닉스 | 142000 | +4.80 |"));
        assert!(document.contains("| 2 | 현대차 | 185000 | +3.90 |"));
        assert!(document.contains(NO_FALLERS));
        assert!(document.contains(NO_NEWS));

        assert_eq!(report.snapshot.indices.len(), 2);
        assert_eq!(report.snapshot.risers.len(), 2);
        assert!(report.snapshot.news.is_empty());
        assert_eq!(report.snapshot.failed, vec![Dataset::TopStocksFall]);
        assert!(report.snapshot_path.exists());

        let chart_files: Vec<String> = report
            .charts
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(chart_files, ["indices_performance.png", "top_rising.png"]);
        assert!(report.charts.iter().all(|c| c.path.exists()));

        let prompts = pipeline.generator.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].system, SYSTEM_INSTRUCTION);
        assert!(prompts[0].user.contains("사용자 질의: 오늘자 국내 시장"));
        assert!(prompts[0].user.contains(&format!("## 5. 주요 뉴스\n- {NO_DATA}")));
    }

    #[tokio::test]
    async fn test_nothing_collected_still_reaches_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir, CannedFetcher::default(), FakeGenerator::replying("본문"));

        let report = pipeline.process_query("오늘자 국내 시장").await.unwrap();

        assert_eq!(pipeline.stage(), Stage::Done);
        assert!(report.snapshot.is_empty());
        assert_eq!(report.snapshot.failed, Dataset::ALL.to_vec());
        assert!(report.charts.is_empty());

        let prompts = pipeline.generator.prompts.borrow();
        let user = &prompts[0].user;
        assert!(user.contains(&format!("## 1. 주요 지수 현황\n- {NO_DATA}")));
        assert!(user.contains(&format!("## 2. 상승률 상위 종목\n- {NO_DATA}")));
        assert!(user.contains(&format!("## 3. 하락률 상위 종목\n- {NO_DATA}")));
        assert!(report.newsletter.contains(markdown::NO_INDICES));
    }

    #[tokio::test]
    async fn test_generation_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir, CannedFetcher::default(), FakeGenerator::failing());

        let err = pipeline.process_query("오늘자 국내 시장").await.unwrap_err();

        assert!(matches!(err, PipelineError::Generation(GenerationError::Auth(_))));
        assert!(err.to_string().starts_with("generation failed"));
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(!dir.path().join("out").join(markdown::FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_off_topic_query_is_rejected_before_collection() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir, CannedFetcher::default(), FakeGenerator::replying("본문"));

        let err = pipeline.process_query("날씨 알려줘").await.unwrap_err();

        assert!(matches!(err, PipelineError::RejectedQuery(_)));
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(pipeline.collector_requests().is_empty());
        assert!(pipeline.generator.prompts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_recovers_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir, CannedFetcher::default(), FakeGenerator::replying("본문"));

        assert!(pipeline.process_query("날씨").await.is_err());
        assert!(pipeline.process_query("주식 시장 요약").await.is_ok());
        assert_eq!(pipeline.stage(), Stage::Done);
    }

    #[test]
    fn test_clear_cache_without_cache_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir, CannedFetcher::default(), FakeGenerator::replying("본문"));
        assert_eq!(pipeline.clear_cache(None).unwrap(), 0);
        assert!(pipeline.cache_status().is_none());
    }

    #[test]
    fn test_clear_cache_removes_files_when_session_cache_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let earlier = DatasetCache::new(dir.path().join("cache"), chrono::Duration::minutes(30)).unwrap();
        earlier.put(Dataset::MarketIndices.key(), &vec!["KOSPI"]).unwrap();
        earlier.put(Dataset::MarketNews.key(), &vec!["headline"]).unwrap();
        let pipeline = pipeline(&dir, CannedFetcher::default(), FakeGenerator::replying("본문"));

        assert_eq!(pipeline.clear_cache(Some(Dataset::MarketNews)).unwrap(), 1);
        assert!(!earlier.is_valid(Dataset::MarketNews.key()));
        assert!(earlier.is_valid(Dataset::MarketIndices.key()));

        assert_eq!(pipeline.clear_cache(None).unwrap(), 1);
        assert!(!earlier.is_valid(Dataset::MarketIndices.key()));
    }

    #[tokio::test]
    async fn test_cache_status_reports_fresh_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let naver = NaverFinance::default();
        let fetcher = CannedFetcher::default().with(naver.index_url(), fixtures::INDEX_PAGE);
        let cache = DatasetCache::new(dir.path().join("cache"), chrono::Duration::minutes(30)).unwrap();
        let collector = Collector::new(fetcher, Box::new(naver), Some(cache));
        let mut pipeline = Pipeline::new(config(&dir), collector, FakeGenerator::replying("본문"));

        pipeline.process_query("오늘자 국내 시장").await.unwrap();
        let status = pipeline.cache_status().unwrap();

        assert_eq!(status.ttl_minutes, 30);
        assert_eq!(
            status.entries,
            vec![
                (Dataset::MarketIndices, true),
                (Dataset::TopStocksRise, false),
                (Dataset::TopStocksFall, false),
                (Dataset::MarketNews, false),
            ]
        );
        assert_eq!(pipeline.clear_cache(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_live_pipeline_against_failing_services() {
        let dir = tempfile::tempdir().unwrap();
        let mut responses = vec![http_response(503, "unavailable"); 4 * 3];
        responses.push(http_response(
            401,
            r#"{"error":{"code":401,"message":"API key not valid","status":"UNAUTHENTICATED"}}"#,
        ));
        let server = CannedServer::start(responses).await;
        let config = Config {
            source_base_url: server.base_url.clone(),
            api_base_url: format!("{}/v1beta", server.base_url),
            retry_delay_ms: 0,
            max_retries: 3,
            ..config(&dir)
        };
        let mut pipeline = LivePipeline::from_config(config, "test-key", true).unwrap();

        let err = pipeline.process_query("오늘자 국내 시장").await.unwrap_err();

        assert!(matches!(err, PipelineError::Generation(GenerationError::Auth(_))));
        assert_eq!(pipeline.stage(), Stage::Failed);

        let requests = server.requests();
        assert_eq!(requests.len(), 13);
        assert_eq!(requests.iter().filter(|r| r.starts_with("GET /sise/ ")).count(), 3);
        assert_eq!(requests.iter().filter(|r| r.starts_with("GET /news/mainnews.naver ")).count(), 3);
        assert!(requests[12].starts_with("POST /v1beta/models/"));
        assert!(requests[12].to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(!dir.path().join("out").join(markdown::FILE_NAME).exists());
    }

    #[test]
    fn test_live_pipeline_builds_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_directory: dir.path().join("cache"),
            ..config(&dir)
        };
        let pipeline = LivePipeline::from_config(config, "test-key", true);
        assert!(pipeline.is_ok());
    }

    impl Pipeline<CannedFetcher, FakeGenerator> {
        fn collector_requests(&self) -> Vec<String> {
            self.collector.fetcher().requests.borrow().clone()
        }
    }
}
