//! # Market Newsletter
//!
//! Builds a Korean-language daily stock-market newsletter from Naver Finance.
//!
//! ## Features
//!
//! - Scrapes KOSPI/KOSDAQ/KOSPI 200 indices, the top rising and falling
//!   stocks, and the main market news
//! - Caches each dataset on disk for a configurable number of minutes
//! - Renders bar charts for indices and top movers
//! - Asks Gemini to write the newsletter from a bounded text context
//! - Writes `newsletter.md`, `market_snapshot.json`, and the chart PNGs
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... market_newsletter --query "오늘자 국내 시장"
//! ```
//!
//! Without `--query` the program reads queries from stdin until `exit`.
//! `cache status` shows which datasets are fresh; `cache clear [dataset]`
//! deletes cached entries.
//!
//! ## Architecture
//!
//! 1. **Collecting**: fetch and parse the four datasets (cache first)
//! 2. **Cleaning**: rank movers and compute summary statistics
//! 3. **Visualizing**: render up to three charts
//! 4. **Generating**: build the context, call the model, write outputs

use clap::Parser;
use std::error::Error;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod api;
mod cache;
mod charts;
mod cli;
mod collector;
mod config;
mod context;
mod error;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod retry;
mod scrapers;
mod utils;

use cli::Cli;
use config::Config;
use models::Dataset;
use pipeline::{LivePipeline, RunReport};
use utils::ensure_writable_dir;

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "종료"];
const CLEAR_CACHE_COMMAND: &str = "cache clear";
const CACHE_STATUS_COMMAND: &str = "cache status";

/// One line of console input.
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Skip,
    Exit,
    /// `cache clear` or `cache clear <dataset>`.
    ClearCache(Option<Dataset>),
    UnknownDataset(&'a str),
    CacheStatus,
    Query(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Skip;
    }
    if EXIT_COMMANDS.iter().any(|c| line.eq_ignore_ascii_case(c)) {
        return Command::Exit;
    }
    if line.eq_ignore_ascii_case(CACHE_STATUS_COMMAND) {
        return Command::CacheStatus;
    }
    let lower = line.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix(CLEAR_CACHE_COMMAND) {
        let key = rest.trim();
        if key.is_empty() {
            return Command::ClearCache(None);
        }
        if rest.starts_with(char::is_whitespace) {
            return match Dataset::from_key(key) {
                Some(dataset) => Command::ClearCache(Some(dataset)),
                None => Command::UnknownDataset(line[CLEAR_CACHE_COMMAND.len()..].trim()),
            };
        }
    }
    Command::Query(line)
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("market_newsletter starting up");

    let args = Cli::parse();
    debug!(config = %args.config.display(), ?args.output_dir, ?args.model, "Parsed CLI arguments");

    // ---- Config ----
    let mut config = Config::load(&args.config);
    if let Some(dir) = args.output_dir.clone() {
        config.output_directory = dir;
    }
    if let Some(model) = args.model.clone() {
        config.gemini_model = model;
    }
    if args.save_config {
        match config.save(&args.config) {
            Ok(()) => info!(path = %args.config.display(), "Saved effective configuration"),
            Err(e) => warn!(path = %args.config.display(), error = %e, "Failed to save configuration"),
        }
    }

    if let Err(e) = ensure_writable_dir(&config.output_directory).await {
        error!(
            path = %config.output_directory.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let api_key = match args.api_key.clone().filter(|k| !k.trim().is_empty()) {
        Some(key) => key,
        None => match prompt_line(&mut stdin, "Gemini API 키를 입력하세요: ").await? {
            Some(key) if !key.is_empty() => key,
            _ => return Err("Gemini API key is required (--api-key or GEMINI_API_KEY)".into()),
        },
    };

    let mut pipeline = LivePipeline::from_config(config, &api_key, !args.no_cache)?;

    match args.query.as_deref() {
        Some(query) => {
            let report = pipeline.process_query(query).await?;
            print_report(&report);
        }
        None => interactive(&mut pipeline, &mut stdin).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Read queries until an exit command or end of input.
async fn interactive(
    pipeline: &mut LivePipeline,
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Result<(), Box<dyn Error>> {
    println!("국내 주식 시장 뉴스레터 생성기");
    println!(
        "모델: {} / 출력 폴더: {}",
        pipeline.config().gemini_model,
        pipeline.config().output_directory.display()
    );
    println!("예: \"오늘자 국내 시장\" / 'cache status' / 'cache clear [데이터셋]' / 'exit' 로 종료");

    while let Some(line) = prompt_line(stdin, "\n질의> ").await? {
        match parse_command(&line) {
            Command::Skip => continue,
            Command::Exit => break,
            Command::ClearCache(dataset) => match pipeline.clear_cache(dataset) {
                Ok(0) => println!("삭제할 캐시가 없습니다."),
                Ok(n) => println!("캐시를 비웠습니다 ({n}개 항목 삭제)."),
                Err(e) => println!("캐시 삭제 실패: {e}"),
            },
            Command::UnknownDataset(key) => {
                let known: Vec<&str> = Dataset::ALL.iter().map(|d| d.key()).collect();
                println!("알 수 없는 데이터셋: {key} (가능한 값: {})", known.join(", "));
            }
            Command::CacheStatus => match pipeline.cache_status() {
                Some(status) => {
                    println!("캐시 유효 시간: {}분", status.ttl_minutes);
                    for (dataset, fresh) in status.entries {
                        println!("- {dataset}: {}", if fresh { "유효" } else { "없음/만료" });
                    }
                }
                None => println!("이 세션에서는 캐시가 비활성화되어 있습니다."),
            },
            Command::Query(query) => {
                println!("데이터 수집 및 뉴스레터 생성 중...");
                match pipeline.process_query(query).await {
                    Ok(report) => print_report(&report),
                    Err(e) => println!("오류: {e}"),
                }
                debug!(stage = %pipeline.stage(), "Query finished");
            }
        }
    }

    println!("프로그램을 종료합니다.");
    Ok(())
}

async fn prompt_line(
    stdin: &mut Lines<BufReader<Stdin>>,
    prompt: &str,
) -> Result<Option<String>, Box<dyn Error>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(stdin.next_line().await?.map(|line| line.trim().to_string()))
}

fn print_report(report: &RunReport) {
    let summary = &report.snapshot.summary;

    println!("\n{}", report.newsletter);
    println!("---");
    println!(
        "지수 {}개 · 상승 {}개 · 하락 {}개 · 뉴스 {}건",
        summary.index_count, summary.riser_count, summary.faller_count, summary.news_count
    );
    if let Some(max) = summary.max_rise {
        println!("최대 상승률: {max:+.2}%");
    }
    if let Some(min) = summary.max_fall {
        println!("최대 하락률: {min:+.2}%");
    }
    if !report.snapshot.failed.is_empty() {
        let failed: Vec<&str> = report.snapshot.failed.iter().map(|d| d.key()).collect();
        println!("수집 실패: {}", failed.join(", "));
    }
    if !report.cached.is_empty() {
        println!("캐시 사용: {}개 데이터셋", report.cached.len());
    }
    for chart in &report.charts {
        println!("차트: {} ({})", chart.title, chart.path.display());
    }
    println!("뉴스레터: {}", report.document_path.display());
    println!("스냅샷: {}", report.snapshot_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exit_and_blank() {
        assert_eq!(parse_command("  "), Command::Skip);
        assert_eq!(parse_command("EXIT"), Command::Exit);
        assert_eq!(parse_command("종료"), Command::Exit);
    }

    #[test]
    fn test_parse_cache_commands() {
        assert_eq!(parse_command("cache clear"), Command::ClearCache(None));
        assert_eq!(
            parse_command("cache clear market_news"),
            Command::ClearCache(Some(Dataset::MarketNews))
        );
        assert_eq!(parse_command("cache clear kospi"), Command::UnknownDataset("kospi"));
        assert_eq!(parse_command("Cache Status"), Command::CacheStatus);
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_command(" 오늘자 국내 시장 "), Command::Query("오늘자 국내 시장"));
        assert_eq!(parse_command("cache clearing"), Command::Query("cache clearing"));
    }
}
