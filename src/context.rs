//! Prompt context for the narrative generator.
//!
//! [`build_context`] renders a snapshot as Markdown-ish sections the model can
//! cite. The block is bounded: mover and news sections are capped by row
//! count and the whole text by characters. Empty datasets are spelled out
//! with [`NO_DATA`] so the model never has to guess.

use crate::models::{Dataset, Direction, IndexRecord, MarketSnapshot, NewsRecord, StockRecord};
use std::fmt::Write;

/// Marker placed in any section whose dataset is empty.
pub const NO_DATA: &str = "데이터 없음";

/// Marker appended when the context was cut to fit the character budget.
pub const TRUNCATED: &str = "…(이하 생략)";

/// Fixed instruction sent ahead of every request.
pub const SYSTEM_INSTRUCTION: &str = r#"당신은 금융 전문 애널리스트입니다. 제공된 데이터만을 근거로 전문적이면서도 이해하기 쉬운 국내 주식 시장 뉴스레터를 Markdown 형식으로 작성합니다.

작성 원칙:
- 컨텍스트에 없는 수치는 만들어내지 않습니다.
- 어떤 항목이 "데이터 없음"으로 표시되어 있으면 해당 섹션에서 데이터를 확인할 수 없었다고 명시합니다.
- 전문적이면서도 친근한 톤을 유지하고 구체적인 수치를 인용합니다.

다음 구성을 따릅니다:
# 📈 오늘의 국내 주식 시장 리포트
## 🎯 시장 개요 (Market Overview)
## 📊 주요 지수 동향
## 🚀 주목할 상승 종목
## 📉 하락 종목 분석
## 💡 투자 인사이트
## 📰 주요 뉴스 요약"#;

/// Limits applied while building the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_stock_rows: usize,
    pub max_news: usize,
    pub max_chars: usize,
}

/// Render `snapshot` into a bounded context block.
pub fn build_context(snapshot: &MarketSnapshot, limits: &ContextLimits) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# 주식 시장 데이터 컨텍스트 (기준: {})\n",
        snapshot.generated_at.format("%Y년 %m월 %d일 %H:%M")
    );

    out.push_str("## 1. 주요 지수 현황\n");
    out.push_str(&format_indices(&snapshot.indices));

    out.push_str("\n## 2. 상승률 상위 종목\n");
    out.push_str(&format_stocks(
        &snapshot.summary.top_risers,
        snapshot.movers(Direction::Rise).len(),
        limits.max_stock_rows,
    ));

    out.push_str("\n## 3. 하락률 상위 종목\n");
    out.push_str(&format_stocks(
        &snapshot.summary.top_fallers,
        snapshot.movers(Direction::Fall).len(),
        limits.max_stock_rows,
    ));

    out.push_str("\n## 4. 시장 통계 요약\n");
    out.push_str(&format_summary(snapshot));

    out.push_str("\n## 5. 주요 뉴스\n");
    out.push_str(&format_news(&snapshot.news, limits.max_news));

    if !snapshot.failed.is_empty() {
        let failed: Vec<&str> = snapshot.failed.iter().map(Dataset::key).collect();
        let _ = writeln!(out, "\n(수집 실패: {})", failed.join(", "));
    }

    truncate_chars(&out, limits.max_chars)
}

/// Assemble the user turn: context followed by the reader's question.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!("사용자 질의: {query}\n\n---\n\n{context}\n\n---\n\n위 데이터를 바탕으로 뉴스레터를 작성해주세요.")
}

pub fn format_indices(indices: &[IndexRecord]) -> String {
    if indices.is_empty() {
        return format!("- {NO_DATA}\n");
    }
    indices
        .iter()
        .map(|i| {
            format!(
                "- {}: {:.2} ({:+.2}, {:+.2}%)\n",
                i.name, i.value, i.change_value, i.change_percent
            )
        })
        .collect()
}

/// Numbered list of `ranked`, capped at `cap` rows. `total` is the size of the
/// unranked list so the omitted count stays accurate.
fn format_stocks(ranked: &[StockRecord], total: usize, cap: usize) -> String {
    if ranked.is_empty() {
        return format!("- {NO_DATA}\n");
    }
    let mut out = String::new();
    for (rank, stock) in ranked.iter().take(cap).enumerate() {
        let _ = writeln!(
            out,
            "{}. {}{} | 현재가 {:.0}원 | 등락률 {:+.2}%",
            rank + 1,
            stock.name,
            stock.code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default(),
            stock.price,
            stock.change_percent
        );
    }
    let shown = ranked.len().min(cap);
    if total > shown {
        let _ = writeln!(out, "… 외 {}개 종목 생략", total - shown);
    }
    out
}

fn format_summary(snapshot: &MarketSnapshot) -> String {
    let s = &snapshot.summary;
    let pct = |v: Option<f64>| v.map(|v| format!("{v:+.2}%")).unwrap_or_else(|| NO_DATA.to_string());
    let mut out = String::new();
    let _ = writeln!(out, "- 평균 지수 등락률: {}", pct(s.mean_index_change));
    let _ = writeln!(out, "- 지수 등락률 중앙값: {}", pct(s.median_index_change));
    let _ = writeln!(out, "- 최대 상승률: {}", pct(s.max_rise));
    let _ = writeln!(out, "- 최대 하락률: {}", pct(s.max_fall));
    let _ = writeln!(out, "- 상승 종목 평균 등락률: {}", pct(s.mean_riser_change));
    let _ = writeln!(out, "- 하락 종목 평균 등락률: {}", pct(s.mean_faller_change));
    let _ = writeln!(out, "- 상승 종목 수: {}개", s.riser_count);
    let _ = writeln!(out, "- 하락 종목 수: {}개", s.faller_count);
    out
}

fn format_news(news: &[NewsRecord], cap: usize) -> String {
    if news.is_empty() {
        return format!("- {NO_DATA}\n");
    }
    let mut out = String::new();
    for item in news.iter().take(cap) {
        match &item.summary {
            Some(summary) => {
                let _ = writeln!(out, "- {}: {}", item.headline, summary);
            }
            None => {
                let _ = writeln!(out, "- {}", item.headline);
            }
        }
    }
    if news.len() > cap {
        let _ = writeln!(out, "… 외 {}건 생략", news.len() - cap);
    }
    out
}

/// Cut `s` to at most `max` characters, marking the cut.
///
/// A budget too small to hold the marker gets a bare cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let marker = TRUNCATED.chars().count();
    if max <= marker {
        return s.chars().take(max).collect();
    }
    let keep = max - marker;
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(TRUNCATED);
    out
}
