//! JSON dump of the collected snapshot.
//!
//! The file sits next to the newsletter so the numbers behind a report can be
//! inspected or fed to other tools:
//!
//! ```text
//! output_directory/
//! ├── newsletter.md
//! ├── market_snapshot.json
//! ├── indices_performance.png
//! ├── top_rising.png
//! └── top_falling.png
//! ```

use crate::error::PipelineError;
use crate::models::MarketSnapshot;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const FILE_NAME: &str = "market_snapshot.json";

/// Write `snapshot` as pretty JSON into `dir`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_snapshot(snapshot: &MarketSnapshot, dir: &Path) -> Result<PathBuf, PipelineError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let path = dir.join(FILE_NAME);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote snapshot JSON");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, MarketSummary};
    use chrono::Local;

    #[tokio::test]
    async fn test_snapshot_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = MarketSnapshot {
            generated_at: Local::now(),
            indices: vec![],
            risers: vec![],
            fallers: vec![],
            news: vec![],
            summary: MarketSummary::default(),
            failed: vec![Dataset::MarketNews],
        };

        let path = write_snapshot(&snapshot, dir.path()).await.unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let back: MarketSnapshot = serde_json::from_str(&raw).unwrap();

        assert_eq!(back.failed, vec![Dataset::MarketNews]);
        assert!(raw.contains("\"market_news\""));
    }
}
