//! Command-line interface for the market newsletter.
//!
//! Flags override values loaded from the JSON config file. The API key can also
//! come from the `GEMINI_API_KEY` environment variable.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Interactive session with the default config.json
/// market_newsletter
///
/// # One-shot run into a custom directory, bypassing the cache
/// market_newsletter --query "오늘자 국내 시장" -o ./newsletter --no-cache
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the JSON config file (missing file means defaults)
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Output directory for the newsletter, snapshot, and charts
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Gemini model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Run a single query and exit instead of starting the prompt loop
    #[arg(short, long)]
    pub query: Option<String>,

    /// Ignore the dataset cache for this session
    #[arg(long)]
    pub no_cache: bool,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    pub save_config: bool,
}
