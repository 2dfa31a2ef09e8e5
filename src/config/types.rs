use serde::Deserialize;

/// Main configuration structure for qa-archiver
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Site root; profile listings live at `<base-url><owner>`
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for listing page requests (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for media downloads (seconds)
    #[serde(rename = "media-timeout-secs", default = "default_media_timeout")]
    pub media_timeout_secs: u64,

    /// Maximum number of articles assembled at once
    #[serde(
        rename = "max-concurrent-articles",
        default = "default_max_concurrent_articles"
    )]
    pub max_concurrent_articles: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            page_timeout_secs: default_page_timeout(),
            media_timeout_secs: default_media_timeout(),
            max_concurrent_articles: default_max_concurrent_articles(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Directory for downloaded visuals, exports, and fallback dumps
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_base_url() -> String {
    "https://ask.fm/".to_string()
}

fn default_user_agent() -> String {
    format!("qa-archiver/{}", env!("CARGO_PKG_VERSION"))
}

fn default_page_timeout() -> u64 {
    120
}

fn default_media_timeout() -> u64 {
    15
}

fn default_max_concurrent_articles() -> u32 {
    8
}

fn default_database_path() -> String {
    "data.db".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}
