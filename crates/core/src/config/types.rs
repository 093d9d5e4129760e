use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the browser player, served as the fallback route.
    #[serde(default = "default_ui_dir")]
    pub ui_dir: PathBuf,
    /// Size of each chunk read from disk when streaming media.
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ui_dir: default_ui_dir(),
            stream_chunk_size: default_stream_chunk_size(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8000
}

fn default_ui_dir() -> PathBuf {
    PathBuf::from("web")
}

fn default_stream_chunk_size() -> usize {
    64 * 1024
}

/// Cache directory and catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Directory holding media files and the catalog. A leading `~` expands
    /// to the home directory.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Catalog file name, relative to `dir`.
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,
    /// Downloads smaller than this are treated as failed.
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,
    /// Re-index media files found on disk whose sidecar names a source URL.
    #[serde(default = "default_true")]
    pub adopt_orphans: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            catalog_file: default_catalog_file(),
            min_file_size: default_min_file_size(),
            adopt_orphans: true,
        }
    }
}

impl CacheConfig {
    /// Cache directory with `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        expand_home(&self.dir)
    }

    /// Full path of the catalog file.
    pub fn catalog_path(&self) -> PathBuf {
        self.resolved_dir().join(&self.catalog_file)
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("~/Downloads/mucache/data")
}

fn default_catalog_file() -> String {
    "playlist.json".to_string()
}

fn default_min_file_size() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// yt-dlp executable (name on PATH or absolute path).
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    /// Upper bound for a single strategy attempt, download included.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
    /// Connect/read timeout for page and metadata requests.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            attempt_timeout_secs: default_attempt_timeout(),
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_attempt_timeout() -> u64 {
    600
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

/// Client heartbeat watchdog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessConfig {
    /// When false only explicit shutdown requests and signals stop the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// How long in-flight requests may keep the process alive after shutdown starts.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_period_secs: default_grace_period(),
            check_interval_secs: default_check_interval(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

fn default_grace_period() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    5
}

fn default_drain_timeout() -> u64 {
    10
}

/// Log output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
