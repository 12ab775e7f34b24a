//! Extractor configuration. File values are defaults; CLI flags override them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Graph store endpoint
    pub store: StoreConfig,
    /// Pagination, neighbourhood window and pool sizing
    pub extraction: ExtractionConfig,
    /// Where result tables are written
    pub output: OutputConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    /// Dgraph alpha HTTP port
    pub port: u16,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
    /// Connect timeout (seconds)
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Connections requested per page (`first`)
    pub page_size: u64,
    /// Half-width of the neighbourhood window (seconds)
    pub window_secs: i64,
    /// Parallel host jobs
    pub pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// File name stem; host IP and direction are appended
    pub base_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            timeout_secs: 300,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            window_secs: 5 * 60,
            pool_size: 32,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            base_name: "output".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl StoreConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ExtractionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs)
    }
}

impl OutputConfig {
    /// `<dir>/<base>[-<tag>][-<host>].csv`
    pub fn file_path(&self, tag: Option<&str>, host: Option<&str>) -> PathBuf {
        let mut name = self.base_name.clone();
        for part in [tag, host].into_iter().flatten() {
            name.push('-');
            name.push_str(part);
        }
        name.push_str(".csv");
        self.directory.join(name)
    }
}

impl ExtractorConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<ExtractorConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
