use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub chunking: Chunking,
    #[serde(default)]
    pub run: Run,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: Default::default(),
            endpoint: Default::default(),
            chunking: Default::default(),
            run: Default::default(),
            output: Default::default(),
            logging: Default::default(),
            debug: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Directory enumerated for *.json inputs when --input is not given.
    pub dir: String,
    /// Top-level field holding the splittable item list in object-shaped
    /// documents.
    pub list_field: String,
}
impl Default for Source {
    fn default() -> Self {
        Self {
            dir: "json_files".into(),
            list_field: "data".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub health_path: String,
    pub request_timeout_seconds: u64,
    pub health_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_base_delay_seconds: u64,
    pub retry_max_delay_seconds: u64,
}
impl Default for Endpoint {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000/process".into(),
            health_path: "/health-check".into(),
            request_timeout_seconds: 120,
            health_timeout_seconds: 3,
            max_retries: 3,
            retry_base_delay_seconds: 2,
            retry_max_delay_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunking {
    /// Lists longer than this are split; a list of exactly this length is not.
    pub threshold: usize,
}
impl Default for Chunking {
    fn default() -> Self {
        Self { threshold: 50_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub max_concurrency: usize,
    pub resume: bool,
    pub print_summary: bool,
}
impl Default for Run {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            resume: true,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub out_dir: String,
    pub write_responses: bool,
    pub write_merged: bool,
    pub write_report_json: bool,
    pub write_index_json: bool,
    pub report_filename: String,
    pub chunk_details_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            write_responses: true,
            write_merged: true,
            write_report_json: true,
            write_index_json: true,
            report_filename: "report.json".into(),
            chunk_details_filename: "chunk_details.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: true,
        }
    }
}
