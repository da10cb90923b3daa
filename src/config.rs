use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sim::BatchConfig;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PneuConfig {
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_simulate_steps")]
    pub simulate_steps: usize,
    #[serde(default = "default_csv")]
    pub csv: PathBuf,
    #[serde(default = "default_json")]
    pub json: PathBuf,
    /// 未给出时每次运行使用系统熵
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_summary_top")]
    pub summary_top: usize,
}

impl Default for PneuConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            steps: default_steps(),
            simulate_steps: default_simulate_steps(),
            csv: default_csv(),
            json: default_json(),
            seed: None,
            summary_top: default_summary_top(),
        }
    }
}

impl PneuConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: PneuConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// 命令行给出的值优先于配置文件.
    pub fn batch(&self, runs: Option<usize>, steps: Option<usize>, seed: Option<u64>) -> BatchConfig {
        BatchConfig {
            trials: runs.unwrap_or(self.runs),
            steps: steps.unwrap_or(self.steps),
            seed: seed.or(self.seed),
        }
    }
}

fn default_runs() -> usize {
    100
}

fn default_steps() -> usize {
    50
}

fn default_simulate_steps() -> usize {
    20
}

fn default_csv() -> PathBuf {
    PathBuf::from("output/audit.csv")
}

fn default_json() -> PathBuf {
    PathBuf::from("output/traces.json")
}

fn default_summary_top() -> usize {
    5
}
