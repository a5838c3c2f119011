use crate::heuristics::DEFAULT_KEYWORDS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Trained model artifact (JSON)
    pub model_path: String,
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Folder state file; folders are kept in memory only when unset
    #[serde(default)]
    pub state_path: Option<String>,
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
    #[serde(default)]
    pub spool: SpoolConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Two-column CSV of labelled historical messages
    pub path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_has_headers() -> bool {
    true
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: "spam.csv".to_string(),
            delimiter: default_delimiter(),
            has_headers: default_has_headers(),
        }
    }
}

impl CorpusConfig {
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => anyhow::bail!(
                "corpus delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    pub keywords: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoolConfig {
    pub directory: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_poll_interval() -> u64 {
    2
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            directory: "spool".to_string(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model_path: "model.json".to_string(),
            corpus: CorpusConfig::default(),
            state_path: Some("mailsift-state.json".to_string()),
            heuristics: HeuristicsConfig::default(),
            spool: SpoolConfig::default(),
            logging: Some(LoggingConfig {
                level: "info".to_string(),
            }),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self
            .heuristics
            .keywords
            .iter()
            .all(|k| k.trim().is_empty())
        {
            anyhow::bail!("heuristics.keywords must contain at least one keyword");
        }
        if self.spool.poll_interval_seconds == 0 {
            anyhow::bail!("spool.poll_interval_seconds must be greater than zero");
        }
        self.corpus.delimiter_byte()?;
        Ok(())
    }

    /// `log` level filter named in the config, if any and valid.
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.logging
            .as_ref()
            .and_then(|logging| logging.level.parse().ok())
    }
}
