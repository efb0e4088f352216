use anyhow::anyhow;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Sqlite,
    Blob,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Blob => "blob",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "" => Ok(BackendKind::Sqlite),
            "blob" | "local" => Ok(BackendKind::Blob),
            other => Err(anyhow!("unknown backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Opened at startup when set.
    pub workspace: Option<PathBuf>,
    pub backend: BackendKind,
    pub log_filter: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup("ROSTERD_WORKSPACE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let backend = match lookup("ROSTERD_BACKEND") {
            Some(v) => v.parse()?,
            None => BackendKind::default(),
        };
        let log_filter = lookup("ROSTERD_LOG")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        let log_json = match lookup("ROSTERD_LOG_JSON") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow!("ROSTERD_LOG_JSON: not a boolean: {}", v))?,
            None => false,
        };
        Ok(Self {
            workspace,
            backend,
            log_filter,
            log_json,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
