//! Service configuration
//!
//! Settings come from the process environment (after `.env` is loaded). The
//! provider chain can instead be described in a TOML file named by
//! `DEVCREW_PROVIDERS_FILE`:
//!
//! ```toml
//! primary = "anthropic"
//! fallbacks = ["openai", "local"]
//!
//! [providers.anthropic]
//! kind = "anthropic"
//! api_key_env = "ANTHROPIC_API_KEY"
//!
//! [providers.local]
//! kind = "ollama"
//! model = "llama3"
//!
//! [agents]
//! frontend = "local"
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::agent::AgentKind;
use crate::infrastructure::llm::{ProviderConfig, ProviderKind};

pub const DEFAULT_PORT: u16 = 3030;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid provider configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown agent '{0}' in provider overrides")]
    UnknownAgent(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmSettings,
    pub workflows: WorkflowSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
}

/// Provider chain plus retry tuning
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub providers: Vec<ProviderConfig>,
    pub primary: Option<String>,
    pub fallbacks: Vec<String>,
    /// Per-agent primary override
    pub agent_providers: HashMap<AgentKind, String>,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub request_timeout: Duration,
    pub enable_mock: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            primary: None,
            fallbacks: Vec::new(),
            agent_providers: HashMap::new(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1_000),
            retry_max_delay: Duration::from_millis(30_000),
            request_timeout: Duration::from_millis(60_000),
            enable_mock: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// Wall-clock limit for one whole run
    pub timeout: Duration,
    /// How long finished workflows stay pollable
    pub ttl: Duration,
    pub max_retained: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            ttl: Duration::from_secs(3_600),
            max_retained: 1_000,
        }
    }
}

/// Shape of the provider file
#[derive(Debug, Default, Deserialize)]
struct ProvidersFile {
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    fallbacks: Vec<String>,
    #[serde(default)]
    providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    agents: BTreeMap<String, String>,
}

impl Config {
    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns the raw value of a
    /// variable. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let server = ServerConfig {
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
        };

        let defaults = LlmSettings::default();
        let mut llm = match get("DEVCREW_PROVIDERS_FILE") {
            Some(path) => load_providers_file(Path::new(&path))?,
            None => providers_from_env(&get),
        };

        if let Some(primary) = get("LLM_PRIMARY").or_else(|| get("LLM_PROVIDER")) {
            llm.primary = Some(primary.trim().to_string());
        }
        if let Some(fallbacks) = get("LLM_FALLBACKS") {
            llm.fallbacks = split_list(&fallbacks);
        }

        llm.max_retries = parse_or(&get, "LLM_MAX_RETRIES", defaults.max_retries)?;
        llm.retry_base_delay = millis_or(&get, "LLM_RETRY_BASE_DELAY_MS", defaults.retry_base_delay)?;
        llm.retry_max_delay = millis_or(&get, "LLM_RETRY_MAX_DELAY_MS", defaults.retry_max_delay)?;
        llm.request_timeout = millis_or(&get, "LLM_TIMEOUT_MS", defaults.request_timeout)?;
        llm.enable_mock = get("ENABLE_MOCK_AI")
            .map(|value| value == "true" || value == "1")
            .unwrap_or(false);

        let workflow_defaults = WorkflowSettings::default();
        let workflows = WorkflowSettings {
            timeout: Duration::from_secs(parse_or(
                &get,
                "WORKFLOW_TIMEOUT_SECS",
                workflow_defaults.timeout.as_secs(),
            )?),
            ttl: Duration::from_secs(parse_or(
                &get,
                "WORKFLOW_TTL_SECS",
                workflow_defaults.ttl.as_secs(),
            )?),
            max_retained: parse_or(&get, "WORKFLOW_MAX_RETAINED", workflow_defaults.max_retained)?,
        };

        Ok(Self {
            server,
            llm,
            workflows,
        })
    }
}

impl LlmSettings {
    /// Parses a provider file body, including its `[agents]` overrides
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ProvidersFile = toml::from_str(content)?;

        let mut agent_providers = HashMap::new();
        for (agent, provider) in file.agents {
            let kind = AgentKind::from_str(&agent).map_err(|_| ConfigError::UnknownAgent(agent))?;
            agent_providers.insert(kind, provider);
        }

        let providers = file
            .providers
            .into_iter()
            .map(|(name, mut config)| {
                config.name = name;
                config
            })
            .collect();

        Ok(Self {
            providers,
            primary: file.primary,
            fallbacks: file.fallbacks,
            agent_providers,
            ..Self::default()
        })
    }
}

fn load_providers_file(path: &Path) -> Result<LlmSettings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    LlmSettings::from_toml(&content).map_err(|error| match error {
        ConfigError::Toml(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Providers implied by well-known credential variables
fn providers_from_env<G>(get: &G) -> LlmSettings
where
    G: Fn(&str) -> Option<String>,
{
    let mut providers = Vec::new();

    if let Some(key) = get("OPENAI_API_KEY") {
        let mut config = ProviderConfig::new("openai", ProviderKind::Openai).with_api_key(key);
        config.model = get("OPENAI_MODEL");
        providers.push(config);
    }

    if let Some(key) = get("ANTHROPIC_API_KEY") {
        let mut config =
            ProviderConfig::new("anthropic", ProviderKind::Anthropic).with_api_key(key);
        config.model = get("ANTHROPIC_MODEL");
        providers.push(config);
    }

    if let (Some(base_url), Some(model)) = (get("LLM_BASE_URL"), get("LLM_MODEL")) {
        let mut config = ProviderConfig::new("custom", ProviderKind::Generic)
            .with_base_url(base_url)
            .with_model(model);
        config.api_key = get("LLM_API_KEY");
        providers.push(config);
    }

    if get("OLLAMA_ENABLED").is_some_and(|value| value == "true" || value == "1") {
        let mut config = ProviderConfig::new("ollama", ProviderKind::Ollama);
        config.base_url = get("OLLAMA_BASE_URL");
        config.model = get("OLLAMA_MODEL");
        providers.push(config);
    }

    // Without an explicit chain, the first detected provider leads and the
    // rest follow in detection order.
    let fallbacks = providers.iter().skip(1).map(|p| p.name.clone()).collect();

    LlmSettings {
        primary: providers.first().map(|p| p.name.clone()),
        fallbacks,
        providers,
        ..LlmSettings::default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn millis_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_millis() as u64).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.llm.providers.is_empty());
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.llm.request_timeout, Duration::from_secs(60));
        assert!(!config.llm.enable_mock);
        assert_eq!(config.workflows, WorkflowSettings::default());
    }

    #[test]
    fn detects_providers_from_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ANTHROPIC_API_KEY", "ak-test"),
            ("ANTHROPIC_MODEL", "claude-3-haiku"),
            ("OLLAMA_ENABLED", "true"),
        ]))
        .unwrap();

        let names: Vec<_> = config.llm.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["openai", "anthropic", "ollama"]);
        assert_eq!(config.llm.primary.as_deref(), Some("openai"));
        assert_eq!(config.llm.fallbacks, vec!["anthropic", "ollama"]);
        assert_eq!(config.llm.providers[1].model.as_deref(), Some("claude-3-haiku"));
    }

    #[test]
    fn explicit_chain_overrides_detection() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ANTHROPIC_API_KEY", "ak-test"),
            ("LLM_PRIMARY", "anthropic"),
            ("LLM_FALLBACKS", "openai, , mock"),
        ]))
        .unwrap();

        assert_eq!(config.llm.primary.as_deref(), Some("anthropic"));
        assert_eq!(config.llm.fallbacks, vec!["openai", "mock"]);
    }

    #[test]
    fn numeric_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("LLM_MAX_RETRIES", "5"),
            ("LLM_RETRY_BASE_DELAY_MS", "250"),
            ("WORKFLOW_TIMEOUT_SECS", "30"),
            ("WORKFLOW_MAX_RETAINED", "10"),
            ("ENABLE_MOCK_AI", "true"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.max_retries, 5);
        assert_eq!(config.llm.retry_base_delay, Duration::from_millis(250));
        assert_eq!(config.workflows.timeout, Duration::from_secs(30));
        assert_eq!(config.workflows.max_retained, 10);
        assert!(config.llm.enable_mock);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = Config::from_lookup(lookup(&[("LLM_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LLM_TIMEOUT_MS"));
    }

    #[test]
    fn parses_provider_file() {
        let settings = LlmSettings::from_toml(
            r#"
            primary = "local"
            fallbacks = ["remote"]

            [providers.local]
            kind = "ollama"

            [providers.remote]
            kind = "generic"
            base_url = "https://llm.example.com/v1"
            model = "qwen"
            auth_header = "X-Api-Key"
            auth_prefix = ""
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.primary.as_deref(), Some("local"));
        let remote = settings
            .providers
            .iter()
            .find(|p| p.name == "remote")
            .unwrap();
        assert_eq!(remote.auth_header, "X-Api-Key");
        assert!(!remote.enabled);
    }

    #[test]
    fn provider_body_keeps_agent_overrides() {
        let settings = LlmSettings::from_toml(
            r#"
            [providers.local]
            kind = "ollama"

            [agents]
            Database = "local"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.agent_providers.get(&AgentKind::Database).map(String::as_str),
            Some("local")
        );
    }

    #[test]
    fn provider_body_rejects_unknown_agent_and_bad_toml() {
        let unknown = LlmSettings::from_toml("[agents]\ndesigner = \"local\"\n").unwrap_err();
        assert!(matches!(unknown, ConfigError::UnknownAgent(ref agent) if agent == "designer"));

        let malformed = LlmSettings::from_toml("primary = [").unwrap_err();
        assert!(matches!(malformed, ConfigError::Toml(_)));
    }

    #[test]
    fn provider_file_agent_overrides() {
        let dir = std::env::temp_dir().join(format!("devcrew-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("providers.toml");
        std::fs::write(
            &path,
            r#"
            primary = "mock"

            [providers.mock]
            kind = "mock"

            [agents]
            qa = "mock"
            "#,
        )
        .unwrap();

        let config = Config::from_lookup(lookup(&[(
            "DEVCREW_PROVIDERS_FILE",
            path.to_str().unwrap(),
        )]))
        .unwrap();

        assert_eq!(config.llm.agent_providers.get(&AgentKind::Qa).map(String::as_str), Some("mock"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_provider_file_is_an_error() {
        let err = Config::from_lookup(lookup(&[(
            "DEVCREW_PROVIDERS_FILE",
            "/nonexistent/devcrew/providers.toml",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
