//! Configuration: YAML file plus environment overrides.
//!
//! Secrets never live in committed config: the GitHub token resolves from
//! the inline value, then `GITHUB_TOKEN`, then the file named by
//! `github.token_file` (Docker-secret style). The loaded config is passed
//! explicitly into every component; there is no process-wide singleton.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use quill_agent::HeadlessAgentConfig;
use quill_orchestrator::BotProfile;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Git author name for bot commits.
    pub name: String,
    pub email: String,
    /// Platform login; used to skip the bot's own comments and to detect
    /// bot assignment. Empty disables both checks.
    pub username: String,
    /// `owner/name` of the single repository this instance serves.
    pub repository: String,
    pub default_branch: String,
    /// Minutes a `pending_plan` issue sits assigned before the scheduler
    /// promotes it.
    pub idle_minutes: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Quill Bot".to_string(),
            email: "bot@quill.dev".to_string(),
            username: String::new(),
            repository: "owner/repo".to_string(),
            default_branch: "main".to_string(),
            idle_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub webhook_path: String,
    pub token: Option<String>,
    /// Path to a file holding the token (Docker secrets).
    pub token_file: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            webhook_path: "/webhook/github".to_string(),
            token: None,
            token_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
    pub enabled: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent CLI executable; empty selects the stub backend.
    pub command: String,
    pub args: Vec<String>,
    pub timeout_seconds: u64,
    /// Checkout the agent works in; the state dir lives under it too.
    pub working_directory: String,
    pub token: Option<String>,
    pub token_file: Option<String>,
    pub model: Option<String>,
    pub output_format: Option<String>,
    /// Issue bodies shorter than this are judged insufficient.
    pub min_body_length: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "agent".to_string(),
            args: vec!["-p".to_string(), "--force".to_string()],
            timeout_seconds: 300,
            working_directory: ".".to_string(),
            token: None,
            token_file: None,
            model: None,
            output_format: None,
            min_body_length: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Agent rounds per issue before the run fails.
    pub max_iterations: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub github: GithubConfig,
    pub webhook: WebhookConfig,
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

fn resolve_secret(inline: Option<&str>, env_key: &str, file_path: Option<&str>) -> Option<String> {
    if let Some(value) = inline {
        let value = value.trim();
        // Unexpanded `${VAR}` placeholders are not a usable secret.
        if !value.is_empty() && !value.starts_with("${") {
            return Some(value.to_string());
        }
    }
    if let Ok(value) = std::env::var(env_key) {
        let value = value.trim().to_string();
        if !value.is_empty() {
            return Some(value);
        }
    }
    let path = file_path?;
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let raw = raw.trim().to_string();
            (!raw.is_empty()).then_some(raw)
        }
        Err(error) => {
            tracing::warn!(path, %error, "failed to read secret file");
            None
        }
    }
}

impl AppConfig {
    /// Loads from the YAML file when present, otherwise starts from
    /// defaults; then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.is_file() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        } else {
            Self::default()
        };
        if let Ok(repository) = std::env::var("BOT_REPOSITORY") {
            if !repository.trim().is_empty() {
                config.bot.repository = repository.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.bot.repository.contains('/') {
            bail!("bot.repository must be owner/name, got {:?}", self.bot.repository);
        }
        if !self.github.webhook_path.starts_with('/') {
            bail!("github.webhook_path must start with '/'");
        }
        if self.limits.max_iterations == 0 {
            bail!("limits.max_iterations must be at least 1");
        }
        if self.bot.idle_minutes == 0 {
            bail!("bot.idle_minutes must be at least 1");
        }
        Ok(())
    }

    pub fn resolved_github_token(&self) -> Option<String> {
        resolve_secret(
            self.github.token.as_deref(),
            "GITHUB_TOKEN",
            self.github.token_file.as_deref(),
        )
    }

    pub fn resolved_agent_token(&self) -> Option<String> {
        resolve_secret(
            self.agent.token.as_deref(),
            "AGENT_TOKEN",
            self.agent.token_file.as_deref(),
        )
    }

    pub fn working_directory(&self) -> PathBuf {
        PathBuf::from(&self.agent.working_directory)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.bot.idle_minutes * 60)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker.poll_interval_seconds)
    }

    pub fn bot_profile(&self) -> BotProfile {
        BotProfile {
            repository: self.bot.repository.clone(),
            default_branch: self.bot.default_branch.clone(),
            username: self.bot.username.clone(),
            name: self.bot.name.clone(),
            email: self.bot.email.clone(),
        }
    }

    pub fn headless_agent_config(&self) -> HeadlessAgentConfig {
        HeadlessAgentConfig {
            command: self.agent.command.clone(),
            args: self.agent.args.clone(),
            timeout: Duration::from_secs(self.agent.timeout_seconds),
            working_directory: self.working_directory(),
            token: self.resolved_agent_token(),
            model: self.agent.model.clone(),
            output_format: self.agent.output_format.clone(),
            min_body_length: self.agent.min_body_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/quill.yaml")).expect("load");
        assert_eq!(config.bot.default_branch, "main");
        assert_eq!(config.webhook.port, 8000);
        assert_eq!(config.limits.max_iterations, 10);
        assert_eq!(config.agent.args, vec!["-p".to_string(), "--force".to_string()]);
    }

    #[test]
    fn unit_yaml_overrides_and_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quill.yaml");
        std::fs::write(
            &path,
            "bot:\n  repository: acme/widgets\n  idle_minutes: 3\n\
             webhook:\n  port: 9001\n\
             limits:\n  max_iterations: 2\n\
             future_section:\n  whatever: true\n",
        )
        .expect("write");
        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.bot.repository, "acme/widgets");
        assert_eq!(config.idle_threshold(), Duration::from_secs(180));
        assert_eq!(config.webhook.port, 9001);
        assert_eq!(config.limits.max_iterations, 2);
        // Untouched sections keep defaults.
        assert_eq!(config.github.webhook_path, "/webhook/github");
    }

    #[test]
    fn unit_validate_rejects_bad_shapes() {
        let mut config = AppConfig::default();
        config.bot.repository = "no-slash".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bot.repository = "acme/widgets".to_string();
        config.github.webhook_path = "webhook".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bot.repository = "acme/widgets".to_string();
        config.limits.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    // Each secret-chain test resolves against its own env key so an
    // ambient GITHUB_TOKEN in the test environment cannot interfere.

    #[test]
    fn unit_inline_token_wins_over_env_and_file() {
        let key = "QUILL_TEST_TOKEN_INLINE_WINS";
        std::env::set_var(key, "from_env");
        let dir = tempfile::tempdir().expect("tempdir");
        let secret = dir.path().join("token");
        std::fs::write(&secret, "from_file\n").expect("write");

        let resolved = resolve_secret(Some("ghp_inline"), key, secret.to_str());
        std::env::remove_var(key);
        assert_eq!(resolved.as_deref(), Some("ghp_inline"));
    }

    #[test]
    fn unit_placeholder_token_falls_through_to_env() {
        let key = "QUILL_TEST_TOKEN_PLACEHOLDER";
        std::env::set_var(key, "from_env");
        let resolved = resolve_secret(Some("${GITHUB_TOKEN}"), key, None);
        std::env::remove_var(key);
        assert_eq!(resolved.as_deref(), Some("from_env"));
    }

    #[test]
    fn unit_token_file_is_last_resort_and_trimmed() {
        let key = "QUILL_TEST_TOKEN_FILE_FALLBACK";
        std::env::remove_var(key);
        let dir = tempfile::tempdir().expect("tempdir");
        let secret = dir.path().join("token");
        std::fs::write(&secret, "ghp_from_file\n").expect("write");

        let resolved = resolve_secret(Some("${GITHUB_TOKEN}"), key, secret.to_str());
        assert_eq!(resolved.as_deref(), Some("ghp_from_file"));
    }

    #[test]
    fn unit_token_resolution_returns_none_when_nothing_set() {
        let key = "QUILL_TEST_TOKEN_UNSET";
        std::env::remove_var(key);
        assert_eq!(resolve_secret(None, key, None), None);
        assert_eq!(resolve_secret(None, key, Some("/nonexistent/secret")), None);
    }
}
