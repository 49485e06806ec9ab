//! Request options and the TOML settings file.
//!
//! Settings live at `$XDG_CONFIG_HOME/llm-scaffold/config.toml` or
//! `~/.config/llm-scaffold/config.toml`. Every value resolves through the
//! chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{make_backend, Backend, ProviderKind};
use crate::error::Result;
use crate::extract::BraceFallback;
use crate::ScaffoldError;

/// Sampling and format options sent with each request.
///
/// Unset values are omitted from the request body so the provider's own
/// defaults apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmConfig {
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: Option<f64>,

    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,

    /// Ask the provider for JSON-only output.
    pub json_mode: bool,
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }
}

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

/// Contents of `config.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSection,
    pub generation: GenerationSection,
    pub extraction: ExtractionSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Overall limit for one generation, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<BraceFallback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Template written by `llm-scaffold init`.
pub const DEFAULT_CONFIG: &str = r#"# llm-scaffold configuration.
# Values here are overridden by environment variables and CLI flags.

[provider]
# "openai" or "ollama"
kind = "openai"
# model = "gpt-4"
# base_url = "https://api.openai.com"
# api_key = "sk-..."   # prefer the OPENAI_API_KEY environment variable
# organization = "org-..."
timeout_secs = 300

[generation]
stream = true
# temperature = 0.2
# max_tokens = 8192
json_mode = false

[extraction]
# "outer-braces" (first '{' to last '}') or "balanced"
fallback = "outer-braces"

[output]
dir = "output"
"#;

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the llm-scaffold config directory.
///
/// Always uses XDG layout, even on macOS.
pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("llm-scaffold");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("llm-scaffold")
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ScaffoldError::InvalidConfig(e.to_string()))
    }

    /// Load settings from `path`. A missing file yields the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs_err::read_to_string(path) {
            Ok(text) => Self::from_toml(&text).map_err(|e| match e {
                ScaffoldError::InvalidConfig(msg) => {
                    ScaffoldError::InvalidConfig(format!("{}: {}", path.display(), msg))
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write [`DEFAULT_CONFIG`] to `path`, creating parent directories.
///
/// Refuses to replace an existing file unless `force` is set. Sets file
/// permissions to 0600 on Unix since the file may hold an API key.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ScaffoldError::InvalidConfig(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(dir) = path.parent() {
        fs_err::create_dir_all(dir)?;
    }
    fs_err::write(path, DEFAULT_CONFIG)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs_err::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` defers to the next layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub stream: Option<bool>,
    pub json_mode: Option<bool>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

/// Default overall limit for one generation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Fully resolved configuration, ready for use.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub timeout: Duration,
    pub stream: bool,
    pub llm: LlmConfig,
    pub fallback: BraceFallback,
    pub output_dir: PathBuf,
}

impl ResolvedConfig {
    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// `env` looks up an environment variable; pass `|k| std::env::var(k).ok()`
    /// outside of tests.
    ///
    /// - provider: `--provider` > `LLM_SCAFFOLD_PROVIDER` > `provider.kind` > openai
    /// - model: `--model` > `LLM_SCAFFOLD_MODEL` > `provider.model` > provider default
    /// - base URL: `--base-url` > `LLM_SCAFFOLD_BASE_URL` > `provider.base_url` > provider default
    /// - API key: `OPENAI_API_KEY` > `provider.api_key`
    /// - organization: `OPENAI_ORGANIZATION` > `provider.organization`
    pub fn resolve(
        cli: &CliOverrides,
        file: &Settings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let provider = match cli.provider {
            Some(kind) => kind,
            None => match env("LLM_SCAFFOLD_PROVIDER") {
                Some(raw) => raw.parse().map_err(|e| {
                    ScaffoldError::InvalidConfig(format!("LLM_SCAFFOLD_PROVIDER: {}", e))
                })?,
                None => file.provider.kind.unwrap_or_default(),
            },
        };

        let model = cli
            .model
            .clone()
            .or_else(|| env("LLM_SCAFFOLD_MODEL"))
            .or_else(|| file.provider.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env("LLM_SCAFFOLD_BASE_URL"))
            .or_else(|| file.provider.base_url.clone())
            .unwrap_or_else(|| provider.default_base_url().to_string());

        let api_key = env("OPENAI_API_KEY").or_else(|| file.provider.api_key.clone());
        let organization =
            env("OPENAI_ORGANIZATION").or_else(|| file.provider.organization.clone());

        let timeout_secs = cli
            .timeout_secs
            .or(file.provider.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ScaffoldError::InvalidConfig(
                "timeout_secs must be greater than zero".into(),
            ));
        }

        let gen = &file.generation;
        let mut llm = LlmConfig::default()
            .with_json_mode(cli.json_mode.or(gen.json_mode).unwrap_or(false));
        if let Some(t) = cli.temperature.or(gen.temperature) {
            llm = llm.with_temperature(t);
        }
        if let Some(n) = cli.max_tokens.or(gen.max_tokens) {
            llm = llm.with_max_tokens(n);
        }

        Ok(Self {
            provider,
            model,
            base_url,
            api_key,
            organization,
            timeout: Duration::from_secs(timeout_secs),
            stream: cli.stream.or(gen.stream).unwrap_or(true),
            llm,
            fallback: file.extraction.fallback.unwrap_or_default(),
            output_dir: cli
                .output_dir
                .clone()
                .or_else(|| file.output.dir.clone())
                .unwrap_or_else(|| PathBuf::from("output")),
        })
    }

    /// Build the backend for the resolved provider.
    ///
    /// Fails with [`ScaffoldError::InvalidConfig`] when the provider needs an
    /// API key and none was found.
    pub fn backend(&self) -> Result<std::sync::Arc<dyn Backend>> {
        make_backend(self.provider, self.api_key.clone(), self.organization.clone())
    }
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("stream", &self.stream)
            .field("llm", &self.llm)
            .field("fallback", &self.fallback)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}
