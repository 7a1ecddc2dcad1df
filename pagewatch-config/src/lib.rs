//! Loader for monitor configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: built-in defaults, an optional YAML file
//! (`pagewatch.yaml`), then `PAGEWATCH__`-prefixed environment variables
//! (`PAGEWATCH__STATE_PATH`, `PAGEWATCH__NOTIFIER__KIND`, ...). Every string
//! value goes through recursive `${VAR}` expansion after merging, so a file
//! can say `bot_token: "${TELEGRAM_BOT_TOKEN}"`.
//!
//! When no `notifier` section is present the backend is detected from the
//! conventional credential variables, see [`NotifierConfig::from_env`].
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const EXPANSION_ROUNDS: usize = 8;

pub const DEFAULT_URL: &str = "https://bauverein-haidhausen.de/wohnungsangebote";
pub const DEFAULT_STATE_PATH: &str = "known_ads.txt";
pub const DEFAULT_START_MARKER: &str = "Eine Bewerbung ist nur online möglich.";
pub const DEFAULT_END_MARKER: &str = "Bauverein München Haidhausen eG";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_SENDGRID_API: &str = "https://api.sendgrid.com";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Fully resolved configuration for one monitor run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Page to watch.
    pub url: String,
    /// File holding the last canonical snapshot.
    pub state_path: PathBuf,
    pub start_marker: String,
    /// Empty means "read to the end of the page".
    pub end_marker: String,
    pub user_agent: String,
    pub http: HttpSettings,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retries: usize,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: 0,
        }
    }
}

/// TLS mode for the SMTP backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, port 465.
    #[default]
    Ssl,
    /// Plain connection upgraded with STARTTLS, port 587.
    StartTls,
}

impl SmtpSecurity {
    pub fn default_port(self) -> u16 {
        match self {
            SmtpSecurity::Ssl => 465,
            SmtpSecurity::StartTls => 587,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ssl" | "tls" | "465" => Some(SmtpSecurity::Ssl),
            "starttls" | "587" => Some(SmtpSecurity::StartTls),
            _ => None,
        }
    }
}

/// Notification backend selection. The tag is `kind`.
///
/// Credentials are optional at this level: a backend with missing credentials
/// still loads, and its sink reports the gap on every send instead of
/// aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    Telegram {
        #[serde(default, deserialize_with = "opt_string")]
        bot_token: Option<String>,
        #[serde(default, deserialize_with = "opt_string")]
        chat_id: Option<String>,
        #[serde(default = "default_telegram_api")]
        api_base: String,
    },
    Sendgrid {
        #[serde(default, deserialize_with = "opt_string")]
        api_key: Option<String>,
        /// Must be a verified sender identity.
        #[serde(default, deserialize_with = "opt_string")]
        sender: Option<String>,
        #[serde(default, deserialize_with = "opt_string")]
        recipient: Option<String>,
        #[serde(default = "default_sendgrid_api")]
        api_base: String,
    },
    Smtp {
        #[serde(default, deserialize_with = "opt_string")]
        address: Option<String>,
        /// App password for the sending account.
        #[serde(default, deserialize_with = "opt_string")]
        password: Option<String>,
        #[serde(default, deserialize_with = "opt_string")]
        recipient: Option<String>,
        #[serde(default = "default_smtp_host")]
        host: String,
        #[serde(default)]
        security: SmtpSecurity,
        #[serde(default)]
        port: Option<u16>,
    },
}

impl NotifierConfig {
    /// Detect the backend from conventional process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Detection order: Telegram, SendGrid, SMTP. With nothing set we fall
    /// back to Telegram without credentials, so sends are logged as failures.
    ///
    /// ```
    /// use pagewatch_config::{NotifierConfig, SmtpSecurity};
    ///
    /// let cfg = NotifierConfig::from_lookup(|k| match k {
    ///     "EMAIL_ADDRESS" => Some("me@example.org".into()),
    ///     "EMAIL_PASSWORD" => Some("app-pass".into()),
    ///     "SMTP_SECURITY" => Some("starttls".into()),
    ///     _ => None,
    /// });
    /// match cfg {
    ///     NotifierConfig::Smtp { security, recipient, .. } => {
    ///         assert_eq!(security, SmtpSecurity::StartTls);
    ///         assert_eq!(recipient.as_deref(), Some("me@example.org"));
    ///     }
    ///     other => panic!("expected smtp, got {other:?}"),
    /// }
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(clean_credential);

        let bot_token = get("TELEGRAM_BOT_TOKEN");
        let chat_id = get("TELEGRAM_CHAT_ID");
        if bot_token.is_some() || chat_id.is_some() {
            return NotifierConfig::Telegram {
                bot_token,
                chat_id,
                api_base: default_telegram_api(),
            };
        }

        if let Some(api_key) = get("SENDGRID_API_KEY") {
            return NotifierConfig::Sendgrid {
                api_key: Some(api_key),
                sender: get("EMAIL_SENDER"),
                recipient: get("EMAIL_RECIPIENT"),
                api_base: default_sendgrid_api(),
            };
        }

        let address = get("EMAIL_ADDRESS");
        let password = get("EMAIL_PASSWORD");
        if address.is_some() || password.is_some() {
            let security = get("SMTP_SECURITY")
                .and_then(|raw| SmtpSecurity::parse(&raw))
                .unwrap_or_default();
            // Sending to yourself is the common single-user setup.
            let recipient = get("EMAIL_RECIPIENT").or_else(|| address.clone());
            return NotifierConfig::Smtp {
                address,
                password,
                recipient,
                host: get("SMTP_HOST").unwrap_or_else(default_smtp_host),
                security,
                port: get("SMTP_PORT").and_then(|p| p.parse().ok()),
            };
        }

        NotifierConfig::Telegram {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api(),
        }
    }

    /// Backend name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NotifierConfig::Telegram { .. } => "telegram",
            NotifierConfig::Sendgrid { .. } => "sendgrid",
            NotifierConfig::Smtp {
                security: SmtpSecurity::Ssl,
                ..
            } => "smtp-ssl",
            NotifierConfig::Smtp {
                security: SmtpSecurity::StartTls,
                ..
            } => "smtp-starttls",
        }
    }

    /// Drop credentials that are blank or still hold an unresolved `${VAR}`.
    fn sanitized(self) -> Self {
        let c = |v: Option<String>| v.and_then(clean_credential);
        match self {
            NotifierConfig::Telegram {
                bot_token,
                chat_id,
                api_base,
            } => NotifierConfig::Telegram {
                bot_token: c(bot_token),
                chat_id: c(chat_id),
                api_base,
            },
            NotifierConfig::Sendgrid {
                api_key,
                sender,
                recipient,
                api_base,
            } => NotifierConfig::Sendgrid {
                api_key: c(api_key),
                sender: c(sender),
                recipient: c(recipient),
                api_base,
            },
            NotifierConfig::Smtp {
                address,
                password,
                recipient,
                host,
                security,
                port,
            } => NotifierConfig::Smtp {
                address: c(address),
                password: c(password),
                recipient: c(recipient),
                host,
                security,
                port,
            },
        }
    }
}

fn clean_credential(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains("${") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Accept strings and bare numbers (chat ids, numeric passwords) alike.
fn opt_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(de)?
        .map(scalar_text)
        .transpose()
        .map(Option::flatten)
        .map_err(serde::de::Error::custom)
}

/// Required text fields. YAML `end_marker: 2024` and `PAGEWATCH__END_MARKER=2024`
/// both arrive as numbers.
fn lenient_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_text(Value::deserialize(de)?)
        .map_err(serde::de::Error::custom)?
        .ok_or_else(|| serde::de::Error::custom("expected a string, got null"))
}

fn lenient_path<'de, D>(de: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(de).map(PathBuf::from)
}

fn scalar_text(v: Value) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(format!("expected a string, got {other}")),
    }
}

/// Shape of the merged sources before the notifier is resolved.
#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default = "default_url", deserialize_with = "lenient_string")]
    url: String,
    #[serde(default = "default_state_path", deserialize_with = "lenient_path")]
    state_path: PathBuf,
    #[serde(default = "default_start_marker", deserialize_with = "lenient_string")]
    start_marker: String,
    #[serde(default = "default_end_marker", deserialize_with = "lenient_string")]
    end_marker: String,
    #[serde(default = "default_user_agent", deserialize_with = "lenient_string")]
    user_agent: String,
    #[serde(default)]
    http: HttpSettings,
    #[serde(default)]
    notifier: Option<NotifierConfig>,
}

fn default_url() -> String {
    DEFAULT_URL.into()
}
fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}
fn default_start_marker() -> String {
    DEFAULT_START_MARKER.into()
}
fn default_end_marker() -> String {
    DEFAULT_END_MARKER.into()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_telegram_api() -> String {
    DEFAULT_TELEGRAM_API.into()
}
fn default_sendgrid_api() -> String {
    DEFAULT_SENDGRID_API.into()
}
fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.into()
}

/// Expand `$VAR` / `${VAR}` in every string of the merged tree. Values of
/// variables may reference other variables; resolution stops at a fixed point
/// or after [`EXPANSION_ROUNDS`]. Unknown variables stay verbatim.
fn expand_placeholders(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => *s = expand_str(s),
        Value::Array(items) => items.iter_mut().for_each(expand_placeholders),
        Value::Object(fields) => fields.values_mut().for_each(expand_placeholders),
        _ => {}
    }
}

fn expand_str(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..EXPANSION_ROUNDS {
        let next =
            shellexpand::env_with_context_no_errors(&current, |name| std::env::var(name).ok())
                .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct MonitorConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: Option<&'static str>,
}

impl Default for MonitorConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorConfigLoader {
    /// Start with defaults plus `PAGEWATCH__` env overrides.
    ///
    /// ```
    /// use pagewatch_config::{MonitorConfigLoader, DEFAULT_STATE_PATH};
    ///
    /// let cfg = MonitorConfigLoader::new()
    ///     .with_yaml_str("url: https://example.org/flats")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.url, "https://example.org/flats");
    /// assert_eq!(cfg.state_path.to_str(), Some(DEFAULT_STATE_PATH));
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: Some("PAGEWATCH"),
        }
    }

    /// Skip the environment overlay (tests, embedding).
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, for headless deployments configured by env only.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests to merge inline YAML snippets.
    ///
    /// ```
    /// use pagewatch_config::{MonitorConfigLoader, NotifierConfig};
    ///
    /// let cfg = MonitorConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str(
    ///         r#"
    /// notifier:
    ///   kind: telegram
    ///   bot_token: "123:abc"
    ///   chat_id: -1001234
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// match cfg.notifier {
    ///     NotifierConfig::Telegram { chat_id, .. } => assert_eq!(chat_id.as_deref(), Some("-1001234")),
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// Environment variables are layered last so they win over files, then
    /// `${VAR}` placeholders are expanded and the notifier is resolved.
    pub fn load(self) -> Result<MonitorConfig, ConfigError> {
        let mut builder = self.builder;
        if let Some(prefix) = self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        if v.is_null() {
            v = Value::Object(Default::default());
        }
        expand_placeholders(&mut v);

        let raw: FileConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        let notifier = match raw.notifier {
            Some(explicit) => explicit.sanitized(),
            None => {
                let detected = NotifierConfig::from_env();
                tracing::debug!(kind = detected.kind(), "config.notifier.detected_from_env");
                detected
            }
        };

        Ok(MonitorConfig {
            url: raw.url,
            state_path: raw.state_path,
            start_marker: raw.start_marker,
            end_marker: raw.end_marker,
            user_agent: raw.user_agent,
            http: raw.http,
            notifier,
        })
    }
}
