//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::types::EligibleTypes;

mod cli;

pub use cli::{CliArgs, Command, ContentOverrides, RenderArgs, RenderDocument, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "mdmirror";
const ENV_PREFIX: &str = "MDMIRROR";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_SITE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_FULL_CONTEXT_DEPTH: i64 = 1;
const UNLIMITED_DEPTH: i64 = -1;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub mirror: MirrorSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// TOML seed for the in-memory content store. Starts empty when unset.
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MirrorSettings {
    /// Site origin without a trailing slash.
    pub site_url: String,
    pub eligible_types: EligibleTypes,
    pub custom_summary: Option<String>,
    pub include_taxonomies: bool,
    pub include: IncludeSettings,
    pub full_context: FullContextSettings,
}

/// Per-entity fields written into the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeSettings {
    pub title: bool,
    pub excerpt: bool,
    pub seo_summary: bool,
    pub content: bool,
}

impl Default for IncludeSettings {
    fn default() -> Self {
        Self {
            title: true,
            excerpt: true,
            seo_summary: true,
            content: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullContextSettings {
    pub max_depth: FullContextDepth,
    pub detect_cycles: bool,
}

impl Default for FullContextSettings {
    fn default() -> Self {
        Self {
            max_depth: FullContextDepth::Limited(1),
            detect_cycles: true,
        }
    }
}

/// Maximum nesting of link expansion in the full context document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullContextDepth {
    Limited(u32),
    Unlimited,
}

impl FullContextDepth {
    /// Whether links found at `depth` are expanded at all.
    pub fn permits(self, depth: u32) -> bool {
        match self {
            FullContextDepth::Limited(max) => depth <= max,
            FullContextDepth::Unlimited => true,
        }
    }

    /// Whether a document inlined at `depth` has its own links expanded.
    pub fn descends_below(self, depth: u32) -> bool {
        match self {
            FullContextDepth::Limited(max) => depth < max,
            FullContextDepth::Unlimited => true,
        }
    }

    fn from_raw(value: i64) -> Result<Self, LoadError> {
        if value == UNLIMITED_DEPTH {
            return Ok(FullContextDepth::Unlimited);
        }
        u32::try_from(value).map(FullContextDepth::Limited).map_err(|_| {
            LoadError::invalid(
                "mirror.full_context.max_depth",
                format!("expected a non-negative depth or {UNLIMITED_DEPTH}, got {value}"),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub group: String,
    pub ttl: Duration,
    pub capacity: NonZeroUsize,
    pub max_entry_bytes: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_content_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    mirror: RawMirrorSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }

        self.apply_content_overrides(&overrides.content);
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(path) = overrides.seed_path.as_ref() {
            self.content.seed_path = Some(path.clone());
        }
        if let Some(url) = overrides.site_url.as_ref() {
            self.mirror.site_url = Some(url.clone());
        }
        if let Some(depth) = overrides.full_context_depth {
            self.mirror.full_context.max_depth = Some(depth);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            mirror,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            content: build_content_settings(content)?,
            mirror: build_mirror_settings(mirror)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let seed_path = content
        .seed_path
        .filter(|path| !path.as_os_str().is_empty());
    Ok(ContentSettings { seed_path })
}

fn build_mirror_settings(mirror: RawMirrorSettings) -> Result<MirrorSettings, LoadError> {
    let site_url = normalize_site_url(
        mirror
            .site_url
            .as_deref()
            .unwrap_or(DEFAULT_SITE_URL),
    )?;

    let eligible_types = mirror
        .eligible_types
        .map(EligibleTypes::new)
        .unwrap_or_default();

    let custom_summary = mirror.custom_summary.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let defaults = IncludeSettings::default();
    let include = IncludeSettings {
        title: mirror.include.title.unwrap_or(defaults.title),
        excerpt: mirror.include.excerpt.unwrap_or(defaults.excerpt),
        seo_summary: mirror.include.seo_summary.unwrap_or(defaults.seo_summary),
        content: mirror.include.content.unwrap_or(defaults.content),
    };

    let max_depth = FullContextDepth::from_raw(
        mirror
            .full_context
            .max_depth
            .unwrap_or(DEFAULT_FULL_CONTEXT_DEPTH),
    )?;
    let detect_cycles = mirror.full_context.detect_cycles.unwrap_or(true);
    if max_depth == FullContextDepth::Unlimited && !detect_cycles {
        return Err(LoadError::invalid(
            "mirror.full_context.detect_cycles",
            "unlimited expansion depth requires cycle detection",
        ));
    }

    Ok(MirrorSettings {
        site_url,
        eligible_types,
        custom_summary,
        include_taxonomies: mirror.include_taxonomies.unwrap_or(true),
        include,
        full_context: FullContextSettings {
            max_depth,
            detect_cycles,
        },
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = crate::cache::CacheConfig::default();

    let group = cache.group.unwrap_or(defaults.group);
    if group.trim().is_empty() {
        return Err(LoadError::invalid("cache.group", "must not be empty"));
    }

    let ttl_seconds = cache.ttl_seconds.unwrap_or(defaults.ttl_seconds);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(defaults.capacity as u64),
        "cache.capacity",
    )?;
    let max_entry_bytes = non_zero_usize(
        cache.max_entry_bytes.unwrap_or(defaults.max_entry_bytes as u64),
        "cache.max_entry_bytes",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        group: group.trim().to_string(),
        ttl: Duration::from_secs(ttl_seconds),
        capacity,
        max_entry_bytes,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMirrorSettings {
    site_url: Option<String>,
    eligible_types: Option<Vec<String>>,
    custom_summary: Option<String>,
    include_taxonomies: Option<bool>,
    include: RawIncludeSettings,
    full_context: RawFullContextSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawIncludeSettings {
    title: Option<bool>,
    excerpt: Option<bool>,
    seo_summary: Option<bool>,
    content: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFullContextSettings {
    max_depth: Option<i64>,
    detect_cycles: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    group: Option<String>,
    ttl_seconds: Option<u64>,
    capacity: Option<u64>,
    max_entry_bytes: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn normalize_site_url(value: &str) -> Result<String, LoadError> {
    let trimmed = value.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| LoadError::invalid("mirror.site_url", format!("{trimmed}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "mirror.site_url",
            format!("unsupported scheme `{}`", parsed.scheme()),
        ));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(LoadError::invalid(
            "mirror.site_url",
            "must not carry a query or fragment",
        ));
    }
    Ok(trimmed.to_string())
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
