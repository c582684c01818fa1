use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the mdmirror binary.
#[derive(Debug, Parser)]
#[command(
    name = "mdmirror",
    version,
    about = "Markdown mirror and llms.txt server"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MDMIRROR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the mirror over HTTP.
    Serve(Box<ServeArgs>),
    /// Print one mirrored document to stdout.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverrides {
    /// Override the TOML file the content store is seeded from.
    #[arg(long = "content-seed", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub seed_path: Option<PathBuf>,

    /// Override the public site URL used for mirror links.
    #[arg(long = "site-url", value_name = "URL")]
    pub site_url: Option<String>,

    /// Override the full-context expansion depth (-1 for unlimited).
    #[arg(long = "full-context-depth", value_name = "DEPTH", allow_hyphen_values = true)]
    pub full_context_depth: Option<i64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the document cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: ContentOverrides,

    #[command(subcommand)]
    pub document: RenderDocument,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum RenderDocument {
    /// The llms.txt index.
    Index,
    /// The link-stripped context document.
    Basic,
    /// The link-expanded context document.
    Full,
    /// The mirror document of one entity.
    Entity {
        #[arg(value_name = "SLUG")]
        slug: String,
    },
    /// The archive of one taxonomy term.
    Taxonomy {
        #[arg(value_name = "TAXONOMY")]
        taxonomy: String,
        #[arg(value_name = "TERM")]
        term: String,
    },
}
