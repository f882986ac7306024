//! # gp-cli
//!
//! `gpol`: browse policy definitions and read or change policy state in a
//! scope's `Registry.pol`.
//!
//! - `gpol categories` / `gpol policies <category>` — walk the catalog
//! - `gpol show <policy>` / `gpol search <text>` — inspect definitions
//! - `gpol state <policy>` / `gpol set <policy> <state>` — read and write
//! - `gpol dump <file>` — list the raw entries of a policy file

mod commands;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use gp_policy::{EngineConfig, Scope};
use tracing_subscriber::EnvFilter;

use commands::Context;

/// Local Group Policy editor.
#[derive(Parser)]
#[command(name = "gpol", version, about)]
struct Cli {
    /// Engine config file (TOML). Defaults to the layout under %SystemRoot%.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Definitions directory or single .admx file (overrides the config).
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// Preferred locale; repeat for a preference list (overrides the config).
    #[arg(long = "locale")]
    locales: Vec<String>,

    /// Scope to read and write.
    #[arg(long, value_enum, default_value = "machine")]
    scope: ScopeArg,

    /// Policy file for the chosen scope (overrides the config).
    #[arg(long)]
    policy_file: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Machine,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Machine => Scope::Machine,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the category tree.
    Categories,
    /// List the policies directly in a category.
    Policies {
        /// Category id (`namespace:name`).
        category: String,
    },
    /// Show a policy's definition, presentation and current state.
    Show {
        /// Policy id (`namespace:name`).
        policy: String,
    },
    /// Search policy names, explanations and ids.
    Search {
        text: String,
        /// Include policies of the other scope.
        #[arg(long)]
        all_scopes: bool,
    },
    /// Show the current state of a policy.
    State {
        policy: String,
        /// Print the evidence steps of the backend the state was read from.
        #[arg(long)]
        trace: bool,
    },
    /// Enable, disable or un-configure a policy.
    Set {
        policy: String,
        /// enabled, disabled or not_configured.
        state: String,
        /// Element values as a JSON object, e.g. '{"Level": 3}'.
        #[arg(long)]
        options: Option<String>,
    },
    /// List the entries of a policy file.
    Dump {
        /// Path to a Registry.pol file.
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gp_admx=info".parse()?)
                .add_directive("gp_policy=info".parse()?)
                .add_directive("gp_registry=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let scope = Scope::from(cli.scope);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::from_env(),
    };
    if let Some(dir) = cli.definitions {
        config.definitions_dir = dir;
    }
    if !cli.locales.is_empty() {
        config.locales = cli.locales;
    }
    if let Some(file) = cli.policy_file {
        match scope {
            Scope::Machine => config.machine_policy_file = file,
            Scope::User => config.user_policy_file = file,
        }
    }

    let ctx = Context {
        config,
        scope,
        json: cli.json,
    };

    match &cli.command {
        Commands::Categories => commands::browse::categories(&ctx),
        Commands::Policies { category } => commands::browse::policies(&ctx, category),
        Commands::Show { policy } => commands::browse::show(&ctx, policy),
        Commands::Search { text, all_scopes } => commands::browse::search(&ctx, text, *all_scopes),
        Commands::State { policy, trace } => commands::state::show(&ctx, policy, *trace),
        Commands::Set {
            policy,
            state,
            options,
        } => commands::state::set(&ctx, policy, state, options.as_deref()),
        Commands::Dump { file } => commands::dump::execute(&ctx, file),
    }
}
