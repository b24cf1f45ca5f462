//! kiln: the build driver of the kiln language toolchain.
//!
//! `kiln build` verifies a workspace's dependencies and builds it for every
//! configured environment; `kiln audit` runs the dependency checks alone.

#![warn(missing_docs)]

mod audit;
mod build;
mod workspace;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use kiln_common::Env;
use kiln_diagnostics::{DiagnosticStream, Severity};
use tracing_subscriber::EnvFilter;

/// kiln: verified, reproducible builds.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "kiln build driver")]
pub struct Cli {
    /// Emit diagnostics as JSON Lines on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write debug artifacts and log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Workspace file or directory. Defaults to the nearest `kiln.toml`
    /// above the current directory.
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify dependencies and build the workspace.
    Build(BuildArgs),
    /// Verify dependencies and local imports without building.
    Audit,
}

/// Arguments for `kiln build`.
#[derive(Parser, Debug, Default)]
pub struct BuildArgs {
    /// Compile objects but do not link.
    #[arg(long)]
    pub no_link: bool,

    /// Persist IR only; skip objects and linking.
    #[arg(long)]
    pub emit_ir_only: bool,

    /// Backend driver to use instead of the configured one.
    #[arg(long)]
    pub backend: Option<String>,

    /// Maximum number of parallel compile jobs.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Environments to leave unlinked (e.g., `--no-link-env windows/amd64`).
    #[arg(long = "no-link-env", value_name = "OS/ARCH", num_args = 1..)]
    pub no_link_env: Vec<Env>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color when stderr is a terminal.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// JSON Lines diagnostics on stdout.
    pub json: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Verbose builds and debug logging.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// The `--workspace` flag.
    pub workspace: Option<PathBuf>,
}

impl GlobalArgs {
    /// The diagnostic stream selected by the output flags.
    pub fn stream(&self) -> DiagnosticStream {
        if self.json {
            return DiagnosticStream::json_lines(Box::new(io::stdout()));
        }
        let stream = DiagnosticStream::text(Box::new(io::stderr()), self.color);
        if self.quiet {
            stream.with_min_level(Severity::Error)
        } else {
            stream
        }
    }

    /// Whether human summaries go to stdout.
    pub fn prints_summary(&self) -> bool {
        !self.json && !self.quiet
    }
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        json: cli.json,
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        workspace: cli.workspace,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Audit => audit::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(global: &GlobalArgs) {
    let default = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(global.color)
        .without_time()
        .try_init();
}
