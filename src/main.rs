//! tsrepl - CLI

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use tsrepl::repl::{CommandCompiler, PreviewHost, Repl, ReplError, ReplOptions};
use tsrepl::util::config::{expand_home, load_user_config, render_config, UserConfig};
use tsrepl::util::logger::{self, LogLevel};
use tsrepl::{NAME, VERSION};

/// Interactive ECMAScript/TypeScript REPL with import bindings and top-level await
#[derive(Parser, Debug)]
#[command(name = "tsrepl")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    /// History file to load and save
    #[arg(long, value_name = "FILE", conflicts_with = "no_history")]
    history: Option<PathBuf>,

    /// Do not keep a history file
    #[arg(long)]
    no_history: bool,

    /// Type-stripping command reading source on stdin, e.g. "esbuild --loader=ts"
    #[arg(long, value_name = "CMD")]
    compiler: Option<String>,

    /// The compiler only accepts JavaScript
    #[arg(long, requires = "compiler")]
    js: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    /// Flags take precedence over the user configuration
    fn merge_into(
        &self,
        mut config: UserConfig,
    ) -> UserConfig {
        if let Some(history) = &self.history {
            config.repl.history_file = Some(expand_home(history));
        } else if config.repl.history_file.is_none() {
            config.repl.history_file = default_history_file();
        }
        if self.no_history {
            config.repl.history_file = None;
        }
        if let Some(command) = &self.compiler {
            config.compiler.command = Some(command.clone());
            config.compiler.typescript = !self.js;
        }
        if self.no_color {
            config.repl.colors = false;
        }
        config
    }
}

fn default_history_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".tsrepl_history"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        logger::init_debug();
    } else {
        logger::init_from_env(LogLevel::Warn);
    }

    let config = match load_user_config() {
        Ok(config) => config,
        Err(err) => {
            warn!("ignoring user configuration: {err}");
            UserConfig::default()
        }
    };
    let config = args.merge_into(config);

    if args.print_config {
        print!("{}", render_config(&config)?);
        return Ok(());
    }
    debug!(?config, "effective configuration");

    let mut options = ReplOptions::default()
        .with_history_file(config.repl.history_file.clone())
        .with_history_size(config.repl.history_size)
        .with_colors(config.repl.colors);
    if let Some(command) = &config.compiler.command {
        let compiler = CommandCompiler::from_command_line(command, config.compiler.typescript)
            .with_context(|| format!("Invalid compiler command: {command}"))?;
        options = options.with_compiler(Arc::new(compiler));
    }

    let mut repl = Repl::new(PreviewHost::new(), options).context("Failed to create REPL")?;
    match repl.start() {
        Ok(_) => {}
        // Already reported on the console
        Err(ReplError::History(_)) => std::process::exit(1),
        Err(err) => return Err(err).context("Failed to start REPL"),
    }
    repl.run().context("REPL terminated with an error")?;

    Ok(())
}
