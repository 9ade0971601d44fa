// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tidepool - CommonJS module runner
//!
//! ```text
//! tidepool app.js          # require ./app.js as the main module
//! tidepool ./project       # require the package or index file in ./project
//! tidepool -e "1 + 2"      # evaluate as the main module
//! cat app.js | tidepool    # evaluate stdin as the main module
//! tidepool                 # interactive REPL
//! ```

mod repl;

use anyhow::Context as _;
use clap::Parser;
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tidepool_node::{Context, ContextOptions, NodeError, VERSION};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tidepool",
    about = "CommonJS module runner and REPL",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Script or package directory to run
    script: Option<PathBuf>,

    /// Evaluate script from command line
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Start interactive REPL
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Base directory for resolution and process.cwd()
    #[arg(long)]
    basedir: Option<PathBuf>,

    /// Directory of *.js files replacing the bundled builtins
    #[arg(long = "builtin-dir")]
    builtin_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// Stack size of the thread scripts run on.
const STACK_SIZE: usize = 64 * 1024 * 1024;

/// Native stack scripts may use, leaving headroom below [`STACK_SIZE`].
const STACK_BUDGET: usize = 56 * 1024 * 1024;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tidepool=debug,tidepool_node=debug"
    } else {
        "tidepool=warn,tidepool_node=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TIDEPOOL_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Contexts are single-threaded, so everything runs on one thread sized
    // for deep require chains
    let result = std::thread::Builder::new()
        .name("tidepool".to_string())
        .stack_size(STACK_SIZE)
        .spawn(move || run(cli))
        .map_err(anyhow::Error::from)
        .and_then(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err(anyhow::anyhow!("script thread panicked")))
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// `NodeError` can carry script values, which are not `Send`, so it is
/// rendered into an `anyhow::Error` at the CLI boundary.
pub(crate) fn report(err: NodeError) -> anyhow::Error {
    anyhow::anyhow!("{}", err)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut options = ContextOptions::default();
    if let Some(basedir) = cli.basedir {
        options.basedir = basedir;
    }
    options.builtin_dir = cli.builtin_dir;
    options.stack_budget = STACK_BUDGET;

    if let Some(code) = cli.eval {
        tracing::debug!(len = code.len(), "evaluating --eval source");
        let cx = Context::new(options).map_err(report)?;
        cx.eval_as_module(&code, "[eval]", true).map_err(report)?;
        return Ok(());
    }

    if let Some(script) = cli.script {
        let script = std::path::absolute(&script)
            .with_context(|| format!("invalid script path '{}'", script.display()))?;
        tracing::debug!(script = %script.display(), "running script");
        let cx = Context::new(options).map_err(report)?;
        cx.require(&script.to_string_lossy()).map_err(report)?;
        return Ok(());
    }

    if !cli.interactive && !std::io::stdin().is_terminal() {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("failed to read script from stdin")?;
        tracing::debug!(len = code.len(), "evaluating stdin");
        let cx = Context::new(options).map_err(report)?;
        cx.eval_as_module(&code, "[stdin]", true).map_err(report)?;
        return Ok(());
    }

    let mut repl = repl::Repl::new(options)?;
    repl.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_keeps_node_error_message() {
        let err = report(NodeError::ModuleNotFound("./missing".to_string()));
        assert_eq!(err.to_string(), "Cannot find module './missing'");
    }

    #[test]
    fn test_report_is_sendable() {
        fn assert_send_sync<T: Send + Sync + 'static>(_: &T) {}
        let err = report(NodeError::InvalidArgument);
        assert_send_sync(&err);
        assert_eq!(err.to_string(), "path must be a string");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["tidepool", "--builtin-dir", "lib", "--verbose", "app.js"])
            .unwrap();
        assert_eq!(cli.script, Some(PathBuf::from("app.js")));
        assert_eq!(cli.builtin_dir, Some(PathBuf::from("lib")));
        assert!(cli.verbose);
        assert!(cli.eval.is_none());
    }
}
