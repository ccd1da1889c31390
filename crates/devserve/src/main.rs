//! devserve CLI - static dev server for single-page apps.
//!
//! Serves the current directory (or a configured root) with SPA fallback
//! routing and pushes live reload events to connected browsers.

mod error;
mod output;
mod serve;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use error::CliError;
use output::Output;
use serve::ServeArgs;

/// devserve - static dev server with live reload.
#[derive(Parser, Debug)]
#[command(name = "devserve", version, about)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.serve.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let rt = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    rt.block_on(cli.serve.execute())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "devserve",
            "--root",
            "public",
            "--port",
            "3000",
            "--host",
            "0.0.0.0",
            "--no-live-reload",
            "--no-spa-fallback",
            "-v",
        ])
        .unwrap();

        let settings = cli.serve.cli_settings();
        assert_eq!(settings.root_dir, Some(PathBuf::from("public")));
        assert_eq!(settings.port, Some(3000));
        assert_eq!(settings.host, Some("0.0.0.0".to_owned()));
        assert_eq!(settings.live_reload_enabled, Some(false));
        assert_eq!(settings.spa_fallback, Some(false));
        assert!(cli.serve.verbose);
    }

    #[test]
    fn test_parse_defaults_leave_config_untouched() {
        let cli = Cli::try_parse_from(["devserve", "--port", "4000"]).unwrap();

        let settings = cli.serve.cli_settings();
        assert_eq!(settings.host, None);
        assert_eq!(settings.root_dir, None);
        assert_eq!(settings.live_reload_enabled, None);
        assert_eq!(settings.spa_fallback, None);
        assert!(!cli.serve.verbose);
    }

    #[test]
    fn test_port_from_environment() {
        // SAFETY: PORT is only mutated by this test
        unsafe {
            std::env::set_var("PORT", "8081");
        }
        let from_env = Cli::try_parse_from(["devserve"]).unwrap();
        let from_flag = Cli::try_parse_from(["devserve", "--port", "9090"]).unwrap();
        unsafe {
            std::env::remove_var("PORT");
        }

        assert_eq!(from_env.serve.cli_settings().port, Some(8081));
        assert_eq!(from_flag.serve.cli_settings().port, Some(9090));
    }

    #[test]
    fn test_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["devserve", "--port", "not-a-port"]).is_err());
        assert!(Cli::try_parse_from(["devserve", "--port", "70000"]).is_err());
    }
}
