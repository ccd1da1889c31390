//! Serve command: load configuration, bind, print the banner, run.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;
use devserve_config::{CliSettings, Config};
use devserve_server::{DevServer, LIVE_RELOAD_PATH, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for serving a directory.
#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover devserve.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (default: site.root_dir, else the current directory).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config).
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Disable live reload.
    #[arg(long)]
    no_live_reload: bool,

    /// Return 404 for unmatched routes instead of serving the root index.
    #[arg(long)]
    no_spa_fallback: bool,

    /// Enable verbose output (request and reload logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;
        let server_config = server_config_from_config(&config);
        let live_reload_requested = server_config.live_reload_enabled;
        let root_dir = server_config.root_dir.clone();

        let server = DevServer::bind(server_config).await?;

        output.highlight(&format!(
            "Dev server running at {}",
            display_url(server.local_addr())
        ));
        output.info(&format!("Serving: {}", root_dir.display()));
        if let Some(config_path) = &config.config_path {
            output.info(&format!("Config: {}", config_path.display()));
        }
        if server.live_reload_active() {
            output.info(&format!("Live reload: enabled ({LIVE_RELOAD_PATH})"));
        } else if live_reload_requested {
            output.warning("Live reload: disabled (file watching unavailable)");
        } else {
            output.info("Live reload: disabled");
        }

        server.serve().await?;

        Ok(())
    }

    /// Map flags onto configuration overrides.
    pub(crate) fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            root_dir: self.root.clone(),
            spa_fallback: self.no_spa_fallback.then_some(false),
            live_reload_enabled: self.no_live_reload.then_some(false),
        }
    }
}

/// URL to show for a bound address; wildcard and loopback binds read as localhost.
fn display_url(addr: SocketAddr) -> String {
    let ip = addr.ip();
    if ip.is_loopback() || ip.is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{addr}")
    }
}
