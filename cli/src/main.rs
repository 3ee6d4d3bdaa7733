//! friendgraph CLI — builds the mutual-friend graph of the logged-in user
//!
//! Progress goes to stdout, logs to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use friendgraph::{
    login_url, CallbackListener, ConsoleProgress, FriendGraphConfig, FriendSource, GraphApiClient,
    GraphBuilder, InMemorySource,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "friendgraph", version, about = "Mutual-friend graph builder with GraphML export")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "FRIENDGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Base directory for cache and graph files
    #[arg(long, global = true, env = "FRIENDGRAPH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser and print the access token
    Login {
        /// OAuth application id
        #[arg(long, env = "FRIENDGRAPH_APP_ID")]
        app_id: Option<String>,

        /// Local port for the login redirect
        #[arg(long)]
        port: Option<u16>,

        /// Seconds to wait for the browser login
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Build the graph of the user behind an access token
    Build {
        /// Access token; when absent, log in through the browser first
        #[arg(long, env = "FRIENDGRAPH_TOKEN", hide_env_values = true)]
        access_token: Option<String>,

        /// OAuth application id, used only when logging in
        #[arg(long, env = "FRIENDGRAPH_APP_ID")]
        app_id: Option<String>,

        /// Local port for the login redirect
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the built-in sample graph without network access
    Demo,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "friendgraph=debug" } else { "friendgraph=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => FriendGraphConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => FriendGraphConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Login {
            app_id,
            port,
            timeout_secs,
        } => {
            apply_login_overrides(&mut config, app_id, port);
            if let Some(secs) = timeout_secs {
                config.login_timeout_secs = secs;
            }
            let token = login(&config).await?;
            println!("{}", token);
        }
        Commands::Build {
            access_token,
            app_id,
            port,
        } => {
            apply_login_overrides(&mut config, app_id, port);
            let token = match access_token {
                Some(token) => token,
                None => login(&config).await?,
            };
            let client = GraphApiClient::new(token, &config)?;
            build(GraphBuilder::new(client, &config.data_dir)).await?;
        }
        Commands::Demo => {
            build(GraphBuilder::new(InMemorySource::sample(), &config.data_dir)).await?;
        }
    }

    Ok(())
}

fn apply_login_overrides(config: &mut FriendGraphConfig, app_id: Option<String>, port: Option<u16>) {
    if app_id.is_some() {
        config.app_id = app_id;
    }
    if let Some(port) = port {
        config.callback_port = port;
    }
}

async fn login(config: &FriendGraphConfig) -> Result<String> {
    let Some(app_id) = config.app_id.as_deref() else {
        bail!("an app id is required to log in (--app-id or app_id in the config file)");
    };

    let listener = CallbackListener::bind(("127.0.0.1", config.callback_port))
        .await
        .with_context(|| format!("listening for the login redirect on port {}", config.callback_port))?;

    eprintln!("Open this URL in your browser to log in:");
    eprintln!("  {}", login_url(app_id, &listener.redirect_uri()));

    let outcome = listener
        .wait_for_outcome(Duration::from_secs(config.login_timeout_secs))
        .await?;
    Ok(outcome.into_token()?)
}

/// Run a build; Ctrl-C drops the run, which still saves the cache
async fn build<S: FriendSource>(builder: GraphBuilder<S>) -> Result<()> {
    let mut progress = ConsoleProgress::stdout();

    tokio::select! {
        result = builder.run_with_progress(&mut progress) => {
            result?;
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            bail!("interrupted; mutual friends fetched so far were saved")
        }
    }
}
