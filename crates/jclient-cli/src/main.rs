//! jclient CLI
//!
//! Command-line front end for the semantic JSON services: compile join and
//! order specs offline, log in, page through a query, or check that a
//! session is alive.

use clap::{Parser, Subcommand};
use jclient_core::ClientConfig;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

/// jclient - query semantic JSON services from the command line
#[derive(Parser, Debug)]
#[command(name = "jclient")]
#[command(version, about, long_about = None)]
struct Args {
    /// Service root URL
    #[arg(long, env = "JSERV_ROOT", default_value = jclient_core::config::DEFAULT_SERV_ROOT)]
    serv: String,

    /// Connection id configured at the server
    #[arg(long, env = "JSERV_CONN")]
    conn: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Log request and response bodies
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct Credentials {
    /// User id
    #[arg(short, long, env = "JSERV_UID")]
    pub uid: String,

    /// Password
    #[arg(short, long, env = "JSERV_PSWD", hide_env_values = true)]
    pub pswd: String,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct Spec {
    /// Join spec, e.g. "a_users:u, j:a_roles:r r.roleId = u.roleId"
    #[arg(short, long)]
    pub t: String,

    /// Order spec, e.g. "userName desc"
    #[arg(short, long)]
    pub order: Option<String>,

    /// Variables for {@ path} markers, as a JSON object
    #[arg(short, long)]
    pub args: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a join/order spec into a query body, without a server
    Compile {
        #[command(flatten)]
        spec: Spec,
    },

    /// Log in and print the session info
    Login {
        #[command(flatten)]
        cred: Credentials,
    },

    /// Log in and load one page of a query
    Query {
        #[command(flatten)]
        cred: Credentials,

        #[command(flatten)]
        spec: Spec,

        /// Zero based page index
        #[arg(long, default_value_t = 0)]
        page: i64,

        /// Page size
        #[arg(long, default_value_t = jclient_core::config::DEFAULT_PAGE_SIZE)]
        size: i64,
    },

    /// Log in and send a heartbeat
    Ping {
        #[command(flatten)]
        cred: Credentials,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::new()
        .with_serv_root(args.serv)
        .with_verbose(args.verbose);
    if let Some(conn) = args.conn {
        config = config.with_conn_id(conn);
    }
    let json_output = matches!(args.format, OutputFormat::Json);

    let result = match args.command {
        Command::Compile { spec } => commands::compile(&spec, json_output),
        Command::Login { cred } => commands::login(config, &cred, json_output).await,
        Command::Query {
            cred,
            spec,
            page,
            size,
        } => commands::query(config, &cred, &spec, page, size, json_output).await,
        Command::Ping { cred } => commands::ping(config, &cred).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
