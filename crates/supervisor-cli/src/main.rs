//! # supervisorctl-rs
//!
//! Command-line front end for supervisord's XML-RPC control API.
//!
//! ## Usage
//!
//! ```bash
//! # Show every process
//! supervisorctl-rs status
//!
//! # Start one process, a whole group, or everything
//! supervisorctl-rs start cat
//! supervisorctl-rs start web:*
//! supervisorctl-rs start all
//!
//! # Talk to a Unix socket with credentials
//! supervisorctl-rs --server unix:///var/run/supervisor.sock -u user -p 123 status
//!
//! # Make a raw call (outputs JSON)
//! supervisorctl-rs call supervisor.getProcessInfo -a '["cat"]'
//! ```
//!
//! ## Environment
//!
//! - `SUPERVISOR_SERVER_URL`: server when `--server` is not given
//! - `SUPERVISOR_USERNAME` / `SUPERVISOR_PASSWORD`: credentials
//! - `RUST_LOG`: log filter (default `warn`); logs go to stderr

mod output;

use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use supervisor_client::{
    ClientConfig, ConnectionPolicy, FaultCode, SupervisorClient, SupervisorError, Value,
};

const DEFAULT_SERVER: &str = "http://127.0.0.1:9001";
const SERVER_ENV: &str = "SUPERVISOR_SERVER_URL";
const USERNAME_ENV: &str = "SUPERVISOR_USERNAME";
const PASSWORD_ENV: &str = "SUPERVISOR_PASSWORD";

#[derive(FromArgs)]
/// Control a supervisord instance over its XML-RPC interface
struct Cli {
    /// server URL: http://host:port, host:port or unix:///path/to/socket
    ///
    /// Falls back to $SUPERVISOR_SERVER_URL, then http://127.0.0.1:9001.
    #[argh(option, short = 's')]
    server: Option<String>,

    /// username for HTTP basic authentication
    #[argh(option, short = 'u')]
    username: Option<String>,

    /// password for HTTP basic authentication
    #[argh(option, short = 'p')]
    password: Option<String>,

    /// timeout for connecting and for each call, in milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// keep one connection open for all calls of this invocation
    #[argh(switch)]
    persistent: bool,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Call(CallArgs),
    Status(StatusArgs),
    Start(StartArgs),
    Stop(StopArgs),
    Restart(RestartArgs),
    Tail(TailArgs),
    Methods(MethodsArgs),
    Version(VersionArgs),
}

/// Arguments for a raw call.
///
/// The result is printed as compact JSON on stdout, suitable for piping into
/// `jq`. Faults are reported on stderr with a non-zero exit code.
///
/// # Examples
///
/// ```bash
/// supervisorctl-rs call supervisor.getState
/// supervisorctl-rs call supervisor.readLog -a '[-200, 0]'
/// supervisorctl-rs call supervisor.getProcessInfo -a '"cat"'
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call an XML-RPC method and print the result as JSON
struct CallArgs {
    /// fully qualified method name, e.g. supervisor.getState
    #[argh(positional)]
    method: String,

    /// JSON arguments: an array is the parameter list, anything else is a
    /// single parameter
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
/// show process status
struct StatusArgs {
    /// print JSON instead of a table
    #[argh(switch)]
    json: bool,

    /// processes to show (default: all)
    #[argh(positional)]
    names: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
/// start processes: name, group:*, or all
struct StartArgs {
    /// return without waiting for the processes to be RUNNING
    #[argh(switch)]
    no_wait: bool,

    /// processes to start
    #[argh(positional)]
    names: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "stop")]
/// stop processes: name, group:*, or all
struct StopArgs {
    /// return without waiting for the processes to stop
    #[argh(switch)]
    no_wait: bool,

    /// processes to stop
    #[argh(positional)]
    names: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "restart")]
/// stop then start processes: name, group:*, or all
struct RestartArgs {
    /// processes to restart
    #[argh(positional)]
    names: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "tail")]
/// print the end of a process log
struct TailArgs {
    /// number of bytes to show
    #[argh(option, short = 'n', default = "1600")]
    bytes: i64,

    /// read stderr instead of stdout
    #[argh(switch)]
    stderr: bool,

    /// process name
    #[argh(positional)]
    name: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "methods")]
/// list the server's methods, or show help for one
struct MethodsArgs {
    /// method to describe
    #[argh(positional)]
    method: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
/// show supervisord and API versions
struct VersionArgs {}

/// What a process argument on the command line refers to.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    All,
    Group(&'a str),
    Process(&'a str),
}

impl<'a> Target<'a> {
    fn parse(name: &'a str) -> Self {
        match name {
            "all" => Target::All,
            _ => match name.strip_suffix(":*") {
                Some(group) => Target::Group(group),
                None => Target::Process(name),
            },
        }
    }
}

fn env_or(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| std::env::var(var).ok())
}

fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let server = env_or(cli.server.clone(), SERVER_ENV).unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let mut config = ClientConfig::from_url(&server)
        .with_context(|| format!("invalid server address '{}'", server))?;

    let username = env_or(cli.username.clone(), USERNAME_ENV);
    let password = env_or(cli.password.clone(), PASSWORD_ENV);
    match (username, password) {
        (Some(username), Some(password)) => config = config.with_credentials(username, password),
        (None, None) => {}
        _ => anyhow::bail!("--username and --password must be given together"),
    }

    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if cli.persistent {
        config = config.with_connection_policy(ConnectionPolicy::Persistent);
    }

    Ok(config)
}

/// Parses `--args` JSON into the parameter list of a raw call.
fn call_params(args: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(args).with_context(|| format!("--args is not valid JSON: {}", args))?;
    Ok(Value::from(json))
}

async fn start(client: &SupervisorClient, name: &str, wait: bool) -> Result<Value> {
    let result = match Target::parse(name) {
        Target::All => client.start_all_processes(wait).await,
        Target::Group(group) => client.start_process_group(group, wait).await,
        Target::Process(process) => client.start_process(process, wait).await,
    };
    result.with_context(|| format!("{}: ERROR", name))
}

async fn stop(client: &SupervisorClient, name: &str, wait: bool) -> Result<Value> {
    let result = match Target::parse(name) {
        Target::All => client.stop_all_processes(wait).await,
        Target::Group(group) => client.stop_process_group(group, wait).await,
        Target::Process(process) => client.stop_process(process, wait).await,
    };
    result.with_context(|| format!("{}: ERROR", name))
}

/// Prints the outcome of a start or stop. Group and `all` targets answer with
/// one result per process; any failed entry fails the command.
fn report(name: &str, result: &Value, verb: &str) -> Result<()> {
    let Some(results) = result.as_array() else {
        println!("{}: {}", name, verb);
        return Ok(());
    };

    let (lines, failed) = output::batch_results(results, verb);
    if !lines.is_empty() {
        println!("{}", lines);
    }
    anyhow::ensure!(failed == 0, "{}: {} of {} processes failed", name, failed, results.len());
    Ok(())
}

fn is_not_running(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SupervisorError>()
        .and_then(SupervisorError::as_fault)
        .and_then(|fault| fault.known_code())
        == Some(FaultCode::NotRunning)
}

async fn run(cli: Cli) -> Result<()> {
    let client = SupervisorClient::new(client_config(&cli)?);
    tracing::debug!(endpoint = %client.endpoint(), policy = ?client.policy(), "client configured");

    match cli.command {
        Commands::Call(args) => {
            let (namespace, method) = args
                .method
                .split_once('.')
                .with_context(|| format!("method '{}' must be namespace.method", args.method))?;
            let result = client.call(namespace, method, call_params(&args.args)?).await?;
            println!("{}", output::json(result));
        }
        Commands::Status(args) => {
            let infos = if args.names.is_empty() {
                client.all_process_info().await?
            } else {
                let mut infos = Vec::with_capacity(args.names.len());
                for name in &args.names {
                    infos.push(client.process_info(name).await?);
                }
                infos
            };

            if args.json {
                println!("{}", serde_json::to_string(&infos)?);
            } else if !infos.is_empty() {
                println!("{}", output::status_table(&infos));
            }
        }
        Commands::Start(args) => {
            anyhow::ensure!(!args.names.is_empty(), "start: no process names given");
            for name in &args.names {
                let result = start(&client, name, !args.no_wait).await?;
                report(name, &result, "started")?;
            }
        }
        Commands::Stop(args) => {
            anyhow::ensure!(!args.names.is_empty(), "stop: no process names given");
            for name in &args.names {
                let result = stop(&client, name, !args.no_wait).await?;
                report(name, &result, "stopped")?;
            }
        }
        Commands::Restart(args) => {
            anyhow::ensure!(!args.names.is_empty(), "restart: no process names given");
            for name in &args.names {
                match stop(&client, name, true).await {
                    Ok(result) => report(name, &result, "stopped")?,
                    Err(err) if is_not_running(&err) => {}
                    Err(err) => return Err(err),
                }
                let result = start(&client, name, true).await?;
                report(name, &result, "started")?;
            }
        }
        Commands::Tail(args) => {
            let offset = 0;
            let tail = if args.stderr {
                client.tail_stderr(&args.name, offset, args.bytes).await?
            } else {
                client.tail_stdout(&args.name, offset, args.bytes).await?
            };
            print!("{}", output::tail(&tail));
        }
        Commands::Methods(args) => {
            let result = match args.method {
                Some(method) => client.method_help(&method).await?,
                None => client.list_methods().await?,
            };
            println!("{}", output::lines(result));
        }
        Commands::Version(_) => {
            let version = client.get_supervisor_version().await?;
            let api = client.get_api_version().await?;
            println!(
                "supervisord {} (API {})",
                version.as_str().unwrap_or("unknown"),
                api.as_str().unwrap_or("unknown")
            );
        }
    }

    client.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // stdout is reserved for command output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}
