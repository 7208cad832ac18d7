use std::process::ExitCode;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};

use spaceboot::config::{Config, get_config_path, load_or_create_config, save_config};
use spaceboot::model::{ActionKind, AliasBinding, LaunchOutcome, Outcome};
use spaceboot::platform::current::login::{
    disable_launch_at_login, enable_launch_at_login, is_launch_at_login_enabled,
};
use spaceboot::rpc::{self, Request, RpcContext};

/// Keyboard alias launcher: start apps, or bring them to the front if running.
#[derive(Parser, Debug)]
#[command(name = "spaceboot", version)]
struct Cli {
    /// RPC address of the running instance (defaults to rpc.address from config)
    #[arg(long, global = true, value_name = "HOST:PORT")]
    address: Option<String>,

    /// Work on the alias database directly instead of the running instance
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run in the background (tray on macOS/Windows, headless on Linux)
    Run,
    /// List aliases
    List {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an alias
    Add {
        key: String,
        #[arg(value_enum)]
        kind: KindArg,
        target: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Replace an existing alias
    Update {
        id: i64,
        key: String,
        #[arg(value_enum)]
        kind: KindArg,
        target: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Remove an alias by id
    Remove { id: i64 },
    /// Dispatch the alias bound to KEY (bind this to a window-manager hotkey)
    Trigger { key: String },
    /// Send a raw RPC request and print the result
    Call {
        method: String,
        /// JSON params
        params: Option<String>,
    },
    /// Manage launch-at-login
    Autostart {
        #[arg(value_enum)]
        action: AutostartAction,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    App,
    Command,
    Script,
}

impl From<KindArg> for ActionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::App => ActionKind::LaunchApp,
            KindArg::Command => ActionKind::RunCommand,
            KindArg::Script => ActionKind::ExecuteScript,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AutostartAction {
    On,
    Off,
    Status,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run_cli(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> Result<ExitCode> {
    let config = load_or_create_config().context("failed to load configuration")?;
    let invoker = Invoker::new(&cli, &config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            log::info!("Starting spaceboot {}", env!("CARGO_PKG_VERSION"));
            spaceboot::run(config)?;
        }
        Command::List { json } => {
            let aliases = invoker.call(rpc::METHOD_GET_ALIASES, Value::Null)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&aliases)?);
            } else {
                let aliases: Vec<AliasBinding> = serde_json::from_value(aliases)?;
                print_aliases(&aliases);
            }
        }
        Command::Add {
            key,
            kind,
            target,
            comment,
        } => {
            let params = json!({
                "key": key,
                "actionKind": ActionKind::from(kind),
                "target": target,
                "comment": comment,
            });
            let added: AliasBinding =
                serde_json::from_value(invoker.call(rpc::METHOD_ADD_ALIAS, params)?)?;
            println!("Added alias {} \"{}\"", added.id, added.key);
        }
        Command::Update {
            id,
            key,
            kind,
            target,
            comment,
        } => {
            let alias = AliasBinding {
                id,
                key,
                action_kind: kind.into(),
                target,
                comment,
            };
            invoker.call(rpc::METHOD_UPDATE_ALIAS, serde_json::to_value(&alias)?)?;
            println!("Updated alias {}", id);
        }
        Command::Remove { id } => {
            let removed = invoker.call(rpc::METHOD_REMOVE_ALIAS, json!({ "id": id }))?;
            if removed == Value::Bool(true) {
                println!("Removed alias {}", id);
            } else {
                println!("Alias {} was already gone", id);
            }
        }
        Command::Trigger { key } => {
            let outcome: LaunchOutcome = serde_json::from_value(
                invoker.call(rpc::METHOD_DISPATCH_KEY, json!({ "key": key }))?,
            )?;
            return Ok(report_outcome(&key, &outcome));
        }
        Command::Call { method, params } => {
            let params = match params {
                Some(raw) => serde_json::from_str(&raw).context("params must be valid JSON")?,
                None => Value::Null,
            };
            let result = invoker.call(&method, params)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Autostart { action } => autostart(action, config)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Sends requests to the running instance, or answers them in-process with
/// `--local`.
enum Invoker {
    Remote(String),
    Local(RpcContext),
}

impl Invoker {
    fn new(cli: &Cli, config: &Config) -> Result<Self> {
        let needs_backend = !matches!(
            cli.command,
            None | Some(Command::Run) | Some(Command::Autostart { .. })
        );
        if cli.local && needs_backend {
            let service = spaceboot::app::build_service(config)?;
            return Ok(Invoker::Local(RpcContext {
                service,
                config: Arc::new(RwLock::new(config.clone())),
                config_path: get_config_path(),
            }));
        }
        let address = cli
            .address
            .clone()
            .unwrap_or_else(|| config.rpc.address.clone());
        Ok(Invoker::Remote(address))
    }

    fn call(&self, method: &str, params: Value) -> Result<Value> {
        match self {
            Invoker::Remote(address) => rpc::client::call(address, method, params),
            Invoker::Local(ctx) => {
                let request = Request {
                    id: 0,
                    method: method.to_string(),
                    params,
                };
                rpc::handle(ctx, &request)
                    .into_result()
                    .map_err(|e| anyhow::anyhow!("{} ({:?})", e.message, e.kind))
            }
        }
    }
}

fn print_aliases(aliases: &[AliasBinding]) {
    if aliases.is_empty() {
        println!("No aliases defined.");
        return;
    }
    let key_width = aliases
        .iter()
        .map(|a| a.key.chars().count())
        .max()
        .unwrap_or(0);
    for alias in aliases {
        println!(
            "{:>4}  {:<key_width$}  {:<14}  {}{}",
            alias.id,
            alias.key,
            alias.action_kind.as_str(),
            alias.target,
            alias
                .comment
                .as_deref()
                .map(|c| format!("  # {}", c))
                .unwrap_or_default(),
            key_width = key_width
        );
    }
}

fn report_outcome(key: &str, outcome: &LaunchOutcome) -> ExitCode {
    match outcome.outcome {
        Outcome::Launched => println!("{}: launched", key),
        Outcome::ActivatedExisting => println!("{}: brought to front", key),
        Outcome::Debounced => println!("{}: ignored (triggered again too quickly)", key),
        Outcome::Failed => {
            eprintln!(
                "{}: failed: {}",
                key,
                outcome.error_detail.as_deref().unwrap_or("unknown error")
            );
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn autostart(action: AutostartAction, mut config: Config) -> Result<()> {
    match action {
        AutostartAction::Status => {}
        AutostartAction::On => enable_launch_at_login()?,
        AutostartAction::Off => disable_launch_at_login()?,
    }
    let enabled = is_launch_at_login_enabled()?;
    if config.system.launch_at_login != enabled {
        config.system.launch_at_login = enabled;
        save_config(&config)?;
    }
    if enabled {
        println!("Launch at login: enabled");
    } else {
        println!("Launch at login: disabled");
    }
    if matches!(action, AutostartAction::On) && !enabled {
        bail!("launch-at-login did not take effect");
    }
    Ok(())
}
