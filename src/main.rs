use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use nixai::config::Config;
use nixai::context::Context;
use nixai::function::FunctionCall;
use nixai::result::Progress;
use nixai::schema::Parameters;
use nixai::{functions, global, to_json};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("nixai")
        .about("NixOS assistant - run registered functions from the command line")
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Set the Anthropic API key")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("verbose")
            .long("verbose")
            .short('v')
            .help("Enable debug logging")
            .action(ArgAction::SetTrue)
            .global(true))
        .subcommand(Command::new("list")
            .about("List available functions"))
        .subcommand(Command::new("schema")
            .about("Show a function's schema as JSON")
            .arg(Arg::new("name")
                .help("Function name")
                .required(true)))
        .subcommand(Command::new("validate")
            .about("Check parameters against a function's schema without running it")
            .arg(Arg::new("name")
                .help("Function name")
                .required(true))
            .arg(params_arg()))
        .subcommand(Command::new("call")
            .about("Execute a function and print its result as JSON")
            .arg(Arg::new("name")
                .help("Function name")
                .required(true))
            .arg(params_arg())
            .arg(Arg::new("timeout")
                .long("timeout")
                .help("Timeout in seconds (0 disables it)")
                .value_name("SECS")
                .value_parser(value_parser!(u64)))
            .arg(Arg::new("progress")
                .long("progress")
                .help("Print progress events to stderr")
                .action(ArgAction::SetTrue)))
}

fn params_arg() -> Arg {
    Arg::new("params")
        .long("params")
        .help("Parameters as a JSON object")
        .value_name("JSON")
        .default_value("{}")
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    // Handle configuration commands
    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        let mut config = Config::load()?;
        config.set_api_key(api_key.clone())?;
        println!("✅ API key saved successfully");
        return Ok(());
    }

    if matches.get_flag("config") {
        Config::show_config_info()?;
        return Ok(());
    }

    let registry = global::registry();
    for err in functions::register_all(registry) {
        warn!("Failed to register built-in function: {}", err);
    }

    match matches.subcommand() {
        Some(("list", _)) => {
            for (name, description) in registry.list_available_functions() {
                println!("{:<8} {}", name, description);
            }
        }
        Some(("schema", sub)) => {
            let name = sub.get_one::<String>("name").map(String::as_str).unwrap_or_default();
            println!("{}", to_json(&registry.function_info(name)?));
        }
        Some(("validate", sub)) => {
            let name = sub.get_one::<String>("name").map(String::as_str).unwrap_or_default();
            let call = FunctionCall::new(name, parse_params(sub)?);
            match registry.validate_call(&call) {
                Ok(()) => println!("✅ Parameters for '{}' are valid", name),
                Err(err) => {
                    eprintln!("❌ {}", err);
                    std::process::exit(1);
                }
            }
        }
        Some(("call", sub)) => {
            if !call(sub).await? {
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("No command provided. Use 'nixai --help' for usage information.");
        }
    }

    Ok(())
}

fn parse_params(matches: &ArgMatches) -> anyhow::Result<Parameters> {
    let raw_params = matches.get_one::<String>("params").map(String::as_str).unwrap_or("{}");
    match serde_json::from_str::<Value>(raw_params)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("--params must be a JSON object, got: {}", other),
    }
}

/// Runs one function call and prints its result. Returns whether it succeeded.
async fn call(matches: &ArgMatches) -> anyhow::Result<bool> {
    let name = matches.get_one::<String>("name").map(String::as_str).unwrap_or_default();
    let params = parse_params(matches)?;

    let config = Config::load()?;
    let mut options = config.function_options();
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        options = options.with_timeout(Duration::from_secs(*secs));
    }

    let (ctx, guard) = Context::background().with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling function call");
            guard.cancel();
        }
    });

    let call = FunctionCall::with_context(ctx.clone(), name, params);
    info!("Calling function: {}", name);

    let registry = global::registry();
    let outcome = if matches.get_flag("progress") {
        let (tx, mut rx) = mpsc::channel::<Progress>(16);
        let printer = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                eprintln!("[{}] {:.0}% {}", progress.stage, progress.percentage, progress.message);
            }
        });
        let outcome = registry.execute_with_progress(&ctx, &call, Some(options), tx).await;
        let _ = printer.await;
        outcome
    } else {
        registry.execute(&ctx, &call, Some(options)).await
    };

    let result = match outcome {
        Ok(result) => result,
        Err(failure) => {
            error!("{}", failure);
            failure.into_result()
        }
    };

    println!("{}", to_json(&result));
    Ok(result.is_success())
}
