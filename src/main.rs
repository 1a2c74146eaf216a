//! wml-node CLI - runs the `ai-function` node outside a workflow host

use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use wml_node::validate::{check_connection, check_params};
use wml_node::{FixSuggestion, FunctionNode, Message, Mode, NodeError, NodeFile, ParamBag};

#[derive(Parser)]
#[command(name = "wml-node")]
#[command(about = "Score workflow messages against a Watson Machine Learning deployment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message through the node and print the outbound message
    Run {
        /// Path to the node file (YAML)
        file: String,

        /// Message JSON file ('-' for stdin, the default)
        #[arg(short, long, conflicts_with = "payload")]
        message: Option<String>,

        /// Payload JSON (wrapped in a fresh message)
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Check mode settings and connection profile without calling the service
    Validate {
        /// Path to the node file (YAML)
        file: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the outbound message
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            message,
            payload,
        } => run_node(&file, message.as_deref(), payload.as_deref()).await,
        Commands::Validate { file } => validate_node(&file),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.downcast_ref::<NodeError>().and_then(|n| n.fix_suggestion()) {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_node(file: &str, message: Option<&str>, payload: Option<&str>) -> Result<ExitCode> {
    let node_file = NodeFile::load(file)?;
    let node = FunctionNode::new(node_file)?;
    let msg = read_message(message, payload)?;

    let out = node.on_input(msg).await;

    println!("{}", serde_json::to_string_pretty(&out)?);

    match out.error() {
        None => Ok(ExitCode::SUCCESS),
        Some(report) => {
            let text = report["message"].as_str().unwrap_or("scoring failed");
            eprintln!("{} {}", "Error:".red().bold(), text);
            if let Some(fix) = report["suggestion"].as_str() {
                eprintln!("  {} {}", "Fix:".yellow(), fix);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_message(message: Option<&str>, payload: Option<&str>) -> Result<Message> {
    if let Some(payload) = payload {
        let value = serde_json::from_str(payload).context("--payload is not valid JSON")?;
        return Ok(Message::with_payload(value));
    }

    let raw = match message {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message file '{}'", path))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read message from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Message is not a valid JSON object")
}

fn validate_node(file: &str) -> Result<ExitCode> {
    let node_file = NodeFile::load(file)?;

    let mut params = ParamBag::new();
    let mode = check_params(&node_file.node, &mut params)?;
    let conn = check_connection(node_file.connection.as_ref())?;

    println!("{} Node '{}' is valid", "✓".green(), file);
    println!("  Name: {}", node_file.node.display_name());
    println!("  Mode: {}", mode);
    if let Mode::Unknown(name) = &mode {
        println!(
            "  {} mode '{}' is not supported; messages will fail at dispatch",
            "Warning:".yellow(),
            name
        );
    }
    if let Some(deployment_id) = &params.deployment_id {
        println!("  Deployment: {}", deployment_id);
    }
    println!("  Host: {}", conn.host());
    println!("  Instance: {}", conn.instance_id);

    Ok(ExitCode::SUCCESS)
}
