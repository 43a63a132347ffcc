pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Operate Concierge migrations, demo data, readiness checks, and assistant simulations.",
    after_help = "Examples:\n  concierge doctor --json\n  concierge seed\n  concierge simulate --customer 7f1e2d3c-4b5a-4697-8877-665544332211 --message \"Do you deliver?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo customer profile and conversation fixtures")]
    Seed,
    #[command(about = "Validate config, LLM key and messaging readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one simulator message for a customer and print the assistant reply")]
    Simulate {
        #[arg(long, help = "Customer profile id (UUID)")]
        customer: String,
        #[arg(long, help = "Message text sent as the end customer")]
        message: String,
        #[arg(long, help = "Conversation id to continue; a new one is generated when absent")]
        conversation: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Simulate { customer, message, conversation } => {
            commands::simulate::run(customer, message, conversation)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
