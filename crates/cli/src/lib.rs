pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "fellah",
    about = "Fellah marketplace operator CLI",
    long_about = "Prepare the Fellah database and talk to the ordering assistant from a terminal.",
    after_help = "Examples:\n  fellah migrate\n  fellah seed\n  fellah chat --client-id 2 --language arabic"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the demo marketplace (products, farmers, clients, stock)")]
    Seed,
    #[command(about = "Chat with the ordering assistant on stdin as one client")]
    Chat {
        #[arg(long, default_value_t = 1, help = "Client id the conversation belongs to")]
        client_id: i64,
        #[arg(long, default_value = "french", help = "Starting language: french, arabic or english")]
        language: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Chat { client_id, language } => commands::chat::run(client_id, &language),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
