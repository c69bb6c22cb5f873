//! ircues CLI: incident-response command recipes.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ircues",
    version,
    about = "Incident-response command recipes: composable checklists rendered to concrete commands"
)]
struct Cli {
    #[command(subcommand)]
    command: ircues::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = ircues::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
