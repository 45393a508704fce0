mod cli;
mod config;
mod database;
mod error;
mod hash;
mod journal;
mod planner;
mod reports;
mod scripts;
mod targets;
mod upgrader;

use cli::Cli;

fn main() {
    if let Err(err) = Cli::handle_command_line() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
