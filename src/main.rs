// Cube - Container session orchestration service
use clap::Parser;
use cube::cli::args::Args;
use cube::cli::commands::execute_command;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = execute_command(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
