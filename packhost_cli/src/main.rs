use clap::{Parser, Subcommand};
use commands::{DeleteCommand, InspectCommand, ListCommand, UploadCommand};
use connection::ServerArgs;

mod commands;
mod connection;

/// Manage the modpacks hosted on a packhost server
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Upload(UploadCommand),
    List(ListCommand),
    Delete(DeleteCommand),
    Inspect(InspectCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    pretty_env_logger::init();

    let args = Args::parse();

    match args.commands {
        Commands::Upload(upload) => upload.run(&args.server).await,
        Commands::List(list) => list.run(&args.server).await,
        Commands::Delete(delete) => delete.run(&args.server).await,
        Commands::Inspect(inspect) => inspect.run().await,
    }
}
