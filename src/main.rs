use clap::Parser;
use tinycoin::{Cli, CliHandler};

fn main() {
    env_logger::init();

    let Ok(node_id) = std::env::var("NODE_ID") else {
        eprintln!("NODE_ID environment variable is not set");
        std::process::exit(1);
    };

    let cli = Cli::parse();
    let handler = CliHandler::new(node_id);

    if let Err(e) = handler.handle(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
