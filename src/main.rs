use clap::Parser as CliParser;
use seanode::driver::{execute, Config};

fn main() {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = execute(config) {
        eprintln!("{}", err.render());
        std::process::exit(1);
    }
}
