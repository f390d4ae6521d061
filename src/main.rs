pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod generator;
pub mod graph;
pub mod model;
pub mod refs;
pub mod resolve;
pub mod rules;
pub mod schema;
pub mod source;
pub mod writer;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();

    let default_level = if command_line_interface.verbose() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    command_line_interface.run()
}
