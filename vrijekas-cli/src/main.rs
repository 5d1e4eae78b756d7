use std::io;

use clap::Parser;
use tracing::debug;

use vrijekas_cli::logging::{self, LogOptions};
use vrijekas_cli::{app, cli::Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&LogOptions {
        level: cli.log_level.as_deref(),
        quiet: cli.quiet,
        file: cli.log_file.as_deref(),
    })?;

    let db_config = cli.db_config();
    debug!(backend = %db_config.backend, db = %db_config.connection_string, "Opening store");

    let repo = app::open_store(&db_config).await?;

    app::run(&cli.command, repo.as_ref(), &mut io::stdout()).await
}
