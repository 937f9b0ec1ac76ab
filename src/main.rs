// Entrypoint for the shell.
// - Keeps `main` small: resolve settings, log in, and hand over to the
//   session loop.
// - Returns `anyhow::Result` so startup failures exit non-zero with context.

use anyhow::Context;
use clap::Parser;
use raindrop_shell::config::{Cli, Settings};
use raindrop_shell::logging;
use raindrop_shell::search::SearchAggregator;
use raindrop_shell::ui::{ConsoleTerminal, HttpProbe, Session};

fn main() -> anyhow::Result<()> {
    // A missing .env is fine; a malformed one is worth knowing about.
    let dotenv = dotenvy::dotenv();
    logging::init()?;
    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "ignoring unreadable .env file");
        }
    }

    let settings = Settings::from_cli(Cli::parse())?;
    let api = settings.connect().context("Failed to set up the HTTP client")?;
    let probe = HttpProbe::new().context("Failed to set up the link probe")?;

    let mut session = Session::new(api, settings.local_state(), ConsoleTerminal::new(), Box::new(probe))
        .with_aggregator(SearchAggregator::new(settings.page_size));
    session
        .login(settings.force_refresh)
        .context("Unable to log into Raindrop.io")?;

    // Blocks until the user exits or input ends.
    session.run()?;
    Ok(())
}
