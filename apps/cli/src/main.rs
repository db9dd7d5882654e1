// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VAC-Lite command line.
//!
//! ```text
//! vac-lite [--json] info    <INPUT>
//! vac-lite          check   <INPUT>
//! vac-lite          convert <INPUT> <OUTPUT>
//! ```
//!
//! Formats follow the file extension: `.vec`/`.xml` documents, `.txt`/`.vac`
//! legacy text, `.json` snapshots. Paths may also come from `VAC_INPUT` and
//! `VAC_OUTPUT`; complex settings from the `VAC_*` variables.

mod config;
mod document;
mod error;
mod stats;

use config::{Command, Config};
use error::CliError;
use stats::Stats;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,vac_lite_cli=info".into()))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    config.apply_args(&args)?;

    let input = config.input.clone().ok_or(CliError::MissingInput)?;
    tracing::info!(command = ?config.command, input = %input.display(), "Starting VAC-Lite");

    let vac = document::load(&input, config.settings.clone())?;
    let stats = Stats::of(&vac);

    match config.command {
        Command::Info => {
            if config.json_stats {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats);
            }
        }
        Command::Check => {
            if !stats.valid {
                return Err(CliError::Invalid(stats.invalid_cells.len()).into());
            }
            println!("{}: valid ({} cells)", input.display(), stats.cells);
        }
        Command::Convert => {
            let output = config.output.clone().ok_or(CliError::MissingOutput)?;
            if !stats.valid {
                tracing::warn!(invalid = stats.invalid_cells.len(), "converting an invalid complex");
            }
            document::save(&vac, &output)?;
            tracing::info!(output = %output.display(), cells = stats.cells, "document converted");
        }
    }
    Ok(())
}
