// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI configuration loaded from environment variables and arguments.

use std::path::PathBuf;

use vac_lite_complex::Settings;

use crate::error::CliError;

/// What to do with the input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print cell statistics.
    Info,
    /// Validate the complex, failing when invalid.
    Check,
    /// Write the document in the format of the output path.
    Convert,
}

impl Command {
    fn parse(s: &str) -> Result<Self, CliError> {
        match s {
            "info" => Ok(Command::Info),
            "check" => Ok(Command::Check),
            "convert" => Ok(Command::Convert),
            other => Err(CliError::UnknownCommand(other.to_string())),
        }
    }
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    /// Document to read.
    pub input: Option<PathBuf>,
    /// Document to write (convert only).
    pub output: Option<PathBuf>,
    /// Print statistics as JSON instead of text.
    pub json_stats: bool,
    /// Settings of the loaded complex.
    pub settings: Settings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            command: std::env::var("VAC_COMMAND")
                .ok()
                .and_then(|c| Command::parse(&c).ok())
                .unwrap_or(Command::Info),
            input: std::env::var("VAC_INPUT").ok().map(PathBuf::from),
            output: std::env::var("VAC_OUTPUT").ok().map(PathBuf::from),
            json_stats: std::env::var("VAC_STATS_JSON")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),
            settings: Settings::from_env(),
        }
    }

    /// Applies `[--json] <command> [INPUT] [OUTPUT]`. Positional paths
    /// override the environment.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), CliError> {
        let mut positional = Vec::new();
        for arg in args {
            match arg.as_str() {
                "--json" => self.json_stats = true,
                flag if flag.starts_with("--") => return Err(CliError::UnknownFlag(flag.to_string())),
                _ => positional.push(arg.as_str()),
            }
        }
        let mut rest = positional.into_iter();
        if let Some(c) = rest.next() {
            self.command = Command::parse(c)?;
        }
        if let Some(input) = rest.next() {
            self.input = Some(PathBuf::from(input));
        }
        if let Some(output) = rest.next() {
            self.output = Some(PathBuf::from(output));
        }
        if let Some(extra) = rest.next() {
            return Err(CliError::UnexpectedArgument(extra.to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn positional_arguments_fill_paths() {
        let mut config = Config::from_env();
        config
            .apply_args(&args(&["convert", "in.vec", "out.json"]))
            .unwrap();
        assert_eq!(config.command, Command::Convert);
        assert_eq!(config.input, Some(PathBuf::from("in.vec")));
        assert_eq!(config.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn json_flag_anywhere() {
        let mut config = Config::from_env();
        config.apply_args(&args(&["info", "--json", "a.vec"])).unwrap();
        assert!(config.json_stats);
        assert_eq!(config.command, Command::Info);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        let mut config = Config::from_env();
        assert!(config.apply_args(&args(&["explode"])).is_err());
        assert!(config.apply_args(&args(&["--verbose"])).is_err());
        assert!(config.apply_args(&args(&["convert", "a", "b", "c"])).is_err());
    }
}
