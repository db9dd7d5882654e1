// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the command line.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Unknown command '{0}' (expected info, check or convert)")]
    UnknownCommand(String),

    #[error("Unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("Unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error("Missing input document")]
    MissingInput,

    #[error("Missing output document")]
    MissingOutput,

    #[error("Cannot tell the document format of {0}")]
    UnknownFormat(PathBuf),

    #[error("Complex is invalid: {0} cell(s) failed validation")]
    Invalid(usize),
}
