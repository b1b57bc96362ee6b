//! Utility module for command line interfaces

use std::{error::Error, fmt, fmt::Display, str::FromStr};

/// An error struct to wrap simple static error messages
#[derive(Debug, PartialEq, Eq)]
pub struct CliErr(pub &'static str);

impl Display for CliErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Error for CliErr {}

/// Parse an optional positional argument.
/// Missing arguments are fine, malformed ones turn into `CliErr(msg)`.
pub fn parse_optional_arg<T: FromStr>(arg: Option<String>, msg: &'static str) -> Result<Option<T>, CliErr> {
    arg.map(|arg| arg.parse().map_err(|_| CliErr(msg))).transpose()
}
