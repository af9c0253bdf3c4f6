use crate::ir::VerifyError;
use crate::parser::ParseError;
use std::io;
use termion::{color, style};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("invalid graph {phase}: {source}")]
    Verify {
        phase: &'static str,
        #[source]
        source: VerifyError,
    },
}

impl DriverError {
    pub fn verify(phase: &'static str) -> impl FnOnce(VerifyError) -> DriverError {
        move |source| DriverError::Verify { phase, source }
    }

    /// One colored line per error, ready for stderr.
    pub fn render(&self) -> String {
        match self {
            DriverError::Parse(err) => err
                .errors()
                .map(|(at, item)| format!("{}{}:{}:{}: {item}", prefix(), err.path(), at.line, at.col))
                .collect::<Vec<String>>()
                .join("\n"),
            _ => format!("{}{self}", prefix()),
        }
    }
}

fn prefix() -> String {
    format!(
        "{}{}error{}{}: ",
        style::Bold,
        color::Fg(color::Red),
        color::Fg(color::Reset),
        style::Reset
    )
}
