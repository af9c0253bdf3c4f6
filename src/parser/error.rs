use super::lexer::LexError;
use super::spanned::{LineCol, Spanned};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorItem {
    #[error(transparent)]
    LexError(#[from] LexError),
    #[error("{msg}, found '{found}'")]
    Expected { msg: String, found: String },
    #[error("'{0}' is not defined")]
    UnknownName(String),
    #[error("'{0}' is already defined")]
    Redefined(String),
    #[error("unknown deoptimization reason '{0}'")]
    UnknownReason(String),
    #[error("the final location is never written")]
    WriteToFinal,
    #[error("statement is unreachable")]
    Unreachable,
}

/// Every error found in a script, each resolved to a line and column.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    path: Option<String>,
    errors: Vec<(LineCol, ParseErrorItem)>,
}

impl ParseError {
    pub fn new(errors: Vec<Spanned<ParseErrorItem>>, source: &str) -> Self {
        let mut errors: Vec<(LineCol, ParseErrorItem)> = errors
            .into_iter()
            .map(|err| (err.span.line_col(source), err.item))
            .collect();

        errors.sort_by_key(|(at, _)| (at.line, at.col));

        Self { path: None, errors }
    }

    pub fn set_path(&mut self, path: Option<String>) {
        self.path = path;
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("<input>")
    }

    pub fn errors(&self) -> impl Iterator<Item = (LineCol, &ParseErrorItem)> {
        self.errors.iter().map(|(at, item)| (*at, item))
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path();

        for (i, (at, item)) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            write!(f, "{path}:{}:{}: {item}", at.line, at.col)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}
