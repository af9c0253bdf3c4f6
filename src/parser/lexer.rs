use super::spanned::{Span, Spanned};
use super::token::{Ctrl, KeyWord, Token};
use core::iter::Peekable;
use core::str::Chars;
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum LexError {
    #[error("unexpected character")]
    Unknown,
    #[error("invalid number, largest supported integer is {}", i64::MAX)]
    InvalidNumber,
}

/// Splits a graph script into tokens. Runs of line breaks, blank lines and
/// comments collapse into a single `Newline` token.
pub struct Lexer<'a> {
    peek: Option<Spanned<Token<'a>>>,
    chars: Peekable<Chars<'a>>,
    input: &'a str,
    pos: usize,
    eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            peek: None,
            pos: 0,
            eof: false,
        }
    }

    pub fn get_token(&mut self) -> Result<Spanned<Token<'a>>, Spanned<LexError>> {
        if let Some(token) = self.peek.take() {
            Ok(token)
        } else {
            self.lex_token()
        }
    }

    pub fn peek(&mut self) -> Result<Spanned<Token<'a>>, Spanned<LexError>> {
        if let Some(token) = self.peek {
            return Ok(token);
        }

        let token = self.lex_token()?;
        self.peek = Some(token);

        Ok(token)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn get_input(&self) -> &'a str {
        self.input
    }

    fn lex_token(&mut self) -> Result<Spanned<Token<'a>>, Spanned<LexError>> {
        self.skip_ignored_input();

        let start = self.pos;
        let result = self.lex_token_inner();
        let span = Span::new(start, self.pos);

        match result {
            Ok(token) => Ok(Spanned::new(token, span)),
            Err(err) => Err(Spanned::new(err, span)),
        }
    }

    fn lex_token_inner(&mut self) -> Result<Token<'a>, LexError> {
        let c = match self.chars.peek() {
            Some(c) => *c,
            None => {
                self.eof = true;

                return Ok(Token::Ctrl(Ctrl::End));
            }
        };

        if c.is_alphabetic() || c == '_' {
            return Ok(self.lex_ident_or_keyword());
        }

        if c.is_ascii_digit() || c == '-' {
            return self.lex_num();
        }

        self.advance();

        let ctrl = match c {
            '=' => Ctrl::Equal,
            '.' => Ctrl::Period,
            '+' => Ctrl::Plus,
            '!' => Ctrl::Bang,
            '{' => Ctrl::LeftCurly,
            '}' => Ctrl::RightCurly,
            '\n' => {
                self.skip_blank_lines();
                Ctrl::Newline
            }
            _ => return Err(LexError::Unknown),
        };

        Ok(Token::Ctrl(ctrl))
    }

    fn skip_ignored_input(&mut self) {
        loop {
            match self.chars.peek() {
                Some('#') => self.skip_comment(),
                Some(c) if c.is_whitespace() && *c != '\n' => self.advance(),
                _ => return,
            }
        }
    }

    fn skip_blank_lines(&mut self) {
        loop {
            match self.chars.peek() {
                Some('#') => self.skip_comment(),
                Some(c) if c.is_whitespace() => self.advance(),
                _ => return,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.chars.peek() {
            if *c == '\n' {
                return;
            }

            self.advance();
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Token<'a> {
        let word = self.lex_word();

        match KeyWord::from_word(word) {
            Some(keyword) => Token::KeyWord(keyword),
            None => Token::Ident(word),
        }
    }

    fn lex_word(&mut self) -> &'a str {
        let start = self.pos;

        while let Some(c) = self.chars.peek() {
            if c.is_alphanumeric() || *c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        &self.input[start..self.pos]
    }

    fn lex_num(&mut self) -> Result<Token<'a>, LexError> {
        let start = self.pos;

        if self.chars.peek() == Some(&'-') {
            self.advance();

            if !matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(LexError::Unknown);
            }
        }

        while let Some(c) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        self.input[start..self.pos]
            .parse()
            .map(Token::Int)
            .map_err(|_| LexError::InvalidNumber)
    }

    fn advance(&mut self) {
        if let Some(c) = self.chars.next() {
            self.pos += c.len_utf8();
        }
    }
}
