mod error;
mod lexer;
mod spanned;
mod stmt;
mod token;

pub use error::{ParseError, ParseErrorItem};
pub use lexer::{LexError, Lexer};
pub use spanned::{LineCol, Span, Spanned};
pub use stmt::{Expr, Field, GuardCondition, Name, Stmt};
pub use token::{Ctrl, KeyWord, Token};

use stmt::stmt;

use std::cell::RefCell;
use std::rc::Rc;

/// Parses a whole graph script. Statements that fail to parse are skipped
/// up to the next line so that every error in the script is reported.
pub fn parse_script(input: &str, path: Option<String>) -> Result<Vec<Spanned<Stmt>>, ParseError> {
    program()
        .parse_str(input)
        // program always yields a (possibly empty) list
        .map(|result| result.unwrap_or_default())
        .map_err(|mut err| {
            err.set_path(path);
            err
        })
}

fn program<'a>() -> Parser<'a, Vec<Spanned<Stmt>>> {
    let stmt = stmt()
        .spanned()
        .expect("Expected a statement")
        .recover(Ctrl::Newline);

    Parser::new(move |ctx| {
        let mut stmts = vec![];

        let _ = ctrl(Ctrl::Newline).parse(ctx);

        while !ctx.at(Ctrl::End) {
            match stmt.parse(ctx) {
                Some(stmt) => stmts.push(stmt),
                None if ctx.eof() => break,
                None => {}
            }
        }

        Some(stmts)
    })
}

struct ParseContext<'a> {
    lexer: Lexer<'a>,
    errors: Vec<Spanned<ParseErrorItem>>,
}

impl<'a> ParseContext<'a> {
    fn peek(&mut self) -> Option<Spanned<Token<'a>>> {
        match self.lexer.peek() {
            Err(lex_error) => {
                // the lexer already moved past the bad input
                self.add_err(lex_error.map(ParseErrorItem::LexError));
                None
            }
            Ok(spanned_token) => Some(spanned_token),
        }
    }

    fn adv(&mut self) {
        let _ = self.lexer.get_token();
    }

    fn at(&mut self, expected: Ctrl) -> bool {
        matches!(
            self.lexer.peek(),
            Ok(Spanned { item: Token::Ctrl(ctrl), .. }) if ctrl == expected
        )
    }

    fn add_err(&mut self, err: Spanned<ParseErrorItem>) {
        self.errors.push(err);
    }

    fn pos(&self) -> usize {
        self.lexer.pos()
    }

    fn eof(&self) -> bool {
        self.lexer.eof()
    }
}

struct Parser<'a, T> {
    func: Rc<dyn Fn(&mut ParseContext<'a>) -> Option<T> + 'a>,
}

impl<'a, T> Clone for Parser<'a, T> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
        }
    }
}

impl<'a, T: 'a> Parser<'a, T> {
    pub fn new(func: impl Fn(&mut ParseContext<'a>) -> Option<T> + 'a) -> Self {
        Self {
            func: Rc::new(func),
        }
    }

    pub fn parse_str(self, input: &'a str) -> Result<Option<T>, ParseError> {
        let mut ctx = ParseContext {
            lexer: Lexer::new(input),
            errors: vec![],
        };

        let value = self.parse(&mut ctx);

        if ctx.errors.is_empty() {
            Ok(value)
        } else {
            Err(ParseError::new(ctx.errors, input))
        }
    }

    fn parse(&self, ctx: &mut ParseContext<'a>) -> Option<T> {
        (self.func)(ctx)
    }

    pub fn then<A: 'a>(self, then: Parser<'a, A>) -> Parser<'a, A> {
        Parser::new(move |ctx: &mut ParseContext<'a>| {
            if self.parse(ctx).is_some() {
                then.parse(ctx)
            } else {
                None
            }
        })
    }

    pub fn append<A: 'a>(self, then: Parser<'a, A>) -> Parser<'a, (T, A)> {
        Parser::new(move |ctx: &mut ParseContext<'a>| {
            let first = self.parse(ctx)?;
            let second = then.parse(ctx)?;

            Some((first, second))
        })
    }

    pub fn closed_by<A: 'a>(self, then: Parser<'a, A>) -> Parser<'a, T> {
        Parser::new(move |ctx: &mut ParseContext<'a>| {
            let first = self.parse(ctx)?;
            let _ = then.parse(ctx)?;

            Some(first)
        })
    }

    /// Reports `error_msg` on failure, unless the inner parser already
    /// reported a more precise error.
    pub fn expect(self, error_msg: &'static str) -> Parser<'a, T> {
        Parser::new(move |ctx| {
            let reported = ctx.errors.len();

            if let Some(result) = self.parse(ctx) {
                return Some(result);
            }

            if ctx.errors.len() > reported {
                return None;
            }

            if let Some(found) = ctx.peek() {
                let error = ParseErrorItem::Expected {
                    msg: error_msg.to_string(),
                    found: found.item.to_string(),
                };

                ctx.add_err(Spanned::new(error, found.span));
            }

            None
        })
    }

    pub fn or(self, alternative: Parser<'a, T>) -> Parser<'a, T> {
        Parser::new(move |ctx| {
            if let Some(value) = self.parse(ctx) {
                Some(value)
            } else {
                alternative.parse(ctx)
            }
        })
    }

    /// On failure skips ahead to `ctrl_recover` and tries again from there.
    pub fn recover(self, ctrl_recover: Ctrl) -> Parser<'a, T> {
        Parser::new(move |ctx| {
            if let Some(value) = self.parse(ctx) {
                return Some(value);
            }

            loop {
                if ctx.eof() || ctx.at(Ctrl::End) {
                    return None;
                }

                match ctrl(ctrl_recover).parse(ctx) {
                    Some(_) => {
                        if ctx.at(Ctrl::End) {
                            return None;
                        }

                        if let Some(value) = self.parse(ctx) {
                            return Some(value);
                        }
                    }
                    None => ctx.adv(),
                }
            }
        })
    }

    pub fn zero_or_more(self) -> Parser<'a, Vec<T>> {
        Parser::new(move |ctx| {
            let mut values = vec![];

            while let Some(value) = self.parse(ctx) {
                values.push(value);
            }

            Some(values)
        })
    }

    pub fn map<C: 'a, N: 'a>(self, callback: C) -> Parser<'a, N>
    where
        C: Fn(T) -> N,
    {
        Parser::new(move |ctx| self.parse(ctx).map(&callback))
    }

    pub fn mix<B: 'a, C: 'a, D: 'a>(self, other: Parser<'a, B>, callback: C) -> Parser<'a, D>
    where
        C: Fn(T, Option<B>) -> Option<D>,
    {
        Parser::new(move |ctx| {
            if let Some(result) = self.parse(ctx) {
                callback(result, other.parse(ctx))
            } else {
                None
            }
        })
    }

    pub fn optional(self) -> Parser<'a, Option<T>> {
        self.map(Some).or(nothing().map(|_| None))
    }

    pub fn spanned(self) -> Parser<'a, Spanned<T>> {
        span(self)
    }

    pub fn delimited<A: 'a, B: 'a>(
        self,
        left: Parser<'a, A>,
        right: Parser<'a, B>,
    ) -> Parser<'a, T> {
        Parser::new(move |ctx| {
            let _ = left.parse(ctx)?;
            let result = self.parse(ctx)?;
            let _ = right.parse(ctx)?;

            Some(result)
        })
    }
}

fn nothing<'a>() -> Parser<'a, ()> {
    Parser::new(move |_| Some(()))
}

fn ctrl<'a>(expected: Ctrl) -> Parser<'a, ()> {
    Parser::new(move |ctx| match ctx.peek() {
        Some(spanned_token) => match spanned_token.item {
            Token::Ctrl(ctrl) if ctrl == expected => {
                ctx.adv();
                Some(())
            }
            _ => None,
        },
        None => None,
    })
}

fn keyword<'a>(expected: KeyWord) -> Parser<'a, ()> {
    Parser::new(move |ctx| match ctx.peek() {
        Some(spanned_token) => match spanned_token.item {
            Token::KeyWord(keyword) if keyword == expected => {
                ctx.adv();
                Some(())
            }
            _ => None,
        },
        None => None,
    })
}

fn ident<'a>() -> Parser<'a, String> {
    Parser::new(|ctx| match ctx.peek() {
        Some(spanned_token) => match spanned_token.item {
            Token::Ident(ident) => {
                ctx.adv();
                Some(ident.to_string())
            }
            _ => None,
        },
        None => None,
    })
}

fn int<'a>() -> Parser<'a, i64> {
    Parser::new(|ctx| match ctx.peek() {
        Some(spanned_token) => match spanned_token.item {
            Token::Int(value) => {
                ctx.adv();
                Some(value)
            }
            _ => None,
        },
        None => None,
    })
}

/// Ends a line: consumes a newline, or stops in front of a closing brace or
/// the end of input.
fn terminator<'a>() -> Parser<'a, ()> {
    Parser::new(|ctx| match ctx.peek() {
        Some(spanned_token) => match spanned_token.item {
            Token::Ctrl(Ctrl::Newline) => {
                ctx.adv();
                Some(())
            }
            Token::Ctrl(Ctrl::RightCurly) | Token::Ctrl(Ctrl::End) => Some(()),
            _ => None,
        },
        None => None,
    })
}

fn block(sp: Parser<'_, Spanned<Stmt>>) -> Parser<'_, Vec<Spanned<Stmt>>> {
    let left_curly = ctrl(Ctrl::LeftCurly).closed_by(ctrl(Ctrl::Newline).optional());
    let right_curly = ctrl(Ctrl::RightCurly).expect("Expected '}' or a statement");
    let items = sp.zero_or_more();

    items.delimited(left_curly, right_curly)
}

fn recursive<'a, T>(func: impl Fn(Parser<'a, T>) -> Parser<'a, T> + 'a) -> Parser<'a, T>
where
    T: 'a,
{
    let recursive_parser: Rc<RefCell<Option<Parser<'a, T>>>> = Rc::new(RefCell::new(None));
    let recursive_parser_clone = recursive_parser.clone();

    Parser::new(move |ctx| {
        if recursive_parser_clone.borrow().is_none() {
            let rec_parser = func(Parser::new({
                let recursive_parser_inner = recursive_parser_clone.clone();
                move |ctx| {
                    let parser = recursive_parser_inner.borrow().clone();
                    parser.and_then(|parser| parser.parse(ctx))
                }
            }));
            *recursive_parser_clone.borrow_mut() = Some(rec_parser);
        }

        let parser = recursive_parser_clone.borrow().clone();
        parser.and_then(|parser| parser.parse(ctx))
    })
}

fn span<'a, T: 'a>(func: Parser<'a, T>) -> Parser<'a, Spanned<T>> {
    Parser::new(move |ctx| {
        let start = ctx.peek()?.span.start;
        let result: Option<T> = func.parse(ctx);
        let end = ctx.pos();

        result.map(|value| Spanned::new(value, Span::new(start, end)))
    })
}
