use std::fmt;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Token<'a> {
    Ctrl(Ctrl),
    Ident(&'a str),
    Int(i64),
    KeyWord(KeyWord),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ctrl {
    Equal,
    Period,
    Plus,
    Bang,
    LeftCurly,
    RightCurly,
    Newline,
    End,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyWord {
    Param,
    Read,
    Write,
    Call,
    Barrier,
    IsNull,
    Eq,
    Lt,
    Not,
    And,
    Or,
    Const,
    Null,
    Guard,
    NonNull,
    If,
    Else,
    While,
    Return,
    Deopt,
}

impl KeyWord {
    pub fn from_word(word: &str) -> Option<Self> {
        let keyword = match word {
            "param" => KeyWord::Param,
            "read" => KeyWord::Read,
            "write" => KeyWord::Write,
            "call" => KeyWord::Call,
            "barrier" => KeyWord::Barrier,
            "isnull" => KeyWord::IsNull,
            "eq" => KeyWord::Eq,
            "lt" => KeyWord::Lt,
            "not" => KeyWord::Not,
            "and" => KeyWord::And,
            "or" => KeyWord::Or,
            "const" => KeyWord::Const,
            "null" => KeyWord::Null,
            "guard" => KeyWord::Guard,
            "nonnull" => KeyWord::NonNull,
            "if" => KeyWord::If,
            "else" => KeyWord::Else,
            "while" => KeyWord::While,
            "return" => KeyWord::Return,
            "deopt" => KeyWord::Deopt,
            _ => return None,
        };

        Some(keyword)
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ctrl(Ctrl::Equal) => write!(f, "="),
            Token::Ctrl(Ctrl::Period) => write!(f, "."),
            Token::Ctrl(Ctrl::Plus) => write!(f, "+"),
            Token::Ctrl(Ctrl::Bang) => write!(f, "!"),
            Token::Ctrl(Ctrl::LeftCurly) => write!(f, "{{"),
            Token::Ctrl(Ctrl::RightCurly) => write!(f, "}}"),
            Token::Ctrl(Ctrl::Newline) => write!(f, "end of line"),
            Token::Ctrl(Ctrl::End) => write!(f, "end of input"),
            Token::Ident(ident) => write!(f, "{ident}"),
            Token::Int(value) => write!(f, "{value}"),
            Token::KeyWord(keyword) => write!(f, "{}", format!("{keyword:?}").to_lowercase()),
        }
    }
}
