use std::fmt;

use crate::error::{DbError, Result};

/// Represents the smallest meaningful units (atoms) of the SQL language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // --- SQL Keywords ---
    Create,
    Table,
    Drop,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Update,
    Set,
    Delete,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Inner,
    Join,
    On,
    As,
    Count,
    And,
    Primary,
    Key,
    Unique,
    Not,
    Null,
    If,
    Exists,

    // --- Data Types ---
    Int,
    Varchar,
    Boolean,

    // --- Identifiers & Literals ---
    /// A name representing a table or a column (e.g., `users`, `id`).
    Ident(String),
    /// A 64-bit integer literal (e.g., `42`, `-7`).
    Number(i64),
    /// A string literal, defined between single quotes (e.g., `'Alice'`).
    String(String),
    /// The boolean literal `TRUE`.
    True,
    /// The boolean literal `FALSE`.
    False,

    // --- Operators ---
    /// `=`
    Equal,
    /// `!=` or `<>`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,

    // --- Punctuation ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Qualifier separator `.`
    Dot,
    /// Wildcard `*`
    Star,

    // --- Special ---
    /// Represents the end of one command.
    Eof,
}

/// Coarse tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    Identifier,
    Literal,
    Operator,
    Punctuation,
    End,
}

impl TokenKind {
    pub fn class(&self) -> TokenClass {
        match self {
            Self::Ident(_) => TokenClass::Identifier,
            Self::Number(_) | Self::String(_) | Self::True | Self::False => TokenClass::Literal,
            Self::Equal
            | Self::NotEqual
            | Self::Less
            | Self::LessEqual
            | Self::Greater
            | Self::GreaterEqual => TokenClass::Operator,
            Self::LeftParen | Self::RightParen | Self::Comma | Self::Dot | Self::Star => {
                TokenClass::Punctuation
            }
            Self::Eof => TokenClass::End,
            _ => TokenClass::Keyword,
        }
    }

    fn keyword(word: &str) -> Option<Self> {
        let kind = match word.to_uppercase().as_str() {
            "CREATE" => Self::Create,
            "TABLE" => Self::Table,
            "DROP" => Self::Drop,
            "INSERT" => Self::Insert,
            "INTO" => Self::Into,
            "VALUES" => Self::Values,
            "SELECT" => Self::Select,
            "FROM" => Self::From,
            "WHERE" => Self::Where,
            "UPDATE" => Self::Update,
            "SET" => Self::Set,
            "DELETE" => Self::Delete,
            "ORDER" => Self::Order,
            "BY" => Self::By,
            "ASC" => Self::Asc,
            "DESC" => Self::Desc,
            "LIMIT" => Self::Limit,
            "INNER" => Self::Inner,
            "JOIN" => Self::Join,
            "ON" => Self::On,
            "AS" => Self::As,
            "COUNT" => Self::Count,
            "AND" => Self::And,
            "PRIMARY" => Self::Primary,
            "KEY" => Self::Key,
            "UNIQUE" => Self::Unique,
            "NOT" => Self::Not,
            "NULL" => Self::Null,
            "IF" => Self::If,
            "EXISTS" => Self::Exists,
            "INT" | "INTEGER" => Self::Int,
            "VARCHAR" => Self::Varchar,
            "BOOLEAN" => Self::Boolean,
            "TRUE" => Self::True,
            "FALSE" => Self::False,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier {name:?}"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::String(s) => write!(f, "string '{s}'"),
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::Equal => write!(f, "'='"),
            Self::NotEqual => write!(f, "'!='"),
            Self::Less => write!(f, "'<'"),
            Self::LessEqual => write!(f, "'<='"),
            Self::Greater => write!(f, "'>'"),
            Self::GreaterEqual => write!(f, "'>='"),
            Self::LeftParen => write!(f, "'('"),
            Self::RightParen => write!(f, "')'"),
            Self::Comma => write!(f, "','"),
            Self::Dot => write!(f, "'.'"),
            Self::Star => write!(f, "'*'"),
            Self::Eof => write!(f, "end of input"),
            keyword => write!(f, "{}", format!("{keyword:?}").to_uppercase()),
        }
    }
}

/// A token with the raw text it was read from and its character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

/// A lexical scanner (lexer) that converts a raw SQL string into a sequence of [Token]s.
///
/// `;` ends a command: it is consumed, never emitted, and splits input into
/// commands for [Tokenizer::statements].
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens terminated by
    /// a single [TokenKind::Eof]. Statement terminators are dropped.
    ///
    /// # Errors
    /// Returns [DbError::Lex] if an invalid character is encountered or a string
    /// literal is left unterminated.
    ///
    /// # Example
    /// ```
    /// # use minisql::tokenizer::{Tokenizer, TokenKind};
    /// let tokens = Tokenizer::new("SELECT * FROM t;").tokenize().unwrap();
    /// assert_eq!(tokens[0].kind, TokenKind::Select);
    /// assert_eq!(tokens[1].position, 7);
    /// assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = self
            .statements()?
            .into_iter()
            .flat_map(|statement| statement.into_iter().filter(|t| t.kind != TokenKind::Eof))
            .collect();
        tokens.push(self.eof(self.input.len()));
        Ok(tokens)
    }

    /// Splits the input into commands, each ending with its own [TokenKind::Eof].
    /// Empty commands (e.g. `;;`) are skipped.
    pub fn statements(&mut self) -> Result<Vec<Vec<Token>>> {
        let mut statements = Vec::new();
        let mut current = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            if self.current_char() == ';' {
                if !current.is_empty() {
                    current.push(self.eof(self.position));
                    statements.push(std::mem::take(&mut current));
                }
                self.advance();
                continue;
            }
            current.push(self.next_token()?);
        }

        if !current.is_empty() {
            current.push(self.eof(self.input.len()));
            statements.push(current);
        }
        Ok(statements)
    }

    /// Identifies the next token based on the character at the current position.
    fn next_token(&mut self) -> Result<Token> {
        let start = self.position;
        let ch = self.current_char();

        let kind = match ch {
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            '*' => self.single(TokenKind::Star),
            '=' => self.single(TokenKind::Equal),
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => self.single(TokenKind::LessEqual),
                    Some('>') => self.single(TokenKind::NotEqual),
                    _ => TokenKind::Less,
                }
            }
            '>' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => self.single(TokenKind::GreaterEqual),
                    _ => TokenKind::Greater,
                }
            }
            '!' if self.char_at(start + 1) == Some('=') => {
                self.advance();
                self.single(TokenKind::NotEqual)
            }
            '\'' => self.read_string()?,
            '-' if self.char_at(start + 1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()?
            }
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            _ => {
                return Err(DbError::Lex {
                    character: ch,
                    position: start,
                });
            }
        };

        Ok(Token {
            kind,
            text: self.input[start..self.position].iter().collect(),
            position: start,
        })
    }

    // --- Navigation Helpers ---

    /// Returns the character at the current position.
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_char(&self) -> Option<char> {
        self.char_at(self.position)
    }

    fn char_at(&self, idx: usize) -> Option<char> {
        self.input.get(idx).copied()
    }

    /// Moves the cursor forward by one character.
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Consumes one character and yields `kind`.
    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Checks if the cursor has reached the end of the input.
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Consumes any whitespace characters (spaces, tabs, newlines).
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn eof(&self, position: usize) -> Token {
        Token {
            kind: TokenKind::Eof,
            text: String::new(),
            position,
        }
    }

    // --- Extraction Logic ---

    /// Reads a sequence of alphanumeric characters and determines if it's
    /// a reserved SQL keyword or a user-defined identifier.
    ///
    /// Keywords are matched case-insensitively.
    fn read_identifier(&mut self) -> TokenKind {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident))
    }

    /// Reads an integer literal, with an optional leading minus sign.
    fn read_number(&mut self) -> Result<TokenKind> {
        let start = self.position;
        let mut number = String::new();
        if self.current_char() == '-' {
            number.push('-');
            self.advance();
        }

        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            number.push(self.current_char());
            self.advance();
        }

        match number.parse::<i64>() {
            Ok(value) => Ok(TokenKind::Number(value)),
            Err(_) => Err(DbError::IntegerOutOfRange {
                literal: number,
                position: start,
            }),
        }
    }

    /// Reads a string literal enclosed in single quotes. `''` and `\'` both
    /// stand for one quote, `\\` for one backslash.
    fn read_string(&mut self) -> Result<TokenKind> {
        let start = self.position;
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(DbError::Lex {
                    character: '\'',
                    position: start,
                });
            };
            self.advance();
            match ch {
                '\'' if self.peek_char() == Some('\'') => {
                    string.push('\'');
                    self.advance();
                }
                '\'' => break,
                '\\' if matches!(self.peek_char(), Some('\'') | Some('\\')) => {
                    string.push(self.current_char());
                    self.advance();
                }
                _ => string.push(ch),
            }
        }

        Ok(TokenKind::String(string))
    }
}
