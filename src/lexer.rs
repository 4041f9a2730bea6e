use std::{collections::VecDeque, iter::Peekable, str::Chars};

use tracing::trace;

use crate::token::{Span, Spanned, Token, TokenKind, Value, KEYWORDS};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// A convenience function that drains the whole token stream of `src`.
///
/// Interpolated expressions are left on the `}` matching their `${`, the way
/// the parser leaves them.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::with_capacity(src.len() / 4);
    // Brace depth of each open interpolated expression, innermost last.
    let mut segments: Vec<usize> = Vec::new();
    while let Some(token) = lexer.consume(0)? {
        match token.kind {
            TokenKind::StringText => {
                // Text is followed either by the end of its string or by an
                // interpolated expression.
                let ends_string =
                    matches!(lexer.peek(0)?, Some(next) if next.kind == TokenKind::StringEnd);
                if !ends_string {
                    segments.push(0);
                }
            }
            TokenKind::LBrace => {
                if let Some(depth) = segments.last_mut() {
                    *depth += 1;
                }
            }
            TokenKind::RBrace => match segments.last_mut() {
                Some(0) => {
                    segments.pop();
                    lexer.pop_string_mode()?;
                }
                Some(depth) => *depth -= 1,
                None => (),
            },
            _ => (),
        }
        tokens.push(token);
    }
    Ok(tokens)
}

/// The tokenizer.
///
/// Characters are only scanned when the consumer asks for a token which isn't
/// buffered yet (see [`Lexer::peek`] and [`Lexer::consume`]).
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    /// Tokens which were already scanned but not yet consumed.
    lookahead: VecDeque<Token>,
    /// Tokens which were scanned as part of a previous token and must be
    /// emitted before any further scanning happens.
    deferred: VecDeque<Token>,
    /// `true` while scanning literal string text, `false` while scanning the
    /// expression of a `${ .. }` segment.
    string_modes: Vec<bool>,
    /// Tokens consumed while a [`Transaction`] is open.
    journal: Option<Vec<Token>>,
    generation: u32,
}

/// Handle to the (single) open speculative transaction of a [`Lexer`].
///
/// It must be handed back through either [`Lexer::commit`] or
/// [`Lexer::reset`].
#[must_use]
#[derive(Debug)]
pub struct Transaction {
    generation: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            lookahead: VecDeque::with_capacity(8),
            deferred: VecDeque::with_capacity(2),
            string_modes: Vec::new(),
            journal: None,
            generation: 0,
        }
    }

    /// Returns the token `n` positions ahead without consuming it, or `None`
    /// at the end of the input.
    pub fn peek(&mut self, n: usize) -> Result<Option<&Token>> {
        self.fill(n + 1)?;
        Ok(self.lookahead.get(n))
    }

    /// Returns the token `n` positions ahead, discarding every token up to and
    /// including it. Returns `None` at the end of the input.
    pub fn consume(&mut self, n: usize) -> Result<Option<Token>> {
        self.fill(n + 1)?;
        let available = self.lookahead.len().min(n + 1);
        let mut last = None;
        for token in self.lookahead.drain(..available) {
            if let Some(journal) = &mut self.journal {
                journal.push(token.clone());
            }
            last = Some(token);
        }
        Ok(last.filter(|_| available == n + 1))
    }

    /// Opens a transaction, or returns `None` if one is already open.
    pub fn begin(&mut self) -> Option<Transaction> {
        if self.journal.is_some() {
            return None;
        }
        self.generation += 1;
        self.journal = Some(Vec::with_capacity(4));
        trace!(generation = self.generation, "transaction opened");
        Some(Transaction {
            generation: self.generation,
        })
    }

    /// Keeps every token consumed since `transaction` was opened.
    pub fn commit(&mut self, transaction: Transaction) {
        debug_assert_eq!(transaction.generation, self.generation);
        let journal = self.journal.take();
        trace!(
            generation = transaction.generation,
            consumed = journal.map_or(0, |j| j.len()),
            "transaction committed"
        );
    }

    /// Puts every token consumed since `transaction` was opened back in front
    /// of the lookahead buffer, in their original order.
    pub fn reset(&mut self, transaction: Transaction) {
        debug_assert_eq!(transaction.generation, self.generation);
        let journal = self.journal.take().unwrap_or_default();
        trace!(
            generation = transaction.generation,
            restored = journal.len(),
            "transaction reset"
        );
        for token in journal.into_iter().rev() {
            self.lookahead.push_front(token);
        }
    }

    /// Leaves the expression segment of a string interpolation, resuming
    /// literal text scanning.
    ///
    /// Must be called right after the closing `}` of the segment was
    /// consumed.
    pub fn pop_string_mode(&mut self) -> Result<()> {
        let here = Span::new_of_length(self.cursor, 0);
        if !self.lookahead.is_empty() || !self.deferred.is_empty() {
            return Err(here.wrap(Error::UnbalancedInterpolation));
        }
        match self.string_modes.pop() {
            Some(false) => Ok(()),
            Some(true) | None => Err(here.wrap(Error::UnbalancedInterpolation)),
        }
    }

    fn fill(&mut self, len: usize) -> Result<()> {
        while self.lookahead.len() < len {
            match self.next_token()? {
                Some(token) => {
                    trace!(?token, "scanned");
                    self.lookahead.push_back(token);
                }
                None => break,
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.deferred.pop_front() {
            return Ok(Some(token));
        }
        if self.in_string_text() {
            return Ok(Some(self.string_text()));
        }
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
        let Some(c) = self.mark_advance() else {
            return Ok(None);
        };
        self.scan_token(c).map(Some)
    }

    /// Scans the token starting with `c`.
    fn scan_token(&mut self, c: char) -> Result<Token> {
        use TokenKind::*;
        let kind = match c {
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            ':' => Colon,
            ';' => Semicolon,
            ',' => Comma,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            '=' => self.advance_if('=', EqEq, Assign),
            '!' => self.advance_if('=', NotEq, Not),
            '<' => self.advance_if('=', LessEq, Less),
            '>' => self.advance_if('=', GreaterEq, Greater),
            '.' => self.advance_if('.', DotDot, Dot),
            '"' => {
                self.string_modes.push(true);
                StringBegin
            }
            c if c.is_alphabetic() => return Ok(self.identifier_or_keyword()),
            c if c.is_ascii_digit() => return self.number(),
            other => return Err(self.span().wrap(Error::UnexpectedChar(other))),
        };
        Ok(self.produce(kind))
    }

    fn identifier_or_keyword(&mut self) -> Token {
        while self.peek_char().is_some_and(char::is_alphanumeric) {
            self.advance();
        }
        let kind = KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier);
        let token = self.produce(kind);
        match kind {
            TokenKind::True => token.with_value(Value::Boolean(true)),
            TokenKind::False => token.with_value(Value::Boolean(false)),
            _ => token,
        }
    }

    /// Scans an integer, a double or a compact range (`1..10`).
    ///
    /// A `.` only belongs to the number if a digit follows it. A `..` right
    /// after the digits splits the literal: the left integer is returned now,
    /// the `..` and the right integer (if any) are deferred.
    fn number(&mut self) -> Result<Token> {
        self.digits();
        if self.peek_char() == Some('.') {
            match self.peek_second_char() {
                Some('.') => return self.range(),
                Some(c) if c.is_ascii_digit() => {
                    self.advance();
                    self.digits();
                    let span = self.span();
                    let value = span
                        .substr(self.src)
                        .parse::<f64>()
                        .map_err(|_| span.wrap(Error::MalformedNumber(self.substr().into())))?;
                    return Ok(self.produce(TokenKind::Double).with_value(Value::Double(value)));
                }
                _ => (),
            }
        }
        self.integer(self.span())
    }

    fn range(&mut self) -> Result<Token> {
        let left = self.integer(self.span())?;

        self.mark();
        self.advance();
        self.advance();
        let dot_dot = self.produce(TokenKind::DotDot);
        self.deferred.push_back(dot_dot);

        if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.mark();
            self.digits();
            let right = self.integer(self.span())?;
            self.deferred.push_back(right);
        }
        Ok(left)
    }

    fn integer(&self, span: Span) -> Result<Token> {
        let text = span.substr(self.src);
        let value = text
            .parse::<i64>()
            .map_err(|_| span.wrap(Error::MalformedNumber(text.into())))?;
        Ok(Token::new(TokenKind::Integer, text, span).with_value(Value::Integer(value)))
    }

    fn digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Scans literal string text up to the closing `"`, the end of the input
    /// or a `${`, whichever comes first. The text may be empty.
    fn string_text(&mut self) -> Token {
        self.mark();
        loop {
            match self.peek_char() {
                None => {
                    let text = self.produce(TokenKind::StringText);
                    self.string_modes.pop();
                    let end = Span::new_of_length(self.cursor, 0);
                    self.deferred
                        .push_back(Token::new(TokenKind::StringEnd, "", end));
                    return with_string_value(text);
                }
                Some('"') => {
                    let text = self.produce(TokenKind::StringText);
                    self.mark_advance();
                    self.string_modes.pop();
                    let end = self.produce(TokenKind::StringEnd);
                    self.deferred.push_back(end);
                    return with_string_value(text);
                }
                Some('$') if self.peek_second_char() == Some('{') => {
                    let text = self.produce(TokenKind::StringText);
                    self.advance();
                    self.advance();
                    self.string_modes.push(false);
                    return with_string_value(text);
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn in_string_text(&self) -> bool {
        self.string_modes.last().copied().unwrap_or(false)
    }
}

fn with_string_value(token: Token) -> Token {
    let value = Value::String(token.text.clone());
    token.with_value(value)
}

impl Lexer<'_> {
    /// Starts a new token "mark".
    fn mark(&mut self) {
        self.current_lo = self.cursor;
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.mark();
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> Option<char> {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
    }

    /// Advances and returns `then` if the next character is `expected`.
    /// Otherwise returns `otherwise` without advancing.
    fn advance_if<T>(&mut self, expected: char, then: T, otherwise: T) -> T {
        if self.peek_char() == Some(expected) {
            self.advance();
            then
        } else {
            otherwise
        }
    }

    /// Returns the next character without advancing the iterator.
    fn peek_char(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the character after the next one without advancing.
    fn peek_second_char(&self) -> Option<char> {
        let mut rest = self.src[self.cursor..].chars();
        rest.next();
        rest.next()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.substr(), self.span())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("malformed number literal `{0}`")]
    MalformedNumber(Box<str>),
    #[error("unbalanced string interpolation")]
    UnbalancedInterpolation,
}
