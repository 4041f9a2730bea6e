use tracing::debug;

use crate::{
    ast::{
        getter_name, BinaryOperator, Expr, FunctionDeclaration, FunctionModifiers, Node,
        Parameter, UnaryOperator, Variable, VariableModifiers, CONSTRUCTOR_NAME, GET_MEMBER,
        LIST_FUNCTION, RANGE_FUNCTION,
    },
    lexer::{self, Lexer},
    token::{Span, Spanned, Token, TokenKind, Value},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Parses a whole program, returning its [`Node::Root`].
pub fn parse(src: &str) -> Result<Node> {
    Parser::new(src).parse()
}

/// Parses a single expression which must span the whole input.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut p = Parser::new(src);
    let expr = p.parse_expr()?;
    p.expect_end(&[])?;
    Ok(expr)
}

/// The kind of declarations accepted inside a body.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Context {
    /// The root and class bodies.
    Class,
    /// Getter bodies.
    Function,
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    eof: Span,
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str) -> Parser<'src> {
        Parser::with_lexer(Lexer::new(src), src.len())
    }

    /// Creates a parser pulling its tokens from `lexer`. `src_len` is only
    /// used to locate end of input errors.
    pub fn with_lexer(lexer: Lexer<'src>, src_len: usize) -> Parser<'src> {
        Parser {
            lexer,
            eof: Span::new_of_length(src_len, 0),
        }
    }

    pub fn parse(mut self) -> Result<Node> {
        let children = self.parse_children(Context::Class)?;
        self.expect_end(&[
            TokenKind::Enum,
            TokenKind::Class,
            TokenKind::Var,
            TokenKind::Val,
        ])?;
        Ok(Node::Root { children })
    }

    /// Parses declarations until none of the ones accepted in `context`
    /// matches the current token.
    fn parse_children(&mut self, context: Context) -> Result<Vec<Node>> {
        let mut children = Vec::new();
        loop {
            let child = match context {
                Context::Class => match self.parse_enum()? {
                    Some(node) => Some(node),
                    None => match self.parse_class()? {
                        Some(node) => Some(node),
                        None => self.parse_variable()?,
                    },
                },
                Context::Function => match self.parse_variable()? {
                    Some(node) => Some(node),
                    None => self.parse_return()?,
                },
            };
            match child {
                Some(child) => children.push(child),
                None => break Ok(children),
            }
        }
    }

    fn parse_enum(&mut self) -> Result<Option<Node>> {
        if self.take(TokenKind::Enum)?.is_none() {
            return Ok(None);
        }
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;

        let mut children = Vec::new();
        // The value of the next member without an explicit initializer. `None`
        // if the previous member already holds the largest value.
        let mut next_value = Some(0_i64);
        while let Some(member) = self.take(TokenKind::Identifier)? {
            let value = if self.take(TokenKind::Assign)?.is_some() {
                self.parse_enum_value()?
            } else {
                next_value.ok_or_else(|| member.span().wrap(Error::EnumValueOverflow))?
            };
            next_value = value.checked_add(1);

            children.push(Node::Variable(Variable {
                modifiers: VariableModifiers::ENUM,
                name: member.text,
                ty: Some(Expr::ident(&name)),
                initializer: Some(Expr::Literal(Value::Integer(value))),
                getter: None,
            }));

            if self.take(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.consume(TokenKind::RBrace)?;

        debug!(%name, members = children.len(), "parsed enum");
        Ok(Some(Node::Enum { name, children }))
    }

    fn parse_enum_value(&mut self) -> Result<i64> {
        let negative = self.take(TokenKind::Minus)?.is_some();
        let token = self.consume(TokenKind::Integer)?;
        let span = token.span();
        let Some(Value::Integer(value)) = token.value else {
            return Err(span.wrap(Error::UnexpectedTokenInExpr(token.kind)));
        };
        // The lexer rejects literals above `i64::MAX`, so negation can't overflow.
        Ok(if negative { -value } else { value })
    }

    fn parse_class(&mut self) -> Result<Option<Node>> {
        if self.take(TokenKind::Class)?.is_none() {
            return Ok(None);
        }
        let name = self.parse_ident()?;

        let generic_parameters = if self.take(TokenKind::Less)?.is_some() {
            let mut parameters = vec![self.parse_ident()?];
            while self.take(TokenKind::Comma)?.is_some() {
                parameters.push(self.parse_ident()?);
            }
            self.consume(TokenKind::Greater)?;
            Some(parameters)
        } else {
            None
        };

        let mut children = Vec::new();
        if self.take(TokenKind::LParen)?.is_some() {
            let parameters =
                self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_parameter)?;
            self.consume(TokenKind::RParen)?;
            children.push(Node::Function(FunctionDeclaration {
                modifiers: FunctionModifiers::empty(),
                name: CONSTRUCTOR_NAME.into(),
                return_ty: None,
                parameters,
                internal: false,
                children: Vec::new(),
            }));
        }

        let body = self.consume_any(&[TokenKind::LBrace, TokenKind::Semicolon])?;
        if body.is(TokenKind::LBrace) {
            children.extend(self.parse_children(Context::Class)?);
            self.consume(TokenKind::RBrace)?;
        }

        debug!(%name, children = children.len(), "parsed class");
        Ok(Some(Node::Class {
            name,
            generic_parameters,
            children,
        }))
    }

    fn parse_parameter(&mut self) -> Result<Parameter> {
        let modifiers = self.parse_binding_keyword()?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Parameter {
            modifiers,
            name,
            ty,
        })
    }

    fn parse_binding_keyword(&mut self) -> Result<VariableModifiers> {
        let keyword = self.consume_any(&[TokenKind::Var, TokenKind::Val])?;
        Ok(if keyword.is(TokenKind::Val) {
            VariableModifiers::VAL
        } else {
            VariableModifiers::empty()
        })
    }

    fn parse_variable(&mut self) -> Result<Option<Node>> {
        if !(self.is(TokenKind::Var)? || self.is(TokenKind::Val)?) {
            return Ok(None);
        }
        let modifiers = self.parse_binding_keyword()?;
        let name_token = self.consume(TokenKind::Identifier)?;
        let name_span = name_token.span();
        let name = name_token.text;

        let ty = if self.take(TokenKind::Colon)?.is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut initializer = None;
        let mut getter = None;
        if self.take(TokenKind::Assign)?.is_some() {
            initializer = Some(self.parse_expr()?);
            self.consume(TokenKind::Semicolon)?;
        } else if self.take(TokenKind::Get)?.is_some() {
            let (children, internal) = if self.take(TokenKind::Assign)?.is_some() {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::Semicolon)?;
                (vec![Node::Return(expr)], true)
            } else {
                self.consume(TokenKind::LBrace)?;
                let body = self.parse_children(Context::Function)?;
                self.consume(TokenKind::RBrace)?;
                (body, false)
            };
            getter = Some(Box::new(FunctionDeclaration {
                modifiers: FunctionModifiers::empty(),
                name: getter_name(&name),
                return_ty: ty.clone(),
                parameters: Vec::new(),
                internal,
                children,
            }));
        } else if ty.is_some() {
            self.consume(TokenKind::Semicolon)?;
        } else {
            return Err(name_span.wrap(Error::MissingVariableType(name)));
        }

        debug!(%name, "parsed variable");
        Ok(Some(Node::Variable(Variable {
            modifiers,
            name,
            ty,
            initializer,
            getter,
        })))
    }

    fn parse_return(&mut self) -> Result<Option<Node>> {
        if self.take(TokenKind::Return)?.is_none() {
            return Ok(None);
        }
        let expr = self.parse_expr()?;
        self.consume(TokenKind::Semicolon)?;
        Ok(Some(Node::Return(expr)))
    }

    /// Parses a type reference, such as `Integer` or `Map<String, List<T>>`.
    fn parse_type(&mut self) -> Result<Expr> {
        let name = self.parse_ident()?;
        let generic_arguments = self.parse_generic_arguments()?;
        Ok(Expr::Identifier {
            name,
            generic_arguments,
        })
    }

    fn parse_ident(&mut self) -> Result<Box<str>> {
        self.consume(TokenKind::Identifier).map(|token| token.text)
    }

    /// Parses a `<T, ..>` list after an identifier, if present.
    ///
    /// `a < b` is only a generic argument list if the list is closed by a `>`.
    /// Otherwise every token is put back and `None` is returned, so that the
    /// `<` can be parsed as a comparison.
    fn parse_generic_arguments(&mut self) -> Result<Option<Vec<Expr>>> {
        if !self.is(TokenKind::Less)? {
            return Ok(None);
        }
        self.speculate(|p| {
            p.consume(TokenKind::Less)?;
            let mut arguments = vec![p.parse_type()?];
            while p.take(TokenKind::Comma)?.is_some() {
                arguments.push(p.parse_type()?);
            }
            p.consume(TokenKind::Greater)?;
            Ok(arguments)
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let Some(kind) = self.peek_kind()? else {
                break;
            };
            let Some((op, lbp, rbp)) = Self::infix_binding_power(kind) else {
                // Not an infix operator
                break;
            };
            if lbp < min_bp {
                // Operator binds less tightly than the minimum required
                break;
            }
            self.advance()?; // Operator
            let rhs = self.parse_expr_bp(rbp)?;
            lhs = Expr::binary(lhs, op, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = if self.take(TokenKind::Not)?.is_some() {
            UnaryOperator::Not
        } else if self.take(TokenKind::Minus)?.is_some() {
            UnaryOperator::Negate
        } else {
            return self.parse_range();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `a..b`, desugared into `Range(a, b)`.
    fn parse_range(&mut self) -> Result<Expr> {
        let start = self.parse_postfix()?;
        if self.take(TokenKind::DotDot)?.is_none() {
            return Ok(start);
        }
        let end = self.parse_postfix()?;
        Ok(Expr::call(Expr::ident(RANGE_FUNCTION), vec![start, end]))
    }

    /// Applies member accesses, calls and index accesses to a primary
    /// expression, for as long as any of them follows.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind()? {
                Some(TokenKind::Dot) => {
                    self.advance()?;
                    let member = self.parse_ident()?;
                    expr = Expr::binary(expr, BinaryOperator::Member, Expr::ident(&member));
                }
                Some(TokenKind::LParen) => {
                    self.advance()?;
                    let args =
                        self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr)?;
                    self.consume(TokenKind::RParen)?;
                    expr = Expr::call(expr, args);
                }
                Some(TokenKind::LBracket) => {
                    self.advance()?;
                    let args = self.parse_list(
                        TokenKind::RBracket,
                        TokenKind::Comma,
                        Parser::parse_expr,
                    )?;
                    self.consume(TokenKind::RBracket)?;
                    let get = Expr::binary(expr, BinaryOperator::Member, Expr::ident(GET_MEMBER));
                    expr = Expr::call(get, args);
                }
                _ => break Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance()?;
        let span = token.span();
        match token.kind {
            TokenKind::True
            | TokenKind::False
            | TokenKind::Integer
            | TokenKind::Double => match token.value {
                Some(value) => Ok(Expr::Literal(value)),
                None => Err(span.wrap(Error::UnexpectedTokenInExpr(token.kind))),
            },
            TokenKind::Identifier => {
                let generic_arguments = self.parse_generic_arguments()?;
                Ok(Expr::Identifier {
                    name: token.text,
                    generic_arguments,
                })
            }

            // Grouping: ( expr )
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                Ok(Expr::Grouping(Box::new(inner)))
            }

            // List: [ expr, .. ], desugared into List(..)
            TokenKind::LBracket => {
                let items =
                    self.parse_list(TokenKind::RBracket, TokenKind::Comma, Parser::parse_expr)?;
                self.consume(TokenKind::RBracket)?;
                Ok(Expr::call(Expr::ident(LIST_FUNCTION), items))
            }

            TokenKind::StringBegin => self.parse_string(),

            other => Err(span.wrap(Error::UnexpectedTokenInExpr(other))),
        }
    }

    /// Parses the rest of a string whose opening `"` was already consumed.
    fn parse_string(&mut self) -> Result<Expr> {
        let mut parts = Vec::new();
        let mut has_expr = false;
        loop {
            let text = self.consume(TokenKind::StringText)?;
            if !text.text.is_empty() {
                parts.push(Expr::Literal(Value::String(text.text)));
            }
            if self.take(TokenKind::StringEnd)?.is_some() {
                break;
            }
            parts.push(self.parse_expr()?);
            has_expr = true;
            self.consume(TokenKind::RBrace)?;
            self.lexer.pop_string_mode()?;
        }

        if has_expr {
            return Ok(Expr::Interpolation(parts));
        }
        Ok(parts
            .pop()
            .unwrap_or_else(|| Expr::Literal(Value::String("".into()))))
    }

    /// Parses `item (separator item)*` until `end_delim` is found. Does
    /// **NOT** consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        while !self.is(end_delim)? {
            items.push(parse_item(self)?);
            if self.take(separator)?.is_none() {
                // Without a separator, the list must end here.
                break;
            }
        }
        Ok(items)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(BinaryOperator, u8, u8)> {
        let bp = match kind {
            // Equality (left-associative)
            TokenKind::EqEq => (BinaryOperator::Eq, 1, 2),
            TokenKind::NotEq => (BinaryOperator::NotEq, 1, 2),

            // Comparisons (left-associative)
            TokenKind::Less => (BinaryOperator::Less, 3, 4),
            TokenKind::LessEq => (BinaryOperator::LessEq, 3, 4),
            TokenKind::Greater => (BinaryOperator::Greater, 3, 4),
            TokenKind::GreaterEq => (BinaryOperator::GreaterEq, 3, 4),

            // Addition/Subtraction (left-associative)
            TokenKind::Plus => (BinaryOperator::Add, 5, 6),
            TokenKind::Minus => (BinaryOperator::Sub, 5, 6),

            // Multiplication/Division (left-associative)
            TokenKind::Star => (BinaryOperator::Mul, 7, 8),
            TokenKind::Slash => (BinaryOperator::Div, 7, 8),

            _ => return None,
        };
        Some(bp)
    }
}

impl Parser<'_> {
    /// Runs `f` inside a lexer transaction. If it fails with a syntax error,
    /// every token it consumed is put back and `None` is returned. Lexical
    /// errors are not recoverable and are always returned.
    ///
    /// Only the outermost attempt opens a transaction: a nested attempt which
    /// fails makes the enclosing one fail as well.
    fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        let Some(transaction) = self.lexer.begin() else {
            return f(self).map(Some);
        };
        match f(self) {
            Ok(value) => {
                self.lexer.commit(transaction);
                Ok(Some(value))
            }
            Err(error) => {
                self.lexer.reset(transaction);
                if let Error::Lexer(_) = error.inner {
                    return Err(error);
                }
                debug!(%error, "speculative parse rejected");
                Ok(None)
            }
        }
    }

    /// Returns the kind of the current token, if any.
    fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        Ok(self.lexer.peek(0)?.map(|token| token.kind))
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Result<Token> {
        match self.lexer.consume(0)? {
            Some(token) => Ok(token),
            None => Err(self.eof.wrap(Error::UnexpectedEof)),
        }
    }

    /// Checks whether the current token matches the given one.
    fn is(&mut self, expect: TokenKind) -> Result<bool> {
        Ok(self.peek_kind()? == Some(expect))
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, returns `None` and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> Result<Option<Token>> {
        if self.is(expect)? {
            self.advance().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        match self.current()? {
            Some((kind, _)) if kind == expect => self.advance(),
            Some((actual, span)) => Err(span.wrap(Error::Unexpected {
                actual,
                expected: expect,
            })),
            None => Err(self.eof.wrap(Error::UnexpectedEof)),
        }
    }

    /// Advances if the current token matches any of the provided tokens,
    /// returning it. If not, fails.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        match self.current()? {
            Some((kind, _)) if expect.contains(&kind) => self.advance(),
            Some((actual, span)) => Err(span.wrap(Error::UnexpectedAny {
                actual,
                expected: Box::from(expect),
            })),
            None => Err(self.eof.wrap(Error::UnexpectedEof)),
        }
    }

    /// Fails if there is any token left.
    fn expect_end(&mut self, expected: &'static [TokenKind]) -> Result<()> {
        match self.current()? {
            None => Ok(()),
            Some((actual, span)) => Err(span.wrap(Error::UnexpectedAny {
                actual,
                expected: Box::from(expected),
            })),
        }
    }

    fn current(&mut self) -> Result<Option<(TokenKind, Span)>> {
        Ok(self.lexer.peek(0)?.map(|token| (token.kind, token.span())))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] lexer::Error),
    #[error("expected token {expected:?}, but got {actual:?}")]
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("expected one of {expected:?}, but got {actual:?}")]
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected token {0:?} in expression")]
    UnexpectedTokenInExpr(TokenKind),
    #[error("variable {0} has neither a type nor an initializer")]
    MissingVariableType(Box<str>),
    #[error("enum member value out of range")]
    EnumValueOverflow,
}

impl From<Spanned<lexer::Error>> for Spanned<Error> {
    fn from(error: Spanned<lexer::Error>) -> Self {
        error.map(Error::Lexer)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::test_utils::tree_tests;

    fn root(children: Vec<Node>) -> Node {
        Node::Root { children }
    }

    fn int(value: i64) -> Expr {
        Expr::Literal(Value::Integer(value))
    }

    fn member(name: &str, value: i64) -> Node {
        Node::Variable(Variable {
            modifiers: VariableModifiers::ENUM,
            name: name.into(),
            ty: Some(Expr::ident("E")),
            initializer: Some(int(value)),
            getter: None,
        })
    }

    #[test]
    fn enum_members_are_auto_numbered() {
        let parsed = parse("\nenum E { V0, V1, V2 = 5, V3, V4 = 1, V5 }\n").unwrap();
        assert_eq!(
            parsed,
            root(vec![Node::Enum {
                name: "E".into(),
                children: vec![
                    member("V0", 0),
                    member("V1", 1),
                    member("V2", 5),
                    member("V3", 6),
                    member("V4", 1),
                    member("V5", 2),
                ],
            }])
        );
    }

    #[test]
    fn enum_with_negative_value_and_trailing_comma() {
        let parsed = parse("enum E { V0 = -2, V1, }").unwrap();
        assert_eq!(
            parsed,
            root(vec![Node::Enum {
                name: "E".into(),
                children: vec![member("V0", -2), member("V1", -1)],
            }])
        );
    }

    #[test]
    fn variable_in_class() {
        let parsed = parse("\nclass C\n{\n    var a = 10;\n}\n").unwrap();
        assert_eq!(
            parsed,
            root(vec![Node::Class {
                name: "C".into(),
                generic_parameters: None,
                children: vec![Node::Variable(Variable {
                    modifiers: VariableModifiers::empty(),
                    name: "a".into(),
                    ty: None,
                    initializer: Some(int(10)),
                    getter: None,
                })],
            }])
        );
    }

    #[test]
    fn primary_constructor() {
        let parsed = parse("\nclass C(var i: Integer, val d: Double);\n").unwrap();
        assert_eq!(
            parsed,
            root(vec![Node::Class {
                name: "C".into(),
                generic_parameters: None,
                children: vec![Node::Function(FunctionDeclaration {
                    modifiers: FunctionModifiers::empty(),
                    name: CONSTRUCTOR_NAME.into(),
                    return_ty: None,
                    parameters: vec![
                        Parameter {
                            modifiers: VariableModifiers::empty(),
                            name: "i".into(),
                            ty: Expr::ident("Integer"),
                        },
                        Parameter {
                            modifiers: VariableModifiers::VAL,
                            name: "d".into(),
                            ty: Expr::ident("Double"),
                        },
                    ],
                    internal: false,
                    children: vec![],
                })],
            }])
        );
    }

    #[test]
    fn less_than_without_closing_angle_is_a_comparison() {
        assert_eq!(
            parse_expr("a < b").unwrap(),
            Expr::binary(Expr::ident("a"), BinaryOperator::Less, Expr::ident("b"))
        );
    }

    #[test]
    fn closed_angle_list_is_a_generic_identifier() {
        assert_eq!(
            parse_expr("Foo<Bar>").unwrap(),
            Expr::generic("Foo", vec![Expr::ident("Bar")])
        );
        assert_eq!(
            parse_expr("Map<String, List<Integer>>").unwrap(),
            Expr::generic(
                "Map",
                vec![
                    Expr::ident("String"),
                    Expr::generic("List", vec![Expr::ident("Integer")]),
                ]
            )
        );
    }

    #[test]
    fn failed_generic_attempt_leaves_no_drift() {
        // `b + c` is not a type, so the whole attempt is rolled back and every
        // token is parsed again as part of the comparison.
        assert_eq!(
            parse_expr("a < b + c").unwrap(),
            Expr::binary(
                Expr::ident("a"),
                BinaryOperator::Less,
                Expr::binary(Expr::ident("b"), BinaryOperator::Add, Expr::ident("c")),
            )
        );
        assert_eq!(
            parse_expr("a < B<C> == d").unwrap(),
            Expr::binary(
                Expr::binary(
                    Expr::ident("a"),
                    BinaryOperator::Less,
                    Expr::generic("B", vec![Expr::ident("C")]),
                ),
                BinaryOperator::Eq,
                Expr::ident("d"),
            )
        );
    }

    #[test]
    fn speculation_restores_the_exact_token_stream() {
        let src = "a < b > ; c";
        let mut p = Parser::new(src);
        p.advance().unwrap();
        let rejected = p
            .speculate(|p| {
                p.consume(TokenKind::Less)?;
                p.consume(TokenKind::Identifier)?;
                p.consume(TokenKind::Less)
            })
            .unwrap();
        assert!(rejected.is_none());

        let rest: Vec<_> = std::iter::from_fn(|| p.lexer.consume(0).unwrap())
            .map(|t| t.text.into_string())
            .collect();
        assert_eq!(rest, ["<", "b", ">", ";", "c"]);
    }

    #[test]
    fn desugared_forms() {
        assert_eq!(
            parse_expr("1..10").unwrap(),
            Expr::call(Expr::ident(RANGE_FUNCTION), vec![int(1), int(10)])
        );
        assert_eq!(
            parse_expr("[1, 2]").unwrap(),
            Expr::call(Expr::ident(LIST_FUNCTION), vec![int(1), int(2)])
        );
        assert_eq!(
            parse_expr("xs[0]").unwrap(),
            Expr::call(
                Expr::binary(
                    Expr::ident("xs"),
                    BinaryOperator::Member,
                    Expr::ident(GET_MEMBER)
                ),
                vec![int(0)]
            )
        );
    }

    #[test]
    fn string_without_interpolation_collapses() {
        assert_eq!(
            parse_expr(r#""hello""#).unwrap(),
            Expr::Literal(Value::String("hello".into()))
        );
        assert_eq!(
            parse_expr(r#""""#).unwrap(),
            Expr::Literal(Value::String("".into()))
        );
    }

    #[test]
    fn string_interpolation_parts() {
        assert_eq!(
            parse_expr(r#""a${x}b${y + 1}""#).unwrap(),
            Expr::Interpolation(vec![
                Expr::Literal(Value::String("a".into())),
                Expr::ident("x"),
                Expr::Literal(Value::String("b".into())),
                Expr::binary(Expr::ident("y"), BinaryOperator::Add, int(1)),
            ])
        );
    }

    #[test]
    fn nested_string_interpolation() {
        assert_eq!(
            parse_expr(r#""<${"[${x}]"}>""#).unwrap(),
            Expr::Interpolation(vec![
                Expr::Literal(Value::String("<".into())),
                Expr::Interpolation(vec![
                    Expr::Literal(Value::String("[".into())),
                    Expr::ident("x"),
                    Expr::Literal(Value::String("]".into())),
                ]),
                Expr::Literal(Value::String(">".into())),
            ])
        );
    }

    #[test]
    fn computed_property_becomes_internal_getter() {
        let parsed = parse("var a: Integer get = 1 + 2;").unwrap();
        let Node::Root { children } = parsed else {
            unreachable!()
        };
        let [Node::Variable(variable)] = children.as_slice() else {
            panic!("expected a single variable, got {children:?}");
        };
        assert_eq!(variable.initializer, None);
        assert_eq!(
            variable.getter.as_deref(),
            Some(&FunctionDeclaration {
                modifiers: FunctionModifiers::empty(),
                name: "get_a".into(),
                return_ty: Some(Expr::ident("Integer")),
                parameters: vec![],
                internal: true,
                children: vec![Node::Return(Expr::binary(
                    int(1),
                    BinaryOperator::Add,
                    int(2)
                ))],
            })
        );
    }

    #[test]
    fn error_spans() {
        let error = parse("class A { var a = 1; ").unwrap_err();
        assert_eq!(error.inner, Error::UnexpectedEof);
        assert_eq!(error.span, Span::new_of_length(21, 0));

        let error = parse("var a;").unwrap_err();
        assert_eq!(error.inner, Error::MissingVariableType("a".into()));
        assert_eq!(error.span, Span::new_of_bounds(4..5));

        let error = parse("var a = 1 ? 2;").unwrap_err();
        assert_eq!(error.inner, Error::Lexer(lexer::Error::UnexpectedChar('?')));
    }

    tree_tests!(
        use parser;

        fn test_precedence_mul_plus() {
            let expr = "1 * 2 + 3";
            let tree_ok = "
                binary Add
                  binary Mul
                    int 1
                    int 2
                  int 3
            ";
        }

        fn test_precedence_plus_mul() {
            let expr = "1 + 2 * 3";
            let tree_ok = "
                binary Add
                  int 1
                  binary Mul
                    int 2
                    int 3
            ";
        }

        fn test_precedence_arith_compare_equality() {
            let expr = "a + 1 < b == c >= d - 2";
            let tree_ok = "
                binary Eq
                  binary Less
                    binary Add
                      ident a
                      int 1
                    ident b
                  binary GreaterEq
                    ident c
                    binary Sub
                      ident d
                      int 2
            ";
        }

        fn test_left_associativity() {
            let expr = "10 - 4 - 3";
            let tree_ok = "
                binary Sub
                  binary Sub
                    int 10
                    int 4
                  int 3
            ";
        }

        fn test_unary_binds_tighter_than_binary() {
            let expr = "-a * !b";
            let tree_ok = "
                binary Mul
                  unary Negate
                    ident a
                  unary Not
                    ident b
            ";
        }

        fn test_unary_applies_to_range() {
            let expr = "-1..5";
            let tree_ok = "
                unary Negate
                  call
                    ident Range
                    int 1
                    int 5
            ";
        }

        fn test_grouping() {
            let expr = "(1 + 2) * 3.5";
            let tree_ok = "
                binary Mul
                  paren
                    binary Add
                      int 1
                      int 2
                  double 3.5
            ";
        }

        fn test_suffix_chain() {
            let expr = "a.b(1)[2].c";
            let tree_ok = "
                binary Member
                  call
                    binary Member
                      call
                        binary Member
                          ident a
                          ident b
                        int 1
                      ident Get
                    int 2
                  ident c
            ";
        }

        fn test_booleans_and_strings() {
            let expr = r#"true != "x${false}""#;
            let tree_ok = r#"
                binary NotEq
                  bool true
                  interpolation
                    string "x"
                    bool false
            "#;
        }

        fn test_class_with_body() {
            let program = "
                class Point<T>(var x: T, val y: T) {
                    enum Axis { X, Y }
                    val origin: Point<Integer>;
                    var label get { val prefix = \"p\"; return prefix; }
                }
            ";
            let tree_ok = r#"
                class Point<T>
                  function .ctor(var x: T, val y: T)
                  enum Axis
                    val static X: Axis
                      int 0
                    val static Y: Axis
                      int 1
                  val origin: Point<Integer>
                  var label
                    function get_label()
                      val prefix
                        string "p"
                      return
                        ident prefix
            "#;
        }

        fn test_constructor_only_class_and_root_variables() {
            let program = "
                class Empty;
                val answer: Integer = 42;
                var half get = answer / 2;
            ";
            let tree_ok = "
                class Empty
                val answer: Integer
                  int 42
                var half
                  function get_half() (internal)
                    return
                      binary Div
                        ident answer
                        int 2
            ";
        }

        fn test_error_class_missing_closing_brace() {
            let program = "class A { var a = 1;";
            let expected_errors = &["20..20: unexpected end of input"];
        }

        fn test_error_unterminated_primary_constructor() {
            let program = "class A(var a: Integer {}";
            let expected_errors = &["23..24: expected token RParen, but got LBrace"];
        }

        fn test_error_parameter_without_modifier() {
            let program = "class A(a: Integer);";
            let expected_errors = &[
                "8..9: expected one of [Var, Val], but got Identifier",
            ];
        }

        fn test_error_trailing_tokens() {
            let program = "var a = 1; 2";
            let expected_errors = &[
                "11..12: expected one of [Enum, Class, Var, Val], but got Integer",
            ];
        }

        fn test_error_unexpected_token_in_expr() {
            let expr = "1 + ;";
            let expected_errors = &["4..5: unexpected token Semicolon in expression"];
        }

        fn test_error_return_outside_function() {
            let program = "class A { return 1; }";
            let expected_errors = &["10..16: expected token RBrace, but got Return"];
        }

        fn test_error_enum_value_past_the_largest_integer() {
            let program = "enum E { A = 9223372036854775807, B }";
            let expected_errors = &["34..35: enum member value out of range"];
        }

        fn test_error_lexer_unexpected_char() {
            let program = "var a = @;";
            let expected_errors = &["8..9: unexpected character '@'"];
        }
    );
}
