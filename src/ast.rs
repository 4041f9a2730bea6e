// root ::= decl*
// decl ::= enum | class | var
// enum ::= 'enum' ID '{' [member (',' member)* [',']] '}'
// member ::= ID ['=' ['-'] integer]
// class ::= 'class' ID ['<' ID (',' ID)* '>'] ['(' param (',' param)* ')'] ('{' decl* '}' | ';')
// param ::= ('var' | 'val') ID ':' type
// var ::= ('var' | 'val') ID [':' type] ['=' expr ';' | 'get' '=' expr ';' | 'get' '{' body* '}' | ';']
// body ::= var | 'return' expr ';'
// type ::= ID ['<' type (',' type)* '>']
// expr ::= expr ('==' | '!=' | '<' | '<=' | '>' | '>=' | '+' | '-' | '*' | '/') expr
//        | ('!' | '-') expr
//        | postfix ['..' postfix]
// postfix ::= primary ('.' ID | '(' args ')' | '[' args ']')*
// primary ::= true | false | integer | double | string
//           | '(' expr ')'
//           | '[' args ']'
//           | ID ['<' type (',' type)* '>']

// Precedence
//
// == !=
// < <= > >=
// + -
// * /
// ! -
// ..
// . () []

use bitflags::bitflags;

use crate::token::Value;

/// Name of the function a primary constructor desugars into.
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Callee of a desugared `a..b` range.
pub const RANGE_FUNCTION: &str = "Range";
/// Callee of a desugared `[a, b]` list literal.
pub const LIST_FUNCTION: &str = "List";
/// Member called by a desugared `a[i]` index access.
pub const GET_MEMBER: &str = "Get";

/// Name of the getter function synthesized for the property `name`.
pub fn getter_name(name: &str) -> Box<str> {
    format!("get_{name}").into_boxed_str()
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VariableModifiers: u8 {
        /// Read-only binding (`val`).
        const VAL = 1 << 0;
        const STATIC = 1 << 1;
        /// Every enum member is a static, read-only binding.
        const ENUM = Self::VAL.bits() | Self::STATIC.bits();
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionModifiers: u8 {
        const STATIC = 1 << 0;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Root {
        children: Vec<Node>,
    },
    Enum {
        name: Box<str>,
        /// One [`Node::Variable`] per member, with its value already computed.
        children: Vec<Node>,
    },
    Class {
        name: Box<str>,
        generic_parameters: Option<Vec<Box<str>>>,
        children: Vec<Node>,
    },
    Function(FunctionDeclaration),
    Variable(Variable),
    Return(Expr),
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root { children }
            | Node::Enum { children, .. }
            | Node::Class { children, .. } => children,
            Node::Function(function) => &function.children,
            Node::Variable(_) | Node::Return(_) => &[],
        }
    }

    /// A short description of the node kind, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Node::Root { .. } => "root",
            Node::Enum { .. } => "enum",
            Node::Class { .. } => "class",
            Node::Function(_) => "function",
            Node::Variable(_) => "variable",
            Node::Return(_) => "return statement",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDeclaration {
    pub modifiers: FunctionModifiers,
    pub name: Box<str>,
    pub return_ty: Option<Expr>,
    pub parameters: Vec<Parameter>,
    /// Whether the declaration (including its body) was synthesized by the
    /// parser instead of written out in the source.
    pub internal: bool,
    pub children: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub modifiers: VariableModifiers,
    pub name: Box<str>,
    pub ty: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub modifiers: VariableModifiers,
    pub name: Box<str>,
    pub ty: Option<Expr>,
    pub initializer: Option<Expr>,
    pub getter: Option<Box<FunctionDeclaration>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Identifier {
        name: Box<str>,
        generic_arguments: Option<Vec<Expr>>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinaryOperator,
        rhs: Box<Expr>,
    },
    Grouping(Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Alternating literal text and expression parts of an interpolated
    /// string. Empty text parts are not kept, but whitespace-only ones are,
    /// since their spaces are part of the string value.
    Interpolation(Vec<Expr>),
}

impl Expr {
    pub fn ident(name: &str) -> Expr {
        Expr::Identifier {
            name: name.into(),
            generic_arguments: None,
        }
    }

    pub fn generic(name: &str, generic_arguments: Vec<Expr>) -> Expr {
        Expr::Identifier {
            name: name.into(),
            generic_arguments: Some(generic_arguments),
        }
    }

    pub fn binary(lhs: Expr, op: BinaryOperator, rhs: Expr) -> Expr {
        Expr::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Identifier { .. } => "identifier",
            Expr::Unary { .. } => "unary expression",
            Expr::Binary { .. } => "binary expression",
            Expr::Grouping(_) => "grouping",
            Expr::Call { .. } => "function call",
            Expr::Interpolation(_) => "string interpolation",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `.` member access; the right operand is always an identifier.
    Member,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Member => ".",
        }
    }
}
