use tracing::debug;

use crate::{
    ast::{self, FunctionDeclaration, Node},
    semantic::{
        self, operator_name, Entry, EntryId, EntryKind, Parameter, Primitive, SemanticTree,
    },
    token::Value,
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Lowers the syntax tree rooted at `root` into a new semantic tree.
pub fn analyze(root: &Node) -> Result<SemanticTree> {
    Analyzer::new().analyze(root)
}

pub struct Analyzer {
    tree: SemanticTree,
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new()
    }
}

impl Analyzer {
    pub fn new() -> Analyzer {
        Analyzer {
            tree: SemanticTree::new(),
        }
    }

    pub fn analyze(mut self, root: &Node) -> Result<SemanticTree> {
        let Node::Root { children } = root else {
            return Err(Error::UnsupportedDeclaration(root.describe()));
        };
        self.lower_children(SemanticTree::ROOT, children)?;
        Ok(self.tree)
    }

    fn lower_children(&mut self, scope: EntryId, children: &[Node]) -> Result<()> {
        for child in children {
            self.lower_declaration(scope, child)?;
        }
        Ok(())
    }

    fn lower_declaration(&mut self, scope: EntryId, node: &Node) -> Result<()> {
        match node {
            Node::Enum { name, children } => self.lower_enum(scope, name, children),
            Node::Class {
                name,
                generic_parameters,
                children,
            } => {
                let kind = EntryKind::Class {
                    generic_parameters: generic_parameters.clone().unwrap_or_default(),
                };
                let class = self.tree.add(scope, Entry::new(name.clone(), kind));
                debug!(%name, "lowered class");
                self.lower_children(class, children)
            }
            Node::Variable(variable) => self.lower_variable(scope, variable),
            Node::Function(function) => self.lower_function(scope, function).map(drop),
            Node::Root { .. } | Node::Return(_) => {
                Err(Error::UnsupportedDeclaration(node.describe()))
            }
        }
    }

    /// Enum members are numbered from zero, each one following the previous
    /// member unless it has an explicit value.
    fn lower_enum(&mut self, scope: EntryId, name: &str, members: &[Node]) -> Result<()> {
        let enum_id = self.tree.add(scope, Entry::new(name, EntryKind::Enum));
        let integer = Primitive::Integer.id();

        let mut next_value = Some(0_i64);
        for member in members {
            let Node::Variable(variable) = member else {
                return Err(Error::UnsupportedDeclaration(member.describe()));
            };
            let value = match &variable.initializer {
                Some(ast::Expr::Literal(Value::Integer(value))) => *value,
                Some(other) => return Err(Error::UnsupportedExpression(other.describe())),
                None => next_value.ok_or_else(|| Error::EnumOverflow(variable.name.clone()))?,
            };
            next_value = value.checked_add(1);

            let kind = EntryKind::Variable {
                modifiers: variable.modifiers,
                ty: Some(enum_id),
                initializer: Some(semantic::Expr::Literal {
                    value: Value::Integer(value),
                    ty: integer,
                }),
            };
            self.tree.add(enum_id, Entry::new(variable.name.clone(), kind));
        }

        debug!(%name, members = members.len(), "lowered enum");
        Ok(())
    }

    fn lower_variable(&mut self, scope: EntryId, variable: &ast::Variable) -> Result<()> {
        let name = &variable.name;
        let declared = variable
            .ty
            .as_ref()
            .map(|ty| self.resolve_type(scope, ty))
            .transpose()?;
        let initializer = variable
            .initializer
            .as_ref()
            .map(|expr| self.lower_expr(expr))
            .transpose()?;

        if let (Some(declared), Some(initializer)) = (declared, &initializer) {
            self.expect_same(name, declared, initializer.ty())?;
        }
        let ty = declared.or(initializer.as_ref().map(semantic::Expr::ty));

        let kind = EntryKind::Variable {
            modifiers: variable.modifiers,
            ty,
            initializer,
        };
        let id = self.tree.add(scope, Entry::new(name.clone(), kind));

        let ty = match &variable.getter {
            Some(getter) => {
                let getter = self.lower_function(scope, getter)?;
                let return_ty = match self.tree[getter].kind {
                    EntryKind::Function { return_ty, .. } => return_ty,
                    _ => None,
                };
                ty.or(return_ty)
            }
            None => ty,
        };
        let Some(ty) = ty else {
            return Err(Error::UntypedVariable(name.clone()));
        };
        if let EntryKind::Variable { ty: slot, .. } = &mut self.tree.get_mut(id).kind {
            *slot = Some(ty);
        }

        debug!(%name, ty = %self.tree[ty].name, "lowered variable");
        Ok(())
    }

    /// Lowers a function and its body. A function without a declared return
    /// type takes the type of its first `return`.
    fn lower_function(&mut self, scope: EntryId, function: &FunctionDeclaration) -> Result<EntryId> {
        let mut return_ty = function
            .return_ty
            .as_ref()
            .map(|ty| self.resolve_type(scope, ty))
            .transpose()?;
        let parameters = function
            .parameters
            .iter()
            .map(|parameter| {
                Ok(Parameter {
                    modifiers: parameter.modifiers,
                    name: parameter.name.clone(),
                    ty: self.resolve_type(scope, &parameter.ty)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut entry = Entry::new(
            function.name.clone(),
            EntryKind::Function {
                modifiers: function.modifiers,
                generic_parameters: Vec::new(),
                return_ty,
                parameters,
                returns: Vec::new(),
            },
        );
        if function.internal {
            entry = entry.internal();
        }
        let id = self.tree.add(scope, entry);

        let mut returned = Vec::new();
        for child in &function.children {
            match child {
                Node::Variable(variable) => self.lower_variable(id, variable)?,
                Node::Return(expr) => {
                    let expr = self.lower_expr(expr)?;
                    match return_ty {
                        Some(expected) => self.expect_same(&function.name, expected, expr.ty())?,
                        None => return_ty = Some(expr.ty()),
                    }
                    returned.push(expr);
                }
                other => return Err(Error::UnsupportedDeclaration(other.describe())),
            }
        }

        if let EntryKind::Function {
            return_ty: ty_slot,
            returns,
            ..
        } = &mut self.tree.get_mut(id).kind
        {
            *ty_slot = return_ty;
            *returns = returned;
        }

        debug!(name = %function.name, "lowered function");
        Ok(id)
    }

    /// Resolves a type reference from `scope`. Generic arguments must name
    /// existing types, but are not part of the resolved type.
    fn resolve_type(&self, scope: EntryId, ty: &ast::Expr) -> Result<EntryId> {
        let ast::Expr::Identifier {
            name,
            generic_arguments,
        } = ty
        else {
            return Err(Error::UnsupportedExpression(ty.describe()));
        };
        let id = self
            .tree
            .find_type(scope, name)
            .ok_or_else(|| Error::UndefinedType(name.clone()))?;
        for argument in generic_arguments.iter().flatten() {
            self.resolve_type(scope, argument)?;
        }
        Ok(id)
    }

    fn lower_expr(&self, expr: &ast::Expr) -> Result<semantic::Expr> {
        match expr {
            ast::Expr::Literal(value) => Ok(semantic::Expr::Literal {
                value: value.clone(),
                ty: Primitive::of(value).id(),
            }),
            ast::Expr::Grouping(inner) => self.lower_expr(inner),
            ast::Expr::Binary { lhs, op, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                let ty = self.resolve_operator(*op, lhs.ty(), rhs.ty())?;
                Ok(semantic::Expr::Binary {
                    lhs: Box::new(lhs),
                    op: *op,
                    rhs: Box::new(rhs),
                    ty,
                })
            }
            other => Err(Error::UnsupportedExpression(other.describe())),
        }
    }

    /// Looks for the function implementing `op` for the given operand types,
    /// first in the left operand's type and then in the right operand's one.
    /// Returns the result type.
    fn resolve_operator(&self, op: ast::BinaryOperator, lhs: EntryId, rhs: EntryId) -> Result<EntryId> {
        let name = operator_name(op).ok_or(Error::UnimplementedOperator(op.symbol()))?;
        let operands = [lhs, rhs];
        let function = self
            .tree
            .find_function(lhs, name, &operands)
            .or_else(|| self.tree.find_function(rhs, name, &operands));

        match function.map(|function| &self.tree[function].kind) {
            Some(EntryKind::Function {
                return_ty: Some(ty),
                ..
            }) => Ok(*ty),
            _ => Err(Error::UnresolvedOperator {
                op: op.symbol(),
                lhs: self.tree[lhs].name.clone(),
                rhs: self.tree[rhs].name.clone(),
            }),
        }
    }

    fn expect_same(&self, name: &str, declared: EntryId, inferred: EntryId) -> Result<()> {
        if declared == inferred {
            return Ok(());
        }
        Err(Error::Mismatch {
            name: name.into(),
            declared: self.tree[declared].name.clone(),
            inferred: self.tree[inferred].name.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("undefined type {0}")]
    UndefinedType(Box<str>),
    #[error("{name} is declared as {declared}, but its value is {inferred}")]
    Mismatch {
        name: Box<str>,
        declared: Box<str>,
        inferred: Box<str>,
    },
    #[error("no operator {op} for {lhs} and {rhs}")]
    UnresolvedOperator {
        op: &'static str,
        lhs: Box<str>,
        rhs: Box<str>,
    },
    #[error("operator {0} is not implemented")]
    UnimplementedOperator(&'static str),
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(&'static str),
    #[error("unsupported declaration: {0}")]
    UnsupportedDeclaration(&'static str),
    #[error("variable {0} has no type")]
    UntypedVariable(Box<str>),
    #[error("value of enum member {0} is out of range")]
    EnumOverflow(Box<str>),
}
