use std::fmt::{self, Write};

use crate::{
    ast::{self, FunctionDeclaration, Node, VariableModifiers},
    semantic::{self, EntryId, EntryKind, SemanticTree},
    token::Value,
};

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> fmt::Result {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

/// Displays a syntax tree, one node per line.
pub struct SyntaxTreeDisplay<'a>(pub &'a Node);

impl fmt::Display for SyntaxTreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Node::Root { children } => children.iter().try_for_each(|child| print_node(f, 0, child)),
            node => print_node(f, 0, node),
        }
    }
}

/// Displays a syntax expression, one node per line.
pub struct ExprDisplay<'a>(pub &'a ast::Expr);

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print_expr(f, 0, self.0)
    }
}

/// Displays a semantic tree, one entry per line. The built-in entries are
/// omitted, other internal ones are marked as such.
pub struct SemanticTreeDisplay<'a>(pub &'a SemanticTree);

impl fmt::Display for SemanticTreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.0;
        tree[SemanticTree::ROOT]
            .children()
            .iter()
            .filter(|id| !id.is_builtin())
            .try_for_each(|&child| print_entry(f, tree, 0, child))
    }
}

fn binding_keyword(modifiers: VariableModifiers) -> &'static str {
    if modifiers.contains(VariableModifiers::VAL) {
        "val"
    } else {
        "var"
    }
}

fn write_modifiers(w: &mut impl Write, modifiers: VariableModifiers) -> fmt::Result {
    write!(w, "{}", binding_keyword(modifiers))?;
    if modifiers.contains(VariableModifiers::STATIC) {
        write!(w, " static")?;
    }
    Ok(())
}

/// Writes a type reference on a single line, such as `Map<K, List<V>>`.
fn write_type(w: &mut impl Write, ty: &ast::Expr) -> fmt::Result {
    let ast::Expr::Identifier {
        name,
        generic_arguments,
    } = ty
    else {
        return write!(w, "<{}>", ty.describe());
    };
    write!(w, "{name}")?;
    if let Some(arguments) = generic_arguments {
        write!(w, "<")?;
        for (idx, argument) in arguments.iter().enumerate() {
            if idx > 0 {
                write!(w, ", ")?;
            }
            write_type(w, argument)?;
        }
        write!(w, ">")?;
    }
    Ok(())
}

fn write_generic_parameters(w: &mut impl Write, parameters: &[Box<str>]) -> fmt::Result {
    if !parameters.is_empty() {
        write!(w, "<{}>", parameters.join(", "))?;
    }
    Ok(())
}

fn print_node(w: &mut impl Write, i: usize, node: &Node) -> fmt::Result {
    match node {
        Node::Root { children } => {
            sp(w, i)?;
            writeln!(w, "root")?;
            for child in children {
                print_node(w, i + 1, child)?;
            }
        }
        Node::Enum { name, children } => {
            sp(w, i)?;
            writeln!(w, "enum {name}")?;
            for child in children {
                print_node(w, i + 1, child)?;
            }
        }
        Node::Class {
            name,
            generic_parameters,
            children,
        } => {
            sp(w, i)?;
            write!(w, "class {name}")?;
            if let Some(parameters) = generic_parameters {
                write_generic_parameters(w, parameters)?;
            }
            writeln!(w)?;
            for child in children {
                print_node(w, i + 1, child)?;
            }
        }
        Node::Function(function) => print_function(w, i, function)?,
        Node::Variable(variable) => {
            sp(w, i)?;
            write_modifiers(w, variable.modifiers)?;
            write!(w, " {}", variable.name)?;
            if let Some(ty) = &variable.ty {
                write!(w, ": ")?;
                write_type(w, ty)?;
            }
            writeln!(w)?;
            if let Some(initializer) = &variable.initializer {
                print_expr(w, i + 1, initializer)?;
            }
            if let Some(getter) = &variable.getter {
                print_function(w, i + 1, getter)?;
            }
        }
        Node::Return(expr) => {
            sp(w, i)?;
            writeln!(w, "return")?;
            print_expr(w, i + 1, expr)?;
        }
    }
    Ok(())
}

fn print_function(w: &mut impl Write, i: usize, function: &FunctionDeclaration) -> fmt::Result {
    sp(w, i)?;
    write!(w, "function {}(", function.name)?;
    for (idx, parameter) in function.parameters.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write_modifiers(w, parameter.modifiers)?;
        write!(w, " {}: ", parameter.name)?;
        write_type(w, &parameter.ty)?;
    }
    write!(w, ")")?;
    if let Some(ty) = &function.return_ty {
        write!(w, ": ")?;
        write_type(w, ty)?;
    }
    if function.internal {
        write!(w, " (internal)")?;
    }
    writeln!(w)?;
    for child in &function.children {
        print_node(w, i + 1, child)?;
    }
    Ok(())
}

fn write_literal(w: &mut impl Write, value: &Value) -> fmt::Result {
    let kind = match value {
        Value::Integer(_) => "int",
        Value::Double(_) => "double",
        Value::String(_) => "string",
        Value::Boolean(_) => "bool",
    };
    write!(w, "{kind} {value}")
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &ast::Expr) -> fmt::Result {
    sp(w, i)?;
    match expr {
        ast::Expr::Literal(value) => {
            write_literal(w, value)?;
            writeln!(w)?;
        }
        ast::Expr::Identifier { .. } => {
            write!(w, "ident ")?;
            write_type(w, expr)?;
            writeln!(w)?;
        }
        ast::Expr::Unary { op, operand } => {
            writeln!(w, "unary {op:?}")?;
            print_expr(w, i + 1, operand)?;
        }
        ast::Expr::Binary { lhs, op, rhs } => {
            writeln!(w, "binary {op:?}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ast::Expr::Grouping(inner) => {
            writeln!(w, "paren")?;
            print_expr(w, i + 1, inner)?;
        }
        ast::Expr::Call { callee, args } => {
            // The callee comes first, followed by the arguments.
            writeln!(w, "call")?;
            print_expr(w, i + 1, callee)?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ast::Expr::Interpolation(parts) => {
            writeln!(w, "interpolation")?;
            for part in parts {
                print_expr(w, i + 1, part)?;
            }
        }
    }
    Ok(())
}

fn print_entry(w: &mut impl Write, tree: &SemanticTree, i: usize, id: EntryId) -> fmt::Result {
    let entry = &tree[id];
    sp(w, i)?;
    match &entry.kind {
        EntryKind::Root => write!(w, "root")?,
        EntryKind::Enum => write!(w, "enum {}", entry.name)?,
        EntryKind::Class { generic_parameters } => {
            write!(w, "class {}", entry.name)?;
            write_generic_parameters(w, generic_parameters)?;
        }
        EntryKind::Variable { modifiers, ty, .. } => {
            write_modifiers(w, *modifiers)?;
            write!(w, " {}", entry.name)?;
            if let Some(ty) = ty {
                write!(w, ": {}", tree[*ty].name)?;
            }
        }
        EntryKind::Function {
            modifiers: _,
            generic_parameters,
            return_ty,
            parameters,
            returns: _,
        } => {
            write!(w, "function {}", entry.name)?;
            write_generic_parameters(w, generic_parameters)?;
            write!(w, "(")?;
            for (idx, parameter) in parameters.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write_modifiers(w, parameter.modifiers)?;
                write!(w, " {}: {}", parameter.name, tree[parameter.ty].name)?;
            }
            write!(w, ")")?;
            if let Some(ty) = return_ty {
                write!(w, ": {}", tree[*ty].name)?;
            }
        }
    }
    if entry.internal {
        write!(w, " (internal)")?;
    }
    writeln!(w)?;

    match &entry.kind {
        EntryKind::Variable {
            initializer: Some(initializer),
            ..
        } => print_semantic_expr(w, tree, i + 1, initializer)?,
        EntryKind::Function { returns, .. } => {
            for &child in entry.children() {
                print_entry(w, tree, i + 1, child)?;
            }
            for expr in returns {
                sp(w, i + 1)?;
                writeln!(w, "return")?;
                print_semantic_expr(w, tree, i + 2, expr)?;
            }
            return Ok(());
        }
        _ => {}
    }
    for &child in entry.children() {
        print_entry(w, tree, i + 1, child)?;
    }
    Ok(())
}

fn print_semantic_expr(
    w: &mut impl Write,
    tree: &SemanticTree,
    i: usize,
    expr: &semantic::Expr,
) -> fmt::Result {
    sp(w, i)?;
    let ty = &tree[expr.ty()].name;
    match expr {
        semantic::Expr::Literal { value, .. } => {
            write_literal(w, value)?;
            writeln!(w, ": {ty}")?;
        }
        semantic::Expr::Binary { lhs, op, rhs, .. } => {
            writeln!(w, "binary {op:?}: {ty}")?;
            print_semantic_expr(w, tree, i + 1, lhs)?;
            print_semantic_expr(w, tree, i + 1, rhs)?;
        }
    }
    Ok(())
}
