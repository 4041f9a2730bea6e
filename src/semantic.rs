//! The semantic tree: a scope hierarchy of declared entries.
//!
//! Entries live in an arena owned by [`SemanticTree`] and are addressed by
//! [`EntryId`]. A parent owns the ordered list of its children, while each
//! child only keeps the id of its parent, which defines its scope.
//!
//! The built-in primitive types are shared by every tree. They are built once
//! per process (see [`Primitive`]) and attached to the root of each new tree
//! by reference.

use std::{collections::HashSet, fmt, ops::Index, sync::LazyLock};

use tracing::trace;

use crate::{
    ast::{BinaryOperator, FunctionModifiers, VariableModifiers},
    token::Value,
};

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(Slot);

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
enum Slot {
    /// Index into the shared built-in entries.
    Builtin(usize),
    /// Index into the entries of a single tree.
    Local(usize),
}

impl EntryId {
    pub fn is_builtin(self) -> bool {
        matches!(self.0, Slot::Builtin(_))
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Slot::Builtin(i) => write!(f, "EntryId(builtin {i})"),
            Slot::Local(i) => write!(f, "EntryId({i})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub name: Box<str>,
    pub kind: EntryKind,
    /// Synthesized rather than declared in the source. Internal entries can
    /// be looked up but are skipped by [`SemanticTree::similar`].
    pub internal: bool,
    parent: Option<EntryId>,
    children: Vec<EntryId>,
}

impl Entry {
    pub fn new(name: impl Into<Box<str>>, kind: EntryKind) -> Entry {
        Entry {
            name: name.into(),
            kind,
            internal: false,
            parent: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn internal(mut self) -> Entry {
        self.internal = true;
        self
    }

    pub fn children(&self) -> &[EntryId] {
        &self.children
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntryKind {
    Root,
    Variable {
        modifiers: VariableModifiers,
        ty: Option<EntryId>,
        initializer: Option<Expr>,
    },
    Enum,
    Class {
        generic_parameters: Vec<Box<str>>,
    },
    Function {
        modifiers: FunctionModifiers,
        generic_parameters: Vec<Box<str>>,
        return_ty: Option<EntryId>,
        parameters: Vec<Parameter>,
        /// The expressions returned by the body, in source order.
        returns: Vec<Expr>,
    },
}

impl EntryKind {
    /// Whether the entry can be named as a type.
    pub fn is_type(&self) -> bool {
        matches!(self, EntryKind::Enum | EntryKind::Class { .. })
    }

    pub fn describe(&self) -> &'static str {
        match self {
            EntryKind::Root => "root",
            EntryKind::Variable { .. } => "variable",
            EntryKind::Enum => "enum",
            EntryKind::Class { .. } => "class",
            EntryKind::Function { .. } => "function",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub modifiers: VariableModifiers,
    pub name: Box<str>,
    pub ty: EntryId,
}

/// A type-resolved expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal {
        value: Value,
        ty: EntryId,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinaryOperator,
        rhs: Box<Expr>,
        ty: EntryId,
    },
}

impl Expr {
    pub fn ty(&self) -> EntryId {
        match self {
            Expr::Literal { ty, .. } | Expr::Binary { ty, .. } => *ty,
        }
    }
}

/// The built-in primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Integer,
    Double,
    String,
    Boolean,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Integer => "Integer",
            Primitive::Double => "Double",
            Primitive::String => "String",
            Primitive::Boolean => "Boolean",
        }
    }

    /// The id of the shared entry of this type, valid in every tree.
    pub fn id(self) -> EntryId {
        let builtins = &*BUILTINS;
        match self {
            Primitive::Integer => builtins.integer,
            Primitive::Double => builtins.double,
            Primitive::String => builtins.string,
            Primitive::Boolean => builtins.boolean,
        }
    }

    /// The type of a literal value.
    pub fn of(value: &Value) -> Primitive {
        match value {
            Value::Integer(_) => Primitive::Integer,
            Value::Double(_) => Primitive::Double,
            Value::String(_) => Primitive::String,
            Value::Boolean(_) => Primitive::Boolean,
        }
    }
}

static BUILTINS: LazyLock<Builtins> = LazyLock::new(Builtins::seed);

struct Builtins {
    entries: Vec<Entry>,
    /// Entries attached to the root of every tree.
    top_level: Vec<EntryId>,
    integer: EntryId,
    double: EntryId,
    string: EntryId,
    boolean: EntryId,
}

impl Builtins {
    fn seed() -> Builtins {
        let mut entries = Vec::with_capacity(8);
        let mut top_level = Vec::with_capacity(4);
        let mut primitive = |entries: &mut Vec<Entry>, which: Primitive| {
            let id = push_builtin(entries, None, Entry::new(which.name(), class_kind()));
            top_level.push(id);
            id
        };

        let integer = primitive(&mut entries, Primitive::Integer);
        let double = primitive(&mut entries, Primitive::Double);
        let string = primitive(&mut entries, Primitive::String);
        let boolean = primitive(&mut entries, Primitive::Boolean);

        let operand = |name: &str| Parameter {
            modifiers: VariableModifiers::empty(),
            name: name.into(),
            ty: integer,
        };
        let add = EntryKind::Function {
            modifiers: FunctionModifiers::STATIC,
            generic_parameters: Vec::new(),
            return_ty: Some(integer),
            parameters: vec![operand("left"), operand("right")],
            returns: Vec::new(),
        };
        push_builtin(&mut entries, Some(integer), Entry::new("+", add));

        trace!(entries = entries.len(), "built-in entries seeded");
        Builtins {
            entries,
            top_level,
            integer,
            double,
            string,
            boolean,
        }
    }
}

fn class_kind() -> EntryKind {
    EntryKind::Class {
        generic_parameters: Vec::new(),
    }
}

fn push_builtin(entries: &mut Vec<Entry>, parent: Option<EntryId>, entry: Entry) -> EntryId {
    let id = EntryId(Slot::Builtin(entries.len()));
    if let Some(EntryId(Slot::Builtin(parent))) = parent {
        entries[parent].children.push(id);
    }
    entries.push(Entry {
        internal: true,
        parent,
        ..entry
    });
    id
}

/// The name of the function implementing `op`, if it can be overloaded.
pub fn operator_name(op: BinaryOperator) -> Option<&'static str> {
    match op {
        BinaryOperator::Add => Some("+"),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct SemanticTree {
    entries: Vec<Entry>,
}

impl Default for SemanticTree {
    fn default() -> Self {
        SemanticTree::new()
    }
}

impl SemanticTree {
    pub const ROOT: EntryId = EntryId(Slot::Local(0));

    /// Creates a tree holding only the root and the built-in types.
    pub fn new() -> SemanticTree {
        let root = Entry {
            children: BUILTINS.top_level.clone(),
            ..Entry::new("", EntryKind::Root)
        };
        SemanticTree {
            entries: vec![root],
        }
    }

    pub fn get(&self, id: EntryId) -> &Entry {
        match id.0 {
            Slot::Builtin(i) => &BUILTINS.entries[i],
            Slot::Local(i) => &self.entries[i],
        }
    }

    /// Mutable access to an entry of this tree. Its place in the tree can't
    /// be changed through it.
    pub fn get_mut(&mut self, id: EntryId) -> &mut Entry {
        let Slot::Local(index) = id.0 else {
            panic!("built-in entries are shared and must not be mutated");
        };
        &mut self.entries[index]
    }

    /// Appends `entry` to the children of `parent`, making `parent` its scope.
    pub fn add(&mut self, parent: EntryId, entry: Entry) -> EntryId {
        let Slot::Local(parent_index) = parent.0 else {
            panic!("built-in entries are shared and must not be mutated");
        };
        let id = EntryId(Slot::Local(self.entries.len()));
        self.entries[parent_index].children.push(id);
        self.entries.push(Entry {
            parent: Some(parent),
            ..entry
        });
        id
    }

    /// Returns the scope `id` was declared in, or `None` for the root.
    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        match (id.0, self.get(id).parent) {
            (Slot::Local(0), _) => None,
            // The top level built-ins belong to the root of every tree.
            (Slot::Builtin(_), None) => Some(Self::ROOT),
            (_, parent) => parent,
        }
    }

    /// `scope` followed by each of its enclosing scopes, up to the root.
    pub fn scopes(&self, scope: EntryId) -> impl Iterator<Item = EntryId> + '_ {
        std::iter::successors(Some(scope), |&id| self.parent(id))
    }

    /// Looks for a type named `name`, first among the children of `scope`
    /// and then among the children of each enclosing scope. Within a single
    /// scope the latest declaration wins.
    pub fn find_type(&self, scope: EntryId, name: &str) -> Option<EntryId> {
        self.scopes(scope).find_map(|scope| {
            self.get(scope).children.iter().rev().copied().find(|&child| {
                let entry = self.get(child);
                entry.kind.is_type() && &*entry.name == name
            })
        })
    }

    /// Looks for a function named `name` whose parameter types are exactly
    /// `parameter_types`, searching scopes the same way [`Self::find_type`]
    /// does.
    pub fn find_function(
        &self,
        scope: EntryId,
        name: &str,
        parameter_types: &[EntryId],
    ) -> Option<EntryId> {
        self.scopes(scope).find_map(|scope| {
            self.get(scope).children.iter().rev().copied().find(|&child| {
                let entry = self.get(child);
                match &entry.kind {
                    EntryKind::Function { parameters, .. } => {
                        &*entry.name == name
                            && parameters
                                .iter()
                                .map(|parameter| parameter.ty)
                                .eq(parameter_types.iter().copied())
                    }
                    _ => false,
                }
            })
        })
    }

    /// The non-internal children of `id`.
    pub fn visible_children(&self, id: EntryId) -> impl Iterator<Item = EntryId> + '_ {
        self.get(id)
            .children
            .iter()
            .copied()
            .filter(|&child| !self.get(child).internal)
    }

    /// Structurally compares the entry `a` of this tree with the entry `b` of
    /// `other`.
    ///
    /// Internal children are skipped. Type references are followed and
    /// compared as well, each pair of entries at most once, so that cyclic
    /// references (such as an enum member typed as its own enum) terminate.
    pub fn similar(&self, a: EntryId, other: &SemanticTree, b: EntryId) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![(a, b)];

        while let Some((a, b)) = pending.pop() {
            if !visited.insert((a, b)) {
                continue;
            }
            let (x, y) = (self.get(a), other.get(b));
            if x.name != y.name || x.internal != y.internal {
                trace!(lhs = %x.name, rhs = %y.name, "entries differ");
                return false;
            }
            if !kinds_similar(&x.kind, &y.kind, &mut pending) {
                trace!(name = %x.name, "entry kinds differ");
                return false;
            }

            let xs: Vec<_> = self.visible_children(a).collect();
            let ys: Vec<_> = other.visible_children(b).collect();
            if xs.len() != ys.len() {
                trace!(name = %x.name, "child counts differ");
                return false;
            }
            pending.extend(xs.into_iter().zip(ys));
        }
        true
    }
}

impl Index<EntryId> for SemanticTree {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Entry {
        self.get(id)
    }
}

/// Compares the fields of two entry kinds, queueing every pair of referenced
/// entries in `pending`.
fn kinds_similar(a: &EntryKind, b: &EntryKind, pending: &mut Vec<(EntryId, EntryId)>) -> bool {
    match (a, b) {
        (EntryKind::Root, EntryKind::Root) | (EntryKind::Enum, EntryKind::Enum) => true,
        (
            EntryKind::Class {
                generic_parameters: a,
            },
            EntryKind::Class {
                generic_parameters: b,
            },
        ) => a == b,
        (
            EntryKind::Variable {
                modifiers: a_modifiers,
                ty: a_ty,
                initializer: a_init,
            },
            EntryKind::Variable {
                modifiers: b_modifiers,
                ty: b_ty,
                initializer: b_init,
            },
        ) => {
            a_modifiers == b_modifiers
                && refs_similar(*a_ty, *b_ty, pending)
                && match (a_init, b_init) {
                    (Some(a), Some(b)) => exprs_similar(a, b, pending),
                    (None, None) => true,
                    _ => false,
                }
        }
        (
            EntryKind::Function {
                modifiers: a_modifiers,
                generic_parameters: a_generics,
                return_ty: a_ret,
                parameters: a_params,
                returns: a_returns,
            },
            EntryKind::Function {
                modifiers: b_modifiers,
                generic_parameters: b_generics,
                return_ty: b_ret,
                parameters: b_params,
                returns: b_returns,
            },
        ) => {
            a_modifiers == b_modifiers
                && a_generics == b_generics
                && refs_similar(*a_ret, *b_ret, pending)
                && a_params.len() == b_params.len()
                && a_params.iter().zip(b_params).all(|(a, b)| {
                    pending.push((a.ty, b.ty));
                    a.modifiers == b.modifiers && a.name == b.name
                })
                && a_returns.len() == b_returns.len()
                && a_returns
                    .iter()
                    .zip(b_returns)
                    .all(|(a, b)| exprs_similar(a, b, pending))
        }
        _ => false,
    }
}

fn refs_similar(
    a: Option<EntryId>,
    b: Option<EntryId>,
    pending: &mut Vec<(EntryId, EntryId)>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            pending.push((a, b));
            true
        }
        (None, None) => true,
        _ => false,
    }
}

fn exprs_similar(a: &Expr, b: &Expr, pending: &mut Vec<(EntryId, EntryId)>) -> bool {
    let mut stack = vec![(a, b)];
    while let Some((a, b)) = stack.pop() {
        pending.push((a.ty(), b.ty()));
        match (a, b) {
            (Expr::Literal { value: a, .. }, Expr::Literal { value: b, .. }) => {
                if a != b {
                    return false;
                }
            }
            (
                Expr::Binary {
                    lhs: a_lhs,
                    op: a_op,
                    rhs: a_rhs,
                    ..
                },
                Expr::Binary {
                    lhs: b_lhs,
                    op: b_op,
                    rhs: b_rhs,
                    ..
                },
            ) => {
                if a_op != b_op {
                    return false;
                }
                stack.push((a_lhs.as_ref(), b_lhs.as_ref()));
                stack.push((a_rhs.as_ref(), b_rhs.as_ref()));
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn class(name: &str) -> Entry {
        Entry::new(name, class_kind())
    }

    fn variable(name: &str, ty: EntryId, initializer: Option<Expr>) -> Entry {
        Entry::new(
            name,
            EntryKind::Variable {
                modifiers: VariableModifiers::empty(),
                ty: Some(ty),
                initializer,
            },
        )
    }

    fn int(value: i64) -> Expr {
        Expr::Literal {
            value: Value::Integer(value),
            ty: Primitive::Integer.id(),
        }
    }

    #[test]
    fn builtins_are_shared_by_every_root() {
        let a = SemanticTree::new();
        let b = SemanticTree::new();
        let integer = Primitive::Integer.id();

        assert!(std::ptr::eq(a.get(integer), b.get(integer)));
        assert_eq!(a.parent(integer), Some(SemanticTree::ROOT));
        assert_eq!(a.parent(SemanticTree::ROOT), None);
        assert_eq!(a[SemanticTree::ROOT].children().len(), 4);
        assert!(a[SemanticTree::ROOT]
            .children()
            .iter()
            .all(|&child| a[child].internal));
        assert_eq!(a.visible_children(SemanticTree::ROOT).count(), 0);
    }

    #[test]
    fn integer_addition_is_builtin() {
        let tree = SemanticTree::new();
        let integer = Primitive::Integer.id();
        let double = Primitive::Double.id();

        let add = tree.find_function(integer, "+", &[integer, integer]).unwrap();
        assert_eq!(tree.parent(add), Some(integer));
        let EntryKind::Function { return_ty, .. } = &tree[add].kind else {
            panic!("expected a function, got {:?}", tree[add].kind);
        };
        assert_eq!(*return_ty, Some(integer));

        assert_eq!(tree.find_function(integer, "+", &[integer, double]), None);
        assert_eq!(tree.find_function(double, "+", &[double, double]), None);
        assert_eq!(operator_name(BinaryOperator::Add), Some(&*tree[add].name));
        assert_eq!(operator_name(BinaryOperator::Mul), None);
        // Operators live inside their type, not in the global scope.
        assert_eq!(
            tree.find_function(SemanticTree::ROOT, "+", &[integer, integer]),
            None
        );
    }

    #[test]
    fn add_links_the_parent() {
        let mut tree = SemanticTree::new();
        let c = tree.add(SemanticTree::ROOT, class("C"));
        let a = tree.add(c, variable("a", Primitive::Integer.id(), None));

        assert_eq!(tree.parent(a), Some(c));
        assert_eq!(tree.parent(c), Some(SemanticTree::ROOT));
        assert_eq!(tree[c].children(), &[a]);
        assert_eq!(
            tree.scopes(a).collect::<Vec<_>>(),
            [a, c, SemanticTree::ROOT]
        );
    }

    #[test]
    #[should_panic(expected = "built-in entries are shared")]
    fn builtins_cannot_be_mutated() {
        let mut tree = SemanticTree::new();
        tree.add(Primitive::Integer.id(), class("Nested"));
    }

    #[test]
    fn nearest_type_declaration_wins() {
        let mut tree = SemanticTree::new();
        let outer_t = tree.add(SemanticTree::ROOT, class("T"));
        let a = tree.add(SemanticTree::ROOT, class("A"));
        let inner_t = tree.add(a, class("T"));
        let only_in_a = tree.add(a, class("U"));
        let b = tree.add(SemanticTree::ROOT, class("B"));

        assert_eq!(tree.find_type(a, "T"), Some(inner_t));
        assert_eq!(tree.find_type(b, "T"), Some(outer_t));
        assert_eq!(tree.find_type(a, "U"), Some(only_in_a));
        assert_eq!(tree.find_type(b, "U"), None);
        assert_eq!(tree.find_type(b, "Boolean"), Some(Primitive::Boolean.id()));
    }

    #[test]
    fn variables_are_not_types() {
        let mut tree = SemanticTree::new();
        tree.add(
            SemanticTree::ROOT,
            variable("Integer2", Primitive::Integer.id(), None),
        );
        assert_eq!(tree.find_type(SemanticTree::ROOT, "Integer2"), None);
    }

    #[test]
    fn similar_ignores_ids_and_internal_entries() {
        let mut a = SemanticTree::new();
        let a_c = a.add(SemanticTree::ROOT, class("C"));
        a.add(a_c, class("Hidden").internal());
        a.add(a_c, variable("x", Primitive::Integer.id(), Some(int(1))));

        let mut b = SemanticTree::new();
        b.add(SemanticTree::ROOT, class("Unrelated").internal());
        let b_c = b.add(SemanticTree::ROOT, class("C"));
        b.add(b_c, variable("x", Primitive::Integer.id(), Some(int(1))));

        assert!(a.similar(SemanticTree::ROOT, &b, SemanticTree::ROOT));
    }

    #[test]
    fn similar_compares_initializers_and_types() {
        let build = |value: i64, ty: Primitive| {
            let mut tree = SemanticTree::new();
            let c = tree.add(SemanticTree::ROOT, class("C"));
            tree.add(c, variable("x", ty.id(), Some(int(value))));
            tree
        };
        let base = build(1, Primitive::Integer);
        let root = SemanticTree::ROOT;
        assert!(base.similar(root, &build(1, Primitive::Integer), root));
        assert!(!base.similar(root, &build(2, Primitive::Integer), root));
        assert!(!base.similar(root, &build(1, Primitive::Double), root));
    }

    #[test]
    fn similar_follows_cyclic_type_references() {
        let build = |member: &str| {
            let mut tree = SemanticTree::new();
            let e = tree.add(SemanticTree::ROOT, Entry::new("E", EntryKind::Enum));
            tree.add(
                e,
                Entry::new(
                    member,
                    EntryKind::Variable {
                        modifiers: VariableModifiers::ENUM,
                        ty: Some(e),
                        initializer: Some(int(0)),
                    },
                ),
            );
            tree
        };
        let tree = build("V0");
        assert!(tree.similar(SemanticTree::ROOT, &build("V0"), SemanticTree::ROOT));
        assert!(!tree.similar(SemanticTree::ROOT, &build("V1"), SemanticTree::ROOT));
    }
}
