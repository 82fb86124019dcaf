//! Bindings and the block-structured identification table.

use indexmap::IndexMap;

use crate::ast::TypeRef;

/// Index of a binding in [`Declarations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Option<DeclId> {
        u32::try_from(index).ok().map(DeclId)
    }
}

/// What a name was declared as, with the types the checker needs to check
/// its uses.
#[derive(Debug, Clone)]
pub enum BindingKind {
    /// Const declarations and const formal parameters.
    Constant { ty: TypeRef },
    /// Var declarations and var formal parameters.
    Variable { ty: TypeRef },
    Procedure { formals: Vec<FormalSig> },
    Function { formals: Vec<FormalSig>, result: TypeRef },
    Type { ty: TypeRef },
    UnaryOperator { argument: TypeRef, result: TypeRef },
    BinaryOperator { left: TypeRef, right: TypeRef, result: TypeRef },
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub spelling: String,
    pub kind: BindingKind,
}

/// The checked shape of one formal parameter. Two routine signatures match
/// when their formal lists match element for element.
#[derive(Debug, Clone)]
pub enum FormalSig {
    Const(TypeRef),
    Var(TypeRef),
    Proc(Vec<FormalSig>),
    Func(Vec<FormalSig>, TypeRef),
}

impl FormalSig {
    pub fn equivalent(&self, other: &FormalSig) -> bool {
        match (self, other) {
            (FormalSig::Const(a), FormalSig::Const(b)) | (FormalSig::Var(a), FormalSig::Var(b)) => {
                a.equivalent(b)
            }
            (FormalSig::Proc(a), FormalSig::Proc(b)) => signatures_equivalent(a, b),
            (FormalSig::Func(a, ra), FormalSig::Func(b, rb)) => {
                signatures_equivalent(a, b) && ra.equivalent(rb)
            }
            _ => false,
        }
    }
}

pub fn signatures_equivalent(a: &[FormalSig], b: &[FormalSig]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
}

/// Arena of every binding created during one compilation, standard
/// environment first.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    bindings: Vec<Binding>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spelling: impl Into<String>, kind: BindingKind) -> DeclId {
        let id = DeclId::from_index(self.bindings.len()).unwrap_or(DeclId(u32::MAX));
        self.bindings.push(Binding {
            spelling: spelling.into(),
            kind,
        });
        id
    }

    pub fn get(&self, id: DeclId) -> Option<&Binding> {
        self.bindings.get(id.index())
    }

    pub fn get_mut(&mut self, id: DeclId) -> Option<&mut Binding> {
        self.bindings.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Scope stack mapping spellings to bindings. Lookup searches innermost
/// first; entry only touches the innermost scope.
#[derive(Debug)]
pub struct IdentificationTable {
    scopes: Vec<IndexMap<String, DeclId>>,
}

impl Default for IdentificationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentificationTable {
    /// A table holding only the outermost (standard environment) scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
        }
    }

    pub fn level(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// The outermost scope is never closed.
    pub fn close_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `spelling` in the innermost scope. Returns true when the name was
    /// already bound in that same scope; the new binding wins either way.
    pub fn enter(&mut self, spelling: &str, id: DeclId) -> bool {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(spelling.to_string(), id).is_some(),
            None => false,
        }
    }

    pub fn retrieve(&self, spelling: &str) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(spelling).copied())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ast::{SourcePosition, TypeDenoter, TypeKind};

    fn int() -> TypeRef {
        TypeDenoter::new(TypeKind::Int, SourcePosition::default())
    }

    #[test]
    fn inner_binding_shadows_then_restores_outer() {
        let mut decls = Declarations::new();
        let outer = decls.add("x", BindingKind::Variable { ty: int() });
        let inner = decls.add("x", BindingKind::Constant { ty: int() });
        let mut table = IdentificationTable::new();
        table.open_scope();
        assert!(!table.enter("x", outer));
        table.open_scope();
        assert!(!table.enter("x", inner));
        assert_eq!(table.retrieve("x"), Some(inner));
        table.close_scope();
        assert_eq!(table.retrieve("x"), Some(outer));
    }

    #[test]
    fn duplicate_only_within_one_scope() {
        let mut decls = Declarations::new();
        let a = decls.add("y", BindingKind::Variable { ty: int() });
        let b = decls.add("y", BindingKind::Variable { ty: int() });
        let mut table = IdentificationTable::new();
        table.open_scope();
        assert!(!table.enter("y", a));
        assert!(table.enter("y", b));
        assert_eq!(table.retrieve("y"), Some(b));
        table.close_scope();
        table.open_scope();
        assert!(!table.enter("y", a));
    }

    #[test]
    fn outermost_scope_survives_close() {
        let mut decls = Declarations::new();
        let id = decls.add("maxint", BindingKind::Constant { ty: int() });
        let mut table = IdentificationTable::new();
        table.enter("maxint", id);
        table.close_scope();
        assert_eq!(table.level(), 0);
        assert_eq!(table.retrieve("maxint"), Some(id));
    }

    #[test]
    fn signatures_compare_structurally() {
        let a = vec![FormalSig::Const(int()), FormalSig::Var(int())];
        let b = vec![FormalSig::Const(int()), FormalSig::Var(int())];
        let c = vec![FormalSig::Var(int()), FormalSig::Const(int())];
        assert!(signatures_equivalent(&a, &b));
        assert!(!signatures_equivalent(&a, &c));
        assert!(!signatures_equivalent(&a, &a[..1]));
    }
}
