use crate::ast::{SourcePosition, TypeDenoter, TypeKind, TypeRef};
use crate::machine::{self, Primitive};
use crate::symbols::{BindingKind, DeclId, Declarations, FormalSig};

/// Types the standard declarations are stated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdType {
    Boolean,
    Integer,
    Char,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdParam {
    Const(StdType),
    Var(StdType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdShape {
    Type(StdType),
    Const(StdType),
    Unary(StdType, StdType),
    Binary(StdType, StdType, StdType),
    Proc(&'static [StdParam]),
    Func(&'static [StdParam], StdType),
}

/// How the encoder represents a standard declaration at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdEntity {
    Type,
    Value(i32),
    Primitive(Primitive),
    Equality(Primitive),
    Bar,
}

/// A standard declaration: name, checked shape and run-time representation.
/// The checker, encoder and constant folder all read from this one table.
#[derive(Debug, Clone, Copy)]
pub struct StdDecl {
    pub name: &'static str,
    pub shape: StdShape,
    pub entity: StdEntity,
}

use StdType::{Any, Boolean, Char, Integer};

pub static STD_DECLS: &[StdDecl] = &[
    // ── Types ───────────────────────────────────────────────────
    StdDecl { name: "Boolean", shape: StdShape::Type(Boolean), entity: StdEntity::Type },
    StdDecl { name: "Char", shape: StdShape::Type(Char), entity: StdEntity::Type },
    StdDecl { name: "Integer", shape: StdShape::Type(Integer), entity: StdEntity::Type },
    // ── Constants ───────────────────────────────────────────────
    StdDecl { name: "false", shape: StdShape::Const(Boolean), entity: StdEntity::Value(machine::FALSE_REP) },
    StdDecl { name: "true", shape: StdShape::Const(Boolean), entity: StdEntity::Value(machine::TRUE_REP) },
    StdDecl { name: "maxint", shape: StdShape::Const(Integer), entity: StdEntity::Value(machine::MAXINT_REP) },
    // ── Unary operators ─────────────────────────────────────────
    StdDecl { name: "\\", shape: StdShape::Unary(Boolean, Boolean), entity: StdEntity::Primitive(Primitive::Not) },
    StdDecl { name: "|", shape: StdShape::Unary(Integer, Integer), entity: StdEntity::Bar },
    // ── Binary operators ────────────────────────────────────────
    StdDecl { name: "/\\", shape: StdShape::Binary(Boolean, Boolean, Boolean), entity: StdEntity::Primitive(Primitive::And) },
    StdDecl { name: "\\/", shape: StdShape::Binary(Boolean, Boolean, Boolean), entity: StdEntity::Primitive(Primitive::Or) },
    StdDecl { name: "+", shape: StdShape::Binary(Integer, Integer, Integer), entity: StdEntity::Primitive(Primitive::Add) },
    StdDecl { name: "-", shape: StdShape::Binary(Integer, Integer, Integer), entity: StdEntity::Primitive(Primitive::Sub) },
    StdDecl { name: "*", shape: StdShape::Binary(Integer, Integer, Integer), entity: StdEntity::Primitive(Primitive::Mult) },
    StdDecl { name: "/", shape: StdShape::Binary(Integer, Integer, Integer), entity: StdEntity::Primitive(Primitive::Div) },
    StdDecl { name: "//", shape: StdShape::Binary(Integer, Integer, Integer), entity: StdEntity::Primitive(Primitive::Mod) },
    StdDecl { name: "<", shape: StdShape::Binary(Integer, Integer, Boolean), entity: StdEntity::Primitive(Primitive::Lt) },
    StdDecl { name: "<=", shape: StdShape::Binary(Integer, Integer, Boolean), entity: StdEntity::Primitive(Primitive::Le) },
    StdDecl { name: ">", shape: StdShape::Binary(Integer, Integer, Boolean), entity: StdEntity::Primitive(Primitive::Gt) },
    StdDecl { name: ">=", shape: StdShape::Binary(Integer, Integer, Boolean), entity: StdEntity::Primitive(Primitive::Ge) },
    StdDecl { name: "=", shape: StdShape::Binary(Any, Any, Boolean), entity: StdEntity::Equality(Primitive::Eq) },
    StdDecl { name: "\\=", shape: StdShape::Binary(Any, Any, Boolean), entity: StdEntity::Equality(Primitive::Ne) },
    // ── Routines ────────────────────────────────────────────────
    StdDecl { name: "chr", shape: StdShape::Func(&[StdParam::Const(Integer)], Char), entity: StdEntity::Primitive(Primitive::Id) },
    StdDecl { name: "ord", shape: StdShape::Func(&[StdParam::Const(Char)], Integer), entity: StdEntity::Primitive(Primitive::Id) },
    StdDecl { name: "eof", shape: StdShape::Func(&[], Boolean), entity: StdEntity::Primitive(Primitive::Eof) },
    StdDecl { name: "eol", shape: StdShape::Func(&[], Boolean), entity: StdEntity::Primitive(Primitive::Eol) },
    StdDecl { name: "get", shape: StdShape::Proc(&[StdParam::Var(Char)]), entity: StdEntity::Primitive(Primitive::Get) },
    StdDecl { name: "put", shape: StdShape::Proc(&[StdParam::Const(Char)]), entity: StdEntity::Primitive(Primitive::Put) },
    StdDecl { name: "getint", shape: StdShape::Proc(&[StdParam::Var(Integer)]), entity: StdEntity::Primitive(Primitive::GetInt) },
    StdDecl { name: "putint", shape: StdShape::Proc(&[StdParam::Const(Integer)]), entity: StdEntity::Primitive(Primitive::PutInt) },
    StdDecl { name: "geteol", shape: StdShape::Proc(&[]), entity: StdEntity::Primitive(Primitive::GetEol) },
    StdDecl { name: "puteol", shape: StdShape::Proc(&[]), entity: StdEntity::Primitive(Primitive::PutEol) },
];

/// The standard environment of one compilation: the primitive type
/// denoters, and one binding per entry of [`STD_DECLS`] (binding `i`
/// describes entry `i`).
#[derive(Debug, Clone)]
pub struct StdEnvironment {
    pub boolean_type: TypeRef,
    pub char_type: TypeRef,
    pub integer_type: TypeRef,
    pub any_type: TypeRef,
    pub error_type: TypeRef,
    declarations: Declarations,
}

impl Default for StdEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl StdEnvironment {
    pub fn new() -> Self {
        let at = SourcePosition::default();
        let mut env = Self {
            boolean_type: TypeDenoter::new(TypeKind::Bool, at),
            char_type: TypeDenoter::new(TypeKind::Char, at),
            integer_type: TypeDenoter::new(TypeKind::Int, at),
            any_type: TypeDenoter::new(TypeKind::Any, at),
            error_type: TypeDenoter::new(TypeKind::Error, at),
            declarations: Declarations::new(),
        };
        for decl in STD_DECLS {
            let kind = env.binding_kind(decl.shape);
            env.declarations.add(decl.name, kind);
        }
        tracing::debug!(count = env.declarations.len(), "standard environment established");
        env
    }

    fn type_of(&self, ty: StdType) -> TypeRef {
        match ty {
            Boolean => self.boolean_type.clone(),
            Integer => self.integer_type.clone(),
            Char => self.char_type.clone(),
            Any => self.any_type.clone(),
        }
    }

    fn formals(&self, params: &[StdParam]) -> Vec<FormalSig> {
        params
            .iter()
            .map(|p| match *p {
                StdParam::Const(t) => FormalSig::Const(self.type_of(t)),
                StdParam::Var(t) => FormalSig::Var(self.type_of(t)),
            })
            .collect()
    }

    fn binding_kind(&self, shape: StdShape) -> BindingKind {
        match shape {
            StdShape::Type(t) => BindingKind::Type { ty: self.type_of(t) },
            StdShape::Const(t) => BindingKind::Constant { ty: self.type_of(t) },
            StdShape::Unary(a, r) => BindingKind::UnaryOperator {
                argument: self.type_of(a),
                result: self.type_of(r),
            },
            StdShape::Binary(l, r, res) => BindingKind::BinaryOperator {
                left: self.type_of(l),
                right: self.type_of(r),
                result: self.type_of(res),
            },
            StdShape::Proc(params) => BindingKind::Procedure {
                formals: self.formals(params),
            },
            StdShape::Func(params, res) => BindingKind::Function {
                formals: self.formals(params),
                result: self.type_of(res),
            },
        }
    }

    /// Bindings of the standard declarations; user bindings are appended
    /// after these, so a `DeclId` below `STD_DECLS.len()` is standard.
    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    /// The standard declaration behind `id`, if it is one.
    pub fn std_decl(&self, id: DeclId) -> Option<&'static StdDecl> {
        STD_DECLS.get(id.index())
    }

    /// The integer primitive behind one of the five foldable operators
    /// (`+ - * / //`), identified by declaration rather than spelling.
    pub fn arithmetic_primitive(&self, id: DeclId) -> Option<Primitive> {
        let decl = self.std_decl(id)?;
        match (decl.shape, decl.entity) {
            (
                StdShape::Binary(Integer, Integer, Integer),
                StdEntity::Primitive(p @ (Primitive::Add | Primitive::Sub | Primitive::Mult | Primitive::Div | Primitive::Mod)),
            ) => Some(p),
            _ => None,
        }
    }
}
