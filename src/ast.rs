//! AST node types for Triangle programs.
//!
//! Every family is a closed enum (wrapped in a struct where the node carries
//! decorations). Later passes fill the decoration slots: the checker writes
//! `decl`, `ty`, `variable` and `duplicated`; the encoder fills the
//! `entity` cells on type denoters and record fields.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::entity::RuntimeEntity;
use crate::symbols::DeclId;

/// Line span of a node or token in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    pub start: u32,
    pub finish: u32,
}

impl SourcePosition {
    pub fn new(start: u32, finish: u32) -> Self {
        Self { start, finish }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.finish)
    }
}

// ── Terminals ──────────────────────────────────────────────────────

/// An identifier occurrence. At a binding occurrence `decl` names the
/// binding it introduces; at an applied occurrence it names the binding it
/// resolved to.
#[derive(Debug, Clone)]
pub struct Identifier {
    pub spelling: String,
    pub position: SourcePosition,
    pub decl: Option<DeclId>,
}

impl Identifier {
    pub fn new(spelling: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            spelling: spelling.into(),
            position,
            decl: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub spelling: String,
    pub position: SourcePosition,
    pub decl: Option<DeclId>,
}

impl Operator {
    pub fn new(spelling: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            spelling: spelling.into(),
            position,
            decl: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntegerLiteral {
    pub spelling: String,
    pub position: SourcePosition,
}

impl IntegerLiteral {
    pub fn new(spelling: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            spelling: spelling.into(),
            position,
        }
    }

    /// The parser rejects spellings that do not fit, so this never falls back.
    pub fn value(&self) -> i32 {
        self.spelling.parse().unwrap_or_default()
    }
}

/// A character literal, spelled with its quotes (`'a'`).
#[derive(Debug, Clone)]
pub struct CharacterLiteral {
    pub spelling: String,
    pub position: SourcePosition,
}

impl CharacterLiteral {
    pub fn new(spelling: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            spelling: spelling.into(),
            position,
        }
    }

    pub fn value(&self) -> i32 {
        self.spelling
            .chars()
            .nth(1)
            .and_then(|c| i32::try_from(u32::from(c)).ok())
            .unwrap_or_default()
    }
}

// ── Program & commands ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Program {
    pub command: Command,
    pub position: SourcePosition,
}

#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub position: SourcePosition,
}

#[derive(Debug, Clone)]
pub enum CommandKind {
    Empty,
    Assign {
        target: Vname,
        value: Expression,
    },
    Call {
        callee: Identifier,
        args: ActualParameterSequence,
    },
    Sequential {
        first: Box<Command>,
        second: Box<Command>,
    },
    Let {
        declaration: Box<Declaration>,
        body: Box<Command>,
    },
    If {
        condition: Expression,
        then_branch: Box<Command>,
        else_branch: Box<Command>,
    },
    While {
        condition: Expression,
        body: Box<Command>,
    },
    Repeat {
        body: Box<Command>,
        condition: Expression,
    },
    /// `loop C1 while E do C2`
    LoopWhile {
        body: Box<Command>,
        condition: Expression,
        tail: Box<Command>,
    },
}

impl Command {
    pub fn new(kind: CommandKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }
}

// ── Expressions ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: SourcePosition,
    pub ty: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Empty,
    Integer(IntegerLiteral),
    Character(CharacterLiteral),
    Vname(Vname),
    Call {
        callee: Identifier,
        args: ActualParameterSequence,
    },
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    Let {
        declaration: Box<Declaration>,
        body: Box<Expression>,
    },
    Unary {
        op: Operator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: Operator,
        right: Box<Expression>,
    },
    Array(Box<ArrayAggregate>),
    Record(Box<RecordAggregate>),
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: SourcePosition) -> Self {
        Self {
            kind,
            position,
            ty: None,
        }
    }

    /// Value of an integer or character literal expression.
    pub fn literal_value(&self) -> Option<i32> {
        match &self.kind {
            ExpressionKind::Integer(il) => Some(il.value()),
            ExpressionKind::Character(cl) => Some(cl.value()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ArrayAggregate {
    Single {
        element: Expression,
        position: SourcePosition,
    },
    Multiple {
        element: Expression,
        rest: Box<ArrayAggregate>,
        position: SourcePosition,
    },
}

impl ArrayAggregate {
    pub fn element_count(&self) -> usize {
        match self {
            ArrayAggregate::Single { .. } => 1,
            ArrayAggregate::Multiple { rest, .. } => 1 + rest.element_count(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RecordAggregate {
    Single {
        field: Identifier,
        value: Expression,
        position: SourcePosition,
    },
    Multiple {
        field: Identifier,
        value: Expression,
        rest: Box<RecordAggregate>,
        position: SourcePosition,
    },
}

// ── Value-or-variable names ────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Vname {
    pub kind: VnameKind,
    pub position: SourcePosition,
    pub ty: Option<TypeRef>,
    pub variable: bool,
}

#[derive(Debug, Clone)]
pub enum VnameKind {
    Simple(Identifier),
    Dot {
        record: Box<Vname>,
        field: Identifier,
    },
    Subscript {
        array: Box<Vname>,
        index: Box<Expression>,
    },
}

impl Vname {
    pub fn new(kind: VnameKind, position: SourcePosition) -> Self {
        Self {
            kind,
            position,
            ty: None,
            variable: false,
        }
    }
}

// ── Declarations ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub position: SourcePosition,
    pub duplicated: bool,
}

#[derive(Debug, Clone)]
pub enum DeclarationKind {
    Const {
        name: Identifier,
        value: Expression,
    },
    Var {
        name: Identifier,
        ty: TypeRef,
    },
    Proc {
        name: Identifier,
        formals: FormalParameterSequence,
        body: Box<Command>,
    },
    Func {
        name: Identifier,
        formals: FormalParameterSequence,
        result: TypeRef,
        body: Expression,
    },
    Type {
        name: Identifier,
        ty: TypeRef,
    },
    Sequential {
        first: Box<Declaration>,
        second: Box<Declaration>,
    },
}

impl Declaration {
    pub fn new(kind: DeclarationKind, position: SourcePosition) -> Self {
        Self {
            kind,
            position,
            duplicated: false,
        }
    }
}

// ── Parameters ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FormalParameter {
    pub kind: FormalParameterKind,
    pub position: SourcePosition,
    pub duplicated: bool,
}

#[derive(Debug, Clone)]
pub enum FormalParameterKind {
    Const {
        name: Identifier,
        ty: TypeRef,
    },
    Var {
        name: Identifier,
        ty: TypeRef,
    },
    Proc {
        name: Identifier,
        formals: FormalParameterSequence,
    },
    Func {
        name: Identifier,
        formals: FormalParameterSequence,
        result: TypeRef,
    },
}

impl FormalParameter {
    pub fn new(kind: FormalParameterKind, position: SourcePosition) -> Self {
        Self {
            kind,
            position,
            duplicated: false,
        }
    }

    pub fn name(&self) -> &Identifier {
        match &self.kind {
            FormalParameterKind::Const { name, .. }
            | FormalParameterKind::Var { name, .. }
            | FormalParameterKind::Proc { name, .. }
            | FormalParameterKind::Func { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormalParameterSequence {
    Empty {
        position: SourcePosition,
    },
    Single {
        param: Box<FormalParameter>,
        position: SourcePosition,
    },
    Multiple {
        param: Box<FormalParameter>,
        rest: Box<FormalParameterSequence>,
        position: SourcePosition,
    },
}

impl FormalParameterSequence {
    /// Parameters in declaration order.
    pub fn params(&self) -> Vec<&FormalParameter> {
        let mut out = Vec::new();
        let mut seq = self;
        loop {
            match seq {
                FormalParameterSequence::Empty { .. } => break,
                FormalParameterSequence::Single { param, .. } => {
                    out.push(param.as_ref());
                    break;
                }
                FormalParameterSequence::Multiple { param, rest, .. } => {
                    out.push(param.as_ref());
                    seq = rest;
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ActualParameter {
    pub kind: ActualParameterKind,
    pub position: SourcePosition,
}

#[derive(Debug, Clone)]
pub enum ActualParameterKind {
    Const(Expression),
    Var(Vname),
    Proc(Identifier),
    Func(Identifier),
}

#[derive(Debug, Clone)]
pub enum ActualParameterSequence {
    Empty {
        position: SourcePosition,
    },
    Single {
        param: Box<ActualParameter>,
        position: SourcePosition,
    },
    Multiple {
        param: Box<ActualParameter>,
        rest: Box<ActualParameterSequence>,
        position: SourcePosition,
    },
}

// ── Type denoters ──────────────────────────────────────────────────

/// Type denoters are shared: a type declaration's denoter is the same
/// `Rc` everywhere the name is used, so its layout is computed once.
pub type TypeRef = Rc<TypeDenoter>;

#[derive(Debug, Clone)]
pub struct TypeDenoter {
    pub kind: TypeKind,
    pub position: SourcePosition,
    pub entity: OnceCell<RuntimeEntity>,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Bool,
    Char,
    Int,
    /// Argument type of the polymorphic `=` and `\=`.
    Any,
    /// Assigned wherever checking failed; equivalent to nothing.
    Error,
    Simple(Identifier),
    Array {
        length: IntegerLiteral,
        element: TypeRef,
    },
    Record(FieldTypeDenoter),
}

#[derive(Debug, Clone)]
pub enum FieldTypeDenoter {
    Single {
        name: Identifier,
        ty: TypeRef,
        position: SourcePosition,
        entity: OnceCell<RuntimeEntity>,
    },
    Multiple {
        name: Identifier,
        ty: TypeRef,
        rest: Box<FieldTypeDenoter>,
        position: SourcePosition,
        entity: OnceCell<RuntimeEntity>,
    },
}

impl TypeDenoter {
    pub fn new(kind: TypeKind, position: SourcePosition) -> TypeRef {
        Rc::new(Self {
            kind,
            position,
            entity: OnceCell::new(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TypeKind::Error)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.kind, TypeKind::Any)
    }

    /// Structural type equality. `Error` and `Any` are equivalent to nothing,
    /// not even themselves.
    pub fn equivalent(&self, other: &TypeDenoter) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Char, TypeKind::Char)
            | (TypeKind::Int, TypeKind::Int) => true,
            (TypeKind::Simple(a), TypeKind::Simple(b)) => a.spelling == b.spelling,
            (
                TypeKind::Array { length: l1, element: e1 },
                TypeKind::Array { length: l2, element: e2 },
            ) => l1.value() == l2.value() && e1.equivalent(e2),
            (TypeKind::Record(f1), TypeKind::Record(f2)) => f1.equivalent(f2),
            _ => false,
        }
    }

    /// The field named `name` if this is a record type.
    pub fn field(&self, name: &str) -> Option<&FieldTypeDenoter> {
        match &self.kind {
            TypeKind::Record(fields) => fields.iter().find(|f| f.name().spelling == name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDenoter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Bool => write!(f, "Boolean"),
            TypeKind::Char => write!(f, "Char"),
            TypeKind::Int => write!(f, "Integer"),
            TypeKind::Any => write!(f, "<any>"),
            TypeKind::Error => write!(f, "<error>"),
            TypeKind::Simple(id) => write!(f, "{}", id.spelling),
            TypeKind::Array { length, element } => {
                write!(f, "array {} of {element}", length.spelling)
            }
            TypeKind::Record(fields) => {
                write!(f, "record ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name().spelling, field.ty())?;
                }
                write!(f, " end")
            }
        }
    }
}

impl FieldTypeDenoter {
    pub fn name(&self) -> &Identifier {
        match self {
            FieldTypeDenoter::Single { name, .. } | FieldTypeDenoter::Multiple { name, .. } => name,
        }
    }

    pub fn ty(&self) -> &TypeRef {
        match self {
            FieldTypeDenoter::Single { ty, .. } | FieldTypeDenoter::Multiple { ty, .. } => ty,
        }
    }

    pub fn entity(&self) -> &OnceCell<RuntimeEntity> {
        match self {
            FieldTypeDenoter::Single { entity, .. } | FieldTypeDenoter::Multiple { entity, .. } => {
                entity
            }
        }
    }

    pub fn rest(&self) -> Option<&FieldTypeDenoter> {
        match self {
            FieldTypeDenoter::Single { .. } => None,
            FieldTypeDenoter::Multiple { rest, .. } => Some(rest),
        }
    }

    /// Walk the chain of fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldTypeDenoter> {
        std::iter::successors(Some(self), |f| f.rest())
    }

    /// Same names, equivalent types, same order.
    pub fn equivalent(&self, other: &FieldTypeDenoter) -> bool {
        let mut a = self.iter();
        let mut b = other.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if x.name().spelling != y.name().spelling || !x.ty().equivalent(y.ty()) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

// ── Statistics ─────────────────────────────────────────────────────

/// Node counts by family, for the driver's summary output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AstStats {
    pub commands: usize,
    pub expressions: usize,
    pub declarations: usize,
    pub vnames: usize,
    pub parameters: usize,
    pub type_denoters: usize,
}

impl fmt::Display for AstStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "commands:      {}", self.commands)?;
        writeln!(f, "expressions:   {}", self.expressions)?;
        writeln!(f, "declarations:  {}", self.declarations)?;
        writeln!(f, "vnames:        {}", self.vnames)?;
        writeln!(f, "parameters:    {}", self.parameters)?;
        write!(f, "type denoters: {}", self.type_denoters)
    }
}

impl Program {
    pub fn stats(&self) -> AstStats {
        let mut stats = AstStats::default();
        stats.command(&self.command);
        stats
    }
}

impl AstStats {
    fn command(&mut self, c: &Command) {
        self.commands += 1;
        match &c.kind {
            CommandKind::Empty => {}
            CommandKind::Assign { target, value } => {
                self.vname(target);
                self.expression(value);
            }
            CommandKind::Call { args, .. } => self.actuals(args),
            CommandKind::Sequential { first, second } => {
                self.command(first);
                self.command(second);
            }
            CommandKind::Let { declaration, body } => {
                self.declaration(declaration);
                self.command(body);
            }
            CommandKind::If { condition, then_branch, else_branch } => {
                self.expression(condition);
                self.command(then_branch);
                self.command(else_branch);
            }
            CommandKind::While { condition, body } | CommandKind::Repeat { body, condition } => {
                self.expression(condition);
                self.command(body);
            }
            CommandKind::LoopWhile { body, condition, tail } => {
                self.command(body);
                self.expression(condition);
                self.command(tail);
            }
        }
    }

    fn expression(&mut self, e: &Expression) {
        self.expressions += 1;
        match &e.kind {
            ExpressionKind::Empty | ExpressionKind::Integer(_) | ExpressionKind::Character(_) => {}
            ExpressionKind::Vname(v) => self.vname(v),
            ExpressionKind::Call { args, .. } => self.actuals(args),
            ExpressionKind::If { condition, then_branch, else_branch } => {
                self.expression(condition);
                self.expression(then_branch);
                self.expression(else_branch);
            }
            ExpressionKind::Let { declaration, body } => {
                self.declaration(declaration);
                self.expression(body);
            }
            ExpressionKind::Unary { operand, .. } => self.expression(operand),
            ExpressionKind::Binary { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            ExpressionKind::Array(aa) => {
                let mut next = Some(&**aa);
                while let Some(agg) = next {
                    match agg {
                        ArrayAggregate::Single { element, .. } => {
                            self.expression(element);
                            next = None;
                        }
                        ArrayAggregate::Multiple { element, rest, .. } => {
                            self.expression(element);
                            next = Some(&**rest);
                        }
                    }
                }
            }
            ExpressionKind::Record(ra) => {
                let mut next = Some(&**ra);
                while let Some(agg) = next {
                    match agg {
                        RecordAggregate::Single { value, .. } => {
                            self.expression(value);
                            next = None;
                        }
                        RecordAggregate::Multiple { value, rest, .. } => {
                            self.expression(value);
                            next = Some(&**rest);
                        }
                    }
                }
            }
        }
    }

    fn vname(&mut self, v: &Vname) {
        self.vnames += 1;
        match &v.kind {
            VnameKind::Simple(_) => {}
            VnameKind::Dot { record, .. } => self.vname(record),
            VnameKind::Subscript { array, index } => {
                self.vname(array);
                self.expression(index);
            }
        }
    }

    fn declaration(&mut self, d: &Declaration) {
        self.declarations += 1;
        match &d.kind {
            DeclarationKind::Const { value, .. } => self.expression(value),
            DeclarationKind::Var { ty, .. } | DeclarationKind::Type { ty, .. } => self.type_denoter(ty),
            DeclarationKind::Proc { formals, body, .. } => {
                self.formals(formals);
                self.command(body);
            }
            DeclarationKind::Func { formals, result, body, .. } => {
                self.formals(formals);
                self.type_denoter(result);
                self.expression(body);
            }
            DeclarationKind::Sequential { first, second } => {
                self.declaration(first);
                self.declaration(second);
            }
        }
    }

    fn formals(&mut self, fps: &FormalParameterSequence) {
        for fp in fps.params() {
            self.parameters += 1;
            match &fp.kind {
                FormalParameterKind::Const { ty, .. } | FormalParameterKind::Var { ty, .. } => {
                    self.type_denoter(ty);
                }
                FormalParameterKind::Proc { formals, .. } => self.formals(formals),
                FormalParameterKind::Func { formals, result, .. } => {
                    self.formals(formals);
                    self.type_denoter(result);
                }
            }
        }
    }

    fn actuals(&mut self, aps: &ActualParameterSequence) {
        let mut next = Some(aps);
        while let Some(seq) = next {
            let (param, rest) = match seq {
                ActualParameterSequence::Empty { .. } => break,
                ActualParameterSequence::Single { param, .. } => (param, None),
                ActualParameterSequence::Multiple { param, rest, .. } => (param, Some(rest.as_ref())),
            };
            self.parameters += 1;
            match &param.kind {
                ActualParameterKind::Const(e) => self.expression(e),
                ActualParameterKind::Var(v) => self.vname(v),
                ActualParameterKind::Proc(_) | ActualParameterKind::Func(_) => {}
            }
            next = rest;
        }
    }

    fn type_denoter(&mut self, t: &TypeDenoter) {
        self.type_denoters += 1;
        match &t.kind {
            TypeKind::Array { element, .. } => self.type_denoter(element),
            TypeKind::Record(fields) => {
                for field in fields.iter() {
                    self.type_denoter(field.ty());
                }
            }
            _ => {}
        }
    }
}
