//! Contextual analysis: resolves every applied occurrence to its binding,
//! infers and checks types, and decorates the tree for the later passes.
//!
//! Diagnostics are reported and checking carries on. A failed check gives
//! the node the `Error` type. `Error` is equivalent to no type, not even
//! itself, but every check that meets an `Error` operand accepts it without
//! a further diagnostic, so one mistake produces one diagnostic rather than
//! a cascade.

use crate::ast::*;
use crate::error::ErrorReporter;
use crate::std_env::{StdEnvironment, STD_DECLS};
use crate::symbols::{
    signatures_equivalent, BindingKind, DeclId, Declarations, FormalSig, IdentificationTable,
};

/// Check `program` in place. Returns the binding arena the decorations
/// index into (standard bindings first).
pub fn check(
    program: &mut Program,
    std_env: &StdEnvironment,
    reporter: &mut ErrorReporter,
) -> Declarations {
    let mut checker = Checker::new(std_env, reporter);
    checker.check_command(&mut program.command);
    tracing::debug!(bindings = checker.declarations.len(), "contextual analysis finished");
    checker.declarations
}

/// Both operands are acceptable where the other is expected.
fn compatible(a: &TypeDenoter, b: &TypeDenoter) -> bool {
    a.is_error() || b.is_error() || a.equivalent(b)
}

struct Checker<'env, 'r> {
    std_env: &'env StdEnvironment,
    declarations: Declarations,
    table: IdentificationTable,
    reporter: &'r mut ErrorReporter,
}

impl<'env, 'r> Checker<'env, 'r> {
    fn new(std_env: &'env StdEnvironment, reporter: &'r mut ErrorReporter) -> Self {
        let mut table = IdentificationTable::new();
        for (index, decl) in STD_DECLS.iter().enumerate() {
            if let Some(id) = DeclId::from_index(index) {
                table.enter(decl.name, id);
            }
        }
        Self {
            std_env,
            declarations: std_env.declarations().clone(),
            table,
            reporter,
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn error(&mut self, template: &str, token: &str, position: SourcePosition) {
        self.reporter.report_error(template, token, position);
    }

    fn error_type(&self) -> TypeRef {
        self.std_env.error_type.clone()
    }

    /// The binding `spelling` resolves to in the current scope.
    fn lookup(&self, spelling: &str) -> Option<(DeclId, BindingKind)> {
        let id = self.table.retrieve(spelling)?;
        let binding = self.declarations.get(id)?;
        Some((id, binding.kind.clone()))
    }

    /// Create a binding and enter it in the innermost scope. Returns the new
    /// binding and whether the name was already declared in that scope.
    fn bind(&mut self, name: &mut Identifier, kind: BindingKind) -> (DeclId, bool) {
        let id = self.declarations.add(name.spelling.clone(), kind);
        name.decl = Some(id);
        let duplicated = self.table.enter(&name.spelling, id);
        (id, duplicated)
    }

    fn declare(&mut self, name: &mut Identifier, kind: BindingKind) -> (DeclId, bool) {
        let (id, duplicated) = self.bind(name, kind);
        if duplicated {
            self.error("identifier \"%\" already declared", &name.spelling, name.position);
        }
        (id, duplicated)
    }

    fn declare_formal(&mut self, name: &mut Identifier, kind: BindingKind) -> bool {
        let (_, duplicated) = self.bind(name, kind);
        if duplicated {
            self.error("duplicated formal parameter \"%\"", &name.spelling, name.position);
        }
        duplicated
    }

    fn update_binding(&mut self, id: DeclId, kind: BindingKind) {
        if let Some(binding) = self.declarations.get_mut(id) {
            binding.kind = kind;
        }
    }

    fn expect_boolean(&mut self, ty: &TypeDenoter, position: SourcePosition) {
        if !compatible(ty, &self.std_env.boolean_type) {
            self.error("Boolean expression expected here", "", position);
        }
    }

    // ── Commands ───────────────────────────────────────────────────

    fn check_command(&mut self, command: &mut Command) {
        match &mut command.kind {
            CommandKind::Empty => {}
            CommandKind::Assign { target, value } => {
                let target_ty = self.check_vname(target);
                let value_ty = self.check_expression(value);
                if !target.variable && !target_ty.is_error() {
                    self.error("LHS of assignment is not a variable", "", target.position);
                }
                if !compatible(&target_ty, &value_ty) {
                    self.error("assignment incompatibility", "", command.position);
                }
            }
            CommandKind::Call { callee, args } => match self.lookup(&callee.spelling) {
                None => self.error("\"%\" is not declared", &callee.spelling, callee.position),
                Some((id, BindingKind::Procedure { formals })) => {
                    callee.decl = Some(id);
                    self.check_actuals(args, &formals);
                }
                Some(_) => {
                    self.error("\"%\" is not a procedure identifier", &callee.spelling, callee.position);
                }
            },
            CommandKind::Sequential { first, second } => {
                self.check_command(first);
                self.check_command(second);
            }
            CommandKind::Let { declaration, body } => {
                self.table.open_scope();
                self.check_declaration(declaration);
                self.check_command(body);
                self.table.close_scope();
            }
            CommandKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let ty = self.check_expression(condition);
                self.expect_boolean(&ty, condition.position);
                self.check_command(then_branch);
                self.check_command(else_branch);
            }
            CommandKind::While { condition, body } => {
                let ty = self.check_expression(condition);
                self.expect_boolean(&ty, condition.position);
                self.check_command(body);
            }
            CommandKind::Repeat { body, condition } => {
                self.check_command(body);
                let ty = self.check_expression(condition);
                self.expect_boolean(&ty, condition.position);
            }
            CommandKind::LoopWhile {
                body,
                condition,
                tail,
            } => {
                self.check_command(body);
                let ty = self.check_expression(condition);
                self.expect_boolean(&ty, condition.position);
                self.check_command(tail);
            }
        }
    }

    // ── Expressions ────────────────────────────────────────────────

    fn check_expression(&mut self, expr: &mut Expression) -> TypeRef {
        let position = expr.position;
        let ty = match &mut expr.kind {
            ExpressionKind::Empty => self.error_type(),
            ExpressionKind::Integer(_) => self.std_env.integer_type.clone(),
            ExpressionKind::Character(_) => self.std_env.char_type.clone(),
            ExpressionKind::Vname(vname) => self.check_vname(vname),
            ExpressionKind::Call { callee, args } => match self.lookup(&callee.spelling) {
                None => {
                    self.error("\"%\" is not declared", &callee.spelling, callee.position);
                    self.error_type()
                }
                Some((id, BindingKind::Function { formals, result })) => {
                    callee.decl = Some(id);
                    self.check_actuals(args, &formals);
                    result
                }
                Some(_) => {
                    self.error("\"%\" is not a function identifier", &callee.spelling, callee.position);
                    self.error_type()
                }
            },
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.check_expression(condition);
                self.expect_boolean(&cond_ty, condition.position);
                let then_ty = self.check_expression(then_branch);
                let else_ty = self.check_expression(else_branch);
                if !compatible(&then_ty, &else_ty) {
                    self.error("incompatible limbs in if-expression", "", position);
                }
                if then_ty.is_error() { else_ty } else { then_ty }
            }
            ExpressionKind::Let { declaration, body } => {
                self.table.open_scope();
                self.check_declaration(declaration);
                let ty = self.check_expression(body);
                self.table.close_scope();
                ty
            }
            ExpressionKind::Unary { op, operand } => {
                let operand_ty = self.check_expression(operand);
                match self.lookup(&op.spelling) {
                    None => {
                        self.error("\"%\" is not declared", &op.spelling, op.position);
                        self.error_type()
                    }
                    Some((id, BindingKind::UnaryOperator { argument, result })) => {
                        op.decl = Some(id);
                        if operand_ty.is_error() {
                            self.error_type()
                        } else {
                            if !compatible(&argument, &operand_ty) {
                                self.error("wrong argument type for \"%\"", &op.spelling, op.position);
                            }
                            result
                        }
                    }
                    Some(_) => {
                        self.error("\"%\" is not a unary operator", &op.spelling, op.position);
                        self.error_type()
                    }
                }
            }
            ExpressionKind::Binary { left, op, right } => {
                let left_ty = self.check_expression(left);
                let right_ty = self.check_expression(right);
                match self.lookup(&op.spelling) {
                    None => {
                        self.error("\"%\" is not declared", &op.spelling, op.position);
                        self.error_type()
                    }
                    Some((
                        id,
                        BindingKind::BinaryOperator {
                            left: expected_left,
                            right: expected_right,
                            result,
                        },
                    )) => {
                        op.decl = Some(id);
                        if left_ty.is_error() || right_ty.is_error() {
                            self.error_type()
                        } else {
                            if expected_left.is_any() {
                                if !compatible(&left_ty, &right_ty) {
                                    self.error("incompatible argument types for \"%\"", &op.spelling, op.position);
                                }
                            } else if !compatible(&expected_left, &left_ty)
                                || !compatible(&expected_right, &right_ty)
                            {
                                self.error("wrong argument type for \"%\"", &op.spelling, op.position);
                            }
                            result
                        }
                    }
                    Some(_) => {
                        self.error("\"%\" is not a binary operator", &op.spelling, op.position);
                        self.error_type()
                    }
                }
            }
            ExpressionKind::Array(aggregate) => {
                let count = aggregate.element_count();
                let element = self.check_array_aggregate(aggregate);
                TypeDenoter::new(
                    TypeKind::Array {
                        length: IntegerLiteral::new(count.to_string(), position),
                        element,
                    },
                    position,
                )
            }
            ExpressionKind::Record(aggregate) => {
                let fields = self.check_record_aggregate(aggregate);
                TypeDenoter::new(TypeKind::Record(fields), position)
            }
        };
        expr.ty = Some(ty.clone());
        ty
    }

    /// Element type of the aggregate; every element must agree with the first.
    fn check_array_aggregate(&mut self, aggregate: &mut ArrayAggregate) -> TypeRef {
        match aggregate {
            ArrayAggregate::Single { element, .. } => self.check_expression(element),
            ArrayAggregate::Multiple { element, rest, .. } => {
                let first = self.check_expression(element);
                let rest_ty = self.check_array_aggregate(rest);
                if !compatible(&first, &rest_ty) {
                    self.error("incompatible array-aggregate element", "", element.position);
                }
                first
            }
        }
    }

    fn check_record_aggregate(&mut self, aggregate: &mut RecordAggregate) -> FieldTypeDenoter {
        match aggregate {
            RecordAggregate::Single {
                field,
                value,
                position,
            } => FieldTypeDenoter::Single {
                name: field.clone(),
                ty: self.check_expression(value),
                position: *position,
                entity: Default::default(),
            },
            RecordAggregate::Multiple {
                field,
                value,
                rest,
                position,
            } => {
                let ty = self.check_expression(value);
                let rest = self.check_record_aggregate(rest);
                if rest.iter().any(|f| f.name().spelling == field.spelling) {
                    self.error("duplicate field \"%\" in record", &field.spelling, field.position);
                }
                FieldTypeDenoter::Multiple {
                    name: field.clone(),
                    ty,
                    rest: Box::new(rest),
                    position: *position,
                    entity: Default::default(),
                }
            }
        }
    }

    // ── Value-or-variable names ────────────────────────────────────

    fn check_vname(&mut self, vname: &mut Vname) -> TypeRef {
        let (ty, variable) = match &mut vname.kind {
            VnameKind::Simple(id) => match self.lookup(&id.spelling) {
                None => {
                    self.error("\"%\" is not declared", &id.spelling, id.position);
                    (self.error_type(), false)
                }
                Some((decl, BindingKind::Constant { ty })) => {
                    id.decl = Some(decl);
                    (ty, false)
                }
                Some((decl, BindingKind::Variable { ty })) => {
                    id.decl = Some(decl);
                    (ty, true)
                }
                Some(_) => {
                    self.error("\"%\" is not a const or var identifier", &id.spelling, id.position);
                    (self.error_type(), false)
                }
            },
            VnameKind::Dot { record, field } => {
                let record_ty = self.check_vname(record);
                let ty = if record_ty.is_error() {
                    record_ty
                } else if matches!(record_ty.kind, TypeKind::Record(_)) {
                    match record_ty.field(&field.spelling) {
                        Some(f) => f.ty().clone(),
                        None => {
                            self.error("no field \"%\" in this record type", &field.spelling, field.position);
                            self.error_type()
                        }
                    }
                } else {
                    self.error("record expected here", "", record.position);
                    self.error_type()
                };
                (ty, record.variable)
            }
            VnameKind::Subscript { array, index } => {
                let array_ty = self.check_vname(array);
                let index_ty = self.check_expression(index);
                let ty = match &array_ty.kind {
                    TypeKind::Error => array_ty.clone(),
                    TypeKind::Array { element, .. } => {
                        if !compatible(&index_ty, &self.std_env.integer_type) {
                            self.error("Integer expression expected here", "", index.position);
                        }
                        element.clone()
                    }
                    _ => {
                        self.error("array expected here", "", array.position);
                        self.error_type()
                    }
                };
                (ty, array.variable)
            }
        };
        vname.ty = Some(ty.clone());
        vname.variable = variable;
        ty
    }

    // ── Declarations ───────────────────────────────────────────────

    fn check_declaration(&mut self, declaration: &mut Declaration) {
        let duplicated = match &mut declaration.kind {
            DeclarationKind::Const { name, value } => {
                let ty = self.check_expression(value);
                self.declare(name, BindingKind::Constant { ty }).1
            }
            DeclarationKind::Var { name, ty } => {
                *ty = self.check_type(ty);
                self.declare(name, BindingKind::Variable { ty: ty.clone() }).1
            }
            DeclarationKind::Proc {
                name,
                formals,
                body,
            } => {
                // Entered before the body so the procedure can call itself.
                let (id, duplicated) = self.declare(name, BindingKind::Procedure { formals: Vec::new() });
                self.table.open_scope();
                let sigs = self.check_formals(formals);
                self.update_binding(id, BindingKind::Procedure { formals: sigs });
                self.check_command(body);
                self.table.close_scope();
                duplicated
            }
            DeclarationKind::Func {
                name,
                formals,
                result,
                body,
            } => {
                *result = self.check_type(result);
                let (id, duplicated) = self.declare(
                    name,
                    BindingKind::Function {
                        formals: Vec::new(),
                        result: result.clone(),
                    },
                );
                self.table.open_scope();
                let sigs = self.check_formals(formals);
                self.update_binding(
                    id,
                    BindingKind::Function {
                        formals: sigs,
                        result: result.clone(),
                    },
                );
                let body_ty = self.check_expression(body);
                self.table.close_scope();
                if !compatible(result, &body_ty) {
                    self.error("body of function \"%\" has wrong type", &name.spelling, body.position);
                }
                duplicated
            }
            DeclarationKind::Type { name, ty } => {
                *ty = self.check_type(ty);
                self.declare(name, BindingKind::Type { ty: ty.clone() }).1
            }
            DeclarationKind::Sequential { first, second } => {
                self.check_declaration(first);
                self.check_declaration(second);
                false
            }
        };
        declaration.duplicated = duplicated;
    }

    // ── Parameters ─────────────────────────────────────────────────

    /// Declare each formal in the current scope and return the signature.
    fn check_formals(&mut self, formals: &mut FormalParameterSequence) -> Vec<FormalSig> {
        match formals {
            FormalParameterSequence::Empty { .. } => Vec::new(),
            FormalParameterSequence::Single { param, .. } => vec![self.check_formal(param)],
            FormalParameterSequence::Multiple { param, rest, .. } => {
                let mut sigs = vec![self.check_formal(param)];
                sigs.extend(self.check_formals(rest));
                sigs
            }
        }
    }

    fn check_formal(&mut self, param: &mut FormalParameter) -> FormalSig {
        let (sig, duplicated) = match &mut param.kind {
            FormalParameterKind::Const { name, ty } => {
                *ty = self.check_type(ty);
                let dup = self.declare_formal(name, BindingKind::Constant { ty: ty.clone() });
                (FormalSig::Const(ty.clone()), dup)
            }
            FormalParameterKind::Var { name, ty } => {
                *ty = self.check_type(ty);
                let dup = self.declare_formal(name, BindingKind::Variable { ty: ty.clone() });
                (FormalSig::Var(ty.clone()), dup)
            }
            FormalParameterKind::Proc { name, formals } => {
                self.table.open_scope();
                let sigs = self.check_formals(formals);
                self.table.close_scope();
                let dup = self.declare_formal(name, BindingKind::Procedure { formals: sigs.clone() });
                (FormalSig::Proc(sigs), dup)
            }
            FormalParameterKind::Func {
                name,
                formals,
                result,
            } => {
                *result = self.check_type(result);
                self.table.open_scope();
                let sigs = self.check_formals(formals);
                self.table.close_scope();
                let dup = self.declare_formal(
                    name,
                    BindingKind::Function {
                        formals: sigs.clone(),
                        result: result.clone(),
                    },
                );
                (FormalSig::Func(sigs, result.clone()), dup)
            }
        };
        param.duplicated = duplicated;
        sig
    }

    /// Match actuals against formals pairwise. On an arity mismatch the
    /// remaining actuals are left unchecked.
    fn check_actuals(&mut self, args: &mut ActualParameterSequence, formals: &[FormalSig]) {
        match args {
            ActualParameterSequence::Empty { position } => {
                if !formals.is_empty() {
                    self.error("too few actual parameters", "", *position);
                }
            }
            ActualParameterSequence::Single { param, position } => match formals {
                [formal] => self.check_actual(param, formal),
                _ => self.error("incorrect number of actual parameters", "", *position),
            },
            ActualParameterSequence::Multiple {
                param,
                rest,
                position,
            } => match formals {
                [formal, others @ ..] if !others.is_empty() => {
                    self.check_actual(param, formal);
                    self.check_actuals(rest, others);
                }
                _ => self.error("too many actual parameters", "", *position),
            },
        }
    }

    fn check_actual(&mut self, param: &mut ActualParameter, formal: &FormalSig) {
        let position = param.position;
        match &mut param.kind {
            ActualParameterKind::Const(expr) => {
                let ty = self.check_expression(expr);
                match formal {
                    FormalSig::Const(expected) => {
                        if !compatible(expected, &ty) {
                            self.error("wrong type for const actual parameter", "", position);
                        }
                    }
                    _ => self.error("const actual parameter not expected here", "", position),
                }
            }
            ActualParameterKind::Var(vname) => {
                let ty = self.check_vname(vname);
                if !vname.variable && !ty.is_error() {
                    self.error("actual parameter is not a variable", "", vname.position);
                }
                match formal {
                    FormalSig::Var(expected) => {
                        if !compatible(expected, &ty) {
                            self.error("wrong type for var actual parameter", "", position);
                        }
                    }
                    _ => self.error("var actual parameter not expected here", "", position),
                }
            }
            ActualParameterKind::Proc(id) => match self.lookup(&id.spelling) {
                None => self.error("\"%\" is not declared", &id.spelling, id.position),
                Some((decl, BindingKind::Procedure { formals: actual })) => {
                    id.decl = Some(decl);
                    match formal {
                        FormalSig::Proc(expected) => {
                            if !signatures_equivalent(expected, &actual) {
                                self.error("wrong signature for procedure \"%\"", &id.spelling, position);
                            }
                        }
                        _ => self.error("proc actual parameter not expected here", "", position),
                    }
                }
                Some(_) => self.error("\"%\" is not a procedure identifier", &id.spelling, id.position),
            },
            ActualParameterKind::Func(id) => match self.lookup(&id.spelling) {
                None => self.error("\"%\" is not declared", &id.spelling, id.position),
                Some((decl, BindingKind::Function { formals: actual, result })) => {
                    id.decl = Some(decl);
                    match formal {
                        FormalSig::Func(expected, expected_result) => {
                            if !signatures_equivalent(expected, &actual) {
                                self.error("wrong signature for function \"%\"", &id.spelling, position);
                            } else if !expected_result.equivalent(&result) {
                                self.error("wrong type for function \"%\"", &id.spelling, position);
                            }
                        }
                        _ => self.error("func actual parameter not expected here", "", position),
                    }
                }
                Some(_) => self.error("\"%\" is not a function identifier", &id.spelling, id.position),
            },
        }
    }

    // ── Type denoters ──────────────────────────────────────────────

    /// Resolve type identifiers. A named type resolves to the declared
    /// denoter itself, so every use shares one layout.
    fn check_type(&mut self, ty: &TypeRef) -> TypeRef {
        match &ty.kind {
            TypeKind::Simple(id) => match self.lookup(&id.spelling) {
                None => {
                    self.error("\"%\" is not declared", &id.spelling, id.position);
                    self.error_type()
                }
                Some((_, BindingKind::Type { ty })) => ty,
                Some(_) => {
                    self.error("\"%\" is not a type identifier", &id.spelling, id.position);
                    self.error_type()
                }
            },
            TypeKind::Array { length, element } => {
                if length.value() <= 0 {
                    self.error("arrays must not be empty", "", length.position);
                }
                let element = self.check_type(element);
                TypeDenoter::new(
                    TypeKind::Array {
                        length: length.clone(),
                        element,
                    },
                    ty.position,
                )
            }
            TypeKind::Record(fields) => {
                let fields = self.check_field_types(fields);
                TypeDenoter::new(TypeKind::Record(fields), ty.position)
            }
            TypeKind::Bool | TypeKind::Char | TypeKind::Int | TypeKind::Any | TypeKind::Error => ty.clone(),
        }
    }

    fn check_field_types(&mut self, fields: &FieldTypeDenoter) -> FieldTypeDenoter {
        match fields {
            FieldTypeDenoter::Single { name, ty, position, .. } => FieldTypeDenoter::Single {
                name: name.clone(),
                ty: self.check_type(ty),
                position: *position,
                entity: Default::default(),
            },
            FieldTypeDenoter::Multiple {
                name,
                ty,
                rest,
                position,
                ..
            } => FieldTypeDenoter::Multiple {
                name: name.clone(),
                ty: self.check_type(ty),
                rest: Box::new(self.check_field_types(rest)),
                position: *position,
                entity: Default::default(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check_str(source: &str) -> (Program, Vec<String>) {
        let mut reporter = ErrorReporter::new();
        let mut program = parse(source, &mut reporter).unwrap();
        let env = StdEnvironment::new();
        check(&mut program, &env, &mut reporter);
        let messages = reporter.errors().iter().map(|e| e.message()).collect();
        (program, messages)
    }

    fn errors(source: &str) -> Vec<String> {
        check_str(source).1
    }

    #[test]
    fn well_typed_programs_pass() {
        let programs = [
            "let const pi ~ 3 in putint(pi)",
            "let var x: Integer in x := 2 + 3 * 1",
            "let var c: Char in begin get(var c); put(c); puteol() end",
            "let type P ~ record x: Integer, y: Integer end; var p: P in p := {x ~ 1, y ~ 2}",
            "let var a: array 3 of Boolean in a[1] := a[0] \\/ \\ a[2]",
            "let func f(n: Integer): Integer ~ if n <= 1 then 1 else n * f(n - 1) in putint(f(5))",
            "let proc twice(proc p()) ~ begin p(); p() end; proc hi() ~ puteol() in twice(proc hi)",
            "let var x: Integer in if x = 0 then x ** else loop x := x - 1 while x > 0 do putint(x)",
            "putint(ord(chr(65)))",
        ];
        for source in programs {
            assert_eq!(errors(source), Vec::<String>::new(), "{source}");
        }
    }

    #[test]
    fn duplicate_declaration_reported_once() {
        let (program, messages) = check_str("let var x: Integer; var x: Char in x := 'a'");
        assert_eq!(messages, vec!["identifier \"x\" already declared"]);
        let CommandKind::Let { declaration, .. } = &program.command.kind else {
            panic!("expected let");
        };
        let DeclarationKind::Sequential { first, second } = &declaration.kind else {
            panic!("expected sequence");
        };
        assert!(!first.duplicated);
        assert!(second.duplicated);
    }

    #[test]
    fn undeclared_name_reported_once() {
        let (program, messages) = check_str("let var x: Integer in x := y + 1 * 2");
        assert_eq!(messages, vec!["\"y\" is not declared"]);
        let CommandKind::Let { body, .. } = &program.command.kind else {
            panic!("expected let");
        };
        let CommandKind::Assign { value, .. } = &body.kind else {
            panic!("expected assignment");
        };
        assert!(value.ty.as_ref().unwrap().is_error());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let source = "let var x: Integer in let var x: Boolean in x := true";
        assert!(errors(source).is_empty());
        let source = "let var x: Integer in begin let var x: Boolean in x := true; x := 1 end";
        assert!(errors(source).is_empty());
    }

    #[test]
    fn standard_names_may_be_redeclared_in_a_let() {
        assert!(errors("let var putint: Integer in putint := 1").is_empty());
    }

    #[test]
    fn type_errors() {
        assert_eq!(errors("let var x: Integer in x := 'c'"), vec!["assignment incompatibility"]);
        assert_eq!(errors("if 1 then puteol() else puteol()"), vec!["Boolean expression expected here"]);
        assert_eq!(errors("let const c ~ 1 in c := 2"), vec!["LHS of assignment is not a variable"]);
        assert_eq!(errors("putint(true)"), vec!["wrong type for const actual parameter"]);
        assert_eq!(errors("let var b: Boolean in b := 1 = 'a'"), vec!["incompatible argument types for \"=\""]);
        assert_eq!(errors("let var b: Boolean in b := 1 /\\ true"), vec!["wrong argument type for \"/\\\""]);
        assert_eq!(errors("putint(if true then 1 else 'a')"), vec!["incompatible limbs in if-expression"]);
        assert_eq!(errors("let func f(): Integer ~ 'a' in puteol()"), vec!["body of function \"f\" has wrong type"]);
    }

    #[test]
    fn kind_errors() {
        assert_eq!(errors("putint()"), vec!["too few actual parameters"]);
        assert_eq!(errors("puteol(1)"), vec!["incorrect number of actual parameters"]);
        assert_eq!(errors("putint(1, 2)"), vec!["too many actual parameters"]);
        assert_eq!(errors("getint(1)"), vec!["const actual parameter not expected here"]);
        assert_eq!(errors("getint(var maxint)"), vec!["actual parameter is not a variable"]);
        assert_eq!(errors("maxint()"), vec!["\"maxint\" is not a procedure identifier"]);
        assert_eq!(errors("putint(puteol())"), vec!["\"puteol\" is not a function identifier"]);
        assert_eq!(errors("let var x: Integer in x := + 1"), vec!["\"+\" is not a unary operator"]);
        assert_eq!(errors("let var x: putint in puteol()"), vec!["\"putint\" is not a type identifier"]);
        assert_eq!(errors("let var x: Integer in x := Integer"), vec!["\"Integer\" is not a const or var identifier"]);
    }

    #[test]
    fn structure_errors() {
        assert_eq!(errors("let var a: array 0 of Integer in puteol()"), vec!["arrays must not be empty"]);
        assert_eq!(errors("let var x: Integer in x := x.f"), vec!["record expected here"]);
        assert_eq!(errors("let var x: Integer in x := x[0]"), vec!["array expected here"]);
        assert_eq!(
            errors("let var r: record a: Integer end in r.b := 1"),
            vec!["no field \"b\" in this record type"]
        );
        assert_eq!(
            errors("let var a: array 2 of Integer in a['x'] := 1"),
            vec!["Integer expression expected here"]
        );
        assert_eq!(
            errors("let var a: array 2 of Integer in a := [1, 'x']"),
            vec!["incompatible array-aggregate element"]
        );
        assert_eq!(
            errors("let var r: record a: Integer, b: Integer end in r := {a ~ 1, a ~ 2}"),
            vec!["duplicate field \"a\" in record", "assignment incompatibility"]
        );
    }

    #[test]
    fn routine_parameter_signatures() {
        let base = "let proc hi() ~ puteol(); func one(): Integer ~ 1; \
                    proc callp(proc p(n: Integer)) ~ p(1); \
                    proc callf(func f(): Boolean) ~ puteol() in ";
        assert_eq!(errors(&format!("{base}callp(proc hi)")), vec!["wrong signature for procedure \"hi\""]);
        assert_eq!(errors(&format!("{base}callf(func one)")), vec!["wrong type for function \"one\""]);
        assert_eq!(errors(&format!("{base}callp(func one)")), vec!["func actual parameter not expected here"]);
        assert_eq!(
            errors("let proc p(x: Integer, x: Char) ~ puteol() in p(1, 'a')"),
            vec!["duplicated formal parameter \"x\""]
        );
    }

    #[test]
    fn recursive_procedure_resolves_to_itself() {
        let (program, messages) = check_str("let proc p(n: Integer) ~ if n > 0 then p(n - 1) else puteol() in p(3)");
        assert!(messages.is_empty());
        let CommandKind::Let { declaration, body } = &program.command.kind else {
            panic!("expected let");
        };
        let DeclarationKind::Proc { name, .. } = &declaration.kind else {
            panic!("expected proc");
        };
        let CommandKind::Call { callee, .. } = &body.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.decl, name.decl);
        assert!(callee.decl.is_some());
    }

    #[test]
    fn named_types_share_one_denoter() {
        let (program, _) = check_str("let type T ~ array 2 of Integer; var a: T; var b: T in a := b");
        let CommandKind::Let { declaration, .. } = &program.command.kind else {
            panic!("expected let");
        };
        let DeclarationKind::Sequential { first, second } = &declaration.kind else {
            panic!("expected sequence");
        };
        let DeclarationKind::Var { ty: b_ty, .. } = &second.kind else {
            panic!("expected var");
        };
        let DeclarationKind::Sequential { second: a_decl, .. } = &first.kind else {
            panic!("expected sequence");
        };
        let DeclarationKind::Var { ty: a_ty, .. } = &a_decl.kind else {
            panic!("expected var");
        };
        assert!(std::rc::Rc::ptr_eq(a_ty, b_ty));
    }

    #[test]
    fn every_vname_is_typed_after_a_clean_check() {
        let (program, messages) = check_str(
            "let var a: array 3 of Integer; var i: Integer in \
             while i < 3 do begin a[i] := i * i; i := i + 1 end",
        );
        assert!(messages.is_empty());
        let CommandKind::Let { body, .. } = &program.command.kind else {
            panic!("expected let");
        };
        let CommandKind::While { condition, .. } = &body.kind else {
            panic!("expected while");
        };
        assert!(matches!(condition.ty.as_deref().unwrap().kind, TypeKind::Bool));
    }
}
