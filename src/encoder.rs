//! Code generation: walks a checked tree and emits TAM code.
//!
//! Every value-producing construct returns the size of its result in words,
//! and a [`Frame`] threads the current routine level and stack depth down
//! the walk so each declaration can be given a static address.

use std::cell::Cell;
use std::collections::HashMap;

use crate::ast::*;
use crate::emitter::{Emitter, ObjectProgram};
use crate::entity::{RuntimeEntity, VnameAddress};
use crate::error::{CompileError, ErrorReporter};
use crate::frame::{Frame, ObjectAddress};
use crate::machine::{self, OpCode, Primitive, Register};
use crate::std_env::{StdEnvironment, StdEntity, STD_DECLS};
use crate::symbols::{BindingKind, DeclId};

type EncodeResult<T> = Result<T, CompileError>;

/// Generate code for a checked program. Restrictions are reported and code
/// generation carries on, so the result may be degraded when the reporter
/// holds errors.
pub fn encode(
    program: &Program,
    std_env: &StdEnvironment,
    reporter: &mut ErrorReporter,
    show_table: bool,
) -> ObjectProgram {
    let mut encoder = Encoder::new(std_env, Emitter::new(reporter), show_table);
    let outcome = encoder.encode_command(&program.command, Frame::INITIAL);
    encoder.emitter.emit_nd(OpCode::Halt, 0, 0);
    if encoder.out_of_range.get() {
        encoder.emitter.report_out_of_range();
    }
    if let Err(e) = outcome {
        encoder.emitter.reporter().report(e);
    }
    let object = encoder.emitter.finish();
    tracing::debug!(instructions = object.len(), "code generation finished");
    object
}

struct Encoder<'r> {
    emitter: Emitter<'r>,
    /// Run-time representation of every binding elaborated so far.
    entities: HashMap<DeclId, RuntimeEntity>,
    show_table: bool,
    /// Set when a size, offset or frame depth left the `i32` word range.
    out_of_range: Cell<bool>,
}

impl<'r> Encoder<'r> {
    fn new(std_env: &StdEnvironment, emitter: Emitter<'r>, show_table: bool) -> Self {
        let mut encoder = Self {
            emitter,
            entities: HashMap::new(),
            show_table: false,
            out_of_range: Cell::new(false),
        };
        encoder.elaborate_std_environment(std_env);
        encoder.show_table = show_table;
        encoder
    }

    fn elaborate_std_environment(&mut self, std_env: &StdEnvironment) {
        for (index, decl) in STD_DECLS.iter().enumerate() {
            let Some(id) = DeclId::from_index(index) else {
                continue;
            };
            let entity = match decl.entity {
                StdEntity::Type => {
                    let size = match std_env.declarations().get(id).map(|b| &b.kind) {
                        Some(BindingKind::Type { ty }) => self.type_size(ty),
                        _ => 0,
                    };
                    RuntimeEntity::TypeRepresentation { size }
                }
                StdEntity::Value(value) => RuntimeEntity::KnownValue {
                    size: machine::INTEGER_SIZE,
                    value,
                },
                StdEntity::Primitive(primitive) => RuntimeEntity::PrimitiveRoutine { primitive },
                StdEntity::Equality(primitive) => RuntimeEntity::EqualityRoutine { primitive },
                StdEntity::Bar => RuntimeEntity::BarRoutine,
            };
            self.entities.insert(id, entity);
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    /// Record the run-time entity for a binding occurrence.
    fn bind(&mut self, name: &Identifier, entity: RuntimeEntity) -> EncodeResult<()> {
        let id = name.decl.ok_or_else(|| {
            CompileError::internal("declaration of \"%\" was never checked", &name.spelling, name.position)
        })?;
        if self.show_table {
            tracing::info!(name = %name.spelling, "{entity}");
        }
        self.entities.insert(id, entity);
        Ok(())
    }

    fn entity(&self, decl: Option<DeclId>, spelling: &str, position: SourcePosition) -> EncodeResult<RuntimeEntity> {
        decl.and_then(|id| self.entities.get(&id))
            .cloned()
            .ok_or_else(|| CompileError::internal("no run-time entity for \"%\"", spelling, position))
    }

    fn identifier_entity(&self, id: &Identifier) -> EncodeResult<RuntimeEntity> {
        self.entity(id.decl, &id.spelling, id.position)
    }

    fn operator_entity(&self, op: &Operator) -> EncodeResult<RuntimeEntity> {
        self.entity(op.decl, &op.spelling, op.position)
    }

    // ── Word arithmetic ────────────────────────────────────────────
    //
    // Sizes, offsets and frame depths saturate instead of wrapping; the
    // restriction is reported once when encoding finishes.

    fn add_words(&self, a: i32, b: i32) -> i32 {
        a.checked_add(b).unwrap_or_else(|| {
            self.out_of_range.set(true);
            a.saturating_add(b)
        })
    }

    fn mul_words(&self, a: i32, b: i32) -> i32 {
        a.checked_mul(b).unwrap_or_else(|| {
            self.out_of_range.set(true);
            a.saturating_mul(b)
        })
    }

    /// `frame` with `n` more words on top.
    fn grow(&self, frame: Frame, n: i32) -> Frame {
        frame.checked_expand(n).unwrap_or_else(|| {
            self.out_of_range.set(true);
            frame.expand(n)
        })
    }

    /// Size in words of a value of `ty`, decided once per type denoter.
    fn type_size(&self, ty: &TypeDenoter) -> i32 {
        if let Some(entity) = ty.entity.get() {
            return entity.size();
        }
        let size = match &ty.kind {
            TypeKind::Bool => machine::BOOLEAN_SIZE,
            TypeKind::Char => machine::CHARACTER_SIZE,
            TypeKind::Int => machine::INTEGER_SIZE,
            TypeKind::Any | TypeKind::Error | TypeKind::Simple(_) => return 0,
            TypeKind::Array { length, element } => self.mul_words(length.value(), self.type_size(element)),
            TypeKind::Record(fields) => self.lay_out_fields(fields),
        };
        let entity = RuntimeEntity::TypeRepresentation { size };
        if self.show_table {
            tracing::info!(ty = %ty, "{entity}");
        }
        let _ = ty.entity.set(entity);
        size
    }

    /// Give each field its offset within the record; returns the record size.
    fn lay_out_fields(&self, fields: &FieldTypeDenoter) -> i32 {
        let mut offset = 0;
        for field in fields.iter() {
            let size = match field.entity().get() {
                Some(entity) => entity.size(),
                None => {
                    let size = self.type_size(field.ty());
                    let _ = field.entity().set(RuntimeEntity::Field { size, offset });
                    size
                }
            };
            offset = self.add_words(offset, size);
        }
        offset
    }

    fn value_size(&self, ty: Option<&TypeRef>, position: SourcePosition) -> EncodeResult<i32> {
        ty.map(|t| self.type_size(t))
            .ok_or_else(|| CompileError::internal("expression has no type", "", position))
    }

    // ── Commands ───────────────────────────────────────────────────

    fn encode_command(&mut self, command: &Command, frame: Frame) -> EncodeResult<()> {
        match &command.kind {
            CommandKind::Empty => {}
            CommandKind::Assign { target, value } => {
                let size = self.encode_expression(value, frame)?;
                self.encode_store(target, self.grow(frame, size), size)?;
            }
            CommandKind::Call { callee, args } => {
                let args_size = self.encode_actuals(args, frame)?;
                let routine = self.identifier_entity(callee)?;
                routine.encode_call(&mut self.emitter, frame.replace(args_size))?;
            }
            CommandKind::Sequential { first, second } => {
                self.encode_command(first, frame)?;
                self.encode_command(second, frame)?;
            }
            CommandKind::Let { declaration, body } => {
                let extra = self.encode_declaration(declaration, frame)?;
                self.encode_command(body, self.grow(frame, extra))?;
                if extra > 0 {
                    self.emitter.emit_nd(OpCode::Pop, 0, extra);
                }
            }
            CommandKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.encode_expression(condition, frame)?;
                let jumpif = self.emitter.emit(OpCode::JumpIf, machine::FALSE_REP, Register::CB, 0);
                self.encode_command(then_branch, frame)?;
                let jump = self.emitter.emit(OpCode::Jump, 0, Register::CB, 0);
                self.emitter.patch(jumpif);
                self.encode_command(else_branch, frame)?;
                self.emitter.patch(jump);
            }
            CommandKind::While { condition, body } => {
                let jump = self.emitter.emit(OpCode::Jump, 0, Register::CB, 0);
                let loop_addr = self.emitter.next_instr_addr();
                self.encode_command(body, frame)?;
                self.emitter.patch(jump);
                self.encode_expression(condition, frame)?;
                self.emitter.emit(OpCode::JumpIf, machine::TRUE_REP, Register::CB, loop_addr);
            }
            CommandKind::Repeat { body, condition } => {
                let loop_addr = self.emitter.next_instr_addr();
                self.encode_command(body, frame)?;
                self.encode_expression(condition, frame)?;
                self.emitter.emit(OpCode::JumpIf, machine::FALSE_REP, Register::CB, loop_addr);
            }
            CommandKind::LoopWhile {
                body,
                condition,
                tail,
            } => {
                let loop_addr = self.emitter.next_instr_addr();
                self.encode_command(body, frame)?;
                self.encode_expression(condition, frame)?;
                let exit = self.emitter.emit(OpCode::JumpIf, machine::FALSE_REP, Register::CB, 0);
                self.encode_command(tail, frame)?;
                self.emitter.emit(OpCode::Jump, 0, Register::CB, loop_addr);
                self.emitter.patch(exit);
            }
        }
        Ok(())
    }

    // ── Expressions ────────────────────────────────────────────────

    /// Push the value of `expr`; returns its size.
    fn encode_expression(&mut self, expr: &Expression, frame: Frame) -> EncodeResult<i32> {
        if matches!(expr.kind, ExpressionKind::Empty) {
            return Ok(0);
        }
        let size = self.value_size(expr.ty.as_ref(), expr.position)?;
        match &expr.kind {
            ExpressionKind::Empty => {}
            ExpressionKind::Integer(il) => {
                self.emitter.emit_nd(OpCode::LoadL, 0, il.value());
            }
            ExpressionKind::Character(cl) => {
                self.emitter.emit_nd(OpCode::LoadL, 0, cl.value());
            }
            ExpressionKind::Vname(vname) => self.encode_fetch(vname, frame, size)?,
            ExpressionKind::Call { callee, args } => {
                let args_size = self.encode_actuals(args, frame)?;
                let routine = self.identifier_entity(callee)?;
                routine.encode_call(&mut self.emitter, frame.replace(args_size))?;
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.encode_expression(condition, frame)?;
                let jumpif = self.emitter.emit(OpCode::JumpIf, machine::FALSE_REP, Register::CB, 0);
                self.encode_expression(then_branch, frame)?;
                let jump = self.emitter.emit(OpCode::Jump, 0, Register::CB, 0);
                self.emitter.patch(jumpif);
                let size = self.encode_expression(else_branch, frame)?;
                self.emitter.patch(jump);
                return Ok(size);
            }
            ExpressionKind::Let { declaration, body } => {
                let extra = self.encode_declaration(declaration, frame)?;
                let size = self.encode_expression(body, self.grow(frame, extra))?;
                if extra > 0 {
                    self.emitter.emit_nd(OpCode::Pop, size, extra);
                }
                return Ok(size);
            }
            ExpressionKind::Unary { op, operand } => {
                self.encode_expression(operand, frame)?;
                let routine = self.operator_entity(op)?;
                routine.encode_call(&mut self.emitter, frame.replace(size))?;
            }
            ExpressionKind::Binary { left, op, right } => {
                let left_size = self.encode_expression(left, frame)?;
                let right_size = self.encode_expression(right, self.grow(frame, left_size))?;
                let args_size = self.add_words(left_size, right_size);
                let routine = self.operator_entity(op)?;
                routine.encode_call(&mut self.emitter, frame.replace(args_size))?;
            }
            ExpressionKind::Array(aggregate) => return self.encode_array_aggregate(aggregate, frame),
            ExpressionKind::Record(aggregate) => return self.encode_record_aggregate(aggregate, frame),
        }
        Ok(size)
    }

    fn encode_array_aggregate(&mut self, aggregate: &ArrayAggregate, frame: Frame) -> EncodeResult<i32> {
        match aggregate {
            ArrayAggregate::Single { element, .. } => self.encode_expression(element, frame),
            ArrayAggregate::Multiple { element, rest, .. } => {
                let size = self.encode_expression(element, frame)?;
                let rest_size = self.encode_array_aggregate(rest, self.grow(frame, size))?;
                Ok(self.add_words(size, rest_size))
            }
        }
    }

    fn encode_record_aggregate(&mut self, aggregate: &RecordAggregate, frame: Frame) -> EncodeResult<i32> {
        match aggregate {
            RecordAggregate::Single { value, .. } => self.encode_expression(value, frame),
            RecordAggregate::Multiple { value, rest, .. } => {
                let size = self.encode_expression(value, frame)?;
                let rest_size = self.encode_record_aggregate(rest, self.grow(frame, size))?;
                Ok(self.add_words(size, rest_size))
            }
        }
    }

    // ── Value-or-variable names ────────────────────────────────────

    /// Emit any index arithmetic for `vname` and return the entity it is
    /// rooted at together with its static offset.
    fn encode_vname(&mut self, vname: &Vname, frame: Frame) -> EncodeResult<(RuntimeEntity, VnameAddress)> {
        match &vname.kind {
            VnameKind::Simple(id) => Ok((self.identifier_entity(id)?, VnameAddress::default())),
            VnameKind::Dot { record, field } => {
                let (base, mut at) = self.encode_vname(record, frame)?;
                at.offset = self.add_words(at.offset, self.field_offset(record, field)?);
                Ok((base, at))
            }
            VnameKind::Subscript { array, index } => {
                let (base, mut at) = self.encode_vname(array, frame)?;
                let elem_size = self.value_size(vname.ty.as_ref(), vname.position)?;
                if let ExpressionKind::Integer(il) = &index.kind {
                    at.offset = self.add_words(at.offset, self.mul_words(il.value(), elem_size));
                } else {
                    let index_frame = if at.indexed {
                        self.grow(frame, machine::INTEGER_SIZE)
                    } else {
                        frame
                    };
                    self.encode_expression(index, index_frame)?;
                    if elem_size != 1 {
                        self.emitter.emit_nd(OpCode::LoadL, 0, elem_size);
                        self.emitter.emit_primitive_call(Primitive::Mult);
                    }
                    if at.indexed {
                        self.emitter.emit_primitive_call(Primitive::Add);
                    } else {
                        at.indexed = true;
                    }
                }
                Ok((base, at))
            }
        }
    }

    fn field_offset(&self, record: &Vname, field: &Identifier) -> EncodeResult<i32> {
        let missing = || CompileError::internal("no field \"%\" laid out", &field.spelling, field.position);
        let record_ty = record.ty.as_ref().ok_or_else(missing)?;
        self.type_size(record_ty);
        match record_ty.field(&field.spelling).and_then(|f| f.entity().get()) {
            Some(RuntimeEntity::Field { offset, .. }) => Ok(*offset),
            _ => Err(missing()),
        }
    }

    fn encode_fetch(&mut self, vname: &Vname, frame: Frame, size: i32) -> EncodeResult<()> {
        let (base, at) = self.encode_vname(vname, frame)?;
        let size = if size > machine::MAX_OPERAND_SIZE {
            self.emitter.report_restriction("can't load values larger than 255 words");
            machine::MAX_OPERAND_SIZE
        } else {
            size
        };
        base.encode_fetch(&mut self.emitter, frame, size, at)?;
        Ok(())
    }

    fn encode_store(&mut self, vname: &Vname, frame: Frame, size: i32) -> EncodeResult<()> {
        let (base, at) = self.encode_vname(vname, frame)?;
        let size = if size > machine::MAX_OPERAND_SIZE {
            self.emitter.report_restriction("can't store values larger than 255 words");
            machine::MAX_OPERAND_SIZE
        } else {
            size
        };
        base.encode_store(&mut self.emitter, frame, size, at)?;
        Ok(())
    }

    fn encode_fetch_address(&mut self, vname: &Vname, frame: Frame) -> EncodeResult<()> {
        let (base, at) = self.encode_vname(vname, frame)?;
        base.encode_fetch_address(&mut self.emitter, frame, at)?;
        Ok(())
    }

    // ── Declarations ───────────────────────────────────────────────

    /// Elaborate a declaration; returns the words it leaves on the stack.
    fn encode_declaration(&mut self, declaration: &Declaration, frame: Frame) -> EncodeResult<i32> {
        match &declaration.kind {
            DeclarationKind::Const { name, value } => {
                if let Some(literal) = value.literal_value() {
                    let size = self.value_size(value.ty.as_ref(), value.position)?;
                    self.bind(name, RuntimeEntity::KnownValue { size, value: literal })?;
                    Ok(0)
                } else {
                    let size = self.encode_expression(value, frame)?;
                    self.bind(
                        name,
                        RuntimeEntity::UnknownValue {
                            size,
                            address: frame.into(),
                        },
                    )?;
                    Ok(size)
                }
            }
            DeclarationKind::Var { name, ty } => {
                let size = self.type_size(ty);
                self.emitter.emit_nd(OpCode::Push, 0, size);
                self.bind(
                    name,
                    RuntimeEntity::KnownAddress {
                        size: machine::ADDRESS_SIZE,
                        address: frame.into(),
                    },
                )?;
                Ok(size)
            }
            DeclarationKind::Proc { name, formals, body } => {
                self.encode_routine(name, formals, frame, |encoder, body_frame| {
                    encoder.encode_command(body, body_frame)?;
                    Ok(0)
                })?;
                Ok(0)
            }
            DeclarationKind::Func {
                name,
                formals,
                body,
                ..
            } => {
                self.encode_routine(name, formals, frame, |encoder, body_frame| {
                    encoder.encode_expression(body, body_frame)
                })?;
                Ok(0)
            }
            DeclarationKind::Type { ty, .. } => {
                self.type_size(ty);
                Ok(0)
            }
            DeclarationKind::Sequential { first, second } => {
                let first_size = self.encode_declaration(first, frame)?;
                let second_size = self.encode_declaration(second, self.grow(frame, first_size))?;
                Ok(self.add_words(first_size, second_size))
            }
        }
    }

    /// Shared shape of procedure and function declarations: jump over the
    /// body, bind the entry point before the body so it can recurse, then
    /// encode the body one level deeper. `encode_body` returns the size of
    /// the routine's result.
    fn encode_routine(
        &mut self,
        name: &Identifier,
        formals: &FormalParameterSequence,
        frame: Frame,
        encode_body: impl FnOnce(&mut Self, Frame) -> EncodeResult<i32>,
    ) -> EncodeResult<()> {
        let jump = self.emitter.emit(OpCode::Jump, 0, Register::CB, 0);
        let entry = ObjectAddress::new(frame.level(), self.emitter.next_instr_addr());
        self.bind(
            name,
            RuntimeEntity::KnownRoutine {
                size: machine::CLOSURE_SIZE,
                address: entry,
            },
        )?;
        let mut args_size = 0;
        let mut result_size = 0;
        if frame.level() >= machine::MAX_ROUTINE_LEVEL {
            self.emitter.report_restriction("can't nest routines more than 7 deep");
        } else {
            args_size = self.encode_formals(formals, frame.push(0))?;
            result_size = encode_body(self, frame.push(machine::LINK_DATA_SIZE))?;
        }
        self.emitter.emit_nd(OpCode::Return, result_size, args_size);
        self.emitter.patch(jump);
        Ok(())
    }

    // ── Parameters ─────────────────────────────────────────────────

    /// Give each formal its address below the link data. The last parameter
    /// is pushed last, so it sits nearest LB; returns the total size.
    fn encode_formals(&mut self, formals: &FormalParameterSequence, frame: Frame) -> EncodeResult<i32> {
        match formals {
            FormalParameterSequence::Empty { .. } => Ok(0),
            FormalParameterSequence::Single { param, .. } => self.encode_formal(param, frame),
            FormalParameterSequence::Multiple { param, rest, .. } => {
                let rest_size = self.encode_formals(rest, frame)?;
                let size = self.encode_formal(param, self.grow(frame, rest_size))?;
                Ok(self.add_words(rest_size, size))
            }
        }
    }

    fn encode_formal(&mut self, param: &FormalParameter, frame: Frame) -> EncodeResult<i32> {
        let below = |size: i32| ObjectAddress::new(frame.level(), -self.add_words(frame.size(), size));
        let (entity, size) = match &param.kind {
            FormalParameterKind::Const { ty, .. } => {
                let size = self.type_size(ty);
                (RuntimeEntity::UnknownValue { size, address: below(size) }, size)
            }
            FormalParameterKind::Var { ty, .. } => {
                self.type_size(ty);
                let size = machine::ADDRESS_SIZE;
                (RuntimeEntity::UnknownAddress { size, address: below(size) }, size)
            }
            FormalParameterKind::Proc { .. } | FormalParameterKind::Func { .. } => {
                let size = machine::CLOSURE_SIZE;
                (RuntimeEntity::UnknownRoutine { size, address: below(size) }, size)
            }
        };
        self.bind(param.name(), entity)?;
        Ok(size)
    }

    /// Push the arguments of a call; returns their total size.
    fn encode_actuals(&mut self, args: &ActualParameterSequence, frame: Frame) -> EncodeResult<i32> {
        match args {
            ActualParameterSequence::Empty { .. } => Ok(0),
            ActualParameterSequence::Single { param, .. } => self.encode_actual(param, frame),
            ActualParameterSequence::Multiple { param, rest, .. } => {
                let size = self.encode_actual(param, frame)?;
                let rest_size = self.encode_actuals(rest, self.grow(frame, size))?;
                Ok(self.add_words(size, rest_size))
            }
        }
    }

    fn encode_actual(&mut self, param: &ActualParameter, frame: Frame) -> EncodeResult<i32> {
        match &param.kind {
            ActualParameterKind::Const(expr) => self.encode_expression(expr, frame),
            ActualParameterKind::Var(vname) => {
                self.encode_fetch_address(vname, frame)?;
                Ok(machine::ADDRESS_SIZE)
            }
            ActualParameterKind::Proc(id) | ActualParameterKind::Func(id) => {
                let routine = self.identifier_entity(id)?;
                routine.encode_fetch_closure(&mut self.emitter, frame)?;
                Ok(machine::CLOSURE_SIZE)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checker::check;
    use crate::error::ErrorKind;
    use crate::folder::fold_constants;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn encode_str(source: &str, folding: bool) -> (ObjectProgram, ErrorReporter) {
        let mut reporter = ErrorReporter::new();
        let mut program = parse(source, &mut reporter).unwrap();
        let env = StdEnvironment::new();
        check(&mut program, &env, &mut reporter);
        assert!(!reporter.has_errors(), "{:?}", reporter.errors());
        if folding {
            fold_constants(&mut program, &env);
        }
        let object = encode(&program, &env, &mut reporter, false);
        (object, reporter)
    }

    fn listing(source: &str) -> Vec<String> {
        let (object, reporter) = encode_str(source, false);
        assert!(!reporter.has_errors(), "{:?}", reporter.errors());
        object.instructions.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn known_constant_is_a_literal_load() {
        assert_eq!(
            listing("let const pi ~ 3 in putint(pi)"),
            vec!["LOADL  3", "CALL   putint", "HALT"]
        );
    }

    #[test]
    fn operators_apply_left_to_right() {
        assert_eq!(
            listing("let var x : Integer in x := 2 + 3 * 1"),
            vec![
                "PUSH   1",
                "LOADL  2",
                "LOADL  3",
                "CALL   add",
                "LOADL  1",
                "CALL   mult",
                "STORE  (1) 0[SB]",
                "POP    (0) 1",
                "HALT",
            ]
        );
    }

    #[test]
    fn folded_program_loads_the_result() {
        let (object, _) = encode_str("let var x : Integer in x := 2 + 3 * 1", true);
        let text: Vec<String> = object.instructions.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["PUSH   1", "LOADL  5", "STORE  (1) 0[SB]", "POP    (0) 1", "HALT"]);
    }

    #[test]
    fn while_loop_tests_at_the_bottom() {
        assert_eq!(
            listing("let var x: Integer in while x < 3 do x := x + 1"),
            vec![
                "PUSH   1",
                "JUMP   6[CB]",
                "LOAD   (1) 0[SB]",
                "LOADL  1",
                "CALL   add",
                "STORE  (1) 0[SB]",
                "LOAD   (1) 0[SB]",
                "LOADL  3",
                "CALL   lt",
                "JUMPIF (1) 2[CB]",
                "POP    (0) 1",
                "HALT",
            ]
        );
    }

    #[test]
    fn if_command_patches_both_jumps() {
        assert_eq!(
            listing("if true then putint(1) else putint(2)"),
            vec![
                "LOADL  1",
                "JUMPIF (0) 5[CB]",
                "LOADL  1",
                "CALL   putint",
                "JUMP   7[CB]",
                "LOADL  2",
                "CALL   putint",
                "HALT",
            ]
        );
    }

    #[test]
    fn repeat_and_loop_while() {
        assert_eq!(
            listing("repeat puteol() until true"),
            vec!["CALL   puteol", "LOADL  1", "JUMPIF (0) 0[CB]", "HALT"]
        );
        assert_eq!(
            listing("loop puteol() while false do geteol()"),
            vec![
                "CALL   puteol",
                "LOADL  0",
                "JUMPIF (0) 5[CB]",
                "CALL   geteol",
                "JUMP   0[CB]",
                "HALT",
            ]
        );
    }

    #[test]
    fn parameters_sit_below_the_link_data() {
        assert_eq!(
            listing(
                "let var z: Integer; \
                     proc p(a: Integer, var b: Integer, c: Integer) ~ \
                         let var l: Integer in b := a + c + l \
                 in p(1, var z, 2)"
            ),
            vec![
                "PUSH   1",
                "JUMP   12[CB]",
                "PUSH   1",
                "LOAD   (1) -3[LB]",
                "LOAD   (1) -1[LB]",
                "CALL   add",
                "LOAD   (1) 3[LB]",
                "CALL   add",
                "LOAD   (1) -2[LB]",
                "STOREI (1)",
                "POP    (0) 1",
                "RETURN (0) 3",
                "LOADL  1",
                "LOADA  0[SB]",
                "LOADL  2",
                "CALL   (SB) 2[CB]",
                "POP    (0) 1",
                "HALT",
            ]
        );
    }

    #[test]
    fn function_returns_its_value() {
        assert_eq!(
            listing("let func sq(n: Integer): Integer ~ n * n in putint(sq(4))"),
            vec![
                "JUMP   5[CB]",
                "LOAD   (1) -1[LB]",
                "LOAD   (1) -1[LB]",
                "CALL   mult",
                "RETURN (1) 1",
                "LOADL  4",
                "CALL   (SB) 1[CB]",
                "CALL   putint",
                "HALT",
            ]
        );
    }

    #[test]
    fn record_fields_and_array_elements() {
        assert_eq!(
            listing(
                "let type R ~ record a: Integer, b: array 3 of Char, c: Boolean end; \
                     var r: R; var i: Integer \
                 in begin r.c := true; r.b[2] := 'x'; r.b[i] := 'y'; putint(r.a) end"
            ),
            vec![
                "PUSH   5",
                "PUSH   1",
                "LOADL  1",
                "STORE  (1) 4[SB]",
                "LOADL  120",
                "STORE  (1) 3[SB]",
                "LOADL  121",
                "LOAD   (1) 5[SB]",
                "LOADA  1[SB]",
                "CALL   add",
                "STOREI (1)",
                "LOAD   (1) 0[SB]",
                "CALL   putint",
                "POP    (0) 6",
                "HALT",
            ]
        );
    }

    #[test]
    fn routine_arguments_pass_closures() {
        assert_eq!(
            listing("let proc twice(proc p()) ~ begin p(); p() end in twice(proc puteol)"),
            vec![
                "JUMP   6[CB]",
                "LOAD   (2) -2[LB]",
                "CALLI",
                "LOAD   (2) -2[LB]",
                "CALLI",
                "RETURN (0) 2",
                "LOADA  0[SB]",
                "LOADA  24[PB]",
                "CALL   (SB) 1[CB]",
                "HALT",
            ]
        );
    }

    #[test]
    fn nesting_too_deep_is_one_restriction() {
        let depth = machine::MAX_ROUTINE_LEVEL + 1;
        let mut source = String::from("puteol()");
        for level in (1..=depth).rev() {
            source = format!("let proc p{level}() ~ {source} in p{level}()");
        }
        let (object, reporter) = encode_str(&source, false);
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.errors()[0].kind, ErrorKind::Restriction);
        assert_eq!(reporter.errors()[0].message(), "can't nest routines more than 7 deep");
        assert!(!object.is_empty());
    }

    fn single_restriction(source: &str) -> ObjectProgram {
        let (object, reporter) = encode_str(source, false);
        assert_eq!(reporter.error_count(), 1, "{:?}", reporter.errors());
        assert_eq!(reporter.errors()[0].kind, ErrorKind::Restriction);
        assert_eq!(reporter.errors()[0].message(), "data too large to address");
        object
    }

    #[test]
    fn frame_larger_than_word_range_is_restricted() {
        let object = single_restriction(
            "let var a: array 2000000000 of Integer; var b: array 2000000000 of Integer in puteol()",
        );
        let text: Vec<String> = object.instructions.iter().map(ToString::to_string).collect();
        assert_eq!(text[0], "PUSH   2000000000");
        assert_eq!(text.last().unwrap(), "HALT");
    }

    #[test]
    fn constant_index_past_word_range_is_restricted() {
        let object = single_restriction("let var a: array 3 of array 2 of Integer in a[2000000000][0] := 1");
        assert_eq!(object.instructions.last().unwrap().op, OpCode::Halt);
    }

    #[test]
    fn unchecked_tree_is_an_internal_error() {
        let mut reporter = ErrorReporter::new();
        let program = parse("putint(1)", &mut reporter).unwrap();
        let env = StdEnvironment::new();
        let object = encode(&program, &env, &mut reporter, false);
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.errors()[0].kind, ErrorKind::Internal);
        assert_eq!(object.instructions.last().unwrap().op, OpCode::Halt);
    }

    #[test]
    fn first_local_follows_link_data() {
        let text = listing("let proc p(a: Integer, b: Integer) ~ let var l: Integer in l := a in p(1, 2)");
        assert!(text.contains(&"STORE  (1) 3[LB]".to_string()));
        assert!(text.contains(&"LOAD   (1) -2[LB]".to_string()));
        assert!(text.contains(&"RETURN (0) 2".to_string()));
    }
}
