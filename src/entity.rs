//! Run-time entities: how a declared name is represented on the target
//! machine, and the code that fetches, stores, or calls it.

use std::fmt;

use crate::ast::SourcePosition;
use crate::emitter::Emitter;
use crate::error::CompileError;
use crate::frame::{Frame, ObjectAddress};
use crate::machine::{self, OpCode, Primitive, Register};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEntity {
    /// Layout of a type: how many words a value occupies.
    TypeRepresentation { size: i32 },
    /// A constant whose value is known at compile time.
    KnownValue { size: i32, value: i32 },
    /// A constant computed at run time, stored at a known address.
    UnknownValue { size: i32, address: ObjectAddress },
    /// A variable at a known address.
    KnownAddress { size: i32, address: ObjectAddress },
    /// A var parameter: the variable's address is stored at `address`.
    UnknownAddress { size: i32, address: ObjectAddress },
    /// A declared routine with a known entry point.
    KnownRoutine { size: i32, address: ObjectAddress },
    /// A routine parameter: its closure is stored at `address`.
    UnknownRoutine { size: i32, address: ObjectAddress },
    PrimitiveRoutine { primitive: Primitive },
    /// `=` and `\=`: the primitive takes the operand size as an extra argument.
    EqualityRoutine { primitive: Primitive },
    /// Unary `|`: multiplies its operand by 100.
    BarRoutine,
    Field { size: i32, offset: i32 },
}

/// The static part of a vname's address: where it sits relative to its base
/// entity, and whether an index is waiting on the stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VnameAddress {
    pub offset: i32,
    pub indexed: bool,
}

/// An entity was asked to do something its kind cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotApplicable {
    pub operation: &'static str,
    pub entity: &'static str,
}

impl From<NotApplicable> for CompileError {
    fn from(e: NotApplicable) -> Self {
        CompileError::internal(
            format!("can't {} a {}", e.operation, e.entity),
            "",
            SourcePosition::default(),
        )
    }
}

impl RuntimeEntity {
    pub fn size(&self) -> i32 {
        match self {
            RuntimeEntity::TypeRepresentation { size }
            | RuntimeEntity::KnownValue { size, .. }
            | RuntimeEntity::UnknownValue { size, .. }
            | RuntimeEntity::KnownAddress { size, .. }
            | RuntimeEntity::UnknownAddress { size, .. }
            | RuntimeEntity::KnownRoutine { size, .. }
            | RuntimeEntity::UnknownRoutine { size, .. }
            | RuntimeEntity::Field { size, .. } => *size,
            RuntimeEntity::PrimitiveRoutine { .. }
            | RuntimeEntity::EqualityRoutine { .. }
            | RuntimeEntity::BarRoutine => 0,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RuntimeEntity::TypeRepresentation { .. } => "type representation",
            RuntimeEntity::KnownValue { .. } => "known value",
            RuntimeEntity::UnknownValue { .. } => "unknown value",
            RuntimeEntity::KnownAddress { .. } => "known address",
            RuntimeEntity::UnknownAddress { .. } => "unknown address",
            RuntimeEntity::KnownRoutine { .. } => "known routine",
            RuntimeEntity::UnknownRoutine { .. } => "unknown routine",
            RuntimeEntity::PrimitiveRoutine { .. } => "primitive routine",
            RuntimeEntity::EqualityRoutine { .. } => "equality routine",
            RuntimeEntity::BarRoutine => "bar routine",
            RuntimeEntity::Field { .. } => "field",
        }
    }

    fn not_applicable(&self, operation: &'static str) -> NotApplicable {
        NotApplicable {
            operation,
            entity: self.kind_name(),
        }
    }

    /// Push the value of the vname rooted at this entity.
    pub fn encode_fetch(
        &self,
        emitter: &mut Emitter<'_>,
        frame: Frame,
        size: i32,
        at: VnameAddress,
    ) -> Result<(), NotApplicable> {
        match self {
            RuntimeEntity::KnownValue { value, .. } => {
                emitter.emit_nd(OpCode::LoadL, 0, *value);
            }
            RuntimeEntity::UnknownValue { address, .. } | RuntimeEntity::KnownAddress { address, .. } => {
                let register = display_register(emitter, frame, *address);
                let displacement = displace(emitter, *address, at);
                if at.indexed {
                    emitter.emit(OpCode::LoadA, 0, register, displacement);
                    emitter.emit_primitive_call(Primitive::Add);
                    emitter.emit_nd(OpCode::LoadI, size, 0);
                } else {
                    emitter.emit(OpCode::Load, size, register, displacement);
                }
            }
            RuntimeEntity::UnknownAddress { .. } => {
                self.load_indirect_address(emitter, frame, at)?;
                emitter.emit_nd(OpCode::LoadI, size, 0);
            }
            _ => return Err(self.not_applicable("fetch")),
        }
        Ok(())
    }

    /// Pop a value of `size` words into the vname rooted at this entity.
    pub fn encode_store(
        &self,
        emitter: &mut Emitter<'_>,
        frame: Frame,
        size: i32,
        at: VnameAddress,
    ) -> Result<(), NotApplicable> {
        match self {
            RuntimeEntity::KnownAddress { address, .. } => {
                let register = display_register(emitter, frame, *address);
                let displacement = displace(emitter, *address, at);
                if at.indexed {
                    emitter.emit(OpCode::LoadA, 0, register, displacement);
                    emitter.emit_primitive_call(Primitive::Add);
                    emitter.emit_nd(OpCode::StoreI, size, 0);
                } else {
                    emitter.emit(OpCode::Store, size, register, displacement);
                }
            }
            RuntimeEntity::UnknownAddress { .. } => {
                self.load_indirect_address(emitter, frame, at)?;
                emitter.emit_nd(OpCode::StoreI, size, 0);
            }
            _ => return Err(self.not_applicable("store")),
        }
        Ok(())
    }

    /// Push the address of the vname rooted at this entity.
    pub fn encode_fetch_address(
        &self,
        emitter: &mut Emitter<'_>,
        frame: Frame,
        at: VnameAddress,
    ) -> Result<(), NotApplicable> {
        match self {
            RuntimeEntity::KnownAddress { address, .. } => {
                let register = display_register(emitter, frame, *address);
                let displacement = displace(emitter, *address, at);
                emitter.emit(OpCode::LoadA, 0, register, displacement);
                if at.indexed {
                    emitter.emit_primitive_call(Primitive::Add);
                }
                Ok(())
            }
            RuntimeEntity::UnknownAddress { .. } => self.load_indirect_address(emitter, frame, at),
            _ => Err(self.not_applicable("take the address of")),
        }
    }

    /// Load the stored address, then add any index and field offset.
    fn load_indirect_address(
        &self,
        emitter: &mut Emitter<'_>,
        frame: Frame,
        at: VnameAddress,
    ) -> Result<(), NotApplicable> {
        let RuntimeEntity::UnknownAddress { address, .. } = self else {
            return Err(self.not_applicable("dereference"));
        };
        let register = display_register(emitter, frame, *address);
        emitter.emit(OpCode::Load, machine::ADDRESS_SIZE, register, address.displacement);
        if at.indexed {
            emitter.emit_primitive_call(Primitive::Add);
        }
        if at.offset != 0 {
            emitter.emit_nd(OpCode::LoadL, 0, at.offset);
            emitter.emit_primitive_call(Primitive::Add);
        }
        Ok(())
    }

    /// Call this routine; its arguments are already on the stack, and
    /// `frame.size()` is their total size.
    pub fn encode_call(&self, emitter: &mut Emitter<'_>, frame: Frame) -> Result<(), NotApplicable> {
        match self {
            RuntimeEntity::KnownRoutine { address, .. } => {
                let link = display_register(emitter, frame, *address);
                emitter.emit(OpCode::Call, link as i32, Register::CB, address.displacement);
            }
            RuntimeEntity::UnknownRoutine { address, .. } => {
                let register = display_register(emitter, frame, *address);
                emitter.emit(OpCode::Load, machine::CLOSURE_SIZE, register, address.displacement);
                emitter.emit_nd(OpCode::CallI, 0, 0);
            }
            RuntimeEntity::PrimitiveRoutine { primitive } => {
                if *primitive != Primitive::Id {
                    emitter.emit_primitive_call(*primitive);
                }
            }
            RuntimeEntity::EqualityRoutine { primitive } => {
                emitter.emit_nd(OpCode::LoadL, 0, frame.size() / 2);
                emitter.emit_primitive_call(*primitive);
            }
            RuntimeEntity::BarRoutine => {
                emitter.emit_nd(OpCode::LoadL, 0, 100);
                emitter.emit_primitive_call(Primitive::Mult);
            }
            _ => return Err(self.not_applicable("call")),
        }
        Ok(())
    }

    /// Push this routine's closure, for passing as a proc/func argument.
    pub fn encode_fetch_closure(&self, emitter: &mut Emitter<'_>, frame: Frame) -> Result<(), NotApplicable> {
        match self {
            RuntimeEntity::KnownRoutine { address, .. } => {
                let link = display_register(emitter, frame, *address);
                emitter.emit(OpCode::LoadA, 0, link, 0);
                emitter.emit(OpCode::LoadA, 0, Register::CB, address.displacement);
            }
            RuntimeEntity::UnknownRoutine { address, .. } => {
                let register = display_register(emitter, frame, *address);
                emitter.emit(OpCode::Load, machine::CLOSURE_SIZE, register, address.displacement);
            }
            RuntimeEntity::PrimitiveRoutine { primitive } | RuntimeEntity::EqualityRoutine { primitive } => {
                emitter.emit(OpCode::LoadA, 0, Register::SB, 0);
                emitter.emit(OpCode::LoadA, 0, Register::PB, *primitive as i32);
            }
            RuntimeEntity::BarRoutine => {
                emitter.emit(OpCode::LoadA, 0, Register::SB, 0);
                emitter.emit(OpCode::LoadA, 0, Register::PB, Primitive::Mult as i32);
            }
            _ => return Err(self.not_applicable("pass as a routine")),
        }
        Ok(())
    }
}

impl fmt::Display for RuntimeEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEntity::TypeRepresentation { size } => write!(f, "type size={size}"),
            RuntimeEntity::KnownValue { size, value } => write!(f, "known value size={size} value={value}"),
            RuntimeEntity::UnknownValue { size, address }
            | RuntimeEntity::KnownAddress { size, address }
            | RuntimeEntity::UnknownAddress { size, address }
            | RuntimeEntity::KnownRoutine { size, address }
            | RuntimeEntity::UnknownRoutine { size, address } => write!(
                f,
                "{} size={size} level={} displacement={}",
                self.kind_name(),
                address.level,
                address.displacement
            ),
            RuntimeEntity::PrimitiveRoutine { primitive } | RuntimeEntity::EqualityRoutine { primitive } => {
                write!(f, "{} {}", self.kind_name(), primitive.name())
            }
            RuntimeEntity::BarRoutine => write!(f, "bar routine"),
            RuntimeEntity::Field { size, offset } => write!(f, "field size={size} offset={offset}"),
        }
    }
}

/// Static displacement of a vname: its base address plus field and
/// constant-index offsets.
fn displace(emitter: &mut Emitter<'_>, address: ObjectAddress, at: VnameAddress) -> i32 {
    address.displacement.checked_add(at.offset).unwrap_or_else(|| {
        emitter.report_out_of_range();
        address.displacement.saturating_add(at.offset)
    })
}

/// Register through which code running in `frame` reaches data declared at
/// `address.level`. Globals go through SB; locals through LB and the
/// display registers L1..L6.
pub fn display_register(emitter: &mut Emitter<'_>, frame: Frame, address: ObjectAddress) -> Register {
    if address.level == 0 {
        return Register::SB;
    }
    let levels_out = frame.level().saturating_sub(address.level);
    if levels_out > 6 {
        emitter.report_restriction("can't access data more than 6 levels out");
    }
    Register::local(levels_out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorReporter;
    use crate::machine::Instruction;

    fn run(f: impl FnOnce(&mut Emitter<'_>)) -> (Vec<Instruction>, ErrorReporter) {
        let mut reporter = ErrorReporter::new();
        let mut emitter = Emitter::new(&mut reporter);
        f(&mut emitter);
        let program = emitter.finish();
        (program.instructions, reporter)
    }

    fn ins(op: OpCode, n: i32, r: Register, d: i32) -> Instruction {
        Instruction::new(op, n, r as i32, d)
    }

    #[test]
    fn known_value_fetch_is_literal() {
        let (code, _) = run(|e| {
            let entity = RuntimeEntity::KnownValue { size: 1, value: 3 };
            entity.encode_fetch(e, Frame::INITIAL, 1, VnameAddress::default()).unwrap();
        });
        assert_eq!(code, vec![ins(OpCode::LoadL, 0, Register::CB, 3)]);
    }

    #[test]
    fn global_variable_direct_and_indexed() {
        let var = RuntimeEntity::KnownAddress { size: 1, address: ObjectAddress::new(0, 2) };
        let (code, _) = run(|e| {
            var.encode_store(e, Frame::INITIAL, 1, VnameAddress { offset: 1, indexed: false }).unwrap();
            var.encode_fetch(e, Frame::INITIAL, 2, VnameAddress { offset: 0, indexed: true }).unwrap();
        });
        assert_eq!(code, vec![
            ins(OpCode::Store, 1, Register::SB, 3),
            ins(OpCode::LoadA, 0, Register::SB, 2),
            Instruction::new(OpCode::Call, Register::SB as i32, Register::PB as i32, Primitive::Add as i32),
            ins(OpCode::LoadI, 2, Register::CB, 0),
        ]);
    }

    #[test]
    fn var_parameter_goes_through_stored_address() {
        let param = RuntimeEntity::UnknownAddress { size: 1, address: ObjectAddress::new(1, -1) };
        let frame = Frame::INITIAL.push(3);
        let (code, _) = run(|e| {
            param.encode_fetch(e, frame, 1, VnameAddress { offset: 2, indexed: false }).unwrap();
        });
        assert_eq!(code, vec![
            ins(OpCode::Load, 1, Register::LB, -1),
            ins(OpCode::LoadL, 0, Register::CB, 2),
            Instruction::new(OpCode::Call, Register::SB as i32, Register::PB as i32, Primitive::Add as i32),
            ins(OpCode::LoadI, 1, Register::CB, 0),
        ]);
    }

    #[test]
    fn known_routine_call_uses_static_link() {
        let routine = RuntimeEntity::KnownRoutine { size: 2, address: ObjectAddress::new(1, 5) };
        let (code, _) = run(|e| {
            routine.encode_call(e, Frame::INITIAL.push(3).push(3)).unwrap();
        });
        assert_eq!(code, vec![Instruction::new(OpCode::Call, Register::L1 as i32, Register::CB as i32, 5)]);
    }

    #[test]
    fn equality_passes_operand_size() {
        let eq = RuntimeEntity::EqualityRoutine { primitive: Primitive::Eq };
        let (code, _) = run(|e| eq.encode_call(e, Frame::INITIAL.replace(4)).unwrap());
        assert_eq!(code[0], ins(OpCode::LoadL, 0, Register::CB, 2));
        assert_eq!(code[1].d, Primitive::Eq as i32);
    }

    #[test]
    fn identity_primitive_emits_nothing() {
        let id = RuntimeEntity::PrimitiveRoutine { primitive: Primitive::Id };
        let (code, _) = run(|e| id.encode_call(e, Frame::INITIAL).unwrap());
        assert!(code.is_empty());
    }

    #[test]
    fn constants_cannot_be_stored() {
        let (_, _) = run(|e| {
            let err = RuntimeEntity::KnownValue { size: 1, value: 0 }
                .encode_store(e, Frame::INITIAL, 1, VnameAddress::default())
                .unwrap_err();
            assert_eq!(err.operation, "store");
        });
    }

    #[test]
    fn displacement_past_word_range_is_restricted() {
        let var = RuntimeEntity::KnownAddress { size: 1, address: ObjectAddress::new(0, i32::MAX - 1) };
        let (code, reporter) = run(|e| {
            var.encode_fetch(e, Frame::INITIAL, 1, VnameAddress { offset: 5, indexed: false }).unwrap();
        });
        assert_eq!(code, vec![ins(OpCode::Load, 1, Register::SB, i32::MAX)]);
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn too_many_levels_out_is_restricted() {
        let (_, reporter) = run(|e| {
            let frame = (0..8).fold(Frame::INITIAL, |f, _| f.push(3));
            let reg = display_register(e, frame, ObjectAddress::new(1, 0));
            assert_eq!(reg, Register::L6);
        });
        assert_eq!(reporter.error_count(), 1);
    }
}
