//! TAM (Triangle Abstract Machine) definitions: instruction format,
//! registers, primitive routines, and data representation.

use std::fmt;

use serde::Serialize;

// ── Data representation ────────────────────────────────────────────

pub const BOOLEAN_SIZE: i32 = 1;
pub const CHARACTER_SIZE: i32 = 1;
pub const INTEGER_SIZE: i32 = 1;
pub const ADDRESS_SIZE: i32 = 1;
/// Static link plus code address.
pub const CLOSURE_SIZE: i32 = 2 * ADDRESS_SIZE;
/// Static link, dynamic link, return address.
pub const LINK_DATA_SIZE: i32 = 3 * ADDRESS_SIZE;

pub const FALSE_REP: i32 = 0;
pub const TRUE_REP: i32 = 1;
pub const MAXINT_REP: i32 = 32767;

/// Routines may be nested at most this many levels deep.
pub const MAX_ROUTINE_LEVEL: usize = 7;

/// Largest `n` operand: the most words one LOAD/STORE/RETURN can move.
pub const MAX_OPERAND_SIZE: i32 = 255;

/// Code store base. Code occupies addresses `CB..PB`.
pub const CB: i32 = 0;
/// Primitive routine base, which is also the code store limit.
pub const PB: i32 = 1024;

// ── Instruction fields ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum OpCode {
    Load = 0,
    LoadA = 1,
    LoadI = 2,
    LoadL = 3,
    Store = 4,
    StoreI = 5,
    Call = 6,
    CallI = 7,
    Return = 8,
    Push = 10,
    Pop = 11,
    Jump = 12,
    JumpI = 13,
    JumpIf = 14,
    Halt = 15,
}

impl OpCode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Load => "LOAD",
            OpCode::LoadA => "LOADA",
            OpCode::LoadI => "LOADI",
            OpCode::LoadL => "LOADL",
            OpCode::Store => "STORE",
            OpCode::StoreI => "STOREI",
            OpCode::Call => "CALL",
            OpCode::CallI => "CALLI",
            OpCode::Return => "RETURN",
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Jump => "JUMP",
            OpCode::JumpI => "JUMPI",
            OpCode::JumpIf => "JUMPIF",
            OpCode::Halt => "HALT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(i32)]
pub enum Register {
    CB = 0,
    CT = 1,
    PB = 2,
    PT = 3,
    SB = 4,
    ST = 5,
    HB = 6,
    HT = 7,
    LB = 8,
    L1 = 9,
    L2 = 10,
    L3 = 11,
    L4 = 12,
    L5 = 13,
    L6 = 14,
    CP = 15,
}

impl Register {
    /// Display register reaching `levels_out` static levels beyond LB.
    /// Callers keep `levels_out` within 0..=6.
    pub fn local(levels_out: usize) -> Register {
        match levels_out {
            0 => Register::LB,
            1 => Register::L1,
            2 => Register::L2,
            3 => Register::L3,
            4 => Register::L4,
            5 => Register::L5,
            _ => Register::L6,
        }
    }

    fn from_number(n: i32) -> Option<Register> {
        let r = match n {
            0 => Register::CB,
            1 => Register::CT,
            2 => Register::PB,
            3 => Register::PT,
            4 => Register::SB,
            5 => Register::ST,
            6 => Register::HB,
            7 => Register::HT,
            8 => Register::LB,
            9 => Register::L1,
            10 => Register::L2,
            11 => Register::L3,
            12 => Register::L4,
            13 => Register::L5,
            14 => Register::L6,
            15 => Register::CP,
            _ => return None,
        };
        Some(r)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Primitive routines, addressed as displacements from PB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum Primitive {
    Id = 1,
    Not = 2,
    And = 3,
    Or = 4,
    Succ = 5,
    Pred = 6,
    Neg = 7,
    Add = 8,
    Sub = 9,
    Mult = 10,
    Div = 11,
    Mod = 12,
    Lt = 13,
    Le = 14,
    Ge = 15,
    Gt = 16,
    Eq = 17,
    Ne = 18,
    Eol = 19,
    Eof = 20,
    Get = 21,
    Put = 22,
    GetEol = 23,
    PutEol = 24,
    GetInt = 25,
    PutInt = 26,
    New = 27,
    Dispose = 28,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Id => "id",
            Primitive::Not => "not",
            Primitive::And => "and",
            Primitive::Or => "or",
            Primitive::Succ => "succ",
            Primitive::Pred => "pred",
            Primitive::Neg => "neg",
            Primitive::Add => "add",
            Primitive::Sub => "sub",
            Primitive::Mult => "mult",
            Primitive::Div => "div",
            Primitive::Mod => "mod",
            Primitive::Lt => "lt",
            Primitive::Le => "le",
            Primitive::Ge => "ge",
            Primitive::Gt => "gt",
            Primitive::Eq => "eq",
            Primitive::Ne => "ne",
            Primitive::Eol => "eol",
            Primitive::Eof => "eof",
            Primitive::Get => "get",
            Primitive::Put => "put",
            Primitive::GetEol => "geteol",
            Primitive::PutEol => "puteol",
            Primitive::GetInt => "getint",
            Primitive::PutInt => "putint",
            Primitive::New => "new",
            Primitive::Dispose => "dispose",
        }
    }

    fn from_displacement(d: i32) -> Option<Primitive> {
        const ALL: [Primitive; 28] = [
            Primitive::Id, Primitive::Not, Primitive::And, Primitive::Or,
            Primitive::Succ, Primitive::Pred, Primitive::Neg, Primitive::Add,
            Primitive::Sub, Primitive::Mult, Primitive::Div, Primitive::Mod,
            Primitive::Lt, Primitive::Le, Primitive::Ge, Primitive::Gt,
            Primitive::Eq, Primitive::Ne, Primitive::Eol, Primitive::Eof,
            Primitive::Get, Primitive::Put, Primitive::GetEol, Primitive::PutEol,
            Primitive::GetInt, Primitive::PutInt, Primitive::New, Primitive::Dispose,
        ];
        ALL.iter().copied().find(|p| *p as i32 == d)
    }
}

// ── Instructions ───────────────────────────────────────────────────

/// One TAM instruction. `n` is a size or a static-link register number,
/// `r` a register number, `d` a displacement or literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub op: OpCode,
    pub r: i32,
    pub n: i32,
    pub d: i32,
}

/// Bytes per serialized instruction: four big-endian 32-bit fields.
pub const INSTRUCTION_BYTES: usize = 16;

impl Instruction {
    pub fn new(op: OpCode, n: i32, r: i32, d: i32) -> Self {
        Self { op, r, n, d }
    }

    /// Object file encoding: op, r, n, d in that order.
    pub fn to_bytes(&self) -> [u8; INSTRUCTION_BYTES] {
        let mut out = [0u8; INSTRUCTION_BYTES];
        let fields = [self.op as i32, self.r, self.n, self.d];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
        out
    }

    fn register(&self) -> String {
        Register::from_number(self.r).map_or_else(|| self.r.to_string(), |r| r.to_string())
    }
}

/// TAM assembler notation, e.g. `LOAD (1) 3[LB]` or `CALL putint`.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.op.mnemonic();
        match self.op {
            OpCode::Load | OpCode::Store => {
                write!(f, "{m:<7}({}) {}[{}]", self.n, self.d, self.register())
            }
            OpCode::LoadA => write!(f, "{m:<7}{}[{}]", self.d, self.register()),
            OpCode::LoadI | OpCode::StoreI => write!(f, "{m:<7}({})", self.n),
            OpCode::LoadL | OpCode::Push => write!(f, "{m:<7}{}", self.d),
            OpCode::Call => {
                let link = Register::from_number(self.n)
                    .map_or_else(|| self.n.to_string(), |r| r.to_string());
                if self.r == Register::PB as i32 {
                    match Primitive::from_displacement(self.d) {
                        Some(p) => write!(f, "{m:<7}{}", p.name()),
                        None => write!(f, "{m:<7}({link}) {}[PB]", self.d),
                    }
                } else {
                    write!(f, "{m:<7}({link}) {}[{}]", self.d, self.register())
                }
            }
            OpCode::CallI | OpCode::Halt => write!(f, "{m}"),
            OpCode::Return | OpCode::Pop => write!(f, "{m:<7}({}) {}", self.n, self.d),
            OpCode::Jump | OpCode::JumpI => write!(f, "{m:<7}{}[{}]", self.d, self.register()),
            OpCode::JumpIf => write!(f, "{m:<7}({}) {}[{}]", self.n, self.d, self.register()),
        }
    }
}
