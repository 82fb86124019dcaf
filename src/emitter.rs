use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ErrorReporter;
use crate::machine::{self, Instruction, OpCode, Primitive, Register};

/// Append-only code store with patching of earlier jump targets.
pub struct Emitter<'r> {
    code: Vec<Instruction>,
    reporter: &'r mut ErrorReporter,
    overflowed: bool,
    out_of_range: bool,
}

impl<'r> Emitter<'r> {
    pub fn new(reporter: &'r mut ErrorReporter) -> Self {
        Self {
            code: Vec::new(),
            reporter,
            overflowed: false,
            out_of_range: false,
        }
    }

    /// Address the next emitted instruction will occupy.
    pub fn next_instr_addr(&self) -> i32 {
        machine::CB + i32::try_from(self.code.len()).unwrap_or(i32::MAX)
    }

    /// Append one instruction and return its address. Past the end of the
    /// code store the instruction is dropped and a restriction reported once.
    pub fn emit(&mut self, op: OpCode, n: i32, r: Register, d: i32) -> i32 {
        let addr = self.next_instr_addr();
        let n = if n > machine::MAX_OPERAND_SIZE {
            self.report_restriction("length of operand can't exceed 255 words");
            machine::MAX_OPERAND_SIZE
        } else {
            n
        };
        if addr >= machine::PB {
            if !self.overflowed {
                self.overflowed = true;
                self.report_restriction("too many instructions for code segment");
            }
            return addr;
        }
        self.code.push(Instruction::new(op, n, r as i32, d));
        addr
    }

    /// Shorthand for instructions that ignore the register field.
    pub fn emit_nd(&mut self, op: OpCode, n: i32, d: i32) -> i32 {
        self.emit(op, n, Register::CB, d)
    }

    pub fn emit_primitive_call(&mut self, primitive: Primitive) -> i32 {
        self.emit(OpCode::Call, Register::SB as i32, Register::PB, primitive as i32)
    }

    /// Point the jump at `addr` to the next instruction.
    pub fn patch(&mut self, addr: i32) {
        let target = self.next_instr_addr();
        let slot = usize::try_from(addr - machine::CB)
            .ok()
            .and_then(|i| self.code.get_mut(i));
        if let Some(ins) = slot {
            ins.d = target;
        }
    }

    pub fn report_restriction(&mut self, message: &str) {
        self.reporter.report_restriction(message);
    }

    /// A size or address no longer fits a machine word. Reported once.
    pub fn report_out_of_range(&mut self) {
        if !self.out_of_range {
            self.out_of_range = true;
            self.report_restriction("data too large to address");
        }
    }

    pub fn reporter(&mut self) -> &mut ErrorReporter {
        &mut *self.reporter
    }

    pub fn finish(self) -> ObjectProgram {
        ObjectProgram {
            instructions: self.code,
        }
    }
}

// ── Object program ─────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ObjectFileError {
    #[error("cannot write object file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot render listing: {0}")]
    Listing(#[from] serde_json::Error),
}

/// The encoder's output: TAM code to be loaded at CB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectProgram {
    pub instructions: Vec<Instruction>,
}

#[derive(Serialize)]
struct ListingEntry<'a> {
    address: usize,
    #[serde(flatten)]
    instruction: &'a Instruction,
    text: String,
}

impl ObjectProgram {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.instructions.iter().flat_map(Instruction::to_bytes).collect()
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()
    }

    pub fn save(&self, path: &Path) -> Result<(), ObjectFileError> {
        let file = std::fs::File::create(path).map_err(|source| ObjectFileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(io::BufWriter::new(file))
            .map_err(|source| ObjectFileError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// One instruction per line, prefixed by its code address.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (addr, ins) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{addr:>4}: {ins}");
        }
        out
    }

    pub fn listing_json(&self) -> Result<String, ObjectFileError> {
        let entries: Vec<ListingEntry<'_>> = self
            .instructions
            .iter()
            .enumerate()
            .map(|(address, instruction)| ListingEntry {
                address,
                instruction,
                text: instruction.to_string(),
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn patch_targets_next_instruction() {
        let mut reporter = ErrorReporter::new();
        let mut emitter = Emitter::new(&mut reporter);
        let jump = emitter.emit(OpCode::Jump, 0, Register::CB, 0);
        emitter.emit_nd(OpCode::LoadL, 0, 7);
        emitter.patch(jump);
        emitter.emit_nd(OpCode::Halt, 0, 0);
        let program = emitter.finish();
        assert_eq!(program.instructions[0].d, 2);
        assert_eq!(program.len(), 3);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn code_store_overflow_reported_once() {
        let mut reporter = ErrorReporter::new();
        let mut emitter = Emitter::new(&mut reporter);
        for _ in 0..(machine::PB + 10) {
            emitter.emit_nd(OpCode::LoadL, 0, 1);
        }
        let program = emitter.finish();
        assert_eq!(program.len(), machine::PB as usize);
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.errors()[0].message(), "too many instructions for code segment");
    }

    #[test]
    fn out_of_range_reported_once() {
        let mut reporter = ErrorReporter::new();
        let mut emitter = Emitter::new(&mut reporter);
        emitter.report_out_of_range();
        emitter.report_out_of_range();
        emitter.finish();
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.errors()[0].message(), "data too large to address");
    }

    #[test]
    fn oversized_operand_is_clamped() {
        let mut reporter = ErrorReporter::new();
        let mut emitter = Emitter::new(&mut reporter);
        emitter.emit(OpCode::Load, 300, Register::SB, 0);
        let program = emitter.finish();
        assert_eq!(program.instructions[0].n, 255);
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn bytes_and_listing() {
        let program = ObjectProgram {
            instructions: vec![
                Instruction::new(OpCode::LoadL, 0, 0, 3),
                Instruction::new(OpCode::Halt, 0, 0, 0),
            ],
        };
        let mut buf = Vec::new();
        program.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 32);
        assert_eq!(buf[3], 3);
        assert_eq!(buf[15], 3);
        assert_eq!(program.listing(), "   0: LOADL  3\n   1: HALT\n");
        let json: serde_json::Value = serde_json::from_str(&program.listing_json().unwrap()).unwrap();
        assert_eq!(json[1]["op"], "Halt");
        assert_eq!(json[0]["d"], 3);
    }
}
