#[allow(
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::single_match_else,
)]
pub mod ast;
pub mod config;
#[allow(
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::needless_pass_by_value,
)]
pub mod emitter;
#[allow(
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
)]
pub mod encoder;
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub mod entity;
pub mod error;
#[allow(
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
)]
pub mod checker;
#[allow(clippy::wildcard_imports, clippy::single_match_else)]
pub mod folder;
pub mod frame;
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub mod machine;
#[allow(
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
)]
pub mod parser;
#[allow(
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
)]
pub mod scanner;
pub mod std_env;
pub mod symbols;

use ast::Program;
use config::CompileOptions;
use emitter::ObjectProgram;
use error::{CompileError, ErrorReporter};
use std_env::StdEnvironment;

/// Compile Triangle source text into a TAM object program.
///
/// Runs every pass in order: scan/parse → check → fold (if enabled) →
/// encode. Restrictions count as errors, so a degraded program is never
/// returned as a success.
pub fn compile_source(
    source: &str,
    options: &CompileOptions,
) -> Result<ObjectProgram, Vec<CompileError>> {
    let mut compiler = Compiler::new(*options);
    let Some(mut program) = compiler.parse(source) else {
        return Err(compiler.into_errors());
    };
    if !compiler.check(&mut program) {
        return Err(compiler.into_errors());
    }
    if compiler.options().folding {
        compiler.fold(&mut program);
    }
    let object = compiler.encode(&program);
    if compiler.reporter().has_errors() {
        return Err(compiler.into_errors());
    }
    Ok(object)
}

// ── Staged driver ────────────────────────────────────────────────

/// One compilation, run a pass at a time so a caller can inspect the tree
/// between passes. Each pass reports into the same [`ErrorReporter`].
pub struct Compiler {
    options: CompileOptions,
    std_env: StdEnvironment,
    reporter: ErrorReporter,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            std_env: StdEnvironment::new(),
            reporter: ErrorReporter::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Syntactic analysis. `None` after a syntax error.
    pub fn parse(&mut self, source: &str) -> Option<Program> {
        tracing::info!("syntactic analysis");
        parser::parse(source, &mut self.reporter)
    }

    /// Contextual analysis. Returns true when the program is free of errors
    /// and code generation may proceed.
    pub fn check(&mut self, program: &mut Program) -> bool {
        if self.reporter.has_errors() {
            return false;
        }
        tracing::info!("contextual analysis");
        let declarations = checker::check(program, &self.std_env, &mut self.reporter);
        tracing::debug!(bindings = declarations.len(), "bindings created");
        !self.reporter.has_errors()
    }

    /// Constant folding; returns the number of expressions folded.
    pub fn fold(&mut self, program: &mut Program) -> usize {
        if self.reporter.has_errors() {
            return 0;
        }
        tracing::info!("constant folding");
        folder::fold_constants(program, &self.std_env)
    }

    /// Code generation. Any restriction it hits is left in the reporter.
    pub fn encode(&mut self, program: &Program) -> ObjectProgram {
        tracing::info!("code generation");
        encoder::encode(program, &self.std_env, &mut self.reporter, self.options.show_table)
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    pub fn into_errors(self) -> Vec<CompileError> {
        self.reporter.into_errors()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn messages(source: &str) -> Vec<String> {
        compile_source(source, &CompileOptions::default())
            .unwrap_err()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn compiles_a_complete_program() {
        let source = "\
            ! factorial\n\
            let\n\
              var n: Integer;\n\
              func fact(k: Integer): Integer ~\n\
                if k <= 1 then 1 else k * fact(k - 1)\n\
            in begin\n\
              getint(var n);\n\
              putint(fact(n)); puteol()\n\
            end\n";
        let object = compile_source(source, &CompileOptions::default()).unwrap();
        assert_eq!(object.instructions.last().unwrap().op, machine::OpCode::Halt);
        assert_eq!(object.to_bytes().len(), object.len() * machine::INSTRUCTION_BYTES);
    }

    #[test]
    fn duplicate_declaration_reported_once() {
        let errors = messages("let var a: Integer; var a: Integer in a := 1");
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("identifier \"a\" already declared"));
    }

    #[test]
    fn undeclared_identifier_reported_once() {
        let errors = messages("let var x: Integer in x := y + 1 * 2");
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("\"y\" is not declared"));
    }

    #[test]
    fn syntax_error_stops_before_checking() {
        let errors = compile_source("let var x: Integer x := undefined", &CompileOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Syntax);
    }

    #[test]
    fn restricted_program_is_not_a_success() {
        let mut source = String::from("puteol()");
        for level in (1..=8).rev() {
            source = format!("let proc p{level}() ~ {source} in p{level}()");
        }
        let errors = compile_source(&source, &CompileOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Restriction);
    }

    #[test]
    fn oversized_data_is_a_restriction() {
        for source in [
            "let var a: array 2000000000 of Integer; var b: array 2000000000 of Integer in puteol()",
            "let var a: array 3 of array 2 of Integer in a[2000000000][0] := 1",
        ] {
            let errors = compile_source(source, &CompileOptions::default()).unwrap_err();
            assert_eq!(errors.len(), 1, "{source}: {errors:?}");
            assert_eq!(errors[0].kind, ErrorKind::Restriction);
            assert!(errors[0].to_string().contains("data too large to address"));
        }
    }

    #[test]
    fn non_ascii_identifier_is_a_syntax_error() {
        let errors = compile_source("let var \u{e9}: Integer in \u{e9} := 1", &CompileOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Syntax);
    }

    #[test]
    fn staged_compiler_allows_inspection_between_passes() {
        let mut compiler = Compiler::new(CompileOptions {
            folding: true,
            show_table: true,
        });
        let mut program = compiler.parse("let const k ~ 2 * 21 in putint(k)").unwrap();
        assert!(compiler.check(&mut program));
        assert_eq!(compiler.fold(&mut program), 1);
        let object = compiler.encode(&program);
        assert!(!compiler.reporter().has_errors());
        let text: Vec<String> = object.instructions.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["LOADL  42", "CALL   putint", "HALT"]);
    }

    #[test]
    fn later_passes_refuse_after_errors() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let mut program = compiler.parse("putint(undeclared)").unwrap();
        assert!(!compiler.check(&mut program));
        assert_eq!(compiler.fold(&mut program), 0);
        assert_eq!(compiler.into_errors().len(), 1);
    }
}
