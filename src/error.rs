use crate::ast::SourcePosition;

/// A compilation diagnostic: a message template with one `%` slot, the
/// spelling substituted into it, and where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub template: String,
    pub token: String,
    pub position: SourcePosition,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lexical and grammatical errors. Fatal for the compilation.
    Syntax,
    Semantic,
    /// A machine limit was exceeded; code generation carried on.
    Restriction,
    /// A pass found the tree in a state an earlier pass should have ruled out.
    Internal,
}

impl CompileError {
    pub fn syntax(
        template: impl Into<String>,
        token: impl Into<String>,
        position: SourcePosition,
    ) -> Self {
        Self {
            template: template.into(),
            token: token.into(),
            position,
            kind: ErrorKind::Syntax,
        }
    }

    pub fn semantic(
        template: impl Into<String>,
        token: impl Into<String>,
        position: SourcePosition,
    ) -> Self {
        Self {
            template: template.into(),
            token: token.into(),
            position,
            kind: ErrorKind::Semantic,
        }
    }

    pub fn restriction(message: impl Into<String>) -> Self {
        Self {
            template: message.into(),
            token: String::new(),
            position: SourcePosition::default(),
            kind: ErrorKind::Restriction,
        }
    }

    pub fn internal(
        template: impl Into<String>,
        token: impl Into<String>,
        position: SourcePosition,
    ) -> Self {
        Self {
            template: template.into(),
            token: token.into(),
            position,
            kind: ErrorKind::Internal,
        }
    }

    /// The template with its first `%` replaced by the offending spelling.
    pub fn message(&self) -> String {
        match self.template.split_once('%') {
            Some((before, after)) => format!("{before}{}{after}", self.token),
            None => self.template.clone(),
        }
    }

    /// Format the error with the offending source line quoted.
    pub fn format_with_source(&self, source: &str) -> String {
        let line = self.position.start as usize;
        match source.lines().nth(line.saturating_sub(1)) {
            Some(text) if self.kind != ErrorKind::Restriction && line > 0 => {
                format!("{self}\n {line:>4} | {}", text.trim_end())
            }
            _ => self.to_string(),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ErrorKind::Restriction => write!(f, "RESTRICTION: {}", self.message()),
            ErrorKind::Internal => write!(f, "INTERNAL: {} {}", self.message(), self.position),
            ErrorKind::Syntax | ErrorKind::Semantic => {
                write!(f, "ERROR: {} {}", self.message(), self.position)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Accumulates diagnostics across every pass of one compilation.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    errors: Vec<CompileError>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: CompileError) {
        match error.kind {
            ErrorKind::Restriction => tracing::warn!("{error}"),
            _ => tracing::debug!("{error}"),
        }
        self.errors.push(error);
    }

    pub fn report_error(&mut self, template: &str, token: &str, position: SourcePosition) {
        self.report(CompileError::semantic(template, token, position));
    }

    pub fn report_restriction(&mut self, message: &str) {
        self.report(CompileError::restriction(message));
    }

    /// Restrictions count too: a restricted program is not a successful compile.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<CompileError> {
        self.errors
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_token_into_template() {
        let e = CompileError::semantic("\"%\" is not declared", "x", SourcePosition::new(3, 3));
        assert_eq!(e.message(), "\"x\" is not declared");
        assert_eq!(e.to_string(), "ERROR: \"x\" is not declared 3..3");
    }

    #[test]
    fn restriction_has_no_position() {
        let e = CompileError::restriction("can't nest routines more than 7 deep");
        assert_eq!(e.to_string(), "RESTRICTION: can't nest routines more than 7 deep");
    }

    #[test]
    fn quotes_source_line() {
        let e = CompileError::syntax("\"%\" expected here", ";", SourcePosition::new(2, 2));
        let shown = e.format_with_source("let var x: Integer\nin x := 1 2\n");
        assert!(shown.ends_with("2 | in x := 1 2"));
    }

    #[test]
    fn reporter_counts_everything() {
        let mut reporter = ErrorReporter::new();
        reporter.report_error("%", "a", SourcePosition::default());
        reporter.report_restriction("too many instructions for code segment");
        assert_eq!(reporter.error_count(), 2);
        assert_eq!(reporter.errors()[1].kind, ErrorKind::Restriction);
    }
}
