//! Diagnostics: coded errors and warnings with spans, hints, and suggestions.
//!
//! Every phase reports into one `Diagnostics` bag per compilation. No phase
//! throws on user error; the pipeline inspects `has_errors` between phases.

use crate::span::SourceSpan;

/// Stable diagnostic codes. Codes never change meaning between releases;
/// editor integrations and test suites match on them.
pub mod codes {
    pub const UNTERMINATED_STRING: &str = "E0001";
    pub const UNTERMINATED_BLOCK_COMMENT: &str = "E0002";
    pub const UNEXPECTED_CHARACTER: &str = "E0003";
    pub const UNEXPECTED_TOKEN: &str = "E0010";
    pub const PUB_WITHOUT_LET: &str = "E0011";
    pub const INVALID_SYNC_MODE: &str = "E0012";
    pub const TYPE_MISMATCH: &str = "E0040";
    pub const UNDEFINED_VARIABLE: &str = "E0070";
    pub const EVENT_DEFINITION: &str = "E0071";
    pub const RECURSION: &str = "E0100";
    pub const BREAK_OUTSIDE_LOOP: &str = "E0101";
    pub const CONTINUE_OUTSIDE_LOOP: &str = "E0102";
    pub const NO_MATCHING_OVERLOAD: &str = "E0130";
    pub const PROPERTY_NOT_WRITABLE: &str = "E0131";
    pub const ENUM_VALUE_NOT_FOUND: &str = "E0132";
    pub const UNKNOWN_EVENT: &str = "W0010";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Convert to LSP DiagnosticSeverity number.
    pub fn to_lsp_severity(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub span: SourceSpan,
    /// Optional multi-line elaboration, e.g. a candidate-overload listing or a
    /// "did you mean" suggestion.
    pub hint: Option<String>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}: {}[{}]: {}",
            self.span, severity, self.code, self.message
        )?;
        if let Some(hint) = &self.hint {
            for line in hint.lines() {
                write!(f, "\n  {}", line)?;
            }
        }
        Ok(())
    }
}

/// The per-compilation diagnostic bag.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>, span: SourceSpan) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            hint: None,
        });
    }

    pub fn error_with_hint(
        &mut self,
        code: &'static str,
        message: impl Into<String>,
        span: SourceSpan,
        hint: impl Into<String>,
    ) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            hint: Some(hint.into()),
        });
    }

    pub fn warning(&mut self, code: &'static str, message: impl Into<String>, span: SourceSpan) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span,
            hint: None,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }
}

/// Format all diagnostics for CLI output, one (possibly hinted) entry per line
/// group.
pub fn format_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut out = String::new();
    for d in diagnostics.iter() {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SourceSpan;

    #[test]
    fn bag_tracks_error_presence() {
        let mut bag = Diagnostics::new();
        assert!(!bag.has_errors());
        bag.warning(
            codes::UNKNOWN_EVENT,
            "unknown event 'Frobnicate'",
            SourceSpan::at("t.nori", 1, 4),
        );
        assert!(!bag.has_errors());
        assert_eq!(bag.len(), 1);
        bag.error(
            codes::UNDEFINED_VARIABLE,
            "undefined variable 'x'",
            SourceSpan::at("t.nori", 2, 1),
        );
        assert!(bag.has_errors());
    }

    #[test]
    fn display_includes_code_and_hint() {
        let mut bag = Diagnostics::new();
        bag.error_with_hint(
            codes::UNDEFINED_VARIABLE,
            "undefined variable 'scroe'",
            SourceSpan::at("game.nori", 3, 18),
            "did you mean 'score'?",
        );
        let text = format_diagnostics(&bag);
        assert!(text.contains("game.nori:3:18: error[E0070]: undefined variable 'scroe'"));
        assert!(text.contains("did you mean 'score'?"));
    }
}
