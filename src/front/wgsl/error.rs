use super::lex::Token;
use super::number::NumberError;
use crate::{SourceLocation, Span};

use codespan_reporting::diagnostic::{Diagnostic as CodespanDiagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;

use std::fmt;

/// A rendered front-end diagnostic: one message with source labels.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub message: String,
    pub labels: Vec<(Span, String)>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn to_codespan(&self) -> CodespanDiagnostic<()> {
        let mut labels = Vec::with_capacity(self.labels.len());
        for (index, &(span, ref message)) in self.labels.iter().enumerate() {
            let range = span.to_range().unwrap_or(0..0);
            let label = if index == 0 {
                Label::primary((), range)
            } else {
                Label::secondary((), range)
            };
            labels.push(label.with_message(message.clone()));
        }
        CodespanDiagnostic::error()
            .with_message(self.message.clone())
            .with_labels(labels)
            .with_notes(self.notes.clone())
    }
}

/// The complete output of a failed parse: every diagnostic that was recorded.
///
/// The lexer and parser recover from errors and keep going, so a single run
/// can surface many of these.
#[derive(Clone, Debug)]
pub struct ParseError {
    diagnostics: Vec<Diagnostic>,
}

impl ParseError {
    pub(crate) fn new(diagnostics: Vec<Diagnostic>) -> Self {
        ParseError { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Find the source location of the first diagnostic.
    pub fn location(&self, source: &str) -> Option<SourceLocation> {
        let diagnostic = self.diagnostics.first()?;
        let &(span, _) = diagnostic.labels.first()?;
        Some(span.location(source))
    }

    /// Render all diagnostics with caret-underlined source excerpts.
    pub fn emit_to_string(&self, source: &str) -> String {
        let files = SimpleFile::new("wgsl", source);
        let config = term::Config::default();
        let mut writer = term::termcolor::NoColor::new(Vec::new());
        for diagnostic in &self.diagnostics {
            let _ = term::emit(&mut writer, &config, &files, &diagnostic.to_codespan());
        }
        String::from_utf8(writer.into_inner()).unwrap_or_default()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnostics.split_first() {
            Some((first, [])) => write!(f, "{}", first.message),
            Some((first, rest)) => {
                write!(f, "{} (and {} more errors)", first.message, rest.len())
            }
            None => write!(f, "parse error"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A non-fatal condition discovered while lowering.
#[derive(Clone, Debug)]
pub struct Warning {
    pub span: Span,
    pub kind: WarningKind,
}

#[derive(Clone, Debug)]
pub enum WarningKind {
    /// A local variable or binding is never read.
    UnusedVariable { name: String },
}

impl Warning {
    /// Render the warning with a caret-underlined source excerpt.
    pub fn emit_to_string(&self, source: &str) -> String {
        let files = SimpleFile::new("wgsl", source);
        let config = term::Config::default();
        let mut writer = term::termcolor::NoColor::new(Vec::new());
        let diagnostic = CodespanDiagnostic::warning()
            .with_message(self.to_string())
            .with_labels(vec![Label::primary(
                (),
                self.span.to_range().unwrap_or(0..0),
            )]);
        let _ = term::emit(&mut writer, &config, &files, &diagnostic);
        String::from_utf8(writer.into_inner()).unwrap_or_default()
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::UnusedVariable { ref name } => {
                write!(
                    f,
                    "unused variable `{}`: prefix the name with `_` to silence",
                    name
                )
            }
        }
    }
}

/// What the parser knew it needed when it hit an unexpected token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExpectedToken<'a> {
    Token(Token<'a>),
    Identifier,
    Integer,
    /// Beginning of an expression.
    PrimaryExpression,
    /// Beginning of a type declaration.
    TypeDecl,
    /// Beginning of a statement.
    Statement,
    /// Beginning of a global declaration.
    GlobalItem,
    /// A case value or `default` in a switch.
    SwitchItem,
}

impl<'a> fmt::Display for ExpectedToken<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ExpectedToken::Token(token) => write!(f, "{:?}", token),
            ExpectedToken::Identifier => write!(f, "identifier"),
            ExpectedToken::Integer => write!(f, "integer literal"),
            ExpectedToken::PrimaryExpression => write!(f, "expression"),
            ExpectedToken::TypeDecl => write!(f, "type declaration"),
            ExpectedToken::Statement => write!(f, "statement"),
            ExpectedToken::GlobalItem => write!(
                f,
                "global item (`struct`, `alias`, `const`, `var`, `fn`) or the end of the file"
            ),
            ExpectedToken::SwitchItem => write!(f, "case or default"),
        }
    }
}

/// An error produced while lexing, parsing or lowering WGSL.
#[derive(Clone, Debug)]
pub enum Error<'a> {
    Unexpected(Span, ExpectedToken<'a>),
    BadNumber(Span, NumberError),
    BadU32(Span),
    NegativeInt(Span),
    BadAccessor(Span, &'a str),
    UnknownIdent(Span, &'a str),
    UnknownScalarType(Span, &'a str),
    UnknownType(Span, &'a str),
    UnknownAttribute(Span, &'a str),
    UnknownBuiltin(Span, &'a str),
    UnknownAddressSpace(Span, &'a str),
    UnknownStorageFormat(Span, &'a str),
    UnknownAccessMode(Span, &'a str),
    Redefinition {
        previous: Span,
        current: Span,
        name: &'a str,
    },
    NotPointer(Span),
    NotReference(Span),
    InvalidAssignment(Span),
    ReservedIdentifier(Span, &'a str),
    TypeNotConstructible(Span),
    TypeNotInferrable(Span),
    InitializationTypeMismatch(Span, String, String),
    DeclMissingTypeAndInit(Span),
    MissingAttribute(&'static str, Span),
    InvalidAtomicPointer(Span),
    InvalidAtomicOperandType(Span),
    BadMatrixScalarKind(Span),
    NotCallable(Span, &'a str),
    CalledEntryPoint(Span),
    WrongArgumentCount {
        span: Span,
        expected: std::ops::Range<u32>,
        found: u32,
    },
    FunctionReturnsVoid(Span),
    ExpectedConstant(Span),
    ExpectedArraySize(Span),
    NonPositiveArrayLength(Span),
    InvalidImageExpression(Span),
    InvalidGatherComponent(Span),
    InvalidSwitchValue(Span),
    NotRepresentable(Span),
    InvalidResolve(Span, crate::proc::ResolveError),
    Internal(&'static str),
}

impl<'a> Error<'a> {
    pub(crate) fn as_diagnostic(&self) -> Diagnostic {
        match *self {
            Error::Unexpected(span, expected) => Diagnostic {
                message: format!("expected {}", expected),
                labels: vec![(span, format!("expected {}", expected))],
                notes: vec![],
            },
            Error::BadNumber(span, ref err) => Diagnostic {
                message: format!("invalid numeric literal: {}", err),
                labels: vec![(span, err.to_string())],
                notes: vec![],
            },
            Error::BadU32(span) => Diagnostic {
                message: "expected unsigned integer constant expression".to_string(),
                labels: vec![(span, "expected unsigned integer".to_string())],
                notes: vec![],
            },
            Error::NegativeInt(span) => Diagnostic {
                message: "expected non-negative integer constant expression".to_string(),
                labels: vec![(span, "expected non-negative integer".to_string())],
                notes: vec![],
            },
            Error::BadAccessor(span, accessor) => Diagnostic {
                message: format!("invalid field accessor `{}`", accessor),
                labels: vec![(span, "invalid accessor".to_string())],
                notes: vec![],
            },
            Error::UnknownIdent(span, ident) => Diagnostic {
                message: format!("no definition in scope for identifier: `{}`", ident),
                labels: vec![(span, "unknown identifier".to_string())],
                notes: vec![],
            },
            Error::UnknownScalarType(span, name) => Diagnostic {
                message: format!("unknown scalar type: `{}`", name),
                labels: vec![(span, "unknown scalar type".to_string())],
                notes: vec!["Valid scalar types are f32, f16, i32, u32, bool".to_string()],
            },
            Error::UnknownType(span, name) => Diagnostic {
                message: format!("unknown type: `{}`", name),
                labels: vec![(span, "unknown type".to_string())],
                notes: vec![],
            },
            Error::UnknownAttribute(span, name) => Diagnostic {
                message: format!("unknown attribute: `{}`", name),
                labels: vec![(span, "unknown attribute".to_string())],
                notes: vec![],
            },
            Error::UnknownBuiltin(span, name) => Diagnostic {
                message: format!("unknown builtin: `{}`", name),
                labels: vec![(span, "unknown builtin".to_string())],
                notes: vec![],
            },
            Error::UnknownAddressSpace(span, name) => Diagnostic {
                message: format!("unknown address space: `{}`", name),
                labels: vec![(span, "unknown address space".to_string())],
                notes: vec![],
            },
            Error::UnknownStorageFormat(span, name) => Diagnostic {
                message: format!("unknown storage format: `{}`", name),
                labels: vec![(span, "unknown storage format".to_string())],
                notes: vec![],
            },
            Error::UnknownAccessMode(span, name) => Diagnostic {
                message: format!("unknown access mode: `{}`", name),
                labels: vec![(span, "unknown access mode".to_string())],
                notes: vec![],
            },
            Error::Redefinition {
                previous,
                current,
                name,
            } => Diagnostic {
                message: format!("redefinition of `{}`", name),
                labels: vec![
                    (current, format!("redefinition of `{}`", name)),
                    (previous, format!("previous definition of `{}`", name)),
                ],
                notes: vec![],
            },
            Error::NotPointer(span) => Diagnostic {
                message: "the expression may only be indirected if it is a pointer".to_string(),
                labels: vec![(span, "expression is not a pointer".to_string())],
                notes: vec![],
            },
            Error::NotReference(span) => Diagnostic {
                message: "the expression should have been a reference".to_string(),
                labels: vec![(span, "expression is not a reference".to_string())],
                notes: vec![],
            },
            Error::InvalidAssignment(span) => Diagnostic {
                message: "invalid left-hand side of assignment".to_string(),
                labels: vec![(span, "cannot assign to this expression".to_string())],
                notes: vec![],
            },
            Error::ReservedIdentifier(span, name) => Diagnostic {
                message: format!("name `{}` is a reserved keyword", name),
                labels: vec![(span, "reserved identifier".to_string())],
                notes: vec![],
            },
            Error::TypeNotConstructible(span) => Diagnostic {
                message: "type is not constructible".to_string(),
                labels: vec![(span, "type is not constructible".to_string())],
                notes: vec![],
            },
            Error::TypeNotInferrable(span) => Diagnostic {
                message: "type can't be inferred".to_string(),
                labels: vec![(span, "consider annotating the type".to_string())],
                notes: vec![],
            },
            Error::InitializationTypeMismatch(span, ref expected, ref got) => Diagnostic {
                message: format!(
                    "the initializer was expected to have type {}, but got {}",
                    expected, got
                ),
                labels: vec![(span, format!("expected {} here", expected))],
                notes: vec![],
            },
            Error::DeclMissingTypeAndInit(span) => Diagnostic {
                message: "declaration is missing both type and initializer".to_string(),
                labels: vec![(span, "needs a type specifier or initializer".to_string())],
                notes: vec![],
            },
            Error::MissingAttribute(name, span) => Diagnostic {
                message: format!("missing attribute `{}`", name),
                labels: vec![(span, format!("missing attribute `{}`", name))],
                notes: vec![],
            },
            Error::InvalidAtomicPointer(span) => Diagnostic {
                message: "atomic operation is done on a pointer to a non-atomic".to_string(),
                labels: vec![(span, "atomic pointer is invalid".to_string())],
                notes: vec![],
            },
            Error::InvalidAtomicOperandType(span) => Diagnostic {
                message: "atomic operand type is inconsistent with the operation".to_string(),
                labels: vec![(span, "atomic operand type is invalid".to_string())],
                notes: vec![],
            },
            Error::BadMatrixScalarKind(span) => Diagnostic {
                message: "matrix element type must be floating-point".to_string(),
                labels: vec![(span, "must be floating-point".to_string())],
                notes: vec![],
            },
            Error::NotCallable(span, name) => Diagnostic {
                message: format!("`{}` is not a function", name),
                labels: vec![(span, "not callable".to_string())],
                notes: vec![],
            },
            Error::CalledEntryPoint(span) => Diagnostic {
                message: "entry point cannot be called".to_string(),
                labels: vec![(span, "entry point cannot be called".to_string())],
                notes: vec![],
            },
            Error::WrongArgumentCount {
                span,
                ref expected,
                found,
            } => Diagnostic {
                message: format!(
                    "wrong number of arguments: expected {}, found {}",
                    if expected.len() <= 1 {
                        format!("{}", expected.start)
                    } else {
                        format!("{}..{}", expected.start, expected.end)
                    },
                    found
                ),
                labels: vec![(span, "wrong number of arguments".to_string())],
                notes: vec![],
            },
            Error::FunctionReturnsVoid(span) => Diagnostic {
                message: "function does not return any value".to_string(),
                labels: vec![(span, "".to_string())],
                notes: vec![
                    "perhaps you meant to call the function in a separate statement?".to_string(),
                ],
            },
            Error::ExpectedConstant(span) => Diagnostic {
                message: "expected constant expression".to_string(),
                labels: vec![(span, "this expression is not a constant".to_string())],
                notes: vec![],
            },
            Error::ExpectedArraySize(span) => Diagnostic {
                message: "array element count must be an integer literal".to_string(),
                labels: vec![(span, "not an integer literal".to_string())],
                notes: vec![],
            },
            Error::NonPositiveArrayLength(span) => Diagnostic {
                message: "array element count must be positive".to_string(),
                labels: vec![(span, "must be positive".to_string())],
                notes: vec![],
            },
            Error::InvalidImageExpression(span) => Diagnostic {
                message: "invalid image expression".to_string(),
                labels: vec![(span, "not a valid image or sampler".to_string())],
                notes: vec![],
            },
            Error::InvalidGatherComponent(span) => Diagnostic {
                message: "gather component must be an integer literal in the range 0..4"
                    .to_string(),
                labels: vec![(span, "invalid gather component".to_string())],
                notes: vec![],
            },
            Error::InvalidSwitchValue(span) => Diagnostic {
                message: "invalid switch case value".to_string(),
                labels: vec![(span, "must be an integer literal".to_string())],
                notes: vec![],
            },
            Error::NotRepresentable(span) => Diagnostic {
                message: "value is not representable in the target type".to_string(),
                labels: vec![(span, "value out of range".to_string())],
                notes: vec![],
            },
            Error::InvalidResolve(span, ref err) => Diagnostic {
                message: err.to_string(),
                labels: vec![(span, "type resolution failed here".to_string())],
                notes: vec![],
            },
            Error::Internal(message) => Diagnostic {
                message: format!("internal: {}", message),
                labels: vec![],
                notes: vec![
                    "please file an issue with the shader that triggered this".to_string(),
                ],
            },
        }
    }
}
