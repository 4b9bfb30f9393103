//! Front end for consuming [WebGPU Shading Language][wgsl].
//!
//! The front end is split in three stages: the [lexer](lex) turns the source
//! bytes into spanned tokens, the [parser](parse) builds a spanned [AST](ast)
//! with panic-mode error recovery, and the [lowerer](lower) resolves names,
//! infers types and emits the IR.
//!
//! [wgsl]: https://gpuweb.github.io/gpuweb/wgsl/

mod ast;
mod conv;
mod error;
mod lex;
mod lower;
mod number;
mod parse;

pub use error::{Diagnostic, ParseError, Warning, WarningKind};

/// The result of a successful parse: the module plus any warnings that were
/// raised along the way.
#[derive(Debug)]
pub struct Parsed {
    pub module: crate::Module,
    pub warnings: Vec<Warning>,
}

/// WGSL front end.
pub struct Frontend {}

impl Frontend {
    pub fn new() -> Self {
        Frontend {}
    }

    /// Parse and lower a WGSL translation unit.
    pub fn parse(&mut self, source: &str) -> Result<Parsed, ParseError> {
        let mut parser = parse::Parser::new();
        let tu = parser
            .parse(source)
            .map_err(|errors| collect_errors(errors))?;
        let (module, warnings) = lower::Lowerer::new()
            .lower(&tu)
            .map_err(|errors| collect_errors(errors))?;
        log::debug!(
            "parsed module: {} types, {} functions, {} entry points",
            module.types.len(),
            module.functions.len(),
            module.entry_points.len()
        );
        Ok(Parsed { module, warnings })
    }
}

fn collect_errors(errors: Vec<error::Error<'_>>) -> ParseError {
    ParseError::new(errors.iter().map(|e| e.as_diagnostic()).collect())
}

/// Parse a WGSL string into a module.
pub fn parse_str(source: &str) -> Result<Parsed, ParseError> {
    Frontend::new().parse(source)
}

#[cfg(test)]
mod tests {
    use super::parse_str;

    #[test]
    fn parse_types() {
        assert!(parse_str("const a : i32 = 2;").is_ok());
        assert!(parse_str("const a : x32 = 2;").is_err());
        assert!(parse_str("var t: texture_2d<f32>;").is_ok());
        assert!(parse_str("var t: texture_3d<x>;").is_err());
    }

    #[test]
    fn parse_struct() {
        let source = "
            struct Foo { x: i32, y: f32 }
            struct Bar {
                @builtin(position) position: vec4<f32>,
                @location(0) color: vec4<f32>,
            }
        ";
        parse_str(source).unwrap();
    }

    #[test]
    fn parse_expressions() {
        let source = "
            fn check() -> f32 {
                let x = 1.0 + 2.0 * 3.0;
                let y = vec2<f32>(x, -x).y;
                return clamp(y, 0.0, 1.0);
            }
        ";
        parse_str(source).unwrap();
    }

    #[test]
    fn parse_forward_function_reference() {
        let source = "
            fn caller() -> f32 {
                return callee();
            }
            fn callee() -> f32 {
                return 1.0;
            }
        ";
        parse_str(source).unwrap();
    }

    #[test]
    fn reports_multiple_errors() {
        // both statements are syntax errors; recovery carries the parser
        // from the first to the second
        let source = "
            fn one() {
                let x = ;
                let y = @;
            }
        ";
        let error = parse_str(source).unwrap_err();
        assert!(error.diagnostics().len() >= 2);
    }

    #[test]
    fn unused_variable_warning() {
        let source = "
            fn unused() {
                var foo: i32 = 1;
            }
        ";
        let parsed = parse_str(source).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        let rendered = parsed.warnings[0].emit_to_string(source);
        assert!(rendered.contains("foo"));

        // the underscore prefix opts out
        let source = "
            fn unused() {
                var _foo: i32 = 1;
            }
        ";
        let parsed = parse_str(source).unwrap();
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn error_location() {
        let source = "fn f() {\n    oops();\n}\n";
        let error = parse_str(source).unwrap_err();
        let location = error.location(source).unwrap();
        assert_eq!(location.line_number, 2);
        let rendered = error.emit_to_string(source);
        assert!(rendered.contains("oops"));
    }

    #[test]
    fn parse_loop_with_break_if() {
        let source = "
            fn looper() {
                var i: i32 = 0;
                loop {
                    continuing {
                        i = i + 1;
                        break if i >= 10;
                    }
                }
                while i > 0 {
                    i = i - 1;
                }
                for (var j = 0; j < 4; j = j + 1) {
                    i = i + j;
                }
            }
        ";
        parse_str(source).unwrap();
    }

    #[test]
    fn parse_switch() {
        let source = "
            fn switcher(x: i32) -> i32 {
                var value: i32 = 0;
                switch x {
                    case 0: { value = 1; }
                    case 1, 2: { value = 2; }
                    default: { value = 3; }
                }
                return value;
            }
        ";
        parse_str(source).unwrap();
    }
}
