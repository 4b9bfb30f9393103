//! Recursive-descent WGSL parser with panic-mode error recovery.

use super::ast;
use super::conv;
use super::error::{Error, ExpectedToken};
use super::lex::{Lexer, Token};
use super::number::Number;
use crate::Span;

/// Map a compound-assignment token back to the binary operation it applies.
fn map_assignment_op(c: char) -> Option<crate::BinaryOperator> {
    use crate::BinaryOperator as Bo;
    Some(match c {
        '+' => Bo::Add,
        '-' => Bo::Subtract,
        '*' => Bo::Multiply,
        '/' => Bo::Divide,
        '%' => Bo::Modulo,
        '&' => Bo::And,
        '|' => Bo::InclusiveOr,
        '^' => Bo::ExclusiveOr,
        '<' => Bo::ShiftLeft,
        '>' => Bo::ShiftRight,
        _ => return None,
    })
}

/// Left-associative binary operator parsing, parameterized over the token
/// classifier of one precedence level and the parser of the next one.
fn parse_binary_op<'a>(
    lexer: &mut Lexer<'a>,
    classifier: impl Fn(Token<'a>) -> Option<crate::BinaryOperator>,
    mut parser: impl FnMut(&mut Lexer<'a>) -> Result<ast::Expression<'a>, Error<'a>>,
) -> Result<ast::Expression<'a>, Error<'a>> {
    let mut left = parser(lexer)?;
    while let Some(op) = classifier(lexer.peek().0) {
        let _ = lexer.next();
        let right = parser(lexer)?;
        let span = left.span.until(&right.span);
        left = ast::Expression {
            kind: ast::ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        };
    }
    Ok(left)
}

/// Attributes collected in front of a declaration.
#[derive(Default)]
struct ParsedAttributes<'a> {
    stage: Option<(crate::ShaderStage, Span)>,
    workgroup_size: Option<[u32; 3]>,
    group: Option<u32>,
    binding: Option<u32>,
    io: Option<ast::Binding<'a>>,
}

pub struct Parser<'a> {
    errors: Vec<Error<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new() -> Self {
        Parser { errors: Vec::new() }
    }

    /// Parse a translation unit, accumulating errors.
    ///
    /// On a syntax error the parser records the diagnostic, skips ahead to a
    /// synchronisation point and keeps going, so a single run reports as many
    /// errors as possible.
    pub fn parse(&mut self, source: &'a str) -> Result<ast::TranslationUnit<'a>, Vec<Error<'a>>> {
        self.errors.clear();
        let mut lexer = Lexer::new(source);
        let mut decls = Vec::new();
        loop {
            match self.parse_global_decl(&mut lexer) {
                Ok(Some(decl)) => decls.push(decl),
                Ok(None) => break,
                Err(error) => {
                    self.errors.push(error);
                    synchronize_global(&mut lexer);
                }
            }
        }
        if self.errors.is_empty() {
            Ok(ast::TranslationUnit { decls })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn parse_attributes(&mut self, lexer: &mut Lexer<'a>) -> Result<ParsedAttributes<'a>, Error<'a>> {
        let mut attributes = ParsedAttributes::default();
        while lexer.skip(Token::Attribute) {
            let (name, name_span) = lexer.next_ident_with_span()?;
            match name {
                "vertex" => {
                    attributes.stage = Some((crate::ShaderStage::Vertex, name_span));
                }
                "fragment" => {
                    attributes.stage = Some((crate::ShaderStage::Fragment, name_span));
                }
                "compute" => {
                    attributes.stage = Some((crate::ShaderStage::Compute, name_span));
                }
                "workgroup_size" => {
                    lexer.expect(Token::Paren('('))?;
                    let mut size = [1u32; 3];
                    for (i, component) in size.iter_mut().enumerate() {
                        *component = lexer.next_uint_literal()?;
                        if i == 2 || !lexer.skip(Token::Separator(',')) {
                            break;
                        }
                        if lexer.peek().0 == Token::Paren(')') {
                            break;
                        }
                    }
                    lexer.expect(Token::Paren(')'))?;
                    attributes.workgroup_size = Some(size);
                }
                "group" => {
                    lexer.expect(Token::Paren('('))?;
                    attributes.group = Some(lexer.next_uint_literal()?);
                    lexer.expect(Token::Paren(')'))?;
                }
                "binding" => {
                    lexer.expect(Token::Paren('('))?;
                    attributes.binding = Some(lexer.next_uint_literal()?);
                    lexer.expect(Token::Paren(')'))?;
                }
                "location" => {
                    lexer.expect(Token::Paren('('))?;
                    let value = lexer.next_uint_literal()?;
                    lexer.expect(Token::Paren(')'))?;
                    attributes.io = Some(ast::Binding::Location {
                        value,
                        span: name_span,
                    });
                }
                "builtin" => {
                    lexer.expect(Token::Paren('('))?;
                    let (word, span) = lexer.next_ident_with_span()?;
                    lexer.expect(Token::Paren(')'))?;
                    attributes.io = Some(ast::Binding::BuiltIn(ast::Ident { name: word, span }));
                }
                _ => return Err(Error::UnknownAttribute(name_span, name)),
            }
        }
        Ok(attributes)
    }

    fn parse_global_decl(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<Option<ast::GlobalDecl<'a>>, Error<'a>> {
        let attributes = self.parse_attributes(lexer)?;
        let (token, span) = lexer.peek();
        let start = span.to_range().map(|r| r.start).unwrap_or(0);
        let kind = match token {
            Token::End => return Ok(None),
            Token::Separator(';') => {
                let _ = lexer.next();
                return self.parse_global_decl(lexer);
            }
            Token::Word("enable") => {
                // accepted syntactically, with no effect
                loop {
                    match lexer.next().0 {
                        Token::Separator(';') | Token::End => break,
                        _ => {}
                    }
                }
                return self.parse_global_decl(lexer);
            }
            Token::Word("struct") => {
                let _ = lexer.next();
                let name = self.parse_ident(lexer)?;
                let members = self.parse_struct_body(lexer)?;
                ast::GlobalDeclKind::Struct(ast::Struct { name, members })
            }
            Token::Word("alias") | Token::Word("type") => {
                let _ = lexer.next();
                let name = self.parse_ident(lexer)?;
                lexer.expect(Token::Operation('='))?;
                let ty = self.parse_type_decl(lexer)?;
                lexer.expect(Token::Separator(';'))?;
                ast::GlobalDeclKind::Alias(ast::Alias { name, ty })
            }
            Token::Word("const") | Token::Word("let") => {
                let _ = lexer.next();
                let name = self.parse_ident(lexer)?;
                let ty = if lexer.skip(Token::Separator(':')) {
                    Some(self.parse_type_decl(lexer)?)
                } else {
                    None
                };
                lexer.expect(Token::Operation('='))?;
                let init = self.parse_general_expression(lexer)?;
                lexer.expect(Token::Separator(';'))?;
                ast::GlobalDeclKind::Const(ast::Const { name, ty, init })
            }
            Token::Word("var") => {
                let _ = lexer.next();
                let space = self.parse_variable_qualifier(lexer)?;
                let name = self.parse_ident(lexer)?;
                let ty = if lexer.skip(Token::Separator(':')) {
                    Some(self.parse_type_decl(lexer)?)
                } else {
                    None
                };
                let init = if lexer.skip(Token::Operation('=')) {
                    Some(self.parse_general_expression(lexer)?)
                } else {
                    None
                };
                lexer.expect(Token::Separator(';'))?;
                ast::GlobalDeclKind::Var(ast::GlobalVariable {
                    name,
                    space,
                    group: attributes.group,
                    binding: attributes.binding,
                    ty,
                    init,
                })
            }
            Token::Word("fn") => {
                let _ = lexer.next();
                let function = self.parse_function_decl(lexer, &attributes)?;
                ast::GlobalDeclKind::Fn(function)
            }
            _ => return Err(Error::Unexpected(span, ExpectedToken::GlobalItem)),
        };
        Ok(Some(ast::GlobalDecl {
            kind,
            span: lexer.span_from(start),
        }))
    }

    fn parse_ident(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::Ident<'a>, Error<'a>> {
        let (name, span) = lexer.next_ident_with_span()?;
        Ok(ast::Ident { name, span })
    }

    /// Parse the `<space>` or `<space, access>` qualifier of a `var`.
    fn parse_variable_qualifier(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<Option<crate::AddressSpace>, Error<'a>> {
        if !lexer.skip(Token::Paren('<')) {
            return Ok(None);
        }
        let (word, span) = lexer.next_ident_with_span()?;
        let mut space = conv::map_address_space(word, span)?;
        if lexer.skip(Token::Separator(',')) {
            let (word, span) = lexer.next_ident_with_span()?;
            let access = conv::map_access_mode(word, span)?;
            match space {
                crate::AddressSpace::Storage { access: ref mut a } => *a = access,
                _ => return Err(Error::UnknownAccessMode(span, word)),
            }
        }
        lexer.expect_generic_paren('>')?;
        Ok(Some(space))
    }

    fn parse_struct_body(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<Vec<ast::StructMember<'a>>, Error<'a>> {
        let mut members = Vec::new();
        lexer.expect(Token::Paren('{'))?;
        loop {
            if lexer.skip(Token::Paren('}')) {
                break;
            }
            let attributes = self.parse_attributes(lexer)?;
            let name = self.parse_ident(lexer)?;
            lexer.expect(Token::Separator(':'))?;
            let ty = self.parse_type_decl(lexer)?;
            members.push(ast::StructMember {
                name,
                ty,
                binding: attributes.io,
            });
            if !lexer.skip(Token::Separator(',')) {
                // also accept the older semicolon separator
                if !lexer.skip(Token::Separator(';')) {
                    lexer.expect(Token::Paren('}'))?;
                    break;
                }
            }
        }
        Ok(members)
    }

    fn parse_function_decl(
        &mut self,
        lexer: &mut Lexer<'a>,
        attributes: &ParsedAttributes<'a>,
    ) -> Result<ast::Function<'a>, Error<'a>> {
        let name = self.parse_ident(lexer)?;
        lexer.expect(Token::Paren('('))?;
        let mut arguments = Vec::new();
        while !lexer.skip(Token::Paren(')')) {
            if !arguments.is_empty() {
                lexer.expect(Token::Separator(','))?;
                if lexer.skip(Token::Paren(')')) {
                    break;
                }
            }
            let param_attributes = self.parse_attributes(lexer)?;
            let param_name = self.parse_ident(lexer)?;
            lexer.expect(Token::Separator(':'))?;
            let param_type = self.parse_type_decl(lexer)?;
            arguments.push(ast::FunctionArgument {
                name: param_name,
                ty: param_type,
                binding: param_attributes.io,
            });
        }
        let result = if lexer.skip(Token::Arrow) {
            let result_attributes = self.parse_attributes(lexer)?;
            let ty = self.parse_type_decl(lexer)?;
            Some(ast::FunctionResult {
                ty,
                binding: result_attributes.io,
            })
        } else {
            None
        };
        let body = self.parse_block(lexer)?;
        Ok(ast::Function {
            name,
            stage: attributes.stage.map(|(stage, _)| stage),
            workgroup_size: attributes.workgroup_size,
            arguments,
            result,
            body,
        })
    }

    fn parse_type_decl(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::Type<'a>, Error<'a>> {
        let (token, span) = lexer.next();
        let start = span.to_range().map(|r| r.start).unwrap_or(0);
        let word = match token {
            Token::Word(word) => word,
            _ => return Err(Error::Unexpected(span, ExpectedToken::TypeDecl)),
        };
        let kind = if let Some((kind, width)) = conv::get_scalar_type(word) {
            ast::TypeKind::Scalar { kind, width }
        } else if let Some(size) = vector_size(word) {
            let base = self.expect_type_generic(lexer)?;
            ast::TypeKind::Vector {
                size,
                base: Box::new(base),
            }
        } else if let Some((columns, rows)) = matrix_dimensions(word) {
            let base = self.expect_type_generic(lexer)?;
            ast::TypeKind::Matrix {
                columns,
                rows,
                base: Box::new(base),
            }
        } else {
            match word {
                "atomic" => {
                    let base = self.expect_type_generic(lexer)?;
                    ast::TypeKind::Atomic {
                        base: Box::new(base),
                    }
                }
                "ptr" => {
                    lexer.expect(Token::Paren('<'))?;
                    let (word, span) = lexer.next_ident_with_span()?;
                    let mut space = conv::map_address_space(word, span)?;
                    lexer.expect(Token::Separator(','))?;
                    let base = self.parse_type_decl(lexer)?;
                    if lexer.skip(Token::Separator(',')) {
                        let (word, span) = lexer.next_ident_with_span()?;
                        let access = conv::map_access_mode(word, span)?;
                        match space {
                            crate::AddressSpace::Storage { access: ref mut a } => *a = access,
                            _ => return Err(Error::UnknownAccessMode(span, word)),
                        }
                    }
                    lexer.expect_generic_paren('>')?;
                    ast::TypeKind::Pointer {
                        space,
                        base: Box::new(base),
                    }
                }
                "array" => {
                    lexer.expect(Token::Paren('<'))?;
                    let base = self.parse_type_decl(lexer)?;
                    let size = if lexer.skip(Token::Separator(',')) {
                        Some(Box::new(self.parse_general_expression(lexer)?))
                    } else {
                        None
                    };
                    lexer.expect_generic_paren('>')?;
                    ast::TypeKind::Array {
                        base: Box::new(base),
                        size,
                    }
                }
                "sampler" => ast::TypeKind::Sampler { comparison: false },
                "sampler_comparison" => ast::TypeKind::Sampler { comparison: true },
                _ => {
                    if let Some(kind) = self.parse_texture_type(lexer, word, span)? {
                        kind
                    } else {
                        ast::TypeKind::Named(ast::Ident { name: word, span })
                    }
                }
            }
        };
        Ok(ast::Type {
            kind,
            span: lexer.span_from(start),
        })
    }

    fn expect_type_generic(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::Type<'a>, Error<'a>> {
        lexer.expect(Token::Paren('<'))?;
        let ty = self.parse_type_decl(lexer)?;
        lexer.expect_generic_paren('>')?;
        Ok(ty)
    }

    fn expect_scalar_generic(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<(crate::ScalarKind, crate::Bytes), Error<'a>> {
        lexer.expect(Token::Paren('<'))?;
        let (word, span) = lexer.next_ident_with_span()?;
        let pair = conv::get_scalar_type(word).ok_or(Error::UnknownScalarType(span, word))?;
        lexer.expect_generic_paren('>')?;
        Ok(pair)
    }

    fn parse_texture_type(
        &mut self,
        lexer: &mut Lexer<'a>,
        word: &'a str,
        span: Span,
    ) -> Result<Option<ast::TypeKind<'a>>, Error<'a>> {
        use crate::ImageDimension as Dim;
        let _ = span;
        let (dim, arrayed, sampled, multi) = match word {
            "texture_1d" => (Dim::D1, false, true, false),
            "texture_2d" => (Dim::D2, false, true, false),
            "texture_2d_array" => (Dim::D2, true, true, false),
            "texture_3d" => (Dim::D3, false, true, false),
            "texture_cube" => (Dim::Cube, false, true, false),
            "texture_cube_array" => (Dim::Cube, true, true, false),
            "texture_multisampled_2d" => (Dim::D2, false, true, true),
            "texture_depth_2d" => (Dim::D2, false, false, false),
            "texture_depth_2d_array" => (Dim::D2, true, false, false),
            "texture_depth_cube" => (Dim::Cube, false, false, false),
            "texture_depth_cube_array" => (Dim::Cube, true, false, false),
            "texture_depth_multisampled_2d" => (Dim::D2, false, false, true),
            "texture_storage_1d" | "texture_storage_2d" | "texture_storage_2d_array"
            | "texture_storage_3d" => {
                let (dim, arrayed) = match word {
                    "texture_storage_1d" => (Dim::D1, false),
                    "texture_storage_2d" => (Dim::D2, false),
                    "texture_storage_2d_array" => (Dim::D2, true),
                    _ => (Dim::D3, false),
                };
                lexer.expect(Token::Paren('<'))?;
                let (format_word, format_span) = lexer.next_ident_with_span()?;
                let format = conv::map_storage_format(format_word, format_span)?;
                lexer.expect(Token::Separator(','))?;
                let (access_word, access_span) = lexer.next_ident_with_span()?;
                let access = conv::map_access_mode(access_word, access_span)?;
                lexer.expect_generic_paren('>')?;
                return Ok(Some(ast::TypeKind::Image {
                    dim,
                    arrayed,
                    class: crate::ImageClass::Storage { format, access },
                }));
            }
            _ => return Ok(None),
        };
        let class = if sampled {
            let (kind, _) = self.expect_scalar_generic(lexer)?;
            crate::ImageClass::Sampled { kind, multi }
        } else {
            crate::ImageClass::Depth { multi }
        };
        Ok(Some(ast::TypeKind::Image {
            dim,
            arrayed,
            class,
        }))
    }

    fn parse_block(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::Block<'a>, Error<'a>> {
        lexer.expect(Token::Paren('{'))?;
        let mut stmts = Vec::new();
        loop {
            if lexer.skip(Token::Paren('}')) {
                break;
            }
            if lexer.skip(Token::Separator(';')) {
                continue;
            }
            if let (Token::End, span) = lexer.peek() {
                return Err(Error::Unexpected(
                    span,
                    ExpectedToken::Token(Token::Paren('}')),
                ));
            }
            match self.parse_statement(lexer) {
                Ok(stmt) => stmts.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    synchronize_statement(lexer);
                }
            }
        }
        Ok(ast::Block { stmts })
    }

    fn parse_statement(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::Statement<'a>, Error<'a>> {
        let (token, span) = lexer.peek();
        let start = span.to_range().map(|r| r.start).unwrap_or(0);
        let kind = match token {
            Token::Paren('{') => ast::StatementKind::Block(self.parse_block(lexer)?),
            Token::Word(word) => match word {
                "var" | "let" | "const" => {
                    let _ = lexer.next();
                    let kind = match word {
                        "var" => ast::LocalDeclKind::Var,
                        "let" => ast::LocalDeclKind::Let,
                        _ => ast::LocalDeclKind::Const,
                    };
                    let name = self.parse_ident(lexer)?;
                    let ty = if lexer.skip(Token::Separator(':')) {
                        Some(self.parse_type_decl(lexer)?)
                    } else {
                        None
                    };
                    let init = if lexer.skip(Token::Operation('=')) {
                        Some(self.parse_general_expression(lexer)?)
                    } else {
                        None
                    };
                    lexer.expect(Token::Separator(';'))?;
                    ast::StatementKind::LocalDecl {
                        kind,
                        name,
                        ty,
                        init,
                    }
                }
                "return" => {
                    let _ = lexer.next();
                    let value = if lexer.peek().0 != Token::Separator(';') {
                        Some(self.parse_general_expression(lexer)?)
                    } else {
                        None
                    };
                    lexer.expect(Token::Separator(';'))?;
                    ast::StatementKind::Return { value }
                }
                "if" => {
                    let _ = lexer.next();
                    self.parse_if(lexer)?
                }
                "switch" => {
                    let _ = lexer.next();
                    let selector = self.parse_general_expression(lexer)?;
                    lexer.expect(Token::Paren('{'))?;
                    let mut cases = Vec::new();
                    loop {
                        match lexer.next() {
                            (Token::Word("case"), _) => {
                                let mut values = Vec::new();
                                loop {
                                    if lexer.skip(Token::Word("default")) {
                                        values.push(ast::SwitchValue::Default);
                                    } else {
                                        let value = self.parse_general_expression(lexer)?;
                                        values.push(ast::SwitchValue::Expr(value));
                                    }
                                    if !lexer.skip(Token::Separator(',')) {
                                        break;
                                    }
                                    // trailing comma before the colon or body
                                    match lexer.peek().0 {
                                        Token::Separator(':') | Token::Paren('{') => break,
                                        _ => {}
                                    }
                                }
                                let _ = lexer.skip(Token::Separator(':'));
                                let (body, fall_through) = self.parse_case_body(lexer)?;
                                cases.push(ast::SwitchCase {
                                    values,
                                    body,
                                    fall_through,
                                });
                            }
                            (Token::Word("default"), _) => {
                                let _ = lexer.skip(Token::Separator(':'));
                                let (body, fall_through) = self.parse_case_body(lexer)?;
                                cases.push(ast::SwitchCase {
                                    values: vec![ast::SwitchValue::Default],
                                    body,
                                    fall_through,
                                });
                            }
                            (Token::Paren('}'), _) => break,
                            (_, span) => {
                                return Err(Error::Unexpected(span, ExpectedToken::SwitchItem))
                            }
                        }
                    }
                    ast::StatementKind::Switch { selector, cases }
                }
                "loop" => {
                    let _ = lexer.next();
                    self.parse_loop(lexer)?
                }
                "while" => {
                    let _ = lexer.next();
                    let condition = self.parse_general_expression(lexer)?;
                    let body = self.parse_block(lexer)?;
                    ast::StatementKind::While { condition, body }
                }
                "for" => {
                    let _ = lexer.next();
                    lexer.expect(Token::Paren('('))?;
                    let init = if lexer.skip(Token::Separator(';')) {
                        None
                    } else {
                        // the init statement consumes its own `;`
                        Some(Box::new(self.parse_statement(lexer)?))
                    };
                    let condition = if lexer.peek().0 == Token::Separator(';') {
                        None
                    } else {
                        Some(self.parse_general_expression(lexer)?)
                    };
                    lexer.expect(Token::Separator(';'))?;
                    let update = if lexer.peek().0 == Token::Paren(')') {
                        None
                    } else {
                        Some(Box::new(self.parse_unterminated_statement(lexer)?))
                    };
                    lexer.expect(Token::Paren(')'))?;
                    let body = self.parse_block(lexer)?;
                    ast::StatementKind::For {
                        init,
                        condition,
                        update,
                        body,
                    }
                }
                "break" => {
                    let _ = lexer.next();
                    lexer.expect(Token::Separator(';'))?;
                    ast::StatementKind::Break
                }
                "continue" => {
                    let _ = lexer.next();
                    lexer.expect(Token::Separator(';'))?;
                    ast::StatementKind::Continue
                }
                "discard" => {
                    let _ = lexer.next();
                    lexer.expect(Token::Separator(';'))?;
                    ast::StatementKind::Discard
                }
                "_" => {
                    let _ = lexer.next();
                    lexer.expect(Token::Operation('='))?;
                    let value = self.parse_general_expression(lexer)?;
                    lexer.expect(Token::Separator(';'))?;
                    ast::StatementKind::Phony(value)
                }
                _ => {
                    let kind = self.parse_assignment_or_call(lexer)?;
                    lexer.expect(Token::Separator(';'))?;
                    kind
                }
            },
            _ => return Err(Error::Unexpected(span, ExpectedToken::Statement)),
        };
        Ok(ast::Statement {
            kind,
            span: lexer.span_from(start),
        })
    }

    /// An assignment or function-call statement, without the trailing `;`.
    fn parse_unterminated_statement(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::Statement<'a>, Error<'a>> {
        let (_, span) = lexer.peek();
        let start = span.to_range().map(|r| r.start).unwrap_or(0);
        let kind = self.parse_assignment_or_call(lexer)?;
        Ok(ast::Statement {
            kind,
            span: lexer.span_from(start),
        })
    }

    fn parse_assignment_or_call(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::StatementKind<'a>, Error<'a>> {
        let target = self.parse_general_expression(lexer)?;
        let (token, span) = lexer.peek();
        Ok(match token {
            Token::Operation('=') => {
                let _ = lexer.next();
                let value = self.parse_general_expression(lexer)?;
                ast::StatementKind::Assign {
                    target,
                    op: None,
                    value,
                }
            }
            Token::AssignmentOperation(c) => {
                let _ = lexer.next();
                let op = map_assignment_op(c)
                    .ok_or(Error::Unexpected(span, ExpectedToken::Statement))?;
                let value = self.parse_general_expression(lexer)?;
                ast::StatementKind::Assign {
                    target,
                    op: Some(op),
                    value,
                }
            }
            Token::IncrementOperation | Token::DecrementOperation => {
                let (_, op_span) = lexer.next();
                let op = match token {
                    Token::IncrementOperation => crate::BinaryOperator::Add,
                    _ => crate::BinaryOperator::Subtract,
                };
                // `i++` is sugar for `i += 1`
                let value = ast::Expression {
                    kind: ast::ExpressionKind::Literal(ast::Literal::Number(
                        Number::AbstractInt(1),
                    )),
                    span: op_span,
                };
                ast::StatementKind::Assign {
                    target,
                    op: Some(op),
                    value,
                }
            }
            _ => match target.kind {
                ast::ExpressionKind::Call {
                    function,
                    arguments,
                } => ast::StatementKind::Call {
                    function,
                    arguments,
                },
                _ => return Err(Error::Unexpected(span, ExpectedToken::Statement)),
            },
        })
    }

    fn parse_if(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::StatementKind<'a>, Error<'a>> {
        let condition = self.parse_general_expression(lexer)?;
        let accept = self.parse_block(lexer)?;
        let reject = if lexer.skip(Token::Word("else")) {
            if lexer.peek().0 == Token::Word("if") {
                let (_, span) = lexer.next();
                let start = span.to_range().map(|r| r.start).unwrap_or(0);
                let kind = self.parse_if(lexer)?;
                ast::Block {
                    stmts: vec![ast::Statement {
                        kind,
                        span: lexer.span_from(start),
                    }],
                }
            } else {
                self.parse_block(lexer)?
            }
        } else {
            ast::Block { stmts: Vec::new() }
        };
        Ok(ast::StatementKind::If {
            condition,
            accept,
            reject,
        })
    }

    fn parse_loop(&mut self, lexer: &mut Lexer<'a>) -> Result<ast::StatementKind<'a>, Error<'a>> {
        let mut body = ast::Block { stmts: Vec::new() };
        let mut continuing = ast::Block { stmts: Vec::new() };
        let mut break_if = None;
        lexer.expect(Token::Paren('{'))?;
        loop {
            if lexer.skip(Token::Word("continuing")) {
                lexer.expect(Token::Paren('{'))?;
                loop {
                    if lexer.skip(Token::Paren('}')) {
                        break;
                    }
                    if lexer.skip(Token::Separator(';')) {
                        continue;
                    }
                    // `break if <cond>;` must be the last statement of
                    // the continuing block
                    let mut checkpoint = lexer.clone();
                    if checkpoint.skip(Token::Word("break")) && checkpoint.skip(Token::Word("if"))
                    {
                        *lexer = checkpoint;
                        let condition = self.parse_general_expression(lexer)?;
                        lexer.expect(Token::Separator(';'))?;
                        break_if = Some(condition);
                        lexer.expect(Token::Paren('}'))?;
                        break;
                    }
                    match self.parse_statement(lexer) {
                        Ok(stmt) => continuing.stmts.push(stmt),
                        Err(error) => {
                            self.errors.push(error);
                            synchronize_statement(lexer);
                        }
                    }
                }
                lexer.expect(Token::Paren('}'))?;
                break;
            }
            if lexer.skip(Token::Paren('}')) {
                break;
            }
            if lexer.skip(Token::Separator(';')) {
                continue;
            }
            match self.parse_statement(lexer) {
                Ok(stmt) => body.stmts.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    synchronize_statement(lexer);
                }
            }
        }
        Ok(ast::StatementKind::Loop {
            body,
            continuing,
            break_if,
        })
    }

    fn parse_case_body(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<(ast::Block<'a>, bool), Error<'a>> {
        let mut fall_through = false;
        lexer.expect(Token::Paren('{'))?;
        let mut stmts = Vec::new();
        loop {
            if lexer.skip(Token::Paren('}')) {
                break;
            }
            if lexer.skip(Token::Separator(';')) {
                continue;
            }
            if lexer.skip(Token::Word("fallthrough")) {
                lexer.expect(Token::Separator(';'))?;
                lexer.expect(Token::Paren('}'))?;
                fall_through = true;
                break;
            }
            match self.parse_statement(lexer) {
                Ok(stmt) => stmts.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    synchronize_statement(lexer);
                }
            }
        }
        Ok((ast::Block { stmts }, fall_through))
    }

    fn parse_general_expression(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::Expression<'a>, Error<'a>> {
        // logical_or_expression
        parse_binary_op(
            lexer,
            |token| match token {
                Token::LogicalOperation('|') => Some(crate::BinaryOperator::LogicalOr),
                _ => None,
            },
            // logical_and_expression
            |lexer| {
                parse_binary_op(
                    lexer,
                    |token| match token {
                        Token::LogicalOperation('&') => Some(crate::BinaryOperator::LogicalAnd),
                        _ => None,
                    },
                    // inclusive_or_expression
                    |lexer| {
                        parse_binary_op(
                            lexer,
                            |token| match token {
                                Token::Operation('|') => Some(crate::BinaryOperator::InclusiveOr),
                                _ => None,
                            },
                            // exclusive_or_expression
                            |lexer| {
                                parse_binary_op(
                                    lexer,
                                    |token| match token {
                                        Token::Operation('^') => {
                                            Some(crate::BinaryOperator::ExclusiveOr)
                                        }
                                        _ => None,
                                    },
                                    // and_expression
                                    |lexer| {
                                        parse_binary_op(
                                            lexer,
                                            |token| match token {
                                                Token::Operation('&') => {
                                                    Some(crate::BinaryOperator::And)
                                                }
                                                _ => None,
                                            },
                                            |lexer| self.parse_equality_expression(lexer),
                                        )
                                    },
                                )
                            },
                        )
                    },
                )
            },
        )
    }

    fn parse_equality_expression(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::Expression<'a>, Error<'a>> {
        // equality_expression
        parse_binary_op(
            lexer,
            |token| match token {
                Token::LogicalOperation('=') => Some(crate::BinaryOperator::Equal),
                Token::LogicalOperation('!') => Some(crate::BinaryOperator::NotEqual),
                _ => None,
            },
            // relational_expression
            |lexer| {
                parse_binary_op(
                    lexer,
                    |token| match token {
                        Token::Paren('<') => Some(crate::BinaryOperator::Less),
                        Token::Paren('>') => Some(crate::BinaryOperator::Greater),
                        Token::LogicalOperation('<') => Some(crate::BinaryOperator::LessEqual),
                        Token::LogicalOperation('>') => Some(crate::BinaryOperator::GreaterEqual),
                        _ => None,
                    },
                    // shift_expression
                    |lexer| {
                        parse_binary_op(
                            lexer,
                            |token| match token {
                                Token::ShiftOperation('<') => {
                                    Some(crate::BinaryOperator::ShiftLeft)
                                }
                                Token::ShiftOperation('>') => {
                                    Some(crate::BinaryOperator::ShiftRight)
                                }
                                _ => None,
                            },
                            // additive_expression
                            |lexer| {
                                parse_binary_op(
                                    lexer,
                                    |token| match token {
                                        Token::Operation('+') => Some(crate::BinaryOperator::Add),
                                        Token::Operation('-') => {
                                            Some(crate::BinaryOperator::Subtract)
                                        }
                                        _ => None,
                                    },
                                    // multiplicative_expression
                                    |lexer| {
                                        parse_binary_op(
                                            lexer,
                                            |token| match token {
                                                Token::Operation('*') => {
                                                    Some(crate::BinaryOperator::Multiply)
                                                }
                                                Token::Operation('/') => {
                                                    Some(crate::BinaryOperator::Divide)
                                                }
                                                Token::Operation('%') => {
                                                    Some(crate::BinaryOperator::Modulo)
                                                }
                                                _ => None,
                                            },
                                            |lexer| self.parse_unary_expression(lexer),
                                        )
                                    },
                                )
                            },
                        )
                    },
                )
            },
        )
    }

    fn parse_unary_expression(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::Expression<'a>, Error<'a>> {
        let (token, span) = lexer.peek();
        let start = span.to_range().map(|r| r.start).unwrap_or(0);
        let kind = match token {
            Token::Operation('-') => {
                let _ = lexer.next();
                let expr = self.parse_unary_expression(lexer)?;
                ast::ExpressionKind::Unary {
                    op: crate::UnaryOperator::Negate,
                    expr: Box::new(expr),
                }
            }
            Token::Operation('!') => {
                let _ = lexer.next();
                let expr = self.parse_unary_expression(lexer)?;
                ast::ExpressionKind::Unary {
                    op: crate::UnaryOperator::LogicalNot,
                    expr: Box::new(expr),
                }
            }
            Token::Operation('~') => {
                let _ = lexer.next();
                let expr = self.parse_unary_expression(lexer)?;
                ast::ExpressionKind::Unary {
                    op: crate::UnaryOperator::BitwiseNot,
                    expr: Box::new(expr),
                }
            }
            Token::Operation('&') => {
                let _ = lexer.next();
                let expr = self.parse_unary_expression(lexer)?;
                ast::ExpressionKind::AddrOf(Box::new(expr))
            }
            Token::Operation('*') => {
                let _ = lexer.next();
                let expr = self.parse_unary_expression(lexer)?;
                ast::ExpressionKind::Deref(Box::new(expr))
            }
            _ => return self.parse_singular_expression(lexer),
        };
        Ok(ast::Expression {
            kind,
            span: lexer.span_from(start),
        })
    }

    /// A primary expression followed by any number of postfix accesses.
    fn parse_singular_expression(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::Expression<'a>, Error<'a>> {
        let primary = self.parse_primary_expression(lexer)?;
        self.parse_postfix(lexer, primary)
    }

    fn parse_primary_expression(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<ast::Expression<'a>, Error<'a>> {
        let (token, span) = lexer.next();
        let start = span.to_range().map(|r| r.start).unwrap_or(0);
        let kind = match token {
            Token::Paren('(') => {
                let expr = self.parse_general_expression(lexer)?;
                lexer.expect(Token::Paren(')'))?;
                // keep the inner kind, extend the span over the parens
                return Ok(ast::Expression {
                    kind: expr.kind,
                    span: lexer.span_from(start),
                });
            }
            Token::Number(Ok(number)) => ast::ExpressionKind::Literal(ast::Literal::Number(number)),
            Token::Number(Err(error)) => return Err(Error::BadNumber(span, error)),
            Token::Word("true") => ast::ExpressionKind::Literal(ast::Literal::Bool(true)),
            Token::Word("false") => ast::ExpressionKind::Literal(ast::Literal::Bool(false)),
            Token::Word("bitcast") => {
                lexer.expect(Token::Paren('<'))?;
                let to = self.parse_type_decl(lexer)?;
                lexer.expect_generic_paren('>')?;
                lexer.expect(Token::Paren('('))?;
                let expr = self.parse_general_expression(lexer)?;
                lexer.expect(Token::Paren(')'))?;
                ast::ExpressionKind::Bitcast {
                    to,
                    expr: Box::new(expr),
                }
            }
            Token::Word(word) => {
                if let Some(ty) = self.parse_constructor_type(lexer, word)? {
                    let ty_span = lexer.span_from(start);
                    let components = self.parse_arguments(lexer)?;
                    ast::ExpressionKind::Construct {
                        ty,
                        ty_span,
                        components,
                    }
                } else if lexer.peek().0 == Token::Paren('(') {
                    let function = ast::Ident { name: word, span };
                    let arguments = self.parse_arguments(lexer)?;
                    ast::ExpressionKind::Call {
                        function,
                        arguments,
                    }
                } else {
                    ast::ExpressionKind::Ident(ast::Ident { name: word, span })
                }
            }
            _ => return Err(Error::Unexpected(span, ExpectedToken::PrimaryExpression)),
        };
        Ok(ast::Expression {
            kind,
            span: lexer.span_from(start),
        })
    }

    /// Recognize the head of a construction expression like `vec3<f32>` or
    /// `array`. Returns `None` when `word` is not a constructible type
    /// keyword.
    fn parse_constructor_type(
        &mut self,
        lexer: &mut Lexer<'a>,
        word: &'a str,
    ) -> Result<Option<ast::ConstructorType<'a>>, Error<'a>> {
        if let Some((kind, width)) = conv::get_scalar_type(word) {
            return Ok(Some(ast::ConstructorType::Scalar { kind, width }));
        }
        if let Some(size) = vector_size(word) {
            return Ok(Some(if lexer.peek().0 == Token::Paren('<') {
                let base = self.expect_type_generic(lexer)?;
                ast::ConstructorType::Vector {
                    size,
                    base: Box::new(base),
                }
            } else {
                ast::ConstructorType::PartialVector { size }
            }));
        }
        if let Some((columns, rows)) = matrix_dimensions(word) {
            return Ok(Some(if lexer.peek().0 == Token::Paren('<') {
                let base = self.expect_type_generic(lexer)?;
                ast::ConstructorType::Matrix {
                    columns,
                    rows,
                    base: Box::new(base),
                }
            } else {
                ast::ConstructorType::PartialMatrix { columns, rows }
            }));
        }
        if word == "array" {
            return Ok(Some(if lexer.peek().0 == Token::Paren('<') {
                lexer.expect(Token::Paren('<'))?;
                let base = self.parse_type_decl(lexer)?;
                let size = if lexer.skip(Token::Separator(',')) {
                    Some(Box::new(self.parse_general_expression(lexer)?))
                } else {
                    None
                };
                lexer.expect_generic_paren('>')?;
                ast::ConstructorType::Array {
                    base: Box::new(base),
                    size,
                }
            } else {
                ast::ConstructorType::PartialArray
            }));
        }
        Ok(None)
    }

    fn parse_arguments(
        &mut self,
        lexer: &mut Lexer<'a>,
    ) -> Result<Vec<ast::Expression<'a>>, Error<'a>> {
        lexer.expect(Token::Paren('('))?;
        let mut arguments = Vec::new();
        while !lexer.skip(Token::Paren(')')) {
            if !arguments.is_empty() {
                lexer.expect(Token::Separator(','))?;
                if lexer.skip(Token::Paren(')')) {
                    break;
                }
            }
            arguments.push(self.parse_general_expression(lexer)?);
        }
        Ok(arguments)
    }

    fn parse_postfix(
        &mut self,
        lexer: &mut Lexer<'a>,
        mut expr: ast::Expression<'a>,
    ) -> Result<ast::Expression<'a>, Error<'a>> {
        let start = expr.span.to_range().map(|r| r.start).unwrap_or(0);
        loop {
            match lexer.peek().0 {
                Token::Separator('.') => {
                    let _ = lexer.next();
                    let field = self.parse_ident(lexer)?;
                    expr = ast::Expression {
                        kind: ast::ExpressionKind::Member {
                            base: Box::new(expr),
                            field,
                        },
                        span: lexer.span_from(start),
                    };
                }
                Token::Paren('[') => {
                    let _ = lexer.next();
                    let index = self.parse_general_expression(lexer)?;
                    lexer.expect(Token::Paren(']'))?;
                    expr = ast::Expression {
                        kind: ast::ExpressionKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        span: lexer.span_from(start),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }
}

fn vector_size(word: &str) -> Option<crate::VectorSize> {
    match word {
        "vec2" => Some(crate::VectorSize::Bi),
        "vec3" => Some(crate::VectorSize::Tri),
        "vec4" => Some(crate::VectorSize::Quad),
        _ => None,
    }
}

fn matrix_dimensions(word: &str) -> Option<(crate::VectorSize, crate::VectorSize)> {
    use crate::VectorSize as Vs;
    match word {
        "mat2x2" => Some((Vs::Bi, Vs::Bi)),
        "mat2x3" => Some((Vs::Bi, Vs::Tri)),
        "mat2x4" => Some((Vs::Bi, Vs::Quad)),
        "mat3x2" => Some((Vs::Tri, Vs::Bi)),
        "mat3x3" => Some((Vs::Tri, Vs::Tri)),
        "mat3x4" => Some((Vs::Tri, Vs::Quad)),
        "mat4x2" => Some((Vs::Quad, Vs::Bi)),
        "mat4x3" => Some((Vs::Quad, Vs::Tri)),
        "mat4x4" => Some((Vs::Quad, Vs::Quad)),
        _ => None,
    }
}

/// Skip ahead to the next plausible global declaration.
fn synchronize_global(lexer: &mut Lexer<'_>) {
    let mut depth = 0u32;
    // always make progress
    match lexer.next().0 {
        Token::Paren('{') => depth += 1,
        Token::End => return,
        _ => {}
    }
    loop {
        match lexer.peek().0 {
            Token::End => return,
            Token::Word("fn")
            | Token::Word("struct")
            | Token::Word("var")
            | Token::Word("let")
            | Token::Word("const")
            | Token::Word("alias")
            | Token::Word("type")
            | Token::Attribute
                if depth == 0 =>
            {
                return;
            }
            Token::Paren('{') => {
                depth += 1;
                let _ = lexer.next();
            }
            Token::Paren('}') => {
                depth = depth.saturating_sub(1);
                let _ = lexer.next();
                if depth == 0 {
                    return;
                }
            }
            _ => {
                let _ = lexer.next();
            }
        }
    }
}

/// Skip ahead to the next statement boundary.
fn synchronize_statement(lexer: &mut Lexer<'_>) {
    let mut depth = 0u32;
    loop {
        match lexer.peek().0 {
            Token::End => return,
            Token::Separator(';') if depth == 0 => {
                let _ = lexer.next();
                return;
            }
            Token::Paren('}') => {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                let _ = lexer.next();
            }
            Token::Paren('{') => {
                depth += 1;
                let _ = lexer.next();
            }
            _ => {
                let _ = lexer.next();
            }
        }
    }
}
