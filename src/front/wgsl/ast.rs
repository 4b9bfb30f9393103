//! Abstract syntax tree for WGSL.
//!
//! The parser produces this tree; the lowerer consumes it. Every node
//! carries a [`Span`] for diagnostics. Identifiers borrow from the source
//! text.

use super::number::Number;
use crate::Span;

#[derive(Clone, Copy, Debug)]
pub struct Ident<'a> {
    pub name: &'a str,
    pub span: Span,
}

#[derive(Debug)]
pub struct TranslationUnit<'a> {
    pub decls: Vec<GlobalDecl<'a>>,
}

#[derive(Debug)]
pub struct GlobalDecl<'a> {
    pub kind: GlobalDeclKind<'a>,
    pub span: Span,
}

#[derive(Debug)]
pub enum GlobalDeclKind<'a> {
    Fn(Function<'a>),
    Var(GlobalVariable<'a>),
    Const(Const<'a>),
    Struct(Struct<'a>),
    Alias(Alias<'a>),
}

#[derive(Debug)]
pub struct Function<'a> {
    pub name: Ident<'a>,
    /// Present when the function is an entry point.
    pub stage: Option<crate::ShaderStage>,
    pub workgroup_size: Option<[u32; 3]>,
    pub arguments: Vec<FunctionArgument<'a>>,
    pub result: Option<FunctionResult<'a>>,
    pub body: Block<'a>,
}

#[derive(Debug)]
pub struct FunctionArgument<'a> {
    pub name: Ident<'a>,
    pub ty: Type<'a>,
    pub binding: Option<Binding<'a>>,
}

#[derive(Debug)]
pub struct FunctionResult<'a> {
    pub ty: Type<'a>,
    pub binding: Option<Binding<'a>>,
}

/// An IO binding attribute, as written. Builtin names are resolved by the
/// lowerer.
#[derive(Clone, Copy, Debug)]
pub enum Binding<'a> {
    BuiltIn(Ident<'a>),
    Location { value: u32, span: Span },
}

#[derive(Debug)]
pub struct GlobalVariable<'a> {
    pub name: Ident<'a>,
    pub space: Option<crate::AddressSpace>,
    pub group: Option<u32>,
    pub binding: Option<u32>,
    pub ty: Option<Type<'a>>,
    pub init: Option<Expression<'a>>,
}

#[derive(Debug)]
pub struct Const<'a> {
    pub name: Ident<'a>,
    pub ty: Option<Type<'a>>,
    pub init: Expression<'a>,
}

#[derive(Debug)]
pub struct Struct<'a> {
    pub name: Ident<'a>,
    pub members: Vec<StructMember<'a>>,
}

#[derive(Debug)]
pub struct StructMember<'a> {
    pub name: Ident<'a>,
    pub ty: Type<'a>,
    pub binding: Option<Binding<'a>>,
}

#[derive(Debug)]
pub struct Alias<'a> {
    pub name: Ident<'a>,
    pub ty: Type<'a>,
}

#[derive(Debug)]
pub struct Type<'a> {
    pub kind: TypeKind<'a>,
    pub span: Span,
}

#[derive(Debug)]
pub enum TypeKind<'a> {
    Scalar {
        kind: crate::ScalarKind,
        width: crate::Bytes,
    },
    Vector {
        size: crate::VectorSize,
        base: Box<Type<'a>>,
    },
    Matrix {
        columns: crate::VectorSize,
        rows: crate::VectorSize,
        base: Box<Type<'a>>,
    },
    Atomic {
        base: Box<Type<'a>>,
    },
    Pointer {
        space: crate::AddressSpace,
        base: Box<Type<'a>>,
    },
    Array {
        base: Box<Type<'a>>,
        /// `None` for runtime-sized arrays.
        size: Option<Box<Expression<'a>>>,
    },
    Image {
        dim: crate::ImageDimension,
        arrayed: bool,
        class: crate::ImageClass,
    },
    Sampler {
        comparison: bool,
    },
    /// A struct or alias name.
    Named(Ident<'a>),
}

#[derive(Debug)]
pub struct Block<'a> {
    pub stmts: Vec<Statement<'a>>,
}

#[derive(Debug)]
pub struct Statement<'a> {
    pub kind: StatementKind<'a>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocalDeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug)]
pub enum StatementKind<'a> {
    LocalDecl {
        kind: LocalDeclKind,
        name: Ident<'a>,
        ty: Option<Type<'a>>,
        init: Option<Expression<'a>>,
    },
    Block(Block<'a>),
    If {
        condition: Expression<'a>,
        accept: Block<'a>,
        reject: Block<'a>,
    },
    Switch {
        selector: Expression<'a>,
        cases: Vec<SwitchCase<'a>>,
    },
    Loop {
        body: Block<'a>,
        continuing: Block<'a>,
        break_if: Option<Expression<'a>>,
    },
    While {
        condition: Expression<'a>,
        body: Block<'a>,
    },
    For {
        init: Option<Box<Statement<'a>>>,
        condition: Option<Expression<'a>>,
        update: Option<Box<Statement<'a>>>,
        body: Block<'a>,
    },
    Break,
    Continue,
    Return {
        value: Option<Expression<'a>>,
    },
    Discard,
    Assign {
        target: Expression<'a>,
        /// Compound assignment operation, if any.
        op: Option<crate::BinaryOperator>,
        value: Expression<'a>,
    },
    /// `_ = expr;`
    Phony(Expression<'a>),
    Call {
        function: Ident<'a>,
        arguments: Vec<Expression<'a>>,
    },
}

#[derive(Debug)]
pub struct SwitchCase<'a> {
    pub values: Vec<SwitchValue<'a>>,
    pub body: Block<'a>,
    pub fall_through: bool,
}

#[derive(Debug)]
pub enum SwitchValue<'a> {
    Expr(Expression<'a>),
    Default,
}

#[derive(Debug)]
pub struct Expression<'a> {
    pub kind: ExpressionKind<'a>,
    pub span: Span,
}

#[derive(Debug)]
pub enum ExpressionKind<'a> {
    Literal(Literal),
    Ident(Ident<'a>),
    /// A typed construction like `vec3<f32>(...)` or `array(...)`.
    Construct {
        ty: ConstructorType<'a>,
        ty_span: Span,
        components: Vec<Expression<'a>>,
    },
    /// A call to a named function or builtin, or a struct constructor.
    Call {
        function: Ident<'a>,
        arguments: Vec<Expression<'a>>,
    },
    Unary {
        op: crate::UnaryOperator,
        expr: Box<Expression<'a>>,
    },
    AddrOf(Box<Expression<'a>>),
    Deref(Box<Expression<'a>>),
    Binary {
        op: crate::BinaryOperator,
        left: Box<Expression<'a>>,
        right: Box<Expression<'a>>,
    },
    Member {
        base: Box<Expression<'a>>,
        field: Ident<'a>,
    },
    Index {
        base: Box<Expression<'a>>,
        index: Box<Expression<'a>>,
    },
    Bitcast {
        to: Type<'a>,
        expr: Box<Expression<'a>>,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum Literal {
    Number(Number),
    Bool(bool),
}

/// The head of a construction expression.
///
/// The `Partial*` variants come from constructors that leave the component
/// type to be inferred, like `vec3(1.0, 1.0, 1.0)`.
#[derive(Debug)]
pub enum ConstructorType<'a> {
    Scalar {
        kind: crate::ScalarKind,
        width: crate::Bytes,
    },
    PartialVector {
        size: crate::VectorSize,
    },
    Vector {
        size: crate::VectorSize,
        base: Box<Type<'a>>,
    },
    PartialMatrix {
        columns: crate::VectorSize,
        rows: crate::VectorSize,
    },
    Matrix {
        columns: crate::VectorSize,
        rows: crate::VectorSize,
        base: Box<Type<'a>>,
    },
    PartialArray,
    Array {
        base: Box<Type<'a>>,
        size: Option<Box<Expression<'a>>>,
    },
}
