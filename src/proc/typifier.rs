use crate::arena::{Arena, BadHandle, Handle, UniqueArena};

use thiserror::Error;

/// The result of computing an expression's type.
///
/// Expression types are either a handle into the module's type registry, or
/// an inline [`TypeInner`](crate::TypeInner) for transient types that were
/// never interned (say, the `vec3<bool>` produced by comparing two
/// `vec3<f32>` values, or a pointer into a vector).
///
/// Use [`inner_with`](Self::inner_with) to get at the `TypeInner` either way.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub enum TypeResolution {
    /// A type registered in the module's type registry.
    Handle(Handle<crate::Type>),
    /// A transient type, described inline.
    Value(crate::TypeInner),
}

impl TypeResolution {
    pub const fn handle(&self) -> Option<Handle<crate::Type>> {
        match *self {
            Self::Handle(handle) => Some(handle),
            Self::Value(_) => None,
        }
    }

    pub fn inner_with<'a>(&'a self, arena: &'a UniqueArena<crate::Type>) -> &'a crate::TypeInner {
        match *self {
            Self::Handle(handle) => &arena[handle].inner,
            Self::Value(ref inner) => inner,
        }
    }
}

impl From<Handle<crate::Type>> for TypeResolution {
    fn from(handle: Handle<crate::Type>) -> Self {
        Self::Handle(handle)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("index {index} is out of bounds for expression {expr:?}")]
    OutOfBoundsIndex {
        expr: Handle<crate::Expression>,
        index: u32,
    },
    #[error("invalid access of {expr:?}")]
    InvalidAccess { expr: Handle<crate::Expression> },
    #[error("expression {0:?} is not a scalar")]
    InvalidScalar(Handle<crate::Expression>),
    #[error("expression {0:?} is not a vector")]
    InvalidVector(Handle<crate::Expression>),
    #[error("expression {0:?} is not a pointer")]
    InvalidPointer(Handle<crate::Expression>),
    #[error("expression {0:?} is not an image")]
    InvalidImage(Handle<crate::Expression>),
    #[error("function {name:?} returns no value")]
    FunctionReturnsVoid { name: Option<String> },
    #[error("incompatible operands: {0}")]
    IncompatibleOperands(String),
    #[error("function argument {0} doesn't exist")]
    FunctionArgumentNotFound(u32),
    #[error(transparent)]
    InvalidHandle(#[from] BadHandle),
}

/// Borrows of the module state needed to resolve expression types.
pub struct ResolveContext<'a> {
    pub constants: &'a Arena<crate::Constant>,
    pub types: &'a UniqueArena<crate::Type>,
    pub global_vars: &'a Arena<crate::GlobalVariable>,
    pub local_vars: &'a Arena<crate::LocalVariable>,
    pub functions: &'a Arena<crate::Function>,
    pub arguments: &'a [crate::FunctionArgument],
}

impl<'a> ResolveContext<'a> {
    /// Determine the type of `expression`.
    ///
    /// The `past` callback must return the already-computed resolution of any
    /// expression with a lower arena index; expressions are resolved in arena
    /// order, so sub-expressions always come earlier.
    pub fn resolve<'t>(
        &self,
        expression: &crate::Expression,
        past: impl Fn(Handle<crate::Expression>) -> Result<&'t TypeResolution, ResolveError>,
    ) -> Result<TypeResolution, ResolveError> {
        use crate::TypeInner as Ti;
        let types = self.types;
        Ok(match *expression {
            crate::Expression::Literal(literal) => TypeResolution::Value(Ti::Scalar {
                kind: literal.scalar_kind(),
                width: literal.width(),
            }),
            crate::Expression::Constant(h) => {
                TypeResolution::Handle(self.constants.try_get(h)?.ty)
            }
            crate::Expression::ZeroValue(ty) | crate::Expression::Compose { ty, .. } => {
                types.check_contains_handle(ty)?;
                TypeResolution::Handle(ty)
            }
            crate::Expression::Splat { size, value } => match *past(value)?.inner_with(types) {
                Ti::Scalar { kind, width } => {
                    TypeResolution::Value(Ti::Vector { size, kind, width })
                }
                _ => return Err(ResolveError::InvalidScalar(value)),
            },
            crate::Expression::Swizzle { size, vector, .. } => {
                match *past(vector)?.inner_with(types) {
                    Ti::Vector { kind, width, .. } => {
                        TypeResolution::Value(Ti::Vector { size, kind, width })
                    }
                    _ => return Err(ResolveError::InvalidVector(vector)),
                }
            }
            crate::Expression::FunctionArgument(index) => {
                let arg = self
                    .arguments
                    .get(index as usize)
                    .ok_or(ResolveError::FunctionArgumentNotFound(index))?;
                TypeResolution::Handle(arg.ty)
            }
            crate::Expression::GlobalVariable(h) => {
                let var = self.global_vars.try_get(h)?;
                if var.space == crate::AddressSpace::Handle {
                    TypeResolution::Handle(var.ty)
                } else {
                    TypeResolution::Value(Ti::Pointer {
                        base: var.ty,
                        space: var.space,
                    })
                }
            }
            crate::Expression::LocalVariable(h) => {
                let var = self.local_vars.try_get(h)?;
                TypeResolution::Value(Ti::Pointer {
                    base: var.ty,
                    space: crate::AddressSpace::Function,
                })
            }
            crate::Expression::Load { pointer } => match *past(pointer)?.inner_with(types) {
                Ti::Pointer { base, space: _ } => match types.get_handle(base)?.inner {
                    // atomics load as their backing scalar
                    Ti::Atomic { kind, width } => {
                        TypeResolution::Value(Ti::Scalar { kind, width })
                    }
                    _ => TypeResolution::Handle(base),
                },
                Ti::ValuePointer {
                    size,
                    kind,
                    width,
                    space: _,
                } => TypeResolution::Value(match size {
                    Some(size) => Ti::Vector { size, kind, width },
                    None => Ti::Scalar { kind, width },
                }),
                _ => return Err(ResolveError::InvalidPointer(pointer)),
            },
            crate::Expression::Access { base, index: _ } => {
                match *past(base)?.inner_with(types) {
                    Ti::Vector { kind, width, .. } => {
                        TypeResolution::Value(Ti::Scalar { kind, width })
                    }
                    Ti::Matrix { rows, width, .. } => TypeResolution::Value(Ti::Vector {
                        size: rows,
                        kind: crate::ScalarKind::Float,
                        width,
                    }),
                    Ti::Array { base: elem, .. } => TypeResolution::Handle(elem),
                    Ti::ValuePointer {
                        size: Some(_),
                        kind,
                        width,
                        space,
                    } => TypeResolution::Value(Ti::ValuePointer {
                        size: None,
                        kind,
                        width,
                        space,
                    }),
                    Ti::Pointer {
                        base: pointee,
                        space,
                    } => match types.get_handle(pointee)?.inner {
                        Ti::Vector { kind, width, .. } => TypeResolution::Value(Ti::ValuePointer {
                            size: None,
                            kind,
                            width,
                            space,
                        }),
                        Ti::Matrix { rows, width, .. } => {
                            TypeResolution::Value(Ti::ValuePointer {
                                size: Some(rows),
                                kind: crate::ScalarKind::Float,
                                width,
                                space,
                            })
                        }
                        Ti::Array { base: elem, .. } => TypeResolution::Value(Ti::Pointer {
                            base: elem,
                            space,
                        }),
                        _ => return Err(ResolveError::InvalidAccess { expr: base }),
                    },
                    _ => return Err(ResolveError::InvalidAccess { expr: base }),
                }
            }
            crate::Expression::AccessIndex { base, index } => {
                match *past(base)?.inner_with(types) {
                    Ti::Vector { size, kind, width } => {
                        if index >= size as u32 {
                            return Err(ResolveError::OutOfBoundsIndex { expr: base, index });
                        }
                        TypeResolution::Value(Ti::Scalar { kind, width })
                    }
                    Ti::Matrix {
                        columns,
                        rows,
                        width,
                    } => {
                        if index >= columns as u32 {
                            return Err(ResolveError::OutOfBoundsIndex { expr: base, index });
                        }
                        TypeResolution::Value(Ti::Vector {
                            size: rows,
                            kind: crate::ScalarKind::Float,
                            width,
                        })
                    }
                    Ti::Array { base: elem, .. } => TypeResolution::Handle(elem),
                    Ti::Struct { ref members, .. } => {
                        let member = members
                            .get(index as usize)
                            .ok_or(ResolveError::OutOfBoundsIndex { expr: base, index })?;
                        TypeResolution::Handle(member.ty)
                    }
                    Ti::ValuePointer {
                        size: Some(size),
                        kind,
                        width,
                        space,
                    } => {
                        if index >= size as u32 {
                            return Err(ResolveError::OutOfBoundsIndex { expr: base, index });
                        }
                        TypeResolution::Value(Ti::ValuePointer {
                            size: None,
                            kind,
                            width,
                            space,
                        })
                    }
                    Ti::Pointer {
                        base: pointee,
                        space,
                    } => match types.get_handle(pointee)?.inner {
                        Ti::Vector { size, kind, width } => {
                            if index >= size as u32 {
                                return Err(ResolveError::OutOfBoundsIndex { expr: base, index });
                            }
                            TypeResolution::Value(Ti::ValuePointer {
                                size: None,
                                kind,
                                width,
                                space,
                            })
                        }
                        Ti::Matrix {
                            columns,
                            rows,
                            width,
                        } => {
                            if index >= columns as u32 {
                                return Err(ResolveError::OutOfBoundsIndex { expr: base, index });
                            }
                            TypeResolution::Value(Ti::ValuePointer {
                                size: Some(rows),
                                kind: crate::ScalarKind::Float,
                                width,
                                space,
                            })
                        }
                        Ti::Array { base: elem, .. } => TypeResolution::Value(Ti::Pointer {
                            base: elem,
                            space,
                        }),
                        Ti::Struct { ref members, .. } => {
                            let member = members.get(index as usize).ok_or(
                                ResolveError::OutOfBoundsIndex { expr: base, index },
                            )?;
                            TypeResolution::Value(Ti::Pointer {
                                base: member.ty,
                                space,
                            })
                        }
                        _ => return Err(ResolveError::InvalidAccess { expr: base }),
                    },
                    _ => return Err(ResolveError::InvalidAccess { expr: base }),
                }
            }
            crate::Expression::Unary { expr, .. } => past(expr)?.clone(),
            crate::Expression::Binary { op, left, right } => match op {
                crate::BinaryOperator::Add
                | crate::BinaryOperator::Subtract
                | crate::BinaryOperator::Divide
                | crate::BinaryOperator::Modulo => past(left)?.clone(),
                crate::BinaryOperator::Multiply => {
                    let (res_left, res_right) = (past(left)?, past(right)?);
                    match (res_left.inner_with(types), res_right.inner_with(types)) {
                        (
                            &Ti::Matrix { rows, width, .. },
                            &Ti::Matrix { columns, .. },
                        ) => TypeResolution::Value(Ti::Matrix {
                            columns,
                            rows,
                            width,
                        }),
                        (
                            &Ti::Matrix { rows, width, .. },
                            &Ti::Vector { .. },
                        ) => TypeResolution::Value(Ti::Vector {
                            size: rows,
                            kind: crate::ScalarKind::Float,
                            width,
                        }),
                        (
                            &Ti::Vector { .. },
                            &Ti::Matrix { columns, width, .. },
                        ) => TypeResolution::Value(Ti::Vector {
                            size: columns,
                            kind: crate::ScalarKind::Float,
                            width,
                        }),
                        (&Ti::Scalar { .. }, &Ti::Vector { .. }) => res_right.clone(),
                        (&Ti::Vector { .. }, &Ti::Scalar { .. })
                        | (&Ti::Scalar { .. }, &Ti::Scalar { .. })
                        | (&Ti::Vector { .. }, &Ti::Vector { .. }) => res_left.clone(),
                        (&Ti::Scalar { .. }, &Ti::Matrix { .. }) => res_right.clone(),
                        (&Ti::Matrix { .. }, &Ti::Scalar { .. }) => res_left.clone(),
                        (tl, tr) => {
                            return Err(ResolveError::IncompatibleOperands(format!(
                                "{:?} * {:?}",
                                tl, tr
                            )))
                        }
                    }
                }
                crate::BinaryOperator::Equal
                | crate::BinaryOperator::NotEqual
                | crate::BinaryOperator::Less
                | crate::BinaryOperator::LessEqual
                | crate::BinaryOperator::Greater
                | crate::BinaryOperator::GreaterEqual => {
                    let bool_width = crate::BOOL_WIDTH;
                    match *past(left)?.inner_with(types) {
                        Ti::Scalar { .. } => TypeResolution::Value(Ti::Scalar {
                            kind: crate::ScalarKind::Bool,
                            width: bool_width,
                        }),
                        Ti::Vector { size, .. } => TypeResolution::Value(Ti::Vector {
                            size,
                            kind: crate::ScalarKind::Bool,
                            width: bool_width,
                        }),
                        ref other => {
                            return Err(ResolveError::IncompatibleOperands(format!(
                                "{:?} == {:?}",
                                other, op
                            )))
                        }
                    }
                }
                crate::BinaryOperator::LogicalAnd | crate::BinaryOperator::LogicalOr => {
                    past(left)?.clone()
                }
                crate::BinaryOperator::And
                | crate::BinaryOperator::ExclusiveOr
                | crate::BinaryOperator::InclusiveOr
                | crate::BinaryOperator::ShiftLeft
                | crate::BinaryOperator::ShiftRight => past(left)?.clone(),
            },
            crate::Expression::Select { accept, .. } => past(accept)?.clone(),
            crate::Expression::Derivative { expr, .. } => past(expr)?.clone(),
            crate::Expression::Relational { .. } => TypeResolution::Value(Ti::Scalar {
                kind: crate::ScalarKind::Bool,
                width: crate::BOOL_WIDTH,
            }),
            crate::Expression::Math { fun, arg, .. } => {
                use crate::MathFunction as Mf;
                let res_arg = past(arg)?;
                match fun {
                    Mf::Dot => match *res_arg.inner_with(types) {
                        Ti::Vector { kind, width, .. } => {
                            TypeResolution::Value(Ti::Scalar { kind, width })
                        }
                        ref other => {
                            return Err(ResolveError::IncompatibleOperands(format!(
                                "dot({:?})",
                                other
                            )))
                        }
                    },
                    Mf::Distance | Mf::Length => match *res_arg.inner_with(types) {
                        Ti::Scalar { kind, width } | Ti::Vector { kind, width, .. } => {
                            TypeResolution::Value(Ti::Scalar { kind, width })
                        }
                        ref other => {
                            return Err(ResolveError::IncompatibleOperands(format!(
                                "length({:?})",
                                other
                            )))
                        }
                    },
                    Mf::Transpose => match *res_arg.inner_with(types) {
                        Ti::Matrix {
                            columns,
                            rows,
                            width,
                        } => TypeResolution::Value(Ti::Matrix {
                            columns: rows,
                            rows: columns,
                            width,
                        }),
                        ref other => {
                            return Err(ResolveError::IncompatibleOperands(format!(
                                "transpose({:?})",
                                other
                            )))
                        }
                    },
                    Mf::Determinant => match *res_arg.inner_with(types) {
                        Ti::Matrix { width, .. } => TypeResolution::Value(Ti::Scalar {
                            kind: crate::ScalarKind::Float,
                            width,
                        }),
                        ref other => {
                            return Err(ResolveError::IncompatibleOperands(format!(
                                "determinant({:?})",
                                other
                            )))
                        }
                    },
                    Mf::Pack4x8snorm
                    | Mf::Pack4x8unorm
                    | Mf::Pack2x16snorm
                    | Mf::Pack2x16unorm
                    | Mf::Pack2x16float => TypeResolution::Value(Ti::Scalar {
                        kind: crate::ScalarKind::Uint,
                        width: 4,
                    }),
                    Mf::Unpack4x8snorm | Mf::Unpack4x8unorm => {
                        TypeResolution::Value(Ti::Vector {
                            size: crate::VectorSize::Quad,
                            kind: crate::ScalarKind::Float,
                            width: 4,
                        })
                    }
                    Mf::Unpack2x16snorm | Mf::Unpack2x16unorm | Mf::Unpack2x16float => {
                        TypeResolution::Value(Ti::Vector {
                            size: crate::VectorSize::Bi,
                            kind: crate::ScalarKind::Float,
                            width: 4,
                        })
                    }
                    _ => res_arg.clone(),
                }
            }
            crate::Expression::As {
                expr,
                kind,
                convert,
            } => match *past(expr)?.inner_with(types) {
                Ti::Scalar { width, .. } => TypeResolution::Value(Ti::Scalar {
                    kind,
                    width: convert.unwrap_or(width),
                }),
                Ti::Vector { size, width, .. } => TypeResolution::Value(Ti::Vector {
                    size,
                    kind,
                    width: convert.unwrap_or(width),
                }),
                ref other => {
                    return Err(ResolveError::IncompatibleOperands(format!(
                        "{:?} as {:?}",
                        other, kind
                    )))
                }
            },
            crate::Expression::CallResult(function) => {
                let fun = self.functions.try_get(function)?;
                let result = fun
                    .result
                    .as_ref()
                    .ok_or_else(|| ResolveError::FunctionReturnsVoid {
                        name: fun.name.clone(),
                    })?;
                TypeResolution::Handle(result.ty)
            }
            crate::Expression::AtomicResult { ty } => {
                types.check_contains_handle(ty)?;
                TypeResolution::Handle(ty)
            }
            crate::Expression::ArrayLength(_) => TypeResolution::Value(Ti::Scalar {
                kind: crate::ScalarKind::Uint,
                width: 4,
            }),
            crate::Expression::ImageSample {
                image,
                gather,
                depth_ref,
                ..
            } => match *past(image)?.inner_with(types) {
                Ti::Image { class, .. } => match class {
                    crate::ImageClass::Sampled { kind, .. } => {
                        TypeResolution::Value(Ti::Vector {
                            size: crate::VectorSize::Quad,
                            kind,
                            width: 4,
                        })
                    }
                    crate::ImageClass::Depth { .. } => {
                        // gather returns four texels, everything else a single
                        // comparison or depth value
                        if gather.is_some() {
                            TypeResolution::Value(Ti::Vector {
                                size: crate::VectorSize::Quad,
                                kind: crate::ScalarKind::Float,
                                width: 4,
                            })
                        } else {
                            let _ = depth_ref;
                            TypeResolution::Value(Ti::Scalar {
                                kind: crate::ScalarKind::Float,
                                width: 4,
                            })
                        }
                    }
                    crate::ImageClass::Storage { .. } => {
                        return Err(ResolveError::InvalidImage(image))
                    }
                },
                _ => return Err(ResolveError::InvalidImage(image)),
            },
            crate::Expression::ImageLoad { image, .. } => {
                match *past(image)?.inner_with(types) {
                    Ti::Image { class, .. } => match class {
                        crate::ImageClass::Sampled { kind, .. } => {
                            TypeResolution::Value(Ti::Vector {
                                size: crate::VectorSize::Quad,
                                kind,
                                width: 4,
                            })
                        }
                        crate::ImageClass::Depth { .. } => TypeResolution::Value(Ti::Scalar {
                            kind: crate::ScalarKind::Float,
                            width: 4,
                        }),
                        crate::ImageClass::Storage { format, .. } => {
                            TypeResolution::Value(Ti::Vector {
                                size: crate::VectorSize::Quad,
                                kind: format.into(),
                                width: 4,
                            })
                        }
                    },
                    _ => return Err(ResolveError::InvalidImage(image)),
                }
            }
            crate::Expression::ImageQuery { image, query } => match query {
                crate::ImageQuery::Size { level: _ } => {
                    match *past(image)?.inner_with(types) {
                        Ti::Image { dim, .. } => match dim {
                            crate::ImageDimension::D1 => TypeResolution::Value(Ti::Scalar {
                                kind: crate::ScalarKind::Uint,
                                width: 4,
                            }),
                            crate::ImageDimension::D2 | crate::ImageDimension::Cube => {
                                TypeResolution::Value(Ti::Vector {
                                    size: crate::VectorSize::Bi,
                                    kind: crate::ScalarKind::Uint,
                                    width: 4,
                                })
                            }
                            crate::ImageDimension::D3 => TypeResolution::Value(Ti::Vector {
                                size: crate::VectorSize::Tri,
                                kind: crate::ScalarKind::Uint,
                                width: 4,
                            }),
                        },
                        _ => return Err(ResolveError::InvalidImage(image)),
                    }
                }
                crate::ImageQuery::NumLevels
                | crate::ImageQuery::NumLayers
                | crate::ImageQuery::NumSamples => TypeResolution::Value(Ti::Scalar {
                    kind: crate::ScalarKind::Uint,
                    width: 4,
                }),
            },
        })
    }
}

/// Helper processor that derives the types of all expressions in a function.
///
/// Resolutions are stored in a vector parallel to the expression arena, and
/// only ever appended to, so handing out the finished vector to
/// [`Function::expression_types`](crate::Function::expression_types) is
/// cheap.
#[derive(Debug, Default)]
pub struct Typifier {
    resolutions: Vec<TypeResolution>,
}

impl Typifier {
    pub fn new() -> Self {
        Typifier {
            resolutions: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.resolutions.clear()
    }

    pub fn get<'a>(
        &'a self,
        expr_handle: Handle<crate::Expression>,
        types: &'a UniqueArena<crate::Type>,
    ) -> &'a crate::TypeInner {
        self.resolutions[expr_handle.index()].inner_with(types)
    }

    pub fn get_resolution(&self, expr_handle: Handle<crate::Expression>) -> &TypeResolution {
        &self.resolutions[expr_handle.index()]
    }

    /// Replace an already computed resolution.
    ///
    /// Used by the front end when it rewrites an abstract literal in place.
    pub fn override_resolution(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        resolution: TypeResolution,
    ) {
        self.resolutions[expr_handle.index()] = resolution;
    }

    /// Resolve the types of all expressions up to and including `expr_handle`.
    pub fn grow(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        expressions: &Arena<crate::Expression>,
        ctx: &ResolveContext,
    ) -> Result<(), ResolveError> {
        if self.resolutions.len() <= expr_handle.index() {
            for (eh, expr) in expressions.iter().skip(self.resolutions.len()) {
                let resolutions = &self.resolutions;
                let resolution = ctx.resolve(expr, |h| {
                    resolutions
                        .get(h.index())
                        .ok_or(ResolveError::InvalidAccess { expr: eh })
                })?;
                self.resolutions.push(resolution);
            }
        }
        Ok(())
    }

    /// Hand over the resolutions, consuming the typifier.
    pub fn into_resolutions(self) -> Vec<TypeResolution> {
        self.resolutions
    }
}
