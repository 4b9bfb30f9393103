//! Emission of function bodies: expressions and structured control flow.

use super::{instructions, Block, Error, Function, LocalType, LookupType, Writer};
use crate::arena::Handle;
use crate::proc::TypeResolution;

use spirv::{Op, Word};

/// The labels the innermost loop branches to.
#[derive(Clone, Copy, Default)]
pub(super) struct LoopContext {
    pub continuing_id: Option<Word>,
    pub break_id: Option<Word>,
}

/// How a block is terminated when it runs off its statements.
pub(super) enum BlockExit {
    Return,
    Branch {
        target: Word,
    },
    /// The continuing block of a loop, ending in a conditional break.
    BreakIf {
        condition: Handle<crate::Expression>,
        merge_id: Word,
        loop_header_id: Word,
    },
}

pub(super) struct BlockContext<'w> {
    pub ir_module: &'w crate::Module,
    pub ir_function: &'w crate::Function,
    pub function: &'w mut Function,
    pub writer: &'w mut Writer,
}

impl<'w> BlockContext<'w> {
    fn resolution(&self, handle: Handle<crate::Expression>) -> &TypeResolution {
        self.ir_function.expression_type(handle)
    }

    fn inner(&self, handle: Handle<crate::Expression>) -> &crate::TypeInner {
        self.resolution(handle).inner_with(&self.ir_module.types)
    }

    fn scalar_kind(&self, handle: Handle<crate::Expression>) -> Option<crate::ScalarKind> {
        self.inner(handle).scalar_kind()
    }

    fn is_pointer(&self, handle: Handle<crate::Expression>) -> bool {
        matches!(
            *self.inner(handle),
            crate::TypeInner::Pointer { .. } | crate::TypeInner::ValuePointer { .. }
        )
    }

    fn result_type_id(&mut self, handle: Handle<crate::Expression>) -> Result<Word, Error> {
        let resolution = self.ir_function.expression_type(handle);
        self.writer
            .get_expression_type_id(&self.ir_module.types, resolution)
    }

    /// The value type behind a pointer resolution.
    fn pointee_type_id(&mut self, handle: Handle<crate::Expression>) -> Result<Word, Error> {
        let lookup = match *self.inner(handle) {
            crate::TypeInner::Pointer { base, .. } => LookupType::Handle(base),
            crate::TypeInner::ValuePointer {
                size, kind, width, ..
            } => LookupType::Local(LocalType::Value {
                vector_size: size,
                kind,
                width,
                pointer_class: None,
            }),
            _ => return Err(Error::Validation("expected pointer expression")),
        };
        self.writer.get_type_id(&self.ir_module.types, lookup)
    }

    /// If the pointee of a pointer expression is an atomic, return its scope
    /// and semantics constants.
    fn atomic_context(
        &mut self,
        pointer: Handle<crate::Expression>,
    ) -> Result<Option<(Word, Word)>, Error> {
        let (base, space) = match *self.inner(pointer) {
            crate::TypeInner::Pointer { base, space } => (base, space),
            _ => return Ok(None),
        };
        match self.ir_module.types[base].inner {
            crate::TypeInner::Atomic { .. } => {}
            _ => return Ok(None),
        }
        // the scope follows the pointer's address space, not a fixed Device
        let (scope, semantics) = match space {
            crate::AddressSpace::WorkGroup => (
                spirv::Scope::Workgroup,
                spirv::MemorySemantics::WORKGROUP_MEMORY,
            ),
            _ => (
                spirv::Scope::Device,
                spirv::MemorySemantics::UNIFORM_MEMORY,
            ),
        };
        let scope_id = self.writer.get_index_constant(scope as u32);
        let semantics_id = self
            .writer
            .get_index_constant((spirv::MemorySemantics::ACQUIRE_RELEASE | semantics).bits());
        Ok(Some((scope_id, semantics_id)))
    }

    /// Return a **pointer** ID for a pointer-rooted expression.
    ///
    /// Valid only for expressions rooted in a variable: `LocalVariable`,
    /// `GlobalVariable`, and `Access`/`AccessIndex` chains over those. The
    /// chain collapses into a single `OpAccessChain`.
    pub(super) fn write_expression_pointer(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let result_type_id = self.result_type_id(expr_handle)?;
        let mut indices = Vec::new();
        let mut current = expr_handle;
        let root_id = loop {
            match self.ir_function.expressions[current] {
                crate::Expression::AccessIndex { base, index } => {
                    indices.push(self.writer.get_index_constant(index));
                    current = base;
                }
                crate::Expression::Access { base, index } => {
                    indices.push(self.cache_expression_value(index, block)?);
                    current = base;
                }
                crate::Expression::GlobalVariable(handle) => {
                    break self.writer.global_variables[handle.index()].id;
                }
                crate::Expression::LocalVariable(handle) => {
                    break self.function.variables[handle.index()].id;
                }
                _ => return Err(Error::Validation("access chain has no variable root")),
            }
        };
        if indices.is_empty() {
            return Ok(root_id);
        }
        indices.reverse();
        let id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_access_chain(
            result_type_id,
            id,
            root_id,
            &indices,
        ));
        Ok(id)
    }

    /// Return a **value** ID for an expression.
    ///
    /// For pointer-rooted expressions this inserts the load; results are
    /// cached so SSA-style reuse never re-emits an instruction.
    pub(super) fn cache_expression_value(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        if let Some(id) = self.writer.cached.get(expr_handle) {
            return Ok(id);
        }

        // the value/pointer duality: using a pointer-rooted expression as a
        // value loads it here
        if self.is_pointer(expr_handle) {
            let pointee_type_id = self.pointee_type_id(expr_handle)?;
            let pointer_id = self.write_expression_pointer(expr_handle, block)?;
            let id = self.writer.id_gen.next();
            block.body.push(instructions::instruction_load(
                pointee_type_id,
                id,
                pointer_id,
                None,
            ));
            self.writer.cached.set(expr_handle, id);
            return Ok(id);
        }

        let id = match self.ir_function.expressions[expr_handle] {
            crate::Expression::Literal(literal) => self.writer.get_constant_scalar(literal)?,
            crate::Expression::Constant(handle) => self.writer.constant_ids[handle.index()],
            crate::Expression::ZeroValue(ty) => {
                let type_id = self
                    .writer
                    .get_type_id(&self.ir_module.types, LookupType::Handle(ty))?;
                self.writer.get_constant_null(type_id)
            }
            crate::Expression::Compose {
                ty: _,
                ref components,
            } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let mut constituent_ids = Vec::with_capacity(components.len());
                for &component in components {
                    constituent_ids.push(self.cache_expression_value(component, block)?);
                }
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_composite_construct(
                    result_type_id,
                    id,
                    &constituent_ids,
                ));
                id
            }
            crate::Expression::Splat { size, value } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let value_id = self.cache_expression_value(value, block)?;
                let constituent_ids = vec![value_id; size as usize];
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_composite_construct(
                    result_type_id,
                    id,
                    &constituent_ids,
                ));
                id
            }
            crate::Expression::Swizzle {
                size,
                vector,
                pattern,
            } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let vector_id = self.cache_expression_value(vector, block)?;
                let components: Vec<Word> = pattern[..size as usize]
                    .iter()
                    .map(|component| component.index())
                    .collect();
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_vector_shuffle(
                    result_type_id,
                    id,
                    vector_id,
                    vector_id,
                    &components,
                ));
                id
            }
            crate::Expression::FunctionArgument(index) => self.function.parameter_id(index),
            crate::Expression::GlobalVariable(handle) => {
                // non-handle globals resolve as pointers and are caught above
                match self.writer.global_variables[handle.index()].handle_id {
                    0 => return Err(Error::Validation("handle global was not preloaded")),
                    id => id,
                }
            }
            crate::Expression::LocalVariable(_) => {
                return Err(Error::Validation("local variable must resolve as a pointer"))
            }
            crate::Expression::Load { pointer } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let pointer_id = self.write_expression_pointer(pointer, block)?;
                let id = self.writer.id_gen.next();
                match self.atomic_context(pointer)? {
                    Some((scope_id, semantics_id)) => {
                        block.body.push(instructions::instruction_atomic(
                            Op::AtomicLoad,
                            result_type_id,
                            id,
                            pointer_id,
                            scope_id,
                            &[semantics_id],
                            &[],
                        ));
                    }
                    None => {
                        block.body.push(instructions::instruction_load(
                            result_type_id,
                            id,
                            pointer_id,
                            None,
                        ));
                    }
                }
                id
            }
            crate::Expression::Access { base, index } => {
                // pointer-rooted chains were handled above, so the base is
                // a value here
                let result_type_id = self.result_type_id(expr_handle)?;
                let base_id = self.cache_expression_value(base, block)?;
                let index_id = self.cache_expression_value(index, block)?;
                match *self.inner(base) {
                    crate::TypeInner::Vector { .. } => {
                        let id = self.writer.id_gen.next();
                        block.body.push(instructions::instruction_binary(
                            Op::VectorExtractDynamic,
                            result_type_id,
                            id,
                            base_id,
                            index_id,
                        ));
                        id
                    }
                    _ => {
                        return Err(Error::FeatureNotImplemented(
                            "dynamic indexing of composite values",
                        ))
                    }
                }
            }
            crate::Expression::AccessIndex { base, index } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let base_id = self.cache_expression_value(base, block)?;
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_composite_extract(
                    result_type_id,
                    id,
                    base_id,
                    &[index],
                ));
                id
            }
            crate::Expression::Unary { op, expr } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let expr_id = self.cache_expression_value(expr, block)?;
                let spirv_op = match op {
                    crate::UnaryOperator::Negate => match self.scalar_kind(expr) {
                        Some(crate::ScalarKind::Float) => Op::FNegate,
                        Some(crate::ScalarKind::Sint) | Some(crate::ScalarKind::Uint) => {
                            Op::SNegate
                        }
                        _ => return Err(Error::Validation("cannot negate this type")),
                    },
                    crate::UnaryOperator::LogicalNot => Op::LogicalNot,
                    crate::UnaryOperator::BitwiseNot => Op::Not,
                };
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_unary(
                    spirv_op,
                    result_type_id,
                    id,
                    expr_id,
                ));
                id
            }
            crate::Expression::Binary { op, left, right } => {
                self.write_binary(expr_handle, op, left, right, block)?
            }
            crate::Expression::Select {
                condition,
                accept,
                reject,
            } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let condition_id = self.cache_expression_value(condition, block)?;
                let accept_id = self.cache_expression_value(accept, block)?;
                let reject_id = self.cache_expression_value(reject, block)?;
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_select(
                    result_type_id,
                    id,
                    condition_id,
                    accept_id,
                    reject_id,
                ));
                id
            }
            crate::Expression::Derivative { axis, ctrl, expr } => {
                use crate::{DerivativeAxis as Da, DerivativeControl as Dc};
                let result_type_id = self.result_type_id(expr_handle)?;
                let expr_id = self.cache_expression_value(expr, block)?;
                if ctrl != Dc::None {
                    self.writer.require_any(
                        "explicit derivative control",
                        &[spirv::Capability::DerivativeControl],
                    )?;
                }
                let op = match (axis, ctrl) {
                    (Da::X, Dc::None) => Op::DPdx,
                    (Da::X, Dc::Coarse) => Op::DPdxCoarse,
                    (Da::X, Dc::Fine) => Op::DPdxFine,
                    (Da::Y, Dc::None) => Op::DPdy,
                    (Da::Y, Dc::Coarse) => Op::DPdyCoarse,
                    (Da::Y, Dc::Fine) => Op::DPdyFine,
                    (Da::Width, Dc::None) => Op::Fwidth,
                    (Da::Width, Dc::Coarse) => Op::FwidthCoarse,
                    (Da::Width, Dc::Fine) => Op::FwidthFine,
                };
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_unary(
                    op,
                    result_type_id,
                    id,
                    expr_id,
                ));
                id
            }
            crate::Expression::Relational { fun, argument } => {
                let result_type_id = self.result_type_id(expr_handle)?;
                let argument_id = self.cache_expression_value(argument, block)?;
                let op = match fun {
                    crate::RelationalFunction::All => Op::All,
                    crate::RelationalFunction::Any => Op::Any,
                    crate::RelationalFunction::IsNan => Op::IsNan,
                    crate::RelationalFunction::IsInf => Op::IsInf,
                };
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_unary(
                    op,
                    result_type_id,
                    id,
                    argument_id,
                ));
                id
            }
            crate::Expression::Math {
                fun,
                arg,
                arg1,
                arg2,
                arg3,
            } => self.write_math(expr_handle, fun, arg, arg1, arg2, arg3, block)?,
            crate::Expression::As {
                expr,
                kind,
                convert,
            } => self.write_conversion(expr_handle, expr, kind, convert, block)?,
            crate::Expression::CallResult(_) | crate::Expression::AtomicResult { .. } => {
                return Err(Error::Validation("result expression was never bound"))
            }
            crate::Expression::ArrayLength(_) => {
                // runtime-sized arrays are the documented gap of this backend
                return Err(Error::FeatureNotImplemented("runtime-sized arrays"));
            }
            crate::Expression::ImageSample { .. } => {
                self.write_image_sample(expr_handle, block)?
            }
            crate::Expression::ImageLoad { .. } => self.write_image_load(expr_handle, block)?,
            crate::Expression::ImageQuery { image, query } => {
                self.write_image_query(expr_handle, image, query, block)?
            }
        };
        if self.writer.flags.contains(super::WriterFlags::DEBUG) {
            if let Some(name) = self.ir_function.named_expressions.get(&expr_handle) {
                self.writer
                    .debugs
                    .push(instructions::instruction_name(id, name));
            }
        }
        self.writer.cached.set(expr_handle, id);
        Ok(id)
    }

    fn write_binary(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        op: crate::BinaryOperator,
        left: Handle<crate::Expression>,
        right: Handle<crate::Expression>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        use crate::{BinaryOperator as Bo, ScalarKind as Sk, TypeInner as Ti};

        let result_type_id = self.result_type_id(expr_handle)?;
        let mut left_id = self.cache_expression_value(left, block)?;
        let mut right_id = self.cache_expression_value(right, block)?;
        let kind = self.scalar_kind(left).unwrap_or(Sk::Bool);

        enum Shape {
            Scalar,
            Vector(crate::VectorSize),
            Matrix,
        }
        let shape_of = |inner: &Ti| match *inner {
            Ti::Vector { size, .. } => Shape::Vector(size),
            Ti::Matrix { .. } => Shape::Matrix,
            _ => Shape::Scalar,
        };
        let left_shape = shape_of(self.inner(left));
        let right_shape = shape_of(self.inner(right));

        let spirv_op = match op {
            Bo::Add => match kind {
                Sk::Float => Op::FAdd,
                _ => Op::IAdd,
            },
            Bo::Subtract => match kind {
                Sk::Float => Op::FSub,
                _ => Op::ISub,
            },
            Bo::Multiply => match (left_shape, right_shape) {
                (Shape::Matrix, Shape::Matrix) => Op::MatrixTimesMatrix,
                (Shape::Matrix, Shape::Vector(_)) => Op::MatrixTimesVector,
                (Shape::Vector(_), Shape::Matrix) => Op::VectorTimesMatrix,
                (Shape::Matrix, Shape::Scalar) => Op::MatrixTimesScalar,
                (Shape::Scalar, Shape::Matrix) => {
                    std::mem::swap(&mut left_id, &mut right_id);
                    Op::MatrixTimesScalar
                }
                (Shape::Vector(_), Shape::Scalar) if kind == Sk::Float => Op::VectorTimesScalar,
                (Shape::Scalar, Shape::Vector(_)) if kind == Sk::Float => {
                    std::mem::swap(&mut left_id, &mut right_id);
                    Op::VectorTimesScalar
                }
                (Shape::Vector(size), Shape::Scalar) => {
                    // integer vector * scalar has no dedicated opcode;
                    // splat the scalar first
                    right_id = self.write_vector_splat(right, size, right_id, block)?;
                    Op::IMul
                }
                (Shape::Scalar, Shape::Vector(size)) => {
                    left_id = self.write_vector_splat(left, size, left_id, block)?;
                    Op::IMul
                }
                _ => match kind {
                    Sk::Float => Op::FMul,
                    _ => Op::IMul,
                },
            },
            Bo::Divide => match kind {
                Sk::Sint => Op::SDiv,
                Sk::Uint => Op::UDiv,
                _ => Op::FDiv,
            },
            Bo::Modulo => match kind {
                Sk::Sint => Op::SMod,
                Sk::Uint => Op::UMod,
                _ => Op::FRem,
            },
            Bo::Equal => match kind {
                Sk::Float => Op::FOrdEqual,
                Sk::Bool => Op::LogicalEqual,
                _ => Op::IEqual,
            },
            Bo::NotEqual => match kind {
                Sk::Float => Op::FOrdNotEqual,
                Sk::Bool => Op::LogicalNotEqual,
                _ => Op::INotEqual,
            },
            Bo::Less => match kind {
                Sk::Sint => Op::SLessThan,
                Sk::Uint => Op::ULessThan,
                _ => Op::FOrdLessThan,
            },
            Bo::LessEqual => match kind {
                Sk::Sint => Op::SLessThanEqual,
                Sk::Uint => Op::ULessThanEqual,
                _ => Op::FOrdLessThanEqual,
            },
            Bo::Greater => match kind {
                Sk::Sint => Op::SGreaterThan,
                Sk::Uint => Op::UGreaterThan,
                _ => Op::FOrdGreaterThan,
            },
            Bo::GreaterEqual => match kind {
                Sk::Sint => Op::SGreaterThanEqual,
                Sk::Uint => Op::UGreaterThanEqual,
                _ => Op::FOrdGreaterThanEqual,
            },
            Bo::And => Op::BitwiseAnd,
            Bo::ExclusiveOr => Op::BitwiseXor,
            Bo::InclusiveOr => Op::BitwiseOr,
            Bo::LogicalAnd => Op::LogicalAnd,
            Bo::LogicalOr => Op::LogicalOr,
            Bo::ShiftLeft => Op::ShiftLeftLogical,
            Bo::ShiftRight => match kind {
                Sk::Sint => Op::ShiftRightArithmetic,
                _ => Op::ShiftRightLogical,
            },
        };
        let id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_binary(
            spirv_op,
            result_type_id,
            id,
            left_id,
            right_id,
        ));
        Ok(id)
    }

    /// Splat a scalar value into a vector matching the scalar's type.
    fn write_vector_splat(
        &mut self,
        scalar: Handle<crate::Expression>,
        size: crate::VectorSize,
        scalar_id: Word,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let (kind, width) = match *self.inner(scalar) {
            crate::TypeInner::Scalar { kind, width } => (kind, width),
            _ => return Err(Error::Validation("splat of a non-scalar")),
        };
        let vector_type_id = self.writer.get_type_id(
            &self.ir_module.types,
            LookupType::Local(LocalType::Value {
                vector_size: Some(size),
                kind,
                width,
                pointer_class: None,
            }),
        )?;
        let id = self.writer.id_gen.next();
        let constituents = vec![scalar_id; size as usize];
        block.body.push(instructions::instruction_composite_construct(
            vector_type_id,
            id,
            &constituents,
        ));
        Ok(id)
    }

    fn write_math(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        fun: crate::MathFunction,
        arg: Handle<crate::Expression>,
        arg1: Option<Handle<crate::Expression>>,
        arg2: Option<Handle<crate::Expression>>,
        arg3: Option<Handle<crate::Expression>>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        use crate::{MathFunction as Mf, ScalarKind as Sk};
        use spirv::GLOp;

        let result_type_id = self.result_type_id(expr_handle)?;
        let arg_id = self.cache_expression_value(arg, block)?;
        let arg1_id = match arg1 {
            Some(handle) => Some(self.cache_expression_value(handle, block)?),
            None => None,
        };
        let arg2_id = match arg2 {
            Some(handle) => Some(self.cache_expression_value(handle, block)?),
            None => None,
        };
        let arg3_id = match arg3 {
            Some(handle) => Some(self.cache_expression_value(handle, block)?),
            None => None,
        };
        let kind = self.scalar_kind(arg).unwrap_or(Sk::Float);

        enum MathOp {
            Ext(GLOp),
            Custom(Op),
        }

        let math_op = match fun {
            Mf::Abs => match kind {
                Sk::Float => MathOp::Ext(GLOp::FAbs),
                Sk::Sint => MathOp::Ext(GLOp::SAbs),
                // `abs` on unsigned is an identity
                _ => return Ok(arg_id),
            },
            Mf::Min => MathOp::Ext(match kind {
                Sk::Float => GLOp::FMin,
                Sk::Sint => GLOp::SMin,
                _ => GLOp::UMin,
            }),
            Mf::Max => MathOp::Ext(match kind {
                Sk::Float => GLOp::FMax,
                Sk::Sint => GLOp::SMax,
                _ => GLOp::UMax,
            }),
            Mf::Clamp => MathOp::Ext(match kind {
                Sk::Float => GLOp::FClamp,
                Sk::Sint => GLOp::SClamp,
                _ => GLOp::UClamp,
            }),
            Mf::Saturate => {
                // clamp between zero and one, splatting for vectors
                let (size, width) = match *self.inner(arg) {
                    crate::TypeInner::Vector { size, width, .. } => (Some(size), width),
                    _ => (None, 4),
                };
                let literal_zero = if width == 8 {
                    crate::Literal::F64(0.0)
                } else {
                    crate::Literal::F32(0.0)
                };
                let literal_one = if width == 8 {
                    crate::Literal::F64(1.0)
                } else {
                    crate::Literal::F32(1.0)
                };
                let mut zero_id = self.writer.get_constant_scalar(literal_zero)?;
                let mut one_id = self.writer.get_constant_scalar(literal_one)?;
                if let Some(size) = size {
                    zero_id = self
                        .writer
                        .get_constant_splat(result_type_id, zero_id, size as usize);
                    one_id = self
                        .writer
                        .get_constant_splat(result_type_id, one_id, size as usize);
                }
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_ext_inst(
                    self.writer.gl450_ext_inst_id,
                    GLOp::FClamp,
                    result_type_id,
                    id,
                    &[arg_id, zero_id, one_id],
                ));
                return Ok(id);
            }
            Mf::Cos => MathOp::Ext(GLOp::Cos),
            Mf::Cosh => MathOp::Ext(GLOp::Cosh),
            Mf::Sin => MathOp::Ext(GLOp::Sin),
            Mf::Sinh => MathOp::Ext(GLOp::Sinh),
            Mf::Tan => MathOp::Ext(GLOp::Tan),
            Mf::Tanh => MathOp::Ext(GLOp::Tanh),
            Mf::Acos => MathOp::Ext(GLOp::Acos),
            Mf::Asin => MathOp::Ext(GLOp::Asin),
            Mf::Atan => MathOp::Ext(GLOp::Atan),
            Mf::Atan2 => MathOp::Ext(GLOp::Atan2),
            Mf::Asinh => MathOp::Ext(GLOp::Asinh),
            Mf::Acosh => MathOp::Ext(GLOp::Acosh),
            Mf::Atanh => MathOp::Ext(GLOp::Atanh),
            Mf::Radians => MathOp::Ext(GLOp::Radians),
            Mf::Degrees => MathOp::Ext(GLOp::Degrees),
            Mf::Ceil => MathOp::Ext(GLOp::Ceil),
            Mf::Floor => MathOp::Ext(GLOp::Floor),
            // WGSL rounds half-way cases to even
            Mf::Round => MathOp::Ext(GLOp::RoundEven),
            Mf::Fract => MathOp::Ext(GLOp::Fract),
            Mf::Trunc => MathOp::Ext(GLOp::Trunc),
            Mf::Ldexp => MathOp::Ext(GLOp::Ldexp),
            Mf::Exp => MathOp::Ext(GLOp::Exp),
            Mf::Exp2 => MathOp::Ext(GLOp::Exp2),
            Mf::Log => MathOp::Ext(GLOp::Log),
            Mf::Log2 => MathOp::Ext(GLOp::Log2),
            Mf::Pow => MathOp::Ext(GLOp::Pow),
            Mf::Sqrt => MathOp::Ext(GLOp::Sqrt),
            Mf::InverseSqrt => MathOp::Ext(GLOp::InverseSqrt),
            Mf::Dot => match kind {
                Sk::Float => MathOp::Custom(Op::Dot),
                _ => {
                    // there is no integer dot product; expand it
                    return self.write_integer_dot(
                        expr_handle,
                        result_type_id,
                        arg,
                        arg_id,
                        arg1_id.ok_or(Error::Validation("dot needs two arguments"))?,
                        block,
                    );
                }
            },
            Mf::Cross => MathOp::Ext(GLOp::Cross),
            Mf::Distance => MathOp::Ext(GLOp::Distance),
            Mf::Length => MathOp::Ext(GLOp::Length),
            Mf::Normalize => MathOp::Ext(GLOp::Normalize),
            Mf::FaceForward => MathOp::Ext(GLOp::FaceForward),
            Mf::Reflect => MathOp::Ext(GLOp::Reflect),
            Mf::Refract => MathOp::Ext(GLOp::Refract),
            Mf::Sign => MathOp::Ext(match kind {
                Sk::Sint => GLOp::SSign,
                _ => GLOp::FSign,
            }),
            Mf::Fma => MathOp::Ext(GLOp::Fma),
            Mf::Mix => MathOp::Ext(GLOp::FMix),
            Mf::Step => MathOp::Ext(GLOp::Step),
            Mf::SmoothStep => MathOp::Ext(GLOp::SmoothStep),
            Mf::Transpose => MathOp::Custom(Op::Transpose),
            Mf::Determinant => MathOp::Ext(GLOp::Determinant),
            Mf::QuantizeToF16 => MathOp::Custom(Op::QuantizeToF16),
            Mf::CountOneBits => MathOp::Custom(Op::BitCount),
            Mf::ReverseBits => MathOp::Custom(Op::BitReverse),
            Mf::CountTrailingZeros => {
                // `FindILsb` returns -1 on zero; clamping against the bit
                // width gives the WGSL result
                let lsb_id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_ext_inst(
                    self.writer.gl450_ext_inst_id,
                    GLOp::FindILsb,
                    result_type_id,
                    lsb_id,
                    &[arg_id],
                ));
                let limit_id = self.bit_limit_constant(arg, 32, block)?;
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_ext_inst(
                    self.writer.gl450_ext_inst_id,
                    GLOp::UMin,
                    result_type_id,
                    id,
                    &[lsb_id, limit_id],
                ));
                return Ok(id);
            }
            Mf::CountLeadingZeros => {
                // 31 - msb; `FindUMsb` of zero is -1, which lands on 32
                let msb_id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_ext_inst(
                    self.writer.gl450_ext_inst_id,
                    GLOp::FindUMsb,
                    result_type_id,
                    msb_id,
                    &[arg_id],
                ));
                let limit_id = self.bit_limit_constant(arg, 31, block)?;
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_binary(
                    Op::ISub,
                    result_type_id,
                    id,
                    limit_id,
                    msb_id,
                ));
                return Ok(id);
            }
            Mf::ExtractBits => MathOp::Custom(match kind {
                Sk::Sint => Op::BitFieldSExtract,
                _ => Op::BitFieldUExtract,
            }),
            Mf::InsertBits => MathOp::Custom(Op::BitFieldInsert),
            Mf::FirstTrailingBit => MathOp::Ext(GLOp::FindILsb),
            Mf::FirstLeadingBit => MathOp::Ext(match kind {
                Sk::Sint => GLOp::FindSMsb,
                _ => GLOp::FindUMsb,
            }),
            Mf::Pack4x8snorm => MathOp::Ext(GLOp::PackSnorm4x8),
            Mf::Pack4x8unorm => MathOp::Ext(GLOp::PackUnorm4x8),
            Mf::Pack2x16snorm => MathOp::Ext(GLOp::PackSnorm2x16),
            Mf::Pack2x16unorm => MathOp::Ext(GLOp::PackUnorm2x16),
            Mf::Pack2x16float => MathOp::Ext(GLOp::PackHalf2x16),
            Mf::Unpack4x8snorm => MathOp::Ext(GLOp::UnpackSnorm4x8),
            Mf::Unpack4x8unorm => MathOp::Ext(GLOp::UnpackUnorm4x8),
            Mf::Unpack2x16snorm => MathOp::Ext(GLOp::UnpackSnorm2x16),
            Mf::Unpack2x16unorm => MathOp::Ext(GLOp::UnpackUnorm2x16),
            Mf::Unpack2x16float => MathOp::Ext(GLOp::UnpackHalf2x16),
        };

        let id = self.writer.id_gen.next();
        self.writer.temp_list.clear();
        self.writer.temp_list.push(arg_id);
        self.writer.temp_list.extend(arg1_id);
        self.writer.temp_list.extend(arg2_id);
        self.writer.temp_list.extend(arg3_id);
        let operands = std::mem::take(&mut self.writer.temp_list);
        match math_op {
            MathOp::Ext(op) => {
                block.body.push(instructions::instruction_ext_inst(
                    self.writer.gl450_ext_inst_id,
                    op,
                    result_type_id,
                    id,
                    &operands,
                ));
            }
            MathOp::Custom(op) => {
                let mut instruction = super::Instruction::new(op);
                instruction.set_type(result_type_id);
                instruction.set_result(id);
                for operand in &operands {
                    instruction.add_operand(*operand);
                }
                block.body.push(instruction);
            }
        }
        self.writer.temp_list = operands;
        Ok(id)
    }

    /// A constant with the shape of `arg` whose components are all `value`.
    fn bit_limit_constant(
        &mut self,
        arg: Handle<crate::Expression>,
        value: u32,
        _block: &mut Block,
    ) -> Result<Word, Error> {
        let scalar_id = self.writer.get_index_constant(value);
        match *self.inner(arg) {
            crate::TypeInner::Vector { size, kind, width } => {
                let vector_type_id = self.writer.get_type_id(
                    &self.ir_module.types,
                    LookupType::Local(LocalType::Value {
                        vector_size: Some(size),
                        kind,
                        width,
                        pointer_class: None,
                    }),
                )?;
                Ok(self
                    .writer
                    .get_constant_splat(vector_type_id, scalar_id, size as usize))
            }
            _ => Ok(scalar_id),
        }
    }

    /// The integer dot product, expanded per component.
    fn write_integer_dot(
        &mut self,
        _expr_handle: Handle<crate::Expression>,
        result_type_id: Word,
        arg: Handle<crate::Expression>,
        arg_id: Word,
        arg1_id: Word,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let size = match *self.inner(arg) {
            crate::TypeInner::Vector { size, .. } => size as u32,
            _ => return Err(Error::Validation("dot of a non-vector")),
        };
        let mut accumulator = 0;
        for index in 0..size {
            let left_lane = self.writer.id_gen.next();
            block.body.push(instructions::instruction_composite_extract(
                result_type_id,
                left_lane,
                arg_id,
                &[index],
            ));
            let right_lane = self.writer.id_gen.next();
            block.body.push(instructions::instruction_composite_extract(
                result_type_id,
                right_lane,
                arg1_id,
                &[index],
            ));
            let product = self.writer.id_gen.next();
            block.body.push(instructions::instruction_binary(
                Op::IMul,
                result_type_id,
                product,
                left_lane,
                right_lane,
            ));
            accumulator = if index == 0 {
                product
            } else {
                let sum = self.writer.id_gen.next();
                block.body.push(instructions::instruction_binary(
                    Op::IAdd,
                    result_type_id,
                    sum,
                    accumulator,
                    product,
                ));
                sum
            };
        }
        Ok(accumulator)
    }

    fn write_conversion(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        expr: Handle<crate::Expression>,
        kind: crate::ScalarKind,
        convert: Option<crate::Bytes>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        use crate::ScalarKind as Sk;
        let result_type_id = self.result_type_id(expr_handle)?;
        let expr_id = self.cache_expression_value(expr, block)?;
        let (src_kind, src_width, src_size) = match *self.inner(expr) {
            crate::TypeInner::Scalar { kind, width } => (kind, width, None),
            crate::TypeInner::Vector { kind, width, size } => (kind, width, Some(size)),
            _ => return Err(Error::Validation("cannot cast this type")),
        };

        let op = match convert {
            None => {
                if src_kind == kind {
                    return Ok(expr_id);
                }
                Op::Bitcast
            }
            Some(dst_width) => match (src_kind, kind) {
                (Sk::Float, Sk::Float) => {
                    if src_width == dst_width {
                        return Ok(expr_id);
                    }
                    Op::FConvert
                }
                (Sk::Sint, Sk::Float) => Op::ConvertSToF,
                (Sk::Uint, Sk::Float) => Op::ConvertUToF,
                (Sk::Float, Sk::Sint) => Op::ConvertFToS,
                (Sk::Float, Sk::Uint) => Op::ConvertFToU,
                (Sk::Sint, Sk::Sint) => {
                    if src_width == dst_width {
                        return Ok(expr_id);
                    }
                    Op::SConvert
                }
                (Sk::Uint, Sk::Uint) => {
                    if src_width == dst_width {
                        return Ok(expr_id);
                    }
                    Op::UConvert
                }
                (Sk::Sint, Sk::Uint) | (Sk::Uint, Sk::Sint) => Op::Bitcast,
                (Sk::Bool, Sk::Bool) => return Ok(expr_id),
                (Sk::Bool, _) => {
                    // booleans convert through a select between one and zero
                    let (one, zero) = match (kind, dst_width) {
                        (Sk::Float, 8) => {
                            (crate::Literal::F64(1.0), crate::Literal::F64(0.0))
                        }
                        (Sk::Float, _) => {
                            (crate::Literal::F32(1.0), crate::Literal::F32(0.0))
                        }
                        (Sk::Uint, _) => (crate::Literal::U32(1), crate::Literal::U32(0)),
                        _ => (crate::Literal::I32(1), crate::Literal::I32(0)),
                    };
                    let mut one_id = self.writer.get_constant_scalar(one)?;
                    let mut zero_id = self.writer.get_constant_scalar(zero)?;
                    if let Some(size) = src_size {
                        one_id =
                            self.writer
                                .get_constant_splat(result_type_id, one_id, size as usize);
                        zero_id =
                            self.writer
                                .get_constant_splat(result_type_id, zero_id, size as usize);
                    }
                    let id = self.writer.id_gen.next();
                    block.body.push(instructions::instruction_select(
                        result_type_id,
                        id,
                        expr_id,
                        one_id,
                        zero_id,
                    ));
                    return Ok(id);
                }
                (_, Sk::Bool) => {
                    // a value is true when it differs from zero
                    let (op, zero) = match src_kind {
                        Sk::Float => (Op::FUnordNotEqual, crate::Literal::F32(0.0)),
                        _ => (Op::INotEqual, crate::Literal::U32(0)),
                    };
                    let mut zero_id = self.writer.get_constant_scalar(zero)?;
                    if let Some(size) = src_size {
                        let src_type_id = self.writer.get_type_id(
                            &self.ir_module.types,
                            LookupType::Local(LocalType::Value {
                                vector_size: Some(size),
                                kind: src_kind,
                                width: src_width,
                                pointer_class: None,
                            }),
                        )?;
                        zero_id =
                            self.writer
                                .get_constant_splat(src_type_id, zero_id, size as usize);
                    }
                    let id = self.writer.id_gen.next();
                    block.body.push(instructions::instruction_binary(
                        op,
                        result_type_id,
                        id,
                        expr_id,
                        zero_id,
                    ));
                    return Ok(id);
                }
            },
        };
        let id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_unary(
            op,
            result_type_id,
            id,
            expr_id,
        ));
        Ok(id)
    }

    /// Emit the instructions of one IR block into SPIR-V blocks, starting at
    /// `label_id` and honouring the structured control flow rules.
    pub(super) fn write_block(
        &mut self,
        label_id: Word,
        statements: &[crate::Statement],
        exit: BlockExit,
        loop_context: LoopContext,
    ) -> Result<(), Error> {
        let mut block = Block::new(label_id);

        for statement in statements {
            match *statement {
                crate::Statement::Emit(ref range) => {
                    for handle in range.clone() {
                        // pre-emitted and pointer expressions are realised
                        // on demand
                        if self.ir_function.expressions[handle].needs_pre_emit()
                            || self.is_pointer(handle)
                        {
                            continue;
                        }
                        self.cache_expression_value(handle, &mut block)?;
                    }
                }
                crate::Statement::Block(ref block_statements) => {
                    let scope_id = self.writer.id_gen.next();
                    self.function
                        .consume(block, instructions::instruction_branch(scope_id));
                    let merge_id = self.writer.id_gen.next();
                    self.write_block(
                        scope_id,
                        block_statements,
                        BlockExit::Branch { target: merge_id },
                        loop_context,
                    )?;
                    block = Block::new(merge_id);
                }
                crate::Statement::If {
                    condition,
                    ref accept,
                    ref reject,
                } => {
                    let condition_id = self.cache_expression_value(condition, &mut block)?;
                    if accept.is_empty() && reject.is_empty() {
                        // nothing to branch to; the condition was still
                        // evaluated for its side effects
                        continue;
                    }
                    let merge_id = self.writer.id_gen.next();
                    block.body.push(instructions::instruction_selection_merge(
                        merge_id,
                        spirv::SelectionControl::NONE,
                    ));
                    let accept_id = if accept.is_empty() {
                        merge_id
                    } else {
                        self.writer.id_gen.next()
                    };
                    let reject_id = if reject.is_empty() {
                        merge_id
                    } else {
                        self.writer.id_gen.next()
                    };
                    self.function.consume(
                        block,
                        instructions::instruction_branch_conditional(
                            condition_id,
                            accept_id,
                            reject_id,
                        ),
                    );
                    if accept_id != merge_id {
                        self.write_block(
                            accept_id,
                            accept,
                            BlockExit::Branch { target: merge_id },
                            loop_context,
                        )?;
                    }
                    if reject_id != merge_id {
                        self.write_block(
                            reject_id,
                            reject,
                            BlockExit::Branch { target: merge_id },
                            loop_context,
                        )?;
                    }
                    block = Block::new(merge_id);
                }
                crate::Statement::Switch {
                    selector,
                    ref cases,
                } => {
                    let selector_id = self.cache_expression_value(selector, &mut block)?;
                    let merge_id = self.writer.id_gen.next();
                    block.body.push(instructions::instruction_selection_merge(
                        merge_id,
                        spirv::SelectionControl::NONE,
                    ));
                    let case_ids: Vec<Word> =
                        cases.iter().map(|_| self.writer.id_gen.next()).collect();
                    let mut default_id = merge_id;
                    let mut targets = Vec::new();
                    for (case, &label) in cases.iter().zip(case_ids.iter()) {
                        match case.value {
                            crate::SwitchValue::I32(value) => {
                                targets.push((value as u32, label))
                            }
                            crate::SwitchValue::U32(value) => targets.push((value, label)),
                            crate::SwitchValue::Default => default_id = label,
                        }
                    }
                    self.function.consume(
                        block,
                        instructions::instruction_switch(selector_id, default_id, &targets),
                    );
                    let inner_context = LoopContext {
                        break_id: Some(merge_id),
                        ..loop_context
                    };
                    for (index, (case, &label)) in
                        cases.iter().zip(case_ids.iter()).enumerate()
                    {
                        let target = if case.fall_through {
                            match case_ids.get(index + 1) {
                                Some(&next) => next,
                                None => merge_id,
                            }
                        } else {
                            merge_id
                        };
                        self.write_block(
                            label,
                            &case.body,
                            BlockExit::Branch { target },
                            inner_context,
                        )?;
                    }
                    block = Block::new(merge_id);
                }
                crate::Statement::Loop {
                    ref body,
                    ref continuing,
                    break_if,
                } => {
                    let preamble_id = self.writer.id_gen.next();
                    self.function
                        .consume(block, instructions::instruction_branch(preamble_id));

                    let merge_id = self.writer.id_gen.next();
                    let body_id = self.writer.id_gen.next();
                    let continuing_id = self.writer.id_gen.next();

                    let mut header_block = Block::new(preamble_id);
                    header_block.body.push(instructions::instruction_loop_merge(
                        merge_id,
                        continuing_id,
                        spirv::LoopControl::NONE,
                    ));
                    self.function
                        .consume(header_block, instructions::instruction_branch(body_id));

                    self.write_block(
                        body_id,
                        body,
                        BlockExit::Branch {
                            target: continuing_id,
                        },
                        LoopContext {
                            continuing_id: Some(continuing_id),
                            break_id: Some(merge_id),
                        },
                    )?;

                    let continuing_exit = match break_if {
                        Some(condition) => BlockExit::BreakIf {
                            condition,
                            merge_id,
                            loop_header_id: preamble_id,
                        },
                        None => BlockExit::Branch {
                            target: preamble_id,
                        },
                    };
                    self.write_block(
                        continuing_id,
                        continuing,
                        continuing_exit,
                        LoopContext::default(),
                    )?;

                    block = Block::new(merge_id);
                }
                crate::Statement::Break => {
                    let break_id = loop_context
                        .break_id
                        .ok_or(Error::Validation("break outside of a loop"))?;
                    self.function
                        .consume(block, instructions::instruction_branch(break_id));
                    return Ok(());
                }
                crate::Statement::Continue => {
                    let continuing_id = loop_context
                        .continuing_id
                        .ok_or(Error::Validation("continue outside of a loop"))?;
                    self.function
                        .consume(block, instructions::instruction_branch(continuing_id));
                    return Ok(());
                }
                crate::Statement::Return { value } => {
                    let termination = self.write_return(value, &mut block)?;
                    self.function.consume(block, termination);
                    return Ok(());
                }
                crate::Statement::Kill => {
                    self.function
                        .consume(block, instructions::instruction_kill());
                    return Ok(());
                }
                crate::Statement::Barrier(flags) => {
                    self.write_barrier(flags, &mut block);
                }
                crate::Statement::Store { pointer, value } => {
                    let value_id = self.cache_expression_value(value, &mut block)?;
                    let pointer_id = self.write_expression_pointer(pointer, &mut block)?;
                    match self.atomic_context(pointer)? {
                        Some((scope_id, semantics_id)) => {
                            block.body.push(instructions::instruction_atomic_store(
                                pointer_id,
                                scope_id,
                                semantics_id,
                                value_id,
                            ));
                        }
                        None => {
                            block.body.push(instructions::instruction_store(
                                pointer_id, value_id, None,
                            ));
                        }
                    }
                }
                crate::Statement::ImageStore {
                    image,
                    coordinate,
                    array_index,
                    value,
                } => {
                    let image_id = self.cache_expression_value(image, &mut block)?;
                    let coordinate_id =
                        self.write_image_coordinates(coordinate, array_index, false, &mut block)?;
                    let value_id = self.cache_expression_value(value, &mut block)?;
                    block.body.push(instructions::instruction_image_write(
                        image_id,
                        coordinate_id,
                        value_id,
                    ));
                }
                crate::Statement::Atomic {
                    pointer,
                    ref fun,
                    value,
                    result,
                } => {
                    let id = self.write_atomic_statement(pointer, fun, value, &mut block)?;
                    if let Some(result) = result {
                        self.writer.cached.set(result, id);
                    }
                }
                crate::Statement::WorkGroupUniformLoad { pointer, result } => {
                    self.write_barrier(crate::Barrier::WORK_GROUP, &mut block);
                    let result_type_id = self.result_type_id(result)?;
                    let pointer_id = self.write_expression_pointer(pointer, &mut block)?;
                    let id = self.writer.id_gen.next();
                    block.body.push(instructions::instruction_load(
                        result_type_id,
                        id,
                        pointer_id,
                        None,
                    ));
                    self.writer.cached.set(result, id);
                    self.write_barrier(crate::Barrier::WORK_GROUP, &mut block);
                }
                crate::Statement::Call {
                    function,
                    ref arguments,
                    result,
                } => {
                    let mut argument_ids = Vec::with_capacity(arguments.len());
                    for &argument in arguments {
                        argument_ids.push(self.cache_expression_value(argument, &mut block)?);
                    }
                    let return_type_id = match self.ir_module.functions[function].result {
                        Some(ref result) => self
                            .writer
                            .get_type_id(&self.ir_module.types, LookupType::Handle(result.ty))?,
                        None => self.writer.get_void_type_id(),
                    };
                    let function_id = self.writer.lookup_function[&function];
                    let id = self.writer.id_gen.next();
                    block.body.push(instructions::instruction_function_call(
                        return_type_id,
                        id,
                        function_id,
                        &argument_ids,
                    ));
                    if let Some(result) = result {
                        self.writer.cached.set(result, id);
                    }
                }
            }
        }

        let termination = match exit {
            BlockExit::Return => match self.function.entry_point_context {
                // the entry point epilogue, and plain void returns
                Some(_) => instructions::instruction_return(),
                None => match self.ir_function.result {
                    // falling off the end of a value-returning function is
                    // unreachable in valid input
                    Some(_) => instructions::instruction_unreachable(),
                    None => instructions::instruction_return(),
                },
            },
            BlockExit::Branch { target } => instructions::instruction_branch(target),
            BlockExit::BreakIf {
                condition,
                merge_id,
                loop_header_id,
            } => {
                let condition_id = self.cache_expression_value(condition, &mut block)?;
                instructions::instruction_branch_conditional(
                    condition_id,
                    merge_id,
                    loop_header_id,
                )
            }
        };
        self.function.consume(block, termination);
        Ok(())
    }

    /// Build the termination of a `Return`, scattering entry point results
    /// into their output variables.
    fn write_return(
        &mut self,
        value: Option<Handle<crate::Expression>>,
        block: &mut Block,
    ) -> Result<super::Instruction, Error> {
        let has_epilogue = match self.function.entry_point_context {
            Some(ref context) => !context.results.is_empty(),
            None => false,
        };
        match value {
            Some(value) if has_epilogue => {
                let value_id = self.cache_expression_value(value, block)?;
                // borrow the members out to keep the borrow checker happy
                let context = self.function.entry_point_context.take().unwrap();
                if context.result_is_struct {
                    for (index, member) in context.results.iter().enumerate() {
                        let extract_id = self.writer.id_gen.next();
                        block.body.push(instructions::instruction_composite_extract(
                            member.type_id,
                            extract_id,
                            value_id,
                            &[index as u32],
                        ));
                        block
                            .body
                            .push(instructions::instruction_store(member.id, extract_id, None));
                    }
                } else {
                    block.body.push(instructions::instruction_store(
                        context.results[0].id,
                        value_id,
                        None,
                    ));
                }
                self.function.entry_point_context = Some(context);
                Ok(instructions::instruction_return())
            }
            Some(value) if self.function.entry_point_context.is_none() => {
                let value_id = self.cache_expression_value(value, block)?;
                Ok(instructions::instruction_return_value(value_id))
            }
            _ => Ok(instructions::instruction_return()),
        }
    }

    fn write_barrier(&mut self, flags: crate::Barrier, block: &mut Block) {
        let mut semantics = spirv::MemorySemantics::ACQUIRE_RELEASE;
        semantics.set(
            spirv::MemorySemantics::WORKGROUP_MEMORY,
            flags.contains(crate::Barrier::WORK_GROUP),
        );
        semantics.set(
            spirv::MemorySemantics::UNIFORM_MEMORY,
            flags.contains(crate::Barrier::STORAGE),
        );
        semantics.set(
            spirv::MemorySemantics::IMAGE_MEMORY,
            flags.contains(crate::Barrier::TEXTURE),
        );
        let exec_scope_id = self.writer.get_index_constant(spirv::Scope::Workgroup as u32);
        let mem_scope_id = self.writer.get_index_constant(spirv::Scope::Workgroup as u32);
        let semantics_id = self.writer.get_index_constant(semantics.bits());
        block.body.push(instructions::instruction_control_barrier(
            exec_scope_id,
            mem_scope_id,
            semantics_id,
        ));
    }

    fn write_atomic_statement(
        &mut self,
        pointer: Handle<crate::Expression>,
        fun: &crate::AtomicFunction,
        value: Handle<crate::Expression>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let (scope_id, semantics_id) = self
            .atomic_context(pointer)?
            .ok_or(Error::Validation("atomic on a non-atomic pointer"))?;
        let kind = self
            .inner(value)
            .scalar_kind()
            .ok_or(Error::Validation("atomic value must be scalar"))?;
        let result_type_id = self.result_type_id(value)?;
        let pointer_id = self.write_expression_pointer(pointer, block)?;
        let value_id = self.cache_expression_value(value, block)?;
        let id = self.writer.id_gen.next();
        let instruction = match *fun {
            crate::AtomicFunction::Add => instructions::instruction_atomic(
                Op::AtomicIAdd,
                result_type_id,
                id,
                pointer_id,
                scope_id,
                &[semantics_id],
                &[value_id],
            ),
            crate::AtomicFunction::Subtract => instructions::instruction_atomic(
                Op::AtomicISub,
                result_type_id,
                id,
                pointer_id,
                scope_id,
                &[semantics_id],
                &[value_id],
            ),
            crate::AtomicFunction::And => instructions::instruction_atomic(
                Op::AtomicAnd,
                result_type_id,
                id,
                pointer_id,
                scope_id,
                &[semantics_id],
                &[value_id],
            ),
            crate::AtomicFunction::ExclusiveOr => instructions::instruction_atomic(
                Op::AtomicXor,
                result_type_id,
                id,
                pointer_id,
                scope_id,
                &[semantics_id],
                &[value_id],
            ),
            crate::AtomicFunction::InclusiveOr => instructions::instruction_atomic(
                Op::AtomicOr,
                result_type_id,
                id,
                pointer_id,
                scope_id,
                &[semantics_id],
                &[value_id],
            ),
            crate::AtomicFunction::Min => {
                let op = match kind {
                    crate::ScalarKind::Sint => Op::AtomicSMin,
                    _ => Op::AtomicUMin,
                };
                instructions::instruction_atomic(
                    op,
                    result_type_id,
                    id,
                    pointer_id,
                    scope_id,
                    &[semantics_id],
                    &[value_id],
                )
            }
            crate::AtomicFunction::Max => {
                let op = match kind {
                    crate::ScalarKind::Sint => Op::AtomicSMax,
                    _ => Op::AtomicUMax,
                };
                instructions::instruction_atomic(
                    op,
                    result_type_id,
                    id,
                    pointer_id,
                    scope_id,
                    &[semantics_id],
                    &[value_id],
                )
            }
            crate::AtomicFunction::Exchange { compare: None } => {
                instructions::instruction_atomic(
                    Op::AtomicExchange,
                    result_type_id,
                    id,
                    pointer_id,
                    scope_id,
                    &[semantics_id],
                    &[value_id],
                )
            }
            crate::AtomicFunction::Exchange {
                compare: Some(compare),
            } => {
                let compare_id = self.cache_expression_value(compare, block)?;
                instructions::instruction_atomic(
                    Op::AtomicCompareExchange,
                    result_type_id,
                    id,
                    pointer_id,
                    scope_id,
                    // "equal" and "unequal" semantics
                    &[semantics_id, semantics_id],
                    &[value_id, compare_id],
                )
            }
        };
        block.body.push(instruction);
        Ok(id)
    }
}

// Image operations.
impl<'w> BlockContext<'w> {
    /// Combine a coordinate with an optional array index into the vector
    /// the image instruction expects.
    fn write_image_coordinates(
        &mut self,
        coordinate: Handle<crate::Expression>,
        array_index: Option<Handle<crate::Expression>>,
        for_sample: bool,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let coordinate_id = self.cache_expression_value(coordinate, block)?;
        let array_index = match array_index {
            Some(array_index) => array_index,
            None => return Ok(coordinate_id),
        };
        let (size, kind, width) = match *self.inner(coordinate) {
            crate::TypeInner::Scalar { kind, width } => (1, kind, width),
            crate::TypeInner::Vector { size, kind, width } => (size as u32, kind, width),
            _ => return Err(Error::Validation("invalid image coordinate type")),
        };
        let mut index_id = self.cache_expression_value(array_index, block)?;
        let index_kind = self
            .scalar_kind(array_index)
            .ok_or(Error::Validation("invalid array index type"))?;
        let component_kind = if for_sample {
            // the layer joins a floating-point coordinate
            if index_kind != crate::ScalarKind::Float {
                let float_type_id = self.writer.get_type_id(
                    &self.ir_module.types,
                    LookupType::Local(LocalType::Value {
                        vector_size: None,
                        kind: crate::ScalarKind::Float,
                        width: 4,
                        pointer_class: None,
                    }),
                )?;
                let op = match index_kind {
                    crate::ScalarKind::Uint => Op::ConvertUToF,
                    _ => Op::ConvertSToF,
                };
                let converted = self.writer.id_gen.next();
                block.body.push(instructions::instruction_unary(
                    op,
                    float_type_id,
                    converted,
                    index_id,
                ));
                index_id = converted;
            }
            crate::ScalarKind::Float
        } else {
            if index_kind != kind {
                let int_type_id = self.writer.get_type_id(
                    &self.ir_module.types,
                    LookupType::Local(LocalType::Value {
                        vector_size: None,
                        kind,
                        width,
                        pointer_class: None,
                    }),
                )?;
                let converted = self.writer.id_gen.next();
                block.body.push(instructions::instruction_unary(
                    Op::Bitcast,
                    int_type_id,
                    converted,
                    index_id,
                ));
                index_id = converted;
            }
            kind
        };
        let combined_size = match size + 1 {
            2 => crate::VectorSize::Bi,
            3 => crate::VectorSize::Tri,
            _ => crate::VectorSize::Quad,
        };
        let combined_type_id = self.writer.get_type_id(
            &self.ir_module.types,
            LookupType::Local(LocalType::Value {
                vector_size: Some(combined_size),
                kind: component_kind,
                width,
                pointer_class: None,
            }),
        )?;
        let id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_composite_construct(
            combined_type_id,
            id,
            &[coordinate_id, index_id],
        ));
        Ok(id)
    }

    fn vec4_type_id(&mut self, kind: crate::ScalarKind) -> Result<Word, Error> {
        self.writer.get_type_id(
            &self.ir_module.types,
            LookupType::Local(LocalType::Value {
                vector_size: Some(crate::VectorSize::Quad),
                kind,
                width: 4,
                pointer_class: None,
            }),
        )
    }

    fn write_image_sample(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let (image, sampler, gather, coordinate, array_index, offset, level, depth_ref, clamp_to_edge) =
            match self.ir_function.expressions[expr_handle] {
                crate::Expression::ImageSample {
                    image,
                    sampler,
                    gather,
                    coordinate,
                    array_index,
                    offset,
                    level,
                    depth_ref,
                    clamp_to_edge,
                } => (
                    image,
                    sampler,
                    gather,
                    coordinate,
                    array_index,
                    offset,
                    level,
                    depth_ref,
                    clamp_to_edge,
                ),
                _ => return Err(Error::Validation("not an image sample")),
            };

        let is_depth = matches!(
            *self.inner(image),
            crate::TypeInner::Image {
                class: crate::ImageClass::Depth { .. },
                ..
            }
        );
        let result_type_id = self.result_type_id(expr_handle)?;
        // depth samples produce a scalar, but the implicit-lod instructions
        // want a vector of four; sample wide and extract afterwards
        let needs_extract = is_depth && depth_ref.is_none() && gather.is_none();
        let sample_result_type_id = if needs_extract {
            self.vec4_type_id(crate::ScalarKind::Float)?
        } else {
            result_type_id
        };

        let image_id = self.cache_expression_value(image, block)?;
        let sampler_id = self.cache_expression_value(sampler, block)?;
        let image_type_resolution = self.resolution(image).clone();
        let image_type_id = self
            .writer
            .get_expression_type_id(&self.ir_module.types, &image_type_resolution)?;
        let sampled_image_type_id = self.writer.get_type_id(
            &self.ir_module.types,
            LookupType::Local(LocalType::SampledImage { image_type_id }),
        )?;
        let sampled_image_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_sampled_image(
            sampled_image_type_id,
            sampled_image_id,
            image_id,
            sampler_id,
        ));
        let mut coordinate_id =
            self.write_image_coordinates(coordinate, array_index, true, block)?;

        if clamp_to_edge {
            coordinate_id = self.write_clamped_coordinate(image_id, coordinate, coordinate_id, block)?;
        }

        // assemble the opcode, the pre-mask operands, and the image operands
        let mut prior_operands = Vec::new();
        let mut mask = spirv::ImageOperands::empty();
        let mut mask_operands = Vec::new();

        let op = match (gather, depth_ref) {
            (Some(component), None) => {
                prior_operands.push(self.writer.get_index_constant(component.index()));
                Op::ImageGather
            }
            (Some(_), Some(reference)) => {
                prior_operands.push(self.cache_expression_value(reference, block)?);
                Op::ImageDrefGather
            }
            (None, Some(reference)) => {
                prior_operands.push(self.cache_expression_value(reference, block)?);
                match level {
                    crate::SampleLevel::Auto => Op::ImageSampleDrefImplicitLod,
                    crate::SampleLevel::Zero => {
                        let zero_id = self.writer.get_constant_scalar(crate::Literal::F32(0.0))?;
                        mask |= spirv::ImageOperands::LOD;
                        mask_operands.push(zero_id);
                        Op::ImageSampleDrefExplicitLod
                    }
                    crate::SampleLevel::Exact(lod) => {
                        mask |= spirv::ImageOperands::LOD;
                        let lod_id = self.cache_expression_value(lod, block)?;
                        mask_operands.push(lod_id);
                        Op::ImageSampleDrefExplicitLod
                    }
                    _ => {
                        return Err(Error::FeatureNotImplemented(
                            "biased or gradient depth sampling",
                        ))
                    }
                }
            }
            (None, None) => match level {
                crate::SampleLevel::Auto => Op::ImageSampleImplicitLod,
                crate::SampleLevel::Zero => {
                    let zero_id = self.writer.get_constant_scalar(crate::Literal::F32(0.0))?;
                    mask |= spirv::ImageOperands::LOD;
                    mask_operands.push(zero_id);
                    Op::ImageSampleExplicitLod
                }
                crate::SampleLevel::Exact(lod) => {
                    mask |= spirv::ImageOperands::LOD;
                    let lod_id = self.cache_expression_value(lod, block)?;
                    mask_operands.push(lod_id);
                    Op::ImageSampleExplicitLod
                }
                crate::SampleLevel::Bias(bias) => {
                    mask |= spirv::ImageOperands::BIAS;
                    let bias_id = self.cache_expression_value(bias, block)?;
                    mask_operands.push(bias_id);
                    Op::ImageSampleImplicitLod
                }
                crate::SampleLevel::Gradient { x, y } => {
                    mask |= spirv::ImageOperands::GRAD;
                    let x_id = self.cache_expression_value(x, block)?;
                    let y_id = self.cache_expression_value(y, block)?;
                    mask_operands.push(x_id);
                    mask_operands.push(y_id);
                    Op::ImageSampleExplicitLod
                }
            },
        };
        if let Some(offset) = offset {
            mask |= spirv::ImageOperands::CONST_OFFSET;
            mask_operands.push(self.writer.constant_ids[offset.index()]);
        }

        let mut extra_operands = prior_operands;
        if !mask.is_empty() {
            extra_operands.push(mask.bits());
            extra_operands.extend(mask_operands);
        }

        let sample_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_image_sample(
            op,
            sample_result_type_id,
            sample_id,
            sampled_image_id,
            coordinate_id,
            &extra_operands,
        ));

        if needs_extract {
            let id = self.writer.id_gen.next();
            block.body.push(instructions::instruction_composite_extract(
                result_type_id,
                id,
                sample_id,
                &[0],
            ));
            Ok(id)
        } else {
            Ok(sample_id)
        }
    }

    /// Clamp a 2D sampling coordinate half a texel away from the edges.
    fn write_clamped_coordinate(
        &mut self,
        image_id: Word,
        coordinate: Handle<crate::Expression>,
        coordinate_id: Word,
        block: &mut Block,
    ) -> Result<Word, Error> {
        match *self.inner(coordinate) {
            crate::TypeInner::Vector {
                size: crate::VectorSize::Bi,
                ..
            } => {}
            _ => {
                return Err(Error::FeatureNotImplemented(
                    "edge clamping of non-2d coordinates",
                ))
            }
        }
        self.writer
            .require_any("image size query", &[spirv::Capability::ImageQuery])?;
        let vec2u_id = self.writer.get_type_id(
            &self.ir_module.types,
            LookupType::Local(LocalType::Value {
                vector_size: Some(crate::VectorSize::Bi),
                kind: crate::ScalarKind::Uint,
                width: 4,
                pointer_class: None,
            }),
        )?;
        let vec2f_id = self.writer.get_type_id(
            &self.ir_module.types,
            LookupType::Local(LocalType::Value {
                vector_size: Some(crate::VectorSize::Bi),
                kind: crate::ScalarKind::Float,
                width: 4,
                pointer_class: None,
            }),
        )?;
        let zero_id = self.writer.get_index_constant(0);
        let size_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_image_query(
            Op::ImageQuerySizeLod,
            vec2u_id,
            size_id,
            image_id,
            &[zero_id],
        ));
        let size_float_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_unary(
            Op::ConvertUToF,
            vec2f_id,
            size_float_id,
            size_id,
        ));
        let half_scalar_id = self.writer.get_constant_scalar(crate::Literal::F32(0.5))?;
        let half_id = self.writer.get_constant_splat(vec2f_id, half_scalar_id, 2);
        let one_scalar_id = self.writer.get_constant_scalar(crate::Literal::F32(1.0))?;
        let one_id = self.writer.get_constant_splat(vec2f_id, one_scalar_id, 2);
        let half_texel_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_binary(
            Op::FDiv,
            vec2f_id,
            half_texel_id,
            half_id,
            size_float_id,
        ));
        let max_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_binary(
            Op::FSub,
            vec2f_id,
            max_id,
            one_id,
            half_texel_id,
        ));
        let id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_ext_inst(
            self.writer.gl450_ext_inst_id,
            spirv::GLOp::FClamp,
            vec2f_id,
            id,
            &[coordinate_id, half_texel_id, max_id],
        ));
        Ok(id)
    }

    fn write_image_load(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        block: &mut Block,
    ) -> Result<Word, Error> {
        let (image, coordinate, array_index, sample, level) =
            match self.ir_function.expressions[expr_handle] {
                crate::Expression::ImageLoad {
                    image,
                    coordinate,
                    array_index,
                    sample,
                    level,
                } => (image, coordinate, array_index, sample, level),
                _ => return Err(Error::Validation("not an image load")),
            };
        let class = match *self.inner(image) {
            crate::TypeInner::Image { class, .. } => class,
            _ => return Err(Error::Validation("not an image type")),
        };
        let result_type_id = self.result_type_id(expr_handle)?;
        let is_depth = matches!(class, crate::ImageClass::Depth { .. });
        let fetch_result_type_id = if is_depth {
            self.vec4_type_id(crate::ScalarKind::Float)?
        } else {
            result_type_id
        };

        let image_id = self.cache_expression_value(image, block)?;
        let coordinate_id =
            self.write_image_coordinates(coordinate, array_index, false, block)?;

        let mut mask = spirv::ImageOperands::empty();
        let mut mask_operands = Vec::new();
        if let Some(level) = level {
            mask |= spirv::ImageOperands::LOD;
            mask_operands.push(self.cache_expression_value(level, block)?);
        }
        if let Some(sample) = sample {
            mask |= spirv::ImageOperands::SAMPLE;
            mask_operands.push(self.cache_expression_value(sample, block)?);
        }
        let mut extra_operands = Vec::new();
        if !mask.is_empty() {
            extra_operands.push(mask.bits());
            extra_operands.extend(mask_operands);
        }

        let op = match class {
            crate::ImageClass::Storage { .. } => Op::ImageRead,
            _ => Op::ImageFetch,
        };
        let fetch_id = self.writer.id_gen.next();
        block.body.push(instructions::instruction_image_fetch(
            op,
            fetch_result_type_id,
            fetch_id,
            image_id,
            coordinate_id,
            &extra_operands,
        ));

        if is_depth {
            let id = self.writer.id_gen.next();
            block.body.push(instructions::instruction_composite_extract(
                result_type_id,
                id,
                fetch_id,
                &[0],
            ));
            Ok(id)
        } else {
            Ok(fetch_id)
        }
    }

    fn write_image_query(
        &mut self,
        expr_handle: Handle<crate::Expression>,
        image: Handle<crate::Expression>,
        query: crate::ImageQuery,
        block: &mut Block,
    ) -> Result<Word, Error> {
        self.writer
            .require_any("image queries", &[spirv::Capability::ImageQuery])?;
        let (dim, arrayed, class) = match *self.inner(image) {
            crate::TypeInner::Image {
                dim,
                arrayed,
                class,
            } => (dim, arrayed, class),
            _ => return Err(Error::Validation("not an image type")),
        };
        let result_type_id = self.result_type_id(expr_handle)?;
        let image_id = self.cache_expression_value(image, block)?;

        let uint_vector_id = |writer: &mut Writer,
                              types: &crate::UniqueArena<crate::Type>,
                              count: u32|
         -> Result<Word, Error> {
            let vector_size = match count {
                1 => None,
                2 => Some(crate::VectorSize::Bi),
                3 => Some(crate::VectorSize::Tri),
                _ => Some(crate::VectorSize::Quad),
            };
            writer.get_type_id(
                types,
                LookupType::Local(LocalType::Value {
                    vector_size,
                    kind: crate::ScalarKind::Uint,
                    width: 4,
                    pointer_class: None,
                }),
            )
        };

        let dim_count = match dim {
            crate::ImageDimension::D1 => 1,
            crate::ImageDimension::D2 | crate::ImageDimension::Cube => 2,
            crate::ImageDimension::D3 => 3,
        };
        let uses_lod = matches!(
            class,
            crate::ImageClass::Sampled { multi: false, .. }
                | crate::ImageClass::Depth { multi: false }
        );

        match query {
            crate::ImageQuery::Size { level } => {
                let total = dim_count + if arrayed { 1 } else { 0 };
                let query_type_id =
                    uint_vector_id(self.writer, &self.ir_module.types, total)?;
                let query_id = self.writer.id_gen.next();
                if uses_lod {
                    let lod_id = match level {
                        Some(level) => self.cache_expression_value(level, block)?,
                        None => self.writer.get_index_constant(0),
                    };
                    block.body.push(instructions::instruction_image_query(
                        Op::ImageQuerySizeLod,
                        query_type_id,
                        query_id,
                        image_id,
                        &[lod_id],
                    ));
                } else {
                    block.body.push(instructions::instruction_image_query(
                        Op::ImageQuerySize,
                        query_type_id,
                        query_id,
                        image_id,
                        &[],
                    ));
                }
                if !arrayed {
                    return Ok(query_id);
                }
                // crop the layer count off
                let id = self.writer.id_gen.next();
                if dim_count == 1 {
                    block.body.push(instructions::instruction_composite_extract(
                        result_type_id,
                        id,
                        query_id,
                        &[0],
                    ));
                } else {
                    let components: Vec<Word> = (0..dim_count).collect();
                    block.body.push(instructions::instruction_vector_shuffle(
                        result_type_id,
                        id,
                        query_id,
                        query_id,
                        &components,
                    ));
                }
                Ok(id)
            }
            crate::ImageQuery::NumLevels => {
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_image_query(
                    Op::ImageQueryLevels,
                    result_type_id,
                    id,
                    image_id,
                    &[],
                ));
                Ok(id)
            }
            crate::ImageQuery::NumLayers => {
                let total = dim_count + 1;
                let query_type_id =
                    uint_vector_id(self.writer, &self.ir_module.types, total)?;
                let query_id = self.writer.id_gen.next();
                if uses_lod {
                    let lod_id = self.writer.get_index_constant(0);
                    block.body.push(instructions::instruction_image_query(
                        Op::ImageQuerySizeLod,
                        query_type_id,
                        query_id,
                        image_id,
                        &[lod_id],
                    ));
                } else {
                    block.body.push(instructions::instruction_image_query(
                        Op::ImageQuerySize,
                        query_type_id,
                        query_id,
                        image_id,
                        &[],
                    ));
                }
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_composite_extract(
                    result_type_id,
                    id,
                    query_id,
                    &[dim_count],
                ));
                Ok(id)
            }
            crate::ImageQuery::NumSamples => {
                let id = self.writer.id_gen.next();
                block.body.push(instructions::instruction_image_query(
                    Op::ImageQuerySamples,
                    result_type_id,
                    id,
                    image_id,
                    &[],
                ));
                Ok(id)
            }
        }
    }
}
