use crate::arena::{BadHandle, Handle};
use crate::proc::{ResolveContext, ResolveError, TypeResolution};

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum ExpressionError {
    #[error("operand {0:?} doesn't precede this expression")]
    ForwardOperand(Handle<crate::Expression>),
    #[error("function argument {0} is out of range")]
    FunctionArgumentOutOfRange(u32),
    #[error("swizzle component {0} is beyond the vector size")]
    SwizzleComponentOutOfRange(u32),
    #[error("composing pointers is not allowed")]
    ComposePointer,
    #[error("the stored type resolution disagrees with the resolver: {0:?} vs {1:?}")]
    ResolutionMismatch(TypeResolution, TypeResolution),
    #[error("type resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    InvalidHandle(#[from] BadHandle),
}

/// Check that every operand handle of `expression` precedes `handle`.
fn validate_operands(
    handle: Handle<crate::Expression>,
    expression: &crate::Expression,
) -> Result<(), ExpressionError> {
    use crate::Expression as Ex;
    let mut check = |operand: Handle<crate::Expression>| {
        if operand < handle {
            Ok(())
        } else {
            Err(ExpressionError::ForwardOperand(operand))
        }
    };
    match *expression {
        Ex::Literal(_)
        | Ex::Constant(_)
        | Ex::ZeroValue(_)
        | Ex::FunctionArgument(_)
        | Ex::GlobalVariable(_)
        | Ex::LocalVariable(_)
        | Ex::CallResult(_)
        | Ex::AtomicResult { .. } => Ok(()),
        Ex::Compose { ref components, .. } => {
            for &component in components {
                check(component)?;
            }
            Ok(())
        }
        Ex::Splat { value, .. } => check(value),
        Ex::Swizzle { vector, .. } => check(vector),
        Ex::Load { pointer } => check(pointer),
        Ex::Access { base, index } => {
            check(base)?;
            check(index)
        }
        Ex::AccessIndex { base, .. } => check(base),
        Ex::Unary { expr, .. } => check(expr),
        Ex::Binary { left, right, .. } => {
            check(left)?;
            check(right)
        }
        Ex::Select {
            condition,
            accept,
            reject,
        } => {
            check(condition)?;
            check(accept)?;
            check(reject)
        }
        Ex::Derivative { expr, .. } => check(expr),
        Ex::Relational { argument, .. } => check(argument),
        Ex::Math {
            arg,
            arg1,
            arg2,
            arg3,
            ..
        } => {
            check(arg)?;
            for operand in [arg1, arg2, arg3].iter().filter_map(|&op| op) {
                check(operand)?;
            }
            Ok(())
        }
        Ex::As { expr, .. } => check(expr),
        Ex::ArrayLength(pointer) => check(pointer),
        Ex::ImageSample {
            image,
            sampler,
            coordinate,
            array_index,
            level,
            depth_ref,
            ..
        } => {
            check(image)?;
            check(sampler)?;
            check(coordinate)?;
            if let Some(index) = array_index {
                check(index)?;
            }
            match level {
                crate::SampleLevel::Auto | crate::SampleLevel::Zero => {}
                crate::SampleLevel::Exact(h) | crate::SampleLevel::Bias(h) => check(h)?,
                crate::SampleLevel::Gradient { x, y } => {
                    check(x)?;
                    check(y)?;
                }
            }
            if let Some(reference) = depth_ref {
                check(reference)?;
            }
            Ok(())
        }
        Ex::ImageLoad {
            image,
            coordinate,
            array_index,
            sample,
            level,
        } => {
            check(image)?;
            check(coordinate)?;
            for operand in [array_index, sample, level].iter().filter_map(|&op| op) {
                check(operand)?;
            }
            Ok(())
        }
        Ex::ImageQuery { image, query } => {
            check(image)?;
            if let crate::ImageQuery::Size { level: Some(level) } = query {
                check(level)?;
            }
            Ok(())
        }
    }
}

/// Validate one expression of a function.
///
/// Beyond the structural checks, this re-runs the type resolver over the
/// expression and compares the outcome with the stored resolution, so the
/// front end's incremental typing cannot drift from the resolver.
pub(super) fn validate_expression(
    handle: Handle<crate::Expression>,
    fun: &crate::Function,
    module: &crate::Module,
) -> Result<(), ExpressionError> {
    use crate::Expression as Ex;
    let expression = &fun.expressions[handle];
    validate_operands(handle, expression)?;

    match *expression {
        Ex::Constant(constant) => {
            module.constants.check_contains_handle(constant)?;
        }
        Ex::ZeroValue(ty) => {
            module.types.check_contains_handle(ty)?;
        }
        Ex::Compose { ty, ref components } => {
            module.types.check_contains_handle(ty)?;
            for &component in components {
                match *fun.expression_type(component).inner_with(&module.types) {
                    crate::TypeInner::Pointer { .. } | crate::TypeInner::ValuePointer { .. } => {
                        return Err(ExpressionError::ComposePointer)
                    }
                    _ => {}
                }
            }
        }
        Ex::FunctionArgument(index) => {
            if index as usize >= fun.arguments.len() {
                return Err(ExpressionError::FunctionArgumentOutOfRange(index));
            }
        }
        Ex::GlobalVariable(variable) => {
            module.global_variables.check_contains_handle(variable)?;
        }
        Ex::LocalVariable(variable) => {
            fun.local_variables.check_contains_handle(variable)?;
        }
        Ex::Swizzle {
            size,
            vector,
            ref pattern,
        } => {
            let vector_size = match *fun.expression_type(vector).inner_with(&module.types) {
                crate::TypeInner::Vector { size, .. } => size as u32,
                _ => 0,
            };
            for component in pattern.iter().take(size as usize) {
                if component.index() >= vector_size {
                    return Err(ExpressionError::SwizzleComponentOutOfRange(
                        component.index(),
                    ));
                }
            }
        }
        Ex::CallResult(function) => {
            module.functions.check_contains_handle(function)?;
        }
        Ex::AtomicResult { ty } => {
            module.types.check_contains_handle(ty)?;
        }
        _ => {}
    }

    // round-trip property: the stored resolution must agree with the
    // resolver run over the same module
    let resolve_ctx = ResolveContext {
        constants: &module.constants,
        types: &module.types,
        global_vars: &module.global_variables,
        local_vars: &fun.local_variables,
        functions: &module.functions,
        arguments: &fun.arguments,
    };
    let recomputed = resolve_ctx.resolve(expression, |h| {
        fun.expression_types
            .get(h.index())
            .ok_or(ResolveError::InvalidAccess { expr: handle })
    })?;
    let stored = fun.expression_type(handle);
    let matches = match (stored, &recomputed) {
        (&TypeResolution::Handle(a), &TypeResolution::Handle(b)) => a == b,
        (resolution, recomputed) => {
            resolution.inner_with(&module.types) == recomputed.inner_with(&module.types)
        }
    };
    if !matches {
        return Err(ExpressionError::ResolutionMismatch(
            stored.clone(),
            recomputed,
        ));
    }
    Ok(())
}
