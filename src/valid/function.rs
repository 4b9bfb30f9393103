use super::expression::{self, ExpressionError};
use crate::arena::Handle;

use bit_set::BitSet;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum FunctionError {
    #[error("expression types are out of sync with the expression arena ({types} vs {expressions})")]
    ExpressionTypesOutOfSync { expressions: usize, types: usize },
    #[error("expression {handle:?} is invalid: {source}")]
    Expression {
        handle: Handle<crate::Expression>,
        source: ExpressionError,
    },
    #[error("emit range {0:?} is empty or out of bounds")]
    InvalidEmitRange(crate::Range<crate::Expression>),
    #[error("expression {0:?} is used before being realised by an emit or a statement")]
    ExpressionNotInScope(Handle<crate::Expression>),
    #[error("`break` used outside of a loop or switch")]
    BreakOutsideOfLoopOrSwitch,
    #[error("`continue` used outside of a loop")]
    ContinueOutsideOfLoop,
    #[error("`{0}` is not allowed in the continuing block of a loop")]
    ForbiddenInContinuing(&'static str),
    #[error("switch has {0} default cases, expected exactly one")]
    SwitchDefaultCount(usize),
    #[error("switch case value appears twice")]
    SwitchCaseDuplicate,
    #[error("the pointer of a store must be a pointer, got {0:?}")]
    InvalidStorePointer(Handle<crate::Expression>),
    #[error("atomic operation needs a pointer to an atomic, got {0:?}")]
    InvalidAtomicPointer(Handle<crate::Expression>),
    #[error("atomic result {0:?} is not an `AtomicResult` expression")]
    InvalidAtomicResult(Handle<crate::Expression>),
    #[error("call result {0:?} is not a `CallResult` of the callee")]
    InvalidCallResult(Handle<crate::Expression>),
    #[error("call has {found} arguments, the callee takes {expected}")]
    CallArgumentCount { expected: usize, found: usize },
    #[error("returning a value from a function with no result, or vice versa")]
    InvalidReturnValue,
    #[error("workgroup uniform load pointer must be in the workgroup address space")]
    InvalidWorkGroupUniformLoadPointer(Handle<crate::Expression>),
    #[error("local variable {0:?} has an initializer that is not constant-foldable")]
    NonConstantInitializer(Handle<crate::LocalVariable>),
}

/// What kind of block a statement is nested in.
#[derive(Clone, Copy, Default)]
struct BlockContext {
    in_loop: bool,
    in_switch: bool,
    in_continuing: bool,
}

struct FunctionValidator<'a> {
    fun: &'a crate::Function,
    module: &'a crate::Module,
    realised: &'a mut BitSet,
}

impl<'a> FunctionValidator<'a> {
    /// Check that an expression operand of a statement has been realised.
    fn check_in_scope(&self, handle: Handle<crate::Expression>) -> Result<(), FunctionError> {
        if self.fun.expressions[handle].needs_pre_emit() || self.realised.contains(handle.index())
        {
            Ok(())
        } else {
            Err(FunctionError::ExpressionNotInScope(handle))
        }
    }

    fn expression_is_pointer(&self, handle: Handle<crate::Expression>) -> bool {
        matches!(
            *self
                .fun
                .expression_type(handle)
                .inner_with(&self.module.types),
            crate::TypeInner::Pointer { .. } | crate::TypeInner::ValuePointer { .. }
        )
    }

    fn validate_block(
        &mut self,
        block: &[crate::Statement],
        context: BlockContext,
        errors: &mut impl FnMut(FunctionError),
    ) {
        use crate::Statement as St;
        for statement in block {
            match *statement {
                St::Emit(ref range) => {
                    let index_range = range.index_range();
                    if range.is_empty() || index_range.end > self.fun.expressions.len() {
                        errors(FunctionError::InvalidEmitRange(range.clone()));
                        continue;
                    }
                    for index in index_range {
                        self.realised.insert(index);
                    }
                }
                St::Block(ref inner) => {
                    self.validate_block(inner, context, errors);
                }
                St::If {
                    condition,
                    ref accept,
                    ref reject,
                } => {
                    if let Err(e) = self.check_in_scope(condition) {
                        errors(e);
                    }
                    self.validate_block(accept, context, errors);
                    self.validate_block(reject, context, errors);
                }
                St::Switch { selector, ref cases } => {
                    if let Err(e) = self.check_in_scope(selector) {
                        errors(e);
                    }
                    let defaults = cases
                        .iter()
                        .filter(|case| case.value == crate::SwitchValue::Default)
                        .count();
                    if defaults != 1 {
                        errors(FunctionError::SwitchDefaultCount(defaults));
                    }
                    let mut seen = Vec::new();
                    for case in cases {
                        match case.value {
                            crate::SwitchValue::Default => {}
                            value => {
                                if seen.contains(&value) {
                                    errors(FunctionError::SwitchCaseDuplicate);
                                }
                                seen.push(value);
                            }
                        }
                        let case_context = BlockContext {
                            in_switch: true,
                            ..context
                        };
                        self.validate_block(&case.body, case_context, errors);
                    }
                }
                St::Loop {
                    ref body,
                    ref continuing,
                    break_if,
                } => {
                    let body_context = BlockContext {
                        in_loop: true,
                        in_switch: false,
                        ..context
                    };
                    self.validate_block(body, body_context, errors);
                    let continuing_context = BlockContext {
                        in_loop: false,
                        in_switch: false,
                        in_continuing: true,
                    };
                    self.validate_block(continuing, continuing_context, errors);
                    if let Some(condition) = break_if {
                        if let Err(e) = self.check_in_scope(condition) {
                            errors(e);
                        }
                    }
                }
                St::Break => {
                    if context.in_continuing {
                        errors(FunctionError::ForbiddenInContinuing("break"));
                    } else if !context.in_loop && !context.in_switch {
                        errors(FunctionError::BreakOutsideOfLoopOrSwitch);
                    }
                }
                St::Continue => {
                    if context.in_continuing {
                        errors(FunctionError::ForbiddenInContinuing("continue"));
                    } else if !context.in_loop {
                        errors(FunctionError::ContinueOutsideOfLoop);
                    }
                }
                St::Return { value } => {
                    if context.in_continuing {
                        errors(FunctionError::ForbiddenInContinuing("return"));
                    }
                    match (value, self.fun.result.as_ref()) {
                        (Some(handle), Some(_)) => {
                            if let Err(e) = self.check_in_scope(handle) {
                                errors(e);
                            }
                        }
                        // entry points with flattened IO return through
                        // synthesised variables, so both must agree
                        (None, None) => {}
                        _ => errors(FunctionError::InvalidReturnValue),
                    }
                }
                St::Kill => {
                    if context.in_continuing {
                        errors(FunctionError::ForbiddenInContinuing("kill"));
                    }
                }
                St::Barrier(_) => {}
                St::Store { pointer, value } => {
                    if let Err(e) = self.check_in_scope(pointer) {
                        errors(e);
                    }
                    if let Err(e) = self.check_in_scope(value) {
                        errors(e);
                    }
                    if !self.expression_is_pointer(pointer) {
                        errors(FunctionError::InvalidStorePointer(pointer));
                    }
                }
                St::ImageStore {
                    image,
                    coordinate,
                    array_index,
                    value,
                } => {
                    for handle in [Some(image), Some(coordinate), array_index, Some(value)]
                        .iter()
                        .filter_map(|&h| h)
                    {
                        if let Err(e) = self.check_in_scope(handle) {
                            errors(e);
                        }
                    }
                }
                St::Atomic {
                    pointer,
                    ref fun,
                    value,
                    result,
                } => {
                    if let Err(e) = self.check_in_scope(pointer) {
                        errors(e);
                    }
                    if let Err(e) = self.check_in_scope(value) {
                        errors(e);
                    }
                    let pointee_is_atomic = match *self
                        .fun
                        .expression_type(pointer)
                        .inner_with(&self.module.types)
                    {
                        crate::TypeInner::Pointer { base, .. } => matches!(
                            self.module.types[base].inner,
                            crate::TypeInner::Atomic { .. }
                        ),
                        _ => false,
                    };
                    if !pointee_is_atomic {
                        errors(FunctionError::InvalidAtomicPointer(pointer));
                    }
                    if let crate::AtomicFunction::Exchange {
                        compare: Some(compare),
                    } = *fun
                    {
                        if let Err(e) = self.check_in_scope(compare) {
                            errors(e);
                        }
                    }
                    if let Some(result) = result {
                        match self.fun.expressions[result] {
                            crate::Expression::AtomicResult { .. } => {
                                self.realised.insert(result.index());
                            }
                            _ => errors(FunctionError::InvalidAtomicResult(result)),
                        }
                    }
                }
                St::WorkGroupUniformLoad { pointer, result } => {
                    if let Err(e) = self.check_in_scope(pointer) {
                        errors(e);
                    }
                    let space = self
                        .fun
                        .expression_type(pointer)
                        .inner_with(&self.module.types)
                        .pointer_space();
                    if space != Some(crate::AddressSpace::WorkGroup) {
                        errors(FunctionError::InvalidWorkGroupUniformLoadPointer(pointer));
                    }
                    self.realised.insert(result.index());
                }
                St::Call {
                    function,
                    ref arguments,
                    result,
                } => {
                    let callee = &self.module.functions[function];
                    if callee.arguments.len() != arguments.len() {
                        errors(FunctionError::CallArgumentCount {
                            expected: callee.arguments.len(),
                            found: arguments.len(),
                        });
                    }
                    for &argument in arguments {
                        if let Err(e) = self.check_in_scope(argument) {
                            errors(e);
                        }
                    }
                    if let Some(result) = result {
                        match self.fun.expressions[result] {
                            crate::Expression::CallResult(callee_handle)
                                if callee_handle == function =>
                            {
                                self.realised.insert(result.index());
                            }
                            _ => errors(FunctionError::InvalidCallResult(result)),
                        }
                    }
                }
            }
        }
    }
}

/// Validate one function, reporting all errors through the callback.
pub(super) fn validate_function(
    fun: &crate::Function,
    module: &crate::Module,
    realised: &mut BitSet,
    errors: &mut impl FnMut(FunctionError),
) {
    if fun.expression_types.len() != fun.expressions.len() {
        errors(FunctionError::ExpressionTypesOutOfSync {
            expressions: fun.expressions.len(),
            types: fun.expression_types.len(),
        });
        // everything below needs the parallel types
        return;
    }

    for (handle, _) in fun.expressions.iter() {
        if let Err(source) = expression::validate_expression(handle, fun, module) {
            errors(FunctionError::Expression { handle, source });
        }
    }

    for (handle, variable) in fun.local_variables.iter() {
        if let Some(init) = variable.init {
            let ok = matches!(
                fun.expressions[init],
                crate::Expression::Literal(_)
                    | crate::Expression::Constant(_)
                    | crate::Expression::ZeroValue(_)
            );
            if !ok {
                errors(FunctionError::NonConstantInitializer(handle));
            }
        }
    }

    realised.clear();
    let mut validator = FunctionValidator {
        fun,
        module,
        realised,
    };
    validator.validate_block(&fun.body, BlockContext::default(), errors);
}
