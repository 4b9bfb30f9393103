//! Module validation.
//!
//! The [`Validator`] walks a whole [`Module`](crate::Module) and collects
//! every violated invariant instead of stopping at the first one, so a
//! single run can report everything that is wrong with a module.

mod expression;
mod function;
mod interface;
mod r#type;

pub use expression::ExpressionError;
pub use function::FunctionError;
pub use interface::{EntryPointError, GlobalVariableError};
pub use r#type::TypeError;

use crate::arena::{BadHandle, Handle};
use crate::FastHashSet;

use bit_set::BitSet;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum ConstantError {
    #[error(transparent)]
    InvalidHandle(#[from] BadHandle),
    #[error("composite component {0:?} is not a valid constant")]
    CompositeComponent(Handle<crate::Constant>),
}

#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    #[error("type {handle:?} '{name}' is invalid: {source}")]
    Type {
        handle: Handle<crate::Type>,
        name: String,
        source: TypeError,
    },
    #[error("constant {handle:?} '{name}' is invalid: {source}")]
    Constant {
        handle: Handle<crate::Constant>,
        name: String,
        source: ConstantError,
    },
    #[error("global variable {handle:?} '{name}' is invalid: {source}")]
    GlobalVariable {
        handle: Handle<crate::GlobalVariable>,
        name: String,
        source: GlobalVariableError,
    },
    #[error("function {handle:?} '{name}' is invalid: {source}")]
    Function {
        handle: Handle<crate::Function>,
        name: String,
        source: FunctionError,
    },
    #[error("entry point {name} at {stage:?} is invalid: {source}")]
    EntryPoint {
        stage: crate::ShaderStage,
        name: String,
        source: EntryPointError,
    },
    #[error("function name '{0}' is declared twice")]
    DuplicateFunctionName(String),
    #[error("global variable name '{0}' is declared twice")]
    DuplicateGlobalName(String),
    #[error("resource binding {0:?} is used by two global variables")]
    DuplicateResourceBinding(crate::ResourceBinding),
}

/// Module validator.
///
/// The validator can be reused between modules; its internal scratch
/// allocations are kept around.
#[derive(Debug, Default)]
pub struct Validator {
    /// Set of expressions realised so far in the function being checked.
    valid_expression_set: BitSet,
}

impl Validator {
    pub fn new() -> Self {
        Validator {
            valid_expression_set: BitSet::new(),
        }
    }

    /// Check the given module to be valid.
    ///
    /// All violated invariants are returned, not just the first.
    pub fn validate(&mut self, module: &crate::Module) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (handle, ty) in module.types.iter() {
            if let Err(source) = r#type::validate_type(handle, ty, &module.types) {
                errors.push(ValidationError::Type {
                    handle,
                    name: ty.name.clone().unwrap_or_default(),
                    source,
                });
            }
        }

        for (handle, constant) in module.constants.iter() {
            if let Err(source) = self.validate_constant(handle, module) {
                errors.push(ValidationError::Constant {
                    handle,
                    name: constant.name.clone().unwrap_or_default(),
                    source,
                });
            }
        }

        let mut global_names = FastHashSet::default();
        let mut resource_bindings = FastHashSet::default();
        for (handle, var) in module.global_variables.iter() {
            if let Err(source) = interface::validate_global_var(var, &module.types) {
                errors.push(ValidationError::GlobalVariable {
                    handle,
                    name: var.name.clone().unwrap_or_default(),
                    source,
                });
            }
            if let Some(ref name) = var.name {
                if !global_names.insert(name.as_str()) {
                    errors.push(ValidationError::DuplicateGlobalName(name.clone()));
                }
            }
            if let Some(ref binding) = var.binding {
                if !resource_bindings.insert(binding.clone()) {
                    errors.push(ValidationError::DuplicateResourceBinding(binding.clone()));
                }
            }
        }

        let mut function_names = FastHashSet::default();
        for (handle, fun) in module.functions.iter() {
            if let Some(ref name) = fun.name {
                if !function_names.insert(name.as_str()) {
                    errors.push(ValidationError::DuplicateFunctionName(name.clone()));
                }
            }
            function::validate_function(
                fun,
                module,
                &mut self.valid_expression_set,
                &mut |source| {
                    errors.push(ValidationError::Function {
                        handle,
                        name: fun.name.clone().unwrap_or_default(),
                        source,
                    })
                },
            );
        }

        let mut entry_names = FastHashSet::default();
        for ep in module.entry_points.iter() {
            if let Err(source) = interface::validate_entry_point(ep, module, &mut entry_names) {
                errors.push(ValidationError::EntryPoint {
                    stage: ep.stage,
                    name: ep.name.clone(),
                    source,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_constant(
        &self,
        handle: Handle<crate::Constant>,
        module: &crate::Module,
    ) -> Result<(), ConstantError> {
        let constant = &module.constants[handle];
        module.types.check_contains_handle(constant.ty)?;
        if let crate::ConstantInner::Composite(ref components) = constant.inner {
            for &component in components {
                // components precede the composite in the arena
                if component >= handle {
                    return Err(ConstantError::CompositeComponent(component));
                }
                module.constants.check_contains_handle(component)?;
            }
        }
        Ok(())
    }
}
