use crate::arena::{BadHandle, UniqueArena};
use crate::FastHashSet;

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum GlobalVariableError {
    #[error(transparent)]
    InvalidHandle(#[from] BadHandle),
    #[error("global variables may not live in the function address space")]
    InvalidUsage,
    #[error("type isn't compatible with the address space")]
    InvalidType,
    #[error("a resource binding is needed in this address space")]
    MissingBinding,
    #[error("a resource binding makes no sense in this address space")]
    UnexpectedBinding,
    #[error("initializers are only allowed in the private address space")]
    UnexpectedInitializer,
}

#[derive(Clone, Debug, Error)]
pub enum EntryPointError {
    #[error("entry point names must not be empty")]
    EmptyName,
    #[error("multiple entry points share the name")]
    DuplicateName,
    #[error(transparent)]
    InvalidHandle(#[from] BadHandle),
    #[error("workgroup size components must all be non-zero for compute")]
    InvalidWorkgroupSize,
    #[error("vertex shaders must produce a `position` builtin output")]
    MissingVertexPosition,
    #[error("argument {0} is missing a binding")]
    MissingArgumentBinding(u32),
    #[error("the result is missing a binding")]
    MissingResultBinding,
}

pub(super) fn validate_global_var(
    var: &crate::GlobalVariable,
    types: &UniqueArena<crate::Type>,
) -> Result<(), GlobalVariableError> {
    types.check_contains_handle(var.ty)?;
    let is_handle_type = matches!(
        types[var.ty].inner,
        crate::TypeInner::Image { .. } | crate::TypeInner::Sampler { .. }
    );
    let (needs_binding, allows_init) = match var.space {
        crate::AddressSpace::Function => return Err(GlobalVariableError::InvalidUsage),
        crate::AddressSpace::Private => {
            if is_handle_type {
                return Err(GlobalVariableError::InvalidType);
            }
            (false, true)
        }
        crate::AddressSpace::WorkGroup => {
            if is_handle_type {
                return Err(GlobalVariableError::InvalidType);
            }
            (false, false)
        }
        crate::AddressSpace::Uniform | crate::AddressSpace::Storage { .. } => {
            if is_handle_type {
                return Err(GlobalVariableError::InvalidType);
            }
            (true, false)
        }
        crate::AddressSpace::PushConstant => (false, false),
        crate::AddressSpace::Handle => {
            if !is_handle_type {
                return Err(GlobalVariableError::InvalidType);
            }
            (true, false)
        }
    };
    if needs_binding && var.binding.is_none() {
        return Err(GlobalVariableError::MissingBinding);
    }
    if !needs_binding && var.binding.is_some() {
        return Err(GlobalVariableError::UnexpectedBinding);
    }
    if var.init.is_some() && !allows_init {
        return Err(GlobalVariableError::UnexpectedInitializer);
    }
    Ok(())
}

/// Whether the binding of a result (directly or through struct members)
/// includes the `position` builtin.
fn produces_position(
    result: &crate::FunctionResult,
    types: &UniqueArena<crate::Type>,
) -> bool {
    match result.binding {
        Some(crate::Binding::BuiltIn(crate::BuiltIn::Position)) => true,
        Some(_) => false,
        None => match types[result.ty].inner {
            crate::TypeInner::Struct { ref members, .. } => members.iter().any(|member| {
                member.binding == Some(crate::Binding::BuiltIn(crate::BuiltIn::Position))
            }),
            _ => false,
        },
    }
}

fn io_is_fully_bound(
    binding: Option<&crate::Binding>,
    ty: crate::Handle<crate::Type>,
    types: &UniqueArena<crate::Type>,
) -> bool {
    match binding {
        Some(_) => true,
        None => match types[ty].inner {
            crate::TypeInner::Struct { ref members, .. } => {
                members.iter().all(|member| member.binding.is_some())
            }
            _ => false,
        },
    }
}

pub(super) fn validate_entry_point<'a>(
    ep: &'a crate::EntryPoint,
    module: &crate::Module,
    names: &mut FastHashSet<&'a str>,
) -> Result<(), EntryPointError> {
    if ep.name.is_empty() {
        return Err(EntryPointError::EmptyName);
    }
    if !names.insert(ep.name.as_str()) {
        return Err(EntryPointError::DuplicateName);
    }
    let fun = module.functions.try_get(ep.function)?;

    if let crate::ShaderStage::Compute = ep.stage {
        if ep.workgroup_size.iter().any(|&dimension| dimension == 0) {
            return Err(EntryPointError::InvalidWorkgroupSize);
        }
    }

    for (index, argument) in fun.arguments.iter().enumerate() {
        if !io_is_fully_bound(argument.binding.as_ref(), argument.ty, &module.types) {
            return Err(EntryPointError::MissingArgumentBinding(index as u32));
        }
    }
    if let Some(ref result) = fun.result {
        if !io_is_fully_bound(result.binding.as_ref(), result.ty, &module.types) {
            return Err(EntryPointError::MissingResultBinding);
        }
    }

    if let crate::ShaderStage::Vertex = ep.stage {
        let has_position = fun
            .result
            .as_ref()
            .map_or(false, |result| produces_position(result, &module.types));
        if !has_position {
            return Err(EntryPointError::MissingVertexPosition);
        }
    }

    Ok(())
}
