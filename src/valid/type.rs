use crate::arena::{BadHandle, Handle, UniqueArena};
use crate::FastHashSet;

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum TypeError {
    #[error("the {0} of {1} bytes is not supported")]
    InvalidWidth(&'static str, crate::Bytes),
    #[error("atomics can only wrap 32 or 64 bit integers")]
    InvalidAtomic,
    #[error("array stride must not be zero")]
    ZeroStride,
    #[error("struct member {0} has no name")]
    UnnamedMember(u32),
    #[error("struct member name '{0}' is used twice")]
    DuplicateMemberName(String),
    #[error("{0:?} must be declared before it is referenced; cyclic types are not representable")]
    ForwardReference(Handle<crate::Type>),
    #[error("pointer-to-value types may not be registered in the module")]
    UnexpectedValuePointer,
    #[error(transparent)]
    InvalidHandle(#[from] BadHandle),
}

fn check_width(what: &'static str, kind: crate::ScalarKind, width: crate::Bytes) -> Result<(), TypeError> {
    let good = match kind {
        crate::ScalarKind::Bool => width == crate::BOOL_WIDTH,
        crate::ScalarKind::Float => matches!(width, 2 | 4 | 8),
        crate::ScalarKind::Sint | crate::ScalarKind::Uint => matches!(width, 1 | 2 | 4 | 8),
    };
    if good {
        Ok(())
    } else {
        Err(TypeError::InvalidWidth(what, width))
    }
}

/// Check a single type against the registry.
///
/// Inner handles must precede the type itself, which makes structural
/// cycles unrepresentable.
pub(super) fn validate_type(
    handle: Handle<crate::Type>,
    ty: &crate::Type,
    types: &UniqueArena<crate::Type>,
) -> Result<(), TypeError> {
    use crate::TypeInner as Ti;

    let check_backward = |inner: Handle<crate::Type>| {
        types.check_contains_handle(inner)?;
        if inner >= handle {
            Err(TypeError::ForwardReference(inner))
        } else {
            Ok(())
        }
    };

    match ty.inner {
        Ti::Scalar { kind, width } => check_width("scalar", kind, width),
        Ti::Vector { kind, width, .. } => check_width("vector scalar", kind, width),
        Ti::Matrix { width, .. } => check_width("matrix scalar", crate::ScalarKind::Float, width),
        Ti::Atomic { kind, width } => match kind {
            crate::ScalarKind::Sint | crate::ScalarKind::Uint if matches!(width, 4 | 8) => Ok(()),
            _ => Err(TypeError::InvalidAtomic),
        },
        Ti::Pointer { base, space: _ } => check_backward(base),
        Ti::ValuePointer { .. } => Err(TypeError::UnexpectedValuePointer),
        Ti::Array { base, size: _, stride } => {
            check_backward(base)?;
            if stride == 0 {
                return Err(TypeError::ZeroStride);
            }
            Ok(())
        }
        Ti::Struct { ref members, span: _ } => {
            let mut names = FastHashSet::default();
            for (index, member) in members.iter().enumerate() {
                check_backward(member.ty)?;
                match member.name {
                    Some(ref name) if !name.is_empty() => {
                        if !names.insert(name.as_str()) {
                            return Err(TypeError::DuplicateMemberName(name.clone()));
                        }
                    }
                    _ => return Err(TypeError::UnnamedMember(index as u32)),
                }
            }
            Ok(())
        }
        Ti::Image { .. } | Ti::Sampler { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScalarKind, Type, TypeInner};

    fn registry_with(inner: TypeInner) -> (Handle<Type>, UniqueArena<Type>) {
        let mut types = UniqueArena::new();
        let handle = types.insert(Type { name: None, inner });
        (handle, types)
    }

    #[test]
    fn rejects_bad_widths() {
        let (handle, types) = registry_with(TypeInner::Scalar {
            kind: ScalarKind::Bool,
            width: 4,
        });
        assert!(matches!(
            validate_type(handle, &types[handle], &types),
            Err(TypeError::InvalidWidth(..))
        ));

        let (handle, types) = registry_with(TypeInner::Scalar {
            kind: ScalarKind::Float,
            width: 3,
        });
        assert!(matches!(
            validate_type(handle, &types[handle], &types),
            Err(TypeError::InvalidWidth(..))
        ));
    }

    #[test]
    fn rejects_non_integer_atomic() {
        let (handle, types) = registry_with(TypeInner::Atomic {
            kind: ScalarKind::Float,
            width: 4,
        });
        assert!(matches!(
            validate_type(handle, &types[handle], &types),
            Err(TypeError::InvalidAtomic)
        ));
    }

    #[test]
    fn rejects_unnamed_member() {
        let mut types = UniqueArena::new();
        let scalar = types.insert(Type {
            name: None,
            inner: TypeInner::Scalar {
                kind: ScalarKind::Float,
                width: 4,
            },
        });
        let handle = types.insert(Type {
            name: Some("S".to_string()),
            inner: TypeInner::Struct {
                members: vec![crate::StructMember {
                    name: None,
                    ty: scalar,
                    binding: None,
                    offset: 0,
                }],
                span: 4,
            },
        });
        assert!(matches!(
            validate_type(handle, &types[handle], &types),
            Err(TypeError::UnnamedMember(0))
        ));
    }
}
