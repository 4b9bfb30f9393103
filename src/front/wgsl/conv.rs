//! Mappings from WGSL spellings to IR values.

use super::error::Error;
use crate::Span;

pub fn map_address_space(word: &str, span: Span) -> Result<crate::AddressSpace, Error<'_>> {
    match word {
        "function" => Ok(crate::AddressSpace::Function),
        "private" => Ok(crate::AddressSpace::Private),
        "workgroup" => Ok(crate::AddressSpace::WorkGroup),
        "uniform" => Ok(crate::AddressSpace::Uniform),
        "storage" => Ok(crate::AddressSpace::Storage {
            access: crate::StorageAccess::LOAD,
        }),
        "push_constant" => Ok(crate::AddressSpace::PushConstant),
        _ => Err(Error::UnknownAddressSpace(span, word)),
    }
}

pub fn map_access_mode(word: &str, span: Span) -> Result<crate::StorageAccess, Error<'_>> {
    match word {
        "read" => Ok(crate::StorageAccess::LOAD),
        "write" => Ok(crate::StorageAccess::STORE),
        "read_write" => Ok(crate::StorageAccess::LOAD | crate::StorageAccess::STORE),
        _ => Err(Error::UnknownAccessMode(span, word)),
    }
}

pub fn map_built_in(word: &str, span: Span) -> Result<crate::BuiltIn, Error<'_>> {
    match word {
        "position" => Ok(crate::BuiltIn::Position),
        // vertex
        "vertex_index" => Ok(crate::BuiltIn::VertexIndex),
        "instance_index" => Ok(crate::BuiltIn::InstanceIndex),
        // fragment
        "front_facing" => Ok(crate::BuiltIn::FrontFacing),
        "frag_depth" => Ok(crate::BuiltIn::FragDepth),
        "sample_index" => Ok(crate::BuiltIn::SampleIndex),
        "sample_mask" => Ok(crate::BuiltIn::SampleMask),
        // compute
        "global_invocation_id" => Ok(crate::BuiltIn::GlobalInvocationId),
        "local_invocation_id" => Ok(crate::BuiltIn::LocalInvocationId),
        "local_invocation_index" => Ok(crate::BuiltIn::LocalInvocationIndex),
        "workgroup_id" => Ok(crate::BuiltIn::WorkGroupId),
        "num_workgroups" => Ok(crate::BuiltIn::NumWorkGroups),
        _ => Err(Error::UnknownBuiltin(span, word)),
    }
}

pub fn get_scalar_type(word: &str) -> Option<(crate::ScalarKind, crate::Bytes)> {
    match word {
        "f32" => Some((crate::ScalarKind::Float, 4)),
        "f16" => Some((crate::ScalarKind::Float, 2)),
        "i32" => Some((crate::ScalarKind::Sint, 4)),
        "u32" => Some((crate::ScalarKind::Uint, 4)),
        "bool" => Some((crate::ScalarKind::Bool, crate::BOOL_WIDTH)),
        _ => None,
    }
}

pub fn map_storage_format(word: &str, span: Span) -> Result<crate::StorageFormat, Error<'_>> {
    use crate::StorageFormat as Sf;
    Ok(match word {
        "r8unorm" => Sf::R8Unorm,
        "r8snorm" => Sf::R8Snorm,
        "r8uint" => Sf::R8Uint,
        "r8sint" => Sf::R8Sint,
        "r16uint" => Sf::R16Uint,
        "r16sint" => Sf::R16Sint,
        "r16float" => Sf::R16Float,
        "rg8unorm" => Sf::Rg8Unorm,
        "rg8snorm" => Sf::Rg8Snorm,
        "rg8uint" => Sf::Rg8Uint,
        "rg8sint" => Sf::Rg8Sint,
        "r32uint" => Sf::R32Uint,
        "r32sint" => Sf::R32Sint,
        "r32float" => Sf::R32Float,
        "rg16uint" => Sf::Rg16Uint,
        "rg16sint" => Sf::Rg16Sint,
        "rg16float" => Sf::Rg16Float,
        "rgba8unorm" => Sf::Rgba8Unorm,
        "rgba8snorm" => Sf::Rgba8Snorm,
        "rgba8uint" => Sf::Rgba8Uint,
        "rgba8sint" => Sf::Rgba8Sint,
        "rgb10a2unorm" => Sf::Rgb10a2Unorm,
        "rg11b10float" => Sf::Rg11b10Float,
        "rg32uint" => Sf::Rg32Uint,
        "rg32sint" => Sf::Rg32Sint,
        "rg32float" => Sf::Rg32Float,
        "rgba16uint" => Sf::Rgba16Uint,
        "rgba16sint" => Sf::Rgba16Sint,
        "rgba16float" => Sf::Rgba16Float,
        "rgba32uint" => Sf::Rgba32Uint,
        "rgba32sint" => Sf::Rgba32Sint,
        "rgba32float" => Sf::Rgba32Float,
        _ => return Err(Error::UnknownStorageFormat(span, word)),
    })
}

pub fn get_math_function(word: &str) -> Option<crate::MathFunction> {
    use crate::MathFunction as Mf;
    Some(match word {
        "abs" => Mf::Abs,
        "min" => Mf::Min,
        "max" => Mf::Max,
        "clamp" => Mf::Clamp,
        "saturate" => Mf::Saturate,
        "cos" => Mf::Cos,
        "cosh" => Mf::Cosh,
        "sin" => Mf::Sin,
        "sinh" => Mf::Sinh,
        "tan" => Mf::Tan,
        "tanh" => Mf::Tanh,
        "acos" => Mf::Acos,
        "asin" => Mf::Asin,
        "atan" => Mf::Atan,
        "atan2" => Mf::Atan2,
        "asinh" => Mf::Asinh,
        "acosh" => Mf::Acosh,
        "atanh" => Mf::Atanh,
        "radians" => Mf::Radians,
        "degrees" => Mf::Degrees,
        "ceil" => Mf::Ceil,
        "floor" => Mf::Floor,
        "round" => Mf::Round,
        "fract" => Mf::Fract,
        "trunc" => Mf::Trunc,
        "ldexp" => Mf::Ldexp,
        "exp" => Mf::Exp,
        "exp2" => Mf::Exp2,
        "log" => Mf::Log,
        "log2" => Mf::Log2,
        "pow" => Mf::Pow,
        "dot" => Mf::Dot,
        "cross" => Mf::Cross,
        "distance" => Mf::Distance,
        "length" => Mf::Length,
        "normalize" => Mf::Normalize,
        "faceForward" => Mf::FaceForward,
        "reflect" => Mf::Reflect,
        "refract" => Mf::Refract,
        "sign" => Mf::Sign,
        "fma" => Mf::Fma,
        "mix" => Mf::Mix,
        "step" => Mf::Step,
        "smoothstep" => Mf::SmoothStep,
        "sqrt" => Mf::Sqrt,
        "inverseSqrt" => Mf::InverseSqrt,
        "transpose" => Mf::Transpose,
        "determinant" => Mf::Determinant,
        "quantizeToF16" => Mf::QuantizeToF16,
        "countTrailingZeros" => Mf::CountTrailingZeros,
        "countLeadingZeros" => Mf::CountLeadingZeros,
        "countOneBits" => Mf::CountOneBits,
        "reverseBits" => Mf::ReverseBits,
        "extractBits" => Mf::ExtractBits,
        "insertBits" => Mf::InsertBits,
        "firstTrailingBit" => Mf::FirstTrailingBit,
        "firstLeadingBit" => Mf::FirstLeadingBit,
        "pack4x8snorm" => Mf::Pack4x8snorm,
        "pack4x8unorm" => Mf::Pack4x8unorm,
        "pack2x16snorm" => Mf::Pack2x16snorm,
        "pack2x16unorm" => Mf::Pack2x16unorm,
        "pack2x16float" => Mf::Pack2x16float,
        "unpack4x8snorm" => Mf::Unpack4x8snorm,
        "unpack4x8unorm" => Mf::Unpack4x8unorm,
        "unpack2x16snorm" => Mf::Unpack2x16snorm,
        "unpack2x16unorm" => Mf::Unpack2x16unorm,
        "unpack2x16float" => Mf::Unpack2x16float,
        _ => return None,
    })
}

pub fn get_derivative(word: &str) -> Option<(crate::DerivativeAxis, crate::DerivativeControl)> {
    use crate::{DerivativeAxis as Da, DerivativeControl as Dc};
    Some(match word {
        "dpdx" => (Da::X, Dc::None),
        "dpdxCoarse" => (Da::X, Dc::Coarse),
        "dpdxFine" => (Da::X, Dc::Fine),
        "dpdy" => (Da::Y, Dc::None),
        "dpdyCoarse" => (Da::Y, Dc::Coarse),
        "dpdyFine" => (Da::Y, Dc::Fine),
        "fwidth" => (Da::Width, Dc::None),
        "fwidthCoarse" => (Da::Width, Dc::Coarse),
        "fwidthFine" => (Da::Width, Dc::Fine),
        _ => return None,
    })
}

pub fn get_relational_function(word: &str) -> Option<crate::RelationalFunction> {
    match word {
        "all" => Some(crate::RelationalFunction::All),
        "any" => Some(crate::RelationalFunction::Any),
        _ => None,
    }
}

/// Atomic read-modify-write builtins. `atomicLoad`, `atomicStore` and
/// `atomicCompareExchangeWeak` are handled separately.
pub fn get_atomic_function(word: &str) -> Option<crate::AtomicFunction> {
    use crate::AtomicFunction as Af;
    Some(match word {
        "atomicAdd" => Af::Add,
        "atomicSub" => Af::Subtract,
        "atomicAnd" => Af::And,
        "atomicOr" => Af::InclusiveOr,
        "atomicXor" => Af::ExclusiveOr,
        "atomicMin" => Af::Min,
        "atomicMax" => Af::Max,
        "atomicExchange" => Af::Exchange { compare: None },
        _ => return None,
    })
}
