//! Module processing functionality: type resolution and layout.

mod layouter;
mod typifier;

pub use layouter::{round_up, LayoutError, Layouter, TypeLayout};
pub use typifier::{ResolveContext, ResolveError, TypeResolution, Typifier};

impl From<super::StorageFormat> for super::ScalarKind {
    fn from(format: super::StorageFormat) -> Self {
        use super::{ScalarKind as Sk, StorageFormat as Sf};
        match format {
            Sf::R8Unorm => Sk::Float,
            Sf::R8Snorm => Sk::Float,
            Sf::R8Uint => Sk::Uint,
            Sf::R8Sint => Sk::Sint,
            Sf::R16Uint => Sk::Uint,
            Sf::R16Sint => Sk::Sint,
            Sf::R16Float => Sk::Float,
            Sf::Rg8Unorm => Sk::Float,
            Sf::Rg8Snorm => Sk::Float,
            Sf::Rg8Uint => Sk::Uint,
            Sf::Rg8Sint => Sk::Sint,
            Sf::R32Uint => Sk::Uint,
            Sf::R32Sint => Sk::Sint,
            Sf::R32Float => Sk::Float,
            Sf::Rg16Uint => Sk::Uint,
            Sf::Rg16Sint => Sk::Sint,
            Sf::Rg16Float => Sk::Float,
            Sf::Rgba8Unorm => Sk::Float,
            Sf::Rgba8Snorm => Sk::Float,
            Sf::Rgba8Uint => Sk::Uint,
            Sf::Rgba8Sint => Sk::Sint,
            Sf::Rgb10a2Unorm => Sk::Float,
            Sf::Rg11b10Float => Sk::Float,
            Sf::Rg32Uint => Sk::Uint,
            Sf::Rg32Sint => Sk::Sint,
            Sf::Rg32Float => Sk::Float,
            Sf::Rgba16Uint => Sk::Uint,
            Sf::Rgba16Sint => Sk::Sint,
            Sf::Rgba16Float => Sk::Float,
            Sf::Rgba32Uint => Sk::Uint,
            Sf::Rgba32Sint => Sk::Sint,
            Sf::Rgba32Float => Sk::Float,
        }
    }
}

impl super::ScalarKind {
    pub const fn is_numeric(self) -> bool {
        match self {
            crate::ScalarKind::Sint | crate::ScalarKind::Uint | crate::ScalarKind::Float => true,
            crate::ScalarKind::Bool => false,
        }
    }
}

impl super::Literal {
    pub const fn scalar_kind(&self) -> crate::ScalarKind {
        match *self {
            Self::F64(_) | Self::F32(_) | Self::AbstractFloat(_) => crate::ScalarKind::Float,
            Self::U32(_) | Self::U64(_) => crate::ScalarKind::Uint,
            Self::I32(_) | Self::I64(_) | Self::AbstractInt(_) => crate::ScalarKind::Sint,
            Self::Bool(_) => crate::ScalarKind::Bool,
        }
    }

    /// The width the literal has when concretized.
    ///
    /// Abstract literals that survive lowering are treated as their 32-bit
    /// defaults.
    pub const fn width(&self) -> crate::Bytes {
        match *self {
            Self::F64(_) | Self::U64(_) | Self::I64(_) => 8,
            Self::F32(_)
            | Self::U32(_)
            | Self::I32(_)
            | Self::AbstractInt(_)
            | Self::AbstractFloat(_) => 4,
            Self::Bool(_) => crate::BOOL_WIDTH,
        }
    }
}

impl super::ScalarValue {
    pub const fn scalar_kind(&self) -> crate::ScalarKind {
        match *self {
            Self::Sint(_) => crate::ScalarKind::Sint,
            Self::Uint(_) => crate::ScalarKind::Uint,
            Self::Float(_) => crate::ScalarKind::Float,
            Self::Bool(_) => crate::ScalarKind::Bool,
        }
    }
}

impl super::TypeInner {
    pub const fn scalar_kind(&self) -> Option<super::ScalarKind> {
        match *self {
            super::TypeInner::Scalar { kind, .. }
            | super::TypeInner::Vector { kind, .. }
            | super::TypeInner::Atomic { kind, .. } => Some(kind),
            super::TypeInner::Matrix { .. } => Some(super::ScalarKind::Float),
            _ => None,
        }
    }

    /// If the type is a pointer, return the address space it points into.
    pub const fn pointer_space(&self) -> Option<crate::AddressSpace> {
        match *self {
            Self::Pointer { space, .. } => Some(space),
            Self::ValuePointer { space, .. } => Some(space),
            _ => None,
        }
    }

    /// For indexable types, return the known length if any.
    pub fn indexable_length(&self) -> Option<u32> {
        match *self {
            Self::Vector { size, .. } => Some(size as u32),
            Self::Matrix { columns, .. } => Some(columns as u32),
            Self::Array {
                size: crate::ArraySize::Constant(value),
                ..
            } => Some(value.get()),
            Self::Array {
                size: crate::ArraySize::Dynamic,
                ..
            } => None,
            _ => None,
        }
    }
}

impl super::MathFunction {
    /// Number of arguments this function takes.
    pub const fn argument_count(&self) -> usize {
        match *self {
            Self::Abs
            | Self::Saturate
            | Self::Cos
            | Self::Cosh
            | Self::Sin
            | Self::Sinh
            | Self::Tan
            | Self::Tanh
            | Self::Acos
            | Self::Asin
            | Self::Atan
            | Self::Asinh
            | Self::Acosh
            | Self::Atanh
            | Self::Radians
            | Self::Degrees
            | Self::Ceil
            | Self::Floor
            | Self::Round
            | Self::Fract
            | Self::Trunc
            | Self::Exp
            | Self::Exp2
            | Self::Log
            | Self::Log2
            | Self::Length
            | Self::Normalize
            | Self::Sign
            | Self::Sqrt
            | Self::InverseSqrt
            | Self::Transpose
            | Self::Determinant
            | Self::QuantizeToF16
            | Self::CountTrailingZeros
            | Self::CountLeadingZeros
            | Self::CountOneBits
            | Self::ReverseBits
            | Self::FirstTrailingBit
            | Self::FirstLeadingBit
            | Self::Pack4x8snorm
            | Self::Pack4x8unorm
            | Self::Pack2x16snorm
            | Self::Pack2x16unorm
            | Self::Pack2x16float
            | Self::Unpack4x8snorm
            | Self::Unpack4x8unorm
            | Self::Unpack2x16snorm
            | Self::Unpack2x16unorm
            | Self::Unpack2x16float => 1,
            Self::Min
            | Self::Max
            | Self::Atan2
            | Self::Ldexp
            | Self::Pow
            | Self::Dot
            | Self::Cross
            | Self::Distance
            | Self::Reflect
            | Self::Step => 2,
            Self::Clamp
            | Self::FaceForward
            | Self::Refract
            | Self::Fma
            | Self::Mix
            | Self::SmoothStep
            | Self::ExtractBits => 3,
            Self::InsertBits => 4,
        }
    }
}
