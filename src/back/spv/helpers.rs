use spirv::Word;

pub(super) fn bytes_to_words(bytes: &[u8]) -> Vec<Word> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word: Word = 0;
            for (i, &byte) in chunk.iter().enumerate() {
                word |= (byte as Word) << (i * 8);
            }
            word
        })
        .collect()
}

/// Encode a string as UTF-8 words, NUL-terminated and padded to 4 bytes.
pub(super) fn string_to_words(input: &str) -> Vec<Word> {
    let bytes = input.as_bytes();
    let mut words = bytes_to_words(bytes);
    if bytes.len() % 4 == 0 {
        // nul-termination
        words.push(0x0);
    }
    words
}

pub(super) fn map_storage_class(space: crate::AddressSpace) -> spirv::StorageClass {
    match space {
        crate::AddressSpace::Function => spirv::StorageClass::Function,
        crate::AddressSpace::Private => spirv::StorageClass::Private,
        crate::AddressSpace::WorkGroup => spirv::StorageClass::Workgroup,
        crate::AddressSpace::Uniform => spirv::StorageClass::Uniform,
        // requires SPIR-V 1.3, which the writer checks up front
        crate::AddressSpace::Storage { .. } => spirv::StorageClass::StorageBuffer,
        crate::AddressSpace::PushConstant => spirv::StorageClass::PushConstant,
        crate::AddressSpace::Handle => spirv::StorageClass::UniformConstant,
    }
}

/// Map an IR builtin to the SPIR-V builtin, given the stage and direction
/// it is used in.
pub(super) fn map_builtin(
    built_in: crate::BuiltIn,
    stage: crate::ShaderStage,
    output: bool,
) -> spirv::BuiltIn {
    use crate::BuiltIn as Bi;
    match built_in {
        Bi::Position => {
            // the fragment input twin of `Position` is `FragCoord`
            if stage == crate::ShaderStage::Fragment && !output {
                spirv::BuiltIn::FragCoord
            } else {
                spirv::BuiltIn::Position
            }
        }
        // vertex
        Bi::VertexIndex => spirv::BuiltIn::VertexIndex,
        Bi::InstanceIndex => spirv::BuiltIn::InstanceIndex,
        // fragment
        Bi::FrontFacing => spirv::BuiltIn::FrontFacing,
        Bi::FragDepth => spirv::BuiltIn::FragDepth,
        Bi::SampleIndex => spirv::BuiltIn::SampleId,
        Bi::SampleMask => spirv::BuiltIn::SampleMask,
        // compute
        Bi::GlobalInvocationId => spirv::BuiltIn::GlobalInvocationId,
        Bi::LocalInvocationId => spirv::BuiltIn::LocalInvocationId,
        Bi::LocalInvocationIndex => spirv::BuiltIn::LocalInvocationIndex,
        Bi::WorkGroupId => spirv::BuiltIn::WorkgroupId,
        Bi::NumWorkGroups => spirv::BuiltIn::NumWorkgroups,
    }
}

pub(super) fn map_dim(dim: crate::ImageDimension) -> spirv::Dim {
    match dim {
        crate::ImageDimension::D1 => spirv::Dim::Dim1D,
        crate::ImageDimension::D2 => spirv::Dim::Dim2D,
        crate::ImageDimension::D3 => spirv::Dim::Dim3D,
        crate::ImageDimension::Cube => spirv::Dim::DimCube,
    }
}

#[cfg(test)]
mod tests {
    use super::string_to_words;

    #[test]
    fn test_string_to_words() {
        // "main" takes a full word, so the terminator gets its own
        let words = string_to_words("main");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].to_le_bytes(), *b"main");
        assert_eq!(words[1], 0);

        // short strings are padded with zeros
        let words = string_to_words("ab");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].to_le_bytes(), [b'a', b'b', 0, 0]);
    }
}
