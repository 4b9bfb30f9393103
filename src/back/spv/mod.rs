/*! Standard Portable Intermediate Representation (SPIR-V) backend
!*/

mod block;
mod helpers;
mod instructions;
mod layout;
mod writer;

pub use spirv::Capability;

use crate::arena::Handle;

use spirv::Word;
use thiserror::Error;

struct PhysicalLayout {
    magic_number: Word,
    version: Word,
    generator: Word,
    bound: Word,
    instruction_schema: Word,
}

#[derive(Default)]
struct LogicalLayout {
    capabilities: Vec<Word>,
    extensions: Vec<Word>,
    ext_inst_imports: Vec<Word>,
    memory_model: Vec<Word>,
    entry_points: Vec<Word>,
    execution_modes: Vec<Word>,
    debugs: Vec<Word>,
    annotations: Vec<Word>,
    declarations: Vec<Word>,
    function_definitions: Vec<Word>,
}

struct Instruction {
    op: spirv::Op,
    wc: u32,
    type_id: Option<Word>,
    result_id: Option<Word>,
    operands: Vec<Word>,
}

const BITS_PER_BYTE: crate::Bytes = 8;

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("target SPIRV-{0}.{1} is not supported")]
    UnsupportedVersion(u8, u8),
    #[error("{0} requires one of the capabilities {1:?}, none of which are available")]
    MissingCapabilities(&'static str, Vec<Capability>),
    #[error("unimplemented {0}")]
    FeatureNotImplemented(&'static str),
    #[error("module is not validated properly: {0}")]
    Validation(&'static str),
}

#[derive(Default)]
struct IdGenerator(Word);

impl IdGenerator {
    fn next(&mut self) -> Word {
        self.0 += 1;
        self.0
    }
}

/// A SPIR-V block, in the process of being built.
struct Block {
    label_id: Word,
    body: Vec<Instruction>,
    termination: Option<Instruction>,
}

impl Block {
    fn new(label_id: Word) -> Self {
        Block {
            label_id,
            body: Vec::new(),
            termination: None,
        }
    }
}

struct LocalVariable {
    id: Word,
    instruction: Instruction,
}

struct ResultMember {
    id: Word,
    type_id: Word,
    built_in: Option<crate::BuiltIn>,
}

/// Synthesized I/O of an entry point.
///
/// SPIR-V entry points take no parameters and return nothing; inputs arrive
/// through `Input` interface variables and outputs leave through `Output`
/// ones. This records how the IR-level signature was mapped.
struct EntryPointContext {
    /// A value ID per IR function argument, reconstructed in the prelude.
    argument_ids: Vec<Word>,
    /// Output variables the return value gets scattered into.
    results: Vec<ResultMember>,
    /// Whether `results` are the flattened members of a struct result.
    result_is_struct: bool,
}

#[derive(Default)]
struct Function {
    signature: Option<Instruction>,
    parameters: Vec<Instruction>,
    /// Local variables, parallel to the IR function's arena.
    variables: Vec<LocalVariable>,
    blocks: Vec<Block>,
    entry_point_context: Option<EntryPointContext>,
}

impl Function {
    fn consume(&mut self, mut block: Block, termination: Instruction) {
        block.termination = Some(termination);
        self.blocks.push(block);
    }

    fn parameter_id(&self, index: u32) -> Word {
        match self.entry_point_context {
            Some(ref context) => context.argument_ids[index as usize],
            None => self.parameters[index as usize].result_id.unwrap(),
        }
    }

    fn to_words(&self, sink: &mut Vec<Word>) {
        self.signature.as_ref().unwrap().to_words(sink);
        for instruction in self.parameters.iter() {
            instruction.to_words(sink);
        }
        for (index, block) in self.blocks.iter().enumerate() {
            instructions::instruction_label(block.label_id).to_words(sink);
            // all `OpVariable`s go to the top of the entry block
            if index == 0 {
                for variable in self.variables.iter() {
                    variable.instruction.to_words(sink);
                }
            }
            for instruction in block.body.iter() {
                instruction.to_words(sink);
            }
            block.termination.as_ref().unwrap().to_words(sink);
        }
    }
}

/// A SPIR-V type constructed during code generation.
///
/// In the process of writing SPIR-V, we need to synthesize various types for
/// intermediate results and such. However, it's inconvenient to use
/// `crate::Type` or `crate::TypeInner` for these, as the IR module is immutable
/// so we can't ever create a `Handle<Type>` to refer to them. So for local use
/// in the SPIR-V writer, we have this home-grown type enum that covers only the
/// cases we need (for example, it doesn't cover structs).
#[derive(Debug, PartialEq, Hash, Eq, Copy, Clone)]
enum LocalType {
    /// A scalar, vector, or pointer to one of those.
    Value {
        /// If `None`, this represents a scalar type. If `Some`, this represents
        /// a vector type of the given size.
        vector_size: Option<crate::VectorSize>,
        kind: crate::ScalarKind,
        width: crate::Bytes,
        pointer_class: Option<spirv::StorageClass>,
    },
    /// A matrix of floating-point values.
    Matrix {
        columns: crate::VectorSize,
        rows: crate::VectorSize,
        width: crate::Bytes,
    },
    Pointer {
        base: Handle<crate::Type>,
        class: spirv::StorageClass,
    },
    Image {
        dim: crate::ImageDimension,
        arrayed: bool,
        class: crate::ImageClass,
    },
    SampledImage {
        image_type_id: Word,
    },
    Sampler,
}

impl LocalType {
    /// Describe an inner type in `LocalType` terms, if possible.
    fn from_inner(inner: &crate::TypeInner) -> Option<Self> {
        Some(match *inner {
            crate::TypeInner::Scalar { kind, width }
            // SPIR-V has no atomic types; they are plain integers accessed
            // with atomic instructions
            | crate::TypeInner::Atomic { kind, width } => LocalType::Value {
                vector_size: None,
                kind,
                width,
                pointer_class: None,
            },
            crate::TypeInner::Vector { size, kind, width } => LocalType::Value {
                vector_size: Some(size),
                kind,
                width,
                pointer_class: None,
            },
            crate::TypeInner::Matrix {
                columns,
                rows,
                width,
            } => LocalType::Matrix {
                columns,
                rows,
                width,
            },
            crate::TypeInner::Pointer { base, space } => LocalType::Pointer {
                base,
                class: helpers::map_storage_class(space),
            },
            crate::TypeInner::ValuePointer {
                size,
                kind,
                width,
                space,
            } => LocalType::Value {
                vector_size: size,
                kind,
                width,
                pointer_class: Some(helpers::map_storage_class(space)),
            },
            crate::TypeInner::Image {
                dim,
                arrayed,
                class,
            } => LocalType::Image {
                dim,
                arrayed,
                class,
            },
            crate::TypeInner::Sampler { .. } => LocalType::Sampler,
            crate::TypeInner::Array { .. } | crate::TypeInner::Struct { .. } => return None,
        })
    }
}

#[derive(Debug, PartialEq, Hash, Eq, Copy, Clone)]
enum LookupType {
    Handle(Handle<crate::Type>),
    Local(LocalType),
}

impl From<LocalType> for LookupType {
    fn from(local: LocalType) -> Self {
        Self::Local(local)
    }
}

#[derive(Debug, PartialEq, Clone, Hash, Eq)]
struct LookupFunctionType {
    parameter_type_ids: Vec<Word>,
    return_type_id: Word,
}

#[derive(Default)]
struct CachedExpressions {
    ids: Vec<Word>,
}

impl CachedExpressions {
    fn reset(&mut self, length: usize) {
        self.ids.clear();
        self.ids.resize(length, 0);
    }

    fn get(&self, handle: Handle<crate::Expression>) -> Option<Word> {
        match self.ids[handle.index()] {
            0 => None,
            id => Some(id),
        }
    }

    fn set(&mut self, handle: Handle<crate::Expression>, id: Word) {
        self.ids[handle.index()] = id;
    }
}

struct GlobalVariable {
    /// Actual ID of the variable.
    id: Word,
    /// For `AddressSpace::Handle` variables, this ID is recorded in the
    /// function prelude block (and reset before every function) as `OpLoad`
    /// of the variable. It is then used for all the global ops, such as
    /// `OpImageSample`.
    handle_id: Word,
}

bitflags::bitflags! {
    pub struct WriterFlags: u32 {
        /// Include debug labels for everything.
        const DEBUG = 0x1;
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    /// (Major, Minor) target version of the SPIR-V.
    pub lang_version: (u8, u8),
    /// Configuration flags for the writer.
    pub flags: WriterFlags,
    /// Set of SPIR-V capabilities permitted to be used, if restricted.
    pub capabilities: Option<crate::FastHashSet<Capability>>,
}

impl Default for Options {
    fn default() -> Self {
        let mut flags = WriterFlags::empty();
        if cfg!(debug_assertions) {
            flags |= WriterFlags::DEBUG;
        }
        Options {
            lang_version: (1, 3),
            flags,
            capabilities: None,
        }
    }
}

pub use writer::Writer;

/// Convenience: write a whole module into a fresh word vector.
pub fn write_vec(module: &crate::Module, options: &Options) -> Result<Vec<u32>, Error> {
    let mut words = Vec::new();
    let mut w = Writer::new(options)?;
    w.write(module, &mut words)?;
    Ok(words)
}
