use super::{
    helpers, instructions, Block, CachedExpressions, Capability, EntryPointContext, Error,
    Function, GlobalVariable, IdGenerator, Instruction, LocalType, LocalVariable, LogicalLayout,
    LookupFunctionType, LookupType, Options, PhysicalLayout, ResultMember, WriterFlags,
    BITS_PER_BYTE,
};
use crate::arena::Handle;
use crate::proc::TypeResolution;

use spirv::Word;

pub struct Writer {
    physical_layout: PhysicalLayout,
    pub(super) logical_layout: LogicalLayout,
    pub(super) id_gen: IdGenerator,
    capabilities_used: crate::FastHashSet<Capability>,
    capabilities_available: Option<crate::FastHashSet<Capability>>,
    pub(super) debugs: Vec<Instruction>,
    pub(super) annotations: Vec<Instruction>,
    pub(super) flags: WriterFlags,
    void_type: Word,
    lookup_type: crate::FastHashMap<LookupType, Word>,
    pub(super) lookup_function: crate::FastHashMap<Handle<crate::Function>, Word>,
    lookup_function_type: crate::FastHashMap<LookupFunctionType, Word>,
    pub(super) constant_ids: Vec<Word>,
    cached_constants: crate::FastHashMap<crate::Literal, Word>,
    cached_null_constants: crate::FastHashMap<Word, Word>,
    cached_composite_constants: crate::FastHashMap<(Word, Vec<Word>), Word>,
    pub(super) global_variables: Vec<GlobalVariable>,
    pub(super) cached: CachedExpressions,
    pub(super) gl450_ext_inst_id: Word,
    decorated_block_types: crate::FastHashSet<Word>,
    // Just a temporary list of SPIR-V ids
    pub(super) temp_list: Vec<Word>,
}

impl Writer {
    pub fn new(options: &Options) -> Result<Self, Error> {
        let (major, minor) = options.lang_version;
        // `StorageBuffer` needs 1.3
        if major != 1 || !(3..=5).contains(&minor) {
            return Err(Error::UnsupportedVersion(major, minor));
        }
        Ok(Writer {
            physical_layout: PhysicalLayout::new(options.lang_version),
            logical_layout: LogicalLayout::default(),
            id_gen: IdGenerator::default(),
            capabilities_used: crate::FastHashSet::default(),
            capabilities_available: options.capabilities.clone(),
            debugs: Vec::new(),
            annotations: Vec::new(),
            flags: options.flags,
            void_type: 0,
            lookup_type: crate::FastHashMap::default(),
            lookup_function: crate::FastHashMap::default(),
            lookup_function_type: crate::FastHashMap::default(),
            constant_ids: Vec::new(),
            cached_constants: crate::FastHashMap::default(),
            cached_null_constants: crate::FastHashMap::default(),
            cached_composite_constants: crate::FastHashMap::default(),
            global_variables: Vec::new(),
            cached: CachedExpressions::default(),
            gl450_ext_inst_id: 0,
            decorated_block_types: crate::FastHashSet::default(),
            temp_list: Vec::new(),
        })
    }

    fn reset(&mut self) {
        self.logical_layout = LogicalLayout::default();
        self.id_gen = IdGenerator::default();
        self.capabilities_used.clear();
        self.debugs.clear();
        self.annotations.clear();
        self.void_type = 0;
        self.lookup_type.clear();
        self.lookup_function.clear();
        self.lookup_function_type.clear();
        self.constant_ids.clear();
        self.cached_constants.clear();
        self.cached_null_constants.clear();
        self.cached_composite_constants.clear();
        self.global_variables.clear();
        self.decorated_block_types.clear();
    }

    /// Use one of `capabilities`, if requirements allow; the first one is
    /// preferred.
    pub(super) fn require_any(
        &mut self,
        what: &'static str,
        capabilities: &[Capability],
    ) -> Result<(), Error> {
        let cap = match self.capabilities_available {
            None => capabilities[0],
            Some(ref available) => *capabilities
                .iter()
                .find(|cap| available.contains(cap))
                .ok_or_else(|| Error::MissingCapabilities(what, capabilities.to_vec()))?,
        };
        self.capabilities_used.insert(cap);
        Ok(())
    }

    fn scalar_capabilities(
        &mut self,
        kind: crate::ScalarKind,
        width: crate::Bytes,
    ) -> Result<(), Error> {
        match (kind, width) {
            (crate::ScalarKind::Float, 4)
            | (crate::ScalarKind::Sint, 4)
            | (crate::ScalarKind::Uint, 4)
            | (crate::ScalarKind::Bool, crate::BOOL_WIDTH) => Ok(()),
            (crate::ScalarKind::Float, 2) => self.require_any("16 bit floats", &[Capability::Float16]),
            (crate::ScalarKind::Float, 8) => self.require_any("64 bit floats", &[Capability::Float64]),
            (crate::ScalarKind::Sint, 1) | (crate::ScalarKind::Uint, 1) => {
                self.require_any("8 bit integers", &[Capability::Int8])
            }
            (crate::ScalarKind::Sint, 2) | (crate::ScalarKind::Uint, 2) => {
                self.require_any("16 bit integers", &[Capability::Int16])
            }
            (crate::ScalarKind::Sint, 8) | (crate::ScalarKind::Uint, 8) => {
                self.require_any("64 bit integers", &[Capability::Int64])
            }
            _ => Err(Error::Validation("unknown scalar width")),
        }
    }

    pub(super) fn get_void_type_id(&mut self) -> Word {
        if self.void_type == 0 {
            self.void_type = self.id_gen.next();
            instructions::instruction_type_void(self.void_type)
                .to_words(&mut self.logical_layout.declarations);
        }
        self.void_type
    }

    fn write_scalar_type(&mut self, id: Word, kind: crate::ScalarKind, width: crate::Bytes) {
        let bits = (width * BITS_PER_BYTE) as u32;
        let instruction = match kind {
            crate::ScalarKind::Sint => {
                instructions::instruction_type_int(id, bits, instructions::Signedness::Signed)
            }
            crate::ScalarKind::Uint => {
                instructions::instruction_type_int(id, bits, instructions::Signedness::Unsigned)
            }
            crate::ScalarKind::Float => instructions::instruction_type_float(id, bits),
            crate::ScalarKind::Bool => instructions::instruction_type_bool(id),
        };
        instruction.to_words(&mut self.logical_layout.declarations);
    }

    /// Strict get-or-create for type IDs.
    pub(super) fn get_type_id(
        &mut self,
        types: &crate::UniqueArena<crate::Type>,
        lookup: LookupType,
    ) -> Result<Word, Error> {
        if let Some(&id) = self.lookup_type.get(&lookup) {
            return Ok(id);
        }
        let id = match lookup {
            LookupType::Handle(handle) => {
                match LocalType::from_inner(&types[handle].inner) {
                    // the type is structurally one we make locally; share the ID
                    Some(local) => {
                        let id = self.get_type_id(types, LookupType::Local(local))?;
                        self.lookup_type.insert(lookup, id);
                        return Ok(id);
                    }
                    None => self.write_type_declaration(types, handle)?,
                }
            }
            LookupType::Local(local) => self.write_local_type(types, local)?,
        };
        self.lookup_type.insert(lookup, id);
        Ok(id)
    }

    fn write_local_type(
        &mut self,
        types: &crate::UniqueArena<crate::Type>,
        local: LocalType,
    ) -> Result<Word, Error> {
        Ok(match local {
            LocalType::Value {
                vector_size: None,
                kind,
                width,
                pointer_class: None,
            } => {
                self.scalar_capabilities(kind, width)?;
                let id = self.id_gen.next();
                self.write_scalar_type(id, kind, width);
                id
            }
            LocalType::Value {
                vector_size: Some(size),
                kind,
                width,
                pointer_class: None,
            } => {
                let scalar_id = self.get_type_id(
                    types,
                    LookupType::Local(LocalType::Value {
                        vector_size: None,
                        kind,
                        width,
                        pointer_class: None,
                    }),
                )?;
                let id = self.id_gen.next();
                instructions::instruction_type_vector(id, scalar_id, size)
                    .to_words(&mut self.logical_layout.declarations);
                id
            }
            LocalType::Value {
                vector_size,
                kind,
                width,
                pointer_class: Some(class),
            } => {
                let base_id = self.get_type_id(
                    types,
                    LookupType::Local(LocalType::Value {
                        vector_size,
                        kind,
                        width,
                        pointer_class: None,
                    }),
                )?;
                let id = self.id_gen.next();
                instructions::instruction_type_pointer(id, class, base_id)
                    .to_words(&mut self.logical_layout.declarations);
                id
            }
            LocalType::Matrix {
                columns,
                rows,
                width,
            } => {
                let column_id = self.get_type_id(
                    types,
                    LookupType::Local(LocalType::Value {
                        vector_size: Some(rows),
                        kind: crate::ScalarKind::Float,
                        width,
                        pointer_class: None,
                    }),
                )?;
                let id = self.id_gen.next();
                instructions::instruction_type_matrix(id, column_id, columns)
                    .to_words(&mut self.logical_layout.declarations);
                id
            }
            LocalType::Pointer { base, class } => {
                // pointers to scalars and vectors share their identity with
                // the equivalent value-pointer form, or SPIR-V would see two
                // identical `OpTypePointer`s
                if let Some(LocalType::Value {
                    vector_size,
                    kind,
                    width,
                    pointer_class: None,
                }) = LocalType::from_inner(&types[base].inner)
                {
                    return self.get_type_id(
                        types,
                        LookupType::Local(LocalType::Value {
                            vector_size,
                            kind,
                            width,
                            pointer_class: Some(class),
                        }),
                    );
                }
                let base_id = self.get_type_id(types, LookupType::Handle(base))?;
                let id = self.id_gen.next();
                instructions::instruction_type_pointer(id, class, base_id)
                    .to_words(&mut self.logical_layout.declarations);
                id
            }
            LocalType::Image {
                dim,
                arrayed,
                class,
            } => {
                match dim {
                    crate::ImageDimension::D1 => match class {
                        crate::ImageClass::Storage { .. } => {
                            self.require_any("1D storage images", &[Capability::Image1D])?
                        }
                        _ => self.require_any("1D sampled images", &[Capability::Sampled1D])?,
                    },
                    crate::ImageDimension::Cube if arrayed => {
                        self.require_any("cube array images", &[Capability::SampledCubeArray])?
                    }
                    _ => {}
                }
                let kind = match class {
                    crate::ImageClass::Sampled { kind, .. } => kind,
                    crate::ImageClass::Depth { .. } => crate::ScalarKind::Float,
                    crate::ImageClass::Storage { format, .. } => format.into(),
                };
                let sampled_type_id = self.get_type_id(
                    types,
                    LookupType::Local(LocalType::Value {
                        vector_size: None,
                        kind,
                        width: 4,
                        pointer_class: None,
                    }),
                )?;
                let id = self.id_gen.next();
                instructions::instruction_type_image(
                    id,
                    sampled_type_id,
                    helpers::map_dim(dim),
                    arrayed,
                    class,
                )
                .to_words(&mut self.logical_layout.declarations);
                id
            }
            LocalType::SampledImage { image_type_id } => {
                let id = self.id_gen.next();
                instructions::instruction_type_sampled_image(id, image_type_id)
                    .to_words(&mut self.logical_layout.declarations);
                id
            }
            LocalType::Sampler => {
                let id = self.id_gen.next();
                instructions::instruction_type_sampler(id)
                    .to_words(&mut self.logical_layout.declarations);
                id
            }
        })
    }

    /// Write the declaration of an arena type that has no `LocalType`
    /// equivalent, i.e. arrays and structs.
    fn write_type_declaration(
        &mut self,
        types: &crate::UniqueArena<crate::Type>,
        handle: Handle<crate::Type>,
    ) -> Result<Word, Error> {
        let ty = &types[handle];
        let id = match ty.inner {
            crate::TypeInner::Array { base, size, stride } => {
                let base_id = self.get_type_id(types, LookupType::Handle(base))?;
                let length = match size {
                    crate::ArraySize::Constant(value) => value.get(),
                    crate::ArraySize::Dynamic => {
                        // a deliberate gap: the front end accepts these,
                        // this backend does not generate them
                        return Err(Error::FeatureNotImplemented("runtime-sized arrays"));
                    }
                };
                let length_id = self.get_index_constant(length);
                let id = self.id_gen.next();
                instructions::instruction_type_array(id, base_id, length_id)
                    .to_words(&mut self.logical_layout.declarations);
                self.annotations.push(instructions::instruction_decorate(
                    id,
                    spirv::Decoration::ArrayStride,
                    &[stride],
                ));
                id
            }
            crate::TypeInner::Struct { ref members, .. } => {
                let mut member_ids = Vec::with_capacity(members.len());
                for member in members {
                    member_ids.push(self.get_type_id(types, LookupType::Handle(member.ty))?);
                }
                let id = self.id_gen.next();
                instructions::instruction_type_struct(id, &member_ids)
                    .to_words(&mut self.logical_layout.declarations);
                for (index, member) in members.iter().enumerate() {
                    self.annotations
                        .push(instructions::instruction_member_decorate(
                            id,
                            index as u32,
                            spirv::Decoration::Offset,
                            &[member.offset],
                        ));
                    // matrices inside structs need an explicit layout
                    if let crate::TypeInner::Matrix { rows, width, .. } = types[member.ty].inner {
                        let stride = match rows {
                            crate::VectorSize::Bi => 2 * width as u32,
                            _ => 4 * width as u32,
                        };
                        self.annotations
                            .push(instructions::instruction_member_decorate(
                                id,
                                index as u32,
                                spirv::Decoration::ColMajor,
                                &[],
                            ));
                        self.annotations
                            .push(instructions::instruction_member_decorate(
                                id,
                                index as u32,
                                spirv::Decoration::MatrixStride,
                                &[stride],
                            ));
                    }
                    if self.flags.contains(WriterFlags::DEBUG) {
                        if let Some(ref name) = member.name {
                            self.debugs.push(instructions::instruction_member_name(
                                id,
                                index as u32,
                                name,
                            ));
                        }
                    }
                }
                if self.flags.contains(WriterFlags::DEBUG) {
                    if let Some(ref name) = ty.name {
                        self.debugs.push(instructions::instruction_name(id, name));
                    }
                }
                id
            }
            _ => return Err(Error::Validation("unexpected type declaration")),
        };
        Ok(id)
    }

    /// Get the ID of a type described by an expression's resolution.
    pub(super) fn get_expression_type_id(
        &mut self,
        types: &crate::UniqueArena<crate::Type>,
        resolution: &TypeResolution,
    ) -> Result<Word, Error> {
        match *resolution {
            TypeResolution::Handle(handle) => self.get_type_id(types, LookupType::Handle(handle)),
            TypeResolution::Value(ref inner) => match LocalType::from_inner(inner) {
                Some(local) => self.get_type_id(types, LookupType::Local(local)),
                None => Err(Error::Validation("inline type is not representable")),
            },
        }
    }

    /// Get-or-create a scalar constant. Abstract literals land on their
    /// 32-bit defaults.
    pub(super) fn get_constant_scalar(&mut self, literal: crate::Literal) -> Result<Word, Error> {
        let literal = match literal {
            crate::Literal::AbstractInt(value) => crate::Literal::I32(value as i32),
            crate::Literal::AbstractFloat(value) => crate::Literal::F32(value as f32),
            other => other,
        };
        if let Some(&id) = self.cached_constants.get(&literal) {
            return Ok(id);
        }
        let type_local = LocalType::Value {
            vector_size: None,
            kind: literal.scalar_kind(),
            width: literal.width(),
            pointer_class: None,
        };
        // scalar types carry no handles, so an empty arena works
        let empty = crate::UniqueArena::new();
        let type_id = self.get_type_id(&empty, LookupType::Local(type_local))?;
        let id = self.id_gen.next();
        let instruction = match literal {
            crate::Literal::Bool(true) => instructions::instruction_constant_true(type_id, id),
            crate::Literal::Bool(false) => instructions::instruction_constant_false(type_id, id),
            crate::Literal::I32(value) => {
                instructions::instruction_constant(type_id, id, &[value as u32])
            }
            crate::Literal::U32(value) => {
                instructions::instruction_constant(type_id, id, &[value])
            }
            crate::Literal::F32(value) => {
                instructions::instruction_constant(type_id, id, &[value.to_bits()])
            }
            crate::Literal::F64(value) => {
                let bits = value.to_bits();
                instructions::instruction_constant(
                    type_id,
                    id,
                    &[bits as u32, (bits >> 32) as u32],
                )
            }
            crate::Literal::I64(value) => {
                let bits = value as u64;
                instructions::instruction_constant(
                    type_id,
                    id,
                    &[bits as u32, (bits >> 32) as u32],
                )
            }
            crate::Literal::U64(value) => instructions::instruction_constant(
                type_id,
                id,
                &[value as u32, (value >> 32) as u32],
            ),
            crate::Literal::AbstractInt(_) | crate::Literal::AbstractFloat(_) => {
                return Err(Error::Validation("abstract literal was not concretized"))
            }
        };
        instruction.to_words(&mut self.logical_layout.declarations);
        self.cached_constants.insert(literal, id);
        Ok(id)
    }

    /// A `u32` constant, used for indices, lengths, scopes and semantics.
    pub(super) fn get_index_constant(&mut self, index: u32) -> Word {
        // the type is known-good, so this can't fail
        self.get_constant_scalar(crate::Literal::U32(index))
            .unwrap()
    }

    pub(super) fn get_constant_null(&mut self, type_id: Word) -> Word {
        if let Some(&id) = self.cached_null_constants.get(&type_id) {
            return id;
        }
        let id = self.id_gen.next();
        instructions::instruction_constant_null(type_id, id)
            .to_words(&mut self.logical_layout.declarations);
        self.cached_null_constants.insert(type_id, id);
        id
    }

    /// A composite constant whose components are all `scalar_id`.
    pub(super) fn get_constant_splat(
        &mut self,
        type_id: Word,
        scalar_id: Word,
        count: usize,
    ) -> Word {
        let components = vec![scalar_id; count];
        if let Some(&id) = self
            .cached_composite_constants
            .get(&(type_id, components.clone()))
        {
            return id;
        }
        let id = self.id_gen.next();
        instructions::instruction_constant_composite(type_id, id, &components)
            .to_words(&mut self.logical_layout.declarations);
        self.cached_composite_constants
            .insert((type_id, components), id);
        id
    }

    fn write_constant(
        &mut self,
        handle: Handle<crate::Constant>,
        module: &crate::Module,
    ) -> Result<Word, Error> {
        let constant = &module.constants[handle];
        let id = match constant.inner {
            crate::ConstantInner::Scalar(value) => {
                let width = match module.types[constant.ty].inner {
                    crate::TypeInner::Scalar { width, .. } => width,
                    _ => 4,
                };
                let literal = match (value, width) {
                    (crate::ScalarValue::Sint(v), 4) => crate::Literal::I32(v as i32),
                    (crate::ScalarValue::Sint(v), 8) => crate::Literal::I64(v),
                    (crate::ScalarValue::Uint(v), 4) => crate::Literal::U32(v as u32),
                    (crate::ScalarValue::Uint(v), 8) => crate::Literal::U64(v),
                    (crate::ScalarValue::Float(v), 8) => crate::Literal::F64(v),
                    (crate::ScalarValue::Float(v), _) => crate::Literal::F32(v as f32),
                    (crate::ScalarValue::Bool(v), _) => crate::Literal::Bool(v),
                    _ => return Err(Error::Validation("unsupported constant width")),
                };
                self.get_constant_scalar(literal)?
            }
            crate::ConstantInner::Composite(ref components) => {
                let type_id = self.get_type_id(&module.types, LookupType::Handle(constant.ty))?;
                let mut component_ids = Vec::with_capacity(components.len());
                for &component in components {
                    // the validator guarantees components precede the composite
                    component_ids.push(self.constant_ids[component.index()]);
                }
                if let Some(&id) = self
                    .cached_composite_constants
                    .get(&(type_id, component_ids.clone()))
                {
                    id
                } else {
                    let id = self.id_gen.next();
                    instructions::instruction_constant_composite(type_id, id, &component_ids)
                        .to_words(&mut self.logical_layout.declarations);
                    self.cached_composite_constants
                        .insert((type_id, component_ids), id);
                    id
                }
            }
        };
        if self.flags.contains(WriterFlags::DEBUG) {
            if let Some(ref name) = constant.name {
                self.debugs.push(instructions::instruction_name(id, name));
            }
        }
        Ok(id)
    }

    fn write_global_variable(
        &mut self,
        module: &crate::Module,
        var: &crate::GlobalVariable,
    ) -> Result<GlobalVariable, Error> {
        let class = helpers::map_storage_class(var.space);
        let inner_type_id = self.get_type_id(&module.types, LookupType::Handle(var.ty))?;
        let pointer_type_id = self.get_type_id(
            &module.types,
            LookupType::Local(LocalType::Pointer {
                base: var.ty,
                class,
            }),
        )?;
        let id = self.id_gen.next();
        let init_id = var.init.map(|constant| self.constant_ids[constant.index()]);
        instructions::instruction_variable(pointer_type_id, id, class, init_id)
            .to_words(&mut self.logical_layout.declarations);

        if let Some(ref binding) = var.binding {
            self.annotations.push(instructions::instruction_decorate(
                id,
                spirv::Decoration::DescriptorSet,
                &[binding.group],
            ));
            self.annotations.push(instructions::instruction_decorate(
                id,
                spirv::Decoration::Binding,
                &[binding.binding],
            ));
        }

        // buffer-backed structs need the `Block` decoration on their type
        let needs_block = matches!(
            var.space,
            crate::AddressSpace::Uniform
                | crate::AddressSpace::Storage { .. }
                | crate::AddressSpace::PushConstant
        ) && matches!(module.types[var.ty].inner, crate::TypeInner::Struct { .. });
        if needs_block && self.decorated_block_types.insert(inner_type_id) {
            self.annotations.push(instructions::instruction_decorate(
                inner_type_id,
                spirv::Decoration::Block,
                &[],
            ));
        }
        // read-only storage buffers are marked as such
        if let crate::AddressSpace::Storage { access } = var.space {
            if !access.contains(crate::StorageAccess::STORE) {
                self.annotations.push(instructions::instruction_decorate(
                    id,
                    spirv::Decoration::NonWritable,
                    &[],
                ));
            }
        }

        if self.flags.contains(WriterFlags::DEBUG) {
            if let Some(ref name) = var.name {
                self.debugs.push(instructions::instruction_name(id, name));
            }
        }
        Ok(GlobalVariable { id, handle_id: 0 })
    }

    /// Create an `Input` or `Output` interface variable for an entry point.
    fn write_varying(
        &mut self,
        module: &crate::Module,
        stage: crate::ShaderStage,
        class: spirv::StorageClass,
        debug_name: Option<&str>,
        ty: Handle<crate::Type>,
        binding: &crate::Binding,
    ) -> Result<Word, Error> {
        let pointer_type_id = self.get_type_id(
            &module.types,
            LookupType::Local(LocalType::Pointer { base: ty, class }),
        )?;
        let id = self.id_gen.next();
        instructions::instruction_variable(pointer_type_id, id, class, None)
            .to_words(&mut self.logical_layout.declarations);
        if self.flags.contains(WriterFlags::DEBUG) {
            if let Some(name) = debug_name {
                self.debugs.push(instructions::instruction_name(id, name));
            }
        }
        match *binding {
            crate::Binding::BuiltIn(built_in) => {
                let spirv_builtin =
                    helpers::map_builtin(built_in, stage, class == spirv::StorageClass::Output);
                self.annotations.push(instructions::instruction_decorate(
                    id,
                    spirv::Decoration::BuiltIn,
                    &[spirv_builtin as u32],
                ));
            }
            crate::Binding::Location(location) => {
                self.annotations.push(instructions::instruction_decorate(
                    id,
                    spirv::Decoration::Location,
                    &[location],
                ));
                // integral fragment inputs must not be interpolated
                if stage == crate::ShaderStage::Fragment
                    && class == spirv::StorageClass::Input
                    && module.types[ty]
                        .inner
                        .scalar_kind()
                        .map_or(false, |kind| kind != crate::ScalarKind::Float)
                {
                    self.annotations.push(instructions::instruction_decorate(
                        id,
                        spirv::Decoration::Flat,
                        &[],
                    ));
                }
            }
        }
        Ok(id)
    }

    /// Emit an entry point's input variables and build the prelude
    /// instructions that reconstruct the IR-level arguments.
    fn write_entry_point_arguments(
        &mut self,
        module: &crate::Module,
        ep: &crate::EntryPoint,
        ir_function: &crate::Function,
        prelude: &mut Block,
        interface: &mut Vec<Word>,
    ) -> Result<Vec<Word>, Error> {
        let mut argument_ids = Vec::with_capacity(ir_function.arguments.len());
        for argument in ir_function.arguments.iter() {
            let argument_type_id =
                self.get_type_id(&module.types, LookupType::Handle(argument.ty))?;
            match argument.binding {
                Some(ref binding) => {
                    let varying_id = self.write_varying(
                        module,
                        ep.stage,
                        spirv::StorageClass::Input,
                        argument.name.as_deref(),
                        argument.ty,
                        binding,
                    )?;
                    interface.push(varying_id);
                    let id = self.id_gen.next();
                    prelude.body.push(instructions::instruction_load(
                        argument_type_id,
                        id,
                        varying_id,
                        None,
                    ));
                    argument_ids.push(id);
                }
                None => {
                    // a struct whose members carry the bindings: one input
                    // variable per member, reassembled into the struct value
                    let members = match module.types[argument.ty].inner {
                        crate::TypeInner::Struct { ref members, .. } => members,
                        _ => return Err(Error::Validation("unbound entry point argument")),
                    };
                    let mut constituent_ids = Vec::with_capacity(members.len());
                    for member in members.iter() {
                        let binding = member
                            .binding
                            .as_ref()
                            .ok_or(Error::Validation("unbound entry point struct member"))?;
                        let type_id =
                            self.get_type_id(&module.types, LookupType::Handle(member.ty))?;
                        let varying_id = self.write_varying(
                            module,
                            ep.stage,
                            spirv::StorageClass::Input,
                            member.name.as_deref(),
                            member.ty,
                            binding,
                        )?;
                        interface.push(varying_id);
                        let id = self.id_gen.next();
                        prelude.body.push(instructions::instruction_load(
                            type_id, id, varying_id, None,
                        ));
                        constituent_ids.push(id);
                    }
                    let id = self.id_gen.next();
                    prelude.body.push(instructions::instruction_composite_construct(
                        argument_type_id,
                        id,
                        &constituent_ids,
                    ));
                    argument_ids.push(id);
                }
            }
        }
        Ok(argument_ids)
    }

    /// Emit an entry point's output variables.
    fn write_entry_point_results(
        &mut self,
        module: &crate::Module,
        ep: &crate::EntryPoint,
        ir_function: &crate::Function,
        interface: &mut Vec<Word>,
    ) -> Result<(Vec<ResultMember>, bool), Error> {
        let result = match ir_function.result {
            Some(ref result) => result,
            None => return Ok((Vec::new(), false)),
        };
        match result.binding {
            Some(ref binding) => {
                let type_id = self.get_type_id(&module.types, LookupType::Handle(result.ty))?;
                let varying_id = self.write_varying(
                    module,
                    ep.stage,
                    spirv::StorageClass::Output,
                    None,
                    result.ty,
                    binding,
                )?;
                interface.push(varying_id);
                let built_in = match *binding {
                    crate::Binding::BuiltIn(built_in) => Some(built_in),
                    crate::Binding::Location(_) => None,
                };
                Ok((
                    vec![ResultMember {
                        id: varying_id,
                        type_id,
                        built_in,
                    }],
                    false,
                ))
            }
            None => {
                let members = match module.types[result.ty].inner {
                    crate::TypeInner::Struct { ref members, .. } => members,
                    _ => return Err(Error::Validation("unbound entry point result")),
                };
                let mut result_members = Vec::with_capacity(members.len());
                for member in members.iter() {
                    let binding = member
                        .binding
                        .as_ref()
                        .ok_or(Error::Validation("unbound entry point struct member"))?;
                    let type_id = self.get_type_id(&module.types, LookupType::Handle(member.ty))?;
                    let varying_id = self.write_varying(
                        module,
                        ep.stage,
                        spirv::StorageClass::Output,
                        member.name.as_deref(),
                        member.ty,
                        binding,
                    )?;
                    interface.push(varying_id);
                    let built_in = match *binding {
                        crate::Binding::BuiltIn(built_in) => Some(built_in),
                        crate::Binding::Location(_) => None,
                    };
                    result_members.push(ResultMember {
                        id: varying_id,
                        type_id,
                        built_in,
                    });
                }
                Ok((result_members, true))
            }
        }
    }

    fn write_function(
        &mut self,
        ir_handle: Handle<crate::Function>,
        ir_function: &crate::Function,
        module: &crate::Module,
        entry_point: Option<&crate::EntryPoint>,
    ) -> Result<Option<Vec<Word>>, Error> {
        self.cached.reset(ir_function.expressions.len());
        let mut function = Function::default();
        let function_id = self.lookup_function[&ir_handle];

        // signature
        let return_type_id = match entry_point {
            Some(_) => self.get_void_type_id(),
            None => match ir_function.result {
                Some(ref result) => {
                    self.get_type_id(&module.types, LookupType::Handle(result.ty))?
                }
                None => self.get_void_type_id(),
            },
        };
        let mut parameter_type_ids = Vec::new();
        if entry_point.is_none() {
            for argument in ir_function.arguments.iter() {
                parameter_type_ids
                    .push(self.get_type_id(&module.types, LookupType::Handle(argument.ty))?);
            }
        }
        let lookup_function_type = LookupFunctionType {
            parameter_type_ids: parameter_type_ids.clone(),
            return_type_id,
        };
        let function_type_id = match self.lookup_function_type.get(&lookup_function_type) {
            Some(&id) => id,
            None => {
                let id = self.id_gen.next();
                instructions::instruction_type_function(id, return_type_id, &parameter_type_ids)
                    .to_words(&mut self.logical_layout.declarations);
                self.lookup_function_type.insert(lookup_function_type, id);
                id
            }
        };
        function.signature = Some(instructions::instruction_function(
            return_type_id,
            function_id,
            spirv::FunctionControl::NONE,
            function_type_id,
        ));
        for &type_id in parameter_type_ids.iter() {
            let id = self.id_gen.next();
            function
                .parameters
                .push(instructions::instruction_function_parameter(type_id, id));
        }
        if self.flags.contains(WriterFlags::DEBUG) {
            if let Some(ref name) = ir_function.name {
                self.debugs
                    .push(instructions::instruction_name(function_id, name));
            }
        }

        let prelude_id = self.id_gen.next();
        let mut prelude = Block::new(prelude_id);
        let mut interface = Vec::new();

        // entry point I/O synthesis
        if let Some(ep) = entry_point {
            let argument_ids =
                self.write_entry_point_arguments(module, ep, ir_function, &mut prelude, &mut interface)?;
            let (results, result_is_struct) =
                self.write_entry_point_results(module, ep, ir_function, &mut interface)?;
            function.entry_point_context = Some(EntryPointContext {
                argument_ids,
                results,
                result_is_struct,
            });
        }

        // function-local variables; all `OpVariable`s are emitted at the top
        // of the entry block
        for (_, variable) in ir_function.local_variables.iter() {
            let pointer_type_id = self.get_type_id(
                &module.types,
                LookupType::Local(LocalType::Pointer {
                    base: variable.ty,
                    class: spirv::StorageClass::Function,
                }),
            )?;
            let id = self.id_gen.next();
            let init_id = match variable.init {
                Some(init) => Some(match ir_function.expressions[init] {
                    crate::Expression::Literal(literal) => self.get_constant_scalar(literal)?,
                    crate::Expression::Constant(constant) => {
                        self.constant_ids[constant.index()]
                    }
                    crate::Expression::ZeroValue(ty) => {
                        let type_id = self.get_type_id(&module.types, LookupType::Handle(ty))?;
                        self.get_constant_null(type_id)
                    }
                    _ => return Err(Error::Validation("non-constant local initializer")),
                }),
                None => None,
            };
            if self.flags.contains(WriterFlags::DEBUG) {
                if let Some(ref name) = variable.name {
                    self.debugs.push(instructions::instruction_name(id, name));
                }
            }
            function.variables.push(LocalVariable {
                id,
                instruction: instructions::instruction_variable(
                    pointer_type_id,
                    id,
                    spirv::StorageClass::Function,
                    init_id,
                ),
            });
        }

        // preload the opaque handles the function uses
        for gv in self.global_variables.iter_mut() {
            gv.handle_id = 0;
        }
        for (_, expression) in ir_function.expressions.iter() {
            if let crate::Expression::GlobalVariable(handle) = *expression {
                let var = &module.global_variables[handle];
                if var.space == crate::AddressSpace::Handle
                    && self.global_variables[handle.index()].handle_id == 0
                {
                    let var_type_id =
                        self.get_type_id(&module.types, LookupType::Handle(var.ty))?;
                    let id = self.id_gen.next();
                    let var_id = self.global_variables[handle.index()].id;
                    prelude.body.push(instructions::instruction_load(
                        var_type_id,
                        id,
                        var_id,
                        None,
                    ));
                    self.global_variables[handle.index()].handle_id = id;
                }
            }
        }

        let main_id = self.id_gen.next();
        function.consume(prelude, instructions::instruction_branch(main_id));

        let mut context = super::block::BlockContext {
            ir_module: module,
            ir_function,
            function: &mut function,
            writer: self,
        };
        context.write_block(
            main_id,
            &ir_function.body,
            super::block::BlockExit::Return,
            super::block::LoopContext::default(),
        )?;

        function.to_words(&mut self.logical_layout.function_definitions);
        instructions::instruction_function_end()
            .to_words(&mut self.logical_layout.function_definitions);

        Ok(entry_point.map(|_| interface))
    }

    fn write_entry_point(
        &mut self,
        ep: &crate::EntryPoint,
        ir_function: &crate::Function,
        mut interface: Vec<Word>,
    ) -> Result<(), Error> {
        let function_id = self.lookup_function[&ep.function];
        // SPIR-V 1.4 widened the interface to every used global
        if self.physical_layout.version >= (1 << 16) | (4 << 8) {
            let mut listed = crate::FastHashSet::default();
            for (_, expression) in ir_function.expressions.iter() {
                if let crate::Expression::GlobalVariable(handle) = *expression {
                    if listed.insert(handle) {
                        interface.push(self.global_variables[handle.index()].id);
                    }
                }
            }
        }
        let execution_model = match ep.stage {
            crate::ShaderStage::Vertex => spirv::ExecutionModel::Vertex,
            crate::ShaderStage::Fragment => spirv::ExecutionModel::Fragment,
            crate::ShaderStage::Compute => spirv::ExecutionModel::GLCompute,
        };
        instructions::instruction_entry_point(execution_model, function_id, &ep.name, &interface)
            .to_words(&mut self.logical_layout.entry_points);
        match ep.stage {
            crate::ShaderStage::Vertex => {}
            crate::ShaderStage::Fragment => {
                instructions::instruction_execution_mode(
                    function_id,
                    spirv::ExecutionMode::OriginUpperLeft,
                    &[],
                )
                .to_words(&mut self.logical_layout.execution_modes);
                if let Some(ref result) = ir_function.result {
                    if result.binding
                        == Some(crate::Binding::BuiltIn(crate::BuiltIn::FragDepth))
                    {
                        instructions::instruction_execution_mode(
                            function_id,
                            spirv::ExecutionMode::DepthReplacing,
                            &[],
                        )
                        .to_words(&mut self.logical_layout.execution_modes);
                    }
                }
            }
            crate::ShaderStage::Compute => {
                instructions::instruction_execution_mode(
                    function_id,
                    spirv::ExecutionMode::LocalSize,
                    &ep.workgroup_size,
                )
                .to_words(&mut self.logical_layout.execution_modes);
            }
        }
        Ok(())
    }

    /// Write a validated module as a stream of words.
    pub fn write(&mut self, module: &crate::Module, words: &mut Vec<Word>) -> Result<(), Error> {
        self.reset();
        self.capabilities_used.insert(Capability::Shader);
        self.gl450_ext_inst_id = self.id_gen.next();

        if self.flags.contains(WriterFlags::DEBUG) {
            self.debugs.push(instructions::instruction_source(
                spirv::SourceLanguage::Unknown,
                0,
            ));
        }

        // types, in registry order; pointer and transient types follow lazily
        for (handle, _) in module.types.iter() {
            self.get_type_id(&module.types, LookupType::Handle(handle))?;
        }

        // constants; scalar leaves precede the composites that use them
        for (handle, _) in module.constants.iter() {
            let id = self.write_constant(handle, module)?;
            self.constant_ids.push(id);
        }

        // global variables
        for (_, var) in module.global_variables.iter() {
            let gv = self.write_global_variable(module, var)?;
            self.global_variables.push(gv);
        }

        // allocate all function IDs up front, so calls can be forward
        for (handle, _) in module.functions.iter() {
            let id = self.id_gen.next();
            self.lookup_function.insert(handle, id);
        }

        let mut entry_point_interfaces = Vec::with_capacity(module.entry_points.len());
        for (handle, ir_function) in module.functions.iter() {
            let entry_point = module
                .entry_points
                .iter()
                .find(|ep| ep.function == handle);
            let interface = self.write_function(handle, ir_function, module, entry_point)?;
            if let Some(interface) = interface {
                entry_point_interfaces.push((handle, interface));
            }
        }

        // entry point declarations, in their own order
        for ep in module.entry_points.iter() {
            let interface = entry_point_interfaces
                .iter()
                .find(|&&(handle, _)| handle == ep.function)
                .map(|&(_, ref interface)| interface.clone())
                .ok_or(Error::Validation("entry point function is missing"))?;
            let ir_function = &module.functions[ep.function];
            self.write_entry_point(ep, ir_function, interface)?;
        }

        // compose the final module; capabilities are sorted so the binary
        // is reproducible
        let mut capabilities: Vec<_> = self.capabilities_used.iter().cloned().collect();
        capabilities.sort_by_key(|&capability| capability as u32);
        for capability in capabilities {
            instructions::instruction_capability(capability)
                .to_words(&mut self.logical_layout.capabilities);
        }
        instructions::instruction_ext_inst_import(self.gl450_ext_inst_id, "GLSL.std.450")
            .to_words(&mut self.logical_layout.ext_inst_imports);
        instructions::instruction_memory_model(
            spirv::AddressingModel::Logical,
            spirv::MemoryModel::GLSL450,
        )
        .to_words(&mut self.logical_layout.memory_model);

        for debug in self.debugs.iter() {
            debug.to_words(&mut self.logical_layout.debugs);
        }
        for annotation in self.annotations.iter() {
            annotation.to_words(&mut self.logical_layout.annotations);
        }

        self.physical_layout.bound = self.id_gen.0 + 1;
        self.physical_layout.in_words(words);
        self.logical_layout.in_words(words);
        Ok(())
    }
}
