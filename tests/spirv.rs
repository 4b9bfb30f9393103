//! End-to-end tests: WGSL source through validation into SPIR-V, with
//! structural assertions over the emitted word stream.

use spirv::Op;

/// A decoded SPIR-V instruction: opcode plus every following word.
#[derive(Clone, Debug)]
struct Inst {
    op: u32,
    words: Vec<u32>,
}

impl Inst {
    fn is(&self, op: Op) -> bool {
        self.op == op as u32
    }
}

struct SpvModule {
    words: Vec<u32>,
    instructions: Vec<Inst>,
}

impl SpvModule {
    fn decode(words: Vec<u32>) -> Self {
        assert!(words.len() > 5, "module too short");
        let mut instructions = Vec::new();
        let mut offset = 5;
        while offset < words.len() {
            let word_count = (words[offset] >> 16) as usize;
            let op = words[offset] & 0xffff;
            assert!(word_count > 0, "zero length instruction");
            assert!(offset + word_count <= words.len(), "instruction overrun");
            instructions.push(Inst {
                op,
                words: words[offset + 1..offset + word_count].to_vec(),
            });
            offset += word_count;
        }
        SpvModule {
            words,
            instructions,
        }
    }

    fn find_all(&self, op: Op) -> Vec<&Inst> {
        self.instructions
            .iter()
            .filter(|inst| inst.is(op))
            .collect()
    }

    fn find_one(&self, op: Op) -> &Inst {
        let found = self.find_all(op);
        assert_eq!(found.len(), 1, "expected exactly one {:?}", op);
        found[0]
    }

    /// The blocks of every function: `(label_id, instructions)` tuples.
    fn function_blocks(&self) -> Vec<(u32, Vec<&Inst>)> {
        let mut blocks = Vec::new();
        let mut current: Option<(u32, Vec<&Inst>)> = None;
        let mut in_function = false;
        for inst in &self.instructions {
            if inst.is(Op::Function) {
                in_function = true;
            } else if inst.is(Op::FunctionEnd) {
                in_function = false;
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            } else if in_function && inst.is(Op::Label) {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                current = Some((inst.words[0], Vec::new()));
            } else if let Some((_, ref mut body)) = current {
                body.push(inst);
            }
        }
        blocks
    }
}

fn compile(source: &str) -> SpvModule {
    let _ = env_logger::builder().is_test(true).try_init();
    let parsed = wyvern::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{}", e.emit_to_string(source)));
    wyvern::valid::Validator::new()
        .validate(&parsed.module)
        .unwrap_or_else(|errors| panic!("validation failed: {:?}", errors));
    let words = wyvern::back::spv::write_vec(&parsed.module, &Default::default()).unwrap();
    SpvModule::decode(words)
}

/// Check the universal structural properties of §8 on a compiled module.
fn check_structural(module: &SpvModule) {
    // the header leads with the magic number
    assert_eq!(module.words[0], spirv::MAGIC_NUMBER);
    // the bound exceeds every result ID in the module
    let bound = module.words[3];
    for inst in &module.instructions {
        for &word in &inst.words {
            if inst.is(Op::Label) || inst.is(Op::TypeVoid) {
                assert!(word < bound, "id {} out of bound {}", word, bound);
            }
        }
    }
    // there is exactly one void type
    assert_eq!(module.find_all(Op::TypeVoid).len(), 1);
    // no two type declarations are textually identical
    let type_range = (Op::TypeVoid as u32)..=(Op::TypeFunction as u32);
    let mut seen_types: Vec<(u32, Vec<u32>)> = Vec::new();
    for inst in &module.instructions {
        if type_range.contains(&inst.op) {
            // drop the result id, compare the rest
            let mut key = inst.words.clone();
            let result_index = 0;
            key.remove(result_index);
            let entry = (inst.op, key);
            assert!(
                !seen_types.contains(&entry),
                "duplicate type declaration {:?}",
                inst
            );
            seen_types.push(entry);
        }
    }
    // within every function, variables lead the first block
    let blocks = module.function_blocks();
    assert!(!blocks.is_empty());
    for &(_, ref body) in &blocks {
        let mut seen_non_variable = false;
        for inst in body {
            if inst.is(Op::Variable) && inst.words[2] == spirv::StorageClass::Function as u32 {
                assert!(
                    !seen_non_variable,
                    "OpVariable after another instruction in a block"
                );
            } else {
                seen_non_variable = true;
            }
        }
    }
}

/// Find an `OpEntryPoint` by name, returning its execution model and
/// interface operands.
fn entry_point_interface(module: &SpvModule, name: &str) -> (u32, Vec<u32>) {
    for inst in module.find_all(Op::EntryPoint) {
        // words: execution model, function id, name..., interface ids
        let name_words = string_words(name);
        let decoded_name = &inst.words[2..2 + name_words.len()];
        if decoded_name == name_words.as_slice() {
            return (
                inst.words[0],
                inst.words[2 + name_words.len()..].to_vec(),
            );
        }
    }
    panic!("entry point {:?} not found", name);
}

fn string_words(input: &str) -> Vec<u32> {
    let mut words: Vec<u32> = input
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            let mut word = 0u32;
            for (i, &byte) in chunk.iter().enumerate() {
                word |= (byte as u32) << (i * 8);
            }
            word
        })
        .collect();
    if input.len() % 4 == 0 {
        words.push(0);
    }
    words
}

#[test]
fn trivial_vertex_entry() {
    let module = compile(
        r#"
        @vertex
        fn main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
            return vec4<f32>(0.0, 0.0, 0.0, 1.0);
        }
    "#,
    );
    check_structural(&module);

    let (execution_model, interface) = entry_point_interface(&module, "main");
    assert_eq!(execution_model, spirv::ExecutionModel::Vertex as u32);
    // one Input for vertex_index, one Output for position
    assert_eq!(interface.len(), 2);

    // both interface variables are declared with the right classes
    let variables = module.find_all(Op::Variable);
    let class_of = |id: u32| {
        variables
            .iter()
            .find(|inst| inst.words[1] == id)
            .map(|inst| inst.words[2])
            .expect("interface variable not declared")
    };
    let classes: Vec<u32> = interface.iter().map(|&id| class_of(id)).collect();
    assert!(classes.contains(&(spirv::StorageClass::Input as u32)));
    assert!(classes.contains(&(spirv::StorageClass::Output as u32)));
}

#[test]
fn struct_io_fragment_entry() {
    let module = compile(
        r#"
        struct VertexOutput {
            @builtin(position) position: vec4<f32>,
            @location(0) color: vec4<f32>,
        }

        @vertex
        fn vs(@builtin(vertex_index) index: u32) -> VertexOutput {
            return VertexOutput(
                vec4<f32>(0.0, 0.0, 0.0, 1.0),
                vec4<f32>(1.0, 0.0, 0.0, 1.0),
            );
        }

        @fragment
        fn fs(input: VertexOutput) -> @location(0) vec4<f32> {
            return input.color;
        }
    "#,
    );
    check_structural(&module);

    // the fragment stage reads two member inputs and writes one output
    let (execution_model, interface) = entry_point_interface(&module, "fs");
    assert_eq!(execution_model, spirv::ExecutionModel::Fragment as u32);
    assert_eq!(interface.len(), 3);

    // the struct argument is reconstructed from per-member loads
    assert!(!module.find_all(Op::CompositeConstruct).is_empty());
    // fragment entry points run with the upper-left origin
    let mode = module.find_all(Op::ExecutionMode);
    assert!(mode.iter().any(|inst| {
        inst.words[1] == spirv::ExecutionMode::OriginUpperLeft as u32
    }));
}

#[test]
fn collatz_compute_kernel() {
    let module = compile(
        r#"
        struct Data {
            values: array<u32, 128>,
        }

        @group(0) @binding(0) var<storage, read_write> data: Data;

        fn collatz(n_base: u32) -> u32 {
            var n = n_base;
            var i: u32 = 0u;
            loop {
                if n <= 1u {
                    break;
                }
                if n % 2u == 0u {
                    n = n / 2u;
                } else {
                    n = 3u * n + 1u;
                }
                i = i + 1u;
            }
            return i;
        }

        @compute @workgroup_size(64)
        fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
            data.values[gid.x] = collatz(data.values[gid.x]);
        }
    "#,
    );
    check_structural(&module);

    // LocalSize 64 1 1
    let modes = module.find_all(Op::ExecutionMode);
    assert!(modes.iter().any(|inst| {
        inst.words[1] == spirv::ExecutionMode::LocalSize as u32
            && inst.words[2..] == [64, 1, 1]
    }));

    // the storage buffer struct carries `Block`, and the variable its bindings
    let decorations = module.find_all(Op::Decorate);
    assert!(decorations
        .iter()
        .any(|inst| inst.words[1] == spirv::Decoration::Block as u32));
    assert!(decorations.iter().any(|inst| {
        inst.words[1] == spirv::Decoration::DescriptorSet as u32 && inst.words[2] == 0
    }));
    assert!(decorations.iter().any(|inst| {
        inst.words[1] == spirv::Decoration::Binding as u32 && inst.words[2] == 0
    }));

    // in the kernel, the call precedes the store of its result
    let blocks = module.function_blocks();
    let call_block = blocks
        .iter()
        .find(|(_, body)| body.iter().any(|inst| inst.is(Op::FunctionCall)))
        .expect("no block calls collatz");
    let call_index = call_block
        .1
        .iter()
        .position(|inst| inst.is(Op::FunctionCall))
        .unwrap();
    let store_index = call_block
        .1
        .iter()
        .position(|inst| inst.is(Op::Store))
        .expect("the result is never stored");
    assert!(call_index < store_index);

    // continuing blocks of the loop contain no memory traffic
    let merges = module.find_all(Op::LoopMerge);
    assert!(!merges.is_empty());
    for merge in merges {
        let continue_label = merge.words[1];
        let continuing = blocks
            .iter()
            .find(|&&(label, _)| label == continue_label)
            .expect("continuing block is missing");
        assert!(!continuing
            .1
            .iter()
            .any(|inst| inst.is(Op::Load) || inst.is(Op::Store)));
    }
}

#[test]
fn atomic_compare_exchange() {
    let module = compile(
        r#"
        struct Counter {
            value: atomic<u32>,
            last: u32,
        }

        @group(0) @binding(0) var<storage, read_write> counter: Counter;

        @compute @workgroup_size(1)
        fn main() {
            counter.last = atomicCompareExchangeWeak(&counter.value, 0u, 1u);
        }
    "#,
    );
    check_structural(&module);

    // a single compare-exchange, whose result feeds the store
    let exchange = module.find_one(Op::AtomicCompareExchange);
    let result_id = exchange.words[1];
    let stores = module.find_all(Op::Store);
    assert!(stores.iter().any(|inst| inst.words[1] == result_id));

    // the backing variable lives in the storage buffer class
    let variables = module.find_all(Op::Variable);
    assert!(variables
        .iter()
        .any(|inst| inst.words[2] == spirv::StorageClass::StorageBuffer as u32));
}

#[test]
fn loop_with_break_if() {
    let module = compile(
        r#"
        fn count() -> i32 {
            var i: i32 = 0;
            loop {
                continuing {
                    i = i + 1;
                    break if i >= 10;
                }
            }
            return i;
        }
    "#,
    );
    check_structural(&module);

    let blocks = module.function_blocks();
    let merge = module.find_one(Op::LoopMerge);
    let merge_label = merge.words[0];
    let continue_label = merge.words[1];
    // the loop header is the block holding the OpLoopMerge
    let header_label = blocks
        .iter()
        .find(|(_, body)| body.iter().any(|inst| inst.is(Op::LoopMerge)))
        .unwrap()
        .0;

    // the continuing block must end in `BranchConditional(cond, merge, header)`
    let continuing = blocks
        .iter()
        .find(|&&(label, _)| label == continue_label)
        .expect("continuing block is missing");
    let terminator = continuing.1.last().expect("continuing block is empty");
    assert!(terminator.is(Op::BranchConditional));
    assert_eq!(terminator.words[1], merge_label);
    assert_eq!(terminator.words[2], header_label);
}

#[test]
fn break_in_continuing_is_rejected() {
    let source = r#"
        fn count() -> i32 {
            var i: i32 = 0;
            loop {
                continuing {
                    i = i + 1;
                    break;
                }
            }
            return i;
        }
    "#;
    let parsed = wyvern::front::wgsl::parse_str(source).unwrap();
    let result = wyvern::valid::Validator::new().validate(&parsed.module);
    let errors = result.unwrap_err();
    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("continuing")));
}

#[test]
fn vector_swizzle_and_comparison() {
    let source = r#"
        @fragment
        fn main() -> @location(0) vec4<f32> {
            let m = vec3<f32>(1.0, 2.0, 3.0);
            let mask = m > vec3<f32>(0.0);
            let r = select(m, -m, mask);
            return vec4<f32>(r.xyz, 1.0);
        }
    "#;
    let parsed = wyvern::front::wgsl::parse_str(source).unwrap();

    // the comparison resolves to an inline `vec3<bool>` without ever being
    // interned
    let fun = parsed
        .module
        .functions
        .iter()
        .map(|(_, f)| f)
        .next()
        .unwrap();
    let comparison = fun
        .expressions
        .iter()
        .find(|&(_, e)| {
            matches!(
                e,
                &wyvern::Expression::Binary {
                    op: wyvern::BinaryOperator::Greater,
                    ..
                }
            )
        })
        .map(|(h, _)| h)
        .unwrap();
    match fun.expression_type(comparison) {
        &wyvern::proc::TypeResolution::Value(wyvern::TypeInner::Vector {
            kind: wyvern::ScalarKind::Bool,
            size: wyvern::VectorSize::Tri,
            ..
        }) => {}
        other => panic!("unexpected resolution {:?}", other),
    }

    wyvern::valid::Validator::new().validate(&parsed.module).unwrap();
    let words = wyvern::back::spv::write_vec(&parsed.module, &Default::default()).unwrap();
    let module = SpvModule::decode(words);
    check_structural(&module);

    // the comparison becomes `OpFOrdGreaterThan` with a bool-vector result
    let greater = module.find_one(Op::FOrdGreaterThan);
    let bool_id = module.find_one(Op::TypeBool).words[0];
    let bool_vector = module
        .find_all(Op::TypeVector)
        .into_iter()
        .find(|inst| inst.words[1] == bool_id && inst.words[2] == 3)
        .expect("no vec3<bool> type");
    assert_eq!(greater.words[0], bool_vector.words[0]);
    // and the select lowers to `OpSelect`
    assert!(!module.find_all(Op::Select).is_empty());
}
