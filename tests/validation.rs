//! Validator-focused end-to-end tests: modules that parse but violate
//! module-level invariants.

fn validate(source: &str) -> Result<(), Vec<wyvern::valid::ValidationError>> {
    let parsed = wyvern::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{}", e.emit_to_string(source)));
    wyvern::valid::Validator::new().validate(&parsed.module)
}

fn assert_rejected(source: &str, needle: &str) {
    let errors = validate(source).expect_err("expected validation to fail");
    assert!(
        errors.iter().any(|e| e.to_string().contains(needle)),
        "no error mentions {:?} in {:#?}",
        needle,
        errors
    );
}

#[test]
fn accepts_valid_module() {
    validate(
        r#"
        struct Params { scale: f32, bias: f32 }
        @group(0) @binding(0) var<uniform> params: Params;

        fn apply(value: f32) -> f32 {
            return value * params.scale + params.bias;
        }

        @fragment
        fn main(@location(0) value: f32) -> @location(0) vec4<f32> {
            let result = apply(value);
            return vec4<f32>(result, result, result, 1.0);
        }
    "#,
    )
    .unwrap();
}

#[test]
fn rejects_duplicate_resource_binding() {
    assert_rejected(
        r#"
        @group(0) @binding(0) var<uniform> a: f32;
        @group(0) @binding(0) var<uniform> b: f32;
        "#,
        "used by two global variables",
    );
}

#[test]
fn rejects_zero_workgroup_size() {
    assert_rejected(
        r#"
        @compute @workgroup_size(0)
        fn main() {}
        "#,
        "non-zero",
    );
}

#[test]
fn rejects_vertex_without_position() {
    assert_rejected(
        r#"
        @vertex
        fn main() -> @location(0) vec4<f32> {
            return vec4<f32>(0.0, 0.0, 0.0, 1.0);
        }
        "#,
        "position",
    );
}

#[test]
fn rejects_break_outside_loop() {
    // the parser is happy with this; the validator is not
    assert_rejected(
        r#"
        fn main() {
            break;
        }
        "#,
        "break",
    );
}

#[test]
fn rejects_continue_in_continuing() {
    assert_rejected(
        r#"
        fn main() {
            loop {
                continuing {
                    continue;
                }
            }
        }
        "#,
        "continuing",
    );
}

#[test]
fn rejects_unbound_entry_point_input() {
    assert_rejected(
        r#"
        @fragment
        fn main(value: f32) -> @location(0) vec4<f32> {
            return vec4<f32>(value, 0.0, 0.0, 1.0);
        }
        "#,
        "missing a binding",
    );
}

#[test]
fn collects_multiple_errors() {
    let errors = validate(
        r#"
        @group(0) @binding(0) var<uniform> a: f32;
        @group(0) @binding(0) var<uniform> b: f32;

        @compute @workgroup_size(0)
        fn main() {}
        "#,
    )
    .expect_err("expected validation to fail");
    // the validator collects instead of stopping at the first problem
    assert!(errors.len() >= 2, "expected several errors: {:#?}", errors);
}

#[test]
fn switch_requires_single_default() {
    validate(
        r#"
        fn pick(x: i32) -> i32 {
            var r: i32 = 0;
            switch x {
                case 0: { r = 1; }
                default: { r = 2; }
            }
            return r;
        }
        "#,
    )
    .unwrap();
}
