use indoc::indoc;

use kalc::codegen::{CodegenError, ErrorKind, generate};
use kalc::ir::{InstructionData, Module, Terminator, verify_module};
use kalc::parser::ParseOptions;
use kalc::{CompileError, compile, parse};

fn lower(source: &str) -> Result<Module, CodegenError> {
    let program = parse(source, &ParseOptions::default()).expect("parse");
    generate(&program)
}

#[test]
fn outer_binding_is_visible_and_rebindable_in_branch() {
    let module = lower(indoc! {"
        def f(x) {
            y = x
            if x > 0 {
                y = y + 1
                return y
            }
            return y
        }
    "})
    .expect("lower");
    verify_module(&module).expect("verify");

    let function = module.function("f").expect("f");
    let slots: Vec<_> = function.stack_slots.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(slots, ["x", "y", "y"]);

    // The branch reads the outer `y` (ss1) before binding its own (ss2).
    let then_block = &function.blocks[1];
    assert!(matches!(
        then_block.instructions[0].data,
        InstructionData::StackLoad { slot } if slot.index() == 1
    ));
    assert!(matches!(
        then_block.instructions[3].data,
        InstructionData::StackStore { slot, .. } if slot.index() == 2
    ));
}

#[test]
fn branch_binding_is_not_visible_after_conditional() {
    let err = lower(indoc! {"
        def f(x) {
            if x {
                inner = 1
            } else {
                inner = 2
            }
            return inner
        }
    "})
    .expect_err("inner is scoped to its branch");
    assert_eq!(err.kind(), ErrorKind::NameResolution);
    assert_eq!(err.to_string(), "identifier not found: `inner` in function `f`");
}

#[test]
fn undefined_identifier_is_a_name_resolution_error() {
    let err = compile("def f(x) { return z }", &ParseOptions::default())
        .expect_err("z is undefined");
    match err {
        CompileError::Codegen(err) => assert_eq!(err.kind(), ErrorKind::NameResolution),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn left_operand_is_emitted_before_right() {
    let module = lower(indoc! {"
        def a() { return 1 }
        def b() { return 2 }
        def f() { return a() - b() }
    "})
    .expect("lower");

    let entry = &module.function("f").expect("f").blocks[0];
    let callees: Vec<_> = entry
        .instructions
        .iter()
        .filter_map(|instruction| match &instruction.data {
            InstructionData::Call { callee, .. } => Some(callee.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(callees, ["a", "b"]);
}

#[test]
fn call_arguments_are_lowered_left_to_right() {
    let module = lower(indoc! {"
        def pair(p, q) { return p }
        def f(x) { return pair(x + 1, x * 2) }
    "})
    .expect("lower");

    let entry = &module.function("f").expect("f").blocks[0];
    let Some(InstructionData::Call { args, .. }) =
        entry.instructions.iter().map(|i| &i.data).find(|data| {
            matches!(data, InstructionData::Call { .. })
        })
    else {
        panic!("no call emitted");
    };
    assert!(args[0] < args[1]);
}

#[test]
fn functions_may_call_later_declarations() {
    let module = lower(indoc! {"
        def even(n) {
            if n < 1 {
                return 1
            }
            return odd(n - 1)
        }
        def odd(n) {
            if n < 1 {
                return 0
            }
            return even(n - 1)
        }
    "})
    .expect("lower");
    verify_module(&module).expect("verify");
    assert_eq!(module.functions.len(), 2);
}

#[test]
fn every_block_ends_in_one_terminator() {
    let module = lower(indoc! {"
        def f(x) {
            if x < 0 {
                x = 0 - x
            } else {
                if x > 100 {
                    return 100
                }
            }
            return x
        }
    "})
    .expect("lower");
    verify_module(&module).expect("verify");

    let function = &module.functions[0];
    for (block, data) in function.blocks() {
        assert!(data.terminator.is_some(), "{block} is not terminated");
    }
    let returns = function
        .blocks
        .iter()
        .filter(|data| matches!(data.terminator, Some(Terminator::Return { .. })))
        .count();
    assert_eq!(returns, 2);
}

#[test]
fn extern_calls_check_arity() {
    let err = lower("extern pow(a, b) def f(x) { return pow(x) }").expect_err("arity");
    assert_eq!(err.kind(), ErrorKind::Structural);
}
