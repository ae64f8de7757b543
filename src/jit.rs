//! Native execution of IR modules through Cranelift.
//!
//! Every IR function becomes a Cranelift function taking and returning
//! `f64`. Our stack slots map one to one onto 8-byte explicit stack slots,
//! so loads and stores translate directly. Externs are imported symbols and
//! must be provided as host functions. Cranelift has no float remainder, so
//! `frem` calls the host `fmod`.

use std::collections::HashMap;

use anyhow::{Context, Result, bail, ensure};
use cranelift_codegen::ir::condcodes::FloatCC;
use cranelift_codegen::ir::{
    AbiParam, InstBuilder, Signature, StackSlotData, StackSlotKind, types,
};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};

use crate::ir::{self, BinaryOpcode, FloatCondition, InstructionData, Terminator};

/// A native function that `extern` declarations may bind to.
#[derive(Debug, Clone, Copy)]
pub struct HostFunction {
    pub name: &'static str,
    pub function: *const u8,
    pub arity: usize,
}

extern "C" fn host_sqrt(x: f64) -> f64 {
    x.sqrt()
}

extern "C" fn host_sin(x: f64) -> f64 {
    x.sin()
}

extern "C" fn host_cos(x: f64) -> f64 {
    x.cos()
}

extern "C" fn host_exp(x: f64) -> f64 {
    x.exp()
}

extern "C" fn host_floor(x: f64) -> f64 {
    x.floor()
}

extern "C" fn host_fabs(x: f64) -> f64 {
    x.abs()
}

extern "C" fn host_pow(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

extern "C" fn host_fmod(dividend: f64, divisor: f64) -> f64 {
    dividend % divisor
}

/// Symbol `frem` is lowered to; kept apart from extern names.
const REMAINDER_SYMBOL: &str = "kalc.fmod";

/// Math routines available to every module.
pub fn default_host_functions() -> Vec<HostFunction> {
    vec![
        HostFunction {
            name: "sqrt",
            function: host_sqrt as *const u8,
            arity: 1,
        },
        HostFunction {
            name: "sin",
            function: host_sin as *const u8,
            arity: 1,
        },
        HostFunction {
            name: "cos",
            function: host_cos as *const u8,
            arity: 1,
        },
        HostFunction {
            name: "exp",
            function: host_exp as *const u8,
            arity: 1,
        },
        HostFunction {
            name: "floor",
            function: host_floor as *const u8,
            arity: 1,
        },
        HostFunction {
            name: "fabs",
            function: host_fabs as *const u8,
            arity: 1,
        },
        HostFunction {
            name: "pow",
            function: host_pow as *const u8,
            arity: 2,
        },
        HostFunction {
            name: "fmod",
            function: host_fmod as *const u8,
            arity: 2,
        },
    ]
}

struct CompiledFunction {
    pointer: *const u8,
    arity: usize,
}

/// A module compiled to machine code. Functions stay callable for as long as
/// this value lives.
pub struct Jit {
    _module: JITModule,
    functions: HashMap<String, CompiledFunction>,
}

impl Jit {
    pub fn new(module: &ir::Module) -> Result<Self> {
        Self::with_host_functions(module, &default_host_functions())
    }

    /// Compiles `module`, binding its externs to `hosts`. The module is
    /// verified first; invalid IR is an error, never a crash.
    pub fn with_host_functions(module: &ir::Module, hosts: &[HostFunction]) -> Result<Self> {
        ir::verify_module(module).context("Refusing to compile invalid IR")?;

        let mut builder = JITBuilder::new(cranelift_module::default_libcall_names())?;
        builder.symbol(REMAINDER_SYMBOL, host_fmod as *const u8);
        for declaration in &module.externs {
            let host = hosts
                .iter()
                .find(|host| host.name == declaration.name)
                .with_context(|| format!("No host function for extern `{}`", declaration.name))?;
            ensure!(
                host.arity == declaration.params.len(),
                "Extern `{}` declares {} parameters but the host function takes {}",
                declaration.name,
                declaration.params.len(),
                host.arity
            );
            builder.symbol(host.name, host.function);
        }
        let mut jit = JITModule::new(builder);

        // Declare everything first so calls can target any function.
        let remainder = jit.declare_function(
            REMAINDER_SYMBOL,
            Linkage::Import,
            &f64_signature(&jit, 2),
        )?;
        let mut ids = HashMap::new();
        for declaration in &module.externs {
            let sig = f64_signature(&jit, declaration.params.len());
            let id = jit.declare_function(&declaration.name, Linkage::Import, &sig)?;
            ids.insert(declaration.name.clone(), id);
        }
        for function in &module.functions {
            let sig = f64_signature(&jit, function.params.len());
            let id = jit.declare_function(&function.name, Linkage::Local, &sig)?;
            ids.insert(function.name.clone(), id);
        }

        let mut builder_ctx = FunctionBuilderContext::new();
        for function in &module.functions {
            let id = ids[&function.name];
            define_function(&mut jit, &mut builder_ctx, &ids, remainder, id, function)
                .with_context(|| format!("Compiling `{}`", function.name))?;
        }

        jit.finalize_definitions()?;

        let functions = module
            .functions
            .iter()
            .map(|function| {
                let pointer = jit.get_finalized_function(ids[&function.name]);
                let compiled = CompiledFunction {
                    pointer,
                    arity: function.params.len(),
                };
                (function.name.clone(), compiled)
            })
            .collect();
        log::debug!("jit compiled {} functions", module.functions.len());

        Ok(Self {
            _module: jit,
            functions,
        })
    }

    /// Calls function `name` with `args`.
    pub fn call(&self, name: &str, args: &[f64]) -> Result<f64> {
        let Some(function) = self.functions.get(name) else {
            bail!("Unknown function `{name}`");
        };
        ensure!(
            function.arity == args.len(),
            "`{name}` takes {} arguments, got {}",
            function.arity,
            args.len()
        );

        // SAFETY: the pointer comes from a finalized function of this module
        // whose signature is `arity` f64 parameters returning one f64, using
        // the platform's default calling convention.
        let result = unsafe {
            match *args {
                [] => {
                    let f: extern "C" fn() -> f64 = std::mem::transmute(function.pointer);
                    f()
                }
                [a] => {
                    let f: extern "C" fn(f64) -> f64 = std::mem::transmute(function.pointer);
                    f(a)
                }
                [a, b] => {
                    let f: extern "C" fn(f64, f64) -> f64 = std::mem::transmute(function.pointer);
                    f(a, b)
                }
                [a, b, c] => {
                    let f: extern "C" fn(f64, f64, f64) -> f64 =
                        std::mem::transmute(function.pointer);
                    f(a, b, c)
                }
                [a, b, c, d] => {
                    let f: extern "C" fn(f64, f64, f64, f64) -> f64 =
                        std::mem::transmute(function.pointer);
                    f(a, b, c, d)
                }
                _ => bail!("Calling functions with more than 4 arguments is not supported"),
            }
        };
        Ok(result)
    }
}

fn f64_signature(module: &JITModule, arity: usize) -> Signature {
    let mut sig = module.make_signature();
    for _ in 0..arity {
        sig.params.push(AbiParam::new(types::F64));
    }
    sig.returns.push(AbiParam::new(types::F64));
    sig
}

fn define_function(
    module: &mut JITModule,
    builder_ctx: &mut FunctionBuilderContext,
    ids: &HashMap<String, FuncId>,
    remainder: FuncId,
    id: FuncId,
    function: &ir::Function,
) -> Result<()> {
    let mut ctx = module.make_context();
    ctx.func.signature = f64_signature(module, function.params.len());
    let mut builder = FunctionBuilder::new(&mut ctx.func, builder_ctx);

    let blocks: Vec<_> = function.blocks.iter().map(|_| builder.create_block()).collect();
    let slots: Vec<_> = function
        .stack_slots
        .iter()
        .map(|_| {
            builder.create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, 8, 3))
        })
        .collect();
    let mut values = vec![None; function.value_count()];

    let Some(&entry) = blocks.first() else {
        bail!("Function `{}` has no blocks", function.name);
    };
    builder.append_block_params_for_function_params(entry);
    for (param, &value) in function.params.iter().zip(builder.block_params(entry)) {
        values[param.value.index()] = Some(value);
    }

    let mut callees = HashMap::new();
    let mut remainder_ref = None;
    for (block, data) in function.blocks() {
        builder.switch_to_block(blocks[block.index()]);

        for instruction in &data.instructions {
            let args = instruction
                .data
                .arguments()
                .iter()
                .map(|value| {
                    values
                        .get(value.index())
                        .copied()
                        .flatten()
                        .with_context(|| format!("{value} used before definition"))
                })
                .collect::<Result<Vec<_>>>()?;

            let result = match &instruction.data {
                InstructionData::F64Const { value } => Some(builder.ins().f64const(*value)),
                InstructionData::Binary { opcode, .. } => {
                    let (lhs, rhs) = (args[0], args[1]);
                    Some(match opcode {
                        BinaryOpcode::Fadd => builder.ins().fadd(lhs, rhs),
                        BinaryOpcode::Fsub => builder.ins().fsub(lhs, rhs),
                        BinaryOpcode::Fmul => builder.ins().fmul(lhs, rhs),
                        BinaryOpcode::Fdiv => builder.ins().fdiv(lhs, rhs),
                        BinaryOpcode::Frem => {
                            let local = match remainder_ref {
                                Some(local) => local,
                                None => *remainder_ref
                                    .insert(module.declare_func_in_func(remainder, builder.func)),
                            };
                            let call = builder.ins().call(local, &[lhs, rhs]);
                            builder.inst_results(call)[0]
                        }
                    })
                }
                InstructionData::Fcmp { cond, .. } => {
                    let cc = match cond {
                        FloatCondition::LessThan => FloatCC::LessThan,
                        FloatCondition::LessThanOrEqual => FloatCC::LessThanOrEqual,
                        FloatCondition::GreaterThan => FloatCC::GreaterThan,
                        FloatCondition::GreaterThanOrEqual => FloatCC::GreaterThanOrEqual,
                    };
                    let flag = builder.ins().fcmp(cc, args[0], args[1]);
                    let one = builder.ins().f64const(1.0);
                    let zero = builder.ins().f64const(0.0);
                    Some(builder.ins().select(flag, one, zero))
                }
                InstructionData::StackLoad { slot } => {
                    Some(builder.ins().stack_load(types::F64, slots[slot.index()], 0))
                }
                InstructionData::StackStore { slot, .. } => {
                    builder.ins().stack_store(args[0], slots[slot.index()], 0);
                    None
                }
                InstructionData::Call { callee, .. } => {
                    let local = match callees.get(callee) {
                        Some(local) => *local,
                        None => {
                            let Some(&callee_id) = ids.get(callee) else {
                                bail!("Call to undeclared function `{callee}`");
                            };
                            let local = module.declare_func_in_func(callee_id, builder.func);
                            callees.insert(callee.clone(), local);
                            local
                        }
                    };
                    let call = builder.ins().call(local, &args);
                    Some(builder.inst_results(call)[0])
                }
            };

            if let (Some(result), Some(value)) = (instruction.result, result) {
                values[result.index()] = Some(value);
            }
        }

        let Some(terminator) = &data.terminator else {
            bail!("{block} is not terminated");
        };
        let lookup = |value: ir::Value| {
            values
                .get(value.index())
                .copied()
                .flatten()
                .with_context(|| format!("{value} used before definition"))
        };
        match terminator {
            Terminator::Jump { destination } => {
                builder.ins().jump(blocks[destination.index()], &[]);
            }
            Terminator::Brif {
                condition,
                then_destination,
                else_destination,
            } => {
                let condition = lookup(*condition)?;
                let zero = builder.ins().f64const(0.0);
                let taken = builder.ins().fcmp(FloatCC::NotEqual, condition, zero);
                builder.ins().brif(
                    taken,
                    blocks[then_destination.index()],
                    &[],
                    blocks[else_destination.index()],
                    &[],
                );
            }
            Terminator::Return { value } => {
                let value = lookup(*value)?;
                builder.ins().return_(&[value]);
            }
        }
    }

    builder.seal_all_blocks();
    builder.finalize();

    module.define_function(id, &mut ctx)?;
    module.clear_context(&mut ctx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{ParseOptions, compile};

    fn jit(source: &str) -> Jit {
        let module = compile(source, &ParseOptions::default()).expect("compile");
        Jit::new(&module).expect("jit")
    }

    #[test]
    fn runs_arithmetic_and_remainder() {
        let jit = jit("def f(a, b) { return a % b }");
        assert_eq!(jit.call("f", &[7.0, 3.0]).expect("call"), 1.0);
        assert_eq!(jit.call("f", &[-7.0, 3.0]).expect("call"), -1.0);
    }

    #[test]
    fn remainder_matches_fmod_at_the_edges() {
        let jit = jit("def f(a, b) { return a % b }");
        assert_eq!(jit.call("f", &[1e17, 3.0]).expect("call"), 1.0);
        assert_eq!(jit.call("f", &[5.5, f64::INFINITY]).expect("call"), 5.5);
        assert_eq!(jit.call("f", &[-5.5, 2.0]).expect("call"), -1.5);
        assert!(jit.call("f", &[1.0, 0.0]).expect("call").is_nan());
    }

    #[test]
    fn rejects_modules_that_fail_verification() {
        let mut builder = ir::FunctionBuilder::new("f", &[]);
        let entry = builder.create_block();
        builder.switch_to_block(entry).expect("entry");
        builder.jump(ir::Block::new(7)).expect("jump");
        let module = ir::Module {
            externs: Vec::new(),
            functions: vec![builder.finish()],
        };

        let err = Jit::new(&module).err().expect("invalid IR");
        assert!(format!("{err:#}").contains("block7"), "{err:#}");
    }

    #[test]
    fn comparisons_yield_one_or_zero() {
        let jit = jit("def lt(a, b) { return a < b }");
        assert_eq!(jit.call("lt", &[1.0, 2.0]).expect("call"), 1.0);
        assert_eq!(jit.call("lt", &[2.0, 1.0]).expect("call"), 0.0);
    }

    #[test]
    fn calls_host_functions() {
        let jit = jit(indoc! {"
            extern sqrt(x)
            def hyp(a, b) {
                return sqrt((a * a) + (b * b))
            }
        "});
        assert_eq!(jit.call("hyp", &[3.0, 4.0]).expect("call"), 5.0);
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let jit = jit("def one() { return 1 }");
        assert!(jit.call("one", &[1.0]).is_err());
        assert!(jit.call("two", &[]).is_err());
    }
}
