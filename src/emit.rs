//! Address resolution and assembly text emission.
//!
//! A first scan assigns a running byte offset to every block label using the
//! fixed instruction sizes. Heap cells initialized with a `__label__<L>`
//! placeholder are rewritten to the resolved address of `L`. Emission then
//! writes the `.data_start`/`.code_start` sections in the exact grammar the
//! host's assembler expects.

use crate::ir::{HALT_ADDRESS, Instr, IrModule, JumpTarget, LABEL_PLACEHOLDER};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Compute the byte offset of every label, in block order.
pub fn resolve_label_addresses(module: &IrModule) -> HashMap<String, u32> {
    let mut addresses = HashMap::new();
    let mut offset = 0u32;
    for block in &module.blocks {
        addresses.insert(block.label.clone(), offset);
        for instr in &block.code {
            offset += instr.size();
        }
    }
    addresses
}

/// Rewrite `__label__<L>` initial values to the integer address of `L`.
pub fn patch_label_constants(module: &mut IrModule, addresses: &HashMap<String, u32>) {
    for var in &mut module.vars {
        let Some(init) = &var.init else { continue };
        let Some(label) = init.strip_prefix(LABEL_PLACEHOLDER) else {
            continue;
        };
        if let Some(addr) = addresses.get(label) {
            var.init = Some(format!("0x{:08X}", addr));
        }
    }
}

fn format_target(target: &JumpTarget, addresses: &HashMap<String, u32>) -> String {
    let addr = match target {
        JumpTarget::Address(addr) => *addr,
        JumpTarget::Label(label) => addresses.get(label).copied().unwrap_or(HALT_ADDRESS),
    };
    format!("0x{:08X}", addr)
}

/// Resolve addresses and emit the final assembly text.
pub fn emit(module: &mut IrModule) -> String {
    let addresses = resolve_label_addresses(module);
    patch_label_constants(module, &addresses);

    let mut out = String::new();

    out.push_str(".data_start\n");
    for var in &module.vars {
        if var.exported {
            let _ = writeln!(out, "    .export {}", var.name);
        }
    }
    for var in &module.vars {
        if let Some(mode) = var.sync.assembly_name() {
            let _ = writeln!(out, "    .sync {}, {}", var.name, mode);
        }
    }
    for var in &module.vars {
        let init = if var.is_this {
            "this"
        } else {
            var.init.as_deref().unwrap_or("null")
        };
        let _ = writeln!(out, "    {}: %{}, {}", var.name, var.ty, init);
    }
    out.push_str(".data_end\n\n");

    out.push_str(".code_start\n");
    for block in &module.blocks {
        if block.exported {
            let _ = writeln!(out, "    .export {}", block.label);
        }
    }
    for block in &module.blocks {
        let _ = writeln!(out, "    {}:", block.label);
        for instr in &block.code {
            match instr {
                Instr::Push(name) => {
                    let _ = writeln!(out, "        PUSH, {}", name);
                }
                Instr::Pop => out.push_str("        POP\n"),
                Instr::Extern(sig) => {
                    let _ = writeln!(out, "        EXTERN, \"{}\"", sig);
                }
                Instr::Jump(target) => {
                    let _ = writeln!(out, "        JUMP, {}", format_target(target, &addresses));
                }
                Instr::JumpIfFalse { cond, target } => {
                    let _ = writeln!(out, "        PUSH, {}", cond);
                    let _ = writeln!(
                        out,
                        "        JUMP_IF_FALSE, {}",
                        format_target(&JumpTarget::Label(target.clone()), &addresses)
                    );
                }
                Instr::JumpIndirect(cell) => {
                    let _ = writeln!(out, "        PUSH, {}", cell);
                    let _ = writeln!(out, "        JUMP_INDIRECT, {}", cell);
                }
                Instr::Copy { src, dst } => {
                    let _ = writeln!(out, "        PUSH, {}", src);
                    let _ = writeln!(out, "        PUSH, {}", dst);
                    out.push_str("        COPY\n");
                }
                Instr::Comment(text) => {
                    let _ = writeln!(out, "        # {}", text);
                }
            }
        }
    }
    out.push_str(".code_end\n");

    out
}
