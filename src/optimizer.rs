//! IR optimization passes.
//!
//! Two cheap, block-local passes driven by global reference counts:
//!
//! * **Copy propagation** removes the short-lived `__tmp_` cells lowering
//!   leaves behind. A temporary is a candidate iff its reference count is
//!   exactly two — the write and a single downstream read.
//! * **Dead-variable elimination** drops heap cells no instruction references.
//!   Exported, synced, `this`, and user-named cells are never touched; only
//!   compiler-generated `__tmp_` / `__const_` cells are eligible.
//!
//! Both passes preserve structural validity: every surviving PUSH references
//! a declared cell and every jump target label still exists.

use crate::ast::SyncMode;
use crate::ir::{Instr, IrModule};
use std::collections::HashMap;

pub fn optimize(module: &mut IrModule) {
    propagate_copies(module);
    eliminate_dead_vars(module);
}

/// Count every operand reference across the whole module. Cells are global,
/// so counts must be global even though rewrites stay inside one block.
fn reference_counts(module: &IrModule) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for block in &module.blocks {
        for instr in &block.code {
            for operand in instr.operands() {
                *counts.entry(operand.to_string()).or_default() += 1;
            }
        }
    }
    counts
}

fn is_candidate_temp(name: &str, counts: &HashMap<String, usize>) -> bool {
    name.starts_with("__tmp_") && counts.get(name).copied() == Some(2)
}

/// Any reference to `name` in `instrs`?
fn references(instrs: &[Instr], name: &str) -> bool {
    instrs
        .iter()
        .any(|i| i.operands().iter().any(|op| *op == name))
}

pub fn propagate_copies(module: &mut IrModule) {
    let mut counts = reference_counts(module);
    for block_index in 0..module.blocks.len() {
        loop {
            let rewrote = rewrite_once(&mut module.blocks[block_index].code, &mut counts);
            if !rewrote {
                break;
            }
        }
    }
}

/// Apply the first applicable rewrite in the block; returns whether one fired.
fn rewrite_once(code: &mut Vec<Instr>, counts: &mut HashMap<String, usize>) -> bool {
    for i in 0..code.len() {
        let Instr::Copy { src, dst } = &code[i] else {
            continue;
        };
        let (src, dst) = (src.clone(), dst.clone());

        // Result-slot shortcut: `push T; extern Op; ...; copy T, X` becomes
        // `push X; extern Op`. The push must sit immediately before the
        // extern — otherwise it is an argument push and rewriting would
        // change the extern's operands.
        if is_candidate_temp(&src, counts) {
            let push_at = (0..i).rev().find(|&j| code[j] == Instr::Push(src.clone()));
            if let Some(j) = push_at
                && matches!(code.get(j + 1), Some(Instr::Extern(_)))
                && !references(&code[j + 1..i], &src)
                && !references(&code[j + 1..i], &dst)
            {
                code[j] = Instr::Push(dst.clone());
                code.remove(i);
                *counts.entry(src).or_default() -= 2;
                return true;
            }
        }

        // Copy-chain collapse: `copy S, T; ...; copy T, X` becomes
        // `copy S, X` when nothing in between touches S, T, or X.
        if is_candidate_temp(&dst, counts) {
            let second = (i + 1..code.len()).find(|&j| {
                matches!(&code[j], Instr::Copy { src: s2, .. } if *s2 == dst)
            });
            if let Some(j) = second {
                let Instr::Copy { dst: x, .. } = &code[j] else {
                    unreachable!("found by pattern above");
                };
                let x = x.clone();
                let between = &code[i + 1..j];
                if !references(between, &src)
                    && !references(between, &dst)
                    && !references(between, &x)
                {
                    code[j] = Instr::Copy {
                        src: src.clone(),
                        dst: x,
                    };
                    code.remove(i);
                    *counts.entry(dst).or_default() -= 2;
                    return true;
                }
            }
        }
    }
    false
}

pub fn eliminate_dead_vars(module: &mut IrModule) {
    let referenced: std::collections::HashSet<String> = module
        .referenced_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    module.vars.retain(|var| {
        if var.exported || var.is_this || var.sync != SyncMode::NotSynced {
            return true;
        }
        if !(var.name.starts_with("__tmp_") || var.name.starts_with("__const_")) {
            return true;
        }
        referenced.contains(&var.name)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{HeapVar, IrBlock, JumpTarget};

    fn var(name: &str) -> HeapVar {
        HeapVar {
            name: name.to_string(),
            ty: "SystemInt32".to_string(),
            init: None,
            exported: false,
            sync: SyncMode::NotSynced,
            is_this: false,
        }
    }

    fn module_with(code: Vec<Instr>, names: &[&str]) -> IrModule {
        IrModule {
            vars: names.iter().map(|n| var(n)).collect(),
            blocks: vec![IrBlock {
                label: "_start".to_string(),
                exported: true,
                code,
            }],
        }
    }

    #[test]
    fn result_slot_shortcut_rewrites_the_push() {
        // push a; push b; push __tmp_0; extern add; copy __tmp_0, x
        let mut module = module_with(
            vec![
                Instr::Push("a".into()),
                Instr::Push("b".into()),
                Instr::Push("__tmp_0".into()),
                Instr::Extern("SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32".into()),
                Instr::Copy {
                    src: "__tmp_0".into(),
                    dst: "x".into(),
                },
            ],
            &["a", "b", "__tmp_0", "x"],
        );
        propagate_copies(&mut module);
        let code = &module.blocks[0].code;
        assert_eq!(code.len(), 4);
        assert_eq!(code[2], Instr::Push("x".into()));
        assert!(!code.iter().any(|i| matches!(i, Instr::Copy { .. })));
    }

    #[test]
    fn argument_pushes_are_never_rewritten() {
        // The candidate push is an argument (not immediately before the
        // extern); rewriting would change the extern's operands.
        let original = vec![
            Instr::Push("__tmp_0".into()),
            Instr::Push("b".into()),
            Instr::Extern("sig".into()),
            Instr::Copy {
                src: "__tmp_0".into(),
                dst: "x".into(),
            },
        ];
        let mut module = module_with(original.clone(), &["b", "__tmp_0", "x"]);
        propagate_copies(&mut module);
        assert_eq!(module.blocks[0].code, original);
    }

    #[test]
    fn interference_on_the_destination_bails_out() {
        // X is read between the result push and the copy.
        let original = vec![
            Instr::Push("__tmp_0".into()),
            Instr::Extern("sig".into()),
            Instr::Push("x".into()),
            Instr::Extern("other".into()),
            Instr::Copy {
                src: "__tmp_0".into(),
                dst: "x".into(),
            },
        ];
        let mut module = module_with(original.clone(), &["__tmp_0", "x"]);
        propagate_copies(&mut module);
        assert_eq!(module.blocks[0].code, original);
    }

    #[test]
    fn refcount_above_two_disqualifies_the_temp() {
        // __tmp_0 is read twice downstream; both reads must keep working.
        let original = vec![
            Instr::Push("__tmp_0".into()),
            Instr::Extern("sig".into()),
            Instr::Copy {
                src: "__tmp_0".into(),
                dst: "x".into(),
            },
            Instr::Copy {
                src: "__tmp_0".into(),
                dst: "y".into(),
            },
        ];
        let mut module = module_with(original.clone(), &["__tmp_0", "x", "y"]);
        propagate_copies(&mut module);
        assert_eq!(module.blocks[0].code, original);
    }

    #[test]
    fn copy_chain_collapses() {
        let mut module = module_with(
            vec![
                Instr::Copy {
                    src: "s".into(),
                    dst: "__tmp_1".into(),
                },
                Instr::Copy {
                    src: "__tmp_1".into(),
                    dst: "x".into(),
                },
            ],
            &["s", "__tmp_1", "x"],
        );
        propagate_copies(&mut module);
        let code = &module.blocks[0].code;
        assert_eq!(
            code,
            &vec![Instr::Copy {
                src: "s".into(),
                dst: "x".into()
            }]
        );
    }

    #[test]
    fn dead_temp_and_const_cells_are_removed() {
        let mut module = module_with(
            vec![Instr::Push("kept".into())],
            &["kept", "__tmp_9", "__const_9"],
        );
        eliminate_dead_vars(&mut module);
        let names: Vec<&str> = module.vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn protected_cells_survive_even_when_unreferenced() {
        let mut module = module_with(vec![], &[]);
        module.vars.push(HeapVar {
            exported: true,
            ..var("__tmp_exported")
        });
        module.vars.push(HeapVar {
            sync: SyncMode::Linear,
            ..var("__const_synced")
        });
        module.vars.push(HeapVar {
            is_this: true,
            ..var("__tmp_this")
        });
        module.vars.push(var("user_named"));
        eliminate_dead_vars(&mut module);
        assert_eq!(module.vars.len(), 4);
    }

    #[test]
    fn optimization_preserves_structural_validity() {
        let mut module = module_with(
            vec![
                Instr::Push("a".into()),
                Instr::Push("__tmp_0".into()),
                Instr::Extern("sig".into()),
                Instr::Copy {
                    src: "__tmp_0".into(),
                    dst: "x".into(),
                },
                Instr::Jump(JumpTarget::Address(crate::ir::HALT_ADDRESS)),
            ],
            &["a", "__tmp_0", "x"],
        );
        optimize(&mut module);
        module.validate().expect("optimized module must stay valid");
        // The temp was propagated away and then eliminated.
        assert!(module.var("__tmp_0").is_none());
        assert!(module.var("x").is_some());
    }
}
