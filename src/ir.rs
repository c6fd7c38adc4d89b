//! Intermediate representation: the flat shape of an Udon Assembly program.
//!
//! An [`IrModule`] is an ordered list of heap variables (the data section) and
//! an ordered list of labelled blocks of instructions (the code section). The
//! lowerer builds it, the optimization passes mutate it, the emitter consumes
//! it.

use crate::ast::SyncMode;
use std::collections::HashSet;

/// The distinguished jump target that returns control to the host scheduler.
pub const HALT_ADDRESS: u32 = 0xFFFF_FFFC;

/// Initial-value prefix marking a cell that holds the address of a label,
/// rewritten to the real address at resolution time.
pub const LABEL_PLACEHOLDER: &str = "__label__";

/// Build the placeholder initial value for a label-address cell.
pub fn label_placeholder(label: &str) -> String {
    format!("{}{}", LABEL_PLACEHOLDER, label)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    Label(String),
    Address(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Push(String),
    Pop,
    Extern(String),
    Jump(JumpTarget),
    JumpIfFalse { cond: String, target: String },
    JumpIndirect(String),
    Copy { src: String, dst: String },
    Comment(String),
}

impl Instr {
    /// Encoded size in bytes. Compound mnemonics include their preceding
    /// pushes (`JUMP_IF_FALSE` is push+jif, `COPY` is push+push+copy);
    /// comments occupy no space.
    pub fn size(&self) -> u32 {
        match self {
            Instr::Push(_) => 8,
            Instr::Pop => 4,
            Instr::Extern(_) => 8,
            Instr::Jump(_) => 8,
            Instr::JumpIfFalse { .. } => 16,
            Instr::JumpIndirect(_) => 16,
            Instr::Copy { .. } => 20,
            Instr::Comment(_) => 0,
        }
    }

    /// Heap-cell names this instruction reads or writes. Jump labels are not
    /// cell references.
    pub fn operands(&self) -> Vec<&str> {
        match self {
            Instr::Push(name) => vec![name],
            Instr::JumpIfFalse { cond, .. } => vec![cond],
            Instr::JumpIndirect(cell) => vec![cell],
            Instr::Copy { src, dst } => vec![src, dst],
            Instr::Pop | Instr::Extern(_) | Instr::Jump(_) | Instr::Comment(_) => Vec::new(),
        }
    }
}

/// A named, typed cell in the VM's global data section.
#[derive(Debug, Clone)]
pub struct HeapVar {
    pub name: String,
    pub ty: String,
    /// Literal in the form the VM's text parser accepts, the sentinels
    /// `null` / `this`, or a `__label__` placeholder. `None` emits `null`.
    pub init: Option<String>,
    pub exported: bool,
    pub sync: SyncMode,
    /// Bound at load time to a role of the hosting object.
    pub is_this: bool,
}

/// A labelled run of instructions. Exported blocks are event entry points the
/// VM may dispatch to from outside.
#[derive(Debug, Clone)]
pub struct IrBlock {
    pub label: String,
    pub exported: bool,
    pub code: Vec<Instr>,
}

#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub vars: Vec<HeapVar>,
    pub blocks: Vec<IrBlock>,
}

impl IrModule {
    pub fn var(&self, name: &str) -> Option<&HeapVar> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn block(&self, label: &str) -> Option<&IrBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// Every cell name any instruction references.
    pub fn referenced_names(&self) -> HashSet<&str> {
        let mut names = HashSet::new();
        for block in &self.blocks {
            for instr in &block.code {
                names.extend(instr.operands());
            }
        }
        names
    }

    /// Structural validity: every referenced cell is declared and every label
    /// jump lands on a real block. Used by tests and debug assertions.
    pub fn validate(&self) -> Result<(), String> {
        let declared: HashSet<&str> = self.vars.iter().map(|v| v.name.as_str()).collect();
        for name in self.referenced_names() {
            if !declared.contains(name) {
                return Err(format!("instruction references undeclared cell '{}'", name));
            }
        }
        let labels: HashSet<&str> = self.blocks.iter().map(|b| b.label.as_str()).collect();
        for block in &self.blocks {
            for instr in &block.code {
                let target = match instr {
                    Instr::Jump(JumpTarget::Label(label)) => Some(label),
                    Instr::JumpIfFalse { target, .. } => Some(target),
                    _ => None,
                };
                if let Some(target) = target
                    && !labels.contains(target.as_str())
                {
                    return Err(format!(
                        "block '{}' jumps to unknown label '{}'",
                        block.label, target
                    ));
                }
            }
        }
        Ok(())
    }
}
