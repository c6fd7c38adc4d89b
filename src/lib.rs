//! Nori compiler library.
//!
//! Compiles Nori source text to Udon Assembly — the text-format bytecode of
//! the stack-based VM embedded in the host platform. The pipeline:
//!
//! 1. [`lexer`] — source text to tokens
//! 2. [`parser`] — tokens to an AST with statement-level error recovery
//! 3. [`analyzer`] — type checking and overload resolution against an extern
//!    catalog, annotating the AST in place
//! 4. [`lower`] — AST to a flat IR of heap cells and labelled blocks
//! 5. [`optimizer`] — copy propagation and dead-variable elimination
//! 6. [`emit`] — address resolution and assembly text emission
//!
//! The top-level entry points are [`compile`] (full pipeline, short-circuits
//! between phases on errors) and [`analyze`] (front-end only, never
//! short-circuits — editor features must work on broken code).
//!
//! ```rust
//! use noric::compile;
//! use std::path::Path;
//!
//! let result = compile("on Start { log(\"hi\") }", Path::new("hi.nori"), None);
//! assert!(result.success);
//! ```

pub mod analyzer;
pub mod ast;
pub mod catalog;
pub mod diagnostics;
pub mod emit;
pub mod events;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod optimizer;
pub mod parser;
pub mod span;
pub mod symbols;
pub mod token;
pub mod types;

pub use ast::Module;
pub use catalog::{Catalog, ExternCatalog, ExternSignature};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, format_diagnostics};
pub use span::{Position, SourceSpan};
pub use symbols::{ScopeId, ScopeTree};
pub use token::Token;

use std::collections::HashMap;
use std::path::Path;

/// Summary facts about a compilation, produced whenever an AST exists. The
/// IR-level counts are zero when compilation stopped before lowering.
#[derive(Debug, Clone, Default)]
pub struct CompileMetadata {
    pub variables: usize,
    pub functions: usize,
    pub event_handlers: usize,
    pub custom_events: usize,
    pub heap_cells: usize,
    pub blocks: usize,
    /// Exported code labels the VM may dispatch to.
    pub entry_points: Vec<String>,
}

impl CompileMetadata {
    fn from_ast(module: &Module) -> Self {
        let mut meta = CompileMetadata::default();
        for decl in &module.decls {
            match decl {
                ast::Decl::Variable(_) => meta.variables += 1,
                ast::Decl::Function(_) => meta.functions += 1,
                ast::Decl::EventHandler(_) => meta.event_handlers += 1,
                ast::Decl::CustomEvent(_) => meta.custom_events += 1,
            }
        }
        meta
    }
}

/// Result record of [`compile`].
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    pub assembly: Option<String>,
    pub ast: Option<Module>,
    pub diagnostics: Diagnostics,
    pub metadata: Option<CompileMetadata>,
}

/// Compile Nori source to Udon Assembly text.
///
/// Absent a catalog, the built-in fallback catalog is used. The pipeline
/// stops after any phase that produced errors: parse errors skip semantic
/// analysis; semantic errors skip lowering and emission. Metadata is produced
/// whenever an AST exists.
pub fn compile(
    source: &str,
    file: &Path,
    catalog: Option<&dyn ExternCatalog>,
) -> CompileResult {
    let fallback;
    let catalog: &dyn ExternCatalog = match catalog {
        Some(catalog) => catalog,
        None => {
            fallback = Catalog::builtin();
            &fallback
        }
    };

    let mut diagnostics = Diagnostics::new();
    let tokens = lexer::lex(source, file, &mut diagnostics);
    let mut module = parser::parse(tokens, file, &mut diagnostics);
    if diagnostics.has_errors() {
        let metadata = Some(CompileMetadata::from_ast(&module));
        return CompileResult {
            success: false,
            assembly: None,
            ast: Some(module),
            diagnostics,
            metadata,
        };
    }

    analyzer::analyze(&mut module, catalog, &mut diagnostics);
    if diagnostics.has_errors() {
        let metadata = Some(CompileMetadata::from_ast(&module));
        return CompileResult {
            success: false,
            assembly: None,
            ast: Some(module),
            diagnostics,
            metadata,
        };
    }

    let mut ir = lower::lower(&module);
    optimizer::optimize(&mut ir);
    let mut metadata = CompileMetadata::from_ast(&module);
    metadata.heap_cells = ir.vars.len();
    metadata.blocks = ir.blocks.len();
    metadata.entry_points = ir
        .blocks
        .iter()
        .filter(|b| b.exported)
        .map(|b| b.label.clone())
        .collect();
    let assembly = emit::emit(&mut ir);

    CompileResult {
        success: !diagnostics.has_errors(),
        assembly: Some(assembly),
        ast: Some(module),
        diagnostics,
        metadata: Some(metadata),
    }
}

/// Result record of [`analyze`].
#[derive(Debug)]
pub struct SourceAnalysis {
    pub tokens: Vec<Token>,
    pub ast: Module,
    pub diagnostics: Diagnostics,
    /// Node span → resolved Udon type, for hover and completion.
    pub type_map: HashMap<SourceSpan, String>,
    /// Node span → enclosing scope, for completion candidates.
    pub scope_map: HashMap<SourceSpan, ScopeId>,
    pub scopes: ScopeTree,
}

/// Front-end-only analysis for editor services. Unlike [`compile`], this
/// never short-circuits: partial trees from broken source are analyzed
/// best-effort so hover, completion, and diagnostics keep working mid-edit.
pub fn analyze(
    source: &str,
    file: &Path,
    catalog: Option<&dyn ExternCatalog>,
) -> SourceAnalysis {
    let fallback;
    let catalog: &dyn ExternCatalog = match catalog {
        Some(catalog) => catalog,
        None => {
            fallback = Catalog::builtin();
            &fallback
        }
    };

    let mut diagnostics = Diagnostics::new();
    let tokens = lexer::lex(source, file, &mut diagnostics);
    let mut module = parser::parse(tokens.clone(), file, &mut diagnostics);
    let analysis = analyzer::analyze(&mut module, catalog, &mut diagnostics);

    SourceAnalysis {
        tokens,
        ast: module,
        diagnostics,
        type_map: analysis.type_map,
        scope_map: analysis.scope_map,
        scopes: analysis.scopes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::codes;
    use std::path::Path;

    fn compile_str(source: &str) -> CompileResult {
        compile(source, Path::new("test.nori"), None)
    }

    const SCOREBOARD: &str = r#"
pub let max_score: int = 10
sync none score: int = 0
let is_game_over: bool = false

on Start {
    log("Scoreboard ready!")
}

fn update_display() {
    log("Score: {score}")
}

event AddPoint {
    score = score + 1
    update_display()
    if score >= max_score {
        send GameOver to All
    }
}

event GameOver {
    is_game_over = true
    log("Game over!")
}

on Interact {
    if is_game_over {
        log("Game is over!")
        return
    }
    send AddPoint to All
}
"#;

    #[test]
    fn scenario_hello() {
        let result = compile_str("on Start { log(\"Hello from Nori!\") }");
        assert!(result.success, "{}", format_diagnostics(&result.diagnostics));
        let asm = result.assembly.unwrap();
        assert!(asm.contains(".export _start"));
        assert!(asm.contains("_start:"));
        assert!(asm.contains("EXTERN, \"UnityEngineDebug.__Log__SystemObject__SystemVoid\""));
        assert!(asm.contains("JUMP, 0xFFFFFFFC"));
    }

    #[test]
    fn scenario_scoreboard() {
        let result = compile_str(SCOREBOARD);
        assert!(result.success, "{}", format_diagnostics(&result.diagnostics));
        let asm = result.assembly.unwrap();
        for needle in [
            ".export max_score",
            ".sync score, none",
            ".export _start",
            ".export _interact",
            ".export AddPoint",
            ".export GameOver",
        ] {
            assert!(asm.contains(needle), "missing {:?} in:\n{}", needle, asm);
        }
        // The interpolated log concatenates through the string-concat extern.
        assert!(asm.contains("SystemString.__Concat__SystemString_SystemString__SystemString"));
    }

    #[test]
    fn scenario_typo_suggestion() {
        let result = compile_str("let score: int = 0\non Start { let x: int = scroe }");
        assert!(!result.success);
        assert_eq!(result.diagnostics.len(), 1);
        let d = result.diagnostics.items().first().unwrap();
        assert_eq!(d.code, codes::UNDEFINED_VARIABLE);
        assert!(d.message.contains("scroe"));
        assert!(d.hint.as_deref().unwrap_or_default().contains("score"));
        assert!(result.assembly.is_none());
        assert!(result.metadata.is_some(), "metadata exists whenever an AST does");
    }

    #[test]
    fn scenario_mutual_recursion() {
        let result = compile_str("fn foo() { bar() } fn bar() { foo() }");
        assert!(!result.success);
        assert_eq!(result.diagnostics.len(), 1);
        let d = result.diagnostics.items().first().unwrap();
        assert_eq!(d.code, codes::RECURSION);
        assert!(d.message.contains("foo") && d.message.contains("bar"));
    }

    #[test]
    fn scenario_unknown_method() {
        let result = compile_str("on Start { transform.DoesNotExist() }");
        assert!(!result.success);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.code == codes::NO_MATCHING_OVERLOAD)
        );
    }

    #[test]
    fn scenario_for_range_shadowing() {
        let result = compile_str(
            "pub let items: int = 3\n\
             let total: int = 0\n\
             on Start { for i in 0..items { total = total + 1 } }\n\
             fn add_items() { for i in 0..items { total = total + i } }",
        );
        assert!(result.success, "{}", format_diagnostics(&result.diagnostics));
        let asm = result.assembly.unwrap();
        assert!(
            asm.contains("__lcl_i_SystemInt32_"),
            "uniquified loop cell missing:\n{}",
            asm
        );
        // The second function's body references the uniquified cell, never a
        // bare `i`.
        let fn_section = asm
            .split("__fn_add_items:")
            .nth(1)
            .expect("function block present");
        assert!(fn_section.contains("__lcl_i_SystemInt32_"));
        assert!(!fn_section.contains("PUSH, i\n"));
    }

    #[test]
    fn empty_source_is_valid_and_silent() {
        let analysis = analyze("", Path::new("empty.nori"), None);
        assert_eq!(analysis.tokens.len(), 1, "exactly one EOF token");
        assert!(analysis.diagnostics.is_empty());
        assert!(analysis.ast.decls.is_empty());

        let result = compile_str("");
        assert!(result.success);
    }

    #[test]
    fn every_pushed_name_is_declared() {
        let result = compile_str(SCOREBOARD);
        let asm = result.assembly.unwrap();
        let data: Vec<&str> = asm
            .lines()
            .skip_while(|l| !l.starts_with(".data_start"))
            .take_while(|l| !l.starts_with(".data_end"))
            .filter_map(|l| {
                let l = l.trim();
                l.contains(": %").then(|| l.split(':').next().unwrap())
            })
            .collect();
        for line in asm.lines() {
            let line = line.trim();
            if let Some(name) = line.strip_prefix("PUSH, ") {
                assert!(
                    data.contains(&name),
                    "PUSH references undeclared cell '{}'",
                    name
                );
            }
        }
    }

    #[test]
    fn every_exported_code_label_has_a_body() {
        let result = compile_str(SCOREBOARD);
        let asm = result.assembly.unwrap();
        let code = asm.split(".code_start").nth(1).unwrap();
        for line in code.lines() {
            let line = line.trim();
            if let Some(label) = line.strip_prefix(".export ") {
                assert!(
                    code.contains(&format!("{}:", label)),
                    "exported label '{}' has no body",
                    label
                );
            }
        }
    }

    #[test]
    fn entry_blocks_terminate_in_halt_or_indirect_jump() {
        let result = compile_str(SCOREBOARD);
        assert!(result.success);
        // Check at the IR level, before text emission.
        let mut diags = Diagnostics::new();
        let tokens = lexer::lex(SCOREBOARD, Path::new("t.nori"), &mut diags);
        let mut module = parser::parse(tokens, Path::new("t.nori"), &mut diags);
        let catalog = Catalog::builtin();
        analyzer::analyze(&mut module, &catalog, &mut diags);
        let mut ir = lower::lower(&module);
        optimizer::optimize(&mut ir);
        ir.validate().expect("optimized IR is structurally valid");
        // Each entry label opens a region that runs until the next entry or
        // function label; the region's terminal block must end in the halt
        // jump (events) or an indirect jump (functions).
        let is_region_start =
            |b: &ir::IrBlock| b.exported || b.label.starts_with("__fn_");
        for (i, block) in ir.blocks.iter().enumerate() {
            if !is_region_start(block) {
                continue;
            }
            let terminal = ir.blocks[i + 1..]
                .iter()
                .take_while(|b| !is_region_start(b))
                .last()
                .unwrap_or(block);
            match terminal.code.last() {
                Some(ir::Instr::Jump(ir::JumpTarget::Address(addr))) => {
                    assert_eq!(*addr, ir::HALT_ADDRESS)
                }
                Some(ir::Instr::JumpIndirect(_)) => {}
                other => panic!(
                    "region of '{}' ends with {:?}, not a terminator",
                    block.label, other
                ),
            }
        }
    }

    #[test]
    fn boolean_true_never_appears_in_data_section() {
        let result = compile_str("let armed: bool = true on Start { log(\"x\") }");
        assert!(result.success);
        let asm = result.assembly.unwrap();
        let data = asm.split(".data_end").next().unwrap();
        assert!(!data.contains(", true"), "{}", data);
        assert!(asm.contains("armed: %SystemBoolean, null"));
        // Materialized before user code via the negation extern.
        assert!(
            asm.contains("SystemBoolean.__op_UnaryNegation__SystemBoolean__SystemBoolean")
        );
    }

    #[test]
    fn metadata_counts_declarations_and_entries() {
        let result = compile_str(SCOREBOARD);
        let meta = result.metadata.unwrap();
        assert_eq!(meta.variables, 3);
        assert_eq!(meta.functions, 1);
        assert_eq!(meta.event_handlers, 2);
        assert_eq!(meta.custom_events, 2);
        assert!(meta.heap_cells > 0);
        assert!(meta.blocks > 0);
        assert!(meta.entry_points.contains(&"_start".to_string()));
        assert!(meta.entry_points.contains(&"AddPoint".to_string()));
    }

    #[test]
    fn analyze_keeps_working_on_broken_source() {
        // Parse error in the first handler; the second still resolves.
        let analysis = analyze(
            "on Start { let = }\non Interact { log(\"ok\") }",
            Path::new("broken.nori"),
            None,
        );
        assert!(analysis.diagnostics.has_errors());
        assert_eq!(analysis.ast.decls.len(), 2);
        assert!(!analysis.type_map.is_empty());
    }

    #[test]
    fn compile_with_a_custom_json_catalog() {
        let doc = r#"{
            "externs": [
                {
                    "extern": "MyLibBeeper.__Beep__SystemInt32__SystemVoid",
                    "owner": "MyLibBeeper",
                    "method": "Beep",
                    "kind": "static_method",
                    "instance": false,
                    "parameters": ["SystemInt32"],
                    "return": "SystemVoid"
                }
            ],
            "enums": [],
            "types": [
                { "udonType": "MyLibBeeper", "sourceType": "Beeper", "isEnum": false }
            ]
        }"#;
        let catalog = Catalog::from_json(doc).unwrap();
        let result = compile(
            "on Start { Beeper.Beep(3) }",
            Path::new("beep.nori"),
            Some(&catalog),
        );
        assert!(result.success, "{}", format_diagnostics(&result.diagnostics));
        assert!(
            result
                .assembly
                .unwrap()
                .contains("MyLibBeeper.__Beep__SystemInt32__SystemVoid")
        );
    }

    #[test]
    fn diagnostics_accumulate_across_phases() {
        // A lexical error and a (recovered) later parse keep going.
        let result = compile_str("let a: int = 1 @\nlet b: int = 2");
        assert!(!result.success);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.code == codes::UNEXPECTED_CHARACTER)
        );
        // Parser still produced declarations for metadata.
        assert_eq!(result.metadata.unwrap().variables, 2);
    }
}
