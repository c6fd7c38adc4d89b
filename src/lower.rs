//! AST → IR lowering.
//!
//! The target machine has no locals and no stack frames: every intermediate
//! and every constant lives in a named heap cell. Lowering is driven by three
//! generators — a temporary counter, a label counter, and a `(type, literal)`
//! interning table for constants — plus a per-body environment mapping source
//! names to cell names.
//!
//! The call-return convention: each function owns a return-address cell, one
//! parameter-slot cell per formal, and an optional return-value cell. A call
//! writes arguments into the slots, copies a `__label__` placeholder (patched
//! to a real address later) into the return-address cell, jumps to the
//! function label, and opens a continuation block at the return label. The
//! function body ends with an indirect jump through the return-address cell.
//!
//! Booleans deserve a note: the data-section parser only accepts `null` for a
//! boolean cell, which loads as `false`. `true` therefore has no data-section
//! encoding and is materialized at runtime by negating the interned `false`
//! cell; top-level `true` initializers are deferred into a prologue that runs
//! at the head of `_start` before any user code.

use crate::ast::*;
use crate::catalog::{ExternSignature, mangle_extern};
use crate::events;
use crate::ir::*;
use crate::types;
use std::collections::HashMap;

/// Cell types whose literals the VM's text parser can construct. Constants of
/// any other type are laundered through a 32-bit integer cell; `null`, `this`,
/// and `__label__` placeholders are always permitted.
const DATA_LITERAL_TYPES: &[&str] = &[
    "SystemInt32",
    "SystemInt64",
    "SystemUInt32",
    "SystemSingle",
    "SystemDouble",
    "SystemBoolean",
    "SystemString",
];

const THIS_BEHAVIOUR: &str = "__this";
const THIS_GAMEOBJECT: &str = "__gameobject";
const THIS_TRANSFORM: &str = "__transform";

const UDON_EVENT_RECEIVER: &str = "VRCUdonCommonInterfacesIUdonEventReceiver";
const NETWORK_EVENT_TARGET: &str = "VRCUdonCommonEnumsNetworkEventTarget";

const TOSTRING_EXTERN: &str = "SystemObject.__ToString__SystemString";
const CONCAT_EXTERN: &str = "SystemString.__Concat__SystemString_SystemString__SystemString";
const NOT_EXTERN: &str = "SystemBoolean.__op_UnaryNegation__SystemBoolean__SystemBoolean";
const INT_LT_EXTERN: &str = "SystemInt32.__op_LessThan__SystemInt32_SystemInt32__SystemBoolean";
const INT_ADD_EXTERN: &str = "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32";
const LOCAL_PLAYER_EXTERN: &str =
    "VRCSDKBaseNetworking.__get_LocalPlayer__VRCSDKBaseVRCPlayerApi";

/// Lower an analyzed module to IR. The tree must have passed semantic
/// analysis; annotations written by the analyzer drive every resolution here.
pub fn lower(module: &Module) -> IrModule {
    let mut lowerer = Lowerer::new();
    lowerer.run(module);
    IrModule {
        vars: lowerer.vars,
        blocks: lowerer.blocks,
    }
}

enum Deferred {
    /// Negate the interned `false` cell into the target.
    True,
    /// Evaluate an expression at `_start` time and copy it in.
    Expr(Box<Expr>),
}

enum BodyKind {
    /// Event or custom-event body; `return` is the halt jump.
    Event,
    /// Function body; `return` goes through the return-address cell.
    Function { ret_addr: String, ret_val: Option<String> },
}

struct FnCells {
    label: String,
    ret_addr: String,
    /// Parameter-slot cell per formal, in declaration order.
    slots: Vec<String>,
    ret_val: Option<String>,
}

struct LoopLabels {
    continue_label: String,
    break_label: String,
}

struct Lowerer {
    vars: Vec<HeapVar>,
    blocks: Vec<IrBlock>,
    current: usize,
    tmp_counter: usize,
    const_counter: usize,
    label_counter: usize,
    lcl_counter: usize,
    consts: HashMap<(String, String), String>,
    env: Vec<HashMap<String, String>>,
    loop_stack: Vec<LoopLabels>,
    fn_cells: HashMap<String, FnCells>,
    body: BodyKind,
    deferred: Vec<(String, Deferred)>,
}

impl Lowerer {
    fn new() -> Self {
        Lowerer {
            vars: Vec::new(),
            blocks: Vec::new(),
            current: 0,
            tmp_counter: 0,
            const_counter: 0,
            label_counter: 0,
            lcl_counter: 0,
            consts: HashMap::new(),
            env: vec![HashMap::new()],
            loop_stack: Vec::new(),
            fn_cells: HashMap::new(),
            body: BodyKind::Event,
            deferred: Vec::new(),
        }
    }

    fn run(&mut self, module: &Module) {
        // Fixed-role cells bound by the host at load time.
        for (name, ty) in [
            (THIS_BEHAVIOUR, "VRCUdonUdonBehaviour"),
            (THIS_GAMEOBJECT, "UnityEngineGameObject"),
            (THIS_TRANSFORM, "UnityEngineTransform"),
        ] {
            self.vars.push(HeapVar {
                name: name.to_string(),
                ty: ty.to_string(),
                init: Some("this".to_string()),
                exported: false,
                sync: SyncMode::NotSynced,
                is_this: true,
            });
        }
        self.bind("gameObject", THIS_GAMEOBJECT);
        self.bind("transform", THIS_TRANSFORM);

        // Data section first: every top-level cell exists before any body.
        for decl in &module.decls {
            if let Decl::Variable(var) = decl {
                self.lower_var_decl(var);
            }
        }

        // Function cells next, so calls can be lowered before their callee.
        for decl in &module.decls {
            if let Decl::Function(func) = decl {
                self.declare_fn_cells(func);
            }
        }

        let mut saw_start = false;
        for decl in &module.decls {
            match decl {
                Decl::Variable(_) => {}
                Decl::Function(func) => self.lower_function(func),
                Decl::EventHandler(event) => {
                    let label = events::vm_label(&event.name)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("_{}", event.name));
                    if label == "_start" {
                        saw_start = true;
                    }
                    self.lower_event_body(&label, &event.params, &event.body);
                }
                Decl::CustomEvent(event) => {
                    self.lower_event_body(&event.name.clone(), &[], &event.body);
                }
            }
        }

        // Deferred initialization must run even when no Start handler exists.
        if !saw_start && !self.deferred.is_empty() {
            self.open_block("_start".to_string(), true);
            self.run_deferred_inits();
            self.emit(Instr::Jump(JumpTarget::Address(HALT_ADDRESS)));
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn lower_var_decl(&mut self, var: &VarDecl) {
        let ty = var
            .resolved_ty
            .clone()
            .unwrap_or_else(|| types::OBJECT.to_string());
        let mut init = None;
        let mut deferred = None;
        match &var.init {
            Some(expr) => match &expr.kind {
                ExprKind::Int(v) => init = Some(v.to_string()),
                ExprKind::Float(v) => init = Some(format_float(*v)),
                ExprKind::Str(s) => init = Some(quote_string(s)),
                ExprKind::Null => init = Some("null".to_string()),
                // `false` loads from `null`; `true` has no data encoding.
                ExprKind::Bool(false) => init = Some("null".to_string()),
                ExprKind::Bool(true) => deferred = Some(Deferred::True),
                _ => deferred = Some(Deferred::Expr(Box::new(expr.clone()))),
            },
            None => {}
        }
        let cell = self.declare(
            &var.name,
            ty,
            init,
            var.is_public,
            var.sync,
        );
        self.bind(&var.name, &cell);
        if let Some(deferred) = deferred {
            self.deferred.push((cell, deferred));
        }
    }

    fn declare_fn_cells(&mut self, func: &FnDecl) {
        let label = format!("__fn_{}", func.name);
        let ret_addr = self.declare(
            &format!("__fn_{}_ret", func.name),
            types::ADDRESS.to_string(),
            None,
            false,
            SyncMode::NotSynced,
        );
        let mut slots = Vec::new();
        for param in &func.params {
            let ty = param
                .resolved_ty
                .clone()
                .unwrap_or_else(|| types::OBJECT.to_string());
            let slot = self.declare(
                &format!("__fn_{}_param_{}", func.name, param.name),
                ty,
                None,
                false,
                SyncMode::NotSynced,
            );
            slots.push(slot);
        }
        let ret_ty = func
            .resolved_ret
            .clone()
            .unwrap_or_else(|| types::VOID.to_string());
        let ret_val = (ret_ty != types::VOID).then(|| {
            self.declare(
                &format!("__fn_{}_retval", func.name),
                ret_ty,
                None,
                false,
                SyncMode::NotSynced,
            )
        });
        self.fn_cells.insert(
            func.name.clone(),
            FnCells {
                label,
                ret_addr,
                slots,
                ret_val,
            },
        );
    }

    fn lower_function(&mut self, func: &FnDecl) {
        let cells = &self.fn_cells[&func.name];
        let label = cells.label.clone();
        let ret_addr = cells.ret_addr.clone();
        let ret_val = cells.ret_val.clone();
        let slots = cells.slots.clone();

        self.open_block(label, false);
        self.emit(Instr::Comment(format!("fn {}", func.name)));
        self.push_env();
        // Copy parameter slots into fresh locals so the body reads stable
        // values even after it starts writing slots for its own calls.
        for (param, slot) in func.params.iter().zip(&slots) {
            let ty = param
                .resolved_ty
                .clone()
                .unwrap_or_else(|| types::OBJECT.to_string());
            let local = self.declare(&param.name, ty, None, false, SyncMode::NotSynced);
            self.emit(Instr::Copy {
                src: slot.clone(),
                dst: local.clone(),
            });
            self.bind(&param.name, &local);
        }
        self.body = BodyKind::Function {
            ret_addr: ret_addr.clone(),
            ret_val,
        };
        for stmt in &func.body {
            self.lower_stmt(stmt);
        }
        self.emit(Instr::JumpIndirect(ret_addr));
        self.body = BodyKind::Event;
        self.pop_env();
    }

    fn lower_event_body(&mut self, label: &str, params: &[Param], body: &[Stmt]) {
        self.open_block(label.to_string(), true);
        self.push_env();
        if label == "_start" && !self.deferred.is_empty() {
            self.emit(Instr::Comment("runtime initialization".to_string()));
            self.run_deferred_inits();
        }
        for param in params {
            let ty = param
                .resolved_ty
                .clone()
                .unwrap_or_else(|| types::OBJECT.to_string());
            let cell = self.declare(&param.name, ty, None, false, SyncMode::NotSynced);
            self.bind(&param.name, &cell);
        }
        // Download callbacks read their implicit `result` cell.
        if self.lookup("result").is_none()
            && let Some(ty) = implicit_result_type(label)
        {
            let cell = self.declare("result", ty.to_string(), None, false, SyncMode::NotSynced);
            self.bind("result", &cell);
        }
        self.body = BodyKind::Event;
        for stmt in body {
            self.lower_stmt(stmt);
        }
        self.emit(Instr::Jump(JumpTarget::Address(HALT_ADDRESS)));
        self.pop_env();
    }

    fn run_deferred_inits(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        for (cell, init) in deferred {
            match init {
                Deferred::True => {
                    let f = self.false_cell();
                    self.emit(Instr::Push(f));
                    self.emit(Instr::Push(cell));
                    self.emit(Instr::Extern(NOT_EXTERN.to_string()));
                }
                Deferred::Expr(expr) => {
                    let value = self.lower_expr(&expr);
                    self.emit(Instr::Copy {
                        src: value,
                        dst: cell,
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Local(local) => {
                let ty = local
                    .resolved_ty
                    .clone()
                    .unwrap_or_else(|| types::OBJECT.to_string());
                let cell = self.declare(&local.name, ty, None, false, SyncMode::NotSynced);
                self.bind(&local.name, &cell);
                if let Some(init) = &local.init {
                    let value = self.lower_expr(init);
                    self.emit(Instr::Copy {
                        src: value,
                        dst: cell,
                    });
                }
            }
            Stmt::Assign {
                target,
                op,
                value,
                op_sig,
                ..
            } => self.lower_assign(target, *op, value, op_sig.as_ref()),
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let cond_cell = self.lower_expr(cond);
                let end_label = self.new_label();
                match else_body {
                    None => {
                        self.emit(Instr::JumpIfFalse {
                            cond: cond_cell,
                            target: end_label.clone(),
                        });
                        self.lower_body(then_body);
                        self.open_block(end_label, false);
                    }
                    Some(else_body) => {
                        let else_label = self.new_label();
                        self.emit(Instr::JumpIfFalse {
                            cond: cond_cell,
                            target: else_label.clone(),
                        });
                        self.lower_body(then_body);
                        self.emit(Instr::Jump(JumpTarget::Label(end_label.clone())));
                        self.open_block(else_label, false);
                        self.lower_body(else_body);
                        self.open_block(end_label, false);
                    }
                }
            }
            Stmt::While { cond, body, .. } => {
                let cond_label = self.new_label();
                let end_label = self.new_label();
                self.open_block(cond_label.clone(), false);
                let cond_cell = self.lower_expr(cond);
                self.emit(Instr::JumpIfFalse {
                    cond: cond_cell,
                    target: end_label.clone(),
                });
                self.loop_stack.push(LoopLabels {
                    continue_label: cond_label.clone(),
                    break_label: end_label.clone(),
                });
                self.lower_body(body);
                self.loop_stack.pop();
                self.emit(Instr::Jump(JumpTarget::Label(cond_label)));
                self.open_block(end_label, false);
            }
            Stmt::ForRange {
                var, start, end, body, ..
            } => self.lower_for_range(var, start, end, body),
            Stmt::ForEach {
                var, collection, body, ..
            } => self.lower_for_each(var, collection, body),
            Stmt::Return { value, .. } => {
                let fn_cells = match &self.body {
                    BodyKind::Event => None,
                    BodyKind::Function { ret_addr, ret_val } => {
                        Some((ret_addr.clone(), ret_val.clone()))
                    }
                };
                match fn_cells {
                    None => {
                        // In an event body `return` is the halt jump.
                        self.emit(Instr::Jump(JumpTarget::Address(HALT_ADDRESS)));
                    }
                    Some((ret_addr, ret_val)) => {
                        if let (Some(value), Some(ret_val)) = (value, ret_val) {
                            let cell = self.lower_expr(value);
                            self.emit(Instr::Copy {
                                src: cell,
                                dst: ret_val,
                            });
                        }
                        self.emit(Instr::JumpIndirect(ret_addr));
                    }
                }
            }
            Stmt::Break { .. } => {
                if let Some(labels) = self.loop_stack.last() {
                    let target = labels.break_label.clone();
                    self.emit(Instr::Jump(JumpTarget::Label(target)));
                }
            }
            Stmt::Continue { .. } => {
                if let Some(labels) = self.loop_stack.last() {
                    let target = labels.continue_label.clone();
                    self.emit(Instr::Jump(JumpTarget::Label(target)));
                }
            }
            Stmt::Send { event, target, .. } => {
                let name_cell = self.string_const(event);
                match target {
                    None => {
                        self.emit(Instr::Push(THIS_BEHAVIOUR.to_string()));
                        self.emit(Instr::Push(name_cell));
                        self.emit(Instr::Extern(mangle_extern(
                            UDON_EVENT_RECEIVER,
                            "SendCustomEvent",
                            &[types::STRING],
                            types::VOID,
                        )));
                    }
                    Some(send_target) => {
                        let value = match send_target {
                            SendTarget::Owner => 0,
                            SendTarget::All => 1,
                        };
                        // The enum cannot be declared in the data section;
                        // the cell is laundered to an integer.
                        let target_cell = self.const_cell(
                            NETWORK_EVENT_TARGET,
                            &value.to_string(),
                            Some(value.to_string()),
                        );
                        self.emit(Instr::Push(THIS_BEHAVIOUR.to_string()));
                        self.emit(Instr::Push(target_cell));
                        self.emit(Instr::Push(name_cell));
                        self.emit(Instr::Extern(mangle_extern(
                            UDON_EVENT_RECEIVER,
                            "SendCustomNetworkEvent",
                            &[NETWORK_EVENT_TARGET, types::STRING],
                            types::VOID,
                        )));
                    }
                }
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr);
            }
        }
    }

    fn lower_body(&mut self, body: &[Stmt]) {
        self.push_env();
        for stmt in body {
            self.lower_stmt(stmt);
        }
        self.pop_env();
    }

    fn lower_for_range(&mut self, var: &str, start: &Expr, end: &Expr, body: &[Stmt]) {
        self.push_env();
        let index = self.declare(var, types::INT.to_string(), None, false, SyncMode::NotSynced);
        self.bind(var, &index);
        let limit = self.temp(types::INT);
        let start_cell = self.lower_expr(start);
        self.emit(Instr::Copy {
            src: start_cell,
            dst: index.clone(),
        });
        let end_cell = self.lower_expr(end);
        self.emit(Instr::Copy {
            src: end_cell,
            dst: limit.clone(),
        });

        let cond_label = self.new_label();
        let incr_label = self.new_label();
        let end_label = self.new_label();
        self.open_block(cond_label.clone(), false);
        let cond = self.temp(types::BOOL);
        self.emit(Instr::Push(index.clone()));
        self.emit(Instr::Push(limit));
        self.emit(Instr::Push(cond.clone()));
        self.emit(Instr::Extern(INT_LT_EXTERN.to_string()));
        self.emit(Instr::JumpIfFalse {
            cond,
            target: end_label.clone(),
        });
        self.loop_stack.push(LoopLabels {
            continue_label: incr_label.clone(),
            break_label: end_label.clone(),
        });
        self.lower_body(body);
        self.loop_stack.pop();
        self.open_block(incr_label, false);
        let one = self.int_const(1);
        self.emit(Instr::Push(index.clone()));
        self.emit(Instr::Push(one));
        self.emit(Instr::Push(index));
        self.emit(Instr::Extern(INT_ADD_EXTERN.to_string()));
        self.emit(Instr::Jump(JumpTarget::Label(cond_label)));
        self.open_block(end_label, false);
        self.pop_env();
    }

    fn lower_for_each(&mut self, var: &str, collection: &Expr, body: &[Stmt]) {
        self.push_env();
        let array = self.lower_expr(collection);
        let array_ty = collection
            .resolved
            .ty
            .clone()
            .unwrap_or_else(|| format!("{}Array", types::OBJECT));
        let elem_ty = types::element_type(&array_ty)
            .unwrap_or(types::OBJECT)
            .to_string();

        let length = self.temp(types::INT);
        self.emit(Instr::Push(array.clone()));
        self.emit(Instr::Push(length.clone()));
        self.emit(Instr::Extern(format!(
            "{}.__get_Length__SystemInt32",
            array_ty
        )));
        let index = self.temp(types::INT);
        let zero = self.int_const(0);
        self.emit(Instr::Copy {
            src: zero,
            dst: index.clone(),
        });
        let elem = self.declare(var, elem_ty.clone(), None, false, SyncMode::NotSynced);
        self.bind(var, &elem);

        let cond_label = self.new_label();
        let incr_label = self.new_label();
        let end_label = self.new_label();
        self.open_block(cond_label.clone(), false);
        let cond = self.temp(types::BOOL);
        self.emit(Instr::Push(index.clone()));
        self.emit(Instr::Push(length));
        self.emit(Instr::Push(cond.clone()));
        self.emit(Instr::Extern(INT_LT_EXTERN.to_string()));
        self.emit(Instr::JumpIfFalse {
            cond,
            target: end_label.clone(),
        });
        self.emit(Instr::Push(array));
        self.emit(Instr::Push(index.clone()));
        self.emit(Instr::Push(elem));
        self.emit(Instr::Extern(format!(
            "{}.__Get__SystemInt32__{}",
            array_ty, elem_ty
        )));
        self.loop_stack.push(LoopLabels {
            continue_label: incr_label.clone(),
            break_label: end_label.clone(),
        });
        self.lower_body(body);
        self.loop_stack.pop();
        self.open_block(incr_label, false);
        let one = self.int_const(1);
        self.emit(Instr::Push(index.clone()));
        self.emit(Instr::Push(one));
        self.emit(Instr::Push(index));
        self.emit(Instr::Extern(INT_ADD_EXTERN.to_string()));
        self.emit(Instr::Jump(JumpTarget::Label(cond_label)));
        self.open_block(end_label, false);
        self.pop_env();
    }

    fn lower_assign(
        &mut self,
        target: &Expr,
        op: AssignOp,
        value: &Expr,
        op_sig: Option<&ExternSignature>,
    ) {
        match &target.kind {
            ExprKind::Name(name) => {
                let cell = self.resolve_name_cell(name);
                let value_cell = self.lower_expr(value);
                match op_sig {
                    None => self.emit(Instr::Copy {
                        src: value_cell,
                        dst: cell,
                    }),
                    Some(sig) => {
                        self.emit(Instr::Push(cell.clone()));
                        self.emit(Instr::Push(value_cell));
                        self.emit(Instr::Push(cell));
                        self.emit(Instr::Extern(sig.extern_string.clone()));
                    }
                }
            }
            ExprKind::Member { object, .. } => {
                let Some(setter) = &target.resolved.setter else {
                    return;
                };
                let receiver = (!object.resolved.is_type).then(|| self.lower_expr(object));
                let value_cell = self.lower_expr(value);
                let final_value = match op_sig {
                    None => value_cell,
                    Some(sig) => {
                        // Read-modify-write through the accessor pair.
                        let getter = target
                            .resolved
                            .sig
                            .as_ref()
                            .map(|g| g.extern_string.clone())
                            .unwrap_or_default();
                        let current =
                            self.temp(target.resolved.ty.as_deref().unwrap_or(types::OBJECT));
                        if let Some(receiver) = &receiver {
                            self.emit(Instr::Push(receiver.clone()));
                        }
                        self.emit(Instr::Push(current.clone()));
                        self.emit(Instr::Extern(getter));
                        let result = self.temp(&sig.ret);
                        self.emit(Instr::Push(current));
                        self.emit(Instr::Push(value_cell));
                        self.emit(Instr::Push(result.clone()));
                        self.emit(Instr::Extern(sig.extern_string.clone()));
                        result
                    }
                };
                if let Some(receiver) = receiver {
                    self.emit(Instr::Push(receiver));
                }
                self.emit(Instr::Push(final_value));
                self.emit(Instr::Extern(setter.extern_string.clone()));
            }
            ExprKind::Index { object, index } => {
                let array = self.lower_expr(object);
                let array_ty = object
                    .resolved
                    .ty
                    .clone()
                    .unwrap_or_else(|| format!("{}Array", types::OBJECT));
                let elem_ty = types::element_type(&array_ty)
                    .unwrap_or(types::OBJECT)
                    .to_string();
                let index_cell = self.lower_expr(index);
                let value_cell = self.lower_expr(value);
                let final_value = match op_sig {
                    None => value_cell,
                    Some(sig) => {
                        let current = self.temp(&elem_ty);
                        self.emit(Instr::Push(array.clone()));
                        self.emit(Instr::Push(index_cell.clone()));
                        self.emit(Instr::Push(current.clone()));
                        self.emit(Instr::Extern(format!(
                            "{}.__Get__SystemInt32__{}",
                            array_ty, elem_ty
                        )));
                        let result = self.temp(&sig.ret);
                        self.emit(Instr::Push(current));
                        self.emit(Instr::Push(value_cell));
                        self.emit(Instr::Push(result.clone()));
                        self.emit(Instr::Extern(sig.extern_string.clone()));
                        result
                    }
                };
                self.emit(Instr::Push(array));
                self.emit(Instr::Push(index_cell));
                self.emit(Instr::Push(final_value));
                self.emit(Instr::Extern(format!(
                    "{}.__Set__SystemInt32_{}__SystemVoid",
                    array_ty, elem_ty
                )));
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Lower an expression; returns the cell holding its result. The
    /// analyzer's `coerce` annotation (assignment widening, casts) is applied
    /// on the way out.
    fn lower_expr(&mut self, expr: &Expr) -> String {
        let cell = self.lower_expr_raw(expr);
        match &expr.resolved.coerce {
            Some(conv) => self.convert(cell, conv),
            None => cell,
        }
    }

    fn lower_expr_raw(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Int(v) => self.int_const(*v),
            ExprKind::Float(v) => {
                let text = format_float(*v);
                self.const_cell(types::FLOAT, &text, Some(text.clone()))
            }
            ExprKind::Bool(false) => self.false_cell(),
            ExprKind::Bool(true) => {
                // true == !false, materialized at runtime.
                let f = self.false_cell();
                let out = self.temp(types::BOOL);
                self.emit(Instr::Push(f));
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(NOT_EXTERN.to_string()));
                out
            }
            ExprKind::Str(s) => self.string_const(s),
            ExprKind::Null => self.null_cell(),
            ExprKind::Interp(parts) => self.lower_interp(parts),
            ExprKind::Name(name) => {
                if expr.resolved.is_type {
                    let ty = expr.resolved.ty.as_deref().unwrap_or(types::OBJECT);
                    return self.type_const(ty);
                }
                self.resolve_name_cell(name)
            }
            ExprKind::Unary { operand, .. } => {
                let mut cell = self.lower_expr(operand);
                if let Some(Some(conv)) = expr.resolved.conversions.first() {
                    cell = self.convert(cell, conv);
                }
                let Some(sig) = &expr.resolved.sig else {
                    return cell;
                };
                let out = self.temp(&sig.ret);
                self.emit(Instr::Push(cell));
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(sig.extern_string.clone()));
                out
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                let mut left = self.lower_expr(lhs);
                let mut right = self.lower_expr(rhs);
                if let Some(Some(conv)) = expr.resolved.conversions.first() {
                    left = self.convert(left, conv);
                }
                if let Some(Some(conv)) = expr.resolved.conversions.get(1) {
                    right = self.convert(right, conv);
                }
                let Some(sig) = &expr.resolved.sig else {
                    return left;
                };
                let out = self.temp(&sig.ret);
                self.emit(Instr::Push(left));
                self.emit(Instr::Push(right));
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(sig.extern_string.clone()));
                out
            }
            ExprKind::Member { object, .. } => {
                if let Some(value) = expr.resolved.enum_value {
                    let ty = expr.resolved.ty.clone();
                    let ty = ty.as_deref().unwrap_or(types::INT);
                    return self.const_cell(ty, &value.to_string(), Some(value.to_string()));
                }
                let Some(getter) = &expr.resolved.sig else {
                    return self.null_cell();
                };
                let getter_extern = getter.extern_string.clone();
                let is_instance = getter.is_instance;
                let out = self.temp(&getter.ret);
                if is_instance {
                    let receiver = self.lower_expr(object);
                    self.emit(Instr::Push(receiver));
                }
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(getter_extern));
                out
            }
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args),
            ExprKind::Index { object, index } => {
                if expr.resolved.array_ctor {
                    // `T[n]` constructs an array of n elements.
                    let array_ty = expr
                        .resolved
                        .ty
                        .clone()
                        .unwrap_or_else(|| format!("{}Array", types::OBJECT));
                    let size = self.lower_expr(index);
                    let out = self.temp(&array_ty);
                    self.emit(Instr::Push(size));
                    self.emit(Instr::Push(out.clone()));
                    self.emit(Instr::Extern(format!(
                        "{0}.__ctor__SystemInt32__{0}",
                        array_ty
                    )));
                    return out;
                }
                let array = self.lower_expr(object);
                let array_ty = object
                    .resolved
                    .ty
                    .clone()
                    .unwrap_or_else(|| format!("{}Array", types::OBJECT));
                let elem_ty = types::element_type(&array_ty)
                    .unwrap_or(types::OBJECT)
                    .to_string();
                let index_cell = self.lower_expr(index);
                let out = self.temp(&elem_ty);
                self.emit(Instr::Push(array));
                self.emit(Instr::Push(index_cell));
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(format!(
                    "{}.__Get__SystemInt32__{}",
                    array_ty, elem_ty
                )));
                out
            }
            ExprKind::ArrayLit(elems) => {
                let array_ty = expr
                    .resolved
                    .ty
                    .clone()
                    .unwrap_or_else(|| types::OBJECT.to_string());
                let elem_ty = types::element_type(&array_ty)
                    .unwrap_or(types::OBJECT)
                    .to_string();
                let array_ty = if array_ty.ends_with("Array") {
                    array_ty
                } else {
                    format!("{}Array", types::OBJECT)
                };
                let size = self.int_const(elems.len() as i64);
                let out = self.temp(&array_ty);
                self.emit(Instr::Push(size));
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(format!(
                    "{0}.__ctor__SystemInt32__{0}",
                    array_ty
                )));
                for (i, elem) in elems.iter().enumerate() {
                    let value = self.lower_expr(elem);
                    let index = self.int_const(i as i64);
                    self.emit(Instr::Push(out.clone()));
                    self.emit(Instr::Push(index));
                    self.emit(Instr::Push(value));
                    self.emit(Instr::Extern(format!(
                        "{}.__Set__SystemInt32_{}__SystemVoid",
                        array_ty, elem_ty
                    )));
                }
                out
            }
            // This node's own coercion is applied by `lower_expr`; the inner
            // expression goes through the full path so nested casts compose.
            ExprKind::Cast { expr: inner, .. } => self.lower_expr(inner),
        }
    }

    fn lower_interp(&mut self, parts: &[StrPart]) -> String {
        let mut acc: Option<String> = None;
        for part in parts {
            let cell = match part {
                StrPart::Text(text) => self.string_const(text),
                StrPart::Expr(expr) => {
                    let cell = self.lower_expr(expr);
                    if expr.resolved.ty.as_deref() == Some(types::STRING) {
                        cell
                    } else {
                        let out = self.temp(types::STRING);
                        self.emit(Instr::Push(cell));
                        self.emit(Instr::Push(out.clone()));
                        self.emit(Instr::Extern(TOSTRING_EXTERN.to_string()));
                        out
                    }
                }
            };
            acc = Some(match acc {
                None => cell,
                Some(prev) => {
                    let out = self.temp(types::STRING);
                    self.emit(Instr::Push(prev));
                    self.emit(Instr::Push(cell));
                    self.emit(Instr::Push(out.clone()));
                    self.emit(Instr::Extern(CONCAT_EXTERN.to_string()));
                    out
                }
            });
        }
        acc.unwrap_or_else(|| self.string_const(""))
    }

    fn lower_call(&mut self, call: &Expr, callee: &Expr, args: &[Expr]) -> String {
        if let Some(builtin) = call.resolved.builtin {
            return self.lower_builtin_call(builtin, call, args);
        }
        if let Some(fn_name) = &call.resolved.user_fn {
            return self.lower_user_call(fn_name.clone(), call, args);
        }
        let Some(sig) = call.resolved.sig.clone() else {
            return self.null_cell();
        };
        let receiver = match &callee.kind {
            ExprKind::Member { object, .. } if sig.is_instance => Some(self.lower_expr(object)),
            _ => None,
        };
        let arg_cells = self.lower_args(call, args);
        if let Some(receiver) = receiver {
            self.emit(Instr::Push(receiver));
        }
        for cell in arg_cells {
            self.emit(Instr::Push(cell));
        }
        let ret_ty = call.resolved.ty.clone().unwrap_or_else(|| sig.ret.clone());
        let out = (ret_ty != types::VOID).then(|| self.temp(&ret_ty));
        if let Some(out) = &out {
            self.emit(Instr::Push(out.clone()));
        }
        self.emit(Instr::Extern(sig.extern_string));
        out.unwrap_or_else(|| self.null_cell())
    }

    fn lower_builtin_call(&mut self, builtin: BuiltinFn, call: &Expr, args: &[Expr]) -> String {
        let arg_cells = self.lower_args(call, args);
        match builtin {
            BuiltinFn::Log | BuiltinFn::Warn | BuiltinFn::Error => {
                let method = match builtin {
                    BuiltinFn::Log => "Log",
                    BuiltinFn::Warn => "LogWarning",
                    _ => "LogError",
                };
                for cell in arg_cells {
                    self.emit(Instr::Push(cell));
                }
                self.emit(Instr::Extern(mangle_extern(
                    "UnityEngineDebug",
                    method,
                    &[types::OBJECT],
                    types::VOID,
                )));
                self.null_cell()
            }
            BuiltinFn::RequestSerialization => {
                self.emit(Instr::Push(THIS_BEHAVIOUR.to_string()));
                self.emit(Instr::Extern(mangle_extern(
                    UDON_EVENT_RECEIVER,
                    "RequestSerialization",
                    &[],
                    types::VOID,
                )));
                self.null_cell()
            }
            BuiltinFn::IsValid => {
                let out = self.temp(types::BOOL);
                for cell in arg_cells {
                    self.emit(Instr::Push(cell));
                }
                self.emit(Instr::Push(out.clone()));
                self.emit(Instr::Extern(mangle_extern(
                    "VRCSDKBaseUtilities",
                    "IsValid",
                    &[types::OBJECT],
                    types::BOOL,
                )));
                out
            }
            BuiltinFn::SendCustomEventDelayedSeconds => {
                self.emit(Instr::Push(THIS_BEHAVIOUR.to_string()));
                for cell in arg_cells {
                    self.emit(Instr::Push(cell));
                }
                self.emit(Instr::Extern(mangle_extern(
                    UDON_EVENT_RECEIVER,
                    "SendCustomEventDelayedSeconds",
                    &[types::STRING, types::FLOAT],
                    types::VOID,
                )));
                self.null_cell()
            }
        }
    }

    /// Lower a call to a user function: write arguments into the callee's
    /// parameter slots, store the continuation address, jump, and resume in a
    /// fresh block at the return label.
    fn lower_user_call(&mut self, fn_name: String, call: &Expr, args: &[Expr]) -> String {
        let arg_cells = self.lower_args(call, args);
        let Some(cells) = self.fn_cells.get(&fn_name) else {
            return self.null_cell();
        };
        let label = cells.label.clone();
        let ret_addr = cells.ret_addr.clone();
        let ret_val = cells.ret_val.clone();
        let slots = cells.slots.clone();
        for (cell, slot) in arg_cells.into_iter().zip(slots) {
            self.emit(Instr::Copy {
                src: cell,
                dst: slot,
            });
        }
        let ret_label = self.new_ret_label();
        let addr = self.const_cell(
            types::ADDRESS,
            &ret_label,
            Some(label_placeholder(&ret_label)),
        );
        self.emit(Instr::Copy {
            src: addr,
            dst: ret_addr,
        });
        self.emit(Instr::Jump(JumpTarget::Label(label)));
        self.open_block(ret_label, false);
        match ret_val {
            Some(ret_val) => {
                let out_ty = call
                    .resolved
                    .ty
                    .clone()
                    .unwrap_or_else(|| types::OBJECT.to_string());
                let out = self.temp(&out_ty);
                self.emit(Instr::Copy {
                    src: ret_val,
                    dst: out.clone(),
                });
                out
            }
            None => self.null_cell(),
        }
    }

    fn lower_args(&mut self, call: &Expr, args: &[Expr]) -> Vec<String> {
        let mut cells = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let mut cell = if arg.resolved.is_type {
                let ty = arg.resolved.ty.as_deref().unwrap_or(types::OBJECT);
                self.type_const(ty)
            } else {
                self.lower_expr(arg)
            };
            if let Some(Some(conv)) = call.resolved.conversions.get(i) {
                cell = self.convert(cell, conv);
            }
            cells.push(cell);
        }
        cells
    }

    /// Emit an implicit-conversion extern: push the operand, push a fresh
    /// cell of the target type, call the conversion routine.
    fn convert(&mut self, cell: String, conv: &ExternSignature) -> String {
        let out = self.temp(&conv.ret);
        self.emit(Instr::Push(cell));
        self.emit(Instr::Push(out.clone()));
        self.emit(Instr::Extern(conv.extern_string.clone()));
        out
    }

    // ------------------------------------------------------------------
    // Cells, constants, names
    // ------------------------------------------------------------------

    /// Declare a heap cell. A name collision (two `for i` loops in different
    /// bodies) yields a uniquified `__lcl_<name>_<type>_<n>` cell instead.
    fn declare(
        &mut self,
        name: &str,
        ty: String,
        init: Option<String>,
        exported: bool,
        sync: SyncMode,
    ) -> String {
        let mut cell = name.to_string();
        while self.vars.iter().any(|v| v.name == cell) {
            cell = format!("__lcl_{}_{}_{}", name, ty, self.lcl_counter);
            self.lcl_counter += 1;
        }
        self.vars.push(HeapVar {
            name: cell.clone(),
            ty,
            init,
            exported,
            sync,
            is_this: false,
        });
        cell
    }

    fn temp(&mut self, ty: &str) -> String {
        let name = format!("__tmp_{}", self.tmp_counter);
        self.tmp_counter += 1;
        self.vars.push(HeapVar {
            name: name.clone(),
            ty: ty.to_string(),
            init: None,
            exported: false,
            sync: SyncMode::NotSynced,
            is_this: false,
        });
        name
    }

    /// Interned constant cell. `key` distinguishes constants of equal initial
    /// value (e.g. two `SystemType` cells for different types, both `null`).
    /// Laundering: a literal of a type the data-section parser cannot
    /// construct is declared as a 32-bit integer cell instead; `null`, `this`,
    /// and label placeholders keep their nominal type.
    fn const_cell(&mut self, ty: &str, key: &str, init: Option<String>) -> String {
        let map_key = (ty.to_string(), key.to_string());
        if let Some(cell) = self.consts.get(&map_key) {
            return cell.clone();
        }
        let declared_ty = match &init {
            Some(value)
                if value != "null"
                    && value != "this"
                    && !value.starts_with(LABEL_PLACEHOLDER)
                    && !DATA_LITERAL_TYPES.contains(&ty) =>
            {
                types::INT.to_string()
            }
            _ => ty.to_string(),
        };
        let name = format!("__const_{}", self.const_counter);
        self.const_counter += 1;
        self.vars.push(HeapVar {
            name: name.clone(),
            ty: declared_ty,
            init,
            exported: false,
            sync: SyncMode::NotSynced,
            is_this: false,
        });
        self.consts.insert(map_key, name.clone());
        name
    }

    fn int_const(&mut self, value: i64) -> String {
        let text = value.to_string();
        self.const_cell(types::INT, &text, Some(text.clone()))
    }

    fn string_const(&mut self, value: &str) -> String {
        self.const_cell(types::STRING, value, Some(quote_string(value)))
    }

    /// The interned `false` cell: a boolean declared `null`.
    fn false_cell(&mut self) -> String {
        self.const_cell(types::BOOL, "false", Some("null".to_string()))
    }

    fn null_cell(&mut self) -> String {
        self.const_cell(types::OBJECT, "null", Some("null".to_string()))
    }

    /// A reflected-type argument cell; the host binds the actual Type value.
    fn type_const(&mut self, ty: &str) -> String {
        self.const_cell(types::TYPE, ty, Some("null".to_string()))
    }

    fn resolve_name_cell(&mut self, name: &str) -> String {
        if let Some(cell) = self.lookup(name) {
            return cell;
        }
        if name == "localPlayer" {
            let out = self.temp("VRCSDKBaseVRCPlayerApi");
            self.emit(Instr::Push(out.clone()));
            self.emit(Instr::Extern(LOCAL_PLAYER_EXTERN.to_string()));
            return out;
        }
        // Top-level cells carry their source name.
        name.to_string()
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.env
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    fn bind(&mut self, name: &str, cell: &str) {
        self.env
            .last_mut()
            .expect("environment stack is never empty")
            .insert(name.to_string(), cell.to_string());
    }

    fn push_env(&mut self) {
        self.env.push(HashMap::new());
    }

    fn pop_env(&mut self) {
        self.env.pop();
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    fn emit(&mut self, instr: Instr) {
        if self.blocks.is_empty() {
            self.open_block("_start".to_string(), true);
        }
        self.blocks[self.current].code.push(instr);
    }

    fn open_block(&mut self, label: String, exported: bool) {
        self.blocks.push(IrBlock {
            label,
            exported,
            code: Vec::new(),
        });
        self.current = self.blocks.len() - 1;
    }

    fn new_label(&mut self) -> String {
        let label = format!("__block_{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn new_ret_label(&mut self) -> String {
        let label = format!("__ret_{}", self.label_counter);
        self.label_counter += 1;
        label
    }
}

fn implicit_result_type(label: &str) -> Option<&'static str> {
    events::IMPLICIT_PARAM_TABLE
        .iter()
        .find(|(surface, _)| events::vm_label(surface) == Some(label))
        .map(|(_, ty)| *ty)
}

/// Stringify a float in the invariant form the VM's text parser accepts.
fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

/// Quote and escape a string for the data section.
fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::catalog::Catalog;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::lex;
    use crate::parser;
    use std::path::Path;

    fn lower_source(source: &str) -> IrModule {
        let mut diags = Diagnostics::new();
        let tokens = lex(source, Path::new("test.nori"), &mut diags);
        let mut module = parser::parse(tokens, Path::new("test.nori"), &mut diags);
        let catalog = Catalog::builtin();
        analyzer::analyze(&mut module, &catalog, &mut diags);
        assert!(
            !diags.has_errors(),
            "analysis failed: {}",
            crate::diagnostics::format_diagnostics(&diags)
        );
        let ir = lower(&module);
        ir.validate().expect("lowered IR must be structurally valid");
        ir
    }

    fn externs_of(ir: &IrModule) -> Vec<&str> {
        ir.blocks
            .iter()
            .flat_map(|b| &b.code)
            .filter_map(|i| match i {
                Instr::Extern(sig) => Some(sig.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn hello_world_shape() {
        let ir = lower_source("on Start { log(\"Hello from Nori!\") }");
        let start = ir.block("_start").expect("start block");
        assert!(start.exported);
        assert!(
            externs_of(&ir).contains(&"UnityEngineDebug.__Log__SystemObject__SystemVoid")
        );
        assert_eq!(
            start.code.last(),
            Some(&Instr::Jump(JumpTarget::Address(HALT_ADDRESS)))
        );
    }

    #[test]
    fn this_cells_are_declared_once() {
        let ir = lower_source("on Start { }");
        let this_cells: Vec<_> = ir.vars.iter().filter(|v| v.is_this).collect();
        assert_eq!(this_cells.len(), 3);
        for cell in this_cells {
            assert_eq!(cell.init.as_deref(), Some("this"));
        }
    }

    #[test]
    fn true_initializer_is_deferred_to_runtime() {
        let ir = lower_source("let armed: bool = true");
        let armed = ir.var("armed").expect("armed cell");
        assert_eq!(armed.init, None, "true must never appear in the data section");
        // A _start block is synthesized for the deferred init.
        let start = ir.block("_start").expect("synthesized start");
        assert!(start.exported);
        let negations = externs_of(&ir)
            .iter()
            .filter(|e| **e == NOT_EXTERN)
            .count();
        assert_eq!(negations, 1, "exactly one negation against the false cell");
        // The interned false constant loads from null.
        let false_cell = ir
            .vars
            .iter()
            .find(|v| v.ty == "SystemBoolean" && v.name.starts_with("__const_"))
            .expect("interned false cell");
        assert_eq!(false_cell.init.as_deref(), Some("null"));
    }

    #[test]
    fn false_initializer_is_data_encoded() {
        let ir = lower_source("let off: bool = false");
        assert_eq!(ir.var("off").unwrap().init.as_deref(), Some("null"));
        assert!(ir.block("_start").is_none());
    }

    #[test]
    fn start_prologue_runs_before_user_code() {
        let ir = lower_source("let armed: bool = true on Start { log(\"go\") }");
        let start = ir.block("_start").unwrap();
        let not_pos = start
            .code
            .iter()
            .position(|i| matches!(i, Instr::Extern(e) if e == NOT_EXTERN))
            .expect("negation in start");
        let log_pos = start
            .code
            .iter()
            .position(|i| matches!(i, Instr::Extern(e) if e.contains("__Log__")))
            .expect("log in start");
        assert!(not_pos < log_pos, "deferred init must precede user code");
    }

    #[test]
    fn function_owns_call_convention_cells() {
        let ir = lower_source(
            "fn add(a: int, b: int) -> int { return a + b }\n\
             on Start { let x: int = add(1, 2) }",
        );
        assert!(ir.var("__fn_add_ret").is_some());
        assert!(ir.var("__fn_add_param_a").is_some());
        assert!(ir.var("__fn_add_param_b").is_some());
        assert!(ir.var("__fn_add_retval").is_some());
        let body = ir.block("__fn_add").expect("function block");
        assert!(!body.exported);
        assert_eq!(
            body.code.last(),
            Some(&Instr::JumpIndirect("__fn_add_ret".to_string()))
        );
        // Call site: a label-placeholder constant is copied into the return
        // address cell before the jump.
        let placeholder = ir
            .vars
            .iter()
            .find(|v| {
                v.init
                    .as_deref()
                    .is_some_and(|i| i.starts_with(LABEL_PLACEHOLDER))
            })
            .expect("return-address placeholder constant");
        assert_eq!(placeholder.ty, types::ADDRESS);
        // The continuation block exists.
        assert!(ir.blocks.iter().any(|b| b.label.starts_with("__ret_")));
    }

    #[test]
    fn for_loops_in_two_bodies_get_distinct_cells() {
        let ir = lower_source(
            "pub let items: int = 3\n\
             let total: int = 0\n\
             on Start { for i in 0..items { total = total + 1 } }\n\
             fn add_items() { for i in 0..items { total = total + i } }",
        );
        assert!(ir.var("i").is_some());
        let uniquified: Vec<_> = ir
            .vars
            .iter()
            .filter(|v| v.name.starts_with("__lcl_i_SystemInt32_"))
            .collect();
        assert_eq!(uniquified.len(), 1, "second loop gets a uniquified cell");
        let unique_name = uniquified[0].name.clone();
        let fn_block_labels: Vec<&str> = ir
            .blocks
            .iter()
            .map(|b| b.label.as_str())
            .filter(|l| l.starts_with("__fn_add_items") || l.starts_with("__block_"))
            .collect();
        assert!(!fn_block_labels.is_empty());
        // The uniquified cell is referenced somewhere; the bare `i` cell is
        // only referenced by the first loop's blocks.
        assert!(ir.referenced_names().contains(unique_name.as_str()));
    }

    #[test]
    fn network_send_launders_the_enum_target() {
        let ir = lower_source("event Ping { } on Start { send Ping to All }");
        // The NetworkEventTarget constant is declared as an integer.
        let target = ir
            .vars
            .iter()
            .find(|v| v.init.as_deref() == Some("1") && v.name.starts_with("__const_"))
            .expect("network target constant");
        assert_eq!(target.ty, types::INT);
        assert!(externs_of(&ir).iter().any(|e| e.contains("SendCustomNetworkEvent")));
    }

    #[test]
    fn local_send_pushes_this_and_event_name() {
        let ir = lower_source("event Ping { } on Start { send Ping }");
        let start = ir.block("_start").unwrap();
        let send_pos = start
            .code
            .iter()
            .position(|i| matches!(i, Instr::Extern(e) if e.contains("SendCustomEvent__")))
            .expect("send extern");
        assert_eq!(start.code[send_pos - 2], Instr::Push(THIS_BEHAVIOUR.into()));
    }

    #[test]
    fn while_loop_structure_validates() {
        let ir = lower_source(
            "let n: int = 0\n\
             on Start { while n < 10 { n = n + 1 } }",
        );
        // Condition and end blocks exist; body jumps back to the condition.
        assert!(ir.blocks.iter().filter(|b| b.label.starts_with("__block_")).count() >= 2);
        let back_jumps = ir
            .blocks
            .iter()
            .flat_map(|b| &b.code)
            .filter(|i| matches!(i, Instr::Jump(JumpTarget::Label(l)) if l.starts_with("__block_")))
            .count();
        assert!(back_jumps >= 1);
    }

    #[test]
    fn for_each_queries_length_and_elements() {
        let ir = lower_source(
            "let names: string[] = [\"a\", \"b\"]\n\
             on Start { for name in names { log(name) } }",
        );
        let externs = externs_of(&ir);
        assert!(
            externs.contains(&"SystemStringArray.__get_Length__SystemInt32"),
            "{:?}",
            externs
        );
        assert!(externs.contains(&"SystemStringArray.__Get__SystemInt32__SystemString"));
        assert!(externs.contains(&"SystemStringArray.__Set__SystemInt32_SystemString__SystemVoid"));
    }

    #[test]
    fn interpolation_concats_and_stringifies() {
        let ir = lower_source(
            "let score: int = 0\n\
             fn show() { log(\"Score: {score}\") }",
        );
        let externs = externs_of(&ir);
        assert!(externs.contains(&CONCAT_EXTERN));
        assert!(externs.contains(&TOSTRING_EXTERN));
    }

    #[test]
    fn constants_are_interned() {
        let ir = lower_source("on Start { let a: int = 7 let b: int = 7 }");
        let sevens = ir
            .vars
            .iter()
            .filter(|v| v.init.as_deref() == Some("7"))
            .count();
        assert_eq!(sevens, 1, "equal literals share one cell");
    }

    #[test]
    fn unknown_event_lowers_with_underscore_prefix() {
        let mut diags = Diagnostics::new();
        let tokens = lex("on Glitch { }", Path::new("t.nori"), &mut diags);
        let mut module = parser::parse(tokens, Path::new("t.nori"), &mut diags);
        let catalog = Catalog::builtin();
        analyzer::analyze(&mut module, &catalog, &mut diags);
        // W0010 only; lowering proceeds.
        assert!(!diags.has_errors());
        let ir = lower(&module);
        assert!(ir.block("_Glitch").is_some());
    }

    #[test]
    fn member_property_read_and_write() {
        let ir = lower_source(
            "on Start { transform.position = transform.position }",
        );
        let externs = externs_of(&ir);
        assert!(externs.contains(&"UnityEngineTransform.__get_position__UnityEngineVector3"));
        assert!(
            externs.contains(
                &"UnityEngineTransform.__set_position__UnityEngineVector3__SystemVoid"
            )
        );
    }

    #[test]
    fn event_return_is_halt() {
        let ir = lower_source("on Interact { return }");
        let block = ir.block("_interact").unwrap();
        let halts = block
            .code
            .iter()
            .filter(|i| matches!(i, Instr::Jump(JumpTarget::Address(a)) if *a == HALT_ADDRESS))
            .count();
        assert!(halts >= 1);
    }

    #[test]
    fn float_literals_keep_a_decimal_point() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(2.5), "2.5");
    }

    #[test]
    fn strings_are_escaped_for_the_data_section() {
        assert_eq!(quote_string("a\"b\n"), "\"a\\\"b\\n\"");
    }
}
