//! Semantic analysis.
//!
//! Two passes over the module. Pass 1 seeds the global scope (this-bindings,
//! built-in functions, catalog short names) and registers every top-level
//! declaration. Pass 2 walks bodies bottom-up: name resolution, operator and
//! overload resolution against the extern catalog, type checking, and
//! loop-nesting tracking. Resolutions are written onto the AST in place; the
//! lowerer consumes exactly what was written here.
//!
//! After bodies are analyzed, strongly connected components of the user-level
//! call graph are reported as recursion errors — the call-return convention
//! has one set of parameter cells per function, so recursion can never run.

use crate::ast::*;
use crate::catalog::{ExternCatalog, ExternSignature};
use crate::diagnostics::{Diagnostics, codes};
use crate::events;
use crate::span::SourceSpan;
use crate::symbols::{ScopeId, ScopeTree, Symbol, SymbolKind};
use crate::types::{self, is_assignable, resolve_surface, surface_name};
use std::collections::{HashMap, HashSet};

/// Methods whose return type narrows to the queried type argument.
const COMPONENT_QUERIES: &[&str] = &[
    "GetComponent",
    "GetComponents",
    "GetComponentInChildren",
    "GetComponentsInChildren",
    "GetComponentInParent",
    "GetComponentsInParent",
];

/// Everything the analyzer publishes besides the in-place AST annotations.
/// The maps are keyed by node span and serve editor integrations.
pub struct Analysis {
    pub scopes: ScopeTree,
    pub type_map: HashMap<SourceSpan, String>,
    pub scope_map: HashMap<SourceSpan, ScopeId>,
}

pub fn analyze(
    module: &mut Module,
    catalog: &dyn ExternCatalog,
    diags: &mut Diagnostics,
) -> Analysis {
    let scopes = ScopeTree::new();
    let root = scopes.root();
    let mut analyzer = Analyzer {
        catalog,
        diags,
        scopes,
        current: root,
        call_graph: HashMap::new(),
        fn_order: Vec::new(),
        fn_spans: HashMap::new(),
        custom_events: HashSet::new(),
        current_fn: None,
        expected_return: None,
        loop_depth: 0,
        type_map: HashMap::new(),
        scope_map: HashMap::new(),
    };
    analyzer.register_builtins();
    analyzer.register_declarations(module);
    analyzer.check_bodies(module);
    analyzer.report_recursion();
    Analysis {
        scopes: analyzer.scopes,
        type_map: analyzer.type_map,
        scope_map: analyzer.scope_map,
    }
}

struct Analyzer<'a> {
    catalog: &'a dyn ExternCatalog,
    diags: &'a mut Diagnostics,
    scopes: ScopeTree,
    current: ScopeId,
    call_graph: HashMap<String, HashSet<String>>,
    fn_order: Vec<String>,
    fn_spans: HashMap<String, SourceSpan>,
    custom_events: HashSet<String>,
    current_fn: Option<String>,
    /// Udon return type of the enclosing function; `None` inside event and
    /// custom-event bodies, where `return` means halt.
    expected_return: Option<String>,
    loop_depth: usize,
    type_map: HashMap<SourceSpan, String>,
    scope_map: HashMap<SourceSpan, ScopeId>,
}

impl<'a> Analyzer<'a> {
    // ------------------------------------------------------------------
    // Pass 1: registration
    // ------------------------------------------------------------------

    fn register_builtins(&mut self) {
        let root = self.scopes.root();
        for (name, ty) in [
            ("gameObject", "UnityEngineGameObject"),
            ("transform", "UnityEngineTransform"),
            ("localPlayer", "VRCSDKBaseVRCPlayerApi"),
        ] {
            let _ = self.scopes.define(
                root,
                Symbol {
                    name: name.to_string(),
                    ty: ty.to_string(),
                    kind: SymbolKind::Builtin,
                    span: None,
                },
            );
        }
        for (name, ret) in [
            ("log", types::VOID),
            ("warn", types::VOID),
            ("error", types::VOID),
            ("RequestSerialization", types::VOID),
            ("IsValid", types::BOOL),
            ("SendCustomEventDelayedSeconds", types::VOID),
        ] {
            let _ = self.scopes.define(
                root,
                Symbol {
                    name: name.to_string(),
                    ty: ret.to_string(),
                    kind: SymbolKind::Builtin,
                    span: None,
                },
            );
        }
        for (short, udon) in self.catalog.get_short_name_mappings() {
            let kind = if self.catalog.is_enum_type(&udon) {
                SymbolKind::EnumType
            } else {
                SymbolKind::StaticType
            };
            // First mapping wins; later duplicates are dropped silently.
            let _ = self.scopes.define(
                root,
                Symbol {
                    name: short,
                    ty: udon,
                    kind,
                    span: None,
                },
            );
        }
    }

    fn register_declarations(&mut self, module: &mut Module) {
        let root = self.scopes.root();
        for decl in &mut module.decls {
            match decl {
                Decl::Variable(var) => {
                    let ty = self.resolve_type_name(&var.ty, var.is_array, &var.span);
                    var.resolved_ty = ty.clone();
                    let symbol = Symbol {
                        name: var.name.clone(),
                        ty: ty.unwrap_or_else(|| types::OBJECT.to_string()),
                        kind: SymbolKind::Variable {
                            is_public: var.is_public,
                            sync: var.sync,
                            is_array: var.is_array,
                        },
                        span: Some(var.span.clone()),
                    };
                    if self.scopes.define(root, symbol).is_err() {
                        self.diags.error(
                            codes::UNDEFINED_VARIABLE,
                            format!("variable '{}' is already defined", var.name),
                            var.span.clone(),
                        );
                    }
                }
                Decl::Function(func) => {
                    let mut params = Vec::new();
                    for param in &mut func.params {
                        let ty = self.resolve_type_name(&param.ty, param.is_array, &param.span);
                        param.resolved_ty = ty.clone();
                        params.push((
                            param.name.clone(),
                            ty.unwrap_or_else(|| types::OBJECT.to_string()),
                        ));
                    }
                    let ret = match &func.return_ty {
                        Some(surface) => {
                            let (base, is_array) = split_array_suffix(surface);
                            self.resolve_type_name(base, is_array, &func.span)
                                .unwrap_or_else(|| types::OBJECT.to_string())
                        }
                        None => types::VOID.to_string(),
                    };
                    func.resolved_ret = Some(ret.clone());
                    let symbol = Symbol {
                        name: func.name.clone(),
                        ty: ret.clone(),
                        kind: SymbolKind::Function { params, ret },
                        span: Some(func.span.clone()),
                    };
                    if self.scopes.define(root, symbol).is_err() {
                        self.diags.error(
                            codes::EVENT_DEFINITION,
                            format!("function '{}' is already defined", func.name),
                            func.span.clone(),
                        );
                    } else {
                        self.call_graph.insert(func.name.clone(), HashSet::new());
                        self.fn_order.push(func.name.clone());
                        self.fn_spans.insert(func.name.clone(), func.span.clone());
                    }
                }
                Decl::CustomEvent(event) => {
                    let symbol = Symbol {
                        name: event.name.clone(),
                        ty: types::VOID.to_string(),
                        kind: SymbolKind::CustomEvent,
                        span: Some(event.span.clone()),
                    };
                    if self.scopes.define(root, symbol).is_err() {
                        self.diags.error(
                            codes::EVENT_DEFINITION,
                            format!("custom event '{}' is already defined", event.name),
                            event.span.clone(),
                        );
                    } else {
                        self.custom_events.insert(event.name.clone());
                    }
                }
                Decl::EventHandler(_) => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2: bodies
    // ------------------------------------------------------------------

    fn check_bodies(&mut self, module: &mut Module) {
        for decl in &mut module.decls {
            match decl {
                Decl::Variable(var) => {
                    if let Some(init) = &mut var.init {
                        let init_ty = self.check_expr(init);
                        if let (Some(from), Some(to)) = (init_ty, var.resolved_ty.clone()) {
                            self.require_assignable(&from, &to, init);
                        }
                    }
                }
                Decl::Function(func) => {
                    let outer = self.current;
                    self.current = self.scopes.push(outer);
                    for param in &func.params {
                        self.define_param(
                            &param.name,
                            param
                                .resolved_ty
                                .clone()
                                .unwrap_or_else(|| types::OBJECT.to_string()),
                            &param.span,
                        );
                    }
                    self.current_fn = Some(func.name.clone());
                    self.expected_return = func.resolved_ret.clone();
                    self.check_block(&mut func.body);
                    self.expected_return = None;
                    self.current_fn = None;
                    self.current = outer;
                }
                Decl::EventHandler(event) => {
                    if events::vm_label(&event.name).is_none() {
                        self.diags.warning(
                            codes::UNKNOWN_EVENT,
                            format!("unknown event '{}'", event.name),
                            event.span.clone(),
                        );
                    }
                    let outer = self.current;
                    self.current = self.scopes.push(outer);
                    for param in &mut event.params {
                        let ty = self.resolve_type_name(&param.ty, param.is_array, &param.span);
                        param.resolved_ty = ty.clone();
                        self.define_param(
                            &param.name,
                            ty.unwrap_or_else(|| types::OBJECT.to_string()),
                            &param.span,
                        );
                    }
                    // Download callbacks auto-bind `result` unless an explicit
                    // parameter shadows it.
                    if let Some(result_ty) = events::implicit_param(&event.name)
                        && !event.params.iter().any(|p| p.name == "result")
                    {
                        self.define_param("result", result_ty.to_string(), &event.span);
                    }
                    self.check_block(&mut event.body);
                    self.current = outer;
                }
                Decl::CustomEvent(event) => {
                    let outer = self.current;
                    self.current = self.scopes.push(outer);
                    self.check_block(&mut event.body);
                    self.current = outer;
                }
            }
        }
    }

    fn define_param(&mut self, name: &str, ty: String, span: &SourceSpan) {
        let symbol = Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Parameter,
            span: Some(span.clone()),
        };
        if self.scopes.define(self.current, symbol).is_err() {
            self.diags.error(
                codes::UNDEFINED_VARIABLE,
                format!("parameter '{}' is already defined", name),
                span.clone(),
            );
        }
    }

    fn check_block(&mut self, body: &mut [Stmt]) {
        for stmt in body {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Local(local) => {
                let ty = self.resolve_type_name(&local.ty, local.is_array, &local.span);
                local.resolved_ty = ty.clone();
                if let Some(init) = &mut local.init {
                    let init_ty = self.check_expr(init);
                    if let (Some(from), Some(to)) = (init_ty, ty.clone()) {
                        self.require_assignable(&from, &to, init);
                    }
                }
                let symbol = Symbol {
                    name: local.name.clone(),
                    ty: ty.unwrap_or_else(|| types::OBJECT.to_string()),
                    kind: SymbolKind::Variable {
                        is_public: false,
                        sync: SyncMode::NotSynced,
                        is_array: local.is_array,
                    },
                    span: Some(local.span.clone()),
                };
                if self.scopes.define(self.current, symbol).is_err() {
                    self.diags.error(
                        codes::UNDEFINED_VARIABLE,
                        format!("variable '{}' is already defined", local.name),
                        local.span.clone(),
                    );
                }
            }
            Stmt::Assign {
                target,
                op,
                value,
                span,
                op_sig,
            } => {
                let target_ty = self.check_assign_target(target);
                let value_ty = self.check_expr(value);
                let (Some(target_ty), Some(value_ty)) = (target_ty, value_ty) else {
                    return;
                };
                match op.binary_op() {
                    None => {
                        self.require_assignable(&value_ty, &target_ty, value);
                    }
                    Some(bin) => {
                        match self
                            .catalog
                            .resolve_operator(bin.glyph(), &target_ty, &value_ty)
                        {
                            Some(sig) => {
                                if !is_assignable(self.catalog, &sig.ret, &target_ty) {
                                    self.diags.error(
                                        codes::TYPE_MISMATCH,
                                        format!(
                                            "cannot assign '{}' back to '{}'",
                                            surface_name(&sig.ret),
                                            surface_name(&target_ty)
                                        ),
                                        span.clone(),
                                    );
                                }
                                if let Some(expected) = sig.params.get(1)
                                    && expected != &value_ty
                                {
                                    value.resolved.coerce = self
                                        .catalog
                                        .get_implicit_conversion(&value_ty, expected);
                                }
                                *op_sig = Some(sig);
                            }
                            None => {
                                self.operator_mismatch(bin.glyph(), &target_ty, Some(&value_ty), span);
                            }
                        }
                    }
                }
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                self.check_condition(cond);
                self.in_child_scope(|a| a.check_block(then_body));
                if let Some(else_body) = else_body {
                    self.in_child_scope(|a| a.check_block(else_body));
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond);
                self.loop_depth += 1;
                self.in_child_scope(|a| a.check_block(body));
                self.loop_depth -= 1;
            }
            Stmt::ForRange {
                var,
                start,
                end,
                body,
                span,
            } => {
                for bound in [&mut *start, &mut *end] {
                    if let Some(ty) = self.check_expr(bound)
                        && ty != types::INT
                    {
                        self.diags.error(
                            codes::TYPE_MISMATCH,
                            format!(
                                "range bounds must be 'int', found '{}'",
                                surface_name(&ty)
                            ),
                            bound.span.clone(),
                        );
                    }
                }
                let var = var.clone();
                let span = span.clone();
                self.loop_depth += 1;
                self.in_child_scope(|a| {
                    a.define_param(&var, types::INT.to_string(), &span);
                    a.check_block(body);
                });
                self.loop_depth -= 1;
            }
            Stmt::ForEach {
                var,
                collection,
                body,
                span,
            } => {
                let elem = match self.check_expr(collection) {
                    Some(ty) => match types::element_type(&ty) {
                        Some(elem) => elem.to_string(),
                        None => {
                            self.diags.error(
                                codes::TYPE_MISMATCH,
                                format!(
                                    "for-each requires an array, found '{}'",
                                    surface_name(&ty)
                                ),
                                collection.span.clone(),
                            );
                            types::OBJECT.to_string()
                        }
                    },
                    None => types::OBJECT.to_string(),
                };
                let var = var.clone();
                let span = span.clone();
                self.loop_depth += 1;
                self.in_child_scope(|a| {
                    a.define_param(&var, elem, &span);
                    a.check_block(body);
                });
                self.loop_depth -= 1;
            }
            Stmt::Return { value, span } => match (self.expected_return.clone(), value) {
                (None, Some(_)) => {
                    self.diags.error(
                        codes::TYPE_MISMATCH,
                        "cannot return a value from an event handler",
                        span.clone(),
                    );
                }
                (None, None) => {}
                (Some(ret), value) => {
                    if ret == types::VOID {
                        if let Some(value) = value {
                            let _ = self.check_expr(value);
                            self.diags.error(
                                codes::TYPE_MISMATCH,
                                "cannot return a value from a void function",
                                span.clone(),
                            );
                        }
                    } else {
                        match value {
                            Some(value) => {
                                if let Some(from) = self.check_expr(value) {
                                    self.require_assignable(&from, &ret, value);
                                }
                            }
                            None => {
                                self.diags.error(
                                    codes::TYPE_MISMATCH,
                                    format!(
                                        "this function must return '{}'",
                                        surface_name(&ret)
                                    ),
                                    span.clone(),
                                );
                            }
                        }
                    }
                }
            },
            Stmt::Break { span } => {
                if self.loop_depth == 0 {
                    self.diags.error(
                        codes::BREAK_OUTSIDE_LOOP,
                        "'break' outside of a loop",
                        span.clone(),
                    );
                }
            }
            Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    self.diags.error(
                        codes::CONTINUE_OUTSIDE_LOOP,
                        "'continue' outside of a loop",
                        span.clone(),
                    );
                }
            }
            Stmt::Send { event, span, .. } => {
                if !self.custom_events.contains(event.as_str()) {
                    self.diags.error(
                        codes::EVENT_DEFINITION,
                        format!("undefined custom event '{}'", event),
                        span.clone(),
                    );
                }
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn in_child_scope(&mut self, f: impl FnOnce(&mut Self)) {
        let outer = self.current;
        self.current = self.scopes.push(outer);
        f(self);
        self.current = outer;
    }

    fn check_condition(&mut self, cond: &mut Expr) {
        if let Some(ty) = self.check_expr(cond)
            && ty != types::BOOL
        {
            self.diags.error(
                codes::TYPE_MISMATCH,
                format!("condition must be 'bool', found '{}'", surface_name(&ty)),
                cond.span.clone(),
            );
        }
    }

    /// Resolve the left-hand side of an assignment, recording setter
    /// information for member targets.
    fn check_assign_target(&mut self, target: &mut Expr) -> Option<String> {
        match &mut target.kind {
            ExprKind::Name(name) => {
                let name = name.clone();
                match self.scopes.lookup(self.current, &name).cloned() {
                    Some(sym) => match sym.kind {
                        SymbolKind::Variable { .. } | SymbolKind::Parameter => {
                            self.record(target, sym.ty.clone());
                            Some(sym.ty)
                        }
                        _ => {
                            self.diags.error(
                                codes::TYPE_MISMATCH,
                                format!("cannot assign to '{}'", name),
                                target.span.clone(),
                            );
                            None
                        }
                    },
                    None => {
                        self.undefined_name(&name, &target.span);
                        None
                    }
                }
            }
            ExprKind::Member { object, member } => {
                let member = member.clone();
                let obj_ty = self.check_expr(object)?;
                let owner = if object.resolved.is_type {
                    object.resolved.ty.clone().unwrap_or(obj_ty)
                } else {
                    obj_ty
                };
                match self.catalog.resolve_property(&owner, &member) {
                    Some(prop) => {
                        if prop.setter.is_none() {
                            self.diags.error(
                                codes::PROPERTY_NOT_WRITABLE,
                                format!(
                                    "property '{}' of '{}' has no setter",
                                    member,
                                    surface_name(&owner)
                                ),
                                target.span.clone(),
                            );
                            return None;
                        }
                        target.resolved.sig = Some(prop.getter);
                        target.resolved.setter = prop.setter;
                        self.record(target, prop.ty.clone());
                        Some(prop.ty)
                    }
                    None => {
                        self.diags.error(
                            codes::TYPE_MISMATCH,
                            format!(
                                "type '{}' has no property '{}'",
                                surface_name(&owner),
                                member
                            ),
                            target.span.clone(),
                        );
                        None
                    }
                }
            }
            ExprKind::Index { object, index } => {
                let obj_ty = self.check_expr(object)?;
                self.check_index_operand(index);
                match types::element_type(&obj_ty) {
                    Some(elem) => {
                        let elem = elem.to_string();
                        self.record(target, elem.clone());
                        Some(elem)
                    }
                    None => {
                        self.diags.error(
                            codes::TYPE_MISMATCH,
                            format!("cannot index type '{}'", surface_name(&obj_ty)),
                            object.span.clone(),
                        );
                        None
                    }
                }
            }
            _ => {
                self.diags.error(
                    codes::TYPE_MISMATCH,
                    "invalid assignment target",
                    target.span.clone(),
                );
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn check_expr(&mut self, expr: &mut Expr) -> Option<String> {
        let ty = self.check_expr_inner(expr)?;
        self.record(expr, ty.clone());
        Some(ty)
    }

    fn record(&mut self, expr: &mut Expr, ty: String) {
        expr.resolved.ty = Some(ty.clone());
        self.type_map.insert(expr.span.clone(), ty);
        self.scope_map.insert(expr.span.clone(), self.current);
    }

    fn check_expr_inner(&mut self, expr: &mut Expr) -> Option<String> {
        let span = expr.span.clone();
        match &mut expr.kind {
            ExprKind::Int(_) => Some(types::INT.to_string()),
            ExprKind::Float(_) => Some(types::FLOAT.to_string()),
            ExprKind::Bool(_) => Some(types::BOOL.to_string()),
            ExprKind::Str(_) => Some(types::STRING.to_string()),
            ExprKind::Null => Some(types::OBJECT.to_string()),
            ExprKind::Interp(parts) => {
                for part in parts {
                    if let StrPart::Expr(e) = part {
                        self.check_expr(e);
                    }
                }
                Some(types::STRING.to_string())
            }
            ExprKind::Name(name) => {
                let name = name.clone();
                self.resolve_name(&name, &span, &mut expr.resolved)
            }
            ExprKind::Unary { op, operand } => {
                let glyph = op.glyph();
                let ty = self.check_expr(operand)?;
                match self.catalog.resolve_unary_operator(glyph, &ty) {
                    Some(sig) => {
                        let expected = sig.params.first().cloned();
                        if let Some(expected) = expected
                            && expected != ty
                        {
                            expr.resolved.conversions =
                                vec![self.catalog.get_implicit_conversion(&ty, &expected)];
                        }
                        let ret = sig.ret.clone();
                        expr.resolved.sig = Some(sig);
                        Some(ret)
                    }
                    None => {
                        self.operator_mismatch(glyph, &ty, None, &span);
                        None
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let glyph = op.glyph();
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);
                let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);
                match self.catalog.resolve_operator(glyph, &lhs_ty, &rhs_ty) {
                    Some(sig) => {
                        let mut conversions = vec![None, None];
                        for (i, (arg_ty, expected)) in
                            [&lhs_ty, &rhs_ty].iter().zip(&sig.params).enumerate()
                        {
                            if *arg_ty != expected {
                                conversions[i] =
                                    self.catalog.get_implicit_conversion(arg_ty, expected);
                            }
                        }
                        expr.resolved.conversions = conversions;
                        let ret = sig.ret.clone();
                        expr.resolved.sig = Some(sig);
                        Some(ret)
                    }
                    None => {
                        self.operator_mismatch(glyph, &lhs_ty, Some(&rhs_ty), &span);
                        None
                    }
                }
            }
            ExprKind::Member { object, member } => {
                let member = member.clone();
                let obj_ty = self.check_expr(object)?;
                if object.resolved.is_type {
                    let owner = object.resolved.ty.clone().unwrap_or(obj_ty);
                    if let Some(info) = self.catalog.resolve_enum(&owner) {
                        return match info.values.get(&member) {
                            Some(value) => {
                                expr.resolved.enum_value = Some(*value);
                                Some(owner)
                            }
                            None => {
                                let values: Vec<&str> =
                                    info.values.keys().map(String::as_str).collect();
                                let hint = format!("values: {}", values.join(", "));
                                self.diags.error_with_hint(
                                    codes::ENUM_VALUE_NOT_FOUND,
                                    format!(
                                        "enum '{}' has no value '{}'",
                                        surface_name(&owner),
                                        member
                                    ),
                                    span,
                                    hint,
                                );
                                None
                            }
                        };
                    }
                    return match self.catalog.resolve_property(&owner, &member) {
                        Some(prop) => {
                            expr.resolved.sig = Some(prop.getter);
                            expr.resolved.setter = prop.setter;
                            Some(prop.ty)
                        }
                        None => {
                            self.diags.error(
                                codes::TYPE_MISMATCH,
                                format!(
                                    "type '{}' has no property '{}'",
                                    surface_name(&owner),
                                    member
                                ),
                                span,
                            );
                            None
                        }
                    };
                }
                match self.catalog.resolve_property(&obj_ty, &member) {
                    Some(prop) => {
                        expr.resolved.sig = Some(prop.getter);
                        expr.resolved.setter = prop.setter;
                        Some(prop.ty)
                    }
                    None => {
                        self.diags.error(
                            codes::TYPE_MISMATCH,
                            format!(
                                "type '{}' has no property '{}'",
                                surface_name(&obj_ty),
                                member
                            ),
                            span,
                        );
                        None
                    }
                }
            }
            ExprKind::Call { callee, args } => {
                // Borrow dance: pull the callee apart before the arg walk.
                let call_result = self.check_call(callee, args, &span);
                if let Some((ty, info)) = call_result {
                    expr.resolved.sig = info.sig;
                    expr.resolved.builtin = info.builtin;
                    expr.resolved.user_fn = info.user_fn;
                    expr.resolved.conversions = info.conversions;
                    Some(ty)
                } else {
                    None
                }
            }
            ExprKind::Index { object, index } => {
                let obj_ty = self.check_expr(object)?;
                self.check_index_operand(index);
                if object.resolved.is_type {
                    // `T[n]` at a type name constructs an array, it does not
                    // read one.
                    let owner = object.resolved.ty.clone().unwrap_or(obj_ty);
                    expr.resolved.array_ctor = true;
                    return Some(format!("{}Array", owner));
                }
                match types::element_type(&obj_ty) {
                    Some(elem) => Some(elem.to_string()),
                    None => {
                        self.diags.error(
                            codes::TYPE_MISMATCH,
                            format!("cannot index type '{}'", surface_name(&obj_ty)),
                            span,
                        );
                        None
                    }
                }
            }
            ExprKind::ArrayLit(elems) => {
                if elems.is_empty() {
                    // No intrinsic element type; the universal top type.
                    return Some(types::OBJECT.to_string());
                }
                let mut elem_ty: Option<String> = None;
                for elem in elems.iter_mut() {
                    let Some(ty) = self.check_expr(elem) else {
                        continue;
                    };
                    match &elem_ty {
                        None => elem_ty = Some(ty),
                        Some(first) => {
                            if !is_assignable(self.catalog, &ty, first) {
                                self.diags.error(
                                    codes::TYPE_MISMATCH,
                                    format!(
                                        "array element type '{}' does not match '{}'",
                                        surface_name(&ty),
                                        surface_name(first)
                                    ),
                                    elem.span.clone(),
                                );
                            }
                        }
                    }
                }
                elem_ty.map(|t| format!("{}Array", t))
            }
            ExprKind::Cast { expr: inner, ty } => {
                let ty = ty.clone();
                let from = self.check_expr(inner)?;
                let (base, is_array) = split_array_suffix(&ty);
                let Some(target) = self.resolve_type_name(base, is_array, &span) else {
                    return None;
                };
                let conversion = self.catalog.get_implicit_conversion(&from, &target);
                let allowed = conversion.is_some()
                    || is_assignable(self.catalog, &from, &target)
                    || is_assignable(self.catalog, &target, &from);
                if !allowed {
                    self.diags.error(
                        codes::TYPE_MISMATCH,
                        format!(
                            "cannot cast '{}' to '{}'",
                            surface_name(&from),
                            surface_name(&target)
                        ),
                        span,
                    );
                    return None;
                }
                expr.resolved.coerce = conversion;
                Some(target)
            }
        }
    }

    fn check_index_operand(&mut self, index: &mut Expr) {
        if let Some(ty) = self.check_expr(index)
            && ty != types::INT
        {
            self.diags.error(
                codes::TYPE_MISMATCH,
                format!("array index must be 'int', found '{}'", surface_name(&ty)),
                index.span.clone(),
            );
        }
    }

    fn resolve_name(
        &mut self,
        name: &str,
        span: &SourceSpan,
        resolved: &mut ExprInfo,
    ) -> Option<String> {
        if let Some(sym) = self.scopes.lookup(self.current, name).cloned() {
            return match sym.kind {
                SymbolKind::Variable { .. } | SymbolKind::Parameter | SymbolKind::Builtin => {
                    Some(sym.ty)
                }
                SymbolKind::StaticType | SymbolKind::EnumType => {
                    resolved.is_type = true;
                    Some(sym.ty)
                }
                SymbolKind::Function { .. } => {
                    self.diags.error(
                        codes::TYPE_MISMATCH,
                        format!("function '{}' can only be called", name),
                        span.clone(),
                    );
                    None
                }
                SymbolKind::CustomEvent => {
                    self.diags.error(
                        codes::TYPE_MISMATCH,
                        format!("custom event '{}' is not a value; use 'send {}'", name, name),
                        span.clone(),
                    );
                    None
                }
            };
        }
        // A bare type name may appear as a value (component queries take a
        // type argument).
        if let Some(udon) = resolve_surface(self.catalog, name, false) {
            resolved.is_type = true;
            return Some(udon);
        }
        self.undefined_name(name, span);
        None
    }

    fn undefined_name(&mut self, name: &str, span: &SourceSpan) {
        let message = format!("undefined variable '{}'", name);
        match self.scopes.suggest(self.current, name) {
            Some(suggestion) => self.diags.error_with_hint(
                codes::UNDEFINED_VARIABLE,
                message,
                span.clone(),
                format!("did you mean '{}'?", suggestion),
            ),
            None => self.diags.error(codes::UNDEFINED_VARIABLE, message, span.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn check_call(
        &mut self,
        callee: &mut Expr,
        args: &mut [Expr],
        span: &SourceSpan,
    ) -> Option<(String, ExprInfo)> {
        match &mut callee.kind {
            ExprKind::Name(name) => {
                let name = name.clone();
                self.check_named_call(&name, args, span)
            }
            ExprKind::Member { object, member } => {
                let member = member.clone();
                let obj_ty = self.check_expr(object)?;
                let is_static = object.resolved.is_type;
                let owner = if is_static {
                    object.resolved.ty.clone().unwrap_or(obj_ty)
                } else {
                    obj_ty
                };
                self.check_method_call(&owner, &member, is_static, args, span)
            }
            _ => {
                self.check_expr(callee);
                self.diags.error(
                    codes::TYPE_MISMATCH,
                    "expression is not callable",
                    span.clone(),
                );
                None
            }
        }
    }

    fn check_named_call(
        &mut self,
        name: &str,
        args: &mut [Expr],
        span: &SourceSpan,
    ) -> Option<(String, ExprInfo)> {
        let Some(sym) = self.scopes.lookup(self.current, name).cloned() else {
            // A short type name the catalog knows but the scope does not:
            // constructor call.
            if let Some(udon) = resolve_surface(self.catalog, name, false) {
                return self.check_constructor(&udon, args, span);
            }
            self.undefined_name(name, span);
            return None;
        };
        match sym.kind {
            SymbolKind::Builtin => {
                if let Some(builtin) = BuiltinFn::from_name(name) {
                    return self.check_builtin_call(builtin, args, span, &sym.ty);
                }
                self.diags.error(
                    codes::TYPE_MISMATCH,
                    format!("'{}' is not callable", name),
                    span.clone(),
                );
                None
            }
            SymbolKind::Function { params, ret } => {
                if let Some(caller) = self.current_fn.clone() {
                    self.call_graph
                        .entry(caller)
                        .or_default()
                        .insert(name.to_string());
                }
                if args.len() != params.len() {
                    self.diags.error(
                        codes::TYPE_MISMATCH,
                        format!(
                            "function '{}' expects {} argument(s), found {}",
                            name,
                            params.len(),
                            args.len()
                        ),
                        span.clone(),
                    );
                    return None;
                }
                let mut conversions = Vec::with_capacity(args.len());
                for (arg, (_, param_ty)) in args.iter_mut().zip(&params) {
                    let conv = match self.check_expr(arg) {
                        Some(arg_ty) => {
                            self.require_assignable(&arg_ty, param_ty, arg);
                            if &arg_ty != param_ty {
                                self.catalog.get_implicit_conversion(&arg_ty, param_ty)
                            } else {
                                None
                            }
                        }
                        None => None,
                    };
                    conversions.push(conv);
                }
                let info = ExprInfo {
                    user_fn: Some(name.to_string()),
                    conversions,
                    ..ExprInfo::default()
                };
                Some((ret, info))
            }
            SymbolKind::StaticType => self.check_constructor(&sym.ty, args, span),
            _ => {
                self.diags.error(
                    codes::TYPE_MISMATCH,
                    format!("'{}' is not callable", name),
                    span.clone(),
                );
                None
            }
        }
    }

    fn check_builtin_call(
        &mut self,
        builtin: BuiltinFn,
        args: &mut [Expr],
        span: &SourceSpan,
        ret: &str,
    ) -> Option<(String, ExprInfo)> {
        let expected_args: usize = match builtin {
            BuiltinFn::Log | BuiltinFn::Warn | BuiltinFn::Error | BuiltinFn::IsValid => 1,
            BuiltinFn::RequestSerialization => 0,
            BuiltinFn::SendCustomEventDelayedSeconds => 2,
        };
        if args.len() != expected_args {
            self.diags.error(
                codes::TYPE_MISMATCH,
                format!(
                    "built-in '{}' expects {} argument(s), found {}",
                    builtin.name(),
                    expected_args,
                    args.len()
                ),
                span.clone(),
            );
            return None;
        }
        let mut conversions = vec![None; args.len()];
        for (i, arg) in args.iter_mut().enumerate() {
            let Some(arg_ty) = self.check_expr(arg) else {
                continue;
            };
            if builtin == BuiltinFn::SendCustomEventDelayedSeconds {
                let expected = if i == 0 { types::STRING } else { types::FLOAT };
                self.require_assignable(&arg_ty, expected, arg);
                if arg_ty != expected {
                    conversions[i] = self.catalog.get_implicit_conversion(&arg_ty, expected);
                }
            }
        }
        let info = ExprInfo {
            builtin: Some(builtin),
            conversions,
            ..ExprInfo::default()
        };
        Some((ret.to_string(), info))
    }

    fn check_constructor(
        &mut self,
        owner: &str,
        args: &mut [Expr],
        span: &SourceSpan,
    ) -> Option<(String, ExprInfo)> {
        let arg_types = self.check_args(args)?;
        match self.catalog.resolve_constructor(owner, &arg_types) {
            Some(sig) => {
                let conversions = self.argument_conversions(args, &arg_types, &sig.params);
                let info = ExprInfo {
                    sig: Some(sig),
                    conversions,
                    ..ExprInfo::default()
                };
                Some((owner.to_string(), info))
            }
            None => {
                self.no_matching_overload(
                    owner,
                    "new",
                    &arg_types,
                    self.catalog.get_constructor_overloads(owner),
                    span,
                );
                None
            }
        }
    }

    fn check_method_call(
        &mut self,
        owner: &str,
        member: &str,
        is_static: bool,
        args: &mut [Expr],
        span: &SourceSpan,
    ) -> Option<(String, ExprInfo)> {
        let arg_types = self.check_args(args)?;
        let sig = if is_static {
            self.catalog.resolve_static_method(owner, member, &arg_types)
        } else {
            self.catalog
                .resolve_method(owner, member, &arg_types)
                .or_else(|| {
                    // Everything answers the System.Object surface.
                    self.catalog
                        .resolve_method(types::OBJECT, member, &arg_types)
                })
        };
        let Some(sig) = sig else {
            let mut candidates = if is_static {
                self.catalog.get_static_method_overloads(owner, member)
            } else {
                self.catalog.get_method_overloads(owner, member)
            };
            if !is_static {
                candidates.extend(self.catalog.get_method_overloads(types::OBJECT, member));
            }
            self.no_matching_overload(owner, member, &arg_types, candidates, span);
            return None;
        };
        // Component queries return the type they were asked for.
        let mut ret = sig.ret.clone();
        if COMPONENT_QUERIES.contains(&member)
            && let Some(first) = args.first()
            && first.resolved.is_type
            && let Some(queried) = first.resolved.ty.clone()
        {
            ret = if sig.ret.ends_with("Array") {
                format!("{}Array", queried)
            } else {
                queried
            };
        }
        let conversions = self.argument_conversions(args, &arg_types, &sig.params);
        let info = ExprInfo {
            sig: Some(sig),
            conversions,
            ..ExprInfo::default()
        };
        Some((ret, info))
    }

    /// Check every argument, promoting type-name arguments to the reflected
    /// `SystemType` sentinel.
    fn check_args(&mut self, args: &mut [Expr]) -> Option<Vec<String>> {
        let mut arg_types = Vec::with_capacity(args.len());
        let mut ok = true;
        for arg in args.iter_mut() {
            match self.check_expr(arg) {
                Some(ty) => {
                    if arg.resolved.is_type {
                        arg_types.push(types::TYPE.to_string());
                    } else {
                        arg_types.push(ty);
                    }
                }
                None => ok = false,
            }
        }
        ok.then_some(arg_types)
    }

    fn argument_conversions(
        &self,
        args: &[Expr],
        arg_types: &[String],
        params: &[String],
    ) -> Vec<Option<ExternSignature>> {
        let mut conversions = vec![None; args.len()];
        for (i, (arg_ty, param)) in arg_types.iter().zip(params).enumerate() {
            if arg_ty != param {
                conversions[i] = self.catalog.get_implicit_conversion(arg_ty, param);
            }
        }
        conversions
    }

    fn no_matching_overload(
        &mut self,
        owner: &str,
        member: &str,
        arg_types: &[String],
        candidates: Vec<ExternSignature>,
        span: &SourceSpan,
    ) {
        let shown: Vec<String> = arg_types.iter().map(|t| surface_name(t)).collect();
        let message = format!(
            "no matching overload for '{}' on type '{}' with arguments ({})",
            member,
            surface_name(owner),
            shown.join(", ")
        );
        if candidates.is_empty() {
            self.diags.error(codes::NO_MATCHING_OVERLOAD, message, span.clone());
        } else {
            let mut hint = String::from("candidates:");
            for sig in &candidates {
                hint.push_str("\n  ");
                hint.push_str(&sig.describe());
            }
            self.diags
                .error_with_hint(codes::NO_MATCHING_OVERLOAD, message, span.clone(), hint);
        }
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn resolve_type_name(
        &mut self,
        surface: &str,
        is_array: bool,
        span: &SourceSpan,
    ) -> Option<String> {
        match resolve_surface(self.catalog, surface, is_array) {
            Some(ty) => Some(ty),
            None => {
                self.diags.error(
                    codes::TYPE_MISMATCH,
                    format!("unknown type '{}'", surface),
                    span.clone(),
                );
                None
            }
        }
    }

    /// Report `E0040` unless `from` is assignable into `to`; on a widening,
    /// annotate the conversion on the value expression.
    fn require_assignable(&mut self, from: &str, to: &str, value: &mut Expr) {
        if !is_assignable(self.catalog, from, to) {
            self.diags.error(
                codes::TYPE_MISMATCH,
                format!(
                    "cannot assign '{}' to '{}'",
                    surface_name(from),
                    surface_name(to)
                ),
                value.span.clone(),
            );
            return;
        }
        if from != to
            && let Some(conv) = self.catalog.get_implicit_conversion(from, to)
        {
            value.resolved.coerce = Some(conv);
        }
    }

    fn operator_mismatch(
        &mut self,
        glyph: &str,
        left: &str,
        right: Option<&str>,
        span: &SourceSpan,
    ) {
        let message = match right {
            Some(right) => format!(
                "operator '{}' is not defined for types '{}' and '{}'",
                glyph,
                surface_name(left),
                surface_name(right)
            ),
            None => format!(
                "operator '{}' is not defined for type '{}'",
                glyph,
                surface_name(left)
            ),
        };
        self.diags.error(codes::TYPE_MISMATCH, message, span.clone());
    }

    // ------------------------------------------------------------------
    // Recursion detection
    // ------------------------------------------------------------------

    /// Tarjan's algorithm over the user-function call graph; one `E0100` per
    /// recursive component, path included.
    fn report_recursion(&mut self) {
        let mut index_counter = 0usize;
        let mut indices: HashMap<String, usize> = HashMap::new();
        let mut lowlinks: HashMap<String, usize> = HashMap::new();
        let mut stack: Vec<String> = Vec::new();
        let mut on_stack: HashSet<String> = HashSet::new();
        let mut sccs: Vec<Vec<String>> = Vec::new();

        let order = self.fn_order.clone();
        for name in &order {
            if !indices.contains_key(name) {
                self.tarjan_visit(
                    name,
                    &mut index_counter,
                    &mut indices,
                    &mut lowlinks,
                    &mut stack,
                    &mut on_stack,
                    &mut sccs,
                );
            }
        }

        for scc in sccs {
            let recursive = scc.len() > 1
                || self
                    .call_graph
                    .get(&scc[0])
                    .is_some_and(|callees| callees.contains(&scc[0]));
            if !recursive {
                continue;
            }
            // Render the cycle in declaration order for a stable message.
            let mut members: Vec<&String> =
                order.iter().filter(|f| scc.contains(f)).collect();
            if members.is_empty() {
                continue;
            }
            members.push(members[0]);
            let path: Vec<&str> = members.iter().map(|s| s.as_str()).collect();
            let span = self
                .fn_spans
                .get(path[0])
                .cloned()
                .unwrap_or_else(|| SourceSpan::at("<unknown>", 1, 1));
            self.diags.error(
                codes::RECURSION,
                format!(
                    "recursion is not supported: call cycle {}",
                    path.join(" -> ")
                ),
                span,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn tarjan_visit(
        &self,
        node: &str,
        index_counter: &mut usize,
        indices: &mut HashMap<String, usize>,
        lowlinks: &mut HashMap<String, usize>,
        stack: &mut Vec<String>,
        on_stack: &mut HashSet<String>,
        sccs: &mut Vec<Vec<String>>,
    ) {
        let index = *index_counter;
        *index_counter += 1;
        indices.insert(node.to_string(), index);
        lowlinks.insert(node.to_string(), index);
        stack.push(node.to_string());
        on_stack.insert(node.to_string());

        if let Some(callees) = self.call_graph.get(node) {
            let mut callees: Vec<&String> = callees.iter().collect();
            callees.sort();
            for callee in callees {
                if !self.call_graph.contains_key(callee) {
                    continue;
                }
                if !indices.contains_key(callee) {
                    self.tarjan_visit(
                        callee,
                        index_counter,
                        indices,
                        lowlinks,
                        stack,
                        on_stack,
                        sccs,
                    );
                    let callee_low = lowlinks[callee];
                    let low = lowlinks.get_mut(node).unwrap();
                    *low = (*low).min(callee_low);
                } else if on_stack.contains(callee) {
                    let callee_index = indices[callee];
                    let low = lowlinks.get_mut(node).unwrap();
                    *low = (*low).min(callee_index);
                }
            }
        }

        if lowlinks[node] == indices[node] {
            let mut scc = Vec::new();
            loop {
                let popped = stack.pop().unwrap();
                on_stack.remove(&popped);
                let done = popped == node;
                scc.push(popped);
                if done {
                    break;
                }
            }
            sccs.push(scc);
        }
    }
}

fn split_array_suffix(surface: &str) -> (&str, bool) {
    match surface.strip_suffix("[]") {
        Some(base) => (base, true),
        None => (surface, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::lexer::lex;
    use crate::parser;
    use std::path::Path;

    fn analyze_source(source: &str) -> (Module, Diagnostics, Analysis) {
        let mut diags = Diagnostics::new();
        let tokens = lex(source, Path::new("test.nori"), &mut diags);
        let mut module = parser::parse(tokens, Path::new("test.nori"), &mut diags);
        assert!(!diags.has_errors(), "parse failed: {:?}", diags);
        let catalog = Catalog::builtin();
        let analysis = analyze(&mut module, &catalog, &mut diags);
        (module, diags, analysis)
    }

    fn codes_of(diags: &Diagnostics) -> Vec<&'static str> {
        diags.iter().map(|d| d.code).collect()
    }

    #[test]
    fn clean_module_analyzes_without_diagnostics() {
        let (_, diags, _) = analyze_source(
            "pub let max_score: int = 10\n\
             sync none score: int = 0\n\
             let is_game_over: bool = false\n\
             on Start { log(\"ready\") }\n\
             fn bump() { score = score + 1 }\n\
             event AddPoint { bump() if score >= max_score { send GameOver to All } }\n\
             event GameOver { is_game_over = true }\n\
             on Interact { if is_game_over { return } send AddPoint to All }",
        );
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn typo_gets_a_suggestion() {
        let (_, diags, _) =
            analyze_source("let score: int = 0 on Start { let x: int = scroe }");
        assert_eq!(codes_of(&diags), vec![codes::UNDEFINED_VARIABLE]);
        let d = diags.items().first().unwrap();
        assert!(d.message.contains("scroe"));
        assert_eq!(d.hint.as_deref(), Some("did you mean 'score'?"));
    }

    #[test]
    fn mutual_recursion_is_one_error_naming_both() {
        let (_, diags, _) = analyze_source("fn foo() { bar() } fn bar() { foo() }");
        assert_eq!(codes_of(&diags), vec![codes::RECURSION]);
        let message = &diags.items()[0].message;
        assert!(message.contains("foo") && message.contains("bar"), "{}", message);
    }

    #[test]
    fn direct_recursion_is_detected() {
        let (_, diags, _) = analyze_source("fn spin() { spin() }");
        assert_eq!(codes_of(&diags), vec![codes::RECURSION]);
    }

    #[test]
    fn non_recursive_chains_pass() {
        let (_, diags, _) = analyze_source("fn a() { b() } fn b() { c() } fn c() { }");
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn unknown_method_is_e0130() {
        let (_, diags, _) = analyze_source("on Start { transform.DoesNotExist() }");
        assert_eq!(codes_of(&diags), vec![codes::NO_MATCHING_OVERLOAD]);
    }

    #[test]
    fn overload_mismatch_lists_candidates() {
        let (_, diags, _) = analyze_source("on Start { Mathf.Clamp(1, 2) }");
        assert_eq!(codes_of(&diags), vec![codes::NO_MATCHING_OVERLOAD]);
        let hint = diags.items()[0].hint.as_deref().unwrap();
        assert!(hint.contains("Clamp"), "{}", hint);
        assert!(hint.contains("SystemInt32"), "{}", hint);
    }

    #[test]
    fn break_and_continue_outside_loops() {
        let (_, diags, _) = analyze_source(
            "on Start { break }\n\
             fn f() { continue }\n\
             fn g() { while true { break continue } }",
        );
        let codes = codes_of(&diags);
        assert_eq!(
            codes,
            vec![codes::BREAK_OUTSIDE_LOOP, codes::CONTINUE_OUTSIDE_LOOP]
        );
    }

    #[test]
    fn unknown_event_warns_w0010() {
        let (_, diags, _) = analyze_source("on Frobnicate { }");
        assert_eq!(codes_of(&diags), vec![codes::UNKNOWN_EVENT]);
        assert!(!diags.has_errors());
    }

    #[test]
    fn send_requires_a_declared_custom_event() {
        let (_, diags, _) = analyze_source("on Start { send Missing }");
        assert_eq!(codes_of(&diags), vec![codes::EVENT_DEFINITION]);
    }

    #[test]
    fn duplicate_declarations() {
        let (_, diags, _) = analyze_source(
            "let x: int = 0 let x: int = 1\n\
             fn f() { } fn f() { }\n\
             event E { } event E { }",
        );
        let codes = codes_of(&diags);
        assert_eq!(
            codes,
            vec![
                codes::UNDEFINED_VARIABLE,
                codes::EVENT_DEFINITION,
                codes::EVENT_DEFINITION
            ]
        );
    }

    #[test]
    fn operator_mismatch_spells_out_types() {
        let (_, diags, _) = analyze_source("on Start { let x: int = 1 + \"a\" }");
        assert!(codes_of(&diags).contains(&codes::TYPE_MISMATCH));
        let message = &diags.items()[0].message;
        assert!(message.contains('+'), "{}", message);
        assert!(message.contains("int") && message.contains("string"), "{}", message);
    }

    #[test]
    fn widening_annotates_operand_conversion() {
        let (module, diags, _) = analyze_source("on Start { let x: float = 1.5 + 2 }");
        assert!(diags.is_empty(), "{:?}", diags);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Local(local) = &e.body[0] else {
            panic!("expected local");
        };
        let init = local.init.as_ref().unwrap();
        assert_eq!(init.ty(), Some("SystemSingle"));
        // Right operand int -> float conversion recorded.
        assert!(init.resolved.conversions[0].is_none());
        assert!(init.resolved.conversions[1].is_some());
    }

    #[test]
    fn property_without_setter_is_not_writable() {
        let (_, diags, _) = analyze_source("on Start { localPlayer.displayName = \"x\" }");
        assert_eq!(codes_of(&diags), vec![codes::PROPERTY_NOT_WRITABLE]);
    }

    #[test]
    fn enum_members_resolve_to_values() {
        let (module, diags, _) =
            analyze_source("on Start { let t: int = NetworkEventTarget.All as int }");
        assert!(diags.is_empty(), "{:?}", diags);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Local(local) = &e.body[0] else {
            panic!("expected local");
        };
        let ExprKind::Cast { expr, .. } = &local.init.as_ref().unwrap().kind else {
            panic!("expected cast");
        };
        assert_eq!(expr.resolved.enum_value, Some(1));
    }

    #[test]
    fn missing_enum_value_is_e0132() {
        let (_, diags, _) = analyze_source("on Start { log(NetworkEventTarget.Everyone) }");
        assert_eq!(codes_of(&diags), vec![codes::ENUM_VALUE_NOT_FOUND]);
    }

    #[test]
    fn component_query_returns_the_asked_type() {
        let (module, diags, _) =
            analyze_source("on Start { let t: Transform = gameObject.GetComponent(Transform) }");
        assert!(diags.is_empty(), "{:?}", diags);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Local(local) = &e.body[0] else {
            panic!("expected local");
        };
        assert_eq!(local.init.as_ref().unwrap().ty(), Some("UnityEngineTransform"));
    }

    #[test]
    fn constructor_calls_resolve() {
        let (module, diags, _) =
            analyze_source("on Start { let v: Vector3 = Vector3(1.0, 2.0, 3.0) }");
        assert!(diags.is_empty(), "{:?}", diags);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Local(local) = &e.body[0] else {
            panic!("expected local");
        };
        let init = local.init.as_ref().unwrap();
        assert_eq!(init.ty(), Some("UnityEngineVector3"));
        let sig = init.resolved.sig.as_ref().unwrap();
        assert_eq!(sig.kind, crate::catalog::ExternKind::Constructor);
    }

    #[test]
    fn return_type_checking() {
        let (_, diags, _) = analyze_source(
            "fn good() -> int { return 1 }\n\
             fn missing() -> int { return }\n\
             fn voidy() { return 1 }\n\
             on Start { return 1 }",
        );
        let codes = codes_of(&diags);
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| *c == codes::TYPE_MISMATCH));
    }

    #[test]
    fn download_callback_binds_result() {
        let (_, diags, _) =
            analyze_source("on StringLoadSuccess { log(result.Result) }");
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn type_map_is_published_for_editor_services() {
        let (_, _, analysis) = analyze_source("let score: int = 41 on Start { log(score) }");
        assert!(
            analysis
                .type_map
                .values()
                .any(|t| t == "SystemInt32"),
            "expected an int-typed node in the map"
        );
        assert!(!analysis.scope_map.is_empty());
    }
}
