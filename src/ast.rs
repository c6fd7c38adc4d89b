//! Abstract syntax tree for Nori.
//!
//! The tree is built once by the parser and annotated in place by the
//! semantic analyzer: resolved Udon types, resolved extern signatures, and
//! per-operand implicit conversions are written into the `resolved` fields and
//! read back by the lowerer. Downstream phases never rebuild the tree.

use crate::catalog::ExternSignature;
use crate::span::SourceSpan;

/// Per-cell replication policy understood by the host's networking layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    NotSynced,
    None,
    Linear,
    Smooth,
}

impl SyncMode {
    /// The lowercase keyword used in `.sync` directives.
    pub fn assembly_name(self) -> Option<&'static str> {
        match self {
            SyncMode::NotSynced => None,
            SyncMode::None => Some("none"),
            SyncMode::Linear => Some("linear"),
            SyncMode::Smooth => Some("smooth"),
        }
    }

    pub fn from_ident(name: &str) -> Option<Self> {
        match name {
            "none" => Some(SyncMode::None),
            "linear" => Some(SyncMode::Linear),
            "smooth" => Some(SyncMode::Smooth),
            _ => None,
        }
    }
}

/// A parsed translation unit. The declaration list may be empty.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Variable(VarDecl),
    Function(FnDecl),
    /// `on EventName { ... }` — handler for a host-dispatched event.
    EventHandler(EventDecl),
    /// `event Name { ... }` — user-defined custom event.
    CustomEvent(CustomEventDecl),
}

impl Decl {
    pub fn span(&self) -> &SourceSpan {
        match self {
            Decl::Variable(v) => &v.span,
            Decl::Function(f) => &f.span,
            Decl::EventHandler(e) => &e.span,
            Decl::CustomEvent(e) => &e.span,
        }
    }
}

/// Top-level `let` (optionally `pub` / `sync <mode>`).
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    /// Surface type name as written, without the array suffix.
    pub ty: String,
    pub is_array: bool,
    pub is_public: bool,
    pub sync: SyncMode,
    pub init: Option<Expr>,
    pub span: SourceSpan,
    /// Catalog-qualified type, written by the analyzer.
    pub resolved_ty: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: String,
    pub is_array: bool,
    pub span: SourceSpan,
    pub resolved_ty: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// Surface return type; `None` means void.
    pub return_ty: Option<String>,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
    pub resolved_ret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct CustomEventDecl {
    pub name: String,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

/// Network broadcast target of a `send ... to ...` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTarget {
    All,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The underlying binary operator of a compound assignment.
    pub fn binary_op(self) -> Option<BinOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Sub => Some(BinOp::Sub),
            AssignOp::Mul => Some(BinOp::Mul),
            AssignOp::Div => Some(BinOp::Div),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local(LocalDecl),
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
        span: SourceSpan,
        /// Extern for the binary operator of a compound assignment.
        op_sig: Option<ExternSignature>,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        span: SourceSpan,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: SourceSpan,
    },
    ForRange {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
        span: SourceSpan,
    },
    ForEach {
        var: String,
        collection: Expr,
        body: Vec<Stmt>,
        span: SourceSpan,
    },
    Return {
        value: Option<Expr>,
        span: SourceSpan,
    },
    Break {
        span: SourceSpan,
    },
    Continue {
        span: SourceSpan,
    },
    Send {
        event: String,
        target: Option<SendTarget>,
        span: SourceSpan,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> &SourceSpan {
        match self {
            Stmt::Local(l) => &l.span,
            Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::ForRange { span, .. }
            | Stmt::ForEach { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Send { span, .. } => span,
            Stmt::Expr(e) => &e.span,
        }
    }
}

/// `let name: type = expr` inside a body.
#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub ty: String,
    pub is_array: bool,
    pub init: Option<Expr>,
    pub span: SourceSpan,
    pub resolved_ty: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinOp {
    /// Source glyph, used in operator diagnostics.
    pub fn glyph(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn glyph(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

/// A segment of an interpolated string literal.
#[derive(Debug, Clone)]
pub enum StrPart {
    Text(String),
    Expr(Box<Expr>),
}

/// Built-in functions seeded into the global scope by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFn {
    Log,
    Warn,
    Error,
    RequestSerialization,
    IsValid,
    SendCustomEventDelayedSeconds,
}

impl BuiltinFn {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFn::Log => "log",
            BuiltinFn::Warn => "warn",
            BuiltinFn::Error => "error",
            BuiltinFn::RequestSerialization => "RequestSerialization",
            BuiltinFn::IsValid => "IsValid",
            BuiltinFn::SendCustomEventDelayedSeconds => "SendCustomEventDelayedSeconds",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "log" => BuiltinFn::Log,
            "warn" => BuiltinFn::Warn,
            "error" => BuiltinFn::Error,
            "RequestSerialization" => BuiltinFn::RequestSerialization,
            "IsValid" => BuiltinFn::IsValid,
            "SendCustomEventDelayedSeconds" => BuiltinFn::SendCustomEventDelayedSeconds,
            _ => return None,
        })
    }
}

/// Annotations written by the semantic analyzer, read by the lowerer.
#[derive(Debug, Clone, Default)]
pub struct ExprInfo {
    /// Catalog-qualified result type of the expression.
    pub ty: Option<String>,
    /// Resolved extern for a call, operator, getter, or constructor.
    pub sig: Option<ExternSignature>,
    /// Setter half of a property, present only on writable member accesses.
    pub setter: Option<ExternSignature>,
    /// Per-operand (or per-argument) implicit conversion externs, indexed the
    /// same way as the operand/argument list. `None` means no conversion.
    pub conversions: Vec<Option<ExternSignature>>,
    /// Conversion applied to this expression's own result, e.g. an `int`
    /// initializer flowing into a `float` cell, or an `as` cast.
    pub coerce: Option<ExternSignature>,
    /// Integer value of an enum member access.
    pub enum_value: Option<i32>,
    /// The name resolves to a static-type or enum-type symbol.
    pub is_type: bool,
    /// Index expression on a type name: array construction, not a read.
    pub array_ctor: bool,
    /// Call target is one of the fixed built-in functions.
    pub builtin: Option<BuiltinFn>,
    /// Call target is a user function of this name.
    pub user_fn: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
    pub resolved: ExprInfo,
}

impl Expr {
    pub fn new(kind: ExprKind, span: SourceSpan) -> Self {
        Expr {
            kind,
            span,
            resolved: ExprInfo::default(),
        }
    }

    /// Resolved Udon type, if the analyzer assigned one.
    pub fn ty(&self) -> Option<&str> {
        self.resolved.ty.as_deref()
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    Interp(Vec<StrPart>),
    Name(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    ArrayLit(Vec<Expr>),
    Cast {
        expr: Box<Expr>,
        ty: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_mode_assembly_names() {
        assert_eq!(SyncMode::NotSynced.assembly_name(), None);
        assert_eq!(SyncMode::None.assembly_name(), Some("none"));
        assert_eq!(SyncMode::Linear.assembly_name(), Some("linear"));
        assert_eq!(SyncMode::Smooth.assembly_name(), Some("smooth"));
    }

    #[test]
    fn compound_assign_maps_to_binary_op() {
        assert_eq!(AssignOp::Add.binary_op(), Some(BinOp::Add));
        assert_eq!(AssignOp::Div.binary_op(), Some(BinOp::Div));
        assert_eq!(AssignOp::Assign.binary_op(), None);
    }
}
