//! Symbol table and lexical scopes.
//!
//! Scopes form a tree rooted at the global scope, stored in an arena and
//! addressed by [`ScopeId`], so the analyzer can hand out a node→scope map
//! without any cyclic references. Lookup walks the parent chain. Misses can
//! ask for the nearest visible name by edit distance for "did you mean"
//! hints.

use crate::ast::SyncMode;
use crate::span::SourceSpan;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Variable {
        is_public: bool,
        sync: SyncMode,
        is_array: bool,
    },
    Function {
        /// `(name, udon_type)` per formal parameter.
        params: Vec<(String, String)>,
        /// Udon return type; `SystemVoid` for none.
        ret: String,
    },
    Parameter,
    Builtin,
    StaticType,
    EnumType,
    CustomEvent,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Catalog-qualified type: the variable's type, a function's return type,
    /// or the named type itself for static-type and enum-type symbols.
    pub ty: String,
    pub kind: SymbolKind,
    pub span: Option<SourceSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<String, Symbol>,
    parent: Option<ScopeId>,
}

/// Arena of scopes. Scopes are created during analysis and immutable
/// afterwards; editor services keep reading them through the retained ids.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope::default()],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            parent: Some(parent),
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Define a symbol in `scope`. Fails if the name already exists in that
    /// scope (shadowing an outer scope is allowed), returning the existing
    /// symbol for the duplicate diagnostic.
    pub fn define(&mut self, scope: ScopeId, symbol: Symbol) -> Result<(), Symbol> {
        let slot = &mut self.scopes[scope.0].symbols;
        if let Some(existing) = slot.get(&symbol.name) {
            return Err(existing.clone());
        }
        slot.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Walk the parent chain looking for `name`.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(sym) = s.symbols.get(name) {
                return Some(sym);
            }
            current = s.parent;
        }
        None
    }

    /// All names visible from `scope`, innermost first.
    pub fn visible_names(&self, scope: ScopeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            names.extend(s.symbols.keys().cloned());
            current = s.parent;
        }
        names
    }

    /// Nearest visible name within edit distance 3, for "did you mean" hints.
    /// Ties resolve to the lexicographically smaller candidate so hints are
    /// deterministic.
    pub fn suggest(&self, scope: ScopeId, name: &str) -> Option<String> {
        let mut best: Option<(usize, String)> = None;
        for candidate in self.visible_names(scope) {
            if candidate == name {
                continue;
            }
            let d = levenshtein(name, &candidate);
            if d > 3 {
                continue;
            }
            match &best {
                Some((bd, bn)) if (*bd, bn.as_str()) <= (d, candidate.as_str()) => {}
                _ => best = Some((d, candidate)),
            }
        }
        best.map(|(_, n)| n)
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            row[j + 1] = sub.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty: "SystemInt32".to_string(),
            kind: SymbolKind::Variable {
                is_public: false,
                sync: SyncMode::NotSynced,
                is_array: false,
            },
            span: None,
        }
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.define(root, var("score")).unwrap();
        let inner = tree.push(root);
        assert!(tree.lookup(inner, "score").is_some());
        assert!(tree.lookup(inner, "missing").is_none());
    }

    #[test]
    fn define_rejects_duplicates_in_same_scope_only() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.define(root, var("x")).unwrap();
        assert!(tree.define(root, var("x")).is_err());
        // Shadowing in a child scope is fine.
        let inner = tree.push(root);
        assert!(tree.define(inner, var("x")).is_ok());
    }

    #[test]
    fn suggestion_finds_close_names() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.define(root, var("score")).unwrap();
        tree.define(root, var("max_score")).unwrap();
        let inner = tree.push(root);
        assert_eq!(tree.suggest(inner, "scroe"), Some("score".to_string()));
        assert_eq!(tree.suggest(inner, "entirely_different"), None);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("scroe", "score"), 2);
    }
}
