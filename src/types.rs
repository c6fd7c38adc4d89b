//! Type-name mapping and assignability.
//!
//! Nori surface types (`int`, `Vector3`, `float[]`) map to catalog-qualified
//! Udon identifiers (`SystemInt32`, `UnityEngineVector3`, `SystemSingleArray`)
//! and back. Assignability is the single widening relation every phase agrees
//! on: identity, the universal top type, numeric widening, and enum/int
//! interop.

use crate::catalog::ExternCatalog;

pub const INT: &str = "SystemInt32";
pub const FLOAT: &str = "SystemSingle";
pub const DOUBLE: &str = "SystemDouble";
pub const BOOL: &str = "SystemBoolean";
pub const STRING: &str = "SystemString";
pub const OBJECT: &str = "SystemObject";
pub const VOID: &str = "SystemVoid";
pub const TYPE: &str = "SystemType";
/// Integer type of return-address cells and laundered constants.
pub const ADDRESS: &str = "SystemUInt32";

/// Built-in surface-name table. Catalog short names extend this at analysis
/// time; these are the names that exist with no catalog at all.
const BUILTIN_SURFACE: &[(&str, &str)] = &[
    ("int", INT),
    ("float", FLOAT),
    ("double", DOUBLE),
    ("bool", BOOL),
    ("string", STRING),
    ("object", OBJECT),
    ("void", VOID),
    ("Vector3", "UnityEngineVector3"),
    ("Quaternion", "UnityEngineQuaternion"),
    ("Transform", "UnityEngineTransform"),
    ("GameObject", "UnityEngineGameObject"),
    ("Component", "UnityEngineComponent"),
];

/// Namespace prefixes tried, in order, when a surface name is neither built in
/// nor already catalog-qualified.
const NAMESPACE_GUESSES: &[&str] = &["UnityEngine", "System", "VRCSDKBase", "VRCSDK3", "VRCUdonCommon", "TMPro"];

/// Map a surface type name to its catalog-qualified form. Array surface types
/// append `Array` to the mapped element type.
pub fn resolve_surface<C: ExternCatalog + ?Sized>(
    catalog: &C,
    name: &str,
    is_array: bool,
) -> Option<String> {
    let base = resolve_surface_base(catalog, name)?;
    if is_array {
        Some(format!("{}Array", base))
    } else {
        Some(base)
    }
}

fn resolve_surface_base<C: ExternCatalog + ?Sized>(catalog: &C, name: &str) -> Option<String> {
    if let Some((_, udon)) = BUILTIN_SURFACE.iter().find(|(s, _)| *s == name) {
        return Some((*udon).to_string());
    }
    if catalog.is_known_type(name) {
        return Some(name.to_string());
    }
    for prefix in NAMESPACE_GUESSES {
        let guess = format!("{}{}", prefix, name);
        if catalog.is_known_type(&guess) {
            return Some(guess);
        }
    }
    None
}

/// Map a catalog-qualified type back to its surface spelling for diagnostics.
/// Unknown types render as themselves; arrays render as `T[]`.
pub fn surface_name(udon: &str) -> String {
    if let Some(elem) = udon.strip_suffix("Array") {
        return format!("{}[]", surface_name(elem));
    }
    BUILTIN_SURFACE
        .iter()
        .find(|(_, u)| *u == udon)
        .map(|(s, _)| (*s).to_string())
        .unwrap_or_else(|| udon.to_string())
}

/// Element type of an array type, if `ty` is one.
pub fn element_type(ty: &str) -> Option<&str> {
    ty.strip_suffix("Array")
}

/// Assignability from `from` into `to`: identity, the universal top type,
/// numeric widening, or enum/int interop against the enum's underlying type.
pub fn is_assignable<C: ExternCatalog + ?Sized>(catalog: &C, from: &str, to: &str) -> bool {
    if from == to || to == OBJECT {
        return true;
    }
    if matches!((from, to), (INT, FLOAT) | (INT, DOUBLE) | (FLOAT, DOUBLE)) {
        return true;
    }
    if let Some(info) = catalog.resolve_enum(from)
        && info.underlying == to
    {
        return true;
    }
    if let Some(info) = catalog.resolve_enum(to)
        && info.underlying == from
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn primitive_mapping_is_bijective() {
        let catalog = Catalog::builtin();
        for surface in ["int", "float", "double", "bool", "string", "object"] {
            let udon = resolve_surface(&catalog, surface, false).unwrap();
            assert_eq!(surface_name(&udon), surface, "round trip through {}", udon);
        }
    }

    #[test]
    fn arrays_append_the_array_suffix() {
        let catalog = Catalog::builtin();
        assert_eq!(
            resolve_surface(&catalog, "int", true).unwrap(),
            "SystemInt32Array"
        );
        assert_eq!(surface_name("SystemInt32Array"), "int[]");
        assert_eq!(element_type("SystemInt32Array"), Some("SystemInt32"));
        assert_eq!(element_type("SystemInt32"), None);
    }

    #[test]
    fn unqualified_names_fall_back_to_namespace_guesses() {
        let catalog = Catalog::builtin();
        assert_eq!(
            resolve_surface(&catalog, "Mathf", false).unwrap(),
            "UnityEngineMathf"
        );
        assert_eq!(
            resolve_surface(&catalog, "UnityEngineDebug", false).unwrap(),
            "UnityEngineDebug"
        );
        assert!(resolve_surface(&catalog, "Frobnicator", false).is_none());
    }

    #[test]
    fn widening_and_top_type() {
        let catalog = Catalog::builtin();
        assert!(is_assignable(&catalog, INT, INT));
        assert!(is_assignable(&catalog, INT, FLOAT));
        assert!(is_assignable(&catalog, INT, DOUBLE));
        assert!(is_assignable(&catalog, FLOAT, DOUBLE));
        assert!(is_assignable(&catalog, STRING, OBJECT));
        assert!(!is_assignable(&catalog, FLOAT, INT));
        assert!(!is_assignable(&catalog, OBJECT, STRING));
    }

    #[test]
    fn enum_int_interop() {
        let catalog = Catalog::builtin();
        let target = "VRCUdonCommonEnumsNetworkEventTarget";
        assert!(is_assignable(&catalog, target, INT));
        assert!(is_assignable(&catalog, INT, target));
        assert!(!is_assignable(&catalog, target, FLOAT));
    }
}
