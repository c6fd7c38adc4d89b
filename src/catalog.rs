//! Extern catalog: the read-only index over the host platform's whitelisted
//! foreign methods, enums, types, and implicit conversions.
//!
//! The compiler only ever *queries* a catalog; acquisition (reflection over
//! the host SDK) happens elsewhere and arrives here as a JSON document. Two
//! implementations ship in this crate: [`Catalog::builtin`], a hardcoded
//! fallback covering the common Unity/VRC surface, and [`Catalog::from_json`],
//! the data-driven loader. Both serve the same [`ExternCatalog`] contract, and
//! overload resolution is shared default-method logic so every implementation
//! tie-breaks identically.

use crate::types::is_assignable;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// What role an extern plays on its owner type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternKind {
    Getter,
    Setter,
    Operator,
    Method,
    StaticMethod,
    Constructor,
}

/// A fully mangled extern signature, the unit the VM dispatches on.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternSignature {
    /// The opaque identifier the VM uses, e.g.
    /// `UnityEngineDebug.__Log__SystemObject__SystemVoid`.
    pub extern_string: String,
    pub owner: String,
    pub name: String,
    pub kind: ExternKind,
    /// Instance externs expect the receiver pushed before the arguments.
    pub is_instance: bool,
    pub params: Vec<String>,
    /// Parallel to `params`; may be empty when the catalog had no names.
    pub param_names: Vec<String>,
    pub ret: String,
}

impl ExternSignature {
    /// Render as a human-readable candidate line for overload diagnostics.
    pub fn describe(&self) -> String {
        format!(
            "{}.{}({}) -> {}",
            self.owner,
            self.name,
            self.params.join(", "),
            self.ret
        )
    }
}

/// Build the mangled extern string: double underscores separate name,
/// parameter group, and return; single underscores separate parameter types.
pub fn mangle_extern(owner: &str, name: &str, params: &[&str], ret: &str) -> String {
    if params.is_empty() {
        format!("{}.__{}__{}", owner, name, ret)
    } else {
        format!("{}.__{}__{}__{}", owner, name, params.join("_"), ret)
    }
}

/// Result of a property query: the property type plus its accessor pair.
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub ty: String,
    pub getter: ExternSignature,
    pub setter: Option<ExternSignature>,
}

/// Enum metadata: underlying integer type and the name→value map.
#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub underlying: String,
    pub values: BTreeMap<String, i32>,
}

/// Map a binary operator glyph to its catalog method name.
pub fn binary_operator_method(glyph: &str) -> Option<&'static str> {
    Some(match glyph {
        "+" => "op_Addition",
        "-" => "op_Subtraction",
        "*" => "op_Multiplication",
        "/" => "op_Division",
        "%" => "op_Remainder",
        "==" => "op_Equality",
        "!=" => "op_Inequality",
        "<" => "op_LessThan",
        ">" => "op_GreaterThan",
        "<=" => "op_LessThanOrEqual",
        ">=" => "op_GreaterThanOrEqual",
        "&&" => "op_ConditionalAnd",
        "||" => "op_ConditionalOr",
        _ => return None,
    })
}

/// Map a unary operator glyph to its catalog method name.
pub fn unary_operator_method(glyph: &str) -> Option<&'static str> {
    Some(match glyph {
        "-" => "op_UnaryMinus",
        "!" => "op_UnaryNegation",
        _ => return None,
    })
}

/// Overload resolution shared by every catalog implementation.
///
/// Exact parameter match wins outright. Otherwise every candidate whose
/// parameters each accept the argument (per `assignable`) competes; the one
/// with the fewest widened parameters wins, and among equals the earliest in
/// declaration order. Declaration order is the candidate slice order, which
/// loaders must keep stable.
pub fn resolve_overload(
    candidates: &[ExternSignature],
    args: &[String],
    assignable: &dyn Fn(&str, &str) -> bool,
) -> Option<ExternSignature> {
    for sig in candidates {
        if sig.params.len() == args.len() && sig.params.iter().zip(args).all(|(p, a)| p == a) {
            return Some(sig.clone());
        }
    }
    let mut best: Option<(usize, &ExternSignature)> = None;
    for sig in candidates {
        if sig.params.len() != args.len() {
            continue;
        }
        if !sig.params.iter().zip(args).all(|(p, a)| assignable(a, p)) {
            continue;
        }
        let widened = sig.params.iter().zip(args).filter(|(p, a)| p != a).count();
        match best {
            Some((n, _)) if n <= widened => {}
            _ => best = Some((widened, sig)),
        }
    }
    best.map(|(_, sig)| sig.clone())
}

/// The query contract the compiler consumes. Lookup methods are required;
/// resolution (overloads, operators) is provided so that tie-break behavior
/// is identical across implementations.
pub trait ExternCatalog {
    fn is_known_type(&self, ty: &str) -> bool;
    fn is_enum_type(&self, ty: &str) -> bool;
    fn resolve_enum(&self, ty: &str) -> Option<&EnumInfo>;
    fn resolve_property(&self, owner: &str, name: &str) -> Option<PropertyInfo>;
    fn get_method_overloads(&self, owner: &str, name: &str) -> Vec<ExternSignature>;
    fn get_static_method_overloads(&self, owner: &str, name: &str) -> Vec<ExternSignature>;
    fn get_operator_overloads(&self, owner: &str, method: &str) -> Vec<ExternSignature>;
    fn get_constructor_overloads(&self, owner: &str) -> Vec<ExternSignature>;
    fn get_implicit_conversion(&self, from: &str, to: &str) -> Option<ExternSignature>;
    /// Catalog types addressable by their unqualified short name in source,
    /// as `(short_name, udon_type)` pairs.
    fn get_short_name_mappings(&self) -> Vec<(String, String)>;

    fn resolve_method(&self, owner: &str, name: &str, args: &[String]) -> Option<ExternSignature> {
        resolve_overload(&self.get_method_overloads(owner, name), args, &|a, p| {
            is_assignable(self, a, p)
        })
    }

    fn resolve_static_method(
        &self,
        owner: &str,
        name: &str,
        args: &[String],
    ) -> Option<ExternSignature> {
        resolve_overload(&self.get_static_method_overloads(owner, name), args, &|a, p| {
            is_assignable(self, a, p)
        })
    }

    fn resolve_constructor(&self, owner: &str, args: &[String]) -> Option<ExternSignature> {
        resolve_overload(&self.get_constructor_overloads(owner), args, &|a, p| {
            is_assignable(self, a, p)
        })
    }

    /// Resolve a binary operator against both operand types. Operators on
    /// enum operands live on the enum's underlying integer type.
    fn resolve_operator(&self, glyph: &str, left: &str, right: &str) -> Option<ExternSignature> {
        let method = binary_operator_method(glyph)?;
        let args = [left.to_string(), right.to_string()];
        let mut owners = Vec::new();
        for ty in [left, right] {
            let owner = self
                .resolve_enum(ty)
                .map(|e| e.underlying.clone())
                .unwrap_or_else(|| ty.to_string());
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        for owner in owners {
            let candidates = self.get_operator_overloads(&owner, method);
            if let Some(sig) =
                resolve_overload(&candidates, &args, &|a, p| is_assignable(self, a, p))
            {
                return Some(sig);
            }
        }
        None
    }

    fn resolve_unary_operator(&self, glyph: &str, operand: &str) -> Option<ExternSignature> {
        let method = unary_operator_method(glyph)?;
        let owner = self
            .resolve_enum(operand)
            .map(|e| e.underlying.clone())
            .unwrap_or_else(|| operand.to_string());
        let candidates = self.get_operator_overloads(&owner, method);
        resolve_overload(&candidates, &[operand.to_string()], &|a, p| {
            is_assignable(self, a, p)
        })
    }
}

/// Indexed catalog backing both the builtin fallback and the JSON loader.
/// Immutable once constructed; safe to share by reference across
/// compilations.
#[derive(Debug, Default)]
pub struct Catalog {
    types: HashSet<String>,
    enums: HashMap<String, EnumInfo>,
    short_names: Vec<(String, String)>,
    methods: HashMap<(String, String), Vec<ExternSignature>>,
    statics: HashMap<(String, String), Vec<ExternSignature>>,
    operators: HashMap<(String, String), Vec<ExternSignature>>,
    ctors: HashMap<String, Vec<ExternSignature>>,
    getters: HashMap<(String, String), ExternSignature>,
    setters: HashMap<(String, String), ExternSignature>,
    conversions: HashMap<(String, String), ExternSignature>,
}

impl Catalog {
    fn add(&mut self, sig: ExternSignature) {
        match sig.kind {
            ExternKind::Method => self
                .methods
                .entry((sig.owner.clone(), sig.name.clone()))
                .or_default()
                .push(sig),
            ExternKind::StaticMethod => {
                // Single-parameter SystemConvert routines double as the
                // implicit-conversion table.
                if sig.owner == "SystemConvert" && sig.params.len() == 1 {
                    self.conversions
                        .insert((sig.params[0].clone(), sig.ret.clone()), sig.clone());
                }
                self.statics
                    .entry((sig.owner.clone(), sig.name.clone()))
                    .or_default()
                    .push(sig)
            }
            ExternKind::Operator => self
                .operators
                .entry((sig.owner.clone(), sig.name.clone()))
                .or_default()
                .push(sig),
            ExternKind::Constructor => self.ctors.entry(sig.owner.clone()).or_default().push(sig),
            ExternKind::Getter => {
                let prop = sig.name.strip_prefix("get_").unwrap_or(&sig.name).to_string();
                self.getters.insert((sig.owner.clone(), prop), sig);
            }
            ExternKind::Setter => {
                let prop = sig.name.strip_prefix("set_").unwrap_or(&sig.name).to_string();
                self.setters.insert((sig.owner.clone(), prop), sig);
            }
        }
    }

    fn add_type(&mut self, udon: &str, short: &str) {
        self.types.insert(udon.to_string());
        if !short.is_empty() {
            self.short_names.push((short.to_string(), udon.to_string()));
        }
    }

    fn add_enum(&mut self, udon: &str, short: &str, underlying: &str, values: &[(&str, i32)]) {
        self.add_type(udon, short);
        self.enums.insert(
            udon.to_string(),
            EnumInfo {
                underlying: underlying.to_string(),
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            },
        );
    }

    /// Load a catalog from the JSON document format (see the `externs`,
    /// `enums`, and `types` arrays in the project documentation).
    pub fn from_json(text: &str) -> Result<Catalog, String> {
        let doc: CatalogDoc =
            serde_json::from_str(text).map_err(|e| format!("failed to parse catalog: {}", e))?;
        let mut catalog = Catalog::default();
        for entry in doc.types {
            if entry.is_enum && !doc.enums.iter().any(|e| e.udon_type == entry.udon_type) {
                return Err(format!(
                    "catalog type '{}' is flagged isEnum but has no enums entry",
                    entry.udon_type
                ));
            }
            catalog.add_type(&entry.udon_type, &entry.source_type);
        }
        for entry in doc.enums {
            catalog.types.insert(entry.udon_type.clone());
            catalog.enums.insert(
                entry.udon_type,
                EnumInfo {
                    underlying: entry.underlying_type,
                    values: entry.values,
                },
            );
        }
        for entry in doc.externs {
            let kind = match entry.kind.as_str() {
                "getter" => ExternKind::Getter,
                "setter" => ExternKind::Setter,
                "operator" => ExternKind::Operator,
                "method" => ExternKind::Method,
                "static_method" => ExternKind::StaticMethod,
                "constructor" => ExternKind::Constructor,
                other => return Err(format!("unknown extern kind '{}'", other)),
            };
            catalog.add(ExternSignature {
                extern_string: entry.extern_string,
                owner: entry.owner,
                name: entry.method,
                kind,
                is_instance: entry.instance,
                params: entry.parameters,
                param_names: entry.parameter_names,
                ret: entry.ret,
            });
        }
        Ok(catalog)
    }

    /// Load a catalog document from disk.
    pub fn from_file(path: &Path) -> Result<Catalog, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read catalog '{}': {}", path.display(), e))?;
        Catalog::from_json(&text)
    }

    /// The hardcoded fallback catalog: enough of the Unity/VRC surface for
    /// real programs and for tests that should not depend on a catalog file.
    pub fn builtin() -> Catalog {
        let mut c = Catalog::default();

        for (udon, short) in [
            ("SystemInt32", "int"),
            ("SystemInt64", ""),
            ("SystemUInt32", ""),
            ("SystemSingle", "float"),
            ("SystemDouble", "double"),
            ("SystemBoolean", "bool"),
            ("SystemString", "string"),
            ("SystemObject", "object"),
            ("SystemVoid", ""),
            ("SystemType", ""),
            ("SystemConvert", ""),
            ("UnityEngineVector3", "Vector3"),
            ("UnityEngineQuaternion", "Quaternion"),
            ("UnityEngineTransform", "Transform"),
            ("UnityEngineGameObject", "GameObject"),
            ("UnityEngineComponent", "Component"),
            ("UnityEngineDebug", "Debug"),
            ("UnityEngineMathf", "Mathf"),
            ("UnityEngineTime", "Time"),
            ("VRCUdonUdonBehaviour", "UdonBehaviour"),
            ("VRCUdonCommonInterfacesIUdonEventReceiver", ""),
            ("VRCSDKBaseVRCPlayerApi", "VRCPlayerApi"),
            ("VRCSDKBaseNetworking", "Networking"),
            ("VRCSDKBaseUtilities", "Utilities"),
            ("VRCSDK3StringLoadingIVRCStringDownload", ""),
            ("VRCSDK3ImageIVRCImageDownload", ""),
        ] {
            // Primitive surface names are handled by the type system's own
            // builtin map; short names here seed static-type symbols only.
            let as_symbol = if short.chars().next().is_some_and(|ch| ch.is_uppercase()) {
                short
            } else {
                ""
            };
            c.add_type(udon, as_symbol);
        }

        c.add_enum(
            "VRCUdonCommonEnumsNetworkEventTarget",
            "NetworkEventTarget",
            "SystemInt32",
            &[("Owner", 0), ("All", 1)],
        );

        let sig = |owner: &str,
                   name: &str,
                   kind: ExternKind,
                   instance: bool,
                   params: &[&str],
                   ret: &str| ExternSignature {
            extern_string: mangle_extern(owner, name, params, ret),
            owner: owner.to_string(),
            name: name.to_string(),
            kind,
            is_instance: instance,
            params: params.iter().map(|p| p.to_string()).collect(),
            param_names: Vec::new(),
            ret: ret.to_string(),
        };

        use ExternKind::*;

        // Integer, float, and double arithmetic and comparison operators.
        for num in ["SystemInt32", "SystemSingle", "SystemDouble"] {
            for op in ["op_Addition", "op_Subtraction", "op_Multiplication", "op_Division", "op_Remainder"] {
                c.add(sig(num, op, Operator, false, &[num, num], num));
            }
            for op in [
                "op_Equality",
                "op_Inequality",
                "op_LessThan",
                "op_GreaterThan",
                "op_LessThanOrEqual",
                "op_GreaterThanOrEqual",
            ] {
                c.add(sig(num, op, Operator, false, &[num, num], "SystemBoolean"));
            }
            c.add(sig(num, "op_UnaryMinus", Operator, false, &[num], num));
        }

        // Boolean logic.
        for op in ["op_ConditionalAnd", "op_ConditionalOr", "op_Equality", "op_Inequality"] {
            c.add(sig(
                "SystemBoolean",
                op,
                Operator,
                false,
                &["SystemBoolean", "SystemBoolean"],
                "SystemBoolean",
            ));
        }
        c.add(sig(
            "SystemBoolean",
            "op_UnaryNegation",
            Operator,
            false,
            &["SystemBoolean"],
            "SystemBoolean",
        ));

        // String concatenation is spelled Concat in the whitelist; it still
        // answers for the `+` operator.
        c.add(ExternSignature {
            extern_string: mangle_extern(
                "SystemString",
                "Concat",
                &["SystemString", "SystemString"],
                "SystemString",
            ),
            owner: "SystemString".to_string(),
            name: "op_Addition".to_string(),
            kind: Operator,
            is_instance: false,
            params: vec!["SystemString".to_string(), "SystemString".to_string()],
            param_names: Vec::new(),
            ret: "SystemString".to_string(),
        });
        for op in ["op_Equality", "op_Inequality"] {
            c.add(sig(
                "SystemString",
                op,
                Operator,
                false,
                &["SystemString", "SystemString"],
                "SystemBoolean",
            ));
        }
        c.add(sig("SystemString", "get_Length", Getter, true, &[], "SystemInt32"));

        // Widening conversions; SystemConvert statics double as the implicit
        // conversion table.
        c.add(sig("SystemConvert", "ToSingle", StaticMethod, false, &["SystemInt32"], "SystemSingle"));
        c.add(sig("SystemConvert", "ToDouble", StaticMethod, false, &["SystemInt32"], "SystemDouble"));
        c.add(sig("SystemConvert", "ToDouble", StaticMethod, false, &["SystemSingle"], "SystemDouble"));
        c.add(sig("SystemConvert", "ToInt32", StaticMethod, false, &["SystemSingle"], "SystemInt32"));

        // The universal ToString every value answers.
        c.add(sig("SystemObject", "ToString", Method, true, &[], "SystemString"));
        c.add(sig("SystemObject", "Equals", Method, true, &["SystemObject"], "SystemBoolean"));
        // Reference equality backstop, so null checks work on any type.
        for op in ["op_Equality", "op_Inequality"] {
            c.add(sig(
                "SystemObject",
                op,
                Operator,
                false,
                &["SystemObject", "SystemObject"],
                "SystemBoolean",
            ));
        }

        // Debug logging.
        for name in ["Log", "LogWarning", "LogError"] {
            c.add(sig("UnityEngineDebug", name, StaticMethod, false, &["SystemObject"], "SystemVoid"));
        }

        // Mathf: overload families exercising exact-vs-widening resolution.
        for name in ["Abs", "Min", "Max"] {
            let (i, f) = ("SystemInt32", "SystemSingle");
            if name == "Abs" {
                c.add(sig("UnityEngineMathf", name, StaticMethod, false, &[i], i));
                c.add(sig("UnityEngineMathf", name, StaticMethod, false, &[f], f));
            } else {
                c.add(sig("UnityEngineMathf", name, StaticMethod, false, &[i, i], i));
                c.add(sig("UnityEngineMathf", name, StaticMethod, false, &[f, f], f));
            }
        }
        c.add(sig(
            "UnityEngineMathf",
            "Clamp",
            StaticMethod,
            false,
            &["SystemInt32", "SystemInt32", "SystemInt32"],
            "SystemInt32",
        ));
        c.add(sig(
            "UnityEngineMathf",
            "Clamp",
            StaticMethod,
            false,
            &["SystemSingle", "SystemSingle", "SystemSingle"],
            "SystemSingle",
        ));
        c.add(sig("UnityEngineMathf", "Floor", StaticMethod, false, &["SystemSingle"], "SystemSingle"));
        c.add(sig("UnityEngineMathf", "Sqrt", StaticMethod, false, &["SystemSingle"], "SystemSingle"));

        // Time.
        c.add(sig("UnityEngineTime", "get_deltaTime", Getter, false, &[], "SystemSingle"));
        c.add(sig("UnityEngineTime", "get_time", Getter, false, &[], "SystemSingle"));

        // Vector3.
        let v3 = "UnityEngineVector3";
        c.add(sig(v3, "ctor", Constructor, false, &["SystemSingle", "SystemSingle", "SystemSingle"], v3));
        for name in ["get_zero", "get_one", "get_up", "get_forward"] {
            c.add(sig(v3, name, Getter, false, &[], v3));
        }
        c.add(sig(v3, "get_magnitude", Getter, true, &[], "SystemSingle"));
        c.add(sig(v3, "get_normalized", Getter, true, &[], v3));
        c.add(sig(v3, "Distance", StaticMethod, false, &[v3, v3], "SystemSingle"));
        c.add(sig(v3, "op_Addition", Operator, false, &[v3, v3], v3));
        c.add(sig(v3, "op_Subtraction", Operator, false, &[v3, v3], v3));
        c.add(sig(v3, "op_Multiply", Operator, false, &[v3, "SystemSingle"], v3));
        c.add(sig(v3, "op_Equality", Operator, false, &[v3, v3], "SystemBoolean"));

        // Transform.
        let tf = "UnityEngineTransform";
        for (prop, ty) in [
            ("position", v3),
            ("localPosition", v3),
            ("localScale", v3),
        ] {
            c.add(sig(tf, &format!("get_{}", prop), Getter, true, &[], ty));
            c.add(sig(tf, &format!("set_{}", prop), Setter, true, &[ty], "SystemVoid"));
        }
        c.add(sig(tf, "get_rotation", Getter, true, &[], "UnityEngineQuaternion"));
        c.add(sig(tf, "Translate", Method, true, &[v3], "SystemVoid"));
        c.add(sig(tf, "LookAt", Method, true, &[tf], "SystemVoid"));

        // Component / GameObject, including the component-query family whose
        // return type the analyzer narrows to the queried type.
        let comp = "UnityEngineComponent";
        let go = "UnityEngineGameObject";
        for owner in [comp, go] {
            c.add(sig(owner, "get_transform", Getter, true, &[], tf));
            c.add(sig(owner, "get_gameObject", Getter, true, &[], go));
            c.add(sig(owner, "get_name", Getter, true, &[], "SystemString"));
            for name in [
                "GetComponent",
                "GetComponentInChildren",
                "GetComponentInParent",
            ] {
                c.add(sig(owner, name, Method, true, &["SystemType"], comp));
            }
            for name in ["GetComponents", "GetComponentsInChildren", "GetComponentsInParent"] {
                c.add(sig(owner, name, Method, true, &["SystemType"], "UnityEngineComponentArray"));
            }
        }
        c.add(sig(go, "SetActive", Method, true, &["SystemBoolean"], "SystemVoid"));
        c.add(sig(go, "get_activeSelf", Getter, true, &[], "SystemBoolean"));

        // UdonBehaviour event dispatch.
        let recv = "VRCUdonCommonInterfacesIUdonEventReceiver";
        c.add(sig(recv, "SendCustomEvent", Method, true, &["SystemString"], "SystemVoid"));
        c.add(sig(
            recv,
            "SendCustomNetworkEvent",
            Method,
            true,
            &["VRCUdonCommonEnumsNetworkEventTarget", "SystemString"],
            "SystemVoid",
        ));
        c.add(sig(
            recv,
            "SendCustomEventDelayedSeconds",
            Method,
            true,
            &["SystemString", "SystemSingle"],
            "SystemVoid",
        ));
        c.add(sig(recv, "RequestSerialization", Method, true, &[], "SystemVoid"));

        // Networking and players.
        let player = "VRCSDKBaseVRCPlayerApi";
        c.add(sig("VRCSDKBaseNetworking", "get_LocalPlayer", Getter, false, &[], player));
        c.add(sig("VRCSDKBaseNetworking", "IsOwner", StaticMethod, false, &[player, go], "SystemBoolean"));
        c.add(sig("VRCSDKBaseNetworking", "SetOwner", StaticMethod, false, &[player, go], "SystemVoid"));
        c.add(sig("VRCSDKBaseUtilities", "IsValid", StaticMethod, false, &["SystemObject"], "SystemBoolean"));
        c.add(sig(player, "get_displayName", Getter, true, &[], "SystemString"));
        c.add(sig(player, "get_isLocal", Getter, true, &[], "SystemBoolean"));
        c.add(sig(player, "get_isMaster", Getter, true, &[], "SystemBoolean"));

        // Download results bound by the implicit-parameter event table.
        c.add(sig("VRCSDK3StringLoadingIVRCStringDownload", "get_Result", Getter, true, &[], "SystemString"));
        c.add(sig("VRCSDK3StringLoadingIVRCStringDownload", "get_Error", Getter, true, &[], "SystemString"));

        c
    }
}

impl ExternCatalog for Catalog {
    fn is_known_type(&self, ty: &str) -> bool {
        if self.types.contains(ty) {
            return true;
        }
        ty.strip_suffix("Array")
            .is_some_and(|elem| self.types.contains(elem))
    }

    fn is_enum_type(&self, ty: &str) -> bool {
        self.enums.contains_key(ty)
    }

    fn resolve_enum(&self, ty: &str) -> Option<&EnumInfo> {
        self.enums.get(ty)
    }

    fn resolve_property(&self, owner: &str, name: &str) -> Option<PropertyInfo> {
        let key = (owner.to_string(), name.to_string());
        let getter = self.getters.get(&key)?.clone();
        Some(PropertyInfo {
            ty: getter.ret.clone(),
            setter: self.setters.get(&key).cloned(),
            getter,
        })
    }

    fn get_method_overloads(&self, owner: &str, name: &str) -> Vec<ExternSignature> {
        self.methods
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn get_static_method_overloads(&self, owner: &str, name: &str) -> Vec<ExternSignature> {
        self.statics
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn get_operator_overloads(&self, owner: &str, method: &str) -> Vec<ExternSignature> {
        self.operators
            .get(&(owner.to_string(), method.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn get_constructor_overloads(&self, owner: &str) -> Vec<ExternSignature> {
        self.ctors.get(owner).cloned().unwrap_or_default()
    }

    fn get_implicit_conversion(&self, from: &str, to: &str) -> Option<ExternSignature> {
        self.conversions
            .get(&(from.to_string(), to.to_string()))
            .cloned()
    }

    fn get_short_name_mappings(&self) -> Vec<(String, String)> {
        self.short_names.clone()
    }
}

#[derive(Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    externs: Vec<ExternEntry>,
    #[serde(default)]
    enums: Vec<EnumEntry>,
    #[serde(default)]
    types: Vec<TypeEntry>,
}

#[derive(Deserialize)]
struct ExternEntry {
    #[serde(rename = "extern")]
    extern_string: String,
    owner: String,
    method: String,
    kind: String,
    #[serde(default)]
    instance: bool,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default, rename = "parameterNames")]
    parameter_names: Vec<String>,
    #[serde(rename = "return")]
    ret: String,
}

#[derive(Deserialize)]
struct EnumEntry {
    #[serde(rename = "udonType")]
    udon_type: String,
    #[serde(rename = "underlyingType")]
    underlying_type: String,
    values: BTreeMap<String, i32>,
}

#[derive(Deserialize)]
struct TypeEntry {
    #[serde(rename = "udonType")]
    udon_type: String,
    #[serde(rename = "sourceType")]
    source_type: String,
    #[serde(default, rename = "baseType")]
    #[allow(dead_code)]
    base_type: Option<String>,
    #[serde(default, rename = "isEnum")]
    is_enum: bool,
}
