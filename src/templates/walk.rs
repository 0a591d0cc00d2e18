//! Submodel element tree walk shared by template indexing and instance
//! matching.
//!
//! One traversal, two modes. `Required` keeps only paths whose whole
//! ancestry is mandatory; `Present` keeps every identified node.

use serde_json::Value as Json;
use std::collections::BTreeSet;

/// Joins path segments in both accumulators.
pub const PATH_SEPARATOR: &str = "/";

/// Fields whose array entries are nested elements.
const ELEMENT_LISTS: &[&str] = &["submodelElements", "value", "statements", "annotations"];

/// Operation variable lists; each entry wraps its element under `value`.
const VARIABLE_LISTS: &[&str] = &["inputVariables", "outputVariables", "inoutputVariables"];

/// Occurrence fields that may pin a minimum directly on the element.
const MIN_OCCURS_FIELDS: &[&str] = &["minOccurs", "minOccurrence"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Template indexing: skip optional subtrees.
    Required,
    /// Instance matching: record whatever exists.
    Present,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathSets {
    pub id_short: BTreeSet<String>,
    pub semantic: BTreeSet<String>,
}

impl PathSets {
    /// A path is present if either accumulator produced it.
    pub fn contains(&self, path: &str) -> bool {
        self.id_short.contains(path) || self.semantic.contains(path)
    }
}

/// Normalize a semantic identifier given as a bare string, `{value}`, or a
/// reference `{keys: [{value}, ..]}`.
///
/// A blank `value` falls through to `keys`. Only the first key carrying a
/// string `value` is considered; if that string is blank the id is absent.
pub fn normalize_semantic_id(raw: &Json) -> Option<String> {
    match raw {
        Json::String(s) => non_empty(s),
        Json::Object(obj) => {
            if let Some(s) = obj.get("value").and_then(Json::as_str).and_then(non_empty) {
                return Some(s);
            }
            obj.get("keys")?
                .as_array()?
                .iter()
                .find_map(|k| k.get("value").and_then(Json::as_str))
                .and_then(non_empty)
        }
        _ => None,
    }
}

/// Semantic identifier of a submodel or element, if any.
pub fn semantic_id_of(node: &Json) -> Option<String> {
    node.get("semanticId").and_then(normalize_semantic_id)
}

pub fn id_short_of(node: &Json) -> Option<&str> {
    node.get("idShort")
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Top-level elements of a submodel.
pub fn submodel_elements(submodel: &Json) -> &[Json] {
    submodel
        .get("submodelElements")
        .and_then(Json::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Walk `elements` and collect idShort and semantic paths per `mode`.
pub fn collect_paths(elements: &[Json], mode: WalkMode) -> PathSets {
    let mut out = PathSets::default();
    for el in elements {
        visit(el, None, None, true, mode, &mut out);
    }
    out
}

fn visit(
    node: &Json,
    id_prefix: Option<&str>,
    sem_prefix: Option<&str>,
    parent_required: bool,
    mode: WalkMode,
    out: &mut PathSets,
) {
    let required = match mode {
        WalkMode::Required => parent_required && !is_optional(node),
        WalkMode::Present => true,
    };

    let id_path = match id_short_of(node) {
        Some(id) => {
            let p = join(id_prefix, id);
            if required {
                out.id_short.insert(p.clone());
            }
            Some(p)
        }
        None => id_prefix.map(String::from),
    };
    let sem_path = match semantic_id_of(node) {
        Some(sid) => {
            let p = join(sem_prefix, &sid);
            if required {
                out.semantic.insert(p.clone());
            }
            Some(p)
        }
        None => sem_prefix.map(String::from),
    };

    for child in children(node) {
        visit(
            child,
            id_path.as_deref(),
            sem_path.as_deref(),
            required,
            mode,
            out,
        );
    }
}

fn join(prefix: Option<&str>, segment: &str) -> String {
    match prefix {
        Some(p) => format!("{}{}{}", p, PATH_SEPARATOR, segment),
        None => segment.to_string(),
    }
}

/// Pool child elements from every container field the node carries.
pub fn children(node: &Json) -> Vec<&Json> {
    let mut out = Vec::new();
    for field in ELEMENT_LISTS {
        if let Some(items) = node.get(*field).and_then(Json::as_array) {
            out.extend(items.iter().filter(|v| v.is_object()));
        }
    }
    for field in VARIABLE_LISTS {
        if let Some(vars) = node.get(*field).and_then(Json::as_array) {
            out.extend(
                vars.iter()
                    .filter_map(|v| v.get("value"))
                    .filter(|v| v.is_object()),
            );
        }
    }
    out
}

/// True when the element explicitly allows zero occurrences.
///
/// Elements without any occurrence information are required.
pub fn is_optional(node: &Json) -> bool {
    for field in MIN_OCCURS_FIELDS {
        if let Some(v) = node.get(*field) {
            if scalar_text(v).as_deref() == Some("0") {
                return true;
            }
        }
    }
    let Some(qualifiers) = node.get("qualifiers").and_then(Json::as_array) else {
        return false;
    };
    qualifiers.iter().any(|q| {
        let kind = q
            .get("type")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        let Some(value) = q.get("value").and_then(scalar_text) else {
            return false;
        };
        if kind.contains("cardinality") || kind.contains("multiplicity") || kind.contains("occurrence")
        {
            parse_min_cardinality(&value) == Some(0)
        } else if kind.contains("min") {
            value.trim() == "0"
        } else {
            false
        }
    })
}

/// Minimum of a cardinality string: `0`, `1`, `min..max`, or `Zero…`/`One…`.
pub fn parse_min_cardinality(raw: &str) -> Option<u64> {
    let s = raw.trim().to_ascii_lowercase();
    if let Some((min, _max)) = s.split_once("..") {
        return min.trim().parse().ok();
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    if s.starts_with("zero") {
        Some(0)
    } else if s.starts_with("one") {
        Some(1)
    } else {
        None
    }
}

fn scalar_text(v: &Json) -> Option<String> {
    match v {
        Json::String(s) => Some(s.trim().to_string()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
