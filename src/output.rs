//! Output rendering for lint results.
//!
//! Supports `human` (default), `json`, and `sarif`. JSON is the serialized
//! `LintResult`; SARIF is a 2.1.0 log with one run.

use crate::models::{Finding, LintResult, Severity};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::collections::BTreeMap;
use std::path::Path;

const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

fn use_colors(output: &str) -> bool {
    output == "human" && std::env::var_os("NO_COLOR").is_none()
}

/// Print lint results in the requested format.
pub fn print_lint(res: &LintResult, output: &str) -> serde_json::Result<()> {
    match output {
        "json" => println!("{}", serde_json::to_string_pretty(&compose_lint_json(res)?)?),
        "sarif" => println!("{}", serde_json::to_string_pretty(&compose_sarif(res))?),
        _ => {
            let color = use_colors(output);
            let base = res.metadata.config.base_path.as_deref();
            for f in &res.findings {
                println!("{}", human_line(f, base, color));
            }
            let summary = format!(
                "— Summary — errors={} warnings={} notes={} files={} files_with_findings={} ({} ms)",
                res.summary.errors,
                res.summary.warnings,
                res.summary.notes,
                res.summary.files_scanned,
                res.summary.files_with_findings,
                res.metadata.duration_ms
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
    Ok(())
}

fn human_line(f: &Finding, base: Option<&Path>, color: bool) -> String {
    let (icon, tag) = match f.severity {
        Severity::Error => ("✖", "⟦error⟧"),
        Severity::Warning => ("▲", "⟦warn⟧"),
        Severity::Note => ("◆", "⟦note⟧"),
    };
    let (icon, tag) = if color {
        match f.severity {
            Severity::Error => (icon.red().to_string(), tag.red().bold().to_string()),
            Severity::Warning => (icon.yellow().to_string(), tag.yellow().bold().to_string()),
            Severity::Note => (icon.blue().to_string(), tag.blue().bold().to_string()),
        }
    } else {
        (icon.to_string(), tag.to_string())
    };
    let mut place = display_path(&f.location.file_path, base);
    if let Some(inner) = &f.location.internal_path {
        place.push('!');
        place.push_str(inner);
    }
    if let Some(line) = f.location.line {
        place.push_str(&format!(":{}", line));
        if let Some(col) = f.location.column {
            place.push_str(&format!(":{}", col));
        }
    }
    if let Some(ptr) = &f.location.json_pointer {
        place.push_str(&format!(" #{}", ptr));
    }
    let place = if color { place.bold().to_string() } else { place };
    format!("{} {} {} ❲{}❳ {}", icon, tag, place, f.rule_id, f.message)
}

/// Path relative to `base` when possible, `/`-separated.
fn display_path(path: &Path, base: Option<&Path>) -> String {
    base.and_then(|b| pathdiff::diff_paths(path, b))
        .filter(|rel| !rel.starts_with(".."))
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Compose lint JSON object (pure) for testing/snapshot purposes.
pub fn compose_lint_json(res: &LintResult) -> serde_json::Result<JsonVal> {
    serde_json::to_value(res)
}

fn sarif_level(sev: Severity) -> &'static str {
    match sev {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Note => "note",
    }
}

/// Compose a SARIF 2.1.0 log (pure).
pub fn compose_sarif(res: &LintResult) -> JsonVal {
    let base = res.metadata.config.base_path.as_deref();

    let mut rules: BTreeMap<&str, &str> = BTreeMap::new();
    for f in &res.findings {
        rules.entry(f.rule_id.as_str()).or_insert(f.rule_name.as_str());
    }
    let rule_index: BTreeMap<&str, usize> = rules.keys().enumerate().map(|(i, k)| (*k, i)).collect();
    let rules_json: Vec<_> = rules
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "name": name,
                "shortDescription": { "text": name },
            })
        })
        .collect();

    let results: Vec<_> = res
        .findings
        .iter()
        .map(|f| {
            let mut physical = json!({
                "artifactLocation": { "uri": display_path(&f.location.file_path, base) },
            });
            if let Some(line) = f.location.line {
                let mut region = json!({ "startLine": line });
                if let Some(col) = f.location.column {
                    region["startColumn"] = json!(col);
                }
                physical["region"] = region;
            }
            let mut location = json!({ "physicalLocation": physical });
            if let Some(ptr) = &f.location.json_pointer {
                location["logicalLocations"] = json!([{ "fullyQualifiedName": ptr, "kind": "element" }]);
            }
            let mut result = json!({
                "ruleId": f.rule_id,
                "ruleIndex": rule_index.get(f.rule_id.as_str()),
                "level": sarif_level(f.severity),
                "message": { "text": f.message },
                "locations": [location],
            });
            let mut props = serde_json::Map::new();
            props.insert("source".into(), json!(f.source));
            if let Some(inner) = &f.location.internal_path {
                props.insert("internalPath".into(), json!(inner));
            }
            if let Some(d) = &f.details {
                props.insert("details".into(), d.clone());
            }
            result["properties"] = JsonVal::Object(props);
            result
        })
        .collect();

    json!({
        "$schema": SARIF_SCHEMA,
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "aaslint",
                    "version": res.metadata.version,
                    "rules": rules_json,
                }
            },
            "results": results,
        }]
    })
}
