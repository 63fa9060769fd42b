//! Generated narrative for refreshed artifacts

use octofhir_refresh_model::Resource;
use quick_xml::escape::escape;
use serde_json::{Value, json};
use std::fmt::Write;

const XHTML: &str = "http://www.w3.org/1999/xhtml";

/// Replace `text` with a summary built from the resource's current fields
pub fn regenerate(resource: &mut Resource) {
    let div = render(resource);
    resource.set("text", json!({ "status": "generated", "div": div }));
}

fn render(resource: &Resource) -> String {
    let mut rows: Vec<(&str, String)> = Vec::new();
    for (label, key) in [("Name", "name"), ("Version", "version"), ("Status", "status")] {
        if let Some(value) = resource.get(key).and_then(Value::as_str) {
            rows.push((label, escape(value).into_owned()));
        }
    }

    let dependencies: Vec<String> = resource
        .array("relatedArtifact")
        .iter()
        .filter_map(|ra| {
            let target = match ra.get("resource") {
                Some(Value::String(s)) => Some(s.as_str()),
                Some(Value::Object(r)) => r.get("reference").and_then(Value::as_str),
                _ => None,
            }?;
            let kind = ra.get("type").and_then(Value::as_str).unwrap_or("related");
            Some(format!("{}: {}", kind, target))
        })
        .collect();
    if !dependencies.is_empty() {
        rows.push(("Related Artifacts", list(&dependencies)));
    }

    let requirements: Vec<String> = resource
        .array("dataRequirement")
        .iter()
        .filter_map(|dr| {
            let data_type = dr.get("type").and_then(Value::as_str)?;
            let bound: Vec<&str> = dr
                .get("codeFilter")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|cf| {
                    cf.get("valueSet")
                        .or_else(|| cf.get("valueSetString"))
                        .and_then(Value::as_str)
                })
                .collect();
            Some(match bound.as_slice() {
                [] => data_type.to_string(),
                _ => format!("{} in {}", data_type, bound.join(", ")),
            })
        })
        .collect();
    if !requirements.is_empty() {
        rows.push(("Data Requirements", list(&requirements)));
    }

    let content: Vec<String> = resource
        .array("content")
        .iter()
        .filter_map(|c| c.get("contentType").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if !content.is_empty() {
        rows.push(("Content", list(&content)));
    }

    let mut div = format!("<div xmlns=\"{}\"><table class=\"grid\">", XHTML);
    for (label, value) in rows {
        let _ = write!(div, "<tr><th>{}</th><td>{}</td></tr>", label, value);
    }
    div.push_str("</table></div>");
    div
}

fn list(items: &[String]) -> String {
    let mut out = String::from("<ul>");
    for item in items {
        let _ = write!(out, "<li>{}</li>", escape(item.as_str()));
    }
    out.push_str("</ul>");
    out
}
