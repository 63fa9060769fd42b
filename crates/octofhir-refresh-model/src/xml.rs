//! FHIR XML codec
//!
//! Writes resources in the FHIR XML representation (primitives as `value`
//! attributes, extension urls as attributes, narrative `div` passed through as
//! XHTML) and reads them back into the JSON shape the rest of the tooling uses.
//! Without a schema, arrays are restored from repeated siblings plus a list of
//! elements that repeat in the resources this tooling handles.

use crate::Resource;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Number, Value};
use std::fmt::Write as _;

pub const FHIR_NAMESPACE: &str = "http://hl7.org/fhir";

/// Complex elements that are arrays even with a single occurrence
const REPEATING_COMPLEX: &[&str] = &[
    "action",
    "author",
    "code",
    "codeFilter",
    "coding",
    "concept",
    "condition",
    "contact",
    "contained",
    "content",
    "dataRequirement",
    "dateFilter",
    "designation",
    "editor",
    "endorser",
    "entry",
    "exclude",
    "extension",
    "goal",
    "group",
    "identifier",
    "include",
    "input",
    "jurisdiction",
    "modifierExtension",
    "output",
    "parameter",
    "population",
    "property",
    "relatedArtifact",
    "reviewer",
    "stratifier",
    "supplementalData",
    "telecom",
    "topic",
    "trigger",
    "useContext",
];

/// Primitive elements that are arrays even with a single occurrence
const REPEATING_PRIMITIVE: &[&str] = &["library", "mustSupport", "profile"];

/// Primitive elements carrying integers
const INTEGER_PRIMITIVES: &[&str] = &["count", "offset", "total"];

/// Errors raised by the XML codec
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("invalid FHIR XML: {0}")]
    Structure(String),
}

/// Serialize a resource to FHIR XML
pub fn to_xml(resource: &Resource) -> Result<String, XmlError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_resource(&mut out, resource.fields(), 0).map_err(|e| XmlError::Structure(e.to_string()))?;
    Ok(out)
}

fn write_resource(out: &mut String, fields: &Map<String, Value>, depth: usize) -> std::fmt::Result {
    let type_name = fields
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or("Resource");
    write_indent(out, depth)?;
    writeln!(out, "<{} xmlns=\"{}\">", type_name, FHIR_NAMESPACE)?;
    for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "resourceType") {
        write_field(out, key, value, depth + 1)?;
    }
    write_indent(out, depth)?;
    writeln!(out, "</{}>", type_name)
}

fn write_field(out: &mut String, name: &str, value: &Value, depth: usize) -> std::fmt::Result {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for item in items {
                write_field(out, name, item, depth)?;
            }
            Ok(())
        }
        Value::Object(obj) if obj.contains_key("resourceType") => {
            write_indent(out, depth)?;
            writeln!(out, "<{}>", name)?;
            write_resource(out, obj, depth + 1)?;
            write_indent(out, depth)?;
            writeln!(out, "</{}>", name)
        }
        Value::Object(obj) => {
            let url_attr = if name == "extension" || name == "modifierExtension" {
                obj.get("url").and_then(Value::as_str)
            } else {
                None
            };
            write_indent(out, depth)?;
            write!(out, "<{}", name)?;
            if let Some(url) = url_attr {
                write!(out, " url=\"{}\"", escape(url))?;
            }
            let children: Vec<(&String, &Value)> = obj
                .iter()
                .filter(|(k, _)| !(url_attr.is_some() && k.as_str() == "url"))
                .collect();
            if children.is_empty() {
                return writeln!(out, "/>");
            }
            writeln!(out, ">")?;
            for (key, child) in children {
                write_field(out, key, child, depth + 1)?;
            }
            write_indent(out, depth)?;
            writeln!(out, "</{}>", name)
        }
        Value::String(xhtml) if name == "div" => {
            write_indent(out, depth)?;
            writeln!(out, "{}", xhtml)
        }
        primitive => {
            write_indent(out, depth)?;
            writeln!(out, "<{} value=\"{}\"/>", name, escape(&primitive_text(primitive)))
        }
    }
}

fn primitive_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_indent(out: &mut String, depth: usize) -> std::fmt::Result {
    for _ in 0..depth {
        out.write_str("  ")?;
    }
    Ok(())
}

/// Element tree read from the document
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    /// Verbatim XHTML for narrative `div`s
    raw: Option<String>,
}

/// Parse FHIR XML into a resource
pub fn from_xml(xml: &str) -> Result<Resource, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| XmlError::Malformed(e.to_string()))?
        {
            Event::Start(e) => {
                let node = start_node(&e)?;
                if node.name == "div" {
                    let raw = capture_raw(&mut reader, e)?;
                    attach(&mut stack, &mut root, Node { raw: Some(raw), ..node });
                } else {
                    stack.push(node);
                }
            }
            Event::Empty(e) => {
                let node = start_node(&e)?;
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unexpected end of document".to_string()));
    }
    let root = root.ok_or_else(|| XmlError::Structure("document has no root element".to_string()))?;
    Resource::from_value(resource_value(&root)).map_err(|e| XmlError::Structure(e.to_string()))
}

/// Root element name without parsing the whole document
pub fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn start_node(e: &BytesStart<'_>) -> Result<Node, XmlError> {
    let mut node = Node {
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        ..Node::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw).map_err(|e| XmlError::Malformed(e.to_string()))?;
        node.attrs.push((
            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(node)
}

fn capture_raw(reader: &mut Reader<&[u8]>, start: BytesStart<'_>) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(start))
        .map_err(|e| XmlError::Malformed(e.to_string()))?;
    let mut depth = 1usize;
    while depth > 0 {
        let event = reader
            .read_event()
            .map_err(|e| XmlError::Malformed(e.to_string()))?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(XmlError::Malformed("unterminated narrative div".to_string()));
            }
            _ => {}
        }
        writer
            .write_event(event)
            .map_err(|e| XmlError::Malformed(e.to_string()))?;
    }
    String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Malformed(e.to_string()))
}

fn resource_value(node: &Node) -> Value {
    let mut map = Map::new();
    map.insert("resourceType".to_string(), Value::String(node.name.clone()));
    append_children(&mut map, &node.children);
    Value::Object(map)
}

fn append_children(map: &mut Map<String, Value>, children: &[Node]) {
    let mut grouped: Vec<(&str, Vec<Value>)> = Vec::new();
    for child in children {
        let value = element_value(child);
        match grouped.iter_mut().find(|(name, _)| *name == child.name) {
            Some((_, values)) => values.push(value),
            None => grouped.push((&child.name, vec![value])),
        }
    }

    for (name, mut values) in grouped {
        let complex = matches!(values[0], Value::Object(_));
        let repeats = values.len() > 1
            || (complex && REPEATING_COMPLEX.contains(&name))
            || (!complex && REPEATING_PRIMITIVE.contains(&name));
        let value = if repeats {
            Value::Array(values)
        } else {
            values.swap_remove(0)
        };
        map.insert(name.to_string(), value);
    }
}

fn element_value(node: &Node) -> Value {
    if let Some(raw) = &node.raw {
        return Value::String(raw.clone());
    }

    if let [only] = node.children.as_slice() {
        if only.name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return resource_value(only);
        }
    }

    let value_attr = node
        .attrs
        .iter()
        .find(|(k, _)| k == "value")
        .map(|(_, v)| v.as_str());
    if node.children.is_empty() && node.attrs.iter().all(|(k, _)| k == "value") {
        return match value_attr {
            Some(text) => primitive_value(&node.name, text),
            None => Value::Object(Map::new()),
        };
    }

    let mut map = Map::new();
    for (key, value) in &node.attrs {
        map.insert(key.clone(), Value::String(value.clone()));
    }
    append_children(&mut map, &node.children);
    Value::Object(map)
}

fn primitive_value(name: &str, text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if INTEGER_PRIMITIVES.contains(&name) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Number(Number::from(n));
        }
    }
    Value::String(text.to_string())
}
