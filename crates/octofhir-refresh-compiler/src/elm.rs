//! ELM serialization of a compiled unit
//!
//! Emits the library outline: identifier, usings, includes, parameters,
//! terminology definitions, and one statement per `define` whose expression is
//! the retrieve (or union of retrieves) the body performs.

use crate::unit::{CompiledUnit, Retrieve, Statement, TerminologyRef};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use serde_json::{Map, Value, json};

pub const ELM_NAMESPACE: &str = "urn:hl7-org:elm:r1";
const ELM_TYPES_NAMESPACE: &str = "urn:hl7-org:elm-types:r1";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const FHIR_MODEL_URI: &str = "http://hl7.org/fhir";

#[derive(Debug, thiserror::Error)]
#[error("ELM serialization failed: {0}")]
pub struct ElmError(String);

fn model_uri(model: &str) -> String {
    match model {
        "FHIR" => FHIR_MODEL_URI.to_string(),
        "QICore" => "http://hl7.org/fhir/us/qicore".to_string(),
        "QDM" => "urn:healthit-gov:qdm:v5_4".to_string(),
        other => format!("urn:{}", other.to_ascii_lowercase()),
    }
}

fn access_level(private: bool) -> &'static str {
    if private { "Private" } else { "Public" }
}

fn contexts(unit: &CompiledUnit) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for ctx in unit.statements.iter().filter_map(|s| s.context.as_deref()) {
        if !seen.contains(&ctx) {
            seen.push(ctx);
        }
    }
    seen
}

fn terminology_reference(retrieve: &Retrieve) -> &'static str {
    if retrieve.value_set.is_some() {
        "ValueSetRef"
    } else {
        "CodeRef"
    }
}

/// ELM JSON, wrapped in the `{"library": ...}` envelope
pub fn to_json(unit: &CompiledUnit) -> Result<String, ElmError> {
    let mut library = Map::new();

    let mut identifier = Map::new();
    identifier.insert("id".into(), json!(unit.identifier.name));
    if let Some(version) = &unit.identifier.version {
        identifier.insert("version".into(), json!(version));
    }
    library.insert("identifier".into(), Value::Object(identifier));
    library.insert(
        "schemaIdentifier".into(),
        json!({ "id": "urn:hl7-org:elm", "version": "r1" }),
    );

    let mut usings = vec![json!({ "localIdentifier": "System", "uri": ELM_TYPES_NAMESPACE })];
    usings.extend(unit.usings.iter().map(|u| {
        let mut def = json!({ "localIdentifier": u.model, "uri": model_uri(&u.model) });
        if let Some(version) = &u.version {
            def["version"] = json!(version);
        }
        def
    }));
    library.insert("usings".into(), json!({ "def": usings }));

    if !unit.includes.is_empty() {
        let includes: Vec<Value> = unit
            .includes
            .iter()
            .map(|i| {
                let mut def = json!({ "localIdentifier": i.local_name(), "path": i.name });
                if let Some(version) = &i.version {
                    def["version"] = json!(version);
                }
                def
            })
            .collect();
        library.insert("includes".into(), json!({ "def": includes }));
    }

    if !unit.parameters.is_empty() {
        let parameters: Vec<Value> = unit
            .parameters
            .iter()
            .map(|p| json!({ "name": p, "accessLevel": "Public" }))
            .collect();
        library.insert("parameters".into(), json!({ "def": parameters }));
    }

    let terminology_defs = |defs: &[TerminologyRef]| -> Value {
        let defs: Vec<Value> = defs
            .iter()
            .map(|t| {
                let mut def = json!({ "name": t.name, "id": t.url, "accessLevel": "Public" });
                if let Some(version) = &t.version {
                    def["version"] = json!(version);
                }
                def
            })
            .collect();
        json!({ "def": defs })
    };
    if !unit.code_systems.is_empty() {
        library.insert("codeSystems".into(), terminology_defs(unit.code_systems.as_slice()));
    }
    if !unit.value_sets.is_empty() {
        library.insert("valueSets".into(), terminology_defs(unit.value_sets.as_slice()));
    }

    let contexts: Vec<Value> = contexts(unit)
        .into_iter()
        .map(|c| json!({ "name": c }))
        .collect();
    if !contexts.is_empty() {
        library.insert("contexts".into(), json!({ "def": contexts }));
    }

    if !unit.statements.is_empty() {
        let statements: Vec<Value> = unit.statements.iter().map(statement_json).collect();
        library.insert("statements".into(), json!({ "def": statements }));
    }

    serde_json::to_string_pretty(&json!({ "library": library }))
        .map_err(|e| ElmError(e.to_string()))
}

fn statement_json(statement: &Statement) -> Value {
    let mut def = Map::new();
    if statement.function {
        def.insert("type".into(), json!("FunctionDef"));
    }
    def.insert("name".into(), json!(statement.name));
    if let Some(context) = &statement.context {
        def.insert("context".into(), json!(context));
    }
    def.insert("accessLevel".into(), json!(access_level(statement.private)));
    match statement.retrieves.as_slice() {
        [] => {}
        [single] => {
            def.insert("expression".into(), retrieve_json(single));
        }
        many => {
            let operands: Vec<Value> = many.iter().map(retrieve_json).collect();
            def.insert("expression".into(), json!({ "type": "Union", "operand": operands }));
        }
    }
    Value::Object(def)
}

fn retrieve_json(retrieve: &Retrieve) -> Value {
    let mut value = json!({
        "type": "Retrieve",
        "dataType": format!("{{{}}}{}", FHIR_MODEL_URI, retrieve.data_type),
    });
    if let Some(path) = &retrieve.code_path {
        value["codeProperty"] = json!(path);
    }
    if let Some(name) = &retrieve.terminology {
        let mut codes = json!({ "type": terminology_reference(retrieve), "name": name });
        if let Some(library) = &retrieve.qualifier {
            codes["libraryName"] = json!(library);
        }
        value["codes"] = codes;
    }
    value
}

/// Thin helper over the quick-xml writer
struct ElmWriter {
    writer: Writer<Vec<u8>>,
}

impl ElmWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ElmError> {
        self.writer
            .write_event(event)
            .map_err(|e| ElmError(e.to_string()))
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ElmError> {
        self.event(Event::Start(element(name, attrs)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ElmError> {
        self.event(Event::Empty(element(name, attrs)))
    }

    fn close(&mut self, name: &str) -> Result<(), ElmError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn finish(self) -> Result<String, ElmError> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| ElmError(e.to_string()))
    }
}

fn element<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    BytesStart::new(name).with_attributes(attrs.iter().copied())
}

/// Attributes with the optional ones that are present
fn attrs<'a>(required: &[(&'a str, &'a str)], optional: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, &'a str)> {
    required
        .iter()
        .copied()
        .chain(optional.iter().filter_map(|(k, v)| v.map(|v| (*k, v))))
        .collect()
}

/// ELM XML in the `urn:hl7-org:elm:r1` namespace
pub fn to_xml(unit: &CompiledUnit) -> Result<String, ElmError> {
    let mut out = ElmWriter::new();
    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.open(
        "library",
        &[
            ("xmlns", ELM_NAMESPACE),
            ("xmlns:t", ELM_TYPES_NAMESPACE),
            ("xmlns:xsi", XSI_NAMESPACE),
            ("xmlns:fhir", FHIR_MODEL_URI),
        ],
    )?;

    out.empty(
        "identifier",
        &attrs(
            &[("id", unit.identifier.name.as_str())],
            &[("version", unit.identifier.version.as_deref())],
        ),
    )?;
    out.empty("schemaIdentifier", &[("id", "urn:hl7-org:elm"), ("version", "r1")])?;

    out.open("usings", &[])?;
    out.empty("def", &[("localIdentifier", "System"), ("uri", ELM_TYPES_NAMESPACE)])?;
    for using in &unit.usings {
        let uri = model_uri(&using.model);
        out.empty(
            "def",
            &attrs(
                &[("localIdentifier", using.model.as_str()), ("uri", uri.as_str())],
                &[("version", using.version.as_deref())],
            ),
        )?;
    }
    out.close("usings")?;

    if !unit.includes.is_empty() {
        out.open("includes", &[])?;
        for include in &unit.includes {
            out.empty(
                "def",
                &attrs(
                    &[("localIdentifier", include.local_name()), ("path", include.name.as_str())],
                    &[("version", include.version.as_deref())],
                ),
            )?;
        }
        out.close("includes")?;
    }

    if !unit.parameters.is_empty() {
        out.open("parameters", &[])?;
        for parameter in &unit.parameters {
            out.empty("def", &[("name", parameter.as_str()), ("accessLevel", "Public")])?;
        }
        out.close("parameters")?;
    }

    for (section, defs) in [("codeSystems", &unit.code_systems), ("valueSets", &unit.value_sets)] {
        if defs.is_empty() {
            continue;
        }
        out.open(section, &[])?;
        for def in defs {
            out.empty(
                "def",
                &attrs(
                    &[("name", def.name.as_str()), ("id", def.url.as_str()), ("accessLevel", "Public")],
                    &[("version", def.version.as_deref())],
                ),
            )?;
        }
        out.close(section)?;
    }

    let contexts = contexts(unit);
    if !contexts.is_empty() {
        out.open("contexts", &[])?;
        for context in contexts {
            out.empty("def", &[("name", context)])?;
        }
        out.close("contexts")?;
    }

    if !unit.statements.is_empty() {
        out.open("statements", &[])?;
        for statement in &unit.statements {
            write_statement(&mut out, statement)?;
        }
        out.close("statements")?;
    }

    out.close("library")?;
    out.finish()
}

fn write_statement(out: &mut ElmWriter, statement: &Statement) -> Result<(), ElmError> {
    let def_attrs = attrs(
        &[("name", statement.name.as_str())],
        &[
            ("context", statement.context.as_deref()),
            ("accessLevel", Some(access_level(statement.private))),
            ("xsi:type", statement.function.then_some("FunctionDef")),
        ],
    );
    match statement.retrieves.as_slice() {
        [] => out.empty("def", &def_attrs),
        [single] => {
            out.open("def", &def_attrs)?;
            write_retrieve(out, "expression", single)?;
            out.close("def")
        }
        many => {
            out.open("def", &def_attrs)?;
            out.open("expression", &[("xsi:type", "Union")])?;
            for retrieve in many {
                write_retrieve(out, "operand", retrieve)?;
            }
            out.close("expression")?;
            out.close("def")
        }
    }
}

fn write_retrieve(out: &mut ElmWriter, element_name: &str, retrieve: &Retrieve) -> Result<(), ElmError> {
    let data_type = format!("fhir:{}", retrieve.data_type);
    let retrieve_attrs = attrs(
        &[("xsi:type", "Retrieve"), ("dataType", data_type.as_str())],
        &[("codeProperty", retrieve.code_path.as_deref())],
    );
    match &retrieve.terminology {
        None => out.empty(element_name, &retrieve_attrs),
        Some(name) => {
            out.open(element_name, &retrieve_attrs)?;
            out.empty(
                "codes",
                &attrs(
                    &[("xsi:type", terminology_reference(retrieve)), ("name", name.as_str())],
                    &[("libraryName", retrieve.qualifier.as_deref())],
                ),
            )?;
            out.close(element_name)
        }
    }
}
