//! Deterministic FHIR ids from logical names

use uuid::Uuid;

/// Longest id FHIR allows
const MAX_ID_LEN: usize = 64;

/// Turn a logical name into a valid FHIR id
///
/// Letters, digits, `-` and `.` are kept; every other run of characters becomes
/// one `-`. A name with nothing left to keep gets a name-based uuid instead.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    let id = trimmed[..trimmed.len().min(MAX_ID_LEN)].trim_end_matches('-');
    if id.is_empty() {
        return Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
            .simple()
            .to_string();
    }
    id.to_string()
}

/// Id of a synthesized resource: `<slug>` or `<slug>-<version>`
pub fn artifact_id(name: &str, version: Option<&str>, versioned: bool) -> String {
    match version {
        Some(v) if versioned && !v.is_empty() => slug(&format!("{}-{}", name, v)),
        _ => slug(name),
    }
}
