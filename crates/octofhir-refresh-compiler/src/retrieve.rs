//! Retrieve scanning in definition bodies

use crate::source::blank_strings;
use octofhir_refresh_diagnostics::Span;
use regex::Regex;
use std::sync::LazyLock;

static RETRIEVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[\s*(?:[A-Za-z_]\w*\.)?(?P<type>[A-Z]\w*)\s*(?::\s*(?:(?P<path>[A-Za-z_][\w.]*)\s+in\s+)?(?:(?P<qualifier>[A-Za-z_]\w*)\.)?(?P<terminology>"[^"]+"|`[^`]+`|[A-Za-z_]\w*))?\s*\]"#,
    )
    .expect("valid retrieve regex")
});

/// Name a retrieve filters on, as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminologyName {
    /// Include alias qualifying the name
    pub qualifier: Option<String>,
    pub name: String,
    /// Quoted names can only refer to terminology declarations
    pub quoted: bool,
}

/// A retrieve found in a body, before terminology names are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRetrieve {
    pub data_type: String,
    pub code_path: Option<String>,
    pub terminology: Option<TerminologyName>,
    pub span: Span,
}

/// Find the retrieves of a definition body starting at `offset` in the source
///
/// Fails with the span of the offending bracket when brackets outside string
/// literals do not balance.
pub fn scan(body: &str, offset: usize) -> Result<Vec<RawRetrieve>, Span> {
    let text = blank_strings(body);
    check_balance(&text, offset)?;

    Ok(RETRIEVE
        .captures_iter(&text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let data_type = caps.name("type")?.as_str().to_string();
            let terminology = caps.name("terminology").map(|t| {
                let raw = t.as_str();
                let quoted = raw.starts_with('"') || raw.starts_with('`');
                TerminologyName {
                    qualifier: caps.name("qualifier").map(|q| q.as_str().to_string()),
                    name: raw.trim_matches(['"', '`']).to_string(),
                    quoted,
                }
            });
            let code_path = caps
                .name("path")
                .map(|p| p.as_str().to_string())
                .or_else(|| terminology.as_ref().map(|_| "code".to_string()));
            Some(RawRetrieve {
                data_type,
                code_path,
                terminology,
                span: Span::new(offset + whole.start(), offset + whole.end()),
            })
        })
        .collect())
}

fn check_balance(text: &str, offset: usize) -> Result<(), Span> {
    let mut open: Vec<usize> = Vec::new();
    let mut in_identifier = None;
    for (pos, c) in text.char_indices() {
        match (in_identifier, c) {
            (Some(quote), c) if c == quote => in_identifier = None,
            (Some(_), _) => {}
            (None, '"' | '`') => in_identifier = Some(c),
            (None, '[') => open.push(pos),
            (None, ']') => {
                if open.pop().is_none() {
                    return Err(Span::new(offset + pos, offset + pos + 1));
                }
            }
            _ => {}
        }
    }
    match open.last() {
        Some(&pos) => Err(Span::new(offset + pos, offset + pos + 1)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn name(qualifier: Option<&str>, name: &str, quoted: bool) -> Option<TerminologyName> {
        Some(TerminologyName {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
            quoted,
        })
    }

    #[rstest]
    #[case("[Encounter]", "Encounter", None, None)]
    #[case("[Condition: \"Diabetes\"]", "Condition", Some("code"), name(None, "Diabetes", true))]
    #[case("[Encounter: type in \"Office Visit\"]", "Encounter", Some("type"), name(None, "Office Visit", true))]
    #[case("[FHIR.Observation: C.\"HbA1c Tests\"]", "Observation", Some("code"), name(Some("C"), "HbA1c Tests", true))]
    #[case("[Procedure: Procedures]", "Procedure", Some("code"), name(None, "Procedures", false))]
    fn test_scan_forms(
        #[case] body: &str,
        #[case] data_type: &str,
        #[case] path: Option<&str>,
        #[case] terminology: Option<TerminologyName>,
    ) {
        let found = scan(body, 0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].data_type, data_type);
        assert_eq!(found[0].code_path.as_deref(), path);
        assert_eq!(found[0].terminology, terminology);
    }

    #[test]
    fn test_scan_ignores_non_retrieves() {
        let body = "Interval[Start, End] and X[0] and 'text [Condition]'";
        assert!(scan(body, 0).unwrap().is_empty());
    }

    #[test]
    fn test_spans_are_source_offsets() {
        let found = scan("  exists [Encounter]", 100).unwrap();
        assert_eq!(found[0].span, Span::new(109, 120));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert_eq!(scan("exists [Condition", 10).unwrap_err(), Span::new(17, 18));
        assert_eq!(scan("X]", 0).unwrap_err(), Span::new(1, 2));
    }
}
