//! Definitional resource store
//!
//! Reads and writes resources by path in either encoding. A missing file is a
//! normal outcome (`Ok(None)`); a file that exists but cannot be parsed is an
//! error.

use crate::xml::{self, XmlError};
use crate::{Encoding, Resource, ResourceType};
use octofhir_refresh_diagnostics::{REF0200, REF0201, REF0202, REF0203, RefreshError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Path-addressed access to definitional resources
pub trait ResourceStore: Send + Sync {
    /// Read the resource at `path`, `Ok(None)` when the file does not exist
    fn read(&self, path: &Path) -> Result<Option<Resource>, RefreshError>;

    /// Serialize `resource` to `path` in `encoding`, creating parent directories
    fn write(&self, path: &Path, resource: &Resource, encoding: Encoding) -> Result<(), RefreshError>;

    /// Resource type stored at `path`, `None` when it is not a readable resource
    fn kind_of(&self, path: &Path) -> Option<ResourceType>;
}

/// File system store supporting `.json` and `.xml` resources
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResourceStore;

impl FileResourceStore {
    pub fn new() -> Self {
        Self
    }

    /// Parse resource text in the given encoding
    pub fn parse(text: &str, encoding: Encoding) -> Result<Resource, RefreshError> {
        match encoding {
            Encoding::Json => {
                let value: serde_json::Value = serde_json::from_str(text)
                    .map_err(|e| RefreshError::io(REF0201, e.to_string()))?;
                Resource::from_value(value)
            }
            Encoding::Xml => xml::from_xml(text).map_err(xml_error),
        }
    }

    /// Serialize a resource in the given encoding
    pub fn serialize(resource: &Resource, encoding: Encoding) -> Result<String, RefreshError> {
        match encoding {
            Encoding::Json => {
                let mut text = serde_json::to_string_pretty(resource.fields())
                    .map_err(|e| RefreshError::io(REF0202, e.to_string()))?;
                text.push('\n');
                Ok(text)
            }
            Encoding::Xml => xml::to_xml(resource).map_err(xml_error),
        }
    }
}

fn xml_error(err: XmlError) -> RefreshError {
    RefreshError::io(REF0201, err.to_string())
}

fn encoding_of(path: &Path) -> Result<Encoding, RefreshError> {
    Encoding::from_path(path).ok_or_else(|| {
        RefreshError::io(
            REF0203,
            format!("{}: not a .json or .xml resource file", path.display()),
        )
    })
}

impl ResourceStore for FileResourceStore {
    fn read(&self, path: &Path) -> Result<Option<Resource>, RefreshError> {
        let encoding = encoding_of(path)?;
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RefreshError::io_at(REF0200, path, e)),
        };
        Self::parse(&text, encoding)
            .map(Some)
            .map_err(|e| RefreshError::io_at(e.code(), path, e.message()))
    }

    fn write(&self, path: &Path, resource: &Resource, encoding: Encoding) -> Result<(), RefreshError> {
        let text = Self::serialize(resource, encoding)?;
        write_atomic(path, text.as_bytes())?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    fn kind_of(&self, path: &Path) -> Option<ResourceType> {
        let encoding = Encoding::from_path(path)?;
        let text = fs::read_to_string(path).ok()?;
        match encoding {
            Encoding::Json => {
                let value: serde_json::Value = serde_json::from_str(&text).ok()?;
                value
                    .get("resourceType")
                    .and_then(serde_json::Value::as_str)
                    .map(ResourceType::from)
            }
            Encoding::Xml => xml::root_element(&text).map(ResourceType::from),
        }
    }
}

/// Write bytes to a sibling temp file and rename it over `path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RefreshError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RefreshError::io_at(REF0200, parent, e))?;
    }
    let tmp = temp_sibling(path);
    fs::write(&tmp, bytes).map_err(|e| RefreshError::io_at(REF0200, &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        RefreshError::io_at(REF0200, path, e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::TempDir;

    fn measure() -> Resource {
        Resource::from_value(json!({
            "resourceType": "Measure",
            "id": "EXM1",
            "title": "Example",
            "library": ["http://example.org/fhir/Library/EXM1"]
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileResourceStore::new();
        assert_eq!(store.read(&dir.path().join("absent.json")).unwrap(), None);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileResourceStore::new().read(&path).unwrap_err();
        assert_eq!(err.code(), REF0201);
    }

    #[rstest]
    #[case(Encoding::Json, "measure-EXM1.json")]
    #[case(Encoding::Xml, "measure-EXM1.xml")]
    fn test_write_then_read(#[case] encoding: Encoding, #[case] file: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(file);
        let store = FileResourceStore::new();

        store.write(&path, &measure(), encoding).unwrap();
        assert!(!dir.path().join("nested").join(format!("{}.tmp", file)).exists());

        let back = store.read(&path).unwrap().unwrap();
        assert_eq!(back, measure());
        assert_eq!(store.kind_of(&path), Some(ResourceType::Measure));
    }

    #[test]
    fn test_kind_of_unrelated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        assert_eq!(FileResourceStore::new().kind_of(&path), None);
    }

    #[test]
    fn test_json_preserves_field_order() {
        let text = FileResourceStore::serialize(&measure(), Encoding::Json).unwrap();
        let id = text.find("\"id\"").unwrap();
        let title = text.find("\"title\"").unwrap();
        let library = text.find("\"library\"").unwrap();
        assert!(id < title && title < library);
    }
}
