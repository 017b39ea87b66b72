//! Decoding of corpus source files.

use crate::{Field, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Raw text of the three indexed fields of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceText {
    pub title: String,
    pub abstract_text: String,
    pub claims: String,
}

impl SourceText {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Abstract => &self.abstract_text,
            Field::Claims => &self.claims,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFields {
    #[serde(default, alias = "invention_title")]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    claims: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDoc {
    Dataset { dataset: RawFields },
    Flat(RawFields),
}

impl From<RawDoc> for SourceText {
    fn from(raw: RawDoc) -> Self {
        let fields = match raw {
            RawDoc::Dataset { dataset } => dataset,
            RawDoc::Flat(fields) => fields,
        };
        SourceText {
            title: fields.title.unwrap_or_default(),
            abstract_text: fields.abstract_text.unwrap_or_default(),
            claims: fields.claims.unwrap_or_default(),
        }
    }
}

/// Decodes one source document. Accepts `{"dataset": {"invention_title", "abstract", "claims"}}`
/// as well as a flat `{"title", "abstract", "claims"}` object; absent fields are empty.
pub fn parse_source(json: &str) -> Result<SourceText> {
    let raw: RawDoc = serde_json::from_str(json)?;
    Ok(raw.into())
}

pub fn read_source(path: &Path) -> Result<SourceText> {
    let text = fs::read_to_string(path)?;
    parse_source(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_shape() {
        let doc = parse_source(r#"{"dataset": {"invention_title": "Neural network", "abstract": "An abstract", "claims": null}}"#).unwrap();
        assert_eq!(doc.title, "Neural network");
        assert_eq!(doc.field(Field::Abstract), "An abstract");
        assert_eq!(doc.claims, "");
    }

    #[test]
    fn flat_shape_with_missing_fields() {
        let doc = parse_source(r#"{"title": "Only a title"}"#).unwrap();
        assert_eq!(doc.title, "Only a title");
        assert!(doc.abstract_text.is_empty());
    }

    #[test]
    fn non_objects_and_broken_json_fail() {
        assert!(parse_source("{\"title\": ").is_err());
        assert!(parse_source("[1, 2]").is_err());
        assert!(parse_source("42").is_err());
    }
}
