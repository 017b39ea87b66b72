use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

pub type DocId = u32;
pub type TermId = u32;

/// The three indexed text fields, in snippet priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Abstract,
    Claims,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Abstract, Field::Claims];

    pub fn index(self) -> usize {
        match self {
            Field::Title => 0,
            Field::Abstract => 1,
            Field::Claims => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Abstract => "Abstract",
            Field::Claims => "Claims",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A subset of [`Field`]s selected by `[FIELD=*]` tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet([bool; 3]);

impl FieldSet {
    pub fn empty() -> Self {
        Self([false; 3])
    }

    pub fn only(field: Field) -> Self {
        let mut set = Self::empty();
        set.insert(field);
        set
    }

    pub fn insert(&mut self, field: Field) {
        self.0[field.index()] = true;
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0[field.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

/// One row of the document table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocEntry {
    pub doc_id: DocId,
    pub filename: String,
    /// Source file path, re-read for phrase verification and snippets.
    pub path: String,
    pub len_title: u32,
    pub len_abstract: u32,
    pub len_claims: u32,
}

impl DocEntry {
    pub fn field_len(&self, field: Field) -> u32 {
        match field {
            Field::Title => self.len_title,
            Field::Abstract => self.len_abstract,
            Field::Claims => self.len_claims,
        }
    }
}

/// Per-field occurrence counts of one term in one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: [u32; 3],
}

impl Posting {
    pub fn tf(&self, field: Field) -> u32 {
        self.tf[field.index()]
    }

    pub fn total(&self) -> u32 {
        self.tf.iter().sum()
    }

    /// True when the term occurs in any field of `fields`, or in any field at all when `fields` is `None`.
    pub fn occurs_in(&self, fields: Option<FieldSet>) -> bool {
        match fields {
            Some(set) => set.iter().any(|f| self.tf(f) > 0),
            None => self.total() > 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub df: u32,
    /// Byte offset of the term's block in the postings store.
    pub start: u64,
    /// Number of records in the block; equals `df`.
    pub length: u32,
    /// Sum of per-document total frequencies. Diagnostic only.
    #[serde(default)]
    pub tf: u64,
}

/// Term dictionary that iterates in first-seen (insertion) order.
///
/// The postings store is laid out in this order, so serialization preserves it too.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    ids: HashMap<String, TermId>,
    entries: Vec<(String, TermEntry)>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Option<&TermEntry> {
        self.ids.get(term).map(|id| &self.entries[*id as usize].1)
    }

    /// Inserts `term` if unseen and returns its id.
    pub fn intern(&mut self, term: &str) -> TermId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        let id = self.entries.len() as TermId;
        self.ids.insert(term.to_string(), id);
        self.entries.push((term.to_string(), TermEntry { df: 0, start: 0, length: 0, tf: 0 }));
        id
    }

    pub fn entry_mut(&mut self, id: TermId) -> &mut TermEntry {
        &mut self.entries[id as usize].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermEntry)> {
        self.entries.iter().map(|(t, e)| (t.as_str(), e))
    }
}

impl Serialize for TermDictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (term, entry) in &self.entries {
            map.serialize_entry(term, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TermDictionary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DictVisitor;

        impl<'de> Visitor<'de> for DictVisitor {
            type Value = TermDictionary;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of term to dictionary entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut dict = TermDictionary::new();
                while let Some((term, entry)) = access.next_entry::<String, TermEntry>()? {
                    let id = dict.intern(&term);
                    *dict.entry_mut(id) = entry;
                }
                Ok(dict)
            }
        }

        deserializer.deserialize_map(DictVisitor)
    }
}
