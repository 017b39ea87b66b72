//! Query tag mini-language.
//!
//! Control tags are case-sensitive literals that may appear anywhere in the
//! query text: `[AND]`, `[PHRASE]`, `[FIELD=T]`, `[FIELD=A]`, `[FIELD=C]`,
//! `[VERBOSE]`. Bracketed text that is not one of these tags stays in the query.

use crate::{Field, FieldSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryMode {
    Or,
    And,
    Phrase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    And,
    Phrase,
    Field(Field),
    Verbose,
}

const TAGS: &[(&str, Tag)] = &[
    ("[AND]", Tag::And),
    ("[PHRASE]", Tag::Phrase),
    ("[FIELD=T]", Tag::Field(Field::Title)),
    ("[FIELD=A]", Tag::Field(Field::Abstract)),
    ("[FIELD=C]", Tag::Field(Field::Claims)),
    ("[VERBOSE]", Tag::Verbose),
];

/// Structured form of a tagged query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Query text with every tag removed, trimmed.
    pub text: String,
    pub and: bool,
    pub phrase: bool,
    pub verbose: bool,
    /// Fields named by `[FIELD=*]` tags; `None` when no field tag was given.
    pub fields: Option<FieldSet>,
}

impl ParsedQuery {
    pub fn parse(input: &str) -> Self {
        let mut text = String::with_capacity(input.len());
        let mut q = ParsedQuery { text: String::new(), and: false, phrase: false, verbose: false, fields: None };
        let mut rest = input;
        while let Some(open) = rest.find('[') {
            text.push_str(&rest[..open]);
            let candidate = &rest[open..];
            match TAGS.iter().find(|(lit, _)| candidate.starts_with(lit)) {
                Some((lit, tag)) => {
                    q.apply(*tag);
                    rest = &candidate[lit.len()..];
                }
                None => {
                    text.push('[');
                    rest = &candidate[1..];
                }
            }
        }
        text.push_str(rest);
        q.text = text.trim().to_string();
        q
    }

    fn apply(&mut self, tag: Tag) {
        match tag {
            Tag::And => self.and = true,
            Tag::Phrase => self.phrase = true,
            Tag::Verbose => self.verbose = true,
            Tag::Field(f) => self.fields.get_or_insert_with(FieldSet::empty).insert(f),
        }
    }

    pub fn mode(&self) -> QueryMode {
        if self.phrase {
            QueryMode::Phrase
        } else if self.and {
            QueryMode::And
        } else {
            QueryMode::Or
        }
    }

    /// Field restriction actually applied: phrase queries only look at titles.
    pub fn effective_fields(&self) -> Option<FieldSet> {
        if self.phrase {
            Some(FieldSet::only(Field::Title))
        } else {
            self.fields
        }
    }

    /// AND and PHRASE queries gate scoring on a candidate set.
    pub fn requires_all_terms(&self) -> bool {
        self.and || self.phrase
    }
}
