use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RelationTypes;
use crate::parsers::fields::{parse_fields, Field, FieldKind};

/// Top-level `class Name(Bases):` header. Classes without a parenthesised
/// base list are not matched.
static CLASS_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^class (\S+)\(([^)]*?)\):\n").expect("class header pattern is valid")
});

static ABSTRACT_MODEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)class Meta:.*abstract = True").expect("abstract pattern is valid")
});

/// Classes keyed by name, in discovery order.
pub type ClassMap = IndexMap<String, ClassRecord>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub class_dependencies: Vec<String>,
    pub fields: Vec<Field>,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_model: bool,
}

impl ClassRecord {
    pub fn new(name: &str, class_dependencies: Vec<String>, fields: Vec<Field>, is_abstract: bool) -> Self {
        ClassRecord {
            name: name.to_string(),
            class_dependencies,
            fields,
            is_abstract,
            is_model: false,
        }
    }

    /// Fields of the given relation kind. Always empty for classes that have
    /// not been classified as models.
    pub fn relation_fields(&self, kind: FieldKind, relations: &RelationTypes) -> Vec<&Field> {
        if !self.is_model {
            return Vec::new();
        }
        self.fields
            .iter()
            .filter(|f| f.kind(relations) == kind)
            .collect()
    }

    /// Names of the models referenced by fields of the given kind
    pub fn related_models(&self, kind: FieldKind, relations: &RelationTypes) -> Vec<&str> {
        self.relation_fields(kind, relations)
            .into_iter()
            .filter_map(Field::target)
            .collect()
    }

    /// Models referenced by any ForeignKey, OneToOne or ManyToMany field
    pub fn all_related_models(&self, relations: &RelationTypes) -> Vec<&str> {
        [FieldKind::ForeignKey, FieldKind::OneToOne, FieldKind::ManyToMany]
            .into_iter()
            .flat_map(|kind| self.related_models(kind, relations))
            .collect()
    }
}

/// Extract every top-level class declaration from a source file.
///
/// A class body runs from the line after its header up to the next line that
/// starts with a non-whitespace character, or the end of the text.
pub fn parse_classes(text: &str) -> ClassMap {
    let mut classes = ClassMap::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(captures) = CLASS_HEADER_REGEX.captures_at(text, pos) else {
            break;
        };
        let Some(header) = captures.get(0) else {
            break;
        };

        let body_start = header.end();
        let body_end = find_body_end(text, body_start);
        let body = &text[body_start..body_end];

        let name = &captures[1];
        let class_dependencies = split_bases(&captures[2]);
        let is_abstract = ABSTRACT_MODEL_REGEX.is_match(body);

        classes.insert(
            name.to_string(),
            ClassRecord::new(name, class_dependencies, parse_fields(body), is_abstract),
        );

        pos = body_end;
    }

    classes
}

/// Merge one file's classes into the project-wide map. A class whose name is
/// already present replaces the earlier record but keeps its position.
/// Returns the names that collided.
pub fn merge_class_maps(into: &mut ClassMap, from: ClassMap) -> Vec<String> {
    let mut collisions = Vec::new();
    for (name, class) in from {
        if into.insert(name.clone(), class).is_some() {
            log::warn!("Class '{}' declared more than once; keeping the last declaration", name);
            collisions.push(name);
        }
    }
    collisions
}

fn split_bases(bases: &str) -> Vec<String> {
    bases
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect()
}

fn find_body_end(text: &str, start: usize) -> usize {
    let mut line_start = start;
    while line_start < text.len() {
        let rest = &text[line_start..];
        if rest.chars().next().map_or(false, |c| !c.is_whitespace()) {
            return line_start;
        }
        match rest.find('\n') {
            Some(offset) => line_start += offset + 1,
            None => break,
        }
    }
    text.len()
}
