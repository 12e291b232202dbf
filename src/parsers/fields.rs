use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::RelationTypes;
use crate::parsers::error::{ParseError, Result};

/// `name = Type(args)` with a non-nested argument list. The body is scanned as
/// one blob so declarations may span several lines.
static FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\s+(\S+) = ([^(]+?)\(([^)]*?)\)").expect("field pattern is valid")
});

const QUOTES: &[char] = &['\'', '"'];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FieldKind {
    ForeignKey,
    OneToOne,
    ManyToMany,
    Attribute,
}

impl FieldKind {
    pub fn is_relation(&self) -> bool {
        !matches!(self, FieldKind::Attribute)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

impl Field {
    /// Resolve the raw type text against the recognised relation types
    pub fn kind(&self, relations: &RelationTypes) -> FieldKind {
        relations.resolve(&self.field_type)
    }

    /// Name of the model this field points at.
    ///
    /// The first positional argument wins; a `to=` keyword is the fallback for
    /// declarations that name their target by keyword only.
    pub fn target(&self) -> Option<&str> {
        self.args
            .first()
            .or_else(|| self.kwargs.get("to"))
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Split a call's parameter list into positional and keyword arguments.
///
/// Splitting is on every comma, with no awareness of nesting. A parameter is a
/// keyword argument iff it contains an unescaped `=`, and is split on the first
/// one. Empty parameters (trailing commas) are skipped.
pub fn parse_field_params(text: &str) -> (Vec<String>, BTreeMap<String, String>) {
    let mut args = Vec::new();
    let mut kwargs = BTreeMap::new();

    for param in text.split(',') {
        if param.trim().is_empty() {
            continue;
        }

        match find_unescaped_eq(param) {
            Some(pos) => {
                let name = clean_token(&param[..pos]);
                let value = clean_token(&param[pos + 1..]);
                kwargs.insert(name, value);
            }
            None => args.push(clean_token(param)),
        }
    }

    (args, kwargs)
}

/// Parse a single field declaration which must start at the beginning of `text`.
pub fn parse_field(text: &str) -> Result<Field> {
    let captures = FIELD_REGEX
        .captures(text)
        .filter(|c| c.get(0).map_or(false, |m| m.start() == 0))
        .ok_or_else(|| ParseError::MalformedField(text.to_string()))?;

    Ok(field_from_parts(&captures[1], &captures[2], &captures[3]))
}

/// Scan a block of class-body text for every field declaration in it.
/// Text that doesn't look like a field is skipped.
pub fn parse_fields(text: &str) -> Vec<Field> {
    FIELD_REGEX
        .captures_iter(text)
        .map(|c| field_from_parts(&c[1], &c[2], &c[3]))
        .collect()
}

fn field_from_parts(name: &str, field_type: &str, params: &str) -> Field {
    let (args, kwargs) = parse_field_params(params);
    Field {
        name: name.to_string(),
        field_type: field_type.to_string(),
        args,
        kwargs,
    }
}

fn find_unescaped_eq(param: &str) -> Option<usize> {
    param
        .char_indices()
        .find(|&(i, c)| c == '=' && !param[..i].ends_with('\\'))
        .map(|(i, _)| i)
}

/// Trim whitespace and one layer of quote characters.
fn clean_token(token: &str) -> String {
    let token = token.trim();
    let token = token.strip_prefix(QUOTES).unwrap_or(token);
    let token = token.strip_suffix(QUOTES).unwrap_or(token);
    token.trim().to_string()
}
