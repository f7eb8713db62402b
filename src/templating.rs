//! Payload templating for script arguments.
//!
//! Two passes run over every argument. The raw pass swaps `{{POST}}` for the
//! request body verbatim. The structured pass parses the body as a JSON
//! object (`null` counts as an empty one), flattens it into dotted keys (`commit.author_name`) and swaps each
//! `{{key}}` for the matching string leaf. A top-level `ref` leaf also
//! provides `{{branch_name}}` or `{{tag_name}}`.
//!
//! Substitution is a single left-to-right scan: substituted values are never
//! rescanned, and unknown placeholders are left in place.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Placeholder replaced by the whole raw request body.
pub const RAW_BODY_TOKEN: &str = "{{POST}}";

const REF_KEY: &str = "ref";
const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";
const BRANCH_TOKEN: &str = "branch_name";
const TAG_TOKEN: &str = "tag_name";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("payload is not a JSON object: {0}")]
    InvalidPayload(String),
}

/// Flattened view of a JSON payload: dotted key -> string value.
///
/// Only string leaves are recorded; numbers, booleans, nulls and arrays are
/// skipped. When two paths collapse onto the same dotted key, the one
/// visited last (keys are walked in sorted order) wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenTable {
    tokens: BTreeMap<String, String>,
}

impl TokenTable {
    pub fn parse(payload: &[u8]) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| TemplateError::InvalidPayload(e.to_string()))?;
        match value {
            Value::Object(object) => Ok(Self::from_object(&object)),
            // `null` is an object with no keys
            Value::Null => Ok(Self::default()),
            other => Err(TemplateError::InvalidPayload(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut table = Self::default();
        table.flatten(object, "");
        table
    }

    fn flatten(&mut self, object: &Map<String, Value>, prefix: &str) {
        for (key, value) in object {
            let key = format!("{prefix}{key}");
            match value {
                Value::String(text) => {
                    if key == REF_KEY {
                        self.insert_derived(text);
                    }
                    self.tokens.insert(key, text.clone());
                }
                Value::Object(nested) => {
                    let nested_prefix = format!("{key}.");
                    self.flatten(nested, &nested_prefix);
                }
                _ => {}
            }
        }
    }

    fn insert_derived(&mut self, git_ref: &str) {
        if let Some(branch) = ref_suffix(git_ref, BRANCH_PREFIX) {
            self.tokens.insert(BRANCH_TOKEN.to_string(), branch.to_string());
        }
        if let Some(tag) = ref_suffix(git_ref, TAG_PREFIX) {
            self.tokens.insert(TAG_TOKEN.to_string(), tag.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Replace every known `{{key}}` in `template`.
    ///
    /// Each `}}` after an opening `{{` is tried as the closer, nearest first,
    /// so keys that contain `}` still match.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let inner = &rest[start + 2..];
            if !inner.contains("}}") {
                break;
            }
            out.push_str(&rest[..start]);
            let hit = inner
                .char_indices()
                .map(|(i, _)| i)
                .filter(|&i| inner[i..].starts_with("}}"))
                .find_map(|end| self.get(&inner[..end]).map(|value| (end, value)));
            match hit {
                Some((end, value)) => {
                    out.push_str(value);
                    rest = &inner[end + 2..];
                }
                None => {
                    // step over one brace so `{{{key}}}` still matches `{{key}}`
                    out.push('{');
                    rest = &rest[start + 1..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Name following `prefix` anywhere in a git ref, up to the end of the line.
fn ref_suffix<'a>(git_ref: &'a str, prefix: &str) -> Option<&'a str> {
    let start = git_ref.find(prefix)? + prefix.len();
    let name = &git_ref[start..];
    Some(match name.find('\n') {
        Some(end) => &name[..end],
        None => name,
    })
}

/// A request body prepared for templating.
///
/// The body is parsed once; a parse failure is remembered and reported by
/// every structured pass, after the raw pass has already been applied.
#[derive(Debug)]
pub struct Payload<'a> {
    raw: Cow<'a, str>,
    tokens: Result<TokenTable, TemplateError>,
}

impl<'a> Payload<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        let tokens = if body.is_empty() {
            Ok(TokenTable::default())
        } else {
            TokenTable::parse(body)
        };
        Self {
            raw: String::from_utf8_lossy(body),
            tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Raw pass: `{{POST}}` becomes the body text, unescaped.
    pub fn expand_raw(&self, template: &str) -> String {
        if self.is_empty() {
            return template.to_string();
        }
        template.replace(RAW_BODY_TOKEN, &self.raw)
    }

    /// Structured pass over an already raw-expanded string.
    pub fn expand_tokens(&self, template: &str) -> Result<String, TemplateError> {
        if self.is_empty() {
            return Ok(template.to_string());
        }
        match &self.tokens {
            Ok(table) => Ok(table.render(template)),
            Err(e) => Err(e.clone()),
        }
    }

    /// Rewrite each argument in place, stopping at the first structured failure.
    ///
    /// Arguments already rewritten stay rewritten, and the failing argument
    /// keeps its raw-pass result.
    pub fn apply_all<'s, I>(&self, args: I) -> Result<(), TemplateError>
    where
        I: IntoIterator<Item = &'s mut String>,
    {
        if self.is_empty() {
            return Ok(());
        }
        for arg in args {
            *arg = self.expand_raw(arg.as_str());
            *arg = self.expand_tokens(arg.as_str())?;
        }
        Ok(())
    }
}

/// Run both passes of `payload` over a single template.
pub fn substitute(payload: &[u8], template: &str) -> Result<String, TemplateError> {
    let payload = Payload::new(payload);
    let expanded = payload.expand_raw(template);
    payload.expand_tokens(&expanded)
}
