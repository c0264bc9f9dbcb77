use crate::security::{index_path, key_path};
use crate::workflow::path::{scalar_text, value_kind, DataPath};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Roots a template may reference. Only request-derived data is exposed.
pub const TEMPLATE_ROOTS: &[&str] = &["Request"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unbalanced braces in template `{template}`: {reason}")]
    Unbalanced { template: String, reason: String },
    #[error("empty placeholder in template `{template}`")]
    EmptyPlaceholder { template: String },
    #[error("invalid placeholder path `{placeholder}`: {reason}")]
    InvalidPath { placeholder: String, reason: String },
    #[error("placeholder `{placeholder}` uses root `{root}`; allowed roots: {}", allowed.join(", "))]
    DisallowedRoot {
        placeholder: String,
        root: String,
        allowed: Vec<String>,
    },
    #[error("placeholder `{placeholder}` resolved to no value")]
    MissingValue { placeholder: String },
    #[error("placeholder `{placeholder}` resolved to a {kind}; only scalar values can be substituted")]
    NonScalarValue { placeholder: String, kind: String },
}

/// Template error tagged with the location of the offending string inside the
/// resolved structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template at `{path}`: {source}")]
pub struct LocatedTemplateError {
    pub path: String,
    #[source]
    pub source: TemplateError,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateScope {
    allowed: Vec<String>,
    roots: BTreeMap<String, Value>,
}

impl TemplateScope {
    pub fn new(allowed: &[&str]) -> Self {
        Self {
            allowed: allowed.iter().map(|root| root.to_string()).collect(),
            roots: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, root: impl Into<String>, value: Value) -> Self {
        self.roots.insert(root.into(), value);
        self
    }

    fn lookup(&self, placeholder: &str) -> Result<String, TemplateError> {
        let path = DataPath::parse(placeholder).map_err(|reason| TemplateError::InvalidPath {
            placeholder: placeholder.to_string(),
            reason,
        })?;
        if !self.allowed.iter().any(|root| root == path.root()) {
            return Err(TemplateError::DisallowedRoot {
                placeholder: placeholder.to_string(),
                root: path.root().to_string(),
                allowed: self.allowed.clone(),
            });
        }
        let Some(value) = path.lookup(&self.roots) else {
            return Err(TemplateError::MissingValue {
                placeholder: placeholder.to_string(),
            });
        };
        scalar_text(value).ok_or_else(|| TemplateError::NonScalarValue {
            placeholder: placeholder.to_string(),
            kind: value_kind(value).to_string(),
        })
    }
}

/// Substitutes every `{{path}}` occurrence in `template`. `\{{` yields a
/// literal `{{`.
pub fn resolve_template(template: &str, scope: &TemplateScope) -> Result<String, TemplateError> {
    render_placeholders(template, |token| scope.lookup(token))
}

/// Resolves templates in every string reachable from `value`, including
/// strings nested in maps and sequences. Keys are never templated.
pub fn resolve_value(
    value: &Value,
    scope: &TemplateScope,
    path: &str,
) -> Result<Value, LocatedTemplateError> {
    match value {
        Value::String(text) => resolve_template(text, scope)
            .map(Value::String)
            .map_err(|source| LocatedTemplateError {
                path: path.to_string(),
                source,
            }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| resolve_value(item, scope, &index_path(path, index)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => resolve_map(map, scope, path).map(Value::Object),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}

pub fn resolve_map(
    map: &Map<String, Value>,
    scope: &TemplateScope,
    path: &str,
) -> Result<Map<String, Value>, LocatedTemplateError> {
    let mut resolved = Map::new();
    for (key, item) in map {
        resolved.insert(key.clone(), resolve_value(item, scope, &key_path(path, key))?);
    }
    Ok(resolved)
}

fn render_placeholders<F>(template: &str, mut resolve: F) -> Result<String, TemplateError>
where
    F: FnMut(&str) -> Result<String, TemplateError>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = template;
    let literal = |segment: &str| {
        if segment.contains("}}") {
            return Err(TemplateError::Unbalanced {
                template: template.to_string(),
                reason: "unmatched closing braces".to_string(),
            });
        }
        Ok(())
    };

    loop {
        let next_open = cursor.find("{{");
        let next_escape = cursor.find("\\{{");

        if let Some(escape) = next_escape {
            if next_open.map_or(true, |open| escape < open) {
                literal(&cursor[..escape])?;
                rendered.push_str(&cursor[..escape]);
                rendered.push_str("{{");
                let escaped = &cursor[escape + 3..];
                // The closing braces of an escaped placeholder are literal too.
                cursor = match (escaped.find("}}"), escaped.find("{{")) {
                    (Some(close), open) if open.map_or(true, |open| close < open) => {
                        rendered.push_str(&escaped[..close + 2]);
                        &escaped[close + 2..]
                    }
                    _ => escaped,
                };
                continue;
            }
        }

        let Some(open) = next_open else {
            break;
        };
        literal(&cursor[..open])?;
        rendered.push_str(&cursor[..open]);
        let after_open = &cursor[open + 2..];
        let Some(close_offset) = after_open.find("}}") else {
            return Err(TemplateError::Unbalanced {
                template: template.to_string(),
                reason: "unclosed placeholder".to_string(),
            });
        };
        let inner = &after_open[..close_offset];
        if inner.contains('{') || inner.contains('}') {
            return Err(TemplateError::Unbalanced {
                template: template.to_string(),
                reason: "nested braces inside placeholder".to_string(),
            });
        }
        let token = inner.trim();
        if token.is_empty() {
            return Err(TemplateError::EmptyPlaceholder {
                template: template.to_string(),
            });
        }
        rendered.push_str(&resolve(token)?);
        cursor = &after_open[close_offset + 2..];
    }

    literal(cursor)?;
    rendered.push_str(cursor);
    Ok(rendered)
}
