//! Path templates.
//!
//! # Responsibilities
//! - Parse endpoint and backend path templates (`/users/{id}`, `/files/{*rest}`)
//! - Capture parameters from an incoming path
//! - Render a backend path from captured parameters
//!
//! # Design Decisions
//! - Same placeholder syntax as the axum router, so endpoint paths bind unchanged
//! - Literal segments are case-sensitive
//! - A catch-all may only appear as the last segment

use std::collections::HashMap;
use std::fmt;

/// Error raised while parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template must start with '/': {0}")]
    NotAbsolute(String),
    #[error("malformed segment '{segment}' in {template}")]
    MalformedSegment { template: String, segment: String },
    #[error("catch-all must be the last segment in {0}")]
    CatchAllNotLast(String),
    #[error("duplicate parameter '{param}' in {template}")]
    DuplicateParam { template: String, param: String },
    #[error("missing value for parameter '{0}'")]
    MissingParam(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::NotAbsolute(raw.to_string()));
        }

        let mut segments = Vec::new();
        let parts: Vec<&str> = raw[1..].split('/').collect();
        let last = parts.len().saturating_sub(1);

        for (i, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    if let Some(name) = inner.strip_prefix('*') {
                        if i != last {
                            return Err(TemplateError::CatchAllNotLast(raw.to_string()));
                        }
                        Segment::CatchAll(valid_name(raw, part, name)?)
                    } else {
                        Segment::Param(valid_name(raw, part, inner)?)
                    }
                }
                None => {
                    if part.contains(['{', '}', '?', '#']) {
                        return Err(TemplateError::MalformedSegment {
                            template: raw.to_string(),
                            segment: part.to_string(),
                        });
                    }
                    Segment::Literal(part.to_string())
                }
            };
            segments.push(segment);
        }

        let template = Self {
            raw: raw.to_string(),
            segments,
        };

        let mut seen = Vec::new();
        for name in template.params() {
            if seen.contains(&name) {
                return Err(TemplateError::DuplicateParam {
                    template: raw.to_string(),
                    param: name.to_string(),
                });
            }
            seen.push(name);
        }

        Ok(template)
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) | Segment::CatchAll(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a concrete path and capture its parameters.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = path.strip_prefix('/')?;
        let mut parts = path.split('/');
        let mut params = HashMap::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.next()? != lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next()?;
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), value.to_string());
                }
                Segment::CatchAll(name) => {
                    let rest: Vec<&str> = parts.by_ref().collect();
                    params.insert(name.clone(), rest.join("/"));
                    return Some(params);
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }

    /// Render the template with the given parameter values.
    pub fn render(&self, params: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(name) | Segment::CatchAll(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingParam(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn valid_name(template: &str, segment: &str, name: &str) -> Result<String, TemplateError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TemplateError::MalformedSegment {
            template: template.to_string(),
            segment: segment.to_string(),
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_params() {
        let t = PathTemplate::parse("/users/{id}/posts/{post}").unwrap();
        let caps = t.captures("/users/42/posts/7").unwrap();
        assert_eq!(caps["id"], "42");
        assert_eq!(caps["post"], "7");

        assert!(t.captures("/users/42/posts").is_none());
        assert!(t.captures("/users/42/posts/7/extra").is_none());
        assert!(t.captures("/accounts/42/posts/7").is_none());
    }

    #[test]
    fn test_catch_all() {
        let t = PathTemplate::parse("/files/{*rest}").unwrap();
        let caps = t.captures("/files/a/b/c.txt").unwrap();
        assert_eq!(caps["rest"], "a/b/c.txt");

        let backend = PathTemplate::parse("/storage/{*rest}").unwrap();
        assert_eq!(backend.render(&caps).unwrap(), "/storage/a/b/c.txt");
    }

    #[test]
    fn test_render_missing_param() {
        let t = PathTemplate::parse("/items/{id}").unwrap();
        let err = t.render(&HashMap::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingParam("id".into()));
    }

    #[test]
    fn test_rejects_bad_templates() {
        assert!(matches!(PathTemplate::parse("users"), Err(TemplateError::NotAbsolute(_))));
        assert!(matches!(
            PathTemplate::parse("/{*rest}/tail"),
            Err(TemplateError::CatchAllNotLast(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/a{b}"),
            Err(TemplateError::MalformedSegment { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/{id}/{id}"),
            Err(TemplateError::DuplicateParam { .. })
        ));
    }

    #[test]
    fn test_root_template() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.captures("/").is_some());
        assert_eq!(t.render(&HashMap::new()).unwrap(), "/");
    }
}
