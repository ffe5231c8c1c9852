//! Index key templates.
//!
//! A template is a format string over document attributes: literal bytes plus
//! `{name}` / `{name:spec}` placeholders, with `{{` and `}}` escaping braces.
//! It compiles once, at index-creation time, into a chunk list the index
//! evaluates per document. Rendering is total over documents that carry every
//! referenced attribute as a scalar; otherwise it yields nothing and the
//! document simply stays out of the index (partial-index semantics).
//!
//! Specs are the printf-style subset that matters for byte-ordered keys:
//! an optional `0` fill flag, optional `-` for left alignment, a width, an
//! optional `.precision` for floats, and an optional conversion character
//! (`d`, `s`, `x`, `f`). `{age:03}` renders 21 as `021`; fixed-width numeric
//! fields are what make byte order agree with numeric order.

use crate::document::Document;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field { name: String, spec: Spec },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Spec {
    zero: bool,
    left: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conv: Conv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Conv {
    #[default]
    Auto,
    Decimal,
    Str,
    Hex,
    Float,
}

#[derive(Debug, Clone)]
pub struct KeyTemplate {
    source: String,
    parts: Vec<Part>,
}

impl KeyTemplate {
    pub fn parse(source: &str) -> Result<KeyTemplate> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(Error::BadTemplate(format!(
                        "stray '}}' in template {source:?}"
                    )))
                }
                '{' => {
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    let mut body = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        body.push(c);
                    }
                    if !closed {
                        return Err(Error::BadTemplate(format!(
                            "unterminated placeholder in template {source:?}"
                        )));
                    }
                    let (name, spec) = match body.split_once(':') {
                        Some((name, spec)) => (name, parse_spec(spec, source)?),
                        None => (body.as_str(), Spec::default()),
                    };
                    if name.is_empty() {
                        return Err(Error::BadTemplate(format!(
                            "empty attribute name in template {source:?}"
                        )));
                    }
                    parts.push(Part::Field {
                        name: name.to_string(),
                        spec,
                    });
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(KeyTemplate {
            source: source.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Derive the index key for a document, or `None` when any referenced
    /// attribute is absent or not a scalar.
    pub fn render(&self, doc: &Document) -> Option<Vec<u8>> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field { name, spec } => {
                    let rendered = render_value(doc.get(name)?, spec)?;
                    out.push_str(&rendered);
                }
            }
        }
        Some(out.into_bytes())
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_spec(spec: &str, source: &str) -> Result<Spec> {
    let bad = |what: &str| Error::BadTemplate(format!("{what} in spec {spec:?} of {source:?}"));

    let mut out = Spec::default();
    let mut chars = spec.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '0' if !out.zero => out.zero = true,
            '-' if !out.left => out.left = true,
            _ => break,
        }
        chars.next();
    }

    let mut width = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            width.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if !width.is_empty() {
        out.width = Some(width.parse().map_err(|_| bad("width overflow"))?);
    }

    if chars.peek() == Some(&'.') {
        chars.next();
        let mut precision = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                precision.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if precision.is_empty() {
            return Err(bad("missing precision digits"));
        }
        out.precision = Some(precision.parse().map_err(|_| bad("precision overflow"))?);
    }

    out.conv = match chars.next() {
        None => Conv::Auto,
        Some('d') => Conv::Decimal,
        Some('s') => Conv::Str,
        Some('x') => Conv::Hex,
        Some('f') => Conv::Float,
        Some(c) => return Err(bad(&format!("unknown conversion {c:?}"))),
    };
    if chars.next().is_some() {
        return Err(bad("trailing characters"));
    }
    Ok(out)
}

fn render_value(value: &Value, spec: &Spec) -> Option<String> {
    let raw = match (value, spec.conv) {
        (Value::String(s), Conv::Auto | Conv::Str) => s.clone(),
        (Value::Bool(b), Conv::Auto | Conv::Str) => b.to_string(),
        (Value::Number(n), Conv::Hex) => format!("{:x}", n.as_i64()?),
        (Value::Number(n), Conv::Float) | (Value::Number(n), Conv::Auto) if n.is_f64() => {
            let f = n.as_f64()?;
            match spec.precision {
                Some(p) => format!("{f:.p$}"),
                None => f.to_string(),
            }
        }
        (Value::Number(n), Conv::Auto | Conv::Decimal | Conv::Float | Conv::Str) => n.to_string(),
        // Null and nested values are opaque to indexing.
        _ => return None,
    };
    Some(pad(raw, spec, value.is_number()))
}

fn pad(raw: String, spec: &Spec, numeric: bool) -> String {
    let Some(width) = spec.width else { return raw };
    if raw.len() >= width {
        return raw;
    }
    let fill = width - raw.len();
    if spec.left {
        let mut out = raw;
        out.extend(std::iter::repeat(' ').take(fill));
        out
    } else if spec.zero && numeric {
        // Zero-fill goes after the sign so negatives stay well formed.
        let (sign, digits) = match raw.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", raw.as_str()),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), raw)
    }
}
