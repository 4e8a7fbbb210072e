//! Parsed naming templates.
//!
//! Syntax: literal text with `{field}` or `{field:0N}` placeholders. `{{` and
//! `}}` produce literal braces. A `/` in the literal text creates folders.

use std::fmt;
use std::str::FromStr;

use soundforged_core::{Error, Result};

use crate::field::Field;

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Field {
        field: Field,
        /// Zero-pad numeric values to this many digits.
        width: Option<usize>,
    },
}

/// A validated naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template, failing with [`Error::InvalidTemplate`] on unknown
    /// fields or broken syntax.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: String| Error::invalid_template(source, reason);

        if source.trim().is_empty() {
            return Err(invalid("template is empty".into()));
        }
        if source.starts_with('/') {
            return Err(invalid("template must be a relative path".into()));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid(format!("unmatched `}}` at offset {pos}"))),
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        body.push(c);
                    }
                    if !closed {
                        return Err(invalid(format!("unclosed `{{` at offset {pos}")));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&body).map_err(invalid)?);
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Fields referenced by this template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field { field, .. } => Some(*field),
            Segment::Literal(_) => None,
        })
    }

    /// True when the literal text places output in folders of its own.
    pub fn creates_subfolders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Literal(text) if text.contains('/')))
    }

    /// Render with `value` supplying the text for each field. Numeric
    /// widths are applied here.
    pub fn render(&self, mut value: impl FnMut(Field) -> String) -> String {
        let mut out = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { field, width } => {
                    let text = value(*field);
                    match width {
                        Some(w) => out.push_str(&format!("{text:0>w$}", w = *w)),
                        None => out.push_str(&text),
                    }
                }
            }
        }
        out
    }
}

fn parse_placeholder(body: &str) -> std::result::Result<Segment, String> {
    let (name, spec) = match body.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec.trim())),
        None => (body.trim(), None),
    };
    if name.is_empty() {
        return Err("empty placeholder `{}`".into());
    }
    let field = Field::from_name(name).ok_or_else(|| format!("unknown field `{name}`"))?;

    let width = match spec {
        None => None,
        Some(spec) => {
            if !field.is_numeric() {
                return Err(format!("field `{name}` does not take a width"));
            }
            let digits = spec.trim_start_matches('0');
            let width = if digits.is_empty() && !spec.is_empty() {
                // `{track_number:0}` pads to nothing.
                0
            } else {
                digits
                    .parse::<usize>()
                    .map_err(|_| format!("invalid width `{spec}` for `{name}`"))?
            };
            if width > 9 {
                return Err(format!("width {width} for `{name}` is too large"));
            }
            Some(width)
        }
    };
    Ok(Segment::Field { field, width })
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Template::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn render_names(t: &Template) -> String {
        t.render(|f| f.name().to_uppercase())
    }

    #[test]
    fn parses_fields_and_literals() {
        let t = Template::parse("{artist} - {title}.mp3").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Field {
                    field: Field::Artist,
                    width: None
                },
                Segment::Literal(" - ".into()),
                Segment::Field {
                    field: Field::Title,
                    width: None
                },
                Segment::Literal(".mp3".into()),
            ]
        );
        assert_eq!(render_names(&t), "ARTIST - TITLE.mp3");
    }

    #[test]
    fn numeric_width_pads() {
        let t = Template::parse("{track_number:02} {title}").unwrap();
        assert_eq!(t.render(|f| if f.is_numeric() { "3".into() } else { "x".into() }), "03 x");
        assert_eq!(t.render(|f| if f.is_numeric() { "123".into() } else { "x".into() }), "123 x");
    }

    #[test]
    fn escaped_braces() {
        let t = Template::parse("{{live}} {title}").unwrap();
        assert_eq!(render_names(&t), "{live} TITLE");
        assert_eq!(t.fields().collect::<Vec<_>>(), vec![Field::Title]);
    }

    #[test]
    fn unknown_field_is_invalid() {
        let err = Template::parse("{artst}.mp3").unwrap_err();
        assert_matches!(err, Error::InvalidTemplate { ref reason, .. } if reason.contains("artst"));
    }

    #[test]
    fn broken_syntax_is_invalid() {
        for bad in ["{artist", "artist}", "{}", "", "   ", "/abs/{title}", "{title:02}", "{track_number:x}"] {
            assert_matches!(Template::parse(bad), Err(Error::InvalidTemplate { .. }), "{bad:?}");
        }
    }

    #[test]
    fn subfolder_detection() {
        assert!(Template::parse("{artist}/{album}/{title}").unwrap().creates_subfolders());
        assert!(!Template::parse("{artist} - {title}").unwrap().creates_subfolders());
    }

    #[test]
    fn display_keeps_source() {
        let t: Template = "{original_basename}.{target_extension}".parse().unwrap();
        assert_eq!(t.to_string(), "{original_basename}.{target_extension}");
    }
}
