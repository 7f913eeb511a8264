use std::collections::HashSet;
use std::sync::Arc;

use crate::record::{LogEventProperty, PropertyValue, ScalarValue, StructureValue};
use crate::simplify::PropertyError;

/// Format that renders string values without quotes.
pub const LITERAL_FORMAT: &str = "l";

/// Piece of a parsed [`MessageTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    Text(String),
    /// A `{Name}` hole. `format` is the text after `:`, if any. `raw` keeps
    /// the original text, braces included, so unresolved holes render
    /// unchanged.
    Property {
        name: String,
        format: Option<String>,
        raw: String,
    },
}

/// Message template such as `"user {UserId} failed {Count} times"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTemplate {
    text: String,
    tokens: Vec<TemplateToken>,
}

impl MessageTemplate {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = tokenize(&text, false);
        MessageTemplate { text, tokens }
    }

    /// Parse text that has already been through `format!`.
    ///
    /// Holes containing whitespace stay literal, so `Debug` output such as
    /// `{a: 1}` or `Point { x: 1 }` is not mistaken for a property.
    pub fn parse_formatted(text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = tokenize(&text, true);
        MessageTemplate { text, tokens }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[TemplateToken] {
        &self.tokens
    }

    /// Substitute property values into the template.
    ///
    /// Strings are quoted unless the hole has the `l` format. Sequences
    /// render as `[a, b]`, structures as `Tag { A: 1 }` and dictionaries as
    /// `[("k": v)]`.
    pub fn render(&self, properties: &[LogEventProperty]) -> Result<String, PropertyError> {
        let mut out = String::with_capacity(self.text.len());
        for token in &self.tokens {
            match token {
                TemplateToken::Text(text) => out.push_str(text),
                TemplateToken::Property { name, format, raw } => {
                    match properties.iter().find(|p| &p.name == name) {
                        Some(prop) => {
                            let mut ancestors = HashSet::new();
                            render_value(&prop.value, format.as_deref(), &mut ancestors, &mut out)?;
                        }
                        None => out.push_str(raw),
                    }
                }
            }
        }
        Ok(out)
    }
}

fn render_scalar(scalar: &ScalarValue, format: Option<&str>, out: &mut String) {
    match scalar {
        ScalarValue::String(s) if format == Some(LITERAL_FORMAT) => out.push_str(s),
        ScalarValue::String(s) => {
            out.push('"');
            out.push_str(&s.replace('"', "\\\""));
            out.push('"');
        }
        ScalarValue::Float(v) if v.is_nan() => out.push_str("NaN"),
        ScalarValue::Float(v) if v.is_infinite() => {
            out.push_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Writes `value` into `out`. Returns `false` without writing when the
/// value is a structure already being rendered further up, so the caller
/// can drop the element or field holding it.
fn render_value(
    value: &PropertyValue,
    format: Option<&str>,
    ancestors: &mut HashSet<*const StructureValue>,
    out: &mut String,
) -> Result<bool, PropertyError> {
    match value {
        PropertyValue::Scalar(scalar) => render_scalar(scalar, format, out),
        PropertyValue::Sequence(items) => {
            out.push('[');
            let mut first = true;
            for item in items {
                let mut rendered = String::new();
                if render_value(item, format, ancestors, &mut rendered)? {
                    if !first {
                        out.push_str(", ");
                    }
                    out.push_str(&rendered);
                    first = false;
                }
            }
            out.push(']');
        }
        PropertyValue::Dictionary(entries) => {
            out.push('[');
            let mut first = true;
            for (key, item) in entries {
                let mut rendered = String::new();
                if render_value(item, None, ancestors, &mut rendered)? {
                    out.push_str(if first { "(" } else { ", (" });
                    render_scalar(key, None, out);
                    out.push_str(": ");
                    out.push_str(&rendered);
                    out.push(')');
                    first = false;
                }
            }
            out.push(']');
        }
        PropertyValue::Structure(structure) => {
            let id = Arc::as_ptr(structure);
            if !ancestors.insert(id) {
                return Ok(false);
            }
            let result = render_structure(structure, ancestors, out);
            ancestors.remove(&id);
            result?;
        }
    }
    Ok(true)
}

fn render_structure(
    structure: &StructureValue,
    ancestors: &mut HashSet<*const StructureValue>,
    out: &mut String,
) -> Result<(), PropertyError> {
    if let Some(tag) = structure.type_tag() {
        out.push_str(tag);
        out.push(' ');
    }
    out.push_str("{ ");
    let mut first = true;
    for prop in structure.properties()? {
        let mut rendered = String::new();
        if render_value(&prop.value, None, ancestors, &mut rendered)? {
            if !first {
                out.push_str(", ");
            }
            out.push_str(&prop.name);
            out.push_str(": ");
            out.push_str(&rendered);
            first = false;
        }
    }
    out.push_str(" }");
    Ok(())
}

fn tokenize(text: &str, formatted: bool) -> Vec<TemplateToken> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        match c {
            '{' if rest.starts_with("{{") => {
                literal.push('{');
                rest = &rest[2..];
            }
            '}' if rest.starts_with("}}") => {
                literal.push('}');
                rest = &rest[2..];
            }
            '{' => match rest.find('}') {
                Some(end) => {
                    let raw = &rest[..=end];
                    let inner = &raw[1..raw.len() - 1];
                    let hole = if formatted && inner.contains(char::is_whitespace) {
                        None
                    } else {
                        parse_hole(inner)
                    };
                    match hole {
                        Some((name, format)) => {
                            if !literal.is_empty() {
                                tokens.push(TemplateToken::Text(std::mem::take(&mut literal)));
                            }
                            tokens.push(TemplateToken::Property {
                                name: name.to_string(),
                                format: format.map(str::to_string),
                                raw: raw.to_string(),
                            });
                        }
                        None => literal.push_str(raw),
                    }
                    rest = &rest[end + 1..];
                }
                None => {
                    literal.push_str(rest);
                    rest = "";
                }
            },
            _ => {
                literal.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    if !literal.is_empty() {
        tokens.push(TemplateToken::Text(literal));
    }
    tokens
}

/// Split the inside of a hole into its property name and format, dropping
/// the capture hint and any alignment.
fn parse_hole(inner: &str) -> Option<(&str, Option<&str>)> {
    let inner = inner.strip_prefix(['@', '$']).unwrap_or(inner);
    let (head, format) = match inner.split_once(':') {
        Some((head, format)) => (head, Some(format)),
        None => (inner, None),
    };
    let name = head.split(',').next().unwrap_or_default();
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    valid.then_some((name, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogEventProperty;

    #[test]
    fn renders_named_and_positional_holes() {
        let template = MessageTemplate::parse("user {UserId} retried {0} times");
        let props = vec![
            LogEventProperty::new("UserId", "ada"),
            LogEventProperty::new("0", 3),
        ];
        assert_eq!(template.render(&props).unwrap(), r#"user "ada" retried 3 times"#);
    }

    #[test]
    fn literal_format_renders_strings_bare() {
        let template = MessageTemplate::parse("user {Name} lit {Name:l}");
        let props = vec![LogEventProperty::new("Name", "ada")];
        assert_eq!(template.render(&props).unwrap(), r#"user "ada" lit ada"#);
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        let template = MessageTemplate::parse("said {Quote}");
        let props = vec![LogEventProperty::new("Quote", r#"say "hi""#)];
        assert_eq!(template.render(&props).unwrap(), r#"said "say \"hi\"""#);
    }

    #[test]
    fn missing_property_keeps_hole_text() {
        let template = MessageTemplate::parse("value is {Missing:000}");
        assert_eq!(template.render(&[]).unwrap(), "value is {Missing:000}");
    }

    #[test]
    fn escaped_braces_and_unterminated_holes_are_literal() {
        let template = MessageTemplate::parse("{{literal}} and {open");
        assert_eq!(template.tokens().len(), 1);
        assert_eq!(template.render(&[]).unwrap(), "{literal} and {open");
    }

    #[test]
    fn capture_hints_and_alignment_are_stripped() {
        let template = MessageTemplate::parse("{@Order} at {Elapsed,8:0.00}");
        let holes: Vec<_> = template
            .tokens()
            .iter()
            .filter_map(|t| match t {
                TemplateToken::Property { name, format, .. } => {
                    Some((name.as_str(), format.as_deref()))
                }
                TemplateToken::Text(_) => None,
            })
            .collect();
        assert_eq!(holes, [("Order", None), ("Elapsed", Some("0.00"))]);
    }

    #[test]
    fn sequences_render_as_text_lists() {
        let template = MessageTemplate::parse("items {Items} bare {Items:l}");
        let props = vec![LogEventProperty::new(
            "Items",
            PropertyValue::Sequence(vec![1.into(), "two".into()]),
        )];
        assert_eq!(
            template.render(&props).unwrap(),
            r#"items [1, "two"] bare [1, two]"#
        );
    }

    #[test]
    fn structures_and_dictionaries_render_as_text() {
        let template = MessageTemplate::parse("{Order} {Anon} {Totals}");
        let props = vec![
            LogEventProperty::new(
                "Order",
                PropertyValue::structure(
                    Some("Order"),
                    vec![
                        LogEventProperty::new("Id", 12),
                        LogEventProperty::new("Sku", "X-1"),
                    ],
                ),
            ),
            LogEventProperty::new(
                "Anon",
                PropertyValue::structure(None, vec![LogEventProperty::new("A", true)]),
            ),
            LogEventProperty::new(
                "Totals",
                PropertyValue::Dictionary(vec![
                    ("eu".into(), 3.into()),
                    ("us".into(), 4.into()),
                ]),
            ),
        ];
        assert_eq!(
            template.render(&props).unwrap(),
            r#"Order { Id: 12, Sku: "X-1" } { A: true } [("eu": 3), ("us": 4)]"#
        );
    }

    #[test]
    fn self_referencing_structure_renders_once() {
        let node = StructureValue::new(Some("Node"), vec![LogEventProperty::new("Id", 1)]);
        node.push(LogEventProperty::new("Next", PropertyValue::Structure(node.clone())))
            .unwrap();
        let template = MessageTemplate::parse("graph {Graph}");
        let props = vec![LogEventProperty::new("Graph", PropertyValue::Structure(node))];
        assert_eq!(template.render(&props).unwrap(), "graph Node { Id: 1 }");
    }

    #[test]
    fn formatted_text_keeps_debug_braces() {
        let props = vec![LogEventProperty::new("a", "zzz")];

        let template = MessageTemplate::parse_formatted("cfg {a: 1} loaded");
        assert_eq!(template.tokens().len(), 1);
        assert_eq!(template.render(&props).unwrap(), "cfg {a: 1} loaded");

        let template = MessageTemplate::parse_formatted("cfg {a} loaded");
        assert_eq!(template.render(&props).unwrap(), r#"cfg "zzz" loaded"#);
    }
}
