//! `quick-xml` driven event reader.
//!
//! Pulls events from a namespace-aware [`NsReader`] and fires the matching
//! [`SaxHandler`] callbacks. The reader also enforces what `quick-xml` leaves
//! to the caller: a single document element, no stray text outside it, a
//! nesting limit, and balanced tags at end of input.
//!
//! General entity references in character data are resolved here: the five
//! predefined entities and character references always, internal-subset
//! entities when [`ParseOptions::expand_entities`] is set. Any other
//! reference is reported through [`SaxHandler::skipped_entity`]. Attribute
//! values always have declared internal entities replaced.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, QName, ResolveResult};
use quick_xml::NsReader;

use super::ParseOptions;
use crate::error::{ParseError, ScanError, SourceLocation};
use crate::sax::{SaxHandler, SaxResult};
use crate::tree::Attribute;

/// A piece of character data after reference resolution.
#[derive(Debug, PartialEq)]
enum TextPiece<'a> {
    Text(Cow<'a, str>),
    Skipped(&'a str),
}

/// The namespace an element name resolved to, detached from the reader.
type Resolved = Result<Option<String>, String>;

/// Fires SAX events for one document.
pub(crate) struct EventReader<'a, 'h> {
    input: &'a str,
    reader: NsReader<&'a [u8]>,
    options: &'a ParseOptions,
    handler: &'h mut dyn SaxHandler,
    /// Internal-subset general entities with literal replacement text.
    entities: HashMap<String, String>,
    /// Prefixes declared on each open element, innermost last.
    declared: Vec<Vec<Option<String>>>,
    seen_root: bool,
}

impl<'a, 'h> EventReader<'a, 'h> {
    pub(crate) fn new(
        input: &'a str,
        options: &'a ParseOptions,
        handler: &'h mut dyn SaxHandler,
    ) -> Self {
        let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        let mut reader = NsReader::from_str(input);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = true;
        config.trim_text(false);

        Self {
            input,
            reader,
            options,
            handler,
            entities: HashMap::new(),
            declared: Vec::new(),
            seen_root: false,
        }
    }

    /// Reads the whole input, firing events on the handler.
    pub(crate) fn run(mut self) -> SaxResult {
        self.handler.start_document()?;
        loop {
            let (resolved, event) = match self.reader.read_resolved_event() {
                Ok((resolved, event)) => (detach(resolved), event),
                Err(err) => {
                    let offset = to_offset(self.reader.error_position());
                    return Err(self.fatal_at(err.to_string(), offset));
                }
            };
            match event {
                Event::Start(start) => self.start_element(resolved, &start)?,
                Event::Empty(start) => {
                    self.start_element(resolved.clone(), &start)?;
                    self.end_element(resolved, start.name())?;
                }
                Event::End(end) => self.end_element(resolved, end.name())?,
                Event::Text(text) => {
                    let raw = self.utf8(&text)?;
                    self.text(raw)?;
                }
                Event::CData(cdata) => {
                    let content = self.utf8(&cdata)?;
                    self.handler.cdata(content)?;
                }
                Event::Comment(comment) => {
                    let content = self.utf8(&comment)?;
                    self.handler.comment(content)?;
                }
                Event::PI(pi) => {
                    let target = self.utf8(pi.target())?;
                    let data = self.utf8(pi.content())?.trim_start();
                    let data = (!data.is_empty()).then_some(data);
                    self.handler.processing_instruction(target, data)?;
                }
                Event::DocType(doctype) => {
                    let subset = self.utf8(&doctype)?;
                    self.entities = collect_entity_declarations(subset);
                    tracing::trace!(
                        entities = self.entities.len(),
                        "collected internal entity declarations"
                    );
                }
                Event::Decl(_) => {}
                Event::Eof => break,
            }
        }

        if !self.declared.is_empty() {
            return Err(self.fatal("unexpected end of input: unclosed element"));
        }
        if !self.seen_root {
            return Err(self.fatal("document has no root element"));
        }
        self.handler.end_document()
    }

    fn start_element(&mut self, resolved: Resolved, start: &BytesStart<'_>) -> SaxResult {
        if self.declared.is_empty() && self.seen_root {
            return Err(self.fatal("content after document element"));
        }
        if self.declared.len() >= self.options.max_depth as usize {
            return Err(self.fatal(format!(
                "maximum nesting depth {} exceeded",
                self.options.max_depth
            )));
        }
        self.seen_root = true;

        let (local_name, prefix) = self.split_name(start.name())?;
        let namespace = resolved.map_err(|message| self.fatal(message))?;

        let mut attributes = Vec::new();
        let mut declarations: Vec<(Option<String>, String)> = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| self.fatal(err.to_string()))?;
            let raw = self.utf8(&attr.value)?;
            let value = self.unescape_attribute(raw)?;
            let (name, attr_prefix) = self.split_name(attr.key)?;

            let attr_namespace = match attr.key.as_namespace_binding() {
                Some(PrefixDeclaration::Default) => {
                    declarations.push((None, value.clone()));
                    None
                }
                Some(PrefixDeclaration::Named(declared)) => {
                    declarations.push((Some(self.utf8(declared)?.to_string()), value.clone()));
                    None
                }
                None if attr_prefix.is_some() => {
                    let (attr_resolved, _) = self.reader.resolve_attribute(attr.key);
                    detach(attr_resolved).map_err(|message| self.fatal(message))?
                }
                None => None,
            };

            attributes.push(Attribute {
                name: name.to_string(),
                value,
                prefix: attr_prefix.map(str::to_string),
                namespace: attr_namespace,
            });
        }

        for (declared_prefix, uri) in &declarations {
            self.handler
                .start_prefix_mapping(declared_prefix.as_deref(), uri)?;
        }
        self.handler
            .start_element(local_name, prefix, namespace.as_deref(), &attributes)?;
        self.declared
            .push(declarations.into_iter().map(|(p, _)| p).collect());
        Ok(())
    }

    fn end_element(&mut self, resolved: Resolved, name: QName<'_>) -> SaxResult {
        let (local_name, prefix) = self.split_name(name)?;
        let namespace = resolved.map_err(|message| self.fatal(message))?;
        self.handler
            .end_element(local_name, prefix, namespace.as_deref())?;

        let declared = self.declared.pop().unwrap_or_default();
        for declared_prefix in declared.iter().rev() {
            self.handler.end_prefix_mapping(declared_prefix.as_deref())?;
        }
        Ok(())
    }

    fn text(&mut self, raw: &str) -> SaxResult {
        if self.declared.is_empty() {
            if raw.chars().all(char::is_whitespace) {
                return Ok(());
            }
            return Err(self.fatal("text outside of the document element"));
        }

        let entities = self.options.expand_entities.then_some(&self.entities);
        let pieces = match split_references(raw, entities) {
            Ok(pieces) => pieces,
            Err(message) => return Err(self.fatal(message)),
        };

        let handler = &mut *self.handler;
        let mut pending = String::new();
        for piece in pieces {
            match piece {
                TextPiece::Text(text) => pending.push_str(&text),
                TextPiece::Skipped(name) => {
                    flush_text(handler, &pending)?;
                    pending.clear();
                    handler.skipped_entity(name)?;
                }
            }
        }
        flush_text(handler, &pending)
    }

    /// Attribute values cannot carry a skipped reference, so declared
    /// entities are replaced regardless of `expand_entities`.
    fn unescape_attribute(&self, raw: &str) -> Result<String, ScanError> {
        let entities = &self.entities;
        quick_xml::escape::unescape_with(raw, |name| {
            resolve_predefined_entity(name).or_else(|| entities.get(name).map(String::as_str))
        })
        .map(Cow::into_owned)
        .map_err(|err| self.fatal(format!("invalid attribute value: {err}")))
    }

    fn split_name<'n>(&self, name: QName<'n>) -> Result<(&'n str, Option<&'n str>), ScanError> {
        let local_name = self.utf8(name.local_name().into_inner())?;
        let prefix = match name.prefix() {
            Some(prefix) => Some(self.utf8(prefix.into_inner())?),
            None => None,
        };
        Ok((local_name, prefix))
    }

    fn utf8<'b>(&self, bytes: &'b [u8]) -> Result<&'b str, ScanError> {
        std::str::from_utf8(bytes).map_err(|err| self.fatal(err.to_string()))
    }

    fn fatal(&self, message: impl Into<String>) -> ScanError {
        self.fatal_at(message, to_offset(self.reader.buffer_position()))
    }

    fn fatal_at(&self, message: impl Into<String>, offset: usize) -> ScanError {
        ParseError {
            message: message.into(),
            location: SourceLocation::from_offset(self.input, offset),
        }
        .into()
    }
}

fn detach(resolved: ResolveResult<'_>) -> Resolved {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.into_inner()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        )),
    }
}

fn flush_text(handler: &mut dyn SaxHandler, text: &str) -> SaxResult {
    if text.is_empty() {
        Ok(())
    } else if text.chars().all(char::is_whitespace) {
        handler.ignorable_whitespace(text)
    } else {
        handler.characters(text)
    }
}

fn to_offset<T: TryInto<usize>>(position: T) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}

/// Splits raw character data at general entity references.
fn split_references<'a>(
    raw: &'a str,
    entities: Option<&'a HashMap<String, String>>,
) -> Result<Vec<TextPiece<'a>>, String> {
    let mut pieces = Vec::new();
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        if amp > 0 {
            pieces.push(TextPiece::Text(Cow::Borrowed(&rest[..amp])));
        }
        let after = &rest[amp + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let name = &after[..end];
        if name.is_empty() {
            return Err("empty entity reference".to_string());
        }

        if let Some(number) = name.strip_prefix('#') {
            let ch = parse_char_ref(number)
                .ok_or_else(|| format!("invalid character reference '&{name};'"))?;
            pieces.push(TextPiece::Text(Cow::Owned(ch.to_string())));
        } else if let Some(value) = resolve_predefined_entity(name) {
            pieces.push(TextPiece::Text(Cow::Borrowed(value)));
        } else if let Some(value) = entities.and_then(|map| map.get(name)) {
            pieces.push(TextPiece::Text(Cow::Borrowed(value.as_str())));
        } else {
            pieces.push(TextPiece::Skipped(name));
        }
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        pieces.push(TextPiece::Text(Cow::Borrowed(rest)));
    }
    Ok(pieces)
}

fn parse_char_ref(number: &str) -> Option<char> {
    let code = match number.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => number.parse::<u32>().ok()?,
    };
    char::from_u32(code).filter(|&c| c != '\0')
}

/// Collects `<!ENTITY name "value">` declarations from a DOCTYPE body.
///
/// Comments, processing instructions and quoted literals are stepped over,
/// so only real declarations count. Parameter entities and external
/// (SYSTEM/PUBLIC) entities are ignored; references to the latter are
/// reported as skipped. The first declaration of a name wins.
fn collect_entity_declarations(doctype: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let mut rest = doctype;
    while let Some(pos) = rest.find(['<', '"', '\'']) {
        let at = &rest[pos..];
        let next = if let Some(body) = at.strip_prefix("<!--") {
            body.find("-->").map(|end| &body[end + 3..])
        } else if let Some(body) = at.strip_prefix("<?") {
            body.find("?>").map(|end| &body[end + 2..])
        } else if let Some(body) = at.strip_prefix("<!ENTITY") {
            entity_declaration(body, &mut entities)
        } else if let Some(body) = at.strip_prefix('<') {
            skip_declaration(body)
        } else {
            // A literal of the external ID, before the internal subset.
            skip_literal(at)
        };
        match next {
            Some(next) => rest = next,
            None => break,
        }
    }
    entities
}

/// Records one general entity declaration and returns the input after it.
fn entity_declaration<'d>(
    decl: &'d str,
    entities: &mut HashMap<String, String>,
) -> Option<&'d str> {
    let trimmed = decl.trim_start();
    if !trimmed.starts_with('%') {
        let name_end = trimmed
            .find(|c: char| c.is_whitespace())
            .unwrap_or(trimmed.len());
        let name = &trimmed[..name_end];
        let body = trimmed[name_end..].trim_start();
        if let Some(quote) = body.chars().next().filter(|c| *c == '"' || *c == '\'') {
            if let Some(len) = body[1..].find(quote) {
                let literal = &body[1..=len];
                let value = quick_xml::escape::unescape(literal)
                    .map_or_else(|_| literal.to_string(), Cow::into_owned);
                entities.entry(name.to_string()).or_insert(value);
            }
        }
    }
    skip_declaration(decl)
}

/// Returns the input after the `>` closing a markup declaration.
fn skip_declaration(decl: &str) -> Option<&str> {
    let mut quote: Option<char> = None;
    for (i, c) in decl.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(&decl[i + 1..]),
            _ => {}
        }
    }
    None
}

/// Returns the input after the quoted literal `literal` starts with.
fn skip_literal(literal: &str) -> Option<&str> {
    let quote = literal.chars().next()?;
    let end = literal[1..].find(quote)?;
    Some(&literal[end + 2..])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_predefined_and_char_refs() {
        let pieces = split_references("a &lt;b&gt; &#65;&#x42;", None).unwrap();
        let text: String = pieces
            .iter()
            .map(|p| match p {
                TextPiece::Text(t) => t.to_string(),
                TextPiece::Skipped(n) => format!("[{n}]"),
            })
            .collect();
        assert_eq!(text, "a <b> AB");
    }

    #[test]
    fn test_split_unknown_entity_is_skipped() {
        let pieces = split_references("x&nbsp;y", None).unwrap();
        assert_eq!(
            pieces,
            vec![
                TextPiece::Text(Cow::Borrowed("x")),
                TextPiece::Skipped("nbsp"),
                TextPiece::Text(Cow::Borrowed("y")),
            ]
        );
    }

    #[test]
    fn test_split_declared_entity() {
        let entities = collect_entity_declarations(r#"r [<!ENTITY co "Acme &amp; Sons">]"#);
        assert_eq!(entities.get("co").map(String::as_str), Some("Acme & Sons"));

        let pieces = split_references("by &co;", Some(&entities)).unwrap();
        assert_eq!(
            pieces,
            vec![
                TextPiece::Text(Cow::Borrowed("by ")),
                TextPiece::Text(Cow::Borrowed("Acme & Sons")),
            ]
        );
        let pieces = split_references("by &co;", None).unwrap();
        assert_eq!(pieces[1], TextPiece::Skipped("co"));
    }

    #[test]
    fn test_parameter_and_external_entities_ignored() {
        let entities = collect_entity_declarations(
            r#"r SYSTEM "r.dtd" [
                <!ENTITY % common "x">
                <!ENTITY logo SYSTEM "logo.png">
                <!ENTITY pub PUBLIC "-//X//EN" "pub.ent">
                <!ENTITY kept 'yes'>
            ]"#,
        );
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.get("kept").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_declarations_in_comments_and_literals_ignored() {
        let entities = collect_entity_declarations(
            r#"r [
                <!-- <!ENTITY commented "no"> -->
                <?note <!ENTITY in_pi "no"> ?>
                <!ATTLIST r note CDATA "<!ENTITY quoted 'no'>">
                <!ENTITY real "yes">
                <!ENTITY real "second">
            ]"#,
        );
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.get("real").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_char_refs() {
        assert_eq!(parse_char_ref("65"), Some('A'));
        assert_eq!(parse_char_ref("x1F600"), Some('\u{1F600}'));
        assert_eq!(parse_char_ref("xZZ"), None);
        assert_eq!(parse_char_ref("0"), None);
        assert_eq!(parse_char_ref("xD800"), None);

        let err = split_references("a &#xZZ; b", None).unwrap_err();
        assert_eq!(err, "invalid character reference '&#xZZ;'");
        assert!(split_references("a &amp b", None).is_err());
    }
}
