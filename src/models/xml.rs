// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal writer/parser for the protocol's packing-instruction XML.
//!
//! Protocol messages are flat element trees without attributes, namespaces or
//! mixed content, so a full XML library buys nothing here; what matters is
//! bit-exact control over the dialect's entity forms (see [`super::escape`]).

use std::fmt::{Display, Write};

use bytes::Bytes;

use crate::{
    cfg::enums::ProtocolVariant,
    error::{IrodsError, Result},
    models::escape::{postprocess, preprocess},
};

/// Serialises one packing instruction. Tag methods apply the dialect escape
/// pass when the session runs the XML protocol variant.
pub struct XmlWriter {
    buf: String,
    variant: ProtocolVariant,
}

impl XmlWriter {
    pub fn new(variant: ProtocolVariant) -> Self {
        Self {
            buf: String::with_capacity(256),
            variant,
        }
    }

    pub fn open(&mut self, tag: &str) {
        let _ = writeln!(self.buf, "<{tag}>");
    }

    pub fn close(&mut self, tag: &str) {
        let _ = writeln!(self.buf, "</{tag}>");
    }

    pub fn tag_str(&mut self, tag: &str, value: &str) {
        let value = if self.variant.escapes_xml() {
            preprocess(value)
        } else {
            value.to_string()
        };
        let _ = writeln!(self.buf, "<{tag}>{value}</{tag}>");
    }

    /// For numeric fields; no escaping needed.
    pub fn tag_num<T: Display>(&mut self, tag: &str, value: T) {
        let _ = writeln!(self.buf, "<{tag}>{value}</{tag}>");
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// A parsed element: name, text content and child elements.
#[derive(Debug, Clone, Default)]
pub struct Elem {
    pub name: String,
    pub text: String,
    pub children: Vec<Elem>,
}

impl Elem {
    /// Parses a single root element out of `input`.
    pub fn parse(input: &[u8], variant: ProtocolVariant) -> Result<Elem> {
        let text = String::from_utf8_lossy(input);
        let mut p = Parser {
            rest: &text,
            variant,
        };
        p.skip_misc();
        let root = p.element()?;
        Ok(root)
    }

    pub fn child(&self, name: &str) -> Option<&Elem> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Elem> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Elem> {
        self.child(name).ok_or_else(|| {
            IrodsError::Protocol(format!("missing <{}> in <{}>", name, self.name))
        })
    }

    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    pub fn str_of(&self, name: &str) -> Result<&str> {
        Ok(self.require(name)?.text.as_str())
    }

    pub fn i32_of(&self, name: &str) -> Result<i32> {
        let raw = self.str_of(name)?;
        raw.trim().parse::<i32>().map_err(|_| {
            IrodsError::Protocol(format!("<{name}> is not an i32: {raw:?}"))
        })
    }

    pub fn i64_of(&self, name: &str) -> Result<i64> {
        let raw = self.str_of(name)?;
        raw.trim().parse::<i64>().map_err(|_| {
            IrodsError::Protocol(format!("<{name}> is not an i64: {raw:?}"))
        })
    }

    pub fn u32_of(&self, name: &str) -> Result<u32> {
        let raw = self.str_of(name)?;
        raw.trim().parse::<u32>().map_err(|_| {
            IrodsError::Protocol(format!("<{name}> is not a u32: {raw:?}"))
        })
    }
}

struct Parser<'a> {
    rest: &'a str,
    variant: ProtocolVariant,
}

impl<'a> Parser<'a> {
    /// Skips whitespace, XML declarations and comments between elements.
    fn skip_misc(&mut self) {
        loop {
            self.rest = self.rest.trim_start();
            if let Some(after) = self.rest.strip_prefix("<?") {
                match after.find("?>") {
                    Some(end) => self.rest = &after[end + 2..],
                    None => {
                        self.rest = "";
                        return;
                    },
                }
            } else if let Some(after) = self.rest.strip_prefix("<!--") {
                match after.find("-->") {
                    Some(end) => self.rest = &after[end + 3..],
                    None => {
                        self.rest = "";
                        return;
                    },
                }
            } else {
                return;
            }
        }
    }

    fn element(&mut self) -> Result<Elem> {
        let Some(after) = self.rest.strip_prefix('<') else {
            return Err(IrodsError::Protocol(format!(
                "expected element, found {:?}",
                truncated(self.rest)
            )));
        };
        let end = after.find('>').ok_or_else(|| {
            IrodsError::Protocol("unterminated element tag".to_string())
        })?;
        let tag = &after[..end];
        if let Some(name) = tag.strip_suffix('/') {
            // Self-closing form; servers do not emit it, accept it anyway.
            self.rest = &after[end + 1..];
            return Ok(Elem {
                name: name.trim().to_string(),
                ..Elem::default()
            });
        }
        let name = tag.trim().to_string();
        self.rest = &after[end + 1..];

        let mut elem = Elem {
            name,
            ..Elem::default()
        };
        let mut text = String::new();
        loop {
            let lt = self.rest.find('<').ok_or_else(|| {
                IrodsError::Protocol(format!("unterminated <{}>", elem.name))
            })?;
            text.push_str(&self.rest[..lt]);
            self.rest = &self.rest[lt..];
            if let Some(after_close) = self.rest.strip_prefix("</") {
                let end = after_close.find('>').ok_or_else(|| {
                    IrodsError::Protocol("unterminated closing tag".to_string())
                })?;
                let closing = after_close[..end].trim();
                if closing != elem.name {
                    return Err(IrodsError::Protocol(format!(
                        "mismatched closing tag </{closing}> for <{}>",
                        elem.name
                    )));
                }
                self.rest = &after_close[end + 1..];
                break;
            }
            elem.children.push(self.element()?);
        }

        if elem.children.is_empty() {
            elem.text = if self.variant.escapes_xml() {
                postprocess(&text)
            } else {
                text
            };
        }
        Ok(elem)
    }
}

fn truncated(s: &str) -> String {
    s.chars().take(32).collect()
}
