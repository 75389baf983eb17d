//! PDF object parser.
//!
//! Builds `PDFObject` values out of the
//! token stream produced by [`super::lexer::PSBaseParser`], resolving the
//! `objid genno R` indirect-reference pattern that the generic tokenizer
//! has no notion of.

use super::lexer::{Keyword, PSBaseParser, PSToken};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject};
use std::collections::{HashMap, VecDeque};

/// Recursive-descent parser for a single PDF object (or a run of them).
pub struct PDFParser<'a> {
    lexer: PSBaseParser<'a>,
    pending: VecDeque<(usize, PSToken)>,
}

impl<'a> PDFParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: PSBaseParser::new(data),
            pending: VecDeque::new(),
        }
    }

    /// Current byte offset into the input.
    pub fn tell(&self) -> usize {
        self.lexer.tell()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        self.lexer.remaining()
    }

    fn next_raw(&mut self) -> Result<Option<(usize, PSToken)>> {
        if let Some(tok) = self.pending.pop_front() {
            return Ok(Some(tok));
        }
        match self.lexer.next_token() {
            Some(r) => r.map(Some),
            None => Ok(None),
        }
    }

    fn push_back(&mut self, tok: (usize, PSToken)) {
        self.pending.push_front(tok);
    }

    /// Parse the next complete object from the stream.
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        let (pos, token) = self.next_raw()?.ok_or(PdfError::UnexpectedEof)?;
        self.object_from_token(pos, token)
    }

    fn object_from_token(&mut self, pos: usize, token: PSToken) -> Result<PDFObject> {
        match token {
            PSToken::Int(n) => self.maybe_ref(n),
            PSToken::Real(n) => Ok(PDFObject::Real(n)),
            PSToken::Bool(b) => Ok(PDFObject::Bool(b)),
            PSToken::Literal(name) => Ok(PDFObject::Name(name)),
            PSToken::String(bytes) => Ok(PDFObject::String(bytes)),
            PSToken::Keyword(Keyword::Null) => Ok(PDFObject::Null),
            PSToken::Keyword(Keyword::ArrayStart) => self.parse_array(),
            PSToken::Keyword(Keyword::DictStart) => self.parse_dict(),
            PSToken::Keyword(kw) => Err(PdfError::SyntaxError(format!(
                "unexpected keyword {:?} at offset {}",
                kw, pos
            ))),
            PSToken::Array(_) | PSToken::Dict(_) => Err(PdfError::SyntaxError(format!(
                "unexpected composite token at offset {}",
                pos
            ))),
        }
    }

    /// Having just consumed an integer, look ahead for `genno R` to build an
    /// indirect reference; otherwise treat it as a plain integer and push
    /// whatever we peeked back onto the stream.
    fn maybe_ref(&mut self, objid: i64) -> Result<PDFObject> {
        let Some((pos2, tok2)) = self.next_raw()? else {
            return Ok(PDFObject::Int(objid));
        };
        let PSToken::Int(genno) = tok2 else {
            self.push_back((pos2, tok2));
            return Ok(PDFObject::Int(objid));
        };

        let Some((pos3, tok3)) = self.next_raw()? else {
            self.push_back((pos2, tok2));
            return Ok(PDFObject::Int(objid));
        };
        if matches!(tok3, PSToken::Keyword(Keyword::R)) {
            if objid < 0 || genno < 0 {
                return Err(PdfError::SyntaxError(format!(
                    "negative object id/generation in reference at offset {}",
                    pos3
                )));
            }
            Ok(PDFObject::Ref(PDFObjRef::new(objid as u32, genno as u32)))
        } else {
            self.push_back((pos3, tok3));
            self.push_back((pos2, tok2));
            Ok(PDFObject::Int(objid))
        }
    }

    fn parse_array(&mut self) -> Result<PDFObject> {
        let mut items = Vec::new();
        loop {
            let (pos, token) = self.next_raw()?.ok_or(PdfError::UnexpectedEof)?;
            if matches!(token, PSToken::Keyword(Keyword::ArrayEnd)) {
                break;
            }
            items.push(self.object_from_token(pos, token)?);
        }
        Ok(PDFObject::Array(items))
    }

    fn parse_dict(&mut self) -> Result<PDFObject> {
        let mut dict = HashMap::new();
        loop {
            let (pos, token) = self.next_raw()?.ok_or(PdfError::UnexpectedEof)?;
            if matches!(token, PSToken::Keyword(Keyword::DictEnd)) {
                break;
            }
            let PSToken::Literal(key) = token else {
                return Err(PdfError::SyntaxError(format!(
                    "expected dictionary key at offset {}",
                    pos
                )));
            };
            let (vpos, vtoken) = self.next_raw()?.ok_or(PdfError::UnexpectedEof)?;
            let value = self.object_from_token(vpos, vtoken)?;
            dict.insert(key, value);
        }
        Ok(PDFObject::Dict(dict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars() {
        let mut p = PDFParser::new(b"42");
        assert_eq!(p.parse_object().unwrap(), PDFObject::Int(42));

        let mut p = PDFParser::new(b"3.14");
        assert_eq!(p.parse_object().unwrap(), PDFObject::Real(3.14));

        let mut p = PDFParser::new(b"true");
        assert_eq!(p.parse_object().unwrap(), PDFObject::Bool(true));

        let mut p = PDFParser::new(b"null");
        assert_eq!(p.parse_object().unwrap(), PDFObject::Null);

        let mut p = PDFParser::new(b"/Name");
        assert_eq!(p.parse_object().unwrap(), PDFObject::Name("Name".into()));
    }

    #[test]
    fn parses_indirect_reference() {
        let mut p = PDFParser::new(b"12 0 R");
        assert_eq!(
            p.parse_object().unwrap(),
            PDFObject::Ref(PDFObjRef::new(12, 0))
        );
    }

    #[test]
    fn plain_integer_not_mistaken_for_reference() {
        let mut p = PDFParser::new(b"12 0 obj");
        assert_eq!(p.parse_object().unwrap(), PDFObject::Int(12));
        assert_eq!(p.parse_object().unwrap(), PDFObject::Int(0));
    }

    #[test]
    fn parses_array_with_reference() {
        let mut p = PDFParser::new(b"[1 2 5 0 R]");
        let obj = p.parse_object().unwrap();
        assert_eq!(
            obj,
            PDFObject::Array(vec![
                PDFObject::Int(1),
                PDFObject::Int(2),
                PDFObject::Ref(PDFObjRef::new(5, 0)),
            ])
        );
    }

    #[test]
    fn parses_dict() {
        let mut p = PDFParser::new(b"<< /Type /Catalog /Pages 3 0 R >>");
        let obj = p.parse_object().unwrap();
        let PDFObject::Dict(dict) = obj else {
            panic!("expected dict");
        };
        assert_eq!(dict.get("Type"), Some(&PDFObject::Name("Catalog".into())));
        assert_eq!(
            dict.get("Pages"),
            Some(&PDFObject::Ref(PDFObjRef::new(3, 0)))
        );
    }

    #[test]
    fn tell_and_remaining_track_position() {
        let mut p = PDFParser::new(b"42 rest");
        let _ = p.parse_object().unwrap();
        assert_eq!(p.tell(), 2);
        assert_eq!(p.remaining(), b" rest");
    }
}
