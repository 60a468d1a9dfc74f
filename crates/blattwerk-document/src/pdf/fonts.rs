// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics and character decoding for text layout: Helvetica AFM
// widths, the WinAnsi code page, and ToUnicode CMaps.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::document::{number, resolve, resolve_dict};

/// Advance widths of Helvetica for codes 32..=126, in 1/1000 em.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

/// Width used when nothing better is known about a font.
pub(crate) const DEFAULT_WIDTH: f32 = 500.0;

/// Helvetica advance width of a character, in 1/1000 em.
pub fn helvetica_width(ch: char) -> f32 {
    let width = match ch {
        ' '..='~' => HELVETICA_ASCII[ch as usize - 32],
        '\u{a0}' => 278,
        'À'..='Å' | 'Ý' | 'Þ' | 'È'..='Ë' => 667,
        'Æ' | '…' | '—' | '‰' | '™' | 'Œ' => 1000,
        'Ç' | 'Ð' | 'Ñ' | 'Ù'..='Ü' => 722,
        'Ì'..='Ï' | 'ì'..='ï' => 278,
        'Ò'..='Ö' | 'Ø' => 778,
        '×' | '÷' => 584,
        'ß' | 'ø' => 611,
        'æ' | 'œ' => 944,
        'ç' | 'ý' | 'ÿ' => 500,
        '‘' | '’' | '‚' => 222,
        '“' | '”' | '„' | '‹' | '›' => 333,
        '•' => 350,
        _ => 556,
    };
    width as f32
}

/// Width of `text` set in Helvetica at `size` points.
pub fn helvetica_text_width(text: &str, size: f32) -> f32 {
    text.chars().map(helvetica_width).sum::<f32>() * size / 1000.0
}

/// WinAnsi code points 0x80..=0x9F; `None` where the code page has a hole.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

/// Decode one WinAnsi byte.
pub fn decode_win_ansi(byte: u8) -> char {
    match byte {
        0x80..=0x9F => WIN_ANSI_HIGH[(byte - 0x80) as usize].unwrap_or(byte as char),
        _ => byte as char,
    }
}

/// Encode text for a WinAnsi simple font; unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch as u32 {
            0x20..=0x7E | 0xA0..=0xFF => ch as u8,
            _ => WIN_ANSI_HIGH
                .iter()
                .position(|c| *c == Some(ch))
                .map(|i| 0x80 + i as u8)
                .unwrap_or(b'?'),
        })
        .collect()
}

/// Where missing widths come from for a standard 14 font.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StandardMetrics {
    Helvetica,
    Monospace,
}

/// Everything the layout interpreter needs from a font resource.
#[derive(Debug, Clone)]
pub(crate) struct FontInfo {
    /// Composite (Type0) fonts use two-byte codes.
    two_byte: bool,
    widths: HashMap<u32, f32>,
    default_width: f32,
    standard: Option<StandardMetrics>,
    to_unicode: HashMap<u32, String>,
}

impl FontInfo {
    /// Metrics for a font we could not resolve.
    pub fn fallback() -> Self {
        Self {
            two_byte: false,
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
            standard: None,
            to_unicode: HashMap::new(),
        }
    }

    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let subtype = name_value(doc, font, b"Subtype").unwrap_or_default();
        let base_font = name_value(doc, font, b"BaseFont").unwrap_or_default();
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| match resolve(doc, obj) {
                Object::Stream(stream) => stream
                    .decompressed_content()
                    .ok()
                    .or_else(|| Some(stream.content.clone())),
                _ => None,
            })
            .map(|data| parse_to_unicode(&data))
            .unwrap_or_default();

        let info = if subtype == "Type0" {
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|obj| match resolve(doc, obj) {
                    Object::Array(items) => items.first(),
                    _ => None,
                })
                .and_then(|obj| resolve_dict(doc, obj));
            let (widths, default_width) = descendant
                .map(|cid_font| cid_widths(doc, cid_font))
                .unwrap_or_else(|| (HashMap::new(), 1000.0));
            Self {
                two_byte: true,
                widths,
                default_width,
                standard: None,
                to_unicode,
            }
        } else {
            let first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(|obj| number(resolve(doc, obj)))
                .unwrap_or(0.0) as u32;
            let mut widths = HashMap::new();
            if let Ok(obj) = font.get(b"Widths") {
                if let Object::Array(items) = resolve(doc, obj) {
                    for (i, item) in items.iter().enumerate() {
                        if let Some(w) = number(resolve(doc, item)) {
                            widths.insert(first_char + i as u32, w);
                        }
                    }
                }
            }
            let missing_width = font
                .get(b"FontDescriptor")
                .ok()
                .and_then(|obj| resolve_dict(doc, obj))
                .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
                .and_then(|obj| number(resolve(doc, obj)));
            Self {
                two_byte: false,
                widths,
                default_width: missing_width.unwrap_or(DEFAULT_WIDTH),
                standard: standard_metrics(&base_font),
                to_unicode,
            }
        };

        debug!(
            base_font = %base_font,
            two_byte = info.two_byte,
            widths = info.widths.len(),
            mapped = info.to_unicode.len(),
            "Font loaded"
        );
        info
    }

    /// Split a string operand into `(byte offset, byte length, code)`.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(usize, usize, u32)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .enumerate()
                .map(|(i, chunk)| {
                    let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    (i * 2, chunk.len(), code)
                })
                .collect()
        } else {
            bytes
                .iter()
                .enumerate()
                .map(|(i, b)| (i, 1, *b as u32))
                .collect()
        }
    }

    /// Advance width of a code, in 1/1000 em.
    pub fn width(&self, code: u32) -> f32 {
        if let Some(w) = self.widths.get(&code) {
            return *w;
        }
        match self.standard {
            Some(StandardMetrics::Monospace) => 600.0,
            Some(StandardMetrics::Helvetica) if !self.two_byte && code <= 0xFF => {
                helvetica_width(decode_win_ansi(code as u8))
            }
            _ => self.default_width,
        }
    }

    /// Unicode text of a code.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.two_byte {
            char::from_u32(code).map(String::from).unwrap_or_else(|| "\u{fffd}".into())
        } else {
            decode_win_ansi(code as u8).to_string()
        }
    }

    /// Single-byte code 32 receives word spacing.
    pub fn is_word_space(&self, len: usize, code: u32) -> bool {
        len == 1 && code == 32
    }
}

fn name_value(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(doc, dict.get(key).ok()?) {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn standard_metrics(base_font: &str) -> Option<StandardMetrics> {
    // Subset fonts carry a six-letter tag: ABCDEF+Helvetica.
    let name = base_font.split_once('+').map(|(_, rest)| rest).unwrap_or(base_font);
    if name.starts_with("Courier") {
        Some(StandardMetrics::Monospace)
    } else if ["Helvetica", "Arial", "Times", "Symbol", "ZapfDingbats"]
        .iter()
        .any(|family| name.starts_with(family))
    {
        Some(StandardMetrics::Helvetica)
    } else {
        None
    }
}

/// `/W` and `/DW` of a CIDFont.
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> (HashMap<u32, f32>, f32) {
    let default_width = cid_font
        .get(b"DW")
        .ok()
        .and_then(|obj| number(resolve(doc, obj)))
        .unwrap_or(1000.0);
    let mut widths = HashMap::new();
    let Some(Object::Array(items)) = cid_font.get(b"W").ok().map(|obj| resolve(doc, obj)) else {
        return (widths, default_width);
    };

    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])) else {
            break;
        };
        match items.get(i + 1).map(|obj| resolve(doc, obj)) {
            // c [w1 w2 ...]
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first as u32 + offset as u32, w);
                    }
                }
                i += 2;
            }
            // c_first c_last w
            Some(last) => {
                let last = number(last);
                let w = items.get(i + 2).and_then(|obj| number(resolve(doc, obj)));
                if let (Some(last), Some(w)) = (last, w) {
                    for code in first as u32..=last as u32 {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    (widths, default_width)
}

// -- ToUnicode ------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) != Some(&b'<') => {
                let end = data[i..].iter().position(|b| *b == b'>').map(|p| i + p);
                let Some(end) = end else { break };
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(|b| b.is_ascii_hexdigit())
                    .collect();
                tokens.push(CMapToken::Hex(hex_bytes(&digits)));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::Open);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::Close);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(CMapToken::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
            let lo = pair
                .get(1)
                .and_then(|d| (*d as char).to_digit(16))
                .unwrap_or(0) as u8;
            (hi << 4) | lo
        })
        .collect()
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| ((pair[0] as u16) << 8) | pair.get(1).copied().unwrap_or(0) as u16)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub(crate) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(word) if word == "beginbfchar" => {
                i += 1;
                while let (Some(CMapToken::Hex(src)), Some(CMapToken::Hex(dst))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    map.insert(code_of(src), utf16_text(dst));
                    i += 2;
                }
            }
            CMapToken::Word(word) if word == "beginbfrange" => {
                i += 1;
                while let (Some(CMapToken::Hex(lo)), Some(CMapToken::Hex(hi))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    match tokens.get(i + 2) {
                        Some(CMapToken::Hex(dst)) => {
                            // Increment the last UTF-16 unit across the range.
                            let mut prefix = utf16_text(dst);
                            if let Some(last) = prefix.pop() {
                                for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                                    if let Some(ch) = char::from_u32(last as u32 + (code - lo)) {
                                        let mut text = prefix.clone();
                                        text.push(ch);
                                        map.insert(code, text);
                                    }
                                }
                            }
                            i += 3;
                        }
                        Some(CMapToken::Open) => {
                            let mut j = i + 3;
                            let mut code = lo;
                            while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                                if code <= hi {
                                    map.insert(code, utf16_text(dst));
                                }
                                code += 1;
                                j += 1;
                            }
                            // Skip the closing bracket.
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn helvetica_widths_match_afm() {
        assert_eq!(helvetica_width(' '), 278.0);
        assert_eq!(helvetica_width('@'), 1015.0);
        assert_eq!(helvetica_width('W'), 944.0);
        assert_eq!(helvetica_width('i'), 222.0);
        assert_eq!(helvetica_width('~'), 584.0);
        assert_eq!(helvetica_width('é'), 556.0);
        // "Hi" = 722 + 222
        assert!((helvetica_text_width("Hi", 10.0) - 9.44).abs() < 1e-4);
    }

    #[test]
    fn win_ansi_round_trip_of_specials() {
        let bytes = encode_win_ansi("€ café – ☃");
        assert_eq!(bytes, vec![0x80, b' ', b'c', b'a', b'f', 0xE9, b' ', 0x96, b' ', b'?']);
        let text: String = bytes[..8].iter().map(|b| decode_win_ansi(*b)).collect();
        assert_eq!(text, "€ café –");
    }

    #[test]
    fn parses_bfchar_and_bfrange() {
        let cmap = b"/CIDInit /ProcSet findresource begin\n\
            2 beginbfchar\n<0003> <0020>\n<0011> <0041>\nendbfchar\n\
            2 beginbfrange\n<0020> <0022> <0061>\n<0030> <0031> [<0078> <0079>]\nendbfrange\nend";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x0003).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x0011).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x0021).map(String::as_str), Some("b"));
        assert_eq!(map.get(&0x0022).map(String::as_str), Some("c"));
        assert_eq!(map.get(&0x0031).map(String::as_str), Some("y"));
    }

    #[test]
    fn two_byte_codes_split_in_pairs() {
        let mut font = FontInfo::fallback();
        font.two_byte = true;
        assert_eq!(font.codes(&[0, 0x41, 0, 0x42]), vec![(0, 2, 0x41), (2, 2, 0x42)]);
    }

    #[test]
    fn standard_font_widths_fill_gaps() {
        let doc = Document::with_version("1.5");
        let font = lopdf::dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ABCDEF+Helvetica-Bold",
        };
        let info = FontInfo::load(&doc, &font);
        assert_eq!(info.width(b'H' as u32), 722.0);

        let courier = lopdf::dictionary! { "Subtype" => "Type1", "BaseFont" => "Courier" };
        assert_eq!(FontInfo::load(&doc, &courier).width(b'i' as u32), 600.0);

        let custom = lopdf::dictionary! { "Subtype" => "TrueType", "BaseFont" => "Gentium" };
        assert_eq!(FontInfo::load(&doc, &custom).width(b'i' as u32), DEFAULT_WIDTH);
    }
}
