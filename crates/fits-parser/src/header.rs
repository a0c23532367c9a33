//! FITS header cards.
//!
//! cfitsio hands header records over as 80-character cards. Value cards
//! carry `= ` in columns 9-10; everything else (COMMENT, HISTORY, blank
//! keywords) is commentary. Long strings span `CONTINUE` cards.

use std::fmt;

use crate::error::{FitsError, FitsResult};

/// Size of a header card.
pub const CARD_SIZE: usize = 80;

/// Longest escaped string fragment that fits one card with its `&`.
const MAX_FRAGMENT: usize = 66;

/// Openings of the two `COMMENT` cards cfitsio writes into new primary
/// headers.
const CFITSIO_BOILERPLATE: [&str; 2] = [
    "FITS (Flexible Image Transport System) format is",
    "and Astrophysics', volume 376, page 359",
];

/// Keywords that describe array layout, compression or checksums.
///
/// cfitsio owns these: they are dropped when a file is read and never
/// copied when one is written.
pub fn is_structural(keyword: &str) -> bool {
    const EXACT: [&str; 27] = [
        "SIMPLE", "XTENSION", "BITPIX", "EXTEND", "PCOUNT", "GCOUNT", "BSCALE", "BZERO",
        "BLANK", "TFIELDS", "THEAP", "EXTNAME", "CHECKSUM", "DATASUM", "ZIMAGE", "ZBITPIX",
        "ZCMPTYPE", "ZQUANTIZ", "ZDITHER0", "ZSIMPLE", "ZEXTEND", "ZBLANK", "ZTENSION",
        "ZPCOUNT", "ZGCOUNT", "ZHECKSUM", "ZDATASUM",
    ];
    // Followed by an axis or column number, or nothing.
    const NUMBERED: [&str; 8] = [
        "NAXIS", "ZNAXIS", "ZTILE", "ZNAME", "ZVAL", "TTYPE", "TFORM", "TUNIT",
    ];
    let key = keyword.to_ascii_uppercase();
    EXACT.contains(&key.as_str())
        || NUMBERED.iter().any(|prefix| {
            key.strip_prefix(prefix)
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
        })
}

/// Typed value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Real(v) => Some(*v),
            HeaderValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(v) => Some(*v),
            HeaderValue::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Logical(true) => f.write_str("T"),
            HeaderValue::Logical(false) => f.write_str("F"),
            HeaderValue::Integer(v) => write!(f, "{}", v),
            HeaderValue::Real(v) => f.write_str(&format_real(*v)),
            HeaderValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        HeaderValue::Logical(v)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Integer(v)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Real(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Text(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::Text(v)
    }
}

/// A single header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    /// `None` for commentary cards and undefined values
    pub value: Option<HeaderValue>,
    /// Inline comment, or the text of a commentary card
    pub comment: Option<String>,
}

impl Card {
    pub fn is_commentary(&self) -> bool {
        self.value.is_none()
            && matches!(self.keyword.as_str(), "COMMENT" | "HISTORY" | "")
    }
}

/// Ordered FITS header.
///
/// Keyword lookups are case-insensitive. Setting an existing keyword
/// replaces its value in place so card order is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        let key = keyword.to_ascii_uppercase();
        self.cards
            .iter()
            .find(|c| c.keyword == key && c.value.is_some())
            .and_then(|c| c.value.as_ref())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_bool(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(HeaderValue::as_bool)
    }

    /// Set a keyword, replacing an existing value or appending a new card.
    pub fn set(&mut self, keyword: &str, value: impl Into<HeaderValue>) {
        let key = keyword.to_ascii_uppercase();
        let value = value.into();
        match self
            .cards
            .iter_mut()
            .find(|c| c.keyword == key && !c.is_commentary())
        {
            Some(card) => card.value = Some(value),
            None => self.cards.push(Card {
                keyword: key,
                value: Some(value),
                comment: None,
            }),
        }
    }

    /// Set a keyword together with its inline comment.
    pub fn set_with_comment(
        &mut self,
        keyword: &str,
        value: impl Into<HeaderValue>,
        comment: &str,
    ) {
        self.set(keyword, value);
        let key = keyword.to_ascii_uppercase();
        if let Some(card) = self.cards.iter_mut().find(|c| c.keyword == key) {
            card.comment = Some(comment.to_string());
        }
    }

    /// Remove every value card with this keyword. Returns the first removed value.
    pub fn remove(&mut self, keyword: &str) -> Option<HeaderValue> {
        let key = keyword.to_ascii_uppercase();
        let mut removed = None;
        self.cards.retain(|c| {
            if c.keyword == key && !c.is_commentary() {
                if removed.is_none() {
                    removed = c.value.clone();
                }
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn add_history(&mut self, text: &str) {
        self.push_commentary("HISTORY", text);
    }

    pub fn add_comment(&mut self, text: &str) {
        self.push_commentary("COMMENT", text);
    }

    /// HISTORY card texts in order.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.cards
            .iter()
            .filter(|c| c.keyword == "HISTORY")
            .filter_map(|c| c.comment.as_deref())
    }

    fn push_commentary(&mut self, keyword: &str, text: &str) {
        // Commentary text is limited to 72 characters per card.
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            self.cards.push(Card {
                keyword: keyword.to_string(),
                value: None,
                comment: Some(String::new()),
            });
            return;
        }
        for chunk in chars.chunks(72) {
            self.cards.push(Card {
                keyword: keyword.to_string(),
                value: None,
                comment: Some(chunk.iter().collect()),
            });
        }
    }

    /// Append a card as-is.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Iterate over value cards as `(keyword, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards
            .iter()
            .filter_map(|c| c.value.as_ref().map(|v| (c.keyword.as_str(), v)))
    }

    /// Drop every card [`is_structural`] matches, and the boilerplate
    /// `COMMENT` lines cfitsio adds to each primary header it creates.
    pub fn strip_structure(&mut self) {
        self.cards.retain(|c| {
            if c.is_commentary() {
                let text = c.comment.as_deref().unwrap_or("").trim_start();
                return !(c.keyword == "COMMENT"
                    && CFITSIO_BOILERPLATE.iter().any(|p| text.starts_with(p)));
            }
            !is_structural(&c.keyword)
        });
    }

    /// Build a header from raw 80-character records.
    ///
    /// Records may be shorter than a full card; an `END` record stops the
    /// scan. `CONTINUE` records extend the preceding long string.
    pub fn from_records<I, S>(records: I) -> FitsResult<Header>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut header = Header::new();
        let mut pending_continue: Option<usize> = None;

        for (offset, record) in records.into_iter().enumerate() {
            let index = offset + 1;
            let raw = record.as_ref();
            if !raw.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
                return Err(FitsError::MalformedCard {
                    index,
                    message: "non-printable character".to_string(),
                });
            }
            let text = format!("{:<width$}", raw, width = CARD_SIZE);
            let keyword = text[..8].trim_end().to_string();

            if keyword == "END" {
                break;
            }

            if keyword == "CONTINUE" {
                if let Some(pos) = pending_continue {
                    let (fragment, comment) = parse_string(&text[8..], index)?;
                    let continues = append_continued(&mut header.cards[pos], fragment, comment);
                    pending_continue = continues.then_some(pos);
                    continue;
                }
            }

            let card = parse_card(keyword, &text, index)?;
            pending_continue = match &card.value {
                Some(HeaderValue::Text(s)) if s.ends_with('&') => Some(header.cards.len()),
                _ => None,
            };
            header.cards.push(card);
        }

        Ok(header)
    }

    /// The header as 80-character records, without an `END` record.
    pub fn records(&self) -> Vec<String> {
        self.cards.iter().flat_map(format_card).collect()
    }
}

fn append_continued(card: &mut Card, fragment: String, comment: Option<String>) -> bool {
    let continues = fragment.ends_with('&');
    if let Some(HeaderValue::Text(s)) = card.value.as_mut() {
        s.pop();
        s.push_str(&fragment);
    }
    if comment.is_some() {
        card.comment = comment;
    }
    continues
}

fn parse_card(keyword: String, text: &str, index: usize) -> FitsResult<Card> {
    let has_value = text.len() >= 10 && &text[8..10] == "= " && !is_commentary_keyword(&keyword);
    if !has_value {
        let body = text.get(8..).unwrap_or("").trim_end().to_string();
        return Ok(Card {
            keyword,
            value: None,
            comment: Some(body),
        });
    }

    let rest = &text[10..];
    let trimmed = rest.trim_start();
    if trimmed.starts_with('\'') {
        let (s, comment) = parse_string(rest, index)?;
        return Ok(Card {
            keyword,
            value: Some(HeaderValue::Text(s)),
            comment,
        });
    }

    let (token, comment) = match trimmed.find('/') {
        Some(pos) => (
            trimmed[..pos].trim(),
            Some(trimmed[pos + 1..].trim().to_string()),
        ),
        None => (trimmed.trim(), None),
    };

    let value = parse_value_token(token, index)?;
    Ok(Card {
        keyword,
        value,
        comment,
    })
}

fn is_commentary_keyword(keyword: &str) -> bool {
    matches!(keyword, "COMMENT" | "HISTORY" | "")
}

fn parse_value_token(token: &str, index: usize) -> FitsResult<Option<HeaderValue>> {
    if token.is_empty() {
        return Ok(None);
    }
    match token {
        "T" => return Ok(Some(HeaderValue::Logical(true))),
        "F" => return Ok(Some(HeaderValue::Logical(false))),
        _ => {}
    }
    if let Ok(v) = token.parse::<i64>() {
        return Ok(Some(HeaderValue::Integer(v)));
    }
    let normalized = token.replace(['D', 'd'], "E");
    if let Ok(v) = normalized.parse::<f64>() {
        return Ok(Some(HeaderValue::Real(v)));
    }
    if token.starts_with('(') && token.ends_with(')') {
        // Complex values are kept verbatim.
        return Ok(Some(HeaderValue::Text(token.to_string())));
    }
    Err(FitsError::MalformedCard {
        index,
        message: format!("unparseable value '{}'", token),
    })
}

/// Parse a quoted string value (with `''` escapes) and an optional comment.
fn parse_string(field: &str, index: usize) -> FitsResult<(String, Option<String>)> {
    let field = field.trim_start();
    let mut chars = field.char_indices().peekable();
    match chars.next() {
        Some((_, '\'')) => {}
        _ => {
            return Err(FitsError::MalformedCard {
                index,
                message: "expected quoted string".to_string(),
            })
        }
    }

    let mut value = String::new();
    let mut end = None;
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                value.push('\'');
                chars.next();
            } else {
                end = Some(i + 1);
                break;
            }
        } else {
            value.push(c);
        }
    }

    let end = end.ok_or_else(|| FitsError::MalformedCard {
        index,
        message: "unterminated string".to_string(),
    })?;

    let remainder = field[end..].trim();
    let comment = remainder
        .strip_prefix('/')
        .map(|c| c.trim().to_string());

    Ok((value.trim_end().to_string(), comment))
}

fn format_real(v: f64) -> String {
    if v == 0.0 {
        return "0.0".to_string();
    }
    let abs = v.abs();
    if (1e-4..1e15).contains(&abs) {
        let s = format!("{:?}", v);
        if s.contains('.') || s.contains('e') {
            s.replace('e', "E")
        } else {
            format!("{}.0", s)
        }
    } else {
        format!("{:E}", v)
    }
}

fn format_card(card: &Card) -> Vec<String> {
    if let Some(HeaderValue::Text(text)) = &card.value {
        let escaped = text.replace('\'', "''");
        if escaped.len() > MAX_FRAGMENT + 2 {
            return format_long_string(&card.keyword, text);
        }
    }

    let mut line = match &card.value {
        None if card.is_commentary() => format!(
            "{:<8}{}",
            card.keyword,
            card.comment.as_deref().unwrap_or("")
        ),
        None => match &card.comment {
            Some(comment) => format!("{:<8}= {:<20} / {}", card.keyword, "", comment),
            None => format!("{:<8}= ", card.keyword),
        },
        Some(value @ HeaderValue::Text(_)) => {
            let quoted = value.to_string();
            // Strings are at least 8 characters between the quotes.
            let padded = if quoted.len() < 10 {
                let inner = &quoted[1..quoted.len() - 1];
                format!("'{:<8}'", inner)
            } else {
                quoted
            };
            format!("{:<8}= {:<20}", card.keyword, padded)
        }
        Some(value) => format!("{:<8}= {:>20}", card.keyword, value.to_string()),
    };

    if card.value.is_some() {
        if let Some(comment) = &card.comment {
            line.push_str(" / ");
            line.push_str(comment);
        }
    }

    vec![fit_card(line)]
}

/// Split a long string over `CONTINUE` cards; every fragment but the last
/// ends in `&`. The inline comment is dropped.
fn format_long_string(keyword: &str, text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        let width = if c == '\'' { 2 } else { 1 };
        if current.len() + width > MAX_FRAGMENT {
            fragments.push(std::mem::take(&mut current));
        }
        if c == '\'' {
            current.push_str("''");
        } else {
            current.push(c);
        }
    }
    fragments.push(current);

    let last = fragments.len() - 1;
    fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            let marker = if i < last { "&" } else { "" };
            let line = if i == 0 {
                format!("{:<8}= '{}{}'", keyword, fragment, marker)
            } else {
                format!("CONTINUE  '{}{}'", fragment, marker)
            };
            fit_card(line)
        })
        .collect()
}

fn fit_card(line: String) -> String {
    let mut line: String = line.chars().take(CARD_SIZE).collect();
    while line.len() < CARD_SIZE {
        line.push(' ');
    }
    line
}
