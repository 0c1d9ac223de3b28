use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub type DocNum = u32;

/// One structural zone of a page. Variant order is the on-disk key order
/// (b < c < i < l < r < t), so the derived `Ord` is the index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Body,
    Category,
    Infobox,
    Links,
    References,
    Title,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Body,
        Field::Category,
        Field::Infobox,
        Field::Links,
        Field::References,
        Field::Title,
    ];

    pub fn acronym(self) -> char {
        match self {
            Field::Body => 'b',
            Field::Category => 'c',
            Field::Infobox => 'i',
            Field::Links => 'l',
            Field::References => 'r',
            Field::Title => 't',
        }
    }

    pub fn from_acronym(c: char) -> Option<Field> {
        match c {
            'b' => Some(Field::Body),
            'c' => Some(Field::Category),
            'i' => Some(Field::Infobox),
            'l' => Some(Field::Links),
            'r' => Some(Field::References),
            't' => Some(Field::Title),
            _ => None,
        }
    }

    /// Slot of this field in a per-document counter array.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Scoring weight applied to every posting of this field.
    pub fn weight(self) -> f64 {
        match self {
            Field::Title => 100.0,
            Field::Infobox => 50.0,
            Field::Category | Field::Body => 30.0,
            Field::Links | Field::References => 10.0,
        }
    }
}

/// A (term, field) pair. Ordered by term bytes first, then field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub term: String,
    pub field: Field,
}

impl IndexKey {
    pub fn new(term: impl Into<String>, field: Field) -> Self {
        Self { term: term.into(), field }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse `term-f`. Splits on the last `-` so hyphenated terms survive.
    pub fn decode(s: &str) -> Option<IndexKey> {
        let (term, acronym) = s.rsplit_once('-')?;
        let mut chars = acronym.chars();
        let field = Field::from_acronym(chars.next()?)?;
        if chars.next().is_some() || term.is_empty() {
            return None;
        }
        Some(IndexKey { term: term.to_string(), field })
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.term, self.field.acronym())
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term
            .as_bytes()
            .cmp(other.term.as_bytes())
            .then(self.field.cmp(&other.field))
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_num: DocNum,
    pub tf: u32,
}

/// A page as handed over by a document source, before numbering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, alias = "id")]
    pub doc_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "body")]
    pub text: String,
}

/// A numbered, case-folded page. Only lives for the duration of one ingest.
#[derive(Debug, Clone)]
pub struct Document {
    pub doc_num: DocNum,
    pub doc_id: String,
    pub title: String,
    pub text: String,
}

impl Document {
    pub fn new(doc_num: DocNum, raw: RawDocument) -> Self {
        Self {
            doc_num,
            doc_id: raw.doc_id,
            title: raw.title.to_lowercase(),
            text: raw.text.to_lowercase(),
        }
    }
}

/// Split an index line into its encoded key and posting suffix.
/// Returns `None` for blank or malformed lines.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (key, postings) = line.split_once(':')?;
    if key.is_empty() {
        return None;
    }
    Some((key, postings))
}

/// Decode a `d<doc>-<tf>|d<doc>-<tf>` posting suffix. Malformed entries are skipped.
pub fn parse_postings(s: &str) -> Vec<Posting> {
    s.trim()
        .split('|')
        .filter_map(|entry| {
            let (doc, tf) = entry.strip_prefix('d')?.split_once('-')?;
            Some(Posting { doc_num: doc.parse().ok()?, tf: tf.parse().ok()? })
        })
        .collect()
}

pub fn format_postings(postings: &[Posting]) -> String {
    let mut out = String::with_capacity(postings.len() * 8);
    for (i, p) in postings.iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        out.push('d');
        out.push_str(&p.doc_num.to_string());
        out.push('-');
        out.push_str(&p.tf.to_string());
    }
    out
}
