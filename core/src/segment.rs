//! Splits a page into the six indexed fields.
//!
//! A page is laid out as: lead body, infobox, descriptive body, external
//! links, references, categories. Section starts are located with marker
//! regexes; anything not claimed by a section belongs to the body.

use crate::index::Field;
use crate::tokenizer::Normalizer;
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::{Index, Range};

lazy_static! {
    static ref INFOBOX: Regex = Regex::new(r"(?i)\{\{\s*infobox").expect("valid regex");
    static ref CATEGORY: Regex = Regex::new(r"(?i)\[\[\s*category\s*:").expect("valid regex");
    static ref REFERENCES: Regex = Regex::new(r"(?i)={2,3}\s*references\s*={2,3}").expect("valid regex");
    static ref EXTERNAL_LINKS: Regex =
        Regex::new(r"(?i)={2,3}\s*external\s*links\s*={2,3}").expect("valid regex");
    static ref TEMPLATE: Regex = Regex::new(r"\{\{.*\}\}").expect("valid regex");
}

/// Byte ranges of each section within a page's text.
///
/// The ranges `0..infobox.start`, `infobox`, `infobox.end..links.start`,
/// `links`, `references` and `category` tile the text without gaps or overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections {
    pub infobox: Range<usize>,
    pub links: Range<usize>,
    pub references: Range<usize>,
    pub category: Range<usize>,
}

impl Sections {
    pub fn body(&self) -> [Range<usize>; 2] {
        [0..self.infobox.start, self.infobox.end..self.links.start]
    }
}

/// Locate section boundaries. Missing markers yield empty sections.
pub fn locate_sections(text: &str) -> Sections {
    let infobox = infobox_span(text);
    let category_start = find_in(&CATEGORY, text, infobox.end..text.len()).unwrap_or(text.len());
    let reference_start = find_in(&REFERENCES, text, infobox.end..category_start).unwrap_or(category_start);
    let link_start = find_in(&EXTERNAL_LINKS, text, infobox.end..reference_start).unwrap_or(reference_start);
    Sections {
        infobox,
        links: link_start..reference_start,
        references: reference_start..category_start,
        category: category_start..text.len(),
    }
}

fn find_in(re: &Regex, text: &str, window: Range<usize>) -> Option<usize> {
    re.find(&text[window.clone()]).map(|m| window.start + m.start())
}

fn infobox_span(text: &str) -> Range<usize> {
    let Some(m) = INFOBOX.find(text) else {
        return 0..0;
    };
    let mut depth = 0usize;
    for (i, b) in text.as_bytes()[m.start()..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return m.start()..m.start() + i + 1;
                }
            }
            _ => {}
        }
    }
    m.start()..text.len()
}

fn strip_non_word(token: &str) -> &str {
    token.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'))
}

/// Normalize `content` and trim non-word characters off each token's edges,
/// dropping tokens left empty. Indexed and queried terms both go through here.
pub fn index_terms(normalizer: &Normalizer, content: &str) -> Vec<String> {
    normalizer
        .normalize(content)
        .into_iter()
        .filter_map(|t| {
            let stripped = strip_non_word(&t);
            (!stripped.is_empty()).then(|| stripped.to_string())
        })
        .collect()
}

/// Normalized tokens per field, duplicates kept.
#[derive(Debug, Clone, Default)]
pub struct FieldTokens {
    buckets: [Vec<String>; 6],
}

impl FieldTokens {
    pub fn iter(&self) -> impl Iterator<Item = (Field, &[String])> + '_ {
        Field::ALL.iter().map(move |&f| (f, self.buckets[f.index()].as_slice()))
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

impl Index<Field> for FieldTokens {
    type Output = [String];

    fn index(&self, field: Field) -> &[String] {
        &self.buckets[field.index()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldSegmenter {
    normalizer: Normalizer,
}

impl FieldSegmenter {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Segment an already lower-cased page.
    pub fn segment(&self, title: &str, text: &str) -> FieldTokens {
        let sections = locate_sections(text);
        let mut out = FieldTokens::default();

        out.buckets[Field::Title.index()] = self.tokens(title);
        out.buckets[Field::Infobox.index()] =
            self.tokens(&INFOBOX.replace_all(&text[sections.infobox.clone()], " "));
        out.buckets[Field::Category.index()] =
            self.tokens(&CATEGORY.replace_all(&text[sections.category.clone()], " "));
        out.buckets[Field::References.index()] =
            self.tokens(&REFERENCES.replace_all(&text[sections.references.clone()], " "));
        out.buckets[Field::Links.index()] =
            self.tokens(&EXTERNAL_LINKS.replace_all(&text[sections.links.clone()], " "));

        let [lead, rest] = sections.body();
        let body = format!("{}\n{}", &text[lead], &text[rest]);
        out.buckets[Field::Body.index()] = self.tokens(&TEMPLATE.replace_all(&body, " "));
        out
    }

    fn tokens(&self, content: &str) -> Vec<String> {
        index_terms(&self.normalizer, content)
    }
}
