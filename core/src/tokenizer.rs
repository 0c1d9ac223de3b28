use anyhow::{Context, Result};
use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Tokens that are a substring of this string are treated as punctuation noise.
const PUNCTUATION: &str = ".,|+-@~`:;?()*\"'=\\&/<>[]{}#!%^$ ";
const MAX_TOKEN_CHARS: usize = 30;

lazy_static! {
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\'' || c == '-'
}

fn is_noise(token: &str) -> bool {
    let len = token.chars().count();
    PUNCTUATION.contains(token) || len <= 1 || len >= MAX_TOKEN_CHARS
}

/// Split text into word-like spans.
///
/// At each position three rules are tried in order: an ASCII acronym of two
/// or more capitals not followed by a lowercase letter, a capitalised word
/// directly followed by another capital (camel-case prefix), and finally a
/// maximal run of word characters, apostrophes and hyphens.
pub fn tokenize(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |&(b, _)| b);
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match match_at(&chars, i) {
            Some(len) => {
                tokens.push(&text[byte_at(i)..byte_at(i + len)]);
                i += len;
            }
            None => i += 1,
        }
    }
    tokens
}

fn match_at(chars: &[(usize, char)], i: usize) -> Option<usize> {
    let is_upper = |j: usize| chars.get(j).is_some_and(|&(_, c)| c.is_ascii_uppercase());
    let is_lower = |j: usize| chars.get(j).is_some_and(|&(_, c)| c.is_ascii_lowercase());

    let mut run = 0;
    while is_upper(i + run) {
        run += 1;
    }
    if run >= 2 {
        if !is_lower(i + run) {
            return Some(run);
        }
        // give back the capital that starts the next word
        if run >= 3 {
            return Some(run - 1);
        }
    }
    if run == 1 {
        let mut j = i + 1;
        while is_lower(j) {
            j += 1;
        }
        if j > i + 1 && is_upper(j) {
            return Some(j - i);
        }
    }

    let mut j = i;
    while chars.get(j).is_some_and(|&(_, c)| is_word_char(c)) {
        j += 1;
    }
    (j > i).then_some(j - i)
}

/// Tokenizer + stopword/noise filter + English stemmer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stopwords: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_stopwords(STOPWORDS.iter().copied())
    }
}

impl Normalizer {
    pub fn with_stopwords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { stopwords: words.into_iter().map(Into::into).collect() }
    }

    /// Load a stopword list, one word per line.
    pub fn from_stopword_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading stopword list {}", path.display()))?;
        let words: Vec<&str> = content.lines().map(str::trim).filter(|w| !w.is_empty()).collect();
        tracing::debug!(count = words.len(), path = %path.display(), "loaded stopwords");
        Ok(Self::with_stopwords(words))
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Tokenize, drop stopwords and noise, then stem. Order is preserved.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|t| !self.is_stopword(t) && !is_noise(t))
            .map(|t| STEMMER.stem(t).into_owned())
            .collect()
    }
}
