//! Filters that decide which finished records are dropped from the output

use crate::{record::NgramRecord, tags::WordTag, Result};
use anyhow::Context;
use std::num::NonZeroUsize;

/// Length of the German word
/// "Donaudampfschifffahrtselektrizitätenhauptbetriebswerkbauunterbeamtengesellschaft"
const DEFAULT_MAX_WORD_LENGTH: usize = 80;

/// Stateless predicate over a finished record
///
/// Filters never touch shared mutable state, so any number of workers may
/// evaluate them concurrently on independent records. A record is dropped as
/// soon as one configured filter rejects it.
pub trait NgramFilter: Send + Sync {
    /// Truth that this record should be dropped rather than sinked
    fn should_reject(&self, record: &NgramRecord) -> bool;
}

/// Rejects records whose tag sequence contains any of the given tags
///
/// Records without a tag sequence always pass.
pub struct ContainsTagsFilter {
    tags: Box<[WordTag]>,
}
//
impl ContainsTagsFilter {
    /// Reject records carrying any of these tags
    pub fn new(tags: impl Into<Box<[WordTag]>>) -> Self {
        Self { tags: tags.into() }
    }

    /// Decode the rejected tags from their serialized character codes
    pub fn from_codes(codes: &str) -> Result<Self> {
        let tags = codes
            .chars()
            .map(|code| {
                WordTag::from_code(code)
                    .with_context(|| format!("unrecognized tag code {code:?} in tag filter"))
            })
            .collect::<Result<Box<[WordTag]>>>()?;
        Ok(Self::new(tags))
    }
}
//
impl NgramFilter for ContainsTagsFilter {
    fn should_reject(&self, record: &NgramRecord) -> bool {
        self.tags.iter().any(|&tag| record.contains_tag(tag))
    }
}

/// Rejects records where any word is longer than a maximum character count
pub struct WordLengthFilter {
    max_length: usize,
}
//
impl WordLengthFilter {
    /// Reject records with any word longer than `max_length` characters
    pub fn new(max_length: NonZeroUsize) -> Self {
        Self {
            max_length: max_length.get(),
        }
    }
}
//
impl Default for WordLengthFilter {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_WORD_LENGTH,
        }
    }
}
//
impl NgramFilter for WordLengthFilter {
    fn should_reject(&self, record: &NgramRecord) -> bool {
        record
            .words
            .iter()
            .any(|word| word.chars().count() > self.max_length)
    }
}

/// Rejects records where some non-empty word contains no letter in any script
///
/// Empty words (produced by solo tag tokens) never trigger this filter.
pub struct HasNoLettersFilter;
//
impl NgramFilter for HasNoLettersFilter {
    fn should_reject(&self, record: &NgramRecord) -> bool {
        record
            .words
            .iter()
            .any(|word| !word.is_empty() && !word.chars().any(char::is_alphabetic))
    }
}

/// Record filtering configuration
///
/// Any subset of the options may be supplied; absent options install no
/// filter at all.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterOptions {
    /// Maximum accepted word length in characters
    pub max_word_length: Option<NonZeroUsize>,

    /// Serialized codes of the tags whose records are dropped
    pub rejected_tag_codes: Option<Box<str>>,

    /// Drop records where some word has no letters
    pub reject_no_letter_words: bool,
}
//
impl FilterOptions {
    /// Install the configured filter chain
    pub fn build(&self) -> Result<Vec<Box<dyn NgramFilter>>> {
        let mut filters = Vec::<Box<dyn NgramFilter>>::new();
        if let Some(max_length) = self.max_word_length {
            filters.push(Box::new(WordLengthFilter::new(max_length)));
        }
        if let Some(codes) = &self.rejected_tag_codes {
            filters.push(Box::new(ContainsTagsFilter::from_codes(codes)?));
        }
        if self.reject_no_letter_words {
            filters.push(Box::new(HasNoLettersFilter));
        }
        Ok(filters)
    }
}
