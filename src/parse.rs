//! Parsing of raw Google Books Ngram data lines
//!
//! A raw line is `<ngram-with-optional-tags>\t<year,matches,volumes>...`,
//! where the first field holds space-separated word tokens and every further
//! field is one year observation. Parsing a line folds all of its year
//! observations into a single [`NgramRecord`].

use crate::{
    record::{MalformedLine, NgramRecord},
    tags::WordTag,
    Year,
};

/// Reduce one raw corpus line to an aggregated record
pub fn parse_line(line: &str) -> Result<NgramRecord, MalformedLine> {
    let fields = line.split('\t').collect::<Vec<_>>();
    if fields.len() < 2 {
        return Err(MalformedLine::TooFewFields { line: line.into() });
    }

    let (words, tags) = split_ngram_and_tags(fields[0]);
    let mut record = NgramRecord::new(words, tags);
    for field in &fields[1..] {
        let (year, match_count, volume_count) =
            parse_year_observation(field).ok_or_else(|| MalformedLine::InvalidYearData {
                field: (*field).into(),
                line: line.into(),
            })?;
        record.fold(year, match_count, volume_count);
    }
    Ok(record)
}

/// Split the ngram+tags field into words and their tag sequence
///
/// The tag sequence is absent (not all-[`WordTag::None`]) when no token of
/// the field carried a recognizable tag.
fn split_ngram_and_tags(ngram_with_tags: &str) -> (Box<[Box<str>]>, Option<Box<[WordTag]>>) {
    let tokens = ngram_with_tags.split(' ');
    let mut words = Vec::new();
    let mut tags = Vec::new();
    let mut contains_tags = false;
    for token in tokens {
        match split_token(token) {
            Some((word, tag)) => {
                words.push(word.into());
                tags.push(tag);
                contains_tags = true;
            }
            None => {
                words.push(token.into());
                tags.push(WordTag::None);
            }
        }
    }
    (words.into(), contains_tags.then(|| tags.into()))
}

/// Try to interpret one token as a tagged word
///
/// Two shapes qualify, tried in order:
/// - `Word_NOUN`: the last underscore separates a nonempty word from a
///   nonempty tag mnemonic,
/// - `_NOUN_`: a mnemonic flanked by underscores stands alone, its word is
///   the empty string.
///
/// Shape and vocabulary act as one combined gate: a token of either shape
/// whose mnemonic is not in the vocabulary is a literal word, so `_END`
/// stays a word while `_END_` tags an empty word, and `_FOO_` stays a word
/// because `FOO` is not a mnemonic.
fn split_token(token: &str) -> Option<(&str, WordTag)> {
    let last_underscore = token.rfind('_')?;
    if last_underscore > 0 && last_underscore < token.len() - 1 {
        let mnemonic = &token[last_underscore + 1..];
        return WordTag::from_mnemonic(mnemonic).map(|tag| (&token[..last_underscore], tag));
    }
    let mnemonic = token.strip_prefix('_')?.strip_suffix('_')?;
    if mnemonic.is_empty() || mnemonic.contains('_') {
        return None;
    }
    WordTag::from_mnemonic(mnemonic).map(|tag| ("", tag))
}

/// Decode one `year,matchCount,volumeCount` field
fn parse_year_observation(field: &str) -> Option<(Year, u64, u64)> {
    let mut numbers = field.split(',');
    let year = numbers.next()?.parse().ok()?;
    let match_count = numbers.next()?.parse().ok()?;
    let volume_count = numbers.next()?.parse().ok()?;
    if numbers.next().is_some() {
        return None;
    }
    Some((year, match_count, volume_count))
}
