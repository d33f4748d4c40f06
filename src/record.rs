//! Aggregated per-ngram usage records and their reduced on-disk form

use crate::{tags::WordTag, Year};
use thiserror::Error;

/// Header line of a reduced corpus file
///
/// A run whose first input line equals this header re-ingests previously
/// reduced data instead of raw Google Books data.
pub const REDUCED_HEADER: &str =
    "Ngram\tTags\tMatchCount\tVolumeCount\tFirstYear\tLastYear\tYearCount\tTopYear\tTopYearMatchCount";

/// Structural violation in a raw or reduced input line
///
/// These are fatal for the whole run: the pipeline has no skip-and-continue
/// mechanism.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum MalformedLine {
    #[error("invalid input line {line:?}: at least 2 tab-separated fields expected")]
    TooFewFields { line: Box<str> },

    #[error("invalid year data {field:?} in input line {line:?}: 3 comma-separated integers expected")]
    InvalidYearData { field: Box<str>, line: Box<str> },

    #[error("invalid reduced line {line:?}: 9 tab-separated columns expected, found {found}")]
    WrongColumnCount { found: usize, line: Box<str> },

    #[error("unrecognized tag code {code:?} in reduced line {line:?}")]
    UnknownTagCode { code: char, line: Box<str> },

    #[error("tag count does not match word count in reduced line {line:?}")]
    TagCountMismatch { line: Box<str> },

    #[error("invalid number {value:?} in reduced line {line:?}")]
    InvalidNumber { value: Box<str>, line: Box<str> },
}

/// Compact aggregate of every year observation recorded for one ngram
///
/// A record is built by a single worker, by folding the year observations of
/// one input line in order of appearance. Once built it is read-only: filters
/// and sinks only ever observe finished records.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NgramRecord {
    /// Words of the ngram, in order (the order IS the ngram)
    pub words: Box<[Box<str>]>,

    /// Part-of-speech tags aligned 1:1 with `words`, or `None` when no token
    /// of the source line carried a recognizable tag
    pub tags: Option<Box<[WordTag]>>,

    /// Total number of matches across all folded years
    pub match_count: u64,

    /// Total number of books with matches across all folded years
    pub volume_count: u64,

    /// Earliest folded year
    pub first_year: Year,

    /// Latest folded year
    pub last_year: Year,

    /// Number of year observations folded into this record
    pub year_count: u32,

    /// Year with the strictly largest single-year match count
    ///
    /// Ties keep the earliest-seen year: a later year only takes over when
    /// its match count is strictly greater.
    pub top_year: Year,

    /// Match count recorded for `top_year`
    pub top_year_match_count: u64,
}
//
impl NgramRecord {
    /// Start a record with no year observation folded in yet
    pub fn new(words: Box<[Box<str>]>, tags: Option<Box<[WordTag]>>) -> Self {
        debug_assert!(
            tags.as_ref().is_none_or(|tags| tags.len() == words.len()),
            "tag sequences must be aligned 1:1 with words"
        );
        Self {
            words,
            tags,
            match_count: 0,
            volume_count: 0,
            first_year: 0,
            last_year: 0,
            year_count: 0,
            top_year: 0,
            top_year_match_count: 0,
        }
    }

    /// Merge one year observation into the running aggregates
    ///
    /// Observations from one line must be folded in field order: sums and
    /// extremes do not care, but the `top_year` tie-break does.
    pub fn fold(&mut self, year: Year, match_count: u64, volume_count: u64) {
        self.match_count += match_count;
        self.volume_count += volume_count;
        if self.year_count == 0 {
            self.first_year = year;
            self.last_year = year;
        } else {
            self.first_year = self.first_year.min(year);
            self.last_year = self.last_year.max(year);
        }
        self.year_count += 1;
        if match_count > self.top_year_match_count {
            self.top_year = year;
            self.top_year_match_count = match_count;
        }
    }

    /// Truth that the record's tag sequence contains the given tag
    ///
    /// Records without a tag sequence contain no tag.
    pub fn contains_tag(&self, tag: WordTag) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.contains(&tag))
    }

    /// Serialize into one 9-column reduced data row
    pub fn to_reduced_line(&self) -> String {
        let tags = self
            .tags
            .as_deref()
            .map(|tags| tags.iter().map(|tag| tag.code()).collect::<String>())
            .unwrap_or_default();
        format!(
            "{}\t{tags}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.words.join(" "),
            self.match_count,
            self.volume_count,
            self.first_year,
            self.last_year,
            self.year_count,
            self.top_year,
            self.top_year_match_count,
        )
    }

    /// Decode one reduced data row, the exact inverse of
    /// [`to_reduced_line()`](Self::to_reduced_line)
    ///
    /// This lets previously reduced corpora be re-filtered without deriving
    /// the aggregate math again.
    pub fn from_reduced_line(line: &str) -> Result<Self, MalformedLine> {
        let columns = line.split('\t').collect::<Vec<_>>();
        let [ngram, tags, match_count, volume_count, first_year, last_year, year_count, top_year, top_year_match_count] =
            columns[..]
        else {
            return Err(MalformedLine::WrongColumnCount {
                found: columns.len(),
                line: line.into(),
            });
        };
        let words = ngram
            .split(' ')
            .map(Into::into)
            .collect::<Box<[Box<str>]>>();
        let tags = if tags.is_empty() {
            None
        } else {
            let tags = tags
                .chars()
                .map(|code| {
                    WordTag::from_code(code).ok_or(MalformedLine::UnknownTagCode {
                        code,
                        line: line.into(),
                    })
                })
                .collect::<Result<Box<[WordTag]>, _>>()?;
            if tags.len() != words.len() {
                return Err(MalformedLine::TagCountMismatch { line: line.into() });
            }
            Some(tags)
        };
        Ok(Self {
            words,
            tags,
            match_count: decode_number(match_count, line)?,
            volume_count: decode_number(volume_count, line)?,
            first_year: decode_number(first_year, line)?,
            last_year: decode_number(last_year, line)?,
            year_count: decode_number(year_count, line)?,
            top_year: decode_number(top_year, line)?,
            top_year_match_count: decode_number(top_year_match_count, line)?,
        })
    }
}

/// Decode one numeric column of a reduced line
fn decode_number<T: std::str::FromStr>(value: &str, line: &str) -> Result<T, MalformedLine> {
    value.parse().map_err(|_| MalformedLine::InvalidNumber {
        value: value.into(),
        line: line.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(words: &[&str], tags: Option<&[WordTag]>) -> NgramRecord {
        NgramRecord::new(
            words.iter().map(|&word| word.into()).collect(),
            tags.map(|tags| tags.into()),
        )
    }

    #[test]
    fn fold_accumulates_sums_and_extremes() {
        let mut rec = record(&["Squirrel"], Some(&[WordTag::Noun]));
        rec.fold(1930, 1, 2);
        rec.fold(1935, 4, 3);
        rec.fold(1920, 2, 1);
        assert_eq!(rec.match_count, 7);
        assert_eq!(rec.volume_count, 6);
        assert_eq!(rec.first_year, 1920);
        assert_eq!(rec.last_year, 1935);
        assert_eq!(rec.year_count, 3);
        assert_eq!(rec.top_year, 1935);
        assert_eq!(rec.top_year_match_count, 4);
    }

    #[test]
    fn fold_order_only_affects_top_year_ties() {
        let mut forward = record(&["w"], None);
        forward.fold(1930, 5, 1);
        forward.fold(1940, 5, 1);
        assert_eq!(forward.top_year, 1930);

        let mut backward = record(&["w"], None);
        backward.fold(1940, 5, 1);
        backward.fold(1930, 5, 1);
        assert_eq!(backward.top_year, 1940);

        // The shared aggregates do not depend on fold order
        for rec in [&forward, &backward] {
            assert_eq!(rec.match_count, 10);
            assert_eq!(rec.volume_count, 2);
            assert_eq!(rec.first_year, 1930);
            assert_eq!(rec.last_year, 1940);
            assert_eq!(rec.year_count, 2);
            assert_eq!(rec.top_year_match_count, 5);
        }
    }

    #[test]
    fn top_year_moves_on_strictly_greater_match_count() {
        let mut rec = record(&["w"], None);
        rec.fold(1930, 3, 1);
        rec.fold(1940, 7, 1);
        rec.fold(1950, 7, 1);
        assert_eq!(rec.top_year, 1940);
        rec.fold(1960, 8, 1);
        assert_eq!(rec.top_year, 1960);
    }

    #[test]
    fn year_zero_is_a_legitimate_first_year() {
        let mut rec = record(&["w"], None);
        rec.fold(0, 1, 1);
        rec.fold(1930, 1, 1);
        assert_eq!(rec.first_year, 0);
        assert_eq!(rec.last_year, 1930);
    }

    #[test]
    fn contains_tag_ignores_absent_tag_sequences() {
        let untagged = record(&["2000!"], None);
        assert!(!untagged.contains_tag(WordTag::None));
        let tagged = record(&["Happy", ""], Some(&[WordTag::Adjective, WordTag::EndToken]));
        assert!(tagged.contains_tag(WordTag::EndToken));
        assert!(!tagged.contains_tag(WordTag::Noun));
    }

    #[test]
    fn reduced_lines_round_trip() {
        let lines = [
            "Happy Squirrel\tJN\t1\t2\t1930\t1930\t1\t1930\t1",
            "Happy Squirrel \tJNE\t1\t2\t1930\t1930\t1\t1930\t1",
            "_ADJ _NOUN  _END\t__S_\t1\t2\t1930\t1930\t1\t1930\t1",
            "Wltebsky\tN\t79\t65\t1930\t2000\t33\t1960\t7",
            "untagged\t\t3\t2\t1999\t2001\t2\t1999\t2",
        ];
        for line in lines {
            let decoded = NgramRecord::from_reduced_line(line).expect("line should decode");
            assert_eq!(decoded.to_reduced_line(), line);
        }
    }

    #[test]
    fn reduced_decode_rejects_wrong_column_count() {
        assert_eq!(
            NgramRecord::from_reduced_line("word\tN\t1\t2"),
            Err(MalformedLine::WrongColumnCount {
                found: 4,
                line: "word\tN\t1\t2".into()
            })
        );
    }

    #[test]
    fn reduced_decode_rejects_the_header() {
        // The header has 9 columns but no numeric aggregates
        assert!(matches!(
            NgramRecord::from_reduced_line(REDUCED_HEADER),
            Err(MalformedLine::InvalidNumber { .. })
        ));
    }

    #[test]
    fn reduced_decode_rejects_unknown_tag_codes() {
        assert!(matches!(
            NgramRecord::from_reduced_line("word\tQ\t1\t2\t1930\t1930\t1\t1930\t1"),
            Err(MalformedLine::UnknownTagCode { code: 'Q', .. })
        ));
    }

    #[test]
    fn reduced_decode_rejects_misaligned_tags() {
        assert!(matches!(
            NgramRecord::from_reduced_line("one two\tN\t1\t2\t1930\t1930\t1\t1930\t1"),
            Err(MalformedLine::TagCountMismatch { .. })
        ));
    }
}
