//! Part-of-speech tag vocabulary of the Google Books Ngram dataset
//!
//! Tagged corpus entries attach one of a fixed set of grammar mnemonics to
//! each word (`Squirrel_NOUN`). Each mnemonic maps to a single ASCII
//! character so that a whole tag sequence serializes as a compact string.

/// Part-of-speech tag attached to one word of an ngram
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WordTag {
    /// time, people
    Noun,

    /// is, was
    Verb,

    /// happy, beautiful, other, such
    Adjective,

    /// not, when
    Adverb,

    /// it, I
    Pronoun,

    /// the, a
    DeterminerOrArticle,

    /// of, in
    PrepositionOrPostposition,

    Numeral,

    /// and, or
    Conjunction,

    Particle,

    PunctuationMark,

    CatchAllOther,

    /// Marks the beginning of a sentence
    StartToken,

    /// Marks the end of a sentence
    EndToken,

    /// Reserved code for words that carry no tag at all
    None,
}
//
impl WordTag {
    /// Single-character serialized form of this tag
    pub fn code(self) -> char {
        match self {
            Self::Noun => 'N',
            Self::Verb => 'V',
            Self::Adjective => 'J',
            Self::Adverb => 'A',
            Self::Pronoun => 'R',
            Self::DeterminerOrArticle => 'D',
            Self::PrepositionOrPostposition => 'P',
            Self::Numeral => 'M',
            Self::Conjunction => 'C',
            Self::Particle => 'T',
            Self::PunctuationMark => '.',
            Self::CatchAllOther => 'X',
            Self::StartToken => 'S',
            Self::EndToken => 'E',
            Self::None => '_',
        }
    }

    /// Inverse of [`code()`](Self::code), `None` for characters outside the
    /// vocabulary alphabet
    pub fn from_code(code: char) -> Option<Self> {
        let tag = match code {
            'N' => Self::Noun,
            'V' => Self::Verb,
            'J' => Self::Adjective,
            'A' => Self::Adverb,
            'R' => Self::Pronoun,
            'D' => Self::DeterminerOrArticle,
            'P' => Self::PrepositionOrPostposition,
            'M' => Self::Numeral,
            'C' => Self::Conjunction,
            'T' => Self::Particle,
            '.' => Self::PunctuationMark,
            'X' => Self::CatchAllOther,
            'S' => Self::StartToken,
            'E' => Self::EndToken,
            '_' => Self::None,
            _ => return Option::None,
        };
        Some(tag)
    }

    /// Translate a Google Books tag mnemonic, `None` for unrecognized ones
    ///
    /// The reserved [`WordTag::None`] code has no mnemonic: it never appears
    /// in source corpora, only in serialized tag sequences.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let tag = match mnemonic {
            "NOUN" => Self::Noun,
            "VERB" => Self::Verb,
            "ADJ" => Self::Adjective,
            "ADV" => Self::Adverb,
            "PRON" => Self::Pronoun,
            "DET" => Self::DeterminerOrArticle,
            "ADP" => Self::PrepositionOrPostposition,
            "NUM" => Self::Numeral,
            "CONJ" => Self::Conjunction,
            "PRT" => Self::Particle,
            "." => Self::PunctuationMark,
            "X" => Self::CatchAllOther,
            "START" => Self::StartToken,
            "END" => Self::EndToken,
            _ => return Option::None,
        };
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in "NVJARDPMCT.XSE_".chars() {
            let tag = WordTag::from_code(code).expect("vocabulary code should be recognized");
            assert_eq!(tag.code(), code);
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(WordTag::from_code('Z'), None);
        assert_eq!(WordTag::from_code('n'), None);
        assert_eq!(WordTag::from_code(' '), None);
    }

    #[test]
    fn mnemonics_map_to_expected_codes() {
        let expected = [
            ("NOUN", 'N'),
            ("VERB", 'V'),
            ("ADJ", 'J'),
            ("ADV", 'A'),
            ("PRON", 'R'),
            ("DET", 'D'),
            ("ADP", 'P'),
            ("NUM", 'M'),
            ("CONJ", 'C'),
            ("PRT", 'T'),
            (".", '.'),
            ("X", 'X'),
            ("START", 'S'),
            ("END", 'E'),
        ];
        for (mnemonic, code) in expected {
            assert_eq!(
                WordTag::from_mnemonic(mnemonic).map(WordTag::code),
                Some(code)
            );
        }
    }

    #[test]
    fn none_has_no_mnemonic() {
        assert_eq!(WordTag::from_mnemonic("_"), None);
        assert_eq!(WordTag::from_mnemonic("NONE"), None);
        assert_eq!(WordTag::from_mnemonic(""), None);
    }
}
