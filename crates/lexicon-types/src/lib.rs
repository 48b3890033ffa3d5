//! Shared value types for the lexicon object layer.
//!
//! Everything here is plain data: handles into the object store ([`Hvo`]),
//! writing systems ([`Ws`]), per-writing-system strings ([`MultiString`]), the
//! closed set of morph types with their marker decorations, and the
//! morphosyntactic analysis union ([`Msa`]) together with its equality test.
//! Storage and the invariant-keeping algorithms live in `lexicon-db` and
//! `lexicon-fdo`.
//!
//! ```rust
//! use lexicon_types::{HomographClass, MorphType};
//!
//! assert_eq!(MorphType::BoundRoot.homograph_class(), HomographClass::Stem);
//! assert_ne!(
//!     MorphType::Prefix.homograph_class(),
//!     MorphType::Suffix.homograph_class()
//! );
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

mod msa;

pub use msa::{
    DerivAffixMsa, FeatureSet, InflAffixMsa, Msa, MsaDescriptor, MsaKind, StemMsa,
    UnclassifiedAffixMsa,
};

/// Form shown (and matched) for an entry that has neither citation nor lexeme form.
pub const PLACEHOLDER_FORM: &str = "???";

/// Opaque handle of an object in the lexicon store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hvo(pub u32);

impl fmt::Display for Hvo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Writing system handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ws(pub u16);

/// Text with one alternative per writing system.
///
/// Empty alternatives are never stored, so `get` returning `Some` always means
/// there is visible text.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiString {
    alternatives: BTreeMap<Ws, String>,
}

impl MultiString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a string holding a single alternative.
    pub fn single(ws: Ws, text: impl Into<String>) -> Self {
        let mut s = Self::new();
        s.set(ws, text);
        s
    }

    pub fn get(&self, ws: Ws) -> Option<&str> {
        self.alternatives.get(&ws).map(String::as_str)
    }

    /// Set one alternative; an empty (or all-whitespace) value clears it.
    pub fn set(&mut self, ws: Ws, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            self.alternatives.remove(&ws);
        } else {
            self.alternatives.insert(ws, text);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ws, &str)> {
        self.alternatives.iter().map(|(ws, s)| (*ws, s.as_str()))
    }

    /// Merge `other` into `self`, returning whether anything changed.
    ///
    /// Empty alternatives are filled from `other`. With a separator, differing
    /// non-empty alternatives are concatenated (`self + sep + other`) unless
    /// the other text is already one of the `sep`-delimited pieces of `self`.
    pub fn merge_alternatives(&mut self, other: &MultiString, concat_separator: Option<&str>) -> bool {
        let mut changed = false;
        for (ws, theirs) in &other.alternatives {
            match self.alternatives.get_mut(ws) {
                None => {
                    self.alternatives.insert(*ws, theirs.clone());
                    changed = true;
                }
                Some(ours) => {
                    if let Some(sep) = concat_separator
                        && !ours.split(sep).any(|piece| piece == theirs)
                    {
                        ours.push_str(sep);
                        ours.push_str(theirs);
                        changed = true;
                    }
                }
            }
        }
        changed
    }
}

/// Morph types known to the lexicon.
///
/// `Unknown` is a real classification ("not yet analysed") and numbers with
/// the stems. An allomorph with no morph type at all (typical of rapid data
/// entry) is `Option<MorphType>::None` instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum MorphType {
    BoundRoot,
    BoundStem,
    Circumfix,
    Clitic,
    Enclitic,
    Infix,
    InfixingInterfix,
    Particle,
    Phrase,
    DiscontiguousPhrase,
    Prefix,
    PrefixingInterfix,
    Proclitic,
    Root,
    Simulfix,
    Stem,
    Suffix,
    SuffixingInterfix,
    Suprafix,
    Unknown,
}

/// Bucket used to decide which entries are numbered as homographs together.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HomographClass {
    /// Roots, stems, particles and phrases all number together.
    Stem,
    Other(MorphType),
}

impl MorphType {
    pub const ALL: [MorphType; 20] = [
        MorphType::BoundRoot,
        MorphType::BoundStem,
        MorphType::Circumfix,
        MorphType::Clitic,
        MorphType::Enclitic,
        MorphType::Infix,
        MorphType::InfixingInterfix,
        MorphType::Particle,
        MorphType::Phrase,
        MorphType::DiscontiguousPhrase,
        MorphType::Prefix,
        MorphType::PrefixingInterfix,
        MorphType::Proclitic,
        MorphType::Root,
        MorphType::Simulfix,
        MorphType::Stem,
        MorphType::Suffix,
        MorphType::SuffixingInterfix,
        MorphType::Suprafix,
        MorphType::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MorphType::BoundRoot => "bound root",
            MorphType::BoundStem => "bound stem",
            MorphType::Circumfix => "circumfix",
            MorphType::Clitic => "clitic",
            MorphType::Enclitic => "enclitic",
            MorphType::Infix => "infix",
            MorphType::InfixingInterfix => "infixing interfix",
            MorphType::Particle => "particle",
            MorphType::Phrase => "phrase",
            MorphType::DiscontiguousPhrase => "discontiguous phrase",
            MorphType::Prefix => "prefix",
            MorphType::PrefixingInterfix => "prefixing interfix",
            MorphType::Proclitic => "proclitic",
            MorphType::Root => "root",
            MorphType::Simulfix => "simulfix",
            MorphType::Stem => "stem",
            MorphType::Suffix => "suffix",
            MorphType::SuffixingInterfix => "suffixing interfix",
            MorphType::Suprafix => "suprafix",
            MorphType::Unknown => "unknown",
        }
    }

    /// Parse a morph type name as produced by [`MorphType::name`]; `_` and `-`
    /// are accepted in place of spaces.
    pub fn from_name(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        MorphType::ALL.into_iter().find(|mt| mt.name() == wanted)
    }

    /// Marker typed before the form (`-` of `-ing`, `=` of `=ma`).
    pub fn prefix_marker(self) -> &'static str {
        match self {
            MorphType::BoundRoot | MorphType::BoundStem => "*",
            MorphType::Enclitic | MorphType::Simulfix => "=",
            MorphType::Infix
            | MorphType::InfixingInterfix
            | MorphType::Suffix
            | MorphType::SuffixingInterfix => "-",
            MorphType::Suprafix => "~",
            _ => "",
        }
    }

    /// Marker typed after the form (`-` of `un-`, `=` of `ma=`).
    pub fn postfix_marker(self) -> &'static str {
        match self {
            MorphType::Infix
            | MorphType::InfixingInterfix
            | MorphType::Prefix
            | MorphType::PrefixingInterfix => "-",
            MorphType::Proclitic | MorphType::Simulfix => "=",
            MorphType::Suprafix => "~",
            _ => "",
        }
    }

    /// Tie-breaker when sorting identical forms of different morph types.
    pub fn secondary_order(self) -> u8 {
        match self {
            MorphType::Prefix => 10,
            MorphType::PrefixingInterfix => 15,
            MorphType::Proclitic => 20,
            MorphType::Infix => 30,
            MorphType::InfixingInterfix => 35,
            MorphType::Circumfix => 40,
            MorphType::Simulfix => 50,
            MorphType::Suprafix => 60,
            MorphType::Suffix => 70,
            MorphType::SuffixingInterfix => 75,
            MorphType::Enclitic => 80,
            MorphType::Clitic => 85,
            _ => 0,
        }
    }

    pub fn is_affix(self) -> bool {
        matches!(
            self,
            MorphType::Circumfix
                | MorphType::Infix
                | MorphType::InfixingInterfix
                | MorphType::Prefix
                | MorphType::PrefixingInterfix
                | MorphType::Simulfix
                | MorphType::Suffix
                | MorphType::SuffixingInterfix
                | MorphType::Suprafix
        )
    }

    /// Clitics are stem-like for allomorph and MSA purposes.
    pub fn is_stem_type(self) -> bool {
        !self.is_affix()
    }

    pub fn homograph_class(self) -> HomographClass {
        match self {
            MorphType::Root
            | MorphType::BoundRoot
            | MorphType::BoundStem
            | MorphType::Stem
            | MorphType::Unknown
            | MorphType::Particle
            | MorphType::Phrase
            | MorphType::DiscontiguousPhrase => HomographClass::Stem,
            other => HomographClass::Other(other),
        }
    }

    /// The allomorph class an entry of this type uses for its forms.
    pub fn allomorph_kind(self) -> AllomorphKind {
        if self.is_affix() {
            AllomorphKind::Affix
        } else {
            AllomorphKind::Stem
        }
    }
}

impl fmt::Display for MorphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete allomorph class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AllomorphKind {
    Stem,
    Affix,
}

/// Tag of an entry reference: variant link or complex-form composition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RefType {
    Variant = 0,
    ComplexForm = 1,
}

/// Whether an ad-hoc co-prohibition constrains morphemes (MSAs) or allomorphs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ProhibitionKind {
    Morpheme,
    Allomorph,
}

/// Shape of a lexical relation type; governs cardinality and target classes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MappingType {
    SenseCollection = 0,
    SensePair = 1,
    SenseAsymmetricPair = 2,
    SenseTree = 3,
    SenseSequence = 4,
    EntryCollection = 5,
    EntryPair = 6,
    EntryAsymmetricPair = 7,
    EntryTree = 8,
    EntrySequence = 9,
    EntryOrSenseCollection = 10,
    EntryOrSensePair = 11,
    EntryOrSenseAsymmetricPair = 12,
    EntryOrSenseTree = 13,
    EntryOrSenseSequence = 14,
}

impl MappingType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        use MappingType::*;
        Some(match raw {
            0 => SenseCollection,
            1 => SensePair,
            2 => SenseAsymmetricPair,
            3 => SenseTree,
            4 => SenseSequence,
            5 => EntryCollection,
            6 => EntryPair,
            7 => EntryAsymmetricPair,
            8 => EntryTree,
            9 => EntrySequence,
            10 => EntryOrSenseCollection,
            11 => EntryOrSensePair,
            12 => EntryOrSenseAsymmetricPair,
            13 => EntryOrSenseTree,
            14 => EntryOrSenseSequence,
            _ => return None,
        })
    }

    /// Tree relations treat the first target as the root.
    pub fn is_tree(self) -> bool {
        matches!(
            self,
            MappingType::SenseTree | MappingType::EntryTree | MappingType::EntryOrSenseTree
        )
    }

    pub fn is_pair(self) -> bool {
        matches!(
            self,
            MappingType::SensePair
                | MappingType::SenseAsymmetricPair
                | MappingType::EntryPair
                | MappingType::EntryAsymmetricPair
                | MappingType::EntryOrSensePair
                | MappingType::EntryOrSenseAsymmetricPair
        )
    }

    /// Asymmetric relations carry a separate reverse name.
    pub fn is_asymmetric(self) -> bool {
        matches!(
            self,
            MappingType::SenseAsymmetricPair
                | MappingType::EntryAsymmetricPair
                | MappingType::EntryOrSenseAsymmetricPair
        ) || self.is_tree()
    }

    pub fn min_targets(self) -> usize {
        2
    }

    pub fn max_targets(self) -> Option<usize> {
        if self.is_pair() { Some(2) } else { None }
    }

    pub fn accepts_entries(self) -> bool {
        (self as u8) >= 5
    }

    pub fn accepts_senses(self) -> bool {
        let raw = self as u8;
        raw < 5 || raw >= 10
    }
}
