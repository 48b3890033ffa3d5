//! Morphosyntactic analyses (MSAs) as a closed union over their four kinds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Hvo;

/// Feature name to value, kept sorted so equality is structural.
pub type FeatureSet = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MsaKind {
    Stem,
    InflAffix,
    DerivAffix,
    UnclassifiedAffix,
}

impl MsaKind {
    pub fn is_affix(self) -> bool {
        !matches!(self, MsaKind::Stem)
    }

    /// Whether an MSA of this kind may belong to an entry of the given family.
    pub fn fits_affix_family(self, entry_is_affix: bool) -> bool {
        self.is_affix() == entry_is_affix
    }
}

/// The grammatical-info shape a caller asks for when setting a sense's MSA.
///
/// Only the attributes editable from a simple chooser are present; refinements
/// such as inflection classes or features live on the MSA itself.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MsaDescriptor {
    pub kind: Option<MsaKind>,
    pub main_pos: Option<Hvo>,
    pub secondary_pos: Option<Hvo>,
    pub slot: Option<Hvo>,
    #[serde(default)]
    pub from_parts_of_speech: Vec<Hvo>,
}

impl MsaDescriptor {
    pub fn new(kind: MsaKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn stem(pos: Option<Hvo>) -> Self {
        Self {
            main_pos: pos,
            ..Self::new(MsaKind::Stem)
        }
    }

    pub fn unclassified_affix(pos: Option<Hvo>) -> Self {
        Self {
            main_pos: pos,
            ..Self::new(MsaKind::UnclassifiedAffix)
        }
    }

    pub fn infl_affix(pos: Option<Hvo>, slot: Option<Hvo>) -> Self {
        Self {
            main_pos: pos,
            slot,
            ..Self::new(MsaKind::InflAffix)
        }
    }

    pub fn deriv_affix(from: Option<Hvo>, to: Option<Hvo>) -> Self {
        Self {
            main_pos: from,
            secondary_pos: to,
            ..Self::new(MsaKind::DerivAffix)
        }
    }

    /// Resolved kind; a missing kind means stem.
    pub fn kind(&self) -> MsaKind {
        self.kind.unwrap_or(MsaKind::Stem)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct StemMsa {
    pub part_of_speech: Option<Hvo>,
    #[serde(default)]
    pub from_parts_of_speech: Vec<Hvo>,
    pub inflection_class: Option<Hvo>,
    #[serde(default)]
    pub prod_restrict: Vec<Hvo>,
    #[serde(default)]
    pub features: FeatureSet,
    pub stratum: Option<Hvo>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct InflAffixMsa {
    pub part_of_speech: Option<Hvo>,
    #[serde(default)]
    pub slots: Vec<Hvo>,
    #[serde(default)]
    pub features: FeatureSet,
    pub affix_category: Option<Hvo>,
    #[serde(default)]
    pub from_prod_restrict: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DerivAffixMsa {
    pub from_part_of_speech: Option<Hvo>,
    pub to_part_of_speech: Option<Hvo>,
    pub from_inflection_class: Option<Hvo>,
    pub to_inflection_class: Option<Hvo>,
    #[serde(default)]
    pub from_features: FeatureSet,
    #[serde(default)]
    pub to_features: FeatureSet,
    pub stratum: Option<Hvo>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnclassifiedAffixMsa {
    pub part_of_speech: Option<Hvo>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Msa {
    Stem(StemMsa),
    InflAffix(InflAffixMsa),
    DerivAffix(DerivAffixMsa),
    UnclassifiedAffix(UnclassifiedAffixMsa),
}

impl Msa {
    pub fn kind(&self) -> MsaKind {
        match self {
            Msa::Stem(_) => MsaKind::Stem,
            Msa::InflAffix(_) => MsaKind::InflAffix,
            Msa::DerivAffix(_) => MsaKind::DerivAffix,
            Msa::UnclassifiedAffix(_) => MsaKind::UnclassifiedAffix,
        }
    }

    /// Build a fresh MSA carrying exactly the attributes of a descriptor.
    pub fn from_descriptor(desc: &MsaDescriptor) -> Self {
        match desc.kind() {
            MsaKind::Stem => Msa::Stem(StemMsa {
                part_of_speech: desc.main_pos,
                from_parts_of_speech: desc.from_parts_of_speech.clone(),
                ..StemMsa::default()
            }),
            MsaKind::InflAffix => Msa::InflAffix(InflAffixMsa {
                part_of_speech: desc.main_pos,
                slots: desc.slot.into_iter().collect(),
                ..InflAffixMsa::default()
            }),
            MsaKind::DerivAffix => Msa::DerivAffix(DerivAffixMsa {
                from_part_of_speech: desc.main_pos,
                to_part_of_speech: desc.secondary_pos,
                ..DerivAffixMsa::default()
            }),
            MsaKind::UnclassifiedAffix => Msa::UnclassifiedAffix(UnclassifiedAffixMsa {
                part_of_speech: desc.main_pos,
            }),
        }
    }

    /// An MSA of `kind` carrying only a part of speech.
    pub fn with_part_of_speech(kind: MsaKind, pos: Option<Hvo>) -> Self {
        let desc = match kind {
            MsaKind::DerivAffix => MsaDescriptor::deriv_affix(pos, None),
            other => MsaDescriptor {
                main_pos: pos,
                ..MsaDescriptor::new(other)
            },
        };
        Msa::from_descriptor(&desc)
    }

    /// The part of speech that best characterises the analysis.
    ///
    /// Derivational affixes report the category they produce, falling back to
    /// the one they attach to.
    pub fn main_part_of_speech(&self) -> Option<Hvo> {
        match self {
            Msa::Stem(m) => m.part_of_speech,
            Msa::InflAffix(m) => m.part_of_speech,
            Msa::DerivAffix(m) => m.to_part_of_speech.or(m.from_part_of_speech),
            Msa::UnclassifiedAffix(m) => m.part_of_speech,
        }
    }

    /// Kind-and-attribute equality used to deduplicate MSAs on one entry.
    pub fn equals_msa(&self, other: &Msa) -> bool {
        match (self, other) {
            (Msa::Stem(a), Msa::Stem(b)) => {
                a.part_of_speech == b.part_of_speech
                    && a.inflection_class == b.inflection_class
                    && a.stratum == b.stratum
                    && a.features == b.features
                    && same_set(&a.prod_restrict, &b.prod_restrict)
                    && same_set(&a.from_parts_of_speech, &b.from_parts_of_speech)
            }
            (Msa::InflAffix(a), Msa::InflAffix(b)) => {
                a.part_of_speech == b.part_of_speech
                    && a.affix_category == b.affix_category
                    && a.features == b.features
                    && same_set(&a.slots, &b.slots)
                    && same_set(&a.from_prod_restrict, &b.from_prod_restrict)
            }
            (Msa::DerivAffix(a), Msa::DerivAffix(b)) => a == b,
            (Msa::UnclassifiedAffix(a), Msa::UnclassifiedAffix(b)) => {
                a.part_of_speech == b.part_of_speech
            }
            _ => false,
        }
    }

    /// Whether this MSA is what a descriptor asks for.
    ///
    /// An MSA carrying refinements the descriptor cannot express (inflection
    /// class, features, restrictions) never matches.
    pub fn matches_descriptor(&self, desc: &MsaDescriptor) -> bool {
        if self.kind() != desc.kind() {
            return false;
        }
        match self {
            Msa::Stem(m) => {
                m.part_of_speech == desc.main_pos
                    && m.inflection_class.is_none()
                    && m.prod_restrict.is_empty()
                    && m.features.is_empty()
                    && m.stratum.is_none()
                    && same_set(&m.from_parts_of_speech, &desc.from_parts_of_speech)
            }
            Msa::InflAffix(m) => {
                let wanted: Vec<Hvo> = desc.slot.into_iter().collect();
                m.part_of_speech == desc.main_pos
                    && m.features.is_empty()
                    && m.affix_category.is_none()
                    && m.from_prod_restrict.is_empty()
                    && same_set(&m.slots, &wanted)
            }
            Msa::DerivAffix(m) => {
                m.from_part_of_speech == desc.main_pos
                    && m.to_part_of_speech == desc.secondary_pos
                    && m.from_inflection_class.is_none()
                    && m.to_inflection_class.is_none()
                    && m.from_features.is_empty()
                    && m.to_features.is_empty()
                    && m.stratum.is_none()
            }
            Msa::UnclassifiedAffix(m) => m.part_of_speech == desc.main_pos,
        }
    }

    /// Carry over refinements from an MSA of a compatible family.
    ///
    /// Only same-kind pairs share refinement attributes; anything else is left
    /// untouched. Returns whether something was copied.
    pub fn copy_refinements_from(&mut self, old: &Msa) -> bool {
        match (self, old) {
            (Msa::Stem(new), Msa::Stem(old)) => {
                new.inflection_class = old.inflection_class;
                new.prod_restrict = old.prod_restrict.clone();
                new.features = old.features.clone();
                new.stratum = old.stratum;
                true
            }
            (Msa::InflAffix(new), Msa::InflAffix(old)) => {
                new.features = old.features.clone();
                new.affix_category = old.affix_category;
                new.from_prod_restrict = old.from_prod_restrict.clone();
                true
            }
            (Msa::DerivAffix(new), Msa::DerivAffix(old)) => {
                new.from_inflection_class = old.from_inflection_class;
                new.to_inflection_class = old.to_inflection_class;
                new.from_features = old.from_features.clone();
                new.to_features = old.to_features.clone();
                new.stratum = old.stratum;
                true
            }
            _ => false,
        }
    }
}

fn same_set(a: &[Hvo], b: &[Hvo]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}
