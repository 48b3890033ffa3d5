//! Records stored in the arena, one struct per object class.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lexicon_types::{
    AllomorphKind, Hvo, MappingType, MorphType, Msa, MultiString, ProhibitionKind, RefType, Ws,
};

/// Property identifiers used for ownership edges and change notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FieldTag {
    EntryCitationForm,
    EntryLexemeForm,
    EntryAlternateForms,
    EntryHomographNumber,
    EntrySenses,
    EntryMsas,
    EntryPronunciations,
    EntryEtymology,
    EntryEntryRefs,
    EntryStrings,
    EntryDateModified,
    SenseGloss,
    SenseDefinition,
    SenseMsa,
    SenseSenses,
    AllomorphForm,
    AllomorphMorphType,
    MsaAttributes,
    MsaComponents,
    EntryRefComponentLexemes,
    EntryRefPrimaryLexemes,
    EntryRefVariantTypes,
    EntryRefComplexTypes,
    RefTypeMembers,
    LexReferenceTargets,
    WordformAnalyses,
    AnalysisMorphBundles,
    MorphBundleMsa,
    MorphBundleMorph,
    MorphBundleSense,
    ProhibitionFirst,
    ProhibitionMembers,
    ProhibitionRest,
    PosAffixSlots,
    PosInflectionClasses,
    ReversalIndexEntries,
    ReversalSubentries,
    ReversalForm,
    ReversalSenses,
    /// Virtual: entry refs naming this object as a variant component.
    VariantFormBackRefs,
    /// Virtual: entry refs naming this object as a complex-form component.
    ComplexFormBackRefs,
    /// Virtual: lexical relations this object takes part in.
    LexReferenceBackRefs,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    Entry,
    Sense,
    Allomorph,
    Msa,
    Pronunciation,
    Etymology,
    EntryRef,
    EntryType,
    RefType,
    Reference,
    Wordform,
    Analysis,
    MorphBundle,
    Prohibition,
    PartOfSpeech,
    AffixSlot,
    InflectionClass,
    ReversalIndex,
    ReversalEntry,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexEntry {
    pub citation_form: MultiString,
    pub lexeme_form: Option<Hvo>,
    pub alternate_forms: Vec<Hvo>,
    pub homograph_number: u32,
    pub senses: Vec<Hvo>,
    pub msas: Vec<Hvo>,
    pub pronunciations: Vec<Hvo>,
    pub etymology: Option<Hvo>,
    pub entry_refs: Vec<Hvo>,
    pub bibliography: MultiString,
    pub comment: MultiString,
    pub literal_meaning: MultiString,
    pub restrictions: MultiString,
    pub summary_definition: MultiString,
    pub do_not_use_for_parsing: bool,
    pub exclude_as_headword: bool,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl LexEntry {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            date_created: now,
            date_modified: now,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexSense {
    pub gloss: MultiString,
    pub definition: MultiString,
    pub msa: Option<Hvo>,
    pub senses: Vec<Hvo>,
}

/// An allomorph (`MoForm`): lexeme form or one of the alternate forms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoForm {
    pub kind: AllomorphKind,
    pub form: MultiString,
    pub morph_type: Option<MorphType>,
    pub is_abstract: bool,
}

impl MoForm {
    pub fn new(morph_type: Option<MorphType>, form: MultiString) -> Self {
        Self {
            kind: morph_type.map_or(AllomorphKind::Stem, MorphType::allomorph_kind),
            form,
            morph_type,
            is_abstract: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaRecord {
    pub msa: Msa,
    pub components: Vec<Hvo>,
}

impl MsaRecord {
    pub fn new(msa: Msa) -> Self {
        Self {
            msa,
            components: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pronunciation {
    pub form: MultiString,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Etymology {
    pub form: MultiString,
    pub gloss: MultiString,
    pub comment: MultiString,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LexEntryRef {
    pub ref_type: RefType,
    pub component_lexemes: Vec<Hvo>,
    pub primary_lexemes: Vec<Hvo>,
    pub variant_entry_types: Vec<Hvo>,
    pub complex_entry_types: Vec<Hvo>,
    pub hide_minor_entry: bool,
    pub summary: MultiString,
}

impl LexEntryRef {
    pub fn new(ref_type: RefType) -> Self {
        Self {
            ref_type,
            component_lexemes: Vec::new(),
            primary_lexemes: Vec::new(),
            variant_entry_types: Vec::new(),
            complex_entry_types: Vec::new(),
            hide_minor_entry: false,
            summary: MultiString::new(),
        }
    }
}

/// Variant or complex-form type label (e.g. "spelling variant", "compound").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LexEntryType {
    pub name: String,
    pub ref_type: RefType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LexRefType {
    pub name: String,
    pub reverse_name: Option<String>,
    pub mapping_type: MappingType,
    pub members: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexReference {
    pub targets: Vec<Hvo>,
    pub comment: MultiString,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WfiWordform {
    pub form: MultiString,
    pub analyses: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WfiAnalysis {
    pub category: Option<Hvo>,
    pub morph_bundles: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WfiMorphBundle {
    pub form: MultiString,
    pub morph: Option<Hvo>,
    pub msa: Option<Hvo>,
    pub sense: Option<Hvo>,
}

/// Ad-hoc co-prohibition: `first` may not co-occur with `members`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdhocProhibition {
    pub kind: ProhibitionKind,
    pub first: Option<Hvo>,
    pub members: Vec<Hvo>,
    pub rest: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartOfSpeech {
    pub name: String,
    pub abbreviation: String,
    pub affix_slots: Vec<Hvo>,
    pub inflection_classes: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AffixSlot {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InflectionClass {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReversalIndex {
    pub ws: Ws,
    pub entries: Vec<Hvo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReversalIndexEntry {
    pub form: MultiString,
    pub senses: Vec<Hvo>,
    pub subentries: Vec<Hvo>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Entry(LexEntry),
    Sense(LexSense),
    Allomorph(MoForm),
    Msa(MsaRecord),
    Pronunciation(Pronunciation),
    Etymology(Etymology),
    EntryRef(LexEntryRef),
    EntryType(LexEntryType),
    RefType(LexRefType),
    Reference(LexReference),
    Wordform(WfiWordform),
    Analysis(WfiAnalysis),
    MorphBundle(WfiMorphBundle),
    Prohibition(AdhocProhibition),
    PartOfSpeech(PartOfSpeech),
    AffixSlot(AffixSlot),
    InflectionClass(InflectionClass),
    ReversalIndex(ReversalIndex),
    ReversalEntry(ReversalIndexEntry),
}

impl Object {
    pub fn class(&self) -> ObjectClass {
        match self {
            Object::Entry(_) => ObjectClass::Entry,
            Object::Sense(_) => ObjectClass::Sense,
            Object::Allomorph(_) => ObjectClass::Allomorph,
            Object::Msa(_) => ObjectClass::Msa,
            Object::Pronunciation(_) => ObjectClass::Pronunciation,
            Object::Etymology(_) => ObjectClass::Etymology,
            Object::EntryRef(_) => ObjectClass::EntryRef,
            Object::EntryType(_) => ObjectClass::EntryType,
            Object::RefType(_) => ObjectClass::RefType,
            Object::Reference(_) => ObjectClass::Reference,
            Object::Wordform(_) => ObjectClass::Wordform,
            Object::Analysis(_) => ObjectClass::Analysis,
            Object::MorphBundle(_) => ObjectClass::MorphBundle,
            Object::Prohibition(_) => ObjectClass::Prohibition,
            Object::PartOfSpeech(_) => ObjectClass::PartOfSpeech,
            Object::AffixSlot(_) => ObjectClass::AffixSlot,
            Object::InflectionClass(_) => ObjectClass::InflectionClass,
            Object::ReversalIndex(_) => ObjectClass::ReversalIndex,
            Object::ReversalEntry(_) => ObjectClass::ReversalEntry,
        }
    }

    /// Sequence-valued owning property `field`, if this object has it.
    pub(crate) fn owning_list_mut(&mut self, field: FieldTag) -> Option<&mut Vec<Hvo>> {
        Some(match (self, field) {
            (Object::Entry(e), FieldTag::EntrySenses) => &mut e.senses,
            (Object::Entry(e), FieldTag::EntryMsas) => &mut e.msas,
            (Object::Entry(e), FieldTag::EntryAlternateForms) => &mut e.alternate_forms,
            (Object::Entry(e), FieldTag::EntryPronunciations) => &mut e.pronunciations,
            (Object::Entry(e), FieldTag::EntryEntryRefs) => &mut e.entry_refs,
            (Object::Sense(s), FieldTag::SenseSenses) => &mut s.senses,
            (Object::RefType(t), FieldTag::RefTypeMembers) => &mut t.members,
            (Object::Wordform(w), FieldTag::WordformAnalyses) => &mut w.analyses,
            (Object::Analysis(a), FieldTag::AnalysisMorphBundles) => &mut a.morph_bundles,
            (Object::PartOfSpeech(p), FieldTag::PosAffixSlots) => &mut p.affix_slots,
            (Object::PartOfSpeech(p), FieldTag::PosInflectionClasses) => {
                &mut p.inflection_classes
            }
            (Object::ReversalIndex(r), FieldTag::ReversalIndexEntries) => &mut r.entries,
            (Object::ReversalEntry(r), FieldTag::ReversalSubentries) => &mut r.subentries,
            _ => return None,
        })
    }

    /// Atomic owning property `field`, if this object has it.
    pub(crate) fn owning_atomic_mut(&mut self, field: FieldTag) -> Option<&mut Option<Hvo>> {
        match (self, field) {
            (Object::Entry(e), FieldTag::EntryLexemeForm) => Some(&mut e.lexeme_form),
            (Object::Entry(e), FieldTag::EntryEtymology) => Some(&mut e.etymology),
            _ => None,
        }
    }

    /// Every object this one owns, directly.
    pub fn owned_children(&self) -> Vec<Hvo> {
        match self {
            Object::Entry(e) => e
                .lexeme_form
                .iter()
                .chain(&e.alternate_forms)
                .chain(&e.senses)
                .chain(&e.msas)
                .chain(&e.pronunciations)
                .chain(e.etymology.iter())
                .chain(&e.entry_refs)
                .copied()
                .collect(),
            Object::Sense(s) => s.senses.clone(),
            Object::RefType(t) => t.members.clone(),
            Object::Wordform(w) => w.analyses.clone(),
            Object::Analysis(a) => a.morph_bundles.clone(),
            Object::PartOfSpeech(p) => p
                .affix_slots
                .iter()
                .chain(&p.inflection_classes)
                .copied()
                .collect(),
            Object::ReversalIndex(r) => r.entries.clone(),
            Object::ReversalEntry(r) => r.subentries.clone(),
            _ => Vec::new(),
        }
    }

    /// A copy with every owning property emptied.
    pub(crate) fn without_owned_children(&self) -> Object {
        let mut copy = self.clone();
        match &mut copy {
            Object::Entry(e) => {
                e.lexeme_form = None;
                e.alternate_forms.clear();
                e.senses.clear();
                e.msas.clear();
                e.pronunciations.clear();
                e.etymology = None;
                e.entry_refs.clear();
            }
            Object::Sense(s) => s.senses.clear(),
            Object::RefType(t) => t.members.clear(),
            Object::Wordform(w) => w.analyses.clear(),
            Object::Analysis(a) => a.morph_bundles.clear(),
            Object::PartOfSpeech(p) => {
                p.affix_slots.clear();
                p.inflection_classes.clear();
            }
            Object::ReversalIndex(r) => r.entries.clear(),
            Object::ReversalEntry(r) => r.subentries.clear(),
            _ => {}
        }
        copy
    }
}
