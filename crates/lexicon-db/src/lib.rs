//! Arena-backed object store for lexicon data.
//!
//! Every object (entry, sense, allomorph, MSA, relation, ...) lives in one
//! table keyed by an opaque [`Hvo`] handle. Ownership is a single-owner tree:
//! each record remembers its owner and the owning property it sits in, so
//! recursive walks ("all senses of an entry", "does A sit under B") are simple
//! handle-graph walks with no cycle detection.
//!
//! The store is the persistence collaborator of the consistency engine in
//! `lexicon-fdo`. It offers:
//! - ownership edits ([`Lexicon::insert_owned`], [`Lexicon::move_owned`],
//!   [`Lexicon::delete_object`]) that queue [`PropChanged`] notifications,
//! - named bulk reference rewrites ([`Lexicon::rewrite_references`]),
//! - the form query used to resolve homograph sets
//!   ([`Lexicon::read_ids_matching_form`]),
//! - nestable units of work whose undo steps keep only the records they touched,
//! - JSON snapshot load/save.
//!
//! # Example
//! ```rust
//! use lexicon_db::{FieldTag, LexEntry, Lexicon, MoForm, Object};
//! use lexicon_types::{MorphType, MultiString};
//!
//! let mut lex = Lexicon::new();
//! let vern = lex.default_vernacular();
//! let entry = lex.insert_root(Object::Entry(LexEntry::new()));
//! lex.insert_owned(
//!     entry,
//!     FieldTag::EntryLexemeForm,
//!     None,
//!     Object::Allomorph(MoForm::new(Some(MorphType::Stem), MultiString::single(vern, "run"))),
//! )
//! .unwrap();
//! assert_eq!(lex.homograph_form(entry), "run");
//! assert_eq!(lex.read_ids_matching_form("run", false), vec![entry]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use lexicon_types::{Hvo, MorphType, PLACEHOLDER_FORM, Ws};

mod objects;
mod refs;
mod snapshot;
mod unit_of_work;

pub use objects::{
    AdhocProhibition, AffixSlot, Etymology, FieldTag, InflectionClass, LexEntry, LexEntryRef,
    LexEntryType, LexRefType, LexReference, LexSense, MoForm, MsaRecord, Object, ObjectClass,
    PartOfSpeech, Pronunciation, ReversalIndex, ReversalIndexEntry, WfiAnalysis,
    WfiMorphBundle, WfiWordform,
};
pub use refs::{InboundRef, ReferenceField};
pub use unit_of_work::{HISTORY_LIMIT, TaskLabels};

use unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no object {0}")]
    NotFound(Hvo),
    #[error("object {hvo} is a {actual:?}, expected {expected:?}")]
    WrongClass {
        hvo: Hvo,
        expected: ObjectClass,
        actual: ObjectClass,
    },
    #[error("{field:?} is not an owning property of {class:?}")]
    NotOwningField { class: ObjectClass, field: FieldTag },
    #[error("{field:?} is not a reference property of {class:?}")]
    NotReferenceField {
        class: ObjectClass,
        field: ReferenceField,
    },
    #[error("cannot move {child} under {new_owner}: it would own itself")]
    OwnershipCycle { child: Hvo, new_owner: Hvo },
}

/// Where a record sits in the ownership tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub hvo: Hvo,
    pub field: FieldTag,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Record {
    pub(crate) owner: Option<Owner>,
    pub(crate) object: Object,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Tables {
    pub(crate) objects: BTreeMap<Hvo, Record>,
    pub(crate) next_id: u32,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Default writing systems used when a caller does not name one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WritingSystems {
    pub vernacular: Ws,
    pub analysis: Ws,
}

impl Default for WritingSystems {
    fn default() -> Self {
        Self {
            vernacular: Ws(1),
            analysis: Ws(2),
        }
    }
}

/// Collection-shaped (or scalar, with zero counts) property change.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PropChanged {
    pub hvo: Hvo,
    pub field: FieldTag,
    pub index: usize,
    pub inserted: usize,
    pub removed: usize,
}

/// The object store.
#[derive(Debug, Default)]
pub struct Lexicon {
    tables: Tables,
    writing_systems: WritingSystems,
    notifications: Vec<PropChanged>,
    form_generation: u64,
    work: UnitOfWork,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_writing_systems(writing_systems: WritingSystems) -> Self {
        Self {
            writing_systems,
            ..Self::default()
        }
    }

    pub fn default_vernacular(&self) -> Ws {
        self.writing_systems.vernacular
    }

    pub fn default_analysis(&self) -> Ws {
        self.writing_systems.analysis
    }

    pub fn writing_systems(&self) -> WritingSystems {
        self.writing_systems
    }

    /// Counter that moves whenever homograph forms or morph types might have
    /// changed. Caches keyed on forms compare it to decide staleness.
    pub fn form_generation(&self) -> u64 {
        self.form_generation
    }

    pub fn object(&self, hvo: Hvo) -> Option<&Object> {
        self.tables.objects.get(&hvo).map(|r| &r.object)
    }

    pub fn contains(&self, hvo: Hvo) -> bool {
        self.tables.objects.contains_key(&hvo)
    }

    pub fn class_of(&self, hvo: Hvo) -> Option<ObjectClass> {
        self.object(hvo).map(Object::class)
    }

    pub fn owner(&self, hvo: Hvo) -> Option<Owner> {
        self.tables.objects.get(&hvo).and_then(|r| r.owner)
    }

    pub fn object_count(&self) -> usize {
        self.tables.objects.len()
    }

    /// Fail unless `hvo` exists and is of `expected` class.
    pub fn expect_class(&self, hvo: Hvo, expected: ObjectClass) -> Result<(), StoreError> {
        let actual = self.class_of(hvo).ok_or(StoreError::NotFound(hvo))?;
        if actual == expected {
            Ok(())
        } else {
            Err(StoreError::WrongClass {
                hvo,
                expected,
                actual,
            })
        }
    }

    /// All objects of one class in enumeration (creation) order.
    pub fn ids_of_class(&self, class: ObjectClass) -> Vec<Hvo> {
        self.tables
            .objects
            .iter()
            .filter(|(_, r)| r.object.class() == class)
            .map(|(hvo, _)| *hvo)
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Hvo, &LexEntry)> + '_ {
        self.tables.objects.iter().filter_map(|(hvo, r)| match &r.object {
            Object::Entry(e) => Some((*hvo, e)),
            _ => None,
        })
    }

    fn alloc_id(&mut self) -> Hvo {
        let hvo = Hvo(self.tables.next_id);
        self.tables.next_id += 1;
        hvo
    }

    fn note_structural(&mut self, class: ObjectClass) {
        if matches!(class, ObjectClass::Entry | ObjectClass::Allomorph) {
            self.form_generation += 1;
        }
    }

    /// Insert an unowned (top-level) object.
    pub fn insert_root(&mut self, object: Object) -> Hvo {
        let hvo = self.alloc_id();
        self.note_structural(object.class());
        self.put_record(
            hvo,
            Record {
                owner: None,
                object,
            },
        );
        trace!(%hvo, "inserted root object");
        hvo
    }

    /// Create `object` inside an owning property of `owner`.
    ///
    /// Sequence properties insert at `index` (or append); atomic properties
    /// replace any previous occupant, which is deleted.
    pub fn insert_owned(
        &mut self,
        owner: Hvo,
        field: FieldTag,
        index: Option<usize>,
        object: Object,
    ) -> Result<Hvo, StoreError> {
        self.check_owning_field(owner, field)?;
        let hvo = self.alloc_id();
        self.note_structural(object.class());
        self.put_record(
            hvo,
            Record {
                owner: Some(Owner { hvo: owner, field }),
                object,
            },
        );
        self.attach(owner, field, index, hvo)?;
        Ok(hvo)
    }

    /// Move an owned (or top-level) object into another owning property.
    pub fn move_owned(
        &mut self,
        child: Hvo,
        new_owner: Hvo,
        field: FieldTag,
        index: Option<usize>,
    ) -> Result<(), StoreError> {
        if !self.contains(child) {
            return Err(StoreError::NotFound(child));
        }
        self.check_owning_field(new_owner, field)?;
        if new_owner == child || self.is_owned_by(new_owner, child) {
            return Err(StoreError::OwnershipCycle { child, new_owner });
        }
        if let Some(class) = self.class_of(child) {
            self.note_structural(class);
        }
        self.detach(child);
        if let Some(record) = self.record_mut(child) {
            record.owner = Some(Owner {
                hvo: new_owner,
                field,
            });
        }
        self.attach(new_owner, field, index, child)
    }

    /// Delete an object, everything it owns, and every reference to any of it.
    ///
    /// Returns the deleted handles (the object first, then its subtree).
    pub fn delete_object(&mut self, hvo: Hvo) -> Result<Vec<Hvo>, StoreError> {
        if !self.contains(hvo) {
            return Err(StoreError::NotFound(hvo));
        }
        let doomed = self.owned_subtree(hvo);
        self.detach(hvo);
        for id in &doomed {
            if let Some(record) = self.take_record(*id) {
                self.note_structural(record.object.class());
            }
        }
        let doomed_set: BTreeSet<Hvo> = doomed.iter().copied().collect();
        self.remove_references_to(&doomed_set);
        trace!(%hvo, count = doomed.len(), "deleted object subtree");
        Ok(doomed)
    }

    /// Detach an owned object and keep it as a top-level object.
    pub fn make_root(&mut self, hvo: Hvo) -> Result<(), StoreError> {
        let class = self.class_of(hvo).ok_or(StoreError::NotFound(hvo))?;
        self.note_structural(class);
        self.detach(hvo);
        Ok(())
    }

    /// `hvo` and everything it owns, transitively, parents before children.
    pub fn owned_subtree(&self, hvo: Hvo) -> Vec<Hvo> {
        let mut out = Vec::new();
        let mut stack = vec![hvo];
        while let Some(next) = stack.pop() {
            if let Some(object) = self.object(next) {
                out.push(next);
                stack.extend(object.owned_children().into_iter().rev());
            }
        }
        out
    }

    /// Deep-copy `src` and its owned subtree into an owning property of
    /// `new_owner`. References held by the copies still point at whatever the
    /// originals referred to.
    pub fn copy_owned(
        &mut self,
        src: Hvo,
        new_owner: Hvo,
        field: FieldTag,
    ) -> Result<Hvo, StoreError> {
        let object = self
            .object(src)
            .ok_or(StoreError::NotFound(src))?
            .without_owned_children();
        let copy = self.insert_owned(new_owner, field, None, object)?;
        let children = self
            .object(src)
            .map(Object::owned_children)
            .unwrap_or_default();
        for child in children {
            if let Some(Owner { field, .. }) = self.owner(child) {
                self.copy_owned(child, copy, field)?;
            }
        }
        Ok(copy)
    }

    fn check_owning_field(&mut self, owner: Hvo, field: FieldTag) -> Result<(), StoreError> {
        let record = self
            .tables
            .objects
            .get_mut(&owner)
            .ok_or(StoreError::NotFound(owner))?;
        let class = record.object.class();
        let ok = record.object.owning_list_mut(field).is_some()
            || record.object.owning_atomic_mut(field).is_some();
        if ok {
            Ok(())
        } else {
            Err(StoreError::NotOwningField { class, field })
        }
    }

    fn attach(
        &mut self,
        owner: Hvo,
        field: FieldTag,
        index: Option<usize>,
        child: Hvo,
    ) -> Result<(), StoreError> {
        let record = self.record_mut(owner).ok_or(StoreError::NotFound(owner))?;
        let class = record.object.class();
        if let Some(list) = record.object.owning_list_mut(field) {
            let at = index.unwrap_or(list.len()).min(list.len());
            list.insert(at, child);
            self.notify(owner, field, at, 1, 0);
            return Ok(());
        }
        if let Some(slot) = record.object.owning_atomic_mut(field) {
            let previous = slot.replace(child);
            let removed = usize::from(previous.is_some());
            self.notify(owner, field, 0, 1, removed);
            if let Some(previous) = previous {
                // The replaced occupant no longer has an owning slot.
                if let Some(prev) = self.record_mut(previous) {
                    prev.owner = None;
                }
                self.delete_object(previous)?;
            }
            return Ok(());
        }
        Err(StoreError::NotOwningField { class, field })
    }

    fn detach(&mut self, child: Hvo) {
        let Some(Owner { hvo: owner, field }) = self.owner(child) else {
            return;
        };
        let mut removed_at = None;
        if let Some(record) = self.record_mut(owner) {
            if let Some(list) = record.object.owning_list_mut(field) {
                if let Some(pos) = list.iter().position(|h| *h == child) {
                    list.remove(pos);
                    removed_at = Some(pos);
                }
            } else if let Some(slot) = record.object.owning_atomic_mut(field)
                && *slot == Some(child)
            {
                *slot = None;
                removed_at = Some(0);
            }
        }
        if let Some(at) = removed_at {
            self.notify(owner, field, at, 0, 1);
        }
        if let Some(record) = self.record_mut(child) {
            record.owner = None;
        }
    }

    /// Whether `ancestor` appears on the ownership chain above `hvo`.
    pub fn is_owned_by(&self, hvo: Hvo, ancestor: Hvo) -> bool {
        let mut cursor = self.owner(hvo);
        while let Some(Owner { hvo: owner, .. }) = cursor {
            if owner == ancestor {
                return true;
            }
            cursor = self.owner(owner);
        }
        false
    }

    /// The entry at the top of `hvo`'s ownership chain (itself, for an entry).
    pub fn owning_entry(&self, hvo: Hvo) -> Option<Hvo> {
        let mut cursor = Some(hvo);
        while let Some(current) = cursor {
            if self.class_of(current) == Some(ObjectClass::Entry) {
                return Some(current);
            }
            cursor = self.owner(current).map(|o| o.hvo);
        }
        None
    }

    /// Every sense of an entry, recursively, in pre-order.
    pub fn all_senses(&self, entry: Hvo) -> Vec<Hvo> {
        let roots = self.entry(entry).map(|e| e.senses.clone()).unwrap_or_default();
        self.sense_subtrees(&roots)
    }

    /// `sense` followed by all its sub-senses, in pre-order.
    pub fn sense_subtree(&self, sense: Hvo) -> Vec<Hvo> {
        self.sense_subtrees(&[sense])
    }

    fn sense_subtrees(&self, roots: &[Hvo]) -> Vec<Hvo> {
        let mut out = Vec::new();
        let mut stack: Vec<Hvo> = roots.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if let Some(sense) = self.sense(next) {
                out.push(next);
                stack.extend(sense.senses.iter().rev().copied());
            }
        }
        out
    }

    /// Queue a property change notification.
    pub fn notify(
        &mut self,
        hvo: Hvo,
        field: FieldTag,
        index: usize,
        inserted: usize,
        removed: usize,
    ) {
        self.notifications.push(PropChanged {
            hvo,
            field,
            index,
            inserted,
            removed,
        });
    }

    pub fn pending_notifications(&self) -> &[PropChanged] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<PropChanged> {
        std::mem::take(&mut self.notifications)
    }

    /// Stamp the modification time of the entry that owns `hvo`.
    pub fn touch(&mut self, hvo: Hvo) {
        let Some(entry) = self.owning_entry(hvo) else {
            return;
        };
        if let Some(Object::Entry(e)) = self.record_mut(entry).map(|r| &mut r.object)
        {
            e.date_modified = Utc::now();
            self.notify(entry, FieldTag::EntryDateModified, 0, 0, 0);
        }
    }

    /// Returns whether the number actually changed.
    pub fn set_homograph_number(&mut self, entry: Hvo, number: u32) -> Result<bool, StoreError> {
        self.expect_class(entry, ObjectClass::Entry)?;
        let changed = match self.record_mut(entry).map(|r| &mut r.object) {
            Some(Object::Entry(e)) if e.homograph_number != number => {
                e.homograph_number = number;
                true
            }
            _ => false,
        };
        if changed {
            self.notify(entry, FieldTag::EntryHomographNumber, 0, 0, 0);
        }
        Ok(changed)
    }

    /// Lexeme form text in the default vernacular writing system.
    pub fn lexeme_form_text(&self, entry: Hvo) -> Option<&str> {
        let lf = self.entry(entry)?.lexeme_form?;
        self.allomorph(lf)?.form.get(self.default_vernacular())
    }

    pub fn citation_form_text(&self, entry: Hvo) -> Option<&str> {
        self.entry(entry)?
            .citation_form
            .get(self.default_vernacular())
    }

    /// Citation form, else lexeme form, else [`PLACEHOLDER_FORM`].
    pub fn homograph_form(&self, entry: Hvo) -> String {
        self.citation_form_text(entry)
            .or_else(|| self.lexeme_form_text(entry))
            .unwrap_or(PLACEHOLDER_FORM)
            .to_string()
    }

    /// Morph types of the lexeme form and every alternate form, in that order.
    pub fn morph_types(&self, entry: Hvo) -> Vec<MorphType> {
        let Some(e) = self.entry(entry) else {
            return Vec::new();
        };
        e.lexeme_form
            .iter()
            .chain(&e.alternate_forms)
            .filter_map(|af| self.allomorph(*af).and_then(|a| a.morph_type))
            .collect()
    }

    /// The morph type that classifies the entry: its lexeme form's, else the
    /// first typed alternate form's.
    pub fn primary_morph_type(&self, entry: Hvo) -> Option<MorphType> {
        self.morph_types(entry).first().copied()
    }

    /// Entries whose homograph form equals `form`, or (with
    /// `match_lex_forms`) whose bare lexeme form does.
    pub fn read_ids_matching_form(&self, form: &str, match_lex_forms: bool) -> Vec<Hvo> {
        self.entries()
            .map(|(hvo, _)| hvo)
            .filter(|hvo| {
                self.homograph_form(*hvo) == form
                    || (match_lex_forms && self.lexeme_form_text(*hvo) == Some(form))
            })
            .collect()
    }
}

macro_rules! typed_access {
    ($($get:ident, $get_mut:ident, $variant:ident, $ty:ty;)*) => {
        impl Lexicon {
            $(
                pub fn $get(&self, hvo: Hvo) -> Option<&$ty> {
                    match self.object(hvo) {
                        Some(Object::$variant(inner)) => Some(inner),
                        _ => None,
                    }
                }

                pub fn $get_mut(&mut self, hvo: Hvo) -> Option<&mut $ty> {
                    self.note_structural(ObjectClass::$variant);
                    match self.record_mut(hvo).map(|r| &mut r.object) {
                        Some(Object::$variant(inner)) => Some(inner),
                        _ => None,
                    }
                }
            )*
        }
    };
}

typed_access! {
    entry, entry_mut, Entry, LexEntry;
    sense, sense_mut, Sense, LexSense;
    allomorph, allomorph_mut, Allomorph, MoForm;
    msa, msa_mut, Msa, MsaRecord;
    pronunciation, pronunciation_mut, Pronunciation, Pronunciation;
    etymology, etymology_mut, Etymology, Etymology;
    entry_ref, entry_ref_mut, EntryRef, LexEntryRef;
    entry_type, entry_type_mut, EntryType, LexEntryType;
    ref_type, ref_type_mut, RefType, LexRefType;
    lex_reference, lex_reference_mut, Reference, LexReference;
    wordform, wordform_mut, Wordform, WfiWordform;
    analysis, analysis_mut, Analysis, WfiAnalysis;
    morph_bundle, morph_bundle_mut, MorphBundle, WfiMorphBundle;
    prohibition, prohibition_mut, Prohibition, AdhocProhibition;
    part_of_speech, part_of_speech_mut, PartOfSpeech, PartOfSpeech;
    affix_slot, affix_slot_mut, AffixSlot, AffixSlot;
    inflection_class, inflection_class_mut, InflectionClass, InflectionClass;
    reversal_index, reversal_index_mut, ReversalIndex, ReversalIndex;
    reversal_entry, reversal_entry_mut, ReversalEntry, ReversalIndexEntry;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexicon_types::MultiString;

    fn entry_with_form(lex: &mut Lexicon, text: &str) -> Hvo {
        let vern = lex.default_vernacular();
        let entry = lex.insert_root(Object::Entry(LexEntry::new()));
        lex.insert_owned(
            entry,
            FieldTag::EntryLexemeForm,
            None,
            Object::Allomorph(MoForm::new(
                Some(MorphType::Stem),
                MultiString::single(vern, text),
            )),
        )
        .unwrap();
        entry
    }

    fn add_sense(lex: &mut Lexicon, owner: Hvo, field: FieldTag) -> Hvo {
        lex.insert_owned(owner, field, None, Object::Sense(LexSense::default()))
            .unwrap()
    }

    #[test]
    fn handles_are_allocated_in_creation_order() {
        let mut lex = Lexicon::new();
        let a = entry_with_form(&mut lex, "a");
        let b = entry_with_form(&mut lex, "b");
        assert!(a < b);
        let ids: Vec<Hvo> = lex.entries().map(|(h, _)| h).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn owned_insert_records_owner_and_notifies() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        lex.take_notifications();
        let sense = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        assert_eq!(
            lex.owner(sense),
            Some(Owner {
                hvo: entry,
                field: FieldTag::EntrySenses
            })
        );
        assert_eq!(
            lex.take_notifications(),
            vec![PropChanged {
                hvo: entry,
                field: FieldTag::EntrySenses,
                index: 0,
                inserted: 1,
                removed: 0
            }]
        );
    }

    #[test]
    fn rejects_non_owning_fields() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let err = lex
            .insert_owned(
                entry,
                FieldTag::SenseSenses,
                None,
                Object::Sense(LexSense::default()),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotOwningField { .. }));
    }

    #[test]
    fn delete_cascades_and_strips_references() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let sense = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        let sub = add_sense(&mut lex, sense, FieldTag::SenseSenses);
        let bundle = lex.insert_root(Object::MorphBundle(WfiMorphBundle {
            sense: Some(sub),
            ..WfiMorphBundle::default()
        }));

        let deleted = lex.delete_object(entry).unwrap();
        assert_eq!(deleted[0], entry);
        assert!(deleted.contains(&sub));
        assert!(!lex.contains(sense));
        assert_eq!(lex.morph_bundle(bundle).unwrap().sense, None);
    }

    #[test]
    fn move_refuses_to_create_cycles() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let sense = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        let sub = add_sense(&mut lex, sense, FieldTag::SenseSenses);
        let err = lex
            .move_owned(sense, sub, FieldTag::SenseSenses, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::OwnershipCycle { .. }));

        lex.move_owned(sub, entry, FieldTag::EntrySenses, Some(0))
            .unwrap();
        assert_eq!(lex.entry(entry).unwrap().senses, vec![sub, sense]);
        assert!(lex.sense(sense).unwrap().senses.is_empty());
    }

    #[test]
    fn copy_owned_duplicates_the_subtree() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let sense = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        add_sense(&mut lex, sense, FieldTag::SenseSenses);
        let other = lex.insert_root(Object::Entry(LexEntry::new()));

        let copy = lex.copy_owned(sense, other, FieldTag::EntrySenses).unwrap();
        assert_ne!(copy, sense);
        assert_eq!(lex.all_senses(other).len(), 2);
        assert_eq!(lex.all_senses(entry).len(), 2);
        assert_eq!(lex.owned_subtree(other)[0], other);
    }

    #[test]
    fn make_root_detaches_from_owner() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let sense = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        lex.make_root(sense).unwrap();
        assert_eq!(lex.owner(sense), None);
        assert!(lex.entry(entry).unwrap().senses.is_empty());
    }

    #[test]
    fn all_senses_walks_in_pre_order() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let s1 = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        let s1a = add_sense(&mut lex, s1, FieldTag::SenseSenses);
        let s2 = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        assert_eq!(lex.all_senses(entry), vec![s1, s1a, s2]);
        assert_eq!(lex.owning_entry(s1a), Some(entry));
        assert!(lex.is_owned_by(s1a, entry));
    }

    #[test]
    fn homograph_form_prefers_citation_form() {
        let mut lex = Lexicon::new();
        let vern = lex.default_vernacular();
        let entry = entry_with_form(&mut lex, "ran");
        assert_eq!(lex.homograph_form(entry), "ran");
        lex.entry_mut(entry).unwrap().citation_form.set(vern, "run");
        assert_eq!(lex.homograph_form(entry), "run");
        assert_eq!(lex.read_ids_matching_form("ran", false), Vec::<Hvo>::new());
        assert_eq!(lex.read_ids_matching_form("ran", true), vec![entry]);

        let bare = lex.insert_root(Object::Entry(LexEntry::new()));
        assert_eq!(lex.homograph_form(bare), PLACEHOLDER_FORM);
    }

    #[test]
    fn replacing_atomic_owner_deletes_previous_occupant() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        let old_lf = lex.entry(entry).unwrap().lexeme_form.unwrap();
        let generation = lex.form_generation();
        lex.insert_owned(
            entry,
            FieldTag::EntryLexemeForm,
            None,
            Object::Allomorph(MoForm::new(None, MultiString::new())),
        )
        .unwrap();
        assert!(!lex.contains(old_lf));
        assert!(lex.form_generation() > generation);
        assert_eq!(lex.primary_morph_type(entry), None);
    }

    #[test]
    fn homograph_number_change_is_reported_once() {
        let mut lex = Lexicon::new();
        let entry = entry_with_form(&mut lex, "run");
        assert!(lex.set_homograph_number(entry, 2).unwrap());
        assert!(!lex.set_homograph_number(entry, 2).unwrap());
        let sense = add_sense(&mut lex, entry, FieldTag::EntrySenses);
        assert!(lex.set_homograph_number(sense, 1).is_err());
    }
}
