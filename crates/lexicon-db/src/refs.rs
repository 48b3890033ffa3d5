//! Non-owning reference properties and the bulk rewrite over them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use lexicon_types::Hvo;

use crate::objects::{FieldTag, Object, ObjectClass};
use crate::{Lexicon, StoreError};

/// Every property that refers to another object without owning it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ReferenceField {
    SenseMsa,
    MsaComponents,
    EntryRefComponentLexemes,
    EntryRefPrimaryLexemes,
    EntryRefVariantTypes,
    EntryRefComplexTypes,
    LexReferenceTargets,
    MorphBundleMsa,
    MorphBundleMorph,
    MorphBundleSense,
    ProhibitionFirst,
    ProhibitionMembers,
    ProhibitionRest,
    ReversalSenses,
}

impl ReferenceField {
    pub const ALL: [ReferenceField; 14] = [
        ReferenceField::SenseMsa,
        ReferenceField::MsaComponents,
        ReferenceField::EntryRefComponentLexemes,
        ReferenceField::EntryRefPrimaryLexemes,
        ReferenceField::EntryRefVariantTypes,
        ReferenceField::EntryRefComplexTypes,
        ReferenceField::LexReferenceTargets,
        ReferenceField::MorphBundleMsa,
        ReferenceField::MorphBundleMorph,
        ReferenceField::MorphBundleSense,
        ReferenceField::ProhibitionFirst,
        ReferenceField::ProhibitionMembers,
        ReferenceField::ProhibitionRest,
        ReferenceField::ReversalSenses,
    ];

    pub fn tag(self) -> FieldTag {
        match self {
            ReferenceField::SenseMsa => FieldTag::SenseMsa,
            ReferenceField::MsaComponents => FieldTag::MsaComponents,
            ReferenceField::EntryRefComponentLexemes => FieldTag::EntryRefComponentLexemes,
            ReferenceField::EntryRefPrimaryLexemes => FieldTag::EntryRefPrimaryLexemes,
            ReferenceField::EntryRefVariantTypes => FieldTag::EntryRefVariantTypes,
            ReferenceField::EntryRefComplexTypes => FieldTag::EntryRefComplexTypes,
            ReferenceField::LexReferenceTargets => FieldTag::LexReferenceTargets,
            ReferenceField::MorphBundleMsa => FieldTag::MorphBundleMsa,
            ReferenceField::MorphBundleMorph => FieldTag::MorphBundleMorph,
            ReferenceField::MorphBundleSense => FieldTag::MorphBundleSense,
            ReferenceField::ProhibitionFirst => FieldTag::ProhibitionFirst,
            ReferenceField::ProhibitionMembers => FieldTag::ProhibitionMembers,
            ReferenceField::ProhibitionRest => FieldTag::ProhibitionRest,
            ReferenceField::ReversalSenses => FieldTag::ReversalSenses,
        }
    }

    /// Class of the object holding the property.
    pub fn source_class(self) -> ObjectClass {
        match self {
            ReferenceField::SenseMsa => ObjectClass::Sense,
            ReferenceField::MsaComponents => ObjectClass::Msa,
            ReferenceField::EntryRefComponentLexemes
            | ReferenceField::EntryRefPrimaryLexemes
            | ReferenceField::EntryRefVariantTypes
            | ReferenceField::EntryRefComplexTypes => ObjectClass::EntryRef,
            ReferenceField::LexReferenceTargets => ObjectClass::Reference,
            ReferenceField::MorphBundleMsa
            | ReferenceField::MorphBundleMorph
            | ReferenceField::MorphBundleSense => ObjectClass::MorphBundle,
            ReferenceField::ProhibitionFirst
            | ReferenceField::ProhibitionMembers
            | ReferenceField::ProhibitionRest => ObjectClass::Prohibition,
            ReferenceField::ReversalSenses => ObjectClass::ReversalEntry,
        }
    }

    pub fn is_atomic(self) -> bool {
        matches!(
            self,
            ReferenceField::SenseMsa
                | ReferenceField::MorphBundleMsa
                | ReferenceField::MorphBundleMorph
                | ReferenceField::MorphBundleSense
                | ReferenceField::ProhibitionFirst
        )
    }

    /// Collections without meaningful duplicates; a rewrite that maps two
    /// members onto one target keeps a single copy.
    fn is_set_like(self) -> bool {
        !self.is_atomic()
            && !matches!(
                self,
                ReferenceField::LexReferenceTargets
                    | ReferenceField::ProhibitionMembers
                    | ReferenceField::ProhibitionRest
            )
    }
}

/// One object pointing at another through a reference property.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InboundRef {
    pub source: Hvo,
    pub field: ReferenceField,
}

enum Slot<'a> {
    Atomic(&'a mut Option<Hvo>),
    Seq(&'a mut Vec<Hvo>),
}

impl Object {
    fn reference_slot(&mut self, field: ReferenceField) -> Option<Slot<'_>> {
        use ReferenceField as F;
        Some(match (self, field) {
            (Object::Sense(s), F::SenseMsa) => Slot::Atomic(&mut s.msa),
            (Object::Msa(m), F::MsaComponents) => Slot::Seq(&mut m.components),
            (Object::EntryRef(r), F::EntryRefComponentLexemes) => {
                Slot::Seq(&mut r.component_lexemes)
            }
            (Object::EntryRef(r), F::EntryRefPrimaryLexemes) => Slot::Seq(&mut r.primary_lexemes),
            (Object::EntryRef(r), F::EntryRefVariantTypes) => {
                Slot::Seq(&mut r.variant_entry_types)
            }
            (Object::EntryRef(r), F::EntryRefComplexTypes) => {
                Slot::Seq(&mut r.complex_entry_types)
            }
            (Object::Reference(r), F::LexReferenceTargets) => Slot::Seq(&mut r.targets),
            (Object::MorphBundle(b), F::MorphBundleMsa) => Slot::Atomic(&mut b.msa),
            (Object::MorphBundle(b), F::MorphBundleMorph) => Slot::Atomic(&mut b.morph),
            (Object::MorphBundle(b), F::MorphBundleSense) => Slot::Atomic(&mut b.sense),
            (Object::Prohibition(p), F::ProhibitionFirst) => Slot::Atomic(&mut p.first),
            (Object::Prohibition(p), F::ProhibitionMembers) => Slot::Seq(&mut p.members),
            (Object::Prohibition(p), F::ProhibitionRest) => Slot::Seq(&mut p.rest),
            (Object::ReversalEntry(r), F::ReversalSenses) => Slot::Seq(&mut r.senses),
            _ => return None,
        })
    }

    /// Current value of a reference property, if this object has it.
    pub fn references(&self, field: ReferenceField) -> Option<&[Hvo]> {
        use ReferenceField as F;
        Some(match (self, field) {
            (Object::Sense(s), F::SenseMsa) => s.msa.as_slice(),
            (Object::Msa(m), F::MsaComponents) => &m.components,
            (Object::EntryRef(r), F::EntryRefComponentLexemes) => &r.component_lexemes,
            (Object::EntryRef(r), F::EntryRefPrimaryLexemes) => &r.primary_lexemes,
            (Object::EntryRef(r), F::EntryRefVariantTypes) => &r.variant_entry_types,
            (Object::EntryRef(r), F::EntryRefComplexTypes) => &r.complex_entry_types,
            (Object::Reference(r), F::LexReferenceTargets) => &r.targets,
            (Object::MorphBundle(b), F::MorphBundleMsa) => b.msa.as_slice(),
            (Object::MorphBundle(b), F::MorphBundleMorph) => b.morph.as_slice(),
            (Object::MorphBundle(b), F::MorphBundleSense) => b.sense.as_slice(),
            (Object::Prohibition(p), F::ProhibitionFirst) => p.first.as_slice(),
            (Object::Prohibition(p), F::ProhibitionMembers) => &p.members,
            (Object::Prohibition(p), F::ProhibitionRest) => &p.rest,
            (Object::ReversalEntry(r), F::ReversalSenses) => &r.senses,
            _ => return None,
        })
    }
}

fn dedup_in_order(list: &mut Vec<Hvo>) {
    let mut seen = BTreeSet::new();
    list.retain(|h| seen.insert(*h));
}

/// Apply `map` to a slot; returns `(old_len, new_len)` when anything changed.
fn rewrite_slot(slot: Slot<'_>, field: ReferenceField, map: &BTreeMap<Hvo, Hvo>) -> Option<(usize, usize)> {
    match slot {
        Slot::Atomic(value) => {
            let new = map.get(&(*value)?)?;
            *value = Some(*new);
            Some((1, 1))
        }
        Slot::Seq(list) => {
            if !list.iter().any(|h| map.contains_key(h)) {
                return None;
            }
            let old_len = list.len();
            for h in list.iter_mut() {
                if let Some(new) = map.get(h) {
                    *h = *new;
                }
            }
            if field.is_set_like() {
                dedup_in_order(list);
            }
            Some((old_len, list.len()))
        }
    }
}

fn strip_slot(slot: Slot<'_>, doomed: &BTreeSet<Hvo>) -> Option<(usize, usize)> {
    match slot {
        Slot::Atomic(value) => {
            if value.is_some_and(|h| doomed.contains(&h)) {
                *value = None;
                Some((1, 0))
            } else {
                None
            }
        }
        Slot::Seq(list) => {
            let old_len = list.len();
            list.retain(|h| !doomed.contains(h));
            (list.len() != old_len).then_some((old_len, list.len()))
        }
    }
}

impl Lexicon {
    /// Every (source, property) pair that currently points at `target`.
    pub fn inbound_references(&self, target: Hvo) -> Vec<InboundRef> {
        let mut out = Vec::new();
        for (source, record) in &self.tables.objects {
            for field in ReferenceField::ALL {
                if let Some(values) = record.object.references(field)
                    && values.contains(&target)
                {
                    out.push(InboundRef {
                        source: *source,
                        field,
                    });
                }
            }
        }
        out
    }

    /// Replace, in every object holding `field`, each handle that is a key of
    /// `map` with its value. Returns how many objects changed.
    pub fn rewrite_references(&mut self, field: ReferenceField, map: &BTreeMap<Hvo, Hvo>) -> usize {
        if map.is_empty() {
            return 0;
        }
        let holders: Vec<Hvo> = self
            .tables
            .objects
            .iter()
            .filter(|(_, r)| {
                r.object
                    .references(field)
                    .is_some_and(|values| values.iter().any(|h| map.contains_key(h)))
            })
            .map(|(hvo, _)| *hvo)
            .collect();
        let mut changed = Vec::new();
        for hvo in holders {
            if let Some(record) = self.record_mut(hvo)
                && let Some(slot) = record.object.reference_slot(field)
                && let Some(lens) = rewrite_slot(slot, field, map)
            {
                changed.push((hvo, lens));
            }
        }
        let count = changed.len();
        for (hvo, (old_len, new_len)) in changed {
            self.notify(hvo, field.tag(), 0, new_len, old_len);
        }
        count
    }

    /// [`Lexicon::rewrite_references`] over every reference property.
    pub fn rewrite_all_references(&mut self, map: &BTreeMap<Hvo, Hvo>) -> usize {
        ReferenceField::ALL
            .into_iter()
            .map(|field| self.rewrite_references(field, map))
            .sum()
    }

    /// Drop every reference to any handle in `doomed`.
    pub fn remove_references_to(&mut self, doomed: &BTreeSet<Hvo>) {
        if doomed.is_empty() {
            return;
        }
        let holders: Vec<Hvo> = self
            .tables
            .objects
            .iter()
            .filter(|(_, r)| {
                ReferenceField::ALL.into_iter().any(|field| {
                    r.object
                        .references(field)
                        .is_some_and(|values| values.iter().any(|h| doomed.contains(h)))
                })
            })
            .map(|(hvo, _)| *hvo)
            .collect();
        let mut changed = Vec::new();
        for hvo in holders {
            let Some(record) = self.record_mut(hvo) else {
                continue;
            };
            for field in ReferenceField::ALL {
                if let Some(slot) = record.object.reference_slot(field)
                    && let Some(lens) = strip_slot(slot, doomed)
                {
                    changed.push((hvo, field, lens));
                }
            }
        }
        for (hvo, field, (old_len, new_len)) in changed {
            self.notify(hvo, field.tag(), 0, new_len, old_len);
        }
    }

    fn slot_of(&mut self, source: Hvo, field: ReferenceField) -> Result<Slot<'_>, StoreError> {
        let record = self
            .record_mut(source)
            .ok_or(StoreError::NotFound(source))?;
        let class = record.object.class();
        record
            .object
            .reference_slot(field)
            .ok_or(StoreError::NotReferenceField { class, field })
    }

    pub fn references(&self, source: Hvo, field: ReferenceField) -> Result<Vec<Hvo>, StoreError> {
        let object = self.object(source).ok_or(StoreError::NotFound(source))?;
        object
            .references(field)
            .map(<[Hvo]>::to_vec)
            .ok_or(StoreError::NotReferenceField {
                class: object.class(),
                field,
            })
    }

    /// Add `target` to a collection property (at `index`, or appended), or
    /// set an atomic one. Set-like collections ignore a duplicate.
    pub fn insert_reference(
        &mut self,
        source: Hvo,
        field: ReferenceField,
        index: Option<usize>,
        target: Hvo,
    ) -> Result<(), StoreError> {
        if !self.contains(target) {
            return Err(StoreError::NotFound(target));
        }
        let notice = match self.slot_of(source, field)? {
            Slot::Atomic(value) => {
                let removed = usize::from(value.is_some());
                *value = Some(target);
                Some((0, removed))
            }
            Slot::Seq(list) => {
                if field.is_set_like() && list.contains(&target) {
                    None
                } else {
                    let at = index.unwrap_or(list.len()).min(list.len());
                    list.insert(at, target);
                    Some((at, 0))
                }
            }
        };
        if let Some((at, removed)) = notice {
            self.notify(source, field.tag(), at, 1, removed);
        }
        Ok(())
    }

    /// Remove the first occurrence of `target`; returns whether it was present.
    pub fn remove_reference(
        &mut self,
        source: Hvo,
        field: ReferenceField,
        target: Hvo,
    ) -> Result<bool, StoreError> {
        let removed_at = match self.slot_of(source, field)? {
            Slot::Atomic(value) if *value == Some(target) => {
                *value = None;
                Some(0)
            }
            Slot::Atomic(_) => None,
            Slot::Seq(list) => {
                let pos = list.iter().position(|h| *h == target);
                if let Some(pos) = pos {
                    list.remove(pos);
                }
                pos
            }
        };
        if let Some(at) = removed_at {
            self.notify(source, field.tag(), at, 0, 1);
        }
        Ok(removed_at.is_some())
    }

    /// Overwrite an atomic reference property.
    pub fn set_reference(
        &mut self,
        source: Hvo,
        field: ReferenceField,
        target: Option<Hvo>,
    ) -> Result<(), StoreError> {
        if let Some(target) = target
            && !self.contains(target)
        {
            return Err(StoreError::NotFound(target));
        }
        let changed = match self.slot_of(source, field)? {
            Slot::Atomic(value) => {
                let changed = *value != target;
                *value = target;
                changed
            }
            Slot::Seq(list) => {
                let replacement: Vec<Hvo> = target.into_iter().collect();
                let changed = *list != replacement;
                *list = replacement;
                changed
            }
        };
        if changed {
            self.notify(source, field.tag(), 0, usize::from(target.is_some()), 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdhocProhibition, LexEntry, LexEntryRef, LexReference, LexSense, MsaRecord};
    use lexicon_types::{Msa, MsaDescriptor, ProhibitionKind, RefType};

    fn msa(lex: &mut Lexicon, entry: Hvo) -> Hvo {
        lex.insert_owned(
            entry,
            FieldTag::EntryMsas,
            None,
            Object::Msa(MsaRecord::new(Msa::from_descriptor(&MsaDescriptor::stem(None)))),
        )
        .unwrap()
    }

    #[test]
    fn rewrite_touches_only_the_named_field() {
        let mut lex = Lexicon::new();
        let entry = lex.insert_root(Object::Entry(LexEntry::new()));
        let old = msa(&mut lex, entry);
        let new = msa(&mut lex, entry);
        let sense = lex
            .insert_owned(
                entry,
                FieldTag::EntrySenses,
                None,
                Object::Sense(LexSense {
                    msa: Some(old),
                    ..LexSense::default()
                }),
            )
            .unwrap();
        let prohibition = lex.insert_root(Object::Prohibition(AdhocProhibition {
            kind: ProhibitionKind::Morpheme,
            first: Some(old),
            members: vec![old],
            rest: Vec::new(),
        }));

        let map = BTreeMap::from([(old, new)]);
        assert_eq!(lex.rewrite_references(ReferenceField::SenseMsa, &map), 1);
        assert_eq!(lex.sense(sense).unwrap().msa, Some(new));
        assert_eq!(lex.prohibition(prohibition).unwrap().first, Some(old));

        assert_eq!(lex.rewrite_all_references(&map), 1);
        let p = lex.prohibition(prohibition).unwrap();
        assert_eq!((p.first, p.members.clone()), (Some(new), vec![new]));
    }

    #[test]
    fn set_like_collections_collapse_duplicates_but_sequences_keep_them() {
        let mut lex = Lexicon::new();
        let a = lex.insert_root(Object::Entry(LexEntry::new()));
        let b = lex.insert_root(Object::Entry(LexEntry::new()));
        let owner = lex.insert_root(Object::Entry(LexEntry::new()));
        let entry_ref = lex
            .insert_owned(
                owner,
                FieldTag::EntryEntryRefs,
                None,
                Object::EntryRef(LexEntryRef {
                    component_lexemes: vec![a, b],
                    ..LexEntryRef::new(RefType::ComplexForm)
                }),
            )
            .unwrap();
        let relation = lex.insert_root(Object::Reference(LexReference {
            targets: vec![a, b],
            ..LexReference::default()
        }));

        lex.rewrite_all_references(&BTreeMap::from([(b, a)]));
        assert_eq!(lex.entry_ref(entry_ref).unwrap().component_lexemes, vec![a]);
        assert_eq!(lex.lex_reference(relation).unwrap().targets, vec![a, a]);
    }

    #[test]
    fn inbound_references_lists_every_pointer() {
        let mut lex = Lexicon::new();
        let a = lex.insert_root(Object::Entry(LexEntry::new()));
        let relation = lex.insert_root(Object::Reference(LexReference::default()));
        lex.insert_reference(relation, ReferenceField::LexReferenceTargets, None, a)
            .unwrap();
        assert_eq!(
            lex.inbound_references(a),
            vec![InboundRef {
                source: relation,
                field: ReferenceField::LexReferenceTargets
            }]
        );
        assert!(
            lex.remove_reference(relation, ReferenceField::LexReferenceTargets, a)
                .unwrap()
        );
        assert!(lex.inbound_references(a).is_empty());
    }

    #[test]
    fn reference_errors_name_the_problem() {
        let mut lex = Lexicon::new();
        let a = lex.insert_root(Object::Entry(LexEntry::new()));
        assert!(matches!(
            lex.set_reference(a, ReferenceField::SenseMsa, None),
            Err(StoreError::NotReferenceField { .. })
        ));
        assert_eq!(
            lex.references(Hvo(99), ReferenceField::SenseMsa),
            Err(StoreError::NotFound(Hvo(99)))
        );
    }
}
