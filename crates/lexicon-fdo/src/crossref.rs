//! Variant and complex-form links, lexical relations, and the cleanup that
//! keeps them non-degenerate when their members go away.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use lexicon_db::{
    FieldTag, LexEntryRef, LexEntryType, LexRefType, LexReference, Object, ObjectClass,
    ReferenceField,
};
use lexicon_types::{Hvo, MappingType, RefType};

use crate::entry::NewEntry;
use crate::{LexiconError, Session};

/// Outcome of taking one target out of a lexical relation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRemoval {
    NotATarget,
    Removed,
    /// The relation would have become degenerate and was deleted instead.
    ReferenceDeleted,
}

/// Repairs needed before a set of objects can be deleted.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CascadePlan {
    pub relations_deleted: Vec<Hvo>,
    pub relations_pruned: Vec<Hvo>,
    pub entry_refs_deleted: Vec<Hvo>,
    pub entry_refs_pruned: Vec<Hvo>,
    pub prohibitions_deleted: Vec<Hvo>,
}

impl Session {
    fn mapping_of(&self, reference: Hvo) -> Option<MappingType> {
        let owner = self.lexicon.owner(reference)?;
        self.lexicon.ref_type(owner.hvo).map(|t| t.mapping_type)
    }

    /// Work out how relations, entry refs and prohibitions outside `doomed`
    /// must change when everything in `doomed` is deleted.
    pub(crate) fn plan_cascade(&self, doomed: &BTreeSet<Hvo>) -> CascadePlan {
        let lex = &self.lexicon;
        let mut plan = CascadePlan::default();

        for reference in lex.ids_of_class(ObjectClass::Reference) {
            let Some(r) = lex.lex_reference(reference) else {
                continue;
            };
            if doomed.contains(&reference) || !r.targets.iter().any(|t| doomed.contains(t)) {
                continue;
            }
            let remaining = r.targets.iter().filter(|t| !doomed.contains(*t)).count();
            let root_lost = self.mapping_of(reference).is_some_and(MappingType::is_tree)
                && r.targets.first().is_some_and(|t| doomed.contains(t));
            if remaining < 2 || root_lost {
                plan.relations_deleted.push(reference);
            } else {
                plan.relations_pruned.push(reference);
            }
        }

        for entry_ref in lex.ids_of_class(ObjectClass::EntryRef) {
            let Some(r) = lex.entry_ref(entry_ref) else {
                continue;
            };
            if doomed.contains(&entry_ref) {
                continue;
            }
            let hit = |list: &[Hvo]| list.iter().any(|c| doomed.contains(c));
            if !r.component_lexemes.is_empty()
                && r.component_lexemes.iter().all(|c| doomed.contains(c))
            {
                plan.entry_refs_deleted.push(entry_ref);
            } else if hit(&r.component_lexemes) || hit(&r.primary_lexemes) {
                plan.entry_refs_pruned.push(entry_ref);
            }
        }

        for prohibition in lex.ids_of_class(ObjectClass::Prohibition) {
            let Some(p) = lex.prohibition(prohibition) else {
                continue;
            };
            let first_gone = p.first.is_some_and(|f| doomed.contains(&f));
            let members_gone =
                !p.members.is_empty() && p.members.iter().all(|m| doomed.contains(m));
            if first_gone || members_gone {
                plan.prohibitions_deleted.push(prohibition);
            }
        }
        plan
    }

    pub(crate) fn apply_cascade(
        &mut self,
        plan: &CascadePlan,
        doomed: &BTreeSet<Hvo>,
    ) -> Result<(), LexiconError> {
        for reference in &plan.relations_deleted {
            self.delete_lex_reference_now(*reference)?;
        }
        for reference in &plan.relations_pruned {
            let targets = self
                .lexicon
                .lex_reference(*reference)
                .map(|r| r.targets.clone())
                .unwrap_or_default();
            for target in targets.iter().filter(|t| doomed.contains(*t)) {
                self.lexicon
                    .remove_reference(*reference, ReferenceField::LexReferenceTargets, *target)?;
            }
            for target in targets.iter().filter(|t| !doomed.contains(*t)) {
                self.lexicon.touch(*target);
            }
        }
        for entry_ref in &plan.entry_refs_deleted {
            self.lexicon.delete_object(*entry_ref)?;
            debug!(%entry_ref, "deleted entry ref left without components");
        }
        for entry_ref in &plan.entry_refs_pruned {
            for field in [
                ReferenceField::EntryRefComponentLexemes,
                ReferenceField::EntryRefPrimaryLexemes,
            ] {
                for target in self.lexicon.references(*entry_ref, field)? {
                    if doomed.contains(&target) {
                        self.lexicon.remove_reference(*entry_ref, field, target)?;
                    }
                }
            }
            self.lexicon.touch(*entry_ref);
        }
        for prohibition in &plan.prohibitions_deleted {
            self.lexicon.delete_object(*prohibition)?;
        }
        Ok(())
    }

    fn check_component(&self, dependent: Hvo, component: Hvo) -> Result<(), LexiconError> {
        match self.lexicon.class_of(component) {
            Some(ObjectClass::Entry | ObjectClass::Sense) => {}
            _ => return Err(LexiconError::InvalidComponent(component)),
        }
        if self.lexicon.owning_entry(component) == Some(dependent) {
            return Err(LexiconError::InvalidComponent(component));
        }
        Ok(())
    }

    /// A variant or complex-form type label.
    pub fn create_entry_type(&mut self, name: &str, ref_type: RefType) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create type", "Redo create type", |s| {
            Ok(s.lexicon.insert_root(Object::EntryType(LexEntryType {
                name: name.to_string(),
                ref_type,
            })))
        })
    }

    /// The variant entry ref of `entry` whose only component is `component`,
    /// preferring one tagged with `variant_type`.
    pub fn find_matching_variant_entry_ref(
        &self,
        entry: Hvo,
        component: Hvo,
        variant_type: Option<Hvo>,
    ) -> Option<Hvo> {
        let refs: Vec<(Hvo, &LexEntryRef)> = self
            .lexicon
            .entry(entry)?
            .entry_refs
            .iter()
            .filter_map(|h| self.lexicon.entry_ref(*h).map(|r| (*h, r)))
            .filter(|(_, r)| r.ref_type == RefType::Variant && r.component_lexemes == [component])
            .collect();
        let exact = refs.iter().find(|(_, r)| match variant_type {
            Some(t) => r.variant_entry_types.contains(&t),
            None => r.variant_entry_types.is_empty(),
        });
        exact.or(refs.first()).map(|(h, _)| *h)
    }

    /// Record `variant` as a variant of `component` (an entry or sense),
    /// reusing a matching entry ref when there is one.
    pub fn make_variant_of(
        &mut self,
        variant: Hvo,
        component: Hvo,
        variant_type: Option<Hvo>,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo add variant", "Redo add variant", |s| {
            s.lexicon.expect_class(variant, ObjectClass::Entry)?;
            s.check_component(variant, component)?;
            if let Some(t) = variant_type {
                s.lexicon.expect_class(t, ObjectClass::EntryType)?;
            }

            if let Some(existing) = s.find_matching_variant_entry_ref(variant, component, variant_type) {
                if let Some(t) = variant_type {
                    s.lexicon.insert_reference(
                        existing,
                        ReferenceField::EntryRefVariantTypes,
                        None,
                        t,
                    )?;
                }
                return Ok(existing);
            }

            let entry_ref = s.lexicon.insert_owned(
                variant,
                FieldTag::EntryEntryRefs,
                None,
                Object::EntryRef(LexEntryRef {
                    component_lexemes: vec![component],
                    variant_entry_types: variant_type.into_iter().collect(),
                    ..LexEntryRef::new(RefType::Variant)
                }),
            )?;
            s.lexicon
                .notify(component, FieldTag::VariantFormBackRefs, 0, 1, 0);
            s.lexicon.touch(variant);
            Ok(entry_ref)
        })
    }

    /// Create a new entry spelled `form` and make it a variant of `component`.
    /// Returns the new entry.
    pub fn create_variant_entry_and_back_ref(
        &mut self,
        component: Hvo,
        variant_type: Option<Hvo>,
        form: &str,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create variant", "Redo create variant", |s| {
            let owner = s
                .lexicon
                .owning_entry(component)
                .ok_or(LexiconError::InvalidComponent(component))?;
            let morph_type = s.lexicon.primary_morph_type(owner);
            let variant = s.create_entry_with(&NewEntry::new(morph_type, form))?;
            s.make_variant_of(variant, component, variant_type)?;
            Ok(variant)
        })
    }

    /// Add `component` to the complex-form entry ref of `entry`, creating the
    /// ref if needed. Returns the entry ref.
    pub fn add_complex_form_component(
        &mut self,
        entry: Hvo,
        component: Hvo,
        primary: bool,
        complex_type: Option<Hvo>,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo add component", "Redo add component", |s| {
            s.lexicon.expect_class(entry, ObjectClass::Entry)?;
            s.check_component(entry, component)?;
            if let Some(t) = complex_type {
                s.lexicon.expect_class(t, ObjectClass::EntryType)?;
            }
            let existing = s.lexicon.entry(entry).and_then(|e| {
                e.entry_refs.iter().copied().find(|h| {
                    s.lexicon
                        .entry_ref(*h)
                        .is_some_and(|r| r.ref_type == RefType::ComplexForm)
                })
            });
            let entry_ref = match existing {
                Some(h) => h,
                None => s.lexicon.insert_owned(
                    entry,
                    FieldTag::EntryEntryRefs,
                    None,
                    Object::EntryRef(LexEntryRef::new(RefType::ComplexForm)),
                )?,
            };
            s.lexicon.insert_reference(
                entry_ref,
                ReferenceField::EntryRefComponentLexemes,
                None,
                component,
            )?;
            if primary {
                s.lexicon.insert_reference(
                    entry_ref,
                    ReferenceField::EntryRefPrimaryLexemes,
                    None,
                    component,
                )?;
            }
            if let Some(t) = complex_type {
                s.lexicon
                    .insert_reference(entry_ref, ReferenceField::EntryRefComplexTypes, None, t)?;
            }
            s.lexicon
                .notify(component, FieldTag::ComplexFormBackRefs, 0, 1, 0);
            s.lexicon.touch(entry);
            Ok(entry_ref)
        })
    }

    fn entry_refs_naming(&self, component: Hvo, kind: RefType) -> Vec<Hvo> {
        self.lexicon
            .ids_of_class(ObjectClass::EntryRef)
            .into_iter()
            .filter(|h| {
                self.lexicon.entry_ref(*h).is_some_and(|r| {
                    r.ref_type == kind && r.component_lexemes.contains(&component)
                })
            })
            .collect()
    }

    /// Entry refs that list `component` as the thing they are a variant of.
    pub fn variant_entry_refs_of(&self, component: Hvo) -> Vec<Hvo> {
        self.entry_refs_naming(component, RefType::Variant)
    }

    pub fn complex_form_entry_refs_of(&self, component: Hvo) -> Vec<Hvo> {
        self.entry_refs_naming(component, RefType::ComplexForm)
    }

    /// Lexical relations `target` takes part in.
    pub fn lex_references_of(&self, target: Hvo) -> Vec<Hvo> {
        self.lexicon
            .ids_of_class(ObjectClass::Reference)
            .into_iter()
            .filter(|h| {
                self.lexicon
                    .lex_reference(*h)
                    .is_some_and(|r| r.targets.contains(&target))
            })
            .collect()
    }

    pub fn create_lex_ref_type(
        &mut self,
        name: &str,
        mapping_type: MappingType,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create relation type", "Redo create relation type", |s| {
            Ok(s.lexicon.insert_root(Object::RefType(LexRefType {
                name: name.to_string(),
                reverse_name: None,
                mapping_type,
                members: Vec::new(),
            })))
        })
    }

    fn check_target(&self, mapping: MappingType, target: Hvo) -> Result<(), LexiconError> {
        let ok = match self.lexicon.class_of(target) {
            Some(ObjectClass::Entry) => mapping.accepts_entries(),
            Some(ObjectClass::Sense) => mapping.accepts_senses(),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(LexiconError::InvalidTargets(format!(
                "{target} cannot take part in a {mapping:?} relation"
            )))
        }
    }

    /// A relation of `ref_type` among `targets`, checked against its mapping
    /// type's cardinality and target classes.
    pub fn create_lex_reference(
        &mut self,
        ref_type: Hvo,
        targets: &[Hvo],
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create relation", "Redo create relation", |s| {
            s.lexicon.expect_class(ref_type, ObjectClass::RefType)?;
            let mapping = s
                .lexicon
                .ref_type(ref_type)
                .map(|t| t.mapping_type)
                .ok_or(LexiconError::NoOwner(ref_type))?;
            if targets.len() < mapping.min_targets() {
                return Err(LexiconError::InvalidTargets(format!(
                    "{mapping:?} needs at least {} targets",
                    mapping.min_targets()
                )));
            }
            if let Some(max) = mapping.max_targets()
                && targets.len() > max
            {
                return Err(LexiconError::InvalidTargets(format!(
                    "{mapping:?} allows at most {max} targets"
                )));
            }
            let distinct: BTreeSet<Hvo> = targets.iter().copied().collect();
            if distinct.len() != targets.len() {
                return Err(LexiconError::InvalidTargets("duplicate target".into()));
            }
            for target in targets {
                s.check_target(mapping, *target)?;
            }

            let reference = s.lexicon.insert_owned(
                ref_type,
                FieldTag::RefTypeMembers,
                None,
                Object::Reference(LexReference {
                    targets: targets.to_vec(),
                    ..LexReference::default()
                }),
            )?;
            for target in targets {
                s.lexicon
                    .notify(*target, FieldTag::LexReferenceBackRefs, 0, 1, 0);
                s.lexicon.touch(*target);
            }
            Ok(reference)
        })
    }

    /// Whether taking `target` out of `reference` would leave it degenerate:
    /// one or no targets left, or a tree without its root.
    pub fn incomplete_without_target(&self, reference: Hvo, target: Hvo) -> Result<bool, LexiconError> {
        self.lexicon.expect_class(reference, ObjectClass::Reference)?;
        let targets = self
            .lexicon
            .lex_reference(reference)
            .map(|r| r.targets.as_slice())
            .unwrap_or_default();
        if !targets.contains(&target) {
            return Ok(false);
        }
        let root_lost = self.mapping_of(reference).is_some_and(MappingType::is_tree)
            && targets.first() == Some(&target);
        Ok(targets.len() <= 2 || root_lost)
    }

    pub fn remove_lex_reference_target(
        &mut self,
        reference: Hvo,
        target: Hvo,
    ) -> Result<TargetRemoval, LexiconError> {
        self.run_task("Undo remove relation target", "Redo remove relation target", |s| {
            let present = s
                .lexicon
                .references(reference, ReferenceField::LexReferenceTargets)?
                .contains(&target);
            if !present {
                return Ok(TargetRemoval::NotATarget);
            }
            if s.incomplete_without_target(reference, target)? {
                s.delete_lex_reference_now(reference)?;
                return Ok(TargetRemoval::ReferenceDeleted);
            }
            s.lexicon
                .remove_reference(reference, ReferenceField::LexReferenceTargets, target)?;
            s.lexicon
                .notify(target, FieldTag::LexReferenceBackRefs, 0, 0, 1);
            s.lexicon.touch(target);
            for remaining in s.lexicon.references(reference, ReferenceField::LexReferenceTargets)? {
                s.lexicon.touch(remaining);
            }
            Ok(TargetRemoval::Removed)
        })
    }

    pub fn delete_lex_reference(&mut self, reference: Hvo) -> Result<(), LexiconError> {
        self.run_task("Undo delete relation", "Redo delete relation", |s| {
            s.delete_lex_reference_now(reference)
        })
    }

    pub(crate) fn delete_lex_reference_now(&mut self, reference: Hvo) -> Result<(), LexiconError> {
        self.lexicon.expect_class(reference, ObjectClass::Reference)?;
        let targets = self
            .lexicon
            .references(reference, ReferenceField::LexReferenceTargets)?;
        self.lexicon.delete_object(reference)?;
        for target in targets {
            if self.lexicon.contains(target) {
                self.lexicon
                    .notify(target, FieldTag::LexReferenceBackRefs, 0, 0, 1);
                self.lexicon.touch(target);
            }
        }
        debug!(%reference, "deleted lexical relation");
        Ok(())
    }

    /// Put `new` where `old` was in the relation's target list.
    pub fn replace_target(&mut self, reference: Hvo, old: Hvo, new: Hvo) -> Result<bool, LexiconError> {
        self.run_task("Undo replace relation target", "Redo replace relation target", |s| {
            s.lexicon.expect_class(reference, ObjectClass::Reference)?;
            let mapping = s
                .mapping_of(reference)
                .ok_or(LexiconError::NoOwner(reference))?;
            s.check_target(mapping, new)?;
            let targets = s
                .lexicon
                .references(reference, ReferenceField::LexReferenceTargets)?;
            let Some(at) = targets.iter().position(|t| *t == old) else {
                return Ok(false);
            };
            if old == new {
                return Ok(false);
            }
            if targets.contains(&new) {
                return Err(LexiconError::InvalidTargets("duplicate target".into()));
            }
            s.lexicon
                .remove_reference(reference, ReferenceField::LexReferenceTargets, old)?;
            s.lexicon.insert_reference(
                reference,
                ReferenceField::LexReferenceTargets,
                Some(at),
                new,
            )?;
            s.lexicon
                .notify(old, FieldTag::LexReferenceBackRefs, 0, 0, 1);
            s.lexicon
                .notify(new, FieldTag::LexReferenceBackRefs, 0, 1, 0);
            for touched in [old, new] {
                s.lexicon.touch(touched);
            }
            Ok(true)
        })
    }
}
