//! Folding one entry, sense or allomorph into another.
//!
//! Entry merges run in a fixed order: the lexeme forms are merged first, then
//! strings and owned children move across and references are repointed, then
//! duplicate allomorphs and MSAs are collapsed, and homographs are renumbered
//! last.

use std::collections::BTreeMap;

use tracing::info;

use lexicon_db::{FieldTag, ObjectClass, Owner, ReferenceField};
use lexicon_types::{Hvo, MultiString};

use crate::{LexiconError, Session};

/// Separator used when both sides of a gloss or definition have text.
const SENSE_SEPARATOR: &str = "; ";
const ENTRY_SEPARATOR: &str = " ";

fn separator(lose_no_string_data: bool, sep: &'static str) -> Option<&'static str> {
    lose_no_string_data.then_some(sep)
}

impl Session {
    fn both_of_class(&self, dest: Hvo, src: Hvo, class: ObjectClass) -> bool {
        dest != src
            && self.lexicon.class_of(dest) == Some(class)
            && self.lexicon.class_of(src) == Some(class)
    }

    /// Merge `src` into `dest`, whatever they are. Merging an object with
    /// itself, or two objects of different classes, does nothing.
    pub fn merge_object(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<bool, LexiconError> {
        if dest == src {
            return Ok(false);
        }
        match (self.lexicon.class_of(dest), self.lexicon.class_of(src)) {
            (Some(a), Some(b)) if a == b => match a {
                ObjectClass::Entry => self.merge_entries(dest, src, lose_no_string_data),
                ObjectClass::Sense => self.merge_senses(dest, src, lose_no_string_data),
                ObjectClass::Allomorph => self.merge_allomorphs(dest, src, lose_no_string_data),
                ObjectClass::ReversalEntry => {
                    self.merge_reversal_entries(dest, src, lose_no_string_data)
                }
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    /// If `target` sits somewhere below `source`, move it up to where
    /// `source` lives (or to the top level) so deleting `source` leaves it
    /// alone.
    pub fn relocate_if_owned_by(&mut self, target: Hvo, source: Hvo) -> Result<bool, LexiconError> {
        if !self.lexicon.is_owned_by(target, source) {
            return Ok(false);
        }
        match self.lexicon.owner(source) {
            Some(Owner { hvo, field })
                if !matches!(field, FieldTag::EntryLexemeForm | FieldTag::EntryEtymology) =>
            {
                self.lexicon.move_owned(target, hvo, field, None)?;
            }
            _ => self.lexicon.make_root(target)?,
        }
        self.lexicon.touch(target);
        Ok(true)
    }

    fn merge_allomorph_now(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<(), LexiconError> {
        let incoming = self
            .lexicon
            .allomorph(src)
            .cloned()
            .ok_or(LexiconError::NoOwner(src))?;
        if let Some(form) = self.lexicon.allomorph_mut(dest) {
            form.form
                .merge_alternatives(&incoming.form, separator(lose_no_string_data, ENTRY_SEPARATOR));
            if form.morph_type.is_none() {
                form.morph_type = incoming.morph_type;
                form.kind = incoming.kind;
            }
        }
        self.lexicon.notify(dest, FieldTag::AllomorphForm, 0, 0, 0);
        self.lexicon
            .rewrite_all_references(&BTreeMap::from([(src, dest)]));
        self.lexicon.delete_object(src)?;
        Ok(())
    }

    pub fn merge_allomorphs(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<bool, LexiconError> {
        if !self.both_of_class(dest, src, ObjectClass::Allomorph) {
            return Ok(false);
        }
        self.run_task("Undo merge allomorph", "Redo merge allomorph", |s| {
            let entries: Vec<Hvo> = [dest, src]
                .into_iter()
                .filter_map(|h| s.lexicon.owning_entry(h))
                .collect();
            let before: Vec<String> = entries
                .iter()
                .map(|e| s.lexicon.homograph_form(*e))
                .collect();

            s.relocate_if_owned_by(dest, src)?;
            s.merge_allomorph_now(dest, src, lose_no_string_data)?;

            for form in &before {
                s.revalidate_homograph_sets(form)?;
            }
            if let Some(entry) = s.lexicon.owning_entry(dest) {
                s.lexicon.touch(entry);
                s.revalidate_homographs(entry)?;
            }
            Ok(true)
        })
    }

    /// Merge entry `src` into `dest` and delete `src`.
    pub fn merge_entries(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<bool, LexiconError> {
        if !self.both_of_class(dest, src, ObjectClass::Entry) {
            return Ok(false);
        }
        self.run_task("Undo merge entries", "Redo merge entries", |s| {
            let forms = [s.lexicon.homograph_form(dest), s.lexicon.homograph_form(src)];

            // Lexeme forms first, so references to the source allomorph land
            // on the surviving one.
            let dest_lf = s.lexicon.entry(dest).and_then(|e| e.lexeme_form);
            let src_lf = s.lexicon.entry(src).and_then(|e| e.lexeme_form);
            match (dest_lf, src_lf) {
                (Some(d), Some(x)) => s.merge_allomorph_now(d, x, lose_no_string_data)?,
                (None, Some(x)) => {
                    s.lexicon
                        .move_owned(x, dest, FieldTag::EntryLexemeForm, None)?
                }
                _ => {}
            }

            s.merge_entry_fields(dest, src, lose_no_string_data)?;
            s.move_entry_children(dest, src)?;
            s.lexicon
                .rewrite_all_references(&BTreeMap::from([(src, dest)]));
            s.drop_self_references(dest)?;
            s.lexicon.delete_object(src)?;

            s.merge_duplicate_alternates(dest, lose_no_string_data)?;
            s.merge_redundant_msas(dest)?;

            for form in &forms {
                s.revalidate_homograph_sets(form)?;
            }
            s.revalidate_homographs(dest)?;
            s.lexicon.touch(dest);
            info!(%dest, %src, "merged entries");
            Ok(true)
        })
    }

    fn merge_entry_fields(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<(), LexiconError> {
        let incoming = self
            .lexicon
            .entry(src)
            .cloned()
            .ok_or(LexiconError::NoOwner(src))?;
        let sep = separator(lose_no_string_data, ENTRY_SEPARATOR);
        if let Some(e) = self.lexicon.entry_mut(dest) {
            let pairs: [(&mut MultiString, &MultiString); 6] = [
                (&mut e.citation_form, &incoming.citation_form),
                (&mut e.bibliography, &incoming.bibliography),
                (&mut e.comment, &incoming.comment),
                (&mut e.literal_meaning, &incoming.literal_meaning),
                (&mut e.restrictions, &incoming.restrictions),
                (&mut e.summary_definition, &incoming.summary_definition),
            ];
            for (ours, theirs) in pairs {
                ours.merge_alternatives(theirs, sep);
            }
            e.date_created = e.date_created.min(incoming.date_created);
        }
        self.lexicon
            .notify(dest, FieldTag::EntryStrings, 0, 0, 0);
        Ok(())
    }

    fn move_entry_children(&mut self, dest: Hvo, src: Hvo) -> Result<(), LexiconError> {
        let Some(from) = self.lexicon.entry(src).cloned() else {
            return Ok(());
        };
        let lists = [
            (FieldTag::EntryAlternateForms, from.alternate_forms),
            (FieldTag::EntrySenses, from.senses),
            (FieldTag::EntryMsas, from.msas),
            (FieldTag::EntryPronunciations, from.pronunciations),
            (FieldTag::EntryEntryRefs, from.entry_refs),
        ];
        for (field, children) in lists {
            for child in children {
                self.lexicon.move_owned(child, dest, field, None)?;
            }
        }
        if let Some(etymology) = from.etymology {
            let ours = self.lexicon.entry(dest).and_then(|e| e.etymology);
            match ours {
                None => self
                    .lexicon
                    .move_owned(etymology, dest, FieldTag::EntryEtymology, None)?,
                Some(ours) => {
                    let theirs = self.lexicon.etymology(etymology).cloned();
                    if let (Some(theirs), Some(mine)) = (theirs, self.lexicon.etymology_mut(ours)) {
                        mine.form.merge_alternatives(&theirs.form, None);
                        mine.gloss.merge_alternatives(&theirs.gloss, None);
                        mine.comment.merge_alternatives(&theirs.comment, None);
                    }
                }
            }
        }
        Ok(())
    }

    /// After a merge, `entry` may name itself (or one of its senses) as a
    /// component, or appear twice in a relation. Remove those links and any
    /// relation left degenerate.
    fn drop_self_references(&mut self, entry: Hvo) -> Result<(), LexiconError> {
        let refs = self
            .lexicon
            .entry(entry)
            .map(|e| e.entry_refs.clone())
            .unwrap_or_default();
        for entry_ref in refs {
            for field in [
                ReferenceField::EntryRefComponentLexemes,
                ReferenceField::EntryRefPrimaryLexemes,
            ] {
                for component in self.lexicon.references(entry_ref, field)? {
                    if self.lexicon.owning_entry(component) == Some(entry) {
                        self.lexicon.remove_reference(entry_ref, field, component)?;
                    }
                }
            }
            let empty = self
                .lexicon
                .entry_ref(entry_ref)
                .is_some_and(|r| r.component_lexemes.is_empty());
            if empty {
                self.lexicon.delete_object(entry_ref)?;
            }
        }

        let mut members = vec![entry];
        members.extend(self.lexicon.all_senses(entry));
        for member in members {
            self.repair_relations_of(member)?;
        }
        Ok(())
    }

    /// Drop repeated targets from every relation that includes `target`,
    /// then delete the ones left with fewer than two targets.
    pub(crate) fn repair_relations_of(&mut self, target: Hvo) -> Result<(), LexiconError> {
        for reference in self.lex_references_of(target) {
            let Some(r) = self.lexicon.lex_reference_mut(reference) else {
                continue;
            };
            let before = r.targets.len();
            let mut seen = Vec::with_capacity(before);
            r.targets.retain(|t| {
                let first = !seen.contains(t);
                seen.push(*t);
                first
            });
            let after = r.targets.len();
            if after != before {
                self.lexicon
                    .notify(reference, FieldTag::LexReferenceTargets, 0, after, before);
            }
            if after < 2 {
                self.delete_lex_reference_now(reference)?;
            }
        }
        Ok(())
    }

    /// Collapse alternate forms that agree on kind, vernacular form and morph
    /// type.
    fn merge_duplicate_alternates(
        &mut self,
        entry: Hvo,
        lose_no_string_data: bool,
    ) -> Result<(), LexiconError> {
        let vern = self.lexicon.default_vernacular();
        loop {
            let forms = self
                .lexicon
                .entry(entry)
                .map(|e| e.alternate_forms.clone())
                .unwrap_or_default();
            let mut pair = None;
            'scan: for (i, a) in forms.iter().enumerate() {
                for b in &forms[i + 1..] {
                    let (Some(x), Some(y)) = (self.lexicon.allomorph(*a), self.lexicon.allomorph(*b))
                    else {
                        continue;
                    };
                    if x.kind == y.kind
                        && x.morph_type == y.morph_type
                        && x.form.get(vern) == y.form.get(vern)
                    {
                        pair = Some((*a, *b));
                        break 'scan;
                    }
                }
            }
            match pair {
                Some((keep, drop)) => self.merge_allomorph_now(keep, drop, lose_no_string_data)?,
                None => return Ok(()),
            }
        }
    }

    /// Merge sense `src` into `dest` and delete `src`.
    pub fn merge_senses(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<bool, LexiconError> {
        if !self.both_of_class(dest, src, ObjectClass::Sense) {
            return Ok(false);
        }
        self.run_task("Undo merge senses", "Redo merge senses", |s| {
            s.relocate_if_owned_by(dest, src)?;
            let dest_entry = s
                .lexicon
                .owning_entry(dest)
                .ok_or(LexiconError::OrphanSense(dest))?;
            let src_entry = s.lexicon.owning_entry(src);
            let incoming = s
                .lexicon
                .sense(src)
                .cloned()
                .ok_or(LexiconError::OrphanSense(src))?;

            let sep = separator(lose_no_string_data, SENSE_SEPARATOR);
            let mut missing_msa = false;
            if let Some(sense) = s.lexicon.sense_mut(dest) {
                sense.gloss.merge_alternatives(&incoming.gloss, sep);
                sense.definition.merge_alternatives(&incoming.definition, sep);
                missing_msa = sense.msa.is_none();
            }
            s.lexicon.notify(dest, FieldTag::SenseGloss, 0, 0, 0);
            s.lexicon.notify(dest, FieldTag::SenseDefinition, 0, 0, 0);
            if missing_msa && let Some(msa) = incoming.msa {
                s.lexicon
                    .set_reference(dest, ReferenceField::SenseMsa, Some(msa))?;
                s.adopt_msa(dest, dest_entry)?;
            }

            for child in incoming.senses {
                let subtree = s.lexicon.sense_subtree(child);
                s.lexicon
                    .move_owned(child, dest, FieldTag::SenseSenses, None)?;
                for moved in subtree {
                    s.adopt_msa(moved, dest_entry)?;
                }
            }

            s.lexicon
                .rewrite_all_references(&BTreeMap::from([(src, dest)]));
            s.lexicon.delete_object(src)?;
            s.repair_relations_of(dest)?;

            s.delete_unused_msas(dest_entry)?;
            if let Some(entry) = src_entry
                && entry != dest_entry
                && s.lexicon.contains(entry)
            {
                s.delete_unused_msas(entry)?;
                s.lexicon.touch(entry);
            }
            s.lexicon.touch(dest);
            Ok(true)
        })
    }
}
