//! Sense creation, gloss edits, deletion and splitting a sense off into a
//! copy of its entry.

use std::collections::BTreeSet;

use tracing::{debug, info};

use lexicon_db::{FieldTag, LexEntry, LexSense, Object, ObjectClass};
use lexicon_types::{Hvo, MsaDescriptor, Ws};

use crate::homograph::HomographQuery;
use crate::{LexiconError, Session, UserWarning};

impl Session {
    fn add_sense_under(
        &mut self,
        owner: Hvo,
        field: FieldTag,
        desc: &MsaDescriptor,
        gloss: &str,
    ) -> Result<Hvo, LexiconError> {
        let sense = self
            .lexicon
            .insert_owned(owner, field, None, Object::Sense(LexSense::default()))?;
        if !gloss.trim().is_empty() {
            let ws = self.lexicon.default_analysis();
            self.write_gloss(sense, ws, gloss);
        }
        self.set_sense_msa(sense, desc)?;
        Ok(sense)
    }

    /// A new last sense of `entry`, with an MSA matching `desc` and an
    /// analysis-language gloss.
    pub fn create_sense(
        &mut self,
        entry: Hvo,
        desc: &MsaDescriptor,
        gloss: &str,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create sense", "Redo create sense", |s| {
            s.lexicon.expect_class(entry, ObjectClass::Entry)?;
            s.add_sense_under(entry, FieldTag::EntrySenses, desc, gloss)
        })
    }

    pub fn create_subsense(
        &mut self,
        parent: Hvo,
        desc: &MsaDescriptor,
        gloss: &str,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create subsense", "Redo create subsense", |s| {
            s.lexicon.expect_class(parent, ObjectClass::Sense)?;
            if s.lexicon.owning_entry(parent).is_none() {
                return Err(LexiconError::OrphanSense(parent));
            }
            s.add_sense_under(parent, FieldTag::SenseSenses, desc, gloss)
        })
    }

    /// Store a gloss, cut to the configured length.
    fn write_gloss(&mut self, sense: Hvo, ws: Ws, text: &str) {
        let max = self.config.max_gloss_len;
        let length = text.chars().count();
        let kept: String = if length > max {
            self.raise(UserWarning::GlossTruncated { sense, length, max });
            text.chars().take(max).collect()
        } else {
            text.to_string()
        };
        if let Some(record) = self.lexicon.sense_mut(sense) {
            record.gloss.set(ws, kept);
        }
        self.lexicon.notify(sense, FieldTag::SenseGloss, 0, 0, 0);
        self.lexicon.touch(sense);
    }

    pub fn set_gloss(&mut self, sense: Hvo, ws: Ws, text: &str) -> Result<(), LexiconError> {
        self.run_task("Undo edit gloss", "Redo edit gloss", |s| {
            s.lexicon.expect_class(sense, ObjectClass::Sense)?;
            s.write_gloss(sense, ws, text);
            Ok(())
        })
    }

    /// Delete a sense with its subsenses, repair relations that named any of
    /// them, and drop MSAs of the entry nothing uses any more.
    pub fn delete_sense(&mut self, sense: Hvo) -> Result<(), LexiconError> {
        self.run_task("Undo delete sense", "Redo delete sense", |s| {
            s.lexicon.expect_class(sense, ObjectClass::Sense)?;
            let entry = s.lexicon.owning_entry(sense);
            let doomed: BTreeSet<Hvo> = s.lexicon.owned_subtree(sense).into_iter().collect();
            let plan = s.plan_cascade(&doomed);
            s.apply_cascade(&plan, &doomed)?;
            s.lexicon.delete_object(sense)?;
            if let Some(entry) = entry {
                s.delete_unused_msas(entry)?;
                s.lexicon.touch(entry);
            }
            Ok(())
        })
    }

    /// Split `sense` off into a new entry that copies its entry's forms,
    /// strings and links. Returns the new entry.
    pub fn move_sense_to_copy_of_entry(&mut self, sense: Hvo) -> Result<Hvo, LexiconError> {
        self.run_task("Undo move sense", "Redo move sense", |s| {
            s.lexicon.expect_class(sense, ObjectClass::Sense)?;
            let original = s
                .lexicon
                .owning_entry(sense)
                .ok_or(LexiconError::OrphanSense(sense))?;
            let source = s
                .lexicon
                .entry(original)
                .cloned()
                .ok_or(LexiconError::OrphanSense(sense))?;

            let copy = s.lexicon.insert_root(Object::Entry(LexEntry::new()));
            if let Some(e) = s.lexicon.entry_mut(copy) {
                e.citation_form.merge_alternatives(&source.citation_form, None);
                e.bibliography.merge_alternatives(&source.bibliography, None);
                e.comment.merge_alternatives(&source.comment, None);
                e.literal_meaning.merge_alternatives(&source.literal_meaning, None);
                e.restrictions.merge_alternatives(&source.restrictions, None);
                e.summary_definition
                    .merge_alternatives(&source.summary_definition, None);
                e.do_not_use_for_parsing = source.do_not_use_for_parsing;
                e.exclude_as_headword = source.exclude_as_headword;
            }

            let owned = source
                .lexeme_form
                .iter()
                .map(|h| (*h, FieldTag::EntryLexemeForm))
                .chain(source.alternate_forms.iter().map(|h| (*h, FieldTag::EntryAlternateForms)))
                .chain(source.pronunciations.iter().map(|h| (*h, FieldTag::EntryPronunciations)))
                .chain(source.entry_refs.iter().map(|h| (*h, FieldTag::EntryEntryRefs)))
                .chain(source.etymology.iter().map(|h| (*h, FieldTag::EntryEtymology)));
            for (child, field) in owned {
                s.lexicon.copy_owned(child, copy, field)?;
            }

            let moved = s.lexicon.sense_subtree(sense);
            s.lexicon
                .move_owned(sense, copy, FieldTag::EntrySenses, None)?;
            for each in &moved {
                s.adopt_msa(*each, copy)?;
            }
            let dropped = s.delete_unused_msas(original)?;
            debug!(%original, dropped, "dropped msas left behind by the split");

            s.lexicon.touch(original);
            s.lexicon.touch(copy);
            s.revalidate_homographs(copy)?;
            info!(%sense, from = %original, to = %copy, "moved sense to a copy of its entry");
            Ok(copy)
        })
    }

    fn gloss_of(&self, sense: Hvo) -> Option<&str> {
        self.lexicon
            .sense(sense)?
            .gloss
            .get(self.lexicon.default_analysis())
    }

    /// Fold the entry `sense` was just typed into (rapid data entry) into an
    /// existing homograph whose sense has the same gloss.
    ///
    /// Candidates not in `new_batch` are tried first in enumeration order,
    /// then same-batch entries by ascending handle. Returns whether a merge
    /// happened.
    pub fn rde_merge_sense(&mut self, sense: Hvo, new_batch: &[Hvo]) -> Result<bool, LexiconError> {
        self.run_task("Undo merge sense", "Redo merge sense", |s| {
            s.lexicon.expect_class(sense, ObjectClass::Sense)?;
            let entry = s
                .lexicon
                .owning_entry(sense)
                .ok_or(LexiconError::OrphanSense(sense))?;
            let Some(gloss) = s.gloss_of(sense).map(str::to_string) else {
                return Ok(false);
            };

            let form = s.lexicon.homograph_form(entry);
            let class = s.homograph_class_of(entry);
            let homographs = s.collect_homographs(&HomographQuery::new(form, class).excluding(entry));
            let (mut batch, existing): (Vec<Hvo>, Vec<Hvo>) =
                homographs.into_iter().partition(|h| new_batch.contains(h));
            batch.sort();

            for candidate in existing.into_iter().chain(batch) {
                let twin = s
                    .lexicon
                    .all_senses(candidate)
                    .into_iter()
                    .find(|other| s.gloss_of(*other) == Some(gloss.as_str()));
                let Some(twin) = twin else {
                    continue;
                };
                s.merge_senses(twin, sense, true)?;
                let empty = s.lexicon.entry(entry).is_some_and(|e| e.senses.is_empty());
                if empty {
                    s.merge_entries(candidate, entry, true)?;
                }
                info!(%sense, into = %twin, "merged rapid-entry sense");
                return Ok(true);
            }
            Ok(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NewEntry;
    use crate::SessionConfig;
    use lexicon_db::{Lexicon, Pronunciation, WfiMorphBundle};
    use lexicon_types::{MorphType, MultiString};

    fn session() -> Session {
        Session::new(Lexicon::new(), SessionConfig::default())
    }

    fn entry_with_gloss(s: &mut Session, form: &str, gloss: &str) -> Hvo {
        s.create_entry_with(&NewEntry::new(Some(MorphType::Stem), form).with_gloss(gloss))
            .unwrap()
    }

    fn first_sense(s: &Session, entry: Hvo) -> Hvo {
        s.lexicon().entry(entry).unwrap().senses[0]
    }

    #[test]
    fn matching_descriptor_shares_the_msa() {
        let mut s = session();
        let e = entry_with_gloss(&mut s, "dog", "canine");
        let second = s
            .create_sense(e, &MsaDescriptor::stem(None), "hound")
            .unwrap();
        let entry = s.lexicon().entry(e).unwrap();
        assert_eq!(entry.msas.len(), 1);
        assert_eq!(s.lexicon().sense(second).unwrap().msa, Some(entry.msas[0]));
    }

    #[test]
    fn subsense_uses_the_entry_msas() {
        let mut s = session();
        let e = entry_with_gloss(&mut s, "dog", "canine");
        let parent = first_sense(&s, e);
        let child = s
            .create_subsense(parent, &MsaDescriptor::stem(None), "puppy")
            .unwrap();
        assert_eq!(s.lexicon().sense(parent).unwrap().senses, vec![child]);
        assert_eq!(s.lexicon().owning_entry(child), Some(e));
        assert_eq!(s.lexicon().entry(e).unwrap().msas.len(), 1);
    }

    #[test]
    fn long_gloss_is_cut_with_a_warning() {
        let mut s = Session::new(
            Lexicon::new(),
            SessionConfig {
                max_gloss_len: 5,
                ..SessionConfig::default()
            },
        );
        let e = entry_with_gloss(&mut s, "dog", "domestic canine");
        let sense = first_sense(&s, e);
        let anal = s.lexicon().default_analysis();
        assert_eq!(s.lexicon().sense(sense).unwrap().gloss.get(anal), Some("domes"));
        assert_eq!(
            s.take_warnings(),
            vec![UserWarning::GlossTruncated {
                sense,
                length: 15,
                max: 5
            }]
        );
        s.set_gloss(sense, anal, "dog").unwrap();
        assert!(s.take_warnings().is_empty());
    }

    #[test]
    fn deleting_last_user_drops_the_msa_and_clears_bundles() {
        let mut s = session();
        let e = entry_with_gloss(&mut s, "dog", "canine");
        let sense = first_sense(&s, e);
        let bundle = s.lexicon_mut().insert_root(Object::MorphBundle(WfiMorphBundle {
            sense: Some(sense),
            ..WfiMorphBundle::default()
        }));
        s.delete_sense(sense).unwrap();
        assert!(s.lexicon().entry(e).unwrap().msas.is_empty());
        assert_eq!(s.lexicon().morph_bundle(bundle).unwrap().sense, None);
    }

    #[test]
    fn split_copies_forms_and_moves_msa() {
        let mut s = session();
        let e = entry_with_gloss(&mut s, "bank", "river side");
        let keep = first_sense(&s, e);
        let noun = s
            .lexicon_mut()
            .insert_root(Object::PartOfSpeech(Default::default()));
        let moved = s
            .create_sense(e, &MsaDescriptor::stem(Some(noun)), "money house")
            .unwrap();
        let vern = s.lexicon().default_vernacular();
        s.lexicon_mut()
            .insert_owned(
                e,
                FieldTag::EntryPronunciations,
                None,
                Object::Pronunciation(Pronunciation {
                    form: MultiString::single(vern, "bæŋk"),
                }),
            )
            .unwrap();

        let copy = s.move_sense_to_copy_of_entry(moved).unwrap();
        let original = s.lexicon().entry(e).unwrap();
        assert_eq!(original.senses, vec![keep]);
        assert_eq!(original.msas.len(), 1);

        let new = s.lexicon().entry(copy).unwrap();
        assert_eq!(new.senses, vec![moved]);
        assert_eq!(new.pronunciations.len(), 1);
        assert_eq!(new.msas.len(), 1);
        assert_eq!(s.lexicon().sense(moved).unwrap().msa, Some(new.msas[0]));
        assert_eq!(s.lexicon().lexeme_form_text(copy), Some("bank"));
        assert_eq!(s.headword(e), "bank1");
        assert_eq!(s.headword(copy), "bank2");
    }

    #[test]
    fn rde_prefers_existing_entries_over_the_batch() {
        let mut s = session();
        let old = entry_with_gloss(&mut s, "kala", "fish");
        let batch_a = entry_with_gloss(&mut s, "kala", "fish");
        let typed = entry_with_gloss(&mut s, "kala", "fish");
        let sense = first_sense(&s, typed);

        assert!(s.rde_merge_sense(sense, &[batch_a, typed]).unwrap());
        assert!(!s.lexicon().contains(typed));
        assert!(s.lexicon().contains(batch_a));
        assert_eq!(s.lexicon().entry(old).unwrap().senses.len(), 1);
        assert_eq!(s.headword(old), "kala1");
        assert_eq!(s.headword(batch_a), "kala2");
    }

    #[test]
    fn rde_without_matching_gloss_does_nothing() {
        let mut s = session();
        let _old = entry_with_gloss(&mut s, "kala", "fish");
        let typed = entry_with_gloss(&mut s, "kala", "sun");
        let sense = first_sense(&s, typed);
        assert!(!s.rde_merge_sense(sense, &[typed]).unwrap());
        assert!(s.lexicon().contains(typed));
    }
}
