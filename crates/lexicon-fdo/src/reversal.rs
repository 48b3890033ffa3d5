//! Reversal indexes: analysis-language headwords pointing back at senses.

use std::collections::BTreeMap;

use lexicon_db::{
    FieldTag, Object, ObjectClass, ReferenceField, ReversalIndex, ReversalIndexEntry, StoreError,
};
use lexicon_types::{Hvo, MultiString, Ws};

use crate::{LexiconError, Session};

impl Session {
    pub fn create_reversal_index(&mut self, ws: Ws) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create reversal index", "Redo create reversal index", |s| {
            Ok(s.lexicon.insert_root(Object::ReversalIndex(ReversalIndex {
                ws,
                entries: Vec::new(),
            })))
        })
    }

    /// A reversal entry under an index, or a subentry under another entry.
    pub fn create_reversal_entry(
        &mut self,
        parent: Hvo,
        ws: Ws,
        form: &str,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create reversal entry", "Redo create reversal entry", |s| {
            let field = match s.lexicon.class_of(parent) {
                Some(ObjectClass::ReversalIndex) => FieldTag::ReversalIndexEntries,
                Some(ObjectClass::ReversalEntry) => FieldTag::ReversalSubentries,
                Some(actual) => {
                    return Err(StoreError::WrongClass {
                        hvo: parent,
                        expected: ObjectClass::ReversalIndex,
                        actual,
                    }
                    .into());
                }
                None => return Err(StoreError::NotFound(parent).into()),
            };
            let entry = s.lexicon.insert_owned(
                parent,
                field,
                None,
                Object::ReversalEntry(ReversalIndexEntry {
                    form: MultiString::single(ws, form),
                    ..ReversalIndexEntry::default()
                }),
            )?;
            Ok(entry)
        })
    }

    pub fn add_reversal_sense(&mut self, entry: Hvo, sense: Hvo) -> Result<(), LexiconError> {
        self.run_task("Undo add reversal sense", "Redo add reversal sense", |s| {
            s.lexicon.expect_class(entry, ObjectClass::ReversalEntry)?;
            s.lexicon.expect_class(sense, ObjectClass::Sense)?;
            s.lexicon
                .insert_reference(entry, ReferenceField::ReversalSenses, None, sense)?;
            s.lexicon.touch(sense);
            Ok(())
        })
    }

    /// Merge reversal entry `src` into `dest`. When `dest` is one of `src`'s
    /// subentries it is first lifted out so it survives the deletion.
    pub fn merge_reversal_entries(
        &mut self,
        dest: Hvo,
        src: Hvo,
        lose_no_string_data: bool,
    ) -> Result<bool, LexiconError> {
        let both = dest != src
            && self.lexicon.class_of(dest) == Some(ObjectClass::ReversalEntry)
            && self.lexicon.class_of(src) == Some(ObjectClass::ReversalEntry);
        if !both {
            return Ok(false);
        }
        self.run_task("Undo merge reversal entries", "Redo merge reversal entries", |s| {
            s.relocate_if_owned_by(dest, src)?;
            let incoming = s
                .lexicon
                .reversal_entry(src)
                .cloned()
                .ok_or(LexiconError::NoOwner(src))?;

            if let Some(r) = s.lexicon.reversal_entry_mut(dest) {
                r.form
                    .merge_alternatives(&incoming.form, lose_no_string_data.then_some(", "));
            }
            s.lexicon.notify(dest, FieldTag::ReversalForm, 0, 0, 0);
            for sense in &incoming.senses {
                s.lexicon
                    .insert_reference(dest, ReferenceField::ReversalSenses, None, *sense)?;
            }
            for sub in &incoming.subentries {
                s.lexicon
                    .move_owned(*sub, dest, FieldTag::ReversalSubentries, None)?;
            }
            s.lexicon
                .rewrite_all_references(&BTreeMap::from([(src, dest)]));
            s.lexicon.delete_object(src)?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NewEntry;
    use crate::SessionConfig;
    use lexicon_db::Lexicon;
    use lexicon_types::MorphType;

    fn setup() -> (Session, Hvo, Ws) {
        let mut s = Session::new(Lexicon::new(), SessionConfig::default());
        let anal = s.lexicon().default_analysis();
        let index = s.create_reversal_index(anal).unwrap();
        (s, index, anal)
    }

    fn sense(s: &mut Session, form: &str, gloss: &str) -> Hvo {
        let e = s
            .create_entry_with(&NewEntry::new(Some(MorphType::Stem), form).with_gloss(gloss))
            .unwrap();
        s.lexicon().entry(e).unwrap().senses[0]
    }

    #[test]
    fn entries_nest_under_indexes_and_entries() {
        let (mut s, index, anal) = setup();
        let top = s.create_reversal_entry(index, anal, "water").unwrap();
        let sub = s.create_reversal_entry(top, anal, "salt water").unwrap();
        assert_eq!(s.lexicon().reversal_index(index).unwrap().entries, vec![top]);
        assert_eq!(s.lexicon().reversal_entry(top).unwrap().subentries, vec![sub]);

        let stray = sense(&mut s, "wai", "water");
        assert!(matches!(
            s.create_reversal_entry(stray, anal, "x"),
            Err(LexiconError::Store(StoreError::WrongClass { .. }))
        ));
    }

    #[test]
    fn merge_unions_senses_and_keeps_subentries() {
        let (mut s, index, anal) = setup();
        let a = s.create_reversal_entry(index, anal, "water").unwrap();
        let b = s.create_reversal_entry(index, anal, "aqua").unwrap();
        let sub = s.create_reversal_entry(b, anal, "sea water").unwrap();
        let wai = sense(&mut s, "wai", "water");
        let vai = sense(&mut s, "vai", "water");
        s.add_reversal_sense(a, wai).unwrap();
        s.add_reversal_sense(b, wai).unwrap();
        s.add_reversal_sense(b, vai).unwrap();

        assert!(s.merge_object(a, b, false).unwrap());
        let merged = s.lexicon().reversal_entry(a).unwrap();
        assert_eq!(merged.senses, vec![wai, vai]);
        assert_eq!(merged.subentries, vec![sub]);
        assert_eq!(merged.form.get(anal), Some("water"));
        assert!(!s.lexicon().contains(b));
    }

    #[test]
    fn merging_into_own_subentry_lifts_it_first() {
        let (mut s, index, anal) = setup();
        let parent = s.create_reversal_entry(index, anal, "run").unwrap();
        let child = s.create_reversal_entry(parent, anal, "run away").unwrap();
        assert!(s.merge_reversal_entries(child, parent, true).unwrap());
        assert!(s.lexicon().contains(child));
        assert_eq!(s.lexicon().reversal_index(index).unwrap().entries, vec![child]);
        assert_eq!(
            s.lexicon().reversal_entry(child).unwrap().form.get(anal),
            Some("run away")
        );
    }
}
