//! Entry creation, deletion and form edits.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use lexicon_db::{FieldTag, LexEntry, MoForm, Object, ObjectClass};
use lexicon_morph::circumfix_left_and_right_parts;
use lexicon_types::{AllomorphKind, Hvo, MorphType, MsaDescriptor, MultiString, Ws};

use crate::crossref::CascadePlan;
use crate::{LexiconError, Session};

/// What a new entry starts out with.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NewEntry {
    pub morph_type: Option<MorphType>,
    pub form: String,
    /// Writing system of `form`; the default vernacular when unset.
    pub ws: Option<Ws>,
    pub gloss: Option<String>,
    pub msa: Option<MsaDescriptor>,
}

impl NewEntry {
    pub fn new(morph_type: Option<MorphType>, form: impl Into<String>) -> Self {
        Self {
            morph_type,
            form: form.into(),
            ..Self::default()
        }
    }

    pub fn with_gloss(mut self, gloss: impl Into<String>) -> Self {
        self.gloss = Some(gloss.into());
        self
    }

    pub fn with_msa(mut self, msa: MsaDescriptor) -> Self {
        self.msa = Some(msa);
        self
    }
}

/// Everything deleting an entry takes with it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DeletionImpact {
    pub entry: Hvo,
    pub homograph_form: String,
    /// The entry plus everything it owns.
    pub deleted_objects: usize,
    pub senses: usize,
    pub msas: usize,
    pub allomorphs: usize,
    #[serde(flatten)]
    pub cascade: CascadePlan,
}

impl Session {
    /// A bare entry with no forms.
    pub fn create_entry(&mut self) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create entry", "Redo create entry", |s| {
            Ok(s.lexicon.insert_root(Object::Entry(LexEntry::new())))
        })
    }

    /// An entry with a lexeme form and, when a gloss or MSA shape is given,
    /// one sense.
    ///
    /// Circumfixes also get their prefix and suffix halves as alternate forms;
    /// a circumfix form that cannot be split creates nothing.
    pub fn create_entry_with(&mut self, new: &NewEntry) -> Result<Hvo, LexiconError> {
        self.run_task("Undo create entry", "Redo create entry", |s| {
            let ws = new.ws.unwrap_or_else(|| s.lexicon.default_vernacular());
            let form = new.form.trim();
            let halves = match new.morph_type {
                Some(MorphType::Circumfix) => Some(circumfix_left_and_right_parts(form)?),
                _ => None,
            };

            let entry = s.lexicon.insert_root(Object::Entry(LexEntry::new()));
            s.lexicon.insert_owned(
                entry,
                FieldTag::EntryLexemeForm,
                None,
                Object::Allomorph(MoForm::new(new.morph_type, MultiString::single(ws, form))),
            )?;
            if let Some(parts) = halves {
                for (mt, text) in [
                    (MorphType::Prefix, parts.left),
                    (MorphType::Suffix, parts.right),
                ] {
                    s.lexicon.insert_owned(
                        entry,
                        FieldTag::EntryAlternateForms,
                        None,
                        Object::Allomorph(MoForm::new(Some(mt), MultiString::single(ws, text))),
                    )?;
                }
            }

            if new.gloss.is_some() || new.msa.is_some() {
                let desc = new.msa.clone().unwrap_or_else(|| {
                    if new.morph_type.is_some_and(MorphType::is_affix) {
                        MsaDescriptor::unclassified_affix(None)
                    } else {
                        MsaDescriptor::stem(None)
                    }
                });
                s.create_sense(entry, &desc, new.gloss.as_deref().unwrap_or_default())?;
            }

            s.revalidate_homographs(entry)?;
            info!(%entry, form, "created entry");
            Ok(entry)
        })
    }

    /// What [`Session::delete_entry`] would remove or repair, without doing it.
    pub fn deletion_impact(&self, entry: Hvo) -> Result<DeletionImpact, LexiconError> {
        self.lexicon.expect_class(entry, ObjectClass::Entry)?;
        let subtree = self.lexicon.owned_subtree(entry);
        let count = |class| {
            subtree
                .iter()
                .filter(|h| self.lexicon.class_of(**h) == Some(class))
                .count()
        };
        let doomed: BTreeSet<Hvo> = subtree.iter().copied().collect();
        Ok(DeletionImpact {
            entry,
            homograph_form: self.lexicon.homograph_form(entry),
            deleted_objects: subtree.len(),
            senses: count(ObjectClass::Sense),
            msas: count(ObjectClass::Msa),
            allomorphs: count(ObjectClass::Allomorph),
            cascade: self.plan_cascade(&doomed),
        })
    }

    /// Delete an entry with everything it owns, repair or remove relations
    /// that pointed into it, and renumber the homographs it leaves behind.
    pub fn delete_entry(&mut self, entry: Hvo) -> Result<DeletionImpact, LexiconError> {
        self.run_task("Undo delete entry", "Redo delete entry", |s| {
            let impact = s.deletion_impact(entry)?;
            let doomed: BTreeSet<Hvo> = s.lexicon.owned_subtree(entry).into_iter().collect();

            s.apply_cascade(&impact.cascade, &doomed)?;
            s.lexicon.delete_object(entry)?;
            s.revalidate_homograph_sets(&impact.homograph_form)?;
            info!(%entry, form = %impact.homograph_form, "deleted entry");
            Ok(impact)
        })
    }

    /// Renumber every set spelled like the entry was before an edit, then
    /// the one it is in now.
    pub(crate) fn revalidate_moved_entry(
        &mut self,
        entry: Hvo,
        old_form: &str,
    ) -> Result<(), LexiconError> {
        self.revalidate_homograph_sets(old_form)?;
        self.revalidate_homographs(entry)?;
        Ok(())
    }

    pub fn set_lexeme_form(&mut self, entry: Hvo, ws: Ws, text: &str) -> Result<(), LexiconError> {
        self.run_task("Undo edit lexeme form", "Redo edit lexeme form", |s| {
            s.lexicon.expect_class(entry, ObjectClass::Entry)?;
            let old_form = s.lexicon.homograph_form(entry);

            match s.lexicon.entry(entry).and_then(|e| e.lexeme_form) {
                Some(lf) => {
                    if let Some(allomorph) = s.lexicon.allomorph_mut(lf) {
                        allomorph.form.set(ws, text);
                    }
                    s.lexicon.notify(lf, FieldTag::AllomorphForm, 0, 0, 0);
                }
                None => {
                    s.lexicon.insert_owned(
                        entry,
                        FieldTag::EntryLexemeForm,
                        None,
                        Object::Allomorph(MoForm::new(None, MultiString::single(ws, text))),
                    )?;
                }
            }
            s.lexicon.touch(entry);
            s.revalidate_moved_entry(entry, &old_form)
        })
    }

    pub fn set_citation_form(&mut self, entry: Hvo, ws: Ws, text: &str) -> Result<(), LexiconError> {
        self.run_task("Undo edit citation form", "Redo edit citation form", |s| {
            s.lexicon.expect_class(entry, ObjectClass::Entry)?;
            let old_form = s.lexicon.homograph_form(entry);
            if let Some(e) = s.lexicon.entry_mut(entry) {
                e.citation_form.set(ws, text);
            }
            s.lexicon.notify(entry, FieldTag::EntryCitationForm, 0, 0, 0);
            s.lexicon.touch(entry);
            s.revalidate_moved_entry(entry, &old_form)
        })
    }

    /// Retype an allomorph. When the entry's lexeme form crosses between the
    /// stem and affix families, its MSAs are replaced by ones of the new
    /// family.
    pub fn change_morph_type(
        &mut self,
        allomorph: Hvo,
        morph_type: Option<MorphType>,
    ) -> Result<(), LexiconError> {
        self.run_task("Undo change morph type", "Redo change morph type", |s| {
            s.lexicon.expect_class(allomorph, ObjectClass::Allomorph)?;
            let entry = s
                .lexicon
                .owning_entry(allomorph)
                .ok_or(LexiconError::NoOwner(allomorph))?;
            let old_form = s.lexicon.homograph_form(entry);
            let was_affix = s
                .lexicon
                .primary_morph_type(entry)
                .is_some_and(MorphType::is_affix);

            if let Some(form) = s.lexicon.allomorph_mut(allomorph) {
                form.morph_type = morph_type;
                form.kind = morph_type.map_or(AllomorphKind::Stem, MorphType::allomorph_kind);
            }
            s.lexicon
                .notify(allomorph, FieldTag::AllomorphMorphType, 0, 0, 0);
            s.lexicon.touch(entry);

            let now_affix = s
                .lexicon
                .primary_morph_type(entry)
                .is_some_and(MorphType::is_affix);
            if was_affix != now_affix {
                let obsolete: Vec<Hvo> = s
                    .lexicon
                    .entry(entry)
                    .map(|e| e.msas.clone())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|m| {
                        s.lexicon
                            .msa(*m)
                            .is_some_and(|r| !r.msa.kind().fits_affix_family(now_affix))
                    })
                    .collect();
                if !obsolete.is_empty() {
                    s.replace_obsolete_msas(entry, &obsolete)?;
                }
            }
            s.revalidate_moved_entry(entry, &old_form)
        })
    }

    pub fn add_alternate_form(
        &mut self,
        entry: Hvo,
        morph_type: Option<MorphType>,
        ws: Ws,
        text: &str,
    ) -> Result<Hvo, LexiconError> {
        self.run_task("Undo add allomorph", "Redo add allomorph", |s| {
            s.lexicon.expect_class(entry, ObjectClass::Entry)?;
            let allomorph = s.lexicon.insert_owned(
                entry,
                FieldTag::EntryAlternateForms,
                None,
                Object::Allomorph(MoForm::new(morph_type, MultiString::single(ws, text))),
            )?;
            s.lexicon.touch(entry);
            let form = s.lexicon.homograph_form(entry);
            s.revalidate_homograph_sets(&form)?;
            s.revalidate_homographs(entry)?;
            Ok(allomorph)
        })
    }
}
