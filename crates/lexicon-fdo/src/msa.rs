//! MSA deduplication, replacement and retirement.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use lexicon_db::{FieldTag, MsaRecord, Object, ObjectClass, ReferenceField};
use lexicon_types::{Hvo, Msa, MsaDescriptor, MsaKind};

use crate::{LexiconError, Session};

/// Every reference property that can point at an MSA.
const MSA_REFERENCE_FIELDS: [ReferenceField; 6] = [
    ReferenceField::SenseMsa,
    ReferenceField::MorphBundleMsa,
    ReferenceField::ProhibitionFirst,
    ReferenceField::ProhibitionMembers,
    ReferenceField::ProhibitionRest,
    ReferenceField::MsaComponents,
];

impl Session {
    fn msa_value(&self, msa: Hvo) -> Result<&Msa, LexiconError> {
        self.lexicon.expect_class(msa, ObjectClass::Msa)?;
        self.lexicon
            .msa(msa)
            .map(|r| &r.msa)
            .ok_or(LexiconError::NoOwner(msa))
    }

    fn msas_of(&self, entry: Hvo) -> Vec<Hvo> {
        self.lexicon
            .entry(entry)
            .map(|e| e.msas.clone())
            .unwrap_or_default()
    }

    /// Attach a fully built MSA to `entry`.
    pub(crate) fn add_msa(&mut self, entry: Hvo, msa: Msa) -> Result<Hvo, LexiconError> {
        let hvo = self.lexicon.insert_owned(
            entry,
            FieldTag::EntryMsas,
            None,
            Object::Msa(MsaRecord::new(msa)),
        )?;
        Ok(hvo)
    }

    /// An MSA of `entry` equal to `wanted`, or a new one attached to it.
    pub(crate) fn find_or_add_msa(&mut self, entry: Hvo, wanted: Msa) -> Result<Hvo, LexiconError> {
        for existing in self.msas_of(entry) {
            if self.msa_value(existing)?.equals_msa(&wanted) {
                return Ok(existing);
            }
        }
        self.add_msa(entry, wanted)
    }

    /// Point `sense` at an MSA of its entry matching `desc`, creating one if
    /// needed. The previous MSA is retired when no sense of the entry uses it
    /// any more.
    pub fn set_sense_msa(&mut self, sense: Hvo, desc: &MsaDescriptor) -> Result<Hvo, LexiconError> {
        self.run_task("Undo set grammatical info", "Redo set grammatical info", |s| {
            s.lexicon.expect_class(sense, ObjectClass::Sense)?;
            let entry = s
                .lexicon
                .owning_entry(sense)
                .ok_or(LexiconError::OrphanSense(sense))?;
            let old = s.lexicon.sense(sense).and_then(|x| x.msa);

            let mut wanted = Msa::from_descriptor(desc);
            let mut target = None;
            for existing in s.msas_of(entry) {
                if s.msa_value(existing)?.matches_descriptor(desc) {
                    target = Some(existing);
                    break;
                }
            }
            let target = match target {
                Some(existing) => existing,
                None => {
                    if let Some(old) = old {
                        let previous = s.msa_value(old)?.clone();
                        wanted.copy_refinements_from(&previous);
                    }
                    s.add_msa(entry, wanted)?
                }
            };

            s.lexicon
                .set_reference(sense, ReferenceField::SenseMsa, Some(target))?;
            s.lexicon.touch(sense);
            if let Some(old) = old
                && old != target
            {
                s.retire_msa(entry, old, target)?;
            }
            Ok(target)
        })
    }

    /// Delete `old` if no sense of `entry` uses it, first moving every other
    /// reference over to `replacement`.
    fn retire_msa(&mut self, entry: Hvo, old: Hvo, replacement: Hvo) -> Result<bool, LexiconError> {
        let used_by_sense = self
            .lexicon
            .all_senses(entry)
            .into_iter()
            .any(|s| self.lexicon.sense(s).and_then(|x| x.msa) == Some(old));
        if used_by_sense {
            return Ok(false);
        }
        self.replace_msa_references(&BTreeMap::from([(old, replacement)]));
        self.lexicon.delete_object(old)?;
        debug!(%old, %replacement, "retired msa");
        Ok(true)
    }

    /// Rewrite every MSA-valued reference through `map`.
    pub fn replace_msa_references(&mut self, map: &BTreeMap<Hvo, Hvo>) -> usize {
        if map.is_empty() {
            return 0;
        }
        MSA_REFERENCE_FIELDS
            .into_iter()
            .map(|field| self.lexicon.rewrite_references(field, map))
            .sum()
    }

    /// Replace `obsolete` MSAs of `entry` with ones fitting its current
    /// stem/affix family, keeping only the part of speech. Returns the
    /// old → new map that was applied.
    pub fn replace_obsolete_msas(
        &mut self,
        entry: Hvo,
        obsolete: &[Hvo],
    ) -> Result<BTreeMap<Hvo, Hvo>, LexiconError> {
        self.run_task("Undo replace grammatical info", "Redo replace grammatical info", |s| {
            s.lexicon.expect_class(entry, ObjectClass::Entry)?;
            let is_affix = s
                .lexicon
                .primary_morph_type(entry)
                .is_some_and(|mt| mt.is_affix());
            let kind = if is_affix {
                MsaKind::UnclassifiedAffix
            } else {
                MsaKind::Stem
            };
            let doomed: BTreeSet<Hvo> = obsolete.iter().copied().collect();

            let mut map = BTreeMap::new();
            for old in obsolete {
                let pos = s.msa_value(*old)?.main_part_of_speech();
                let wanted = Msa::with_part_of_speech(kind, pos);
                let mut reuse = None;
                for existing in s.msas_of(entry) {
                    if !doomed.contains(&existing) && s.msa_value(existing)?.equals_msa(&wanted) {
                        reuse = Some(existing);
                        break;
                    }
                }
                let new = match reuse {
                    Some(existing) => existing,
                    None => s.add_msa(entry, wanted)?,
                };
                map.insert(*old, new);
            }

            s.replace_msa_references(&map);
            for old in obsolete {
                if s.lexicon.contains(*old) {
                    s.lexicon.delete_object(*old)?;
                }
            }
            Ok(map)
        })
    }

    /// Fold MSAs of `entry` that are equal to an earlier one into it.
    /// Returns how many were removed.
    pub fn merge_redundant_msas(&mut self, entry: Hvo) -> Result<usize, LexiconError> {
        self.run_task("Undo merge grammatical info", "Redo merge grammatical info", |s| {
            let mut survivors: Vec<Hvo> = Vec::new();
            let mut map = BTreeMap::new();
            for msa in s.msas_of(entry) {
                let value = s.msa_value(msa)?.clone();
                let mut found = None;
                for survivor in &survivors {
                    if s.msa_value(*survivor)?.equals_msa(&value) {
                        found = Some(*survivor);
                        break;
                    }
                }
                match found {
                    Some(survivor) => {
                        map.insert(msa, survivor);
                    }
                    None => survivors.push(msa),
                }
            }
            s.replace_msa_references(&map);
            for gone in map.keys() {
                s.lexicon.delete_object(*gone)?;
            }
            Ok(map.len())
        })
    }

    /// Whether anything still refers to `msa`.
    pub fn msa_in_use(&self, msa: Hvo) -> bool {
        !self.lexicon.inbound_references(msa).is_empty()
    }

    /// Delete MSAs of `entry` nothing refers to. Returns how many went.
    pub fn delete_unused_msas(&mut self, entry: Hvo) -> Result<usize, LexiconError> {
        let unused: Vec<Hvo> = self
            .msas_of(entry)
            .into_iter()
            .filter(|m| !self.msa_in_use(*m))
            .collect();
        for msa in &unused {
            self.lexicon.delete_object(*msa)?;
        }
        Ok(unused.len())
    }

    /// Give `sense` (already moved under `entry`) an MSA owned by `entry`,
    /// equal to the one it had, reusing an equal MSA when present.
    pub(crate) fn adopt_msa(&mut self, sense: Hvo, entry: Hvo) -> Result<(), LexiconError> {
        let Some(old) = self.lexicon.sense(sense).and_then(|x| x.msa) else {
            return Ok(());
        };
        if self.lexicon.owning_entry(old) == Some(entry) {
            return Ok(());
        }
        let value = self.msa_value(old)?.clone();
        let new = self.find_or_add_msa(entry, value)?;
        self.lexicon
            .set_reference(sense, ReferenceField::SenseMsa, Some(new))?;
        Ok(())
    }
}
