//! Homograph set resolution and numbering.

use tracing::debug;

use lexicon_morph::{SortKey, decorate, sort_key};
use lexicon_types::{HomographClass, Hvo, PLACEHOLDER_FORM};

use crate::{LexiconError, Session, UserWarning};

/// Which entries must share one homograph numbering sequence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HomographQuery {
    form: String,
    class: HomographClass,
    exclude: Option<Hvo>,
    candidates: Option<Vec<Hvo>>,
    match_lex_forms: bool,
}

impl HomographQuery {
    pub fn new(form: impl Into<String>, class: HomographClass) -> Self {
        Self {
            form: form.into(),
            class,
            exclude: None,
            candidates: None,
            match_lex_forms: false,
        }
    }

    /// Leave `hvo` out of the result.
    pub fn excluding(mut self, hvo: Hvo) -> Self {
        self.exclude = Some(hvo);
        self
    }

    /// Search only among `candidates` instead of the whole lexicon.
    pub fn within(mut self, candidates: Vec<Hvo>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Also match entries whose bare lexeme form equals the form even when
    /// they have a different citation form.
    pub fn matching_lexeme_forms(mut self) -> Self {
        self.match_lex_forms = true;
        self
    }

    pub fn form(&self) -> &str {
        &self.form
    }
}

impl Session {
    /// The bucket an entry is numbered in. Entries without a morph type count
    /// as stems.
    pub fn homograph_class_of(&self, entry: Hvo) -> HomographClass {
        self.lexicon
            .primary_morph_type(entry)
            .map_or(HomographClass::Stem, |mt| mt.homograph_class())
    }

    pub fn collect_homographs(&mut self, query: &HomographQuery) -> Vec<Hvo> {
        let form = query.form.as_str();
        if form.trim().is_empty() || form == PLACEHOLDER_FORM {
            return Vec::new();
        }
        let lexicon = &self.lexicon;
        let ids = match &query.candidates {
            Some(candidates) => candidates
                .iter()
                .copied()
                .filter(|hvo| {
                    lexicon.homograph_form(*hvo) == form
                        || (query.match_lex_forms && lexicon.lexeme_form_text(*hvo) == Some(form))
                })
                .collect(),
            None => self.forms.ids_matching(lexicon, form, query.match_lex_forms),
        };
        ids.into_iter()
            .filter(|hvo| Some(*hvo) != query.exclude)
            .filter(|hvo| match lexicon.primary_morph_type(*hvo) {
                None => true,
                Some(mt) => mt.homograph_class() == query.class,
            })
            .collect()
    }

    /// Repair the numbering of one homograph set, in the order given.
    ///
    /// Returns `true` when nothing had to change.
    pub fn validate_existing_homographs(&mut self, entries: &[Hvo]) -> Result<bool, LexiconError> {
        match entries {
            [] => return Ok(true),
            [only] => return Ok(!self.lexicon.set_homograph_number(*only, 0)?),
            _ => {}
        }

        let cap = self.config.homograph_cap;
        let current: Vec<u32> = entries.iter().map(|hvo| self.number_of(*hvo)).collect();
        if is_settled(&current, cap) {
            return Ok(true);
        }
        let mut numbers = current.clone();

        let mut repaired = true;
        for wanted in 1..=entries.len() as u32 {
            if numbers.contains(&wanted) {
                continue;
            }
            if wanted <= cap
                && let Some(slot) = numbers.iter().position(|n| *n == 0)
            {
                numbers[slot] = wanted;
                continue;
            }
            repaired = false;
            break;
        }

        if !repaired {
            debug!(count = entries.len(), "renumbering homograph set from scratch");
            for (i, n) in numbers.iter_mut().enumerate() {
                *n = (i as u32 + 1).min(cap);
            }
        }

        let mut changed = false;
        for ((hvo, old), new) in entries.iter().zip(&current).zip(&numbers) {
            if old != new {
                changed |= self.lexicon.set_homograph_number(*hvo, *new)?;
            }
        }
        if changed && entries.len() > cap as usize {
            self.warn_overflow(entries[0], entries.len(), cap);
        }
        Ok(!changed)
    }

    fn number_of(&self, entry: Hvo) -> u32 {
        self.lexicon.entry(entry).map_or(0, |e| e.homograph_number)
    }

    fn warn_overflow(&mut self, entry: Hvo, count: usize, cap: u32) {
        let form = self.lexicon.homograph_form(entry);
        self.raise(UserWarning::HomographOverflow { form, count, cap });
    }

    /// Renumber the homograph set `entry` currently belongs to.
    pub fn revalidate_homographs(&mut self, entry: Hvo) -> Result<bool, LexiconError> {
        let form = self.lexicon.homograph_form(entry);
        if form == PLACEHOLDER_FORM {
            return Ok(!self.lexicon.set_homograph_number(entry, 0)?);
        }
        let class = self.homograph_class_of(entry);
        self.revalidate_homograph_form(&form, class)
    }

    /// Renumber whatever entries currently share `form` in `class`; used for
    /// the set an entry just left.
    pub fn revalidate_homograph_form(
        &mut self,
        form: &str,
        class: HomographClass,
    ) -> Result<bool, LexiconError> {
        let set = self.collect_homographs(&HomographQuery::new(form, class));
        if set
            .iter()
            .any(|hvo| self.lexicon.primary_morph_type(*hvo).is_none())
        {
            return self.revalidate_homograph_sets(form);
        }
        self.validate_existing_homographs(&set)
    }

    /// Renumber every homograph set spelled `form`, whatever its class.
    ///
    /// Untyped entries sit in all of those sets at once. When they share the
    /// form with two or more typed classes the sets are numbered together:
    /// untyped entries take `1..=u` and each class continues from `u + 1`.
    pub fn revalidate_homograph_sets(&mut self, form: &str) -> Result<bool, LexiconError> {
        if form.trim().is_empty() || form == PLACEHOLDER_FORM {
            return Ok(true);
        }
        let mut untyped = Vec::new();
        let mut groups: Vec<(HomographClass, Vec<Hvo>)> = Vec::new();
        for hvo in self.forms.ids_matching(&self.lexicon, form, false) {
            let Some(mt) = self.lexicon.primary_morph_type(hvo) else {
                untyped.push(hvo);
                continue;
            };
            let class = mt.homograph_class();
            match groups.iter_mut().find(|(c, _)| *c == class) {
                Some((_, members)) => members.push(hvo),
                None => groups.push((class, vec![hvo])),
            }
        }

        if untyped.is_empty() || groups.len() <= 1 {
            let mut settled = true;
            let classes: Vec<HomographClass> = if groups.is_empty() {
                vec![HomographClass::Stem]
            } else {
                groups.iter().map(|(c, _)| *c).collect()
            };
            for class in classes {
                let set = self.collect_homographs(&HomographQuery::new(form, class));
                settled &= self.validate_existing_homographs(&set)?;
            }
            return Ok(settled);
        }
        self.number_shared_sets(&untyped, &groups)
    }

    fn number_shared_sets(
        &mut self,
        untyped: &[Hvo],
        groups: &[(HomographClass, Vec<Hvo>)],
    ) -> Result<bool, LexiconError> {
        let cap = self.config.homograph_cap;
        let shared: Vec<u32> = untyped.iter().map(|h| self.number_of(*h)).collect();
        let settled = groups.iter().all(|(_, members)| {
            let mut set = shared.clone();
            set.extend(members.iter().map(|h| self.number_of(*h)));
            is_settled(&set, cap)
        });
        if settled {
            return Ok(true);
        }

        debug!(
            untyped = untyped.len(),
            classes = groups.len(),
            "numbering homograph sets that share untyped entries"
        );
        let mut untyped_changed = false;
        for (i, hvo) in untyped.iter().enumerate() {
            untyped_changed |= self
                .lexicon
                .set_homograph_number(*hvo, (i as u32 + 1).min(cap))?;
        }
        let offset = untyped.len() as u32;
        let mut changed = untyped_changed;
        for (_, members) in groups {
            let mut set_changed = untyped_changed;
            for (j, hvo) in members.iter().enumerate() {
                set_changed |= self
                    .lexicon
                    .set_homograph_number(*hvo, (offset + j as u32 + 1).min(cap))?;
            }
            let count = untyped.len() + members.len();
            if set_changed && count > cap as usize {
                self.warn_overflow(members[0], count, cap);
            }
            changed |= set_changed;
        }
        Ok(!changed)
    }

    /// Decorated homograph form plus the homograph number when it is set.
    pub fn headword(&self, entry: Hvo) -> String {
        let form = self.lexicon.homograph_form(entry);
        let mut shown = decorate(&form, self.lexicon.primary_morph_type(entry));
        match self.lexicon.entry(entry).map(|e| e.homograph_number) {
            Some(n) if n > 0 => shown.push_str(&n.to_string()),
            _ => {}
        }
        shown
    }

    pub fn sort_key(&self, entry: Hvo) -> SortKey {
        sort_key(
            &self.lexicon.homograph_form(entry),
            self.lexicon.primary_morph_type(entry),
            self.lexicon.entry(entry).map_or(0, |e| e.homograph_number),
        )
    }
}

/// Numbers `1..=n` in any order, clamped at `cap`; a lone entry carries 0.
fn is_settled(numbers: &[u32], cap: u32) -> bool {
    match numbers {
        [] => true,
        [only] => *only == 0,
        _ => {
            let mut sorted = numbers.to_vec();
            sorted.sort_unstable();
            sorted.iter().zip(1u32..).all(|(n, want)| *n == want.min(cap))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use lexicon_db::{FieldTag, LexEntry, Lexicon, MoForm, Object};
    use lexicon_types::{MorphType, MultiString};

    fn session(cap: u32) -> Session {
        Session::new(
            Lexicon::new(),
            SessionConfig {
                homograph_cap: cap,
                ..SessionConfig::default()
            },
        )
    }

    fn raw_entry(s: &mut Session, text: &str, mt: Option<MorphType>, number: u32) -> Hvo {
        let lex = s.lexicon_mut();
        let vern = lex.default_vernacular();
        let entry = lex.insert_root(Object::Entry(LexEntry {
            homograph_number: number,
            ..LexEntry::new()
        }));
        lex.insert_owned(
            entry,
            FieldTag::EntryLexemeForm,
            None,
            Object::Allomorph(MoForm::new(mt, MultiString::single(vern, text))),
        )
        .unwrap();
        entry
    }

    fn numbers(s: &Session, set: &[Hvo]) -> Vec<u32> {
        set.iter()
            .map(|h| s.lexicon().entry(*h).unwrap().homograph_number)
            .collect()
    }

    #[test]
    fn placeholder_and_empty_forms_match_nothing() {
        let mut s = session(255);
        s.lexicon_mut().insert_root(Object::Entry(LexEntry::new()));
        assert!(
            s.collect_homographs(&HomographQuery::new(PLACEHOLDER_FORM, HomographClass::Stem))
                .is_empty()
        );
        assert!(
            s.collect_homographs(&HomographQuery::new("", HomographClass::Stem))
                .is_empty()
        );
    }

    #[test]
    fn untyped_entries_match_every_class() {
        let mut s = session(255);
        let untyped = raw_entry(&mut s, "ka", None, 0);
        let prefix = raw_entry(&mut s, "ka", Some(MorphType::Prefix), 0);
        let suffix = raw_entry(&mut s, "ka", Some(MorphType::Suffix), 0);
        let found = s.collect_homographs(&HomographQuery::new(
            "ka",
            HomographClass::Other(MorphType::Prefix),
        ));
        assert_eq!(found, vec![untyped, prefix]);
        let found = s.collect_homographs(
            &HomographQuery::new("ka", MorphType::Suffix.homograph_class()).excluding(untyped),
        );
        assert_eq!(found, vec![suffix]);
    }

    #[test]
    fn within_restricts_candidates() {
        let mut s = session(255);
        let a = raw_entry(&mut s, "ka", Some(MorphType::Root), 0);
        let _b = raw_entry(&mut s, "ka", Some(MorphType::Stem), 0);
        let found = s.collect_homographs(
            &HomographQuery::new("ka", HomographClass::Stem).within(vec![a]),
        );
        assert_eq!(found, vec![a]);
    }

    #[test]
    fn fills_zeros_before_renumbering() {
        let mut s = session(255);
        let a = raw_entry(&mut s, "bank", Some(MorphType::Stem), 2);
        let b = raw_entry(&mut s, "bank", Some(MorphType::Stem), 0);
        assert!(!s.validate_existing_homographs(&[a, b]).unwrap());
        assert_eq!(numbers(&s, &[a, b]), vec![2, 1]);
        assert!(s.validate_existing_homographs(&[a, b]).unwrap());
    }

    #[test]
    fn gaps_and_duplicates_force_full_renumber() {
        let mut s = session(255);
        let set: Vec<Hvo> = [1, 1, 5]
            .into_iter()
            .map(|n| raw_entry(&mut s, "bank", Some(MorphType::Stem), n))
            .collect();
        assert!(!s.validate_existing_homographs(&set).unwrap());
        assert_eq!(numbers(&s, &set), vec![1, 2, 3]);
    }

    #[test]
    fn singleton_is_reset_to_zero() {
        let mut s = session(255);
        let a = raw_entry(&mut s, "bank", Some(MorphType::Stem), 4);
        assert!(!s.validate_existing_homographs(&[a]).unwrap());
        assert_eq!(numbers(&s, &[a]), vec![0]);
        assert!(s.validate_existing_homographs(&[]).unwrap());
    }

    #[test]
    fn overflow_clamps_and_warns() {
        let mut s = session(3);
        let set: Vec<Hvo> = (0..5)
            .map(|_| raw_entry(&mut s, "a", Some(MorphType::Stem), 0))
            .collect();
        s.validate_existing_homographs(&set).unwrap();
        assert_eq!(numbers(&s, &set), vec![1, 2, 3, 3, 3]);
        let warnings = s.take_warnings();
        assert_eq!(
            warnings,
            vec![UserWarning::HomographOverflow {
                form: "a".into(),
                count: 5,
                cap: 3
            }]
        );
        // Already clamped: nothing further to write or report.
        assert!(s.validate_existing_homographs(&set).unwrap());
        assert!(s.take_warnings().is_empty());
    }

    #[test]
    fn unknown_type_stays_out_of_affix_sets() {
        let mut s = session(255);
        let unknown = raw_entry(&mut s, "ka", Some(MorphType::Unknown), 0);
        let prefix = raw_entry(&mut s, "ka", Some(MorphType::Prefix), 0);
        let found = s.collect_homographs(&HomographQuery::new(
            "ka",
            HomographClass::Other(MorphType::Prefix),
        ));
        assert_eq!(found, vec![prefix]);
        let found = s.collect_homographs(&HomographQuery::new("ka", HomographClass::Stem));
        assert_eq!(found, vec![unknown]);
    }

    #[test]
    fn alternate_types_do_not_add_set_membership() {
        let mut s = session(255);
        let root = raw_entry(&mut s, "ka", Some(MorphType::Root), 0);
        let vern = s.lexicon().default_vernacular();
        s.lexicon_mut()
            .insert_owned(
                root,
                FieldTag::EntryAlternateForms,
                None,
                Object::Allomorph(MoForm::new(
                    Some(MorphType::Prefix),
                    MultiString::single(vern, "ka"),
                )),
            )
            .unwrap();
        let found = s.collect_homographs(&HomographQuery::new(
            "ka",
            HomographClass::Other(MorphType::Prefix),
        ));
        assert!(found.is_empty());
    }

    #[test]
    fn untyped_entries_number_jointly_across_classes() {
        let mut s = session(255);
        let untyped = raw_entry(&mut s, "ka", None, 0);
        let p1 = raw_entry(&mut s, "ka", Some(MorphType::Prefix), 0);
        let p2 = raw_entry(&mut s, "ka", Some(MorphType::Prefix), 0);
        let suffix = raw_entry(&mut s, "ka", Some(MorphType::Suffix), 0);
        assert!(!s.revalidate_homograph_sets("ka").unwrap());
        assert_eq!(numbers(&s, &[untyped, p1, p2, suffix]), vec![1, 2, 3, 2]);
        assert!(s.revalidate_homograph_sets("ka").unwrap());

        // Any single class goes through the same joint numbering.
        s.lexicon_mut().set_homograph_number(suffix, 1).unwrap();
        let suffixes = HomographClass::Other(MorphType::Suffix);
        assert!(!s.revalidate_homograph_form("ka", suffixes).unwrap());
        assert_eq!(numbers(&s, &[untyped, p1, p2, suffix]), vec![1, 2, 3, 2]);
    }

    #[test]
    fn settled_sets() {
        assert!(is_settled(&[], 255));
        assert!(is_settled(&[0], 255));
        assert!(!is_settled(&[1], 255));
        assert!(is_settled(&[2, 1, 3], 255));
        assert!(!is_settled(&[1, 1, 2], 255));
        assert!(is_settled(&[3, 1, 2, 3, 3], 3));
        assert!(!is_settled(&[1, 2, 4], 255));
    }

    #[test]
    fn headword_shows_markers_and_number() {
        let mut s = session(255);
        let a = raw_entry(&mut s, "ing", Some(MorphType::Suffix), 2);
        let b = raw_entry(&mut s, "ing", Some(MorphType::Stem), 0);
        assert_eq!(s.headword(a), "-ing2");
        assert_eq!(s.headword(b), "ing");
        assert!(s.sort_key(b) < s.sort_key(a));
    }
}
