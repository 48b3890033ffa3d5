use std::collections::HashMap;

use lexicon_db::Lexicon;
use lexicon_types::Hvo;

/// Memo of form → matching-entry queries, owned by one session.
///
/// Cleared whenever the store's form generation moves, which happens on any
/// edit that could change a homograph form or morph type.
#[derive(Debug, Default)]
pub struct FormCache {
    generation: Option<u64>,
    matches: HashMap<(String, bool), Vec<Hvo>>,
    hits: u64,
}

impl FormCache {
    pub fn ids_matching(&mut self, lexicon: &Lexicon, form: &str, match_lex_forms: bool) -> Vec<Hvo> {
        let generation = lexicon.form_generation();
        if self.generation != Some(generation) {
            self.matches.clear();
            self.generation = Some(generation);
        }
        let key = (form.to_string(), match_lex_forms);
        if let Some(ids) = self.matches.get(&key) {
            self.hits += 1;
            return ids.clone();
        }
        let ids = lexicon.read_ids_matching_form(form, match_lex_forms);
        self.matches.insert(key, ids.clone());
        ids
    }

    pub fn invalidate(&mut self) {
        self.generation = None;
        self.matches.clear();
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Lookups answered from the memo.
    pub fn hits(&self) -> u64 {
        self.hits
    }
}
