//! Consistency engine for the lexicon object store.
//!
//! A [`Session`] wraps a [`Lexicon`] and keeps its cross-object invariants
//! intact under edits:
//! - homograph numbers run `1..=N` within each homograph set (or are `0` for a
//!   singleton), capped by [`SessionConfig::homograph_cap`],
//! - an entry owns no two equal MSAs and no MSA is deleted while referenced,
//! - merges fold allomorphs, strings, senses and MSAs together in a fixed order,
//! - lexical relations and entry refs never survive in a degenerate state.
//!
//! Every public mutation runs inside a unit of work, so an `Err` rolls the
//! store back and a success is one undo step.
//!
//! # Example
//! ```rust
//! use lexicon_db::Lexicon;
//! use lexicon_fdo::{NewEntry, Session, SessionConfig};
//! use lexicon_types::MorphType;
//!
//! let mut session = Session::new(Lexicon::new(), SessionConfig::default());
//! let a = session.create_entry_with(&NewEntry::new(Some(MorphType::Stem), "run")).unwrap();
//! let b = session.create_entry_with(&NewEntry::new(Some(MorphType::Stem), "run")).unwrap();
//! assert_eq!(session.headword(a), "run1");
//! assert_eq!(session.headword(b), "run2");
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use lexicon_db::{Lexicon, StoreError};
use lexicon_morph::FormError;
use lexicon_types::Hvo;

mod cache;
mod crossref;
mod entry;
mod homograph;
mod merge;
mod msa;
mod reversal;
mod sense;

pub use cache::FormCache;
pub use crossref::{CascadePlan, TargetRemoval};
pub use entry::{DeletionImpact, NewEntry};
pub use homograph::HomographQuery;

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("sense {0} is not owned by any entry")]
    OrphanSense(Hvo),
    #[error("{0} cannot be a component: it must be another entry or a sense of one")]
    InvalidComponent(Hvo),
    #[error("invalid relation targets: {0}")]
    InvalidTargets(String),
    #[error("{0} has no owner")]
    NoOwner(Hvo),
}

/// Policy knobs of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    /// Highest homograph number ever assigned; larger sets are clamped.
    pub homograph_cap: u32,
    /// Longest gloss, in characters, kept when a gloss is set.
    pub max_gloss_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            homograph_cap: 255,
            max_gloss_len: 256,
        }
    }
}

/// Conditions the user should be told about. Neither stops the operation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserWarning {
    HomographOverflow {
        form: String,
        count: usize,
        cap: u32,
    },
    GlossTruncated {
        sense: Hvo,
        length: usize,
        max: usize,
    },
}

impl fmt::Display for UserWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserWarning::HomographOverflow { form, count, cap } => write!(
                f,
                "{count} entries share the form \"{form}\"; homograph numbers above {cap} were clamped"
            ),
            UserWarning::GlossTruncated { sense, length, max } => write!(
                f,
                "gloss of sense {sense} was {length} characters and has been cut to {max}"
            ),
        }
    }
}

/// A lexicon plus the policy and caches needed to keep it consistent.
#[derive(Debug)]
pub struct Session {
    lexicon: Lexicon,
    config: SessionConfig,
    forms: FormCache,
    warnings: Vec<UserWarning>,
}

impl Session {
    pub fn new(lexicon: Lexicon, config: SessionConfig) -> Self {
        Self {
            lexicon,
            config,
            forms: FormCache::default(),
            warnings: Vec::new(),
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Direct store access. Invariants are not re-checked for edits made here.
    pub fn lexicon_mut(&mut self) -> &mut Lexicon {
        &mut self.lexicon
    }

    pub fn into_lexicon(self) -> Lexicon {
        self.lexicon
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn form_cache(&self) -> &FormCache {
        &self.forms
    }

    pub fn take_warnings(&mut self) -> Vec<UserWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn raise(&mut self, warning: UserWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Run `f` as one unit of work. Calls nest; an `Err` rolls back the
    /// outermost unit.
    pub fn run_task<T>(
        &mut self,
        undo: &str,
        redo: &str,
        f: impl FnOnce(&mut Session) -> Result<T, LexiconError>,
    ) -> Result<T, LexiconError> {
        self.lexicon.begin_unit_of_work(undo, redo);
        match f(self) {
            Ok(value) => {
                self.lexicon.end_unit_of_work();
                Ok(value)
            }
            Err(err) => {
                self.lexicon.abort_unit_of_work();
                Err(err)
            }
        }
    }

    pub fn undo(&mut self) -> bool {
        self.lexicon.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.lexicon.redo()
    }
}
