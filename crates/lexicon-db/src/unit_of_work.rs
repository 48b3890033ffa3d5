//! Nestable units of work and the undo/redo stacks built on them.
//!
//! While the outermost unit is open, the first mutable access to a record
//! journals its prior state. Closing the unit turns the journal into one undo
//! step holding only the records that differ. Nested begin/end pairs fold
//! into the enclosing unit.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use lexicon_types::Hvo;

use crate::{Lexicon, Record, Tables};

/// Undo steps kept before the oldest is dropped.
pub const HISTORY_LIMIT: usize = 200;

/// Labels shown for an undoable step.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TaskLabels {
    pub undo: String,
    pub redo: String,
}

#[derive(Debug)]
struct Change {
    hvo: Hvo,
    before: Option<Record>,
    after: Option<Record>,
}

#[derive(Debug)]
struct Step {
    labels: TaskLabels,
    changes: Vec<Change>,
    next_id_before: u32,
    next_id_after: u32,
}

/// Prior state of every record touched since the outermost begin.
#[derive(Debug)]
struct Journal {
    before: BTreeMap<Hvo, Option<Record>>,
    next_id: u32,
}

#[derive(Debug, Default)]
pub(crate) struct UnitOfWork {
    depth: usize,
    labels: TaskLabels,
    journal: Option<Journal>,
    notifications_at_begin: usize,
    poisoned: bool,
    undo: VecDeque<Step>,
    redo: Vec<Step>,
}

impl UnitOfWork {
    fn note(&mut self, hvo: Hvo, tables: &Tables) {
        if let Some(journal) = &mut self.journal {
            journal
                .before
                .entry(hvo)
                .or_insert_with(|| tables.objects.get(&hvo).cloned());
        }
    }
}

fn restore(tables: &mut Tables, hvo: Hvo, record: Option<Record>) {
    match record {
        Some(record) => {
            tables.objects.insert(hvo, record);
        }
        None => {
            tables.objects.remove(&hvo);
        }
    }
}

impl Lexicon {
    /// Mutable access to a record; journals it first inside a unit of work.
    pub(crate) fn record_mut(&mut self, hvo: Hvo) -> Option<&mut Record> {
        self.work.note(hvo, &self.tables);
        self.tables.objects.get_mut(&hvo)
    }

    pub(crate) fn put_record(&mut self, hvo: Hvo, record: Record) {
        self.work.note(hvo, &self.tables);
        self.tables.objects.insert(hvo, record);
    }

    pub(crate) fn take_record(&mut self, hvo: Hvo) -> Option<Record> {
        self.work.note(hvo, &self.tables);
        self.tables.objects.remove(&hvo)
    }

    pub fn begin_unit_of_work(&mut self, undo: &str, redo: &str) {
        if self.work.depth == 0 {
            self.work.labels = TaskLabels {
                undo: undo.to_string(),
                redo: redo.to_string(),
            };
            self.work.journal = Some(Journal {
                before: BTreeMap::new(),
                next_id: self.tables.next_id,
            });
            self.work.notifications_at_begin = self.notifications.len();
            self.work.poisoned = false;
        }
        self.work.depth += 1;
    }

    /// Close one nesting level. Returns true when the outermost level closed
    /// and recorded an undo step.
    pub fn end_unit_of_work(&mut self) -> bool {
        if self.work.depth == 0 {
            return false;
        }
        self.work.depth -= 1;
        if self.work.depth > 0 {
            return false;
        }
        if self.work.poisoned {
            self.roll_back();
            return false;
        }
        let Some(journal) = self.work.journal.take() else {
            return false;
        };
        let changes: Vec<Change> = journal
            .before
            .into_iter()
            .filter_map(|(hvo, before)| {
                let after = self.tables.objects.get(&hvo).cloned();
                (before != after).then_some(Change { hvo, before, after })
            })
            .collect();
        if changes.is_empty() && journal.next_id == self.tables.next_id {
            return false;
        }
        let labels = std::mem::take(&mut self.work.labels);
        debug!(label = %labels.undo, records = changes.len(), "recorded unit of work");
        self.work.undo.push_back(Step {
            labels,
            changes,
            next_id_before: journal.next_id,
            next_id_after: self.tables.next_id,
        });
        if self.work.undo.len() > HISTORY_LIMIT {
            self.work.undo.pop_front();
        }
        self.work.redo.clear();
        true
    }

    /// Abandon one nesting level. The outermost abort restores the tables to
    /// their state at the outermost begin; an inner abort makes the enclosing
    /// unit roll back when it closes.
    pub fn abort_unit_of_work(&mut self) {
        if self.work.depth == 0 {
            return;
        }
        self.work.depth -= 1;
        if self.work.depth > 0 {
            self.work.poisoned = true;
            return;
        }
        self.roll_back();
    }

    fn roll_back(&mut self) {
        if let Some(journal) = self.work.journal.take() {
            for (hvo, before) in journal.before {
                restore(&mut self.tables, hvo, before);
            }
            self.tables.next_id = journal.next_id;
            self.form_generation += 1;
        }
        self.notifications.truncate(self.work.notifications_at_begin);
        self.work.poisoned = false;
        debug!(label = %self.work.labels.undo, "rolled back unit of work");
    }

    pub fn in_unit_of_work(&self) -> bool {
        self.work.depth > 0
    }

    pub fn can_undo(&self) -> bool {
        self.work.depth == 0 && !self.work.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.work.depth == 0 && !self.work.redo.is_empty()
    }

    /// Number of steps currently on the undo stack.
    pub fn undo_depth(&self) -> usize {
        self.work.undo.len()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.work.undo.back().map(|s| s.labels.undo.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.work.redo.last().map(|s| s.labels.redo.as_str())
    }

    /// Revert the most recent recorded step. Returns false when there is
    /// nothing to undo or a unit of work is open.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        let Some(step) = self.work.undo.pop_back() else {
            return false;
        };
        for change in &step.changes {
            restore(&mut self.tables, change.hvo, change.before.clone());
        }
        self.tables.next_id = step.next_id_before;
        self.form_generation += 1;
        self.notifications.clear();
        self.work.redo.push(step);
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        let Some(step) = self.work.redo.pop() else {
            return false;
        };
        for change in &step.changes {
            restore(&mut self.tables, change.hvo, change.after.clone());
        }
        self.tables.next_id = step.next_id_after;
        self.form_generation += 1;
        self.notifications.clear();
        self.work.undo.push_back(step);
        true
    }

    pub(crate) fn clear_history(&mut self) {
        self.work = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::HISTORY_LIMIT;
    use crate::{LexEntry, Lexicon, Object};

    #[test]
    fn nested_units_record_one_step() {
        let mut lex = Lexicon::new();
        lex.begin_unit_of_work("Undo outer", "Redo outer");
        lex.insert_root(Object::Entry(LexEntry::new()));
        lex.begin_unit_of_work("Undo inner", "Redo inner");
        lex.insert_root(Object::Entry(LexEntry::new()));
        assert!(!lex.end_unit_of_work());
        assert!(lex.end_unit_of_work());

        assert_eq!(lex.undo_label(), Some("Undo outer"));
        assert!(lex.undo());
        assert_eq!(lex.object_count(), 0);
        assert_eq!(lex.redo_label(), Some("Redo outer"));
        assert!(lex.redo());
        assert_eq!(lex.object_count(), 2);
    }

    #[test]
    fn unchanged_unit_records_nothing() {
        let mut lex = Lexicon::new();
        lex.begin_unit_of_work("Undo", "Redo");
        assert!(!lex.end_unit_of_work());
        assert!(!lex.can_undo());
    }

    #[test]
    fn outermost_abort_restores_the_snapshot() {
        let mut lex = Lexicon::new();
        let kept = lex.insert_root(Object::Entry(LexEntry::new()));
        let generation = lex.form_generation();
        lex.begin_unit_of_work("Undo", "Redo");
        lex.delete_object(kept).unwrap();
        lex.abort_unit_of_work();
        assert!(lex.contains(kept));
        assert!(lex.form_generation() > generation);
        assert!(lex.pending_notifications().is_empty());
        assert!(!lex.can_undo());
    }

    #[test]
    fn inner_abort_poisons_the_outer_unit() {
        let mut lex = Lexicon::new();
        lex.begin_unit_of_work("Undo", "Redo");
        lex.insert_root(Object::Entry(LexEntry::new()));
        lex.begin_unit_of_work("Undo", "Redo");
        lex.abort_unit_of_work();
        assert!(!lex.end_unit_of_work());
        assert_eq!(lex.object_count(), 0);
        assert!(!lex.can_undo());
    }

    #[test]
    fn new_work_clears_redo() {
        let mut lex = Lexicon::new();
        lex.begin_unit_of_work("Undo a", "Redo a");
        lex.insert_root(Object::Entry(LexEntry::new()));
        lex.end_unit_of_work();
        lex.undo();
        assert!(lex.can_redo());
        lex.begin_unit_of_work("Undo b", "Redo b");
        lex.insert_root(Object::Entry(LexEntry::new()));
        lex.end_unit_of_work();
        assert!(!lex.can_redo());
    }

    #[test]
    fn steps_hold_only_touched_records() {
        let mut lex = Lexicon::new();
        let entries: Vec<_> = (0..50)
            .map(|_| lex.insert_root(Object::Entry(LexEntry::new())))
            .collect();
        lex.begin_unit_of_work("Undo renumber", "Redo renumber");
        lex.set_homograph_number(entries[7], 3).unwrap();
        lex.set_homograph_number(entries[9], 0).unwrap();
        assert!(lex.end_unit_of_work());

        let step = lex.work.undo.back().unwrap();
        assert_eq!(step.changes.len(), 1);
        assert_eq!(step.changes[0].hvo, entries[7]);

        assert!(lex.undo());
        assert_eq!(lex.entry(entries[7]).unwrap().homograph_number, 0);
        assert!(lex.redo());
        assert_eq!(lex.entry(entries[7]).unwrap().homograph_number, 3);
        assert_eq!(lex.object_count(), 50);
    }

    #[test]
    fn undo_restores_deleted_subtree_and_id_counter() {
        let mut lex = Lexicon::new();
        let entry = lex.insert_root(Object::Entry(LexEntry::new()));
        lex.begin_unit_of_work("Undo", "Redo");
        lex.delete_object(entry).unwrap();
        let fresh = lex.insert_root(Object::Entry(LexEntry::new()));
        assert!(lex.end_unit_of_work());
        assert!(lex.undo());
        assert!(lex.contains(entry));
        assert!(!lex.contains(fresh));
        assert_eq!(lex.insert_root(Object::Entry(LexEntry::new())), fresh);
    }

    #[test]
    fn history_is_capped() {
        let mut lex = Lexicon::new();
        for _ in 0..HISTORY_LIMIT + 25 {
            lex.begin_unit_of_work("Undo add", "Redo add");
            lex.insert_root(Object::Entry(LexEntry::new()));
            lex.end_unit_of_work();
        }
        assert_eq!(lex.undo_depth(), HISTORY_LIMIT);
        while lex.undo() {}
        assert_eq!(lex.object_count(), 25);
    }
}
