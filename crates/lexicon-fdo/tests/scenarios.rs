use std::collections::BTreeSet;

use lexicon_db::{
    AdhocProhibition, FieldTag, LexSense, Lexicon, MsaRecord, Object, PartOfSpeech,
    ReferenceField, WfiMorphBundle,
};
use lexicon_fdo::{
    HomographQuery, LexiconError, NewEntry, Session, SessionConfig, TargetRemoval, UserWarning,
};
use lexicon_morph::FormError;
use lexicon_types::{
    HomographClass, Hvo, MappingType, MorphType, Msa, MsaDescriptor, ProhibitionKind,
};

fn session() -> Session {
    Session::new(Lexicon::new(), SessionConfig::default())
}

fn stem(s: &mut Session, form: &str) -> Hvo {
    s.create_entry_with(&NewEntry::new(Some(MorphType::Stem), form))
        .expect("create entry")
}

fn numbers(s: &Session, entries: &[Hvo]) -> Vec<u32> {
    entries
        .iter()
        .map(|e| s.lexicon().entry(*e).expect("entry").homograph_number)
        .collect()
}

#[test]
fn homograph_numbers_run_one_to_n() {
    let mut s = session();
    let set: Vec<Hvo> = (0..4).map(|_| stem(&mut s, "kata")).collect();
    let mut got = numbers(&s, &set);
    got.sort();
    assert_eq!(got, vec![1, 2, 3, 4]);

    let single = stem(&mut s, "lone");
    assert_eq!(numbers(&s, &[single]), vec![0]);
}

#[test]
fn validating_twice_reports_already_valid() {
    let mut s = session();
    let set: Vec<Hvo> = (0..3).map(|_| stem(&mut s, "kata")).collect();
    for e in &set {
        s.lexicon_mut().set_homograph_number(*e, 7).expect("set");
    }
    assert!(!s.validate_existing_homographs(&set).expect("first"));
    assert!(s.validate_existing_homographs(&set).expect("second"));
}

#[test]
fn overflow_is_clamped_and_reported() {
    let mut s = Session::new(
        Lexicon::new(),
        SessionConfig {
            homograph_cap: 2,
            ..SessionConfig::default()
        },
    );
    let set: Vec<Hvo> = (0..4).map(|_| stem(&mut s, "ta")).collect();
    assert_eq!(numbers(&s, &set), vec![1, 2, 2, 2]);
    let warnings = s.take_warnings();
    assert!(warnings.contains(&UserWarning::HomographOverflow {
        form: "ta".into(),
        count: 4,
        cap: 2,
    }));
}

#[test]
fn stem_like_types_share_a_bucket_but_affixes_do_not() {
    let mut s = session();
    let root = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Root), "ka"))
        .expect("root");
    let particle = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Particle), "ka"))
        .expect("particle");
    let prefix = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Prefix), "ka"))
        .expect("prefix");
    let suffix = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Suffix), "ka"))
        .expect("suffix");

    let stems = s.collect_homographs(&HomographQuery::new("ka", HomographClass::Stem));
    assert_eq!(stems, vec![root, particle]);
    let prefixes = s.collect_homographs(&HomographQuery::new(
        "ka",
        MorphType::Prefix.homograph_class(),
    ));
    assert!(prefixes.contains(&prefix));
    assert!(!prefixes.contains(&suffix));
    assert_eq!(s.headword(prefix), "ka-");
    assert_eq!(s.headword(suffix), "-ka");
}

fn sorted(mut numbers: Vec<u32>) -> Vec<u32> {
    numbers.sort();
    numbers
}

#[test]
fn alternate_affix_form_keeps_entry_in_its_own_set() {
    let mut s = session();
    let s1 = stem(&mut s, "ka");
    let s2 = stem(&mut s, "ka");
    let root = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Root), "ka"))
        .expect("root");
    let prefix = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Prefix), "ka"))
        .expect("prefix");
    let vern = s.lexicon().default_vernacular();
    s.add_alternate_form(root, Some(MorphType::Prefix), vern, "ka")
        .expect("alternate");

    assert_eq!(sorted(numbers(&s, &[s1, s2, root])), vec![1, 2, 3]);
    assert_eq!(numbers(&s, &[prefix]), vec![0]);
}

#[test]
fn deleting_an_untyped_entry_renumbers_every_class() {
    let mut s = session();
    let p1 = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Prefix), "ka"))
        .expect("prefix");
    let p2 = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Prefix), "ka"))
        .expect("prefix");
    let untyped = s
        .create_entry_with(&NewEntry::new(None, "ka"))
        .expect("untyped");
    let suffix = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Suffix), "ka"))
        .expect("suffix");
    assert_eq!(numbers(&s, &[untyped, p1, p2, suffix]), vec![1, 2, 3, 2]);

    s.delete_entry(untyped).expect("delete");
    assert_eq!(numbers(&s, &[p1, p2, suffix]), vec![1, 2, 0]);

    assert!(s.undo());
    assert_eq!(numbers(&s, &[untyped, p1, p2, suffix]), vec![1, 2, 3, 2]);
}

#[test]
fn deleting_a_root_with_an_affix_alternate_leaves_affixes_contiguous() {
    let mut s = session();
    let p1 = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Prefix), "ka"))
        .expect("prefix");
    let root = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Root), "ka"))
        .expect("root");
    let p2 = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Prefix), "ka"))
        .expect("prefix");
    let vern = s.lexicon().default_vernacular();
    s.add_alternate_form(root, Some(MorphType::Prefix), vern, "ka")
        .expect("alternate");
    s.delete_entry(root).expect("delete");
    assert_eq!(sorted(numbers(&s, &[p1, p2])), vec![1, 2]);
}

#[test]
fn redundant_msas_converge_and_references_follow() {
    let mut s = session();
    let e = stem(&mut s, "walk");
    let lex = s.lexicon_mut();
    let noun = lex.insert_root(Object::PartOfSpeech(PartOfSpeech {
        name: "noun".into(),
        ..PartOfSpeech::default()
    }));
    let value = Msa::from_descriptor(&MsaDescriptor::stem(Some(noun)));
    let msas: Vec<Hvo> = (0..3)
        .map(|_| {
            lex.insert_owned(e, FieldTag::EntryMsas, None, Object::Msa(MsaRecord::new(value.clone())))
                .expect("msa")
        })
        .collect();
    let other = lex
        .insert_owned(
            e,
            FieldTag::EntryMsas,
            None,
            Object::Msa(MsaRecord::new(Msa::from_descriptor(&MsaDescriptor::stem(None)))),
        )
        .expect("msa");
    let sense = lex
        .insert_owned(e, FieldTag::EntrySenses, None, Object::Sense(LexSense::default()))
        .expect("sense");
    lex.set_reference(sense, ReferenceField::SenseMsa, Some(msas[2]))
        .expect("sense msa");
    let bundle = lex.insert_root(Object::MorphBundle(WfiMorphBundle {
        msa: Some(msas[1]),
        ..WfiMorphBundle::default()
    }));
    let prohibition = lex.insert_root(Object::Prohibition(AdhocProhibition {
        kind: ProhibitionKind::Morpheme,
        first: Some(msas[2]),
        members: vec![msas[1], other],
        rest: Vec::new(),
    }));

    assert_eq!(s.merge_redundant_msas(e).expect("merge"), 2);
    let lex = s.lexicon();
    assert_eq!(lex.entry(e).expect("entry").msas, vec![msas[0], other]);
    assert_eq!(lex.sense(sense).expect("sense").msa, Some(msas[0]));
    assert_eq!(lex.morph_bundle(bundle).expect("bundle").msa, Some(msas[0]));
    let p = lex.prohibition(prohibition).expect("prohibition");
    assert_eq!(p.first, Some(msas[0]));
    assert_eq!(p.members, vec![msas[0], other]);
    for gone in &msas[1..] {
        assert!(lex.inbound_references(*gone).is_empty());
    }
}

#[test]
fn relation_degeneracy_by_size() {
    let mut s = session();
    let (a, b, c) = (stem(&mut s, "a"), stem(&mut s, "b"), stem(&mut s, "c"));
    let pair_type = s
        .create_lex_ref_type("antonym", MappingType::EntryPair)
        .expect("type");
    let pair = s.create_lex_reference(pair_type, &[a, b]).expect("pair");
    assert!(s.incomplete_without_target(pair, a).expect("a"));
    assert!(s.incomplete_without_target(pair, b).expect("b"));

    let coll_type = s
        .create_lex_ref_type("synonym", MappingType::EntryCollection)
        .expect("type");
    let coll = s.create_lex_reference(coll_type, &[a, b, c]).expect("coll");
    for t in [a, b, c] {
        assert!(!s.incomplete_without_target(coll, t).expect("three"));
    }
    assert_eq!(
        s.remove_lex_reference_target(coll, c).expect("remove"),
        TargetRemoval::Removed
    );
    assert!(s.incomplete_without_target(coll, a).expect("two"));
}

#[test]
fn merging_into_self_or_a_different_class_changes_nothing() {
    let mut s = session();
    let e = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Stem), "same").with_gloss("x"))
        .expect("entry");
    let sense = s.lexicon().entry(e).expect("entry").senses[0];
    s.lexicon_mut().take_notifications();
    let before = s.lexicon().entry(e).cloned();
    let count = s.lexicon().object_count();
    let undo = s.lexicon().undo_label().map(str::to_string);

    assert!(!s.merge_object(e, e, true).expect("self"));
    assert!(!s.merge_object(e, sense, true).expect("sense"));
    assert_eq!(s.lexicon().entry(e).cloned(), before);
    assert_eq!(s.lexicon().object_count(), count);
    assert!(s.lexicon().pending_notifications().is_empty());
    assert_eq!(s.lexicon().undo_label().map(str::to_string), undo);
}

#[test]
fn second_entry_with_same_form_numbers_both() {
    let mut s = session();
    let a = stem(&mut s, "run");
    assert_eq!(numbers(&s, &[a]), vec![0]);
    let b = stem(&mut s, "run");
    let got: BTreeSet<u32> = numbers(&s, &[a, b]).into_iter().collect();
    assert_eq!(got, BTreeSet::from([1, 2]));
}

#[test]
fn deleting_the_middle_homograph_closes_the_gap() {
    let mut s = session();
    let a = stem(&mut s, "bank");
    let b = stem(&mut s, "bank");
    let c = stem(&mut s, "bank");
    assert_eq!(numbers(&s, &[a, b, c]), vec![1, 2, 3]);
    s.delete_entry(b).expect("delete");
    assert_eq!(numbers(&s, &[a, c]), vec![1, 2]);

    assert!(s.undo());
    assert_eq!(numbers(&s, &[a, b, c]), vec![1, 2, 3]);
}

#[test]
fn equal_descriptor_on_new_sense_reuses_the_msa() {
    let mut s = session();
    let noun = s
        .lexicon_mut()
        .insert_root(Object::PartOfSpeech(PartOfSpeech::default()));
    let e = s
        .create_entry_with(
            &NewEntry::new(Some(MorphType::Stem), "tree")
                .with_gloss("plant")
                .with_msa(MsaDescriptor::stem(Some(noun))),
        )
        .expect("entry");
    let msa1 = s.lexicon().entry(e).expect("entry").msas[0];

    let sense = s
        .create_sense(e, &MsaDescriptor::stem(Some(noun)), "lineage")
        .expect("sense");
    assert_eq!(s.lexicon().entry(e).expect("entry").msas, vec![msa1]);
    assert_eq!(s.lexicon().sense(sense).expect("sense").msa, Some(msa1));
}

#[test]
fn unsplittable_circumfix_creates_no_allomorphs() {
    let mut s = session();
    let err = s
        .create_entry_with(&NewEntry::new(Some(MorphType::Circumfix), "foobar"))
        .unwrap_err();
    assert!(matches!(err, LexiconError::Form(FormError::CircumfixSplit(_))));
    assert_eq!(s.lexicon().object_count(), 0);
    assert!(!s.lexicon().can_undo());
}
