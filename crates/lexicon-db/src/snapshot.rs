//! JSON snapshot persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use lexicon_types::Hvo;

use crate::objects::Object;
use crate::{Lexicon, Owner, Record, Tables, WritingSystems};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    writing_systems: WritingSystems,
    next_id: u32,
    objects: Vec<StoredObject>,
}

#[derive(Serialize, Deserialize)]
struct StoredObject {
    id: Hvo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<Owner>,
    object: Object,
}

impl Lexicon {
    /// Load a snapshot written by [`Lexicon::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let lexicon =
            Self::from_json_str(&text).with_context(|| format!("parse {}", path.display()))?;
        info!(
            path = %path.display(),
            objects = lexicon.object_count(),
            "loaded lexicon snapshot"
        );
        Ok(lexicon)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_json_string()?;
        fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), objects = self.object_count(), "saved lexicon snapshot");
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            writing_systems: self.writing_systems,
            next_id: self.tables.next_id,
            objects: self
                .tables
                .objects
                .iter()
                .map(|(id, record)| StoredObject {
                    id: *id,
                    owner: record.owner,
                    object: record.object.clone(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&snapshot).context("serialize lexicon snapshot")
    }

    /// Parse a snapshot and check that every ownership edge is consistent in
    /// both directions.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(text).context("decode snapshot json")?;
        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!("unsupported snapshot version {}", snapshot.version);
        }

        let mut objects = BTreeMap::new();
        for stored in snapshot.objects {
            if stored.id.0 == 0 || stored.id.0 >= snapshot.next_id {
                anyhow::bail!("object id {} outside 1..{}", stored.id, snapshot.next_id);
            }
            let record = Record {
                owner: stored.owner,
                object: stored.object,
            };
            if objects.insert(stored.id, record).is_some() {
                anyhow::bail!("duplicate object id {}", stored.id);
            }
        }

        for (id, record) in &objects {
            for child in record.object.owned_children() {
                let owner = objects
                    .get(&child)
                    .and_then(|r| r.owner)
                    .with_context(|| format!("{id} owns {child}, which is missing or unowned"))?;
                if owner.hvo != *id {
                    anyhow::bail!("{child} is listed under {id} but records owner {}", owner.hvo);
                }
            }
            if let Some(owner) = record.owner {
                let listed = objects
                    .get(&owner.hvo)
                    .is_some_and(|o| o.object.owned_children().contains(id));
                if !listed {
                    anyhow::bail!("{id} claims owner {} which does not list it", owner.hvo);
                }
            }
        }

        let mut lexicon = Lexicon::with_writing_systems(snapshot.writing_systems);
        lexicon.tables = Tables {
            objects,
            next_id: snapshot.next_id,
        };
        lexicon.clear_history();
        lexicon.form_generation += 1;
        Ok(lexicon)
    }
}
