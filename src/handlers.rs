use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use lexicon_db::{ObjectClass, StoreError};
use lexicon_fdo::{DeletionImpact, HomographQuery, LexiconError, NewEntry, Session, UserWarning};
use lexicon_morph::parse_morph_type;
use lexicon_types::{HomographClass, Hvo, MorphType, MsaDescriptor, MsaKind, RefType};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session>>,
    /// Where `POST /v1/save` writes the snapshot.
    pub snapshot_path: Option<PathBuf>,
    pub read_only: bool,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            snapshot_path: None,
            read_only: false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, ApiError> {
        self.session.lock().map_err(|_| ApiError::Internal)
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, Session>, ApiError> {
        if self.read_only {
            return Err(ApiError::ReadOnly);
        }
        self.lock()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/entries", get(list_entries).post(create_entry))
        .route("/v1/entries/{id}", get(entry_detail).delete(delete_entry))
        .route("/v1/entries/{id}/merge", post(merge_entry))
        .route("/v1/entries/{id}/variants", post(add_variant))
        .route("/v1/senses/{id}/split", post(split_sense))
        .route("/v1/homographs", get(homographs))
        .route("/v1/undo", post(undo))
        .route("/v1/redo", post(redo))
        .route("/v1/save", post(save))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

#[derive(Serialize)]
pub struct EntrySummary {
    id: Hvo,
    headword: String,
    homograph_number: u32,
    morph_type: Option<&'static str>,
}

fn summary(session: &Session, id: Hvo) -> EntrySummary {
    let lex = session.lexicon();
    EntrySummary {
        id,
        headword: session.headword(id),
        homograph_number: lex.entry(id).map_or(0, |e| e.homograph_number),
        morph_type: lex.primary_morph_type(id).map(MorphType::name),
    }
}

#[derive(Serialize)]
struct SenseView {
    id: Hvo,
    gloss: Option<String>,
    msa: Option<Hvo>,
    /// 0 for a top-level sense, 1 for its subsenses, and so on.
    depth: usize,
}

#[derive(Serialize)]
struct MsaView {
    id: Hvo,
    kind: MsaKind,
    part_of_speech: Option<Hvo>,
}

#[derive(Serialize)]
struct EntryRefView {
    id: Hvo,
    ref_type: RefType,
    components: Vec<Hvo>,
    types: Vec<Hvo>,
}

#[derive(Serialize)]
pub struct EntryDetail {
    #[serde(flatten)]
    summary: EntrySummary,
    lexeme_form: Option<String>,
    citation_form: Option<String>,
    alternate_forms: Vec<String>,
    senses: Vec<SenseView>,
    msas: Vec<MsaView>,
    entry_refs: Vec<EntryRefView>,
}

fn detail(session: &Session, id: Hvo) -> Result<EntryDetail, ApiError> {
    let lex = session.lexicon();
    let entry = lex.entry(id).ok_or(ApiError::NotFound(id))?;
    let vern = lex.default_vernacular();
    let anal = lex.default_analysis();

    let alternate_forms = entry
        .alternate_forms
        .iter()
        .filter_map(|h| lex.allomorph(*h))
        .filter_map(|a| a.form.get(vern).map(str::to_string))
        .collect();

    let mut senses = Vec::new();
    let mut stack: Vec<(Hvo, usize)> = entry.senses.iter().rev().map(|h| (*h, 0)).collect();
    while let Some((sense, depth)) = stack.pop() {
        let Some(record) = lex.sense(sense) else {
            continue;
        };
        senses.push(SenseView {
            id: sense,
            gloss: record.gloss.get(anal).map(str::to_string),
            msa: record.msa,
            depth,
        });
        stack.extend(record.senses.iter().rev().map(|h| (*h, depth + 1)));
    }

    let msas = entry
        .msas
        .iter()
        .filter_map(|h| lex.msa(*h).map(|r| (*h, r)))
        .map(|(id, r)| MsaView {
            id,
            kind: r.msa.kind(),
            part_of_speech: r.msa.main_part_of_speech(),
        })
        .collect();

    let entry_refs = entry
        .entry_refs
        .iter()
        .filter_map(|h| lex.entry_ref(*h).map(|r| (*h, r)))
        .map(|(id, r)| EntryRefView {
            id,
            ref_type: r.ref_type,
            components: r.component_lexemes.clone(),
            types: match r.ref_type {
                RefType::Variant => r.variant_entry_types.clone(),
                RefType::ComplexForm => r.complex_entry_types.clone(),
            },
        })
        .collect();

    Ok(EntryDetail {
        summary: summary(session, id),
        lexeme_form: lex.lexeme_form_text(id).map(str::to_string),
        citation_form: lex.citation_form_text(id).map(str::to_string),
        alternate_forms,
        senses,
        msas,
        entry_refs,
    })
}

fn entry_id(session: &Session, raw: u32) -> Result<Hvo, ApiError> {
    let id = Hvo(raw);
    match session.lexicon().class_of(id) {
        Some(ObjectClass::Entry) => Ok(id),
        _ => Err(ApiError::NotFound(id)),
    }
}

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<EntrySummary>>, ApiError> {
    let session = state.lock()?;
    let mut ids: Vec<Hvo> = session.lexicon().entries().map(|(h, _)| h).collect();
    ids.sort_by_cached_key(|h| session.sort_key(*h));
    Ok(Json(ids.into_iter().map(|h| summary(&session, h)).collect()))
}

async fn entry_detail(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<EntryDetail>, ApiError> {
    let session = state.lock()?;
    let id = entry_id(&session, id)?;
    Ok(Json(detail(&session, id)?))
}

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    pub form: String,
    pub morph_type: Option<String>,
    pub gloss: Option<String>,
    pub msa: Option<MsaDescriptor>,
}

#[derive(Serialize)]
pub struct EntryResponse {
    entry: EntryDetail,
    warnings: Vec<UserWarning>,
}

async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let (form, morph_type) = match req.morph_type.as_deref() {
        Some(name) => {
            let mt = MorphType::from_name(name)
                .ok_or_else(|| ApiError::bad_request(format!("unknown morph type {name:?}")))?;
            (req.form.trim().to_string(), mt)
        }
        None => {
            let parsed =
                parse_morph_type(&req.form).map_err(|e| ApiError::bad_request(e.to_string()))?;
            (parsed.form, parsed.morph_type)
        }
    };

    let mut new = NewEntry::new(Some(morph_type), form);
    new.gloss = req.gloss;
    new.msa = req.msa;

    let mut session = state.lock_for_write()?;
    let id = session.create_entry_with(&new)?;
    let entry = detail(&session, id)?;
    let warnings = session.take_warnings();
    Ok((StatusCode::CREATED, Json(EntryResponse { entry, warnings })))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    impact: DeletionImpact,
    warnings: Vec<UserWarning>,
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mut session = state.lock_for_write()?;
    let id = entry_id(&session, id)?;
    let impact = session.delete_entry(id)?;
    info!(entry = %id, removed = impact.deleted_objects, "entry deleted over http");
    let warnings = session.take_warnings();
    Ok(Json(DeleteResponse { impact, warnings }))
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub source: u32,
    #[serde(default)]
    pub lose_no_string_data: bool,
}

#[derive(Serialize)]
pub struct MergeResponse {
    merged: bool,
    entry: EntryDetail,
    warnings: Vec<UserWarning>,
}

async fn merge_entry(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
    let mut session = state.lock_for_write()?;
    let dest = entry_id(&session, id)?;
    let source = entry_id(&session, req.source)?;
    let merged = session.merge_object(dest, source, req.lose_no_string_data)?;
    let entry = detail(&session, dest)?;
    let warnings = session.take_warnings();
    Ok(Json(MergeResponse {
        merged,
        entry,
        warnings,
    }))
}

#[derive(Deserialize)]
pub struct VariantRequest {
    pub component: u32,
    pub variant_type: Option<u32>,
}

#[derive(Serialize)]
pub struct VariantResponse {
    entry_ref: Hvo,
    warnings: Vec<UserWarning>,
}

async fn add_variant(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<VariantRequest>,
) -> Result<Json<VariantResponse>, ApiError> {
    let mut session = state.lock_for_write()?;
    let variant = entry_id(&session, id)?;
    let entry_ref = session.make_variant_of(
        variant,
        Hvo(req.component),
        req.variant_type.map(Hvo),
    )?;
    let warnings = session.take_warnings();
    Ok(Json(VariantResponse {
        entry_ref,
        warnings,
    }))
}

async fn split_sense(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let mut session = state.lock_for_write()?;
    let sense = Hvo(id);
    if session.lexicon().class_of(sense) != Some(ObjectClass::Sense) {
        return Err(ApiError::NotFound(sense));
    }
    let copy = session.move_sense_to_copy_of_entry(sense)?;
    let entry = detail(&session, copy)?;
    let warnings = session.take_warnings();
    Ok((StatusCode::CREATED, Json(EntryResponse { entry, warnings })))
}

#[derive(Deserialize)]
pub struct HomographParams {
    pub form: String,
    pub class: Option<String>,
}

#[derive(Serialize)]
pub struct HomographResponse {
    form: String,
    entries: Vec<EntrySummary>,
}

async fn homographs(
    State(state): State<AppState>,
    Query(params): Query<HomographParams>,
) -> Result<Json<HomographResponse>, ApiError> {
    let class = match params.class.as_deref().map(str::trim) {
        None | Some("") | Some("stem") => HomographClass::Stem,
        Some(name) => MorphType::from_name(name)
            .map(MorphType::homograph_class)
            .ok_or_else(|| ApiError::bad_request(format!("unknown morph type {name:?}")))?,
    };
    let mut session = state.lock()?;
    let ids = session.collect_homographs(&HomographQuery::new(params.form.as_str(), class));
    let entries = ids.into_iter().map(|h| summary(&session, h)).collect();
    Ok(Json(HomographResponse {
        form: params.form,
        entries,
    }))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    done: bool,
    undo_label: Option<String>,
    redo_label: Option<String>,
}

fn history(session: &Session, done: bool) -> HistoryResponse {
    let lex = session.lexicon();
    HistoryResponse {
        done,
        undo_label: lex.undo_label().map(str::to_string),
        redo_label: lex.redo_label().map(str::to_string),
    }
}

async fn undo(State(state): State<AppState>) -> Result<Json<HistoryResponse>, ApiError> {
    let mut session = state.lock_for_write()?;
    let done = session.undo();
    Ok(Json(history(&session, done)))
}

async fn redo(State(state): State<AppState>) -> Result<Json<HistoryResponse>, ApiError> {
    let mut session = state.lock_for_write()?;
    let done = session.redo();
    Ok(Json(history(&session, done)))
}

async fn save(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state
        .snapshot_path
        .clone()
        .ok_or_else(|| ApiError::bad_request("no snapshot path configured"))?;
    // Serialize under the lock; the file write happens after it is released.
    let (text, objects) = {
        let session = state.lock_for_write()?;
        let text = session.lexicon().to_json_string().map_err(|e| {
            error!("serializing snapshot failed: {e:#}");
            ApiError::Internal
        })?;
        (text, session.lexicon().object_count())
    };
    tokio::fs::write(&path, text).await.map_err(|e| {
        error!("writing snapshot to {} failed: {e}", path.display());
        ApiError::Internal
    })?;
    info!(objects, "saved snapshot to {}", path.display());
    Ok(Json(json!({
        "saved": path.display().to_string(),
        "objects": objects,
    })))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("no such object: {0}")]
    NotFound(Hvo),
    #[error("this lexicon is served read-only")]
    ReadOnly,
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<LexiconError> for ApiError {
    fn from(err: LexiconError) -> Self {
        match err {
            LexiconError::Store(StoreError::NotFound(hvo)) => ApiError::NotFound(hvo),
            LexiconError::Store(StoreError::OwnershipCycle { .. } | StoreError::WrongClass { .. })
            | LexiconError::Form(_)
            | LexiconError::InvalidComponent(_)
            | LexiconError::InvalidTargets(_)
            | LexiconError::OrphanSense(_) => ApiError::BadRequest(err.to_string()),
            other => {
                error!("lexicon operation failed: {other}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ReadOnly => StatusCode::FORBIDDEN,
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
