// src/controller.rs

use crate::draft_cache::{DRAFT_KEY, DraftCache, LAST_EXTRACTION_KEY};
use crate::error::{Action, CacheError, IntakeError};
use crate::fields::FieldStore;
use crate::intake::{self, FileHandle, FileKind, IntakeSource, SelectedFile};
use crate::preview::{Preview, PreviewRenderer};
use crate::record::{Field, InvoicePatch, InvoiceRecord, RecordId};
use crate::remote::{ExtractionClient, SaveClient};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Where the intake workflow is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeState {
    Empty,
    FilePreviewed,
    Extracting,
    Populated,
    Saving,
    Idle { saved_id: Option<RecordId> },
}

/// Read-only view for status displays.
#[derive(Debug, Clone)]
pub struct Status {
    pub state: IntakeState,
    pub file: Option<(String, FileKind)>,
}

struct Session {
    fields: Box<dyn FieldStore>,
    preview: PreviewRenderer,
    file: Option<FileHandle>,
    /// Where the workflow rests once no request is running.
    settled: IntakeState,
    /// Bumped by every selection and reset; responses carrying an older
    /// value are discarded.
    generation: u64,
    /// Generation the running extraction was started under.
    extracting: Option<u64>,
    saving: bool,
}

impl Session {
    /// A running request shows over the settled state. An extraction
    /// orphaned by a selection or reset keeps its control busy but no
    /// longer shows.
    fn state(&self) -> IntakeState {
        if self.extracting == Some(self.generation) {
            IntakeState::Extracting
        } else if self.saving {
            IntakeState::Saving
        } else {
            self.settled.clone()
        }
    }
}

/// Owns the form, the preview and the current file, and runs the
/// extract/save/draft actions against injected collaborators.
///
/// Actions take `&self`. The session lock is never held across an await,
/// so an extraction and a save can be in flight at the same time.
pub struct IntakeController {
    session: Mutex<Session>,
    drafts: DraftCache,
    extractor: Box<dyn ExtractionClient>,
    saver: Box<dyn SaveClient>,
}

impl IntakeController {
    pub fn new(
        fields: Box<dyn FieldStore>,
        drafts: DraftCache,
        extractor: Box<dyn ExtractionClient>,
        saver: Box<dyn SaveClient>,
    ) -> Self {
        Self {
            session: Mutex::new(Session {
                fields,
                preview: PreviewRenderer::new(),
                file: None,
                settled: IntakeState::Empty,
                generation: 0,
                extracting: None,
                saving: false,
            }),
            drafts,
            extractor,
            saver,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a dropped or picked file. Returns its classification, or `None`
    /// when nothing was offered.
    pub async fn select_file(&self, files: Vec<SelectedFile>, source: IntakeSource) -> Option<FileKind> {
        let handle = intake::select(files, source)?;
        let kind = handle.kind();

        let generation = {
            let mut s = self.session();
            s.generation += 1;
            s.fields.attach_file(Some(handle.name().to_string()));
            s.file = Some(handle.clone());
            s.settled = IntakeState::FilePreviewed;
            s.generation
        };

        let preview = PreviewRenderer::decode(&handle).await;

        let mut s = self.session();
        if s.generation == generation {
            s.preview.present(preview);
        } else {
            warn!(file = %handle.name(), "Preview finished after the file was replaced, dropping it");
        }
        Some(kind)
    }

    /// Post the current file and notes to the extraction service and fill in
    /// whatever fields come back.
    pub async fn extract(&self) -> Result<InvoicePatch, IntakeError> {
        let (file, notes, generation) = {
            let mut s = self.session();
            let Some(file) = s.file.clone() else {
                return Err(IntakeError::no_file());
            };
            if s.extracting.is_some() {
                return Err(IntakeError::Busy(Action::Extract));
            }
            s.extracting = Some(s.generation);
            (file, s.fields.collect().notes, s.generation)
        };

        let result = self.extractor.extract(&file, &notes).await;

        let (record, patch) = {
            let mut s = self.session();
            s.extracting = None;
            let current = s.generation == generation;

            match result {
                Err(e) => {
                    warn!(error = %e, status = ?e.status(), file = %file.name(), "Extraction failed");
                    if current {
                        s.settled = IntakeState::FilePreviewed;
                    }
                    return Err(e);
                }
                Ok(_) if !current => {
                    warn!(file = %file.name(), "Extraction response is stale, discarding it");
                    return Err(IntakeError::Superseded);
                }
                Ok(patch) => {
                    s.fields.populate(&patch);
                    s.settled = IntakeState::Populated;
                    info!(file = %file.name(), fields = patch.field_count(), "Form populated from extraction");
                    (s.fields.collect(), patch)
                }
            }
        };

        discard("save", LAST_EXTRACTION_KEY, self.drafts.save(LAST_EXTRACTION_KEY, &record));
        Ok(patch)
    }

    /// Send the current form to the save service.
    pub async fn save(&self) -> Result<RecordId, IntakeError> {
        let record = {
            let mut s = self.session();
            if s.saving {
                return Err(IntakeError::Busy(Action::Save));
            }
            s.saving = true;
            s.fields.collect()
        };

        let result = self.saver.save(&record).await;

        let mut s = self.session();
        s.saving = false;
        match result {
            Ok(id) => {
                info!(id = %id, "Record saved");
                s.settled = IntakeState::Idle {
                    saved_id: Some(id.clone()),
                };
                Ok(id)
            }
            Err(e) => {
                // Settled state is untouched, so the shown state rolls back
                warn!(error = %e, status = ?e.status(), "Save failed");
                Err(e)
            }
        }
    }

    /// Store the form under the "draft" key.
    pub fn save_draft(&self) {
        let record = self.session().fields.collect();
        discard("save", DRAFT_KEY, self.drafts.save(DRAFT_KEY, &record));
    }

    /// Load a snapshot into the form. Returns whether anything was restored.
    pub fn restore(&self, key: &str) -> bool {
        let Some(record) = discard("load", key, self.drafts.load(key)).flatten() else {
            return false;
        };

        let mut s = self.session();
        s.fields.populate(&record.to_patch());
        if matches!(s.settled, IntakeState::Empty | IntakeState::FilePreviewed) {
            s.settled = IntakeState::Populated;
        }
        info!(key, "Snapshot restored");
        true
    }

    /// Back to a blank form. The "draft" snapshot survives.
    pub fn reset(&self) {
        {
            let mut s = self.session();
            s.generation += 1;
            s.fields.reset();
            s.preview.clear();
            s.file = None;
            s.settled = IntakeState::Empty;
        }
        discard("clear", LAST_EXTRACTION_KEY, self.drafts.clear(LAST_EXTRACTION_KEY));
        info!("Form reset");
    }

    pub fn set_field(&self, field: Field, value: String) {
        self.session().fields.set(field, value);
    }

    pub fn record(&self) -> InvoiceRecord {
        self.session().fields.collect()
    }

    pub fn preview(&self) -> Preview {
        self.session().preview.current().clone()
    }

    pub fn state(&self) -> IntakeState {
        self.session().state()
    }

    /// Whether the control for `action` is currently disabled.
    pub fn is_busy(&self, action: Action) -> bool {
        let s = self.session();
        match action {
            Action::Extract => s.extracting.is_some(),
            Action::Save => s.saving,
        }
    }

    pub fn status(&self) -> Status {
        let s = self.session();
        Status {
            state: s.state(),
            file: s.file.as_ref().map(|f| (f.name().to_string(), f.kind())),
        }
    }
}

/// Cache I/O never reaches the user: log and move on.
fn discard<T>(op: &str, key: &str, result: Result<T, CacheError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(op, key, error = %e, "Draft cache unavailable, ignoring");
            None
        }
    }
}
