//! Submission wizard
//!
//! Category → details → location, then a gated submit. Navigation is free;
//! only submit checks the form, and it reports the first missing field.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::location::{LocationSelection, LocationSelectionState};
use crate::submission::{SubmissionPipeline, SubmissionReceipt, SubmitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Report,
    Event,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Report => "report",
            SubmissionKind::Event => "event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Category,
    Details,
    Location,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [
        WizardStep::Category,
        WizardStep::Details,
        WizardStep::Location,
    ];

    pub fn index(&self) -> usize {
        WizardStep::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or(0)
    }

    pub fn next(self) -> Self {
        let idx = (self.index() + 1).min(WizardStep::ALL.len() - 1);
        WizardStep::ALL[idx]
    }

    pub fn previous(self) -> Self {
        WizardStep::ALL[self.index().saturating_sub(1)]
    }

    pub fn label(&self) -> &'static str {
        match self {
            WizardStep::Category => "Catégorie",
            WizardStep::Details => "Détails",
            WizardStep::Location => "Lieu",
        }
    }

    /// Whether this step's own fields are filled in.
    pub fn is_complete(&self, snapshot: &FormSnapshot) -> bool {
        match self {
            WizardStep::Category => snapshot.category.is_some(),
            WizardStep::Details => {
                !snapshot.title.trim().is_empty()
                    && !snapshot.description.trim().is_empty()
                    && (snapshot.kind != SubmissionKind::Event || snapshot.event_date.is_some())
            }
            WizardStep::Location => snapshot.location.is_resolved(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Title,
    Description,
    Category,
    Coordinate,
    EventDate,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequiredField::Title => "titre",
            RequiredField::Description => "description",
            RequiredField::Category => "catégorie",
            RequiredField::Coordinate => "lieu",
            RequiredField::EventDate => "date",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardError {
    #[error("Champ obligatoire manquant : {0}")]
    Validation(RequiredField),

    #[error("Un envoi est déjà en cours")]
    Busy,
}

/// Local photo picked by the citizen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub path: PathBuf,
    /// Overrides the type guessed from the extension
    pub mime_type: Option<String>,
}

impl PhotoRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
        }
    }
}

/// Everything the pipeline needs, frozen when an attempt starts.
#[derive(Debug, Clone)]
pub struct FormSnapshot {
    pub kind: SubmissionKind,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub photos: Vec<PhotoRef>,
    pub event_date: Option<DateTime<Utc>>,
    pub location: LocationSelection,
}

impl FormSnapshot {
    pub fn new(kind: SubmissionKind) -> Self {
        Self {
            kind,
            title: String::new(),
            description: String::new(),
            category: None,
            photos: Vec::new(),
            event_date: None,
            location: LocationSelection::default(),
        }
    }

    /// First missing field, in fixed priority order. Photos are optional.
    pub fn validate(&self) -> Result<(), RequiredField> {
        if self.title.trim().is_empty() {
            return Err(RequiredField::Title);
        }
        if self.description.trim().is_empty() {
            return Err(RequiredField::Description);
        }
        if self.category.is_none() {
            return Err(RequiredField::Category);
        }
        if !self.location.is_resolved() {
            return Err(RequiredField::Coordinate);
        }
        if self.kind == SubmissionKind::Event && self.event_date.is_none() {
            return Err(RequiredField::EventDate);
        }
        Ok(())
    }
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Proof that a submission attempt holds the wizard.
///
/// Draft edits and further submits fail with `Busy` until it is dropped.
pub struct SubmitTicket {
    snapshot: FormSnapshot,
    _guard: InFlightGuard,
}

impl SubmitTicket {
    pub fn snapshot(&self) -> &FormSnapshot {
        &self.snapshot
    }
}

pub struct SubmissionWizard {
    step: WizardStep,
    kind: SubmissionKind,
    title: String,
    description: String,
    category: Option<String>,
    photos: Vec<PhotoRef>,
    event_date: Option<DateTime<Utc>>,
    location: LocationSelectionState,
    in_flight: Arc<AtomicBool>,
}

impl SubmissionWizard {
    pub fn new(kind: SubmissionKind, location: LocationSelectionState) -> Self {
        Self {
            step: WizardStep::Category,
            kind,
            title: String::new(),
            description: String::new(),
            category: None,
            photos: Vec::new(),
            event_date: None,
            location,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> SubmissionKind {
        self.kind
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn next(&mut self) -> WizardStep {
        self.step = self.step.next();
        self.step
    }

    pub fn previous(&mut self) -> WizardStep {
        self.step = self.step.previous();
        self.step
    }

    /// UI hint only; `next` never blocks.
    pub fn can_advance(&self) -> bool {
        self.step.is_complete(&self.snapshot())
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.title = title.into();
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.description = description.into();
        Ok(())
    }

    pub fn set_category(&mut self, category: Option<String>) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Ok(())
    }

    pub fn set_event_date(&mut self, date: Option<DateTime<Utc>>) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.event_date = date;
        Ok(())
    }

    pub fn add_photo(&mut self, photo: PhotoRef) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.photos.push(photo);
        Ok(())
    }

    pub fn remove_photo(&mut self, index: usize) -> Result<Option<PhotoRef>, WizardError> {
        self.ensure_idle()?;
        if index < self.photos.len() {
            Ok(Some(self.photos.remove(index)))
        } else {
            Ok(None)
        }
    }

    pub fn location(&self) -> &LocationSelectionState {
        &self.location
    }

    pub fn location_mut(&mut self) -> Result<&mut LocationSelectionState, WizardError> {
        self.ensure_idle()?;
        Ok(&mut self.location)
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            kind: self.kind,
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            photos: self.photos.clone(),
            event_date: self.event_date,
            location: self.location.selection().clone(),
        }
    }

    /// Gate the submit action and lock the draft.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, WizardError> {
        self.ensure_idle()?;

        let snapshot = self.snapshot();
        if let Err(field) = snapshot.validate() {
            debug!(%field, "submit blocked by missing field");
            return Err(WizardError::Validation(field));
        }

        self.in_flight.store(true, Ordering::SeqCst);
        info!(kind = self.kind.as_str(), "submission started");
        Ok(SubmitTicket {
            snapshot,
            _guard: InFlightGuard(Arc::clone(&self.in_flight)),
        })
    }

    /// Gate, run the pipeline, unlock. Validation and busy errors never reach
    /// the network.
    pub async fn submit(
        &mut self,
        pipeline: &SubmissionPipeline,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let ticket = self.begin_submit()?;
        pipeline.submit(ticket.snapshot().clone()).await
    }

    fn ensure_idle(&self) -> Result<(), WizardError> {
        if self.is_submitting() {
            return Err(WizardError::Busy);
        }
        Ok(())
    }
}
