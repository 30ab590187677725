//! Add-video wizard sessions
//!
//! `/addvideo` walks an admin through title, description, price, duration
//! and finally the video file itself. The wizard is an explicit short-lived
//! state machine kept in memory only: a crash mid-wizard loses the draft
//! and nothing else.
//!
//! `advance` is a pure function from (step, draft, input) to the next step,
//! so the whole wizard is unit-testable without a bot or a database.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::core::config;
use crate::storage::catalog::NewVideo;

/// Current step of the add-video wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddVideoStep {
    Title,
    Description,
    Price,
    Duration,
    File,
}

impl AddVideoStep {
    /// Prompt shown to the admin when this step becomes active.
    pub fn prompt(&self) -> &'static str {
        match self {
            AddVideoStep::Title => "📝 Send the video title (at least 3 characters):",
            AddVideoStep::Description => "📄 Send the description (at least 10 characters):",
            AddVideoStep::Price => "⭐ Send the price in Stars (a positive whole number):",
            AddVideoStep::Duration => "⏱ Send the duration, e.g. 10:30:",
            AddVideoStep::File => "🎬 Now send the video file itself:",
        }
    }
}

/// An in-progress add-video wizard
#[derive(Debug, Clone)]
pub struct AddVideoSession {
    pub step: AddVideoStep,
    pub draft: NewVideo,
    last_activity: Instant,
}

impl AddVideoSession {
    pub fn new() -> Self {
        Self {
            step: AddVideoStep::Title,
            draft: NewVideo::default(),
            last_activity: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }
}

impl Default for AddVideoSession {
    fn default() -> Self {
        Self::new()
    }
}

/// One wizard input, either text or an attached video's file id
#[derive(Debug, Clone)]
pub enum WizardInput<'a> {
    Text(&'a str),
    VideoFile { file_id: &'a str },
}

/// Outcome of feeding one input to the wizard
#[derive(Debug, Clone, PartialEq)]
pub enum WizardOutcome {
    /// Input accepted, wizard moved to the next step
    Next(AddVideoStep),
    /// Input rejected with a reason; the step does not change
    Invalid(String),
    /// All fields collected; the draft is ready to persist
    Complete,
}

/// Advances the wizard with one input. Pure: mutates only the session.
pub fn advance(session: &mut AddVideoSession, input: WizardInput<'_>) -> WizardOutcome {
    match (session.step, input) {
        (AddVideoStep::Title, WizardInput::Text(text)) => {
            let title = text.trim();
            if title.chars().count() < 3 {
                return WizardOutcome::Invalid("Title must be at least 3 characters long.".to_string());
            }
            session.draft.title = title.to_string();
            session.step = AddVideoStep::Description;
            WizardOutcome::Next(session.step)
        }
        (AddVideoStep::Description, WizardInput::Text(text)) => {
            let description = text.trim();
            if description.chars().count() < 10 {
                return WizardOutcome::Invalid("Description must be at least 10 characters long.".to_string());
            }
            session.draft.description = description.to_string();
            session.step = AddVideoStep::Price;
            WizardOutcome::Next(session.step)
        }
        (AddVideoStep::Price, WizardInput::Text(text)) => match text.trim().parse::<i64>() {
            Ok(price) if price > 0 && price <= config::payment::MAX_PRICE_STARS => {
                session.draft.price = price;
                session.step = AddVideoStep::Duration;
                WizardOutcome::Next(session.step)
            }
            _ => WizardOutcome::Invalid(format!(
                "Price must be a whole number between 1 and {} Stars.",
                config::payment::MAX_PRICE_STARS
            )),
        },
        (AddVideoStep::Duration, WizardInput::Text(text)) => {
            let duration = text.trim();
            if duration.is_empty() {
                return WizardOutcome::Invalid("Duration must not be empty, e.g. 10:30.".to_string());
            }
            session.draft.duration = duration.to_string();
            session.step = AddVideoStep::File;
            WizardOutcome::Next(session.step)
        }
        (AddVideoStep::File, WizardInput::VideoFile { file_id }) => {
            session.draft.file_id = file_id.to_string();
            WizardOutcome::Complete
        }
        (AddVideoStep::File, WizardInput::Text(_)) => {
            WizardOutcome::Invalid("Please send the video as a file, not text.".to_string())
        }
        (_, WizardInput::VideoFile { .. }) => {
            WizardOutcome::Invalid("Please answer the current question first; the file comes last.".to_string())
        }
    }
}

/// In-memory store of active wizard sessions, keyed by admin user id
///
/// At most one session per admin; starting a new wizard replaces any
/// in-flight one. Expired sessions are swept by a background task.
pub struct SessionStore {
    sessions: DashMap<i64, AddVideoSession>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(config::session::ttl())
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Starts (or restarts) a wizard for this admin.
    pub fn start(&self, admin_id: i64) -> AddVideoStep {
        let session = AddVideoSession::new();
        let step = session.step;
        self.sessions.insert(admin_id, session);
        step
    }

    /// Cancels the admin's wizard, if any. Returns whether one existed.
    pub fn cancel(&self, admin_id: i64) -> bool {
        self.sessions.remove(&admin_id).is_some()
    }

    /// Feeds one input to the admin's wizard.
    ///
    /// Returns `None` when the admin has no active (unexpired) session.
    /// `WizardOutcome::Complete` removes the session and yields the draft.
    pub fn advance(&self, admin_id: i64, input: WizardInput<'_>) -> Option<(WizardOutcome, Option<NewVideo>)> {
        let mut entry = self.sessions.get_mut(&admin_id)?;
        if entry.expired(self.ttl) {
            drop(entry);
            self.sessions.remove(&admin_id);
            return None;
        }

        entry.touch();
        let outcome = advance(&mut entry, input);

        if outcome == WizardOutcome::Complete {
            let draft = entry.draft.clone();
            drop(entry);
            self.sessions.remove(&admin_id);
            Some((WizardOutcome::Complete, Some(draft)))
        } else {
            Some((outcome, None))
        }
    }

    /// Whether this admin currently has an active wizard.
    pub fn is_active(&self, admin_id: i64) -> bool {
        self.sessions
            .get(&admin_id)
            .map(|s| !s.expired(self.ttl))
            .unwrap_or(false)
    }

    /// Removes expired sessions; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.expired(self.ttl));
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            log::info!("Purged {} expired wizard session(s)", purged);
        }
        purged
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
