//! Domain entities for the Skillgate sessions domain
//!
//! A `TestSession` is one attempt at a test. Its working state is a typed
//! record stored as JSON and validated on every write; `TestResult` is the
//! immutable outcome of a completed scored attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillgate_access::{AccessLevel, TestKind, TestType};
use skillgate_common::StateError;
use skillgate_content::ContentBlob;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::error::SessionError;
use crate::domain::scoring::{self, ScoreSummary, SpeedMetric};
pub use crate::domain::state::SessionStatus;
use crate::domain::state::{SessionEvent, SessionStateMachine};

/// Upper bound on typed text, in characters
pub const MAX_TYPED_CHARS: usize = 20_000;

/// Upper bound on the keystroke log
pub const MAX_KEYSTROKES: usize = 10_000;

/// How a test kind is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    Typing(SpeedMetric),
    /// Percentage of questions answered correctly, reported by the client
    Questions,
}

impl From<TestKind> for ScoringMode {
    fn from(kind: TestKind) -> Self {
        match kind {
            TestKind::TypingKeyboard => Self::Typing(SpeedMetric::WordsPerMinute),
            TestKind::TypingTenKey => Self::Typing(SpeedMetric::KeystrokesPerHour),
            TestKind::DigitalLiteracy | TestKind::BasicMath | TestKind::English => Self::Questions,
        }
    }
}

impl ScoringMode {
    fn metric(&self) -> Option<SpeedMetric> {
        match self {
            Self::Typing(metric) => Some(*metric),
            Self::Questions => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keystroke {
    pub key: String,
    /// Client-side offset from the start of the attempt
    pub at_ms: i64,
    #[serde(default)]
    pub correct: Option<bool>,
}

/// Statistics as of the latest progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    #[serde(flatten)]
    pub summary: ScoreSummary,
    pub elapsed_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

/// Working state of an attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Passage to type (typing kinds)
    pub expected_text: Option<String>,
    /// Questions from the content provider (question kinds)
    pub content: Option<serde_json::Value>,
    pub typed_text: String,
    pub cursor_position: usize,
    pub keystrokes: Vec<Keystroke>,
    pub stats: Option<RunningStats>,
    /// Time accumulated in closed running segments
    pub active_seconds: f64,
    /// Start of the current running segment; `None` while paused or finished
    pub resumed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Active time: closed segments plus the open one
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        let open = self
            .resumed_at
            .map(|since| seconds_between(since, now))
            .unwrap_or(0.0);
        self.active_seconds + open
    }

    fn start_clock(&mut self, now: DateTime<Utc>) {
        self.resumed_at = Some(now);
    }

    fn stop_clock(&mut self, now: DateTime<Utc>) {
        self.active_seconds = self.elapsed_seconds(now);
        self.resumed_at = None;
    }

    fn expected(&self) -> &str {
        self.expected_text.as_deref().unwrap_or("")
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

fn validate_typed(text: &str) -> Result<usize, SessionError> {
    let length = text.chars().count();
    if length > MAX_TYPED_CHARS {
        return Err(SessionError::WorkingState(format!(
            "typed text exceeds {} characters",
            MAX_TYPED_CHARS
        )));
    }
    Ok(length)
}

/// Client-reported elapsed time limited to `[0, time_limit]`
pub fn clamp_elapsed(elapsed_seconds: f64, time_limit_seconds: Option<i32>) -> f64 {
    if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
        return 0.0;
    }
    match time_limit_seconds {
        Some(limit) => elapsed_seconds.min(f64::from(limit.max(0))),
        None => elapsed_seconds,
    }
}

/// One progress report from the client
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub typed_text: String,
    pub cursor_position: usize,
    pub keystroke: Option<Keystroke>,
}

/// Final submission from the client
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionInput {
    pub final_typed_text: String,
    pub elapsed_seconds: f64,
    pub questions_total: Option<u32>,
    pub questions_correct: Option<u32>,
}

/// Final metrics of an attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalScore {
    pub score: i32,
    pub accuracy: f64,
    pub raw_speed: i32,
    pub weighted_speed: i32,
    pub time_to_complete: i32,
    pub questions_total: Option<i32>,
    pub questions_correct: Option<i32>,
    pub detailed_results: DetailedResults,
}

/// Auxiliary breakdown stored with a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    pub metric: Option<SpeedMetric>,
    pub characters_typed: usize,
    pub correct_characters: usize,
    pub word_accuracy: f64,
    pub keystroke_count: usize,
    pub client_elapsed_seconds: f64,
    pub server_elapsed_seconds: f64,
}

/// Outcome of `TestSession::complete`
#[derive(Debug, Clone)]
pub struct Completion {
    pub score: FinalScore,
    /// Absent for practice sessions
    pub result: Option<TestResult>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub is_practice: bool,
    pub status: SessionStatus,
    pub time_limit_seconds: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub score: Option<i32>,
    pub state: Json<SessionState>,
    /// Code whose ONE_TIME grant this attempt consumed
    pub code_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestSession {
    /// Whether a scored attempt may start given the pair's access level and
    /// any attempt already running for it
    pub fn admit_scored(level: AccessLevel, active: Option<Uuid>) -> Result<(), SessionError> {
        if !level.permits_scored_attempt() {
            return Err(SessionError::AccessDenied);
        }
        if let Some(session_id) = active {
            return Err(SessionError::AlreadyActive {
                session_id: Some(session_id),
            });
        }
        Ok(())
    }

    /// A new STARTED attempt with its clock running
    pub fn start(
        user_id: Uuid,
        test_type: &TestType,
        is_practice: bool,
        content: ContentBlob,
        code_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut state = SessionState {
            expected_text: if test_type.kind.is_typing() {
                content.passage
            } else {
                None
            },
            content: content.questions,
            ..SessionState::default()
        };
        state.start_clock(now);

        Self {
            id: Uuid::new_v4(),
            user_id,
            test_type_id: test_type.id,
            is_practice,
            status: SessionStatus::Started,
            time_limit_seconds: test_type.time_limit_seconds(),
            started_at: now,
            paused_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            cancelled_by: None,
            score: None,
            state: Json(state),
            code_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    #[mutants::skip] // Delegates to SessionState::elapsed_seconds()
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        self.state.elapsed_seconds(now)
    }

    fn next_status(&self, event: SessionEvent) -> Result<SessionStatus, StateError> {
        SessionStateMachine::transition(self.status, event)
    }

    fn not_active(&self) -> SessionError {
        SessionError::NotActive {
            status: self.status,
        }
    }

    fn invalid_state(&self, event: SessionEvent) -> SessionError {
        SessionError::InvalidState {
            status: self.status,
            event,
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let next = self
            .next_status(SessionEvent::Pause)
            .map_err(|_| self.invalid_state(SessionEvent::Pause))?;
        self.state.stop_clock(now);
        self.status = next;
        self.paused_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let next = self
            .next_status(SessionEvent::Resume)
            .map_err(|_| self.invalid_state(SessionEvent::Resume))?;
        self.state.start_clock(now);
        self.status = next;
        self.paused_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Store the client's working state and recompute running statistics
    /// against server-measured active time.
    pub fn record_progress(
        &mut self,
        update: ProgressUpdate,
        mode: ScoringMode,
        now: DateTime<Utc>,
    ) -> Result<RunningStats, SessionError> {
        self.next_status(SessionEvent::RecordProgress)
            .map_err(|_| self.not_active())?;

        let length = validate_typed(&update.typed_text)?;
        if update.cursor_position > length {
            return Err(SessionError::WorkingState(format!(
                "cursor position {} is beyond typed text of length {}",
                update.cursor_position, length
            )));
        }
        if update.keystroke.is_some() && self.state.keystrokes.len() >= MAX_KEYSTROKES {
            return Err(SessionError::WorkingState(format!(
                "keystroke log is limited to {} entries",
                MAX_KEYSTROKES
            )));
        }

        let elapsed = self.elapsed_seconds(now);
        let metric = mode.metric().unwrap_or(SpeedMetric::WordsPerMinute);
        let summary = scoring::score(&update.typed_text, self.state.expected(), elapsed, metric);
        let stats = RunningStats {
            summary,
            elapsed_seconds: elapsed,
            updated_at: now,
        };

        let state = &mut self.state.0;
        state.typed_text = update.typed_text;
        state.cursor_position = update.cursor_position;
        if let Some(keystroke) = update.keystroke {
            state.keystrokes.push(keystroke);
        }
        state.stats = Some(stats.clone());
        self.updated_at = now;

        Ok(stats)
    }

    /// Finalize a STARTED attempt. A second call fails with `NOT_ACTIVE`.
    pub fn complete(
        &mut self,
        input: CompletionInput,
        mode: ScoringMode,
        now: DateTime<Utc>,
    ) -> Result<Completion, SessionError> {
        let next = self
            .next_status(SessionEvent::Complete)
            .map_err(|_| self.not_active())?;

        validate_typed(&input.final_typed_text)?;
        let (questions_total, questions_correct) =
            validate_question_counts(input.questions_total, input.questions_correct)?;

        let client_elapsed = clamp_elapsed(input.elapsed_seconds, self.time_limit_seconds);
        let server_elapsed = self.elapsed_seconds(now);

        let typing = scoring::score(
            &input.final_typed_text,
            self.state.expected(),
            client_elapsed,
            mode.metric().unwrap_or(SpeedMetric::WordsPerMinute),
        );

        let (score, accuracy, raw_speed, weighted_speed) = match mode {
            ScoringMode::Typing(_) => (
                typing.weighted_speed,
                typing.accuracy,
                typing.raw_speed,
                typing.weighted_speed,
            ),
            ScoringMode::Questions => {
                let percent = question_percentage(questions_total, questions_correct);
                (percent.round() as i32, scoring::round_accuracy(percent), 0, 0)
            }
        };

        let final_score = FinalScore {
            score,
            accuracy,
            raw_speed,
            weighted_speed,
            time_to_complete: client_elapsed.round() as i32,
            questions_total,
            questions_correct,
            detailed_results: DetailedResults {
                metric: mode.metric(),
                characters_typed: typing.characters_typed,
                correct_characters: typing.correct_characters,
                word_accuracy: typing.word_accuracy,
                keystroke_count: self.state.keystrokes.len(),
                client_elapsed_seconds: client_elapsed,
                server_elapsed_seconds: server_elapsed,
            },
        };

        let state = &mut self.state.0;
        state.stop_clock(now);
        state.typed_text = input.final_typed_text;
        state.cursor_position = typing.characters_typed;
        state.stats = Some(RunningStats {
            summary: typing,
            elapsed_seconds: client_elapsed,
            updated_at: now,
        });

        self.status = next;
        self.completed_at = Some(now);
        self.score = Some(score);
        self.updated_at = now;

        let result = (!self.is_practice).then(|| TestResult::from_completion(self, &final_score));

        Ok(Completion {
            score: final_score,
            result,
        })
    }

    pub fn cancel(
        &mut self,
        reason: Option<String>,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let next = self
            .next_status(SessionEvent::Cancel)
            .map_err(|_| self.invalid_state(SessionEvent::Cancel))?;
        self.state.stop_clock(now);
        self.status = next;
        self.cancelled_at = Some(now);
        self.cancel_reason = reason;
        self.cancelled_by = Some(actor);
        self.updated_at = now;
        Ok(())
    }
}

fn validate_question_counts(
    total: Option<u32>,
    correct: Option<u32>,
) -> Result<(Option<i32>, Option<i32>), SessionError> {
    match (total, correct) {
        (None, None) => Ok((None, None)),
        (Some(total), Some(correct)) if correct <= total => {
            let to_i32 = |v: u32| {
                i32::try_from(v)
                    .map_err(|_| SessionError::WorkingState("question count too large".into()))
            };
            Ok((Some(to_i32(total)?), Some(to_i32(correct)?)))
        }
        (Some(_), Some(_)) => Err(SessionError::WorkingState(
            "questions_correct cannot exceed questions_total".to_string(),
        )),
        _ => Err(SessionError::WorkingState(
            "questions_total and questions_correct must be sent together".to_string(),
        )),
    }
}

fn question_percentage(total: Option<i32>, correct: Option<i32>) -> f64 {
    match (total, correct) {
        (Some(total), Some(correct)) if total > 0 => 100.0 * correct as f64 / total as f64,
        _ => 0.0,
    }
}

/// Immutable outcome of a completed scored attempt
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestResult {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub score: i32,
    pub accuracy: f64,
    pub raw_speed: i32,
    pub weighted_speed: i32,
    pub time_to_complete: i32,
    pub questions_total: Option<i32>,
    pub questions_correct: Option<i32>,
    pub detailed_results: Json<DetailedResults>,
    pub created_at: DateTime<Utc>,
}

impl TestResult {
    fn from_completion(session: &TestSession, score: &FinalScore) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id: session.id,
            user_id: session.user_id,
            test_type_id: session.test_type_id,
            score: score.score,
            accuracy: score.accuracy,
            raw_speed: score.raw_speed,
            weighted_speed: score.weighted_speed,
            time_to_complete: score.time_to_complete,
            questions_total: score.questions_total,
            questions_correct: score.questions_correct,
            detailed_results: Json(score.detailed_results.clone()),
            created_at: session.completed_at.unwrap_or(session.updated_at),
        }
    }
}
