mod error;
pub(crate) mod timing;

pub(crate) use error::SessionError;

use std::collections::BTreeMap;
use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::client::{
    IdentityRegistrar, PriorSubmissionChecker, QuestionSource, SinkError, SubmissionSink,
};
use crate::core::time::{format_rfc3339, parse_rfc3339};
use crate::schemas::identity::{RegistrationRequest, StudentIdentity};
use crate::schemas::quiz::{Question, QuizMeta};
use crate::schemas::submission::{AttemptSubmission, SubmissionReceipt};
use crate::store::{self, AttemptStore};

/// Lifecycle phase of one attempt. `Submitting` doubles as the single-shot
/// submission guard: while a submit is in flight no second trigger can
/// reach the sink. `Closed`, `Blocked` and `Submitted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Entry,
    InProgress,
    Reviewing,
    Submitting,
    Submitted,
    Closed,
    Blocked,
}

impl Phase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Phase::Entry => "entry",
            Phase::InProgress => "in-progress",
            Phase::Reviewing => "reviewing",
            Phase::Submitting => "submitting",
            Phase::Submitted => "submitted",
            Phase::Closed => "closed",
            Phase::Blocked => "blocked",
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Phase::Submitted | Phase::Closed | Phase::Blocked)
    }

    fn is_working(self) -> bool {
        matches!(self, Phase::InProgress | Phase::Reviewing)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Navigation {
    Next,
    Prev,
    Jump(usize),
}

#[derive(Debug)]
pub(crate) struct ReviewEntry {
    pub(crate) index: usize,
    pub(crate) question_id: String,
    pub(crate) answered: bool,
}

#[derive(Debug)]
pub(crate) struct ReviewSummary {
    pub(crate) entries: Vec<ReviewEntry>,
    pub(crate) answered: usize,
    pub(crate) total: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TickStatus {
    pub(crate) remaining_seconds: i64,
    pub(crate) auto_submitted: bool,
}

/// Collaborators the controller drives. All remote calls are fire-and-await;
/// retries are user-initiated.
#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub(crate) store: Arc<dyn AttemptStore>,
    pub(crate) source: Arc<dyn QuestionSource>,
    pub(crate) registrar: Arc<dyn IdentityRegistrar>,
    pub(crate) checker: Arc<dyn PriorSubmissionChecker>,
    pub(crate) sink: Arc<dyn SubmissionSink>,
}

/// Drives a single exam attempt from entry to a terminal phase, enforcing
/// one-attempt semantics and the time box.
pub(crate) struct ExamSession {
    deps: SessionDeps,
    quiz: QuizMeta,
    attempt_id: Uuid,
    questions: Vec<Question>,
    student: Option<StudentIdentity>,
    answers: BTreeMap<String, String>,
    current_index: usize,
    start_time: Option<OffsetDateTime>,
    phase: Phase,
    expiry_fired: bool,
}

impl ExamSession {
    /// Entry validation. The completed marker short-circuits to `Blocked`
    /// before anything touches the network; a passed due date lands in
    /// `Closed` the same way.
    pub(crate) fn begin_entry(
        quiz: QuizMeta,
        deps: SessionDeps,
        now: OffsetDateTime,
    ) -> Result<Self, SessionError> {
        let phase = if deps.store.get(&store::completed_key(&quiz.id))?.is_some() {
            tracing::info!(quiz_id = %quiz.id, "Completed marker present, blocking re-entry");
            Phase::Blocked
        } else if timing::window_closed(quiz.due_at, now) {
            tracing::info!(
                quiz_id = %quiz.id,
                due_at = %format_rfc3339(quiz.due_at),
                "Quiz window is closed"
            );
            Phase::Closed
        } else {
            Phase::Entry
        };

        Ok(Self {
            deps,
            quiz,
            attempt_id: Uuid::new_v4(),
            questions: Vec::new(),
            student: None,
            answers: BTreeMap::new(),
            current_index: 0,
            start_time: None,
            phase,
            expiry_fired: false,
        })
    }

    /// Asks the checker whether `student` already submitted this quiz. A
    /// positive answer sets the local marker and blocks entry. A transport
    /// failure is swallowed: the sink re-checks duplicates server-side at
    /// submission time, so availability wins here.
    pub(crate) async fn check_prior_submission(
        &mut self,
        student: &str,
    ) -> Result<bool, SessionError> {
        self.expect_phase(Phase::Entry, "check_prior_submission")?;

        match self.deps.checker.has_submitted(&self.quiz.id, student).await {
            Ok(true) => {
                self.deps
                    .store
                    .put(&store::completed_key(&self.quiz.id), store::COMPLETED_MARKER)?;
                self.phase = Phase::Blocked;
                tracing::info!(quiz_id = %self.quiz.id, "Prior submission found, blocking entry");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(err) => {
                tracing::warn!(
                    quiz_id = %self.quiz.id,
                    error = %err,
                    "Prior-submission check failed, proceeding with the attempt"
                );
                Ok(false)
            }
        }
    }

    /// Registers the student, loads the question list and fixes the start
    /// time, reusing a persisted one so a reload never resets the clock.
    pub(crate) async fn start_attempt(
        &mut self,
        registration: RegistrationRequest,
        now: OffsetDateTime,
    ) -> Result<(), SessionError> {
        self.expect_phase(Phase::Entry, "start_attempt")?;

        registration
            .validate()
            .map_err(|err| SessionError::RegistrationFailed(err.to_string()))?;
        if self.quiz.pin_required && registration.pin.is_none() {
            return Err(SessionError::RegistrationFailed(
                "this quiz requires a PIN".to_string(),
            ));
        }

        let student = self
            .deps
            .registrar
            .register(&registration)
            .await
            .map_err(|err| SessionError::RegistrationFailed(err.to_string()))?;

        let questions = self
            .deps
            .source
            .fetch_questions(&self.quiz.id, registration.pin.as_deref())
            .await
            .map_err(|err| SessionError::LoadFailed(err.to_string()))?;
        if questions.is_empty() {
            return Err(SessionError::LoadFailed("quiz has no questions".to_string()));
        }

        let start_time = self.restore_or_fix_start_time(&student.id, now)?;
        self.answers = self.restore_answers(&student.id)?;

        tracing::info!(
            quiz_id = %self.quiz.id,
            student_id = %student.id,
            question_count = questions.len(),
            start_time = %format_rfc3339(start_time),
            restored_answers = self.answers.len(),
            "Attempt started"
        );

        self.student = Some(student);
        self.questions = questions;
        self.current_index = 0;
        self.start_time = Some(start_time);
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// Records the selected option for a question, overwriting any prior
    /// choice, and persists the whole answer map so a reload loses nothing.
    pub(crate) fn select_answer(
        &mut self,
        question_id: &str,
        option: &str,
    ) -> Result<(), SessionError> {
        self.expect_working("select_answer")?;

        let question = self
            .questions
            .iter()
            .find(|question| question.id == question_id)
            .ok_or_else(|| {
                SessionError::InvalidSelection(format!("unknown question '{question_id}'"))
            })?;
        if !question.options.iter().any(|candidate| candidate == option) {
            return Err(SessionError::InvalidSelection(format!(
                "'{option}' is not an option for question '{question_id}'"
            )));
        }

        self.answers.insert(question_id.to_string(), option.to_string());
        self.persist_answers()
    }

    /// Moves the question pointer. Clamped at both ends, never wraps, and
    /// never touches answers or the clock.
    pub(crate) fn navigate(&mut self, navigation: Navigation) -> Result<usize, SessionError> {
        self.expect_working("navigate")?;

        let last = self.questions.len().saturating_sub(1);
        self.current_index = match navigation {
            Navigation::Next => (self.current_index + 1).min(last),
            Navigation::Prev => self.current_index.saturating_sub(1),
            Navigation::Jump(index) => index.min(last),
        };
        Ok(self.current_index)
    }

    pub(crate) fn enter_review(&mut self) -> Result<(), SessionError> {
        self.expect_phase(Phase::InProgress, "enter_review")?;
        self.phase = Phase::Reviewing;
        Ok(())
    }

    pub(crate) fn exit_review(&mut self) -> Result<(), SessionError> {
        self.expect_phase(Phase::Reviewing, "exit_review")?;
        self.phase = Phase::InProgress;
        Ok(())
    }

    pub(crate) fn review_summary(&self) -> ReviewSummary {
        let entries: Vec<ReviewEntry> = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| ReviewEntry {
                index,
                question_id: question.id.clone(),
                answered: self.answers.contains_key(&question.id),
            })
            .collect();
        let answered = entries.iter().filter(|entry| entry.answered).count();
        let total = entries.len();
        ReviewSummary { entries, answered, total }
    }

    /// One reading of the attempt clock. On the first zero reading the
    /// controller submits on its own, latched so later zero readings never
    /// re-trigger the sink.
    pub(crate) async fn tick(&mut self, now: OffsetDateTime) -> Result<TickStatus, SessionError> {
        if !self.phase.is_working() {
            return Ok(TickStatus { remaining_seconds: 0, auto_submitted: false });
        }
        let Some(start_time) = self.start_time else {
            return Err(SessionError::InvalidPhase { operation: "tick", phase: self.phase });
        };

        let remaining = timing::remaining_seconds(start_time, self.quiz.time_limit_minutes, now);
        if remaining > 0 || self.expiry_fired {
            return Ok(TickStatus { remaining_seconds: remaining, auto_submitted: false });
        }

        self.expiry_fired = true;
        tracing::info!(quiz_id = %self.quiz.id, "Time limit reached, submitting attempt");
        self.perform_submit(now).await?;
        Ok(TickStatus { remaining_seconds: 0, auto_submitted: true })
    }

    /// Manual submission, only valid from the review screen. Auto-submit on
    /// expiry goes through `tick` and bypasses the review requirement.
    pub(crate) async fn submit(
        &mut self,
        now: OffsetDateTime,
    ) -> Result<SubmissionReceipt, SessionError> {
        match self.phase {
            Phase::Reviewing => {}
            Phase::Submitted | Phase::Blocked => return Err(SessionError::AlreadySubmitted),
            phase => return Err(SessionError::InvalidPhase { operation: "submit", phase }),
        }
        self.perform_submit(now).await
    }

    async fn perform_submit(&mut self, now: OffsetDateTime) -> Result<SubmissionReceipt, SessionError> {
        let return_phase = self.phase;
        let Some(student) = &self.student else {
            return Err(SessionError::InvalidPhase { operation: "submit", phase: self.phase });
        };

        let attempt = AttemptSubmission {
            attempt_id: self.attempt_id,
            quiz_id: self.quiz.id.clone(),
            student_id: student.id.clone(),
            answers: self.answers.clone(),
            submitted_at: now,
        };
        let student_id = student.id.clone();
        self.phase = Phase::Submitting;

        match self.deps.sink.submit(&attempt).await {
            Ok(receipt) => {
                self.phase = Phase::Submitted;
                self.clear_attempt_state(&student_id);
                tracing::info!(
                    quiz_id = %self.quiz.id,
                    student_id = %student_id,
                    submission_id = %receipt.id,
                    answered = attempt.answers.len(),
                    "Attempt submitted"
                );
                Ok(receipt)
            }
            Err(SinkError::Duplicate) => {
                self.phase = Phase::Blocked;
                self.clear_attempt_state(&student_id);
                tracing::warn!(
                    quiz_id = %self.quiz.id,
                    student_id = %student_id,
                    "Sink rejected the attempt as a duplicate"
                );
                Err(SessionError::AlreadySubmitted)
            }
            Err(err) => {
                self.phase = return_phase;
                tracing::error!(
                    quiz_id = %self.quiz.id,
                    student_id = %student_id,
                    error = %err,
                    "Submission failed, answers preserved for retry"
                );
                Err(SessionError::SubmissionFailed(err.to_string()))
            }
        }
    }

    /// The sink has already recorded (or refused) the attempt at this
    /// point; storage failures here are logged, never surfaced.
    fn clear_attempt_state(&self, student_id: &str) {
        for key in [
            store::start_time_key(&self.quiz.id, student_id),
            store::answers_key(&self.quiz.id, student_id),
        ] {
            if let Err(err) = self.deps.store.delete(&key) {
                tracing::error!(error = %err, key, "Failed to clear attempt state");
            }
        }
        if let Err(err) =
            self.deps.store.put(&store::completed_key(&self.quiz.id), store::COMPLETED_MARKER)
        {
            tracing::error!(error = %err, "Failed to set completed marker");
        }
    }

    fn restore_or_fix_start_time(
        &self,
        student_id: &str,
        now: OffsetDateTime,
    ) -> Result<OffsetDateTime, SessionError> {
        let key = store::start_time_key(&self.quiz.id, student_id);
        if let Some(raw) = self.deps.store.get(&key)? {
            match parse_rfc3339(&raw) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Persisted start time is unreadable, reinitializing"
                    );
                }
            }
        }
        self.deps.store.put(&key, &format_rfc3339(now))?;
        Ok(now)
    }

    fn restore_answers(&self, student_id: &str) -> Result<BTreeMap<String, String>, SessionError> {
        let key = store::answers_key(&self.quiz.id, student_id);
        let Some(raw) = self.deps.store.get(&key)? else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(err) => {
                tracing::warn!(error = %err, "Persisted answers are unreadable, starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist_answers(&self) -> Result<(), SessionError> {
        let Some(student) = &self.student else {
            return Err(SessionError::InvalidPhase {
                operation: "persist_answers",
                phase: self.phase,
            });
        };
        let serialized =
            serde_json::to_string(&self.answers).map_err(store::StoreError::from)?;
        self.deps
            .store
            .put(&store::answers_key(&self.quiz.id, &student.id), &serialized)?;
        Ok(())
    }

    fn expect_phase(
        &self,
        expected: Phase,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if self.phase == expected {
            return Ok(());
        }
        Err(self.phase_error(operation))
    }

    fn expect_working(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.phase.is_working() {
            return Ok(());
        }
        Err(self.phase_error(operation))
    }

    fn phase_error(&self, operation: &'static str) -> SessionError {
        match self.phase {
            Phase::Closed => SessionError::ClosedWindow,
            Phase::Blocked | Phase::Submitted => SessionError::AlreadySubmitted,
            phase => SessionError::InvalidPhase { operation, phase },
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn quiz(&self) -> &QuizMeta {
        &self.quiz
    }

    pub(crate) fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub(crate) fn answer_for(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub(crate) fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub(crate) fn student(&self) -> Option<&StudentIdentity> {
        self.student.as_ref()
    }

    pub(crate) fn start_time(&self) -> Option<OffsetDateTime> {
        self.start_time
    }
}
