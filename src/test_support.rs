use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::client::{
    CheckerError, IdentityRegistrar, PriorSubmissionChecker, QuestionSource, QuestionSourceError,
    RegistrarError, SinkError, SubmissionSink,
};
use crate::schemas::identity::{RegistrationRequest, StudentIdentity};
use crate::schemas::quiz::{Question, QuizMeta};
use crate::schemas::submission::{AttemptSubmission, SubmissionReceipt};
use crate::session::SessionDeps;
use crate::store::{AttemptStore, StoreError};

pub(crate) fn fixed_now() -> OffsetDateTime {
    datetime!(2026-03-01 10:00:00 UTC)
}

pub(crate) fn sample_quiz() -> QuizMeta {
    QuizMeta {
        id: "quiz-algebra".to_string(),
        title: "Algebra Checkpoint".to_string(),
        time_limit_minutes: 30,
        due_at: fixed_now() + Duration::days(1),
        pin_required: false,
    }
}

pub(crate) fn sample_questions() -> Vec<Question> {
    vec![
        Question {
            id: "q1".to_string(),
            prompt: "What is 2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string(), "5".to_string(), "6".to_string()],
            marks: 2,
            image_url: None,
        },
        Question {
            id: "q2".to_string(),
            prompt: r"Solve \(x^2 = 9\) for positive x.".to_string(),
            options: vec!["1".to_string(), "3".to_string(), "9".to_string()],
            marks: 3,
            image_url: Some("https://cdn.example.com/parabola.png".to_string()),
        },
    ]
}

pub(crate) fn registration() -> RegistrationRequest {
    RegistrationRequest {
        first_name: "Ada".to_string(),
        last_name: "Okafor".to_string(),
        pin: None,
    }
}

pub(crate) struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self { entries: Mutex::new(BTreeMap::new()) })
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.lock().expect("store lock").contains_key(key)
    }
}

impl AttemptStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().expect("store lock").get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("store lock").insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("store lock").remove(key);
        Ok(())
    }
}

pub(crate) enum CheckerScript {
    Fresh,
    Submitted,
    Unavailable,
}

pub(crate) enum SinkScript {
    Accept,
    Duplicate,
    Unavailable,
}

/// In-memory stand-in for every remote collaborator, with call counters so
/// tests can assert exactly-once and no-network properties.
pub(crate) struct FakeBackend {
    pub(crate) questions: Vec<Question>,
    pub(crate) fail_questions: AtomicBool,
    pub(crate) fail_register: AtomicBool,
    pub(crate) register_calls: AtomicUsize,
    pub(crate) question_calls: AtomicUsize,
    pub(crate) checker_calls: AtomicUsize,
    checker: Mutex<CheckerScript>,
    sink_script: Mutex<VecDeque<SinkScript>>,
    sink_calls: Mutex<Vec<AttemptSubmission>>,
    last_pin: Mutex<Option<String>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_questions(sample_questions())
    }

    pub(crate) fn with_questions(questions: Vec<Question>) -> Arc<Self> {
        Arc::new(Self {
            questions,
            fail_questions: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
            question_calls: AtomicUsize::new(0),
            checker_calls: AtomicUsize::new(0),
            checker: Mutex::new(CheckerScript::Fresh),
            sink_script: Mutex::new(VecDeque::new()),
            sink_calls: Mutex::new(Vec::new()),
            last_pin: Mutex::new(None),
        })
    }

    pub(crate) fn set_checker(&self, script: CheckerScript) {
        *self.checker.lock().expect("checker lock") = script;
    }

    pub(crate) fn push_sink_response(&self, script: SinkScript) {
        self.sink_script.lock().expect("sink lock").push_back(script);
    }

    pub(crate) fn sink_invocations(&self) -> usize {
        self.sink_calls.lock().expect("sink lock").len()
    }

    pub(crate) fn last_submission(&self) -> Option<AttemptSubmission> {
        self.sink_calls.lock().expect("sink lock").last().cloned()
    }

    pub(crate) fn last_pin(&self) -> Option<String> {
        self.last_pin.lock().expect("pin lock").clone()
    }
}

#[async_trait]
impl QuestionSource for FakeBackend {
    async fn fetch_quiz(&self, _quiz_id: &str) -> Result<QuizMeta, QuestionSourceError> {
        Ok(sample_quiz())
    }

    async fn fetch_questions(
        &self,
        _quiz_id: &str,
        pin: Option<&str>,
    ) -> Result<Vec<Question>, QuestionSourceError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_pin.lock().expect("pin lock") = pin.map(str::to_string);
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(QuestionSourceError::Unavailable("source down".to_string()));
        }
        Ok(self.questions.clone())
    }
}

#[async_trait]
impl IdentityRegistrar for FakeBackend {
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<StudentIdentity, RegistrarError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(RegistrarError::Unavailable("registrar down".to_string()));
        }
        let display_name = request.display_name();
        let id = format!("student-{}", display_name.to_lowercase().replace(' ', "-"));
        Ok(StudentIdentity { id, display_name })
    }
}

#[async_trait]
impl PriorSubmissionChecker for FakeBackend {
    async fn has_submitted(&self, _quiz_id: &str, _student: &str) -> Result<bool, CheckerError> {
        self.checker_calls.fetch_add(1, Ordering::SeqCst);
        match *self.checker.lock().expect("checker lock") {
            CheckerScript::Fresh => Ok(false),
            CheckerScript::Submitted => Ok(true),
            CheckerScript::Unavailable => {
                Err(CheckerError::Unavailable("checker down".to_string()))
            }
        }
    }
}

#[async_trait]
impl SubmissionSink for FakeBackend {
    async fn submit(
        &self,
        attempt: &AttemptSubmission,
    ) -> Result<SubmissionReceipt, SinkError> {
        let mut calls = self.sink_calls.lock().expect("sink lock");
        calls.push(attempt.clone());
        let serial = calls.len();
        drop(calls);

        let script =
            self.sink_script.lock().expect("sink lock").pop_front().unwrap_or(SinkScript::Accept);
        match script {
            SinkScript::Accept => Ok(SubmissionReceipt { id: format!("submission-{serial}") }),
            SinkScript::Duplicate => Err(SinkError::Duplicate),
            SinkScript::Unavailable => Err(SinkError::Unavailable("sink down".to_string())),
        }
    }
}

pub(crate) fn deps_with(
    store: Arc<dyn AttemptStore>,
    backend: Arc<FakeBackend>,
) -> SessionDeps {
    SessionDeps {
        store,
        source: backend.clone(),
        registrar: backend.clone(),
        checker: backend.clone(),
        sink: backend,
    }
}
