//! Scripted collaborators for stage unit tests.

use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use super::StageContext;
use crate::artifacts::{CompressedStore, QuestionQueue, ReflectionArchive, ScoreLog};
use crate::cognition::{self, Cognition, CognitionError};
use crate::insights::InsightStore;
use crate::memory::local::LocalMemory;

enum Reply {
    Text(String),
    Fail,
}

/// Answers by the first rule whose needle occurs in the prompt; `"ok"` otherwise.
#[derive(Default)]
pub struct FakeCognition {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeCognition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.into(), Reply::Text(reply.into())));
        self
    }

    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.into(), Reply::Fail));
        self
    }

    /// `(prompt, context)` of every call so far.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Cognition for FakeCognition {
    fn ask(&self, prompt: &str, context: &[String]) -> cognition::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.to_vec()));
        match self.rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some((_, Reply::Text(t))) => Ok(t.clone()),
            Some((_, Reply::Fail)) => Err(CognitionError::Transport("scripted failure".into())),
            None => Ok("ok".into()),
        }
    }
}

pub struct Fixture {
    pub tmp: TempDir,
    pub ctx: StageContext,
    pub cognition: Arc<FakeCognition>,
}

pub fn fixture(cognition: FakeCognition) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let db = Arc::new(Mutex::new(crate::db::open_memory_database().unwrap()));
    let cognition = Arc::new(cognition);

    let ctx = StageContext {
        cognition: cognition.clone(),
        memory: Arc::new(LocalMemory::new(db.clone())),
        insights: InsightStore::new(db),
        reflections: Arc::new(ReflectionArchive::new(tmp.path().join("reflections")).unwrap()),
        questions: Arc::new(QuestionQueue::new(tmp.path().join("questions/open_questions.md"))),
        scores: Arc::new(ScoreLog::new(tmp.path().join("metrics/self_scores.csv"))),
        compressed: Arc::new(CompressedStore::new(tmp.path().join("compressed")).unwrap()),
    };

    Fixture {
        tmp,
        ctx,
        cognition,
    }
}
