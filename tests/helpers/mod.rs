#![allow(dead_code)]

use chrono::NaiveDate;
use ponder::artifacts::ReflectionRecord;
use ponder::brain::Brain;
use ponder::cognition::{self, Cognition, CognitionError};
use ponder::config::PonderConfig;
use ponder::db;
use ponder::memory::local::LocalMemory;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Cognition double: replies by the first rule whose needle occurs in the
/// prompt, `"ok"` when none matches.
#[derive(Default)]
pub struct ScriptedCognition {
    rules: Vec<(String, Option<String>)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCognition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.into(), Some(reply.into())));
        self
    }

    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.into(), None));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Cognition for ScriptedCognition {
    fn ask(&self, prompt: &str, _context: &[String]) -> cognition::Result<String> {
        self.calls.lock().unwrap().push(prompt.to_string());
        match self.rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some((_, Some(reply))) => Ok(reply.clone()),
            Some((_, None)) => Err(CognitionError::Transport("connection refused".into())),
            None => Ok("ok".into()),
        }
    }
}

/// A brain whose data directory lives in a temp dir and whose database is
/// in memory.
pub struct TestBrain {
    pub tmp: TempDir,
    pub brain: Brain,
    pub cognition: Arc<ScriptedCognition>,
}

pub fn test_config(tmp: &TempDir) -> PonderConfig {
    let mut config = PonderConfig::default();
    config.storage.data_dir = tmp.path().to_string_lossy().into_owned();
    config
}

pub fn test_brain(cognition: ScriptedCognition) -> TestBrain {
    let tmp = TempDir::new().unwrap();
    test_brain_with(cognition, test_config(&tmp), tmp)
}

pub fn test_brain_with(cognition: ScriptedCognition, config: PonderConfig, tmp: TempDir) -> TestBrain {
    let db = Arc::new(Mutex::new(db::open_memory_database().unwrap()));
    let cognition = Arc::new(cognition);
    let memory = Arc::new(LocalMemory::new(db.clone()));
    let brain = Brain::assemble(config, db, cognition.clone(), memory).unwrap();
    TestBrain { tmp, brain, cognition }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Write a plain reflection for `day` directly into the archive.
pub fn seed_reflection(brain: &Brain, day: NaiveDate, summary: &str) {
    brain
        .reflections()
        .write(&ReflectionRecord {
            date: day,
            revisited_question: None,
            revisited_answer: None,
            summary: summary.to_string(),
            new_questions: Vec::new(),
        })
        .unwrap();
}
