//! In-memory port implementations shared by the web-layer tests.

use crate::{
    auth::AuthContext,
    config::Config,
    web::state::{AppState, SessionRegistry},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use video_learning_core::{
    credits::CustomCreditAmount,
    domain::{
        Activity, Attempt, CheckoutSession, CreditBalance, CreditPackage, CreditTransaction,
        Difficulty, FlashCard, Note, ProcessingStatus, Project, ProjectChange, Question, Quiz,
        Report, SourceSegment, StatusReport, SubscriptionPlan, Video,
    },
    ports::{
        BillingService, DatabaseService, NotesService, PortError, PortResult, ProjectChangeStream,
        QuestionService, VideoProcessingService,
    },
};

pub fn question(id: &str, correct_answer: usize) -> Question {
    Question {
        id: id.to_string(),
        text: format!("What about {}?", id),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_answer,
        explanation: Some(format!("Because of {}", id)),
        segment: SourceSegment {
            start_time: 40.0,
            end_time: 55.0,
            text: "segment text".to_string(),
        },
        difficulty: Difficulty::Medium,
    }
}

pub fn flashcard(id: &str, show_at_timestamp: f64) -> FlashCard {
    FlashCard {
        id: format!("fc-{}", id),
        question: question(id, 1),
        show_at_timestamp,
    }
}

pub fn video(project_id: Uuid, url: &str) -> Video {
    Video {
        id: Uuid::new_v4(),
        project_id,
        url: url.to_string(),
        title: Some("Lecture".to_string()),
        duration: Some(600.0),
        processing_status: ProcessingStatus::Pending,
        created_at: Utc::now(),
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "API_BASE_URL" => Some("https://api.example.com".to_string()),
        "DATABASE_URL" => Some("postgres://localhost/learn".to_string()),
        _ => None,
    })
    .unwrap()
}

//=========================================================================================
// Fakes
//=========================================================================================

#[derive(Default)]
pub struct FakeDb {
    pub projects: Mutex<Vec<Project>>,
    pub videos: Mutex<Vec<Video>>,
    pub activities: Mutex<Vec<Activity>>,
    pub changes: Mutex<Vec<ProjectChange>>,
}

impl FakeDb {
    pub fn add_project(&self, user_id: Uuid) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            name: "Biology".to_string(),
            description: None,
            created_at: Utc::now(),
        };
        self.projects.lock().unwrap().push(project.clone());
        project
    }

    pub fn add_video(&self, video: Video) {
        self.videos.lock().unwrap().push(video);
    }

    pub fn activity_kinds(&self) -> Vec<String> {
        self.activities.lock().unwrap().iter().map(|a| a.kind.clone()).collect()
    }
}

#[async_trait]
impl DatabaseService for FakeDb {
    async fn list_projects(&self, user_id: Uuid) -> PortResult<Vec<Project>> {
        Ok(self.projects.lock().unwrap().iter().filter(|p| p.user_id == user_id).cloned().collect())
    }

    async fn create_project(&self, user_id: Uuid, name: &str, description: Option<&str>) -> PortResult<Project> {
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        self.projects.lock().unwrap().push(project.clone());
        Ok(project)
    }

    async fn get_project(&self, project_id: Uuid) -> PortResult<Project> {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Project {}", project_id)))
    }

    async fn delete_project(&self, project_id: Uuid) -> PortResult<()> {
        self.projects.lock().unwrap().retain(|p| p.id != project_id);
        self.videos.lock().unwrap().retain(|v| v.project_id != project_id);
        Ok(())
    }

    async fn list_videos(&self, project_id: Uuid) -> PortResult<Vec<Video>> {
        Ok(self.videos.lock().unwrap().iter().filter(|v| v.project_id == project_id).cloned().collect())
    }

    async fn get_video(&self, video_id: Uuid) -> PortResult<Video> {
        self.videos
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.id == video_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Video {}", video_id)))
    }

    async fn log_activity(&self, user_id: Uuid, kind: &str, description: &str) -> PortResult<()> {
        self.activities.lock().unwrap().push(Activity {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_activity(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<Activity>> {
        Ok(self
            .activities
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn subscribe_project_changes(&self, _user_id: Uuid) -> PortResult<ProjectChangeStream> {
        let changes: Vec<PortResult<ProjectChange>> =
            self.changes.lock().unwrap().iter().cloned().map(Ok).collect();
        let stream: ProjectChangeStream = Box::pin(futures::stream::iter(changes));
        Ok(stream)
    }
}

/// Answers status polls from a script. The last report repeats once the script runs out.
#[derive(Default)]
pub struct FakeProcessing {
    pub script: Mutex<VecDeque<PortResult<StatusReport>>>,
    pub polls: Mutex<usize>,
    pub submitted: Mutex<Vec<(Uuid, String)>>,
    pub reject_with: Mutex<Option<PortError>>,
}

impl FakeProcessing {
    pub fn with_script(script: Vec<PortResult<StatusReport>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn poll_count(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl VideoProcessingService for FakeProcessing {
    async fn process_video(&self, project_id: Uuid, url: &str) -> PortResult<Video> {
        if let Some(err) = self.reject_with.lock().unwrap().take() {
            return Err(err);
        }
        self.submitted.lock().unwrap().push((project_id, url.to_string()));
        Ok(video(project_id, url))
    }

    async fn get_processing_status(&self, _video_id: Uuid) -> PortResult<StatusReport> {
        *self.polls.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            return script.pop_front().unwrap_or_else(|| Ok(StatusReport::new(ProcessingStatus::Pending)));
        }
        match script.front() {
            Some(Ok(report)) => Ok(report.clone()),
            Some(Err(_)) => Err(PortError::Unexpected("status unavailable".to_string())),
            None => Ok(StatusReport::new(ProcessingStatus::Completed)),
        }
    }
}

/// Keeps a log of every call so tests can assert on ordering.
#[derive(Default)]
pub struct FakeQuestions {
    pub flashcards: Mutex<Vec<FlashCard>>,
    pub questions: Mutex<Vec<Question>>,
    pub attempts: Mutex<Vec<Attempt>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_attempts: Mutex<bool>,
}

impl FakeQuestions {
    pub fn with_flashcards(flashcards: Vec<FlashCard>) -> Self {
        let questions = flashcards.iter().map(|fc| fc.question.clone()).collect();
        Self {
            flashcards: Mutex::new(flashcards),
            questions: Mutex::new(questions),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == call).count()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl QuestionService for FakeQuestions {
    async fn get_flashcards(&self, _video_id: Uuid) -> PortResult<Vec<FlashCard>> {
        self.log("get_flashcards");
        Ok(self.flashcards.lock().unwrap().clone())
    }

    async fn get_questions(&self, _video_id: Uuid) -> PortResult<Vec<Question>> {
        self.log("get_questions");
        Ok(self.questions.lock().unwrap().clone())
    }

    async fn generate_quiz(&self, video_id: Uuid, num_questions: u32) -> PortResult<Quiz> {
        self.log("generate_quiz");
        let questions = self.questions.lock().unwrap().iter().take(num_questions as usize).cloned().collect();
        Ok(Quiz {
            id: "quiz-1".to_string(),
            video_id,
            questions,
        })
    }

    async fn record_attempt(&self, attempt: &Attempt) -> PortResult<()> {
        self.log(format!("record_attempt:{}", attempt.question_id));
        if *self.fail_attempts.lock().unwrap() {
            return Err(PortError::Unexpected("attempts table unavailable".to_string()));
        }
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn generate_report(&self, video_id: Uuid) -> PortResult<Report> {
        self.log("generate_report");
        let attempts = self.attempts.lock().unwrap();
        let total = attempts.len() as u32;
        let correct = attempts.iter().filter(|a| a.is_correct).count() as u32;
        Ok(Report {
            video_id,
            total_questions: total,
            correct_answers: correct,
            accuracy: if total == 0 { 0.0 } else { correct as f64 / total as f64 * 100.0 },
            summary: None,
            recommendations: Vec::new(),
        })
    }
}

#[derive(Default)]
pub struct FakeNotes {
    pub note: Mutex<Option<Note>>,
}

#[async_trait]
impl NotesService for FakeNotes {
    async fn generate_notes(&self, video_id: Uuid) -> PortResult<Note> {
        let note = Note {
            id: Uuid::new_v4(),
            video_id,
            content: "# Notes".to_string(),
            updated_at: Utc::now(),
        };
        *self.note.lock().unwrap() = Some(note.clone());
        Ok(note)
    }

    async fn get_notes(&self, video_id: Uuid) -> PortResult<Note> {
        self.note
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortError::NotFound(format!("Notes for {}", video_id)))
    }

    async fn update_notes(&self, note_id: Uuid, content: &str) -> PortResult<Note> {
        let mut guard = self.note.lock().unwrap();
        match guard.as_mut() {
            Some(note) if note.id == note_id => {
                note.content = content.to_string();
                note.updated_at = Utc::now();
                Ok(note.clone())
            }
            _ => Err(PortError::NotFound(format!("Note {}", note_id))),
        }
    }
}

#[derive(Default)]
pub struct FakeBilling {
    pub custom_purchases: Mutex<Vec<u64>>,
}

#[async_trait]
impl BillingService for FakeBilling {
    async fn list_plans(&self) -> PortResult<Vec<SubscriptionPlan>> {
        Ok(vec![SubscriptionPlan {
            id: "pro".to_string(),
            name: "Pro".to_string(),
            price_pence: 999,
            monthly_credits: 500,
            features: vec!["Unlimited quizzes".to_string()],
        }])
    }

    async fn create_subscription_checkout(&self, plan_id: &str) -> PortResult<CheckoutSession> {
        Ok(CheckoutSession {
            url: format!("https://pay.example.com/plan/{}", plan_id),
        })
    }

    async fn list_credit_packages(&self) -> PortResult<Vec<CreditPackage>> {
        Ok(vec![CreditPackage {
            id: "small".to_string(),
            credits: 100,
            price_pence: 500,
        }])
    }

    async fn purchase_package(&self, package_id: &str) -> PortResult<CheckoutSession> {
        Ok(CheckoutSession {
            url: format!("https://pay.example.com/package/{}", package_id),
        })
    }

    async fn purchase_custom_amount(&self, amount: CustomCreditAmount) -> PortResult<CheckoutSession> {
        self.custom_purchases.lock().unwrap().push(amount.pence());
        Ok(CheckoutSession {
            url: format!("https://pay.example.com/custom/{}", amount.pence()),
        })
    }

    async fn credit_history(&self) -> PortResult<Vec<CreditTransaction>> {
        Ok(Vec::new())
    }

    async fn credit_balance(&self) -> PortResult<CreditBalance> {
        Ok(CreditBalance { credits: 42 })
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

pub struct Fakes {
    pub db: Arc<FakeDb>,
    pub processing: Arc<FakeProcessing>,
    pub questions: Arc<FakeQuestions>,
    pub notes: Arc<FakeNotes>,
    pub billing: Arc<FakeBilling>,
}

impl Fakes {
    pub fn new(processing: FakeProcessing, questions: FakeQuestions) -> Self {
        Self {
            db: Arc::new(FakeDb::default()),
            processing: Arc::new(processing),
            questions: Arc::new(questions),
            notes: Arc::new(FakeNotes::default()),
            billing: Arc::new(FakeBilling::default()),
        }
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            db: self.db.clone(),
            processing: self.processing.clone(),
            questions: self.questions.clone(),
            notes: self.notes.clone(),
            billing: self.billing.clone(),
            config: Arc::new(test_config()),
            auth: AuthContext::new(),
            sessions: Arc::new(SessionRegistry::default()),
        })
    }
}
