pub mod credits;
pub mod domain;
pub mod media;
pub mod polling;
pub mod ports;
pub mod quiz;
pub mod scheduler;

pub use credits::{estimate_processing_credits, CreditAmountError, CustomCreditAmount};
pub use domain::{
    Activity, Attempt, AttemptSource, CheckoutSession, CreditBalance, CreditPackage, CreditTransaction,
    Difficulty, FlashCard, Note, ProcessingStatus, Project, ProjectChange, Question, Quiz, Report,
    SourceSegment, StatusReport, SubscriptionPlan, Video,
};
pub use media::{PlaybackController, PlaybackState, PlayerCommand, PlayerEvent, VideoSource, VideoUrlError};
pub use polling::PollDecision;
pub use ports::{
    BillingService, DatabaseService, NotesService, PortError, PortResult, ProjectChangeStream,
    QuestionService, VideoProcessingService,
};
pub use quiz::{grade_quiz, QuizAnswer, QuizError, QuizGrade};
pub use scheduler::{AnswerOutcome, FlashcardSchedule, ModalState, ScheduleError, ScheduleEvent};
