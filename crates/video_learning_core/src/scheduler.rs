//! crates/video_learning_core/src/scheduler.rs
//!
//! Timestamp-driven flashcard delivery for a single viewing of a video.
//!
//! The schedule decides which flashcard (if any) to show for each playback-time
//! update, and collects flashcards that arrived from background generation after
//! playback had already passed them. Those are replayed in order once the video
//! reaches its end.

use crate::domain::{FlashCard, SourceSegment};
use std::collections::HashSet;

/// A flashcard triggers when playback is strictly closer than this to its timestamp.
pub const MATCH_WINDOW_SECS: f64 = 2.0;
/// The missed queue opens once playback is this close to the end of the video.
pub const END_WINDOW_SECS: f64 = 2.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScheduleError {
    #[error("Flashcard for question {0} is not currently displayed")]
    NotDisplayed(String),
    #[error("No missed flashcards are being shown")]
    MissedQueueNotShowing,
}

/// What the player has to react to after a playback-time update.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleEvent {
    /// A flashcard reached its timestamp. The video must pause while it is shown.
    FlashcardDue(FlashCard),
    /// Playback reached the end with missed flashcards pending; the first one is shown.
    MissedQueueOpened { card: FlashCard, total: usize },
}

/// The state of the flashcard modal after the user acted on it.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalState {
    Closed,
    Missed {
        card: FlashCard,
        index: usize,
        total: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub question_id: String,
    pub selected_answer: usize,
    pub correct: bool,
    pub correct_answer: usize,
    pub explanation: Option<String>,
    pub segment: SourceSegment,
    pub next: ModalState,
}

/// Flashcards whose timestamp already passed unanswered, replayed at the end of the video.
#[derive(Debug, Clone, Default)]
pub struct MissedQueue {
    cards: Vec<FlashCard>,
    cursor: Option<usize>,
}

impl MissedQueue {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// True while the queue is being drained through the modal.
    pub fn is_showing(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cards(&self) -> &[FlashCard] {
        &self.cards
    }

    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&FlashCard> {
        self.cursor.and_then(|i| self.cards.get(i))
    }

    fn contains(&self, question_id: &str) -> bool {
        self.cards.iter().any(|fc| fc.question.id == question_id)
    }

    fn open(&mut self) -> Option<&FlashCard> {
        if self.cards.is_empty() {
            return None;
        }
        self.cursor = Some(0);
        self.cards.first()
    }

    /// Moves to the next card. Running off the end clears the queue.
    fn advance(&mut self) -> Option<&FlashCard> {
        let next = self.cursor.map_or(0, |i| i + 1);
        if next < self.cards.len() {
            self.cursor = Some(next);
            self.cards.get(next)
        } else {
            self.clear();
            None
        }
    }

    fn clear(&mut self) {
        self.cards.clear();
        self.cursor = None;
    }

    fn replace(&mut self, cards: Vec<FlashCard>) {
        self.cards = cards;
        self.cursor = None;
    }

    /// Appends cards not already queued, leaving the current position untouched.
    fn merge(&mut self, cards: Vec<FlashCard>) {
        for card in cards {
            if !self.contains(&card.question.id) {
                self.cards.push(card);
            }
        }
    }

    fn remove(&mut self, question_id: &str) {
        if !self.is_showing() {
            self.cards.retain(|fc| fc.question.id != question_id);
        }
    }

    fn modal_state(&self) -> ModalState {
        match (self.cursor, self.current()) {
            (Some(index), Some(card)) => ModalState::Missed {
                card: card.clone(),
                index,
                total: self.cards.len(),
            },
            _ => ModalState::Closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Active {
    None,
    Scheduled(FlashCard),
    Missed,
}

/// Returns the flashcard due at `current_time`, if any.
///
/// Every card within the match window that passes `is_eligible` qualifies. When more
/// than one qualifies, the earliest timestamp wins, and equal timestamps keep list order.
pub fn find_due<'a, F>(flashcards: &'a [FlashCard], current_time: f64, is_eligible: F) -> Option<&'a FlashCard>
where
    F: Fn(&FlashCard) -> bool,
{
    flashcards
        .iter()
        .filter(|fc| (fc.show_at_timestamp - current_time).abs() < MATCH_WINDOW_SECS)
        .filter(|fc| is_eligible(fc))
        .min_by(|a, b| a.show_at_timestamp.total_cmp(&b.show_at_timestamp))
}

/// Flashcards already behind `current_time` that have not been answered, in list order.
pub fn collect_missed(
    flashcards: &[FlashCard],
    current_time: f64,
    answered: &HashSet<String>,
) -> Vec<FlashCard> {
    flashcards
        .iter()
        .filter(|fc| fc.show_at_timestamp < current_time && !answered.contains(&fc.question.id))
        .cloned()
        .collect()
}

/// Per-viewing flashcard state: the list, what was answered or skipped, and what is on screen.
#[derive(Debug, Clone)]
pub struct FlashcardSchedule {
    flashcards: Vec<FlashCard>,
    answered: HashSet<String>,
    dismissed: HashSet<String>,
    active: Active,
    missed: MissedQueue,
    enabled: bool,
    current_time: f64,
    duration: Option<f64>,
}

impl Default for FlashcardSchedule {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FlashcardSchedule {
    pub fn new(flashcards: Vec<FlashCard>) -> Self {
        let mut schedule = Self {
            flashcards: Vec::new(),
            answered: HashSet::new(),
            dismissed: HashSet::new(),
            active: Active::None,
            missed: MissedQueue::default(),
            enabled: true,
            current_time: 0.0,
            duration: None,
        };
        schedule.replace_flashcards(flashcards);
        schedule
    }

    pub fn flashcards(&self) -> &[FlashCard] {
        &self.flashcards
    }

    pub fn missed_queue(&self) -> &MissedQueue {
        &self.missed
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Records the video length ahead of the first playback update.
    pub fn set_duration(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.duration = Some(duration);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answered.contains(question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.answered.len()
    }

    /// True while any flashcard (scheduled or missed) is on screen.
    pub fn modal_open(&self) -> bool {
        self.active != Active::None
    }

    pub fn active_card(&self) -> Option<&FlashCard> {
        match &self.active {
            Active::None => None,
            Active::Scheduled(card) => Some(card),
            Active::Missed => self.missed.current(),
        }
    }

    /// Every flashcard has been answered or skipped.
    pub fn is_complete(&self) -> bool {
        self.flashcards.iter().all(|fc| self.is_handled(&fc.question.id))
    }

    fn is_handled(&self, question_id: &str) -> bool {
        self.answered.contains(question_id) || self.dismissed.contains(question_id)
    }

    fn active_question_id(&self) -> Option<&str> {
        self.active_card().map(|fc| fc.question.id.as_str())
    }

    /// Installs a freshly fetched flashcard list and collects the cards playback already passed.
    ///
    /// A queue that is not on screen is rebuilt from scratch. A queue that is on screen only
    /// gains the new misses at its tail. Returns the number of queued misses afterwards.
    pub fn replace_flashcards(&mut self, mut flashcards: Vec<FlashCard>) -> usize {
        flashcards.sort_by(|a, b| a.show_at_timestamp.total_cmp(&b.show_at_timestamp));
        self.flashcards = flashcards;

        let active_id = self.active_question_id().map(str::to_owned);
        let missed: Vec<FlashCard> = collect_missed(&self.flashcards, self.current_time, &self.answered)
            .into_iter()
            .filter(|fc| !self.dismissed.contains(&fc.question.id))
            .filter(|fc| active_id.as_deref() != Some(fc.question.id.as_str()))
            .collect();

        if self.missed.is_showing() {
            self.missed.merge(missed);
        } else {
            self.missed.replace(missed);
        }
        self.missed.len()
    }

    /// Feeds one playback-time update through the schedule.
    pub fn on_time_update(&mut self, current_time: f64, duration: Option<f64>) -> Option<ScheduleEvent> {
        self.current_time = current_time;
        if let Some(d) = duration {
            self.set_duration(d);
        }

        if self.modal_open() || !self.enabled {
            return None;
        }

        if let Some(duration) = self.duration {
            if !self.missed.is_empty() && current_time >= duration - END_WINDOW_SECS {
                let total = self.missed.len();
                let card = self.missed.open()?.clone();
                self.active = Active::Missed;
                return Some(ScheduleEvent::MissedQueueOpened { card, total });
            }
        }

        let card = find_due(&self.flashcards, current_time, |fc| !self.is_handled(&fc.question.id))?.clone();
        self.active = Active::Scheduled(card.clone());
        Some(ScheduleEvent::FlashcardDue(card))
    }

    /// Records an answer for the card on screen and moves the modal along.
    pub fn answer(&mut self, question_id: &str, selected_answer: usize) -> Result<AnswerOutcome, ScheduleError> {
        let card = match self.active_card() {
            Some(card) if card.question.id == question_id => card.clone(),
            _ => return Err(ScheduleError::NotDisplayed(question_id.to_string())),
        };

        self.answered.insert(question_id.to_string());
        let next = self.close_or_advance(question_id);

        let question = card.question;
        Ok(AnswerOutcome {
            question_id: question.id.clone(),
            selected_answer,
            correct: question.is_correct(selected_answer),
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            segment: question.segment,
            next,
        })
    }

    /// Skips the missed card on screen and shows the next one.
    pub fn skip_missed(&mut self) -> Result<ModalState, ScheduleError> {
        if self.active != Active::Missed {
            return Err(ScheduleError::MissedQueueNotShowing);
        }
        let question_id = self
            .missed
            .current()
            .map(|fc| fc.question.id.clone())
            .ok_or(ScheduleError::MissedQueueNotShowing)?;
        self.dismissed.insert(question_id.clone());
        Ok(self.close_or_advance(&question_id))
    }

    /// Skips every remaining missed card and closes the modal.
    pub fn skip_remaining_missed(&mut self) -> Result<ModalState, ScheduleError> {
        if self.active != Active::Missed {
            return Err(ScheduleError::MissedQueueNotShowing);
        }
        let start = self.missed.position().unwrap_or(0);
        for card in self.missed.cards().iter().skip(start) {
            self.dismissed.insert(card.question.id.clone());
        }
        self.missed.clear();
        self.active = Active::None;
        Ok(ModalState::Closed)
    }

    /// Closes whatever is on screen without answering it. Closed cards never trigger again.
    pub fn dismiss_active(&mut self) -> ModalState {
        match &self.active {
            Active::None => ModalState::Closed,
            Active::Scheduled(card) => {
                let question_id = card.question.id.clone();
                self.dismissed.insert(question_id.clone());
                self.missed.remove(&question_id);
                self.active = Active::None;
                ModalState::Closed
            }
            Active::Missed => self
                .skip_remaining_missed()
                .unwrap_or(ModalState::Closed),
        }
    }

    fn close_or_advance(&mut self, question_id: &str) -> ModalState {
        match self.active {
            Active::Missed => {
                if self.missed.advance().is_none() {
                    self.active = Active::None;
                }
                self.missed.modal_state()
            }
            _ => {
                self.active = Active::None;
                self.missed.remove(question_id);
                ModalState::Closed
            }
        }
    }
}
