// Client side of a spaced-repetition review session: the card on screen, running score, and
// the most recent answer feedback. Scheduling (Leitner boxes) is the server's business.

use std::collections::VecDeque;

use crate::api::{
    ReviewAnswerResponse, ReviewCard, ReviewCompleteResponse, ReviewSkipResponse,
    ReviewStartResponse,
};
use crate::rules::{Position, PositionError};


pub const MAX_FEEDBACK_ITEMS: usize = 5;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReviewFeedback {
    pub answer: String,
    pub correct: bool,
    pub expected_move: String,
    pub explanation: Option<String>,
    pub new_box: u32,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ReviewSession {
    session_id: String,
    total_cards: u32,
    current_card: Option<ReviewCard>,
    progress: f64,
    correct_count: u32,
    incorrect_count: u32,
    skipped_count: u32,
    // Newest last.
    feedback: VecDeque<ReviewFeedback>,
    is_complete: bool,
}

impl ReviewSession {
    // `None` if the server had no cards due.
    pub fn start(response: ReviewStartResponse) -> Option<Self> {
        let session_id = response.session_id?;
        Some(ReviewSession {
            session_id,
            total_cards: response.total_cards,
            is_complete: response.current_card.is_none(),
            current_card: response.current_card,
            progress: response.progress,
            correct_count: 0,
            incorrect_count: 0,
            skipped_count: 0,
            feedback: VecDeque::new(),
        })
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn total_cards(&self) -> u32 { self.total_cards }
    pub fn current_card(&self) -> Option<&ReviewCard> { self.current_card.as_ref() }
    pub fn progress(&self) -> f64 { self.progress }
    pub fn correct_count(&self) -> u32 { self.correct_count }
    pub fn incorrect_count(&self) -> u32 { self.incorrect_count }
    pub fn skipped_count(&self) -> u32 { self.skipped_count }
    pub fn feedback(&self) -> impl ExactSizeIterator<Item = &ReviewFeedback> { self.feedback.iter() }
    pub fn is_complete(&self) -> bool { self.is_complete }

    // Position to show for the current card.
    pub fn current_position(&self) -> Option<Result<Position, PositionError>> {
        self.current_card.as_ref().map(|card| Position::from_fen(&card.fen))
    }

    pub fn apply_answer(&mut self, answer: &str, response: ReviewAnswerResponse) -> &ReviewFeedback {
        // The server keeps the authoritative score; local counters are only a fallback for
        // responses that lack it.
        if response.session_stats.correct + response.session_stats.incorrect > 0 {
            self.correct_count = response.session_stats.correct;
            self.incorrect_count = response.session_stats.incorrect;
        } else if response.correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.advance(response.next_card, response.is_session_complete, response.progress);
        self.push_feedback(ReviewFeedback {
            answer: answer.to_owned(),
            correct: response.correct,
            expected_move: response.expected_move,
            explanation: response.explanation,
            new_box: response.new_box,
        })
    }

    pub fn apply_skip(&mut self, response: ReviewSkipResponse) {
        if response.skipped {
            self.skipped_count += 1;
        }
        self.advance(response.next_card, response.is_session_complete, response.progress);
    }

    pub fn apply_complete(&mut self, response: &ReviewCompleteResponse) {
        self.is_complete = true;
        self.current_card = None;
        self.correct_count = response.correct_count;
        self.incorrect_count = response.incorrect_count;
    }

    fn advance(&mut self, next_card: Option<ReviewCard>, is_complete: bool, progress: f64) {
        self.progress = progress;
        self.is_complete = is_complete || next_card.is_none();
        self.current_card = next_card;
    }

    fn push_feedback(&mut self, item: ReviewFeedback) -> &ReviewFeedback {
        if self.feedback.len() == MAX_FEEDBACK_ITEMS {
            self.feedback.pop_front();
        }
        self.feedback.push_back(item);
        // Just pushed, so the deque is not empty.
        &self.feedback[self.feedback.len() - 1]
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::ReviewSessionStats;
    use crate::rules::START_FEN;

    fn card(id: &str) -> ReviewCard {
        ReviewCard {
            card_id: id.to_owned(),
            fen: START_FEN.to_owned(),
            expected_move: "e4".to_owned(),
            ..ReviewCard::default()
        }
    }

    fn answer(correct: bool, next: Option<ReviewCard>) -> ReviewAnswerResponse {
        ReviewAnswerResponse {
            correct,
            expected_move: "e4".to_owned(),
            is_session_complete: next.is_none(),
            next_card: next,
            ..ReviewAnswerResponse::default()
        }
    }

    #[test]
    fn no_cards_due() {
        let response = ReviewStartResponse {
            message: Some("No cards due for review".to_owned()),
            ..ReviewStartResponse::default()
        };
        assert!(ReviewSession::start(response).is_none());
    }

    #[test]
    fn feedback_is_capped() {
        let mut session = ReviewSession::start(ReviewStartResponse {
            session_id: Some("review_1".to_owned()),
            total_cards: 8,
            current_card: Some(card("c0")),
            ..ReviewStartResponse::default()
        })
        .unwrap();
        assert!(session.current_position().unwrap().is_ok());
        for i in 0..7 {
            let feedback = session.apply_answer(&format!("m{i}"), answer(i % 2 == 0, Some(card("c"))));
            assert_eq!(feedback.answer, format!("m{i}"));
        }
        let answers: Vec<_> = session.feedback().map(|f| f.answer.as_str()).collect();
        assert_eq!(answers, vec!["m2", "m3", "m4", "m5", "m6"]);
        assert_eq!((session.correct_count(), session.incorrect_count()), (4, 3));
    }

    #[test]
    fn server_score_wins_and_session_completes() {
        let mut session = ReviewSession::start(ReviewStartResponse {
            session_id: Some("review_1".to_owned()),
            total_cards: 1,
            current_card: Some(card("c0")),
            ..ReviewStartResponse::default()
        })
        .unwrap();
        session.apply_answer("d4", ReviewAnswerResponse {
            session_stats: ReviewSessionStats { correct: 0, incorrect: 1 },
            ..answer(false, None)
        });
        assert!(session.is_complete());
        assert_eq!(session.incorrect_count(), 1);
        assert!(session.current_card().is_none());
    }
}
