use std::sync::Arc;

use log::{debug, warn};

use crate::quiz::corpus::QuizCorpus;
use crate::quiz::grader;
use crate::store::{SessionStore, StoreError, UserIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The session has been cleared; `answer` is the full canonical answer.
    Correct { answer: String },
    /// The session is untouched, the user may try again.
    Incorrect,
    NoActiveQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurrenderOutcome {
    Revealed { answer: String },
    NoActiveQuestion,
}

/// Serves questions from one corpus and keeps each user's current question
/// in a [`SessionStore`].
///
/// `submit_answer` and `surrender` read the session and then clear it as two
/// separate store calls. Concurrent requests for the same user may therefore
/// observe a question that has just been replaced. Different users never
/// interfere with each other.
pub struct QuizEngine {
    corpus: Arc<QuizCorpus>,
    sessions: SessionStore,
}

impl QuizEngine {
    pub fn new(corpus: Arc<QuizCorpus>, sessions: SessionStore) -> Self {
        Self { corpus, sessions }
    }

    pub fn corpus(&self) -> &QuizCorpus {
        &self.corpus
    }

    /// Picks a random question and makes it the user's current one,
    /// replacing any unanswered question.
    pub async fn start_new_question(&self, user: &UserIdentity) -> Result<String, StoreError> {
        let question = self
            .corpus
            .random_question(&mut rand::thread_rng())
            .to_string();
        self.sessions.set_current_question(user, &question).await?;
        debug!("{} got a new question", user);
        Ok(question)
    }

    pub async fn submit_answer(
        &self,
        user: &UserIdentity,
        submission: &str,
    ) -> Result<AnswerOutcome, StoreError> {
        let Some((question, answer)) = self.active_question(user).await? else {
            return Ok(AnswerOutcome::NoActiveQuestion);
        };
        if !grader::is_correct(submission, &answer) {
            debug!("{} answered {:?} incorrectly", user, question);
            return Ok(AnswerOutcome::Incorrect);
        }
        self.sessions.clear(user).await?;
        debug!("{} answered {:?} correctly", user, question);
        Ok(AnswerOutcome::Correct { answer })
    }

    pub async fn surrender(&self, user: &UserIdentity) -> Result<SurrenderOutcome, StoreError> {
        let Some((_, answer)) = self.active_question(user).await? else {
            return Ok(SurrenderOutcome::NoActiveQuestion);
        };
        self.sessions.clear(user).await?;
        Ok(SurrenderOutcome::Revealed { answer })
    }

    /// Forgets the user's current question, if any.
    pub async fn reset(&self, user: &UserIdentity) -> Result<(), StoreError> {
        self.sessions.clear(user).await
    }

    /// The user's current question together with its answer. A stored
    /// question that is missing from the corpus is dropped.
    async fn active_question(
        &self,
        user: &UserIdentity,
    ) -> Result<Option<(String, String)>, StoreError> {
        let Some(question) = self.sessions.current_question(user).await? else {
            return Ok(None);
        };
        match self.corpus.answer_for(&question) {
            Some(answer) => Ok(Some((question, answer.to_string()))),
            None => {
                warn!(
                    "Session of {} refers to a question that is not in the quiz file, dropping it",
                    user
                );
                self.sessions.clear(user).await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine_with(raw: &str) -> (QuizEngine, SessionStore) {
        let corpus = Arc::new(QuizCorpus::parse(raw).unwrap());
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        (QuizEngine::new(corpus, sessions.clone()), sessions)
    }

    #[tokio::test]
    async fn stale_session_is_dropped() {
        let (engine, sessions) = engine_with("Вопрос 1:\nQ\n\nОтвет:\nA");
        let user = UserIdentity::new("telegram", 3);
        sessions
            .set_current_question(&user, "question from an older quiz file")
            .await
            .unwrap();

        assert_eq!(
            engine.submit_answer(&user, "A").await.unwrap(),
            AnswerOutcome::NoActiveQuestion
        );
        assert_eq!(sessions.current_question(&user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_question_always_comes_from_the_corpus() {
        let (engine, sessions) = engine_with("Вопрос 1:\nQ\n\nОтвет:\nA");
        let user = UserIdentity::new("telegram", 5);
        for _ in 0..5 {
            assert_eq!(engine.start_new_question(&user).await.unwrap(), "Q");
            assert_eq!(
                sessions.current_question(&user).await.unwrap().as_deref(),
                Some("Q")
            );
        }
    }

    #[tokio::test]
    async fn reset_clears_the_session() {
        let (engine, sessions) = engine_with("Вопрос 1:\nQ\n\nОтвет:\nA");
        let user = UserIdentity::new("vk", 8);
        engine.start_new_question(&user).await.unwrap();
        engine.reset(&user).await.unwrap();
        assert_eq!(sessions.current_question(&user).await.unwrap(), None);
        assert_eq!(
            engine.surrender(&user).await.unwrap(),
            SurrenderOutcome::NoActiveQuestion
        );
    }
}
