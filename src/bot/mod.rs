//! Chat-facing side of the quiz: turning messages into engine calls and
//! engine outcomes into replies. The per-platform modules only deal with
//! receiving and sending.

pub mod telegram;
pub mod vk;

use log::error;

use crate::quiz::{AnswerOutcome, QuizEngine, SurrenderOutcome};
use crate::store::UserIdentity;

pub const NEW_QUESTION_BUTTON: &str = "Новый вопрос";
pub const SURRENDER_BUTTON: &str = "Сдаться";

const GREETING: &str = "Привет! Я бот для викторин! Чтобы продолжить, нажми «Новый вопрос»";
const SUCCESS: &str = "Правильно! Поздравляю!\nДля следующего вопроса нажми «Новый вопрос»";
const FAIL: &str = "Неправильно... Попробуешь ещё раз?";
const NO_QUESTION: &str = "У вас нет текущих вопросов!\nЧтобы продолжить, нажми «Новый вопрос»";
const GOODBYE: &str = "Спасибо за участие в викторине!";
const STORE_FAILURE: &str = "Что-то пошло не так. Попробуй ещё раз чуть позже.";

fn surrender_text(answer: &str) -> String {
    format!("Вот тебе правильный ответ: {answer}\n\nЧтобы продолжить, нажми «Новый вопрос»")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    NewQuestion,
    Surrender,
    Answer(String),
}

impl Action {
    /// Commands and buttons are recognised with surrounding whitespace
    /// ignored; answers are passed on exactly as typed.
    pub fn classify(text: &str) -> Self {
        let command = text.trim();
        match command {
            "/start" => Action::Start,
            "/stop" => Action::Stop,
            _ if command.starts_with(NEW_QUESTION_BUTTON) => Action::NewQuestion,
            _ if command.starts_with(SURRENDER_BUTTON) => Action::Surrender,
            _ => Action::Answer(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Show the quiz buttons.
    Show,
    Remove,
    /// Leave whatever the user currently sees.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Runs `action` for `user` and builds the reply. Store failures are logged
/// and answered with a "try again" message, the user's session is left as
/// the store has it.
pub async fn respond(engine: &QuizEngine, user: &UserIdentity, action: Action) -> Reply {
    let result = match action {
        Action::Start => Ok(Reply::new(GREETING, Keyboard::Show)),
        Action::Stop => engine
            .reset(user)
            .await
            .map(|()| Reply::new(GOODBYE, Keyboard::Remove)),
        Action::NewQuestion => engine
            .start_new_question(user)
            .await
            .map(|question| Reply::new(question, Keyboard::Keep)),
        Action::Surrender => engine.surrender(user).await.map(|outcome| match outcome {
            SurrenderOutcome::Revealed { answer } => Reply::new(surrender_text(&answer), Keyboard::Keep),
            SurrenderOutcome::NoActiveQuestion => Reply::new(NO_QUESTION, Keyboard::Keep),
        }),
        Action::Answer(text) => engine
            .submit_answer(user, &text)
            .await
            .map(|outcome| match outcome {
                AnswerOutcome::Correct { .. } => Reply::new(SUCCESS, Keyboard::Keep),
                AnswerOutcome::Incorrect => Reply::new(FAIL, Keyboard::Keep),
                AnswerOutcome::NoActiveQuestion => Reply::new(NO_QUESTION, Keyboard::Keep),
            }),
    };

    result.unwrap_or_else(|err| {
        error!("Could not serve {}: {}", user, err);
        Reply::new(STORE_FAILURE, Keyboard::Keep)
    })
}
