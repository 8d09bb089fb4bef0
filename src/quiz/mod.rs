pub mod corpus;
pub mod engine;
pub mod grader;

pub use corpus::{CorpusError, ParseError, QuizCorpus, QuizEntry};
pub use engine::{AnswerOutcome, QuizEngine, SurrenderOutcome};
pub use grader::is_correct;
