use std::collections::HashMap;
use std::fs;
use std::path::Path;

use encoding_rs::Encoding;
use log::debug;
use rand::Rng;

const QUESTION_WORD: &str = "Вопрос";
const ANSWER_MARKER: &str = "Ответ:";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no question/answer pairs found in the quiz text")]
    NoQuestions,
    #[error("question {question:?} is the last record, its answer is missing")]
    MissingAnswer { question: String },
    #[error("question {question:?} is followed by a record without an answer marker: {record:?}")]
    UnexpectedRecord { question: String, record: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read quiz file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown quiz file encoding {0:?}")]
    UnknownEncoding(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizEntry {
    pub question: String,
    pub answer: String,
}

/// Question bank loaded from a quiz file.
///
/// Entries keep the order in which questions first appear in the file. A
/// question that shows up twice keeps its first position and takes the
/// later answer. A successfully parsed corpus is never empty.
#[derive(Debug, Clone)]
pub struct QuizCorpus {
    entries: Vec<QuizEntry>,
    index: HashMap<String, usize>,
}

impl QuizCorpus {
    /// Reads `path`, decodes it with the encoding named by `encoding`
    /// (any WHATWG label, e.g. `koi8-r` or `utf-8`) and parses it.
    pub fn load(path: impl AsRef<Path>, encoding: &str) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let encoding = Encoding::for_label(encoding.trim().as_bytes())
            .ok_or_else(|| CorpusError::UnknownEncoding(encoding.to_string()))?;
        let bytes = fs::read(path).map_err(|source| CorpusError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let (text, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            debug!(
                "{} contains bytes that are invalid in {}, replaced them",
                path.display(),
                encoding.name()
            );
        }
        Ok(Self::parse(&text)?)
    }

    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.replace("\r\n", "\n");
        let records: Vec<&str> = raw.split("\n\n").collect();

        let mut corpus = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        let mut records = records.into_iter();
        while let Some(record) = records.next() {
            if !record.contains(QUESTION_WORD) {
                continue;
            }
            let Some(question) = question_body(record) else {
                debug!("Skipping record without a question number: {:?}", record);
                continue;
            };
            let Some(next) = records.next() else {
                return Err(ParseError::MissingAnswer { question });
            };
            let Some(answer) = answer_body(next) else {
                return Err(ParseError::UnexpectedRecord {
                    question,
                    record: next.to_string(),
                });
            };
            corpus.insert(question, answer);
        }

        if corpus.is_empty() {
            return Err(ParseError::NoQuestions);
        }
        Ok(corpus)
    }

    fn insert(&mut self, question: String, answer: String) {
        match self.index.get(&question) {
            Some(&position) => self.entries[position].answer = answer,
            None => {
                self.index.insert(question.clone(), self.entries.len());
                self.entries.push(QuizEntry { question, answer });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn answer_for(&self, question: &str) -> Option<&str> {
        self.index
            .get(question)
            .map(|&position| self.entries[position].answer.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuizEntry> {
        self.entries.iter()
    }

    /// Picks a question uniformly at random. `parse` is the only way to
    /// build a corpus and it rejects empty ones, so there is always one.
    pub fn random_question<R: Rng>(&self, rng: &mut R) -> &str {
        let position = rng.gen_range(0..self.entries.len());
        self.entries[position].question.as_str()
    }
}

/// Text after the first `Вопрос <digits>:` in the record.
fn question_body(record: &str) -> Option<String> {
    let flat = flatten(record);
    let mut search_from = 0;
    while let Some(found) = flat[search_from..].find(QUESTION_WORD) {
        let start = search_from + found;
        let after_word = start + QUESTION_WORD.len();
        if let Some(body_start) = number_and_colon(&flat[after_word..]) {
            return Some(clean(&flat[after_word + body_start..]));
        }
        search_from = after_word;
    }
    None
}

/// Matches `" <digits>:"` at the start of `rest` and returns the byte
/// length of the match.
fn number_and_colon(rest: &str) -> Option<usize> {
    let digits = rest.strip_prefix(' ')?;
    let count = digits.bytes().take_while(u8::is_ascii_digit).count();
    if count == 0 {
        return None;
    }
    digits[count..].strip_prefix(':')?;
    Some(1 + count + 1)
}

fn answer_body(record: &str) -> Option<String> {
    let flat = flatten(record);
    let start = flat.find(ANSWER_MARKER)?;
    Some(clean(&flat[start + ANSWER_MARKER.len()..]))
}

fn flatten(record: &str) -> String {
    record.replace('\n', " ")
}

fn clean(body: &str) -> String {
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    const SAMPLE: &str = "Чемпионат Петербурга.\nТур 1.\n\n\
Вопрос 1:\nСтолица\nФранции?\n\n\
Ответ:\nПариж.\n\n\
Источник:\nучебник географии.\n\n\
Вопрос 2:\nWhat is 2+2?\n\n\
Ответ:\nFour (4).\n\n\
Автор:\nкто-то\n";

    #[test]
    fn parses_the_worked_example() {
        let corpus = QuizCorpus::parse("Вопрос 1:\nWhat is 2+2?\n\nОтвет:\nFour (4).").unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.answer_for("What is 2+2?"), Some("Four (4)."));
    }

    #[test]
    fn one_entry_per_question_marker() {
        let corpus = QuizCorpus::parse(SAMPLE).unwrap();
        assert_eq!(corpus.len(), SAMPLE.matches("Вопрос ").count());
        let entries: Vec<_> = corpus.iter().collect();
        assert_eq!(entries[0].question, "Столица Франции?");
        assert_eq!(entries[0].answer, "Париж.");
        assert_eq!(entries[1].question, "What is 2+2?");
        assert_eq!(entries[1].answer, "Four (4).");
    }

    #[test]
    fn text_before_the_marker_is_dropped() {
        let corpus =
            QuizCorpus::parse("Тур 3.\nВопрос 12:\nКто написал\n\"Войну и мир\"?\n\nОтвет:\nТолстой.")
                .unwrap();
        assert_eq!(
            corpus.answer_for("Кто написал \"Войну и мир\"?"),
            Some("Толстой.")
        );
    }

    #[test]
    fn windows_line_endings_are_accepted() {
        let corpus = QuizCorpus::parse("Вопрос 1:\r\nQ?\r\n\r\nОтвет:\r\nA.\r\n").unwrap();
        assert_eq!(corpus.answer_for("Q?"), Some("A."));
    }

    #[test]
    fn duplicate_question_keeps_position_and_takes_later_answer() {
        let raw = "Вопрос 1:\nQ1\n\nОтвет:\nold\n\n\
Вопрос 2:\nQ2\n\nОтвет:\ntwo\n\n\
Вопрос 3:\nQ1\n\nОтвет:\nnew";
        let corpus = QuizCorpus::parse(raw).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.answer_for("Q1"), Some("new"));
        assert_eq!(corpus.iter().next().unwrap().question, "Q1");
    }

    #[test]
    fn empty_text_has_no_questions() {
        assert_eq!(QuizCorpus::parse("").unwrap_err(), ParseError::NoQuestions);
        assert_eq!(
            QuizCorpus::parse("Просто текст.\n\nЕщё текст.").unwrap_err(),
            ParseError::NoQuestions
        );
    }

    #[test]
    fn trailing_question_is_an_error() {
        let err = QuizCorpus::parse("Вопрос 1:\nQ1\n\nОтвет:\nA1\n\nВопрос 2:\nQ2").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingAnswer {
                question: "Q2".to_string()
            }
        );
    }

    #[test]
    fn question_followed_by_non_answer_is_an_error() {
        let err = QuizCorpus::parse("Вопрос 1:\nQ1\n\nКомментарий:\nнет").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedRecord { ref question, .. } if question == "Q1"));
    }

    #[test]
    fn word_without_number_is_not_a_question_start() {
        let raw = "Вопрос 1:\nQ1\n\nОтвет:\nA1\n\nВопрос был снят с зачёта.";
        let corpus = QuizCorpus::parse(raw).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn random_question_comes_from_the_corpus() {
        let corpus = QuizCorpus::parse(SAMPLE).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let question = corpus.random_question(&mut rng);
            assert!(corpus.answer_for(question).is_some());
        }
    }

    #[test]
    fn loads_koi8_r_file() {
        let (bytes, _, _) = encoding_rs::KOI8_R.encode("Вопрос 1:\nСтолица Франции?\n\nОтвет:\nПариж.");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let corpus = QuizCorpus::load(file.path(), "koi8-r").unwrap();
        assert_eq!(corpus.answer_for("Столица Франции?"), Some("Париж."));
    }

    #[test]
    fn load_reports_unknown_encoding_and_missing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            QuizCorpus::load(file.path(), "klingon"),
            Err(CorpusError::UnknownEncoding(_))
        ));
        assert!(matches!(
            QuizCorpus::load("/definitely/not/here.txt", "utf-8"),
            Err(CorpusError::Io { .. })
        ));
    }
}
