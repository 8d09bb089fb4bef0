/// Decides whether `submission` answers a question whose canonical answer is
/// `canonical`.
///
/// Only the part of the submission before the first `.` or `(` is compared,
/// and it is accepted when it occurs anywhere in the canonical answer,
/// ignoring case. A short correct fragment is therefore enough.
pub fn is_correct(submission: &str, canonical: &str) -> bool {
    let candidate = truncate(submission);
    if candidate.trim().is_empty() {
        return canonical.is_empty();
    }
    canonical
        .to_lowercase()
        .contains(&candidate.to_lowercase())
}

/// Cuts the submission at the first period or opening parenthesis.
fn truncate(submission: &str) -> &str {
    match submission.find(['.', '(']) {
        Some(end) => &submission[..end],
        None => submission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example() {
        assert!(is_correct("four", "Four (4)."));
        assert!(!is_correct("five", "Four (4)."));
    }

    #[test]
    fn prefixes_of_the_answer_are_accepted() {
        let canonical = "Лев Николаевич Толстой";
        let chars: Vec<char> = canonical.chars().collect();
        for end in 1..=chars.len() {
            let prefix: String = chars[..end].iter().collect();
            if prefix.trim().is_empty() {
                continue;
            }
            assert!(is_correct(&prefix, canonical), "prefix {prefix:?}");
            assert!(is_correct(&prefix.to_uppercase(), canonical), "prefix {prefix:?}");
        }
    }

    #[test]
    fn trailing_content_after_delimiter_is_ignored() {
        for tail in [".", ". whatever", "(maybe)", ".(", "(.", ".Ложь"] {
            let submission = format!("Париж{tail}");
            assert_eq!(
                is_correct(&submission, "Париж."),
                is_correct("Париж", "Париж."),
                "tail {tail:?}"
            );
        }
        assert!(is_correct("Paris.", "Paris"));
        // The space before the parenthesis stays part of the candidate.
        assert!(!is_correct("Paris (France)", "Paris"));
        assert!(is_correct("Paris(France)", "Paris"));
    }

    #[test]
    fn earliest_delimiter_wins() {
        assert!(is_correct("Four (is it. sure)", "Four (4)."));
        assert!(!is_correct("Fiv.e (Four)", "Four (4)."));
    }

    #[test]
    fn matching_is_substring_not_exact() {
        assert!(is_correct("ариж", "Париж"));
        assert!(!is_correct("Париж Франция", "Париж"));
    }

    #[test]
    fn empty_submissions_are_incorrect() {
        assert!(!is_correct("", "Париж"));
        assert!(!is_correct("   ", "Париж"));
        assert!(!is_correct(".Париж", "Париж"));
        assert!(!is_correct("(Париж)", "Париж"));
        assert!(is_correct("", ""));
    }
}
