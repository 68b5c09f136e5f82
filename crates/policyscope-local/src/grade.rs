use regex::RegexBuilder;

/// Sentinel for "no grade found" — a normal outcome, distinct from failure.
pub const NO_GRADE: &str = "N/A";

/// Pattern cascade, most explicit first. The last rule is a loose heuristic
/// that can match an incidental letter near "grade"/"rating"; it is kept
/// as-is for parity with how analysts actually phrase verdicts.
const GRADE_PATTERNS: &[&str] = &[
    r"\*\*Privacy Protection Grade\*\*:\s*([A-F][+-]?)",
    r"Grade:\s*([A-F][+-]?)",
    r"Rating:\s*([A-F][+-]?)",
    r"\b([A-F][+-]?)\b.*(?:grade|rating)",
];

/// Recover a letter grade from free-form analysis text.
///
/// Case-insensitive; the matched token is upper-cased. Never fails: when no
/// rule matches, returns [`NO_GRADE`].
pub fn extract_grade(analysis: &str) -> String {
    for pat in GRADE_PATTERNS {
        let Ok(re) = RegexBuilder::new(pat).case_insensitive(true).build() else {
            continue;
        };
        if let Some(m) = re.captures(analysis).and_then(|c| c.get(1)) {
            return m.as_str().to_ascii_uppercase();
        }
    }
    NO_GRADE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_label_wins() {
        let text = "Summary...\n\n**Privacy Protection Grade**: B+\n\nDetails follow.";
        assert_eq!(extract_grade(text), "B+");
    }

    #[test]
    fn explicit_label_beats_generic_labels() {
        let text = "Grade: C\n**Privacy Protection Grade**: A-\nRating: D";
        assert_eq!(extract_grade(text), "A-");
    }

    #[test]
    fn generic_grade_and_rating_labels() {
        assert_eq!(extract_grade("Overall Grade: b-"), "B-");
        assert_eq!(extract_grade("Rating: C+ for transparency"), "C+");
    }

    #[test]
    fn matched_token_is_uppercased() {
        assert_eq!(extract_grade("**privacy protection grade**: f"), "F");
    }

    #[test]
    fn loose_rule_picks_letter_near_grade_word() {
        let text = "We assign D for this policy, a poor rating overall.";
        assert_eq!(extract_grade(text), "D");
    }

    #[test]
    fn loose_rule_false_positive_is_preserved_behavior() {
        // "A" as an article still matches when "grade" appears later.
        let text = "A privacy policy of this kind deserves a low grade.";
        assert_eq!(extract_grade(text), "A");
    }

    #[test]
    fn no_grade_like_token_yields_sentinel() {
        assert_eq!(extract_grade("The policy collects extensive data."), NO_GRADE);
        assert_eq!(extract_grade(""), NO_GRADE);
    }

    #[test]
    fn letters_outside_a_to_f_do_not_match() {
        assert_eq!(extract_grade("Grade: G"), NO_GRADE);
        assert_eq!(extract_grade("Grade: Z+"), NO_GRADE);
    }
}
