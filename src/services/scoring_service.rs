use std::collections::HashMap;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::participant_answer::SectionType;
use crate::services::answer_key_service::KeyEntry;

pub const QUESTIONS_PER_SECTION: i32 = 40;
pub const TASK_1_MIN_WORDS: usize = 150;
pub const TASK_2_MIN_WORDS: usize = 250;

/// Raw-score ranges to band, shared by listening and reading.
const BAND_TABLE: [(i32, i32, f64); 16] = [
    (39, 40, 9.0),
    (37, 38, 8.5),
    (35, 36, 8.0),
    (33, 34, 7.5),
    (30, 32, 7.0),
    (27, 29, 6.5),
    (23, 26, 6.0),
    (19, 22, 5.5),
    (15, 18, 5.0),
    (13, 14, 4.5),
    (10, 12, 4.0),
    (7, 9, 3.5),
    (5, 6, 3.0),
    (3, 4, 2.5),
    (1, 2, 2.0),
    (0, 0, 0.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedAnswer {
    pub question_number: i32,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionScore {
    pub section: SectionType,
    pub raw_score: i32,
    pub band_score: f64,
    pub graded: Vec<GradedAnswer>,
}

impl SectionScore {
    pub fn band_decimal(&self) -> Decimal {
        band_to_decimal(self.band_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskWordCount {
    pub word_count: usize,
    pub meets_minimum: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritingScore {
    pub task_1: TaskWordCount,
    pub task_2: TaskWordCount,
    /// Always zero here; the band is entered by a reviewer.
    pub writing_band_score: f64,
    pub status: &'static str,
}

pub struct ScoringService;

impl ScoringService {
    /// Canonical form for answer comparison. Applying it twice changes nothing.
    pub fn normalize(answer: &str) -> String {
        let collapsed = answer
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        match collapsed.as_str() {
            "T" | "TRUE" => "T".to_string(),
            "F" | "FALSE" => "F".to_string(),
            "NG" | "NOT GIVEN" => "NG".to_string(),
            "Y" | "YES" => "Y".to_string(),
            "N" | "NO" => "N".to_string(),
            _ => collapsed,
        }
    }

    pub fn answers_match(submitted: &str, correct: &str) -> bool {
        let submitted = Self::normalize(submitted);
        !submitted.is_empty() && submitted == Self::normalize(correct)
    }

    pub fn calculate_band_score(raw_score: i32) -> f64 {
        BAND_TABLE
            .iter()
            .find(|(min, max, _)| raw_score >= *min && raw_score <= *max)
            .map(|(_, _, band)| *band)
            .unwrap_or(0.0)
    }

    /// Grades every question in the key; questions the participant skipped
    /// are recorded as incorrect with no answer.
    pub fn calculate_section_score(
        section: SectionType,
        key: &[KeyEntry],
        answers: &HashMap<i32, String>,
    ) -> SectionScore {
        let mut raw_score = 0;
        let mut graded = Vec::with_capacity(key.len());

        for item in key {
            let user_answer = answers
                .get(&item.question)
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
            let is_correct = user_answer
                .as_deref()
                .map(|a| Self::answers_match(a, &item.answer))
                .unwrap_or(false);
            if is_correct {
                raw_score += 1;
            }
            graded.push(GradedAnswer {
                question_number: item.question,
                user_answer,
                correct_answer: item.answer.clone(),
                is_correct,
            });
        }

        let raw_score = raw_score.min(QUESTIONS_PER_SECTION);
        tracing::debug!(
            section = section.as_str(),
            raw_score,
            "section graded"
        );

        SectionScore {
            section,
            raw_score,
            band_score: Self::calculate_band_score(raw_score),
            graded,
        }
    }

    pub fn process_writing_score(answers: &HashMap<i32, String>) -> WritingScore {
        let task = |number: i32, minimum: usize| {
            let word_count = answers.get(&number).map(|t| count_words(t)).unwrap_or(0);
            TaskWordCount {
                word_count,
                meets_minimum: word_count >= minimum,
            }
        };

        WritingScore {
            task_1: task(1, TASK_1_MIN_WORDS),
            task_2: task(2, TASK_2_MIN_WORDS),
            writing_band_score: 0.0,
            status: "pending_review",
        }
    }

    /// Mean of the four section bands rounded to the nearest half band,
    /// with quarter marks rounding up.
    pub fn overall_band(
        listening: Decimal,
        reading: Decimal,
        writing: Decimal,
        speaking: Decimal,
    ) -> Decimal {
        let total: f64 = [listening, reading, writing, speaking]
            .iter()
            .map(|d| d.to_f64().unwrap_or(0.0))
            .sum();
        let mean = total / 4.0;
        band_to_decimal((mean * 2.0).round() / 2.0)
    }

    /// Manually entered bands must sit on the 0-9 scale in half steps.
    pub fn is_valid_band(band: Decimal) -> bool {
        band >= Decimal::ZERO
            && band <= Decimal::new(9, 0)
            && (band * Decimal::new(2, 0)).fract().is_zero()
    }

    /// A writing band of 0 marks a pending review, so a reviewed band starts at 0.5.
    pub fn is_valid_writing_band(band: Decimal) -> bool {
        band > Decimal::ZERO && Self::is_valid_band(band)
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn band_to_decimal(band: f64) -> Decimal {
    Decimal::from_f64(band)
        .map(|d| d.round_dp(1))
        .unwrap_or_else(|| Decimal::new(0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(entries: &[(i32, &str)]) -> Vec<KeyEntry> {
        entries
            .iter()
            .map(|(q, a)| KeyEntry {
                question: *q,
                answer: a.to_string(),
            })
            .collect()
    }

    #[test]
    fn normalize_is_case_and_space_insensitive() {
        assert_eq!(ScoringService::normalize(" true "), "T");
        assert_eq!(ScoringService::normalize("T"), "T");
        assert_eq!(ScoringService::normalize("not   given"), "NG");
        assert_eq!(ScoringService::normalize("Yes"), "Y");
        assert_eq!(ScoringService::normalize(" no"), "N");
        assert_eq!(ScoringService::normalize("false"), "F");
        assert_eq!(ScoringService::normalize("  the  river bank "), "THE RIVER BANK");
        assert_eq!(ScoringService::normalize(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["  true", "Not Given", "a  b\tc", "ng", "Y", "river", "", "No  "] {
            let once = ScoringService::normalize(raw);
            assert_eq!(ScoringService::normalize(&once), once, "input {:?}", raw);
        }
    }

    #[test]
    fn band_table_boundaries() {
        assert_eq!(ScoringService::calculate_band_score(40), 9.0);
        assert_eq!(ScoringService::calculate_band_score(39), 9.0);
        assert_eq!(ScoringService::calculate_band_score(38), 8.5);
        assert_eq!(ScoringService::calculate_band_score(32), 7.0);
        assert_eq!(ScoringService::calculate_band_score(31), 7.0);
        assert_eq!(ScoringService::calculate_band_score(30), 7.0);
        assert_eq!(ScoringService::calculate_band_score(29), 6.5);
        assert_eq!(ScoringService::calculate_band_score(1), 2.0);
        assert_eq!(ScoringService::calculate_band_score(0), 0.0);
        assert_eq!(ScoringService::calculate_band_score(-3), 0.0);
    }

    #[test]
    fn band_table_covers_every_raw_score() {
        for raw in 0..=40 {
            assert!(BAND_TABLE
                .iter()
                .any(|(min, max, _)| raw >= *min && raw <= *max));
        }
    }

    #[test]
    fn abbreviations_match_full_forms() {
        let key = key(&[(1, "A"), (2, "T"), (3, "Not Given")]);
        let answers: HashMap<i32, String> = [
            (1, "A".to_string()),
            (2, "true".to_string()),
            (3, "NG".to_string()),
        ]
        .into_iter()
        .collect();

        let score = ScoringService::calculate_section_score(SectionType::Listening, &key, &answers);
        assert_eq!(score.raw_score, 3);
        assert!(score.graded.iter().all(|g| g.is_correct));
    }

    #[test]
    fn unanswered_questions_are_graded_incorrect() {
        let key = key(&[(1, "A"), (2, "B"), (3, "C")]);
        let answers: HashMap<i32, String> =
            [(1, "a".to_string()), (3, "  ".to_string())].into_iter().collect();

        let score = ScoringService::calculate_section_score(SectionType::Reading, &key, &answers);
        assert_eq!(score.raw_score, 1);
        assert_eq!(score.graded.len(), 3);
        assert_eq!(score.graded[1].user_answer, None);
        assert_eq!(score.graded[2].user_answer, None);
        assert!(!score.graded[2].is_correct);
        assert_eq!(score.band_score, 2.0);
    }

    #[test]
    fn regrading_is_stable() {
        let key = key(&[(1, "London"), (2, "F")]);
        let answers: HashMap<i32, String> =
            [(1, "london".to_string()), (2, "False".to_string())].into_iter().collect();

        let first = ScoringService::calculate_section_score(SectionType::Listening, &key, &answers);
        let second = ScoringService::calculate_section_score(SectionType::Listening, &key, &answers);
        assert_eq!(first, second);
    }

    #[test]
    fn writing_word_counts_and_minimums() {
        let task_1 = vec!["word"; 150].join(" ");
        let task_2 = vec!["word"; 249].join("  ");
        let answers: HashMap<i32, String> = [(1, task_1), (2, task_2)].into_iter().collect();

        let score = ScoringService::process_writing_score(&answers);
        assert_eq!(score.task_1.word_count, 150);
        assert!(score.task_1.meets_minimum);
        assert_eq!(score.task_2.word_count, 249);
        assert!(!score.task_2.meets_minimum);
        assert_eq!(score.writing_band_score, 0.0);
    }

    #[test]
    fn writing_with_missing_task() {
        let answers: HashMap<i32, String> = [(2, "short essay".to_string())].into_iter().collect();
        let score = ScoringService::process_writing_score(&answers);
        assert_eq!(score.task_1.word_count, 0);
        assert!(!score.task_1.meets_minimum);
        assert_eq!(score.task_2.word_count, 2);
    }

    #[test]
    fn overall_band_rounds_to_half_bands() {
        let d = |v: f64| band_to_decimal(v);
        assert_eq!(ScoringService::overall_band(d(6.5), d(6.5), d(5.0), d(7.0)), d(6.5));
        assert_eq!(ScoringService::overall_band(d(4.0), d(3.5), d(4.0), d(4.0)), d(4.0));
        assert_eq!(ScoringService::overall_band(d(6.5), d(6.5), d(6.0), d(6.0)), d(6.5));
        assert_eq!(ScoringService::overall_band(d(7.0), d(7.0), d(7.5), d(7.5)), d(7.5));
        assert_eq!(ScoringService::overall_band(d(9.0), d(9.0), d(9.0), d(9.0)), d(9.0));
    }

    #[test]
    fn band_validation() {
        assert!(ScoringService::is_valid_band(Decimal::new(65, 1)));
        assert!(ScoringService::is_valid_band(Decimal::ZERO));
        assert!(ScoringService::is_valid_band(Decimal::new(9, 0)));
        assert!(!ScoringService::is_valid_band(Decimal::new(62, 1)));
        assert!(!ScoringService::is_valid_band(Decimal::new(95, 1)));
        assert!(!ScoringService::is_valid_band(Decimal::new(-5, 1)));
    }

    #[test]
    fn writing_band_excludes_pending_marker() {
        assert!(!ScoringService::is_valid_writing_band(Decimal::ZERO));
        assert!(ScoringService::is_valid_writing_band(Decimal::new(5, 1)));
        assert!(ScoringService::is_valid_writing_band(Decimal::new(9, 0)));
        assert!(!ScoringService::is_valid_writing_band(Decimal::new(63, 1)));
    }
}
