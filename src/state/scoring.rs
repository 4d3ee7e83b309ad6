//! Pure scoring and statistics helpers shared by the orchestrator and results
//! assembly.

use crate::dao::models::{AnswerEntity, QuestionContent, TeamEntity};
use crate::dto::results::AnswerStatDto;
use crate::state::quiz::TeamRanking;

/// Convert an option index into its display letter (0 -> 'A', 1 -> 'B', ...).
pub fn option_letter(index: usize) -> char {
    (b'A' + (index as u8)) as char
}

/// Points earned for an answer given its correctness and elapsed seconds.
///
/// Correct answers start from `base` and lose `decay` points per elapsed
/// second, floored at zero. Incorrect answers always earn zero.
pub fn points_earned(is_correct: bool, elapsed_secs: u64, base: i64, decay: i64) -> i64 {
    if !is_correct {
        return 0;
    }
    (base - decay * elapsed_secs as i64).max(0)
}

/// Rank teams by descending score. Ties keep the incoming order, which is the
/// teams' creation order on the first computation and the previous ranking
/// afterwards.
pub fn rank_teams(teams: &[TeamEntity]) -> Vec<TeamRanking> {
    let mut ordered: Vec<&TeamEntity> = teams.iter().collect();
    ordered.sort_by(|a, b| b.score.cmp(&a.score));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, team)| TeamRanking {
            id: team.id,
            name: team.name.clone(),
            score: team.score,
            rank: index + 1,
        })
        .collect()
}

/// Per-option vote share for a question, rounded to the nearest percent.
/// All shares are zero when nobody answered.
pub fn answer_stats(content: &QuestionContent, answers: &[AnswerEntity]) -> Vec<AnswerStatDto> {
    content
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let letter = option_letter(index);
            let count = answers.iter().filter(|answer| answer.answer == letter).count();
            AnswerStatDto {
                letter,
                text: option.text.clone(),
                percentage: share_percent(count, answers.len()),
            }
        })
        .collect()
}

/// Share of correct answers, rounded to the nearest percent; zero when empty.
pub fn percent_correct(answers: &[AnswerEntity]) -> u32 {
    let correct = answers.iter().filter(|answer| answer.is_correct).count();
    share_percent(correct, answers.len())
}

/// Average seconds to answer, rounded to one decimal; zero when empty.
pub fn average_response_time(answers: &[AnswerEntity]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let total: u64 = answers.iter().map(|answer| answer.time_to_answer).sum();
    let average = total as f64 / answers.len() as f64;
    (average * 10.0).round() / 10.0
}

fn share_percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::dao::models::AnswerOption;

    fn answer(letter: char, is_correct: bool, elapsed: u64) -> AnswerEntity {
        AnswerEntity {
            id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            answer: letter,
            is_correct,
            time_to_answer: elapsed,
            points_earned: 0,
            created_at: SystemTime::now(),
        }
    }

    fn team(name: &str, score: i64) -> TeamEntity {
        TeamEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            session_id: "S1".to_string(),
            score,
            color: "team-color-1".to_string(),
        }
    }

    #[test]
    fn letters_follow_option_order() {
        assert_eq!(option_letter(0), 'A');
        assert_eq!(option_letter(1), 'B');
        assert_eq!(option_letter(3), 'D');
    }

    #[test]
    fn points_decay_linearly_and_floor_at_zero() {
        assert_eq!(points_earned(true, 0, 1000, 50), 1000);
        assert_eq!(points_earned(true, 10, 1000, 50), 500);
        assert_eq!(points_earned(true, 20, 1000, 50), 0);
        assert_eq!(points_earned(true, 25, 1000, 50), 0);
        assert_eq!(points_earned(false, 0, 1000, 50), 0);
        assert_eq!(points_earned(false, 5, 1000, 50), 0);
    }

    #[test]
    fn ranking_sorts_descending_with_stable_ties() {
        let teams = vec![team("Forêt", 100), team("Océan", 300), team("Montagne", 100)];
        let rankings = rank_teams(&teams);

        assert_eq!(rankings[0].name, "Océan");
        assert_eq!(rankings[0].rank, 1);
        // Tied teams keep their incoming order.
        assert_eq!(rankings[1].name, "Forêt");
        assert_eq!(rankings[1].rank, 2);
        assert_eq!(rankings[2].name, "Montagne");
        assert_eq!(rankings[2].rank, 3);
    }

    #[test]
    fn answer_stats_sum_to_roughly_one_hundred() {
        let content = QuestionContent {
            text: "Question ?".to_string(),
            image_url: None,
            options: vec![
                AnswerOption {
                    text: "A".to_string(),
                    is_correct: true,
                    explanation: None,
                },
                AnswerOption {
                    text: "B".to_string(),
                    is_correct: false,
                    explanation: None,
                },
                AnswerOption {
                    text: "C".to_string(),
                    is_correct: false,
                    explanation: None,
                },
            ],
        };
        let answers = vec![answer('A', true, 2), answer('A', true, 4), answer('B', false, 6)];
        let stats = answer_stats(&content, &answers);

        assert_eq!(stats[0].percentage, 67);
        assert_eq!(stats[1].percentage, 33);
        assert_eq!(stats[2].percentage, 0);
        let total: u32 = stats.iter().map(|stat| stat.percentage).sum();
        assert!((99..=101).contains(&total));
    }

    #[test]
    fn stats_are_all_zero_without_answers() {
        let content = QuestionContent {
            text: "Question ?".to_string(),
            image_url: None,
            options: vec![
                AnswerOption {
                    text: "A".to_string(),
                    is_correct: true,
                    explanation: None,
                },
                AnswerOption {
                    text: "B".to_string(),
                    is_correct: false,
                    explanation: None,
                },
            ],
        };
        let stats = answer_stats(&content, &[]);
        assert!(stats.iter().all(|stat| stat.percentage == 0));
        assert_eq!(percent_correct(&[]), 0);
        assert_eq!(average_response_time(&[]), 0.0);
    }

    #[test]
    fn average_response_time_rounds_to_one_decimal() {
        let answers = vec![answer('A', true, 2), answer('B', false, 5), answer('C', false, 6)];
        assert_eq!(average_response_time(&answers), 4.3);
    }
}
