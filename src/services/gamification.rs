//! XP, levels, daily streaks and badges.
//!
//! Every completed activity flows through [`apply_activity`], which mutates the
//! user's stats row in memory; callers persist it inside the transaction that
//! locked the row.

use time::Date;

use crate::db::models::UserStats;

pub(crate) const XP_PER_LEVEL: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActivityKind {
    Essay,
    MockExam,
    StudyActivity,
    MentorSession,
}

impl ActivityKind {
    pub(crate) fn base_xp(self) -> i64 {
        match self {
            ActivityKind::Essay => 100,
            ActivityKind::MockExam => 150,
            ActivityKind::StudyActivity => 50,
            ActivityKind::MentorSession => 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ActivityEvent {
    pub(crate) kind: ActivityKind,
    pub(crate) minutes: u32,
    /// Score on the 0..1000 scale that should move the running average.
    pub(crate) score: Option<i32>,
    /// `(completed, total)` of the current study plan after this event.
    pub(crate) plan_progress: Option<(u32, u32)>,
}

impl ActivityEvent {
    pub(crate) fn new(kind: ActivityKind, minutes: u32) -> Self {
        Self { kind, minutes, score: None, plan_progress: None }
    }

    pub(crate) fn with_score(mut self, score: i32) -> Self {
        self.score = Some(score);
        self
    }

    pub(crate) fn with_plan_progress(mut self, completed: u32, total: u32) -> Self {
        self.plan_progress = Some((completed, total));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActivityOutcome {
    pub(crate) xp_gained: i64,
    pub(crate) xp_total: i64,
    pub(crate) level: i32,
    pub(crate) leveled_up: bool,
    pub(crate) streak_days: i32,
    pub(crate) new_badges: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Badge {
    FirstEssay,
    Essay900,
    FirstMockExam,
    MockExamVeteran,
    Streak7,
    Streak30,
    Level5,
    Level10,
    PlanFinisher,
}

impl Badge {
    pub(crate) const ALL: [Badge; 9] = [
        Badge::FirstEssay,
        Badge::Essay900,
        Badge::FirstMockExam,
        Badge::MockExamVeteran,
        Badge::Streak7,
        Badge::Streak30,
        Badge::Level5,
        Badge::Level10,
        Badge::PlanFinisher,
    ];

    pub(crate) fn code(self) -> &'static str {
        match self {
            Badge::FirstEssay => "first_essay",
            Badge::Essay900 => "essay_900",
            Badge::FirstMockExam => "first_mock_exam",
            Badge::MockExamVeteran => "mock_exam_veteran",
            Badge::Streak7 => "streak_7",
            Badge::Streak30 => "streak_30",
            Badge::Level5 => "level_5",
            Badge::Level10 => "level_10",
            Badge::PlanFinisher => "plan_finisher",
        }
    }

    pub(crate) fn title(self) -> &'static str {
        match self {
            Badge::FirstEssay => "Primeira redação",
            Badge::Essay900 => "Redação nota 900+",
            Badge::FirstMockExam => "Primeiro simulado",
            Badge::MockExamVeteran => "Dez simulados",
            Badge::Streak7 => "Sete dias seguidos",
            Badge::Streak30 => "Trinta dias seguidos",
            Badge::Level5 => "Nível 5",
            Badge::Level10 => "Nível 10",
            Badge::PlanFinisher => "Plano concluído",
        }
    }

    pub(crate) fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|badge| badge.code() == code)
    }

    fn earned(self, stats: &UserStats, event: &ActivityEvent) -> bool {
        match self {
            Badge::FirstEssay => stats.essays_completed >= 1,
            Badge::Essay900 => {
                event.kind == ActivityKind::Essay && event.score.is_some_and(|score| score >= 900)
            }
            Badge::FirstMockExam => stats.exams_completed >= 1,
            Badge::MockExamVeteran => stats.exams_completed >= 10,
            Badge::Streak7 => stats.streak_days >= 7,
            Badge::Streak30 => stats.streak_days >= 30,
            Badge::Level5 => stats.level >= 5,
            Badge::Level10 => stats.level >= 10,
            Badge::PlanFinisher => stats.completion_percent >= 100.0,
        }
    }
}

/// `floor(xp / 500) + 1`; negative XP counts as zero.
pub(crate) fn level_for_xp(xp: i64) -> i32 {
    let level = xp.max(0) / XP_PER_LEVEL + 1;
    i32::try_from(level).unwrap_or(i32::MAX)
}

pub(crate) fn xp_to_next_level(xp: i64) -> i64 {
    i64::from(level_for_xp(xp)) * XP_PER_LEVEL - xp.max(0)
}

/// Step function of time on task.
pub(crate) fn time_multiplier(minutes: u32) -> f64 {
    match minutes {
        0..=14 => 1.0,
        15..=29 => 1.25,
        30..=59 => 1.5,
        _ => 2.0,
    }
}

pub(crate) fn xp_for(kind: ActivityKind, minutes: u32) -> i64 {
    (kind.base_xp() as f64 * time_multiplier(minutes)).round() as i64
}

/// Next streak value when the user studies on `today`.
pub(crate) fn next_streak(current: i32, last_study: Option<Date>, today: Date) -> i32 {
    match last_study {
        Some(last) if last >= today => current.max(1),
        Some(last) if last.next_day() == Some(today) => current.saturating_add(1),
        _ => 1,
    }
}

/// Running mean after adding `score` to `count` previous scores.
pub(crate) fn next_average(average: f64, count: i32, score: i32) -> f64 {
    let count = f64::from(count.max(0));
    (average * count + f64::from(score)) / (count + 1.0)
}

/// Percentage with one decimal place.
pub(crate) fn completion_percent(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = f64::from(completed.min(total)) / f64::from(total);
    (ratio * 1000.0).round() / 10.0
}

pub(crate) fn apply_activity(
    stats: &mut UserStats,
    event: &ActivityEvent,
    today: Date,
) -> ActivityOutcome {
    match event.kind {
        ActivityKind::Essay => stats.essays_completed += 1,
        ActivityKind::MockExam => stats.exams_completed += 1,
        ActivityKind::StudyActivity | ActivityKind::MentorSession => {}
    }

    if let Some(score) = event.score {
        stats.average_score = next_average(stats.average_score, stats.scored_count, score);
        stats.scored_count += 1;
    }

    if let Some((completed, total)) = event.plan_progress {
        stats.completion_percent = completion_percent(completed, total);
    }

    stats.study_minutes += i64::from(event.minutes);
    stats.streak_days = next_streak(stats.streak_days, stats.last_study_date, today);
    if stats.last_study_date.map_or(true, |last| last < today) {
        stats.last_study_date = Some(today);
    }

    let previous_level = stats.level;
    let xp_gained = xp_for(event.kind, event.minutes);
    stats.xp += xp_gained;
    stats.level = level_for_xp(stats.xp);

    let mut new_badges = Vec::new();
    for badge in Badge::ALL {
        let code = badge.code();
        if stats.badges.0.iter().any(|owned| owned == code) {
            continue;
        }
        if badge.earned(stats, event) {
            stats.badges.0.push(code.to_string());
            new_badges.push(code.to_string());
        }
    }

    ActivityOutcome {
        xp_gained,
        xp_total: stats.xp,
        level: stats.level,
        leveled_up: stats.level > previous_level,
        streak_days: stats.streak_days,
        new_badges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use sqlx::types::Json;
    use time::macros::date;

    fn empty_stats() -> UserStats {
        UserStats {
            user_id: "user-1".to_string(),
            average_score: 0.0,
            scored_count: 0,
            essays_completed: 0,
            exams_completed: 0,
            study_minutes: 0,
            streak_days: 0,
            last_study_date: None,
            xp: 0,
            level: 1,
            completion_percent: 0.0,
            badges: Json(Vec::new()),
            updated_at: primitive_now_utc(),
        }
    }

    #[test]
    fn level_formula() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(499), 1);
        assert_eq!(level_for_xp(500), 2);
        assert_eq!(level_for_xp(2_499), 5);
        assert_eq!(level_for_xp(-300), 1);
    }

    #[test]
    fn level_is_monotonic_and_at_least_one() {
        let mut previous = level_for_xp(-1_000);
        for xp in (-1_000..20_000).step_by(7) {
            let level = level_for_xp(xp);
            assert!(level >= 1);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn xp_to_next_level_counts_down() {
        assert_eq!(xp_to_next_level(0), 500);
        assert_eq!(xp_to_next_level(480), 20);
        assert_eq!(xp_to_next_level(500), 500);
    }

    #[test]
    fn multiplier_steps() {
        assert_eq!(time_multiplier(0), 1.0);
        assert_eq!(time_multiplier(14), 1.0);
        assert_eq!(time_multiplier(15), 1.25);
        assert_eq!(time_multiplier(30), 1.5);
        assert_eq!(time_multiplier(59), 1.5);
        assert_eq!(time_multiplier(60), 2.0);
        assert_eq!(time_multiplier(600), 2.0);
    }

    #[test]
    fn xp_is_base_times_multiplier() {
        assert_eq!(xp_for(ActivityKind::Essay, 10), 100);
        assert_eq!(xp_for(ActivityKind::Essay, 45), 150);
        assert_eq!(xp_for(ActivityKind::MockExam, 90), 300);
        assert_eq!(xp_for(ActivityKind::StudyActivity, 20), 63);
        assert_eq!(xp_for(ActivityKind::MentorSession, 0), 10);
    }

    #[test]
    fn streak_increments_on_consecutive_days() {
        let today = date!(2025 - 03 - 10);
        assert_eq!(next_streak(4, Some(date!(2025 - 03 - 09)), today), 5);
        assert_eq!(next_streak(0, Some(date!(2025 - 03 - 09)), today), 1);
    }

    #[test]
    fn streak_resets_after_gap() {
        let today = date!(2025 - 03 - 10);
        assert_eq!(next_streak(9, Some(date!(2025 - 03 - 08)), today), 1);
        assert_eq!(next_streak(9, Some(date!(2024 - 12 - 31)), today), 1);
        assert_eq!(next_streak(9, None, today), 1);
    }

    #[test]
    fn streak_same_day_is_unchanged() {
        let today = date!(2025 - 03 - 10);
        assert_eq!(next_streak(3, Some(today), today), 3);
        assert_eq!(next_streak(0, Some(today), today), 1);
    }

    #[test]
    fn streak_crosses_month_and_year() {
        assert_eq!(next_streak(2, Some(date!(2024 - 12 - 31)), date!(2025 - 01 - 01)), 3);
        assert_eq!(next_streak(2, Some(date!(2024 - 02 - 29)), date!(2024 - 03 - 01)), 3);
    }

    #[test]
    fn average_is_running_mean() {
        let avg = next_average(0.0, 0, 800);
        assert_eq!(avg, 800.0);
        let avg = next_average(avg, 1, 600);
        assert_eq!(avg, 700.0);
        let avg = next_average(avg, 2, 1000);
        assert_eq!(avg, 800.0);
    }

    #[test]
    fn completion_percent_rounds_to_one_decimal() {
        assert_eq!(completion_percent(0, 0), 0.0);
        assert_eq!(completion_percent(1, 3), 33.3);
        assert_eq!(completion_percent(2, 3), 66.7);
        assert_eq!(completion_percent(5, 5), 100.0);
        assert_eq!(completion_percent(9, 5), 100.0);
    }

    #[test]
    fn first_essay_updates_everything() {
        let mut stats = empty_stats();
        let event = ActivityEvent::new(ActivityKind::Essay, 50).with_score(920);
        let outcome = apply_activity(&mut stats, &event, date!(2025 - 03 - 10));

        assert_eq!(outcome.xp_gained, 150);
        assert_eq!(stats.xp, 150);
        assert_eq!(stats.level, 1);
        assert!(!outcome.leveled_up);
        assert_eq!(stats.essays_completed, 1);
        assert_eq!(stats.scored_count, 1);
        assert_eq!(stats.average_score, 920.0);
        assert_eq!(stats.study_minutes, 50);
        assert_eq!(stats.streak_days, 1);
        assert_eq!(stats.last_study_date, Some(date!(2025 - 03 - 10)));
        assert_eq!(outcome.new_badges, vec!["first_essay".to_string(), "essay_900".to_string()]);
    }

    #[test]
    fn unscored_event_keeps_average() {
        let mut stats = empty_stats();
        stats.average_score = 640.0;
        stats.scored_count = 2;
        let event = ActivityEvent::new(ActivityKind::Essay, 10);
        apply_activity(&mut stats, &event, date!(2025 - 03 - 10));
        assert_eq!(stats.average_score, 640.0);
        assert_eq!(stats.scored_count, 2);
        assert_eq!(stats.essays_completed, 1);
    }

    #[test]
    fn badges_are_awarded_once() {
        let mut stats = empty_stats();
        let event = ActivityEvent::new(ActivityKind::MockExam, 0).with_score(700);
        let first = apply_activity(&mut stats, &event, date!(2025 - 03 - 10));
        let second = apply_activity(&mut stats, &event, date!(2025 - 03 - 10));

        assert_eq!(first.new_badges, vec!["first_mock_exam".to_string()]);
        assert!(second.new_badges.is_empty());
        assert_eq!(stats.badges.0, vec!["first_mock_exam".to_string()]);
    }

    #[test]
    fn consecutive_days_build_streak_badge() {
        let mut stats = empty_stats();
        let mut day = date!(2025 - 03 - 01);
        let mut awarded = Vec::new();
        for _ in 0..7 {
            let outcome = apply_activity(
                &mut stats,
                &ActivityEvent::new(ActivityKind::MentorSession, 5),
                day,
            );
            awarded.extend(outcome.new_badges);
            day = day.next_day().unwrap();
        }
        assert_eq!(stats.streak_days, 7);
        assert_eq!(awarded, vec!["streak_7".to_string()]);
    }

    #[test]
    fn level_up_is_reported() {
        let mut stats = empty_stats();
        stats.xp = 450;
        let outcome = apply_activity(
            &mut stats,
            &ActivityEvent::new(ActivityKind::StudyActivity, 60),
            date!(2025 - 03 - 10),
        );
        assert_eq!(outcome.xp_gained, 100);
        assert_eq!(outcome.level, 2);
        assert!(outcome.leveled_up);
    }

    #[test]
    fn plan_progress_sets_completion_and_finisher_badge() {
        let mut stats = empty_stats();
        let event = ActivityEvent::new(ActivityKind::StudyActivity, 30).with_plan_progress(4, 4);
        let outcome = apply_activity(&mut stats, &event, date!(2025 - 03 - 10));
        assert_eq!(stats.completion_percent, 100.0);
        assert!(outcome.new_badges.contains(&"plan_finisher".to_string()));
    }

    #[test]
    fn badge_codes_roundtrip() {
        for badge in Badge::ALL {
            assert_eq!(Badge::from_code(badge.code()), Some(badge));
        }
        assert_eq!(Badge::from_code("unknown"), None);
    }
}
