//! Score arithmetic shared by essay grading and mock-exam reports.

pub(crate) const COMPETENCY_MAX: i32 = 200;
pub(crate) const COMPETENCY_STEP: i32 = 20;
pub(crate) const COMPETENCY_COUNT: usize = 5;
pub(crate) const ESSAY_MAX: i32 = COMPETENCY_MAX * COMPETENCY_COUNT as i32;

pub(crate) const AREA_SCORE_MIN: i32 = 300;
pub(crate) const AREA_SCORE_MAX: i32 = 1000;

/// Rounds a raw rubric score to the nearest multiple of 20 inside `[0, 200]`.
/// Non-finite input scores zero.
pub(crate) fn clamp_competency(raw: f64) -> i32 {
    if !raw.is_finite() {
        return 0;
    }
    let step = f64::from(COMPETENCY_STEP);
    let snapped = (raw / step).round() * step;
    snapped.clamp(0.0, f64::from(COMPETENCY_MAX)) as i32
}

/// Sum of the clamped competencies. Anything past the fifth is ignored.
pub(crate) fn essay_total(competencies: &[i32]) -> i32 {
    competencies
        .iter()
        .take(COMPETENCY_COUNT)
        .map(|score| clamp_competency(f64::from(*score)))
        .sum()
}

/// `round(300 + 700 * correct / total)`. An empty area scores the minimum and
/// `correct` is capped at `total`.
pub(crate) fn area_score(correct: u32, total: u32) -> i32 {
    if total == 0 {
        return AREA_SCORE_MIN;
    }
    let correct = correct.min(total);
    let span = f64::from(AREA_SCORE_MAX - AREA_SCORE_MIN);
    (f64::from(AREA_SCORE_MIN) + span * f64::from(correct) / f64::from(total)).round() as i32
}

/// Rounded mean of area scores; the minimum when there are none.
pub(crate) fn overall_score(area_scores: &[i32]) -> i32 {
    if area_scores.is_empty() {
        return AREA_SCORE_MIN;
    }
    let sum: i64 = area_scores.iter().map(|score| i64::from(*score)).sum();
    (sum as f64 / area_scores.len() as f64).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_snaps_to_grid() {
        assert_eq!(clamp_competency(0.0), 0);
        assert_eq!(clamp_competency(9.9), 0);
        assert_eq!(clamp_competency(10.0), 20);
        assert_eq!(clamp_competency(129.0), 120);
        assert_eq!(clamp_competency(131.0), 140);
        assert_eq!(clamp_competency(200.0), 200);
    }

    #[test]
    fn clamp_bounds_out_of_range_and_garbage() {
        assert_eq!(clamp_competency(-45.0), 0);
        assert_eq!(clamp_competency(260.0), 200);
        assert_eq!(clamp_competency(f64::NAN), 0);
        assert_eq!(clamp_competency(f64::INFINITY), 0);
        assert_eq!(clamp_competency(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn clamp_is_idempotent_and_on_grid() {
        let mut raw = -100.0;
        while raw <= 300.0 {
            let once = clamp_competency(raw);
            assert!((0..=COMPETENCY_MAX).contains(&once), "{raw} -> {once}");
            assert_eq!(once % COMPETENCY_STEP, 0, "{raw} -> {once}");
            assert_eq!(clamp_competency(f64::from(once)), once);
            raw += 0.5;
        }
    }

    #[test]
    fn essay_total_sums_clamped_scores() {
        assert_eq!(essay_total(&[200, 200, 200, 200, 200]), ESSAY_MAX);
        assert_eq!(essay_total(&[0, 0, 0, 0, 0]), 0);
        assert_eq!(essay_total(&[130, 250, -20, 40, 90]), 140 + 200 + 0 + 40 + 100);
        assert_eq!(essay_total(&[200, 200, 200, 200, 200, 200]), ESSAY_MAX);
    }

    #[test]
    fn essay_total_stays_in_range() {
        for a in (-40..=240).step_by(37) {
            for b in (-40..=240).step_by(53) {
                let total = essay_total(&[a, b, a, b, a]);
                assert!((0..=ESSAY_MAX).contains(&total));
            }
        }
    }

    #[test]
    fn area_score_endpoints() {
        for total in 1..=45 {
            assert_eq!(area_score(0, total), AREA_SCORE_MIN);
            assert_eq!(area_score(total, total), AREA_SCORE_MAX);
        }
        assert_eq!(area_score(5, 10), 650);
        assert_eq!(area_score(1, 3), 533);
    }

    #[test]
    fn area_score_is_monotonic() {
        for total in 1..=45 {
            let mut previous = area_score(0, total);
            for correct in 1..=total {
                let current = area_score(correct, total);
                assert!(current >= previous, "{correct}/{total}");
                previous = current;
            }
        }
    }

    #[test]
    fn area_score_degenerate_inputs() {
        assert_eq!(area_score(0, 0), AREA_SCORE_MIN);
        assert_eq!(area_score(12, 10), AREA_SCORE_MAX);
    }

    #[test]
    fn overall_score_is_rounded_mean() {
        assert_eq!(overall_score(&[]), AREA_SCORE_MIN);
        assert_eq!(overall_score(&[650]), 650);
        assert_eq!(overall_score(&[300, 1000]), 650);
        assert_eq!(overall_score(&[533, 534]), 534);
    }
}
