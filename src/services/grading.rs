//! Grade-band policy. The band table is the only place a percentage turns
//! into a letter grade.

const GRADE_BANDS: &[(f64, &str)] =
    &[(90.0, "A+"), (80.0, "A"), (70.0, "B"), (60.0, "C"), (50.0, "D")];

const FAILING_GRADE: &str = "F";

pub(crate) fn grade_for_percentage(percentage: f64) -> &'static str {
    for (threshold, grade) in GRADE_BANDS {
        if percentage >= *threshold {
            return grade;
        }
    }

    FAILING_GRADE
}

pub(crate) fn percentage(obtained_marks: f64, total_marks: f64) -> f64 {
    if total_marks <= 0.0 {
        return 0.0;
    }

    // Multiply first so integral mark values stay exact (55/100 -> 55.0).
    obtained_marks * 100.0 / total_marks
}

pub(crate) fn passed(obtained_marks: f64, passing_marks: f64) -> bool {
    obtained_marks >= passing_marks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries() {
        assert_eq!(grade_for_percentage(100.0), "A+");
        assert_eq!(grade_for_percentage(90.0), "A+");
        assert_eq!(grade_for_percentage(89.9), "A");
        assert_eq!(grade_for_percentage(80.0), "A");
        assert_eq!(grade_for_percentage(70.0), "B");
        assert_eq!(grade_for_percentage(60.0), "C");
        assert_eq!(grade_for_percentage(50.0), "D");
        assert_eq!(grade_for_percentage(49.9), "F");
        assert_eq!(grade_for_percentage(0.0), "F");
    }

    #[test]
    fn passing_at_threshold_with_d_grade() {
        // passing_marks=50, total=100, obtained=55
        let pct = percentage(55.0, 100.0);
        assert_eq!(pct, 55.0);
        assert_eq!(grade_for_percentage(pct), "D");
        assert!(passed(55.0, 50.0));
    }

    #[test]
    fn zero_total_marks_never_divides() {
        assert_eq!(percentage(10.0, 0.0), 0.0);
    }
}
