use serde::{Deserialize, Serialize};

use super::engine::{validate, ValidationPolicy, ValidationReport};
use crate::models::Part;

/// Points taken off the accuracy score per error.
pub const ERROR_PENALTY: f32 = 15.0;

/// Points taken off the accuracy score per warning.
pub const WARNING_PENALTY: f32 = 5.0;

/// Accuracy score in [0, 100]: mean field confidence scaled to 100, minus
/// fixed penalties per finding.
pub fn accuracy_score(report: &ValidationReport) -> f32 {
    let base = report.field_confidence.mean() * 100.0;
    let penalty = report.errors.len() as f32 * ERROR_PENALTY + report.warnings.len() as f32 * WARNING_PENALTY;
    let score = base - penalty;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Reports needing human attention, least trustworthy first.
pub fn review_queue(reports: &[ValidationReport], threshold: f32) -> Vec<&ValidationReport> {
    let mut queue: Vec<&ValidationReport> = reports.iter().filter(|r| r.needs_review(threshold)).collect();
    queue.sort_by(|a, b| a.confidence().total_cmp(&b.confidence()));
    queue
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchValidation {
    pub reports: Vec<ValidationReport>,
    pub valid_count: usize,
    pub needs_review_count: usize,
}

/// Validate a batch under one policy. Review uses the policy's threshold.
pub fn validate_batch(parts: &[Part], policy: &ValidationPolicy) -> BatchValidation {
    let reports: Vec<ValidationReport> = parts.iter().map(|p| validate(p, policy)).collect();
    let valid_count = reports.iter().filter(|r| r.is_valid).count();
    let needs_review_count = reports
        .iter()
        .filter(|r| r.needs_review(policy.review_threshold))
        .count();

    tracing::info!(
        parts = parts.len(),
        valid = valid_count,
        needs_review = needs_review_count,
        "Batch validated"
    );

    BatchValidation {
        reports,
        valid_count,
        needs_review_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMethod;

    fn part(l: f64, w: f64, confidence: f32) -> Part {
        let mut part = Part::new(l, w, SourceMethod::Tabular);
        part.material_id = "PLY".into();
        part.set_confidence(confidence);
        part
    }

    #[test]
    fn clean_part_scores_full_marks() {
        let report = validate(&part(720.0, 560.0, 1.0), &ValidationPolicy::default());
        assert_eq!(accuracy_score(&report), 100.0);
    }

    #[test]
    fn findings_lower_the_score() {
        let report = validate(&part(5000.0, 560.0, 1.0), &ValidationPolicy::default());
        let score = accuracy_score(&report);
        assert!(score < 85.0, "Expected < 85, got {score}");

        let broken = validate(&part(0.0, 0.0, 1.0), &ValidationPolicy::default());
        let score = accuracy_score(&broken);
        assert!((0.0..=100.0).contains(&score), "Expected within 0..=100, got {score}");
        assert!(score < 60.0, "Expected < 60, got {score}");
    }

    #[test]
    fn queue_is_ascending_and_skips_trusted() {
        let policy = ValidationPolicy::default();
        let reports: Vec<ValidationReport> = [0.9, 0.4, 0.7, 1.0]
            .into_iter()
            .map(|c| validate(&part(720.0, 560.0, c), &policy))
            .collect();
        let queue = review_queue(&reports, policy.review_threshold);
        let confidences: Vec<f32> = queue.iter().map(|r| r.confidence()).collect();
        assert_eq!(confidences.len(), 2);
        assert!(confidences[0] <= confidences[1]);
        assert!((confidences[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn batch_counts() {
        let parts = vec![part(720.0, 560.0, 1.0), part(0.0, 560.0, 1.0), part(600.0, 300.0, 0.5)];
        let batch = validate_batch(&parts, &ValidationPolicy::default());
        assert_eq!(batch.reports.len(), 3);
        assert_eq!(batch.valid_count, 2);
        assert_eq!(batch.needs_review_count, 2);
    }
}
