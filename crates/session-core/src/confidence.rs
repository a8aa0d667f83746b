use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::limits::SessionLimits;
use crate::model::ConfidenceReport;

/// Routing bucket derived from a plan's confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceZone {
    /// Too uncertain to act; ask the user instead of guessing.
    Ask,
    /// Act, but announce the assumptions being made.
    AssumeAnnounce,
    /// Confident enough to go straight to approval.
    Proceed,
}

/// Map a confidence report to its routing zone.
///
/// Bands are inclusive on their lower bound: exactly `proceed_threshold`
/// is `Proceed`. Out-of-range fields are a validation error, never
/// clamped.
pub fn zone(
    report: &ConfidenceReport,
    limits: &SessionLimits,
) -> Result<ConfidenceZone, SessionError> {
    validate_report(report)?;
    if report.overall < limits.ask_threshold {
        Ok(ConfidenceZone::Ask)
    } else if report.overall < limits.proceed_threshold {
        Ok(ConfidenceZone::AssumeAnnounce)
    } else {
        Ok(ConfidenceZone::Proceed)
    }
}

/// Reject any confidence field outside `[0, 1]` (NaN included).
pub fn validate_report(report: &ConfidenceReport) -> Result<(), SessionError> {
    for (name, value) in report.fields() {
        if !(0.0..=1.0).contains(&value) {
            return Err(SessionError::validation(format!(
                "confidence field {name}={value} outside [0, 1]"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(overall: f64) -> ConfidenceReport {
        ConfidenceReport {
            overall,
            intent_clarity: 0.5,
            target_match: 0.5,
            value_confidence: 0.5,
        }
    }

    #[test]
    fn bands_are_inclusive_on_lower_bound() {
        let limits = SessionLimits::default();
        assert_eq!(zone(&report(0.0), &limits).unwrap(), ConfidenceZone::Ask);
        assert_eq!(zone(&report(0.49), &limits).unwrap(), ConfidenceZone::Ask);
        assert_eq!(
            zone(&report(0.5), &limits).unwrap(),
            ConfidenceZone::AssumeAnnounce
        );
        assert_eq!(
            zone(&report(0.89), &limits).unwrap(),
            ConfidenceZone::AssumeAnnounce
        );
        assert_eq!(zone(&report(0.9), &limits).unwrap(), ConfidenceZone::Proceed);
        assert_eq!(zone(&report(1.0), &limits).unwrap(), ConfidenceZone::Proceed);
    }

    #[test]
    fn out_of_range_values_are_rejected_not_clamped() {
        let limits = SessionLimits::default();
        assert!(zone(&report(-0.1), &limits).is_err());
        assert!(zone(&report(1.1), &limits).is_err());
        assert!(zone(&report(f64::NAN), &limits).is_err());

        let mut bad = report(0.7);
        bad.target_match = 2.0;
        assert!(matches!(
            zone(&bad, &limits),
            Err(SessionError::Validation(_))
        ));
    }
}
