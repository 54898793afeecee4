use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Raw check-in submission as received from the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinPayload {
    pub anonymous_user_id: Uuid,
    pub focus_group: String,
    pub did_not_work: bool,
    pub overall_mood: Option<i16>,
    pub positive_aspects: Option<Vec<String>>,
    pub negative_aspects: Option<Vec<String>>,
    pub hours_worked: Option<f64>,
    pub comment: Option<String>,
}

/// A submission that passed validation. When `did_not_work` is set the
/// mood/hours/aspect fields are already nulled out, so the row can be
/// inserted as-is.
#[derive(Debug)]
pub struct ValidCheckin {
    pub anonymous_user_id: Uuid,
    pub focus_group: String,
    pub did_not_work: bool,
    pub overall_mood: Option<i16>,
    pub positive_aspects: Vec<String>,
    pub negative_aspects: Vec<String>,
    pub hours_worked: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum CheckinError {
    #[error("Invalid or missing focus group name")]
    MissingFocusGroup,
    #[error("Invalid or missing overallMood (1-5)")]
    InvalidMood,
    #[error("Invalid or missing hoursWorked (>= 0)")]
    InvalidHours,
    #[error("Missing positiveAspects data")]
    MissingPositiveAspects,
    #[error("Missing negativeAspects data")]
    MissingNegativeAspects,
}

pub fn validate(payload: CheckinPayload) -> Result<ValidCheckin, CheckinError> {
    let focus_group = payload.focus_group.trim().to_string();
    if focus_group.is_empty() {
        return Err(CheckinError::MissingFocusGroup);
    }

    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if payload.did_not_work {
        return Ok(ValidCheckin {
            anonymous_user_id: payload.anonymous_user_id,
            focus_group,
            did_not_work: true,
            overall_mood: None,
            positive_aspects: Vec::new(),
            negative_aspects: Vec::new(),
            hours_worked: None,
            comment,
        });
    }

    let overall_mood = match payload.overall_mood {
        Some(mood) if (1..=5).contains(&mood) => mood,
        _ => return Err(CheckinError::InvalidMood),
    };
    let hours_worked = match payload.hours_worked {
        Some(hours) if hours >= 0.0 => hours,
        _ => return Err(CheckinError::InvalidHours),
    };
    let positive_aspects = payload
        .positive_aspects
        .ok_or(CheckinError::MissingPositiveAspects)?;
    let negative_aspects = payload
        .negative_aspects
        .ok_or(CheckinError::MissingNegativeAspects)?;

    Ok(ValidCheckin {
        anonymous_user_id: payload.anonymous_user_id,
        focus_group,
        did_not_work: false,
        overall_mood: Some(overall_mood),
        positive_aspects,
        negative_aspects,
        hours_worked: Some(hours_worked),
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_payload() -> CheckinPayload {
        CheckinPayload {
            anonymous_user_id: Uuid::new_v4(),
            focus_group: "Operations".to_string(),
            did_not_work: false,
            overall_mood: Some(4),
            positive_aspects: Some(vec!["Team".to_string()]),
            negative_aspects: Some(vec![]),
            hours_worked: Some(42.5),
            comment: None,
        }
    }

    #[test]
    fn worked_submission_passes() {
        let valid = validate(base_payload()).unwrap();
        assert_eq!(valid.overall_mood, Some(4));
        assert_eq!(valid.hours_worked, Some(42.5));
        assert_eq!(valid.positive_aspects, vec!["Team".to_string()]);
    }

    #[test]
    fn did_not_work_nulls_metrics() {
        let mut payload = base_payload();
        payload.did_not_work = true;
        payload.comment = Some("on leave".to_string());
        let valid = validate(payload).unwrap();
        assert!(valid.overall_mood.is_none());
        assert!(valid.hours_worked.is_none());
        assert!(valid.positive_aspects.is_empty());
        assert!(valid.negative_aspects.is_empty());
        assert_eq!(valid.comment.as_deref(), Some("on leave"));
    }

    #[test]
    fn mood_out_of_range_rejected() {
        let mut payload = base_payload();
        payload.overall_mood = Some(6);
        assert_eq!(validate(payload).unwrap_err(), CheckinError::InvalidMood);

        let mut payload = base_payload();
        payload.overall_mood = None;
        assert_eq!(validate(payload).unwrap_err(), CheckinError::InvalidMood);
    }

    #[test]
    fn negative_hours_rejected() {
        let mut payload = base_payload();
        payload.hours_worked = Some(-1.0);
        assert_eq!(validate(payload).unwrap_err(), CheckinError::InvalidHours);
    }

    #[test]
    fn blank_focus_group_rejected() {
        let mut payload = base_payload();
        payload.focus_group = "   ".to_string();
        assert_eq!(
            validate(payload).unwrap_err(),
            CheckinError::MissingFocusGroup
        );
    }
}
