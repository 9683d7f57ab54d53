use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Care request as entered by a guardian, before a serial is assigned
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_care_period"))]
pub struct RequestDraft {
    #[validate(length(min = 1))]
    pub patient_name: String,
    #[validate(length(min = 1))]
    pub guardian_name: String,
    #[serde(default)]
    pub patient_condition: String,
    pub care_start_date: NaiveDate,
    pub care_end_date: NaiveDate,
    #[validate(length(min = 1))]
    pub location: String,
    #[serde(default)]
    pub patient_phone_number: Option<String>,
    #[validate(length(min = 9))]
    pub guardian_phone_number: String,
}

fn validate_care_period(draft: &RequestDraft) -> Result<(), ValidationError> {
    if draft.care_end_date < draft.care_start_date {
        return Err(ValidationError::new("care_end_before_start"));
    }
    Ok(())
}

/// Caregiver registration form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDraft {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub certificates: String,
    #[validate(length(min = 1))]
    pub available_regions: Vec<String>,
    #[validate(length(min = 9))]
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequestBody {
    #[validate(length(min = 1))]
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SelectProviderBody {
    #[validate(length(min = 1))]
    pub provider_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesBody {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusBody<S> {
    pub status: S,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RequestDraft {
        RequestDraft {
            patient_name: "홍길동".to_string(),
            guardian_name: "홍부모".to_string(),
            patient_condition: "거동 불편".to_string(),
            care_start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            care_end_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            location: "서울".to_string(),
            patient_phone_number: None,
            guardian_phone_number: "010-1234-5678".to_string(),
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut d = draft();
        d.care_end_date = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_provider_requires_region() {
        let provider = ProviderDraft {
            name: "김간병".to_string(),
            experience: "5년".to_string(),
            certificates: String::new(),
            available_regions: vec![],
            phone_number: "010-1111-2222".to_string(),
        };
        assert!(provider.validate().is_err());
    }
}
