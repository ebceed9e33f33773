use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{ProfileUpdate, SkillLevel, User};
use crate::{error::ApiError, extract::check_text_len};

pub const MAX_EXPERIENCE_YEARS: i32 = 60;

/// Form inputs arrive as strings; API clients send numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

impl NumberOrString {
    fn is_blank(&self) -> bool {
        matches!(self, NumberOrString::Text(s) if s.trim().is_empty())
    }

    fn to_years(&self) -> Option<i32> {
        let years = match self {
            NumberOrString::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?,
            NumberOrString::Text(s) => s.trim().parse::<i64>().ok()?,
        };
        i32::try_from(years).ok()
    }
}

/// Profile fields shared by the wizard and the profile update endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub user_id: Option<Uuid>,
    pub job_role: Option<String>,
    pub experience: Option<NumberOrString>,
    pub target_company: Option<String>,
    pub level: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProfileRequest {
    /// True when every profile field carries a non-blank value.
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.job_role)
            && present(&self.target_company)
            && present(&self.level)
            && self.experience.as_ref().is_some_and(|e| !e.is_blank())
    }

    /// Validates the provided fields; blank ones become `None`.
    pub fn into_update(self) -> Result<ProfileUpdate, ApiError> {
        let experience = match self.experience.filter(|e| !e.is_blank()) {
            None => None,
            Some(raw) => {
                let years = raw
                    .to_years()
                    .filter(|y| (0..=MAX_EXPERIENCE_YEARS).contains(y))
                    .ok_or_else(|| {
                        ApiError::bad_request(format!(
                            "Experience must be a whole number of years between 0 and {MAX_EXPERIENCE_YEARS}"
                        ))
                    })?;
                Some(years)
            }
        };
        let level = non_blank(self.level)
            .map(|l| l.parse::<SkillLevel>())
            .transpose()
            .map_err(|_| {
                ApiError::bad_request("Level must be one of beginner, intermediate, advanced")
            })?;

        let job_role = non_blank(self.job_role);
        if let Some(role) = &job_role {
            check_text_len("Job role", role)?;
        }
        let target_company = non_blank(self.target_company);
        if let Some(company) = &target_company {
            check_text_len("Target company", company)?;
        }

        Ok(ProfileUpdate {
            job_role,
            experience,
            target_company,
            level,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}
