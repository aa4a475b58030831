use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::accounts::model::UserProfile;
use crate::features::session::Role;

/// Request DTO for registering the caller's business account
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAccountDto {
    #[validate(length(min = 1, max = 128, message = "Full name must be 1-128 characters"))]
    pub full_name: String,

    #[validate(length(min = 1, max = 255, message = "Company name must be 1-255 characters"))]
    pub company_name: String,

    /// SIRET or other company registration id
    #[validate(length(min = 1, max = 32, message = "Tax id must be 1-32 characters"))]
    pub tax_id: String,

    #[validate(regex(
        path = "*crate::shared::validation::PHONE_REGEX",
        message = "Phone must contain digits, spaces, dots or dashes"
    ))]
    pub phone: String,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponseDto {
    pub id: String,
    pub full_name: String,
    pub company_name: String,
    pub tax_id: String,
    pub phone: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserProfile> for AccountResponseDto {
    fn from(p: UserProfile) -> Self {
        Self {
            id: p.id,
            full_name: p.full_name,
            company_name: p.company_name,
            tax_id: p.tax_id,
            phone: p.phone,
            email: p.email,
            role: p.role,
            verified: p.verified,
            created_at: p.created_at,
        }
    }
}

/// Filter for the account listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AccountFilter {
    /// Only verified (`true`) or pending (`false`) accounts
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleDto {
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegisterAccountDto {
        RegisterAccountDto {
            full_name: "Jeanne Martin".to_string(),
            company_name: "Martin SARL".to_string(),
            tax_id: "12345678900012".to_string(),
            phone: "+33 6 12 34 56 78".to_string(),
            email: "jeanne@martin.fr".to_string(),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(valid().validate().is_ok());

        let mut dto = valid();
        dto.email = "not-an-email".to_string();
        assert!(dto.validate().is_err());

        let mut dto = valid();
        dto.phone = "call me".to_string();
        assert!(dto.validate().is_err());

        let mut dto = valid();
        dto.company_name = String::new();
        assert!(dto.validate().is_err());
    }
}
