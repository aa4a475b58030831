use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::features::session::Role;

/// Business account attached to an authentication subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// Authentication subject
    pub id: String,
    pub full_name: String,
    pub company_name: String,
    /// SIRET or other company registration id
    pub tax_id: String,
    pub phone: String,
    pub email: String,
    #[serde(deserialize_with = "stored_role")]
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

fn stored_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Role, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(Role::from_stored(&value))
}

/// Whether a validated account can be blocked again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    /// `unverified -> verified` only
    #[default]
    OneWay,
    /// Validators may also revoke verification
    Reversible,
}

impl FromStr for VerificationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one_way" | "oneway" => Ok(Self::OneWay),
            "reversible" => Ok(Self::Reversible),
            other => Err(format!(
                "ACCOUNT_VERIFICATION_POLICY must be 'one_way' or 'reversible', got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneWay => f.write_str("one_way"),
            Self::Reversible => f.write_str("reversible"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verification_policy_parse() {
        assert_eq!("one_way".parse(), Ok(VerificationPolicy::OneWay));
        assert_eq!(" Reversible ".parse(), Ok(VerificationPolicy::Reversible));
        assert!("sometimes".parse::<VerificationPolicy>().is_err());
    }

    #[test]
    fn test_unknown_stored_role_reads_as_client() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "sub-1",
            "full_name": "Jeanne Martin",
            "company_name": "Martin SARL",
            "tax_id": "12345678900012",
            "phone": "0612345678",
            "email": "jeanne@martin.fr",
            "role": "superuser",
            "verified": false,
            "created_at": "2025-03-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(profile.role, Role::Client);
    }
}
