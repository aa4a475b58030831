use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::model::{Message, MessageStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageDto {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: String,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,

    #[validate(length(max = 255, message = "Company must not exceed 255 characters"))]
    pub company: Option<String>,

    #[validate(regex(
        path = "*crate::shared::validation::PHONE_REGEX",
        message = "Phone must contain digits, spaces, dots or dashes"
    ))]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MessageFilter {
    /// Only messages in this status
    pub status: Option<MessageStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponseDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub body: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponseDto {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            company: m.company,
            phone: m.phone,
            body: m.body,
            status: m.status,
            created_at: m.created_at,
        }
    }
}
