use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::dto::{CreateMessageDto, MessageFilter};
use super::model::{Message, MessageStatus};
use crate::core::error::{AppError, Result};
use crate::modules::backend::{
    decode, encode, Collection, DataBackend, Filter, Record, SelectQuery, SortDirection,
};
use crate::shared::types::PaginationQuery;

pub struct MessageService {
    backend: Arc<dyn DataBackend>,
}

impl MessageService {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    pub async fn create(&self, mut dto: CreateMessageDto) -> Result<Message> {
        // blank optional fields mean "not given"
        dto.company = dto.company.filter(|s| !s.trim().is_empty());
        dto.phone = dto.phone.filter(|s| !s.trim().is_empty());
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if dto.body.trim().is_empty() {
            return Err(AppError::Validation("Message must not be blank".to_string()));
        }

        let message = Message {
            id: Uuid::new_v4(),
            name: dto.name.trim().to_string(),
            email: dto.email.trim().to_lowercase(),
            company: dto.company.map(|s| s.trim().to_string()),
            phone: dto.phone.map(|s| s.trim().to_string()),
            body: dto.body.trim().to_string(),
            status: MessageStatus::New,
            created_at: Utc::now(),
        };

        let record = self
            .backend
            .insert(Collection::Messages, encode(&message)?)
            .await?;
        info!("Contact message {} received from {}", message.id, message.email);
        Ok(decode(record)?)
    }

    /// Messages newest first
    pub async fn list(
        &self,
        filter: &MessageFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Message>, i64)> {
        let condition = filter.status.map(|s| Filter::eq("status", s.as_str()));
        let total = self
            .backend
            .count(Collection::Messages, condition.clone())
            .await?;

        let mut query = SelectQuery::new()
            .order_by("created_at", SortDirection::Desc)
            .limit(pagination.limit() as usize)
            .offset(pagination.offset());
        if let Some(condition) = condition {
            query = query.filter(condition);
        }

        let messages = self
            .backend
            .select(Collection::Messages, query)
            .await?
            .into_iter()
            .map(|r| decode::<Message>(r).map_err(AppError::from))
            .collect::<Result<Vec<_>>>()?;

        Ok((messages, total))
    }

    pub async fn mark_processed(&self, id: Uuid) -> Result<Message> {
        let record = self
            .backend
            .get(Collection::Messages, &id.to_string())
            .await?
            .ok_or_else(|| not_found(id))?;
        let message: Message = decode(record)?;

        if message.status == MessageStatus::Processed {
            return Err(AppError::Conflict(format!(
                "Message {} is already processed",
                id
            )));
        }

        let mut patch = Record::new();
        patch.insert("status".to_string(), json!(MessageStatus::Processed.as_str()));
        let record = self
            .backend
            .update(Collection::Messages, &id.to_string(), patch)
            .await?
            .ok_or_else(|| not_found(id))?;

        info!("Message {} processed", id);
        Ok(decode(record)?)
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Message {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::backend::InMemoryBackend;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::lorem::en::Sentence;
    use fake::faker::name::en::Name;
    use fake::Fake;
    use std::time::Duration;

    fn service() -> MessageService {
        MessageService::new(Arc::new(InMemoryBackend::new(Vec::new())))
    }

    fn dto() -> CreateMessageDto {
        CreateMessageDto {
            name: Name().fake(),
            email: SafeEmail().fake(),
            company: Some(String::new()),
            phone: None,
            body: Sentence(3..8).fake(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_new() {
        let message = tokio_test::assert_ok!(service().create(dto()).await);
        assert_eq!(message.status, MessageStatus::New);
        assert_eq!(message.company, None);
    }

    #[tokio::test]
    async fn test_create_validates() {
        let service = service();

        let mut invalid = dto();
        invalid.email = "nobody".to_string();
        assert!(matches!(
            service.create(invalid).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut blank = dto();
        blank.body = "   ".to_string();
        assert!(matches!(
            service.create(blank).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut too_long = dto();
        too_long.body = "a".repeat(5001);
        assert!(matches!(
            service.create(too_long).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_processing_is_one_way() {
        let service = service();
        let message = service.create(dto()).await.unwrap();

        let processed = tokio_test::assert_ok!(service.mark_processed(message.id).await);
        assert_eq!(processed.status, MessageStatus::Processed);

        let err = tokio_test::assert_err!(service.mark_processed(message.id).await);
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service.mark_processed(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_status_filter() {
        let service = service();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(service.create(dto()).await.unwrap().id);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        service.mark_processed(ids[0]).await.unwrap();

        let (all, total) = service
            .list(&MessageFilter::default(), &PaginationQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].id, ids[2]);

        let (fresh, total) = service
            .list(
                &MessageFilter {
                    status: Some(MessageStatus::New),
                },
                &PaginationQuery::default(),
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(fresh.iter().all(|m| m.status == MessageStatus::New));
    }
}
