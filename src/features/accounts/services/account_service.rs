use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::accounts::clients::ProfileSync;
use crate::features::accounts::dtos::{AccountFilter, RegisterAccountDto};
use crate::features::accounts::model::{UserProfile, VerificationPolicy};
use crate::features::auth::{Session, Viewer};
use crate::features::session::{can_edit_roles, can_validate_accounts, Role};
use crate::modules::backend::{
    decode, encode, BackendError, Collection, DataBackend, Filter, Record, SelectQuery,
    SortDirection,
};
use crate::shared::types::PaginationQuery;

/// Registration and the `unverified -> verified` workflow of business accounts
pub struct AccountService {
    backend: Arc<dyn DataBackend>,
    sync: Arc<dyn ProfileSync>,
    policy: VerificationPolicy,
}

impl AccountService {
    pub fn new(
        backend: Arc<dyn DataBackend>,
        sync: Arc<dyn ProfileSync>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            backend,
            sync,
            policy,
        }
    }

    /// Create the caller's profile: client role, pending verification
    pub async fn register(&self, session: &Session, dto: RegisterAccountDto) -> Result<UserProfile> {
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let profile = UserProfile {
            id: session.subject.clone(),
            full_name: dto.full_name.trim().to_string(),
            company_name: dto.company_name.trim().to_string(),
            tax_id: dto.tax_id.trim().to_string(),
            phone: dto.phone.trim().to_string(),
            email: dto.email.trim().to_lowercase(),
            role: Role::Client,
            verified: false,
            created_at: Utc::now(),
        };

        match self
            .backend
            .insert(Collection::Profiles, encode(&profile)?)
            .await
        {
            Ok(record) => {
                info!("Registered account {} ({})", profile.id, profile.company_name);
                Ok(decode(record)?)
            }
            Err(BackendError::Duplicate(_)) => Err(AppError::Conflict(
                "An account is already registered for this user".to_string(),
            )),
            Err(e) => {
                tracing::error!("Failed to register account {}: {:?}", profile.id, e);
                Err(AppError::Backend(e))
            }
        }
    }

    pub async fn get_me(&self, session: &Session) -> Result<UserProfile> {
        self.find(&session.subject).await
    }

    /// Accounts newest first, optionally only verified or only pending ones
    pub async fn list_profiles(
        &self,
        actor: &Viewer,
        filter: &AccountFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<UserProfile>, i64)> {
        require(actor, can_validate_accounts, "Account validator access required")?;

        let condition = filter.verified.map(|v| Filter::eq("verified", v));
        let total = self
            .backend
            .count(Collection::Profiles, condition.clone())
            .await?;

        let mut query = SelectQuery::new()
            .order_by("created_at", SortDirection::Desc)
            .limit(pagination.limit() as usize)
            .offset(pagination.offset());
        if let Some(condition) = condition {
            query = query.filter(condition);
        }

        let profiles = self
            .backend
            .select(Collection::Profiles, query)
            .await?
            .into_iter()
            .map(|r| decode::<UserProfile>(r).map_err(AppError::from))
            .collect::<Result<Vec<_>>>()?;

        Ok((profiles, total))
    }

    /// Mark an account verified.
    ///
    /// Iabako is notified first, best effort: a failed or slow webhook is
    /// logged and never blocks the validation. A failed write leaves the
    /// account pending and is not followed by another notification.
    pub async fn validate(&self, actor: &Viewer, user_id: &str) -> Result<UserProfile> {
        require(actor, can_validate_accounts, "Account validator access required")?;

        let profile = self.find(user_id).await?;
        if profile.verified {
            return Ok(profile);
        }

        if let Err(e) = self.sync.notify(&profile).await {
            warn!("Iabako sync failed for account {}: {}", profile.id, e);
        }

        let updated = self
            .set(user_id, "verified", json!(true))
            .await
            .inspect_err(|e| warn!("Account {} remains pending: {}", user_id, e))?;
        info!(
            "Account {} validated by {}",
            user_id,
            actor.subject().unwrap_or("unknown")
        );
        Ok(updated)
    }

    /// Revoke verification; only allowed under the reversible policy
    pub async fn block(&self, actor: &Viewer, user_id: &str) -> Result<UserProfile> {
        require(actor, can_validate_accounts, "Account validator access required")?;

        if self.policy == VerificationPolicy::OneWay {
            return Err(AppError::Conflict(
                "Account verification cannot be revoked".to_string(),
            ));
        }

        let profile = self.find(user_id).await?;
        if !profile.verified {
            return Ok(profile);
        }

        let updated = self.set(user_id, "verified", json!(false)).await?;
        info!("Account {} blocked", user_id);
        Ok(updated)
    }

    pub async fn change_role(&self, actor: &Viewer, user_id: &str, role: Role) -> Result<UserProfile> {
        require(actor, can_edit_roles, "Developer access required")?;

        let profile = self.find(user_id).await?;
        if profile.role == role {
            return Ok(profile);
        }

        let updated = self.set(user_id, "role", json!(role.as_str())).await?;
        info!("Account {} role changed {} -> {}", user_id, profile.role, role);
        Ok(updated)
    }

    async fn find(&self, user_id: &str) -> Result<UserProfile> {
        let record = self
            .backend
            .get(Collection::Profiles, user_id)
            .await?
            .ok_or_else(|| not_found(user_id))?;
        Ok(decode(record)?)
    }

    async fn set(&self, user_id: &str, field: &str, value: serde_json::Value) -> Result<UserProfile> {
        let mut patch = Record::new();
        patch.insert(field.to_string(), value);

        let record = self
            .backend
            .update(Collection::Profiles, user_id, patch)
            .await?
            .ok_or_else(|| not_found(user_id))?;
        Ok(decode(record)?)
    }
}

fn require(actor: &Viewer, allowed: fn(Role) -> bool, denied: &str) -> Result<()> {
    if actor.session.is_none() {
        return Err(AppError::Unauthorized("User not authenticated".to_string()));
    }
    if !allowed(actor.role) {
        return Err(AppError::Forbidden(denied.to_string()));
    }
    Ok(())
}

fn not_found(user_id: &str) -> AppError {
    AppError::NotFound(format!("Account {} not found", user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::accounts::clients::SyncError;
    use crate::modules::backend::InMemoryBackend;
    use crate::shared::test_helpers::{admin_viewer, client_viewer, developer_viewer, test_session};
    use async_trait::async_trait;
    use fake::faker::company::en::CompanyName;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts notifications; optionally fails each one after a delay
    #[derive(Default)]
    struct ScriptedSync {
        calls: AtomicUsize,
        failure: Option<Duration>,
    }

    #[async_trait]
    impl ProfileSync for ScriptedSync {
        async fn notify(&self, _profile: &UserProfile) -> std::result::Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failure {
                Some(after) => {
                    tokio::time::sleep(after).await;
                    Err(SyncError::Timeout(after))
                }
                None => Ok(()),
            }
        }
    }

    struct Fixture {
        backend: Arc<InMemoryBackend>,
        sync: Arc<ScriptedSync>,
        service: AccountService,
    }

    fn fixture(policy: VerificationPolicy, sync: ScriptedSync) -> Fixture {
        let backend = Arc::new(InMemoryBackend::new(Vec::new()));
        let sync = Arc::new(sync);
        let service = AccountService::new(backend.clone(), sync.clone(), policy);
        Fixture {
            backend,
            sync,
            service,
        }
    }

    fn registration() -> RegisterAccountDto {
        RegisterAccountDto {
            full_name: Name().fake(),
            company_name: CompanyName().fake(),
            tax_id: "12345678900012".to_string(),
            phone: "06 12 34 56 78".to_string(),
            email: SafeEmail().fake(),
        }
    }

    async fn registered(f: &Fixture, subject: &str) -> UserProfile {
        f.service
            .register(&test_session(subject), registration())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_creates_pending_client() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());

        let profile = registered(&f, "sub-1").await;
        assert_eq!(profile.id, "sub-1");
        assert_eq!(profile.role, Role::Client);
        assert!(!profile.verified);

        let me = f.service.get_me(&test_session("sub-1")).await.unwrap();
        assert_eq!(me, profile);
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        registered(&f, "sub-1").await;

        let err = f
            .service
            .register(&test_session("sub-1"), registration())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_email() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        let mut dto = registration();
        dto.email = "nope".to_string();

        let err = f
            .service
            .register(&test_session("sub-1"), dto)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validate_notifies_then_verifies() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        registered(&f, "sub-1").await;

        let profile = f
            .service
            .validate(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap();
        assert!(profile.verified);
        assert_eq!(f.sync.calls.load(Ordering::SeqCst), 1);

        // already verified: returned as is, not notified again
        let again = f
            .service
            .validate(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap();
        assert!(again.verified);
        assert_eq!(f.sync.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_timeout_does_not_block_validation() {
        let f = fixture(
            VerificationPolicy::OneWay,
            ScriptedSync {
                failure: Some(Duration::from_secs(10)),
                ..Default::default()
            },
        );
        registered(&f, "sub-1").await;

        let profile = f
            .service
            .validate(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap();
        assert!(profile.verified);
        assert_eq!(f.sync.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_surfaced() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        registered(&f, "sub-1").await;
        f.backend.fail_collection(Collection::Profiles);

        let err = f
            .service
            .validate(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend(BackendError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_client_cannot_validate() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        registered(&f, "sub-1").await;

        let err = f
            .service
            .validate(&client_viewer("sub-2"), "sub-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(f.sync.calls.load(Ordering::SeqCst), 0);

        let err = f
            .service
            .validate(&Viewer::anonymous(), "sub-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_validate_missing_account_is_not_found() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        let err = f
            .service
            .validate(&admin_viewer("admin-1"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_block_follows_policy() {
        let one_way = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        registered(&one_way, "sub-1").await;
        one_way
            .service
            .validate(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap();
        let err = one_way
            .service
            .block(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let reversible = fixture(VerificationPolicy::Reversible, ScriptedSync::default());
        registered(&reversible, "sub-1").await;
        reversible
            .service
            .validate(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap();
        let blocked = reversible
            .service
            .block(&admin_viewer("admin-1"), "sub-1")
            .await
            .unwrap();
        assert!(!blocked.verified);
    }

    #[tokio::test]
    async fn test_only_developer_changes_roles() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        registered(&f, "sub-1").await;

        let err = f
            .service
            .change_role(&admin_viewer("admin-1"), "sub-1", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let promoted = f
            .service
            .change_role(&developer_viewer("dev-1"), "sub-1", Role::Admin)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_list_profiles_filters_and_pages() {
        let f = fixture(VerificationPolicy::OneWay, ScriptedSync::default());
        for subject in ["sub-1", "sub-2", "sub-3"] {
            registered(&f, subject).await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        f.service
            .validate(&admin_viewer("admin-1"), "sub-2")
            .await
            .unwrap();

        let admin = admin_viewer("admin-1");
        let (pending, total) = f
            .service
            .list_profiles(
                &admin,
                &AccountFilter {
                    verified: Some(false),
                },
                &PaginationQuery::default(),
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        // newest first
        let ids: Vec<&str> = pending.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["sub-3", "sub-1"]);

        let (page, total) = f
            .service
            .list_profiles(
                &admin,
                &AccountFilter::default(),
                &PaginationQuery {
                    page: 2,
                    page_size: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "sub-1");
    }
}
