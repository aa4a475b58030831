use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::catalog::dtos::{
    AncestryDto, CatalogEntryDto, CrumbDto, EntryDraft, EntryPatch, ImageUpload,
};
use crate::features::catalog::hierarchy::{CascadePolicy, EntityKind};
use crate::features::catalog::models::{CatalogEntity, Category, Product, Subcategory};
use crate::modules::backend::{
    decode, BackendError, DataBackend, Filter, Record, SelectQuery, SortDirection,
};
use crate::modules::storage::{
    is_image_type_allowed, BlobStore, ALLOWED_IMAGE_TYPES, MAX_IMAGE_SIZE,
};
use crate::shared::constants::CATALOG_ROOT_PATH;
use crate::shared::validation::PRODUCT_CODE_REGEX;

const MAX_NAME_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_CODE_LEN: usize = 64;

/// A resolved entity as seen by the breadcrumb walk
struct Node {
    crumb: CrumbDto,
    parent_id: Option<Uuid>,
}

impl Node {
    fn of<T: CatalogEntity>(entity: &T) -> Self {
        Self {
            crumb: CrumbDto {
                kind: T::KIND,
                id: entity.id(),
                name: entity.name().to_string(),
                href: T::KIND.href(entity.id()),
            },
            parent_id: entity.parent_id(),
        }
    }
}

/// Service for the catalog hierarchy
pub struct CatalogService {
    backend: Arc<dyn DataBackend>,
    blobs: Arc<dyn BlobStore>,
    policy: CascadePolicy,
}

impl CatalogService {
    pub fn new(
        backend: Arc<dyn DataBackend>,
        blobs: Arc<dyn BlobStore>,
        policy: CascadePolicy,
    ) -> Self {
        Self {
            backend,
            blobs,
            policy,
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// All categories, oldest first
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.select_ordered(None).await
    }

    /// Children of `parent_id`; the parent kind follows from the child type.
    ///
    /// A parent without children, or one that no longer exists, yields an empty list.
    pub async fn list_children<T: CatalogEntity>(&self, parent_id: Uuid) -> Result<Vec<T>> {
        let Some(parent_key) = T::KIND.parent_key() else {
            return Err(AppError::Internal(format!(
                "{} has no parent kind",
                T::KIND
            )));
        };
        self.select_ordered(Some(Filter::eq(parent_key, parent_id.to_string())))
            .await
    }

    pub async fn get<T: CatalogEntity>(&self, id: Uuid) -> Result<T> {
        self.find::<T>(id)
            .await?
            .ok_or_else(|| not_found(T::KIND, id))
    }

    pub async fn get_entry(&self, kind: EntityKind, id: Uuid) -> Result<CatalogEntryDto> {
        Ok(match kind {
            EntityKind::Category => CatalogEntryDto::Category(self.get::<Category>(id).await?.into()),
            EntityKind::Subcategory => {
                CatalogEntryDto::Subcategory(self.get::<Subcategory>(id).await?.into())
            }
            EntityKind::Product => CatalogEntryDto::Product(self.get::<Product>(id).await?.into()),
        })
    }

    /// Breadcrumb chain from the root down to `(kind, id)`.
    ///
    /// A missing or unreadable ancestor truncates the chain: `complete` is
    /// false and `back` falls back to the catalog root.
    pub async fn resolve_ancestors(&self, kind: EntityKind, id: Uuid) -> Result<AncestryDto> {
        let entity = self
            .load_node(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        let mut next = kind.parent().zip(entity.parent_id);
        let mut crumbs = vec![entity.crumb];
        let mut complete = true;

        while let Some((parent_kind, parent_id)) = next {
            match self.load_node(parent_kind.kind(), parent_id).await {
                Ok(Some(node)) => {
                    next = parent_kind.kind().parent().zip(node.parent_id);
                    crumbs.push(node.crumb);
                }
                Ok(None) => {
                    debug!(
                        "{} {} is orphaned: {} {} is missing",
                        kind,
                        id,
                        parent_kind.kind(),
                        parent_id
                    );
                    complete = false;
                    break;
                }
                Err(e) => {
                    warn!(
                        "Ancestor lookup of {} {} failed, truncating chain: {}",
                        parent_kind.kind(),
                        parent_id,
                        e
                    );
                    complete = false;
                    break;
                }
            }
        }

        crumbs.reverse();
        let back = match crumbs.len() {
            n if complete && n >= 2 => crumbs[n - 2].href.clone(),
            _ => CATALOG_ROOT_PATH.to_string(),
        };

        Ok(AncestryDto {
            crumbs,
            complete,
            back,
        })
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    pub async fn create_category(
        &self,
        draft: EntryDraft,
        image: Option<ImageUpload>,
    ) -> Result<Category> {
        let record = self.new_record(EntityKind::Category, draft)?;
        self.insert_with_image::<Category>(record, image).await
    }

    /// Create a subcategory under a category, or a product under a subcategory.
    ///
    /// The parent must still exist when the record is written; otherwise
    /// `Dependency` is returned and no record is created.
    pub async fn create_child<T: CatalogEntity>(
        &self,
        parent_id: Uuid,
        draft: EntryDraft,
        image: Option<ImageUpload>,
    ) -> Result<T> {
        let Some(parent) = T::KIND.parent() else {
            return Err(AppError::Internal(format!("{} cannot be a child", T::KIND)));
        };

        let mut record = self.new_record(T::KIND, draft)?;
        if let Some(ref upload) = image {
            check_image(upload)?;
        }

        let exists = self
            .backend
            .get(parent.kind().collection(), &parent_id.to_string())
            .await?
            .is_some();
        if !exists {
            return Err(AppError::Dependency(format!(
                "{} {} no longer exists",
                parent.kind(),
                parent_id
            )));
        }

        record.insert(parent.child_key().to_string(), json!(parent_id));
        self.insert_with_image::<T>(record, image).await
    }

    /// Rename an entry, change its description/code, or replace/remove its image
    pub async fn update(
        &self,
        kind: EntityKind,
        id: Uuid,
        patch: EntryPatch,
        image: Option<ImageUpload>,
    ) -> Result<CatalogEntryDto> {
        let mut changes = Record::new();

        if let Some(name) = &patch.name {
            changes.insert("name".to_string(), json!(clean_name(name)?));
        }
        if kind != EntityKind::Product && (patch.description.is_some() || patch.code.is_some()) {
            return Err(AppError::Validation(format!(
                "A {} has no description or code",
                kind
            )));
        }
        if let Some(description) = &patch.description {
            changes.insert("description".to_string(), json!(clean_description(description)?));
        }
        if let Some(code) = &patch.code {
            changes.insert("code".to_string(), json!(clean_code(code)?));
        }
        if let Some(ref upload) = image {
            check_image(upload)?;
        }

        let collection = kind.collection();
        let current = self
            .backend
            .get(collection, &id.to_string())
            .await?
            .ok_or_else(|| not_found(kind, id))?;
        let old_image = current
            .get("image_url")
            .and_then(Value::as_str)
            .map(str::to_string);

        let new_image = match image {
            Some(upload) => Some(self.upload(kind, upload).await?),
            None => None,
        };
        match (&new_image, patch.remove_image) {
            (Some(url), _) => {
                changes.insert("image_url".to_string(), json!(url));
            }
            (None, true) => {
                changes.insert("image_url".to_string(), Value::Null);
            }
            (None, false) => {}
        }

        if changes.is_empty() {
            return self.get_entry(kind, id).await;
        }

        let updated = match self.backend.update(collection, &id.to_string(), changes).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                self.discard_blob(new_image.as_deref()).await;
                return Err(e.into());
            }
        };
        if !updated {
            self.discard_blob(new_image.as_deref()).await;
            return Err(not_found(kind, id));
        }

        if new_image.is_some() || patch.remove_image {
            self.discard_blob(old_image.as_deref()).await;
        }

        info!("Updated {} {}", kind, id);
        self.get_entry(kind, id).await
    }

    /// Delete an entry. Descendants follow the cascade policy; callers should
    /// re-fetch listings afterwards.
    ///
    /// The backend refuses the delete atomically under `Restrict` while
    /// children remain; that surfaces as `Conflict`.
    pub async fn delete_entity(&self, kind: EntityKind, id: Uuid) -> Result<()> {
        let collection = kind.collection();
        let current = self
            .backend
            .get(collection, &id.to_string())
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        // rows removed by the cascade take their images with them
        let mut images = match self.policy {
            CascadePolicy::Cascade => self.descendant_images(kind, id).await?,
            CascadePolicy::Restrict => Vec::new(),
        };

        let deleted = self
            .backend
            .delete(collection, &id.to_string())
            .await
            .map_err(|e| match e {
                BackendError::ForeignKey(msg) => {
                    debug!("Delete of {} {} refused: {}", kind, id, msg);
                    AppError::Conflict(format!("{} {} still has children", kind, id))
                }
                other => {
                    tracing::error!("Failed to delete {} {}: {:?}", kind, id, other);
                    AppError::Backend(other)
                }
            })?;
        if !deleted {
            return Err(not_found(kind, id));
        }

        if let Some(image) = current.get("image_url").and_then(Value::as_str) {
            images.push(image.to_string());
        }
        for image in &images {
            self.discard_blob(Some(image.as_str())).await;
        }

        info!("Deleted {} {} ({:?} policy)", kind, id, self.policy);
        Ok(())
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Image URLs of every subcategory and product below an entry
    async fn descendant_images(&self, kind: EntityKind, id: Uuid) -> Result<Vec<String>> {
        let subcategories = match kind {
            EntityKind::Category => self.list_children::<Subcategory>(id).await?,
            EntityKind::Subcategory => {
                let products = self.list_children::<Product>(id).await?;
                return Ok(products.into_iter().filter_map(|p| p.image_url).collect());
            }
            EntityKind::Product => return Ok(Vec::new()),
        };

        let mut images = Vec::new();
        for subcategory in subcategories {
            let products = self.list_children::<Product>(subcategory.id).await?;
            images.extend(subcategory.image_url);
            images.extend(products.into_iter().filter_map(|p| p.image_url));
        }
        Ok(images)
    }

    async fn select_ordered<T: CatalogEntity>(&self, filter: Option<Filter>) -> Result<Vec<T>> {
        let mut query = SelectQuery::new().order_by("created_at", SortDirection::Asc);
        if let Some(filter) = filter {
            query = query.filter(filter);
        }

        let records = self
            .backend
            .select(T::KIND.collection(), query)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list {} records: {:?}", T::KIND, e);
                AppError::Backend(e)
            })?;

        records
            .into_iter()
            .map(|r| decode::<T>(r).map_err(AppError::from))
            .collect()
    }

    async fn find<T: CatalogEntity>(&self, id: Uuid) -> std::result::Result<Option<T>, BackendError> {
        match self.backend.get(T::KIND.collection(), &id.to_string()).await? {
            Some(record) => Ok(Some(decode::<T>(record)?)),
            None => Ok(None),
        }
    }

    async fn load_node(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> std::result::Result<Option<Node>, BackendError> {
        Ok(match kind {
            EntityKind::Category => self.find::<Category>(id).await?.as_ref().map(Node::of),
            EntityKind::Subcategory => self.find::<Subcategory>(id).await?.as_ref().map(Node::of),
            EntityKind::Product => self.find::<Product>(id).await?.as_ref().map(Node::of),
        })
    }

    /// Validated record for a new entry of `kind`, without parent link or image
    fn new_record(&self, kind: EntityKind, draft: EntryDraft) -> Result<Record> {
        let name = clean_name(&draft.name)?;

        let mut record = Record::new();
        record.insert("id".to_string(), json!(Uuid::new_v4()));
        record.insert("name".to_string(), json!(name));
        record.insert("image_url".to_string(), Value::Null);
        record.insert("created_at".to_string(), json!(Utc::now()));

        if kind == EntityKind::Product {
            let description = draft.description.as_deref().map(clean_description).transpose()?;
            let code = draft.code.as_deref().map(clean_code).transpose()?;
            record.insert("description".to_string(), json!(description.flatten()));
            record.insert("code".to_string(), json!(code.flatten()));
        } else if draft.description.is_some() || draft.code.is_some() {
            return Err(AppError::Validation(format!(
                "A {} has no description or code",
                kind
            )));
        }

        Ok(record)
    }

    async fn insert_with_image<T: CatalogEntity>(
        &self,
        mut record: Record,
        image: Option<ImageUpload>,
    ) -> Result<T> {
        let image_url = match image {
            Some(upload) => Some(self.upload(T::KIND, upload).await?),
            None => None,
        };
        if let Some(ref url) = image_url {
            record.insert("image_url".to_string(), json!(url));
        }

        match self.backend.insert(T::KIND.collection(), record).await {
            Ok(inserted) => {
                let entity = decode::<T>(inserted)?;
                info!("Created {} {} '{}'", T::KIND, entity.id(), entity.name());
                Ok(entity)
            }
            Err(e) => {
                self.discard_blob(image_url.as_deref()).await;
                Err(match e {
                    BackendError::ForeignKey(msg) => AppError::Dependency(msg),
                    other => {
                        tracing::error!("Failed to create {}: {:?}", T::KIND, other);
                        AppError::Backend(other)
                    }
                })
            }
        }
    }

    async fn upload(&self, kind: EntityKind, upload: ImageUpload) -> Result<String> {
        check_image(&upload)?;
        self.blobs
            .upload(
                kind.image_folder(),
                &upload.file_name,
                upload.data,
                &upload.content_type,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to upload {} image: {:?}", kind, e);
                AppError::Backend(e)
            })
    }

    /// Best effort: a leftover blob is not worth failing the request for
    async fn discard_blob(&self, url: Option<&str>) {
        if let Some(url) = url {
            if let Err(e) = self.blobs.delete_by_url(url).await {
                warn!("Failed to delete image {}: {}", url, e);
            }
        }
    }
}

fn not_found(kind: EntityKind, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {} not found", kind, id))
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Name must not exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Trimmed description; empty means none
fn clean_description(description: &str) -> Result<Option<String>> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::Validation(format!(
            "Description must not exceed {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok((!description.is_empty()).then(|| description.to_string()))
}

/// Upper-cased product code; empty means none
fn clean_code(code: &str) -> Result<Option<String>> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Ok(None);
    }
    if code.len() > MAX_CODE_LEN || !PRODUCT_CODE_REGEX.is_match(&code) {
        return Err(AppError::Validation(format!(
            "Invalid product code '{}'",
            code
        )));
    }
    Ok(Some(code))
}

fn check_image(upload: &ImageUpload) -> Result<()> {
    if !is_image_type_allowed(&upload.content_type) {
        return Err(AppError::Validation(format!(
            "Image type '{}' is not allowed. Allowed types: {}",
            upload.content_type,
            ALLOWED_IMAGE_TYPES.join(", ")
        )));
    }
    if upload.data.len() > MAX_IMAGE_SIZE {
        return Err(AppError::Validation(format!(
            "Image too large. Maximum size is {} MB",
            MAX_IMAGE_SIZE / 1024 / 1024
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::catalog::hierarchy::relations;
    use crate::modules::backend::{Collection, InMemoryBackend};
    use crate::modules::storage::InMemoryBlobStore;

    struct Fixture {
        backend: Arc<InMemoryBackend>,
        blobs: Arc<InMemoryBlobStore>,
        service: CatalogService,
    }

    fn fixture(policy: CascadePolicy) -> Fixture {
        let backend = Arc::new(InMemoryBackend::new(relations(policy)));
        let blobs = Arc::new(InMemoryBlobStore::new("http://blobs.test"));
        let service = CatalogService::new(backend.clone(), blobs.clone(), policy);
        Fixture {
            backend,
            blobs,
            service,
        }
    }

    fn draft(name: &str) -> EntryDraft {
        EntryDraft {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn png() -> ImageUpload {
        ImageUpload {
            file_name: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    /// Visserie > Vis bois > Vis 4x40
    async fn seed(service: &CatalogService) -> (Category, Subcategory, Product) {
        let category = service
            .create_category(draft("Visserie"), None)
            .await
            .unwrap();
        let subcategory = service
            .create_child::<Subcategory>(category.id, draft("Vis bois"), None)
            .await
            .unwrap();
        let product = service
            .create_child::<Product>(
                subcategory.id,
                EntryDraft {
                    name: "Vis 4x40".to_string(),
                    description: Some("Tête fraisée".to_string()),
                    code: Some(" vb-440 ".to_string()),
                },
                None,
            )
            .await
            .unwrap();
        (category, subcategory, product)
    }

    #[tokio::test]
    async fn test_create_and_list_hierarchy() {
        let f = fixture(CascadePolicy::Cascade);
        let (category, subcategory, product) = seed(&f.service).await;
        let second = f
            .service
            .create_child::<Subcategory>(category.id, draft("Vis métaux"), None)
            .await
            .unwrap();

        assert_eq!(product.code.as_deref(), Some("VB-440"));

        let categories = f.service.list_categories().await.unwrap();
        assert_eq!(categories, vec![category.clone()]);

        let subcategories = f
            .service
            .list_children::<Subcategory>(category.id)
            .await
            .unwrap();
        assert_eq!(
            subcategories.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![subcategory.id, second.id]
        );

        let products = f
            .service
            .list_children::<Product>(subcategory.id)
            .await
            .unwrap();
        assert_eq!(products, vec![product]);
    }

    #[tokio::test]
    async fn test_list_children_of_missing_parent_is_empty() {
        let f = fixture(CascadePolicy::Cascade);
        let products = f
            .service
            .list_children::<Product>(Uuid::new_v4())
            .await
            .unwrap();
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected_before_backend() {
        let f = fixture(CascadePolicy::Cascade);
        f.backend.fail_collection(Collection::Categories);

        let result = f.service.create_category(draft("   "), None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_subcategory_rejects_product_fields() {
        let f = fixture(CascadePolicy::Cascade);
        let (category, _, _) = seed(&f.service).await;
        let result = f
            .service
            .create_child::<Subcategory>(
                category.id,
                EntryDraft {
                    name: "Chevilles".to_string(),
                    code: Some("CH-1".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_invalid_product_code_is_rejected() {
        let f = fixture(CascadePolicy::Cascade);
        let (_, subcategory, _) = seed(&f.service).await;
        let result = f
            .service
            .create_child::<Product>(
                subcategory.id,
                EntryDraft {
                    name: "Vis".to_string(),
                    code: Some("VB--440".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_child_of_deleted_parent_is_dependency_error() {
        let f = fixture(CascadePolicy::Cascade);
        let (category, _, _) = seed(&f.service).await;
        f.service
            .delete_entity(EntityKind::Category, category.id)
            .await
            .unwrap();

        let result = f
            .service
            .create_child::<Subcategory>(category.id, draft("Écrous"), Some(png()))
            .await;
        assert!(matches!(result, Err(AppError::Dependency(_))));
        assert!(f
            .service
            .list_children::<Subcategory>(category.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_descendants() {
        let f = fixture(CascadePolicy::Cascade);
        let (category, subcategory, product) = seed(&f.service).await;

        f.service
            .delete_entity(EntityKind::Category, category.id)
            .await
            .unwrap();

        assert!(f
            .service
            .list_children::<Subcategory>(category.id)
            .await
            .unwrap()
            .is_empty());
        assert!(f
            .service
            .list_children::<Product>(subcategory.id)
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            f.service.get::<Product>(product.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cascade_delete_discards_descendant_images() {
        let f = fixture(CascadePolicy::Cascade);
        let category = f
            .service
            .create_category(draft("Outillage"), Some(png()))
            .await
            .unwrap();
        let subcategory = f
            .service
            .create_child::<Subcategory>(category.id, draft("Perceuses"), Some(png()))
            .await
            .unwrap();
        let product = f
            .service
            .create_child::<Product>(subcategory.id, draft("Perceuse 18V"), Some(png()))
            .await
            .unwrap();
        let images = [
            category.image_url.clone().unwrap(),
            subcategory.image_url.clone().unwrap(),
            product.image_url.clone().unwrap(),
        ];
        for image in &images {
            assert!(f.blobs.contains(image).await);
        }

        f.service
            .delete_entity(EntityKind::Category, category.id)
            .await
            .unwrap();

        for image in &images {
            assert!(!f.blobs.contains(image).await, "{} was left behind", image);
        }
    }

    #[tokio::test]
    async fn test_restrict_refusal_keeps_images() {
        let f = fixture(CascadePolicy::Restrict);
        let category = f
            .service
            .create_category(draft("Outillage"), Some(png()))
            .await
            .unwrap();
        f.service
            .create_child::<Subcategory>(category.id, draft("Perceuses"), None)
            .await
            .unwrap();

        let result = f
            .service
            .delete_entity(EntityKind::Category, category.id)
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(f.blobs.contains(&category.image_url.unwrap()).await);
    }

    #[tokio::test]
    async fn test_restrict_delete_of_parent_with_children_conflicts() {
        let f = fixture(CascadePolicy::Restrict);
        let (category, subcategory, product) = seed(&f.service).await;

        let result = f
            .service
            .delete_entity(EntityKind::Category, category.id)
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        f.service
            .delete_entity(EntityKind::Product, product.id)
            .await
            .unwrap();
        f.service
            .delete_entity(EntityKind::Subcategory, subcategory.id)
            .await
            .unwrap();
        f.service
            .delete_entity(EntityKind::Category, category.id)
            .await
            .unwrap();
        assert!(f.service.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_entity_is_not_found() {
        let f = fixture(CascadePolicy::Cascade);
        let result = f
            .service
            .delete_entity(EntityKind::Product, Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_ancestors_full_chain() {
        let f = fixture(CascadePolicy::Cascade);
        let (category, subcategory, product) = seed(&f.service).await;

        let ancestry = f
            .service
            .resolve_ancestors(EntityKind::Product, product.id)
            .await
            .unwrap();

        assert!(ancestry.complete);
        assert_eq!(
            ancestry.crumbs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["Visserie", "Vis bois", "Vis 4x40"]
        );
        assert_eq!(ancestry.crumbs[0].href, format!("/categories/{}", category.id));
        assert_eq!(ancestry.back, format!("/products/{}", subcategory.id));

        let root = f
            .service
            .resolve_ancestors(EntityKind::Category, category.id)
            .await
            .unwrap();
        assert_eq!(root.crumbs.len(), 1);
        assert_eq!(root.back, CATALOG_ROOT_PATH);
    }

    #[tokio::test]
    async fn test_resolve_ancestors_truncates_at_broken_link() {
        // no relations: the store lets an orphan exist
        let backend = Arc::new(InMemoryBackend::new(Vec::new()));
        let service = CatalogService::new(
            backend.clone(),
            Arc::new(InMemoryBlobStore::new("http://blobs.test")),
            CascadePolicy::Cascade,
        );
        let subcategory_id = Uuid::new_v4();
        let mut record = Record::new();
        record.insert("id".into(), json!(subcategory_id));
        record.insert("name".into(), json!("Vis bois"));
        record.insert("image_url".into(), Value::Null);
        record.insert("category_id".into(), json!(Uuid::new_v4()));
        record.insert("created_at".into(), json!("2025-03-01T10:00:00Z"));
        backend
            .insert(Collection::Subcategories, record)
            .await
            .unwrap();
        let product = service
            .create_child::<Product>(subcategory_id, draft("Vis 4x40"), None)
            .await
            .unwrap();

        let ancestry = service
            .resolve_ancestors(EntityKind::Product, product.id)
            .await
            .unwrap();
        assert!(!ancestry.complete);
        assert_eq!(ancestry.crumbs.len(), 2);
        assert_eq!(ancestry.crumbs[0].kind, EntityKind::Subcategory);
        assert_eq!(ancestry.back, CATALOG_ROOT_PATH);
    }

    #[tokio::test]
    async fn test_update_renames_and_replaces_image() {
        let f = fixture(CascadePolicy::Cascade);
        let category = f
            .service
            .create_category(draft("Visserie"), Some(png()))
            .await
            .unwrap();
        let old_image = category.image_url.clone().unwrap();
        assert!(f.blobs.contains(&old_image).await);

        let updated = f
            .service
            .update(
                EntityKind::Category,
                category.id,
                EntryPatch {
                    name: Some("Visserie & boulonnerie".to_string()),
                    ..Default::default()
                },
                Some(png()),
            )
            .await
            .unwrap();

        let CatalogEntryDto::Category(updated) = updated else {
            panic!("expected a category");
        };
        assert_eq!(updated.name, "Visserie & boulonnerie");
        let new_image = updated.image_url.unwrap();
        assert_ne!(new_image, old_image);
        assert!(f.blobs.contains(&new_image).await);
        assert!(!f.blobs.contains(&old_image).await);
    }

    #[tokio::test]
    async fn test_update_clears_product_code() {
        let f = fixture(CascadePolicy::Cascade);
        let (_, _, product) = seed(&f.service).await;

        f.service
            .update(
                EntityKind::Product,
                product.id,
                EntryPatch {
                    code: Some(String::new()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let product = f.service.get::<Product>(product.id).await.unwrap();
        assert_eq!(product.code, None);
        assert_eq!(product.description.as_deref(), Some("Tête fraisée"));
    }

    #[tokio::test]
    async fn test_update_missing_entity_is_not_found() {
        let f = fixture(CascadePolicy::Cascade);
        let result = f
            .service
            .update(
                EntityKind::Category,
                Uuid::new_v4(),
                EntryPatch {
                    name: Some("Outillage".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_disallowed_image_type() {
        let f = fixture(CascadePolicy::Cascade);
        let upload = ImageUpload {
            content_type: "application/pdf".to_string(),
            ..png()
        };
        let result = f.service.create_category(draft("Visserie"), Some(upload)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
