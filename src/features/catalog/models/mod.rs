mod category;
mod product;
mod subcategory;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

pub use category::Category;
pub use product::Product;
pub use subcategory::Subcategory;

use super::hierarchy::EntityKind;

/// Common view over the three catalog record types
pub trait CatalogEntity: DeserializeOwned + Serialize + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
    /// Id of the owning entity, `None` for categories
    fn parent_id(&self) -> Option<Uuid>;
    fn image_url(&self) -> Option<&str>;

    fn code(&self) -> Option<&str> {
        None
    }
}
