/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Generic "back to catalog" target used when an ancestor chain is broken
pub const CATALOG_ROOT_PATH: &str = "/catalog";

// =============================================================================
// BLOB FOLDERS
// =============================================================================

pub const CATEGORY_IMAGE_FOLDER: &str = "categories";

pub const SUBCATEGORY_IMAGE_FOLDER: &str = "subcategories";

pub const PRODUCT_IMAGE_FOLDER: &str = "products";
