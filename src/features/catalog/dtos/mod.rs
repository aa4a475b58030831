mod catalog_dto;

pub use catalog_dto::{
    AncestryDto, CatalogEntryDto, CatalogFormDto, CategoryResponseDto, CrumbDto,
    DeleteEntryResponseDto, EntryDraft, EntryPatch, ImageUpload, ProductResponseDto,
    SubcategoryResponseDto,
};
