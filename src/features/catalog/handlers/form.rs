use axum::extract::Multipart;
use tracing::debug;

use crate::core::error::AppError;
use crate::features::catalog::dtos::{EntryDraft, EntryPatch, ImageUpload};

/// Fields of a catalog multipart form; absent fields stay `None`
#[derive(Debug, Default)]
pub(super) struct CatalogForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub remove_image: bool,
    pub image: Option<ImageUpload>,
}

impl CatalogForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = CatalogForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            debug!("Failed to read multipart field: {}", e);
            AppError::BadRequest(format!("Failed to read multipart data: {}", e))
        })? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "image" => {
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    let file_name = field
                        .file_name()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "image".to_string());
                    let data = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read image data: {}", e))
                    })?;

                    // browsers send an empty part when no file was picked
                    if !data.is_empty() {
                        form.image = Some(ImageUpload {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        });
                    }
                }
                "name" | "description" | "code" | "remove_image" => {
                    let text = field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read {} field: {}", field_name, e))
                    })?;
                    match field_name.as_str() {
                        "name" => form.name = Some(text),
                        "description" => form.description = Some(text),
                        "code" => form.code = Some(text),
                        _ => form.remove_image = matches!(text.trim(), "true" | "1" | "on"),
                    }
                }
                _ => debug!("Ignoring unknown field: {}", field_name),
            }
        }

        Ok(form)
    }

    /// Split into a creation draft; empty description/code count as absent
    pub fn into_draft(self) -> (EntryDraft, Option<ImageUpload>) {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        (
            EntryDraft {
                name: self.name.unwrap_or_default(),
                description: non_empty(self.description),
                code: non_empty(self.code),
            },
            self.image,
        )
    }

    pub fn into_patch(self) -> (EntryPatch, Option<ImageUpload>) {
        (
            EntryPatch {
                name: self.name,
                description: self.description,
                code: self.code,
                remove_image: self.remove_image,
            },
            self.image,
        )
    }
}
