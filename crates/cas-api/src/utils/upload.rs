//! Multipart parsing and validation for resource uploads

use axum::extract::Multipart;
use bytes::Bytes;
use cas_core::AppError;
use cas_storage::{file_extension, sanitize_file_name};

const MAX_TITLE_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_CATEGORY_LEN: usize = 100;

/// Fields of a resource upload form
#[derive(Debug)]
pub struct ResourceUpload {
    pub data: Bytes,
    pub file_name: String,
    pub content_type: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Read the `file`, `title`, `description` and `category` fields.
/// Unknown fields are skipped.
pub async fn extract_resource_upload(mut multipart: Multipart) -> Result<ResourceUpload, AppError> {
    let mut file: Option<(Bytes, String, String)> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut category: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;
                file = Some((data, file_name, content_type));
            }
            "title" | "description" | "category" => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read field '{}': {}", field_name, e))
                })?;
                let value = non_empty(value);
                match field_name.as_str() {
                    "title" => title = value,
                    "description" => description = value,
                    _ => category = value,
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let (data, file_name, content_type) =
        file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    let title = title.ok_or_else(|| AppError::InvalidInput("Title is required".to_string()))?;

    validate_text_len("title", &title, MAX_TITLE_LEN)?;
    if let Some(description) = &description {
        validate_text_len("description", description, MAX_DESCRIPTION_LEN)?;
    }
    if let Some(category) = &category {
        validate_text_len("category", category, MAX_CATEGORY_LEN)?;
    }

    Ok(ResourceUpload {
        data,
        file_name: sanitize_file_name(&file_name),
        content_type,
        title,
        description,
        category,
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_text_len(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::InvalidInput(format!(
            "Field '{}' must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Validate file size
pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size == 0 {
        return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
    }
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Validate the extension against the configured list; returns it lowercased
pub fn validate_file_extension(file_name: &str, allowed: &[String]) -> Result<String, AppError> {
    let extension = file_extension(file_name)
        .ok_or_else(|| AppError::InvalidInput("File has no extension".to_string()))?;

    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        return Err(AppError::InvalidInput(format!(
            "File type '.{}' is not allowed. Allowed: {}",
            extension,
            allowed.join(", ")
        )));
    }

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["pdf".to_string(), "docx".to_string()]
    }

    #[test]
    fn test_validate_file_extension() {
        assert_eq!(validate_file_extension("guide.PDF", &allowed()).unwrap(), "pdf");
        assert!(validate_file_extension("script.exe", &allowed()).is_err());
        assert!(validate_file_extension("README", &allowed()).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(10, 100).is_ok());
        assert!(matches!(
            validate_file_size(0, 100),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_file_size(101, 100),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("  Cardiology ".to_string()).as_deref(), Some("Cardiology"));
        assert!(non_empty("   ".to_string()).is_none());
    }
}
