//! Test fixtures: minimal resource files and multipart forms.

use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;

/// Smallest PDF most readers accept.
pub fn create_minimal_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[]/Count 0>>endobj\n\
trailer<</Root 1 0 R>>\n%%EOF\n"
        .to_vec()
}

/// Multipart body for a resource upload.
pub fn resource_form(title: &str, file_name: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_text("description", "Guide for newly diagnosed patients")
        .add_text("category", "patient-guides")
        .add_part(
            "file",
            Part::bytes(Bytes::from(data))
                .file_name(file_name.to_string())
                .mime_type("application/pdf"),
        )
}
