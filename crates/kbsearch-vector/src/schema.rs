use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Row layout shared by the text and image tables. Text rows leave
/// `image_payload` and `description` null; image rows leave `content` null.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("document_name", DataType::Utf8, false),
        Field::new("modality", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, true),
        Field::new("description", DataType::Utf8, true),
        Field::new("image_payload", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}
