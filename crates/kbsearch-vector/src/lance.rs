//! LanceDB-backed [`VectorIndex`]: one table per modality, cosine distance.

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use kbsearch_core::traits::VectorIndex;
use kbsearch_core::types::{Chunk, ImageChunk, Modality, TextChunk, VectorHit};
use kbsearch_core::{Error, Result};

use crate::schema::build_chunk_schema;
use crate::{check_dim, check_write};

fn index_err(e: impl std::fmt::Display) -> Error {
    Error::VectorIndex(e.to_string())
}

#[derive(Debug, Clone)]
struct Collection {
    table: String,
    dim: usize,
}

pub struct LanceVectorIndex {
    conn: Connection,
    collections: HashMap<Modality, Collection>,
}

impl LanceVectorIndex {
    /// Connect to `uri` and create the text and image tables if missing.
    pub async fn open(uri: &str, text_table: &str, text_dim: usize, image_table: &str, image_dim: usize) -> Result<Self> {
        let conn = connect(uri).execute().await.map_err(index_err)?;
        let collections = HashMap::from([
            (Modality::Text, Collection { table: text_table.to_string(), dim: text_dim }),
            (Modality::Image, Collection { table: image_table.to_string(), dim: image_dim }),
        ]);
        let index = Self { conn, collections };
        for c in index.collections.values() {
            index.ensure_table(c).await?;
        }
        tracing::info!(uri, text_table, image_table, "opened lancedb vector index");
        Ok(index)
    }

    async fn ensure_table(&self, c: &Collection) -> Result<()> {
        let names = self.conn.table_names().execute().await.map_err(index_err)?;
        if names.contains(&c.table) {
            return Ok(());
        }
        let schema = build_chunk_schema(dim_i32(c.dim)?);
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        self.conn
            .create_table(&c.table, Box::new(iter))
            .execute()
            .await
            .map_err(index_err)?;
        Ok(())
    }

    fn collection(&self, modality: Modality) -> Result<&Collection> {
        self.collections
            .get(&modality)
            .ok_or_else(|| Error::NotFound(format!("no collection for {}", modality)))
    }

    async fn table(&self, modality: Modality) -> Result<Table> {
        let c = self.collection(modality)?;
        self.conn.open_table(&c.table).execute().await.map_err(index_err)
    }

    pub async fn count(&self, modality: Modality) -> Result<usize> {
        self.table(modality).await?.count_rows(None).await.map_err(index_err)
    }
}

fn dim_i32(dim: usize) -> Result<i32> {
    i32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("embedding dimension {} too large", dim)))
}

fn document_filter(document_id: &str) -> String {
    format!("document_id = '{}'", document_id.replace('\'', "''"))
}

fn chunk_to_batch(chunk: &Chunk, vector: &[f32], dim: i32) -> Result<RecordBatch> {
    let (content, description, payload) = match chunk {
        Chunk::Text(c) => (Some(c.content.as_str()), None, None),
        Chunk::Image(c) => (None, Some(c.description.as_str()), Some(c.image_payload.as_str())),
    };
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        vec![Some(vector.iter().map(|&x| Some(x)).collect::<Vec<_>>())],
        dim,
    );
    RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(vec![chunk.id()])),
            Arc::new(StringArray::from(vec![chunk.document_id()])),
            Arc::new(StringArray::from(vec![chunk.document_name()])),
            Arc::new(StringArray::from(vec![chunk.modality().as_str()])),
            Arc::new(StringArray::from(vec![content])),
            Arc::new(StringArray::from(vec![description])),
            Arc::new(StringArray::from(vec![payload])),
            Arc::new(vectors),
        ],
    )
    .map_err(index_err)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::VectorIndex(format!("column '{}' missing", name)))
}

fn value_or_empty(col: &StringArray, i: usize) -> String {
    if col.is_null(i) {
        String::new()
    } else {
        col.value(i).to_string()
    }
}

fn batch_to_hits(batch: &RecordBatch, modality: Modality) -> Result<Vec<VectorHit>> {
    let ids = string_column(batch, "id")?;
    let doc_ids = string_column(batch, "document_id")?;
    let doc_names = string_column(batch, "document_name")?;
    let contents = string_column(batch, "content")?;
    let descriptions = string_column(batch, "description")?;
    let payloads = string_column(batch, "image_payload")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::VectorIndex("column '_distance' missing".into()))?;

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let id = ids.value(i).to_string();
        let document_id = doc_ids.value(i).to_string();
        let document_name = doc_names.value(i).to_string();
        let chunk = match modality {
            Modality::Text => Chunk::Text(TextChunk { id, document_id, document_name, content: value_or_empty(contents, i) }),
            Modality::Image => Chunk::Image(ImageChunk {
                id,
                document_id,
                document_name,
                image_payload: value_or_empty(payloads, i),
                description: value_or_empty(descriptions, i),
            }),
        };
        hits.push(VectorHit { chunk, score: 1.0 - distances.value(i) });
    }
    Ok(hits)
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(&self, modality: Modality, chunk: &Chunk, vector: &[f32]) -> Result<()> {
        let c = self.collection(modality)?;
        check_write(modality, c.dim, chunk, vector)?;
        let dim = dim_i32(c.dim)?;
        let batch = chunk_to_batch(chunk, vector, dim)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_chunk_schema(dim)));
        let table = self.table(modality).await?;
        // Upsert behavior via merge_insert: id is unique per collection
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await.map_err(index_err)?;
        Ok(())
    }

    async fn query(&self, modality: Modality, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let c = self.collection(modality)?;
        check_dim(modality, c.dim, vector)?;
        let table = self.table(modality).await?;
        if limit == 0 || table.count_rows(None).await.map_err(index_err)? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = table
            .vector_search(vector.to_vec())
            .map_err(index_err)?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(index_err)?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(index_err)? {
            hits.extend(batch_to_hits(&batch, modality)?);
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_document(&self, modality: Modality, document_id: &str) -> Result<usize> {
        let table = self.table(modality).await?;
        let pred = document_filter(document_id);
        let n = table.count_rows(Some(pred.clone())).await.map_err(index_err)?;
        if n > 0 {
            let _ = table.delete(&pred).await.map_err(index_err)?;
        }
        tracing::debug!(%modality, document_id, deleted = n, "deleted document rows");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::document_filter;

    #[test]
    fn filter_escapes_quotes() {
        assert_eq!(document_filter("o'brien"), "document_id = 'o''brien'");
    }
}
