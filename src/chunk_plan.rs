use crate::document::{classify, DocumentShape};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Planner output for one source file: submit the document as-is, or split
/// it into bounded chunks.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    Whole(Value),
    Chunked(ChunkPlan),
}

#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub source: String,
    pub shape: DocumentShape,
    /// Non-list top-level fields, replicated onto every chunk payload and
    /// re-attached when responses are merged.
    pub template: Map<String, Value>,
    pub chunks: Vec<ChunkSlice>,
    pub total_items: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkSlice {
    /// 1-based, gapless.
    pub index: u32,
    pub items: Vec<Value>,
}

/// Pure and total: any JSON value comes back as a work unit, never an error.
/// A list of exactly `threshold` items is not split.
pub fn plan(source: &str, doc: Value, list_field: &str, threshold: usize) -> WorkUnit {
    let threshold = threshold.max(1);
    let shape = classify(&doc, list_field);

    match (shape, doc) {
        (DocumentShape::ObjectWithList { field }, Value::Object(mut map)) => {
            let items = match map.remove(&field) {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    map.insert(field, other);
                    return WorkUnit::Whole(Value::Object(map));
                }
                None => return WorkUnit::Whole(Value::Object(map)),
            };
            if items.len() <= threshold {
                map.insert(field, Value::Array(items));
                return WorkUnit::Whole(Value::Object(map));
            }
            WorkUnit::Chunked(ChunkPlan::split(
                source,
                DocumentShape::ObjectWithList { field },
                map,
                items,
                threshold,
            ))
        }
        (DocumentShape::RootList, Value::Array(items)) => {
            if items.len() <= threshold {
                return WorkUnit::Whole(Value::Array(items));
            }
            WorkUnit::Chunked(ChunkPlan::split(
                source,
                DocumentShape::RootList,
                Map::new(),
                items,
                threshold,
            ))
        }
        (_, doc) => WorkUnit::Whole(doc),
    }
}

impl ChunkPlan {
    fn split(
        source: &str,
        shape: DocumentShape,
        template: Map<String, Value>,
        mut items: Vec<Value>,
        threshold: usize,
    ) -> ChunkPlan {
        let total_items = items.len();
        let mut chunks = Vec::with_capacity(total_items.div_ceil(threshold));
        let mut index = 0u32;

        while !items.is_empty() {
            let take = threshold.min(items.len());
            let rest = items.split_off(take);
            index += 1;
            chunks.push(ChunkSlice { index, items });
            items = rest;
        }

        ChunkPlan {
            source: source.to_string(),
            shape,
            template,
            chunks,
            total_items,
        }
    }

    pub fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Builds the request body for one chunk: the template fields, the item
    /// slice, and a `chunk_info` block the endpoint echoes back.
    pub fn request_payload(&self, slice: &ChunkSlice) -> Value {
        let chunk_info = json!({
            "original_file": self.source,
            "chunk_index": slice.index,
            "total_chunks": self.total_chunks(),
            "items_in_chunk": slice.items.len(),
        });

        match &self.shape {
            DocumentShape::ObjectWithList { field } => {
                let mut map = self.template.clone();
                map.insert(field.clone(), Value::Array(slice.items.clone()));
                map.insert("chunk_info".to_string(), chunk_info);
                Value::Object(map)
            }
            // Bare root lists get wrapped so chunk_info can travel alongside
            // the slice.
            _ => json!({
                "data": slice.items,
                "chunk_info": chunk_info,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanDigest {
    pub source: String,
    pub strategy: String,
    pub total_items: Option<usize>,
    pub total_chunks: u32,
    pub chunks: Vec<ChunkDigest>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDigest {
    pub chunk_index: u32,
    pub item_count: usize,
}

impl WorkUnit {
    /// Printable summary without the item payloads.
    pub fn digest(&self, source: &str) -> PlanDigest {
        match self {
            WorkUnit::Whole(doc) => PlanDigest {
                source: source.to_string(),
                strategy: "whole".to_string(),
                total_items: doc.as_array().map(|a| a.len()),
                total_chunks: 1,
                chunks: Vec::new(),
            },
            WorkUnit::Chunked(plan) => PlanDigest {
                source: source.to_string(),
                strategy: "chunked".to_string(),
                total_items: Some(plan.total_items),
                total_chunks: plan.total_chunks(),
                chunks: plan
                    .chunks
                    .iter()
                    .map(|c| ChunkDigest {
                        chunk_index: c.index,
                        item_count: c.items.len(),
                    })
                    .collect(),
            },
        }
    }
}
