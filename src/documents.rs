// Flatten derived records into the documents the collection pipeline ingests.

use crate::models::{RedundancyStateMap, ServiceStateMap};
use serde::Serialize;
use serde_json::Value;

pub const SERVICE_DOCUMENT: &str = "service";
pub const REDUNDANCY_DOCUMENT: &str = "redundancy";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub fields: Value,
    pub host: String,
    pub name: &'static str,
}

/// Service records (and the overall rollup) become "service" documents, redundancy
/// records "redundancy" documents. Null fields are left out.
pub fn build_documents(
    services: &ServiceStateMap,
    redundancy: &RedundancyStateMap,
) -> serde_json::Result<Vec<Document>> {
    let mut docs = Vec::new();
    for (host, states) in services {
        for svc in states.services.values() {
            docs.push(document(host, SERVICE_DOCUMENT, serde_json::to_value(svc)?));
        }
        if let Some(overall) = &states.overall {
            docs.push(document(host, SERVICE_DOCUMENT, serde_json::to_value(overall)?));
        }
    }
    for (host, state) in redundancy {
        docs.push(document(host, REDUNDANCY_DOCUMENT, serde_json::to_value(state)?));
    }
    Ok(docs)
}

fn document(host: &str, name: &'static str, mut fields: Value) -> Document {
    if let Value::Object(map) = &mut fields {
        map.retain(|_, v| !v.is_null());
    }
    Document {
        fields,
        host: host.to_string(),
        name,
    }
}

pub fn to_json(docs: &[Document]) -> serde_json::Result<String> {
    serde_json::to_string(docs)
}
