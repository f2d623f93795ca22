use docunit_core::ObjectId;
use serde_json::{json, Value};

pub const PEOPLE: &str = "person";

/// Stored form of a person document
pub fn person_doc(id: ObjectId, name: &str, tags: &[&str]) -> Value {
    json!({
        "_id": id.to_hex(),
        "name": name,
        "tags": tags,
        "address": null,
        "lines": [],
    })
}
