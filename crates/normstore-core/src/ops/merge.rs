use serde_json::Value;

use crate::model::{Field, Fields, Record};

/// Merge a partial update into a stored record along the schema tree
///
/// Attributes present in `update` overwrite the stored value; absent keys are
/// left alone. Relation fields are never touched. Groups recurse, and a group
/// missing from the stored record is created from the update's sub-record.
pub fn merge_recursive(stored: &mut Record, update: &Record, fields: &Fields) {
    for (key, field) in fields.iter() {
        let Some(incoming) = update.get(key) else {
            continue;
        };

        match field {
            Field::Attr(_) => {
                stored.insert(key.to_string(), incoming.clone());
            }
            Field::Relation(_) => {}
            Field::Group(sub) => {
                let Some(incoming) = incoming.as_object() else {
                    continue;
                };
                let slot = stored
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(Record::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Record::new());
                }
                if let Value::Object(nested) = slot {
                    merge_recursive(nested, incoming, sub);
                }
            }
        }
    }
}
