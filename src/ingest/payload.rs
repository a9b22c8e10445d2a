use serde_json::Value;

use super::normalizer::RawRecord;

/// Whole-snapshot payload from the push feed, decoded once at the adapter
/// boundary. Each entry carries the id its position implies.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotPayload {
    Empty,
    /// Array payload; ids are the array indices.
    Sequence(Vec<(String, RawRecord)>),
    /// Object payload; ids are the map keys.
    Keyed(Vec<(String, RawRecord)>),
}

impl SnapshotPayload {
    /// Decode a raw snapshot. Holes in arrays (null entries) and non-object
    /// children are dropped here so the normalizer only ever sees records.
    pub fn decode(value: Option<&Value>) -> Self {
        let payload = match value {
            None | Some(Value::Null) => return SnapshotPayload::Empty,
            Some(Value::Array(items)) => {
                let entries: Vec<_> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| item.as_object().map(|record| (index.to_string(), record.clone())))
                    .collect();
                SnapshotPayload::Sequence(entries)
            }
            Some(Value::Object(map)) => {
                let entries: Vec<_> = map
                    .iter()
                    .filter_map(|(key, item)| item.as_object().map(|record| (key.clone(), record.clone())))
                    .collect();
                SnapshotPayload::Keyed(entries)
            }
            Some(_) => return SnapshotPayload::Empty,
        };

        match &payload {
            SnapshotPayload::Sequence(entries) | SnapshotPayload::Keyed(entries) if entries.is_empty() => {
                SnapshotPayload::Empty
            }
            _ => payload,
        }
    }

    pub fn into_entries(self) -> Vec<(String, RawRecord)> {
        match self {
            SnapshotPayload::Empty => Vec::new(),
            SnapshotPayload::Sequence(entries) | SnapshotPayload::Keyed(entries) => entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SnapshotPayload::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_scalars_are_empty() {
        assert!(SnapshotPayload::decode(None).is_empty());
        assert!(SnapshotPayload::decode(Some(&Value::Null)).is_empty());
        assert!(SnapshotPayload::decode(Some(&json!(42))).is_empty());
        assert!(SnapshotPayload::decode(Some(&json!({}))).is_empty());
    }

    #[test]
    fn arrays_keep_indices_and_skip_holes() {
        let value = json!([null, {"ph": 7}, "junk", {"ph": 8}]);
        let payload = SnapshotPayload::decode(Some(&value));

        let SnapshotPayload::Sequence(entries) = payload else {
            panic!("expected sequence payload");
        };
        let ids: Vec<_> = entries.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn maps_use_keys() {
        let value = json!({"-Nabc": {"ph": 7}, "-Nabd": {"ph": 7.5}});
        let payload = SnapshotPayload::decode(Some(&value));

        let SnapshotPayload::Keyed(entries) = payload else {
            panic!("expected keyed payload");
        };
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|(id, _)| id == "-Nabd"));
    }
}
