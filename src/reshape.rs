use crate::error::AppError;
use crate::models::{FormatGroups, RequestedFormatRef};
use serde_json::{Map, Value};

/// Top-level probe fields never exposed to clients.
const EXCLUDED_FIELDS: [&str; 6] = [
    "formats",
    "requested_formats",
    "automatic_captions",
    "_filename",
    "_version",
    "subtitles",
];

/// Per-format fields nulled out before exposure.
const NULLED_ENTRY_FIELDS: [&str; 2] = ["http_headers", "fragments"];

/// The grouping key for an entry's vertical resolution. Audio-only streams
/// (no height, or a zero/garbage one) all share the "noresolution" bucket.
fn resolution_key(entry: &Value) -> String {
    match entry.get("height").and_then(Value::as_u64) {
        Some(height) if height > 0 => height.to_string(),
        _ => "noresolution".to_string(),
    }
}

/// Groups the probe's flat format list by (ext, resolution), keeping
/// encounter order within each bucket. Entries without a string `ext` are
/// skipped.
pub fn group_formats(formats: &[Value]) -> FormatGroups {
    let mut groups = FormatGroups::new();
    for entry in formats {
        let Some(object) = entry.as_object() else { continue };
        let Some(ext) = object.get("ext").and_then(Value::as_str) else { continue };

        let mut sanitized = object.clone();
        for field in NULLED_ENTRY_FIELDS {
            if sanitized.contains_key(field) {
                sanitized.insert(field.to_string(), Value::Null);
            }
        }

        groups
            .entry(ext.to_string())
            .or_default()
            .entry(resolution_key(entry))
            .or_default()
            .push(Value::Object(sanitized));
    }
    groups
}

/// Locates each requested format inside the grouped structure by format id.
/// Entries whose bucket or id cannot be found are dropped silently.
pub fn map_requested_formats(requested: &[Value], groups: &FormatGroups) -> Vec<RequestedFormatRef> {
    let mut refs = Vec::new();
    for media in requested {
        let Some(ext) = media.get("ext").and_then(Value::as_str) else { continue };
        let res = resolution_key(media);
        let Some(bucket) = groups.get(ext).and_then(|by_res| by_res.get(&res)) else {
            continue;
        };
        let Some(index) = bucket
            .iter()
            .position(|entry| entry.get("format_id") == media.get("format_id"))
        else {
            continue;
        };
        refs.push(RequestedFormatRef {
            ext: ext.to_string(),
            res,
            width: media.get("width").and_then(Value::as_u64),
            index,
        });
    }
    refs
}

/// Builds the response envelope (without `media`) from raw probe metadata:
/// passthrough top-level fields minus the excluded set, `formats` grouped,
/// `requested_formats` mapped to bucket references.
pub fn reshape(raw: Value) -> Result<Map<String, Value>, AppError> {
    let Value::Object(raw) = raw else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "probe metadata is not a JSON object"
        )));
    };

    let formats = raw
        .get("formats")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("probe metadata has no formats list")))?;

    let groups = group_formats(formats);
    let requested = raw
        .get("requested_formats")
        .and_then(Value::as_array)
        .map(|entries| map_requested_formats(entries, &groups))
        .unwrap_or_default();

    let mut envelope: Map<String, Value> = raw
        .into_iter()
        .filter(|(key, _)| !EXCLUDED_FIELDS.contains(&key.as_str()))
        .collect();
    envelope.insert("formats".to_string(), serde_json::to_value(&groups)?);
    envelope.insert("requested_formats".to_string(), serde_json::to_value(&requested)?);

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_metadata() -> Value {
        json!({
            "id": "abc",
            "title": "A sample clip",
            "uploader": "someone",
            "_filename": "internal.mp4",
            "_version": {"version": "2024.01.01"},
            "automatic_captions": {"en": []},
            "subtitles": {},
            "formats": [
                {"format_id": "140", "ext": "m4a", "height": null,
                 "http_headers": {"User-Agent": "x"}},
                {"format_id": "18", "ext": "mp4", "height": 360, "width": 640,
                 "fragments": [{"url": "frag"}]},
                {"format_id": "22", "ext": "mp4", "height": 360},
                {"format_id": "137", "ext": "mp4", "height": 1080}
            ],
            "requested_formats": [
                {"format_id": "22", "ext": "mp4", "height": 360, "width": 640},
                {"format_id": "140", "ext": "m4a", "height": null}
            ]
        })
    }

    #[test]
    fn groups_by_extension_then_resolution() {
        let raw = sample_metadata();
        let groups = group_formats(raw["formats"].as_array().unwrap());

        assert_eq!(groups["mp4"]["360"].len(), 2);
        assert_eq!(groups["mp4"]["1080"].len(), 1);
        assert_eq!(groups["m4a"]["noresolution"].len(), 1);
    }

    #[test]
    fn bucket_order_matches_encounter_order() {
        let raw = sample_metadata();
        let groups = group_formats(raw["formats"].as_array().unwrap());
        let bucket = &groups["mp4"]["360"];
        assert_eq!(bucket[0]["format_id"], "18");
        assert_eq!(bucket[1]["format_id"], "22");
    }

    #[test]
    fn transport_fields_are_nulled_not_removed() {
        let raw = sample_metadata();
        let groups = group_formats(raw["formats"].as_array().unwrap());

        let audio = &groups["m4a"]["noresolution"][0];
        assert_eq!(audio["http_headers"], Value::Null);
        let video = &groups["mp4"]["360"][0];
        assert_eq!(video["fragments"], Value::Null);
        // Entries that never carried the field do not gain it.
        assert!(groups["mp4"]["1080"][0].get("http_headers").is_none());
    }

    #[test]
    fn zero_or_missing_height_lands_in_noresolution() {
        let formats = vec![
            json!({"format_id": "a", "ext": "webm", "height": 0}),
            json!({"format_id": "b", "ext": "webm"}),
        ];
        let groups = group_formats(&formats);
        assert_eq!(groups["webm"]["noresolution"].len(), 2);
    }

    #[test]
    fn regrouping_a_bucket_reproduces_its_own_key() {
        let raw = sample_metadata();
        let groups = group_formats(raw["formats"].as_array().unwrap());
        for (ext, by_res) in &groups {
            for (res, bucket) in by_res {
                let regrouped = group_formats(bucket);
                assert_eq!(regrouped.len(), 1);
                assert_eq!(regrouped[ext][res].len(), bucket.len());
            }
        }
    }

    #[test]
    fn requested_formats_map_to_bucket_indices() {
        let raw = sample_metadata();
        let groups = group_formats(raw["formats"].as_array().unwrap());
        let refs = map_requested_formats(raw["requested_formats"].as_array().unwrap(), &groups);

        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs[0],
            RequestedFormatRef {
                ext: "mp4".to_string(),
                res: "360".to_string(),
                width: Some(640),
                index: 1,
            }
        );
        assert_eq!(refs[1].ext, "m4a");
        assert_eq!(refs[1].res, "noresolution");
        assert_eq!(refs[1].index, 0);
        assert_eq!(refs[1].width, None);
    }

    #[test]
    fn unmatched_requested_formats_are_dropped_silently() {
        let raw = sample_metadata();
        let groups = group_formats(raw["formats"].as_array().unwrap());
        let requested = vec![
            // id missing from its (mp4, 360) bucket
            json!({"format_id": "999", "ext": "mp4", "height": 360}),
            // bucket does not exist at all
            json!({"format_id": "18", "ext": "mkv", "height": 360}),
        ];
        let refs = map_requested_formats(&requested, &groups);
        assert!(refs.is_empty());
    }

    #[test]
    fn envelope_strips_internal_fields_and_keeps_passthrough() {
        let envelope = reshape(sample_metadata()).unwrap();

        assert_eq!(envelope["id"], "abc");
        assert_eq!(envelope["title"], "A sample clip");
        assert_eq!(envelope["uploader"], "someone");
        assert!(envelope.get("_filename").is_none());
        assert!(envelope.get("_version").is_none());
        assert!(envelope.get("automatic_captions").is_none());
        assert!(envelope.get("subtitles").is_none());

        assert!(envelope["formats"].is_object());
        assert_eq!(envelope["requested_formats"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_requested_formats_defaults_to_empty_list() {
        let raw = json!({
            "id": "abc",
            "formats": [{"format_id": "18", "ext": "mp4", "height": 360}]
        });
        let envelope = reshape(raw).unwrap();
        assert_eq!(envelope["requested_formats"], json!([]));
    }

    #[test]
    fn non_object_metadata_is_an_error() {
        assert!(reshape(json!("not an object")).is_err());
        assert!(reshape(json!({"id": "x"})).is_err());
    }
}
