//! CSV rendering for partnership exports.

use chrono::SecondsFormat;

use super::model::Partnership;

pub const CSV_HEADER: [&str; 13] = [
    "ID",
    "Name",
    "Status",
    "Region",
    "Tier",
    "Parent_Partnership",
    "Parent_ID",
    "Source_Type",
    "Source_Link",
    "Point_Contact",
    "Internal_Contact",
    "Created_At",
    "Updated_At",
];

/// Quote a field if it contains a delimiter, quote, or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_line(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| escape(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Render records as CSV with a header row. Missing values are empty.
pub fn render(records: &[Partnership]) -> String {
    let mut out = String::new();
    let header: Vec<String> = CSV_HEADER.iter().map(|h| h.to_string()).collect();
    push_line(&mut out, &header);

    for record in records {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let ts = |v: &Option<chrono::DateTime<chrono::Utc>>| {
            v.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
                .unwrap_or_default()
        };

        push_line(
            &mut out,
            &[
                record.id.clone(),
                record.name.clone(),
                record.status.to_string(),
                record.region.clone(),
                opt(&record.tier),
                opt(&record.parent_name),
                opt(&record.parent_id),
                record.source_type.map(|s| s.to_string()).unwrap_or_default(),
                opt(&record.source_link),
                opt(&record.point_contact),
                opt(&record.internal_contact),
                ts(&record.created_at),
                ts(&record.updated_at),
            ],
        );
    }
    out
}
