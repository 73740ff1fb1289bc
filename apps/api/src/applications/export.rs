use crate::models::application::Application;

const HEADER: [&str; 10] = [
    "company_name",
    "job_title",
    "location",
    "url",
    "date_applied",
    "source",
    "status",
    "notes",
    "created_at",
    "updated_at",
];

/// Renders applications as a flat CSV document (RFC 4180 quoting, CRLF rows).
pub fn render_csv(applications: &[Application]) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().copied());

    for app in applications {
        let date_applied = app.date_applied.format("%Y-%m-%d").to_string();
        let created_at = app.created_at.to_rfc3339();
        let updated_at = app.updated_at.to_rfc3339();
        push_row(
            &mut out,
            [
                app.company_name.as_str(),
                app.job_title.as_str(),
                app.location.as_str(),
                app.url.as_str(),
                date_applied.as_str(),
                app.source.as_str(),
                app.status.as_str(),
                app.notes.as_str(),
                created_at.as_str(),
                updated_at.as_str(),
            ],
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
