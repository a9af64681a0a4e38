//! Renders a report as HTML through autoescaping [`tera`] templates.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Local, Offset as _, Utc};
use tera::{Context, Tera, Value};

use crate::{
    Result,
    github::{Artifact, format_size},
    report::ReportEntry,
};

/// Shown for an in-use category with no references.
pub const NOT_IN_USE: &str = "❌ No";

/// Shown for a report with no entries.
pub const NOTHING_FOUND: &str = "✅ No unused resources found.";

const REPORT: &str = "report.html";
const PAGE: &str = "page.html";

const REPORT_TEMPLATE: &str = r#"{% if entries | length == 0 -%}
<p>{{ nothing_found }}</p>
{% else -%}
{% for entry in entries -%}
<div class="report-entry">
  <h4>🔍 AMI {{ loop.index }}</h4>
  <ul>
    <li><strong>AMI ID:</strong> {{ entry.ami_id }}</li>
    <li><strong>Created At:</strong> {{ entry.created_at | localize }}</li>
    <li><strong>Snapshots:</strong> {{ entry.snapshot_ids | join(sep=", ") }}</li>
    <li><strong>Volumes:</strong> {{ entry.volumes | join(sep=", ") }}</li>
    <li><strong>Used by EC2:</strong> {% if entry.in_use_by.ec2_instances %}{{ entry.in_use_by.ec2_instances | join(sep=", ") }}{% else %}{{ not_in_use }}{% endif %}</li>
    <li><strong>Used by Auto Scaling Groups:</strong> {% if entry.in_use_by.autoscaling_groups %}{{ entry.in_use_by.autoscaling_groups | join(sep=", ") }}{% else %}{{ not_in_use }}{% endif %}</li>
  </ul>
</div>
{% endfor -%}
{% endif -%}
"#;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
</head>
<body>
<h1>{{ title }}</h1>
<section id="status">
{% for status in statuses -%}
<p>{{ status }}</p>
{% endfor -%}
</section>
{% if artifacts -%}
<section id="artifacts">
<ul>
{% for artifact in artifacts -%}
<li><a href="{{ artifact.archive_download_url }}">{{ artifact.name }}</a> ({{ artifact.size_in_bytes | human_size }})</li>
{% endfor -%}
</ul>
</section>
{% endif -%}
{% if report -%}
<section id="results">
{{ report | safe }}</section>
{% endif -%}
</body>
</html>
"#;

/// Renders report entries with creation times shown in a fixed time zone.
///
/// Rendering is a pure function of the entries and the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlRenderer {
    offset: FixedOffset,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::utc()
    }
}

impl HtmlRenderer {
    /// Shows times in `offset`.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Shows times in UTC.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Shows times in the local time zone as of now.
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Formats an RFC 3339 timestamp in the renderer's time zone, keeping unparseable text as is.
    pub fn localize(&self, timestamp: &str) -> String {
        localize(self.offset, timestamp)
    }

    /// Renders the report body: one block per entry, or an explicit message for an empty report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`](crate::Error::Render) if the template fails to render.
    pub fn render(&self, entries: &[ReportEntry]) -> Result<String> {
        let mut context = Context::new();
        context.insert("entries", entries);
        context.insert("nothing_found", NOTHING_FOUND);
        context.insert("not_in_use", NOT_IN_USE);

        Ok(templates(self.offset)?.render(REPORT, &context)?)
    }
}

fn localize(offset: FixedOffset, timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| time.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| timestamp.to_owned())
}

fn templates(offset: FixedOffset) -> tera::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates([(REPORT, REPORT_TEMPLATE), (PAGE, PAGE_TEMPLATE)])?;

    tera.register_filter("localize", move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
        let text = value
            .as_str()
            .map_or_else(|| value.to_string(), |timestamp| localize(offset, timestamp));
        Ok(Value::String(text))
    });
    tera.register_filter("human_size", |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
        let text = value.as_u64().map_or_else(|| value.to_string(), format_size);
        Ok(Value::String(text))
    });

    Ok(tera)
}

/// Everything shown on the result page.
#[derive(Debug, Clone, Default)]
pub struct Page<'a> {
    pub title: &'a str,
    /// Status lines, oldest first.
    pub statuses: &'a [String],
    pub artifacts: &'a [Artifact],
    /// The rendered report body, if a report was fetched. Inserted without escaping.
    pub report: Option<&'a str>,
}

/// Wraps status lines, artifact links and a report body into a standalone HTML document.
///
/// # Errors
///
/// Returns [`Error::Render`](crate::Error::Render) if the template fails to render.
pub fn render_page(page: &Page<'_>) -> Result<String> {
    let mut context = Context::new();
    context.insert("title", page.title);
    context.insert("statuses", page.statuses);
    context.insert("artifacts", page.artifacts);
    context.insert("report", &page.report);

    Ok(templates(Utc.fix())?.render(PAGE, &context)?)
}
