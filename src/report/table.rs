//! Renders the pipe-delimited results file as an HTML table.

use tera::{Context, Tera};

use crate::Result;

const TABLE: &str = "results.html";

const TABLE_TEMPLATE: &str = r#"<table id="results-table">
<tbody>
{% for row in rows -%}
<tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
{% endfor -%}
</tbody>
</table>
"#;

/// Splits every non-blank line of `text` on `|` into trimmed cells.
fn rows(text: &str) -> Vec<Vec<&str>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('|').map(str::trim).collect())
        .collect()
}

/// Renders `text` as a results table, one row per non-blank line.
///
/// # Errors
///
/// Returns [`Error::Render`](crate::Error::Render) if the template fails to render.
pub fn render_results_table(text: &str) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template(TABLE, TABLE_TEMPLATE)?;

    let mut context = Context::new();
    context.insert("rows", &rows(text));

    Ok(tera.render(TABLE, &context)?)
}
