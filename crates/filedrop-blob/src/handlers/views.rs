//! Minimal HTML pages for the upload form, listing and file view

use crate::services::Flash;

pub fn index_page(flash: Option<&Flash>) -> String {
    layout(
        "Upload a file",
        flash,
        r#"<form method="post" action="/upload">
  <label for="filename">Filename</label>
  <input type="text" id="filename" name="filename" required>
  <label for="file_content">Content</label>
  <textarea id="file_content" name="file_content" rows="12" required></textarea>
  <button type="submit">Upload</button>
</form>
<p><a href="/files">Browse stored files</a></p>"#,
    )
}

pub fn files_page(names: &[String], flash: Option<&Flash>) -> String {
    let body = if names.is_empty() {
        "<p>No files uploaded yet.</p>".to_string()
    } else {
        let items: String = names
            .iter()
            .map(|name| {
                format!(
                    "  <li><a href=\"/files/{}\">{}</a></li>\n",
                    urlencoding::encode(name),
                    escape_html(name)
                )
            })
            .collect();
        format!("<ul>\n{}</ul>", items)
    };

    layout(
        "Stored files",
        flash,
        &format!("{}\n<p><a href=\"/\">Upload another file</a></p>", body),
    )
}

pub fn file_page(name: &str, content: &str, flash: Option<&Flash>) -> String {
    layout(
        &escape_html(name),
        flash,
        &format!(
            "<pre>{}</pre>\n<p><a href=\"/files\">Back to files</a></p>",
            escape_html(content)
        ),
    )
}

fn layout(title: &str, flash: Option<&Flash>, body: &str) -> String {
    let flash = flash
        .map(|f| {
            format!(
                "<div class=\"flash flash-{}\">{}</div>\n",
                f.level.as_str(),
                escape_html(&f.message)
            )
        })
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{flash}{body}\n</body>\n</html>\n",
        title = title,
        flash = flash,
        body = body
    )
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
