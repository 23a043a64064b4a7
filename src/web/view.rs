//! HTML rendering for the file info page.

use crate::file::FileInfo;

const STYLE: &str = r#"
    :root { --primary: #ffffff; --background: #1a1a1a; --surface: #2d2d2d; --text: #e0e0e0; }
    body { font-family: Arial, sans-serif; background: var(--background); color: var(--text); margin: 0; line-height: 1.6; }
    .header { background: var(--surface); padding: 2rem 1rem; text-align: center; border-bottom: 3px solid var(--primary); }
    .site-title { color: #fff; margin: 0; font-size: 2.5rem; letter-spacing: -1px; }
    .slogan { color: var(--primary); margin: 0.5rem 0 0; font-size: 1.1rem; font-weight: 300; }
    .container { max-width: 800px; margin: 2rem auto; padding: 2rem; background: var(--surface); border-radius: 8px; }
    .file-info { margin: 1.5rem 0; padding: 1.5rem; background: rgba(0,0,0,0.2); border-radius: 6px; word-break: break-all; }
    .button { display: inline-block; background: var(--primary); color: #1a1a1a; padding: 0.8rem 1.5rem; border-radius: 4px; text-decoration: none; }
    .warning { color: #ff6666; margin-top: 2rem; padding: 1rem; background: rgba(255,0,0,0.1); border-radius: 4px; }
    img.preview { max-width: 100%; border-radius: 6px; margin-bottom: 1.5rem; border: 2px solid var(--primary); }
"#;

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the info page for a stored file.
pub fn render_info_page(info: &FileInfo) -> String {
    let name = escape_html(&info.original_name);
    let download_url = format!("/download/{}", urlencoding::encode(&info.id));
    let preview = if info.is_image {
        format!(r#"<img src="{download_url}" class="preview" alt="File preview">"#)
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{name} - CHS Archive</title>
  <style>{STYLE}</style>
</head>
<body>
  <header class="header">
    <h1 class="site-title">CHS ARCHIVE</h1>
    <p class="slogan">Fast and reliable file hosting service</p>
  </header>
  <div class="container">
    {preview}
    <div class="file-info">
      <h2>{name}</h2>
      <p><strong>Size:</strong> {size}</p>
      <p><strong>SHA-256:</strong> {hash}</p>
      <p><strong>Downloads:</strong> {downloads}</p>
    </div>
    <a class="button" href="{download_url}">Download File</a>
    <div class="warning">
      <p>All downloads happen directly in this window.</p>
    </div>
  </div>
</body>
</html>
"#,
        size = info.size_display,
        hash = info.content_hash,
        downloads = info.downloads,
    )
}
