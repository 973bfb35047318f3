//! HTML page handler for the relay's live view.
//!
//! The page body is embedded at compile time via `include_str!` and wrapped
//! in a shared base layout.

use axum::response::Html;

const BASE_CSS: &str = r#"* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'Courier New', monospace; background: #0a0a0a; color: #e0e0e0; }
nav { background: #111; border-bottom: 1px solid #333; padding: 8px 16px; }
nav .brand { color: #00ff88; font-weight: bold; font-size: 14px; text-decoration: none; }
.container { padding: 16px; max-width: 480px; }
.card { background: #111; border: 1px solid #333; padding: 16px 24px; border-radius: 4px; }
.card .label { font-size: 12px; color: #888; }
.card .headline { font-size: 32px; color: #00ff88; font-weight: bold; margin: 8px 0; }
.mode { color: #ff8800; margin-left: 8px; }
.dim { color: #888; font-size: 14px; }
table { width: 100%; border-collapse: collapse; font-size: 14px; }
th { color: #888; text-align: left; padding: 4px 0; font-weight: normal; }
td { text-align: right; padding: 4px 0; }
#status { margin-top: 8px; }"#;

const NAV_HTML: &str = r#"<nav><a href="/" class="brand">planeradar</a></nav>"#;

fn render_page(title: &str, body: &str) -> Html<String> {
    let mut s = String::with_capacity(body.len() + BASE_CSS.len() + NAV_HTML.len() + 256);
    s.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    s.push_str("<meta charset=\"UTF-8\">\n");
    s.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    s.push_str("<title>planeradar");
    if !title.is_empty() {
        s.push_str(" - ");
        s.push_str(title);
    }
    s.push_str("</title>\n<style>\n");
    s.push_str(BASE_CSS);
    s.push_str("\n</style>\n</head>\n<body>\n");
    s.push_str(NAV_HTML);
    s.push('\n');
    s.push_str(body);
    s.push_str("\n</body>\n</html>");
    Html(s)
}

pub async fn page_index() -> Html<String> {
    render_page("Closest aircraft", include_str!("../../templates/index.html"))
}
