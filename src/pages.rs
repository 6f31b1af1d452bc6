use actix_web::http::StatusCode;
use actix_web::HttpResponse;

const INDEX_HTML: &str = include_str!("../templates/index.html");
const ERROR_HTML: &str = include_str!("../templates/error.html");

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_error(message: &str) -> String {
    ERROR_HTML.replace("{{ error_message }}", &escape_html(message))
}

pub fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

pub fn error(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(render_error(message))
}
