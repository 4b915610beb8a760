//! Page fixtures for a novelfull-style mock site

/// A well-formed chapter page
pub fn chapter_page(chapter: u32) -> String {
    format!(
        r#"<html><body>
<div class="chapter-nav">Prev | Next</div>
<div id="chapter-content">
  <h2>Chapter {chapter}: The Road</h2>
  <p>The caravan left the city before dawn on day {chapter}.</p>
  <p>Nobody spoke until the walls were out of sight.</p>
</div>
</body></html>"#
    )
}

/// An error page served with a success status
pub const SOFT_ERROR_PAGE: &str = r#"<html><body>
<div id="chapter-content">
  <h2>Notice</h2>
  <p>Chapter not available. Please try again later.</p>
</div>
</body></html>"#;

/// A trending listing page
pub fn listing_page(titles: &[&str]) -> String {
    let mut body = String::from(r#"<html><body><div class="list list-truyen">"#);
    for title in titles {
        let slug = title.to_lowercase().replace(' ', "-");
        body.push_str(&format!(
            r#"<div class="row"><h3 class="truyen-title"><a href="/{slug}.html" title="{title}">{title}</a></h3></div>"#
        ));
    }
    body.push_str("</div></body></html>");
    body
}

/// A search result page with one row per `(title, excerpt)`
pub fn search_page(results: &[(&str, &str)]) -> String {
    let mut body = String::from(r#"<html><body><div class="list list-truyen">"#);
    for (title, excerpt) in results {
        let slug = title.to_lowercase().replace(' ', "-");
        body.push_str(&format!(
            r#"<div class="row">
  <h3 class="truyen-title"><a href="/{slug}.html" title="{title}">{title}</a></h3>
  <div class="excerpt">{excerpt}</div>
</div>"#
        ));
    }
    body.push_str("</div></body></html>");
    body
}
