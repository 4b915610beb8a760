//! Test configuration helpers pointing a session at a mock site

use std::path::Path;
use std::time::Duration;
use novel_dl::Config;

/// Configuration whose site templates target `server_uri`, with millisecond retry delays
pub fn mock_site_config(server_uri: &str, output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = output_dir.to_path_buf();
    config.download.chunk_size = 3;
    config.download.max_workers = 2;

    config.retry.max_attempts = 3;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.max_jitter = Duration::from_millis(2);

    config.fetch.timeout = Duration::from_secs(5);
    config.fetch.transport_attempts = 2;

    config.validation.min_length = 20;

    let templates = &mut config.sites.templates;
    templates.insert(
        "novelfull".to_string(),
        format!("{server_uri}/{{book_name}}/chapter-{{chapter_number}}.html"),
    );
    templates.insert(
        "search".to_string(),
        format!("{server_uri}/search?keyword={{search_term}}"),
    );
    templates.insert(
        "hot_novels".to_string(),
        format!("{server_uri}/hot-novel?page={{page}}"),
    );

    config
}
