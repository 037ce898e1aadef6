use crate::config::settings::ServerSettings;
use crate::domain::PageRequest;

/// Page is 1-based; size falls back to the default and is clamped to the maximum
pub fn page_request(
    page: Option<usize>,
    page_size: Option<usize>,
    settings: &ServerSettings,
) -> PageRequest {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(settings.default_page_size)
        .clamp(1, settings.max_page_size);
    PageRequest::new(page, page_size)
}
