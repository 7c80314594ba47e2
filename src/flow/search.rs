use crate::engine::{EngineError, EngineResult};
use crate::site::SiteUrls;
use crate::utils::config::SearchConfig;

use super::context::FlowContext;

/// Results URL for the configured keywords and location
pub fn search_url(urls: &SiteUrls, search: &SearchConfig) -> EngineResult<String> {
    let url = url::Url::parse_with_params(
        &urls.search,
        &[
            (urls.keywords_param.as_str(), search.keywords.as_str()),
            (urls.location_param.as_str(), search.location.as_str()),
        ],
    )
    .map_err(|e| EngineError::InvalidProfile(format!("search url '{}': {}", urls.search, e)))?;
    Ok(url.to_string())
}

/// Navigate to the results page; returns the URL opened
pub async fn open_search(ctx: &FlowContext<'_>) -> EngineResult<String> {
    let url = search_url(&ctx.profile.urls, &ctx.config.search)?;
    ctx.emitter.info(format!(
        "Searching '{}' in {}",
        ctx.config.search.keywords, ctx.config.search.location
    ));

    ctx.driver
        .navigate(&url, ctx.config.timeouts.navigation_ms)
        .await
        .map_err(|e| EngineError::SessionFailure(format!("{:#}", e)))?;
    ctx.settle().await;
    Ok(url)
}
