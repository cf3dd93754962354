//! User-Agent selection for provider requests.

pub const USER_AGENT: &str = concat!("listingscout/", env!("CARGO_PKG_VERSION"));

/// Keyword that picks one of [`BROWSER_USER_AGENTS`] per client.
pub const BROWSER_KEYWORD: &str = "browser";

/// Desktop browser agents, for providers that reject unknown clients.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:129.0) Gecko/20100101 Firefox/129.0",
];

/// `None` gives the crate's own agent, [`BROWSER_KEYWORD`] a random
/// browser agent, anything else is sent as-is.
pub fn resolve_user_agent(configured: Option<&str>) -> String {
    use rand::seq::SliceRandom;

    match configured.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some(BROWSER_KEYWORD) => BROWSER_USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENT)
            .to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_custom_agents() {
        assert!(resolve_user_agent(None).starts_with("listingscout/"));
        assert!(resolve_user_agent(Some("  ")).starts_with("listingscout/"));
        assert_eq!(resolve_user_agent(Some("ScoutBot/2.0")), "ScoutBot/2.0");
    }

    #[test]
    fn test_browser_keyword_picks_known_agent() {
        let agent = resolve_user_agent(Some("browser"));
        assert!(BROWSER_USER_AGENTS.contains(&agent.as_str()));
    }
}
