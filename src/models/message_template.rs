//! SMS message templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholders recognized when rendering a template.
pub const PLACEHOLDERS: [&str; 4] = [
    "{agent_name}",
    "{property_address}",
    "{property_price}",
    "{search_area}",
];

/// Values substituted into a template for one recipient.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub agent_name: String,
    pub property_address: String,
    pub property_price: String,
    pub search_area: String,
}

/// A named message body used by the notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: i32,
    /// Unique template name.
    pub name: String,
    pub body: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            body: body.into(),
            is_default: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Built-in body used when no template is marked default.
    pub fn fallback() -> Self {
        Self::new(
            "builtin",
            "Hi {agent_name}, I'm interested in {property_address} listed at {property_price}. \
             Is it still available?",
        )
    }

    /// Substitute placeholders. Unknown `{...}` sequences are left as-is.
    pub fn render(&self, ctx: &TemplateContext) -> String {
        self.body
            .replace("{agent_name}", &ctx.agent_name)
            .replace("{property_address}", &ctx.property_address)
            .replace("{property_price}", &ctx.property_price)
            .replace("{search_area}", &ctx.search_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let template = MessageTemplate::new(
            "intro",
            "{agent_name}: {property_address} ({property_price}) in {search_area} {unknown}",
        );
        let ctx = TemplateContext {
            agent_name: "Jane Doe".to_string(),
            property_address: "1 Main St".to_string(),
            property_price: "$500,000".to_string(),
            search_area: "San Diego".to_string(),
        };
        assert_eq!(
            template.render(&ctx),
            "Jane Doe: 1 Main St ($500,000) in San Diego {unknown}"
        );
    }

    #[test]
    fn test_fallback_uses_placeholders() {
        let body = MessageTemplate::fallback().body;
        assert!(PLACEHOLDERS.iter().take(3).all(|p| body.contains(p)));
    }
}
