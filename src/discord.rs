use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

use crate::model::Listing;
use crate::render;

pub const NEW_ITEMS_BANNER: &str = "NEW SALE ITEMS";
pub const LAST_CHANCE_BANNER: &str = "LAST CHANCE SALE ITEM";

const EMBED_COLOR: u32 = 0x00ff00;
const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_VALUE_LIMIT: usize = 1024;

/// One labeled value in a listing embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: &'static str,
    pub value: String,
    pub inline: bool,
}

/// Chat-ready shape of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEmbed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    pub image_url: Option<String>,
}

impl ListingEmbed {
    /// Fields in fixed order: Price, Age, Damage, Wear, Operating Time, Time Left, Brand, Category.
    pub fn from_listing(listing: &Listing, image_base_url: &str) -> Self {
        let field = |name, value: String, inline| EmbedField {
            name,
            value,
            inline,
        };
        Self {
            title: listing.name.clone(),
            description: listing.specs.clone(),
            fields: vec![
                field("Price", render::format_price(listing.price), false),
                field("Age", render::format_age(listing.age), true),
                field("Damage", render::format_percent(listing.damage), true),
                field("Wear", render::format_percent(listing.wear), true),
                field(
                    "Operating Time",
                    render::format_hours(listing.operating_hours()),
                    true,
                ),
                field(
                    "Time Left",
                    render::format_time_left(listing.time_left),
                    true,
                ),
                field("Brand", listing.brand.clone(), true),
                field("Category", listing.category.clone(), true),
            ],
            image_url: listing
                .image_file_name()
                .map(|name| render::image_url(image_base_url, name)),
        }
    }
}

/// The chat side of a notification cycle.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_banner(&self, text: &str) -> Result<()>;

    async fn send_listing(&self, embed: &ListingEmbed) -> Result<()>;
}

/// Posts to a Discord channel through an incoming webhook.
#[derive(Clone)]
pub struct DiscordWebhook {
    http: Client,
    endpoint: Url,
}

impl fmt::Debug for DiscordWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The webhook path embeds its token.
        f.debug_struct("DiscordWebhook")
            .field("host", &self.endpoint.host_str())
            .finish_non_exhaustive()
    }
}

impl DiscordWebhook {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid chat endpoint URL")?;
        let http = Client::builder()
            .user_agent("fs-salebot/0.1")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, endpoint })
    }

    pub fn build_request(&self, body: &Value) -> Result<reqwest::Request> {
        self.http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .context("failed to build webhook request")
    }

    async fn execute(&self, body: Value) -> Result<()> {
        let request = self.build_request(&body)?;
        debug!(payload=%body, "sending webhook message");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Discord")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from Discord: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("discord error {}: {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatService for DiscordWebhook {
    async fn send_banner(&self, text: &str) -> Result<()> {
        self.execute(build_banner_payload(text)).await
    }

    async fn send_listing(&self, embed: &ListingEmbed) -> Result<()> {
        self.execute(build_listing_payload(embed)).await
    }
}

pub fn build_banner_payload(text: &str) -> Value {
    json!({ "content": text })
}

pub fn build_listing_payload(embed: &ListingEmbed) -> Value {
    let fields: Vec<Value> = embed
        .fields
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "value": truncate(&f.value, FIELD_VALUE_LIMIT),
                "inline": f.inline,
            })
        })
        .collect();

    let mut e = json!({
        "title": truncate(&embed.title, TITLE_LIMIT),
        "color": EMBED_COLOR,
        "fields": fields,
    });
    if !embed.description.is_empty() {
        e["description"] = json!(truncate(&embed.description, DESCRIPTION_LIMIT));
    }
    if let Some(url) = embed.image_url.as_deref() {
        e["image"] = json!({ "url": url });
    }
    json!({ "embeds": [e] })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        Listing {
            name: "Series 7810".into(),
            price: 150000.0,
            age: 2,
            damage: 0.05,
            wear: 0.1,
            operating_time_minutes: 600.0,
            time_left: 3,
            brand: "JOHNDEERE".into(),
            category: "tractorsL".into(),
            specs: "power: 175".into(),
            image: Some("/srv/images/store_series7810.png".into()),
            reference: "$moddir$FS25_Series7810/series7810.xml".into(),
        }
    }

    #[test]
    fn embed_fields_in_fixed_order() {
        let e = ListingEmbed::from_listing(&listing(), "https://cdn.example/img/");
        let names: Vec<_> = e.fields.iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                "Price",
                "Age",
                "Damage",
                "Wear",
                "Operating Time",
                "Time Left",
                "Brand",
                "Category"
            ]
        );
        assert_eq!(e.fields[0].value, "£150,000.00");
        assert!(!e.fields[0].inline);
        assert_eq!(e.fields[4].value, "10.0 hours");
        assert_eq!(
            e.image_url.as_deref(),
            Some("https://cdn.example/img/store_series7810.png")
        );
    }

    #[test]
    fn listing_payload_shape() {
        let e = ListingEmbed::from_listing(&listing(), "https://cdn.example/img/");
        let body = build_listing_payload(&e);
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "Series 7810");
        assert_eq!(embed["description"], "power: 175");
        assert_eq!(embed["fields"][5]["name"], "Time Left");
        assert_eq!(embed["fields"][5]["value"], "3 hours");
        assert_eq!(
            embed["image"]["url"],
            "https://cdn.example/img/store_series7810.png"
        );
    }

    #[test]
    fn listing_payload_omits_empty_optionals() {
        let mut l = listing();
        l.specs.clear();
        l.image = None;
        let body = build_listing_payload(&ListingEmbed::from_listing(&l, "https://x/"));
        assert!(body["embeds"][0].get("description").is_none());
        assert!(body["embeds"][0].get("image").is_none());
    }

    #[test]
    fn banner_payload_is_plain_content() {
        assert_eq!(
            build_banner_payload(NEW_ITEMS_BANNER),
            json!({ "content": "NEW SALE ITEMS" })
        );
    }

    #[test]
    fn truncates_long_values() {
        let long = "x".repeat(300);
        let t = truncate(&long, TITLE_LIMIT);
        assert_eq!(t.chars().count(), TITLE_LIMIT);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn build_request_posts_json() {
        let client = DiscordWebhook::new("https://discord.com/api/webhooks/1/abc").unwrap();
        let request = client.build_request(&json!({ "content": "hi" })).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/api/webhooks/1/abc");
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
        assert!(!format!("{:?}", client).contains("abc"));
    }
}
