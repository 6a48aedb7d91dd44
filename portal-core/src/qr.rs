//! QR code payloads and the admin board that lists one code per site.

use crate::api::{PortalClient, Transport};
use crate::error::ApiResult;
use crate::model::{EntityId, Site};
use crate::upload::decode_data_url;
use futures::future::join_all;
use serde::Serialize;

const PNG_DATA_PREFIX: &str = "data:image/png;base64,";

/// Normalized answer of `GET /sites/{id}/qr_code/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QrCode {
    /// Always a `data:` URL, ready for an `<img src>`.
    pub image: String,
    pub public_url: String,
    pub site_name: Option<String>,
}

impl QrCode {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, String> {
        let raw = payload
            .get("qr_code")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "qr payload without qr_code".to_string())?;
        let image = if raw.starts_with("data:") {
            raw.to_string()
        } else {
            format!("{PNG_DATA_PREFIX}{}", raw.trim())
        };
        let public_url = ["public_url", "url"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(serde_json::Value::as_str))
            .unwrap_or_default()
            .to_string();
        let site_name = payload
            .get("site_name")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);
        Ok(Self {
            image,
            public_url,
            site_name,
        })
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>, String> {
        decode_data_url(&self.image).map(|(_, bytes)| bytes)
    }
}

/// `<site name>-qr-code.png`, with path separators and blanks made safe.
pub fn download_filename(site_name: &str) -> String {
    let stem: String = site_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() { "site".to_string() } else { stem };
    format!("{stem}-qr-code.png")
}

#[derive(Clone, Debug, PartialEq)]
pub enum QrEntry {
    Ready(QrCode),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SiteQr {
    pub site: Site,
    pub entry: QrEntry,
}

impl SiteQr {
    pub fn download_filename(&self) -> String {
        download_filename(&self.site.name)
    }
}

/// Every site with its QR code. A failing lookup only marks its own card.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QrBoard {
    pub cards: Vec<SiteQr>,
}

impl QrBoard {
    pub async fn load<T: Transport>(client: &PortalClient<T>) -> ApiResult<Self> {
        let mut sites = client.sites().await?;
        sites.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        let lookups = sites.iter().map(|site| client.site_qr_code(&site.id));
        let results = join_all(lookups).await;

        let mut cards = Vec::with_capacity(sites.len());
        for (site, result) in sites.into_iter().zip(results) {
            let entry = match result {
                Ok(code) => QrEntry::Ready(code),
                Err(err) if err.is_unauthorized() => return Err(err),
                Err(err) => QrEntry::Failed(err.user_message()),
            };
            cards.push(SiteQr { site, entry });
        }
        Ok(Self { cards })
    }

    pub fn card(&self, site: &EntityId) -> Option<&SiteQr> {
        self.cards.iter().find(|c| &c.site.id == site)
    }
}
