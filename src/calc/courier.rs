use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Courier {
    Pathao,
    Steadfast,
    Redx,
    Paperfly,
    Sundarban,
}

impl Courier {
    pub const ALL: [Courier; 5] = [
        Courier::Pathao,
        Courier::Steadfast,
        Courier::Redx,
        Courier::Paperfly,
        Courier::Sundarban,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Courier::Pathao => "Pathao",
            Courier::Steadfast => "Steadfast",
            Courier::Redx => "RedX",
            Courier::Paperfly => "Paperfly",
            Courier::Sundarban => "Sundarban",
        }
    }

    fn domain(&self) -> &'static str {
        match self {
            Courier::Pathao => "pathao.com",
            Courier::Steadfast => "steadfast.com.bd",
            Courier::Redx => "redx.com.bd",
            Courier::Paperfly => "paperfly.com.bd",
            Courier::Sundarban => "sundarbancourierltd.com",
        }
    }

    /// Classifies a parcel tracking link by its host.
    pub fn from_tracking_url(url: &str) -> AppResult<Courier> {
        let host = tracking_host(url)
            .ok_or_else(|| AppError::validation(format!("malformed tracking url: {url}")))?;

        Courier::ALL
            .into_iter()
            .find(|courier| {
                let domain = courier.domain();
                host == domain || host.ends_with(&format!(".{domain}"))
            })
            .ok_or_else(|| AppError::validation(format!("unrecognised courier for tracking url: {url}")))
    }
}

fn tracking_host(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split(':').next()?.to_ascii_lowercase();
    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(host.trim_start_matches("www.").to_string())
}
