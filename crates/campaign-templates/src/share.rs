//! Referral share links
//!
//! Every link points back at the site with the contact's referral code, and
//! carries a `src` code identifying the platform it was shared from.

use serde::Serialize;
use urlencoding::encode;

/// Platforms a contact can share their referral link on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Twitter,
    Facebook,
    WhatsApp,
    LinkedIn,
    Email,
    Copy,
}

impl Platform {
    /// Tracking code appended as `&src=`
    pub fn code(&self) -> &'static str {
        match self {
            Platform::Twitter => "TW",
            Platform::Facebook => "FB",
            Platform::WhatsApp => "WA",
            Platform::LinkedIn => "LI",
            Platform::Email => "EM",
            Platform::Copy => "CP",
        }
    }
}

/// Referral URL on the campaign site, optionally tagged with a platform
pub fn referral_url(site_url: &str, referral_code: &str, platform: Option<Platform>) -> String {
    let mut url = format!("{}/?ref={}", site_url.trim_end_matches('/'), referral_code);
    if let Some(platform) = platform {
        url.push_str("&src=");
        url.push_str(platform.code());
    }
    url
}

/// Share URLs for one referral code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLinks {
    pub base: String,
    pub twitter: String,
    pub facebook: String,
    pub whatsapp: String,
    pub linkedin: String,
    pub email: String,
    pub sms: String,
}

impl ShareLinks {
    pub fn new(site_url: &str, referral_code: &str, share_text: &str) -> Self {
        let base = referral_url(site_url, referral_code, None);
        let url = encode(&base);
        let text = encode(share_text);

        Self {
            twitter: format!(
                "https://twitter.com/intent/tweet?text={text}&url={url}&hashtags=SaveNorthSwanage,TrafficSafety"
            ),
            facebook: format!("https://www.facebook.com/sharer/sharer.php?u={url}"),
            whatsapp: format!("https://wa.me/?text={text}%20{url}"),
            linkedin: format!("https://www.linkedin.com/sharing/share-offsite/?url={url}"),
            email: format!(
                "mailto:?subject=Traffic%20Survey%20Closes%20Tonight&body={text}%20{url}"
            ),
            sms: format!("sms:?body={text}%20{base}"),
            base,
        }
    }
}
