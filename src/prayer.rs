//! Saudi prayer-time lookup against the aladhan.com schedule API.
//!
//! City names arrive as free text in Arabic, often with regional spelling
//! variants. They are normalized to the English identifiers the provider
//! expects before the request goes out. Lookups never fail: every failure
//! path produces a human-readable Arabic message instead of an error, so
//! callers only discriminate between a schedule and a message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const BASE_URL: &str = "https://api.aladhan.com/v1";
const COUNTRY: &str = "SA";
// Method 4 is Umm al-Qura University, Makkah, standard for KSA.
const METHOD: &str = "4";
const TIMEOUT_SECONDS: u64 = 10;

const TRANSIENT_ERROR: &str =
    "حدث خطأ أثناء محاولة جلب أوقات الصلاة. يرجى المحاولة مرة أخرى.";

/// Spelling variants of Saudi city names mapped to the English identifiers
/// the schedule provider expects.
static CITY_VARIANTS: &[(&str, &str)] = &[
    ("الرياض", "Riyadh"),
    ("رياض", "Riyadh"),
    ("مكة", "Makkah"),
    ("مكة المكرمة", "Makkah"),
    ("المدينة المنورة", "Madinah"),
    ("المدينه", "Madinah"),
    ("مدينة", "Madinah"),
    ("جدة", "Jeddah"),
    ("جده", "Jeddah"),
    ("الدمام", "Dammam"),
    ("دمام", "Dammam"),
    ("الهفوف", "Hofuf"),
    ("الطائف", "Taif"),
    ("طايف", "Taif"),
    ("تبوك", "Tabuk"),
    ("بريدة", "Buraydah"),
    ("خميس مشيط", "Khamis Mushait"),
    ("الجبيل", "Jubail"),
    ("حائل", "Hail"),
    ("حايل", "Hail"),
    ("نجران", "Najran"),
    ("أبها", "Abha"),
    ("ينبع", "Yanbu"),
    ("الخبر", "Khobar"),
    ("عنيزة", "Unayzah"),
    ("عرعر", "Arar"),
    ("سكاكا", "Sakaka"),
    ("جازان", "Jazan"),
];

/// Normalize a user-supplied city name to the provider's English identifier.
///
/// Unrecognized input passes through unchanged so the provider gets a chance
/// to resolve it itself.
pub fn normalize_city(city: &str) -> &str {
    let trimmed = city.trim();
    CITY_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == trimmed)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(city)
}

/// The five daily prayer times, as provider-supplied HH:MM strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrayerTimes {
    pub fajr: String,
    pub dhuhr: String,
    pub asr: String,
    pub maghrib: String,
    pub isha: String,
}

/// Outcome of a lookup: a structured schedule or a localized message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrayerTimesResult {
    Times(PrayerTimes),
    Message(String),
}

/// Client for the aladhan.com prayer-times API
#[derive(Debug, Clone)]
pub struct PrayerTimesClient {
    client: reqwest::Client,
    base_url: String,
}

impl PrayerTimesClient {
    /// Create a client against the public aladhan.com endpoint
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Create a client against a custom endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECONDS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch prayer times for a city in Saudi Arabia.
    ///
    /// Never returns an error: HTTP failures and unresolvable cities become
    /// the "could not find" message, transport failures become the transient
    /// message. The two are distinct strings.
    pub async fn fetch(&self, city: &str) -> PrayerTimesResult {
        let english_city = normalize_city(city);
        debug!(city, english_city, "Fetching prayer times");

        let url = format!(
            "{}/timingsByCity?city={}&country={}&method={}",
            self.base_url,
            urlencoding::encode(english_city),
            COUNTRY,
            METHOD
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Prayer times request failed: {}", e);
                return PrayerTimesResult::Message(TRANSIENT_ERROR.to_string());
            }
        };

        if !response.status().is_success() {
            warn!("Prayer times provider returned {}", response.status());
            return PrayerTimesResult::Message(city_not_found(city));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read prayer times response: {}", e);
                return PrayerTimesResult::Message(TRANSIENT_ERROR.to_string());
            }
        };

        if body["code"].as_u64() == Some(200) {
            match serde_json::from_value::<PrayerTimes>(body["data"]["timings"].clone()) {
                Ok(times) => PrayerTimesResult::Times(times),
                Err(e) => {
                    warn!("Prayer times payload missing timings: {}", e);
                    PrayerTimesResult::Message(city_not_found(city))
                }
            }
        } else {
            PrayerTimesResult::Message(city_not_found(city))
        }
    }
}

impl Default for PrayerTimesClient {
    fn default() -> Self {
        Self::new()
    }
}

fn city_not_found(city: &str) -> String {
    format!(
        "لم أتمكن من العثور على أوقات الصلاة لمدينة \"{}\". يرجى التأكد من اسم المدينة.",
        city
    )
}
