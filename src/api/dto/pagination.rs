//! Page-number pagination shared by every list endpoint.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{DisplayFromStr, serde_as};

use crate::domain::repositories::SortOrder;
use crate::error::AppError;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// `page` / `page_size` query parameters.
///
/// Uses `serde_with` so the values parse from query strings even when the
/// struct is flattened into a larger query.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<u32>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl PaginationParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Validates the parameters and converts them to `(offset, limit)`.
    ///
    /// # Validation
    ///
    /// - Page must be > 0
    /// - Page size must be between 1 and 100
    pub fn offset_limit(&self) -> Result<(i64, i64), AppError> {
        let page = self.page();
        let page_size = self.page_size();

        if page == 0 {
            return Err(AppError::bad_request(
                "Page must be greater than 0",
                json!({ "page": page }),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::bad_request(
                format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
                json!({ "page_size": page_size }),
            ));
        }

        let offset = i64::from(page - 1) * i64::from(page_size);
        Ok((offset, i64::from(page_size)))
    }
}

/// List response envelope.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Builds the envelope; `next`/`previous` reuse the request URI with the
    /// `page` parameter replaced.
    pub fn new(results: Vec<T>, count: i64, params: &PaginationParams, uri: &Uri) -> Self {
        let page = params.page();
        let page_size = params.page_size();
        let total_pages = total_pages(count, page_size);

        let next = (page < total_pages).then(|| page_link(uri, page + 1));
        let previous = (page > 1).then(|| page_link(uri, page - 1));

        Self {
            count,
            page,
            page_size,
            total_pages,
            next,
            previous,
            results,
        }
    }
}

fn total_pages(count: i64, page_size: u32) -> u32 {
    if count <= 0 || page_size == 0 {
        return 0;
    }
    let pages = (count as u64).div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

fn page_link(uri: &Uri, page: u32) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(existing) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(existing.as_bytes()) {
            if key != "page" {
                query.append_pair(&key, &value);
            }
        }
    }
    query.append_pair("page", &page.to_string());
    format!("{}?{}", uri.path(), query.finish())
}

/// Parses an `ordering` value against a resource's whitelist.
///
/// An unknown field is a 400 rather than silently ignored.
pub fn parse_ordering(
    value: Option<&str>,
    allowed: &[&'static str],
) -> Result<Option<SortOrder>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => SortOrder::parse(v, allowed).map(Some).ok_or_else(|| {
            AppError::bad_request(
                "Invalid ordering field",
                json!({ "ordering": v, "allowed": allowed }),
            )
        }),
    }
}

/// Trims a free-text filter and drops it when blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Custom Serde deserializer for optional RFC 3339 datetime strings.
pub mod optional_rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
