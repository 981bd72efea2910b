use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// PageRequest
///
/// A resolved, always-valid page selection. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Interprets a raw `page` query value the lenient way clients expect:
    /// missing, non-numeric and out-of-range values all select the first page.
    pub fn from_query(raw_page: Option<&str>, per_page: u32) -> Self {
        let page = raw_page
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1);
        Self::new(page, per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Page
///
/// The paginator envelope returned by collection endpoints. `from`/`to` are the
/// 1-based positions of the first and last item on this page, or null when the
/// page is empty.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Page<T> {
    pub current_page: u32,
    pub data: Vec<T>,
    pub first_page_url: String,
    pub from: Option<u64>,
    pub last_page: u32,
    pub last_page_url: String,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: u32,
    pub prev_page_url: Option<String>,
    pub to: Option<u64>,
    pub total: u64,
}

impl<T> Page<T> {
    /// Builds the envelope for `data`, the items of `request` out of `total`
    /// matching rows. `path` is the collection path used for the page links.
    pub fn new(data: Vec<T>, total: u64, request: PageRequest, path: &str) -> Self {
        let per_page = request.per_page;
        let current_page = request.page;
        let last_page = u32::try_from(total.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let first = u64::from(current_page - 1) * u64::from(per_page) + 1;
            (Some(first), Some(first + data.len() as u64 - 1))
        };

        let url = |page: u32| format!("{path}?page={page}");

        Self {
            current_page,
            first_page_url: url(1),
            from,
            last_page,
            last_page_url: url(last_page),
            next_page_url: (current_page < last_page).then(|| url(current_page + 1)),
            path: path.to_string(),
            per_page,
            prev_page_url: (current_page > 1).then(|| url(current_page - 1)),
            to,
            total,
            data,
        }
    }
}
