//! Pagination for the `/:list/:sort/:order/:page/:size` list routes.

use serde::Serialize;

use crate::status::ListFilter;

/// Why a list request was refused before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRejection {
    /// Unknown `:list` segment.
    NotFound,
    /// A parameter failed validation; carries the reply message.
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub list: ListFilter,
    pub sort: String,
    pub order: i32,
    pub page: u64,
    pub size: u64,
}

impl ListParams {
    /// Parse the raw path segments. The list guard runs first, then the
    /// parameter rules in declaration order.
    pub fn parse(
        list: &str,
        sort: &str,
        order: &str,
        page: &str,
        size: &str,
    ) -> Result<Self, ListRejection> {
        let list = ListFilter::parse(list).ok_or(ListRejection::NotFound)?;
        if sort.trim().is_empty() {
            return Err(ListRejection::Invalid("Sort key is required"));
        }
        let order = order
            .trim()
            .parse::<i32>()
            .map_err(|_| ListRejection::Invalid("Sort order is required"))?;
        let page = positive(page).ok_or(ListRejection::Invalid("Page is required"))?;
        let size = positive(size).ok_or(ListRejection::Invalid("Size is required"))?;
        // The page window has to fit the store's signed skip.
        (page - 1)
            .checked_mul(size)
            .filter(|skip| i64::try_from(*skip).is_ok())
            .ok_or(ListRejection::Invalid("Page is required"))?;
        Ok(Self {
            list,
            sort: sort.to_string(),
            order,
            page,
            size,
        })
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }

    /// `size` as the store's signed limit.
    pub fn limit(&self) -> i64 {
        i64::try_from(self.size).unwrap_or(i64::MAX)
    }

    pub fn statuses(&self) -> Vec<i32> {
        self.list.values()
    }

    pub fn page_data(&self, total: u64) -> PageData {
        PageData::new(total, self.page, self.size)
    }
}

fn positive(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n >= 1 && i64::try_from(*n).is_ok())
}

/// Pagination block returned next to every list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub total: u64,
    pub total_page: u64,
    pub current_page: u64,
    pub size: u64,
    pub current_size: u64,
}

impl PageData {
    pub fn new(total: u64, page: u64, size: u64) -> Self {
        let total_page = if size == 0 { 0 } else { total.div_ceil(size) };
        Self {
            total,
            total_page,
            current_page: page,
            size,
            current_size: size,
        }
    }

    pub fn with_current_size(mut self, current: usize) -> Self {
        self.current_size = current as u64;
        self
    }
}
