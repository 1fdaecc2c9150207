use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire value of `limit` that asks for every row
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Invalid page: must be a positive integer")]
    InvalidPage,
    #[error("Invalid limit: must be a positive integer or -1 for all rows")]
    InvalidLimit,
    #[error("Invalid offset: must be zero or a positive integer")]
    InvalidOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Limited(u32),
    All,
}

/// Which slice of a list the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: PageSize,
}

/// Raw `page`/`limit` query parameters, parsed by hand so malformed values
/// produce the standard error envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn to_request(&self, default_limit: u32) -> Result<PageRequest, PageError> {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref(), default_limit)
    }
}

impl PageRequest {
    pub fn parse(page: Option<&str>, limit: Option<&str>, default_limit: u32) -> Result<Self, PageError> {
        let page = match page.map(str::trim).filter(|s| !s.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(p) if p >= 1 => p,
                _ => return Err(PageError::InvalidPage),
            },
        };

        let size = match limit.map(str::trim).filter(|s| !s.is_empty()) {
            None => PageSize::Limited(default_limit.max(1)),
            Some(raw) => match raw.parse::<i64>() {
                Ok(UNLIMITED) => PageSize::All,
                Ok(n) if n >= 1 && n <= u32::MAX as i64 => PageSize::Limited(n as u32),
                _ => return Err(PageError::InvalidLimit),
            },
        };

        let request = Self { page, size };
        request.checked_offset().ok_or(PageError::InvalidPage)?;
        Ok(request)
    }

    /// Rows skipped before this page, or `None` when it does not fit a SQL
    /// `OFFSET`
    fn checked_offset(&self) -> Option<i64> {
        match self.size {
            PageSize::Limited(n) => i64::from(self.page - 1).checked_mul(i64::from(n)),
            PageSize::All => Some(0),
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self.size {
            PageSize::Limited(n) => Some(n),
            PageSize::All => None,
        }
    }

    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX)
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        match self.size {
            PageSize::Limited(n) => Pagination {
                page: self.page as i64,
                limit: n as i64,
                total,
                pages: (total + n as i64 - 1) / n as i64,
            },
            PageSize::All => Pagination {
                page: 1,
                limit: UNLIMITED,
                total,
                pages: 1,
            },
        }
    }

    /// Apply the page to rows that are already sorted
    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        match self.size {
            PageSize::Limited(n) => rows
                .iter()
                .skip(self.offset() as usize)
                .take(n as usize)
                .cloned()
                .collect(),
            PageSize::All => rows.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

/// Offset window used by the POST search endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchWindow {
    pub limit: i64,
    pub offset: i64,
}

impl SearchWindow {
    pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: u32, max_limit: u32) -> Result<Self, PageError> {
        let limit = match limit {
            None => default_limit as i64,
            Some(n) if n >= 1 => n.min(max_limit as i64),
            Some(_) => return Err(PageError::InvalidLimit),
        };
        let offset = match offset {
            None => 0,
            Some(n) if n >= 0 => n,
            Some(_) => return Err(PageError::InvalidOffset),
        };
        Ok(Self { limit, offset })
    }

    pub fn pagination(&self, total: i64) -> WindowPagination {
        WindowPagination { limit: self.limit, offset: self.offset, total }
    }

    pub fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// `pagination` block of the search endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowPagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}
