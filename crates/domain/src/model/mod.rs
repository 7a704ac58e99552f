mod actor;
mod apikey;
mod audit;
mod ipfilter;
mod otp;
mod role;
mod session;

pub use actor::*;
pub use apikey::*;
pub use audit::*;
pub use ipfilter::*;
pub use otp::*;
pub use role::*;
pub use session::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pagination
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A page request. Pages are 1-based; `per_page` is clamped by stores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "d_page")]
    pub page: u64,
    #[serde(default = "d_per_page")]
    pub per_page: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: d_page(),
            per_page: d_per_page(),
        }
    }
}

impl PageRequest {
    /// Zero-based offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit())
    }

    /// Effective page size after clamping.
    pub fn limit(&self) -> u64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }
}

pub const MAX_PER_PAGE: u64 = 100;

fn d_page() -> u64 {
    1
}
fn d_per_page() -> u64 {
    20
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
