//! Pagination algorithm (spec §4.C "Pagination algorithm")
//!
//! A paged operation walks `base_path?limit=L&offset=recd` pages until the
//! server's declared `totalCount` is satisfied, accumulating every page's
//! elements into one output vector in page order.
//!
//! The C reference implementation pre-grows a null-terminated array to
//! `totalCount + 1` slots before copying. In idiomatic Rust this is simply
//! `Vec::reserve`, with no null terminator -- `Vec::len()` is already the
//! count. If the server's `totalCount` grows mid-walk the vector grows with
//! it; if it shrinks, already-accepted elements are never truncated (we only
//! ever push, never resize down), matching the spec's tie-break rule.

use crate::envelope::Pagination;
use crate::error::Result;

/// Drive one paged operation to completion.
///
/// `fetch_page(offset, limit)` must issue exactly one HTTP request for the
/// given window and return the decoded page elements alongside the
/// envelope's pagination metadata. This function stops as soon as
/// `total_count <= offset + limit`, or propagates the first error `fetch_page`
/// returns (including a cancellation-driven `Disabled` error, which ends the
/// walk with no further pages requested).
pub async fn paginate<T, F, Fut>(limit: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: std::future::Future<Output = Result<(Vec<T>, Pagination)>>,
{
    let mut received = 0usize;
    let mut out: Vec<T> = Vec::new();

    loop {
        let (mut page, pagination) = fetch_page(received, limit).await?;

        out.reserve(pagination.total_count.saturating_sub(out.len()));
        received += page.len();
        out.append(&mut page);

        if pagination.total_count <= pagination.offset + pagination.limit {
            return Ok(out);
        }
    }
}

/// Append `&limit=L&offset=O` (or `?limit=L&offset=O` if `base_path` has no
/// query string yet) to `base_path`.
pub fn paged_path(base_path: &str, limit: usize, offset: usize) -> String {
    let sep = if base_path.contains('?') { '&' } else { '?' };
    format!("{base_path}{sep}limit={limit}&offset={offset}")
}
