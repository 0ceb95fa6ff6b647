//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for a remote message count and a page size.
///
/// Counts cluster around page-size multiples so the extra-page edge is hit.
pub fn pagination_strategy() -> impl Strategy<Value = (usize, u32)> {
    (1u32..=16).prop_flat_map(|page_size| {
        let page = page_size as usize;
        let around_multiple = (0usize..=5, 0usize..=2)
            .prop_map(move |(pages, extra)| (pages * page + extra).saturating_sub(1));
        (prop_oneof![0usize..=80, around_multiple], Just(page_size))
    })
}

/// Strategy for a placeholder table: total count, window and one sequence.
pub fn media_window_strategy() -> impl Strategy<Value = (i64, usize, u32)> {
    (0usize..200, 0u32..50).prop_flat_map(|(total, window)| {
        let upper = (total as i64).max(1);
        (0..upper, Just(total), Just(window))
    })
}

/// Strategy for plaintext record fields.
pub fn plaintext_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,64}").expect("Invalid regex")
}

/// Strategy for the positions of corrupt records in a list of `len`.
pub fn corrupt_positions_strategy(len: usize) -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(prop::bool::weighted(0.2), len)
}

/// Expected number of message list calls for `count` records served in
/// pages of `page_size`.
///
/// Pagination stops on an empty page or when the running total is not a
/// page-size multiple, so an exact multiple costs one extra call.
pub fn expected_page_calls(count: usize, page_size: u32) -> usize {
    count / page_size as usize + 1
}
