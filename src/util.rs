/// Utility helpers shared by the collection phases.
///
/// IMPORTANT:
/// - No source-specific logic should live here.
/// - This module must remain lightweight and deterministic.
///
use crate::error::{CollectError, Result};

/// Splits `items` into order-preserving chunks of `size` elements.
///
/// Every chunk has exactly `size` elements except possibly the
/// last one. Concatenating the chunks reproduces `items`.
/// An empty input yields no chunks.
///
/// ERRORS:
/// - `CollectError::Config` if `size` is zero
///
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>> {
    if size == 0 {
        return Err(CollectError::Config(
            "chunk size must be greater than zero".to_string(),
        ));
    }

    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}
