//! Limit validation and offset-based page tokens.
//!
//! A page token is the decimal offset of the next raw store result. Tokens
//! are only meaningful while the collection is not modified between calls.

use crate::{
    app::AppError,
    store::{PointId, ScoredPoint},
};

/// Default and maximum number of results per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub default: usize,
    pub max: usize,
}

impl Limits {
    /// Applies the default and rejects limits outside `1..=max`.
    pub fn resolve(&self, requested: Option<usize>) -> Result<usize, AppError> {
        let limit = requested.unwrap_or(self.default);
        if limit == 0 || limit > self.max {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}, got {limit}",
                self.max
            )));
        }
        Ok(limit)
    }
}

pub fn parse_page_token(token: Option<&str>) -> Result<usize, AppError> {
    match token.map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| AppError::Validation(format!("invalid page token {raw:?}"))),
    }
}

/// One page of store hits.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<ScoredPoint>,
    pub next_token: Option<String>,
}

/// Cuts a raw store window (fetched at `offset`) down to `limit` hits.
///
/// `exclude` drops the query's own point. The next token points just past the
/// last raw hit consumed, so consecutive pages neither overlap nor skip hits.
/// The window must hold at least `limit + 1` hits (plus one when excluding)
/// for the next token to be detected.
pub fn paginate(raw: Vec<ScoredPoint>, offset: usize, limit: usize, exclude: Option<PointId>) -> Page {
    let is_excluded = |hit: &ScoredPoint| Some(hit.id) == exclude;

    let mut hits = raw.into_iter();
    let mut items = Vec::with_capacity(limit);
    let mut consumed = 0;

    while items.len() < limit {
        let Some(hit) = hits.next() else { break };
        consumed += 1;
        if !is_excluded(&hit) {
            items.push(hit);
        }
    }

    let has_more = hits.any(|hit| !is_excluded(&hit));

    Page {
        items,
        next_token: has_more.then(|| (offset + consumed).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Payload;

    fn hits(keys: &[&str]) -> Vec<ScoredPoint> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| ScoredPoint {
                id: PointId::from_key(key),
                score: 1.0 - i as f32 * 0.1,
                payload: Payload::new(),
            })
            .collect()
    }

    fn ids(page: &Page) -> Vec<PointId> {
        page.items.iter().map(|hit| hit.id).collect()
    }

    #[test]
    fn test_limits() {
        let limits = Limits { default: 5, max: 100 };
        assert_eq!(limits.resolve(None).unwrap(), 5);
        assert_eq!(limits.resolve(Some(100)).unwrap(), 100);
        assert!(matches!(limits.resolve(Some(0)), Err(AppError::Validation(_))));
        assert!(matches!(limits.resolve(Some(101)), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_page_token() {
        assert_eq!(parse_page_token(None).unwrap(), 0);
        assert_eq!(parse_page_token(Some("")).unwrap(), 0);
        assert_eq!(parse_page_token(Some("15")).unwrap(), 15);
        assert!(matches!(parse_page_token(Some("-1")), Err(AppError::Validation(_))));
        assert!(matches!(parse_page_token(Some("next")), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_paginate_emits_token_when_more_remain() {
        let page = paginate(hits(&["a", "b", "c"]), 0, 2, None);
        assert_eq!(ids(&page), vec![PointId::from_key("a"), PointId::from_key("b")]);
        assert_eq!(page.next_token.as_deref(), Some("2"));
    }

    #[test]
    fn test_paginate_last_page_has_no_token() {
        let page = paginate(hits(&["a", "b"]), 4, 2, None);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn test_paginate_excludes_reference() {
        let page = paginate(hits(&["self", "a", "b", "c"]), 0, 2, Some(PointId::from_key("self")));
        assert_eq!(ids(&page), vec![PointId::from_key("a"), PointId::from_key("b")]);
        // three raw hits consumed, including the reference itself
        assert_eq!(page.next_token.as_deref(), Some("3"));
    }

    #[test]
    fn test_paginate_reference_as_only_remainder() {
        let page = paginate(hits(&["a", "b", "self"]), 0, 2, Some(PointId::from_key("self")));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn test_paginate_offset_is_carried() {
        let page = paginate(hits(&["d", "e", "f"]), 3, 2, None);
        assert_eq!(page.next_token.as_deref(), Some("5"));
    }
}
