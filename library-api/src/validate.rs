use crate::errors::{Error, Result};
use crate::model::{NewReview, PageQuery, PageRequest};

pub const REVIEW_NAME_MAX_LEN: usize = 255;

pub const PAGE_LIMIT_DEFAULT: i64 = 50;
pub const PAGE_LIMIT_MAX: i64 = 100;

/// Validates a review creation request
pub fn validate_new_review(review: &NewReview) -> Result<()> {
    if let Some(name) = &review.name {
        let len = name.chars().count();
        if len > REVIEW_NAME_MAX_LEN {
            return Err(Error::Validation(format!(
                "Review name must be at most {} characters, got {}",
                REVIEW_NAME_MAX_LEN, len
            )));
        }
    }
    Ok(())
}

/// Resolves defaults and bounds for `?limit=&offset=`
pub fn page_request(query: &PageQuery) -> Result<PageRequest> {
    let limit = query.limit.unwrap_or(PAGE_LIMIT_DEFAULT);
    if !(1..=PAGE_LIMIT_MAX).contains(&limit) {
        return Err(Error::Validation(format!(
            "limit {} out of range [1, {}]",
            limit, PAGE_LIMIT_MAX
        )));
    }

    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(Error::Validation(format!(
            "offset {} must be non-negative",
            offset
        )));
    }

    Ok(PageRequest { limit, offset })
}
