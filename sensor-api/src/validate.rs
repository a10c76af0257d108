use crate::errors::{Error, Result};
use crate::model::{NewSensor, PageQuery, PageRequest, SensorPatch};

pub const NAME_MAX_LEN: usize = 32;
pub const WINDOW_MIN: i64 = 1;

pub const PAGE_LIMIT_DEFAULT: i64 = 50;
pub const PAGE_LIMIT_MAX: i64 = 100;

fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 {
        return Err(Error::Validation("Sensor name cannot be empty".to_string()));
    }
    if len > NAME_MAX_LEN {
        return Err(Error::Validation(format!(
            "Sensor name must be at most {} characters, got {}",
            NAME_MAX_LEN, len
        )));
    }
    Ok(())
}

fn validate_window(n: i64) -> Result<()> {
    if n < WINDOW_MIN {
        return Err(Error::Validation(format!(
            "Sensor window n must be at least {}, got {}",
            WINDOW_MIN, n
        )));
    }
    Ok(())
}

/// Validates a sensor creation request
pub fn validate_new_sensor(sensor: &NewSensor) -> Result<()> {
    validate_name(&sensor.name)?;
    validate_window(sensor.window())
}

/// Validates only the fields a patch actually carries
pub fn validate_patch(patch: &SensorPatch) -> Result<()> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(n) = patch.n {
        validate_window(n)?;
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
