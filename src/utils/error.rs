//! Error types shared by the report helpers

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Unknown time zone identifier or unreadable transition data
    #[error("time zone data unavailable for {zone:?}: {message}")]
    TimezoneData { zone: String, message: String },

    /// A `from`/`to` bound that is not a recognizable date
    #[error("cannot parse date {input:?}")]
    DateParse { input: String },

    /// The period sub-select failed to execute
    #[error("period sub-select failed: {0}")]
    SubQuery(#[source] rusqlite::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ReportError {
    pub fn timezone(zone: &str, message: impl ToString) -> Self {
        ReportError::TimezoneData {
            zone: zone.to_string(),
            message: message.to_string(),
        }
    }

    pub fn date_parse(input: &str) -> Self {
        ReportError::DateParse {
            input: input.to_string(),
        }
    }
}
