use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

pub fn now_utc_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}

/// Short form used in history listings; values that do not parse are shown verbatim.
pub fn display_timestamp(value: &str) -> String {
    let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) else {
        return value.to_string();
    };

    parsed
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute] UTC"
        ))
        .unwrap_or_else(|_| value.to_string())
}
