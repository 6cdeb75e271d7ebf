//! Purpose: Bidirectional conversion between JSON date text and timestamps.
//! Exports: `parse_timestamp`, `format_timestamp`, `TimestampStyle`, `NULL_TIMESTAMP`, epoch helpers.
//! Role: The one place that knows every accepted date shape and every emitted date form.
//! Invariants: Parse attempts run in a fixed order; the first successful form wins.
//! Invariants: An 8-character `hh:mm:ss` is a time-of-day, never a date.
//! Invariants: Offset-suffixed forms keep the instant of the text read as UTC and attach the offset.

use std::sync::OnceLock;

use time::format_description::well_known::Rfc3339;
use time::format_description::{self, BorrowedFormatItem};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{Error, ErrorKind};
use crate::options::{JsonOptions, SerializationOptions};

/// Sentinel for "no timestamp", used by the skip rules.
pub const NULL_TIMESTAMP: OffsetDateTime = OffsetDateTime::UNIX_EPOCH;

const JS_DATE_START: &str = "new Date(";
const WRAPPED_START: &str = "/Date(";
const WRAPPED_START_ESCAPED: &str = "\\/Date(";

pub(crate) fn from_epoch_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).ok()
}

pub(crate) fn to_epoch_millis(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

fn seconds_items() -> &'static [BorrowedFormatItem<'static>] {
    static ITEMS: OnceLock<Vec<BorrowedFormatItem<'static>>> = OnceLock::new();
    ITEMS.get_or_init(|| {
        format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]")
            .unwrap_or_default()
    })
}

fn fraction_utc_items() -> &'static [BorrowedFormatItem<'static>] {
    static ITEMS: OnceLock<Vec<BorrowedFormatItem<'static>>> = OnceLock::new();
    ITEMS.get_or_init(|| {
        format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z")
            .unwrap_or_default()
    })
}

fn seconds_utc_items() -> &'static [BorrowedFormatItem<'static>] {
    static ITEMS: OnceLock<Vec<BorrowedFormatItem<'static>>> = OnceLock::new();
    ITEMS.get_or_init(|| {
        format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]Z")
            .unwrap_or_default()
    })
}

fn fraction_items() -> &'static [BorrowedFormatItem<'static>] {
    static ITEMS: OnceLock<Vec<BorrowedFormatItem<'static>>> = OnceLock::new();
    ITEMS.get_or_init(|| {
        format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]")
            .unwrap_or_default()
    })
}

/// Converts the JSON text representation of a date to a timestamp, trying
/// each accepted shape in order. Returns `None` when no shape matches.
pub fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    let mut text = text.trim();
    if text.len() > 2 && text.starts_with('"') && text.ends_with('"') {
        text = &text[1..text.len() - 1];
    }
    if text.is_empty() {
        return None;
    }
    // Every accepted shape is ASCII; anything else can only be RFC 3339.
    if !text.is_ascii() {
        return OffsetDateTime::parse(text, &Rfc3339).ok();
    }

    // 1. the explicitly wrapped epoch forms
    if let Some(parsed) = parse_wrapped_forms(text) {
        return Some(parsed);
    }

    let bytes = text.as_bytes();

    // 2. strict UTC shapes ending in Z
    if text.len() > 1 && (text.ends_with('Z') || text.ends_with('z')) {
        if let Ok(parsed) = PrimitiveDateTime::parse(text, fraction_utc_items()) {
            return Some(parsed.assume_utc());
        }
        if let Ok(parsed) = PrimitiveDateTime::parse(text, seconds_utc_items()) {
            return Some(parsed.assume_utc());
        }
        // yyyy-mm-ddThh:mmZ (minute precision)
        if text.len() == 17
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && (bytes[10] == b'T' || bytes[10] == b't')
            && bytes[13] == b':'
            && let Some(parsed) = parse_dashed_minutes(text)
        {
            return Some(parsed.assume_utc());
        }
        // yyyymmddThh:mm:ssZ
        if text.len() == 18
            && let Some(parsed) = parse_compact(&text[..17])
        {
            return Some(parsed.assume_utc());
        }
    }

    // 3. yyyy-mm-ddThh:mm:ss with optional +HHMM/-HHMM suffix
    if text.len() >= 19
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && (bytes[10] == b'T' || bytes[10] == b't')
        && bytes[13] == b':'
        && bytes[16] == b':'
    {
        if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
            return Some(parsed);
        }
        if let Ok(parsed) = PrimitiveDateTime::parse(text, fraction_items()) {
            return Some(parsed.assume_utc());
        }
        if let Some(relative) = text[19..].find(['+', '-']) {
            let at = 19 + relative;
            if let Ok(raw) = text[at + 1..].trim().parse::<i32>()
                && let Ok(base) = PrimitiveDateTime::parse(text[..at].trim(), seconds_items())
                && let Some(offset) = offset_from_hhmm(raw, bytes[at] == b'-')
            {
                return Some(base.assume_utc().to_offset(offset));
            }
        } else if text.len() == 19
            && let Ok(parsed) = PrimitiveDateTime::parse(text, seconds_items())
        {
            return Some(parsed.assume_utc());
        }
    }

    // 4. compact yyyymmddThh:mm:ss
    if text.len() == 17
        && let Some(parsed) = parse_compact(text)
    {
        return Some(parsed.assume_utc());
    }

    // 5. a bare hh:mm:ss is a time span, not a date
    if text.len() == 8 && bytes[2] == b':' && bytes[5] == b':' {
        return None;
    }

    // 6. generic locale-invariant fallback
    OffsetDateTime::parse(text, &Rfc3339).ok()
}

/// The explicitly wrapped epoch forms only: `new Date(N)` and
/// `/Date(N[+-HHMM])/` (escaped or not). These parse even when bare date
/// text detection is turned off.
pub(crate) fn parse_wrapped_forms(text: &str) -> Option<OffsetDateTime> {
    if let Some(body) = text
        .strip_prefix(JS_DATE_START)
        .and_then(|rest| rest.strip_suffix(')'))
        && let Ok(millis) = body.trim().parse::<i64>()
    {
        return from_epoch_millis(millis);
    }
    let body = strip_wrapped(text)?;
    let start = usize::from(body.starts_with(['+', '-']));
    let (millis_text, offset) = match body[start..].find(['+', '-']) {
        Some(relative) => {
            let at = start + relative;
            let negative = body.as_bytes()[at] == b'-';
            let raw = body[at + 1..].trim().parse::<i32>().ok()?;
            (body[..at].trim(), Some(offset_from_hhmm(raw, negative)?))
        }
        None => (body.trim(), None),
    };
    let timestamp = from_epoch_millis(millis_text.parse::<i64>().ok()?)?;
    Some(match offset {
        Some(offset) => timestamp.to_offset(offset),
        None => timestamp,
    })
}

fn strip_wrapped(text: &str) -> Option<&str> {
    let rest = if starts_with_ignore_case(text, WRAPPED_START_ESCAPED) {
        &text[WRAPPED_START_ESCAPED.len()..]
    } else if starts_with_ignore_case(text, WRAPPED_START) {
        &text[WRAPPED_START.len()..]
    } else {
        return None;
    };
    rest.strip_suffix(")\\/").or_else(|| rest.strip_suffix(")/"))
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn offset_from_hhmm(raw: i32, negative: bool) -> Option<UtcOffset> {
    let hours = (raw / 100) as i8;
    let minutes = (raw % 100) as i8;
    let (hours, minutes) = if negative {
        (-hours, -minutes)
    } else {
        (hours, minutes)
    };
    UtcOffset::from_hms(hours, minutes, 0).ok()
}

fn parse_dashed_minutes(text: &str) -> Option<PrimitiveDateTime> {
    build_datetime(
        text.get(0..4)?,
        text.get(5..7)?,
        text.get(8..10)?,
        text.get(11..13)?,
        text.get(14..16)?,
        "0",
    )
}

fn parse_compact(text: &str) -> Option<PrimitiveDateTime> {
    let bytes = text.as_bytes();
    if text.len() != 17
        || !(bytes[8] == b'T' || bytes[8] == b't')
        || bytes[11] != b':'
        || bytes[14] != b':'
    {
        return None;
    }
    build_datetime(
        &text[0..4],
        &text[4..6],
        &text[6..8],
        &text[9..11],
        &text[12..14],
        &text[15..17],
    )
}

fn build_datetime(
    year: &str,
    month: &str,
    day: &str,
    hour: &str,
    minute: &str,
    second: &str,
) -> Option<PrimitiveDateTime> {
    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let date = Date::from_calendar_date(year, month, day.parse().ok()?).ok()?;
    let time = Time::from_hms(
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
    )
    .ok()?;
    Some(PrimitiveDateTime::new(date, time))
}

/// The timestamp output form selected by the serialization flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimestampStyle {
    /// `new Date(epoch-milliseconds)`, unquoted.
    JsEpoch,
    /// The custom `time` format description from the options.
    Custom,
    /// `yyyy-mm-ddThh:mm:ss` with an offset suffix for non-UTC values.
    IsoShort,
    /// RFC 3339 round-trip text.
    RoundTrip,
    /// `\/Date(N[+-HHMM])\/` with an offset suffix for non-UTC values.
    Wrapped,
}

pub(crate) fn style_for(options: &JsonOptions) -> TimestampStyle {
    let flags = options.serialization;
    if flags.contains(SerializationOptions::DATE_FORMAT_JS) {
        TimestampStyle::JsEpoch
    } else if flags.contains(SerializationOptions::DATE_FORMAT_CUSTOM)
        && options.timestamp_format.is_some()
    {
        TimestampStyle::Custom
    } else if flags.contains(SerializationOptions::DATE_FORMAT_ISO8601) {
        TimestampStyle::IsoShort
    } else if flags.contains(SerializationOptions::DATE_FORMAT_ROUNDTRIP) {
        TimestampStyle::RoundTrip
    } else {
        TimestampStyle::Wrapped
    }
}

/// `+HHMM`/`-HHMM` suffix for a non-UTC offset, `None` for UTC.
pub(crate) fn offset_suffix(timestamp: OffsetDateTime) -> Option<String> {
    let offset = timestamp.offset();
    if offset.is_utc() {
        return None;
    }
    let (hours, minutes, _) = offset.as_hms();
    Some(format!(
        "{}{:02}{:02}",
        if offset.is_negative() { '-' } else { '+' },
        hours.abs(),
        minutes.abs()
    ))
}

/// Formats the UTC instant of `timestamp` in the given style. The offset
/// suffix of the `IsoShort` and `Wrapped` styles is appended by the writer,
/// which owns quoting.
pub fn format_timestamp(
    timestamp: OffsetDateTime,
    style: TimestampStyle,
    custom: Option<&str>,
) -> Result<String, Error> {
    let utc = timestamp.to_offset(UtcOffset::UTC);
    match style {
        TimestampStyle::JsEpoch => Ok(format!("new Date({})", to_epoch_millis(timestamp))),
        TimestampStyle::Custom => {
            let description = custom.ok_or_else(|| {
                Error::new(ErrorKind::Conversion)
                    .with_message("custom timestamp format requested but none configured")
            })?;
            let items = format_description::parse(description).map_err(|e| {
                Error::new(ErrorKind::Conversion)
                    .with_message(format!("invalid timestamp format '{description}'"))
                    .with_source(e)
            })?;
            utc.format(items.as_slice()).map_err(|e| {
                Error::new(ErrorKind::Conversion)
                    .with_message("cannot format timestamp")
                    .with_source(e)
            })
        }
        TimestampStyle::IsoShort => utc.format(seconds_items()).map_err(|e| {
            Error::new(ErrorKind::Conversion)
                .with_message("cannot format timestamp")
                .with_source(e)
        }),
        TimestampStyle::RoundTrip => utc.format(&Rfc3339).map_err(|e| {
            Error::new(ErrorKind::Conversion)
                .with_message("cannot format timestamp")
                .with_source(e)
        }),
        TimestampStyle::Wrapped => Ok(to_epoch_millis(timestamp).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        format_timestamp, from_epoch_millis, offset_suffix, parse_timestamp, to_epoch_millis,
        TimestampStyle,
    };
    use time::{OffsetDateTime, UtcOffset};

    fn instant(text: &str) -> OffsetDateTime {
        parse_timestamp(text).expect(text)
    }

    #[test]
    fn parses_js_date_wrapper() {
        let ts = instant("new Date(86400000)");
        assert_eq!(ts.unix_timestamp(), 86_400);
    }

    #[test]
    fn parses_strict_utc_shapes() {
        let base = instant("2012-02-21T17:07:14Z");
        assert_eq!(to_epoch_millis(base), 1_329_844_034_000);
        assert_eq!(to_epoch_millis(instant("2012-02-21T17:07:14.250Z")), 1_329_844_034_250);
        assert_eq!(instant("2012-02-21T17:07Z").unix_timestamp(), base.unix_timestamp() - 14);
        assert_eq!(instant("20120221T17:07:14Z"), base);
    }

    #[test]
    fn parses_nineteen_char_shape_with_and_without_offset() {
        let bare = instant("2012-02-21T17:07:14");
        assert_eq!(bare.offset(), UtcOffset::UTC);
        assert_eq!(to_epoch_millis(bare), 1_329_844_034_000);

        let shifted = instant("2012-02-21T17:07:14+0130");
        assert_eq!(shifted.unix_timestamp(), bare.unix_timestamp());
        assert_eq!(shifted.offset(), UtcOffset::from_hms(1, 30, 0).unwrap());

        let negative = instant("2012-02-21T17:07:14-0200");
        assert_eq!(negative.offset(), UtcOffset::from_hms(-2, 0, 0).unwrap());
    }

    #[test]
    fn parses_compact_and_wrapped_shapes() {
        let compact = instant("20150525T15:50:00");
        assert_eq!(compact.offset(), UtcOffset::UTC);

        let wrapped = instant("/Date(1329844034000)/");
        assert_eq!(to_epoch_millis(wrapped), 1_329_844_034_000);
        assert_eq!(instant("\\/Date(1329844034000)\\/"), wrapped);

        let offset = instant("/Date(1329844034000-0200)/");
        assert_eq!(offset.unix_timestamp(), wrapped.unix_timestamp());
        assert_eq!(offset.offset(), UtcOffset::from_hms(-2, 0, 0).unwrap());
    }

    #[test]
    fn rejects_bare_time_of_day() {
        assert!(parse_timestamp("17:07:14").is_none());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn falls_back_to_rfc3339() {
        let ts = instant("2012-02-21T17:07:14+02:00");
        assert_eq!(ts.offset(), UtcOffset::from_hms(2, 0, 0).unwrap());
    }

    #[test]
    fn strips_surrounding_quotes() {
        assert_eq!(
            instant("\"2012-02-21T17:07:14Z\""),
            instant("2012-02-21T17:07:14Z")
        );
    }

    #[test]
    fn formats_each_style() {
        let ts = from_epoch_millis(1_329_844_034_000).unwrap();
        assert_eq!(
            format_timestamp(ts, TimestampStyle::JsEpoch, None).unwrap(),
            "new Date(1329844034000)"
        );
        assert_eq!(
            format_timestamp(ts, TimestampStyle::IsoShort, None).unwrap(),
            "2012-02-21T17:07:14"
        );
        assert_eq!(
            format_timestamp(ts, TimestampStyle::RoundTrip, None).unwrap(),
            "2012-02-21T17:07:14Z"
        );
        assert_eq!(
            format_timestamp(ts, TimestampStyle::Wrapped, None).unwrap(),
            "1329844034000"
        );
        assert_eq!(
            format_timestamp(ts, TimestampStyle::Custom, Some("[year]-[month]")).unwrap(),
            "2012-02"
        );
    }

    #[test]
    fn offset_suffix_only_for_non_utc() {
        let utc = from_epoch_millis(0).unwrap();
        assert_eq!(offset_suffix(utc), None);
        let local = utc.to_offset(UtcOffset::from_hms(-5, -30, 0).unwrap());
        assert_eq!(offset_suffix(local).as_deref(), Some("-0530"));
        let east = utc.to_offset(UtcOffset::from_hms(9, 0, 0).unwrap());
        assert_eq!(offset_suffix(east).as_deref(), Some("+0900"));
    }

    #[test]
    fn epoch_helpers_round_trip() {
        let ts = from_epoch_millis(123_456_789).unwrap();
        assert_eq!(to_epoch_millis(ts), 123_456_789);
        assert_eq!(to_epoch_millis(from_epoch_millis(-1000).unwrap()), -1000);
    }
}
