use chrono::{Local, TimeZone};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SIZE_1KIB: u64 = 1024;
pub const SIZE_1MIB: u64 = 1024 * SIZE_1KIB;
pub const SIZE_1GIB: u64 = 1024 * SIZE_1MIB;
pub const SIZE_1TIB: u64 = 1024 * SIZE_1GIB;
pub const SIZE_1PIB: u64 = 1024 * SIZE_1TIB;
pub const SIZE_1EIB: u64 = 1024 * SIZE_1PIB;

const TOKEN_DECIMALS: u32 = 18;
const DISPLAY_DECIMALS: u32 = 4;

const STORAGE_UNITS: [(u64, &str); 6] = [
    (SIZE_1EIB, "EiB"),
    (SIZE_1PIB, "PiB"),
    (SIZE_1TIB, "TiB"),
    (SIZE_1GIB, "GiB"),
    (SIZE_1MIB, "MiB"),
    (SIZE_1KIB, "KiB"),
];

pub fn format_timestamp<Tz>(unix_secs: i64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_opt(unix_secs, 0)
        .single()
        .map(|time| time.format(TIME_FORMAT).to_string())
}

pub fn format_local_timestamp(unix_secs: i64) -> Option<String> {
    format_timestamp(unix_secs, &Local)
}

pub fn format_storage_space(bytes: u128) -> String {
    let Ok(value) = u64::try_from(bytes) else {
        return format!("{} EiB", bytes / u128::from(SIZE_1EIB));
    };

    for (unit_size, unit) in STORAGE_UNITS {
        if value >= unit_size {
            return format!("{:.2} {unit}", value as f64 / unit_size as f64);
        }
    }

    format!("{value} Bytes")
}

/// Renders a raw on-chain balance (18 decimals) with four decimals,
/// rounding half up.
pub fn format_token_amount(raw: u128) -> String {
    let step = 10u128.pow(TOKEN_DECIMALS - DISPLAY_DECIMALS);
    let scale = 10u128.pow(DISPLAY_DECIMALS);
    let scaled = raw / step + u128::from(raw % step >= step / 2);
    format!(
        "{}.{:0width$}",
        scaled / scale,
        scaled % scale,
        width = DISPLAY_DECIMALS as usize
    )
}
