//! Howard Hinnant's civil-from-days algorithm, used so the dataloader's
//! `dd.mm.yyyy` range parsing never has to pull in a timezone database.

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CivilDateError {
    #[error("expected dd.mm.yyyy, got {0:?}")]
    BadFormat(String),
    #[error("year {0} is before the unix epoch")]
    YearBeforeEpoch(i32),
    #[error("month {0} is out of range [1, 12]")]
    MonthOutOfRange(i32),
    #[error("day {day} is out of range for {year}-{month:02}")]
    DayOutOfRange { year: i32, month: i32, day: i32 },
}

fn is_leap_year(y: i32) -> bool {
    (y % 4 == 0 && y % 100 != 0) || (y % 400 == 0)
}

fn days_in_month(y: i32, m: i32) -> i32 {
    const DAYS: [i32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if !(1..=12).contains(&m) {
        return 0;
    }
    if m == 2 && is_leap_year(y) {
        return 29;
    }
    DAYS[(m - 1) as usize]
}

/// Whole UTC days since the unix epoch (1970-01-01), via Hinnant's
/// `days_from_civil`.
fn days_from_civil_utc(y: i32, m: u32, d: u32) -> i64 {
    let y = y - i32::from(m <= 2);
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64; // [0, 399]
    let mp = if m > 2 { m - 3 } else { m + 9 } as i64; // [0, 11]
    let doy = (153 * mp + 2) / 5 + d as i64 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era as i64 * 146097 + doe - 719468
}

/// Parses `dd.mm.yyyy`, returning unix-ms at day start (`end_of_day=false`)
/// or the last millisecond of that day (`end_of_day=true`).
pub fn parse_ddmmyyyy_to_unix_ms(text: &str, end_of_day: bool) -> Result<i64, CivilDateError> {
    let mut parts = text.splitn(3, '.');
    let (d, m, y) = match (parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(m), Some(y)) if parts.as_str().is_empty() => (d, m, y),
        _ => return Err(CivilDateError::BadFormat(text.to_string())),
    };
    let d: i32 = d
        .parse()
        .map_err(|_| CivilDateError::BadFormat(text.to_string()))?;
    let m: i32 = m
        .parse()
        .map_err(|_| CivilDateError::BadFormat(text.to_string()))?;
    let y: i32 = y
        .parse()
        .map_err(|_| CivilDateError::BadFormat(text.to_string()))?;

    if !(1..=12).contains(&m) {
        return Err(CivilDateError::MonthOutOfRange(m));
    }
    if y < 1970 {
        return Err(CivilDateError::YearBeforeEpoch(y));
    }
    let dim = days_in_month(y, m);
    if d < 1 || d > dim {
        return Err(CivilDateError::DayOutOfRange { year: y, month: m, day: d });
    }

    let day_index = days_from_civil_utc(y, m as u32, d as u32);
    let day_start_ms = day_index * MS_PER_DAY;
    Ok(day_start_ms + if end_of_day { MS_PER_DAY - 1 } else { 0 })
}
