//! ISO-8601 rendering for the Windows `FILETIME`/`SYSTEMTIME` wire formats.
//!
//! `FILETIME` decoding goes through `winstructs::timestamp::WinTimestamp`, the
//! same type the teacher's `utils/read_ext.rs::try_filetime_named` reads a
//! `FILETIME` into before calling `.to_datetime()` — `winstructs` is already a
//! dependency here for `Guid`/`Sid`, so this crate follows the same path
//! instead of hand-rolling calendar math.

/// Render a raw little-endian `FILETIME` (100ns ticks since 1601-01-01) as
/// `YYYY-MM-DDTHH:MM:SS.fffffffZ`.
pub fn render_filetime(ticks: u64) -> String {
    let ts = winstructs::timestamp::WinTimestamp::from_reader(&mut std::io::Cursor::new(
        ticks.to_le_bytes(),
    ))
    .expect("reading a WinTimestamp from a fixed 8-byte buffer cannot fail");
    let dt = ts.to_datetime();
    let hundred_ns = dt.timestamp_subsec_nanos() / 100;
    format!("{}.{hundred_ns:07}Z", dt.format("%Y-%m-%dT%H:%M:%S"))
}

/// Render a Windows `SYSTEMTIME` (year, month, day_of_week, day, hour, minute,
/// second, milliseconds — all `u16`) as `YYYY-MM-DDTHH:MM:SS.fffZ`. The
/// `day_of_week` field is redundant with the date and is ignored, matching
/// every renderer in the corpus (the teacher's `utils/time.rs::read_systemtime`
/// discards it the same way).
#[allow(clippy::too_many_arguments)]
pub fn render_systemtime(
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
    milliseconds: u16,
) -> String {
    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{milliseconds:03}Z"
    )
}
