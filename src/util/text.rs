use std::borrow::Cow;

/// Characters that cannot appear in a file name on common filesystems.
const RESERVED_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Longest file stem we produce, in bytes (leaves room for `.torrent`).
const MAX_FILE_STEM: usize = 200;

/// Strip control characters from feed-supplied text.
///
/// Feed titles end up in log lines, file names and notifications, so
/// everything below 0x20 (and DEL) is removed. Tabs and newlines are
/// collapsed to a single space.
///
/// Returns `Cow::Borrowed` when nothing needed stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(char::is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\t' | '\n' | '\r' => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Turn an item title into a safe file stem.
///
/// Path separators and reserved characters become `_`, leading dots are
/// dropped so the file is never hidden or a traversal, and the result is
/// truncated on a character boundary. An empty result becomes `untitled`.
///
/// ```
/// use feedwatch::util::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("[Group] Show - 01 [1080p]"), "[Group] Show - 01 [1080p]");
/// assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
/// ```
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned = strip_control_chars(title);
    let replaced: String = cleaned
        .chars()
        .map(|c| if RESERVED_FILE_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim().trim_start_matches('.').trim();

    let mut end = trimmed.len().min(MAX_FILE_STEM);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let stem = trimmed[..end].trim_end();

    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// `count` followed by `unit`, pluralised when `count != 1`.
pub fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Human-readable duration, e.g. `1 hour, 5 minutes, and 3 seconds`.
///
/// ```
/// use feedwatch::util::format_interval;
///
/// assert_eq!(format_interval(600), "10 minutes");
/// assert_eq!(format_interval(3_900), "1 hour and 5 minutes");
/// ```
pub fn format_interval(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = total_secs % 86_400 / 3_600;
    let minutes = total_secs % 3_600 / 60;
    let seconds = total_secs % 60;

    let mut parts: Vec<String> = [
        (days, "day"),
        (hours, "hour"),
        (minutes, "minute"),
        (seconds, "second"),
    ]
    .into_iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, unit)| plural(value, unit))
    .collect();

    match parts.len() {
        0 => plural(0, "second"),
        1 => parts.remove(0),
        2 => format!("{} and {}", parts[0], parts[1]),
        _ => {
            let last = parts.pop().unwrap_or_default();
            format!("{}, and {}", parts.join(", "), last)
        }
    }
}
