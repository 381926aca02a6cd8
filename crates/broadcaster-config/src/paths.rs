//! Recording filename and directory helpers.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// Longest filename the templater produces, in characters.
const MAX_FILENAME_CHARS: usize = 255;

/// Template tokens, tried in order at each `%`. An empty replacement
/// means the token is itself a strftime specifier.
const TEMPLATE_TOKENS: [(&str, &str); 23] = [
    ("%CCYY", "%Y"),
    ("%YY", "%y"),
    ("%MM", "%m"),
    ("%DD", "%d"),
    ("%hh", "%H"),
    ("%mm", "%M"),
    ("%ss", "%S"),
    ("%%", "%%"),
    ("%a", ""),
    ("%A", ""),
    ("%b", ""),
    ("%B", ""),
    ("%d", ""),
    ("%H", ""),
    ("%I", ""),
    ("%m", ""),
    ("%M", ""),
    ("%p", ""),
    ("%S", ""),
    ("%y", ""),
    ("%Y", ""),
    ("%z", ""),
    ("%Z", ""),
];

const RESERVED_FILE_CHARS: [char; 9] = ['/', '\\', '*', '?', '"', '|', ':', '>', '<'];

/// Expand a filename template with the current local time and append `.extension`.
pub fn generate_formatted_filename(extension: &str, no_space: bool, format: &str) -> String {
    format_filename_at(&Local::now(), extension, no_space, format)
}

/// Expand a filename template at a fixed time.
///
/// Unknown `%` sequences lose their `%`. With `no_space`, spaces become
/// underscores. The result is cut to 255 characters.
pub fn format_filename_at(
    now: &DateTime<Local>,
    extension: &str,
    no_space: bool,
    format: &str,
) -> String {
    let mut out = String::with_capacity(format.len() + extension.len() + 1);
    let mut rest = format;

    while let Some(c) = rest.chars().next() {
        if c != '%' {
            out.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        }

        let expansion = TEMPLATE_TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))
            .map(|(token, spec)| {
                let spec = if spec.is_empty() { token } else { spec };
                (token.len(), now.format(spec).to_string())
            });

        match expansion {
            Some((consumed, text)) if !text.is_empty() => {
                out.push_str(&text);
                rest = &rest[consumed..];
            }
            _ => rest = &rest[1..],
        }
    }

    if no_space {
        out = out.replace(' ', "_");
    }
    out.push('.');
    out.push_str(extension);

    if out.chars().count() > MAX_FILENAME_CHARS {
        out = out.chars().take(MAX_FILENAME_CHARS).collect();
    }
    out
}

/// Create the parent directory of `path`. Backslashes count as separators.
pub fn ensure_directory_exists(path: &str) -> ConfigResult<()> {
    let normalized = path.replace('\\', "/");
    let Some(last) = normalized.rfind('/') else {
        return Ok(());
    };

    let directory = &normalized[..last];
    if directory.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(directory).map_err(|e| ConfigError::io(directory, e))
}

/// First variant of `path` that does not exist yet.
///
/// Existing files get ` (2)`, ` (3)`, ... (or `_2`, `_3`, ... with
/// `no_space`) inserted before the extension. Paths without an extension
/// are returned unchanged.
pub fn find_best_filename(path: &str, no_space: bool) -> String {
    if !Path::new(path).exists() {
        return path.to_string();
    }
    let Some(ext_start) = path.rfind('.') else {
        return path.to_string();
    };

    let (stem, ext) = path.split_at(ext_start);
    for num in 2u32.. {
        let candidate = if no_space {
            format!("{stem}_{num}{ext}")
        } else {
            format!("{stem} ({num}){ext}")
        };
        if !Path::new(&candidate).exists() {
            return candidate;
        }
    }

    warn!(path, "No free filename found");
    path.to_string()
}

/// Replace characters that are not allowed in filenames with `_`.
pub fn remove_reserved_file_characters(s: &str) -> String {
    s.chars()
        .map(|c| if RESERVED_FILE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}
