//! Output file naming.

use crate::metadata::MediaTags;
use crate::sync::SyncPolicy;

const NAME_LIMIT: usize = 100;
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make `name` safe to use as a file name on common filesystems.
///
/// Reserved characters are removed, whitespace runs become a single `_`,
/// repeated underscores collapse, the result is cut to 100 characters, and
/// leading/trailing `_` and `.` are trimmed.
///
/// ```
/// assert_eq!(loopsync::sanitize_filename("  My <best>  loop?.  "), "My_best_loop");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !FORBIDDEN.contains(c)) {
        let c = if c.is_whitespace() { '_' } else { c };
        if c == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(c);
    }

    let truncated: String = cleaned.chars().take(NAME_LIMIT).collect();
    truncated.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// File name for a finished job: `sync{n}_{id}_{title}.mp4`.
///
/// `n` is the policy's [`method_number`](SyncPolicy::method_number). The
/// title is the music display title when present, else the media title;
/// it is omitted when nothing survives sanitizing.
pub fn output_file_name(policy: SyncPolicy, media_id: &str, tags: &MediaTags) -> String {
    let method = policy.method_number();
    let id = sanitize_filename(media_id);
    let title = sanitize_filename(&tags.display_title());

    if title.is_empty() {
        format!("sync{method}_{id}.mp4")
    } else {
        format!("sync{method}_{id}_{title}.mp4")
    }
}
