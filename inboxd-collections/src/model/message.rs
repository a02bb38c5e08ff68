use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use inboxd_store::UniqueIdent;

use super::mailbox::{ImapUid, ModSeq};
use super::mime::MimeTree;

pub const MAX_PLAINTEXT_CONTENT: usize = 128 * 1024;
pub const MAX_HTML_CONTENT: usize = 256 * 1024;
pub const INTRO_MAX_CHARS: usize = 128;
pub const HEADER_KEY_CAP: usize = 255;
pub const HEADER_VALUE_CAP: usize = 880;

/// The indexed-header keys the duplicate probe, threading and IMAP search
/// need at query time.
pub const INDEXED_HEADER_KEYS: &[&str] = &[
    "to",
    "cc",
    "subject",
    "from",
    "sender",
    "reply-to",
    "message-id",
    "thread-index",
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Keyword(String),
}

impl Flag {
    pub fn system_name(&self) -> Option<&'static str> {
        match self {
            Flag::Seen => Some("\\Seen"),
            Flag::Answered => Some("\\Answered"),
            Flag::Flagged => Some("\\Flagged"),
            Flag::Deleted => Some("\\Deleted"),
            Flag::Draft => Some("\\Draft"),
            Flag::Recent => Some("\\Recent"),
            Flag::Keyword(_) => None,
        }
    }
}

/// Keyed by `(mailbox, uid)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: UniqueIdent,
    /// Ancestor id across copies; equals `id` for originals.
    pub root: UniqueIdent,
    pub mailbox: UniqueIdent,
    pub user: UniqueIdent,
    pub uid: ImapUid,
    pub modseq: ModSeq,
    pub thread: UniqueIdent,
    pub flags: Vec<Flag>,

    // Derived booleans, mirrors of `flags` kept for index efficiency.
    pub unseen: bool,
    pub flagged: bool,
    pub undeleted: bool,
    pub draft: bool,

    pub size: usize,
    pub idate: u64,
    pub hdate: u64,
    pub msgid: String,
    pub envelope: String,
    pub bodystructure: String,
    pub mime_tree: MimeTree,
    pub headers: HashMap<String, String>,
    pub intro: String,
    pub text: String,
    pub html: Vec<String>,
    /// Per-delivery salt identifying the attachment refcount bucket.
    pub magic: String,

    /// Whether the holding mailbox's specialUse permits search by default
    /// (false for Junk/Trash). Combined with `\Deleted` in
    /// `recompute_derived_flags` to produce `searchable`.
    pub searchable_by_mailbox: bool,
    pub searchable: bool,
    pub junk: bool,
    pub exp: bool,
    pub rdate: Option<u64>,
}

impl Message {
    pub fn recompute_derived_flags(&mut self) {
        self.unseen = !self.flags.contains(&Flag::Seen);
        self.flagged = self.flags.contains(&Flag::Flagged);
        self.undeleted = !self.flags.contains(&Flag::Deleted);
        self.draft = self.flags.contains(&Flag::Draft);
        self.searchable = self.searchable_by_mailbox && self.undeleted;
    }
}

/// Strip leading `Re:`/`Fwd:`/`(fwd)` repeatedly and collapse whitespace,
/// used both for duplicate-free subject comparison and thread grouping.
pub fn normalize_subject(subject: &str) -> String {
    let mut s = subject.trim();
    loop {
        let lower = s.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("re:") {
            s = s[s.len() - rest.len()..].trim_start();
        } else if let Some(rest) = lower.strip_prefix("fwd:") {
            s = s[s.len() - rest.len()..].trim_start();
        } else if lower.ends_with("(fwd)") {
            s = s[..s.len() - "(fwd)".len()].trim_end();
        } else {
            break;
        }
    }
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// LF-normalize and cap at `MAX_PLAINTEXT_CONTENT` bytes.
pub fn normalize_text(raw: &str) -> String {
    let lf = raw.replace("\r\n", "\n");
    if lf.len() <= MAX_PLAINTEXT_CONTENT {
        lf
    } else {
        // back off to a char boundary so we never split a UTF-8 sequence
        let mut cut = MAX_PLAINTEXT_CONTENT;
        while !lf.is_char_boundary(cut) {
            cut -= 1;
        }
        lf[..cut].to_string()
    }
}

/// First <=128 chars of whitespace-collapsed text, truncated at the last
/// word boundary with an ellipsis suffix when truncation happened.
pub fn derive_intro(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();
    if chars.len() <= INTRO_MAX_CHARS {
        return collapsed;
    }
    let mut cut = INTRO_MAX_CHARS;
    while cut > 0 && !chars[cut - 1].is_whitespace() {
        cut -= 1;
    }
    if cut == 0 {
        // no word boundary at all within budget, hard-cut
        cut = INTRO_MAX_CHARS;
    }
    let mut truncated: String = chars[..cut].iter().collect();
    while truncated.ends_with(char::is_whitespace) {
        truncated.pop();
    }
    truncated.push('\u{2026}');
    truncated
}

/// Truncate `html` entries cumulatively by byte length at
/// `MAX_HTML_CONTENT`; entries beyond the budget are dropped entirely, not
/// kept as empty strings.
pub fn truncate_html_cumulative(html: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut used = 0usize;
    for part in html {
        if used >= MAX_HTML_CONTENT {
            break;
        }
        let remaining = MAX_HTML_CONTENT - used;
        if part.len() <= remaining {
            used += part.len();
            out.push(part.clone());
        } else {
            let mut cut = remaining;
            while cut > 0 && !part.is_char_boundary(cut) {
                cut -= 1;
            }
            out.push(part[..cut].to_string());
            used += cut;
            break;
        }
    }
    out
}

/// Lower-case header keys, restrict to the indexed set plus caller-supplied
/// extras, and byte-cap keys/values (backing off 4 bytes on values to avoid
/// a torn UTF-8 sequence at the boundary).
pub fn project_indexed_headers(
    raw_headers: &[(String, String)],
    extra_keys: &[String],
) -> HashMap<String, String> {
    let mut allowed: Vec<String> = INDEXED_HEADER_KEYS.iter().map(|s| s.to_string()).collect();
    for extra in extra_keys {
        let lower = extra.to_ascii_lowercase();
        if !allowed.contains(&lower) {
            allowed.push(lower);
        }
    }

    let mut out = HashMap::new();
    for (k, v) in raw_headers {
        let lower_key = k.to_ascii_lowercase();
        if !allowed.contains(&lower_key) {
            continue;
        }
        let key = cap_bytes(&lower_key, HEADER_KEY_CAP);
        let value = cap_bytes_back_off(v, HEADER_VALUE_CAP, 4);
        out.insert(key, value);
    }
    out
}

fn cap_bytes(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut cut = cap;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s[..cut].to_string()
}

fn cap_bytes_back_off(s: &str, cap: usize, back_off: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let target = cap.saturating_sub(back_off);
    let mut cut = target;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_subject_strips_repeated_prefixes() {
        assert_eq!(normalize_subject("Re: Fwd: re: hello"), "hello");
        assert_eq!(normalize_subject("hello (fwd)"), "hello");
        assert_eq!(normalize_subject("  Re:   hi   there "), "hi there");
    }

    #[test]
    fn intro_truncates_at_word_boundary_with_ellipsis() {
        let text = "a".repeat(130);
        let intro = derive_intro(&text);
        assert!(intro.ends_with('\u{2026}'));
        assert!(intro.chars().count() <= INTRO_MAX_CHARS + 1);

        let words = "word ".repeat(40); // 200 chars, has spaces
        let intro2 = derive_intro(&words);
        assert!(intro2.ends_with('\u{2026}'));
        assert!(!intro2.contains("  "));
    }

    #[test]
    fn html_parts_beyond_budget_are_dropped_not_emptied() {
        let big = "x".repeat(MAX_HTML_CONTENT);
        let html = vec![big.clone(), "extra".to_string()];
        let out = truncate_html_cumulative(&html);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), MAX_HTML_CONTENT);
    }

    #[test]
    fn header_projection_drops_unlisted_keys_and_caps() {
        let headers = vec![
            ("Subject".to_string(), "hi".to_string()),
            ("X-Random".to_string(), "ignored".to_string()),
        ];
        let projected = project_indexed_headers(&headers, &[]);
        assert!(projected.contains_key("subject"));
        assert!(!projected.contains_key("x-random"));
    }

    #[test]
    fn header_projection_keeps_caller_supplied_extras() {
        let headers = vec![("X-Priority".to_string(), "1".to_string())];
        let projected = project_indexed_headers(&headers, &["X-Priority".to_string()]);
        assert_eq!(projected.get("x-priority").unwrap(), "1");
    }
}
