use std::collections::HashMap;

/// What the external MIME indexer hands back for a raw RFC 5322 message.
/// The indexer itself (parsing, bodystructure/envelope construction, node
/// body storage) is out of scope — this struct is the contract it must
/// satisfy.
#[derive(Clone, Debug)]
pub struct ParsedMessage {
    pub size: usize,
    pub raw_headers: Vec<(String, String)>,
    /// Opaque, already-serialized IMAP BODYSTRUCTURE.
    pub bodystructure: String,
    /// Opaque, already-serialized IMAP ENVELOPE.
    pub envelope: String,
    pub mime_tree: MimeTree,
    pub text: String,
    pub html: Vec<String>,
    pub attachments: Vec<AttachmentInput>,
    /// Per-delivery salt scoping attachment refcount buckets. A correctness
    /// primitive, not an optimization — never drop it to dedupe.
    pub magic: String,
    /// `None` if the message had no `Date:` header; caller falls back to
    /// internal date.
    pub hdate: Option<chrono::DateTime<chrono::Utc>>,
    pub msgid: Option<String>,
    pub subject: Option<String>,
    pub references: Vec<String>,
    pub in_reply_to: Option<String>,
    pub thread_index: Option<String>,
}

/// Parsed MIME structure with the `attachmentId -> storageKey` map the
/// Message model carries.
#[derive(Clone, Debug, Default)]
pub struct MimeTree {
    pub attachment_map: HashMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct AttachmentInput {
    pub attachment_id: String,
    pub hash: String,
    pub data: Vec<u8>,
}
