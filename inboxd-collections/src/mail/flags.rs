use crate::model::message::Flag;
use crate::model::Message;

/// The tri-state update keys shared by `move` and `update`. `expires` is
/// `Some(None)` to clear, `Some(Some(ts))` to set, `None` to leave
/// untouched — same tri-state every other field uses.
#[derive(Clone, Debug, Default)]
pub struct FlagUpdates {
    pub seen: Option<bool>,
    pub deleted: Option<bool>,
    pub flagged: Option<bool>,
    pub draft: Option<bool>,
    pub expires: Option<Option<u64>>,
}

impl FlagUpdates {
    pub fn is_empty(&self) -> bool {
        self.seen.is_none() && self.deleted.is_none() && self.flagged.is_none() && self.draft.is_none() && self.expires.is_none()
    }
}

/// Apply `updates` to a message's flags and derived booleans in place.
///
/// The `draft` key sets `\Draft`, not `\Flagged` — the two are kept
/// strictly separate here even though some historical implementations of
/// this update path conflate them.
pub fn apply_flag_updates(msg: &mut Message, updates: &FlagUpdates) {
    if let Some(seen) = updates.seen {
        set_flag(&mut msg.flags, Flag::Seen, seen);
    }
    if let Some(deleted) = updates.deleted {
        set_flag(&mut msg.flags, Flag::Deleted, deleted);
    }
    if let Some(flagged) = updates.flagged {
        set_flag(&mut msg.flags, Flag::Flagged, flagged);
    }
    if let Some(draft) = updates.draft {
        set_flag(&mut msg.flags, Flag::Draft, draft);
    }
    if let Some(expires) = updates.expires {
        msg.exp = expires.is_some();
        msg.rdate = expires;
    }
    msg.recompute_derived_flags();
}

fn set_flag(flags: &mut Vec<Flag>, flag: Flag, present: bool) {
    if present {
        if !flags.contains(&flag) {
            flags.push(flag);
        }
    } else {
        flags.retain(|f| f != &flag);
    }
}
