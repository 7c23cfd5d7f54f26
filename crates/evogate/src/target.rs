//! Recipient classification and normalization.
//!
//! A raw recipient string is either a group JID (carries the `@g.us` suffix)
//! or a phone number. Classification is deterministic: the resolver never
//! guesses "group" from digit count — callers that mean a group use
//! [`Target::group`] explicitly.

/// Domain suffix WhatsApp uses for group JIDs.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Domain suffix for individual contact JIDs.
pub const CONTACT_SUFFIX: &str = "@s.whatsapp.net";

/// A normalized recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Individual contact, digits with an optional leading `+`.
    Contact(String),
    /// Group JID, suffix included.
    Group(String),
}

impl Target {
    /// Classify and normalize a raw recipient string. Never fails:
    /// unrecognized input is treated as a contact after stripping
    /// non-numeric characters. Emptiness is validated upstream.
    ///
    /// Normalization is idempotent: resolving an already-normalized value
    /// returns the same value.
    pub fn resolve(raw: &str) -> Target {
        let trimmed = raw.trim();
        if trimmed.ends_with(GROUP_SUFFIX) {
            return Target::Group(trimmed.to_string());
        }
        Target::Contact(normalize_number(trimmed))
    }

    /// Explicit group path: treat `raw` as a group id, appending the group
    /// suffix when missing. Used when the caller knows the recipient is a
    /// group (e.g. a bare numeric group id).
    pub fn group(raw: &str) -> Target {
        let trimmed = raw.trim();
        if trimmed.ends_with(GROUP_SUFFIX) {
            Target::Group(trimmed.to_string())
        } else {
            Target::Group(format!("{trimmed}{GROUP_SUFFIX}"))
        }
    }

    /// The addressing value placed in the gateway's recipient field.
    pub fn address(&self) -> &str {
        match self {
            Target::Contact(n) => n,
            Target::Group(j) => j,
        }
    }

    /// The full remote JID form used where the gateway expects one
    /// (reaction keys). Contacts gain the contact domain; the leading `+`
    /// is dropped since JIDs are bare digits.
    pub fn remote_jid(&self) -> String {
        match self {
            Target::Contact(n) => {
                let digits = n.strip_prefix('+').unwrap_or(n);
                format!("{digits}{CONTACT_SUFFIX}")
            }
            Target::Group(jid) => jid.clone(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Target::Group(_))
    }
}

/// Strip everything except digits and a single leading `+`.
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }
    out
}

/// Digits-only normalization for number-lookup calls: the lookup endpoint
/// takes bare digits, so the leading `+` is dropped as well.
pub fn lookup_number(raw: &str) -> String {
    normalize_number(raw).trim_start_matches('+').to_string()
}
