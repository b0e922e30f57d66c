use std::collections::HashSet;

use skynet_channels::MsgContext;
use skynet_core::types::ChatType;

/// Channel-specific activation policy: a group chat requires explicit
/// addressing unless the conversation is allowlisted; direct chats are
/// gated by a single on/off switch.
#[derive(Debug, Clone)]
pub struct ActivationPolicy {
    pub dm_allowed: bool,
    pub require_explicit_address_in_groups: bool,
    pub allowlisted_groups: HashSet<String>,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            dm_allowed: true,
            require_explicit_address_in_groups: true,
            allowlisted_groups: HashSet::new(),
        }
    }
}

impl ActivationPolicy {
    /// Returns whether `msg` should be handed to the pipeline at all.
    pub fn is_activated(&self, msg: &MsgContext) -> bool {
        match msg.chat_type {
            ChatType::Direct => self.dm_allowed,
            ChatType::Group => {
                if !self.require_explicit_address_in_groups {
                    return true;
                }
                if let Some(group_id) = &msg.group_id {
                    if self.allowlisted_groups.contains(group_id) {
                        return true;
                    }
                }
                msg.body.trim_start().starts_with('@')
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(chat_type: ChatType, group_id: Option<&str>, body: &str) -> MsgContext {
        MsgContext {
            channel: "loopback".to_string(),
            from: "alice".to_string(),
            sender_name: None,
            chat_type,
            group_id: group_id.map(str::to_string),
            message_id: "m1".to_string(),
            body: body.to_string(),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn dm_is_rejected_when_disabled() {
        let policy = ActivationPolicy { dm_allowed: false, ..Default::default() };
        assert!(!policy.is_activated(&msg(ChatType::Direct, None, "hi")));
    }

    #[test]
    fn group_without_address_or_allowlist_is_rejected() {
        let policy = ActivationPolicy::default();
        assert!(!policy.is_activated(&msg(ChatType::Group, Some("g1"), "hi")));
    }

    #[test]
    fn group_with_explicit_address_is_activated() {
        let policy = ActivationPolicy::default();
        assert!(policy.is_activated(&msg(ChatType::Group, Some("g1"), "@bot hi")));
    }

    #[test]
    fn allowlisted_group_needs_no_addressing() {
        let mut policy = ActivationPolicy::default();
        policy.allowlisted_groups.insert("g1".to_string());
        assert!(policy.is_activated(&msg(ChatType::Group, Some("g1"), "hi")));
    }
}
