//! Tag → handler mapping, fixed per deployment role.

use std::collections::HashMap;

use flasher_message::tags;

use crate::{Command, VoltageChannel};

static INVALID_FALLBACK: Command = Command::InvalidMessage;

/// Which end of the link a registry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Control tower: sends commands, records replies.
    Tower,
    /// Flasher site: executes commands, replies.
    Site,
}

impl Role {
    /// Lowercase role name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tower => "tower",
            Role::Site => "site",
        }
    }
}

/// Immutable mapping from message tag to [`Command`].
///
/// Always contains the two synthetic tags; lookups of any other unknown tag
/// resolve to [`Command::InvalidMessage`].
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    role: Role,
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    fn with_synthetic(role: Role) -> Self {
        let mut commands = HashMap::new();
        commands.insert(tags::NO_MESSAGE.to_string(), Command::NoMessage);
        commands.insert(tags::INVALID_MESSAGE.to_string(), Command::InvalidMessage);
        CommandRegistry { role, commands }
    }

    /// Registry for the control tower: every application reply is recorded.
    pub fn tower() -> Self {
        let mut registry = Self::with_synthetic(Role::Tower);
        for tag in [tags::RELAY_ON, tags::RELAY_OFF, tags::VOLTAGE] {
            registry.commands.insert(tag.to_string(), Command::Acknowledge);
        }
        registry
    }

    /// Registry for the flasher site.
    pub fn site(flasher_pin: u8, channels: Vec<VoltageChannel>) -> Self {
        let mut registry = Self::with_synthetic(Role::Site);
        registry
            .commands
            .insert(tags::RELAY_ON.to_string(), Command::RelayOn { pin: flasher_pin });
        registry
            .commands
            .insert(tags::RELAY_OFF.to_string(), Command::RelayOff { pin: flasher_pin });
        registry
            .commands
            .insert(tags::VOLTAGE.to_string(), Command::VoltageQuery { channels });
        registry
    }

    /// The role this registry was built for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Handler for `tag`, falling back to [`Command::InvalidMessage`].
    pub fn lookup(&self, tag: &str) -> &Command {
        self.commands.get(tag).unwrap_or(&INVALID_FALLBACK)
    }

    /// Whether `tag` has a dedicated handler.
    pub fn contains(&self, tag: &str) -> bool {
        self.commands.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registry_has_synthetic_tags() {
        for registry in [CommandRegistry::tower(), CommandRegistry::site(14, Vec::new())] {
            assert!(registry.contains(tags::NO_MESSAGE));
            assert!(registry.contains(tags::INVALID_MESSAGE));
        }
    }

    #[test]
    fn test_unknown_tag_maps_to_invalid_message() {
        let registry = CommandRegistry::site(14, Vec::new());
        assert_eq!(registry.lookup("SELF_DESTRUCT"), &Command::InvalidMessage);
        assert_eq!(registry.lookup("msg"), &Command::InvalidMessage);
    }

    #[test]
    fn test_roles_differ() {
        let tower = CommandRegistry::tower();
        let site = CommandRegistry::site(14, Vec::new());
        assert_eq!(tower.lookup(tags::RELAY_ON), &Command::Acknowledge);
        assert_eq!(site.lookup(tags::RELAY_ON), &Command::RelayOn { pin: 14 });
        assert_eq!(site.lookup(tags::RELAY_OFF), &Command::RelayOff { pin: 14 });
        assert_eq!(tower.role(), Role::Tower);
        assert_eq!(site.role().as_str(), "site");
    }

    #[test]
    fn test_tags_sorted() {
        assert_eq!(
            CommandRegistry::tower().tags(),
            vec!["INVALIDMESSAGE", "NOMESSAGE", "RELAY_OFF", "RELAY_ON", "VOLTAGE"]
        );
    }
}
