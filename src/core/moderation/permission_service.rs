// Role-based command permissions.
//
// Discord's own permission flags gate the dangerous API calls; this table is
// the bot-level layer on top, mapping role NAMES to the command names that
// role may invoke. Lookups are exact: role and command names are
// case-sensitive, and anything unknown is denied.

use std::collections::{HashMap, HashSet};

pub struct PermissionTable {
    grants: HashMap<String, HashSet<String>>,
}

impl PermissionTable {
    pub fn new() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }

    /// The default table shipped with the bot.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for command in ["Kick", "Ban", "Clear", "RolesDelete", "AfkEnforce"] {
            table.allow("Admin", command);
        }
        for command in ["Kick", "Clear", "AfkEnforce"] {
            table.allow("Mod", command);
        }
        table.allow("Member", "Report");
        table
    }

    /// Grant `command` to `role`. Both names are stored verbatim.
    pub fn allow(&mut self, role: &str, command: &str) -> &mut Self {
        self.grants
            .entry(role.to_string())
            .or_default()
            .insert(command.to_string());
        self
    }

    /// Whether `role` may invoke `command`. Case-sensitive on both.
    pub fn check_permission(&self, role: &str, command: &str) -> bool {
        self.grants
            .get(role)
            .is_some_and(|commands| commands.contains(command))
    }

    /// Whether any of the given role names grants `command`.
    pub fn any_role_allows<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a str>,
        command: &str,
    ) -> bool {
        roles
            .into_iter()
            .any(|role| self.check_permission(role, command))
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granted_roles_pass() {
        let table = PermissionTable::with_defaults();
        assert!(table.check_permission("Mod", "Kick"));
        assert!(table.check_permission("Admin", "Ban"));
    }

    #[test]
    fn test_missing_grants_deny() {
        let table = PermissionTable::with_defaults();
        assert!(!table.check_permission("Member", "Kick"));
        assert!(!table.check_permission("Admin", "NonexistentCommand"));
        assert!(!table.check_permission("NonexistentRole", "Kick"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let table = PermissionTable::with_defaults();
        assert!(!table.check_permission("member", "KICK"));
        assert!(!table.check_permission("mod", "Kick"));
        assert!(!table.check_permission("Mod", "kick"));
    }

    #[test]
    fn test_any_role_allows() {
        let table = PermissionTable::with_defaults();
        assert!(table.any_role_allows(["Member", "Mod"], "Clear"));
        assert!(!table.any_role_allows(["Member"], "Clear"));
        assert!(!table.any_role_allows([], "Clear"));
    }

    #[test]
    fn test_custom_grant() {
        let mut table = PermissionTable::new();
        table.allow("Helper", "Report");
        assert!(table.check_permission("Helper", "Report"));
        assert!(!table.check_permission("Helper", "Clear"));
    }
}
