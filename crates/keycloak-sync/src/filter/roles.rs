use crate::directory::{DirectoryError, DirectoryGateway};
use std::collections::{HashMap, HashSet};

/// Finds the first configured realm role a user belongs to.
///
/// Member lists are fetched once per role and reused for every user of the
/// session.
#[derive(Debug)]
pub struct RoleResolver<'a> {
    gateway: &'a dyn DirectoryGateway,
    roles: &'a [String],
    members: HashMap<&'a str, HashSet<String>>,
}

impl<'a> RoleResolver<'a> {
    pub fn new(gateway: &'a dyn DirectoryGateway, roles: &'a [String]) -> Self {
        Self {
            gateway,
            roles,
            members: HashMap::new(),
        }
    }

    /// `Ok(None)` means the user holds none of the configured roles, which is
    /// a valid outcome. A role lookup failure is an error.
    pub fn resolve(&mut self, user_id: &str) -> Result<Option<String>, DirectoryError> {
        for role in self.roles {
            if !self.members.contains_key(role.as_str()) {
                let ids = self
                    .gateway
                    .role_members(role)?
                    .into_iter()
                    .map(|member| member.id)
                    .collect();
                self.members.insert(role.as_str(), ids);
            }
            if self
                .members
                .get(role.as_str())
                .is_some_and(|members| members.contains(user_id))
            {
                return Ok(Some(role.clone()));
            }
        }
        Ok(None)
    }
}
