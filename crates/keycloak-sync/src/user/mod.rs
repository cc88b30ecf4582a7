//! Directory user records and the named-field dispatch used by mappers.

mod materialize;

pub use materialize::{apply_custom_attributes, flatten, materialize, UserPlan};

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A directory user as materialized from a table row or read back from the
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub email: Option<String>,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub role: Option<String>,
    pub createdtime: Option<String>,
    pub deactivetime: Option<String>,
    pub password: Option<String>,
    /// Stays `None` until the first attribute is assigned. Keys keep their
    /// first assignment order.
    pub attributes: Option<IndexMap<String, String>>,
}

/// Fields a mapper entry may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Email,
    Username,
    Firstname,
    Lastname,
    Role,
    Createdtime,
    Deactivetime,
    Password,
    Attributes,
}

static USER_FIELDS: OnceLock<HashMap<&'static str, UserField>> = OnceLock::new();

fn user_fields() -> &'static HashMap<&'static str, UserField> {
    USER_FIELDS.get_or_init(|| {
        const NAME_TO_FIELD: &[(&str, UserField)] = &[
            ("email", UserField::Email),
            ("username", UserField::Username),
            ("firstname", UserField::Firstname),
            ("lastname", UserField::Lastname),
            ("role", UserField::Role),
            ("createdtime", UserField::Createdtime),
            ("deactivetime", UserField::Deactivetime),
            ("password", UserField::Password),
            ("attributes", UserField::Attributes),
        ];
        NAME_TO_FIELD.iter().copied().collect()
    })
}

impl UserField {
    pub fn from_name(name: &str) -> Option<Self> {
        user_fields().get(name).copied()
    }

    pub const fn is_attributes(self) -> bool {
        matches!(self, Self::Attributes)
    }
}

impl User {
    /// Assigns a scalar field. Assigning to `attributes` is a no-op; use
    /// [`User::set_attribute`] for that.
    pub fn set(&mut self, field: UserField, value: Option<String>) {
        let slot = match field {
            UserField::Email => &mut self.email,
            UserField::Username => &mut self.username,
            UserField::Firstname => &mut self.firstname,
            UserField::Lastname => &mut self.lastname,
            UserField::Role => &mut self.role,
            UserField::Createdtime => &mut self.createdtime,
            UserField::Deactivetime => &mut self.deactivetime,
            UserField::Password => &mut self.password,
            UserField::Attributes => return,
        };
        *slot = value;
    }

    pub fn get(&self, field: UserField) -> Option<&str> {
        match field {
            UserField::Email => self.email.as_deref(),
            UserField::Username => self.username.as_deref(),
            UserField::Firstname => self.firstname.as_deref(),
            UserField::Lastname => self.lastname.as_deref(),
            UserField::Role => self.role.as_deref(),
            UserField::Createdtime => self.createdtime.as_deref(),
            UserField::Deactivetime => self.deactivetime.as_deref(),
            UserField::Password => self.password.as_deref(),
            UserField::Attributes => None,
        }
    }

    pub fn attributes_mut(&mut self) -> &mut IndexMap<String, String> {
        self.attributes.get_or_insert_with(IndexMap::new)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes_mut().insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .as_ref()
            .and_then(|attributes| attributes.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_knows_every_field() {
        for name in [
            "email",
            "username",
            "firstname",
            "lastname",
            "role",
            "createdtime",
            "deactivetime",
            "password",
            "attributes",
        ] {
            assert!(UserField::from_name(name).is_some(), "{name} should be known");
        }
        assert_eq!(UserField::from_name("nickname"), None);
        assert_eq!(UserField::from_name("Email"), None);
    }

    #[test]
    fn set_and_get_round_trip_through_the_dispatch() {
        let mut user = User::default();
        user.set(UserField::Lastname, Some("Martin".to_string()));
        user.set(UserField::Attributes, Some("ignored".to_string()));

        assert_eq!(user.get(UserField::Lastname), Some("Martin"));
        assert_eq!(user.get(UserField::Firstname), None);
        assert!(user.attributes.is_none());
    }

    #[test]
    fn attributes_start_uninitialized() {
        let mut user = User::default();
        assert!(user.attributes.is_none());
        assert_eq!(user.attribute("dept"), None);

        user.set_attribute("dept", "eng");
        user.set_attribute("dept", "ops");
        assert_eq!(user.attribute("dept"), Some("ops"));
    }

    #[test]
    fn attributes_keep_assignment_order() {
        let mut user = User::default();
        user.set_attribute("zeta", "1");
        user.set_attribute("alpha", "2");
        user.set_attribute("zeta", "3");

        let keys: Vec<&str> = user
            .attributes
            .iter()
            .flat_map(|attributes| attributes.keys())
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["zeta", "alpha"]);
        assert_eq!(user.attribute("zeta"), Some("3"));
    }
}
