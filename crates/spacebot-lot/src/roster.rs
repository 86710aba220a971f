//! Flat user store, keyed by display name and persisted as JSON.

use crate::error::RosterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rights {
    #[default]
    Standard,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Rights", default)]
    pub rights: Rights,
    #[serde(rename = "has_parking", default)]
    pub has_permanent_parking: bool,
    #[serde(rename = "HcmId", default)]
    pub hcm_id: i64,
    #[serde(rename = "HcmCompany", default)]
    pub hcm_company: String,
}

impl User {
    pub fn new(id: impl Into<String>, rights: Rights) -> Self {
        Self {
            id: id.into(),
            rights,
            has_permanent_parking: false,
            hcm_id: 0,
            hcm_company: String::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.rights == Rights::Admin
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRoster {
    users: BTreeMap<String, User>,
    filename: PathBuf,
}

impl UserRoster {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            users: BTreeMap::new(),
            filename: filename.into(),
        }
    }

    /// Read the roster; a missing file yields an empty one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "users file not found, starting with an empty roster");
                return Ok(Self::new(path));
            }
            Err(source) => {
                return Err(RosterError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let users = serde_json::from_str(&raw).map_err(|source| RosterError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let roster = Self {
            users,
            filename: path.to_path_buf(),
        };
        info!(path = %path.display(), users = roster.users.len(), "users loaded");
        Ok(roster)
    }

    pub fn synchronize_to_file(&self) -> Result<(), RosterError> {
        let encoded =
            serde_json::to_string_pretty(&self.users).map_err(|source| RosterError::Encode {
                path: self.filename.clone(),
                source,
            })?;

        let mut tmp = self.filename.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, encoded)
            .and_then(|()| fs::rename(&tmp, &self.filename))
            .map_err(|source| RosterError::Write {
                path: self.filename.clone(),
                source,
            })?;
        debug!(path = %self.filename.display(), "users written");
        Ok(())
    }

    /// Add a user and persist. Both the name and the id must be new.
    pub fn insert_user(&mut self, name: &str, user: User) -> Result<(), RosterError> {
        if self.users.contains_key(name) || self.exists(&user.id) {
            return Err(RosterError::DuplicateUser {
                name: name.to_string(),
                id: user.id,
            });
        }
        info!(name, id = %user.id, rights = ?user.rights, "user added");
        self.users.insert(name.to_string(), user);
        self.synchronize_to_file()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.by_id(id).is_some()
    }

    pub fn is_admin_id(&self, id: &str) -> bool {
        self.by_id(id).is_some_and(|(_, u)| u.is_admin())
    }

    pub fn has_parking_by_id(&self, id: &str) -> bool {
        self.by_id(id).is_some_and(|(_, u)| u.has_permanent_parking)
    }

    pub fn set_access_rights(&mut self, id: &str, rights: Rights) -> Result<(), RosterError> {
        self.by_id_mut(id)?.rights = rights;
        info!(id, ?rights, "access rights changed");
        self.synchronize_to_file()
    }

    pub fn set_parking_permission(&mut self, id: &str, allowed: bool) -> Result<(), RosterError> {
        self.by_id_mut(id)?.has_permanent_parking = allowed;
        info!(id, allowed, "parking permission changed");
        self.synchronize_to_file()
    }

    pub fn name_from_id(&self, id: &str) -> Option<&str> {
        self.by_id(id).map(|(name, _)| name)
    }

    pub fn by_id(&self, id: &str) -> Option<(&str, &User)> {
        self.users
            .iter()
            .find(|(_, u)| u.id == id)
            .map(|(name, u)| (name.as_str(), u))
    }

    pub fn get(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    /// Users in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &User)> {
        self.users.iter().map(|(name, u)| (name.as_str(), u))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn by_id_mut(&mut self, id: &str) -> Result<&mut User, RosterError> {
        self.users
            .values_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| RosterError::UnknownUser(id.to_string()))
    }
}
