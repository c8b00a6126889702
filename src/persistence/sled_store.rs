//! Persistence layer backed by `sled`
//!
//! Each store owns one tree of the shared database:
//! - `session`: the access token and the signed-in user's profile
//! - `drafts`: one entry per edit form, keyed by form name
//!
//! Values are JSON-encoded.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sled::{Db, Tree};
use tracing::debug;

use crate::utils::error::Result;

const SESSION_TREE: &str = "session";
const DRAFTS_TREE: &str = "drafts";
const TOKEN_KEY: &[u8] = b"access_token";
const PROFILE_KEY: &[u8] = b"profile";

#[derive(Clone)]
pub struct Persistence {
    db: Db,
}

impl Persistence {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// A database that lives only as long as this handle.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn sessions(&self) -> Result<SessionStore> {
        Ok(SessionStore {
            tree: self.db.open_tree(SESSION_TREE)?,
        })
    }

    pub fn drafts(&self) -> Result<DraftStore> {
        Ok(DraftStore {
            tree: self.db.open_tree(DRAFTS_TREE)?,
        })
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("db", &"sled::Db")
            .finish()
    }
}

fn read_json<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn write_json<T: Serialize>(tree: &Tree, key: &[u8], value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    tree.insert(key, bytes)?;
    tree.flush()?;
    Ok(())
}

/// Minimal profile of the signed-in user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserProfile {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Access token and profile of the current session.
#[derive(Clone, Debug)]
pub struct SessionStore {
    tree: Tree,
}

impl SessionStore {
    pub fn token(&self) -> Result<Option<String>> {
        read_json(&self.tree, TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        write_json(&self.tree, TOKEN_KEY, &token)
    }

    pub fn profile(&self) -> Result<Option<UserProfile>> {
        read_json(&self.tree, PROFILE_KEY)
    }

    pub fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        write_json(&self.tree, PROFILE_KEY, profile)
    }

    /// Forget the token and the profile.
    pub fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        self.tree.flush()?;
        debug!("session cleared");
        Ok(())
    }
}

/// Unsaved changes of one edit form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Draft {
    pub form: String,
    #[serde(with = "super::pairs")]
    pub changes: BTreeMap<String, Value>,
    pub updated_at: i64,
}

impl Draft {
    pub fn new(form: impl Into<String>) -> Self {
        Self {
            form: form.into(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.changes.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.changes.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct DraftStore {
    tree: Tree,
}

impl DraftStore {
    /// Store `draft`, stamping its update time. An empty draft removes the
    /// stored entry instead.
    pub fn save(&self, draft: &mut Draft) -> Result<()> {
        if draft.is_empty() {
            return self.discard(&draft.form);
        }
        draft.updated_at = Utc::now().timestamp_millis();
        write_json(&self.tree, draft.form.as_bytes(), draft)
    }

    pub fn load(&self, form: &str) -> Result<Option<Draft>> {
        read_json(&self.tree, form.as_bytes())
    }

    pub fn discard(&self, form: &str) -> Result<()> {
        self.tree.remove(form.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }

    /// Names of every form with a stored draft, in key order.
    pub fn forms(&self) -> Result<Vec<String>> {
        let mut forms = Vec::new();
        for entry in self.tree.iter() {
            let (key, _) = entry?;
            forms.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(forms)
    }
}
