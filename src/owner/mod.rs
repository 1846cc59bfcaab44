mod passwd;
mod procfs;

pub use passwd::PasswdLookup;
pub use procfs::{ProcFsOwners, ProcessOwners};
use serde::Serialize;
use std::collections::HashMap;

#[cfg(test)]
pub use procfs::MockProcessOwners;

#[cfg(test)]
use mockall::automock;
use tracing::debug;

/// Display name used for a process whose owner could not be read at all.
pub const UNKNOWN_OWNER: &str = "?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub name: String,
    pub is_current_user: bool,
}

/// The implementer maps a uid to an account name, useful for mocking in tests
#[cfg_attr(test, automock)]
pub trait UserLookup {
    fn user_name(&self, uid: u32) -> Option<String>;
}

/// The real uid of the user running us.
pub fn current_uid() -> u32 {
    // SAFETY: getuid takes no arguments and cannot fail.
    unsafe { libc::getuid() }
}

/// Resolves process owners for one refresh cycle, looking each uid up at most once.
pub struct OwnershipResolver<'a, L: UserLookup + ?Sized> {
    lookup: &'a L,
    current_uid: u32,
    names: HashMap<u32, String>,
}

impl<'a, L: UserLookup + ?Sized> OwnershipResolver<'a, L> {
    pub fn new(lookup: &'a L, current_uid: u32) -> Self {
        Self {
            lookup,
            current_uid,
            names: HashMap::new(),
        }
    }

    /// Unknown uids fall back to the number itself, never an error.
    pub fn resolve(&mut self, owner_id: Option<u32>) -> Owner {
        let Some(uid) = owner_id else {
            return Owner {
                name: UNKNOWN_OWNER.to_string(),
                is_current_user: false,
            };
        };

        let lookup = self.lookup;
        let name = self.names.entry(uid).or_insert_with(|| {
            lookup.user_name(uid).unwrap_or_else(|| {
                debug!("No user name for uid {}", uid);
                uid.to_string()
            })
        });

        Owner {
            name: name.clone(),
            is_current_user: uid == self.current_uid,
        }
    }
}
