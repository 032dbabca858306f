//! JSON snapshot persistence for the memory directory. One file per data
//! root, written whole via a temp file and rename so a crashed write never
//! leaves a torn snapshot behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{
    AccessRequest, AuditEntry, Invitation, OwnershipClaim, Person, Property, Residency,
};

use super::memory::{DirectoryState, MemoryDirectory};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub people: Vec<Person>,
    pub properties: Vec<Property>,
    pub residencies: Vec<Residency>,
    pub ownership: Vec<OwnershipClaim>,
    pub requests: Vec<AccessRequest>,
    pub invitations: Vec<Invitation>,
    pub audit: Vec<AuditEntry>,
}

impl MemoryDirectory {
    fn snapshot_file(dir: &Path) -> PathBuf {
        dir.join("directory.json")
    }

    /// Open a directory rooted at `dir`, loading the snapshot when one is
    /// present and starting empty otherwise.
    pub fn load_or_default(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let me = MemoryDirectory {
            state: RwLock::new(DirectoryState::default()),
            dir: Some(dir.clone()),
        };
        let path = Self::snapshot_file(&dir);
        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let snap: DirectorySnapshot = serde_json::from_slice(&bytes)?;
            me.restore(snap);
        }
        Ok(me)
    }

    /// Materialize the current state, rows sorted by id so consecutive
    /// snapshots diff cleanly.
    pub fn snapshot(&self) -> DirectorySnapshot {
        let st = self.state.read();
        let mut people: Vec<Person> = st.people.values().cloned().collect();
        people.sort_by_key(|p| p.id.0);
        let mut properties: Vec<Property> = st.properties.values().cloned().collect();
        properties.sort_by_key(|p| p.id.0);
        let mut residencies: Vec<Residency> = st.residencies.values().cloned().collect();
        residencies.sort_by_key(|r| r.id.0);
        let mut requests: Vec<AccessRequest> = st.requests.values().cloned().collect();
        requests.sort_by_key(|r| r.id.0);
        let mut invitations: Vec<Invitation> = st.invitations.values().cloned().collect();
        invitations.sort_by_key(|i| i.id.0);
        DirectorySnapshot {
            version: 1,
            saved_at: Utc::now(),
            people,
            properties,
            residencies,
            ownership: st.ownership.clone(),
            requests,
            invitations,
            audit: st.audit.clone(),
        }
    }

    fn restore(&self, snap: DirectorySnapshot) {
        let mut st = self.state.write();
        st.people = snap.people.into_iter().map(|p| (p.id, p)).collect();
        st.properties = snap.properties.into_iter().map(|p| (p.id, p)).collect();
        st.residencies = snap.residencies.into_iter().map(|r| (r.id, r)).collect();
        st.ownership = snap.ownership;
        st.requests = snap.requests.into_iter().map(|r| (r.id, r)).collect();
        st.invitations = snap.invitations.into_iter().map(|i| (i.id, i)).collect();
        st.audit = snap.audit;
    }

    /// Write the snapshot to disk. No-op for purely in-memory directories.
    pub fn persist(&self) -> anyhow::Result<()> {
        let Some(dir) = &self.dir else { return Ok(()) };
        let snap = self.snapshot();
        let bytes = serde_json::to_vec_pretty(&snap)?;
        let path = Self::snapshot_file(dir);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccountStatus, AccountType, IdentityLink, PersonId, Property, PropertyId,
        VerificationMethod,
    };
    use crate::store::{PeopleStore, PropertyStore};
    use tempfile::tempdir;

    #[test]
    fn snapshot_round_trip() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let first = MemoryDirectory::load_or_default(dir.path())?;
        let prop = Property { id: PropertyId::new(), address: "12 Alder Way".into(), zone: Some("north".into()) };
        PropertyStore::insert(&first, prop.clone())?;
        let person = Person {
            id: PersonId::new(),
            identity: IdentityLink::Unlinked,
            first_name: "Noor".into(),
            last_name: "Haddad".into(),
            email: "noor@example.com".into(),
            account_status: AccountStatus::Verified,
            account_type: AccountType::Owner,
            verification_method: VerificationMethod::ReviewerVerified,
            created_at: Utc::now(),
        };
        PeopleStore::insert(&first, person.clone())?;
        first.persist()?;

        let reopened = MemoryDirectory::load_or_default(dir.path())?;
        let found = reopened.find_by_email("noor@example.com").expect("person survives reopen");
        assert_eq!(found.id, person.id);
        assert_eq!(found.account_type, AccountType::Owner);
        assert_eq!(PropertyStore::get(&reopened, prop.id).expect("property survives").address, prop.address);
        Ok(())
    }

    #[test]
    fn missing_snapshot_starts_empty() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let opened = MemoryDirectory::load_or_default(dir.path())?;
        assert!(opened.find_by_email("nobody@example.com").is_none());
        // An empty snapshot reopens cleanly.
        opened.persist()?;
        MemoryDirectory::load_or_default(dir.path())?;
        Ok(())
    }
}
