use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use script::{Condition, ProjectBundle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const PERSISTENCE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to serialize state snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to create state directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write temporary snapshot {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to move snapshot {} => {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct AccountRecord {
    pub account_id: String,
    pub name: String,
    pub token: String,
    pub created_unix_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ProjectRecord {
    pub project_id: String,
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    pub sequence: u64,
    pub created_unix_ms: u64,
    pub updated_unix_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ConditionRecord {
    pub condition_id: String,
    pub project_id: String,
    /// Creation order; evaluation follows it.
    pub sequence: u64,
    pub condition: Condition,
    pub created_unix_ms: u64,
    pub updated_unix_ms: u64,
}

#[derive(Default)]
pub(crate) struct Store {
    pub accounts: HashMap<String, AccountRecord>,
    token_lookup: HashMap<String, String>,
    pub projects: HashMap<String, ProjectRecord>,
    pub conditions: HashMap<String, ConditionRecord>,
}

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    #[serde(default = "snapshot_schema_version")]
    schema_version: u32,
    sequence: u64,
    #[serde(default)]
    accounts: Vec<AccountRecord>,
    #[serde(default)]
    projects: Vec<ProjectRecord>,
    #[serde(default)]
    conditions: Vec<ConditionRecord>,
}

impl Store {
    pub fn insert_account(&mut self, account: AccountRecord) {
        self.token_lookup
            .insert(account.token.clone(), account.account_id.clone());
        self.accounts.insert(account.account_id.clone(), account);
    }

    pub fn account_for_token(&self, token: &str) -> Option<&AccountRecord> {
        self.token_lookup
            .get(token)
            .and_then(|account_id| self.accounts.get(account_id))
    }

    /// Missing projects and projects of other accounts look the same.
    pub fn owned_project(&self, account_id: &str, project_id: &str) -> Option<&ProjectRecord> {
        self.projects
            .get(project_id)
            .filter(|project| project.account_id == account_id)
    }

    pub fn owned_project_mut(
        &mut self,
        account_id: &str,
        project_id: &str,
    ) -> Option<&mut ProjectRecord> {
        self.projects
            .get_mut(project_id)
            .filter(|project| project.account_id == account_id)
    }

    pub fn projects_of(&self, account_id: &str) -> Vec<&ProjectRecord> {
        let mut projects = self
            .projects
            .values()
            .filter(|project| project.account_id == account_id)
            .collect::<Vec<_>>();
        projects.sort_by(|lhs, rhs| rhs.sequence.cmp(&lhs.sequence));
        projects
    }

    pub fn conditions_of(&self, project_id: &str) -> Vec<&ConditionRecord> {
        let mut conditions = self
            .conditions
            .values()
            .filter(|record| record.project_id == project_id)
            .collect::<Vec<_>>();
        conditions.sort_by_key(|record| record.sequence);
        conditions
    }

    /// Conditions of a foreign project are hidden like missing ones.
    pub fn owned_condition(&self, account_id: &str, condition_id: &str) -> Option<&ConditionRecord> {
        let record = self.conditions.get(condition_id)?;
        self.owned_project(account_id, &record.project_id)?;
        Some(record)
    }

    pub fn remove_project(&mut self, project_id: &str) -> Option<ProjectRecord> {
        let removed = self.projects.remove(project_id)?;
        self.conditions
            .retain(|_, record| record.project_id != project_id);
        Some(removed)
    }

    pub fn bundle(&self, project_id: &str) -> Option<ProjectBundle> {
        let project = self.projects.get(project_id)?;
        Some(ProjectBundle {
            conditions: self
                .conditions_of(project_id)
                .into_iter()
                .map(|record| record.condition.clone())
                .collect(),
            allowed_domains: project.allowed_domains.clone(),
        })
    }

    fn to_snapshot(&self, sequence: u64) -> StoreSnapshot {
        let mut accounts = self.accounts.values().cloned().collect::<Vec<_>>();
        accounts.sort_by_key(|account| account.created_unix_ms);
        let mut projects = self.projects.values().cloned().collect::<Vec<_>>();
        projects.sort_by_key(|project| project.sequence);
        let mut conditions = self.conditions.values().cloned().collect::<Vec<_>>();
        conditions.sort_by_key(|record| record.sequence);
        StoreSnapshot {
            schema_version: PERSISTENCE_SCHEMA_VERSION,
            sequence,
            accounts,
            projects,
            conditions,
        }
    }

    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut store = Self::default();
        for account in snapshot.accounts {
            store.insert_account(account);
        }
        store.projects = snapshot
            .projects
            .into_iter()
            .map(|project| (project.project_id.clone(), project))
            .collect();
        store.conditions = snapshot
            .conditions
            .into_iter()
            .filter(|record| store.projects.contains_key(&record.project_id))
            .map(|record| (record.condition_id.clone(), record))
            .collect();
        store
    }
}

fn snapshot_schema_version() -> u32 {
    PERSISTENCE_SCHEMA_VERSION
}

/// Returns the restored store and the last used sequence number. Unreadable
/// snapshots are logged and replaced by an empty store.
pub(crate) fn load_snapshot_from_disk(state_path: Option<&Path>) -> (Store, u64) {
    let Some(path) = state_path else {
        return (Store::default(), 0);
    };
    if !path.exists() {
        return (Store::default(), 0);
    }
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            warn!("failed to read state snapshot path={} err={err}", path.display());
            return (Store::default(), 0);
        }
    };
    let snapshot = match serde_json::from_slice::<StoreSnapshot>(&data) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!("failed to parse state snapshot path={} err={err}", path.display());
            return (Store::default(), 0);
        }
    };
    if snapshot.schema_version != PERSISTENCE_SCHEMA_VERSION {
        warn!(
            "unsupported state snapshot schema path={} version={}",
            path.display(),
            snapshot.schema_version
        );
        return (Store::default(), 0);
    }
    let sequence = snapshot.sequence;
    let store = Store::from_snapshot(snapshot);
    info!(
        "restored state snapshot path={} accounts={} projects={} conditions={}",
        path.display(),
        store.accounts.len(),
        store.projects.len(),
        store.conditions.len()
    );
    (store, sequence)
}

pub(crate) fn encode_snapshot(store: &Store, sequence: u64) -> Result<Vec<u8>, PersistError> {
    Ok(serde_json::to_vec_pretty(&store.to_snapshot(sequence))?)
}

pub(crate) fn write_bytes_to_disk(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PersistError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    fs::write(&temp_path, bytes).map_err(|source| PersistError::Write {
        path: temp_path.clone(),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| PersistError::Rename {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })
}
