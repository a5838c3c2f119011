use crate::error::StateError;
use crate::message::NormalizedMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Inbox,
    Spam,
}

impl Folder {
    pub fn other(self) -> Self {
        match self {
            Folder::Inbox => Folder::Spam,
            Folder::Spam => Folder::Inbox,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Folder::Inbox => write!(f, "inbox"),
            Folder::Spam => write!(f, "spam"),
        }
    }
}

impl std::str::FromStr for Folder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inbox" => Ok(Folder::Inbox),
            "spam" => Ok(Folder::Spam),
            other => Err(format!("unknown folder '{other}', expected inbox or spam")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderSummary {
    pub total: usize,
    pub inbox: usize,
    pub spam: usize,
    /// Integer share of spam in percent, 0 when both folders are empty
    pub spam_ratio_percent: usize,
}

/// The two classified folders. Each message lives in exactly one of them,
/// in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderStore {
    #[serde(default)]
    inbox: Vec<NormalizedMessage>,
    #[serde(default)]
    spam: Vec<NormalizedMessage>,
}

impl FolderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inbox(&self) -> &[NormalizedMessage] {
        &self.inbox
    }

    pub fn spam(&self) -> &[NormalizedMessage] {
        &self.spam
    }

    pub fn folder(&self, folder: Folder) -> &[NormalizedMessage] {
        match folder {
            Folder::Inbox => &self.inbox,
            Folder::Spam => &self.spam,
        }
    }

    fn folder_mut(&mut self, folder: Folder) -> &mut Vec<NormalizedMessage> {
        match folder {
            Folder::Inbox => &mut self.inbox,
            Folder::Spam => &mut self.spam,
        }
    }

    pub fn push(&mut self, folder: Folder, message: NormalizedMessage) {
        self.folder_mut(folder).push(message);
    }

    /// Linear scan of both folders. An empty id never matches.
    pub fn contains_id(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    pub fn locate(&self, id: &str) -> Option<Folder> {
        [Folder::Inbox, Folder::Spam]
            .into_iter()
            .find(|&folder| self.folder(folder).iter().any(|m| m.same_id(id)))
    }

    /// Manual reclassification: relocate the message to the end of `to`
    /// without running it through the decision engine again.
    pub fn move_message(&mut self, id: &str, to: Folder) -> bool {
        let from = to.other();
        let Some(position) = self.folder(from).iter().position(|m| m.same_id(id)) else {
            return false;
        };

        let message = self.folder_mut(from).remove(position);
        log::info!("Moved message {} from {} to {}", id, from, to);
        self.folder_mut(to).push(message);
        true
    }

    pub fn mark_spam(&mut self, id: &str) -> bool {
        self.move_message(id, Folder::Spam)
    }

    pub fn mark_legitimate(&mut self, id: &str) -> bool {
        self.move_message(id, Folder::Inbox)
    }

    /// Most recently arrived first.
    pub fn newest_first(&self, folder: Folder) -> impl Iterator<Item = &NormalizedMessage> {
        self.folder(folder).iter().rev()
    }

    pub fn summary(&self) -> FolderSummary {
        let inbox = self.inbox.len();
        let spam = self.spam.len();
        let total = inbox + spam;

        FolderSummary {
            total,
            inbox,
            spam,
            spam_ratio_percent: if total > 0 { spam * 100 / total } else { 0 },
        }
    }

    /// Restore folders from a JSON state file; a missing file yields empty folders.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the state file through a sibling `.tmp` file and rename it into
    /// place. An interrupted save leaves the previous state file intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StateError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        let tmp_path = temp_path(path);
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
