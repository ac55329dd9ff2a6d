//! Conversation Store
//!
//! Client-side mirror of the backend's conversation and folder lists.
//! Refreshes are idempotent full replaces; the mirror may briefly lag a
//! conversation the backend just created, which is why the facade schedules
//! a delayed refresh after a first send instead of reading the list back
//! synchronously.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, BackendApi, HistoryItem};

/// A stored conversation, as listed by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Server-side id
    pub id: String,
    /// Display title; falls back to the first query when the backend
    /// stores no explicit title
    pub title: String,
    /// Folder the conversation is filed under, if any
    pub folder_id: Option<String>,
}

impl Conversation {
    fn from_history(item: HistoryItem) -> Self {
        let title = item.title.or(item.query).unwrap_or_default();
        Self {
            id: item.id,
            title,
            folder_id: item.folder_id,
        }
    }
}

/// A flat, named grouping of conversations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Server-side id
    pub id: String,
    /// Folder display name
    pub name: String,
}

struct StoreState {
    conversations: Vec<Conversation>,
    folders: Vec<Folder>,
}

/// Mirror of the backend's conversation and folder lists
pub struct ConversationStore {
    api: Arc<dyn BackendApi>,
    state: Mutex<StoreState>,
}

impl ConversationStore {
    /// Create an empty mirror backed by `api`
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            state: Mutex::new(StoreState {
                conversations: Vec::new(),
                folders: Vec::new(),
            }),
        }
    }

    /// Snapshot of the mirrored conversation list
    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().conversations.clone()
    }

    /// Snapshot of the mirrored folder list
    pub fn folders(&self) -> Vec<Folder> {
        self.state.lock().folders.clone()
    }

    /// Conversations filed under `folder_id` (`None` for unfiled ones)
    ///
    /// The relation is weak: deleting a folder does not cascade here,
    /// the backend decides what happens to its conversations.
    pub fn conversations_in(&self, folder_id: Option<&str>) -> Vec<Conversation> {
        self.state
            .lock()
            .conversations
            .iter()
            .filter(|conversation| conversation.folder_id.as_deref() == folder_id)
            .cloned()
            .collect()
    }

    /// Replace the conversation mirror with the backend's list
    pub async fn refresh_conversations(&self) -> Result<(), ApiError> {
        let items = self.api.fetch_history().await?;
        let conversations = items.into_iter().map(Conversation::from_history).collect();
        self.state.lock().conversations = conversations;
        Ok(())
    }

    /// Replace the folder mirror with the backend's list
    pub async fn refresh_folders(&self) -> Result<(), ApiError> {
        let entries = self.api.fetch_folders().await?;
        let folders = entries
            .into_iter()
            .map(|entry| Folder {
                id: entry.id,
                name: entry.name,
            })
            .collect();
        self.state.lock().folders = folders;
        Ok(())
    }

    /// Create a folder named `name`, then refresh the folder mirror
    ///
    /// An empty name is rejected as a no-op.
    pub async fn create_folder(&self, name: &str) -> Result<(), ApiError> {
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!("ignoring folder creation with empty name");
            return Ok(());
        }
        self.api.create_folder(name).await?;
        self.refresh_folders().await
    }

    /// Delete the folder `id`, then refresh the folder mirror
    ///
    /// Destructive; the shell confirms with the user before calling. The
    /// mirror is left unchanged when the call fails.
    pub async fn delete_folder(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_folder(id).await?;
        self.refresh_folders().await
    }

    /// Delete the conversation `id`, then refresh the conversation mirror
    ///
    /// Destructive; the shell confirms with the user before calling. The
    /// caller is responsible for clearing the active session when it was
    /// showing this conversation (see `ChatClient::delete_conversation`).
    pub async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_conversation(id).await?;
        self.refresh_conversations().await
    }

    /// Drop the local conversation mirror without a network call
    pub(crate) fn clear_conversations(&self) {
        self.state.lock().conversations.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::testing::ScriptedApi;
    use crate::api::FolderEntry;

    fn history_item(id: &str, query: &str) -> HistoryItem {
        HistoryItem {
            id: id.to_string(),
            query: Some(query.to_string()),
            ..HistoryItem::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_conversations() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![history_item("c1", "first"), history_item("c2", "second")];
        let store = ConversationStore::new(api.clone());

        store.refresh_conversations().await.unwrap();
        let conversations = store.conversations();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].id, "c1");
        assert_eq!(conversations[0].title, "first");

        // A refresh is a full replace, not a merge
        *api.history.lock() = vec![history_item("c3", "third")];
        store.refresh_conversations().await.unwrap();
        let conversations = store.conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, "c3");
    }

    #[tokio::test]
    async fn test_empty_history_mirrors_as_empty() {
        let api = Arc::new(ScriptedApi::new());
        let store = ConversationStore::new(api);
        store.refresh_conversations().await.unwrap();
        assert!(store.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_mirror() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![history_item("c1", "first")];
        let store = ConversationStore::new(api.clone());
        store.refresh_conversations().await.unwrap();

        api.fail_history.store(true, Ordering::SeqCst);
        assert!(store.refresh_conversations().await.is_err());
        assert_eq!(store.conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_title_falls_back_to_query() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![
            HistoryItem {
                id: "c1".to_string(),
                title: Some("Trip plan".to_string()),
                query: Some("where should I go".to_string()),
                ..HistoryItem::default()
            },
            history_item("c2", "how do I make bread"),
        ];
        let store = ConversationStore::new(api);

        store.refresh_conversations().await.unwrap();
        let conversations = store.conversations();
        assert_eq!(conversations[0].title, "Trip plan");
        assert_eq!(conversations[1].title, "how do I make bread");
    }

    #[tokio::test]
    async fn test_create_folder_round_trips_and_refreshes() {
        let api = Arc::new(ScriptedApi::new());
        let store = ConversationStore::new(api);

        store.create_folder("Recipes").await.unwrap();
        let folders = store.folders();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "Recipes");
    }

    #[tokio::test]
    async fn test_empty_folder_name_is_a_noop() {
        let api = Arc::new(ScriptedApi::new());
        let store = ConversationStore::new(api.clone());

        store.create_folder("   ").await.unwrap();
        assert!(store.folders().is_empty());
        assert!(api.folders.lock().is_empty());
    }

    #[tokio::test]
    async fn test_delete_folder_refreshes_mirror() {
        let api = Arc::new(ScriptedApi::new());
        api.folders.lock().push(FolderEntry {
            id: "folder_1".to_string(),
            name: "Recipes".to_string(),
        });
        let store = ConversationStore::new(api);
        store.refresh_folders().await.unwrap();
        assert_eq!(store.folders().len(), 1);

        store.delete_folder("folder_1").await.unwrap();
        assert!(store.folders().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_mirror_unchanged() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![history_item("c1", "first")];
        let store = ConversationStore::new(api.clone());
        store.refresh_conversations().await.unwrap();

        api.fail_delete.store(true, Ordering::SeqCst);
        assert!(store.delete_conversation("c1").await.is_err());
        assert_eq!(store.conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_folder_grouping_is_a_weak_relation() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![
            HistoryItem {
                id: "c1".to_string(),
                query: Some("filed".to_string()),
                folder_id: Some("folder_1".to_string()),
                ..HistoryItem::default()
            },
            history_item("c2", "unfiled"),
        ];
        let store = ConversationStore::new(api);
        store.refresh_conversations().await.unwrap();

        assert_eq!(store.conversations_in(Some("folder_1")).len(), 1);
        assert_eq!(store.conversations_in(None).len(), 1);
        assert!(store.conversations_in(Some("folder_2")).is_empty());
    }
}
