//! In-process conversation history.
//!
//! The map lock is only held for lookups and inserts. Each conversation has
//! its own async mutex, which a chat turn holds for its whole duration so two
//! turns on one id run one after the other.

use crate::models::chat::ChatMessage;
use chrono::{ DateTime, Utc };
use log::{ debug, info };
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{ Mutex, OwnedMutexGuard };

/// One system message plus twenty user/assistant turns.
pub const DEFAULT_MAX_MESSAGES: usize = 21;
const MIN_MAX_MESSAGES: usize = 3;

pub type ConversationHandle = Arc<Mutex<Conversation>>;

#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    fn new(id: &str, system_prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Drops the oldest pair after the system message until at most
    /// `max_messages` remain. Returns how many messages were removed.
    pub fn trim(&mut self, max_messages: usize) -> usize {
        let before = self.messages.len();
        // Index 0 always stays.
        while self.messages.len() > max_messages.max(1) {
            let end = 3.min(self.messages.len());
            self.messages.drain(1..end);
        }
        before - self.messages.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub max_messages: usize,
    /// 0 keeps every conversation until it is cleared.
    pub max_conversations: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_conversations: 0,
        }
    }
}

/// A conversation locked for the length of one chat turn.
///
/// Dropping it releases the lock. If the conversation was cleared or evicted
/// while the turn ran, whatever the turn appends is discarded with it.
pub struct ConversationTurn {
    conversation: OwnedMutexGuard<Conversation>,
    max_messages: usize,
}

impl ConversationTurn {
    pub fn id(&self) -> &str {
        self.conversation.id()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.conversation.append(message);
    }

    /// Trims to the store's cap. Returns how many messages were removed.
    pub fn trim(&mut self) -> usize {
        let removed = self.conversation.trim(self.max_messages);
        if removed > 0 {
            debug!("Trimmed {} messages from conversation '{}'", removed, self.conversation.id());
        }
        removed
    }
}

struct StoredConversation {
    handle: ConversationHandle,
    created_at: DateTime<Utc>,
}

pub struct ConversationStore {
    conversations: Mutex<LruCache<String, StoredConversation>>,
    system_prompt: Arc<str>,
    max_messages: usize,
}

impl ConversationStore {
    pub fn new(system_prompt: impl Into<Arc<str>>, limits: StoreLimits) -> Self {
        let conversations = match NonZeroUsize::new(limits.max_conversations) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            conversations: Mutex::new(conversations),
            system_prompt: system_prompt.into(),
            max_messages: limits.max_messages.max(MIN_MAX_MESSAGES),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Returns the conversation for `id`, starting it with the system
    /// instruction if this id has not been seen (or was cleared). Marks it as
    /// the most recently used.
    pub async fn get_or_create(&self, conversation_id: &str) -> ConversationHandle {
        let mut conversations = self.conversations.lock().await;
        if let Some(stored) = conversations.get(conversation_id) {
            return Arc::clone(&stored.handle);
        }

        debug!("Starting conversation '{}'", conversation_id);
        let handle = Arc::new(Mutex::new(Conversation::new(conversation_id, &self.system_prompt)));
        let stored = StoredConversation { handle: Arc::clone(&handle), created_at: Utc::now() };
        if let Some((evicted_id, evicted)) = conversations.push(conversation_id.to_string(), stored) {
            info!(
                "Evicting least recently used conversation '{}' (started {})",
                evicted_id,
                evicted.created_at.to_rfc3339()
            );
        }
        handle
    }

    /// Locks the conversation for `id`, creating it if needed, and keeps it
    /// locked until the returned turn is dropped.
    pub async fn begin_turn(&self, conversation_id: &str) -> ConversationTurn {
        let handle = self.get_or_create(conversation_id).await;
        ConversationTurn {
            conversation: handle.lock_owned().await,
            max_messages: self.max_messages,
        }
    }

    /// Forgets a conversation and returns when it was started. Clearing an
    /// unknown id is not an error and returns `None`.
    pub async fn clear(&self, conversation_id: &str) -> Option<DateTime<Utc>> {
        self.conversations
            .lock().await
            .pop(conversation_id)
            .map(|stored| stored.created_at)
    }

    /// A copy of the stored history, if the conversation exists. Does not
    /// count as a use for eviction.
    pub async fn messages(&self, conversation_id: &str) -> Option<Vec<ChatMessage>> {
        let handle = {
            let conversations = self.conversations.lock().await;
            Arc::clone(&conversations.peek(conversation_id)?.handle)
        };
        let conversation = handle.lock().await;
        Some(conversation.messages().to_vec())
    }

    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.conversations.lock().await.contains(conversation_id)
    }

    pub async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    fn store() -> ConversationStore {
        ConversationStore::new("be helpful", StoreLimits::default())
    }

    async fn add_pair(store: &ConversationStore, id: &str, question: String, answer: String) {
        let mut turn = store.begin_turn(id).await;
        turn.append(ChatMessage::user(question));
        turn.append(ChatMessage::assistant(answer));
    }

    #[tokio::test]
    async fn new_conversation_starts_with_system_prompt() {
        let store = store();
        let handle = store.get_or_create("fresh").await;
        let conversation = handle.lock().await;
        assert_eq!(conversation.id(), "fresh");
        assert_eq!(conversation.messages(), &[ChatMessage::system("be helpful")]);
    }

    #[tokio::test]
    async fn handle_is_shared_between_calls() {
        let store = store();
        store.get_or_create("a").await.lock().await.append(ChatMessage::user("hi"));
        store.begin_turn("a").await.append(ChatMessage::assistant("hello"));

        let messages = store.messages("a").await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn trim_drops_oldest_pair_and_keeps_system() {
        let store = store();
        for i in 0..11 {
            add_pair(&store, "t", format!("q{i}"), format!("a{i}")).await;
        }
        assert_eq!(store.messages("t").await.unwrap().len(), 23);

        assert_eq!(store.begin_turn("t").await.trim(), 2);
        let messages = store.messages("t").await.unwrap();
        assert_eq!(messages.len(), 21);
        assert_eq!(messages[0], ChatMessage::system("be helpful"));
        assert_eq!(messages[1].content, "q1");
        assert_eq!(messages[20].content, "a10");
    }

    #[tokio::test]
    async fn trim_below_cap_is_noop() {
        let store = store();
        let mut turn = store.begin_turn("t").await;
        turn.append(ChatMessage::user("q"));
        assert_eq!(turn.trim(), 0);
        assert_eq!(turn.len(), 2);
        assert!(!store.contains("missing").await);
    }

    #[test]
    fn trim_catches_up_after_failed_turns() {
        let mut conversation = Conversation::new("c", "sys");
        for i in 0..24 {
            conversation.append(ChatMessage::user(format!("q{i}")));
        }
        assert_eq!(conversation.len(), 25);
        conversation.trim(21);
        assert!(conversation.len() <= 21);
        assert_eq!(conversation.messages()[0].role, Role::System);
    }

    #[tokio::test]
    async fn turn_holds_the_conversation_lock_until_dropped() {
        let store = store();
        let turn = store.begin_turn("locked").await;
        assert_eq!(turn.id(), "locked");
        assert!(store.get_or_create("locked").await.try_lock().is_err());

        drop(turn);
        assert!(store.get_or_create("locked").await.try_lock().is_ok());
    }

    #[tokio::test]
    async fn clear_removes_and_next_message_starts_fresh() {
        let store = store();
        let before = Utc::now();
        store.begin_turn("c").await.append(ChatMessage::user("remember me"));

        let started = store.clear("c").await.unwrap();
        assert!(started >= before && started <= Utc::now());

        assert!(store.messages("c").await.is_none());
        let handle = store.get_or_create("c").await;
        assert_eq!(handle.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn clear_unknown_id_leaves_others_alone() {
        let store = store();
        store.begin_turn("kept").await.append(ChatMessage::user("hi"));

        assert!(store.clear("never-seen").await.is_none());
        assert_eq!(store.len().await, 1);
        assert_eq!(store.messages("kept").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cap_is_clamped_to_hold_a_full_pair() {
        let store = ConversationStore::new("s", StoreLimits { max_messages: 1, max_conversations: 0 });
        assert_eq!(store.max_messages(), 3);
    }

    #[tokio::test]
    async fn least_recently_used_conversation_is_evicted() {
        let store = ConversationStore::new("s", StoreLimits {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_conversations: 2,
        });
        store.get_or_create("a").await;
        store.get_or_create("b").await;
        store.get_or_create("a").await;
        store.get_or_create("c").await;

        assert_eq!(store.len().await, 2);
        assert!(store.contains("a").await);
        assert!(!store.contains("b").await);
        assert!(store.contains("c").await);
    }

    #[tokio::test]
    async fn reading_history_does_not_refresh_recency() {
        let store = ConversationStore::new("s", StoreLimits {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_conversations: 2,
        });
        store.get_or_create("a").await;
        store.get_or_create("b").await;
        assert!(store.messages("a").await.is_some());
        assert!(store.contains("a").await);
        store.get_or_create("c").await;

        assert!(!store.contains("a").await);
        assert!(store.contains("b").await);
    }

    #[tokio::test]
    async fn unbounded_by_default() {
        let store = store();
        for i in 0..100 {
            store.get_or_create(&format!("c{i}")).await;
        }
        assert_eq!(store.len().await, 100);
    }
}
