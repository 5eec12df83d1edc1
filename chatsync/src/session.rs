//! Client-side session state.
//!
//! Holds the identity, the channel roster as last pushed by the server, the
//! active channel and the bounded visible history. The server is the source
//! of truth: every roster push replaces the local roster wholesale.

use std::collections::{HashSet, VecDeque};

use chatsync_proto::channel::{Channel, ChannelId, Preview};
use chatsync_proto::identity::Identity;
use chatsync_proto::message::Message;

/// What the visible history currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HistoryView {
    /// No history has been loaded for the active channel.
    #[default]
    NotLoaded,
    /// History was loaded and the channel has no messages.
    Empty,
    /// Messages, oldest first.
    Messages(VecDeque<Message>),
}

impl HistoryView {
    /// Messages currently shown, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        match self {
            Self::Messages(m) => Some(m.iter()),
            Self::NotLoaded | Self::Empty => None,
        }
        .into_iter()
        .flatten()
    }

    /// Number of messages shown.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Messages(m) => m.len(),
            Self::NotLoaded | Self::Empty => 0,
        }
    }

    /// Whether no messages are shown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-session client state. Owned by the engine loop.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    profile_name: Option<String>,
    roster: Vec<Channel>,
    active: Option<ChannelId>,
    history: HistoryView,
    history_limit: usize,
}

impl Session {
    /// Fresh session: empty roster, no active channel, history not loaded.
    #[must_use]
    pub fn new(identity: Identity, history_limit: usize) -> Self {
        Self {
            identity,
            profile_name: None,
            roster: Vec::new(),
            active: None,
            history: HistoryView::NotLoaded,
            history_limit: history_limit.max(1),
        }
    }

    /// Set the cached profile display name used for self attribution.
    #[must_use]
    pub fn with_profile_name(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    /// The session identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The cached profile display name.
    #[must_use]
    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    /// Channels in server order.
    #[must_use]
    pub fn roster(&self) -> &[Channel] {
        &self.roster
    }

    /// Look up a roster channel by id.
    #[must_use]
    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.roster.iter().find(|c| &c.id == id)
    }

    /// Id of the active channel.
    #[must_use]
    pub const fn active_id(&self) -> Option<&ChannelId> {
        self.active.as_ref()
    }

    /// The active channel, resolved against the roster.
    #[must_use]
    pub fn active_channel(&self) -> Option<&Channel> {
        self.active.as_ref().and_then(|id| self.channel(id))
    }

    /// The visible history.
    #[must_use]
    pub const fn history(&self) -> &HistoryView {
        &self.history
    }

    /// Replace the roster with a server push.
    ///
    /// Duplicate ids are collapsed, first occurrence wins. The active channel
    /// survives every push: if the list leaves it out (a chat frame carries
    /// the sender's roster, not ours) it is carried over at the end. Returns
    /// `true` if the roster changed. Applying the same list twice is a no-op
    /// the second time.
    pub fn reconcile_roster(&mut self, channels: Vec<Channel>) -> bool {
        let mut seen = HashSet::with_capacity(channels.len());
        let mut roster = Vec::with_capacity(channels.len() + 1);
        for channel in channels {
            if seen.insert(channel.id.clone()) {
                roster.push(channel);
            } else {
                tracing::debug!(channel = %channel.id, "duplicate channel in pushed roster");
            }
        }

        if let Some(active) = &self.active {
            if !seen.contains(active) {
                if let Some(current) = self.roster.iter().find(|c| &c.id == active) {
                    tracing::debug!(channel = %active, "keeping active channel missing from push");
                    roster.push(current.clone());
                }
            }
        }

        let changed = roster != self.roster;
        self.roster = roster;
        changed
    }

    /// Make `channel` active, adding it to the roster if it is not listed.
    ///
    /// Returns `true` if the roster grew.
    pub fn set_active_channel(&mut self, channel: Channel) -> bool {
        let id = channel.id.clone();
        let inserted = if self.channel(&id).is_none() {
            self.roster.push(channel);
            true
        } else {
            false
        };
        if self.active.as_ref() != Some(&id) {
            tracing::debug!(channel = %id, "active channel changed");
        }
        self.active = Some(id);
        inserted
    }

    /// Append an inbound message to the visible history.
    ///
    /// Evicts the oldest message beyond the history limit and refreshes the
    /// active channel's last-message preview.
    pub fn append_message(&mut self, message: Message) {
        if let Some(active) = &self.active {
            if let Some(channel) = self.roster.iter_mut().find(|c| &c.id == active) {
                channel.last_message = Some(Preview {
                    author: message.author.clone(),
                    body: message.body.clone(),
                });
            }
        }

        if !matches!(self.history, HistoryView::Messages(_)) {
            self.history = HistoryView::Messages(VecDeque::new());
        }
        if let HistoryView::Messages(messages) = &mut self.history {
            messages.push_back(message);
            while messages.len() > self.history_limit {
                messages.pop_front();
            }
        }
    }

    /// Replace the visible history with a full channel history.
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        if messages.is_empty() {
            self.history = HistoryView::Empty;
            return;
        }
        let skip = messages.len().saturating_sub(self.history_limit);
        self.history = HistoryView::Messages(messages.into_iter().skip(skip).collect());
    }

    /// Forget the visible history.
    pub fn clear_history(&mut self) {
        self.history = HistoryView::NotLoaded;
    }

    /// Whether `message` was sent by this session's user.
    ///
    /// A sender id, when present, decides. Otherwise the author name is
    /// compared with the profile name, trimmed and case-insensitively; two
    /// users with the same display name are indistinguishable this way.
    #[must_use]
    pub fn is_own(&self, message: &Message) -> bool {
        if let Some(author_id) = &message.author_id {
            return *author_id == self.identity.id;
        }
        self.profile_name
            .as_deref()
            .is_some_and(|name| normalize(name) == normalize(&message.author))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
