use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// How long a buffered message stays replayable as context.
pub const CONTEXT_TTL: Duration = Duration::from_secs(300);

/// Maximum buffered messages per conversation; oldest evicted first.
pub const CONTEXT_MAX: usize = 10;

/// A group message that did not trigger a response, kept so a later
/// triggering message can replay it as conversational context.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub at: Instant,
    pub sender: String,
    pub kind: String,
    pub content: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl ContextEntry {
    pub fn text(sender: &str, content: &str) -> Self {
        Self {
            at: Instant::now(),
            sender: sender.to_string(),
            kind: "text".to_string(),
            content: content.to_string(),
            file_name: None,
            file_size: None,
            file_path: None,
            url: None,
            title: None,
        }
    }

    fn render(&self) -> String {
        match self.kind.as_str() {
            "text" => format!("[{}] {}", self.sender, self.content),
            "file" => {
                let mut line = format!("[{} sent a file]", self.sender);
                if let Some(name) = &self.file_name {
                    line.push_str(&format!(" {}", name));
                }
                if let Some(size) = self.file_size {
                    line.push_str(&format!(" ({})", format_file_size(size)));
                }
                if let Some(path) = &self.file_path {
                    line.push_str(&format!(" [path: {}]", path));
                }
                line
            }
            "link" => format!(
                "[{} shared a link] {} ({})",
                self.sender,
                self.title.as_deref().unwrap_or(""),
                self.url.as_deref().unwrap_or("")
            ),
            "image" => format!("[{} sent an image]", self.sender),
            "video" => format!("[{} sent a video]", self.sender),
            "quote" => format!("[{} quoted] {}", self.sender, self.content),
            other => format!(
                "[{} sent a {} message] {}",
                self.sender,
                other,
                self.content.chars().take(50).collect::<String>()
            ),
        }
    }
}

fn format_file_size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let b = bytes as f64;
    if bytes >= 1024 * 1024 {
        format!("{:.1}MB", b / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}KB", b / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

/// Per-conversation queues of skipped group messages.
#[derive(Debug, Default)]
pub struct PendingContext {
    conversations: HashMap<String, VecDeque<ContextEntry>>,
}

impl PendingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a non-triggering message. Expired entries are evicted first;
    /// then, at capacity, the single oldest entry is dropped.
    pub fn append(&mut self, conversation_id: &str, entry: ContextEntry) {
        let queue = self.conversations.entry(conversation_id.to_string()).or_default();
        let now = Instant::now();
        queue.retain(|e| now.duration_since(e.at) < CONTEXT_TTL);
        if queue.len() >= CONTEXT_MAX {
            queue.pop_front();
        }
        queue.push_back(entry);
    }

    /// Drain the conversation's queue and render it, oldest first, one line
    /// per message. Entries that aged past the TTL while buffered are
    /// dropped silently. Subsequent calls return an empty string until new
    /// entries arrive.
    pub fn flush(&mut self, conversation_id: &str) -> String {
        let Some(queue) = self.conversations.remove(conversation_id) else {
            return String::new();
        };
        let now = Instant::now();
        queue
            .iter()
            .filter(|e| now.duration_since(e.at) < CONTEXT_TTL)
            .map(ContextEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self, conversation_id: &str) -> usize {
        self.conversations
            .get(conversation_id)
            .map_or(0, VecDeque::len)
    }
}
