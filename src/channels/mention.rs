use crate::config::GroupPolicy;
use regex::Regex;
use tracing::warn;

/// Decide whether the bot must respond to a message, and strip the
/// triggering `@mention` from the content when it does.
///
/// Direct chats always pass through untouched; the addressing policy only
/// applies to groups. Under the mention policy with no configured bot name
/// the gate fails open — there is nothing to match against.
pub fn should_respond(
    content: &str,
    is_group: bool,
    policy: GroupPolicy,
    bot_name: Option<&str>,
) -> (bool, String) {
    if !is_group || policy == GroupPolicy::Always {
        return (true, content.to_string());
    }

    let Some(bot_name) = bot_name.filter(|n| !n.is_empty()) else {
        return (true, content.to_string());
    };

    let pattern = format!(r"(?i)@{}\s*", regex::escape(bot_name));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Failed to compile mention pattern for {:?}: {}", bot_name, e);
            return (true, content.to_string());
        }
    };

    if !re.is_match(content) {
        return (false, content.to_string());
    }

    let cleaned = re.replacen(content, 1, "").trim().to_string();
    (true, cleaned)
}
