use crate::errors::WxBridgeError;
use serde::{Deserialize, Serialize};

/// When the bot must respond in group conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// Respond to every group message.
    Always,
    /// Respond only when the bot is @mentioned.
    #[default]
    Mention,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeChatConfig {
    #[serde(default)]
    pub enabled: bool,
    /// WebSocket endpoint of the automation bridge (a local co-process).
    #[serde(default = "default_bridge_url", rename = "bridgeUrl")]
    pub bridge_url: String,
    /// Conversations to register `listen` commands for on (re)connect.
    #[serde(default, rename = "listenConversations")]
    pub listen_conversations: Vec<String>,
    #[serde(default, rename = "groupPolicy")]
    pub group_policy: GroupPolicy,
    /// Display name matched by the mention gate. Without it the mention
    /// policy cannot be enforced and the gate fails open.
    #[serde(default, rename = "botName")]
    pub bot_name: Option<String>,
    /// Flatten Markdown replies before sending; WeChat renders no markup.
    #[serde(default = "default_true", rename = "stripMarkdown")]
    pub strip_markdown: bool,
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:9574/ws".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for WeChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge_url: default_bridge_url(),
            listen_conversations: Vec::new(),
            group_policy: GroupPolicy::default(),
            bot_name: None,
            strip_markdown: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub wechat: WeChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), WxBridgeError> {
        let wechat = &self.channels.wechat;
        if !wechat.enabled {
            return Ok(());
        }
        if wechat.bridge_url.is_empty() {
            return Err(WxBridgeError::Config("bridgeUrl is empty".into()));
        }
        let url = url::Url::parse(&wechat.bridge_url)
            .map_err(|e| WxBridgeError::Config(format!("bridgeUrl is invalid: {}", e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(WxBridgeError::Config(format!(
                "bridgeUrl must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        Ok(())
    }
}
