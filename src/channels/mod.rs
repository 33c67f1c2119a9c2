pub mod base;
pub mod context;
pub mod echo;
pub mod mention;
pub mod wechat;

pub use base::BaseChannel;
pub use wechat::WeChatChannel;
