pub mod account;
pub mod assistant;
pub mod background;
pub mod chat;
pub mod composer;
pub mod content;
pub mod domain;
pub mod extract;
pub mod gateway;
pub mod library;
pub mod messaging;
pub mod migrator;
pub mod popup;
pub mod ports;
pub mod prefs;
pub mod ready;
pub mod session;
pub mod store;
pub mod widget;

#[cfg(test)]
mod testing;

pub use domain::{
    BubblePosition, BubblePreferences, GeneratedContent, ItemType, PageSnapshot, Platform,
    SavedItem, SavedItemInput, Session, SocialPlatform,
};
pub use ports::{
    BackendService, ExtensionHost, KeyValueStore, PageDocument, PortError, PortResult,
    TextGenerationService,
};
