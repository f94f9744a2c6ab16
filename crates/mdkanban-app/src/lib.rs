//! Application layer for mdkanban.
//!
//! Settings, the list scanner, the board state machine with its store, and the
//! async vault boundary. The CLI drives everything through [`BoardService`].

pub mod board;
pub mod list_items;
pub mod service;
pub mod settings;
pub mod store;
pub mod vault;

pub use board::{Action, BoardError, BoardState, TaskWrite, Transition, reduce};
pub use list_items::{parse_document, scan_list_items};
pub use service::BoardService;
pub use settings::{BoardSettings, CURRENT_VERSION, SettingsError, SettingsFile};
pub use store::BoardStore;
pub use vault::{FsVault, VaultError, VaultIo, apply_writes, splice_writes};
