//! 会话目录：记录归一化、只读仓库接口（内存 / SQLite）与文件加载

pub mod event;
pub mod loader;
pub mod repository;
pub mod sqlite;

pub use event::{is_placeholder_time, split_day_time, Day, Event, Labels, RawEvent, PLACEHOLDER};
pub use loader::{load_events, open_repository};
pub use repository::{CatalogError, EventRepository, InMemoryRepository, SearchFilter};
pub use sqlite::SqliteRepository;
