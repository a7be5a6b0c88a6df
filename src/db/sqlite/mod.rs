mod logs;

pub use logs::SqliteLogRepo;
