mod logs;

pub use logs::PostgresLogRepo;
