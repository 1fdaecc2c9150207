pub mod manager;
pub mod models;
pub mod pagination;
pub mod query_builder;

pub use manager::{DatabaseError, DatabaseManager};
pub use pagination::{PageError, PageParams, PageRequest, PageSize, Pagination, SearchWindow, WindowPagination};
