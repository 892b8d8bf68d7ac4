mod handler;
mod model;

pub use handler::{count, create, get_one, list, remove, update};
pub use model::{CountResponse, DeleteResponse, ListParams, ListResponse};
