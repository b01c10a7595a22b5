pub mod cli;
pub mod config;
pub mod connection;
pub mod content;
pub mod exception;
pub mod header;
pub mod param;
pub mod request;
pub mod response;
pub mod server;

pub use config::Config;
pub use connection::{route, Connection, Dispatch, Outcome};
pub use content::{ContentResolver, ContentTypeResolver};
pub use exception::Exception;
pub use header::HeaderMap;
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use server::Server;
