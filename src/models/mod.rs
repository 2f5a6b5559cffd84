mod api;

pub use api::LoginRequest;
