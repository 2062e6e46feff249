/// Middleware module
///
/// Access-token guard and request logging.

mod auth_middleware;
mod request_logger;

pub use auth_middleware::AccessTokenMiddleware;
pub use request_logger::RequestLogger;
