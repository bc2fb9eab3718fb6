/// Router Module Index
///
/// Routes are grouped by how a caller must identify itself. Authentication is
/// applied per group with a route layer; authorization is decided by the access
/// policy inside each operation.

/// Routes usable without credentials. Handlers that take `Option<AuthUser>` widen
/// their view when credentials are presented.
pub mod public;

/// Routes behind the authentication layer.
pub mod authenticated;

/// Moderation endpoints, also behind the authentication layer.
pub mod moderation;
