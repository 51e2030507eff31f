/// Router Module Index
///
/// Routes are split by the access they require, and the auth layer is
/// attached per module in `create_router`.

/// Anonymous-friendly routes: health, configuration, session, public listings.
pub mod public;

/// Routes behind the `AuthUser` layer: logout and listing management.
pub mod authenticated;

/// Role management, behind the `AuthUser` layer and an admin check.
pub mod admin;
