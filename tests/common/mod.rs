//! Shared helpers for the e2e test suites.

pub mod server;

pub use server::TestServer;

/// Identity headers the upstream auth gateway would attach.
pub const ADMIN_HEADERS: [(&str, &str); 3] = [
    ("x-auth-user-id", "admin-1"),
    ("x-auth-email", "admin@example.com"),
    ("x-auth-role", "admin"),
];

pub fn user_headers(email: &str) -> [(&'static str, String); 3] {
    [
        ("x-auth-user-id", "user-1".to_string()),
        ("x-auth-email", email.to_string()),
        ("x-auth-role", "user".to_string()),
    ]
}
