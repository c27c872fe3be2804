//! Shared-secret access control consumed by the HTTP layer.
//!
//! Two process-wide keys exist: an admin key (read + write) and a member key
//! (read). An unset or blank member key opens reads to everyone. Nothing in
//! the storage core calls this; it lives here so every front end applies the
//! same rule.

/// What a request wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
  Read,
  Write,
}

#[derive(Debug, Clone, Default)]
pub struct AccessKeys {
  pub admin_key:  Option<String>,
  pub member_key: Option<String>,
}

impl AccessKeys {
  pub fn new(admin_key: Option<String>, member_key: Option<String>) -> Self {
    let clean = |k: Option<String>| k.filter(|k| !k.trim().is_empty());
    Self { admin_key: clean(admin_key), member_key: clean(member_key) }
  }

  /// Strip an optional `Bearer ` prefix from an `Authorization` value.
  pub fn token_from_header(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
  }

  /// Whether `token` grants `permission`. The admin key implies every
  /// permission; writes require it.
  pub fn permits(&self, token: Option<&str>, permission: Permission) -> bool {
    let token = token.unwrap_or_default();
    if self.admin_key.as_deref().is_some_and(|k| k == token) {
      return true;
    }
    if permission == Permission::Write {
      return false;
    }
    match self.member_key.as_deref() {
      None => true,
      Some(k) => k == token,
    }
  }
}
