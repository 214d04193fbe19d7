//! Local authentication: one credential pair per device plus an independent
//! session flag.

use color_eyre::Result;

use crate::models::Credentials;
use crate::store::{Store, StoreBackend};

/// Register the device credential pair and start a session.
pub fn register<B: StoreBackend>(store: &Store<B>, username: &str, password: &str) -> Result<()> {
  store.set_credentials(&Credentials {
    username: username.to_string(),
    password: password.to_string(),
  })?;
  store.set_session()
}

/// Attempt a login against the stored credential pair. On a match the
/// session flag is set; a mismatch or missing registration returns false.
pub fn login<B: StoreBackend>(store: &Store<B>, username: &str, password: &str) -> Result<bool> {
  let stored = match store.credentials() {
    Some(creds) => creds,
    None => return Ok(false),
  };

  if stored.username == username && stored.password == password {
    store.set_session()?;
    Ok(true)
  } else {
    Ok(false)
  }
}

/// End the session. Credentials survive logout.
pub fn logout<B: StoreBackend>(store: &Store<B>) -> Result<()> {
  store.clear_session()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryBackend;

  fn store() -> Store<MemoryBackend> {
    Store::new(MemoryBackend::new())
  }

  #[test]
  fn login_without_registration_fails() {
    let store = store();
    assert!(!login(&store, "tech", "pass").unwrap());
    assert!(!store.session_active());
  }

  #[test]
  fn register_starts_a_session() {
    let store = store();
    register(&store, "tech", "pass").unwrap();
    assert!(store.session_active());
  }

  #[test]
  fn login_checks_both_fields() {
    let store = store();
    register(&store, "tech", "pass").unwrap();
    logout(&store).unwrap();

    assert!(!login(&store, "tech", "wrong").unwrap());
    assert!(!login(&store, "other", "pass").unwrap());
    assert!(!store.session_active());

    assert!(login(&store, "tech", "pass").unwrap());
    assert!(store.session_active());
  }

  #[test]
  fn logout_clears_session_only() {
    let store = store();
    register(&store, "tech", "pass").unwrap();
    logout(&store).unwrap();

    assert!(!store.session_active());
    assert!(store.credentials().is_some());
  }
}
