//! Parser failure modes (§4.1): duplicate keys within a scope, and
//! indentation that collapses mid-block.

use schemadrift_core::{Error, MalformedDocument};

#[test]
fn duplicate_key_within_same_scope_is_rejected() {
    let input = "databaseChangeLog:\n\
  - changeSet:\n\
      id: '1'\n\
      id: '2'\n\
      author: alice\n\
      changes:\n\
        - sql: select 1\n";

    let err = schemadrift_core::parse(input).expect_err("duplicate id must be rejected");
    match err {
        Error::Malformed(MalformedDocument::DuplicateKey { key, .. }) => {
            assert_eq!(key, "id");
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
}

#[test]
fn indentation_collapse_mid_block_is_rejected() {
    let input = "databaseChangeLog:\n\
  - changeSet:\n\
      id: '1'\n\
      author: alice\n\
      changes:\n\
        - sql: select 1\n\
       - sql: select 2\n";

    let err = schemadrift_core::parse(input).expect_err("odd indentation must be rejected");
    assert!(matches!(
        err,
        Error::Malformed(MalformedDocument::BadIndentation { .. })
    ));
}
