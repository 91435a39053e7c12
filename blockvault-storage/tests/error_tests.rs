use blockvault_storage::StorageError;
use rusqlite::ffi;

fn sqlite_failure(code: i32) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
}

#[test]
fn busy_and_locked_map_to_busy() {
    assert!(StorageError::from(sqlite_failure(ffi::SQLITE_BUSY)).is_busy());
    assert!(StorageError::from(sqlite_failure(ffi::SQLITE_LOCKED)).is_busy());
}

#[test]
fn other_sqlite_errors_stay_database_errors() {
    let err = StorageError::from(sqlite_failure(ffi::SQLITE_CONSTRAINT));
    assert!(matches!(err, StorageError::Database(_)));
    assert!(!err.is_busy());
}

#[test]
fn display_carries_context() {
    let err = StorageError::Conflict {
        key: "cube/rubiks-cube".into(),
        expected: 2,
        actual: 3,
    };
    assert_eq!(
        err.to_string(),
        "version conflict on cube/rubiks-cube: expected 2, found 3"
    );
    let err = StorageError::InUse {
        slug: "cube".into(),
        documents: 4,
    };
    assert!(err.to_string().contains("4 document(s)"));
}
