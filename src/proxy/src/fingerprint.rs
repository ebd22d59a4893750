//! Content-addressed query cache key derivation.
//!
//! Grounded on `rocksdbstorage.cc`'s `Get_key`: canonicalize the set of
//! databases a query touches into a tag, hash the tag and the raw SQL
//! independently, and concatenate the two digests into a fixed-width key.

use sha2::{Digest, Sha512};

/// `H1 || H2`: digest of the canonical database tag, then digest of the raw SQL.
pub const CACHE_KEY_LEN: usize = 2 * 64;

pub type CacheKey = [u8; CACHE_KEY_LEN];

/// Out-of-scope collaborator (§1): resolves the tables a query references.
/// Returns `db.table` or bare `table` identifiers; never fails.
///
/// Deliberately not a SQL parser — the included implementation is a naive
/// token scan suitable for demos and tests, not for query planning.
pub trait TableClassifier {
    fn tables(&self, query_bytes: &[u8]) -> Vec<String>;
}

/// Scans for identifiers following `FROM`/`JOIN` keywords, case-insensitively.
/// Stops at the next whitespace, comma, or clause keyword. No comment or
/// string-literal awareness; a query containing those in table position will
/// confuse it, same as `querylogfilter.c`'s equally naive approach.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveTokenClassifier;

impl TableClassifier for NaiveTokenClassifier {
    fn tables(&self, query_bytes: &[u8]) -> Vec<String> {
        let sql = String::from_utf8_lossy(query_bytes);
        let words: Vec<&str> = sql.split_whitespace().collect();
        let mut tables = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let upper = words[i].to_ascii_uppercase();
            if upper == "FROM" || upper == "JOIN" {
                if let Some(next) = words.get(i + 1) {
                    let ident: String = next
                        .chars()
                        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
                        .collect();
                    if !ident.is_empty() {
                        tables.push(ident);
                    }
                }
            }
            i += 1;
        }
        tables
    }
}

/// Splits a table identifier on its first `.`, resolving against `default_db`
/// when no explicit database prefix is present. Returns `None` when neither
/// is available — such tables are silently dropped from the tag.
fn resolve_database<'a>(table: &'a str, default_db: Option<&'a str>) -> Option<&'a str> {
    match table.split_once('.') {
        Some((db, _table)) => Some(db),
        None => default_db,
    }
}

/// Derives the content-addressed cache key for `query_bytes` evaluated
/// against `default_db`, using `classifier` to resolve referenced tables.
///
/// Pure and infallible: a query touching no resolvable database still
/// produces a key (an empty tag hashes to a fixed value, not zero bytes).
pub fn fingerprint(
    default_db: Option<&str>,
    query_bytes: &[u8],
    classifier: &impl TableClassifier,
) -> CacheKey {
    let tables = classifier.tables(query_bytes);

    let mut dbs: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for table in &tables {
        if let Some(db) = resolve_database(table, default_db) {
            dbs.insert(db);
        }
    }

    let tag: String = dbs.into_iter().collect();

    let h1 = Sha512::digest(tag.as_bytes());
    let h2 = Sha512::digest(query_bytes);

    let mut key = [0u8; CACHE_KEY_LEN];
    key[..64].copy_from_slice(&h1);
    key[64..].copy_from_slice(&h2);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_identical_keys() {
        let k1 = fingerprint(Some("app"), b"select * from users", &NaiveTokenClassifier);
        let k2 = fingerprint(Some("app"), b"select * from users", &NaiveTokenClassifier);
        assert_eq!(k1, k2);
    }

    #[test]
    fn table_order_does_not_affect_key() {
        let k1 = fingerprint(
            Some("app"),
            b"select * from a join b",
            &NaiveTokenClassifier,
        );
        let k2 = fingerprint(
            Some("app"),
            b"select * from b join a",
            &NaiveTokenClassifier,
        );
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_default_db_changes_key_for_same_sql() {
        let k1 = fingerprint(Some("app1"), b"select * from users", &NaiveTokenClassifier);
        let k2 = fingerprint(Some("app2"), b"select * from users", &NaiveTokenClassifier);
        assert_ne!(k1, k2);
    }

    #[test]
    fn sql_casing_and_whitespace_affect_second_half_only() {
        let k1 = fingerprint(Some("app"), b"select * from users", &NaiveTokenClassifier);
        let k2 = fingerprint(Some("app"), b"SELECT * FROM users", &NaiveTokenClassifier);
        assert_eq!(&k1[..64], &k2[..64]);
        assert_ne!(&k1[64..], &k2[64..]);
    }

    #[test]
    fn unresolvable_table_is_dropped_not_errored() {
        struct NoDbClassifier;
        impl TableClassifier for NoDbClassifier {
            fn tables(&self, _q: &[u8]) -> Vec<String> {
                vec!["orphan".to_string()]
            }
        }
        let key = fingerprint(None, b"select 1", &NoDbClassifier);
        assert_eq!(key.len(), CACHE_KEY_LEN);
        let expected_tag_digest = Sha512::digest(b"");
        assert_eq!(&key[..64], expected_tag_digest.as_slice());
    }

    #[test]
    fn explicit_db_prefix_overrides_default() {
        let k1 = fingerprint(
            Some("default_db"),
            b"select * from other.users",
            &NaiveTokenClassifier,
        );
        let k2 = fingerprint(
            Some("other"),
            b"select * from users",
            &NaiveTokenClassifier,
        );
        assert_eq!(&k1[..64], &k2[..64]);
    }
}
