//! Leading-keyword extraction.
//!
//! Uses the sqlparser tokenizer so that leading comments and whitespace are
//! skipped the same way the service skips them. The statement body is never
//! parsed.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::StatementKind;

/// Returns the first keyword of a statement, uppercased.
///
/// Falls back to the first whitespace-separated word when the statement
/// cannot be tokenized (for example an unterminated string literal later on).
pub fn leading_keyword(statement: &str) -> String {
    let dialect = GenericDialect {};
    match Tokenizer::new(&dialect, statement).tokenize() {
        Ok(tokens) => tokens
            .into_iter()
            .find_map(|token| match token {
                Token::Whitespace(_) => None,
                Token::Word(word) => Some(word.value.to_uppercase()),
                _ => Some(String::new()),
            })
            .unwrap_or_default(),
        Err(_) => statement
            .split_whitespace()
            .next()
            .map(|w| {
                w.chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect::<String>()
                    .to_uppercase()
            })
            .unwrap_or_default(),
    }
}

/// Classifies a statement by its first keyword.
pub fn classify(statement: &str) -> StatementKind {
    StatementKind::from_keyword(&leading_keyword(statement))
}

/// Returns true if the statement starts with a schema- or data-mutating verb.
pub fn is_mutating(statement: &str) -> bool {
    classify(statement).is_mutating()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_verbs() {
        for sql in [
            "CREATE TABLE t (id int)",
            "drop table t",
            "  \n\tALTER TABLE t ADD COLUMNS (x int)",
            "RENAME TABLE a TO b",
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET a = 1",
            "DELETE FROM t WHERE a = 1",
            "MERGE INTO t USING s ON t.id = s.id WHEN MATCHED THEN DELETE",
            "TRUNCATE TABLE t",
            "VACUUM t",
            "OPTIMIZE t REWRITE DATA USING BIN_PACK",
            "msck repair table t",
        ] {
            assert!(is_mutating(sql), "expected mutating: {sql}");
        }
    }

    #[test]
    fn test_queries_are_not_mutating() {
        for sql in [
            "SELECT * FROM t",
            "select 1",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x",
            "SELECT 'DROP TABLE t'",
            "UNLOAD (SELECT 1) TO 's3://b/k/' WITH (format = 'PARQUET')",
            "SHOW TABLES",
            "",
            "   ",
        ] {
            assert!(!is_mutating(sql), "expected not mutating: {sql}");
        }
    }

    #[test]
    fn test_leading_comments_are_skipped() {
        assert_eq!(classify("-- note\nDROP TABLE t"), StatementKind::Drop);
        assert_eq!(classify("/* hint */ SELECT 1"), StatementKind::Select);
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        assert_eq!(
            classify("CREATED_AT_VIEW"),
            StatementKind::Other("CREATED_AT_VIEW".to_string())
        );
        assert!(!is_mutating("(SELECT 1)"));
    }

    #[test]
    fn test_untokenizable_statement_falls_back() {
        assert_eq!(leading_keyword("INSERT INTO t VALUES ('open"), "INSERT");
        assert!(is_mutating("INSERT INTO t VALUES ('open"));
    }
}
