//! SQL dialect definitions and formatting rules.
//!
//! The splitter emits the same query shape everywhere; dialects only differ
//! in identifier quoting, boolean literals, placeholder syntax, and whether
//! NULLS FIRST/LAST is understood.

/// SQL dialect trait - defines how lexical SQL atoms are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    ///
    /// - ANSI/PostgreSQL: `"identifier"`
    /// - MySQL: `` `identifier` ``
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Render a bound-parameter placeholder for a 0-based position.
    ///
    /// - Generic (JDBC/H2 style): `?1`, `?2`, ...
    /// - PostgreSQL: `$1`, `$2`, ...
    /// - MySQL: `?` (purely positional)
    fn placeholder(&self, idx: usize) -> String;

    /// Whether the dialect understands NULLS FIRST / NULLS LAST.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }
}

/// The supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// ANSI-flavored SQL with JDBC-style numbered placeholders.
    #[default]
    Generic,
    Postgres,
    MySql,
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }

    fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        match self {
            // MySQL predates true boolean literals in older versions.
            Dialect::MySql => {
                if b {
                    "1"
                } else {
                    "0"
                }
            }
            _ => {
                if b {
                    "TRUE"
                } else {
                    "FALSE"
                }
            }
        }
    }

    fn placeholder(&self, idx: usize) -> String {
        match self {
            Dialect::Generic => format!("?{}", idx + 1),
            Dialect::Postgres => format!("${}", idx + 1),
            Dialect::MySql => "?".into(),
        }
    }

    fn supports_nulls_ordering(&self) -> bool {
        !matches!(self, Dialect::MySql)
    }
}
