//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings.

use super::dialect::{Dialect, SqlDialect};

/// SQL Token - every possible element in a generated statement.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Explain,
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    Cross,
    GroupBy,
    Having,
    OrderBy,
    Asc,
    Desc,
    NullsFirst,
    NullsLast,
    Limit,
    Offset,
    IsNull,
    IsNotNull,
    Distinct,
    All,
    Union,
    Cast,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Qualified identifier: schema.table or just table
    QualifiedIdent {
        schema: Option<String>,
        name: String,
    },
    /// Integer literal
    LitInt(i64),
    /// Float literal
    LitFloat(f64),
    /// String literal
    LitString(String),
    /// Boolean literal
    LitBool(bool),
    /// NULL literal
    LitNull,
    /// Bound-parameter placeholder, 0-based position
    Placeholder(usize),
    /// SQL type name, as used in CAST targets
    TypeName(String),

    // === Function Names ===
    /// Function name - rendered uppercase as-is
    FunctionName(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            // Keywords
            Token::Explain => "EXPLAIN".into(),
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::Cross => "CROSS".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Having => "HAVING".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::NullsFirst => "NULLS FIRST".into(),
            Token::NullsLast => "NULLS LAST".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::All => "ALL".into(),
            Token::Union => "UNION".into(),
            Token::Cast => "CAST".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),
            Token::Mod => "%".into(),
            Token::Concat => "||".into(),

            // Whitespace
            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            // Dynamic - dialect-specific formatting
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { schema, name } => match schema {
                Some(s) => format!(
                    "{}.{}",
                    dialect.quote_identifier(s),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                if f.is_nan() {
                    panic!("Cannot serialize NaN to SQL")
                }
                if f.is_infinite() {
                    panic!("Cannot serialize Infinity to SQL")
                }
                // Use ryu for fast, accurate float formatting
                let mut buffer = ryu::Buffer::new();
                buffer.format(*f).to_string()
            }
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::LitNull => "NULL".into(),
            Token::Placeholder(idx) => dialect.placeholder(*idx),
            Token::TypeName(name) => name.clone(),

            // Function names
            Token::FunctionName(name) => name.to_uppercase(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_serialize() {
        assert_eq!(Token::Select.serialize(Dialect::Generic), "SELECT");
        assert_eq!(Token::GroupBy.serialize(Dialect::Postgres), "GROUP BY");
        assert_eq!(Token::Explain.serialize(Dialect::Generic), "EXPLAIN");
    }

    #[test]
    fn test_ident_serialize() {
        let tok = Token::Ident("users".into());
        assert_eq!(tok.serialize(Dialect::Generic), "\"users\"");
        assert_eq!(tok.serialize(Dialect::Postgres), "\"users\"");
        assert_eq!(tok.serialize(Dialect::MySql), "`users`");
    }

    #[test]
    fn test_qualified_ident() {
        let tok = Token::QualifiedIdent {
            schema: Some("public".into()),
            name: "users".into(),
        };
        assert_eq!(tok.serialize(Dialect::Postgres), "\"public\".\"users\"");
    }

    #[test]
    fn test_placeholder_serialize() {
        assert_eq!(Token::Placeholder(0).serialize(Dialect::Generic), "?1");
        assert_eq!(Token::Placeholder(2).serialize(Dialect::Generic), "?3");
        assert_eq!(Token::Placeholder(2).serialize(Dialect::Postgres), "$3");
        assert_eq!(Token::Placeholder(2).serialize(Dialect::MySql), "?");
    }

    #[test]
    fn test_token_stream() {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Ident("name".into()))
            .space()
            .push(Token::From)
            .space()
            .push(Token::Ident("users".into()));

        assert_eq!(
            ts.serialize(Dialect::Postgres),
            "SELECT \"name\" FROM \"users\""
        );
    }

    #[test]
    fn test_float_serialize() {
        assert_eq!(Token::LitFloat(3.14).serialize(Dialect::Generic), "3.14");
        assert_eq!(Token::LitFloat(1.0).serialize(Dialect::Generic), "1.0");
        assert_eq!(Token::LitFloat(-42.5).serialize(Dialect::Generic), "-42.5");
    }

    #[test]
    #[should_panic(expected = "Cannot serialize NaN")]
    fn test_float_nan_panics() {
        Token::LitFloat(f64::NAN).serialize(Dialect::Generic);
    }

    #[test]
    #[should_panic(expected = "Cannot serialize Infinity")]
    fn test_float_infinity_panics() {
        Token::LitFloat(f64::INFINITY).serialize(Dialect::Generic);
    }
}
