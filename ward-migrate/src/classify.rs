//! Classification of generated DDL statements by data-loss risk.
//!
//! This is not a SQL parser. It recognizes the statement shapes the migration
//! generator emits (create/drop table, add/drop/alter/rename column) with
//! identifiers that are unquoted, double-quoted or backtick-quoted.
//! Anything else is ignored.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

/// Kind of schema operation a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// `CREATE TABLE`
    CreateTable,
    /// `ALTER TABLE .. ADD COLUMN`
    AddColumn,
    /// `ALTER TABLE .. ALTER COLUMN` or `.. RENAME COLUMN`
    ModifyColumn,
    /// `ALTER TABLE .. DROP COLUMN`
    DropColumn,
    /// `DROP TABLE`
    DropTable,
}

impl ChangeKind {
    /// Whether the kind is column-level.
    pub fn is_column_level(self) -> bool {
        matches!(self, Self::AddColumn | Self::ModifyColumn | Self::DropColumn)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreateTable => "create table",
            Self::AddColumn => "add column",
            Self::ModifyColumn => "modify column",
            Self::DropColumn => "drop column",
            Self::DropTable => "drop table",
        };
        f.write_str(s)
    }
}

/// One classified schema operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationChange {
    /// What the statement does.
    pub kind: ChangeKind,
    /// Affected table, quotes stripped.
    pub table: String,
    /// Affected column for column-level kinds, quotes stripped.
    pub column: Option<String>,
    /// Whether applying the statement can lose existing data.
    pub destructive: bool,
    /// The statement the change was read from.
    pub raw_statement: String,
}

impl MigrationChange {
    /// `table` or `table.column`.
    pub fn target(&self) -> String {
        match &self.column {
            Some(column) => format!("{}.{}", self.table, column),
            None => self.table.clone(),
        }
    }
}

impl fmt::Display for MigrationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.target())
    }
}

/// Turns a single statement into a change record.
pub trait StatementClassifier {
    /// Classify one statement, or `None` if its shape is not recognized.
    fn classify(&self, statement: &str) -> Option<MigrationChange>;

    /// Classify every non-empty statement, skipping unrecognized ones.
    fn classify_all<I, S>(&self, statements: I) -> Vec<MigrationChange>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        Self: Sized,
    {
        statements
            .into_iter()
            .filter_map(|statement| {
                let statement = statement.as_ref().trim();
                if statement.is_empty() {
                    None
                } else {
                    self.classify(statement)
                }
            })
            .collect()
    }
}

const IDENT: &str = r#"("[^"]+"|`[^`]+`|[\w$]+)"#;

fn pattern(template: &str) -> Regex {
    Regex::new(&format!("(?is)^\\s*{}", template.replace("IDENT", IDENT))).unwrap()
}

// Order matters: the first matching pattern wins.
static PATTERNS: LazyLock<[(ChangeKind, Regex); 5]> = LazyLock::new(|| {
    [
        (
            ChangeKind::CreateTable,
            pattern(r"CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?IDENT"),
        ),
        (
            ChangeKind::DropTable,
            pattern(r"DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?IDENT"),
        ),
        (
            ChangeKind::AddColumn,
            pattern(r"ALTER\s+TABLE\s+IDENT\s+ADD\s+COLUMN\s+(?:IF\s+NOT\s+EXISTS\s+)?IDENT"),
        ),
        (
            ChangeKind::DropColumn,
            pattern(r"ALTER\s+TABLE\s+IDENT\s+DROP\s+COLUMN\s+(?:IF\s+EXISTS\s+)?IDENT"),
        ),
        (
            ChangeKind::ModifyColumn,
            pattern(r"ALTER\s+TABLE\s+IDENT\s+(?:ALTER|RENAME)\s+COLUMN\s+IDENT"),
        ),
    ]
});

static NARROWING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)DROP\s+NOT\s+NULL|SET\s+NOT\s+NULL|SET\s+DATA\s+TYPE|RENAME\s+COLUMN").unwrap()
});

/// Regex-based classifier for generator output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl PatternClassifier {
    /// Create a new classifier.
    pub fn new() -> Self {
        Self
    }
}

impl StatementClassifier for PatternClassifier {
    fn classify(&self, statement: &str) -> Option<MigrationChange> {
        let (kind, caps) = PATTERNS
            .iter()
            .find_map(|(kind, re)| re.captures(statement).map(|caps| (*kind, caps)))?;

        let table = ident(&caps, 1)?;
        let column = if kind.is_column_level() {
            Some(ident(&caps, 2)?)
        } else {
            None
        };

        let destructive = match kind {
            ChangeKind::CreateTable | ChangeKind::AddColumn => false,
            ChangeKind::DropTable | ChangeKind::DropColumn => true,
            ChangeKind::ModifyColumn => NARROWING.is_match(statement),
        };

        Some(MigrationChange {
            kind,
            table,
            column,
            destructive,
            raw_statement: statement.trim().to_string(),
        })
    }
}

/// Classify statements with the default [`PatternClassifier`].
pub fn classify<I, S>(statements: I) -> Vec<MigrationChange>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    PatternClassifier::new().classify_all(statements)
}

fn ident(caps: &Captures<'_>, group: usize) -> Option<String> {
    caps.get(group).map(|m| unquote(m.as_str()).to_string())
}

fn unquote(ident: &str) -> &str {
    ident
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| ident.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(ident)
}
