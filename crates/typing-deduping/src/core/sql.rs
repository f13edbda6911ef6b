//! Executable SQL units handed to the destination.

/// A list of transactions, each a list of statements.
///
/// The engine never inspects statements; it only builds, concatenates and
/// forwards them to [`DestinationHandler::execute`](super::DestinationHandler::execute).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sql {
    pub transactions: Vec<Vec<String>>,
}

impl Sql {
    /// A single statement in its own transaction.
    pub fn of(statement: impl Into<String>) -> Self {
        Self {
            transactions: vec![vec![statement.into()]],
        }
    }

    /// Several statements run in one transaction.
    pub fn transactionally(statements: Vec<String>) -> Self {
        Self {
            transactions: vec![statements],
        }
    }

    /// Join several units into one, preserving order.
    pub fn concat(parts: impl IntoIterator<Item = Sql>) -> Self {
        Self {
            transactions: parts
                .into_iter()
                .flat_map(|sql| sql.transactions)
                .filter(|tx| !tx.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.iter().all(Vec::is_empty)
    }

    /// All statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().flatten().map(String::as_str)
    }
}
