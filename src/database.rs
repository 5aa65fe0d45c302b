use crate::{
    ColumnDef,
    ast::Statement,
    config::EngineConfig,
    error::{DbError, Result},
    executor::{ExecResult, Executor, QueryResult, execute_select},
    parser::Parser,
    persistence::Persistence,
    storage::StorageEngine,
    tokenizer::Tokenizer,
};

/// The main entry point: SQL text in, results out.
///
/// Every command is tokenized, parsed and executed to completion before the
/// call returns. A `Database` is single-writer; callers sharing one across
/// threads must serialize access themselves.
#[derive(Default)]
pub struct Database {
    engine: StorageEngine,
}

impl Database {
    /// Creates a new, empty in-memory database.
    pub fn new() -> Self {
        Self {
            engine: StorageEngine::new(),
        }
    }

    /// Opens the database described by `config`, loading any stored tables.
    /// Without a data file this is the same as [Database::new].
    pub fn open(config: &EngineConfig) -> Result<Self> {
        match config.persistence()? {
            Some(persistence) => Self::with_persistence(persistence),
            None => Ok(Self::new()),
        }
    }

    pub fn with_persistence(persistence: Box<dyn Persistence>) -> Result<Self> {
        Ok(Self {
            engine: StorageEngine::open(persistence)?,
        })
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Table names in alphabetical order.
    pub fn list_tables(&self) -> Vec<&str> {
        self.engine.list_tables()
    }

    pub fn describe(&self, table: &str) -> Result<&[ColumnDef]> {
        self.engine.describe(table)
    }

    /// Executes a single command of any kind.
    ///
    /// A trailing `;` is allowed; a second command after it is a parse error.
    ///
    /// # Errors
    /// Any [DbError]. The command has no effect when an error is returned,
    /// except for [DbError::Persistence], where the in-memory change is kept.
    ///
    /// # Example
    /// ```
    /// use minisql::{Database, ExecResult, Value};
    /// let mut db = Database::new();
    /// db.execute("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(20))").unwrap();
    /// db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap();
    /// let deleted = db.execute("DELETE FROM users WHERE id > 12").unwrap();
    /// assert_eq!(deleted, ExecResult::Affected { affected: 0 });
    ///
    /// let result = db.query("SELECT * FROM users").unwrap();
    /// assert_eq!(result.rows[0][0], Value::Int(1));
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        let tokens = Tokenizer::new(sql).tokenize()?;
        let statement = Parser::new(tokens).parse()?;
        Executor::new(&mut self.engine).execute(statement)
    }

    /// Executes `;`-separated commands in order and returns one result per
    /// command. Stops at the first failing command; the commands before it
    /// stay applied.
    ///
    /// ```
    /// use minisql::{Database, Value};
    /// let mut db = Database::new();
    /// let results = db
    ///     .execute_batch("CREATE TABLE t (id INT); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);")
    ///     .unwrap();
    /// assert_eq!(results.len(), 3);
    /// assert_eq!(db.query("SELECT COUNT(*) FROM t").unwrap().rows[0][0], Value::Int(2));
    /// ```
    pub fn execute_batch(&mut self, sql: &str) -> Result<Vec<ExecResult>> {
        let statements = Tokenizer::new(sql).statements()?;
        let mut results = Vec::with_capacity(statements.len());
        for tokens in statements {
            let statement = Parser::new(tokens).parse()?;
            results.push(Executor::new(&mut self.engine).execute(statement)?);
        }
        Ok(results)
    }

    /// Runs a `SELECT` without mutable access.
    ///
    /// # Example
    ///
    /// ```
    /// use minisql::{Database, Value};
    ///
    /// let mut db = Database::new();
    /// db.execute("CREATE TABLE products (name VARCHAR(20), price INT)").unwrap();
    /// db.execute("INSERT INTO products VALUES ('Laptop', 1200)").unwrap();
    /// db.execute("INSERT INTO products VALUES ('Mouse', 25)").unwrap();
    ///
    /// let result = db.query("SELECT name FROM products ORDER BY price ASC").unwrap();
    ///
    /// assert_eq!(result.columns, vec!["name"]);
    /// assert_eq!(result.rows[0][0], Value::from("Mouse"));
    /// assert_eq!(result.rows[1][0], Value::from("Laptop"));
    /// ```
    ///
    /// # Errors
    /// [DbError::InvalidQuery] if `sql` is not a `SELECT`, otherwise any error
    /// the `SELECT` itself raises.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let tokens = Tokenizer::new(sql).tokenize()?;
        match Parser::new(tokens).parse()? {
            Statement::Select(select) => execute_select(&self.engine, &select),
            other => Err(DbError::InvalidQuery(format!(
                "{} is not a query",
                other.name()
            ))),
        }
    }
}
