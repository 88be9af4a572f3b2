//! SQL schema for the library store.
//!
//! Tables are created in two phases. The bare phase declares columns and
//! primary keys only, so historical exports can be loaded even when their
//! references are temporarily broken. Once the data has been reconciled, every
//! table is rebuilt with its foreign keys. The phase is recorded in
//! `PRAGMA user_version`.

use library_core::{import::Table, maintenance::SchemaPhase};

/// Connection-level settings applied on every open.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

pub const VERSION_BARE: i64 = 1;
pub const VERSION_CONSTRAINED: i64 = 2;

pub fn phase_from_version(version: i64) -> SchemaPhase {
  if version >= VERSION_CONSTRAINED {
    SchemaPhase::Constrained
  } else {
    SchemaPhase::Bare
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

pub struct TableDef {
  pub table:   Table,
  /// Column names, in declaration order.
  pub columns: &'static str,
  /// Column definitions (the body of `CREATE TABLE`, without foreign keys).
  pub body:    &'static str,
}

/// All tables, parents first.
pub const TABLES: [TableDef; 6] = [
  TableDef {
    table:   Table::Branch,
    columns: "branch_id, manager_id, branch_address, contact_no",
    body:    "
    branch_id       VARCHAR(10) NOT NULL PRIMARY KEY,
    manager_id      VARCHAR(10),               -- emp_id of the manager
    branch_address  VARCHAR(55) NOT NULL,
    contact_no      VARCHAR(15) NOT NULL",
  },
  TableDef {
    table:   Table::Employees,
    columns: "emp_id, emp_name, position, salary, branch_id",
    body:    "
    emp_id     VARCHAR(10) NOT NULL PRIMARY KEY,
    emp_name   VARCHAR(25) NOT NULL,
    position   VARCHAR(15) NOT NULL,
    salary     REAL        NOT NULL,
    branch_id  VARCHAR(10) NOT NULL",
  },
  TableDef {
    table:   Table::Members,
    columns: "member_id, member_name, member_address, reg_date",
    body:    "
    member_id       VARCHAR(10) NOT NULL PRIMARY KEY,
    member_name     VARCHAR(25) NOT NULL,
    member_address  VARCHAR(75) NOT NULL,
    reg_date        TEXT        NOT NULL",
  },
  TableDef {
    table:   Table::Books,
    columns: "isbn, book_title, category, rental_price, status, author, publisher",
    body:    "
    isbn          VARCHAR(20) NOT NULL PRIMARY KEY,
    book_title    VARCHAR(75) NOT NULL,
    category      VARCHAR(25) NOT NULL,
    rental_price  REAL        NOT NULL,
    status        VARCHAR(15) NOT NULL DEFAULT 'available'
                  CHECK (status IN ('available', 'unavailable')),
    author        VARCHAR(35) NOT NULL,
    publisher     VARCHAR(55) NOT NULL",
  },
  TableDef {
    table:   Table::IssuedStatus,
    columns: "issued_id, issued_member_id, issued_book_name, issued_date, \
              issued_book_isbn, issued_emp_id",
    body:    "
    issued_id         VARCHAR(10) NOT NULL PRIMARY KEY,
    issued_member_id  VARCHAR(10) NOT NULL,
    issued_book_name  VARCHAR(75) NOT NULL,  -- title snapshot at issue time
    issued_date       TEXT        NOT NULL,  -- YYYY-MM-DD
    issued_book_isbn  VARCHAR(25) NOT NULL,
    issued_emp_id     VARCHAR(10) NOT NULL",
  },
  TableDef {
    table:   Table::ReturnStatus,
    columns: "return_id, issued_id, return_book_name, return_date, return_book_isbn",
    body:    "
    return_id         VARCHAR(10) NOT NULL PRIMARY KEY,
    issued_id         VARCHAR(10),           -- NULL only before cleanup
    return_book_name  VARCHAR(75),           -- snapshot of the issued title
    return_date       TEXT        NOT NULL,  -- YYYY-MM-DD
    return_book_isbn  VARCHAR(20)",
  },
];

// ─── References ──────────────────────────────────────────────────────────────

/// A foreign-key invariant: `child.column` must name an existing
/// `parent.parent_column`.
pub struct Reference {
  pub child:         Table,
  pub column:        &'static str,
  pub parent:        Table,
  pub parent_column: &'static str,
  /// Checked at commit rather than per statement. Set on the two halves of
  /// the branch/manager cycle so either row can be written first.
  pub deferred:      bool,
}

pub const REFERENCES: [Reference; 6] = [
  Reference {
    child:         Table::Branch,
    column:        "manager_id",
    parent:        Table::Employees,
    parent_column: "emp_id",
    deferred:      true,
  },
  Reference {
    child:         Table::Employees,
    column:        "branch_id",
    parent:        Table::Branch,
    parent_column: "branch_id",
    deferred:      true,
  },
  Reference {
    child:         Table::IssuedStatus,
    column:        "issued_member_id",
    parent:        Table::Members,
    parent_column: "member_id",
    deferred:      false,
  },
  Reference {
    child:         Table::IssuedStatus,
    column:        "issued_book_isbn",
    parent:        Table::Books,
    parent_column: "isbn",
    deferred:      false,
  },
  Reference {
    child:         Table::IssuedStatus,
    column:        "issued_emp_id",
    parent:        Table::Employees,
    parent_column: "emp_id",
    deferred:      false,
  },
  Reference {
    child:         Table::ReturnStatus,
    column:        "issued_id",
    parent:        Table::IssuedStatus,
    parent_column: "issued_id",
    deferred:      false,
  },
];

impl Reference {
  fn clause(&self) -> String {
    let deferral = if self.deferred {
      " DEFERRABLE INITIALLY DEFERRED"
    } else {
      ""
    };
    format!(
      ",\n    FOREIGN KEY ({}) REFERENCES {} ({}){deferral}",
      self.column,
      self.parent.name(),
      self.parent_column,
    )
  }

  /// `SELECT rowid` of every non-null child value with no parent row.
  pub fn dangling_sql(&self) -> String {
    format!(
      "SELECT c.rowid FROM {child} AS c
       WHERE c.{col} IS NOT NULL
         AND NOT EXISTS (SELECT 1 FROM {parent} AS p WHERE p.{pcol} = c.{col})",
      child = self.child.name(),
      col = self.column,
      parent = self.parent.name(),
      pcol = self.parent_column,
    )
  }
}

// ─── Snapshot key ────────────────────────────────────────────────────────────

/// Constraints tying a return's title/isbn snapshot to its issue.
///
/// The composite key on `return_status` resolves only when all three columns
/// equal the issue's, so a constrained store cannot hold a drifted snapshot.
/// SQLite needs a unique index on the parent columns for it.
fn snapshot_constraints(table: Table) -> &'static str {
  match table {
    Table::IssuedStatus => ",\n    UNIQUE (issued_id, issued_book_name, issued_book_isbn)",
    Table::ReturnStatus => {
      ",\n    CHECK (issued_id IS NOT NULL
           AND return_book_name IS NOT NULL
           AND return_book_isbn IS NOT NULL),
    FOREIGN KEY (issued_id, return_book_name, return_book_isbn)
      REFERENCES issued_status (issued_id, issued_book_name, issued_book_isbn)"
    }
    _ => "",
  }
}

// ─── DDL builders ────────────────────────────────────────────────────────────

impl TableDef {
  fn create_sql(&self, name: &str, constrained: bool) -> String {
    let mut extra = String::new();
    if constrained {
      for r in REFERENCES.iter().filter(|r| r.child == self.table) {
        extra.push_str(&r.clause());
      }
      extra.push_str(snapshot_constraints(self.table));
    }
    format!("CREATE TABLE {name} ({}{extra}\n);\n", self.body)
  }

  /// Replace the bare table with a constrained copy holding the same rows.
  ///
  /// SQLite has no `ALTER TABLE … ADD CONSTRAINT`, so the table is rebuilt:
  /// create, copy, drop, rename. Must run with foreign-key enforcement off
  /// and inside a transaction.
  pub fn rebuild_sql(&self) -> String {
    let name = self.table.name();
    let tmp = format!("{name}_constrained");
    format!(
      "{create}INSERT INTO {tmp} ({cols}) SELECT {cols} FROM {name};
       DROP TABLE {name};
       ALTER TABLE {tmp} RENAME TO {name};",
      create = self.create_sql(&tmp, true),
      cols = self.columns,
    )
  }
}

/// DDL creating every table without foreign keys, if missing.
pub fn bare_sql() -> String {
  TABLES
    .iter()
    .map(|def| {
      def
        .create_sql(def.table.name(), false)
        .replacen("CREATE TABLE", "CREATE TABLE IF NOT EXISTS", 1)
    })
    .collect()
}

/// DDL dropping every table, dependents first.
pub fn drop_sql() -> String {
  TABLES
    .iter()
    .rev()
    .map(|def| format!("DROP TABLE IF EXISTS {};\n", def.table.name()))
    .collect()
}

/// Run `f` with foreign-key enforcement switched off, restoring it after.
///
/// The pragma is a no-op inside a transaction, so `f` must open its own.
pub fn with_foreign_keys_off<T>(
  conn: &mut rusqlite::Connection,
  f: impl FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
  conn.pragma_update(None, "foreign_keys", false)?;
  let result = f(conn);
  let restored = conn.pragma_update(None, "foreign_keys", true);

  match (result, restored) {
    (result, Ok(())) => result,
    (Ok(_), Err(e)) => {
      tracing::warn!(error = %e, "foreign keys left off after a committed change");
      Err(e)
    }
    (Err(e), Err(restore)) => {
      tracing::warn!(error = %restore, "failed to re-enable foreign keys");
      Err(e)
    }
  }
}
