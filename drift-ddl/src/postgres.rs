//! PostgreSQL grammar.

use crate::diff::DdlChange;
use crate::entities::{
    Column, Entity, EnumType, ForeignKey, Identity, Index, Policy, PolicyFor, Role, Sequence,
    Table, View,
};
use crate::grammar::SqlGrammar;
use crate::store::{DdlStore, KeyFilter};

/// Renders DDL changes as PostgreSQL statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl SqlGrammar for PostgresGrammar {
    fn dialect(&self) -> &'static str {
        "postgresql"
    }

    fn render(&self, change: &DdlChange, target: &DdlStore) -> Vec<String> {
        match change {
            DdlChange::Create(entity) => self.create(entity, target),
            DdlChange::Drop(entity) => self.drop(entity),
            DdlChange::Rename { from, to } => self.rename(from, to),
            DdlChange::Alter { from, to } => self.alter(from, to),
        }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote(schema), quote(name))
}

fn quote_list(idents: &[String]) -> String {
    idents
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PostgresGrammar {
    fn create(&self, entity: &Entity, target: &DdlStore) -> Vec<String> {
        match entity {
            Entity::Schema(e) => vec![format!("CREATE SCHEMA {};", quote(&e.name))],
            Entity::Enum(e) => vec![self.create_enum(e)],
            Entity::Sequence(e) => vec![self.create_sequence(e)],
            Entity::Role(e) => vec![self.create_role(e)],
            Entity::Policy(e) => vec![self.create_policy(e)],
            Entity::Table(e) => self.create_table(e, target),
            Entity::Column(e) => vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                qualified(&e.schema, &e.table),
                column_definition(e)
            )],
            Entity::View(e) => vec![self.create_view(e)],
            Entity::Index(e) => vec![self.create_index(e)],
            Entity::Check(e) => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({});",
                qualified(&e.schema, &e.table),
                quote(&e.name),
                e.expression
            )],
            Entity::PrimaryKey(e) => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
                qualified(&e.schema, &e.table),
                quote(&e.name),
                quote_list(&e.columns)
            )],
            Entity::ForeignKey(e) => vec![self.create_fk(e)],
        }
    }

    fn drop(&self, entity: &Entity) -> Vec<String> {
        match entity {
            Entity::Schema(e) => vec![format!("DROP SCHEMA {} CASCADE;", quote(&e.name))],
            Entity::Enum(e) => {
                vec![format!("DROP TYPE {};", qualified(&e.schema, &e.name))]
            }
            Entity::Sequence(e) => {
                vec![format!("DROP SEQUENCE {};", qualified(&e.schema, &e.name))]
            }
            Entity::Role(e) => vec![format!("DROP ROLE {};", quote(&e.name))],
            Entity::Policy(e) => vec![format!(
                "DROP POLICY {} ON {};",
                quote(&e.name),
                qualified(&e.schema, &e.table)
            )],
            Entity::Table(e) => vec![format!(
                "DROP TABLE {} CASCADE;",
                qualified(&e.schema, &e.name)
            )],
            Entity::Column(e) => vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                qualified(&e.schema, &e.table),
                quote(&e.name)
            )],
            Entity::View(e) => {
                let kind = if e.materialized {
                    "MATERIALIZED VIEW"
                } else {
                    "VIEW"
                };
                vec![format!("DROP {} {};", kind, qualified(&e.schema, &e.name))]
            }
            Entity::Index(e) => {
                vec![format!("DROP INDEX {};", qualified(&e.schema, &e.name))]
            }
            Entity::Check(e) => vec![drop_constraint(&e.schema, &e.table, &e.name)],
            Entity::PrimaryKey(e) => vec![drop_constraint(&e.schema, &e.table, &e.name)],
            Entity::ForeignKey(e) => vec![drop_constraint(&e.schema, &e.table, &e.name)],
        }
    }

    fn rename(&self, from: &Entity, to: &Entity) -> Vec<String> {
        match (from, to) {
            (Entity::Schema(f), Entity::Schema(t)) => vec![format!(
                "ALTER SCHEMA {} RENAME TO {};",
                quote(&f.name),
                quote(&t.name)
            )],
            (Entity::Enum(f), Entity::Enum(t)) => vec![format!(
                "ALTER TYPE {} RENAME TO {};",
                qualified(&f.schema, &f.name),
                quote(&t.name)
            )],
            (Entity::Sequence(f), Entity::Sequence(t)) => vec![format!(
                "ALTER SEQUENCE {} RENAME TO {};",
                qualified(&f.schema, &f.name),
                quote(&t.name)
            )],
            (Entity::Role(f), Entity::Role(t)) => vec![format!(
                "ALTER ROLE {} RENAME TO {};",
                quote(&f.name),
                quote(&t.name)
            )],
            (Entity::Policy(f), Entity::Policy(t)) => vec![format!(
                "ALTER POLICY {} ON {} RENAME TO {};",
                quote(&f.name),
                qualified(&f.schema, &f.table),
                quote(&t.name)
            )],
            (Entity::Table(f), Entity::Table(t)) => {
                let mut stmts = Vec::new();
                if f.name != t.name {
                    stmts.push(format!(
                        "ALTER TABLE {} RENAME TO {};",
                        qualified(&f.schema, &f.name),
                        quote(&t.name)
                    ));
                }
                if f.schema != t.schema {
                    stmts.push(format!(
                        "ALTER TABLE {} SET SCHEMA {};",
                        qualified(&f.schema, &t.name),
                        quote(&t.schema)
                    ));
                }
                stmts
            }
            (Entity::Column(f), Entity::Column(t)) => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                qualified(&f.schema, &f.table),
                quote(&f.name),
                quote(&t.name)
            )],
            (Entity::View(f), Entity::View(t)) => {
                let kind = if f.materialized {
                    "MATERIALIZED VIEW"
                } else {
                    "VIEW"
                };
                vec![format!(
                    "ALTER {} {} RENAME TO {};",
                    kind,
                    qualified(&f.schema, &f.name),
                    quote(&t.name)
                )]
            }
            (Entity::Index(f), Entity::Index(t)) => vec![format!(
                "ALTER INDEX {} RENAME TO {};",
                qualified(&f.schema, &f.name),
                quote(&t.name)
            )],
            (Entity::Check(f), Entity::Check(t)) => {
                vec![rename_constraint(&f.schema, &f.table, &f.name, &t.name)]
            }
            (Entity::PrimaryKey(f), Entity::PrimaryKey(t)) => {
                vec![rename_constraint(&f.schema, &f.table, &f.name, &t.name)]
            }
            (Entity::ForeignKey(f), Entity::ForeignKey(t)) => {
                vec![rename_constraint(&f.schema, &f.table, &f.name, &t.name)]
            }
            _ => unreachable!("rename across entity kinds"),
        }
    }

    fn alter(&self, from: &Entity, to: &Entity) -> Vec<String> {
        match (from, to) {
            (Entity::Schema(_), Entity::Schema(_)) => Vec::new(),
            (Entity::Enum(f), Entity::Enum(t)) => self.alter_enum(f, t),
            (Entity::Sequence(_), Entity::Sequence(t)) => vec![self.alter_sequence(t)],
            (Entity::Role(_), Entity::Role(t)) => vec![self.alter_role(t)],
            (Entity::Policy(f), Entity::Policy(t)) => self.alter_policy(f, t),
            (Entity::Table(f), Entity::Table(t)) => self.alter_table(f, t),
            (Entity::Column(f), Entity::Column(t)) => self.alter_column(f, t),
            (Entity::View(_), Entity::View(t)) => {
                // A view body cannot be altered in place; recreate.
                let mut stmts = self.drop(from);
                stmts.push(self.create_view(t));
                stmts
            }
            (Entity::Index(f), Entity::Index(t)) => {
                vec![
                    format!("DROP INDEX {};", qualified(&f.schema, &f.name)),
                    self.create_index(t),
                ]
            }
            (Entity::Check(f), Entity::Check(t)) => vec![
                drop_constraint(&f.schema, &f.table, &f.name),
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({});",
                    qualified(&t.schema, &t.table),
                    quote(&t.name),
                    t.expression
                ),
            ],
            (Entity::PrimaryKey(f), Entity::PrimaryKey(t)) => vec![
                drop_constraint(&f.schema, &f.table, &f.name),
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
                    qualified(&t.schema, &t.table),
                    quote(&t.name),
                    quote_list(&t.columns)
                ),
            ],
            (Entity::ForeignKey(f), Entity::ForeignKey(t)) => vec![
                drop_constraint(&f.schema, &f.table, &f.name),
                self.create_fk(t),
            ],
            _ => unreachable!("alter across entity kinds"),
        }
    }

    fn create_enum(&self, e: &EnumType) -> String {
        let values: Vec<String> = e.values.iter().map(|v| format!("'{}'", v)).collect();
        format!(
            "CREATE TYPE {} AS ENUM ({});",
            qualified(&e.schema, &e.name),
            values.join(", ")
        )
    }

    fn alter_enum(&self, from: &EnumType, to: &EnumType) -> Vec<String> {
        let removed = from.values.iter().any(|v| !to.values.contains(v));
        if removed {
            // Postgres cannot remove enum values; recreate the type.
            return vec![
                format!("DROP TYPE {};", qualified(&from.schema, &from.name)),
                self.create_enum(to),
            ];
        }
        to.values
            .iter()
            .filter(|v| !from.values.contains(*v))
            .map(|v| {
                format!(
                    "ALTER TYPE {} ADD VALUE IF NOT EXISTS '{}';",
                    qualified(&to.schema, &to.name),
                    v
                )
            })
            .collect()
    }

    fn create_sequence(&self, e: &Sequence) -> String {
        format!(
            "CREATE SEQUENCE {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} CACHE {}{};",
            qualified(&e.schema, &e.name),
            e.increment,
            e.min_value,
            e.max_value,
            e.start_with,
            e.cache,
            if e.cycle { " CYCLE" } else { "" }
        )
    }

    fn alter_sequence(&self, e: &Sequence) -> String {
        format!(
            "ALTER SEQUENCE {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} CACHE {}{};",
            qualified(&e.schema, &e.name),
            e.increment,
            e.min_value,
            e.max_value,
            e.start_with,
            e.cache,
            if e.cycle { " CYCLE" } else { " NO CYCLE" }
        )
    }

    fn create_role(&self, e: &Role) -> String {
        format!("CREATE ROLE {}{};", quote(&e.name), role_options(e))
    }

    fn alter_role(&self, e: &Role) -> String {
        format!("ALTER ROLE {}{};", quote(&e.name), role_options(e))
    }

    fn create_policy(&self, e: &Policy) -> String {
        let mut sql = format!(
            "CREATE POLICY {} ON {} AS {} FOR {}",
            quote(&e.name),
            qualified(&e.schema, &e.table),
            if e.permissive {
                "PERMISSIVE"
            } else {
                "RESTRICTIVE"
            },
            policy_command(e.command)
        );
        if !e.roles.is_empty() {
            sql.push_str(&format!(" TO {}", quote_list(&e.roles)));
        }
        if let Some(using) = &e.using_expr {
            sql.push_str(&format!(" USING ({})", using));
        }
        if let Some(check) = &e.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", check));
        }
        sql.push(';');
        sql
    }

    fn alter_policy(&self, from: &Policy, to: &Policy) -> Vec<String> {
        // AS and FOR cannot be altered in place.
        if from.permissive != to.permissive || from.command != to.command {
            return vec![
                format!(
                    "DROP POLICY {} ON {};",
                    quote(&from.name),
                    qualified(&from.schema, &from.table)
                ),
                self.create_policy(to),
            ];
        }
        let mut sql = format!(
            "ALTER POLICY {} ON {}",
            quote(&to.name),
            qualified(&to.schema, &to.table)
        );
        if !to.roles.is_empty() {
            sql.push_str(&format!(" TO {}", quote_list(&to.roles)));
        }
        if let Some(using) = &to.using_expr {
            sql.push_str(&format!(" USING ({})", using));
        }
        if let Some(check) = &to.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", check));
        }
        sql.push(';');
        vec![sql]
    }

    fn create_table(&self, e: &Table, target: &DdlStore) -> Vec<String> {
        let filter = KeyFilter::any().schema(&e.schema).table(&e.name);
        let mut parts: Vec<String> = target
            .columns
            .list(&filter)
            .into_iter()
            .map(column_definition)
            .collect();
        for pk in target.pks.list(&filter) {
            parts.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                quote(&pk.name),
                quote_list(&pk.columns)
            ));
        }

        let mut stmts = vec![format!(
            "CREATE TABLE {} (\n    {}\n);",
            qualified(&e.schema, &e.name),
            parts.join(",\n    ")
        )];
        if e.rls_enabled {
            stmts.push(format!(
                "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
                qualified(&e.schema, &e.name)
            ));
        }
        stmts
    }

    fn alter_table(&self, from: &Table, to: &Table) -> Vec<String> {
        let mut stmts = Vec::new();
        if from.rls_enabled != to.rls_enabled {
            stmts.push(format!(
                "ALTER TABLE {} {} ROW LEVEL SECURITY;",
                qualified(&to.schema, &to.name),
                if to.rls_enabled { "ENABLE" } else { "DISABLE" }
            ));
        }
        stmts
    }

    fn alter_column(&self, from: &Column, to: &Column) -> Vec<String> {
        // A generated expression cannot change in place; replace the
        // whole column.
        if from.generated != to.generated {
            return vec![
                format!(
                    "ALTER TABLE {} DROP COLUMN {};",
                    qualified(&from.schema, &from.table),
                    quote(&from.name)
                ),
                format!(
                    "ALTER TABLE {} ADD COLUMN {};",
                    qualified(&to.schema, &to.table),
                    column_definition(to)
                ),
            ];
        }

        let table = qualified(&to.schema, &to.table);
        let column = quote(&to.name);
        let mut stmts = Vec::new();

        if from.sql_type != to.sql_type || from.dimensions != to.dimensions {
            stmts.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE {};",
                table,
                column,
                column_type(to)
            ));
        }
        if from.not_null != to.not_null {
            stmts.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                table,
                column,
                if to.not_null { "SET" } else { "DROP" }
            ));
        }
        if from.default != to.default {
            match &to.default {
                Some(default) => stmts.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    table,
                    column,
                    crate::grammar::default_to_sql(default)
                )),
                None => stmts.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    table, column
                )),
            }
        }
        if from.identity != to.identity {
            match (&from.identity, &to.identity) {
                (None, Some(identity)) => stmts.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} ADD {};",
                    table,
                    column,
                    identity_clause(identity)
                )),
                (Some(_), None) => stmts.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP IDENTITY;",
                    table, column
                )),
                (Some(_), Some(identity)) => {
                    // Changed identity options: drop and re-add.
                    stmts.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} DROP IDENTITY;",
                        table, column
                    ));
                    stmts.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} ADD {};",
                        table,
                        column,
                        identity_clause(identity)
                    ));
                }
                (None, None) => {}
            }
        }
        stmts
    }

    fn create_view(&self, e: &View) -> String {
        let kind = if e.materialized {
            "MATERIALIZED VIEW"
        } else {
            "VIEW"
        };
        match &e.definition {
            Some(definition) => format!(
                "CREATE {} {} AS ({});",
                kind,
                qualified(&e.schema, &e.name),
                definition
            ),
            None => format!("-- view {} has no stored definition", e.name),
        }
    }

    fn create_index(&self, e: &Index) -> String {
        let columns: Vec<String> = e
            .columns
            .iter()
            .map(|c| {
                let mut part = if c.is_expression {
                    format!("({})", c.value)
                } else {
                    quote(&c.value)
                };
                if let Some(opclass) = &c.opclass {
                    part.push_str(&format!(" {}", opclass));
                }
                if !c.asc {
                    part.push_str(" DESC");
                }
                if c.nulls_first {
                    part.push_str(" NULLS FIRST");
                }
                part
            })
            .collect();

        let mut sql = format!(
            "CREATE {}INDEX {} ON {} USING {} ({})",
            if e.unique { "UNIQUE " } else { "" },
            quote(&e.name),
            qualified(&e.schema, &e.table),
            e.method,
            columns.join(", ")
        );
        if let Some(where_clause) = &e.where_clause {
            sql.push_str(&format!(" WHERE {}", where_clause));
        }
        sql.push(';');
        sql
    }

    fn create_fk(&self, e: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {};",
            qualified(&e.schema, &e.table),
            quote(&e.name),
            quote_list(&e.columns),
            qualified(&e.schema_to, &e.table_to),
            quote_list(&e.columns_to),
            e.on_update.as_sql(),
            e.on_delete.as_sql()
        )
    }
}

fn drop_constraint(schema: &str, table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {};",
        qualified(schema, table),
        quote(name)
    )
}

fn rename_constraint(schema: &str, table: &str, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME CONSTRAINT {} TO {};",
        qualified(schema, table),
        quote(from),
        quote(to)
    )
}

fn role_options(e: &Role) -> String {
    let mut options = String::new();
    if e.create_db {
        options.push_str(" CREATEDB");
    }
    if e.create_role {
        options.push_str(" CREATEROLE");
    }
    if !e.inherit {
        options.push_str(" NOINHERIT");
    }
    options
}

fn policy_command(command: PolicyFor) -> &'static str {
    match command {
        PolicyFor::All => "ALL",
        PolicyFor::Select => "SELECT",
        PolicyFor::Insert => "INSERT",
        PolicyFor::Update => "UPDATE",
        PolicyFor::Delete => "DELETE",
    }
}

fn column_type(column: &Column) -> String {
    let mut sql_type = column.sql_type.clone();
    for _ in 0..column.dimensions {
        sql_type.push_str("[]");
    }
    sql_type
}

fn identity_clause(identity: &Identity) -> String {
    format!(
        "GENERATED {} AS IDENTITY (INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} CACHE {}{})",
        if identity.always {
            "ALWAYS"
        } else {
            "BY DEFAULT"
        },
        identity.increment,
        identity.min_value,
        identity.max_value,
        identity.start_with,
        identity.cache,
        if identity.cycle { " CYCLE" } else { "" }
    )
}

fn column_definition(column: &Column) -> String {
    let mut parts = vec![quote(&column.name), column_type(column)];

    if column.not_null {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!(
            "DEFAULT {}",
            crate::grammar::default_to_sql(default)
        ));
    }
    if let Some(generated) = &column.generated {
        parts.push(format!(
            "GENERATED ALWAYS AS ({}){}",
            generated.expression,
            if generated.stored { " STORED" } else { "" }
        ));
    }
    if let Some(identity) = &column.identity {
        parts.push(identity_clause(identity));
    }

    parts.join(" ")
}
