//! DDL entity records.
//!
//! Every DDL object the diff engine knows about is a plain serde record.
//! Entities reference each other by *name* (string tuples), never by
//! pointer, so two independently built snapshots can be compared by value
//! and a rename is an ordinary field mutation.

use serde::{Deserialize, Serialize};

/// The kind tag of a DDL entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Schema,
    Enum,
    Sequence,
    Role,
    Policy,
    Table,
    Column,
    View,
    Index,
    Check,
    PrimaryKey,
    ForeignKey,
}

/// Fixed dependency order for diff processing and statement emission.
///
/// Structural containers come before the things they contain; entities
/// nothing else references by name come first. Drops are emitted in the
/// reverse of this order.
pub const KIND_ORDER: [EntityKind; 12] = [
    EntityKind::Schema,
    EntityKind::Enum,
    EntityKind::Sequence,
    EntityKind::Role,
    EntityKind::Policy,
    EntityKind::Table,
    EntityKind::Column,
    EntityKind::View,
    EntityKind::Index,
    EntityKind::Check,
    EntityKind::PrimaryKey,
    EntityKind::ForeignKey,
];

impl EntityKind {
    /// Human-readable label (used in errors and resolver prompts).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Enum => "enum",
            Self::Sequence => "sequence",
            Self::Role => "role",
            Self::Policy => "policy",
            Self::Table => "table",
            Self::Column => "column",
            Self::View => "view",
            Self::Index => "index",
            Self::Check => "check constraint",
            Self::PrimaryKey => "primary key",
            Self::ForeignKey => "foreign key",
        }
    }

    /// Position of this kind in [`KIND_ORDER`].
    pub fn order(&self) -> usize {
        KIND_ORDER
            .iter()
            .position(|k| k == self)
            .unwrap_or_else(|| unreachable!("kind missing from KIND_ORDER"))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Composite natural key of an entity.
///
/// All kinds fit the `(schema?, table?, name)` shape: schema-level kinds
/// leave `schema`/`table` empty, table-scoped kinds fill all three.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub name: String,
}

impl EntityKey {
    /// Key for a top-level entity (schema, role).
    pub fn name(name: &str) -> Self {
        Self {
            schema: None,
            table: None,
            name: name.to_string(),
        }
    }

    /// Key for a schema-scoped entity (enum, sequence, table, view).
    pub fn scoped(schema: &str, name: &str) -> Self {
        Self {
            schema: Some(schema.to_string()),
            table: None,
            name: name.to_string(),
        }
    }

    /// Key for a table-scoped entity (column, index, fk, pk, check, policy).
    pub fn table_scoped(schema: &str, table: &str, name: &str) -> Self {
        Self {
            schema: Some(schema.to_string()),
            table: Some(table.to_string()),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.schema, &self.table) {
            (Some(s), Some(t)) => write!(f, "{}.{}.{}", s, t, self.name),
            (Some(s), None) => write!(f, "{}.{}", s, self.name),
            _ => f.write_str(&self.name),
        }
    }
}

/// A database schema (namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub name: String,
}

/// A user-defined enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    pub schema: String,
    pub name: String,
    pub values: Vec<String>,
}

/// A standalone sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub schema: String,
    pub name: String,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub start_with: i64,
    pub cache: i64,
    pub cycle: bool,
}

/// A database role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub create_db: bool,
    pub create_role: bool,
    pub inherit: bool,
}

/// Command a row-level security policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyFor {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

/// A row-level security policy. `table`/`schema` link it to its table by
/// name; an unlinked policy is dropped with a warning during interim
/// conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub permissive: bool,
    pub command: PolicyFor,
    pub roles: Vec<String>,
    pub using_expr: Option<String>,
    pub with_check: Option<String>,
}

/// A table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub rls_enabled: bool,
}

/// A generated (computed) column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated {
    pub expression: String,
    pub stored: bool,
}

/// Identity configuration attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub always: bool,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub start_with: i64,
    pub cache: i64,
    pub cycle: bool,
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// SQL type name, without array brackets.
    pub sql_type: String,
    /// Array dimension count; 0 for scalar columns.
    pub dimensions: u8,
    pub not_null: bool,
    pub default: Option<String>,
    pub generated: Option<Generated>,
    pub identity: Option<Identity>,
}

/// A view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub schema: String,
    pub name: String,
    /// SELECT body; `None` for views introspected without a definition.
    pub definition: Option<String>,
    pub materialized: bool,
}

/// One indexed column or expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    /// Column name, or the raw expression when `is_expression` is set.
    pub value: String,
    pub is_expression: bool,
    pub asc: bool,
    pub nulls_first: bool,
    pub opclass: Option<String>,
}

impl IndexColumn {
    /// Plain ascending column reference.
    pub fn column(name: &str) -> Self {
        Self {
            value: name.to_string(),
            is_expression: false,
            asc: true,
            nulls_first: false,
            opclass: None,
        }
    }
}

/// An index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub method: String,
    pub where_clause: Option<String>,
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub expression: String,
}

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
}

/// Referential action for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    /// SQL spelling of the action.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A foreign key constraint. The referenced side is named, not linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub schema_to: String,
    pub table_to: String,
    pub columns_to: Vec<String>,
    pub on_update: FkAction,
    pub on_delete: FkAction,
}

/// A typed DDL entity with a composite natural key.
pub trait DdlEntity: Clone + PartialEq + std::fmt::Debug {
    /// The kind tag for this entity type.
    const KIND: EntityKind;

    /// Composite natural key. Two entities of the same kind with equal
    /// keys denote the same DDL object.
    fn key(&self) -> EntityKey;

    /// Shape validation: required fields present, value sets respected.
    /// A failure here is a programming-invariant violation, not a user
    /// schema mistake.
    fn validate(&self) -> Result<(), String>;

    /// Wrap into the kind-erased [`Entity`] enum.
    fn into_entity(self) -> Entity;

    /// Recover the typed entity from the kind-erased enum; `None` when
    /// the kinds do not match.
    fn from_entity(entity: Entity) -> Option<Self>
    where
        Self: Sized;

    /// Rewrite this entity's own key fields to a new key. Used by the
    /// diff engine when a rename is confirmed; reference fields in other
    /// entities are cascaded separately.
    fn rename_to(&mut self, key: &EntityKey);
}

fn required(field: &'static str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("missing required field '{}'", field))
    } else {
        Ok(())
    }
}

impl DdlEntity for Schema {
    const KIND: EntityKind = EntityKind::Schema;

    fn key(&self) -> EntityKey {
        EntityKey::name(&self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("name", &self.name)
    }

    fn into_entity(self) -> Entity {
        Entity::Schema(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Schema(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        self.name = key.name.clone();
    }
}

impl DdlEntity for EnumType {
    const KIND: EntityKind = EntityKind::Enum;

    fn key(&self) -> EntityKey {
        EntityKey::scoped(&self.schema, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("name", &self.name)?;
        if self.values.is_empty() {
            return Err(format!("enum '{}' has no values", self.name));
        }
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::Enum(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Enum(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for Sequence {
    const KIND: EntityKind = EntityKind::Sequence;

    fn key(&self) -> EntityKey {
        EntityKey::scoped(&self.schema, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("name", &self.name)?;
        if self.increment == 0 {
            return Err(format!("sequence '{}' has zero increment", self.name));
        }
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::Sequence(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Sequence(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn key(&self) -> EntityKey {
        EntityKey::name(&self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("name", &self.name)
    }

    fn into_entity(self) -> Entity {
        Entity::Role(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Role(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        self.name = key.name.clone();
    }
}

impl DdlEntity for Policy {
    const KIND: EntityKind = EntityKind::Policy;

    fn key(&self) -> EntityKey {
        EntityKey::table_scoped(&self.schema, &self.table, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("table", &self.table)?;
        required("name", &self.name)
    }

    fn into_entity(self) -> Entity {
        Entity::Policy(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Policy(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        if let Some(table) = &key.table {
            self.table = table.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for Table {
    const KIND: EntityKind = EntityKind::Table;

    fn key(&self) -> EntityKey {
        EntityKey::scoped(&self.schema, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("name", &self.name)
    }

    fn into_entity(self) -> Entity {
        Entity::Table(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Table(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for Column {
    const KIND: EntityKind = EntityKind::Column;

    fn key(&self) -> EntityKey {
        EntityKey::table_scoped(&self.schema, &self.table, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("table", &self.table)?;
        required("name", &self.name)?;
        required("sqlType", &self.sql_type)?;
        if self.generated.is_some() && self.identity.is_some() {
            return Err(format!(
                "column '{}' is both generated and an identity",
                self.name
            ));
        }
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::Column(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Column(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        if let Some(table) = &key.table {
            self.table = table.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for View {
    const KIND: EntityKind = EntityKind::View;

    fn key(&self) -> EntityKey {
        EntityKey::scoped(&self.schema, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("name", &self.name)
    }

    fn into_entity(self) -> Entity {
        Entity::View(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::View(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for Index {
    const KIND: EntityKind = EntityKind::Index;

    fn key(&self) -> EntityKey {
        EntityKey::table_scoped(&self.schema, &self.table, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("table", &self.table)?;
        required("name", &self.name)?;
        if self.columns.is_empty() {
            return Err(format!("index '{}' has no columns", self.name));
        }
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::Index(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Index(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        if let Some(table) = &key.table {
            self.table = table.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for Check {
    const KIND: EntityKind = EntityKind::Check;

    fn key(&self) -> EntityKey {
        EntityKey::table_scoped(&self.schema, &self.table, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("table", &self.table)?;
        required("name", &self.name)?;
        required("expression", &self.expression)
    }

    fn into_entity(self) -> Entity {
        Entity::Check(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Check(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        if let Some(table) = &key.table {
            self.table = table.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for PrimaryKey {
    const KIND: EntityKind = EntityKind::PrimaryKey;

    fn key(&self) -> EntityKey {
        EntityKey::table_scoped(&self.schema, &self.table, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("table", &self.table)?;
        required("name", &self.name)?;
        if self.columns.is_empty() {
            return Err(format!("primary key '{}' has no columns", self.name));
        }
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::PrimaryKey(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::PrimaryKey(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        if let Some(table) = &key.table {
            self.table = table.clone();
        }
        self.name = key.name.clone();
    }
}

impl DdlEntity for ForeignKey {
    const KIND: EntityKind = EntityKind::ForeignKey;

    fn key(&self) -> EntityKey {
        EntityKey::table_scoped(&self.schema, &self.table, &self.name)
    }

    fn validate(&self) -> Result<(), String> {
        required("schema", &self.schema)?;
        required("table", &self.table)?;
        required("name", &self.name)?;
        required("tableTo", &self.table_to)?;
        if self.columns.is_empty() || self.columns.len() != self.columns_to.len() {
            return Err(format!(
                "foreign key '{}' column lists are empty or mismatched",
                self.name
            ));
        }
        Ok(())
    }

    fn into_entity(self) -> Entity {
        Entity::ForeignKey(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::ForeignKey(e) => Some(e),
            _ => None,
        }
    }

    fn rename_to(&mut self, key: &EntityKey) {
        if let Some(schema) = &key.schema {
            self.schema = schema.clone();
        }
        if let Some(table) = &key.table {
            self.table = table.clone();
        }
        self.name = key.name.clone();
    }
}

/// Kind-erased entity, used for bulk snapshot serialization and bulk
/// validation. The snapshot `ddl` array is a list of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "camelCase")]
pub enum Entity {
    Schema(Schema),
    Enum(EnumType),
    Sequence(Sequence),
    Role(Role),
    Policy(Policy),
    Table(Table),
    Column(Column),
    View(View),
    Index(Index),
    Check(Check),
    PrimaryKey(PrimaryKey),
    ForeignKey(ForeignKey),
}

impl Entity {
    /// The kind tag of the wrapped entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Schema(_) => EntityKind::Schema,
            Self::Enum(_) => EntityKind::Enum,
            Self::Sequence(_) => EntityKind::Sequence,
            Self::Role(_) => EntityKind::Role,
            Self::Policy(_) => EntityKind::Policy,
            Self::Table(_) => EntityKind::Table,
            Self::Column(_) => EntityKind::Column,
            Self::View(_) => EntityKind::View,
            Self::Index(_) => EntityKind::Index,
            Self::Check(_) => EntityKind::Check,
            Self::PrimaryKey(_) => EntityKind::PrimaryKey,
            Self::ForeignKey(_) => EntityKind::ForeignKey,
        }
    }

    /// Composite natural key of the wrapped entity.
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Schema(e) => e.key(),
            Self::Enum(e) => e.key(),
            Self::Sequence(e) => e.key(),
            Self::Role(e) => e.key(),
            Self::Policy(e) => e.key(),
            Self::Table(e) => e.key(),
            Self::Column(e) => e.key(),
            Self::View(e) => e.key(),
            Self::Index(e) => e.key(),
            Self::Check(e) => e.key(),
            Self::PrimaryKey(e) => e.key(),
            Self::ForeignKey(e) => e.key(),
        }
    }

    /// Shape validation over the wrapped entity.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Schema(e) => e.validate(),
            Self::Enum(e) => e.validate(),
            Self::Sequence(e) => e.validate(),
            Self::Role(e) => e.validate(),
            Self::Policy(e) => e.validate(),
            Self::Table(e) => e.validate(),
            Self::Column(e) => e.validate(),
            Self::View(e) => e.validate(),
            Self::Index(e) => e.validate(),
            Self::Check(e) => e.validate(),
            Self::PrimaryKey(e) => e.validate(),
            Self::ForeignKey(e) => e.validate(),
        }
    }
}
