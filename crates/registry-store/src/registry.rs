//! The entity registry: `types` and `users` tables and their field rules.
//!
//! Every user belongs to one of three entity types, and each type requires
//! its own set of profile fields on top of the common ones:
//!
//! | type | name               | additional fields                               |
//! |------|--------------------|-------------------------------------------------|
//! | 1    | ИП                 | ogrn, snils, surname, name, middle_name         |
//! | 2    | Юридическое лицо   | kpp, ogrn, org_full_name                        |
//! | 3    | Физическое лицо    | snils, surname, name, middle_name               |
//!
//! The fields supplied to [`Registry::add_user`] must be exactly the common
//! fields plus the type's additional fields. An optional column can be
//! given an explicit null, which still counts as supplied.

use rusqlite::types::Value;
use tracing::{debug, info, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult, ValidationError};
use crate::password;
use crate::table::{ColumnDef, query_rows, quote_ident, table_info};
use crate::value::{json_to_value, value_to_json};

/// Fields every user record must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["login", "password", "type", "inn", "address"];

/// Columns excluded from [`Registry::get_user_attr`].
const MAIN_FIELDS: [&str; 4] = ["id", "login", "password", "type"];

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Legal-entity type of a registered user, keyed by `types.id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// Individual entrepreneur ("ИП").
    IndividualEntrepreneur,
    /// Legal entity ("Юридическое лицо").
    LegalEntity,
    /// Natural person ("Физическое лицо").
    NaturalPerson,
}

impl EntityType {
    /// All types in `types.id` order.
    pub const ALL: [EntityType; 3] = [
        Self::IndividualEntrepreneur,
        Self::LegalEntity,
        Self::NaturalPerson,
    ];

    /// The `types.id` of this type.
    pub fn code(&self) -> i64 {
        match self {
            Self::IndividualEntrepreneur => 1,
            Self::LegalEntity => 2,
            Self::NaturalPerson => 3,
        }
    }

    /// The display name stored in `types.name`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::IndividualEntrepreneur => "ИП",
            Self::LegalEntity => "Юридическое лицо",
            Self::NaturalPerson => "Физическое лицо",
        }
    }

    /// Fields this type requires beyond [`REQUIRED_FIELDS`].
    pub fn additional_fields(&self) -> &'static [&'static str] {
        match self {
            Self::IndividualEntrepreneur => &["ogrn", "snils", "surname", "name", "middle_name"],
            Self::LegalEntity => &["kpp", "ogrn", "org_full_name"],
            Self::NaturalPerson => &["snils", "surname", "name", "middle_name"],
        }
    }

    /// Field rules for a `type` code: 1 and 2 select the entrepreneur and
    /// legal-entity rules, any other code is treated as a natural person.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::IndividualEntrepreneur,
            2 => Self::LegalEntity,
            _ => Self::NaturalPerson,
        }
    }

    /// Resolve a stored or supplied `type` value.
    ///
    /// Values that are not a whole number fall back to natural person.
    pub fn from_type_value(value: &Value) -> Self {
        type_code(value).map_or(Self::NaturalPerson, Self::from_code)
    }
}

/// The integer code carried by a `type` value.
///
/// Whole-number reals such as `1.0` count as their integer; text, null,
/// blobs and fractional reals have no code.
pub fn type_code(value: &Value) -> Option<i64> {
    match *value {
        Value::Integer(code) => Some(code),
        Value::Real(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A user record as an ordered list of `(field, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserData {
    fields: Vec<(String, Value)>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field`, replacing any earlier value for it.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set `field`, replacing any earlier value for it.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Build from a JSON object such as `{"login": "ivan", "type": 3, ...}`.
    pub fn from_json(json: &serde_json::Value) -> StoreResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            StoreError::InvalidArgument("user data must be a JSON object".into())
        })?;
        let mut data = Self::new();
        for (field, value) in object {
            data.set(field.as_str(), json_to_value(field, value)?);
        }
        Ok(data)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

/// Check `data` against the field contract and return its entity type.
///
/// The common fields are checked first, and `type` must hold a whole number.
/// Then the supplied fields must equal the common fields plus the type's
/// additional fields; an unexpected field is reported before a missing one.
pub fn validate(data: &UserData) -> Result<EntityType, ValidationError> {
    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !data.contains(f)) {
        return Err(ValidationError::MissingField(missing.to_string()));
    }

    let entity = match data.get("type") {
        Some(value) => type_code(value)
            .map(EntityType::from_code)
            .ok_or_else(|| ValidationError::InvalidType(format!("{value:?}")))?,
        None => return Err(ValidationError::MissingField("type".into())),
    };
    let additional = entity.additional_fields();

    let allowed = |field: &str| REQUIRED_FIELDS.contains(&field) || additional.contains(&field);
    if let Some((extra, _)) = data.fields().iter().find(|(f, _)| !allowed(f)) {
        return Err(ValidationError::DisallowedField(extra.clone()));
    }
    if let Some(missing) = additional.iter().find(|f| !data.contains(f)) {
        return Err(ValidationError::MissingField(missing.to_string()));
    }

    Ok(entity)
}

/// Behavior switches for a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Store PBKDF2 hashes instead of plaintext passwords.
    pub hash_passwords: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            hash_passwords: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Schema
// ═══════════════════════════════════════════════════════════════════════

/// The registry's tables, in creation order.
pub fn registry_tables() -> Vec<(&'static str, Vec<ColumnDef>)> {
    vec![
        (
            "types",
            vec![
                ColumnDef::new("id", &["INTEGER", "PRIMARY KEY", "AUTOINCREMENT"]),
                ColumnDef::new("name", &["VARCHAR"]),
            ],
        ),
        (
            "users",
            vec![
                ColumnDef::new("id", &["INTEGER", "PRIMARY KEY", "AUTOINCREMENT"]),
                ColumnDef::new("login", &["VARCHAR", "NOT NULL"]),
                ColumnDef::new("password", &["VARCHAR", "NOT NULL"]),
                ColumnDef::new("type", &["INTEGER", "NOT NULL"]),
                ColumnDef::new("inn", &["INTEGER", "NOT NULL"]),
                ColumnDef::new("kpp", &["INTEGER"]),
                ColumnDef::new("ogrn", &["INTEGER"]),
                ColumnDef::new("snils", &["INTEGER"]),
                ColumnDef::new("org_full_name", &["TEXT"]),
                ColumnDef::new("surname", &["VARCHAR"]),
                ColumnDef::new("name", &["VARCHAR"]),
                ColumnDef::new("middle_name", &["VARCHAR"]),
                ColumnDef::new("address", &["TEXT", "NOT NULL"]),
            ],
        ),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════════════

/// Schema creation, validated inserts and derived lookups over the registry tables.
#[derive(Clone)]
pub struct Registry {
    db: Database,
    options: RegistryOptions,
}

impl Registry {
    /// Create a registry backed by `db` with default options.
    pub fn new(db: Database) -> Self {
        Self::with_options(db, RegistryOptions::default())
    }

    pub fn with_options(db: Database, options: RegistryOptions) -> Self {
        Self { db, options }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create the `types` and `users` tables and seed the entity types.
    ///
    /// Runs once per database file; a second call fails because the tables
    /// already exist.
    #[instrument(skip(self))]
    pub async fn generate_db(&self) -> StoreResult<()> {
        for (name, columns) in registry_tables() {
            self.db.create_table(name, &columns).await?;
        }

        let types: Vec<Vec<(String, Value)>> = EntityType::ALL
            .iter()
            .map(|t| {
                vec![
                    ("id".to_string(), Value::Integer(t.code())),
                    ("name".to_string(), Value::Text(t.display_name().into())),
                ]
            })
            .collect();
        self.db.insert_many_rows("types", &types).await?;

        info!("registry schema generated");
        Ok(())
    }

    /// Validate `data` and insert it into `users`, returning the new user's id.
    ///
    /// A record that breaks the field contract fails with
    /// [`StoreError::Validation`] and nothing is written. The `type` value
    /// is stored as the integer it was validated as.
    #[instrument(skip(self, data))]
    pub async fn add_user(&self, data: UserData) -> StoreResult<i64> {
        let entity = validate(&data)?;

        let mut fields = data.into_fields();
        for (field, value) in fields.iter_mut() {
            match field.as_str() {
                "type" => {
                    if let Some(code) = type_code(value) {
                        *value = Value::Integer(code);
                    }
                }
                "password" if self.options.hash_passwords => {
                    *value = Value::Text(hash_value(value).await?);
                }
                _ => {}
            }
        }

        let id = self.db.insert_row("users", &fields).await?;
        debug!(user_id = id, entity = %entity, "user added");
        Ok(id)
    }

    /// The user's full name: `org_full_name` for a legal entity, otherwise
    /// surname, name and middle name joined by spaces (null parts skipped).
    #[instrument(skip(self))]
    pub async fn get_fullname(&self, login: &str) -> StoreResult<String> {
        let login = login.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT type, org_full_name, surname, name, middle_name \
                     FROM users WHERE login = ?1 ORDER BY id LIMIT 1",
                    rusqlite::params![login],
                    |row| {
                        Ok(NameRow {
                            entity: row.get(0)?,
                            org_full_name: row.get(1)?,
                            surname: row.get(2)?,
                            name: row.get(3)?,
                            middle_name: row.get(4)?,
                        })
                    },
                );
                match result {
                    Ok(row) => Ok(row.into_fullname()),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound {
                        entity: "user",
                        id: login,
                    }),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// The user's profile attributes as a JSON object string.
    ///
    /// Includes every `users` column except `id`, `login`, `password` and
    /// `type`, omitting columns whose value is null.
    pub async fn get_user_attr(&self, login: &str) -> StoreResult<String> {
        let attrs = self.get_user_attr_map(login).await?;
        Ok(serde_json::to_string(&attrs)?)
    }

    /// Same as [`Registry::get_user_attr`], as a JSON map.
    #[instrument(skip(self))]
    pub async fn get_user_attr_map(
        &self,
        login: &str,
    ) -> StoreResult<serde_json::Map<String, serde_json::Value>> {
        let login = login.to_string();
        self.db
            .execute(move |conn| {
                let fields: Vec<String> = table_info(conn, &quote_ident("users")?)?
                    .into_iter()
                    .map(|c| c.name)
                    .filter(|name| !MAIN_FIELDS.contains(&name.as_str()))
                    .collect();
                let columns = fields
                    .iter()
                    .map(|f| quote_ident(f))
                    .collect::<StoreResult<Vec<_>>>()?;

                let sql = format!(
                    "SELECT {} FROM users WHERE login = ?1 ORDER BY id LIMIT 1",
                    columns.join(", ")
                );
                let row = query_rows(conn, &sql, &[Value::Text(login.clone())])?
                    .into_iter()
                    .next()
                    .ok_or(StoreError::NotFound {
                        entity: "user",
                        id: login,
                    })?;

                Ok(fields
                    .into_iter()
                    .zip(row)
                    .filter(|(_, value)| *value != Value::Null)
                    .map(|(field, value)| (field, value_to_json(&value)))
                    .collect())
            })
            .await
    }

    /// The display name of the user's entity type.
    #[instrument(skip(self))]
    pub async fn get_user_type(&self, login: &str) -> StoreResult<String> {
        let login = login.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT types.name FROM users JOIN types ON users.type = types.id \
                     WHERE users.id = \
                     (SELECT id FROM users WHERE login = ?1 ORDER BY id LIMIT 1)",
                    rusqlite::params![login],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(name) => Ok(name),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound {
                        entity: "user",
                        id: login,
                    }),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Check `password` against the stored password of `login`.
    ///
    /// Returns `false` for an unknown login.
    #[instrument(skip(self, password))]
    pub async fn verify_password(&self, login: &str, password: &str) -> StoreResult<bool> {
        let login = login.to_string();
        let candidate = password.to_string();
        let hashed = self.options.hash_passwords;

        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT CAST(password AS TEXT) FROM users \
                     WHERE login = ?1 ORDER BY id LIMIT 1",
                    rusqlite::params![login],
                    |row| row.get::<_, String>(0),
                );
                let stored = match result {
                    Ok(stored) => stored,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
                    Err(e) => return Err(StoreError::Sqlite(e)),
                };

                if hashed {
                    password::verify_password(&candidate, &stored)
                } else {
                    Ok(password::verify_plaintext(&candidate, &stored))
                }
            })
            .await
    }
}

/// Hash a supplied password value on the blocking pool.
async fn hash_value(value: &Value) -> StoreResult<String> {
    let plain = match value {
        Value::Text(s) => s.clone(),
        _ => {
            return Err(StoreError::InvalidArgument(
                "password must be a string".into(),
            ));
        }
    };
    tokio::task::spawn_blocking(move || password::hash_password(&plain)).await?
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

struct NameRow {
    entity: Value,
    org_full_name: Option<String>,
    surname: Option<String>,
    name: Option<String>,
    middle_name: Option<String>,
}

impl NameRow {
    fn into_fullname(self) -> String {
        if EntityType::from_type_value(&self.entity) == EntityType::LegalEntity {
            return self.org_full_name.unwrap_or_default();
        }
        [self.surname, self.name, self.middle_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── tests ────────────────────────────────────────────────────────────
