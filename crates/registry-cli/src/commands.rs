//! Subcommand handlers.
//!
//! Each handler runs against an open [`Registry`] and returns the text to
//! print, so the handlers can be tested without capturing stdout.

use anyhow::{Context, Result};
use registry_store::{Registry, UserData, Value};
use tracing::info;

use crate::cli::Commands;
use crate::helpers::format_rows;

/// What a subcommand produced.
#[derive(Debug, PartialEq)]
pub struct Output {
    pub text: String,
    /// `false` makes the process exit with status 1.
    pub success: bool,
}

impl Output {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

/// Dispatch one subcommand.
pub async fn run(registry: &Registry, command: Commands) -> Result<Output> {
    match command {
        Commands::Init => cmd_init(registry).await,
        Commands::AddUser { json } => cmd_add_user(registry, &json).await,
        Commands::Fullname { login } => {
            let name = registry
                .get_fullname(&login)
                .await
                .with_context(|| format!("failed to look up full name of {login}"))?;
            Ok(Output::ok(name))
        }
        Commands::Attrs { login } => {
            let attrs = registry
                .get_user_attr(&login)
                .await
                .with_context(|| format!("failed to look up attributes of {login}"))?;
            Ok(Output::ok(attrs))
        }
        Commands::UserType { login } => {
            let name = registry
                .get_user_type(&login)
                .await
                .with_context(|| format!("failed to look up entity type of {login}"))?;
            Ok(Output::ok(name))
        }
        Commands::CheckPassword { login, password } => {
            let valid = registry
                .verify_password(&login, &password)
                .await
                .context("failed to check password")?;
            Ok(Output {
                text: if valid { "ok" } else { "mismatch" }.to_string(),
                success: valid,
            })
        }
        Commands::Tables => {
            let tables = registry.database().get_all_tables().await?;
            Ok(Output::ok(tables.join("\n")))
        }
        Commands::Describe { table } => cmd_describe(registry, &table).await,
        Commands::Head { table } => {
            let head = registry.database().get_table_head(&table).await?;
            Ok(Output::ok(head.join("\n")))
        }
        Commands::Dump { table, json } => {
            let frame = registry
                .database()
                .convert_table_to_df(&table)
                .await
                .with_context(|| format!("failed to read table {table}"))?;
            if json {
                Ok(Output::ok(serde_json::to_string_pretty(&frame.to_records())?))
            } else {
                Ok(Output::ok(frame.to_string().trim_end()))
            }
        }
        Commands::Query { sql, params } => {
            let params: Vec<Value> = params.into_iter().map(Value::Text).collect();
            let rows = registry
                .database()
                .get(&sql, &params)
                .await
                .context("query failed")?;
            Ok(Output::ok(format_rows(&rows)))
        }
    }
}

async fn cmd_init(registry: &Registry) -> Result<Output> {
    registry
        .generate_db()
        .await
        .context("failed to create registry schema")?;
    info!("registry initialized");
    Ok(Output::ok("registry schema created"))
}

async fn cmd_add_user(registry: &Registry, json: &str) -> Result<Output> {
    let parsed: serde_json::Value =
        serde_json::from_str(json).context("user data is not valid JSON")?;
    let data = UserData::from_json(&parsed)?;
    let id = registry.add_user(data).await.context("user rejected")?;
    info!(user_id = id, "user added");
    Ok(Output::ok(id.to_string()))
}

async fn cmd_describe(registry: &Registry, table: &str) -> Result<Output> {
    let columns = registry.database().describe_table(table).await?;
    if columns.is_empty() {
        anyhow::bail!("no such table: {table}");
    }
    let lines: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut line = format!("{}\t{}\t{}", c.cid, c.name, c.decl_type);
            if c.not_null {
                line.push_str("\tNOT NULL");
            }
            if let Some(default) = &c.default_value {
                line.push_str(&format!("\tDEFAULT {default}"));
            }
            if c.pk > 0 {
                line.push_str("\tPRIMARY KEY");
            }
            line
        })
        .collect();
    Ok(Output::ok(lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use registry_store::{Database, RegistryOptions, StoreError, ValidationError};

    use super::*;

    async fn setup_registry() -> Registry {
        let db = Database::open_in_memory().unwrap();
        let registry = Registry::with_options(
            db,
            RegistryOptions {
                hash_passwords: false,
            },
        );
        run(&registry, Commands::Init).await.unwrap();
        registry
    }

    const ANNA: &str = r#"{"login": "anna", "password": "pw", "type": 3, "inn": 366316608880,
        "address": "Воронеж", "snils": 11223344595, "surname": "Петрова", "name": "Анна",
        "middle_name": "Сергеевна"}"#;

    #[tokio::test]
    async fn add_user_and_look_up() {
        let registry = setup_registry().await;

        let out = run(&registry, Commands::AddUser { json: ANNA.into() })
            .await
            .unwrap();
        assert_eq!(out, Output::ok("1"));

        let out = run(&registry, Commands::Fullname { login: "anna".into() })
            .await
            .unwrap();
        assert_eq!(out.text, "Петрова Анна Сергеевна");

        let out = run(&registry, Commands::UserType { login: "anna".into() })
            .await
            .unwrap();
        assert_eq!(out.text, "Физическое лицо");

        let out = run(&registry, Commands::Attrs { login: "anna".into() })
            .await
            .unwrap();
        let attrs: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(attrs["address"], "Воронеж");
    }

    #[tokio::test]
    async fn rejected_user_carries_validation_error() {
        let registry = setup_registry().await;
        let json = r#"{"login": "x", "password": "pw", "type": 3}"#;

        let err = run(&registry, Commands::AddUser { json: json.into() })
            .await
            .unwrap_err();
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::Validation(ValidationError::MissingField(f))) => {
                assert_eq!(f, "inn");
            }
            other => panic!("expected MissingField, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let registry = setup_registry().await;
        let result = run(&registry, Commands::AddUser { json: "{not json".into() }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn check_password_reports_mismatch() {
        let registry = setup_registry().await;
        run(&registry, Commands::AddUser { json: ANNA.into() })
            .await
            .unwrap();

        let out = run(
            &registry,
            Commands::CheckPassword {
                login: "anna".into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap();
        assert!(out.success);

        let out = run(
            &registry,
            Commands::CheckPassword {
                login: "anna".into(),
                password: "bad".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            Output {
                text: "mismatch".into(),
                success: false
            }
        );
    }

    #[tokio::test]
    async fn inspection_commands() {
        let registry = setup_registry().await;

        let tables = run(&registry, Commands::Tables).await.unwrap().text;
        assert!(tables.lines().any(|t| t == "users"));

        let head = run(&registry, Commands::Head { table: "types".into() })
            .await
            .unwrap();
        assert_eq!(head.text, "id\nname");

        let describe = run(&registry, Commands::Describe { table: "users".into() })
            .await
            .unwrap();
        assert!(describe.text.starts_with("0\tid\tINTEGER\tPRIMARY KEY"));
        assert!(describe.text.contains("1\tlogin\tVARCHAR\tNOT NULL"));

        let dump = run(
            &registry,
            Commands::Dump {
                table: "types".into(),
                json: true,
            },
        )
        .await
        .unwrap();
        let records: serde_json::Value = serde_json::from_str(&dump.text).unwrap();
        assert_eq!(records[0]["name"], "ИП");

        let query = run(
            &registry,
            Commands::Query {
                sql: "SELECT id FROM types WHERE name = ?1".into(),
                params: vec!["Юридическое лицо".into()],
            },
        )
        .await
        .unwrap();
        assert_eq!(query.text, "2");
    }

    #[tokio::test]
    async fn describe_unknown_table_fails() {
        let registry = setup_registry().await;
        let result = run(&registry, Commands::Describe { table: "nope".into() }).await;
        assert!(result.is_err());
    }
}
