use serde::Deserialize;

fn default_table() -> String {
    "tenant_destinations".into()
}

/// Connection parameters for the tenant backing store. All fields are
/// enumerated explicitly and validated at startup before the registry is
/// constructed.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_table")]
    pub table: String,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("database.host must not be empty".into());
        }
        if self.port == 0 {
            return Err("database.port must not be zero".into());
        }
        if self.user.is_empty() {
            return Err("database.user must not be empty".into());
        }
        if self.name.is_empty() {
            return Err("database.name must not be empty".into());
        }
        if self.table.is_empty() {
            return Err("database.table must not be empty".into());
        }
        Ok(())
    }
}
