use crate::cli::args::{ConfigArgs, ConfigCommand};
use crate::config::Config;
use crate::error::Result;

/// Execute config command
pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Set { key, value } => {
            let mut config = Config::load_file()?;
            config.set(&key, &value)?;
            let shown = if is_secret(&key) {
                mask_value(&value)
            } else {
                value
            };
            println!("✅ Configuration updated: {} = {}", key, shown);
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) if is_secret(&key) => println!("{}: {}", key, mask_value(&value)),
                Some(value) => println!("{}: {}", key, value),
                None => println!("Configuration key '{}' not set", key),
            }
            Ok(())
        }
        ConfigCommand::Path => {
            let path = Config::config_file_path()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
        ConfigCommand::Init => {
            Config::initialize()?;
            println!("✅ Configuration initialized");
            println!();
            println!("To enable the member portal and e-Stat, run:");
            println!("  polsig config set portal.user YOUR_ID");
            println!("  polsig config set portal.password YOUR_PASSWORD");
            println!("  polsig config set estat.app_id YOUR_APP_ID");
            Ok(())
        }
    }
}

fn is_secret(key: &str) -> bool {
    matches!(key, "portal.password" | "estat.app_id")
}

/// Mask sensitive values for display
fn mask_value(value: &str) -> String {
    let count = value.chars().count();
    if count > 4 {
        let head: String = value.chars().take(4).collect();
        format!("{}...({} characters)", head, count)
    } else {
        "*".repeat(count)
    }
}
