//! `parley init` — Write a default config file.

use parley_config::AppConfig;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new("parley.toml");

    if path.exists() {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or delete and re-run init.");
        return Ok(());
    }

    std::fs::write(path, AppConfig::default_toml())?;
    println!("✅ Created {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set auth.jwt_secret (or export PARLEY_JWT_SECRET)");
    println!("   2. Set your API key (or export ANTHROPIC_API_KEY)");
    println!("   3. Run: parley serve");

    Ok(())
}
