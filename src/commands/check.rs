use crate::error::Result;
use crate::services::ExtremumScanner;

pub async fn run(code: &str) -> Result<()> {
    let provider = super::provider_from_env()?;
    let scanner = ExtremumScanner::new(provider.clone(), provider);

    let check = scanner.check_highest(code).await?;
    println!("{}", serde_json::to_string_pretty(&check)?);
    Ok(())
}
