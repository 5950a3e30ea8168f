use crate::error::Result;

pub async fn run() -> Result<()> {
    let store = super::store_from_env().await?;

    match store.latest_breadth().await? {
        Some(stats) => println!(
            "breadth       {}  (rise {} / fall {} / flat {} of {})",
            stats.date, stats.rise, stats.fall, stats.flat, stats.total
        ),
        None => println!("breadth       (none)"),
    }

    match store.latest_distribution().await? {
        Some(snap) => println!(
            "distribution  {}  ({} rise bands, {} fall bands)",
            snap.date,
            snap.rise.len(),
            snap.fall.len()
        ),
        None => println!("distribution  (none)"),
    }

    match store.latest_high_rise().await? {
        Some((date, stocks)) => println!("high_rise     {}  ({} stocks)", date, stocks.len()),
        None => println!("high_rise     (none)"),
    }

    match store.latest_unified().await? {
        Some(snap) => println!(
            "unified       {}  ({} trailing days)",
            snap.date,
            snap.recent.len()
        ),
        None => println!("unified       (none)"),
    }

    Ok(())
}
