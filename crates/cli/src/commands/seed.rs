use fellah_db::{DemoDataset, SeedResult, VerificationResult};

use crate::commands::{async_runtime, load_config, open_database, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<_, StepFailure>((seeded, verification))
    });

    match result {
        Ok((seeded, verification)) if verification.all_present => {
            CommandResult::success("seed", summary(&seeded))
        }
        Ok((_, verification)) => {
            CommandResult::failure("seed", "seed_verification", verification_message(&verification), 6)
        }
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}

fn summary(seeded: &SeedResult) -> String {
    format!(
        "demo marketplace loaded: {} products, {} farmers, {} clients, {} inventory entries",
        seeded.products, seeded.farmers, seeded.clients, seeded.inventory_entries
    )
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
