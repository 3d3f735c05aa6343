//! Parsed commands run end-to-end against a sled store on disk

use clap::Parser;
use lib_referral::{NotificationDispatcher, ReferralConfig, ReferralEngine, ReferralError};
use lib_storage::{SledBackend, SledTree};
use referral_cli::cli_config::{RuntimeSettings, REFERRAL_TREE};
use referral_cli::output::ConsoleOutput;
use referral_cli::{run_command, run_with_settings, CliError, ReferralCli};
use tempfile::TempDir;

/// One sled store per test; every command goes through the same engine
struct Harness {
    engine: ReferralEngine<SledTree>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let tree = SledBackend::open(dir.path()).unwrap().open_tree(REFERRAL_TREE).unwrap();
        let engine =
            ReferralEngine::new(tree, ReferralConfig::for_testing(), NotificationDispatcher::disabled()).unwrap();
        Self { engine, _dir: dir }
    }

    async fn run(&self, args: &[&str]) -> Result<(), CliError> {
        let mut argv = vec!["referral", "--format", "json"];
        argv.extend_from_slice(args);
        let cli = ReferralCli::try_parse_from(argv).unwrap();
        run_command(&self.engine, cli.command, &cli.format, &ConsoleOutput).await
    }

    async fn enrolled_by_email(&self, email: &str) -> lib_referral::Account {
        self.engine
            .store()
            .list_accounts()
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.email == email)
            .unwrap()
    }
}

#[tokio::test]
async fn test_enroll_pay_and_withdraw() {
    let h = Harness::new();

    h.run(&["account", "enroll", "--name", "Ada", "--email", "ada@example.com"]).await.unwrap();
    let sponsor = h.enrolled_by_email("ada@example.com").await;
    let code = sponsor.referral_code.to_string();

    h.run(&["account", "enroll", "--name", "Ben", "--email", "ben@example.com", "--sponsor", &code])
        .await
        .unwrap();
    let member = h.enrolled_by_email("ben@example.com").await.id.to_hex();

    h.run(&["commission", "pay", &member, "200", "--event", "pay-1"]).await.unwrap();
    // Replaying the same payment id credits nothing further
    h.run(&["commission", "pay", &member, "200", "--event", "pay-1"]).await.unwrap();
    h.run(&["wallet", "withdraw", &sponsor.id.to_hex(), "4.00", "--request", "w-1"]).await.unwrap();

    let account = h.engine.require_account(&sponsor.id).await.unwrap();
    assert_eq!(account.referral_earnings, 600);
    assert_eq!(account.lifetime_earnings, 1_000);
    assert_eq!(account.direct_referral_count, 1);
}

#[tokio::test]
async fn test_payment_id_reused_for_other_account_is_an_error() {
    let h = Harness::new();
    h.run(&["account", "enroll", "--name", "Ada", "--email", "ada@example.com"]).await.unwrap();
    h.run(&["account", "enroll", "--name", "Ben", "--email", "ben@example.com"]).await.unwrap();
    let ada = h.enrolled_by_email("ada@example.com").await;
    let ben = h.enrolled_by_email("ben@example.com").await;

    h.run(&["commission", "pay", &ada.id.to_hex(), "100", "--event", "pay-1"]).await.unwrap();
    let err = h
        .run(&["commission", "pay", &ben.id.to_hex(), "500", "--event", "pay-1"])
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::Referral(ReferralError::EventKeyConflict { .. })));
    assert_eq!(h.engine.require_account(&ben.id).await.unwrap().balance, 0);
}

#[tokio::test]
async fn test_withdrawal_over_earnings_fails() {
    let h = Harness::new();
    h.run(&["account", "enroll", "--name", "Ada", "--email", "ada@example.com"]).await.unwrap();
    let id = h.enrolled_by_email("ada@example.com").await.id.to_hex();

    let err = h.run(&["wallet", "withdraw", &id, "1.00"]).await.unwrap_err();
    assert!(err.to_string().contains("Insufficient referral earnings"));
}

#[tokio::test]
async fn test_run_with_settings_reports_engine_errors() {
    let dir = TempDir::new().unwrap();
    let settings = RuntimeSettings {
        data_dir: dir.path().join("data"),
        log_level: "warn".to_string(),
        referral: ReferralConfig::for_testing(),
    };
    let unknown = "11".repeat(16);
    let cli = ReferralCli::try_parse_from(["referral", "wallet", "deposit", unknown.as_str(), "5.00"]).unwrap();

    let err = run_with_settings(cli, settings).await.unwrap_err();
    assert!(err.to_string().contains("Unknown account"));
    assert!(dir.path().join("data").exists());
}

#[tokio::test]
async fn test_unknown_subcommand_is_rejected() {
    assert!(ReferralCli::try_parse_from(["referral", "ledger", "dump"]).is_err());
}
