//! Property tests over the console's credential path.

use proptest::prelude::*;

use opsdeck::store::Store;
use opsdeck::{AuditAction, AuditQuery, ConsoleError, Role};
use opsdeck_testkit::generators::{new_credential, role};
use opsdeck_testkit::{ctx, TestConsole};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn secrets_round_trip_and_each_read_is_audited(input in new_credential(), reads in 1usize..4) {
        runtime().block_on(async {
            let t = TestConsole::new();
            let admin = ctx(Role::Admin);
            let secret = input.secret.clone();

            let summary = t.console.create_credential(&admin, input).await.unwrap();
            for _ in 0..reads {
                let full = t.console.read_credential_secret(&admin, &summary.id).await.unwrap();
                assert_eq!(full.secret, secret);
            }

            let audited = t
                .store
                .inner()
                .query_audit(&AuditQuery::all().action(AuditAction::Read))
                .await
                .unwrap();
            assert_eq!(audited.len(), reads);
        });
    }

    #[test]
    fn secret_reads_follow_the_role_table(role in role(), input in new_credential()) {
        runtime().block_on(async {
            let t = TestConsole::new();
            let summary = t
                .console
                .create_credential(&ctx(Role::Admin), input)
                .await
                .unwrap();
            let appends_before = t.store.audit_appends();

            let result = t.console.read_credential_secret(&ctx(role), &summary.id).await;
            match role {
                Role::Admin | Role::SystemManager => {
                    assert!(result.is_ok());
                    assert_eq!(t.store.audit_appends(), appends_before + 1);
                }
                Role::TechnicalSupport | Role::Staff => {
                    assert!(matches!(result, Err(ConsoleError::Forbidden)));
                    assert_eq!(t.store.audit_appends(), appends_before);
                }
            }
        });
    }
}
